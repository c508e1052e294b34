//! Prompt templates for explanation generation.
//!
//! Every prompt is a testable artifact. The built-in templates are the
//! `const` strings below; any of them can be replaced from the `[llm.prompts]`
//! table of the configuration file.
//!
//! All three complexity templates demand the same label schema so the
//! validator does not care which one produced an answer:
//!
//! ```text
//! PASSO 1:
//! Título: …
//! Explicação: …
//! Cálculo: …
//! Resultado: …
//! VERIFICAÇÃO: …
//! RESPOSTA FINAL: …
//! ```

use crate::config::PromptOverrides;
use crate::error::{LlmError, Result};
use crate::types::Complexity;

/// Placeholder substituted with the problem text.
pub const PROBLEM_VAR: &str = "problem";

/// Template for one-step problems.
pub const SIMPLE_TEMPLATE: &str = r"Você é um professor de matemática paciente.
Explique a solução do problema abaixo em poucos passos curtos.

Problema: {problem}

Use EXATAMENTE este formato, com um bloco por passo:

PASSO 1:
Título: <nome curto do passo>
Explicação: <o que está sendo feito e por quê>
Cálculo: <a conta realizada>
Resultado: <o resultado do passo>

VERIFICAÇÃO: <confira o resultado substituindo ou refazendo a conta>
RESPOSTA FINAL: <apenas a resposta>";

/// Template for intermediate problems.
pub const MEDIUM_TEMPLATE: &str = r"Você é um professor de matemática que explica com clareza.
Resolva o problema abaixo passo a passo, justificando cada transformação.

Problema: {problem}

Use EXATAMENTE este formato, numerando os passos em ordem:

PASSO 1:
Título: <nome do passo>
Explicação: <raciocínio e regra aplicada>
Cálculo: <a conta realizada>
Resultado: <o resultado do passo>

PASSO 2:
Título: ...
Explicação: ...
Cálculo: ...
Resultado: ...

VERIFICAÇÃO: <confira o resultado final>
RESPOSTA FINAL: <apenas a resposta>";

/// Template for calculus, trigonometry, logarithms and matrices.
pub const COMPLEX_TEMPLATE: &str = r"Você é um professor de matemática experiente.
Resolva o problema abaixo com rigor, dividindo a solução em passos pequenos.
Cite as propriedades, identidades ou teoremas usados em cada passo.

Problema: {problem}

Use EXATAMENTE este formato, numerando os passos em ordem:

PASSO 1:
Título: <nome do passo>
Explicação: <propriedade ou teorema aplicado e por quê>
Cálculo: <a conta realizada, sem pular etapas>
Resultado: <o resultado do passo>

PASSO 2:
Título: ...
Explicação: ...
Cálculo: ...
Resultado: ...

VERIFICAÇÃO: <confira o resultado por outro caminho quando possível>
RESPOSTA FINAL: <apenas a resposta>";

/// Block appended to the complexity template on the strict retry.
pub const STRICT_BLOCK: &str = r"
ATENÇÃO: a resposta anterior não seguiu o formato exigido.
Regras obrigatórias:
- Cada passo começa com uma linha 'PASSO n:' (n = 1, 2, 3, ...).
- Cada passo contém as linhas 'Título:', 'Explicação:', 'Cálculo:' e 'Resultado:', nessa ordem.
- Depois dos passos, escreva uma linha 'VERIFICAÇÃO:' e uma linha 'RESPOSTA FINAL:'.
- Não use outros rótulos, tabelas, títulos em markdown nem texto fora desse formato.";

/// Answer-only prompt used as the last rung of the ladder.
pub const FALLBACK_TEMPLATE: &str = r"Resolva o problema de matemática abaixo.
Responda apenas com o resultado final, em uma linha, sem explicação.

Problema: {problem}";

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// Renders explanation prompts from the active template set.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    simple: String,
    medium: String,
    complex: String,
    strict: String,
    fallback: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptBuilder {
    /// Builder using only the compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            simple: SIMPLE_TEMPLATE.into(),
            medium: MEDIUM_TEMPLATE.into(),
            complex: COMPLEX_TEMPLATE.into(),
            strict: STRICT_BLOCK.into(),
            fallback: FALLBACK_TEMPLATE.into(),
        }
    }

    /// Builder with configured overrides layered over the built-ins.
    ///
    /// # Errors
    /// Returns `LlmError::Config` if an overriding problem template lacks
    /// the `{problem}` placeholder.
    pub fn with_overrides(overrides: &PromptOverrides) -> Result<Self> {
        let placeholder = format!("{{{PROBLEM_VAR}}}");
        let checked = |name: &str, value: &Option<String>, builtin: &str| -> Result<String> {
            match value {
                Some(template) if !template.contains(&placeholder) => Err(LlmError::Config(
                    format!("prompt '{name}' must contain {placeholder}"),
                )),
                Some(template) => Ok(template.clone()),
                None => Ok(builtin.to_string()),
            }
        };

        Ok(Self {
            simple: checked("simple", &overrides.simple, SIMPLE_TEMPLATE)?,
            medium: checked("medium", &overrides.medium, MEDIUM_TEMPLATE)?,
            complex: checked("complex", &overrides.complex, COMPLEX_TEMPLATE)?,
            strict: overrides.strict.clone().unwrap_or_else(|| STRICT_BLOCK.to_string()),
            fallback: checked("fallback", &overrides.fallback, FALLBACK_TEMPLATE)?,
        })
    }

    /// Structured-explanation prompt for a problem.
    ///
    /// `strict` appends the format-enforcement block; it is only used on
    /// the retry after a non-conforming answer.
    #[must_use]
    pub fn build_prompt(&self, text: &str, complexity: Complexity, strict: bool) -> String {
        let template = match complexity {
            Complexity::Simple => &self.simple,
            Complexity::Medium => &self.medium,
            Complexity::Complex => &self.complex,
        };
        let mut prompt = render_template(template, &[(PROBLEM_VAR, text.trim())]);
        if strict {
            prompt.push('\n');
            prompt.push_str(&self.strict);
        }
        prompt
    }

    /// Answer-only prompt.
    #[must_use]
    pub fn build_fallback_prompt(&self, text: &str) -> String {
        render_template(&self.fallback, &[(PROBLEM_VAR, text.trim())])
    }
}
