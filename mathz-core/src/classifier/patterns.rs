//! Built-in category pattern table.
//!
//! Keywords are written accent-free and lowercase; they are matched against
//! the normalized problem text (see [`super::normalize`]) on whole-word
//! boundaries. Symbol markers are literal substrings. Structural rules are
//! regexes over the normalized text.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MathzError, Result};
use crate::types::Category;

/// Static scoring configuration for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPattern {
    /// Category this pattern votes for.
    pub category: Category,
    /// Whole-word keywords (accent-free, lowercase).
    pub keywords: Vec<String>,
    /// Literal substrings such as `°` or `%`.
    pub symbol_markers: Vec<String>,
    /// Regex sources evaluated against the normalized text.
    pub structural_rules: Vec<String>,
    /// Multiplier applied to the normalized raw score.
    pub base_confidence: f32,
}

impl CategoryPattern {
    fn new(
        category: Category,
        keywords: &[&str],
        symbol_markers: &[&str],
        structural_rules: &[&str],
        base_confidence: f32,
    ) -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| (*s).to_string()).collect();
        Self {
            category,
            keywords: owned(keywords),
            symbol_markers: owned(symbol_markers),
            structural_rules: owned(structural_rules),
            base_confidence,
        }
    }

    /// Total number of rules, used to normalize the raw score.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.keywords.len() + self.symbol_markers.len() + self.structural_rules.len()
    }
}

/// The pattern table shipped with the classifier.
///
/// Order matters only for ties: the earlier pattern wins.
#[must_use]
pub fn builtin_patterns() -> Vec<CategoryPattern> {
    vec![
        CategoryPattern::new(
            Category::Arithmetic,
            &[
                "soma", "some", "subtracao", "subtraia", "multiplicacao", "multiplique",
                "divisao", "divida", "quanto e", "fracao", "fracoes", "mmc", "mdc",
                "divisor", "multiplo", "resto", "numero primo", "expressao numerica",
            ],
            &["+", "-", "×", "÷", "*", "/"],
            &[
                r"^\D*\d+(?:[.,]\d+)?\s*[-+*/×÷]\s*\d+(?:[.,]\d+)?\D*$",
                r"\b\d+\s*/\s*\d+\b",
            ],
            0.8,
        ),
        CategoryPattern::new(
            Category::LinearAlgebra,
            &[
                "equacao", "resolva", "incognita", "valor de x", "primeiro grau", "1o grau",
                "linear", "isole", "variavel", "expressao algebrica",
            ],
            &["=", "+", "-"],
            &[
                r"\b\d*\s*[a-z]\s*[-+]\s*\d+(?:[.,]\d+)?\s*=\s*-?\d+",
                r"\b\d+\s*[a-z]\s*=\s*-?\d+",
                r"=\s*\d*\s*[a-z]\s*[-+]\s*\d",
            ],
            0.9,
        ),
        CategoryPattern::new(
            Category::QuadraticEquations,
            &[
                "segundo grau", "2o grau", "bhaskara", "delta", "raizes", "quadratica",
                "parabola", "discriminante", "equacao quadratica",
            ],
            &["²", "^2"],
            &[
                r"\b[a-z]\s*(?:\^\s*2|²)",
                r"\b\d*\s*x\s*(?:\^\s*2|²)[^=]*[-+]\s*\d*\s*x\b",
            ],
            0.9,
        ),
        CategoryPattern::new(
            Category::TrigonometricFunctions,
            &[
                "seno", "cosseno", "tangente", "sen", "cos", "tg", "tan", "trigonometria",
                "trigonometrica", "triangulo retangulo", "hipotenusa", "cateto", "angulo",
                "radianos", "ciclo trigonometrico",
            ],
            &["°", "π"],
            &[
                r"\b(?:sen|sin|cos|tg|tan|cotg|sec|cossec)\s*\(",
                r"\d+\s*°",
                r"\b(?:sen|sin|cos|tg|tan)\s*\^?\s*2",
            ],
            0.9,
        ),
        CategoryPattern::new(
            Category::Logarithms,
            &[
                "log", "logaritmo", "logaritmos", "ln", "exponencial", "antilogaritmo",
                "cologaritmo", "base",
            ],
            &["^", "e^"],
            &[
                r"\blog\s*_?\s*\d*\s*\(",
                r"\bln\s*\(",
                r"\blog\s*_?\s*\d+",
                r"\b\d+\s*\^\s*\(?[a-z]",
            ],
            0.9,
        ),
        CategoryPattern::new(
            Category::Geometry,
            &[
                "area", "perimetro", "volume", "triangulo", "retangulo", "quadrado",
                "circulo", "circunferencia", "raio", "diametro", "poligono", "cubo",
                "esfera", "cilindro", "pitagoras",
            ],
            &["m²", "cm²", "m³"],
            &[
                r"\b(?:area|perimetro|volume)\s+d[oae]s?\b",
                r"\bpi\s*\*?\s*r\b",
            ],
            0.85,
        ),
        CategoryPattern::new(
            Category::Calculus,
            &[
                "derivada", "integral", "limite", "lim", "diferencial", "primitiva",
                "taxa de variacao", "maximo", "minimo", "reta tangente",
            ],
            &["∫", "d/dx", "dx", "→", "∞"],
            &[
                r"\b(?:derivada|integral|limite)\s+d[aeo]s?\b",
                r"\blim\s*(?:_|\()",
                r"\bd\s*/\s*d[a-z]\b",
                r"∫",
                r"\b[fg]\s*'\s*\(",
            ],
            0.95,
        ),
        CategoryPattern::new(
            Category::Matrices,
            &[
                "matriz", "matrizes", "determinante", "transposta", "inversa", "linha",
                "coluna", "escalonamento",
            ],
            &["[", "]", "|"],
            &[
                r"\[\s*-?\d+(?:\s*[, ]\s*-?\d+)+\s*\]",
                r"\bdet\s*\(",
                r"\bmatriz\s+(?:de\s+ordem\s+)?\d+\s*x\s*\d+\b",
            ],
            0.9,
        ),
        CategoryPattern::new(
            Category::Statistics,
            &[
                "media", "mediana", "moda", "desvio padrao", "variancia", "frequencia",
                "amostra", "dados", "estatistica", "grafico", "quartil",
            ],
            &["σ", "x̄"],
            &[
                r"\b(?:media|mediana|moda)\s+d[oae]s?\b",
                r"(?:\d+(?:[.,]\d+)?\s*[,;]\s*){3,}\d+",
            ],
            0.85,
        ),
        CategoryPattern::new(
            Category::Probability,
            &[
                "probabilidade", "chance", "dado", "moeda", "sorteio", "aleatorio", "evento",
                "combinacao", "permutacao", "arranjo", "fatorial",
            ],
            &["!", "p("],
            &[
                r"\bp\s*\(\s*[a-z]",
                r"\b[cpa]\s*\(\s*\d+\s*,\s*\d+\s*\)",
                r"\d+\s*!",
            ],
            0.85,
        ),
        CategoryPattern::new(
            Category::FinancialMath,
            &[
                "porcentagem", "percentual", "juros", "juros simples", "juros compostos",
                "desconto", "acrescimo", "aumento", "capital", "montante", "taxa", "lucro",
                "prejuizo", "investimento",
            ],
            &["%", "r$"],
            &[
                r"\d+(?:[.,]\d+)?\s*%",
                r"r\$\s*\d",
                r"\bao (?:mes|ano)\b",
            ],
            0.85,
        ),
    ]
}

/// A pattern with its regexes compiled, ready for scoring.
#[derive(Debug, Clone)]
pub(crate) struct CompiledPattern {
    pub(crate) category: Category,
    keywords: Vec<Regex>,
    symbols: Vec<String>,
    rules: Vec<Regex>,
    base_confidence: f32,
    rule_count: usize,
}

impl CompiledPattern {
    /// Compile a pattern. Keywords become `\b…\b` regexes over normalized text.
    pub(crate) fn compile(pattern: &CategoryPattern) -> Result<Self> {
        let keywords = pattern
            .keywords
            .iter()
            .map(|kw| {
                let source = format!(r"\b{}\b", regex::escape(&super::normalize(kw)));
                Regex::new(&source).map_err(|e| MathzError::Config(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let rules = pattern
            .structural_rules
            .iter()
            .map(|src| Regex::new(src).map_err(|e| MathzError::Config(format!("{src}: {e}"))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            category: pattern.category,
            keywords,
            symbols: pattern.symbol_markers.clone(),
            rules,
            base_confidence: pattern.base_confidence,
            rule_count: pattern.rule_count(),
        })
    }

    /// Final score for this pattern against already-normalized text.
    ///
    /// raw = keywords·1 + symbols·0.5 + structural·2, divided by the rule
    /// count, times the base confidence.
    pub(crate) fn score(&self, normalized: &str) -> f32 {
        if self.rule_count == 0 {
            return 0.0;
        }

        let keyword_hits = self.keywords.iter().filter(|re| re.is_match(normalized)).count();
        let symbol_hits = self
            .symbols
            .iter()
            .filter(|sym| normalized.contains(sym.as_str()))
            .count();
        let rule_hits = self.rules.iter().filter(|re| re.is_match(normalized)).count();

        let raw = keyword_hits as f32 + symbol_hits as f32 * 0.5 + rule_hits as f32 * 2.0;
        raw / self.rule_count as f32 * self.base_confidence
    }
}
