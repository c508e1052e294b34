//! Label-schema validation and parsing of model output.
//!
//! Validation is purely syntactic. A line counts as a label line when,
//! after stripping markdown decoration (`#`, `*`, `_`, `>`, list dashes)
//! and folding case and accents, it starts with one of the labels below.
//! Stripping applies to recognition only; field values come from the raw
//! line, so `6 * 7` and `x_1` reach the caller intact.
//!
//! | label             | role                     |
//! |-------------------|--------------------------|
//! | `passo N`         | starts a step            |
//! | `titulo:`         | step title               |
//! | `explicacao:`     | step explanation         |
//! | `calculo:`        | step calculation         |
//! | `resultado:`      | step result              |
//! | `verificacao:`    | verification block       |
//! | `resposta final:` | final answer             |
//!
//! Unlabelled lines continue whichever field came last.

use mathz_core::classifier::normalize;
use mathz_core::{ExplanationStep, StructuredExplanation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Step,
    Title,
    Explanation,
    Calculation,
    Result,
    Verification,
    FinalAnswer,
}

const FIELD_LABELS: &[(&str, Label)] = &[
    ("titulo", Label::Title),
    ("explicacao", Label::Explanation),
    ("calculo", Label::Calculation),
    ("resultado", Label::Result),
    ("verificacao", Label::Verification),
    ("resposta final", Label::FinalAnswer),
];

fn strip_decoration(line: &str) -> String {
    line.chars()
        .filter(|c| !matches!(c, '*' | '_' | '#' | '`'))
        .collect::<String>()
        .trim_start_matches(|c: char| c.is_whitespace() || c == '>' || c == '-' || c == '•')
        .trim_end()
        .to_string()
}

/// Text after the first `:` of the raw line, with only the markdown
/// wrapping at its edges removed. Interior `*`, `_` and `#` are math.
fn label_value(line: &str) -> String {
    let Some((_, value)) = line.split_once(':') else {
        return String::new();
    };
    let mut value = value.trim();
    loop {
        let before = value.len();
        for marker in ["**", "__"] {
            value = value.strip_prefix(marker).unwrap_or(value).trim_start();
            value = value.strip_suffix(marker).unwrap_or(value).trim_end();
        }
        if value.len() == before {
            break;
        }
    }
    value.to_string()
}

/// Classify one line. Returns the label and the text after it.
fn classify_line(line: &str) -> Option<(Label, String)> {
    let clean = strip_decoration(line);
    let folded = normalize(&clean);

    if let Some(rest) = folded.strip_prefix("passo") {
        let rest = rest.trim_start();
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            return Some((Label::Step, label_value(line)));
        }
    }

    for (name, label) in FIELD_LABELS {
        if let Some(rest) = folded.strip_prefix(name)
            && rest.trim_start().starts_with(':')
        {
            return Some((*label, label_value(line)));
        }
    }
    None
}

/// Whether the output carries the full label schema: at least one step
/// marker plus the explanation, calculation, result and final-answer labels.
#[must_use]
pub fn is_valid_structured(output: &str) -> bool {
    let mut seen = [false; 5];
    for (label, _) in output.lines().filter_map(classify_line) {
        match label {
            Label::Step => seen[0] = true,
            Label::Explanation => seen[1] = true,
            Label::Calculation => seen[2] = true,
            Label::Result => seen[3] = true,
            Label::FinalAnswer => seen[4] = true,
            Label::Title | Label::Verification => {}
        }
    }
    seen.iter().all(|s| *s)
}

fn append(field: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !field.is_empty() {
        field.push('\n');
    }
    field.push_str(text);
}

/// Parse conforming output into a [`StructuredExplanation`].
///
/// Returns `None` when [`is_valid_structured`] would reject the text.
#[must_use]
pub fn parse_structured(output: &str) -> Option<StructuredExplanation> {
    if !is_valid_structured(output) {
        return None;
    }

    let mut steps: Vec<ExplanationStep> = Vec::new();
    let mut verification = String::new();
    let mut final_answer = String::new();
    let mut current: Option<Label> = None;

    for line in output.lines() {
        if let Some((label, value)) = classify_line(line) {
            current = Some(label);
            match label {
                Label::Step => steps.push(ExplanationStep {
                    title: value,
                    explanation: String::new(),
                    calculation: String::new(),
                    result: String::new(),
                }),
                Label::Verification => append(&mut verification, &value),
                Label::FinalAnswer => append(&mut final_answer, &value),
                Label::Title | Label::Explanation | Label::Calculation | Label::Result => {
                    if let Some(step) = steps.last_mut() {
                        let field = field_mut(step, label);
                        field.clear();
                        field.push_str(&value);
                    } else {
                        current = None;
                    }
                }
            }
            continue;
        }

        let text = line.trim();
        match current {
            Some(Label::Verification) => append(&mut verification, text),
            Some(Label::FinalAnswer) => append(&mut final_answer, text),
            Some(label @ (Label::Title | Label::Explanation | Label::Calculation | Label::Result)) => {
                if let Some(step) = steps.last_mut() {
                    append(field_mut(step, label), text);
                }
            }
            Some(Label::Step) | None => {}
        }
    }

    Some(StructuredExplanation {
        steps,
        verification: (!verification.is_empty()).then_some(verification),
        final_answer,
    })
}

fn field_mut(step: &mut ExplanationStep, label: Label) -> &mut String {
    match label {
        Label::Title => &mut step.title,
        Label::Calculation => &mut step.calculation,
        Label::Result => &mut step.result,
        _ => &mut step.explanation,
    }
}
