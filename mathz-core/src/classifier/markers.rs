//! Structural markers shared by difficulty scoring and tag generation.
//!
//! Difficulty = 1.0 + Σ weightᵢ · cueᵢ, rounded and clamped to [1, 5]:
//!
//! | cue                        | weight |
//! |----------------------------|--------|
//! | exponent                   | +0.5   |
//! | trigonometric call         | +1.5   |
//! | logarithmic call           | +1.5   |
//! | radical                    | +0.5   |
//! | system of equations        | +1.0   |
//! | calculus marker            | +2.0   |
//! | matrix marker              | +1.5   |
//! | long numeric literal       | +0.5   |
//! | equation with a variable   | +0.5   |
//! | geometric figure           | +0.5   |

use regex::Regex;

use crate::error::{MathzError, Result};

/// Which structural cues are present in a piece of normalized text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CueSet {
    /// `^`, `²`, `³`, `**`.
    pub exponent: bool,
    /// `sen(`, `cos(`, `tg(`, …
    pub trig_call: bool,
    /// `log(`, `ln(`, `log2 8`, …
    pub log_call: bool,
    /// `√`, `sqrt`, "raiz quadrada".
    pub radical: bool,
    /// "sistema" or several equalities separated by a delimiter.
    pub system: bool,
    /// Derivatives, integrals, limits.
    pub calculus: bool,
    /// Matrices and determinants.
    pub matrix: bool,
    /// Five or more digits, or three or more decimals.
    pub long_number: bool,
    /// An equality involving a single-letter variable.
    pub equation: bool,
    /// Named plane or solid figure.
    pub figure: bool,
    /// Mentions a function.
    pub function: bool,
    /// Trigonometric vocabulary beyond calls.
    pub trig_word: bool,
    /// Logarithm vocabulary beyond calls.
    pub log_word: bool,
    /// Area, perimeter, volume.
    pub measure: bool,
    /// Percentages.
    pub percentage: bool,
    /// Interest.
    pub interest: bool,
    /// Probability vocabulary.
    pub probability: bool,
    /// Statistics vocabulary.
    pub statistics: bool,
}

impl CueSet {
    /// Weighted difficulty level in `[1, 5]`.
    #[must_use]
    pub fn difficulty(&self) -> u8 {
        let weights = [
            (self.exponent, 0.5),
            (self.trig_call, 1.5),
            (self.log_call, 1.5),
            (self.radical, 0.5),
            (self.system, 1.0),
            (self.calculus, 2.0),
            (self.matrix, 1.5),
            (self.long_number, 0.5),
            (self.equation, 0.5),
            (self.figure, 0.5),
        ];
        let level: f32 = 1.0
            + weights
                .iter()
                .filter(|(present, _)| *present)
                .map(|(_, w)| w)
                .sum::<f32>();
        level.round().clamp(1.0, 5.0) as u8
    }

    /// Secondary tag markers, in fixed first-detected-first-kept order.
    #[must_use]
    pub fn tag_markers(&self) -> Vec<&'static str> {
        let markers = [
            (self.equation, "equação"),
            (self.system, "sistema"),
            (self.function, "função"),
            (self.figure || self.measure, "geometria"),
            (self.trig_call || self.trig_word, "trigonometria"),
            (self.log_call || self.log_word, "logaritmo"),
            (self.percentage, "porcentagem"),
            (self.interest, "juros"),
            (self.probability, "probabilidade"),
            (self.statistics, "estatística"),
        ];
        markers
            .iter()
            .filter(|(present, _)| *present)
            .map(|(_, tag)| *tag)
            .collect()
    }
}

/// Compiled detectors for every cue in [`CueSet`].
#[derive(Debug, Clone)]
pub struct StructuralCues {
    exponent: Regex,
    trig_call: Regex,
    log_call: Regex,
    radical: Regex,
    system: Regex,
    calculus: Regex,
    matrix: Regex,
    long_number: Regex,
    equation_variable: Regex,
    figure: Regex,
    function: Regex,
    trig_word: Regex,
    log_word: Regex,
    measure: Regex,
    percentage: Regex,
    interest: Regex,
    probability: Regex,
    statistics: Regex,
}

fn compile(source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|e| MathzError::Config(format!("{source}: {e}")))
}

impl StructuralCues {
    /// Compile the built-in cue detectors.
    ///
    /// # Errors
    /// Returns `MathzError::Config` if a detector regex fails to compile.
    pub fn new() -> Result<Self> {
        Ok(Self {
            exponent: compile(r"\^|²|³|\*\*")?,
            trig_call: compile(r"\b(?:sen|sin|cos|tg|tan|cotg|sec|cossec)\s*\(")?,
            log_call: compile(r"\b(?:log|ln)\s*_?\s*\d*\s*\(|\blog\s*_?\s*\d+")?,
            radical: compile(r"√|\bsqrt\b|\braiz (?:quadrada|cubica)\b")?,
            system: compile(r"\bsistemas?\b|=[^=]*[;\n{][^=]*=")?,
            calculus: compile(r"\b(?:derivada|integral|limite|lim)\b|∫|\bd\s*/\s*d[a-z]\b")?,
            matrix: compile(r"\b(?:matriz|matrizes|determinante)\b|\bdet\s*\(")?,
            long_number: compile(r"\d{5,}|\d[.,]\d{3,}")?,
            equation_variable: compile(r"\d[a-z]\b|\b[a-z]\s*[-+*/=^²]")?,
            figure: compile(
                r"\b(?:triangulo|quadrado|retangulo|circulo|circunferencia|poligono|cubo|esfera|cilindro|cone|piramide|trapezio|losango)\b",
            )?,
            function: compile(r"\bfunc(?:ao|oes)\b|\b[fg]\s*\(\s*[a-z]\s*\)")?,
            trig_word: compile(r"\b(?:seno|cosseno|tangente|trigonometri\w*)\b")?,
            log_word: compile(r"\blogaritm\w*")?,
            measure: compile(r"\b(?:area|perimetro|volume)\b")?,
            percentage: compile(r"%|\bporcent\w*|\bpercent\w*")?,
            interest: compile(r"\bjuros\b")?,
            probability: compile(r"\bprobabilidade\w*|\bchance\b")?,
            statistics: compile(
                r"\b(?:media|mediana|moda|desvio padrao|variancia|estatistic\w*)\b",
            )?,
        })
    }

    /// Detect every cue in normalized text.
    #[must_use]
    pub fn detect(&self, normalized: &str) -> CueSet {
        let has_equals = normalized.contains('=');
        CueSet {
            exponent: self.exponent.is_match(normalized),
            trig_call: self.trig_call.is_match(normalized),
            log_call: self.log_call.is_match(normalized),
            radical: self.radical.is_match(normalized),
            system: self.system.is_match(normalized),
            calculus: self.calculus.is_match(normalized),
            matrix: self.matrix.is_match(normalized),
            long_number: self.long_number.is_match(normalized),
            equation: (has_equals && self.equation_variable.is_match(normalized))
                || normalized.contains("equacao")
                || normalized.contains("equacoes"),
            figure: self.figure.is_match(normalized),
            function: self.function.is_match(normalized),
            trig_word: self.trig_word.is_match(normalized),
            log_word: self.log_word.is_match(normalized),
            measure: self.measure.is_match(normalized),
            percentage: self.percentage.is_match(normalized),
            interest: self.interest.is_match(normalized),
            probability: self.probability.is_match(normalized),
            statistics: self.statistics.is_match(normalized),
        }
    }
}
