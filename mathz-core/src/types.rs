//! Core type definitions for the MATHZ problem pipeline.
//!
//! All types are serializable so they can cross the storage boundary as
//! JSON columns and the CLI boundary as JSON output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for a submitted problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProblemId(pub Uuid);

impl ProblemId {
    /// Create a new random problem ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProblemId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionId(pub Uuid);

impl CollectionId {
    /// Create a new random collection ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProblemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Closed set of subject categories a problem can be classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Plain arithmetic: operations, fractions, divisibility.
    Arithmetic,
    /// First-degree equations and linear expressions.
    LinearAlgebra,
    /// Second-degree equations, Bhaskara, roots.
    QuadraticEquations,
    /// Sine, cosine, tangent and right-triangle relations.
    TrigonometricFunctions,
    /// Logarithms and exponential equations.
    Logarithms,
    /// Plane and spatial geometry.
    Geometry,
    /// Limits, derivatives, integrals.
    Calculus,
    /// Matrices and determinants.
    Matrices,
    /// Descriptive statistics.
    Statistics,
    /// Probability and combinatorics.
    Probability,
    /// Percentages and interest.
    FinancialMath,
    /// Fallback when no category scores above threshold.
    General,
}

impl Category {
    /// The built-in default returned for indecisive input.
    pub const DEFAULT: Self = Self::General;

    /// Every category, in pattern-table order.
    #[must_use]
    pub fn all() -> &'static [Category] {
        &[
            Self::Arithmetic,
            Self::LinearAlgebra,
            Self::QuadraticEquations,
            Self::TrigonometricFunctions,
            Self::Logarithms,
            Self::Geometry,
            Self::Calculus,
            Self::Matrices,
            Self::Statistics,
            Self::Probability,
            Self::FinancialMath,
            Self::General,
        ]
    }

    /// Stable slug, used as the first tag and as the storage key.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Arithmetic => "aritmetica",
            Self::LinearAlgebra => "algebra-linear",
            Self::QuadraticEquations => "equacoes-quadraticas",
            Self::TrigonometricFunctions => "funcoes-trigonometricas",
            Self::Logarithms => "logaritmos",
            Self::Geometry => "geometria",
            Self::Calculus => "calculo",
            Self::Matrices => "matrizes",
            Self::Statistics => "estatistica",
            Self::Probability => "probabilidade",
            Self::FinancialMath => "matematica-financeira",
            Self::General => "geral",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Arithmetic => "Aritmética",
            Self::LinearAlgebra => "Álgebra Linear",
            Self::QuadraticEquations => "Equações Quadráticas",
            Self::TrigonometricFunctions => "Funções Trigonométricas",
            Self::Logarithms => "Logaritmos",
            Self::Geometry => "Geometria",
            Self::Calculus => "Cálculo",
            Self::Matrices => "Matrizes",
            Self::Statistics => "Estatística",
            Self::Probability => "Probabilidade",
            Self::FinancialMath => "Matemática Financeira",
            Self::General => "Geral",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|c| c.slug() == s)
            .ok_or_else(|| format!("unknown category: '{s}'"))
    }
}

/// Outcome of classifying a problem's raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Winning category (or [`Category::DEFAULT`]).
    pub category: Category,
    /// Score in `[0, 0.95]`; 0.5 for the default fallback.
    pub confidence: f32,
    /// Ordered, deduplicated, at most five tags.
    pub tags: Vec<String>,
    /// Difficulty level in `[1, 5]`.
    pub difficulty_level: u8,
}

impl ClassificationResult {
    /// Whether the classifier fell back to the default category.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.category == Category::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Explanations
// ---------------------------------------------------------------------------

/// One labelled step of a generated explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationStep {
    /// Short step heading.
    pub title: String,
    /// What is being done and why.
    pub explanation: String,
    /// The calculation performed.
    pub calculation: String,
    /// Result of this step.
    pub result: String,
}

/// A machine-parsed step-by-step explanation.
///
/// A degraded explanation (produced after every prompt tier failed the
/// format check) has no steps and carries the raw answer-only text in
/// `final_answer`, behind a notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredExplanation {
    /// Ordered steps.
    pub steps: Vec<ExplanationStep>,
    /// Optional verification block.
    pub verification: Option<String>,
    /// Final answer line.
    pub final_answer: String,
}

impl StructuredExplanation {
    /// Whether this is an answer-only (degraded) explanation.
    #[must_use]
    pub fn is_answer_only(&self) -> bool {
        self.steps.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// A user-visible grouping of problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection ID.
    pub id: CollectionId,
    /// Display name, unique case-insensitively.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Hex color, e.g. `#4F46E5`.
    pub color: String,
    /// Icon name.
    pub icon: String,
    /// Seeded by the system (cannot be renamed or deleted).
    pub is_system: bool,
    /// The fallback collection orphan-risk problems migrate into.
    pub is_default: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Collection {
    /// Whether deleting this collection must be refused.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.is_default || self.is_system
    }
}

/// A collection together with how many problems belong to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSummary {
    /// The collection.
    pub collection: Collection,
    /// Number of member problems.
    pub problem_count: usize,
}

// ---------------------------------------------------------------------------
// Problems
// ---------------------------------------------------------------------------

/// A persisted problem with its classification and explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    /// Problem ID.
    pub id: ProblemId,
    /// Raw problem text as submitted.
    pub text: String,
    /// Classifier output.
    pub classification: ClassificationResult,
    /// Generated explanation, if generation ran.
    pub explanation: Option<StructuredExplanation>,
    /// Whether generation needed more than one prompt tier.
    pub was_retried: bool,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_slug_round_trip() {
        for category in Category::all() {
            let parsed: Category = category.slug().parse().expect("should parse");
            assert_eq!(*category, parsed);
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!("alquimia".parse::<Category>().is_err());
    }

    #[test]
    fn category_serializes_as_kebab_case() {
        let json = serde_json::to_string(&Category::TrigonometricFunctions).expect("serialize");
        assert_eq!(json, "\"trigonometric-functions\"");
    }

    #[test]
    fn answer_only_explanation_has_no_steps() {
        let explanation = StructuredExplanation {
            steps: vec![],
            verification: None,
            final_answer: "x = 4".into(),
        };
        assert!(explanation.is_answer_only());
    }
}
