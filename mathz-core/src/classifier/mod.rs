//! Deterministic keyword/structure classifier for math problem text.
//!
//! The classifier is a pure function of its input: no I/O, no interior
//! mutability, no per-request state. Repeated inputs are memoized by
//! [`crate::cache::CachedClassifier`], which wraps a `Classifier` rather
//! than living inside it.
//!
//! Per category:
//!
//! ```text
//! raw   = keyword_hits·1 + symbol_hits·0.5 + structural_hits·2
//! score = raw / rule_count · base_confidence
//! ```
//!
//! The best score wins unless it is below `min_score`, in which case the
//! default category is returned at `default_confidence`. Reported
//! confidence is capped at `max_confidence` since matching is lexical,
//! not semantic.

pub mod markers;
pub mod patterns;

use tracing::trace;

use crate::config::ClassifierConfig;
use crate::error::Result;
use crate::types::{Category, ClassificationResult};

use markers::StructuralCues;
use patterns::{CategoryPattern, CompiledPattern};

/// Lowercase the text and fold Portuguese diacritics to ASCII letters.
///
/// Symbols (`°`, `²`, `π`, …) are left untouched.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// Score of one category for a given text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryScore {
    /// The category.
    pub category: Category,
    /// Final (normalized, weighted) score.
    pub score: f32,
}

/// The problem classifier. Construct once, share freely (`Send + Sync`).
#[derive(Debug, Clone)]
pub struct Classifier {
    patterns: Vec<CompiledPattern>,
    cues: StructuralCues,
    config: ClassifierConfig,
}

impl Classifier {
    /// Build a classifier over the built-in pattern table.
    ///
    /// # Errors
    /// Returns `MathzError::Config` if a pattern fails to compile or the
    /// config is out of bounds.
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        Self::with_patterns(&patterns::builtin_patterns(), config)
    }

    /// Build a classifier over a custom pattern table.
    ///
    /// # Errors
    /// Returns `MathzError::Config` if a keyword or rule fails to compile,
    /// or if `config` loosens the tag, confidence or threshold bounds.
    pub fn with_patterns(patterns: &[CategoryPattern], config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;
        let patterns = patterns
            .iter()
            .map(CompiledPattern::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            patterns,
            cues: StructuralCues::new()?,
            config: config.clone(),
        })
    }

    /// Classify raw problem text. Never fails.
    #[must_use]
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let normalized = normalize(text);

        let best = self
            .scores_normalized(&normalized)
            .into_iter()
            .fold(None::<CategoryScore>, |best, candidate| match best {
                Some(b) if b.score >= candidate.score => Some(b),
                _ => Some(candidate),
            });

        let (category, confidence) = match best {
            Some(b) if b.score >= self.config.min_score => {
                (b.category, b.score.min(self.config.max_confidence))
            }
            _ => (Category::DEFAULT, self.config.default_confidence),
        };

        let cues = self.cues.detect(&normalized);
        let tags = self.build_tags(category, &cues);
        let difficulty_level = cues.difficulty();

        trace!(
            category = %category,
            confidence,
            difficulty = difficulty_level,
            "Classified problem text"
        );

        ClassificationResult {
            category,
            confidence,
            tags,
            difficulty_level,
        }
    }

    /// Per-category scores for raw text, in pattern-table order.
    #[must_use]
    pub fn scores(&self, text: &str) -> Vec<CategoryScore> {
        self.scores_normalized(&normalize(text))
    }

    fn scores_normalized(&self, normalized: &str) -> Vec<CategoryScore> {
        self.patterns
            .iter()
            .map(|p| CategoryScore {
                category: p.category,
                score: p.score(normalized),
            })
            .collect()
    }

    /// Category slug first, then markers; deduplicated and capped.
    fn build_tags(&self, category: Category, cues: &markers::CueSet) -> Vec<String> {
        let mut tags: Vec<String> = Vec::with_capacity(self.config.max_tags);
        let candidates = std::iter::once(category.slug()).chain(cues.tag_markers());
        for tag in candidates {
            if tags.len() >= self.config.max_tags {
                break;
            }
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        }
        tags
    }
}
