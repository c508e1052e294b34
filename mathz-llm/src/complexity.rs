//! Complexity detection from raw problem text.
//!
//! ```text
//! calculus / trig / log / matrix cue           → Complex
//! one operator, no variable                    → Simple
//! one variable in an equation, no exponent     → Simple
//! anything else                                → Medium
//! ```
//!
//! Independent of the classifier's category: a problem filed under
//! geometry can still be complex if it asks for a sine.

use std::collections::BTreeSet;

use mathz_core::classifier::markers::StructuralCues;
use mathz_core::classifier::normalize;
use regex::Regex;

use crate::error::{LlmError, Result};
use crate::types::Complexity;

const OPERATORS: &[char] = &['+', '-', '*', '/', '×', '÷', '^'];

/// Detector holding its compiled cue regexes.
#[derive(Debug, Clone)]
pub struct ComplexityDetector {
    cues: StructuralCues,
    variable: Regex,
}

impl ComplexityDetector {
    /// Compile the detector.
    ///
    /// # Errors
    /// Returns `LlmError::Config` if a built-in regex fails to compile.
    pub fn new() -> Result<Self> {
        let variable = Regex::new(r"\d([a-z])\b|\b([a-z])\s*[-+*/=^²)]|[-+*/=(]\s*([a-z])\b")
            .map_err(|e| LlmError::Config(e.to_string()))?;
        Ok(Self {
            cues: StructuralCues::new()?,
            variable,
        })
    }

    /// Pick the explanation tier for a problem.
    #[must_use]
    pub fn detect_complexity(&self, text: &str) -> Complexity {
        let normalized = normalize(text);
        let cues = self.cues.detect(&normalized);

        if cues.calculus
            || cues.trig_call
            || cues.trig_word
            || cues.log_call
            || cues.log_word
            || cues.matrix
        {
            return Complexity::Complex;
        }
        if cues.system || cues.exponent || cues.radical {
            return Complexity::Medium;
        }

        let variables = self.variables(&normalized);
        let operators = normalized.chars().filter(|c| OPERATORS.contains(c)).count();

        if variables.is_empty() && operators == 1 {
            Complexity::Simple
        } else if variables.len() == 1 && normalized.contains('=') {
            Complexity::Simple
        } else {
            Complexity::Medium
        }
    }

    fn variables(&self, normalized: &str) -> BTreeSet<char> {
        self.variable
            .captures_iter(normalized)
            .filter_map(|caps| {
                (1..=3)
                    .find_map(|i| caps.get(i))
                    .and_then(|m| m.as_str().chars().next())
            })
            .collect()
    }
}
