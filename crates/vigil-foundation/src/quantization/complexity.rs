//! Content complexity heuristic.
//!
//! Scores text in `[0, 1]` from three signals: length, presence of technical
//! vocabulary and density of code/math punctuation.

use serde::{Deserialize, Serialize};

const TECHNICAL_TERMS: &[&str] = &[
    "algorithm",
    "function",
    "variable",
    "module",
    "tensor",
    "derivative",
    "integral",
    "matrix",
    "vector",
    "quantum",
    "regression",
    "neural network",
    "transformer",
    "attention",
    "parameter",
    "coefficient",
    "theorem",
    "equation",
];

const SPECIAL_CHARS: &str = "{}[]()<>+-*/\\=^;:";

const LENGTH_CAP: f64 = 10_000.0;
const TERM_CAP: f64 = 10.0;
const SPECIAL_CAP: f64 = 100.0;

/// Complexity estimate with its component factors, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    pub score: f64,
    pub length_factor: f64,
    pub term_factor: f64,
    pub special_factor: f64,
}

impl ComplexityScore {
    pub fn value(&self) -> f64 {
        self.score
    }
}

/// Estimate how demanding `text` is for the model.
pub fn estimate(text: &str) -> ComplexityScore {
    let length = text.chars().count() as f64;
    let length_factor = (length / LENGTH_CAP).min(1.0);

    let lowered = text.to_lowercase();
    let terms = TECHNICAL_TERMS
        .iter()
        .filter(|term| lowered.contains(*term))
        .count() as f64;
    let term_factor = (terms / TERM_CAP).min(1.0);

    let specials = text.chars().filter(|c| SPECIAL_CHARS.contains(*c)).count() as f64;
    let special_factor = (specials / SPECIAL_CAP).min(1.0);

    let score = 0.4 * length_factor + 0.4 * term_factor + 0.2 * special_factor;
    tracing::debug!(
        score = format_args!("{score:.2}"),
        length = format_args!("{length_factor:.2}"),
        terms = format_args!("{term_factor:.2}"),
        special = format_args!("{special_factor:.2}"),
        "content complexity"
    );

    ComplexityScore {
        score,
        length_factor,
        term_factor,
        special_factor,
    }
}
