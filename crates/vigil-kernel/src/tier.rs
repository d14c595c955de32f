//! Quantization tier identifiers

use serde::{Deserialize, Serialize};
use std::fmt;

/// One discrete point on the quantization ladder, e.g. `q4_0` or `f16`.
///
/// Tiers are plain identifiers; their order is owned by the ladder that
/// contains them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuantizationTier(String);

impl QuantizationTier {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuantizationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuantizationTier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for QuantizationTier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for QuantizationTier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
