//! Per-run transpiler settings.

use serde::Deserialize;

/// What to do with a match that does not cover every variant combination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustivenessMode {
    /// Fail the file.
    #[default]
    Error,
    /// Report a warning and leave the switch as written.
    Warn,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TranspileConfig {
    pub exhaustiveness: ExhaustivenessMode,
    /// Largest tuple a `match` may destructure.
    pub max_match_arity: usize,
    /// Leaf visits the exhaustiveness checker may spend on one match.
    pub combination_ceiling: usize,
    /// Consult the declaration-scan type oracle before falling back to heuristics.
    pub type_oracle: bool,
    /// Append `default: panic(..)` to exhaustive matches without a catch-all arm.
    pub unreachable_default: bool,
}

impl Default for TranspileConfig {
    fn default() -> Self {
        Self {
            exhaustiveness: ExhaustivenessMode::Error,
            max_match_arity: 6,
            combination_ceiling: 1024,
            type_oracle: true,
            unreachable_default: true,
        }
    }
}
