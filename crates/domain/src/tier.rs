use serde::{Deserialize, Serialize};
use std::fmt;

/// Ranked model capacity levels used by the fallback cascade.
///
/// Ordering follows the cascade direction: `Primary < Secondary < Tertiary`.
/// A job only ever moves forward through this order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    #[default]
    Primary,
    Secondary,
    Tertiary,
}

impl ModelTier {
    /// Every tier in cascade order.
    pub const CASCADE: [ModelTier; 3] = [ModelTier::Primary, ModelTier::Secondary, ModelTier::Tertiary];

    /// The next tier down the cascade, or `None` at the bottom.
    pub fn next(self) -> Option<ModelTier> {
        match self {
            ModelTier::Primary => Some(ModelTier::Secondary),
            ModelTier::Secondary => Some(ModelTier::Tertiary),
            ModelTier::Tertiary => None,
        }
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Primary => "primary",
            ModelTier::Secondary => "secondary",
            ModelTier::Tertiary => "tertiary",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelTier::CASCADE
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown model tier '{s}'"))
    }
}
