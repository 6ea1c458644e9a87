use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slide grouping + chat context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidesConfig {
    /// Subset similarity (percent) at or above which a frame joins an
    /// existing slide group.
    #[serde(default = "d_50")]
    pub similarity_threshold: f64,
    /// Attach only the current slide's history to chat requests.
    #[serde(default = "d_true")]
    pub slide_scoped: bool,
    /// Messages of the current slide group attached when scoped.
    #[serde(default = "d_10")]
    pub scoped_context_messages: usize,
    /// Messages of the whole conversation attached when unscoped.
    #[serde(default = "d_20")]
    pub unscoped_context_messages: usize,
}

impl Default for SlidesConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: d_50(),
            slide_scoped: d_true(),
            scoped_context_messages: d_10(),
            unscoped_context_messages: d_20(),
        }
    }
}

fn d_50() -> f64 {
    50.0
}
fn d_true() -> bool {
    true
}
fn d_10() -> usize {
    10
}
fn d_20() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SlidesConfig::default();
        assert!((cfg.similarity_threshold - 50.0).abs() < f64::EPSILON);
        assert!(cfg.slide_scoped);
        assert_eq!(cfg.scoped_context_messages, 10);
        assert_eq!(cfg.unscoped_context_messages, 20);
    }
}
