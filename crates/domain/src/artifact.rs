use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of artifact the assistant panel can ask the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Chat,
    Quiz,
    Flashcards,
    Checklist,
    Summary,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Chat,
        ArtifactKind::Quiz,
        ArtifactKind::Flashcards,
        ArtifactKind::Checklist,
        ArtifactKind::Summary,
    ];

    /// Structured kinds expect a JSON list of records and go through the
    /// malformed-output repair loop. Chat replies and summaries are free text.
    pub fn is_structured(self) -> bool {
        matches!(
            self,
            ArtifactKind::Quiz | ArtifactKind::Flashcards | ArtifactKind::Checklist
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Chat => "chat",
            ArtifactKind::Quiz => "quiz",
            ArtifactKind::Flashcards => "flashcards",
            ArtifactKind::Checklist => "checklist",
            ArtifactKind::Summary => "summary",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(ArtifactKind::Chat),
            "quiz" => Ok(ArtifactKind::Quiz),
            "flashcards" | "flashcard" | "test" => Ok(ArtifactKind::Flashcards),
            "checklist" => Ok(ArtifactKind::Checklist),
            "summary" => Ok(ArtifactKind::Summary),
            other => Err(format!("unknown artifact kind '{other}'")),
        }
    }
}
