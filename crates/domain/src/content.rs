use serde::{Deserialize, Serialize};

/// Conversation role on the model service's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One piece of a conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    /// Base64 payload embedded in the request (captured frames).
    InlineData { mime_type: String, data: String },
    /// Reference to a previously uploaded file.
    FileData { mime_type: String, file_uri: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// A single turn in the `contents` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![Part::text(text)])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }
}

/// A provider-agnostic generation request. The model identifier is not part
/// of the payload: the executor fills it in from the job's current tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationPayload {
    /// Text of the `systemInstruction` block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    /// Ordered conversation turns.
    pub contents: Vec<Turn>,
    /// Ask the service for `application/json` output.
    #[serde(default)]
    pub json_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A fully-resolved request handed to a transport.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub payload: GenerationPayload,
}

/// A `{role, text}` message kept in the slide-scoped conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }

    pub fn to_turn(&self) -> Turn {
        Turn {
            role: self.role,
            parts: vec![Part::text(self.text.clone())],
        }
    }
}
