//! Slide group bookkeeping and context scoping.

use lq_domain::config::SlidesConfig;
use lq_domain::content::ChatMessage;
use lq_domain::trace::TraceEvent;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::capture::{read_slide_text, FrameCapture, TextExtractor};
use crate::similarity::subset_similarity;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Slide group
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One distinct slide and the conversation held while it was on screen.
#[derive(Debug, Clone, Serialize)]
pub struct SlideGroup {
    id: String,
    fingerprint_text: String,
    messages: Vec<ChatMessage>,
}

impl SlideGroup {
    fn new(text: &str) -> Self {
        Self {
            id: group_id(text),
            fingerprint_text: text.to_string(),
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fingerprint_text(&self) -> &str {
        &self.fingerprint_text
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// `slide_` plus a SHA-256 prefix of the text; random when there is no text.
fn group_id(text: &str) -> String {
    if text.trim().is_empty() {
        return format!("slide_{}", uuid::Uuid::new_v4().simple());
    }
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("slide_{}", &digest[..16])
}

/// Result of matching slide text against the known groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub group_id: String,
    /// Best similarity found (0 when a group was created from nothing).
    pub similarity: f64,
    /// The current group differs from the one before this call.
    pub changed: bool,
    /// A new group was created for this text.
    pub created: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns the slide groups, the current-group pointer and the unscoped
/// conversation history.
pub struct SlideGroupEngine {
    config: SlidesConfig,
    groups: Vec<SlideGroup>,
    current: Option<usize>,
    history: Vec<ChatMessage>,
}

impl SlideGroupEngine {
    pub fn new(config: SlidesConfig) -> Self {
        Self {
            config,
            groups: Vec::new(),
            current: None,
            history: Vec::new(),
        }
    }

    pub fn config(&self) -> &SlidesConfig {
        &self.config
    }

    pub fn groups(&self) -> &[SlideGroup] {
        &self.groups
    }

    pub fn current_group(&self) -> Option<&SlideGroup> {
        self.current.and_then(|i| self.groups.get(i))
    }

    pub fn group(&self, id: &str) -> Option<&SlideGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// The whole conversation, across slides.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Capture the current frame, OCR it and classify the text.
    ///
    /// Without a frame, or when capture or OCR fails, the current group is
    /// kept; when there is none yet a group is created from empty text.
    pub async fn classify(
        &mut self,
        capture: &dyn FrameCapture,
        extractor: &dyn TextExtractor,
    ) -> Classification {
        match read_slide_text(capture, extractor).await {
            Ok(text) => self.observe(text.as_ref().map(|(_, text)| text.as_str())),
            Err(e) => {
                tracing::warn!(error = %e, "slide text unavailable, keeping current group");
                self.observe(None)
            }
        }
    }

    /// Classify already-extracted slide text; `None` means no frame was
    /// available.
    pub fn observe(&mut self, text: Option<&str>) -> Classification {
        match text {
            Some(text) => self.classify_text(text),
            None => self.keep_current(),
        }
    }

    /// Assign `text` to the best-matching group, creating one when no group
    /// reaches the similarity threshold.
    pub fn classify_text(&mut self, text: &str) -> Classification {
        let previous = self.current_group().map(|g| g.id.clone());

        let mut best: Option<(usize, f64)> = None;
        for (i, group) in self.groups.iter().enumerate() {
            let score = subset_similarity(text, &group.fingerprint_text);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((i, score));
            }
        }

        let (index, similarity, created) = match best {
            Some((i, score)) if score >= self.config.similarity_threshold => (i, score, false),
            other => {
                let score = other.map_or(0.0, |(_, s)| s);
                (self.create_group(text), score, true)
            }
        };

        self.current = Some(index);
        let group_id = self.groups[index].id.clone();
        let changed = previous.as_deref() != Some(group_id.as_str());

        TraceEvent::SlideClassified {
            group_id: group_id.clone(),
            similarity,
            changed,
            created,
        }
        .emit();
        if changed {
            tracing::info!(group_id = %group_id, similarity, created, "slide changed");
        }

        Classification {
            group_id,
            similarity,
            changed,
            created,
        }
    }

    fn keep_current(&mut self) -> Classification {
        match self.current_group() {
            Some(group) => Classification {
                group_id: group.id.clone(),
                similarity: 0.0,
                changed: false,
                created: false,
            },
            None => self.classify_text(""),
        }
    }

    fn create_group(&mut self, text: &str) -> usize {
        let mut group = SlideGroup::new(text);
        // Equal texts always match, so only a random id can clash.
        while self.groups.iter().any(|g| g.id == group.id) {
            group.id = format!("slide_{}", uuid::Uuid::new_v4().simple());
        }
        tracing::debug!(group_id = %group.id, "created slide group");
        self.groups.push(group);
        self.groups.len() - 1
    }

    /// Record one chat exchange in the global history and, when given, the
    /// slide group it was asked under.
    ///
    /// Returns `false` when no group received the exchange.
    pub fn record_exchange(&mut self, group_id: Option<&str>, user: &str, model: &str) -> bool {
        let user = ChatMessage::user(user);
        let model = ChatMessage::model(model);
        self.history.push(user.clone());
        self.history.push(model.clone());

        let Some(group_id) = group_id else {
            return false;
        };
        match self.groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => {
                group.messages.push(user);
                group.messages.push(model);
                true
            }
            None => {
                tracing::warn!(group_id, "exchange recorded for unknown slide group");
                false
            }
        }
    }

    /// Context to attach to the next chat request.
    ///
    /// Scoped: the current group's most recent messages. Unscoped, or with no
    /// current group: the tail of the whole conversation.
    pub fn context_messages(&self, scoped: bool) -> Vec<ChatMessage> {
        match (scoped, self.current_group()) {
            (true, Some(group)) => tail(&group.messages, self.config.scoped_context_messages),
            _ => tail(&self.history, self.config.unscoped_context_messages),
        }
    }

    /// Drop every group and the whole conversation.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.current = None;
        self.history.clear();
        tracing::info!("conversation cleared");
    }
}

fn tail(messages: &[ChatMessage], n: usize) -> Vec<ChatMessage> {
    let start = messages.len().saturating_sub(n);
    messages[start..].to_vec()
}
