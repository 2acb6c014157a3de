//! The canonical conversation model.
//!
//! A `Conversation` is the unit of work and the contract between the
//! extraction layer and the document generators. It is created fresh by a
//! successful strategy, validated by the orchestrator, consumed exactly
//! once by a generator, then dropped; nothing here is ever persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationFailure;
use crate::platform::Platform;

/// Code artifacts shorter than this (after trim) are noise, not content.
pub const MIN_CODE_ARTIFACT_LEN: usize = 10;

/// An extracted conversation, ready for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Generated at extraction time, not derived from the source
    pub id: Uuid,
    pub title: String,
    pub platform: Platform,
    /// Conversational order as it appears in the source
    pub messages: Vec<Message>,
    pub metadata: ConversationMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMetadata {
    pub platform: Platform,
    /// Timestamp of the parse, not of the original chat
    pub extracted_at: DateTime<Utc>,
    pub message_count: usize,
    pub title: String,
    pub source_url: String,
}

/// One turn in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: MessageContent,
    /// Best-effort; extraction time when the source has no timestamp
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Map a source-provided role string onto the closed enum.
    /// Returns `None` for unknown markers so callers can fall back to
    /// the inference heuristic.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Some(Self::User),
            "assistant" | "ai" | "model" | "bot" => Some(Self::Assistant),
            "system" | "tool" => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    /// Cleaned plain-text body
    pub text: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    pub formatting: Formatting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formatting {
    pub is_markdown: bool,
    pub has_code_blocks: bool,
    pub has_links: bool,
    pub has_images: bool,
}

/// Rich content embedded in a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: ArtifactType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Code,
    Image,
    File,
    Link,
}

impl Artifact {
    /// Build a code artifact, discarding snippets below the noise
    /// threshold.
    pub fn code(content: impl Into<String>, language: Option<String>) -> Option<Self> {
        let content = content.into();
        if content.trim().len() < MIN_CODE_ARTIFACT_LEN {
            return None;
        }
        Some(Self {
            kind: ArtifactType::Code,
            content,
            language,
        })
    }

    /// Build a link artifact. Fragments and script pseudo-links are noise.
    pub fn link(href: impl Into<String>) -> Option<Self> {
        let href = href.into();
        if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
            return None;
        }
        Some(Self {
            kind: ArtifactType::Link,
            content: href,
            language: None,
        })
    }

    /// Build an image artifact from a source URL.
    pub fn image(src: impl Into<String>) -> Option<Self> {
        let src = src.into();
        if src.is_empty() || src.starts_with("data:") {
            return None;
        }
        Some(Self {
            kind: ArtifactType::Image,
            content: src,
            language: None,
        })
    }
}

impl Message {
    /// Create a message with a fresh id and the current time as its
    /// timestamp.
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: Uuid::new_v4(),
            role,
            content: MessageContent {
                formatting: Formatting::default(),
                artifacts: Vec::new(),
                text,
            },
            timestamp: Utc::now(),
        }
    }

    pub fn with_artifacts(mut self, artifacts: Vec<Artifact>) -> Self {
        self.content.formatting.has_code_blocks = artifacts
            .iter()
            .any(|a| a.kind == ArtifactType::Code)
            || self.content.formatting.has_code_blocks;
        self.content.formatting.has_links |=
            artifacts.iter().any(|a| a.kind == ArtifactType::Link);
        self.content.formatting.has_images |=
            artifacts.iter().any(|a| a.kind == ArtifactType::Image);
        self.content.artifacts = artifacts;
        self
    }

    pub fn with_formatting(mut self, formatting: Formatting) -> Self {
        self.content.formatting = formatting;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Whether the cleaned body carries any text.
    pub fn has_text(&self) -> bool {
        !self.content.text.trim().is_empty()
    }
}

impl Conversation {
    /// Assemble a conversation from extracted parts. Generates the id and
    /// stamps `extracted_at` with the parse time.
    pub fn new(
        platform: Platform,
        title: impl Into<String>,
        messages: Vec<Message>,
        source_url: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let metadata = ConversationMetadata {
            platform,
            extracted_at: Utc::now(),
            message_count: messages.len(),
            title: title.clone(),
            source_url: source_url.into(),
        };
        Self {
            id: Uuid::new_v4(),
            title,
            platform,
            messages,
            metadata,
        }
    }

    /// The well-formedness contract every accepted result satisfies:
    /// non-empty messages, non-empty title, and no blank-text message.
    pub fn validate(&self) -> std::result::Result<(), ValidationFailure> {
        if self.messages.is_empty() {
            return Err(ValidationFailure::EmptyMessages);
        }
        if self.title.trim().is_empty() {
            return Err(ValidationFailure::EmptyTitle);
        }
        for (index, message) in self.messages.iter().enumerate() {
            if !message.has_text() {
                return Err(ValidationFailure::BlankMessage { index });
            }
        }
        Ok(())
    }
}
