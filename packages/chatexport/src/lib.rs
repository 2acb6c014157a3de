//! Document generators for extracted conversations.
//!
//! Every generator consumes a finished [`chatscrape::Conversation`] and
//! nothing else from the extraction layer; `ExportOptions` affect
//! rendering only. The JSON encoding is the canonical lossless one:
//! parsing a generated JSON document reconstructs the conversation
//! field for field.

use thiserror::Error;
use tracing::debug;

use chatscrape::Conversation;

pub mod csv;
pub mod json;
pub mod markdown;
pub mod options;
pub mod pdf;
pub mod text;

pub use crate::csv::CsvGenerator;
pub use json::JsonGenerator;
pub use markdown::MarkdownGenerator;
pub use options::{ExportOptions, PageSize};
pub use pdf::PdfGenerator;
pub use text::TextGenerator;

/// The supported output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Markdown,
    Json,
    Csv,
    Text,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Pdf,
        ExportFormat::Markdown,
        ExportFormat::Json,
        ExportFormat::Csv,
        ExportFormat::Text,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "txt",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Markdown => "text/markdown",
            Self::Json => "application/json",
            Self::Csv => "text/csv",
            Self::Text => "text/plain",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "md" | "markdown" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "txt" | "text" => Ok(Self::Text),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// A rendered document ready to hand to the caller.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub filename: String,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unknown export format: {0}")]
    UnknownFormat(String),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(String),

    #[error("PDF rendering failed: {0}")]
    Pdf(String),
}

/// One output encoding.
pub trait Generator {
    fn format(&self) -> ExportFormat;

    fn generate(
        &self,
        conversation: &Conversation,
        options: &ExportOptions,
    ) -> Result<Document, ExportError>;
}

/// Render a conversation in the requested format.
pub fn generate(
    format: ExportFormat,
    conversation: &Conversation,
    options: &ExportOptions,
) -> Result<Document, ExportError> {
    debug!(format = ?format, messages = conversation.messages.len(), "generating document");
    match format {
        ExportFormat::Pdf => PdfGenerator.generate(conversation, options),
        ExportFormat::Markdown => MarkdownGenerator.generate(conversation, options),
        ExportFormat::Json => JsonGenerator.generate(conversation, options),
        ExportFormat::Csv => CsvGenerator.generate(conversation, options),
        ExportFormat::Text => TextGenerator.generate(conversation, options),
    }
}

/// Derive a safe filename from the conversation title.
pub(crate) fn filename_for(conversation: &Conversation, format: ExportFormat) -> String {
    let slug: String = conversation
        .title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug.trim_matches('-').to_string();

    let mut collapsed = String::with_capacity(slug.len());
    let mut last_dash = false;
    for c in slug.chars() {
        if c == '-' {
            if !last_dash {
                collapsed.push(c);
            }
            last_dash = true;
        } else {
            collapsed.push(c);
            last_dash = false;
        }
    }

    let base = if collapsed.is_empty() {
        "conversation".to_string()
    } else {
        collapsed
    };
    format!("{}.{}", base, format.extension())
}
