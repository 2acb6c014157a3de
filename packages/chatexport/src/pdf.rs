//! PDF generator.
//!
//! Simple flowed layout over `printpdf` built-in fonts: title header,
//! optional metadata block, role-labeled message sections with
//! word-wrapped body text and monospaced code artifacts. No shaping or
//! kerning; line breaks use an average-glyph-width estimate, which is
//! adequate for transcript export.

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use chatscrape::{ArtifactType, Conversation};

use crate::{filename_for, Document, ExportError, ExportFormat, ExportOptions, Generator};

const MARGIN_MM: f32 = 15.0;
const PT_TO_MM: f32 = 0.352_778;
/// Average glyph width as a fraction of the font size, for Helvetica.
const AVG_GLYPH_FRACTION: f32 = 0.5;

pub struct PdfGenerator;

impl Generator for PdfGenerator {
    fn format(&self) -> ExportFormat {
        ExportFormat::Pdf
    }

    fn generate(
        &self,
        conversation: &Conversation,
        options: &ExportOptions,
    ) -> Result<Document, ExportError> {
        let (width, height) = options.page_size.dimensions_mm();
        let (doc, page, layer) =
            PdfDocument::new(&conversation.title, Mm(width), Mm(height), "content");

        let body_font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
        let bold_font = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
        let code_font = doc
            .add_builtin_font(BuiltinFont::Courier)
            .map_err(|e| ExportError::Pdf(e.to_string()))?;

        let body_size = f32::from(options.font_size);
        let mut writer = FlowWriter {
            layer: doc.get_page(page).get_layer(layer),
            width,
            height,
            y: height - MARGIN_MM,
        };

        writer.line(&doc, &conversation.title, &bold_font, body_size + 4.0);
        writer.gap(body_size);

        if options.include_metadata {
            for line in [
                format!("Platform: {}", conversation.platform.display_name()),
                format!("Source: {}", conversation.metadata.source_url),
                format!(
                    "Exported: {}",
                    conversation.metadata.extracted_at.format("%Y-%m-%d %H:%M UTC")
                ),
                format!("Messages: {}", conversation.metadata.message_count),
            ] {
                writer.wrapped(&doc, &line, &body_font, body_size - 2.0);
            }
            writer.gap(body_size);
        }

        for message in &conversation.messages {
            let label = if options.include_timestamps {
                format!(
                    "{} - {}",
                    message.role.as_str().to_uppercase(),
                    message.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                )
            } else {
                message.role.as_str().to_uppercase()
            };
            writer.line(&doc, &label, &bold_font, body_size);

            for paragraph in message.content.text.split('\n') {
                writer.wrapped(&doc, paragraph, &body_font, body_size);
            }

            if options.include_artifacts {
                for artifact in &message.content.artifacts {
                    match artifact.kind {
                        ArtifactType::Code => {
                            writer.gap(body_size / 2.0);
                            for code_line in artifact.content.lines() {
                                writer.wrapped(&doc, code_line, &code_font, body_size - 2.0);
                            }
                            writer.gap(body_size / 2.0);
                        }
                        _ => {
                            writer.wrapped(
                                &doc,
                                &format!("[{:?}: {}]", artifact.kind, artifact.content),
                                &body_font,
                                body_size - 2.0,
                            );
                        }
                    }
                }
            }
            writer.gap(body_size);
        }

        drop(writer);
        let bytes = doc
            .save_to_bytes()
            .map_err(|e| ExportError::Pdf(e.to_string()))?;

        Ok(Document {
            bytes,
            mime_type: self.format().mime_type(),
            filename: filename_for(conversation, self.format()),
        })
    }
}

/// Cursor-based text flow with automatic page breaks.
struct FlowWriter {
    layer: PdfLayerReference,
    width: f32,
    height: f32,
    y: f32,
}

impl FlowWriter {
    fn line_height(font_size: f32) -> f32 {
        font_size * 1.4 * PT_TO_MM
    }

    fn advance(&mut self, doc: &PdfDocumentReference, font_size: f32) {
        self.y -= Self::line_height(font_size);
        if self.y < MARGIN_MM {
            let (page, layer) = doc.add_page(Mm(self.width), Mm(self.height), "content");
            self.layer = doc.get_page(page).get_layer(layer);
            self.y = self.height - MARGIN_MM;
        }
    }

    /// Emit a single, unwrapped line.
    fn line(&mut self, doc: &PdfDocumentReference, text: &str, font: &IndirectFontRef, size: f32) {
        self.layer
            .use_text(text, size, Mm(MARGIN_MM), Mm(self.y), font);
        self.advance(doc, size);
    }

    /// Emit word-wrapped text.
    fn wrapped(&mut self, doc: &PdfDocumentReference, text: &str, font: &IndirectFontRef, size: f32) {
        let usable_mm = self.width - 2.0 * MARGIN_MM;
        let glyph_mm = size * AVG_GLYPH_FRACTION * PT_TO_MM;
        let max_chars = ((usable_mm / glyph_mm) as usize).max(16);

        for line in wrap_text(text, max_chars) {
            self.line(doc, &line, font, size);
        }
    }

    /// Vertical whitespace without a page-break check worth of text.
    fn gap(&mut self, font_size: f32) {
        self.y -= Self::line_height(font_size) / 2.0;
    }
}

/// Greedy word wrap; words longer than the budget are hard-split.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![String::new()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }

        if word.chars().count() > max_chars {
            // Hard-split a word that cannot fit on any line.
            let mut chunk = String::new();
            for c in word.chars() {
                chunk.push(c);
                if chunk.chars().count() == max_chars {
                    lines.push(std::mem::take(&mut chunk));
                }
            }
            current = chunk;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
