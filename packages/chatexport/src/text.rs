//! Plain-text transcript generator.

use chatscrape::{ArtifactType, Conversation};

use crate::{filename_for, Document, ExportError, ExportFormat, ExportOptions, Generator};

pub struct TextGenerator;

impl Generator for TextGenerator {
    fn format(&self) -> ExportFormat {
        ExportFormat::Text
    }

    fn generate(
        &self,
        conversation: &Conversation,
        options: &ExportOptions,
    ) -> Result<Document, ExportError> {
        let mut out = String::new();

        out.push_str(&conversation.title);
        out.push('\n');
        out.push_str(&"=".repeat(conversation.title.chars().count().max(8)));
        out.push_str("\n\n");

        if options.include_metadata {
            out.push_str(&format!(
                "Platform: {}\nSource: {}\nExported: {}\n\n",
                conversation.platform.display_name(),
                conversation.metadata.source_url,
                conversation.metadata.extracted_at.format("%Y-%m-%d %H:%M UTC"),
            ));
        }

        for message in &conversation.messages {
            let label = message.role.as_str().to_uppercase();
            if options.include_timestamps {
                out.push_str(&format!(
                    "[{}] {}\n",
                    label,
                    message.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                ));
            } else {
                out.push_str(&format!("[{}]\n", label));
            }
            out.push_str(&message.content.text);
            out.push('\n');

            if options.include_artifacts {
                for artifact in &message.content.artifacts {
                    match artifact.kind {
                        ArtifactType::Code => {
                            out.push_str(&format!(
                                "\n--- code{} ---\n{}\n--- end code ---\n",
                                artifact
                                    .language
                                    .as_deref()
                                    .map(|l| format!(" ({l})"))
                                    .unwrap_or_default(),
                                artifact.content.trim_end(),
                            ));
                        }
                        ArtifactType::Link => {
                            out.push_str(&format!("  link: {}\n", artifact.content));
                        }
                        ArtifactType::Image => {
                            out.push_str(&format!("  image: {}\n", artifact.content));
                        }
                        ArtifactType::File => {
                            out.push_str(&format!("  file: {}\n", artifact.content));
                        }
                    }
                }
            }
            out.push('\n');
        }

        Ok(Document {
            bytes: out.into_bytes(),
            mime_type: self.format().mime_type(),
            filename: filename_for(conversation, self.format()),
        })
    }
}
