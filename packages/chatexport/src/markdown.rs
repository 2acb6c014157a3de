//! Markdown generator.

use chatscrape::{ArtifactType, Conversation};

use crate::{filename_for, Document, ExportError, ExportFormat, ExportOptions, Generator};

pub struct MarkdownGenerator;

impl Generator for MarkdownGenerator {
    fn format(&self) -> ExportFormat {
        ExportFormat::Markdown
    }

    fn generate(
        &self,
        conversation: &Conversation,
        options: &ExportOptions,
    ) -> Result<Document, ExportError> {
        let mut out = String::new();

        out.push_str(&format!("# {}\n\n", conversation.title));

        if options.include_metadata {
            out.push_str(&format!(
                "> **Platform:** {}  \n> **Source:** {}  \n> **Exported:** {}  \n> **Messages:** {}\n\n",
                conversation.platform.display_name(),
                conversation.metadata.source_url,
                conversation.metadata.extracted_at.format("%Y-%m-%d %H:%M UTC"),
                conversation.metadata.message_count,
            ));
        }

        for message in &conversation.messages {
            out.push_str(&format!("## {}\n\n", role_label(message.role)));
            if options.include_timestamps {
                out.push_str(&format!(
                    "*{}*\n\n",
                    message.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                ));
            }
            out.push_str(&message.content.text);
            out.push_str("\n\n");

            if options.include_artifacts {
                for artifact in &message.content.artifacts {
                    match artifact.kind {
                        ArtifactType::Code => {
                            out.push_str(&format!(
                                "```{}\n{}\n```\n\n",
                                artifact.language.as_deref().unwrap_or_default(),
                                artifact.content.trim_end(),
                            ));
                        }
                        ArtifactType::Link => {
                            out.push_str(&format!("- [link]({})\n", artifact.content));
                        }
                        ArtifactType::Image => {
                            out.push_str(&format!("![image]({})\n", artifact.content));
                        }
                        ArtifactType::File => {
                            out.push_str(&format!("- file: {}\n", artifact.content));
                        }
                    }
                }
                if message
                    .content
                    .artifacts
                    .iter()
                    .any(|a| a.kind != ArtifactType::Code)
                {
                    out.push('\n');
                }
            }
        }

        Ok(Document {
            bytes: out.into_bytes(),
            mime_type: self.format().mime_type(),
            filename: filename_for(conversation, self.format()),
        })
    }
}

fn role_label(role: chatscrape::MessageRole) -> &'static str {
    match role {
        chatscrape::MessageRole::User => "User",
        chatscrape::MessageRole::Assistant => "Assistant",
        chatscrape::MessageRole::System => "System",
    }
}
