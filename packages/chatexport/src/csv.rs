//! CSV generator.
//!
//! One row per message. Quoting and escaping follow RFC 4180 via the
//! `csv` crate: fields containing commas or quotes are wrapped in double
//! quotes with internal quotes doubled.

use chatscrape::{ArtifactType, Conversation};

use crate::{filename_for, Document, ExportError, ExportFormat, ExportOptions, Generator};

pub struct CsvGenerator;

impl Generator for CsvGenerator {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn generate(
        &self,
        conversation: &Conversation,
        options: &ExportOptions,
    ) -> Result<Document, ExportError> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header: Vec<&str> = vec!["index", "role"];
        if options.include_timestamps {
            header.push("timestamp");
        }
        header.push("text");
        if options.include_artifacts {
            header.push("artifacts");
        }
        writer
            .write_record(&header)
            .map_err(|e| ExportError::Csv(e.to_string()))?;

        for (index, message) in conversation.messages.iter().enumerate() {
            let mut row: Vec<String> = vec![(index + 1).to_string(), message.role.to_string()];
            if options.include_timestamps {
                row.push(message.timestamp.to_rfc3339());
            }
            row.push(message.content.text.clone());
            if options.include_artifacts {
                row.push(artifact_summary(message));
            }
            writer
                .write_record(&row)
                .map_err(|e| ExportError::Csv(e.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| ExportError::Csv(e.to_string()))?;

        Ok(Document {
            bytes,
            mime_type: self.format().mime_type(),
            filename: filename_for(conversation, self.format()),
        })
    }
}

/// Compact artifact description, e.g. "code(javascript); link".
fn artifact_summary(message: &chatscrape::Message) -> String {
    message
        .content
        .artifacts
        .iter()
        .map(|a| match (a.kind, &a.language) {
            (ArtifactType::Code, Some(lang)) => format!("code({lang})"),
            (ArtifactType::Code, None) => "code".to_string(),
            (ArtifactType::Link, _) => "link".to_string(),
            (ArtifactType::Image, _) => "image".to_string(),
            (ArtifactType::File, _) => "file".to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatscrape::testing::sample_conversation;
    use chatscrape::{Message, MessageRole, Platform};

    #[test]
    fn commas_and_quotes_are_escaped_per_rfc_4180() {
        let mut conversation = sample_conversation(Platform::ChatGpt);
        conversation.messages = vec![Message::new(
            MessageRole::User,
            "Hello, she said \"try hooks\" yesterday",
        )];

        let doc = CsvGenerator
            .generate(&conversation, &ExportOptions::default())
            .unwrap();
        let csv_text = String::from_utf8(doc.bytes).unwrap();

        assert!(
            csv_text.contains("\"Hello, she said \"\"try hooks\"\" yesterday\""),
            "got: {csv_text}"
        );
    }

    #[test]
    fn header_tracks_options() {
        let conversation = sample_conversation(Platform::ChatGpt);

        let full = CsvGenerator
            .generate(&conversation, &ExportOptions::default())
            .unwrap();
        let full_text = String::from_utf8(full.bytes).unwrap();
        assert!(full_text.starts_with("index,role,timestamp,text,artifacts"));

        let minimal = CsvGenerator
            .generate(
                &conversation,
                &ExportOptions {
                    include_timestamps: false,
                    include_artifacts: false,
                    ..ExportOptions::default()
                },
            )
            .unwrap();
        let minimal_text = String::from_utf8(minimal.bytes).unwrap();
        assert!(minimal_text.starts_with("index,role,text"));
    }

    #[test]
    fn one_row_per_message_in_order() {
        let conversation = sample_conversation(Platform::ChatGpt);
        let doc = CsvGenerator
            .generate(&conversation, &ExportOptions::default())
            .unwrap();
        let text = String::from_utf8(doc.bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3, "header plus two messages");
        assert!(lines[1].starts_with("1,user"));
        assert!(lines[2].starts_with("2,assistant"));
    }

    #[test]
    fn round_trip_parses_back() {
        let conversation = sample_conversation(Platform::ChatGpt);
        let doc = CsvGenerator
            .generate(&conversation, &ExportOptions::default())
            .unwrap();

        let mut reader = csv::Reader::from_reader(doc.bytes.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), conversation.messages.len());
        assert_eq!(&rows[0][1], "user");
        assert_eq!(&rows[0][3], conversation.messages[0].content.text.as_str());
    }
}
