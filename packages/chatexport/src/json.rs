//! JSON generator: the canonical lossless encoding.
//!
//! The full conversation value is serialized as-is, so parsing the
//! output reconstructs an equal `Conversation`. Cosmetic options do not
//! apply here; a lossy JSON export would silently break round-trips.

use chatscrape::Conversation;

use crate::{filename_for, Document, ExportError, ExportFormat, ExportOptions, Generator};

pub struct JsonGenerator;

impl Generator for JsonGenerator {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }

    fn generate(
        &self,
        conversation: &Conversation,
        _options: &ExportOptions,
    ) -> Result<Document, ExportError> {
        let bytes = serde_json::to_vec_pretty(conversation)?;
        Ok(Document {
            bytes,
            mime_type: self.format().mime_type(),
            filename: filename_for(conversation, self.format()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatscrape::testing::sample_conversation;
    use chatscrape::{Conversation, Platform};

    #[test]
    fn json_round_trip_reconstructs_the_conversation() {
        let conversation = sample_conversation(Platform::Claude);
        let doc = JsonGenerator
            .generate(&conversation, &ExportOptions::default())
            .unwrap();

        let parsed: Conversation = serde_json::from_slice(&doc.bytes).unwrap();
        assert_eq!(parsed, conversation);
    }

    #[test]
    fn output_is_camel_cased() {
        let conversation = sample_conversation(Platform::ChatGpt);
        let doc = JsonGenerator
            .generate(&conversation, &ExportOptions::default())
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&doc.bytes).unwrap();
        assert!(value["metadata"]["sourceUrl"].is_string());
        assert!(value["metadata"]["extractedAt"].is_string());
        assert_eq!(value["platform"], "chatgpt");
    }
}
