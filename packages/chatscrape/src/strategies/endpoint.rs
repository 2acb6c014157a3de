//! Structured-endpoint strategy: probe backend data routes.
//!
//! Given the opaque share id, probe a small set of known or guessed
//! structured-data endpoints. A structured (non-HTML) response maps
//! directly onto the data model with no text-cleaning guesswork, which
//! makes a hit here higher-confidence than any markup parse. The routes
//! are undocumented and liable to vanish: the whole strategy is
//! best-effort and never load-bearing for correctness.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{StrategyError, StrategyResult};
use crate::heuristics;
use crate::platform::Platform;
use crate::strategies::{ExtractionContext, Strategy, StrategyKind};
use crate::types::{Artifact, Conversation, Formatting, Message, MessageRole};

pub struct StructuredEndpointStrategy;

impl StructuredEndpointStrategy {
    pub fn new() -> Self {
        Self
    }

    /// Candidate endpoints for a platform, in probe order.
    fn endpoints(platform: Platform, share_id: &str) -> Vec<String> {
        match platform {
            Platform::ChatGpt => vec![
                format!("https://chatgpt.com/backend-api/share/{share_id}"),
                format!("https://chat.openai.com/backend-api/share/{share_id}"),
            ],
            Platform::Claude => vec![format!(
                "https://claude.ai/api/chat_snapshots/{share_id}"
            )],
            // No structured share routes are known for these platforms.
            Platform::Gemini | Platform::Perplexity => Vec::new(),
        }
    }
}

impl Default for StructuredEndpointStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Strategy for StructuredEndpointStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StructuredEndpoint
    }

    async fn attempt(&self, ctx: &mut ExtractionContext) -> StrategyResult<Conversation> {
        let platform = ctx.matched.platform;
        let endpoints = Self::endpoints(platform, &ctx.matched.share_id);
        if endpoints.is_empty() {
            return Err(StrategyError::NoEndpoints { platform });
        }

        for endpoint in &endpoints {
            let Some(payload) = ctx.fetcher().probe_json(endpoint).await? else {
                continue;
            };
            debug!(endpoint = %endpoint, "structured endpoint answered");
            match map_payload(&payload, platform, &ctx.url) {
                Some(conversation) => return Ok(conversation),
                None => {
                    debug!(endpoint = %endpoint, "payload shape not recognized");
                }
            }
        }

        Err(StrategyError::NoMessages)
    }
}

/// Map a structured payload onto the conversation model. Returns `None`
/// when the payload carries no recognizable message list.
pub(crate) fn map_payload(payload: &Value, platform: Platform, url: &str) -> Option<Conversation> {
    let root = payload.get("data").unwrap_or(payload);

    let title = ["title", "name"]
        .iter()
        .find_map(|key| root.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| platform.default_title());

    let items = ["linear_conversation", "messages", "chat_messages"]
        .iter()
        .find_map(|key| root.get(*key).and_then(Value::as_array))?;

    let mut messages = Vec::new();
    for item in items {
        if let Some(message) = map_message(item) {
            messages.push(message);
        }
    }

    if messages.is_empty() {
        return None;
    }

    Some(Conversation::new(platform, title, messages, url))
}

/// Map one payload entry onto a message, tolerating the field layouts
/// seen across platforms. Empty-text entries are dropped here, exactly
/// as in the markup path.
fn map_message(item: &Value) -> Option<Message> {
    // ChatGPT nests the payload under "message"; others are flat.
    let node = item.get("message").unwrap_or(item);

    let role_marker = node
        .pointer("/author/role")
        .or_else(|| node.get("role"))
        .or_else(|| node.get("sender"))
        .and_then(Value::as_str);

    let text = node
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .or_else(|| node.get("text").and_then(Value::as_str).map(str::to_string))
        .or_else(|| {
            node.get("content")
                .and_then(Value::as_str)
                .map(str::to_string)
        })?;

    let text = text.trim().to_string();
    if text.is_empty() {
        return None;
    }

    let mut artifacts: Vec<Artifact> = Vec::new();
    for (language, code) in heuristics::fenced_code_blocks(&text) {
        let language = language.or_else(|| heuristics::infer_language(&code).map(str::to_string));
        if let Some(artifact) = Artifact::code(code, language) {
            artifacts.push(artifact);
        }
    }

    let explicit = role_marker.and_then(MessageRole::from_marker);
    let role = heuristics::infer_role(&text, !artifacts.is_empty(), explicit);

    let mut message = Message::new(role, text)
        .with_formatting(Formatting {
            is_markdown: heuristics::looks_like_markdown(
                node.get("text").and_then(Value::as_str).unwrap_or_default(),
            ),
            ..Formatting::default()
        })
        .with_artifacts(artifacts);
    message.content.formatting.is_markdown |= message.content.formatting.has_code_blocks;

    let timestamp = node
        .get("create_time")
        .or_else(|| node.get("created_at"))
        .or_else(|| node.get("timestamp"));
    if let Some(ts) = timestamp {
        let parsed = match ts {
            Value::String(s) => heuristics::parse_timestamp(s),
            Value::Number(n) => n
                .as_f64()
                .and_then(|f| chrono::DateTime::from_timestamp(f as i64, 0)),
            _ => None,
        };
        if let Some(parsed) = parsed {
            message = message.with_timestamp(parsed);
        }
    }

    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gemini_has_no_endpoints_to_probe() {
        assert!(StructuredEndpointStrategy::endpoints(Platform::Gemini, "abc123def").is_empty());
        assert!(
            !StructuredEndpointStrategy::endpoints(Platform::ChatGpt, "abc123def").is_empty()
        );
    }

    #[test]
    fn maps_chatgpt_share_payload() {
        let payload = json!({
            "title": "React hooks",
            "linear_conversation": [
                {
                    "message": {
                        "author": { "role": "user" },
                        "create_time": 1699180200.0,
                        "content": { "content_type": "text", "parts": ["How do hooks work?"] }
                    }
                },
                {
                    "message": {
                        "author": { "role": "assistant" },
                        "create_time": 1699180230.5,
                        "content": { "parts": ["Like this:\n```javascript\nconst [n, setN] = useState(0);\n```"] }
                    }
                }
            ]
        });

        let conv = map_payload(&payload, Platform::ChatGpt, "https://chatgpt.com/share/x").unwrap();
        assert_eq!(conv.title, "React hooks");
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].role, MessageRole::User);
        assert_eq!(conv.messages[1].role, MessageRole::Assistant);
        assert_eq!(conv.messages[1].content.artifacts.len(), 1);
        assert_eq!(
            conv.messages[1].content.artifacts[0].language.as_deref(),
            Some("javascript")
        );
    }

    #[test]
    fn maps_claude_snapshot_payload() {
        let payload = json!({
            "name": "Debugging session",
            "chat_messages": [
                { "sender": "human", "text": "Why does this panic?", "created_at": "2024-11-05T10:30:00Z" },
                { "sender": "assistant", "text": "Because the index is out of bounds." }
            ]
        });

        let conv = map_payload(&payload, Platform::Claude, "https://claude.ai/share/x").unwrap();
        assert_eq!(conv.title, "Debugging session");
        assert_eq!(conv.messages[0].role, MessageRole::User);
        assert_eq!(
            conv.messages[0].timestamp.to_rfc3339(),
            "2024-11-05T10:30:00+00:00"
        );
    }

    #[test]
    fn empty_entries_are_dropped() {
        let payload = json!({
            "title": "t",
            "messages": [
                { "role": "user", "text": "   " },
                { "role": "assistant", "text": "real answer" }
            ]
        });
        let conv = map_payload(&payload, Platform::ChatGpt, "https://chatgpt.com/share/x").unwrap();
        assert_eq!(conv.messages.len(), 1);
    }

    #[test]
    fn unrecognized_payload_shapes_map_to_none() {
        let payload = json!({ "unrelated": true });
        assert!(map_payload(&payload, Platform::ChatGpt, "https://chatgpt.com/share/x").is_none());

        let all_empty = json!({ "messages": [ { "role": "user", "text": "" } ] });
        assert!(map_payload(&all_empty, Platform::ChatGpt, "https://chatgpt.com/share/x").is_none());
    }

    #[test]
    fn missing_title_falls_back_to_platform_default() {
        let payload = json!({
            "messages": [ { "role": "user", "text": "hello there" } ]
        });
        let conv = map_payload(&payload, Platform::ChatGpt, "https://chatgpt.com/share/x").unwrap();
        assert_eq!(conv.title, "ChatGPT Conversation");
    }
}
