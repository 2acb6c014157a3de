//! Platform detection for share links.
//!
//! Classifies a URL into a known platform and extracts its opaque share
//! identifier. Pure function of its input; no network activity.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DetectError;

/// The supported conversation platforms. Closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    ChatGpt,
    Claude,
    Gemini,
    Perplexity,
}

impl Platform {
    /// All supported platforms, in pattern-declaration order.
    pub const ALL: [Platform; 4] = [
        Platform::ChatGpt,
        Platform::Claude,
        Platform::Gemini,
        Platform::Perplexity,
    ];

    /// Human-readable name for error messages and titles.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ChatGpt => "ChatGPT",
            Self::Claude => "Claude",
            Self::Gemini => "Gemini",
            Self::Perplexity => "Perplexity",
        }
    }

    /// Stable lowercase identifier used in logs and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatGpt => "chatgpt",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Perplexity => "perplexity",
        }
    }

    /// Title used when the source yields no usable title.
    pub fn default_title(&self) -> String {
        format!("{} Conversation", self.display_name())
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful detection: the platform plus its opaque share id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformMatch {
    pub platform: Platform,
    pub share_id: String,
}

/// One host + path-prefix pattern. Ordered; first match wins.
struct SharePattern {
    platform: Platform,
    hosts: &'static [&'static str],
    path_prefix: &'static str,
}

const PATTERNS: &[SharePattern] = &[
    SharePattern {
        platform: Platform::ChatGpt,
        hosts: &["chatgpt.com", "chat.openai.com"],
        path_prefix: "/share/",
    },
    SharePattern {
        platform: Platform::Claude,
        hosts: &["claude.ai"],
        path_prefix: "/share/",
    },
    SharePattern {
        platform: Platform::Gemini,
        hosts: &["gemini.google.com"],
        path_prefix: "/share/",
    },
    SharePattern {
        platform: Platform::Perplexity,
        hosts: &["perplexity.ai", "www.perplexity.ai"],
        path_prefix: "/search/",
    },
];

/// Minimum length for a plausible opaque share id.
const MIN_SHARE_ID_LEN: usize = 6;

/// Classify a URL into a platform and extract its share id.
///
/// Validates that the input parses as an absolute HTTPS URL and matches
/// one of the supported host + path patterns. Host comparison is
/// case-insensitive. Rejected input never triggers network activity.
pub fn detect(url: &str) -> std::result::Result<PlatformMatch, DetectError> {
    let parsed = Url::parse(url).map_err(|_| DetectError::InvalidUrl {
        url: url.to_string(),
    })?;

    if parsed.scheme() != "https" {
        return Err(DetectError::InsecureScheme {
            url: url.to_string(),
        });
    }

    let host = match parsed.host_str() {
        Some(h) => h.to_ascii_lowercase(),
        None => {
            return Err(DetectError::InvalidUrl {
                url: url.to_string(),
            })
        }
    };

    for pattern in PATTERNS {
        if !pattern.hosts.contains(&host.as_str()) {
            continue;
        }
        if let Some(id) = pattern.share_id(parsed.path()) {
            return Ok(PlatformMatch {
                platform: pattern.platform,
                share_id: id,
            });
        }
    }

    Err(DetectError::unsupported(url))
}

impl SharePattern {
    /// Extract the opaque id if the path matches this pattern's shape.
    fn share_id(&self, path: &str) -> Option<String> {
        let rest = path.strip_prefix(self.path_prefix)?;
        let id = rest.split('/').next().unwrap_or_default();
        if id.len() >= MIN_SHARE_ID_LEN && is_opaque_id(id) {
            Some(id.to_string())
        } else {
            None
        }
    }
}

/// Share ids are URL-safe opaque tokens: alphanumerics, hyphens,
/// underscores. Anything else means the path is not a share link.
fn is_opaque_id(candidate: &str) -> bool {
    candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
