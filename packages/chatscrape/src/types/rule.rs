//! Parsing rules: per-platform selector sets with provenance.
//!
//! A rule names the CSS queries needed to locate conversation elements in
//! a platform's markup. Rules are immutable once published; updates ship
//! as new rules with a bumped version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::platform::Platform;

/// Confidence floor for a rule to be accepted into the registry.
pub const MIN_ACCEPTED_CONFIDENCE: f32 = 0.8;

/// The structural queries a rule carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSet {
    /// Locates the per-message containers
    pub messages: String,
    /// Containers matching this are user turns
    pub user_role: String,
    /// Containers matching this are assistant turns
    pub assistant_role: String,
    /// The message body within a container
    pub content: String,
    /// Optional; platforms rarely expose per-message times in share pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Page title element
    pub title: String,
    /// Code blocks within a container
    pub code_block: String,
}

/// One published selector rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingRule {
    pub id: String,
    pub platform: Platform,
    pub version: u32,
    pub selectors: SelectorSet,
    /// In [0, 1]; how reliably this rule has matched real pages
    pub confidence: f32,
    pub verified: bool,
    pub last_updated: DateTime<Utc>,
}

impl ParsingRule {
    /// The registry acceptance gate: only verified, high-confidence rules
    /// ever become selectable.
    pub fn is_acceptable(&self) -> bool {
        self.verified && self.confidence > MIN_ACCEPTED_CONFIDENCE
    }
}
