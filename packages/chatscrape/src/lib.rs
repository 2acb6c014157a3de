//! Conversation Share-Link Extraction
//!
//! Extracts structured conversation data (title, ordered messages,
//! code/artifact content) from the HTML of publicly shared AI-chatbot
//! conversation pages: ChatGPT, Claude, Gemini, and Perplexity.
//!
//! # Design Philosophy
//!
//! The markup behind share pages is undocumented, platform-controlled,
//! and changes without notice. Nothing here assumes a single parse will
//! work:
//!
//! - Multiple independent strategies, tried in sequence, each with its
//!   own timeout budget
//! - Selector rules as data, swappable at runtime without a deploy
//! - Recorded outcomes feed an adaptive ranking, so the order improves
//!   as pages change
//! - Validation is all-or-nothing per attempt; no silently degraded
//!   results
//! - Conversation content lives only for the request that extracted it
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chatscrape::{
//!     Orchestrator, OutcomeLog, PageFetcher, RuleRegistry,
//!     strategies::{StaticMarkupStrategy, StructuredEndpointStrategy},
//! };
//!
//! let registry = Arc::new(RuleRegistry::with_builtin_rules());
//! let outcomes = Arc::new(OutcomeLog::new());
//! let fetcher = Arc::new(PageFetcher::new()?);
//!
//! let orchestrator = Orchestrator::new(
//!     registry.clone(),
//!     outcomes,
//!     vec![
//!         Box::new(StaticMarkupStrategy::new(registry.clone())),
//!         Box::new(StructuredEndpointStrategy::new()),
//!     ],
//!     fetcher,
//! );
//!
//! let conversation = orchestrator
//!     .extract("https://chatgpt.com/share/66f5a1b2-...")
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`platform`] - Share-link detection
//! - [`types`] - The conversation data model and parsing rules
//! - [`registry`] - Copy-on-write selector rule registry
//! - [`strategies`] - The five extraction strategies
//! - [`orchestrator`] - Per-request state machine over the strategies
//! - [`adaptive`] - Outcome-driven strategy ranking
//! - [`heuristics`] - Text cleaning, role and language inference
//! - [`browser`] - Headless rendering seam for script-populated pages
//! - [`testing`] - Fixtures and mocks

pub mod adaptive;
pub mod browser;
pub mod error;
pub mod fetch;
pub mod heuristics;
pub mod orchestrator;
pub mod outcome;
pub mod platform;
pub mod registry;
pub mod strategies;
pub mod testing;
pub mod types;

// Re-export the core surface at the crate root
pub use adaptive::AdaptiveSelector;
pub use browser::{HeadlessBrowser, RemoteBrowser, RenderConfig};
pub use error::{
    AttemptFailure, DetectError, ExtractError, Result, StrategyError, StrategyResult,
    ValidationFailure,
};
pub use fetch::PageFetcher;
pub use orchestrator::Orchestrator;
pub use outcome::{OutcomeLog, StrategyOutcome};
pub use platform::{detect, Platform, PlatformMatch};
pub use registry::{builtin_rules, FeedError, RuleFeed, RuleRegistry};
pub use strategies::{Strategy, StrategyKind};
pub use types::{
    Artifact, ArtifactType, Conversation, ConversationMetadata, Formatting, Message,
    MessageContent, MessageRole, OrchestratorConfig, ParsingRule, SelectorSet,
};
