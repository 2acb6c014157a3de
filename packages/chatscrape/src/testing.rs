//! Testing utilities: HTML fixtures and mock implementations.
//!
//! Useful for testing applications built on the extraction library
//! without network access, a rendering service, or an LLM.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::browser::{BrowserPage, HeadlessBrowser};
use crate::error::{StrategyError, StrategyResult};
use crate::platform::Platform;
use crate::strategies::semantic::{SemanticConversation, SemanticExtractor};
use crate::strategies::{ExtractionContext, Strategy, StrategyKind};
use crate::types::{Conversation, Message, MessageRole};

/// A ChatGPT-shaped share page with the given `(role, text)` turns.
pub fn chatgpt_share_page(turns: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (role, text) in turns {
        let content_class = if *role == "user" {
            "whitespace-pre-wrap"
        } else {
            "markdown"
        };
        body.push_str(&format!(
            "<div data-message-author-role=\"{role}\">\
             <div class=\"{content_class}\">{text}</div></div>\n"
        ));
    }
    format!(
        "<html><head><title>React Hooks Help - ChatGPT</title></head>\
         <body><main>{body}</main></body></html>"
    )
}

/// The canonical two-turn fixture: a user question and an assistant
/// reply carrying a fenced JavaScript code block.
pub fn chatgpt_two_turn_fixture() -> String {
    let assistant = "<p>Sure! Hooks let function components hold state. Here is a minimal \
         counter using <code>useState</code>:</p>\
         <pre><code class=\"language-javascript\">import { useState } from 'react';\n\n\
         function Counter() {\n  const [count, setCount] = useState(0);\n  \
         return count;\n}\n</code></pre>";
    chatgpt_share_page(&[
        ("user", "Hello! Can you help me understand how React hooks work?"),
        ("assistant", assistant),
    ])
}

/// A small, valid conversation for generator and orchestrator tests.
pub fn sample_conversation(platform: Platform) -> Conversation {
    Conversation::new(
        platform,
        "Sample conversation",
        vec![
            Message::new(MessageRole::User, "Hello! Can you help me?"),
            Message::new(MessageRole::Assistant, "Of course. What do you need?"),
        ],
        "https://chatgpt.com/share/abcdef123456",
    )
}

/// A scripted strategy for orchestrator tests.
///
/// Yields its queued results in order and records how many times it was
/// attempted.
pub struct MockStrategy {
    kind: StrategyKind,
    results: Mutex<VecDeque<StrategyResult<Conversation>>>,
    attempts: AtomicUsize,
}

impl MockStrategy {
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            results: Mutex::new(VecDeque::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// A strategy that always fails with `NoMatch`.
    pub fn failing(kind: StrategyKind) -> Arc<Self> {
        Arc::new(Self::new(kind))
    }

    /// A strategy that succeeds once with the given conversation.
    pub fn succeeding(kind: StrategyKind, conversation: Conversation) -> Arc<Self> {
        let mock = Self::new(kind);
        mock.push(Ok(conversation));
        Arc::new(mock)
    }

    /// Queue the next result.
    pub fn push(&self, result: StrategyResult<Conversation>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Strategy for MockStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn attempt(&self, _ctx: &mut ExtractionContext) -> StrategyResult<Conversation> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(StrategyError::NoMatch))
    }
}

// Arc<MockStrategy> needs to be usable where Box<dyn Strategy> is
// expected; delegate through the Arc.
#[async_trait]
impl Strategy for Arc<MockStrategy> {
    fn kind(&self) -> StrategyKind {
        self.as_ref().kind()
    }

    async fn attempt(&self, ctx: &mut ExtractionContext) -> StrategyResult<Conversation> {
        self.as_ref().attempt(ctx).await
    }
}

/// A mock browser that serves a fixed sequence of DOM snapshots.
///
/// `html()` walks the snapshot sequence (sticking on the last one) to
/// simulate a page that fills in over time. Tracks expand and close
/// calls for assertions.
pub struct MockBrowser {
    snapshots: Arc<Vec<String>>,
    cursor: Arc<AtomicUsize>,
    expand_calls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl MockBrowser {
    pub fn with_snapshots(snapshots: Vec<String>) -> Self {
        Self {
            snapshots: Arc::new(snapshots),
            cursor: Arc::new(AtomicUsize::new(0)),
            expand_calls: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn expand_calls(&self) -> usize {
        self.expand_calls.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HeadlessBrowser for MockBrowser {
    async fn open(&self, _url: &str) -> StrategyResult<Box<dyn BrowserPage>> {
        Ok(Box::new(MockPage {
            snapshots: self.snapshots.clone(),
            cursor: self.cursor.clone(),
            expand_calls: self.expand_calls.clone(),
            closed: self.closed.clone(),
        }))
    }
}

struct MockPage {
    snapshots: Arc<Vec<String>>,
    cursor: Arc<AtomicUsize>,
    expand_calls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserPage for MockPage {
    async fn html(&mut self) -> StrategyResult<String> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let last = self.snapshots.len().saturating_sub(1);
        self.snapshots
            .get(index.min(last))
            .cloned()
            .ok_or_else(|| StrategyError::Render("no snapshots configured".into()))
    }

    async fn expand_collapsed(&mut self) -> StrategyResult<usize> {
        self.expand_calls.fetch_add(1, Ordering::SeqCst);
        Ok(0)
    }

    async fn close(&mut self) -> StrategyResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A scripted semantic extractor.
pub struct ScriptedSemanticExtractor {
    reply: Option<SemanticConversation>,
}

impl ScriptedSemanticExtractor {
    pub fn replying(reply: SemanticConversation) -> Self {
        Self { reply: Some(reply) }
    }

    pub fn failing() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl SemanticExtractor for ScriptedSemanticExtractor {
    async fn extract_conversation(
        &self,
        _excerpt: &str,
        _platform: Platform,
    ) -> StrategyResult<SemanticConversation> {
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(StrategyError::Semantic("scripted failure".into())),
        }
    }
}
