//! Shared markup extraction engine.
//!
//! Turns a page body plus a selector rule into a conversation. Used by
//! the static-markup strategy directly, by the rendered-DOM strategy on
//! browser-produced HTML, and by the community-rule strategy once per
//! candidate rule.
//!
//! Everything here is synchronous: `scraper::Html` is not `Send`, so no
//! parsed document may live across an await point.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::{StrategyError, StrategyResult};
use crate::heuristics;
use crate::platform::Platform;
use crate::types::{Artifact, Conversation, Formatting, Message, ParsingRule, SelectorSet};

/// Result of applying a rule's message selector to a page: an explicit
/// branch, not an empty-collection check.
pub enum RuleMatch<'a> {
    Matched(Vec<ElementRef<'a>>),
    NoMatch,
}

/// The rule's selectors, parsed once per attempt.
struct CompiledSelectors {
    messages: Selector,
    user_role: Selector,
    assistant_role: Selector,
    content: Selector,
    timestamp: Option<Selector>,
    title: Selector,
    code_block: Selector,
}

impl CompiledSelectors {
    fn compile(rule_id: &str, set: &SelectorSet) -> StrategyResult<Self> {
        let parse = |s: &str| {
            Selector::parse(s).map_err(|_| StrategyError::InvalidRule {
                id: rule_id.to_string(),
            })
        };
        Ok(Self {
            messages: parse(&set.messages)?,
            user_role: parse(&set.user_role)?,
            assistant_role: parse(&set.assistant_role)?,
            content: parse(&set.content)?,
            timestamp: match &set.timestamp {
                Some(s) => Some(parse(s)?),
                None => None,
            },
            title: parse(&set.title)?,
            code_block: parse(&set.code_block)?,
        })
    }
}

/// Extract a conversation from a page body using one rule.
pub fn extract_with_rule(
    html: &str,
    rule: &ParsingRule,
    platform: Platform,
    url: &str,
) -> StrategyResult<Conversation> {
    let document = Html::parse_document(html);
    let selectors = CompiledSelectors::compile(&rule.id, &rule.selectors)?;

    let containers = match match_rule(&document, &selectors) {
        RuleMatch::Matched(containers) => containers,
        RuleMatch::NoMatch => {
            debug!(rule_id = %rule.id, platform = %platform, "rule matched no containers");
            return Err(StrategyError::NoMatch);
        }
    };

    let user_ids: HashSet<_> = document.select(&selectors.user_role).map(|e| e.id()).collect();
    let assistant_ids: HashSet<_> = document
        .select(&selectors.assistant_role)
        .map(|e| e.id())
        .collect();

    let mut messages = Vec::new();
    for container in containers {
        let explicit = if user_ids.contains(&container.id()) {
            Some(crate::types::MessageRole::User)
        } else if assistant_ids.contains(&container.id()) {
            Some(crate::types::MessageRole::Assistant)
        } else {
            explicit_role_attr(container)
        };

        if let Some(message) = extract_message(container, &selectors, explicit) {
            messages.push(message);
        }
    }

    if messages.is_empty() {
        return Err(StrategyError::NoMessages);
    }

    let title = page_title(&document, &selectors.title, platform);
    Ok(Conversation::new(platform, title, messages, url))
}

/// Apply the rule's message selector. Explicit tagged union so the
/// no-match path is its own testable branch.
fn match_rule<'a>(document: &'a Html, selectors: &CompiledSelectors) -> RuleMatch<'a> {
    let containers: Vec<_> = document.select(&selectors.messages).collect();
    if containers.is_empty() {
        RuleMatch::NoMatch
    } else {
        RuleMatch::Matched(containers)
    }
}

/// Count message containers in a page body. Used by the rendered-DOM
/// strategy's stability polling.
pub fn count_containers(html: &str, messages_selector: &str) -> usize {
    let Ok(selector) = Selector::parse(messages_selector) else {
        return 0;
    };
    let document = Html::parse_document(html);
    document.select(&selector).count()
}

/// Build one message from a container, or `None` when the container
/// holds nothing conversational.
fn extract_message(
    container: ElementRef<'_>,
    selectors: &CompiledSelectors,
    explicit: Option<crate::types::MessageRole>,
) -> Option<Message> {
    // Prefer the rule's content element when it matches inside the
    // container; fall back to the whole container.
    let text_root = container.select(&selectors.content).next().unwrap_or(container);
    let raw = visible_text(text_root);
    let text = heuristics::clean_text(&raw);

    if text.is_empty() {
        return None;
    }
    if heuristics::is_noise(&text) {
        debug!(len = text.len(), "dropping noise container");
        return None;
    }

    let mut artifacts: Vec<Artifact> = Vec::new();
    for code_el in container.select(&selectors.code_block) {
        let code_text: String = code_el.text().collect();
        let language = language_for(code_el, &code_text);
        if let Some(artifact) = Artifact::code(code_text, language) {
            artifacts.push(artifact);
        }
    }

    let link_selector = Selector::parse("a[href]").expect("static selector");
    for anchor in container.select(&link_selector) {
        if let Some(href) = anchor.value().attr("href") {
            if let Some(artifact) = Artifact::link(href) {
                artifacts.push(artifact);
            }
        }
    }

    let image_selector = Selector::parse("img[src]").expect("static selector");
    for image in container.select(&image_selector) {
        if let Some(src) = image.value().attr("src") {
            if let Some(artifact) = Artifact::image(src) {
                artifacts.push(artifact);
            }
        }
    }

    let has_code = artifacts.iter().any(|a| a.kind == crate::types::ArtifactType::Code);
    let role = heuristics::infer_role(&text, has_code, explicit);

    let mut message = Message::new(role, text)
        .with_formatting(Formatting {
            is_markdown: heuristics::looks_like_markdown(&raw),
            ..Formatting::default()
        })
        .with_artifacts(artifacts);

    if let Some(timestamp_selector) = &selectors.timestamp {
        if let Some(ts) = container.select(timestamp_selector).next().and_then(|el| {
            el.value()
                .attr("datetime")
                .map(str::to_string)
                .or_else(|| Some(el.text().collect::<String>()))
        }) {
            if let Some(parsed) = heuristics::parse_timestamp(&ts) {
                message = message.with_timestamp(parsed);
            }
        }
    }

    Some(message)
}

/// Role marker carried directly on the container element, independent of
/// the rule's role selectors.
fn explicit_role_attr(container: ElementRef<'_>) -> Option<crate::types::MessageRole> {
    for attr in ["data-message-author-role", "data-role", "data-author"] {
        if let Some(value) = container.value().attr(attr) {
            if let Some(role) = crate::types::MessageRole::from_marker(value) {
                return Some(role);
            }
        }
    }
    None
}

/// Language for a code element: CSS-class hint on the element or its
/// parent, else content heuristics.
fn language_for(code_el: ElementRef<'_>, code_text: &str) -> Option<String> {
    if let Some(lang) = heuristics::language_from_class(code_el.value().classes()) {
        return Some(lang);
    }
    if let Some(parent) = code_el.parent().and_then(ElementRef::wrap) {
        if let Some(lang) = heuristics::language_from_class(parent.value().classes()) {
            return Some(lang);
        }
    }
    heuristics::infer_language(code_text).map(str::to_string)
}

/// Tags whose subtree is never conversational text.
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "svg", "button", "template"];

/// Tags that end a visual line.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "pre", "blockquote", "section", "article", "tr",
    "table", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Concatenate visible text the way a browser's `innerText` roughly
/// would: text nodes in order, newlines after block-level elements,
/// script/style/button subtrees skipped.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(root, &mut out);
    out
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    if SKIP_TAGS.contains(&el.value().name()) {
        return;
    }
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(&text.text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            collect_text(child_el, out);
            if BLOCK_TAGS.contains(&child_el.value().name()) {
                out.push('\n');
            }
        }
    }
}

/// Page title: the rule's title element, stripped of platform branding
/// suffixes; the platform default when nothing usable remains.
fn page_title(document: &Html, title_selector: &Selector, platform: Platform) -> String {
    let raw = document
        .select(title_selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .unwrap_or_default();
    let cleaned = heuristics::clean_text(&raw);
    strip_title_branding(&cleaned, platform)
}

fn strip_title_branding(title: &str, platform: Platform) -> String {
    let name = platform.display_name();
    let mut stripped = title.to_string();
    for sep in [" - ", " | ", " — "] {
        let suffix = format!("{}{}", sep, name);
        if let Some(prefix) = stripped.strip_suffix(&suffix) {
            stripped = prefix.to_string();
            break;
        }
    }
    let stripped = stripped.trim();
    if stripped.is_empty() || stripped.eq_ignore_ascii_case(name) {
        platform.default_title()
    } else {
        stripped.to_string()
    }
}
