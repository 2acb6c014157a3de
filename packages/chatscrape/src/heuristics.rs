//! Content heuristics: text cleaning, role and language inference, and
//! noise filtering.
//!
//! These are pure functions, kept independent of any strategy so they can
//! be tested in isolation. The role fallback (short, marker-free content
//! is a user turn; long or code-bearing content is an assistant turn) is
//! a known accuracy limitation, not a guaranteed classifier: short
//! assistant replies and long user prompts can be misclassified.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::types::MessageRole;

/// Role-heuristic boundary: marker-free content at or below this length
/// (without code) is treated as a user turn.
const SHORT_MESSAGE_LEN: usize = 240;

/// Messages longer than this are captured page chrome, not conversation.
pub const MAX_MESSAGE_LEN: usize = 50_000;

/// Substrings that mark script/state dumps accidentally captured from
/// the page rather than conversational content.
const SCRIPT_NOISE_MARKERS: &[&str] = &[
    "window.__",
    "self.__next_f",
    "__NEXT_DATA__",
    "webpackChunk",
    "dataLayer.push",
    "document.cookie",
    "!function(",
];

/// Navigation-chrome phrases that mean a container matched site
/// furniture instead of a message.
const CHROME_NOISE_PHRASES: &[&str] = &[
    "log in",
    "sign up",
    "cookie preferences",
    "terms of service",
    "privacy policy",
    "upgrade to plus",
    "skip to content",
];

/// Collapse whitespace runs to a single space and blank-line runs to a
/// single blank line, trimming leading and trailing blank lines.
pub fn clean_text(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0usize;

    for line in raw.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            if blank_run == 1 {
                lines.push(String::new());
            }
        } else {
            blank_run = 0;
            lines.push(collapsed);
        }
    }

    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

/// Infer a message role.
///
/// An explicit marker from the source always wins. Without one: short,
/// code-free content defaults to `User`; longer or code-bearing content
/// defaults to `Assistant`.
pub fn infer_role(text: &str, has_code: bool, explicit: Option<MessageRole>) -> MessageRole {
    if let Some(role) = explicit {
        return role;
    }
    if has_code || text.len() > SHORT_MESSAGE_LEN {
        MessageRole::Assistant
    } else {
        MessageRole::User
    }
}

/// Extract a language hint from CSS classes (`language-rust`,
/// `lang-py`, `highlight-source-js` conventions).
pub fn language_from_class<'a, I>(classes: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    for class in classes {
        for prefix in ["language-", "lang-", "highlight-source-"] {
            if let Some(lang) = class.strip_prefix(prefix) {
                if !lang.is_empty() {
                    return Some(normalize_language(lang));
                }
            }
        }
    }
    None
}

/// Infer a programming language from code content. Returns `None` when
/// nothing matches rather than guessing.
pub fn infer_language(code: &str) -> Option<&'static str> {
    static PYTHON_DEF: OnceLock<Regex> = OnceLock::new();
    static SQL_SELECT: OnceLock<Regex> = OnceLock::new();

    let python_def =
        PYTHON_DEF.get_or_init(|| Regex::new(r"(?m)^\s*def\s+\w+\s*\(.*\)\s*:").unwrap());
    let sql_select =
        SQL_SELECT.get_or_init(|| Regex::new(r"(?is)\bselect\b.+\bfrom\b").unwrap());

    if code.contains("<?php") {
        return Some("php");
    }
    if code.contains("#include") {
        return Some("c");
    }
    if python_def.is_match(code) || (code.contains("import ") && code.contains("print(")) {
        return Some("python");
    }
    if code.contains("fn ") && (code.contains("let mut ") || code.contains("-> ")) {
        return Some("rust");
    }
    if code.contains("package ") && code.contains("func ") {
        return Some("go");
    }
    if code.contains("public static ") || code.contains("public class ") {
        return Some("java");
    }
    if code.contains("import ")
        || code.contains("from ")
        || code.contains("=> ")
        || code.contains("function ")
        || code.contains("const ")
    {
        return Some("javascript");
    }
    if sql_select.is_match(code) {
        return Some("sql");
    }
    None
}

/// Canonicalize common language aliases from class hints.
fn normalize_language(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "js" | "jsx" => "javascript".to_string(),
        "ts" | "tsx" => "typescript".to_string(),
        "py" => "python".to_string(),
        "rb" => "ruby".to_string(),
        "shell" | "sh" => "bash".to_string(),
        other => other.to_string(),
    }
}

/// Whether captured text is non-conversational noise: script variable
/// dumps, navigation chrome, or page-chrome-sized blobs.
pub fn is_noise(text: &str) -> bool {
    if text.len() > MAX_MESSAGE_LEN {
        return true;
    }
    if SCRIPT_NOISE_MARKERS.iter().any(|m| text.contains(m)) {
        return true;
    }
    // Chrome phrases only condemn short fragments; a real message can
    // legitimately mention "privacy policy".
    if text.len() < 120 {
        let lower = text.to_lowercase();
        if CHROME_NOISE_PHRASES.iter().any(|p| lower.contains(p)) {
            return true;
        }
    }
    false
}

/// Rough check for Markdown-formatted text.
pub fn looks_like_markdown(text: &str) -> bool {
    text.contains("```")
        || text.contains("**")
        || text.lines().any(|l| {
            let t = l.trim_start();
            t.starts_with("# ")
                || t.starts_with("## ")
                || t.starts_with("- ")
                || t.starts_with("* ")
                || t.starts_with("> ")
        })
}

/// Best-effort timestamp parse: RFC 3339, epoch seconds, epoch millis.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        // Heuristic cutover: values this large are milliseconds.
        if int > 100_000_000_000 {
            return DateTime::from_timestamp_millis(int);
        }
        return DateTime::from_timestamp(int, 0);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        return DateTime::from_timestamp(float as i64, 0);
    }
    None
}

/// Pull fenced code blocks (```lang ... ```) out of Markdown text.
/// Returns `(language hint, code)` pairs in source order.
pub fn fenced_code_blocks(text: &str) -> Vec<(Option<String>, String)> {
    let mut blocks = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if let Some(info) = trimmed.strip_prefix("```") {
            let language = {
                let hint = info.trim();
                if hint.is_empty() {
                    None
                } else {
                    Some(normalize_language(hint))
                }
            };
            let mut code = String::new();
            for body in lines.by_ref() {
                if body.trim_start().starts_with("```") {
                    break;
                }
                code.push_str(body);
                code.push('\n');
            }
            blocks.push((language, code));
        }
    }

    blocks
}
