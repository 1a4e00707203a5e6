//! Placeholder discovery and brace diagnostics
//!
//! Tokens use the flat `{{name}}` form. Matching runs on the concatenated
//! text of one container at a time, so a token may straddle several spans
//! but never two containers.

use crate::document_model::{Container, Document};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(.+?)\}\}").expect("token regex is valid"));

/// A braced group with no nested braces, or any stray brace with the
/// non-space text glued to it
static MALFORMED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{[^{}]*\}|[^\s{}]*[{}][^\s{}]*").expect("malformed regex is valid")
});

/// Build the literal marker text for a token
pub fn marker(token: &str) -> String {
    format!("{{{{{}}}}}", token)
}

/// Tokens found in a single string, in order of appearance
pub fn tokens_in_text(text: &str) -> Vec<&str> {
    TOKEN_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// Malformed brace strings in a single string, in order of appearance
///
/// Well-formed `{{...}}` tokens are masked out first so that only braces
/// outside a balanced double-brace pair are reported.
pub fn malformed_in_text(text: &str) -> Vec<String> {
    let masked = TOKEN_RE.replace_all(text, " ");
    MALFORMED_RE
        .find_iter(&masked)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Collect the distinct tokens of a set of containers
pub fn extract_tokens_from<'a>(containers: impl IntoIterator<Item = &'a Container>) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for container in containers {
        let text = container.text();
        tokens.extend(tokens_in_text(&text).into_iter().map(str::to_string));
    }
    tokens
}

/// Collect the distinct malformed brace strings of a set of containers
pub fn find_malformed_in<'a>(containers: impl IntoIterator<Item = &'a Container>) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for container in containers {
        found.extend(malformed_in_text(&container.text()));
    }
    found
}

/// Every distinct placeholder token in the document
pub fn extract_tokens(doc: &Document) -> BTreeSet<String> {
    extract_tokens_from(doc.containers())
}

/// Every distinct malformed brace string in the document
pub fn find_malformed(doc: &Document) -> BTreeSet<String> {
    find_malformed_in(doc.containers())
}
