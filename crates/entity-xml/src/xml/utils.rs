//! Utility functions and constants for building XML trees.
//!
//! This module provides helpers for XML names, qualified-name splitting and
//! scalar rendering.

use crate::error::TreeError;

/// XML declaration written at the top of serialized documents.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

/// Splits a qualified name into its prefix and local part.
///
/// `p:Person` gives `(Some("p"), "Person")`; `Person` gives `(None, "Person")`.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Replaces characters that cannot appear in an element name with `_`.
///
/// Letters, digits, `_`, `-`, `.` and the prefix separator `:` are kept.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Checks that `name` is a legal (optionally prefixed) XML name.
pub fn validate_name(name: &str) -> Result<(), TreeError> {
    let invalid = || TreeError::InvalidName(name.to_string());
    if name.matches(':').count() > 1 {
        return Err(invalid());
    }
    let (prefix, local) = split_qname(name);
    for part in prefix.into_iter().chain(std::iter::once(local)) {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_alphabetic() || first == '_' => {}
            _ => return Err(invalid()),
        }
        if !chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.')) {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Converts a Rust boolean to its string representation for XML.
pub fn bool_to_string(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}
