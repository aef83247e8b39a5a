//! Matching of validator names against skip lists
//!
//! An entry is either a literal validator name or a regular expression
//! wrapped in slashes (`/audit_.*/`), which must match the whole name.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, ValidationError};

static COMPILED: Lazy<DashMap<String, Regex>> = Lazy::new(DashMap::new);

fn regex_body(pattern: &str) -> Option<&str> {
    if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
        Some(&pattern[1..pattern.len() - 1])
    } else {
        None
    }
}

fn compile(pattern: &str, body: &str) -> Result<Regex> {
    if let Some(regex) = COMPILED.get(pattern) {
        return Ok(regex.clone());
    }
    let regex = Regex::new(&format!("^(?:{body})$")).map_err(|source| {
        ValidationError::InvalidIgnorePattern {
            pattern: pattern.to_string(),
            source,
        }
    })?;
    COMPILED.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Check that a skip entry is usable before it is stored.
pub fn validate_pattern(pattern: &str) -> Result<()> {
    if pattern.is_empty() {
        return Err(ValidationError::EmptyValidatorName);
    }
    if let Some(body) = regex_body(pattern) {
        compile(pattern, body)?;
    }
    Ok(())
}

pub fn matches(pattern: &str, name: &str) -> bool {
    match regex_body(pattern) {
        Some(body) => compile(pattern, body)
            .map(|regex| regex.is_match(name))
            .unwrap_or(false),
        None => pattern == name,
    }
}

pub fn matches_any<'a>(patterns: impl IntoIterator<Item = &'a String>, name: &str) -> bool {
    patterns.into_iter().any(|pattern| matches(pattern, name))
}
