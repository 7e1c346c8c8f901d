//! Parser for feature-column artifacts.
//!
//! The training job stores the ordered column list in one of these forms:
//! - a JSON array of strings: `["surface", "rooms"]`
//! - a JSON string holding a list literal: `"['surface', 'rooms']"`
//! - a bare list literal: `['surface', 'rooms']` (single or double quotes)
//! - a pickled `list[str]`, or a pickled `str` holding a list literal
//!
//! A textual list is always parsed into its elements. It is never
//! treated as a single column name.

use crate::error::{Result, SchemaError};
use crate::pickle;
use std::iter::Peekable;
use std::str::Chars;

/// Decode an artifact blob into the ordered list of column names.
pub fn parse_artifact(bytes: &[u8]) -> Result<Vec<String>> {
    if pickle::is_pickle(bytes) {
        return match pickle::load(bytes)? {
            pickle::Object::List(columns) => Ok(columns),
            pickle::Object::Str(text) => parse_list_literal(&text),
        };
    }

    let text = std::str::from_utf8(bytes)?;
    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Err(SchemaError::malformed("artifact is empty"));
    }

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                serde_json::Value::String(column) => Ok(column),
                other => Err(SchemaError::malformed(format!(
                    "element {} is not a string: {}",
                    idx, other
                ))),
            })
            .collect(),
        // The list was serialized to its textual form before being stored
        Ok(serde_json::Value::String(inner)) => parse_list_literal(&inner),
        Ok(other) => Err(SchemaError::malformed(format!(
            "expected a list of column names, found {}",
            json_kind(&other)
        ))),
        Err(_) => parse_list_literal(text),
    }
}

/// Parse a list literal such as `['a', "b", 'c']` or `('a', 'b')`.
///
/// Only string elements are accepted. A trailing comma is allowed.
pub fn parse_list_literal(text: &str) -> Result<Vec<String>> {
    let trimmed = text.trim();
    let close = match trimmed.chars().next() {
        Some('[') => ']',
        Some('(') => ')',
        _ => return Err(SchemaError::malformed("expected a list literal")),
    };
    let inner = trimmed[1..]
        .strip_suffix(close)
        .ok_or_else(|| SchemaError::malformed("unterminated list literal"))?;

    let mut chars = inner.chars().peekable();
    let mut columns = Vec::new();

    loop {
        skip_whitespace(&mut chars);
        let quote = match chars.next() {
            None => break,
            Some(c @ ('\'' | '"')) => c,
            Some(c) => {
                return Err(SchemaError::malformed(format!(
                    "expected a quoted column name, found '{}'",
                    c
                )));
            }
        };
        columns.push(read_quoted(&mut chars, quote)?);

        skip_whitespace(&mut chars);
        match chars.next() {
            None => break,
            Some(',') => continue,
            Some(c) => {
                return Err(SchemaError::malformed(format!(
                    "expected ',' between elements, found '{}'",
                    c
                )));
            }
        }
    }

    Ok(columns)
}

fn read_quoted(chars: &mut Peekable<Chars<'_>>, quote: char) -> Result<String> {
    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err(SchemaError::malformed("unterminated string")),
            Some('\\') => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('r') => value.push('\r'),
                Some(escaped) => value.push(escaped),
                None => return Err(SchemaError::malformed("dangling escape")),
            },
            Some(c) if c == quote => return Ok(value),
            Some(c) => value.push(c),
        }
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
