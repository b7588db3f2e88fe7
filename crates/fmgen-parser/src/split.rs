//! Frontmatter / body split
//!
//! Only the leading `---` fenced block counts as metadata. A later pair of
//! horizontal rules inside the body is left alone.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use fmgen_core::{Metadata, Value};

use crate::error::{ParseError, ParseResult};
use crate::tags::extract_tags;

static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)\A(?:[ \t]*\n)*---[ \t]*\n(.*?)^---[ \t]*$\n?").unwrap()
});

/// A document split into metadata block and body.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    /// Input text after line-ending normalisation.
    pub full_text: String,
    /// Raw YAML between the fences, including its final newline.
    pub block_text: Option<String>,
    /// Parsed block; `None` when there is no block.
    pub metadata: Option<Metadata>,
    pub body: String,
    /// Tags found in the body.
    pub tags: Vec<String>,
}

impl ParsedDocument {
    pub fn has_block(&self) -> bool {
        self.block_text.is_some()
    }

    /// Value of a top-level metadata key, `Undefined` when absent.
    pub fn property(&self, key: &str) -> &Value {
        static UNDEFINED: Value = Value::Undefined;
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .unwrap_or(&UNDEFINED)
    }
}

/// `\r\n` and lone `\r` become `\n`.
pub fn normalize_line_endings(text: &str) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.to_string()
    }
}

/// Split `full_text` into metadata and body.
pub fn split(full_text: &str) -> ParseResult<ParsedDocument> {
    let full_text = normalize_line_endings(full_text);

    let Some(caps) = BLOCK_RE.captures(&full_text) else {
        trace!("no frontmatter block");
        let tags = extract_tags(&full_text);
        return Ok(ParsedDocument {
            body: full_text.clone(),
            full_text,
            block_text: None,
            metadata: None,
            tags,
        });
    };

    let whole = caps.get(0).map_or(0..0, |m| m.range());
    let block_text = caps.get(1).map_or("", |m| m.as_str()).to_string();
    let body = full_text[whole.end..].to_string();
    let metadata = parse_block(&block_text)?;
    let tags = extract_tags(&body);

    Ok(ParsedDocument {
        full_text,
        block_text: Some(block_text),
        metadata: Some(metadata),
        body,
        tags,
    })
}

/// YAML-parse block text into a metadata map.
pub fn parse_block(block_text: &str) -> ParseResult<Metadata> {
    if block_text.trim().is_empty() {
        return Ok(Metadata::new());
    }
    let node: serde_yaml::Value = serde_yaml::from_str(block_text)?;
    match Value::from_yaml(node.clone()) {
        Value::Map(map) => Ok(map),
        // A block holding only comments parses to null.
        Value::Null => Ok(Metadata::new()),
        _ => Err(ParseError::not_a_mapping(&node)),
    }
}
