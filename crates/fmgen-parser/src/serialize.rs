//! Block serialization and document rendering.

use fmgen_core::{metadata_to_yaml, Metadata};

use crate::error::ParseResult;

/// YAML text for a metadata block, ending in a newline. An empty map
/// renders as the empty string.
pub fn serialize_block(metadata: &Metadata) -> ParseResult<String> {
    let mapping = metadata_to_yaml(metadata);
    if mapping.is_empty() {
        return Ok(String::new());
    }
    let mut text = serde_yaml::to_string(&mapping)?;
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

/// Canonical document text: fenced block, one blank line, trimmed body.
pub fn render_document(block_text: &str, body: &str) -> String {
    format!("---\n{block_text}---\n\n{}", body.trim())
}
