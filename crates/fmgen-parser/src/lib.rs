//! Document splitter
//!
//! Splits a markdown document into its YAML metadata block and body,
//! extracts body tags, and renders a metadata map back into block text.
//! This is not a markdown parser: only the leading block is understood.

pub mod error;
pub mod serialize;
pub mod split;
pub mod tags;

pub use error::{ParseError, ParseResult};
pub use serialize::{render_document, serialize_block};
pub use split::{normalize_line_endings, parse_block, split, ParsedDocument};
pub use tags::extract_tags;
