//! Documents produced by this crate split back into the same pieces.

use fmgen_core::{Metadata, Value};
use fmgen_parser::{render_document, serialize_block, split};
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        (-10_000i64..10_000).prop_map(Value::Integer),
        "[a-z][a-z ]{0,8}[a-z]".prop_map(Value::String),
    ]
}

fn metadata() -> impl Strategy<Value = Metadata> {
    prop::collection::vec(("[a-z]{1,6}", scalar()), 1..6).prop_map(|pairs| pairs.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_render_split_roundtrip(meta in metadata(), body in "[a-z \\n]{0,40}") {
        let block = serialize_block(&meta).unwrap();
        let full = render_document(&block, &body);
        let doc = split(&full).unwrap();

        prop_assert_eq!(doc.block_text.as_deref(), Some(block.as_str()));
        prop_assert_eq!(doc.metadata.as_ref(), Some(&meta));
        prop_assert_eq!(render_document(&block, &doc.body), full);
    }
}

#[test]
fn test_block_injected_at_position_zero_is_accepted() {
    let full = format!("---\ntitle: x\n---\n{}", "existing body");
    let doc = split(&full).unwrap();
    assert_eq!(doc.body, "existing body");
}
