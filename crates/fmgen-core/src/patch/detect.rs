/// Whether a regenerated document must be written back.
///
/// Nothing is written when the serialized block is unchanged or the full
/// text came out identical.
pub fn should_write(old_full: &str, new_full: &str, old_block: Option<&str>, new_block: &str) -> bool {
    if old_block == Some(new_block) {
        return false;
    }
    old_full != new_full
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_block_skips_write() {
        // Body normalisation alone never triggers a write.
        assert!(!should_write("---\na: 1\n---\nbody\n\n", "---\na: 1\n---\n\nbody", Some("a: 1\n"), "a: 1\n"));
    }

    #[test]
    fn test_identical_full_text_skips_write() {
        assert!(!should_write("x", "x", None, "a: 1\n"));
    }

    #[test]
    fn test_changed_block_writes() {
        assert!(should_write("---\na: 1\n---\n\nb", "---\na: 2\n---\n\nb", Some("a: 1\n"), "a: 2\n"));
        assert!(should_write("b", "---\na: 2\n---\n\nb", None, "a: 2\n"));
    }
}
