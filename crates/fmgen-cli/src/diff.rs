//! Line diffs for dry runs.

use colored::Colorize;
use similar::{ChangeTag, TextDiff};

/// Changed lines of `old` → `new`, `-`/`+` prefixed and coloured.
/// Unchanged lines are left out.
pub fn render(old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        let line = change.value().trim_end_matches('\n');
        match change.tag() {
            ChangeTag::Equal => {}
            ChangeTag::Delete => output.push_str(&format!("{}\n", format!("-{line}").red())),
            ChangeTag::Insert => output.push_str(&format!("{}\n", format!("+{line}").green())),
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_changed_lines() {
        colored::control::set_override(false);
        let old = "---\na: 1\n---\n\nbody";
        let new = "---\na: 2\n---\n\nbody";
        assert_eq!(render(old, new), "-a: 1\n+a: 2\n");
    }
}
