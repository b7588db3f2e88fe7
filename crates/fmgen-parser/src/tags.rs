//! Inline `#tag` extraction

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#([\p{L}\p{N}_/\-]+)").unwrap());

/// Tags in `body`, in order of first appearance, without the leading `#`.
///
/// Fenced code blocks, inline code spans and URL fragments are skipped,
/// as are purely numeric tokens such as `#123`.
pub fn extract_tags(body: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut fence: Option<&str> = None;

    for line in body.lines() {
        let trimmed = line.trim_start();
        if let Some(open) = fence {
            if trimmed.starts_with(open) {
                fence = None;
            }
            continue;
        }
        if trimmed.starts_with("```") {
            fence = Some("```");
            continue;
        }
        if trimmed.starts_with("~~~") {
            fence = Some("~~~");
            continue;
        }

        for caps in TAG_RE.captures_iter(line) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let start = whole.start();
            if !starts_token(line, start) || in_code_span(line, start) || in_url(line, start) {
                continue;
            }
            let name = name.as_str().trim_end_matches('/');
            if name.is_empty() || name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if !tags.iter().any(|t| t == name) {
                tags.push(name.to_string());
            }
        }
    }
    tags
}

/// `#` must open the line or follow whitespace or punctuation.
fn starts_token(line: &str, start: usize) -> bool {
    match line[..start].chars().next_back() {
        None => true,
        Some(prev) => prev.is_whitespace() || (prev.is_ascii_punctuation() && prev != '#' && prev != '&'),
    }
}

fn in_code_span(line: &str, start: usize) -> bool {
    line[..start].matches('`').count() % 2 == 1
}

fn in_url(line: &str, start: usize) -> bool {
    let word_start = line[..start]
        .rfind(char::is_whitespace)
        .map_or(0, |idx| idx + 1);
    let word = &line[word_start..start];
    word.contains("://") || word.starts_with("www.")
}
