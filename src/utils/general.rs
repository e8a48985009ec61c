//! Small string helpers shared by the documents and the CLI.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::unwrap_used)] // Compile-time constant regex pattern
static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());

/// Turns a document title into a file stem.
///
/// Every character outside `[a-z0-9]` (either case) becomes `_` and the result
/// is lowercased. An empty title yields `fallback`.
pub fn safe_filename(title: &str, fallback: &str) -> String {
    let stem = UNSAFE_FILENAME_CHARS
        .replace_all(title, "_")
        .to_lowercase();
    if stem.is_empty() {
        fallback.to_string()
    } else {
        stem
    }
}

/// Masks an API key for display, keeping at most the last four characters.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        n if n <= 8 => "*".repeat(n),
        n => {
            let tail: String = chars[n - 4..].iter().collect();
            format!("{}{tail}", "*".repeat(n - 4))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_filename_replaces_and_lowercases() {
        assert_eq!(safe_filename("My Comparison #1", "x"), "my_comparison__1");
        assert_eq!(safe_filename("GPT-4o vs Claude", "x"), "gpt_4o_vs_claude");
        assert_eq!(safe_filename("café", "x"), "caf_");
    }

    #[test]
    fn safe_filename_uses_fallback_for_empty_title() {
        assert_eq!(safe_filename("", "llm_comparison"), "llm_comparison");
    }

    #[test]
    fn mask_key_hides_all_but_tail() {
        assert_eq!(mask_key(""), "(not set)");
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key("sk-1234567890"), "*********7890");
    }
}
