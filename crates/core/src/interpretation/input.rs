//! Classifier input normalisation and cache keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The text actually sent to the classifier, with its cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedInput {
    /// Normalised and truncated.
    pub text: String,
    /// Character count of the normalised text before truncation.
    pub input_chars: usize,
    pub input_truncated: bool,
    pub input_hash: String,
}

/// Trim and lowercase.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Keep the first `max_chars` characters. Returns whether anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// SHA-256 hex over `text|prompt_version|model|context_digest`.
pub fn compute_input_hash(
    text: &str,
    prompt_version: &str,
    model: &str,
    context_digest: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"|");
    hasher.update(prompt_version.as_bytes());
    hasher.update(b"|");
    hasher.update(model.as_bytes());
    hasher.update(b"|");
    hasher.update(context_digest.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stable digest of surrounding conversation context. Empty context digests
/// to the empty string so context-free inputs share cache entries.
pub fn context_digest<S: AsRef<str>>(context: &[S]) -> String {
    if context.is_empty() {
        return String::new();
    }
    let mut hasher = Sha256::new();
    for (i, part) in context.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(normalize_text(part.as_ref()).as_bytes());
    }
    hex::encode(&hasher.finalize()[..8])
}

/// Normalise, truncate and hash. The hash covers the truncated text only.
pub fn prepare_input(
    text: &str,
    max_chars: usize,
    prompt_version: &str,
    model: &str,
    context_digest: &str,
) -> PreparedInput {
    let normalized = normalize_text(text);
    let input_chars = normalized.chars().count();
    let (truncated, input_truncated) = truncate_chars(&normalized, max_chars);
    let input_hash = compute_input_hash(&truncated, prompt_version, model, context_digest);
    PreparedInput {
        text: truncated,
        input_chars,
        input_truncated,
        input_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_text("  Call Me LATER \n"), "call me later");
    }

    #[test]
    fn test_truncate_is_char_based() {
        assert_eq!(truncate_chars("héllo", 2), ("hé".to_string(), true));
        assert_eq!(truncate_chars("héllo", 5), ("héllo".to_string(), false));
        assert_eq!(truncate_chars("", 3), (String::new(), false));
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = prepare_input(" Maybe Next Week ", 100, "v1", "m", "");
        let b = prepare_input("maybe next week", 100, "v1", "m", "");
        assert_eq!(a.input_hash, b.input_hash);
        assert_eq!(a.input_hash.len(), 64);
        assert!(!a.input_truncated);
        assert_eq!(a.input_chars, 15);
    }

    #[test]
    fn test_hash_covers_truncated_text_only() {
        let long_a = format!("{}{}", "x".repeat(50), "tail one");
        let long_b = format!("{}{}", "x".repeat(50), "a different tail");
        let a = prepare_input(&long_a, 50, "v1", "m", "");
        let b = prepare_input(&long_b, 50, "v1", "m", "");
        assert!(a.input_truncated);
        assert_eq!(a.text.chars().count(), 50);
        assert_eq!(a.input_chars, 58);
        assert_eq!(a.input_hash, b.input_hash);
    }

    #[test]
    fn test_truncation_changes_hash() {
        let full = prepare_input("maybe next week", 100, "v1", "m", "");
        let cut = prepare_input("maybe next week", 5, "v1", "m", "");
        assert_ne!(full.input_hash, cut.input_hash);
    }

    #[test]
    fn test_hash_depends_on_every_part() {
        let base = compute_input_hash("t", "v1", "m", "c");
        assert_ne!(base, compute_input_hash("t", "v2", "m", "c"));
        assert_ne!(base, compute_input_hash("t", "v1", "m2", "c"));
        assert_ne!(base, compute_input_hash("t", "v1", "m", "d"));
    }

    #[test]
    fn test_context_digest() {
        assert_eq!(context_digest::<&str>(&[]), "");
        let a = context_digest(&["Hi", "price?"]);
        assert_eq!(a, context_digest(&["hi ", "PRICE?"]));
        assert_ne!(a, context_digest(&["hi", "price"]));
        assert_eq!(a.len(), 16);
    }
}
