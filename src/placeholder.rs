//! Placeholder tokens and their substitution into target-language text.
//!
//! A translated article carries one token per reference of the source
//! article, `و1و`, `و2و`, ... (marker, ordinal, marker). Substitution swaps
//! each token for the reference it stands for.

use memchr::memmem;

use crate::{references::ReferenceMap, utils::str_replace_opt};

pub const DEFAULT_MARKER: &str = "و";

pub fn token(ordinal: usize, marker: &str) -> String {
    format!("{marker}{ordinal}{marker}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub token: String,
    pub replacement: String,
}

/// One substitution per reference, in ordinal order.
///
/// Shorthand call-outs are inserted as they are; everything else is wrapped
/// in a fresh `<ref>` tag.
pub fn build_substitutions(references: &ReferenceMap, marker: &str) -> Vec<Substitution> {
    references
        .iter()
        .map(|entry| Substitution {
            token: token(entry.ordinal, marker),
            replacement: if entry.key.is_shorthand() {
                entry.content.clone()
            } else {
                format!("<ref>{}</ref>", entry.content)
            },
        })
        .collect()
}

/// Apply `substitutions` in order as literal replace-all operations.
///
/// Tokens that do not occur in `text` are skipped silently.
pub fn apply_substitutions(text: &str, substitutions: &[Substitution]) -> String {
    if cfg!(feature = "optimized-str") {
        apply_substitutions_optimized(text, substitutions)
    } else {
        apply_substitutions_naive(text, substitutions)
    }
}

#[doc(hidden)] /* only public for benchmarking */
pub fn apply_substitutions_naive(text: &str, substitutions: &[Substitution]) -> String {
    let mut text = text.to_string();
    for substitution in substitutions {
        text = text.replace(&substitution.token, &substitution.replacement);
    }
    text
}

#[doc(hidden)] /* only public for benchmarking */
pub fn apply_substitutions_optimized(text: &str, substitutions: &[Substitution]) -> String {
    let mut text = text.to_string();
    let mut scratch_buffer = String::new();
    for substitution in substitutions {
        let finder = memmem::Finder::new(substitution.token.as_bytes());
        (text, scratch_buffer) =
            str_replace_opt(text, &finder, &substitution.replacement, scratch_buffer);
    }
    text
}
