//! Collapsing duplicate references into one named definition plus
//! back-references.

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

static REFS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<ref(?P<params>[^>/]*)>(?P<content>.*?)</ref>").unwrap()
});
static GROUPS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)group\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#).unwrap()
});
static NAMES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)name\s*=\s*(?:"\s*([^"]*?)\s*"|'\s*([^']*?)\s*'|([^\s>"'/]+))"#).unwrap()
});

pub const DEFAULT_AUTOGENERATED_NAME: &str = "autogenerated";

pub trait ReferenceDeduplicator {
    fn deduplicate(&self, text: &str) -> String;
}

#[derive(Debug, Default)]
struct ContentRefs {
    /// First name seen for this content, with whether it was double-quoted.
    name: Option<(String, bool)>,
    /// Every full `<ref>...</ref>` occurrence, in order.
    occurrences: Vec<String>,
    /// The name this content would get is already taken by another content.
    name_taken: bool,
}

/// Replaces repeated `<ref>` definitions with named back-references.
///
/// For every reference content that appears more than once, the first
/// occurrence becomes `<ref name=N>content</ref>` and all later ones
/// `<ref name=N />`. `N` is the name the content already had, or
/// `"autogenerated<k>"` for the smallest unused `k`.
#[derive(Debug, Clone)]
pub struct DuplicateReferences {
    autogenerated_name: String,
}

impl Default for DuplicateReferences {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOGENERATED_NAME)
    }
}

impl DuplicateReferences {
    pub fn new(autogenerated_name: impl Into<String>) -> Self {
        Self {
            autogenerated_name: autogenerated_name.into(),
        }
    }

    pub fn process(&self, text: &str) -> String {
        // group -> content -> refs, both in order of first appearance
        let mut groups: Vec<(Option<String>, Vec<(String, ContentRefs)>)> = Vec::new();
        let mut group_index: FxHashMap<Option<String>, usize> = FxHashMap::default();
        let mut content_index: FxHashMap<(usize, String), usize> = FxHashMap::default();
        let mut found_names: FxHashSet<String> = FxHashSet::default();
        // bare back-references to a second name of some content
        let mut renamed: Vec<(String, String, bool)> = Vec::new();

        for captures in REFS.captures_iter(text) {
            let content = &captures["content"];
            if content.trim().is_empty() {
                continue;
            }
            let params = &captures["params"];

            let group = GROUPS.captures(params).and_then(|c| first_capture(&c));
            let group_id = *group_index.entry(group.clone()).or_insert_with(|| {
                groups.push((group, Vec::new()));
                groups.len() - 1
            });
            let contents = &mut groups[group_id].1;
            let content_id = *content_index
                .entry((group_id, content.to_string()))
                .or_insert_with(|| {
                    contents.push((content.to_string(), ContentRefs::default()));
                    contents.len() - 1
                });
            let refs = &mut contents[content_id].1;
            refs.occurrences.push(captures[0].to_string());

            if let Some(name) = NAMES.captures(params) {
                let quoted = name.get(1).is_some();
                let Some(name) = first_capture(&name) else {
                    continue;
                };

                match refs.name.clone() {
                    Some((first, first_quoted)) => {
                        if first != name {
                            renamed.push((name.clone(), first, first_quoted));
                        }
                    }
                    None if found_names.contains(&name) => refs.name_taken = true,
                    None => refs.name = Some((name.clone(), quoted)),
                }
                found_names.insert(name);
            }
        }

        let mut text = text.to_string();
        let mut autogenerated_id = 1;
        let mut next_autogenerated = |found_names: &FxHashSet<String>| loop {
            let candidate = format!("{}{}", self.autogenerated_name, autogenerated_id);
            autogenerated_id += 1;
            if !found_names.contains(&candidate) {
                return candidate;
            }
        };

        for (group, contents) in &groups {
            let group_attribute = group
                .as_ref()
                .map(|g| format!("group=\"{}\" ", g))
                .unwrap_or_default();

            for (content, refs) in contents {
                if refs.occurrences.len() == 1 && !refs.name_taken {
                    continue;
                }

                let name = match &refs.name {
                    Some((name, true)) => format!("\"{}\"", name),
                    Some((name, false)) => name.clone(),
                    None => format!("\"{}\"", next_autogenerated(&found_names)),
                };

                let named = format!("<ref {}name={}>{}</ref>", group_attribute, name, content);
                text = text.replacen(&refs.occurrences[0], &named, 1);

                // later occurrences only, the named definition stays
                let Some(pos) = text.find(&named).map(|p| p + named.len()) else {
                    continue;
                };
                let unnamed = format!("<ref {}name={} />", group_attribute, name);
                let mut end = text[pos..].to_string();
                for occurrence in &refs.occurrences[1..] {
                    end = end.replace(occurrence, &unnamed);
                }
                text.truncate(pos);
                text.push_str(&end);
            }
        }

        for (old, new, quoted) in renamed {
            let pattern = format!(
                r#"<ref name\s*=\s*(?:"\s*{0}\s*"|{0})\s*/>"#,
                regex::escape(&old)
            );
            let Ok(back_reference) = Regex::new(&pattern) else {
                continue;
            };
            let new = if quoted { format!("\"{}\"", new) } else { new };
            let replacement = format!("<ref name={} />", new);
            text = back_reference
                .replace_all(&text, regex::NoExpand(&replacement))
                .into_owned();
        }

        text
    }
}

impl ReferenceDeduplicator for DuplicateReferences {
    fn deduplicate(&self, text: &str) -> String {
        self.process(text)
    }
}

fn first_capture(captures: &regex::Captures<'_>) -> Option<String> {
    captures
        .iter()
        .skip(1)
        .flatten()
        .next()
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dedup(text: &str) -> String {
        DuplicateReferences::default().process(text)
    }

    #[test]
    fn test_unique_references_untouched() {
        let text = "A<ref>One</ref> B<ref name=\"b\">Two</ref>";
        assert_eq!(dedup(text), text);
    }

    #[test]
    fn test_unnamed_duplicates_get_autogenerated_name() {
        let text = "A<ref>Same</ref> B<ref>Same</ref> C<ref>Same</ref>";
        assert_eq!(
            dedup(text),
            "A<ref name=\"autogenerated1\">Same</ref> B<ref name=\"autogenerated1\" /> C<ref name=\"autogenerated1\" />"
        );
    }

    #[test]
    fn test_existing_name_is_reused() {
        let text = "A<ref>Same</ref> B<ref name=\"s\">Same</ref>";
        assert_eq!(
            dedup(text),
            "A<ref name=\"s\">Same</ref> B<ref name=\"s\" />"
        );
    }

    #[test]
    fn test_unquoted_name_stays_unquoted() {
        let text = "A<ref name=s>Same</ref> B<ref>Same</ref>";
        assert_eq!(dedup(text), "A<ref name=s>Same</ref> B<ref name=s />");
    }

    #[test]
    fn test_autogenerated_name_skips_used_names() {
        let text = "<ref name=\"autogenerated1\">X</ref><ref>Y</ref><ref>Y</ref>";
        assert_eq!(
            dedup(text),
            "<ref name=\"autogenerated1\">X</ref><ref name=\"autogenerated2\">Y</ref><ref name=\"autogenerated2\" />"
        );
    }

    #[test]
    fn test_second_name_back_references_are_redirected() {
        let text = "<ref name=\"a\">Same</ref><ref name=\"b\">Same</ref><ref name=\"b\" />";
        assert_eq!(
            dedup(text),
            "<ref name=\"a\">Same</ref><ref name=\"a\" /><ref name=\"a\" />"
        );
    }

    #[test]
    fn test_groups_are_kept_apart() {
        let text = "<ref group=\"n\">Same</ref><ref>Same</ref><ref group=\"n\">Same</ref>";
        assert_eq!(
            dedup(text),
            "<ref group=\"n\" name=\"autogenerated1\">Same</ref><ref>Same</ref><ref group=\"n\" name=\"autogenerated1\" />"
        );
    }

    #[test]
    fn test_empty_contents_ignored() {
        let text = "<ref></ref><ref> </ref>";
        assert_eq!(dedup(text), text);
    }

    #[test]
    fn test_idempotent() {
        let text = "A<ref>Same</ref> B<ref>Same</ref> C<ref name=x>Other</ref> D<ref>Other</ref>";
        let once = dedup(text);
        assert_eq!(dedup(&once), once);
    }
}
