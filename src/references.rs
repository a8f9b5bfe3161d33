//! Collecting reference tags from source-language wikitext.

use std::{
    fmt::{self, Display},
    ops::Range,
};

use rustc_hash::FxHashSet;

use crate::wikitext::Wikicode;

/// Tag names that carry a reference.
pub const REFERENCE_TAGS: &[&str] = &["ref", "sfn", "sfnp", "r"];

/// Template names that are wrapped into a tag of the same name before
/// collecting, so that they take part in the placeholder numbering.
pub const SHORTHAND_TEMPLATES: &[&str] = &["sfn", "sfnp", "r"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// `<ref>...</ref>`
    Ref,
    /// `{{sfn}}` shorthand citation
    Sfn,
    /// `{{sfnp}}` shorthand citation with page
    Sfnp,
    /// `{{r}}` grouped citation
    R,
}

impl RefKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ref" => Some(RefKind::Ref),
            "sfn" => Some(RefKind::Sfn),
            "sfnp" => Some(RefKind::Sfnp),
            "r" => Some(RefKind::R),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RefKind::Ref => "ref",
            RefKind::Sfn => "sfn",
            RefKind::Sfnp => "sfnp",
            RefKind::R => "r",
        }
    }

    pub fn is_shorthand(self) -> bool {
        !matches!(self, RefKind::Ref)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefKey {
    /// Value of the tag's first attribute, usually `name=`.
    Named(String),
    /// A `<ref>` without attributes.
    Unnamed,
    Shorthand(RefKind),
}

impl RefKey {
    pub fn is_shorthand(&self) -> bool {
        matches!(self, RefKey::Shorthand(_))
    }
}

impl Display for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefKey::Named(name) => write!(f, "{}", name),
            RefKey::Unnamed => write!(f, "NoRefName"),
            RefKey::Shorthand(kind) => write!(f, "{}", kind.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    /// 1-based, assigned in order of first appearance.
    pub ordinal: usize,
    pub kind: RefKind,
    pub key: RefKey,
    pub content: String,
}

/// Collected references, ordered by ordinal. Ordinals are contiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMap {
    entries: Vec<RefEntry>,
}

impl ReferenceMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, ordinal: usize) -> Option<&RefEntry> {
        ordinal
            .checked_sub(1)
            .and_then(|index| self.entries.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RefEntry> {
        self.entries.iter()
    }

    fn push(&mut self, kind: RefKind, key: RefKey, content: String) {
        let ordinal = self.entries.len() + 1;
        self.entries.push(RefEntry {
            ordinal,
            kind,
            key,
            content,
        });
    }
}

// `r` call-outs are deduplicated among themselves only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DedupClass {
    Citation,
    Grouped,
}

impl From<RefKind> for DedupClass {
    fn from(kind: RefKind) -> Self {
        match kind {
            RefKind::R => DedupClass::Grouped,
            _ => DedupClass::Citation,
        }
    }
}

/// Collects the references of one page.
///
/// Create one collector per page; the shorthand template list is per
/// collector.
#[derive(Debug, Default)]
pub struct ReferenceCollector {
    shorthand_templates: Vec<String>,
}

impl ReferenceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{{sfn}}` call-outs seen so far, each recorded once.
    pub fn shorthand_templates(&self) -> &[String] {
        &self.shorthand_templates
    }

    /// Wrap shorthand templates into tags, then collect all reference tags
    /// with distinct contents.
    ///
    /// `code` is modified in place by the wrapping step.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn collect(&mut self, code: &mut Wikicode) -> ReferenceMap {
        self.wrap_shorthand_templates(code);

        let mut references = ReferenceMap::default();
        let mut seen: FxHashSet<(DedupClass, String)> = FxHashSet::default();

        for tag in code.tags() {
            if !REFERENCE_TAGS.contains(&tag.name.as_str()) {
                continue;
            }
            let Some(kind) = RefKind::from_name(&tag.name) else {
                continue;
            };

            let key = if kind.is_shorthand() {
                RefKey::Shorthand(kind)
            } else {
                match tag.attributes.first() {
                    None => RefKey::Unnamed,
                    Some(attribute) => match attribute.value.as_deref() {
                        Some(value) if !value.is_empty() => RefKey::Named(value.to_string()),
                        _ => RefKey::Unnamed,
                    },
                }
            };

            let content = match tag.contents {
                Some(content) if !content.is_empty() => content,
                _ => {
                    tracing::debug!(message = "skipping reference without content", key = %key);
                    continue;
                }
            };

            if seen.insert((kind.into(), content.clone())) {
                references.push(kind, key, content);
            }
        }

        tracing::debug!(collected = references.len());
        references
    }

    fn wrap_shorthand_templates(&mut self, code: &mut Wikicode) {
        let mut replacements = Vec::new();
        for template in code.templates() {
            let Some(kind) = SHORTHAND_TEMPLATES
                .iter()
                .find(|name| template.has_name(name))
                .and_then(|name| RefKind::from_name(name))
            else {
                continue;
            };

            let source = template.source(code);
            if kind == RefKind::Sfn && !self.shorthand_templates.iter().any(|s| s == source) {
                self.shorthand_templates.push(source.to_string());
            }

            if is_wrapped(code.as_str(), &template.span, kind.name()) {
                continue;
            }

            replacements.push((template.span, kind));
        }

        // Back to front, so nested call-outs are wrapped before the ones
        // around them. An outer span grows by the tags added inside it.
        let mut wrapped_spans: Vec<(Range<usize>, usize)> = Vec::new();
        for (span, kind) in replacements.into_iter().rev() {
            let grown: usize = wrapped_spans
                .iter()
                .filter(|(inner, _)| span.start <= inner.start && inner.end <= span.end)
                .map(|(_, added)| added)
                .sum();
            let current = span.start..span.end + grown;
            let wrapped = format!("<{0}>{1}</{0}>", kind.name(), &code.as_str()[current.clone()]);
            let added = wrapped.len() - current.len();
            code.replace_span(current, &wrapped);
            wrapped_spans.push((span, added));
        }
    }
}

/// Whether `span` is already the sole content of a `<name>` tag.
fn is_wrapped(text: &str, span: &Range<usize>, name: &str) -> bool {
    let before = text[..span.start].trim_end().as_bytes();
    let after = text[span.end..].trim_start().as_bytes();

    let opening = format!("<{}>", name);
    let closing = format!("</{}>", name);
    before.len() >= opening.len()
        && before[before.len() - opening.len()..].eq_ignore_ascii_case(opening.as_bytes())
        && after.len() >= closing.len()
        && after[..closing.len()].eq_ignore_ascii_case(closing.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn collect(text: &str) -> (ReferenceMap, ReferenceCollector, Wikicode) {
        let mut code = Wikicode::parse(text);
        let mut collector = ReferenceCollector::new();
        let references = collector.collect(&mut code);
        (references, collector, code)
    }

    #[test]
    fn test_named_and_unnamed() {
        let (references, _, _) =
            collect(r#"A<ref name="x">Smith 2020</ref> B<ref>Jones 1999</ref>"#);
        assert_eq!(references.len(), 2);

        let first = references.get(1).unwrap();
        assert_eq!(first.key, RefKey::Named("x".into()));
        assert_eq!(first.content, "Smith 2020");
        assert_eq!(first.kind, RefKind::Ref);

        let second = references.get(2).unwrap();
        assert_eq!(second.key, RefKey::Unnamed);
        assert_eq!(second.key.to_string(), "NoRefName");
        assert_eq!(second.content, "Jones 1999");
    }

    #[test]
    fn test_first_attribute_is_the_key() {
        let (references, _, _) = collect(r#"<ref group="notes" name="a">Note</ref>"#);
        assert_eq!(references.get(1).unwrap().key, RefKey::Named("notes".into()));
    }

    #[test]
    fn test_identical_content_different_names() {
        let (references, _, _) =
            collect(r#"<ref name="a">Same</ref> <ref name="b">Same</ref> <ref>Same</ref>"#);
        assert_eq!(references.len(), 1);
        assert_eq!(references.get(1).unwrap().key, RefKey::Named("a".into()));
    }

    #[test]
    fn test_empty_and_self_closing_are_skipped() {
        let (references, _, _) =
            collect(r#"<ref name="a" /> <ref name="b"></ref> <ref name="c">C</ref>"#);
        assert_eq!(references.len(), 1);
        assert_eq!(references.get(1).unwrap().content, "C");
        assert_eq!(references.get(1).unwrap().ordinal, 1);
    }

    #[test]
    fn test_other_tags_are_ignored() {
        let (references, _, _) = collect("<div>x</div><small>y</small><ref>z</ref>");
        assert_eq!(references.len(), 1);
        assert_eq!(references.get(1).unwrap().content, "z");
    }

    #[test]
    fn test_shorthand_templates_are_wrapped_and_collected() {
        // the collector used to fail on pages with `{{sfn}}`; it now records
        // them and numbers them like any other reference
        let (references, collector, code) = collect(
            "Claim.{{sfn|Jhaveri|2001|pp=149}} Other.{{sfnp|Lutz|2010}} Group.{{r|a|b}} Again.{{Sfn|Jhaveri|2001|pp=149}}",
        );

        assert!(code
            .as_str()
            .contains("<sfn>{{sfn|Jhaveri|2001|pp=149}}</sfn>"));
        assert!(code.as_str().contains("<sfnp>{{sfnp|Lutz|2010}}</sfnp>"));
        assert!(code.as_str().contains("<r>{{r|a|b}}</r>"));
        assert!(code.as_str().contains("<sfn>{{Sfn|Jhaveri|2001|pp=149}}</sfn>"));

        assert_eq!(
            collector.shorthand_templates(),
            &[
                "{{sfn|Jhaveri|2001|pp=149}}".to_string(),
                "{{Sfn|Jhaveri|2001|pp=149}}".to_string()
            ]
        );

        let collected: Vec<_> = references
            .iter()
            .map(|entry| (entry.ordinal, entry.key.clone(), entry.content.as_str()))
            .collect();
        assert_eq!(
            collected,
            vec![
                (
                    1,
                    RefKey::Shorthand(RefKind::Sfn),
                    "{{sfn|Jhaveri|2001|pp=149}}"
                ),
                (2, RefKey::Shorthand(RefKind::Sfnp), "{{sfnp|Lutz|2010}}"),
                (3, RefKey::Shorthand(RefKind::R), "{{r|a|b}}"),
                (
                    4,
                    RefKey::Shorthand(RefKind::Sfn),
                    "{{Sfn|Jhaveri|2001|pp=149}}"
                ),
            ]
        );
    }

    #[test]
    fn test_shorthand_inside_ref() {
        let (references, _, _) = collect("<ref>{{sfn|A|1}}</ref>");
        // the ref itself and the wrapped call-out inside it
        assert_eq!(references.len(), 2);
        assert_eq!(references.get(1).unwrap().content, "<sfn>{{sfn|A|1}}</sfn>");
        assert_eq!(references.get(2).unwrap().content, "{{sfn|A|1}}");
    }

    #[test]
    fn test_shorthand_nested_in_note_template() {
        let (references, collector, code) =
            collect("Claim.{{efn|A note.{{sfn|Khan|2001|p=3}}}} Later.<ref>Jones</ref>");
        assert_eq!(
            code.as_str(),
            "Claim.{{efn|A note.<sfn>{{sfn|Khan|2001|p=3}}</sfn>}} Later.<ref>Jones</ref>"
        );
        assert_eq!(
            collector.shorthand_templates(),
            &["{{sfn|Khan|2001|p=3}}".to_string()]
        );

        let collected: Vec<_> = references
            .iter()
            .map(|entry| (entry.ordinal, entry.content.as_str()))
            .collect();
        assert_eq!(collected, vec![(1, "{{sfn|Khan|2001|p=3}}"), (2, "Jones")]);
    }

    #[test]
    fn test_shorthand_nested_in_shorthand() {
        let (references, _, code) = collect("{{r|a|{{sfn|B|2}}}} {{sfnp|C|3}}");
        assert_eq!(
            code.as_str(),
            "<r>{{r|a|<sfn>{{sfn|B|2}}</sfn>}}</r> <sfnp>{{sfnp|C|3}}</sfnp>"
        );
        let kinds: Vec<_> = references.iter().map(|entry| entry.kind).collect();
        assert_eq!(kinds, vec![RefKind::R, RefKind::Sfn, RefKind::Sfnp]);
        assert_eq!(
            references.get(1).unwrap().content,
            "{{r|a|<sfn>{{sfn|B|2}}</sfn>}}"
        );
    }

    #[test]
    fn test_already_wrapped_templates_stay_single() {
        let (references, collector, code) = collect("<sfn>{{sfn|A|1}}</sfn> <r> {{r|b}} </r>");
        assert_eq!(code.as_str(), "<sfn>{{sfn|A|1}}</sfn> <r> {{r|b}} </r>");
        assert_eq!(collector.shorthand_templates(), &["{{sfn|A|1}}".to_string()]);
        assert_eq!(references.len(), 2);
        assert_eq!(references.get(2).unwrap().content, " {{r|b}} ");
    }

    #[test]
    fn test_grouped_citations_are_deduplicated_separately() {
        let (references, _, _) = collect("<ref>Shared</ref> <r>Shared</r> <r>Shared</r>");
        assert_eq!(references.len(), 2);
        assert_eq!(references.get(1).unwrap().kind, RefKind::Ref);
        assert_eq!(references.get(2).unwrap().kind, RefKind::R);
        assert_eq!(references.get(2).unwrap().key, RefKey::Shorthand(RefKind::R));
    }

    #[test]
    fn test_get_out_of_range() {
        let (references, _, _) = collect("<ref>a</ref>");
        assert!(references.get(0).is_none());
        assert!(references.get(2).is_none());
    }

    proptest! {
        #[test]
        fn ordinals_are_contiguous(contents in proptest::collection::vec("[a-z ]{0,6}", 0..20)) {
            let text: String = contents
                .iter()
                .map(|content| format!("<ref>{}</ref>", content))
                .collect();
            let (references, _, _) = collect(&text);

            let ordinals: Vec<usize> = references.iter().map(|entry| entry.ordinal).collect();
            let expected: Vec<usize> = (1..=references.len()).collect();
            prop_assert_eq!(ordinals, expected);

            let mut distinct: Vec<&str> = Vec::new();
            for content in &contents {
                if !content.is_empty() && !distinct.contains(&content.as_str()) {
                    distinct.push(content);
                }
            }
            let collected: Vec<&str> = references.iter().map(|entry| entry.content.as_str()).collect();
            prop_assert_eq!(collected, distinct);
        }
    }
}
