//! A deliberately small view on wikitext.
//!
//! Template call-outs (`{{name|...}}`) come from the `parse_wiki_text` node
//! tree, nested ones included. Inline tags (`<ref name="x">...</ref>`) are
//! found by scanning, since the node tree drops tag attributes and the
//! reference name lives in them.

use std::{ops::Range, sync::LazyLock};

use memchr::memmem;
use parse_wiki_text::{Configuration, Node};
use regex::Regex;

use crate::utils::normalize_name;

static OPENING_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z][A-Za-z0-9]*)((?:\s[^<>]*?)?)\s*(/)?>").unwrap()
});
static PARSER: LazyLock<Configuration> = LazyLock::new(Configuration::default);
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s=/>]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+)))?"#).unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    /// Byte range of the whole call-out, braces included.
    pub span: Range<usize>,
    /// The name as written, trimmed.
    pub name: String,
}

impl Template {
    pub fn source<'a>(&self, code: &'a Wikicode) -> &'a str {
        &code.text[self.span.clone()]
    }

    /// Compare against `name` the way MediaWiki resolves template names.
    pub fn has_name(&self, name: &str) -> bool {
        let own = normalize_name(&self.name);
        let own = match own.strip_prefix("template:") {
            Some(rest) => normalize_name(rest),
            None => own,
        };
        own == normalize_name(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Lowercased tag name.
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// `None` for self-closing and unterminated tags.
    pub contents: Option<String>,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Wikicode {
    text: String,
}

impl Wikicode {
    pub fn parse(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Byte ranges of all HTML comments. An unterminated comment runs to the
    /// end of the text.
    fn comment_spans(&self) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut pos = 0;
        while let Some(start) = memmem::find(&self.text.as_bytes()[pos..], b"<!--") {
            let start = pos + start;
            let end = memmem::find(&self.text.as_bytes()[start + 4..], b"-->")
                .map(|e| start + 4 + e + 3)
                .unwrap_or(self.text.len());
            spans.push(start..end);
            pos = end;
        }
        spans
    }

    /// All template call-outs in source order, including those nested in
    /// another template's arguments, in link text or in `<ref>` contents.
    ///
    /// Call-outs inside HTML comments are not reported. Unbalanced braces are
    /// plain text.
    pub fn templates(&self) -> Vec<Template> {
        let output = PARSER.parse(&self.text);
        if !output.warnings.is_empty() {
            tracing::debug!(
                message = "wikitext parsed with warnings",
                warnings = output.warnings.len()
            );
        }

        let mut templates = Vec::new();
        collect_templates(&self.text, 0, &output.nodes, &mut templates);
        templates.sort_by_key(|template| template.span.start);
        templates
    }

    /// All inline tags, ordered by their opening position. Tags nested in
    /// another tag's contents are reported as well.
    pub fn tags(&self) -> Vec<Tag> {
        let comments = self.comment_spans();
        let in_comment = |pos: usize| comments.iter().any(|c| c.contains(&pos));

        let mut tags = Vec::new();
        for captures in OPENING_TAG.captures_iter(&self.text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if in_comment(whole.start()) {
                continue;
            }

            let name = captures[1].to_ascii_lowercase();
            let attributes = captures
                .get(2)
                .map(|m| parse_attributes(m.as_str()))
                .unwrap_or_default();
            let self_closing = captures.get(3).is_some();

            let (contents, end) = if self_closing {
                (None, whole.end())
            } else {
                match find_closing_tag(&self.text, whole.end(), &name) {
                    Some(closing) => (
                        Some(self.text[whole.end()..closing.start].to_string()),
                        closing.end,
                    ),
                    None => (None, whole.end()),
                }
            };

            tags.push(Tag {
                name,
                attributes,
                contents,
                span: whole.start()..end,
            });
        }

        tags
    }

    pub fn replace_span(&mut self, span: Range<usize>, replacement: &str) {
        self.text.replace_range(span, replacement);
    }
}

/// Walk `nodes`, parsed from `text` which starts at byte `offset` of the
/// page.
fn collect_templates(text: &str, offset: usize, nodes: &[Node<'_>], templates: &mut Vec<Template>) {
    for node in nodes {
        match node {
            Node::Template {
                start,
                end,
                name,
                parameters,
            } => {
                let inner = &text[start + 2..end - 2];
                templates.push(Template {
                    span: offset + start..offset + end,
                    name: inner.split('|').next().unwrap_or_default().trim().to_string(),
                });
                collect_templates(text, offset, name, templates);
                for parameter in parameters {
                    if let Some(name) = &parameter.name {
                        collect_templates(text, offset, name, templates);
                    }
                    collect_templates(text, offset, &parameter.value, templates);
                }
            }
            Node::Category { ordinal: nodes, .. }
            | Node::ExternalLink { nodes, .. }
            | Node::Heading { nodes, .. }
            | Node::Preformatted { nodes, .. }
            | Node::Image { text: nodes, .. }
            | Node::Link { text: nodes, .. } => collect_templates(text, offset, nodes, templates),
            Node::Tag {
                start,
                end,
                name,
                nodes,
            } => {
                if name.eq_ignore_ascii_case("ref")
                    && nodes.iter().all(|node| matches!(node, Node::Text { .. }))
                {
                    collect_ref_contents(text, offset, *start..*end, templates);
                } else {
                    collect_templates(text, offset, nodes, templates);
                }
            }
            Node::Parameter { default, name, .. } => {
                collect_templates(text, offset, name, templates);
                if let Some(default) = default {
                    collect_templates(text, offset, default, templates);
                }
            }
            Node::DefinitionList { items, .. } => {
                for item in items {
                    collect_templates(text, offset, &item.nodes, templates);
                }
            }
            Node::OrderedList { items, .. } | Node::UnorderedList { items, .. } => {
                for item in items {
                    collect_templates(text, offset, &item.nodes, templates);
                }
            }
            Node::Table {
                attributes,
                captions,
                rows,
                ..
            } => {
                collect_templates(text, offset, attributes, templates);
                for caption in captions {
                    if let Some(attributes) = &caption.attributes {
                        collect_templates(text, offset, attributes, templates);
                    }
                    collect_templates(text, offset, &caption.content, templates);
                }
                for row in rows {
                    collect_templates(text, offset, &row.attributes, templates);
                    for cell in &row.cells {
                        if let Some(attributes) = &cell.attributes {
                            collect_templates(text, offset, attributes, templates);
                        }
                        collect_templates(text, offset, &cell.content, templates);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Parse the contents of a `<ref>` that the node tree kept as plain text.
fn collect_ref_contents(
    text: &str,
    offset: usize,
    span: Range<usize>,
    templates: &mut Vec<Template>,
) {
    let source = &text[span.clone()];
    let Some(open_end) = source.find('>') else {
        return;
    };
    let close_start = source.rfind("</").filter(|&close| close > open_end);
    let Some(close_start) = close_start else {
        return;
    };

    let contents = &source[open_end + 1..close_start];
    let output = PARSER.parse(contents);
    collect_templates(
        contents,
        offset + span.start + open_end + 1,
        &output.nodes,
        templates,
    );
}

fn parse_attributes(input: &str) -> Vec<Attribute> {
    ATTRIBUTE
        .captures_iter(input)
        .map(|captures| Attribute {
            name: captures[1].to_string(),
            value: captures
                .get(2)
                .or_else(|| captures.get(3))
                .or_else(|| captures.get(4))
                .map(|m| m.as_str().trim().to_string()),
        })
        .collect()
}

/// Locate `</name>` (any case, optional whitespace before `>`) at or after `from`.
fn find_closing_tag(text: &str, from: usize, name: &str) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    let mut pos = from;
    while let Some(offset) = memmem::find(&bytes[pos..], b"</") {
        let start = pos + offset;
        let name_end = start + 2 + name.len();
        if name_end <= bytes.len() && bytes[start + 2..name_end].eq_ignore_ascii_case(name.as_bytes())
        {
            let rest = &text[name_end..];
            let trimmed = rest.trim_start();
            if trimmed.starts_with('>') {
                let end = name_end + (rest.len() - trimmed.len()) + 1;
                return Some(start..end);
            }
        }
        pos = start + 2;
    }
    None
}
