//! Making sure an article that uses references also lists them.

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use regex::Regex;

static HIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--.*?-->|<nowiki\s*>.*?</nowiki\s*>").unwrap()
});
static REF_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<ref[\s>/]").unwrap());

pub trait ReferenceListInserter {
    /// Return `text` with a reference list, adding one only if it is missing.
    fn ensure_reference_list(&self, text: &str) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceListError {
    #[error("invalid reference list template names")]
    Patterns(#[from] aho_corasick::BuildError),
    #[error("invalid section heading")]
    Heading(#[from] regex::Error),
}

/// How the reference list looks on the target wiki.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceListStyle {
    pub section_heading: String,
    pub markup: String,
    /// Templates that already render a reference list.
    pub recognized_templates: Vec<String>,
    /// Namespace prefixes of category links, e.g. `Category:`.
    pub category_prefixes: Vec<String>,
}

impl Default for ReferenceListStyle {
    fn default() -> Self {
        Self {
            section_heading: "حوالہ جات".to_string(),
            markup: "{{حوالہ جات}}".to_string(),
            recognized_templates: vec![
                "reflist".to_string(),
                "references".to_string(),
                "حوالہ جات".to_string(),
            ],
            category_prefixes: vec!["Category:".to_string(), "زمرہ:".to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoReferences {
    style: ReferenceListStyle,
    list_markers: AhoCorasick,
    heading: Regex,
}

impl NoReferences {
    pub fn new(style: ReferenceListStyle) -> Result<Self, ReferenceListError> {
        let mut patterns = vec!["<references".to_string()];
        for template in &style.recognized_templates {
            patterns.push(format!("{{{{{}", template));
            patterns.push(format!("{{{{ {}", template));
        }
        let list_markers = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(&patterns)?;

        let heading = Regex::new(&format!(
            r"(?m)^==\s*{}\s*==[ \t]*$",
            regex::escape(&style.section_heading)
        ))?;

        Ok(Self {
            style,
            list_markers,
            heading,
        })
    }

    /// Whether `text` uses `<ref>` tags without listing them anywhere.
    /// Comments and `<nowiki>` spans are ignored.
    pub fn lacks_references(&self, text: &str) -> bool {
        let visible = HIDDEN.replace_all(text, "");
        if !REF_TAG.is_match(&visible) {
            return false;
        }
        !self.list_markers.is_match(&*visible)
    }

    /// Insert the reference list: below an existing references heading,
    /// else as a new section above the trailing category links, else at the
    /// end.
    pub fn add_references(&self, text: &str) -> String {
        if let Some(heading) = self.heading.find(text) {
            let mut result = String::with_capacity(text.len() + self.style.markup.len() + 1);
            result.push_str(&text[..heading.end()]);
            result.push('\n');
            result.push_str(&self.style.markup);
            result.push_str(&text[heading.end()..]);
            return result;
        }

        let section = format!(
            "== {} ==\n{}",
            self.style.section_heading, self.style.markup
        );
        match self.trailing_categories_start(text) {
            Some(pos) => format!(
                "{}\n\n{}\n\n{}",
                text[..pos].trim_end(),
                section,
                &text[pos..]
            ),
            None => format!("{}\n\n{}\n", text.trim_end(), section),
        }
    }

    /// Start of the block of category links (and blank lines) that ends the
    /// article, if any.
    fn trailing_categories_start(&self, text: &str) -> Option<usize> {
        let body = text.trim_end();
        let mut start = None;
        let mut end = body.len();
        for line in body.rsplit('\n') {
            let line_start = end - line.len();
            end = line_start.saturating_sub(1);

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !self.is_category_link(trimmed) {
                break;
            }
            start = Some(line_start);
        }
        start
    }

    fn is_category_link(&self, line: &str) -> bool {
        let Some(target) = line.strip_prefix("[[") else {
            return false;
        };
        let target = target.trim_start();
        self.style.category_prefixes.iter().any(|prefix| {
            target.len() >= prefix.len()
                && target.is_char_boundary(prefix.len())
                && target[..prefix.len()].eq_ignore_ascii_case(prefix)
        })
    }
}

impl ReferenceListInserter for NoReferences {
    fn ensure_reference_list(&self, text: &str) -> String {
        if self.lacks_references(text) {
            self.add_references(text)
        } else {
            text.to_string()
        }
    }
}
