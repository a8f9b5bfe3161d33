//! ISBN → title extraction from a book catalog.
//!
//! [`extract`] is a single non-greedy regular expression over the raw text.
//! It does not understand XML: entities stay encoded and a `<title>` is
//! paired with whatever `isbn="…"` precedes it. [`extract_xml`] does the
//! same job with a real XML reader.

use std::{fmt, sync::LazyLock};

use quick_xml::events::Event;
use regex::Regex;
use rustc_hash::FxHashMap;

pub const DEFAULT_PATTERN: &str = r#"(?s)isbn="(.*?)".*?<title>(.*?)</title>"#;

static DEFAULT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(DEFAULT_PATTERN).unwrap());

pub const SAMPLE_CATALOG: &str = r#"
<catalog>
<book isbn="0-596-00128-2">
<title>Python &amp; XML</title>
<date>December 2001</date>
<author>Jones, Drake</author>
</book>
<book isbn="0-596-15810-6">
<title>Programming Python, 4th Edition</title>
<date>October 2010</date>
<author>Lutz</author>
</book>
<book isbn="0-596-15806-8">
<title>Learning Python, 4th Edition</title>
<date>September 2009</date>
<author>Lutz</author>
</book>
<book isbn="0-596-15808-4">
<title>Python Pocket Reference, 4th Edition</title>
<date>October 2009</date>
<author>Lutz</author>
</book>
<book isbn="0-596-00797-3">
<title>Python Cookbook, 2nd Edition</title>
<date>March 2005</date>
<author>Martelli, Ravenscroft, Ascher</author>
</book>
<book isbn="0-596-10046-9">
<title>Python in a Nutshell, 2nd Edition</title>
<date>July 2006</date>
<author>Martelli</author>
</book>
<!-- plus many more Python books that should appear here -->
</catalog> "#;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid pattern")]
    Pattern(#[from] regex::Error),
    #[error("pattern needs two capture groups (key, value), found {0}")]
    MissingGroups(usize),
    #[error("malformed catalog XML")]
    Xml(#[from] quick_xml::Error),
    #[error("catalog XML ends inside <{0}>")]
    UnexpectedEof(String),
}

/// String map that iterates in insertion order.
///
/// Inserting an existing key replaces its value but keeps its position.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<(String, String)>,
    index: FxHashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&i| self.entries[i].1.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.iter() {
            writeln!(f, "{}: {}", key, value)?;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for (key, value) in iter {
            catalog.insert(key, value);
        }
        catalog
    }
}

/// Compile a user supplied pattern; group 1 is the key, group 2 the value.
pub fn compile_pattern(pattern: &str) -> Result<Regex, CatalogError> {
    let regex = Regex::new(pattern)?;
    // captures_len counts the implicit whole-match group
    let groups = regex.captures_len() - 1;
    if groups < 2 {
        return Err(CatalogError::MissingGroups(groups));
    }
    Ok(regex)
}

/// Apply `pattern` to `text`, mapping capture group 1 to capture group 2.
///
/// Later matches for a key overwrite earlier ones. Text without matches
/// gives an empty catalog.
pub fn extract_pairs(text: &str, pattern: &Regex) -> Catalog {
    let mut catalog = Catalog::new();
    for captures in pattern.captures_iter(text) {
        let (Some(key), Some(value)) = (captures.get(1), captures.get(2)) else {
            continue;
        };
        if let Some(previous) = catalog.insert(key.as_str(), value.as_str()) {
            tracing::debug!(message = "duplicate key overwritten", key = key.as_str(), previous = %previous);
        }
    }
    catalog
}

/// [`extract_pairs`] with [`DEFAULT_PATTERN`].
pub fn extract(text: &str) -> Catalog {
    extract_pairs(text, &DEFAULT_REGEX)
}

/// Parse `text` as XML and map the `isbn` attribute of every `<book>` to
/// the text of its `<title>`. Entities are decoded.
pub fn extract_xml(text: &str) -> Result<Catalog, CatalogError> {
    let mut reader = quick_xml::Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut catalog = Catalog::new();
    let mut open_tags: Vec<String> = Vec::new();
    let mut isbn: Option<String> = None;
    let mut title: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "book" {
                    isbn = None;
                    title = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(quick_xml::Error::from)?;
                        if attr.key.as_ref() == b"isbn" {
                            isbn = Some(attr.unescape_value()?.into_owned());
                        }
                    }
                } else if name == "title" && open_tags.last().is_some_and(|tag| tag == "book") {
                    title = Some(String::new());
                }
                open_tags.push(name);
            }
            Event::Text(e) => {
                if let (Some(title), Some("title")) =
                    (title.as_mut(), open_tags.last().map(String::as_str))
                {
                    title.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let (Some(title), Some("title")) =
                    (title.as_mut(), open_tags.last().map(String::as_str))
                {
                    title.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) => {
                if open_tags.pop().as_deref() == Some("book") {
                    match (isbn.take(), title.take()) {
                        (Some(isbn), Some(title)) => {
                            catalog.insert(isbn, title);
                        }
                        (isbn, _) => {
                            tracing::debug!(message = "book without isbn or title skipped", ?isbn)
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match open_tags.pop() {
        Some(tag) => Err(CatalogError::UnexpectedEof(tag)),
        None => Ok(catalog),
    }
}
