//! Page selection from command line arguments.
//!
//! `-page:`, `-file:` and `-cat:` may be given any number of times; their
//! pages are visited in argument order, each title at most once, up to
//! `-limit:` pages. Category members are requested from the wiki lazily,
//! one API batch at a time.

use std::{collections::VecDeque, fs, io, path::PathBuf, sync::LazyLock};

use compact_str::CompactString;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::{
    options::split_option,
    prompt::Prompt,
    site::{PageRef, Site, WikiAccess, WikiError},
};

static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[\[(.+?)(?:\]\]|\|)").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("cannot read page list {}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid -limit value `{0}`")]
    Limit(String),
    #[error("failed to read answer")]
    Prompt(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PageSource {
    Titles(Vec<CompactString>),
    Category(CompactString),
}

fn normalize_title(title: &str) -> CompactString {
    let title = title.trim().replace('_', " ");
    CompactString::from(title.trim_start_matches(':'))
}

/// Titles listed in a text file: the targets of all `[[links]]` if there
/// are any, otherwise one title per non-empty line.
pub fn parse_page_list(text: &str) -> Vec<CompactString> {
    let links: Vec<_> = LINK
        .captures_iter(text)
        .map(|captures| normalize_title(&captures[1]))
        .filter(|title| !title.is_empty())
        .collect();
    if !links.is_empty() {
        return links;
    }

    text.lines()
        .map(normalize_title)
        .filter(|title| !title.is_empty())
        .collect()
}

#[derive(Debug, Clone)]
pub struct GeneratorFactory {
    site: Site,
    sources: Vec<PageSource>,
    limit: Option<usize>,
}

impl GeneratorFactory {
    pub fn new(site: Site) -> Self {
        Self {
            site,
            sources: Vec::new(),
            limit: None,
        }
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    pub fn has_generator(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Consume `arg` if it is a page selection argument. Missing values are
    /// asked for through `prompt`.
    pub fn handle_arg(
        &mut self,
        arg: &str,
        prompt: &mut dyn Prompt,
    ) -> Result<bool, GeneratorError> {
        let Some((name, value)) = split_option(arg) else {
            return Ok(false);
        };

        let mut value_or_ask = |question: &str| -> Result<String, GeneratorError> {
            match value {
                Some(value) if !value.is_empty() => Ok(value.to_string()),
                _ => Ok(prompt.input(question)?),
            }
        };

        match name {
            "page" => {
                let title = normalize_title(&value_or_ask("What page do you want to use?")?);
                self.sources.push(PageSource::Titles(vec![title]));
            }
            "file" => {
                let path = PathBuf::from(value_or_ask("Please enter the local file name:")?);
                let text = fs::read_to_string(&path)
                    .map_err(|source| GeneratorError::File { path, source })?;
                self.sources.push(PageSource::Titles(parse_page_list(&text)));
            }
            "cat" => {
                let category = normalize_title(&value_or_ask("Please enter the category name:")?);
                self.sources.push(PageSource::Category(category));
            }
            "limit" => {
                let value = value.unwrap_or_default();
                let limit = value
                    .parse()
                    .map_err(|_| GeneratorError::Limit(value.to_string()))?;
                self.limit = Some(limit);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// All selected pages as one stream, `None` if nothing was selected.
    pub fn combined<W: WikiAccess + ?Sized>(self, wiki: &W) -> Option<PageStream<'_, W>> {
        if !self.has_generator() {
            return None;
        }
        Some(PageStream {
            wiki,
            site: self.site,
            sources: self.sources.into(),
            pending: VecDeque::new(),
            category: None,
            seen: FxHashSet::default(),
            limit: self.limit,
            yielded: 0,
            failed: false,
        })
    }
}

#[derive(Debug)]
struct CategoryCursor {
    name: CompactString,
    continue_from: Option<String>,
}

/// Lazy iterator over the selected pages. Stops after the first error.
pub struct PageStream<'w, W: ?Sized> {
    wiki: &'w W,
    site: Site,
    sources: VecDeque<PageSource>,
    pending: VecDeque<CompactString>,
    category: Option<CategoryCursor>,
    seen: FxHashSet<CompactString>,
    limit: Option<usize>,
    yielded: usize,
    failed: bool,
}

impl<W: WikiAccess + ?Sized> Iterator for PageStream<'_, W> {
    type Item = Result<PageRef, WikiError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed || self.limit.is_some_and(|limit| self.yielded >= limit) {
                return None;
            }

            if let Some(title) = self.pending.pop_front() {
                if self.seen.insert(title.clone()) {
                    self.yielded += 1;
                    return Some(Ok(PageRef::new(self.site.clone(), title)));
                }
                continue;
            }

            if let Some(cursor) = self.category.take() {
                match self.wiki.category_members(
                    &self.site,
                    &cursor.name,
                    cursor.continue_from.as_deref(),
                ) {
                    Ok(batch) => {
                        self.pending.extend(batch.titles);
                        if let Some(next) = batch.continue_from {
                            self.category = Some(CategoryCursor {
                                name: cursor.name,
                                continue_from: Some(next),
                            });
                        }
                        continue;
                    }
                    Err(err) => {
                        self.failed = true;
                        return Some(Err(err));
                    }
                }
            }

            match self.sources.pop_front()? {
                PageSource::Titles(titles) => self.pending.extend(titles),
                PageSource::Category(name) => {
                    self.category = Some(CategoryCursor {
                        name,
                        continue_from: None,
                    })
                }
            }
        }
    }
}
