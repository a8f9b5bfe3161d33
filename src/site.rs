//! Sites, pages and the interface to a wiki.

use std::fmt::{self, Debug, Display};

use compact_str::CompactString;

/// One language edition of a wiki family, e.g. `wikipedia:en`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Site {
    pub lang: CompactString,
    pub family: CompactString,
}

impl Site {
    pub fn new(lang: impl Into<CompactString>, family: impl Into<CompactString>) -> Self {
        Self {
            lang: lang.into(),
            family: family.into(),
        }
    }
}

impl Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.family, self.lang)
    }
}

impl Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Site({})", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub site: Site,
    pub title: CompactString,
}

impl PageRef {
    pub fn new(site: Site, title: impl Into<CompactString>) -> Self {
        Self {
            site,
            title: title.into(),
        }
    }
}

impl Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[[{}:{}]]", self.site.lang, self.title)
    }
}

/// The current state of a page as returned by the wiki.
#[derive(Clone, PartialEq, Eq)]
pub struct PageContent {
    pub text: String,
    pub exists: bool,
    pub redirect: bool,
    pub revision_id: Option<u64>,
    /// Timestamp of the current revision, used to detect edit conflicts.
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl PageContent {
    pub fn missing() -> Self {
        Self {
            text: String::new(),
            exists: false,
            redirect: false,
            revision_id: None,
            timestamp: None,
        }
    }
}

impl Debug for PageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageContent")
            .field("text.len", &self.text.len())
            .field("exists", &self.exists)
            .field("redirect", &self.redirect)
            .field("revision_id", &self.revision_id)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// An interlanguage link of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangLink {
    pub lang: CompactString,
    pub title: CompactString,
}

/// One batch of category members plus the token to request the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryBatch {
    pub titles: Vec<CompactString>,
    pub continue_from: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SaveRequest<'a> {
    pub page: &'a PageRef,
    pub text: &'a str,
    pub summary: &'a str,
    pub minor: bool,
    /// Timestamp of the revision the edit is based on.
    pub base_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub base_revision_id: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum WikiError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),
    #[error("malformed API response")]
    Json(#[from] serde_json::Error),
    #[error("API error `{code}`: {info}")]
    Api { code: String, info: String },
    #[error("unexpected API response: {0}")]
    UnexpectedResponse(String),
    #[error("login as `{user}` failed: {reason}")]
    Login { user: String, reason: String },
    #[error("page {0} does not exist")]
    MissingPage(String),
    #[error("page {0} is a redirect")]
    Redirect(String),
}

/// Everything the reference copier needs from a wiki.
pub trait WikiAccess {
    fn fetch_page(&self, page: &PageRef) -> Result<PageContent, WikiError>;

    /// All interlanguage links of `page`, in the order the wiki lists them.
    fn language_links(&self, page: &PageRef) -> Result<Vec<LangLink>, WikiError>;

    /// One batch of article titles in `category` (given without namespace
    /// prefix), starting at `continue_from`.
    fn category_members(
        &self,
        site: &Site,
        category: &str,
        continue_from: Option<&str>,
    ) -> Result<CategoryBatch, WikiError>;

    fn save_page(&self, request: &SaveRequest<'_>) -> Result<(), WikiError>;

    /// Fetch a page that must exist and must not be a redirect.
    fn fetch_article(&self, page: &PageRef) -> Result<PageContent, WikiError> {
        let content = self.fetch_page(page)?;
        if !content.exists {
            Err(WikiError::MissingPage(page.to_string()))
        } else if content.redirect {
            Err(WikiError::Redirect(page.to_string()))
        } else {
            Ok(content)
        }
    }
}
