//! In-memory stand-ins for the wiki and the operator.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    io,
    rc::Rc,
};

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use crate::{
    dedup::{DuplicateReferences, ReferenceDeduplicator},
    prompt::{Choice, Prompt},
    reflist::{NoReferences, ReferenceListInserter, ReferenceListStyle},
    site::{CategoryBatch, LangLink, PageContent, PageRef, SaveRequest, Site, WikiAccess, WikiError},
};

pub mod prelude {
    pub(crate) use super::{
        en, page_content, ur, CountingDeduplicator, CountingReferenceList, FakeWiki,
        ScriptedPrompt,
    };
}

pub fn ur(title: &str) -> PageRef {
    PageRef::new(Site::new("ur", "wikipedia"), title)
}

pub fn en(title: &str) -> PageRef {
    PageRef::new(Site::new("en", "wikipedia"), title)
}

pub fn page_content(text: &str) -> PageContent {
    PageContent {
        text: text.to_string(),
        exists: true,
        redirect: false,
        revision_id: Some(1),
        timestamp: chrono::DateTime::from_timestamp(1_700_000_000, 0),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedEdit {
    pub page: PageRef,
    pub text: String,
    pub summary: String,
    pub minor: bool,
    pub base_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub base_revision_id: Option<u64>,
}

/// A wiki held in memory. Records every call it receives.
///
/// Language links of pages that were never registered fail like an API
/// error would.
#[derive(Debug, Default)]
pub struct FakeWiki {
    pages: FxHashMap<PageRef, PageContent>,
    language_links: FxHashMap<PageRef, Vec<LangLink>>,
    categories: FxHashMap<CompactString, Vec<Vec<CompactString>>>,
    save_error: Option<String>,
    calls: RefCell<Vec<String>>,
    saves: RefCell<Vec<SavedEdit>>,
    category_requests: Cell<usize>,
}

impl FakeWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: &PageRef, text: &str) -> Self {
        self.pages.insert(page.clone(), page_content(text));
        self
    }

    pub fn with_redirect(mut self, page: &PageRef) -> Self {
        let content = PageContent {
            redirect: true,
            ..page_content("#REDIRECT [[Elsewhere]]")
        };
        self.pages.insert(page.clone(), content);
        self
    }

    pub fn with_language_links(mut self, page: &PageRef, links: Vec<LangLink>) -> Self {
        self.language_links.insert(page.clone(), links);
        self
    }

    /// Link `page` to its English counterpart `title`.
    pub fn with_english_link(self, page: &PageRef, title: &str) -> Self {
        self.with_language_links(
            page,
            vec![LangLink {
                lang: "en".into(),
                title: title.into(),
            }],
        )
    }

    /// Category contents, one API batch per slice.
    pub fn with_category(mut self, name: &str, batches: &[&[&str]]) -> Self {
        self.categories.insert(
            name.into(),
            batches
                .iter()
                .map(|batch| batch.iter().map(|&title| title.into()).collect())
                .collect(),
        );
        self
    }

    /// Let every save fail with the API error `code`.
    pub fn with_failing_saves(mut self, code: &str) -> Self {
        self.save_error = Some(code.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn saves(&self) -> Vec<SavedEdit> {
        self.saves.borrow().clone()
    }

    pub fn category_requests(&self) -> usize {
        self.category_requests.get()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl WikiAccess for FakeWiki {
    fn fetch_page(&self, page: &PageRef) -> Result<PageContent, WikiError> {
        self.record(format!("fetch_page {}", page));
        Ok(self
            .pages
            .get(page)
            .cloned()
            .unwrap_or_else(PageContent::missing))
    }

    fn language_links(&self, page: &PageRef) -> Result<Vec<LangLink>, WikiError> {
        self.record(format!("language_links {}", page));
        self.language_links
            .get(page)
            .cloned()
            .ok_or_else(|| WikiError::Api {
                code: "missingtitle".to_string(),
                info: format!("no links registered for {}", page),
            })
    }

    fn category_members(
        &self,
        site: &Site,
        category: &str,
        continue_from: Option<&str>,
    ) -> Result<CategoryBatch, WikiError> {
        self.record(format!("category_members {} {}", site, category));
        self.category_requests.set(self.category_requests.get() + 1);

        let batches = self
            .categories
            .get(category)
            .ok_or_else(|| WikiError::Api {
                code: "invalidcategory".to_string(),
                info: category.to_string(),
            })?;
        let index: usize = continue_from
            .map(|token| token.parse())
            .transpose()
            .map_err(|_| WikiError::UnexpectedResponse("bad continuation".to_string()))?
            .unwrap_or(0);

        Ok(CategoryBatch {
            titles: batches.get(index).cloned().unwrap_or_default(),
            continue_from: (index + 1 < batches.len()).then(|| (index + 1).to_string()),
        })
    }

    fn save_page(&self, request: &SaveRequest<'_>) -> Result<(), WikiError> {
        self.record(format!("save_page {}", request.page));
        if let Some(code) = &self.save_error {
            return Err(WikiError::Api {
                code: code.clone(),
                info: "save rejected".to_string(),
            });
        }
        self.saves.borrow_mut().push(SavedEdit {
            page: request.page.clone(),
            text: request.text.to_string(),
            summary: request.summary.to_string(),
            minor: request.minor,
            base_timestamp: request.base_timestamp,
            base_revision_id: request.base_revision_id,
        });
        Ok(())
    }
}

/// Answers questions from a fixed script; running out of answers behaves
/// like a closed stdin.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<String>,
    questions: Vec<String>,
    shown: Vec<String>,
}

impl ScriptedPrompt {
    pub fn new<'a>(answers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            answers: answers.into_iter().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    fn answer(&mut self, question: &str) -> io::Result<String> {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted answer"))
    }
}

impl Prompt for ScriptedPrompt {
    fn show(&mut self, text: &str) -> io::Result<()> {
        self.shown.push(text.to_string());
        Ok(())
    }

    fn input(&mut self, question: &str) -> io::Result<String> {
        self.answer(question)
    }

    fn choice(&mut self, question: &str) -> io::Result<Choice> {
        let answer = self.answer(question)?;
        Ok(Choice::from_answer(&answer))
    }
}

/// [`DuplicateReferences`] that counts its invocations.
#[derive(Debug)]
pub struct CountingDeduplicator {
    inner: DuplicateReferences,
    calls: Rc<Cell<usize>>,
}

impl CountingDeduplicator {
    pub fn new() -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let deduplicator = Self {
            inner: DuplicateReferences::default(),
            calls: Rc::clone(&calls),
        };
        (deduplicator, calls)
    }
}

impl ReferenceDeduplicator for CountingDeduplicator {
    fn deduplicate(&self, text: &str) -> String {
        self.calls.set(self.calls.get() + 1);
        self.inner.deduplicate(text)
    }
}

/// [`NoReferences`] with the default style that counts its invocations.
#[derive(Debug)]
pub struct CountingReferenceList {
    inner: NoReferences,
    calls: Rc<Cell<usize>>,
}

impl CountingReferenceList {
    pub fn new() -> (Self, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let reference_list = Self {
            inner: NoReferences::new(ReferenceListStyle::default()).unwrap(),
            calls: Rc::clone(&calls),
        };
        (reference_list, calls)
    }
}

impl ReferenceListInserter for CountingReferenceList {
    fn ensure_reference_list(&self, text: &str) -> String {
        self.calls.set(self.calls.get() + 1);
        self.inner.ensure_reference_list(text)
    }
}
