//! The reference copying bot.
//!
//! For every target page: find the source-language article through the
//! interlanguage links, collect the source's references, replace the
//! placeholder tokens in the target text with them, collapse duplicate
//! references, make sure a reference list exists, and save.

use compact_str::CompactString;
use tracing::instrument;

use crate::{
    config::{check_distinct_sites, Config, ConfigError},
    dedup::ReferenceDeduplicator,
    options::{BotOptions, GlobalOptions},
    placeholder::{apply_substitutions, build_substitutions, DEFAULT_MARKER},
    prompt::{Choice, Prompt},
    references::ReferenceCollector,
    reflist::ReferenceListInserter,
    site::{PageContent, PageRef, SaveRequest, Site, WikiAccess, WikiError},
    utils::format_line_diff,
    wikitext::Wikicode,
};

/// Unchanged lines shown around each change in the confirmation diff.
const DIFF_CONTEXT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    /// Where references are copied from. Only the language is looked up in
    /// the interlanguage links.
    pub source_site: Site,
    pub summary: String,
    pub marker: String,
    pub minor: bool,
    /// Save without asking.
    pub always: bool,
    /// Never save, log instead.
    pub simulate: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            source_site: Site::new("en", "wikipedia"),
            summary: crate::config::DEFAULT_SUMMARY.to_string(),
            marker: DEFAULT_MARKER.to_string(),
            minor: false,
            always: false,
            simulate: false,
        }
    }
}

impl BotConfig {
    /// Combine the config file with the command line; the command line wins.
    ///
    /// Fails when `-lang:` / `-family:` make the edited wiki the source wiki.
    pub fn from_options(
        config: &Config,
        global: &GlobalOptions,
        options: &BotOptions,
    ) -> Result<Self, ConfigError> {
        let source = config.source_site();
        let family = global.family.clone().unwrap_or(source.family);
        let source_site = Site::new(source.lang, family);
        check_distinct_sites(&source_site, &global.site(&config.target_site()))?;

        if options.replace || options.top || options.text != crate::options::DEFAULT_TEXT {
            tracing::debug!("-text, -replace and -top have no effect on copying references");
        }

        Ok(Self {
            source_site,
            summary: options
                .summary
                .clone()
                .unwrap_or_else(|| config.summary().to_string()),
            marker: config.placeholder_marker().to_string(),
            minor: config.minor(),
            always: options.always,
            simulate: global.simulate,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("page has no interlanguage links")]
    NoLanguageLinks,
    #[error("no interlanguage link to `{language}`")]
    LanguageAbsent { language: CompactString },
    #[error("interlanguage link lookup failed")]
    Lookup(#[from] WikiError),
}

/// Find the counterpart of `page` on `source_site` through its
/// interlanguage links.
pub fn resolve_source<W: WikiAccess + ?Sized>(
    wiki: &W,
    page: &PageRef,
    source_site: &Site,
) -> Result<PageRef, ResolveError> {
    let links = wiki.language_links(page)?;
    if links.is_empty() {
        return Err(ResolveError::NoLanguageLinks);
    }
    links
        .into_iter()
        .find(|link| link.lang == source_site.lang)
        .map(|link| PageRef::new(source_site.clone(), link.title))
        .ok_or_else(|| ResolveError::LanguageAbsent {
            language: source_site.lang.clone(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Missing,
    Redirect,
    /// No source-language article could be found.
    NoSource,
    NoChange,
    /// The operator answered no.
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Saved,
    /// Would have been saved, but `-simulate` is active.
    Simulated,
    Skipped(SkipReason),
    /// The operator asked to stop the run.
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error(transparent)]
    Wiki(#[from] WikiError),
    #[error("failed to ask for confirmation")]
    Prompt(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    /// Saved pages, including the ones only simulated.
    pub saved: usize,
    pub skipped: usize,
}

pub struct CopyRefsBot<'a, W: ?Sized> {
    wiki: &'a W,
    config: BotConfig,
    deduplicator: Box<dyn ReferenceDeduplicator + 'a>,
    reference_list: Box<dyn ReferenceListInserter + 'a>,
    prompt: &'a mut dyn Prompt,
}

impl<W: ?Sized> std::fmt::Debug for CopyRefsBot<'_, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyRefsBot")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a, W: WikiAccess + ?Sized> CopyRefsBot<'a, W> {
    pub fn new(
        wiki: &'a W,
        config: BotConfig,
        deduplicator: Box<dyn ReferenceDeduplicator + 'a>,
        reference_list: Box<dyn ReferenceListInserter + 'a>,
        prompt: &'a mut dyn Prompt,
    ) -> Self {
        Self {
            wiki,
            config,
            deduplicator,
            reference_list,
            prompt,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Process every page of `pages`, one at a time.
    ///
    /// Stops at the first error (including an error of the page source) or
    /// when the operator quits.
    pub fn run<I>(&mut self, pages: I) -> Result<RunSummary, BotError>
    where
        I: IntoIterator<Item = Result<PageRef, WikiError>>,
    {
        let mut summary = RunSummary::default();
        for page in pages {
            let page = page?;
            let outcome = self.treat_page(&page)?;
            tracing::debug!(message = "page done", title = %page.title, ?outcome);
            match outcome {
                PageOutcome::Saved | PageOutcome::Simulated => summary.saved += 1,
                PageOutcome::Skipped(_) => summary.skipped += 1,
                PageOutcome::Quit => {
                    tracing::info!("stopped by operator");
                    break;
                }
            }
            summary.processed += 1;
        }

        tracing::info!(
            message = "run finished",
            processed = summary.processed,
            saved = summary.saved,
            skipped = summary.skipped
        );
        Ok(summary)
    }

    #[instrument(skip(self), fields(page = %page))]
    pub fn treat_page(&mut self, page: &PageRef) -> Result<PageOutcome, BotError> {
        let target = self.wiki.fetch_page(page)?;
        if !target.exists {
            tracing::info!(message = "page does not exist, skipping", title = %page.title);
            return Ok(PageOutcome::Skipped(SkipReason::Missing));
        }
        if target.redirect {
            tracing::info!(message = "page is a redirect, skipping", title = %page.title);
            return Ok(PageOutcome::Skipped(SkipReason::Redirect));
        }

        let source = match resolve_source(self.wiki, page, &self.config.source_site) {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(message = "no source article", title = %page.title, reason = %err, error = ?err);
                return Ok(PageOutcome::Skipped(SkipReason::NoSource));
            }
        };

        let source_content = self.wiki.fetch_article(&source)?;
        let mut code = Wikicode::parse(source_content.text);

        let mut collector = ReferenceCollector::new();
        let references = collector.collect(&mut code);
        tracing::debug!(
            message = "collected references",
            source = %source,
            references = references.len(),
            shorthand_templates = collector.shorthand_templates().len()
        );

        let substitutions = build_substitutions(&references, &self.config.marker);
        let text = apply_substitutions(&target.text, &substitutions);
        let text = self.deduplicator.deduplicate(&text);
        let text = self.reference_list.ensure_reference_list(&text);

        if text == target.text {
            tracing::info!(message = "nothing to change", title = %page.title);
            return Ok(PageOutcome::Skipped(SkipReason::NoChange));
        }

        self.put(page, &target, &text)
    }

    fn put(
        &mut self,
        page: &PageRef,
        current: &PageContent,
        text: &str,
    ) -> Result<PageOutcome, BotError> {
        if !self.config.always {
            self.prompt
                .show(&format_line_diff(&current.text, text, DIFF_CONTEXT))?;
            match self
                .prompt
                .choice(&format!("Do you want to accept these changes to {}?", page))?
            {
                Choice::Yes => {}
                Choice::No => return Ok(PageOutcome::Skipped(SkipReason::Declined)),
                Choice::All => self.config.always = true,
                Choice::Quit => return Ok(PageOutcome::Quit),
            }
        }

        if self.config.simulate {
            tracing::info!(
                message = "simulation, not saving",
                title = %page.title,
                bytes = text.len(),
                summary = %self.config.summary
            );
            return Ok(PageOutcome::Simulated);
        }

        self.wiki.save_page(&SaveRequest {
            page,
            text,
            summary: &self.config.summary,
            minor: self.config.minor,
            base_timestamp: current.timestamp,
            base_revision_id: current.revision_id,
        })?;
        tracing::info!(message = "saved", title = %page.title);
        Ok(PageOutcome::Saved)
    }
}
