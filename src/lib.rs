// SPDX-License-Identifier: MPL-2.0
//! # wikirefs
//!
//! Copies reference tags from one language edition of a MediaWiki wiki into the translated article of another, e.g. from the English into the Urdu Wikipedia.
//!
//! ## Overview
//!
//! Translators often leave the references of a source article behind and mark their positions with placeholder tokens instead: `و1و` for the first reference of the source article, `و2و` for the second one, and so on. `wikirefs` fills those placeholders in.
//!
//! For every selected target page it:
//!
//! 1. follows the page's interlanguage link to the source language article,
//! 2. collects all references of the source article (`<ref>` tags as well as `{{sfn}}`, `{{sfnp}}` and `{{r}}` call-outs) in order of appearance,
//! 3. replaces each placeholder token with the reference it stands for,
//! 4. collapses duplicate references into one named definition plus back-references,
//! 5. adds a reference list section if the article has none,
//! 6. shows the diff, asks for confirmation, and saves.
//!
//! The crate also contains a small, deliberately naive regular expression extractor for ISBN → title pairs of an XML book catalog, together with a `quick-xml` based counterpart.
//!
//! ## Getting Started
//!
//! ### Command Line
//!
//! ```text
//! wikirefs copy-refs -page:کراچی -simulate
//! wikirefs copy-refs -cat:پاکستان_کے_شہر -limit:20 -always
//! wikirefs isbn catalog.xml
//! ```
//!
//! `copy-refs` understands the usual bot arguments (`-page:`, `-file:`, `-cat:`, `-limit:`, `-always`, `-summary:`, `-simulate`, `-lang:`, `-family:`); run `wikirefs copy-refs -help` for the full list. Saving requires a bot password in the `WIKIREFS_USERNAME` and `WIKIREFS_PASSWORD` environment variables.
//!
//! ### Library
//!
//! The individual text transformations work on plain strings:
//!
//! ```rust
//! use wikirefs::placeholder::{apply_substitutions, build_substitutions, DEFAULT_MARKER};
//! use wikirefs::references::ReferenceCollector;
//! use wikirefs::wikitext::Wikicode;
//!
//! let mut source = Wikicode::parse(r#"Text.<ref name="x">Smith 2020</ref>"#);
//! let references = ReferenceCollector::new().collect(&mut source);
//!
//! let substitutions = build_substitutions(&references, DEFAULT_MARKER);
//! let target = apply_substitutions("متن۔و1و", &substitutions);
//! assert_eq!(target, "متن۔<ref>Smith 2020</ref>");
//! ```
//!
//! A whole run needs a [`site::WikiAccess`] implementation; [`mediawiki::MediaWikiClient`] talks to a live wiki:
//!
//! ```rust,no_run
//! use wikirefs::bot::{BotConfig, CopyRefsBot};
//! use wikirefs::dedup::DuplicateReferences;
//! use wikirefs::mediawiki::{ClientOptions, MediaWikiClient};
//! use wikirefs::prompt::Terminal;
//! use wikirefs::reflist::{NoReferences, ReferenceListStyle};
//! use wikirefs::site::{PageRef, Site};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let wiki = MediaWikiClient::new(ClientOptions::default())?;
//!     let mut terminal = Terminal;
//!     let mut bot = CopyRefsBot::new(
//!         &wiki,
//!         BotConfig { simulate: true, ..BotConfig::default() },
//!         Box::new(DuplicateReferences::default()),
//!         Box::new(NoReferences::new(ReferenceListStyle::default())?),
//!         &mut terminal,
//!     );
//!
//!     let page = PageRef::new(Site::new("ur", "wikipedia"), "کراچی");
//!     let summary = bot.run([Ok(page)])?;
//!     println!("{:?}", summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules and API
//!
//! - [`catalog`]: ISBN → title extraction.
//! - [`wikitext`]: the minimal wikitext view (templates, tags, comments) the collector needs.
//! - [`references`]: reference collection and numbering.
//! - [`placeholder`]: placeholder tokens and their substitution.
//! - [`dedup`] and [`reflist`]: the post-processing steps, behind the `ReferenceDeduplicator` and `ReferenceListInserter` traits.
//! - [`site`], [`mediawiki`]: pages, sites and wiki access.
//! - [`pagegen`], [`options`], [`config`], [`prompt`]: everything a run is configured with.
//! - [`bot`]: the orchestration.
//!
//! ## Features and Configuration
//!
//! ### String Replacement
//!
//! Placeholder substitution is a replace-all per token. The `optimized-str` feature switches it to a `memchr` based implementation with a reused buffer; both produce identical results.
//!
//! ```toml
//! [dependencies]
//! wikirefs = { version = "0.1.0", features = ["optimized-str"] }
//! ```
//!
//! ### Configuration File
//!
//! `wikirefs.toml` in the working directory (or the file given with `--config`) selects the wikis, the edit summary and the look of the reference list. Every key is optional:
//!
//! ```toml
//! [target]
//! lang = "ur"
//!
//! [source]
//! lang = "en"
//!
//! [bot]
//! summary = "خودکار: اندراج حوالہ جات"
//! minor = false
//!
//! [reference_list]
//! section_heading = "حوالہ جات"
//! markup = "{{حوالہ جات}}"
//! ```
//!
//! ### Logging and Error Handling
//!
//! - Uses the `tracing` crate for logging; the binary prints logs to stderr and honours `RUST_LOG`.
//! - A page whose source article cannot be found is skipped with a warning. Any other failure (network, API, a rejected save) ends the run.
//!
//! ## Limitations
//!
//! - **Wikitext**: Only what reference copying needs is looked at. Templates come from the `parse_wiki_text` node tree; reference tags are found by scanning, since their attributes are needed.
//! - **Placeholders**: Tokens are matched literally; the translator has to keep them intact.
//!
//! ## Licensing
//!
//! This project is licensed under the Mozilla Public License 2.0.

pub mod bot;
pub mod catalog;
pub mod config;
pub mod dedup;
pub mod mediawiki;
pub mod options;
pub mod pagegen;
pub mod placeholder;
pub mod prompt;
pub mod references;
pub mod reflist;
pub mod site;
#[cfg(test)]
mod test_support;
pub mod utils;
pub mod wikitext;
