//! `-option[:value]` arguments of the `copy-refs` command.

use compact_str::CompactString;
use rustc_hash::FxHashSet;

use crate::{
    pagegen::{GeneratorError, GeneratorFactory},
    prompt::Prompt,
    site::Site,
};

pub const DEFAULT_TEXT: &str = "Test";

pub const HELP: &str = "\
Copies references from the source language article into the target language
article. The target text marks each reference by its position in the source
article, e.g. و1و for the first one.

Use global -simulate option for test purposes. No changes to live wiki will be done.

Global options:
-simulate         Do not save any page, log the result instead
-lang:            Language code of the wiki to edit
-family:          Wiki family of the wiki to edit

Page selection:
-page:            Work on this page, may be given more than once
-file:            Read page titles from this file, either one per line or as [[links]]
-cat:             Work on all articles in this category
-limit:           Stop after this many pages

The following parameters are supported:
-always           The bot won't ask for confirmation when putting a page
-text:            Use this text to be added; otherwise 'Test' is used
-replace:         Dont add text but replace it
-top              Place additional text on top of the page
-summary:         Set the action summary message for the edit.
";

pub const MISSING_GENERATOR: &str = "Use -help for further information.\nUnable to execute script because no generator was defined.";

/// Split `-name:value` into its parts, `None` if `arg` is not an option.
pub fn split_option(arg: &str) -> Option<(&str, Option<&str>)> {
    let option = arg.strip_prefix('-')?;
    Some(match option.split_once(':') {
        Some((name, value)) => (name, Some(value)),
        None => (option, None),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOptions {
    pub simulate: bool,
    pub lang: Option<CompactString>,
    pub family: Option<CompactString>,
    pub help: bool,
}

impl GlobalOptions {
    fn handle_arg(&mut self, arg: &str) -> bool {
        match split_option(arg) {
            Some(("simulate", _)) => self.simulate = true,
            Some(("help", _)) => self.help = true,
            Some(("lang", Some(lang))) if !lang.is_empty() => self.lang = Some(lang.into()),
            Some(("family", Some(family))) if !family.is_empty() => {
                self.family = Some(family.into())
            }
            _ => return false,
        }
        true
    }

    /// `site` with the `-lang:` / `-family:` overrides applied.
    pub fn site(&self, site: &Site) -> Site {
        Site::new(
            self.lang.clone().unwrap_or_else(|| site.lang.clone()),
            self.family.clone().unwrap_or_else(|| site.family.clone()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotOptions {
    pub always: bool,
    pub text: String,
    pub replace: bool,
    pub top: bool,
    pub summary: Option<String>,
    /// Every other option, by name.
    pub flags: FxHashSet<String>,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            always: false,
            text: DEFAULT_TEXT.to_string(),
            replace: false,
            top: false,
            summary: None,
            flags: FxHashSet::default(),
        }
    }
}

impl BotOptions {
    pub fn flag(&self, name: &str) -> bool {
        self.flags.contains(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error("failed to read answer")]
    Prompt(#[from] std::io::Error),
    #[error("unexpected argument `{0}`, options start with `-`")]
    NotAnOption(String),
}

#[derive(Debug, Clone)]
pub struct CommandLine {
    pub global: GlobalOptions,
    pub bot: BotOptions,
    pub generator: GeneratorFactory,
}

/// Parse `copy-refs` arguments for a run against `default_site`.
///
/// Global options are applied first so that `-lang:` affects the page
/// selection no matter where it appears.
pub fn parse_args<S: AsRef<str>>(
    args: &[S],
    default_site: &Site,
    prompt: &mut dyn Prompt,
) -> Result<CommandLine, OptionsError> {
    let mut global = GlobalOptions::default();
    let local_args: Vec<&str> = args
        .iter()
        .map(AsRef::as_ref)
        .filter(|arg| !global.handle_arg(arg))
        .collect();

    let mut generator = GeneratorFactory::new(global.site(default_site));
    let mut bot = BotOptions::default();

    for arg in local_args {
        if generator.handle_arg(arg, prompt)? {
            continue;
        }

        let (name, value) =
            split_option(arg).ok_or_else(|| OptionsError::NotAnOption(arg.to_string()))?;
        match name {
            "summary" => {
                let summary = match value {
                    Some(value) if !value.is_empty() => value.to_string(),
                    _ => prompt.input(&format!("Please enter a value for {}", arg))?,
                };
                bot.summary = Some(summary);
            }
            "text" => {
                if let Some(text) = value.filter(|text| !text.is_empty()) {
                    bot.text = text.to_string();
                }
            }
            "always" => bot.always = true,
            "replace" => bot.replace = true,
            "top" => bot.top = true,
            other => {
                tracing::debug!(message = "unknown option stored as flag", option = other);
                bot.flags.insert(other.to_string());
            }
        }
    }

    Ok(CommandLine {
        global,
        bot,
        generator,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedPrompt;

    fn site() -> Site {
        Site::new("ur", "wikipedia")
    }

    #[test]
    fn test_split_option() {
        assert_eq!(split_option("-always"), Some(("always", None)));
        assert_eq!(split_option("-page:A:B"), Some(("page", Some("A:B"))));
        assert_eq!(split_option("-summary:"), Some(("summary", Some(""))));
        assert_eq!(split_option("always"), None);
    }

    #[test]
    fn test_parse_args() {
        let mut prompt = ScriptedPrompt::default();
        let command_line = parse_args(
            &["-page:کراچی", "-always", "-summary:copy", "-simulate", "-top"],
            &site(),
            &mut prompt,
        )
        .unwrap();

        assert!(command_line.global.simulate);
        assert!(command_line.bot.always);
        assert!(command_line.bot.top);
        assert!(!command_line.bot.replace);
        assert_eq!(command_line.bot.summary.as_deref(), Some("copy"));
        assert_eq!(command_line.bot.text, DEFAULT_TEXT);
        assert!(command_line.generator.has_generator());
        assert!(prompt.questions().is_empty());
    }

    #[test]
    fn test_unknown_options_become_flags() {
        let mut prompt = ScriptedPrompt::default();
        let command_line =
            parse_args(&["-verbose-refs", "-mode:fast"], &site(), &mut prompt).unwrap();
        assert!(command_line.bot.flag("verbose-refs"));
        assert!(command_line.bot.flag("mode"));
        assert!(!command_line.bot.flag("always"));
        assert!(!command_line.generator.has_generator());
    }

    #[test]
    fn test_missing_summary_is_prompted_and_used() {
        let mut prompt = ScriptedPrompt::new(["typed summary"]);
        let command_line = parse_args(&["-summary"], &site(), &mut prompt).unwrap();
        assert_eq!(command_line.bot.summary.as_deref(), Some("typed summary"));
        assert_eq!(prompt.questions(), ["Please enter a value for -summary"]);
    }

    #[test]
    fn test_lang_overrides_site_for_generator() {
        let mut prompt = ScriptedPrompt::default();
        let command_line =
            parse_args(&["-page:X", "-lang:pa", "-family:wiktionary"], &site(), &mut prompt)
                .unwrap();
        assert_eq!(
            command_line.generator.site(),
            &Site::new("pa", "wiktionary")
        );
    }

    #[test]
    fn test_text_value() {
        let mut prompt = ScriptedPrompt::default();
        let command_line = parse_args(&["-text:متن"], &site(), &mut prompt).unwrap();
        assert_eq!(command_line.bot.text, "متن");
    }

    #[test]
    fn test_positional_argument_rejected() {
        let mut prompt = ScriptedPrompt::default();
        assert!(matches!(
            parse_args(&["Karachi"], &site(), &mut prompt),
            Err(OptionsError::NotAnOption(arg)) if arg == "Karachi"
        ));
    }
}
