//! `wikirefs.toml`, every key optional.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    dedup::DEFAULT_AUTOGENERATED_NAME,
    mediawiki::{ClientOptions, Credentials, DEFAULT_URL_TEMPLATE, DEFAULT_USER_AGENT},
    placeholder::DEFAULT_MARKER,
    reflist::ReferenceListStyle,
    site::Site,
};

pub const DEFAULT_CONFIG_FILE: &str = "wikirefs.toml";
pub const DEFAULT_SUMMARY: &str = "خودکار: اندراج حوالہ جات";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const USERNAME_VAR: &str = "WIKIREFS_USERNAME";
pub const PASSWORD_VAR: &str = "WIKIREFS_PASSWORD";

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub target: Option<SiteConfig>,
    pub source: Option<SiteConfig>,
    pub bot: Option<BotSection>,
    pub api: Option<ApiConfig>,
    pub reference_list: Option<ReferenceListConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    pub lang: Option<String>,
    pub family: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct BotSection {
    pub summary: Option<String>,
    pub placeholder_marker: Option<String>,
    pub minor: Option<bool>,
    pub autogenerated_name: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    pub url_template: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ReferenceListConfig {
    pub section_heading: Option<String>,
    pub markup: Option<String>,
    pub recognized_templates: Option<Vec<String>>,
    pub category_prefixes: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file as TOML")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn site(config: Option<&SiteConfig>, default_lang: &str) -> Site {
    Site::new(
        config
            .and_then(|site| site.lang.as_deref())
            .unwrap_or(default_lang),
        config
            .and_then(|site| site.family.as_deref())
            .unwrap_or("wikipedia"),
    )
}

impl Config {
    /// The wiki whose pages are edited.
    pub fn target_site(&self) -> Site {
        site(self.target.as_ref(), "ur")
    }

    /// The wiki references are copied from.
    pub fn source_site(&self) -> Site {
        site(self.source.as_ref(), "en")
    }

    pub fn summary(&self) -> &str {
        self.bot
            .as_ref()
            .and_then(|bot| bot.summary.as_deref())
            .unwrap_or(DEFAULT_SUMMARY)
    }

    pub fn placeholder_marker(&self) -> &str {
        self.bot
            .as_ref()
            .and_then(|bot| bot.placeholder_marker.as_deref())
            .unwrap_or(DEFAULT_MARKER)
    }

    pub fn minor(&self) -> bool {
        self.bot.as_ref().and_then(|bot| bot.minor).unwrap_or(false)
    }

    pub fn autogenerated_name(&self) -> &str {
        self.bot
            .as_ref()
            .and_then(|bot| bot.autogenerated_name.as_deref())
            .unwrap_or(DEFAULT_AUTOGENERATED_NAME)
    }

    pub fn url_template(&self) -> &str {
        self.api
            .as_ref()
            .and_then(|api| api.url_template.as_deref())
            .unwrap_or(DEFAULT_URL_TEMPLATE)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.api
                .as_ref()
                .and_then(|api| api.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn client_options(&self, credentials: Option<Credentials>) -> ClientOptions {
        ClientOptions {
            url_template: self.url_template().to_string(),
            user_agent: self
                .api
                .as_ref()
                .and_then(|api| api.user_agent.clone())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout: self.timeout(),
            credentials,
        }
    }

    pub fn reference_list_style(&self) -> ReferenceListStyle {
        let defaults = ReferenceListStyle::default();
        let Some(config) = &self.reference_list else {
            return defaults;
        };
        ReferenceListStyle {
            section_heading: config
                .section_heading
                .clone()
                .unwrap_or(defaults.section_heading),
            markup: config.markup.clone().unwrap_or(defaults.markup),
            recognized_templates: config
                .recognized_templates
                .clone()
                .unwrap_or(defaults.recognized_templates),
            category_prefixes: config
                .category_prefixes
                .clone()
                .unwrap_or(defaults.category_prefixes),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let marker = self.placeholder_marker();
        if marker.is_empty() {
            return Err(ConfigError::Invalid(
                "bot.placeholder_marker must not be empty".to_string(),
            ));
        }
        if marker.chars().any(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid(format!(
                "bot.placeholder_marker `{}` must not contain digits",
                marker
            )));
        }
        if !self.url_template().contains("{lang}") {
            return Err(ConfigError::Invalid(format!(
                "api.url_template `{}` must contain {{lang}}",
                self.url_template()
            )));
        }
        check_distinct_sites(&self.source_site(), &self.target_site())
    }
}

/// References can only be copied between two different wikis.
pub fn check_distinct_sites(source: &Site, target: &Site) -> Result<(), ConfigError> {
    if source == target {
        return Err(ConfigError::Invalid(format!(
            "source and target are both {}",
            target
        )));
    }
    Ok(())
}

/// `path` if given, otherwise `wikirefs.toml` in the working directory.
pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load and validate the config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!(message = "no config file, using defaults", path = %path.display());
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&contents)?;
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

/// Bot password credentials from the environment, if both variables are set.
pub fn credentials_from_env() -> Option<Credentials> {
    let username = std::env::var(USERNAME_VAR).ok().filter(|v| !v.is_empty())?;
    let password = std::env::var(PASSWORD_VAR).ok().filter(|v| !v.is_empty())?;
    Some(Credentials { username, password })
}
