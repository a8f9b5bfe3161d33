//! [`WikiAccess`] over the MediaWiki Action API.

use std::{cell::RefCell, collections::HashMap, time::Duration};

use compact_str::CompactString;
use rustc_hash::FxHashSet;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::instrument;

use crate::site::{
    CategoryBatch, LangLink, PageContent, PageRef, SaveRequest, Site, WikiAccess, WikiError,
};

pub const DEFAULT_URL_TEMPLATE: &str = "https://{lang}.{family}.org/w/api.php";
pub const DEFAULT_USER_AGENT: &str = concat!(
    "wikirefs/",
    env!("CARGO_PKG_VERSION"),
    " (reference copying bot)"
);

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    /// A bot password, see `Special:BotPasswords`.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<hidden>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API endpoint with `{lang}` and `{family}` placeholders.
    pub url_template: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(60),
            credentials: None,
        }
    }
}

// API response shapes, `formatversion=2`

#[derive(Debug, Deserialize)]
struct Response<T> {
    query: Option<T>,
    #[serde(rename = "continue", default)]
    continuation: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: Vec<ApiPage>,
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    redirect: bool,
    lastrevid: Option<u64>,
    #[serde(default)]
    revisions: Vec<ApiRevision>,
    #[serde(default)]
    langlinks: Vec<ApiLangLink>,
}

#[derive(Debug, Deserialize)]
struct ApiRevision {
    revid: Option<u64>,
    timestamp: Option<String>,
    slots: Option<ApiSlots>,
}

#[derive(Debug, Deserialize)]
struct ApiSlots {
    main: ApiSlot,
}

#[derive(Debug, Deserialize)]
struct ApiSlot {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiLangLink {
    lang: CompactString,
    title: CompactString,
}

#[derive(Debug, Deserialize)]
struct CategoryQuery {
    #[serde(default)]
    categorymembers: Vec<ApiMember>,
}

#[derive(Debug, Deserialize)]
struct ApiMember {
    title: CompactString,
}

#[derive(Debug, Deserialize)]
struct TokensQuery {
    tokens: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    login: LoginResult,
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    result: String,
    reason: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EditResponse {
    edit: EditResult,
}

#[derive(Debug, Deserialize)]
struct EditResult {
    result: String,
    #[serde(default)]
    nochange: bool,
}

/// Turn an API `error` object into a [`WikiError`], pass anything else through.
fn check_api_error(value: Value) -> Result<Value, WikiError> {
    match value.get("error") {
        Some(error) => Err(WikiError::Api {
            code: error
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            info: error
                .get("info")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        None => Ok(value),
    }
}

fn parse_response<T: DeserializeOwned>(value: Value) -> Result<Response<T>, WikiError> {
    Ok(serde_json::from_value(check_api_error(value)?)?)
}

fn parse_page(value: Value) -> Result<PageContent, WikiError> {
    let response: Response<PagesQuery> = parse_response(value)?;
    let page = response
        .query
        .and_then(|query| query.pages.into_iter().next())
        .ok_or_else(|| WikiError::UnexpectedResponse("no page in query result".to_string()))?;

    if page.missing || page.invalid {
        return Ok(PageContent::missing());
    }

    let revision = page.revisions.into_iter().next();
    let timestamp = revision
        .as_ref()
        .and_then(|revision| revision.timestamp.as_deref())
        .and_then(|timestamp| chrono::DateTime::parse_from_rfc3339(timestamp).ok())
        .map(|timestamp| timestamp.with_timezone(&chrono::Utc));
    let revision_id = revision
        .as_ref()
        .and_then(|revision| revision.revid)
        .or(page.lastrevid);
    let text = revision
        .and_then(|revision| revision.slots)
        .map(|slots| slots.main.content)
        .unwrap_or_default();

    Ok(PageContent {
        text,
        exists: true,
        redirect: page.redirect,
        revision_id,
        timestamp,
    })
}

fn parse_language_links(value: Value) -> Result<(Vec<LangLink>, Option<String>), WikiError> {
    let response: Response<PagesQuery> = parse_response(value)?;
    let links = response
        .query
        .into_iter()
        .flat_map(|query| query.pages)
        .flat_map(|page| page.langlinks)
        .map(|link| LangLink {
            lang: link.lang,
            title: link.title,
        })
        .collect();
    let continue_from = response.continuation.get("llcontinue").cloned();
    Ok((links, continue_from))
}

fn parse_category_members(value: Value) -> Result<CategoryBatch, WikiError> {
    let response: Response<CategoryQuery> = parse_response(value)?;
    Ok(CategoryBatch {
        titles: response
            .query
            .into_iter()
            .flat_map(|query| query.categorymembers)
            .map(|member| member.title)
            .collect(),
        continue_from: response.continuation.get("cmcontinue").cloned(),
    })
}

fn category_title(category: &str) -> String {
    if category.contains(':') {
        category.to_string()
    } else {
        format!("Category:{}", category)
    }
}

/// Blocking MediaWiki API client. Logs in lazily, once per site, before the
/// first edit.
pub struct MediaWikiClient {
    http: reqwest::blocking::Client,
    url_template: String,
    credentials: Option<Credentials>,
    logged_in: RefCell<FxHashSet<Site>>,
}

impl std::fmt::Debug for MediaWikiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaWikiClient")
            .field("url_template", &self.url_template)
            .field("credentials", &self.credentials)
            .field("logged_in", &self.logged_in.borrow())
            .finish()
    }
}

impl MediaWikiClient {
    pub fn new(options: ClientOptions) -> Result<Self, WikiError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(options.user_agent)
            .timeout(options.timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            http,
            url_template: options.url_template,
            credentials: options.credentials,
            logged_in: RefCell::new(FxHashSet::default()),
        })
    }

    pub fn api_url(&self, site: &Site) -> String {
        self.url_template
            .replace("{lang}", &site.lang)
            .replace("{family}", &site.family)
    }

    fn get(&self, site: &Site, params: &[(&str, &str)]) -> Result<Value, WikiError> {
        let response = self
            .http
            .get(self.api_url(site))
            .query(&[("format", "json"), ("formatversion", "2")])
            .query(params)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    fn post(&self, site: &Site, params: &[(&str, &str)]) -> Result<Value, WikiError> {
        let mut form = vec![("format", "json"), ("formatversion", "2")];
        form.extend_from_slice(params);
        let response = self
            .http
            .post(self.api_url(site))
            .form(&form)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    fn token(&self, site: &Site, kind: &str) -> Result<String, WikiError> {
        let value = self.get(
            site,
            &[("action", "query"), ("meta", "tokens"), ("type", kind)],
        )?;
        let response: Response<TokensQuery> = parse_response(value)?;
        let key = format!("{}token", kind);
        response
            .query
            .and_then(|mut query| query.tokens.remove(&key))
            .ok_or_else(|| WikiError::UnexpectedResponse(format!("no {} in response", key)))
    }

    #[instrument(skip(self))]
    fn ensure_login(&self, site: &Site) -> Result<(), WikiError> {
        let Some(credentials) = &self.credentials else {
            return Ok(());
        };
        if self.logged_in.borrow().contains(site) {
            return Ok(());
        }

        let token = self.token(site, "login")?;
        let value = self.post(
            site,
            &[
                ("action", "login"),
                ("lgname", &credentials.username),
                ("lgpassword", &credentials.password),
                ("lgtoken", &token),
            ],
        )?;
        let response: LoginResponse = serde_json::from_value(check_api_error(value)?)?;
        if response.login.result != "Success" {
            return Err(WikiError::Login {
                user: credentials.username.clone(),
                reason: response
                    .login
                    .reason
                    .map(|reason| match reason {
                        Value::String(reason) => reason,
                        other => other.to_string(),
                    })
                    .unwrap_or(response.login.result),
            });
        }

        tracing::info!(message = "logged in", user = credentials.username, site = %site);
        self.logged_in.borrow_mut().insert(site.clone());
        Ok(())
    }
}

impl WikiAccess for MediaWikiClient {
    #[instrument(skip(self), fields(page = %page))]
    fn fetch_page(&self, page: &PageRef) -> Result<PageContent, WikiError> {
        let value = self.get(
            &page.site,
            &[
                ("action", "query"),
                ("prop", "info|revisions"),
                ("rvprop", "ids|timestamp|content"),
                ("rvslots", "main"),
                ("titles", &page.title),
            ],
        )?;
        parse_page(value)
    }

    #[instrument(skip(self), fields(page = %page))]
    fn language_links(&self, page: &PageRef) -> Result<Vec<LangLink>, WikiError> {
        let mut links = Vec::new();
        let mut continue_from: Option<String> = None;
        loop {
            let mut params = vec![
                ("action", "query"),
                ("prop", "langlinks"),
                ("lllimit", "max"),
                ("titles", page.title.as_str()),
            ];
            if let Some(token) = &continue_from {
                params.push(("llcontinue", token));
            }

            let (batch, next) = parse_language_links(self.get(&page.site, &params)?)?;
            links.extend(batch);
            match next {
                Some(next) => continue_from = Some(next),
                None => break,
            }
        }
        Ok(links)
    }

    #[instrument(skip(self))]
    fn category_members(
        &self,
        site: &Site,
        category: &str,
        continue_from: Option<&str>,
    ) -> Result<CategoryBatch, WikiError> {
        let title = category_title(category);
        let mut params = vec![
            ("action", "query"),
            ("list", "categorymembers"),
            ("cmtitle", title.as_str()),
            ("cmnamespace", "0"),
            ("cmlimit", "max"),
        ];
        if let Some(token) = continue_from {
            params.push(("cmcontinue", token));
        }
        parse_category_members(self.get(site, &params)?)
    }

    #[instrument(skip(self, request), fields(page = %request.page))]
    fn save_page(&self, request: &SaveRequest<'_>) -> Result<(), WikiError> {
        let site = &request.page.site;
        self.ensure_login(site)?;
        let token = self.token(site, "csrf")?;

        let params = edit_params(request, &token, self.credentials.is_some());
        let params: Vec<(&str, &str)> = params
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();

        let value = self.post(site, &params)?;
        let response: EditResponse = serde_json::from_value(check_api_error(value)?)?;
        if response.edit.result != "Success" {
            return Err(WikiError::UnexpectedResponse(format!(
                "edit result `{}`",
                response.edit.result
            )));
        }
        if response.edit.nochange {
            tracing::info!("the wiki reported no change");
        }
        Ok(())
    }
}

/// Form fields of an `action=edit` request. `as_user` makes the edit fail
/// instead of being saved anonymously once the session is lost.
fn edit_params(request: &SaveRequest<'_>, token: &str, as_user: bool) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("action", "edit".to_string()),
        ("title", request.page.title.to_string()),
        ("text", request.text.to_string()),
        ("summary", request.summary.to_string()),
        ("nocreate", "1".to_string()),
        (if request.minor { "minor" } else { "notminor" }, "1".to_string()),
    ];
    if let Some(timestamp) = request.base_timestamp {
        params.push((
            "basetimestamp",
            timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        ));
    }
    if let Some(revision_id) = request.base_revision_id {
        params.push(("baserevid", revision_id.to_string()));
    }
    if as_user {
        params.push(("assert", "user".to_string()));
        params.push(("bot", "1".to_string()));
    }
    params.push(("token", token.to_string()));
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_url() {
        let client = MediaWikiClient::new(ClientOptions::default()).unwrap();
        assert_eq!(
            client.api_url(&Site::new("ur", "wikipedia")),
            "https://ur.wikipedia.org/w/api.php"
        );
    }

    #[test]
    fn test_check_api_error() {
        let error = check_api_error(json!({
            "error": {"code": "editconflict", "info": "Edit conflict."}
        }))
        .unwrap_err();
        assert!(matches!(
            error,
            WikiError::Api { ref code, ref info } if code == "editconflict" && info == "Edit conflict."
        ));
        assert!(check_api_error(json!({"query": {}})).is_ok());
    }

    #[test]
    fn test_parse_page() {
        let page = parse_page(json!({
            "batchcomplete": true,
            "query": {"pages": [{
                "pageid": 1, "ns": 0, "title": "Karachi",
                "lastrevid": 42,
                "revisions": [{
                    "revid": 42, "parentid": 41,
                    "timestamp": "2024-05-01T12:30:00Z",
                    "slots": {"main": {"contentmodel": "wikitext", "content": "Text<ref>A</ref>"}}
                }]
            }]}
        }))
        .unwrap();

        assert!(page.exists);
        assert!(!page.redirect);
        assert_eq!(page.text, "Text<ref>A</ref>");
        assert_eq!(page.revision_id, Some(42));
        assert_eq!(
            page.timestamp.map(|t| t.to_rfc3339()),
            Some("2024-05-01T12:30:00+00:00".to_string())
        );
    }

    #[test]
    fn test_parse_missing_and_redirect_page() {
        let missing = parse_page(json!({
            "query": {"pages": [{"ns": 0, "title": "Nope", "missing": true}]}
        }))
        .unwrap();
        assert!(!missing.exists);

        let redirect = parse_page(json!({
            "query": {"pages": [{
                "title": "Old", "redirect": true, "lastrevid": 7,
                "revisions": [{"revid": 7, "slots": {"main": {"content": "#REDIRECT [[New]]"}}}]
            }]}
        }))
        .unwrap();
        assert!(redirect.exists);
        assert!(redirect.redirect);
    }

    #[test]
    fn test_parse_language_links() {
        let (links, next) = parse_language_links(json!({
            "continue": {"llcontinue": "123|fr", "continue": "||"},
            "query": {"pages": [{"title": "کراچی", "langlinks": [
                {"lang": "de", "title": "Karatschi"},
                {"lang": "en", "title": "Karachi"}
            ]}]}
        }))
        .unwrap();
        assert_eq!(
            links,
            vec![
                LangLink {
                    lang: "de".into(),
                    title: "Karatschi".into()
                },
                LangLink {
                    lang: "en".into(),
                    title: "Karachi".into()
                },
            ]
        );
        assert_eq!(next.as_deref(), Some("123|fr"));

        let (links, next) = parse_language_links(json!({
            "query": {"pages": [{"title": "تنہا"}]}
        }))
        .unwrap();
        assert!(links.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn test_parse_category_members() {
        let batch = parse_category_members(json!({
            "continue": {"cmcontinue": "page|ABC|1", "continue": "-||"},
            "query": {"categorymembers": [
                {"pageid": 1, "ns": 0, "title": "A"},
                {"pageid": 2, "ns": 0, "title": "B"}
            ]}
        }))
        .unwrap();
        assert_eq!(batch.titles, vec!["A", "B"]);
        assert_eq!(batch.continue_from.as_deref(), Some("page|ABC|1"));
    }

    #[test]
    fn test_category_title() {
        assert_eq!(category_title("Cities"), "Category:Cities");
        assert_eq!(category_title("زمرہ:شہر"), "زمرہ:شہر");
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "Bot@copy".into(),
            password: "secret".into(),
        };
        assert!(!format!("{:?}", credentials).contains("secret"));
    }

    #[test]
    fn test_edit_params_carry_base_revision() {
        let page = PageRef::new(Site::new("ur", "wikipedia"), "کراچی");
        let timestamp = chrono::DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let request = SaveRequest {
            page: &page,
            text: "متن",
            summary: "خودکار: اندراج حوالہ جات",
            minor: false,
            base_timestamp: Some(timestamp),
            base_revision_id: Some(42),
        };

        let params = edit_params(&request, "abc+\\", true);
        let value = |name: &str| {
            params
                .iter()
                .find(|(param, _)| *param == name)
                .map(|(_, value)| value.as_str())
        };
        assert_eq!(value("title"), Some("کراچی"));
        assert_eq!(value("basetimestamp"), Some("2024-05-01T10:00:00Z"));
        assert_eq!(value("baserevid"), Some("42"));
        assert_eq!(value("notminor"), Some("1"));
        assert_eq!(value("minor"), None);
        assert_eq!(value("assert"), Some("user"));
        assert_eq!(params.last().map(|(name, _)| *name), Some("token"));

        let anonymous = edit_params(
            &SaveRequest {
                base_revision_id: None,
                base_timestamp: None,
                ..request
            },
            "+\\",
            false,
        );
        assert!(anonymous
            .iter()
            .all(|(name, _)| !["baserevid", "basetimestamp", "assert", "bot"].contains(name)));
    }
}
