//! HTTP client for the remote recipe service.
//!
//! Redirects are never followed: a `302` pointing at the login page is how the
//! service reports an expired session. Such a response triggers one login and
//! one retry of the same request. Deletes are not retried.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{COOKIE, LOCATION};
use reqwest::{Client, Method, Response, StatusCode};
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use brewsync_shared::{Brew, BrewSyncError, NamePattern, Recipe, RemoteConfig, Result};

use crate::session::SessionContext;

/// User-Agent string for service requests.
const USER_AGENT: &str = concat!("brewsync/", env!("CARGO_PKG_VERSION"));

static FORM_KEY: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input[name="form_key"]"#).expect("valid form_key selector")
});

static PAGE_METADATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)window\.Grainfather\s*=\s*(\{.*\})\s*;?\s*$").expect("valid metadata regex")
});

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Account credentials used for (re-)login.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

enum Payload<'a> {
    Empty,
    Form(&'a [(&'a str, &'a str)]),
    Json(&'a Value),
}

// ---------------------------------------------------------------------------
// RemoteClient
// ---------------------------------------------------------------------------

/// Recipe and brew-session operations against the service.
pub struct RemoteClient {
    http: Client,
    base: Url,
    auth: Url,
    credentials: Option<Credentials>,
    dry_run: bool,
}

impl RemoteClient {
    /// Build a client. Without credentials an expired session cannot be renewed.
    pub fn new(
        config: &RemoteConfig,
        credentials: Option<Credentials>,
        dry_run: bool,
    ) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            BrewSyncError::config(format!("invalid base_url '{}': {e}", config.base_url))
        })?;
        let auth = Url::parse(&config.auth_url).map_err(|e| {
            BrewSyncError::config(format!("invalid auth_url '{}': {e}", config.auth_url))
        })?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrewSyncError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base,
            auth,
            credentials,
            dry_run,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base.as_str().trim_end_matches('/'))
    }

    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.auth.as_str().trim_end_matches('/'))
    }

    // -- transport --------------------------------------------------------

    /// Perform one request with the context's cookies and CSRF token.
    async fn send(
        &self,
        ctx: &mut SessionContext,
        method: &Method,
        url: &str,
        payload: &Payload<'_>,
    ) -> Result<Response> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = ctx.csrf_token() {
            request = request.header("X-CSRF-TOKEN", token);
        }
        if let Some(cookies) = ctx.cookie_header() {
            request = request.header(COOKIE, cookies);
        }
        request = match payload {
            Payload::Empty => request,
            Payload::Form(fields) => request.form(fields),
            Payload::Json(body) => request.json(body),
        };

        let response = request
            .send()
            .await
            .map_err(|e| BrewSyncError::Network(format!("{method} {url}: {e}")))?;
        info!("{method} {url} -> {}", response.status().as_u16());
        ctx.absorb_cookies(response.headers());
        Ok(response)
    }

    /// Send, and on an expired session log in again and retry once when `relogin` is set.
    async fn request(
        &self,
        ctx: &mut SessionContext,
        method: Method,
        url: &str,
        payload: Payload<'_>,
        relogin: bool,
    ) -> Result<Response> {
        let response = self.send(ctx, &method, url, &payload).await?;
        if !is_login_redirect(&response) {
            return Ok(response);
        }
        if !relogin {
            return Err(BrewSyncError::session(format!(
                "{method} {url}: session expired"
            )));
        }

        info!("session expired, logging in again");
        self.login(ctx).await?;
        let response = self.send(ctx, &method, url, &payload).await?;
        if is_login_redirect(&response) {
            return Err(BrewSyncError::session(format!(
                "{method} {url}: session expired again after login"
            )));
        }
        Ok(response)
    }

    async fn get_json(&self, ctx: &mut SessionContext, url: &str) -> Result<Value> {
        let response = self
            .request(ctx, Method::GET, url, Payload::Empty, true)
            .await?;
        json_body(response).await
    }

    /// A state-changing request; skipped with a log line in dry-run mode.
    async fn write(
        &self,
        ctx: &mut SessionContext,
        method: Method,
        url: &str,
        body: &Value,
    ) -> Result<Option<Value>> {
        if self.dry_run {
            info!("{method} {url} (dry run)");
            return Ok(None);
        }
        let response = self
            .request(ctx, method, url, Payload::Json(body), true)
            .await?;
        json_body(response).await.map(Some)
    }

    /// Collect the `data` items of a paginated listing, following `next_page_url`.
    async fn pages(&self, ctx: &mut SessionContext, first: String) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let page = self.get_json(ctx, &url).await?;
            match page.get("data") {
                Some(Value::Array(data)) => items.extend(data.iter().cloned()),
                _ => {
                    return Err(BrewSyncError::parse(format!(
                        "listing {url} has no data array"
                    )));
                }
            }
            next = match page.get("next_page_url").and_then(Value::as_str) {
                Some(link) if !link.is_empty() => {
                    let link = self.base.join(link).map_err(|e| {
                        BrewSyncError::parse(format!("invalid next_page_url '{link}': {e}"))
                    })?;
                    Some(link.to_string()).filter(|l| *l != url)
                }
                _ => None,
            };
        }
        debug!(count = items.len(), "listing complete");
        Ok(items)
    }

    // -- session ----------------------------------------------------------

    /// Run the login handshake and store the resulting metadata and cookies in `ctx`.
    #[instrument(skip_all)]
    pub async fn login(&self, ctx: &mut SessionContext) -> Result<()> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            BrewSyncError::MissingSource("no username and password to log in with".into())
        })?;
        ctx.clear();
        ctx.username = Some(credentials.username.clone());

        let url = self.auth_endpoint("/customer/account/login/");
        let page = self.send(ctx, &Method::GET, &url, &Payload::Empty).await?;
        let html = response_text(page).await?;
        let form_key =
            form_key(&html).ok_or_else(|| BrewSyncError::session("login page has no form_key"))?;

        let fields = [
            ("form_key", form_key.as_str()),
            ("login[username]", credentials.username.as_str()),
            ("login[password]", credentials.password.as_str()),
        ];
        let url = self.auth_endpoint("/customer/account/loginPost/");
        self.send(ctx, &Method::POST, &url, &Payload::Form(&fields))
            .await?;

        let url = self.base.to_string();
        let start = self.send(ctx, &Method::GET, &url, &Payload::Empty).await?;
        let html = response_text(start).await?;
        let metadata = page_metadata(&html).ok_or_else(|| {
            BrewSyncError::session("start page carries no session metadata, login failed")
        })?;
        ctx.metadata = Some(metadata);
        info!(user = %credentials.username, "logged in");
        Ok(())
    }

    /// Log in unless `ctx` already holds a session of the configured user.
    pub async fn ensure_login(&self, ctx: &mut SessionContext) -> Result<()> {
        let owned = self
            .credentials
            .as_ref()
            .is_none_or(|c| ctx.belongs_to(&c.username));
        if ctx.is_authenticated() && owned {
            return Ok(());
        }
        self.login(ctx).await
    }

    /// End the server-side session and forget it locally.
    pub async fn logout(&self, ctx: &mut SessionContext) -> Result<()> {
        if ctx.is_authenticated() {
            let url = self.endpoint("/logout");
            self.send(ctx, &Method::GET, &url, &Payload::Empty).await?;
        }
        ctx.clear();
        Ok(())
    }

    // -- recipes ----------------------------------------------------------

    /// Raw recipe objects of the user's listing whose name matches `pattern`.
    #[instrument(skip_all, fields(pattern = pattern.as_str()))]
    pub async fn my_recipe_values(
        &self,
        ctx: &mut SessionContext,
        pattern: &NamePattern,
    ) -> Result<Vec<Value>> {
        let url = self.endpoint("/my-recipes/data?page=1");
        let items = self.pages(ctx, url).await?;
        Ok(items
            .into_iter()
            .filter(|item| {
                pattern.matches(item.get("name").and_then(Value::as_str).unwrap_or_default())
            })
            .collect())
    }

    /// The user's recipes whose name matches `pattern`, as listed (not reloaded).
    ///
    /// A listed item that does not parse is logged and left out.
    pub async fn my_recipes(
        &self,
        ctx: &mut SessionContext,
        pattern: &NamePattern,
    ) -> Result<Vec<Recipe>> {
        let items = self.my_recipe_values(ctx, pattern).await?;
        Ok(parse_listing(items, Recipe::from_value, "recipe"))
    }

    /// The full JSON object of the single recipe matching `pattern`.
    pub async fn my_recipe_value(
        &self,
        ctx: &mut SessionContext,
        pattern: &NamePattern,
    ) -> Result<Value> {
        let listed = self.my_recipe_values(ctx, pattern).await?;
        let [one] = listed.as_slice() else {
            warn!(pattern = pattern.as_str(), count = listed.len(), "pattern did not select a unique remote recipe");
            return Err(BrewSyncError::AmbiguousMatch {
                pattern: pattern.as_str().to_string(),
                count: listed.len(),
            });
        };
        match one.get("id").and_then(Value::as_u64) {
            Some(id) => self.recipe_value(ctx, id).await,
            None => Ok(one.clone()),
        }
    }

    /// The full JSON object of recipe `id`.
    pub async fn recipe_value(&self, ctx: &mut SessionContext, id: u64) -> Result<Value> {
        let url = self.endpoint(&format!("/recipes/data/{id}"));
        self.get_json(ctx, &url).await
    }

    /// Create an unbound recipe. Returns the stored record, `None` in dry-run mode.
    pub async fn create_recipe(
        &self,
        ctx: &mut SessionContext,
        recipe: &Recipe,
    ) -> Result<Option<Recipe>> {
        let url = self.endpoint("/recipes");
        let stored = self
            .write(ctx, Method::POST, &url, &recipe.to_payload())
            .await?;
        stored.map(Recipe::from_value).transpose()
    }

    /// Replace the remote recipe the given one is bound to.
    pub async fn update_recipe(
        &self,
        ctx: &mut SessionContext,
        recipe: &Recipe,
    ) -> Result<Option<Recipe>> {
        let id = recipe.id.ok_or_else(|| {
            BrewSyncError::validation(format!("{recipe} has no remote id to update"))
        })?;
        let url = self.endpoint(&format!("/recipes/{id}"));
        let stored = self
            .write(ctx, Method::PUT, &url, &recipe.to_payload())
            .await?;
        stored.map(Recipe::from_value).transpose()
    }

    /// Delete recipe `id`. Returns `false` when skipped in dry-run mode.
    pub async fn delete_recipe(&self, ctx: &mut SessionContext, id: u64) -> Result<bool> {
        let url = self.endpoint(&format!("/recipes/{id}"));
        if self.dry_run {
            info!("DELETE {url} (dry run)");
            return Ok(false);
        }
        let response = self
            .request(ctx, Method::DELETE, &url, Payload::Empty, false)
            .await?;
        if !response.status().is_success() {
            return Err(BrewSyncError::Network(format!(
                "DELETE {url} -> {}",
                response.status()
            )));
        }
        Ok(true)
    }

    // -- brew sessions ----------------------------------------------------

    /// All brew sessions of recipe `recipe_id`. Sessions that do not parse are logged and left out.
    pub async fn brews(&self, ctx: &mut SessionContext, recipe_id: u64) -> Result<Vec<Brew>> {
        let url = self.endpoint(&format!("/recipes/{recipe_id}/brew-sessions/data?page=1"));
        let items = self.pages(ctx, url).await?;
        Ok(parse_listing(items, Brew::from_value, "brew session"))
    }

    pub async fn create_brew(
        &self,
        ctx: &mut SessionContext,
        recipe_id: u64,
        brew: &Brew,
    ) -> Result<Option<Brew>> {
        let mut brew = brew.clone();
        brew.recipe_id = Some(recipe_id);
        let url = self.endpoint(&format!("/recipes/{recipe_id}/brew-sessions"));
        let stored = self.write(ctx, Method::POST, &url, &brew_payload(&brew)?).await?;
        stored.map(Brew::from_value).transpose()
    }

    pub async fn update_brew(&self, ctx: &mut SessionContext, brew: &Brew) -> Result<Option<Brew>> {
        let id = brew.id.ok_or_else(|| {
            BrewSyncError::validation(format!("{brew} has no remote id to update"))
        })?;
        let url = self.endpoint(&format!("/brew-sessions/{id}"));
        let stored = self.write(ctx, Method::PUT, &url, &brew_payload(brew)?).await?;
        stored.map(Brew::from_value).transpose()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_login_redirect(response: &Response) -> bool {
    response.status() == StatusCode::FOUND
        && response
            .headers()
            .get(LOCATION)
            .and_then(|l| l.to_str().ok())
            .is_some_and(|l| l.contains("/login"))
}

async fn response_text(response: Response) -> Result<String> {
    let url = response.url().to_string();
    response
        .text()
        .await
        .map_err(|e| BrewSyncError::Network(format!("failed to read {url}: {e}")))
}

async fn json_body(response: Response) -> Result<Value> {
    let status = response.status();
    let url = response.url().to_string();
    if !status.is_success() {
        return Err(BrewSyncError::Network(format!("{url} -> {status}")));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| BrewSyncError::parse(format!("invalid JSON from {url}: {e}")))
}

/// Parse every listed item, dropping the ones that fail with a warning.
fn parse_listing<T>(items: Vec<Value>, parse: impl Fn(Value) -> Result<T>, kind: &str) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| {
            let id = item.get("id").cloned().unwrap_or(Value::Null);
            let name = item.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            match parse(item) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(%id, name, error = %e, "skipping unreadable remote {kind}");
                    None
                }
            }
        })
        .collect()
}

fn brew_payload(brew: &Brew) -> Result<Value> {
    serde_json::to_value(brew)
        .map_err(|e| BrewSyncError::parse(format!("failed to encode {brew}: {e}")))
}

/// The hidden `form_key` input of the login form.
fn form_key(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&FORM_KEY)
        .find_map(|input| input.value().attr("value"))
        .map(str::to_string)
}

/// The `window.Grainfather = {...}` object of the start page; the last one wins.
fn page_metadata(html: &str) -> Option<Value> {
    PAGE_METADATA
        .captures_iter(html)
        .filter_map(|c| serde_json::from_str(&c[1]).ok())
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewsync_shared::{HopUsage, UnitType};
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOGIN_PAGE: &str = r#"<html><body>
<form action="/customer/account/loginPost/" method="post">
  <input name="form_key" type="hidden" value="fk123" />
  <input name="login[username]" />
</form></body></html>"#;

    const START_PAGE: &str = r#"<html><head><script>
window.Grainfather = {"csrfToken":"csrf1","user":{"api_token":"tok1"}};
</script></head></html>"#;

    fn client(server: &MockServer, dry_run: bool) -> RemoteClient {
        let config = RemoteConfig {
            base_url: server.uri(),
            auth_url: server.uri(),
            timeout_secs: 5,
            ..RemoteConfig::default()
        };
        RemoteClient::new(&config, Some(Credentials::new("brewer", "secret")), dry_run).unwrap()
    }

    fn authenticated() -> SessionContext {
        let mut ctx = SessionContext::new("brewer");
        ctx.metadata = Some(serde_json::json!({"csrfToken": "csrf0"}));
        ctx.cookies.insert("PHPSESSID".into(), "old".into());
        ctx
    }

    async fn mount_login(server: &MockServer, times: u64) {
        Mock::given(method("GET"))
            .and(path("/customer/account/login/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "PHPSESSID=fresh; path=/")
                    .set_body_string(LOGIN_PAGE),
            )
            .expect(times)
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/customer/account/loginPost/"))
            .and(body_string_contains("form_key=fk123"))
            .and(body_string_contains("secret"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", "/customer/account/")
                    .insert_header("set-cookie", "remember=yes; path=/"),
            )
            .expect(times)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(START_PAGE))
            .expect(times)
            .mount(server)
            .await;
    }

    fn expired() -> ResponseTemplate {
        ResponseTemplate::new(302).insert_header("location", "https://auth.example/customer/account/login/")
    }

    #[test]
    fn extracts_form_key_and_metadata() {
        assert_eq!(form_key(LOGIN_PAGE).as_deref(), Some("fk123"));
        assert_eq!(form_key("<html></html>"), None);

        let metadata = page_metadata(START_PAGE).unwrap();
        assert_eq!(metadata["csrfToken"], "csrf1");
        assert!(page_metadata("<html>nothing</html>").is_none());
    }

    #[tokio::test]
    async fn login_handshake_populates_context() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;

        let client = client(&server, false);
        let mut ctx = SessionContext::default();
        client.login(&mut ctx).await.unwrap();

        assert_eq!(ctx.username.as_deref(), Some("brewer"));
        assert_eq!(ctx.csrf_token(), Some("csrf1"));
        assert_eq!(ctx.api_token(), Some("tok1"));
        assert_eq!(ctx.cookies["PHPSESSID"], "fresh");
        assert_eq!(ctx.cookies["remember"], "yes");
    }

    #[tokio::test]
    async fn login_without_form_key_is_a_session_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customer/account/login/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let err = client(&server, false)
            .login(&mut SessionContext::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BrewSyncError::Session { .. }));
    }

    #[tokio::test]
    async fn ensure_login_reuses_a_valid_context() {
        let server = MockServer::start().await;
        mount_login(&server, 0).await;

        let mut ctx = authenticated();
        client(&server, false).ensure_login(&mut ctx).await.unwrap();
        assert_eq!(ctx.csrf_token(), Some("csrf0"));
    }

    #[tokio::test]
    async fn listing_follows_pagination_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/my-recipes/data"))
            .and(query_param("page", "1"))
            .and(header("X-CSRF-TOKEN", "csrf0"))
            .and(header("cookie", "PHPSESSID=old"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": 1, "name": "Pale Ale"}, {"id": 2, "name": "Stout"}],
                "next_page_url": format!("{}/my-recipes/data?page=2", server.uri())
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/my-recipes/data"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": 3, "name": "Pale Lager"}],
                "next_page_url": null
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server, false);
        let mut ctx = authenticated();
        let all = client.my_recipes(&mut ctx, &NamePattern::any()).await.unwrap();
        assert_eq!(all.len(), 3);

        let pale = client
            .my_recipes(&mut ctx, &NamePattern::new("Pale*").unwrap())
            .await
            .unwrap();
        let names: Vec<&str> = pale.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Pale Ale", "Pale Lager"]);
    }

    #[tokio::test]
    async fn expired_session_relogs_once_and_retries() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/recipes/data/7"))
            .respond_with(expired())
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/recipes/data/7"))
            .and(header("X-CSRF-TOKEN", "csrf1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 7, "name": "Pale Ale"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut ctx = authenticated();
        let recipe = client(&server, false).recipe_value(&mut ctx, 7).await.unwrap();
        assert_eq!(recipe["id"], 7);
        assert_eq!(ctx.csrf_token(), Some("csrf1"));
    }

    #[tokio::test]
    async fn second_expiry_surfaces_session_error() {
        let server = MockServer::start().await;
        mount_login(&server, 1).await;
        Mock::given(method("GET"))
            .and(path("/recipes/data/7"))
            .respond_with(expired())
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server, false)
            .recipe_value(&mut authenticated(), 7)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BrewSyncError::Session { .. }));
    }

    #[tokio::test]
    async fn delete_is_never_retried() {
        let server = MockServer::start().await;
        mount_login(&server, 0).await;
        Mock::given(method("DELETE"))
            .and(path("/recipes/7"))
            .respond_with(expired())
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, false)
            .delete_recipe(&mut authenticated(), 7)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BrewSyncError::Session { .. }));
    }

    #[tokio::test]
    async fn delete_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/recipes/7"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let deleted = client(&server, false)
            .delete_recipe(&mut authenticated(), 7)
            .await
            .unwrap();
        assert!(deleted);
    }

    #[tokio::test]
    async fn dry_run_performs_no_writes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server, true);
        let mut ctx = authenticated();
        let mut recipe = Recipe::named("Pale Ale");
        assert!(client.create_recipe(&mut ctx, &recipe).await.unwrap().is_none());
        recipe.bind(3);
        assert!(client.update_recipe(&mut ctx, &recipe).await.unwrap().is_none());
        assert!(!client.delete_recipe(&mut ctx, 3).await.unwrap());
        assert!(
            client
                .create_brew(&mut ctx, 3, &Brew::default())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn create_sends_tidy_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/recipes"))
            .and(body_string_contains(r#""unit_type_id":10"#))
            .and(body_string_contains(r#""parent_recipe_id":null"#))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 99, "name": "Pale Ale"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let stored = client(&server, false)
            .create_recipe(&mut authenticated(), &Recipe::named("Pale Ale"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, Some(99));
    }

    #[tokio::test]
    async fn listing_keeps_loose_ids_and_skips_unreadable_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/my-recipes/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"id": 1, "name": "Imperial Stout", "unit_type_id": 20},
                    {"id": "2", "name": "Pale Ale", "unit_type_id": "10",
                     "hops": [{"name": "Cascade", "aa": "5.5", "hop_type_id": "20",
                               "hop_usage_type_id": "20", "time": 60, "amount": 30}]},
                    {"id": 3, "name": 5},
                ],
                "next_page_url": null
            })))
            .mount(&server)
            .await;

        let recipes = client(&server, false)
            .my_recipes(&mut authenticated(), &NamePattern::any())
            .await
            .unwrap();
        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0].unit_type_id, Some(UnitType::Imperial));
        assert_eq!(recipes[1].id, Some(2));
        assert_eq!(recipes[1].unit_type_id, Some(UnitType::Metric));
        assert_eq!(recipes[1].hops[0].usage, HopUsage::Boil);
    }

    #[tokio::test]
    async fn update_requires_binding() {
        let server = MockServer::start().await;
        let err = client(&server, false)
            .update_recipe(&mut authenticated(), &Recipe::named("Pale Ale"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BrewSyncError::Validation { .. }));
    }

    #[tokio::test]
    async fn brew_sessions_of_a_recipe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recipes/7/brew-sessions/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": 70, "recipe_id": 7, "status": 20,
                          "created_at": "2024-03-01T08:00:00.000000Z"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/brew-sessions/70"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 70, "status": 30})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server, false);
        let mut ctx = authenticated();
        let brews = client.brews(&mut ctx, 7).await.unwrap();
        assert_eq!(brews.len(), 1);
        assert_eq!(brews[0].recipe_id, Some(7));

        let stored = client.update_brew(&mut ctx, &brews[0]).await.unwrap().unwrap();
        assert_eq!(stored.status, brewsync_shared::BrewStatus::Conditioning);
    }

    #[tokio::test]
    async fn logout_clears_context() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/logout"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/"))
            .expect(1)
            .mount(&server)
            .await;

        let mut ctx = authenticated();
        client(&server, false).logout(&mut ctx).await.unwrap();
        assert!(!ctx.is_authenticated());
        assert!(ctx.cookies.is_empty());
    }
}
