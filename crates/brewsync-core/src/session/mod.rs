//! Authenticated conversation with the remote recipe service.
//!
//! The service has no public API. A session is established by scraping the
//! login form for its anti-forgery key, posting credentials, and reading the
//! CSRF token from the landing page metadata. Cookies and tokens are kept in
//! a [`SessionState`] persisted between runs so later invocations can resume
//! without re-submitting credentials.

mod cookies;
mod gateway;
mod scrape;
mod store;

use std::collections::HashSet;
use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::{RecipeDocument, RemoteRecipe};
use crate::util::{compact_text, normalize_base_url, unix_timestamp_now};

pub use cookies::{Cookie, CookieJar};
pub use gateway::{
    Gateway, GatewayError, GatewayRequest, GatewayResponse, HttpGateway, Method, RequestBody,
};
pub use scrape::{form_key, page_metadata, PageTokens};
pub use store::{FileStateStore, MemoryStateStore, StatePersistence};

pub const DEFAULT_AUTH_URL: &str = "https://oauth.grainfather.com";
pub const DEFAULT_APP_URL: &str = "https://brew.grainfather.com";

const MAX_REDIRECTS: usize = 10;
const MAX_PAGES: usize = 500;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Credentials were rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),
    /// The remote service no longer accepts the session
    #[error("Session expired, a fresh login is required")]
    Expired,
    /// The remote interface did not look as expected
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Network failure, timeout or failed page fetch
    #[error("Fetch failed: {0}")]
    TransientFetch(String),
    /// A create, update or delete was rejected
    #[error("Remote write rejected with HTTP {status}: {body}")]
    RemoteWrite { status: u16, body: String },
    #[error("Operation requires an authenticated session (current state: {0})")]
    NotAuthenticated(SessionPhase),
    #[error("Session storage error: {0}")]
    Storage(String),
}

impl SessionError {
    /// Whether the error stops the whole run.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Expired | Self::RemoteWrite { .. })
    }
}

impl From<GatewayError> for SessionError {
    fn from(error: GatewayError) -> Self {
        Self::TransientFetch(error.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Authenticating,
    Authenticated,
    Expired,
    LoggedOut,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Expired => "expired",
            Self::LoggedOut => "logged out",
        };
        f.write_str(label)
    }
}

#[derive(Clone, PartialEq, Eq)]
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

impl fmt::Debug for Credentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Everything needed to resume an authenticated session.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Account identity the state belongs to
    pub account: String,
    pub csrf_token: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub cookies: CookieJar,
    /// Raw page metadata captured at login
    #[serde(default)]
    pub metadata: Value,
    /// Unix seconds of the last save
    pub saved_at: i64,
}

impl fmt::Debug for SessionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionState")
            .field("account", &self.account)
            .field("csrf_token", &"[REDACTED]")
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("cookies", &self.cookies.len())
            .field("saved_at", &self.saved_at)
            .finish_non_exhaustive()
    }
}

/// Remote URLs derived from the two configured base URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    auth_base: String,
    app_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_base: DEFAULT_AUTH_URL.to_string(),
            app_base: DEFAULT_APP_URL.to_string(),
        }
    }
}

impl Endpoints {
    pub fn new(auth_base: &str, app_base: &str) -> crate::Result<Self> {
        Ok(Self {
            auth_base: normalize_base_url(auth_base).map_err(crate::Error::InvalidInput)?,
            app_base: normalize_base_url(app_base).map_err(crate::Error::InvalidInput)?,
        })
    }

    pub fn login_form(&self) -> String {
        format!("{}/customer/account/login/", self.auth_base)
    }

    pub fn login_post(&self) -> String {
        format!("{}/customer/account/loginPost/", self.auth_base)
    }

    pub fn landing(&self) -> String {
        format!("{}/", self.app_base)
    }

    pub fn logout(&self) -> String {
        format!("{}/logout", self.app_base)
    }

    pub fn listing(&self) -> String {
        format!("{}/my-recipes/data?page=1", self.app_base)
    }

    pub fn record(&self, id: i64) -> String {
        format!("{}/recipes/data/{id}", self.app_base)
    }

    pub fn recipe(&self, id: i64) -> String {
        format!("{}/recipes/{id}", self.app_base)
    }

    pub fn create(&self) -> String {
        format!("{}/recipes", self.app_base)
    }
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    data: Option<Vec<Value>>,
    #[serde(default)]
    next_page_url: Option<String>,
}

/// Whether a redirect target is the login page, i.e. authentication is required.
fn is_login_redirect(location: &str) -> bool {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    path.contains("/login")
}

fn resolve_location(base: &str, location: &str) -> SessionResult<String> {
    let base = Url::parse(base)
        .map_err(|error| SessionError::Protocol(format!("Invalid URL {base}: {error}")))?;
    base.join(location)
        .map(String::from)
        .map_err(|error| SessionError::Protocol(format!("Invalid redirect {location}: {error}")))
}

/// Send one request with the jar's cookies and record any cookies it sets.
async fn exchange<G: Gateway>(
    gateway: &G,
    jar: &mut CookieJar,
    mut request: GatewayRequest,
) -> SessionResult<GatewayResponse> {
    let now = unix_timestamp_now();
    if let Some(cookie) = jar.header_for(&request.url, now) {
        request.headers.push(("Cookie".to_string(), cookie));
    }
    let method = request.method;
    let url = request.url.clone();

    let response = gateway.send(request).await.map_err(|error| {
        tracing::warn!("{} {} failed: {}", method, url, error);
        SessionError::from(error)
    })?;
    tracing::info!("{} {} -> {}", method, url, response.status);

    for set_cookie in response.header_all("set-cookie") {
        jar.store(&url, set_cookie, now);
    }
    Ok(response)
}

/// Send a request and follow redirects with GET, collecting cookies on every
/// hop. A redirect to the login page yields `on_login()`.
async fn follow<G: Gateway>(
    gateway: &G,
    jar: &mut CookieJar,
    request: GatewayRequest,
    on_login: Option<fn() -> SessionError>,
) -> SessionResult<(String, GatewayResponse)> {
    let mut url = request.url.clone();
    let mut response = exchange(gateway, jar, request).await?;

    for _ in 0..MAX_REDIRECTS {
        if !response.is_redirect() {
            return Ok((url, response));
        }
        let location = response.location().ok_or_else(|| {
            SessionError::Protocol(format!("Redirect from {url} without a Location"))
        })?;
        if let Some(on_login) = on_login {
            if is_login_redirect(location) {
                return Err(on_login());
            }
        }
        url = resolve_location(&url, location)?;
        response = exchange(gateway, jar, GatewayRequest::get(url.clone())).await?;
    }

    if response.is_redirect() {
        return Err(SessionError::Protocol(format!(
            "Too many redirects while fetching {url}"
        )));
    }
    Ok((url, response))
}

const fn session_expired() -> SessionError {
    SessionError::Expired
}

fn rejected_credentials() -> SessionError {
    SessionError::Authentication("the service rejected the credentials".to_string())
}

/// Drives login, resume, listing, writes and logout over a [`Gateway`].
///
/// Only the `Authenticated` phase permits listing and writes. Requests are
/// strictly sequential.
pub struct SessionManager<G: Gateway, S: StatePersistence> {
    gateway: G,
    store: S,
    endpoints: Endpoints,
    phase: SessionPhase,
    state: Option<SessionState>,
}

impl<G: Gateway, S: StatePersistence> SessionManager<G, S> {
    pub fn new(gateway: G, store: S, endpoints: Endpoints) -> Self {
        Self {
            gateway,
            store,
            endpoints,
            phase: SessionPhase::Anonymous,
            state: None,
        }
    }

    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub const fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub const fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    #[cfg(test)]
    pub(crate) fn authenticated(gateway: G, store: S, state: SessionState) -> Self {
        Self {
            gateway,
            store,
            endpoints: Endpoints::default(),
            phase: SessionPhase::Authenticated,
            state: Some(state),
        }
    }

    /// Perform the full login handshake and persist the resulting state.
    pub async fn login(&mut self, credentials: &Credentials) -> SessionResult<SessionState> {
        if credentials.username.trim().is_empty() || credentials.password.is_empty() {
            return Err(SessionError::Authentication(
                "username and password are required".to_string(),
            ));
        }

        self.phase = SessionPhase::Authenticating;
        self.state = None;
        match self.handshake(credentials).await {
            Ok(state) => {
                self.store.save(&state)?;
                self.state = Some(state.clone());
                self.phase = SessionPhase::Authenticated;
                tracing::info!("Logged in as {}", credentials.username);
                Ok(state)
            }
            Err(error) => {
                self.phase = SessionPhase::Anonymous;
                Err(error)
            }
        }
    }

    async fn handshake(&self, credentials: &Credentials) -> SessionResult<SessionState> {
        let mut jar = CookieJar::new();

        let (_, form) = follow(
            &self.gateway,
            &mut jar,
            GatewayRequest::get(self.endpoints.login_form()),
            None,
        )
        .await?;
        if !form.is_success() {
            return Err(SessionError::Protocol(format!(
                "Login form returned HTTP {}",
                form.status
            )));
        }
        let form_key = form_key(&form.body)?;

        let submit = GatewayRequest::new(Method::Post, self.endpoints.login_post()).form(vec![
            ("form_key".to_string(), form_key),
            ("login[username]".to_string(), credentials.username.clone()),
            ("login[password]".to_string(), credentials.password.clone()),
        ]);
        follow(&self.gateway, &mut jar, submit, Some(rejected_credentials)).await?;

        let (_, landing) = follow(
            &self.gateway,
            &mut jar,
            GatewayRequest::get(self.endpoints.landing()),
            Some(rejected_credentials),
        )
        .await?;
        if !landing.is_success() {
            return Err(SessionError::Protocol(format!(
                "Landing page returned HTTP {}",
                landing.status
            )));
        }
        let metadata = page_metadata(&landing.body)?;
        let tokens = PageTokens::from_metadata(&metadata)?;

        Ok(SessionState {
            account: credentials.username.clone(),
            csrf_token: tokens.csrf_token,
            api_token: tokens.api_token,
            cookies: jar,
            metadata,
            saved_at: unix_timestamp_now(),
        })
    }

    /// Resume the state held by the store.
    pub async fn resume(&mut self) -> SessionResult<SessionState> {
        match self.store.load()? {
            Some(state) => self.resume_with(state).await,
            None => {
                tracing::debug!("No persisted session state to resume");
                self.phase = SessionPhase::Expired;
                Err(SessionError::Expired)
            }
        }
    }

    /// Validate persisted state against the service without credentials.
    pub async fn resume_with(&mut self, mut state: SessionState) -> SessionResult<SessionState> {
        self.phase = SessionPhase::Authenticating;
        state.cookies.remove_expired(unix_timestamp_now());

        let result = follow(
            &self.gateway,
            &mut state.cookies,
            GatewayRequest::get(self.endpoints.landing()),
            Some(session_expired),
        )
        .await;

        let landing = match result {
            Ok((_, landing)) if landing.is_success() => landing,
            Ok((_, landing)) => {
                self.phase = SessionPhase::Anonymous;
                return Err(SessionError::TransientFetch(format!(
                    "Landing page returned HTTP {}",
                    landing.status
                )));
            }
            Err(SessionError::Expired) => {
                tracing::info!("Persisted session for {} has expired", state.account);
                self.phase = SessionPhase::Expired;
                return Err(SessionError::Expired);
            }
            Err(error) => {
                self.phase = SessionPhase::Anonymous;
                return Err(error);
            }
        };

        // Tokens may rotate; keep the stored ones if the page carries none.
        if let Ok(metadata) = page_metadata(&landing.body) {
            if let Ok(tokens) = PageTokens::from_metadata(&metadata) {
                state.csrf_token = tokens.csrf_token;
                state.api_token = tokens.api_token.or(state.api_token);
                state.metadata = metadata;
            }
        }
        state.saved_at = unix_timestamp_now();
        self.store.save(&state)?;
        self.state = Some(state.clone());
        self.phase = SessionPhase::Authenticated;
        tracing::info!("Resumed session of {}", state.account);
        Ok(state)
    }

    /// Resume persisted state, falling back to a login when it is missing or
    /// expired.
    pub async fn establish(&mut self, credentials: Option<&Credentials>) -> SessionResult<()> {
        match self.resume().await {
            Ok(_) => Ok(()),
            Err(SessionError::Expired) => {
                let credentials = credentials.ok_or_else(|| {
                    SessionError::Authentication(
                        "no valid session and no credentials given".to_string(),
                    )
                })?;
                self.login(credentials).await.map(|_| ())
            }
            Err(error) => Err(error),
        }
    }

    /// Send a request within the authenticated session.
    async fn request(&mut self, request: GatewayRequest) -> SessionResult<GatewayResponse> {
        if self.phase != SessionPhase::Authenticated {
            return Err(SessionError::NotAuthenticated(self.phase));
        }
        let Some(state) = self.state.as_mut() else {
            return Err(SessionError::NotAuthenticated(self.phase));
        };

        let request = request
            .header("Accept", "application/json")
            .header("X-Requested-With", "XMLHttpRequest")
            .header("X-CSRF-TOKEN", state.csrf_token.clone());
        let cookies_before = state.cookies.clone();
        let response = exchange(&self.gateway, &mut state.cookies, request).await?;

        if response.is_redirect() {
            let location = response.location().unwrap_or_default();
            if is_login_redirect(location) {
                tracing::info!("Session expired (redirected to {})", location);
                self.phase = SessionPhase::Expired;
                return Err(SessionError::Expired);
            }
            return Err(SessionError::Protocol(format!(
                "Unexpected redirect to {location}"
            )));
        }
        if response.status == 401 || response.status == 419 {
            tracing::info!("Session expired (HTTP {})", response.status);
            self.phase = SessionPhase::Expired;
            return Err(SessionError::Expired);
        }

        if state.cookies != cookies_before {
            state.saved_at = unix_timestamp_now();
            if let Err(error) = self.store.save(state) {
                tracing::warn!("Failed to persist refreshed cookies: {}", error);
            }
        }
        Ok(response)
    }

    /// Fetch every listing page in order and concatenate the records.
    pub async fn list_recipes(&mut self) -> SessionResult<Vec<RemoteRecipe>> {
        let mut recipes = Vec::new();
        let mut seen = HashSet::new();
        let mut url = self.endpoints.listing();

        loop {
            if seen.len() >= MAX_PAGES {
                return Err(SessionError::Protocol(format!(
                    "Listing exceeded {MAX_PAGES} pages"
                )));
            }
            if !seen.insert(url.clone()) {
                return Err(SessionError::Protocol(format!(
                    "Listing pagination loops back to {url}"
                )));
            }

            let response = self.request(GatewayRequest::get(url.clone())).await?;
            if !response.is_success() {
                return Err(SessionError::TransientFetch(format!(
                    "Listing page {url} returned HTTP {}",
                    response.status
                )));
            }
            let page: ListingPage = serde_json::from_str(&response.body).map_err(|error| {
                SessionError::Protocol(format!("Listing page {url} is not valid JSON: {error}"))
            })?;
            let Some(entries) = page.data else {
                return Err(SessionError::Protocol(format!(
                    "Listing page {url} has no data array"
                )));
            };
            for entry in entries {
                let recipe = RemoteRecipe::from_json(entry).map_err(|error| {
                    SessionError::Protocol(format!("Unreadable listing entry: {error}"))
                })?;
                recipes.push(recipe);
            }

            match page.next_page_url {
                Some(next) if !next.trim().is_empty() => url = resolve_location(&url, &next)?,
                _ => break,
            }
        }

        tracing::debug!("Listed {} remote recipes", recipes.len());
        Ok(recipes)
    }

    /// Fetch the full record of one recipe.
    pub async fn fetch_recipe(&mut self, id: i64) -> SessionResult<RemoteRecipe> {
        let url = self.endpoints.record(id);
        let response = self.request(GatewayRequest::get(url.clone())).await?;
        if !response.is_success() {
            return Err(SessionError::TransientFetch(format!(
                "Recipe {id} returned HTTP {}",
                response.status
            )));
        }
        let body: Value = serde_json::from_str(&response.body).map_err(|error| {
            SessionError::Protocol(format!("Recipe {id} is not valid JSON: {error}"))
        })?;
        RemoteRecipe::from_json(body)
            .map_err(|error| SessionError::Protocol(format!("Unreadable recipe {id}: {error}")))
    }

    async fn write(&mut self, request: GatewayRequest) -> SessionResult<GatewayResponse> {
        let response = self.request(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(SessionError::RemoteWrite {
                status: response.status,
                body: compact_text(&response.body),
            })
        }
    }

    /// Create a recipe; returns the new remote id when the service reports one.
    pub async fn create(&mut self, document: &RecipeDocument) -> SessionResult<Option<i64>> {
        let body = serde_json::to_value(document)
            .map_err(|error| SessionError::Protocol(error.to_string()))?;
        let request = GatewayRequest::new(Method::Post, self.endpoints.create()).json(body);
        let response = self.write(request).await?;
        Ok(serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|created| created.get("id").and_then(Value::as_i64)))
    }

    /// Replace recipe `id` with `body`.
    pub async fn update(&mut self, id: i64, body: &Value) -> SessionResult<()> {
        let request = GatewayRequest::new(Method::Put, self.endpoints.recipe(id)).json(body.clone());
        self.write(request).await.map(|_| ())
    }

    pub async fn delete(&mut self, id: i64) -> SessionResult<()> {
        let request = GatewayRequest::new(Method::Delete, self.endpoints.recipe(id));
        self.write(request).await.map(|_| ())
    }

    /// Invalidate the remote session and forget the persisted state.
    pub async fn logout(&mut self) -> SessionResult<()> {
        let state = match self.state.take() {
            Some(state) => Some(state),
            None => self.store.load()?,
        };

        if let Some(mut state) = state {
            let result = exchange(
                &self.gateway,
                &mut state.cookies,
                GatewayRequest::get(self.endpoints.logout()),
            )
            .await;
            if let Err(error) = result {
                tracing::warn!("Remote logout failed: {}", error);
            }
        }

        self.store.clear()?;
        self.phase = SessionPhase::LoggedOut;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::test_support::{
        authenticated_session, landing_html, listing_page, login_form_html, sample_state,
        script_login, MockGateway, APP, AUTH,
    };

    fn manager(gateway: MockGateway) -> SessionManager<MockGateway, MemoryStateStore> {
        SessionManager::new(gateway, MemoryStateStore::new(), Endpoints::default())
    }

    #[tokio::test]
    async fn login_captures_tokens_and_cookies() {
        let gateway = MockGateway::new();
        script_login(&gateway);
        let store = MemoryStateStore::new();
        let mut session = SessionManager::new(gateway, store.clone(), Endpoints::default());

        let state = session.login(&Credentials::new("brewer", "secret")).await.unwrap();

        assert_eq!(session.phase(), SessionPhase::Authenticated);
        assert_eq!(state.csrf_token, "csrf-1");
        assert_eq!(state.api_token.as_deref(), Some("api-1"));
        assert!(state.cookies.get("frontend").is_some());
        assert_eq!(store.snapshot(), Some(state));

        let requests = session.gateway().requests();
        let post = requests
            .iter()
            .find(|request| request.method == Method::Post)
            .unwrap();
        assert_eq!(
            post.body,
            RequestBody::Form(vec![
                ("form_key".to_string(), "fk123".to_string()),
                ("login[username]".to_string(), "brewer".to_string()),
                ("login[password]".to_string(), "secret".to_string()),
            ])
        );
        assert!(post.header_value("cookie").is_some());
    }

    #[tokio::test]
    async fn rejected_credentials_are_authentication_errors() {
        let gateway = MockGateway::new();
        gateway.on(Method::Get, &format!("{AUTH}/customer/account/login/"), login_form_html("fk123"));
        gateway.on(
            Method::Post,
            &format!("{AUTH}/customer/account/loginPost/"),
            GatewayResponse::redirect(format!("{AUTH}/customer/account/login/")),
        );
        let mut session = manager(gateway);

        let error = session
            .login(&Credentials::new("brewer", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(error, SessionError::Authentication(_)));
        assert_eq!(session.phase(), SessionPhase::Anonymous);
    }

    #[tokio::test]
    async fn missing_form_key_is_protocol_error() {
        let gateway = MockGateway::new();
        gateway.on(
            Method::Get,
            &format!("{AUTH}/customer/account/login/"),
            GatewayResponse::new(200, "<html>maintenance</html>"),
        );
        let mut session = manager(gateway);

        let error = session
            .login(&Credentials::new("brewer", "secret"))
            .await
            .unwrap_err();
        assert!(matches!(error, SessionError::Protocol(_)));
    }

    #[tokio::test]
    async fn operations_require_authentication() {
        let mut session = manager(MockGateway::new());
        let error = session.list_recipes().await.unwrap_err();
        assert!(matches!(
            error,
            SessionError::NotAuthenticated(SessionPhase::Anonymous)
        ));
        assert!(session.gateway().requests().is_empty());
    }

    #[tokio::test]
    async fn listing_concatenates_pages_in_order() {
        let gateway = MockGateway::new();
        gateway.on(
            Method::Get,
            &format!("{APP}/my-recipes/data?page=1"),
            listing_page(&[(1, "A"), (2, "B")], Some(&format!("{APP}/my-recipes/data?page=2"))),
        );
        gateway.on(
            Method::Get,
            &format!("{APP}/my-recipes/data?page=2"),
            listing_page(&[(3, "C"), (4, "D")], Some(&format!("{APP}/my-recipes/data?page=3"))),
        );
        gateway.on(
            Method::Get,
            &format!("{APP}/my-recipes/data?page=3"),
            listing_page(&[(5, "E")], None),
        );
        let mut session = authenticated_session(gateway);

        let recipes = session.list_recipes().await.unwrap();
        let ids: Vec<_> = recipes.iter().map(|recipe| recipe.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);

        let listing_request = &session.gateway().requests()[0];
        assert_eq!(listing_request.header_value("x-csrf-token"), Some("csrf-0"));
        assert_eq!(
            listing_request.header_value("x-requested-with"),
            Some("XMLHttpRequest")
        );
    }

    #[tokio::test]
    async fn failed_page_aborts_listing() {
        let gateway = MockGateway::new();
        gateway.on(
            Method::Get,
            &format!("{APP}/my-recipes/data?page=1"),
            listing_page(&[(1, "A")], Some(&format!("{APP}/my-recipes/data?page=2"))),
        );
        gateway.fail(
            Method::Get,
            &format!("{APP}/my-recipes/data?page=2"),
            GatewayError::Timeout("30s".to_string()),
        );
        let mut session = authenticated_session(gateway);

        let error = session.list_recipes().await.unwrap_err();
        assert!(matches!(error, SessionError::TransientFetch(_)));
    }

    #[tokio::test]
    async fn looping_pagination_is_protocol_error() {
        let gateway = MockGateway::new();
        gateway.on(
            Method::Get,
            &format!("{APP}/my-recipes/data?page=1"),
            listing_page(&[(1, "A")], Some(&format!("{APP}/my-recipes/data?page=1"))),
        );
        let mut session = authenticated_session(gateway);

        let error = session.list_recipes().await.unwrap_err();
        assert!(matches!(error, SessionError::Protocol(_)));
    }

    #[tokio::test]
    async fn malformed_listing_is_protocol_error() {
        let gateway = MockGateway::new();
        gateway.on(
            Method::Get,
            &format!("{APP}/my-recipes/data?page=1"),
            GatewayResponse::new(200, "<html>oops</html>"),
        );
        let mut session = authenticated_session(gateway);
        assert!(matches!(
            session.list_recipes().await,
            Err(SessionError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn login_redirect_marks_session_expired() {
        let gateway = MockGateway::new();
        gateway.on(
            Method::Get,
            &format!("{APP}/my-recipes/data?page=1"),
            GatewayResponse::redirect(format!("{APP}/login")),
        );
        let mut session = authenticated_session(gateway);

        let error = session.list_recipes().await.unwrap_err();
        assert!(matches!(error, SessionError::Expired));
        assert_eq!(session.phase(), SessionPhase::Expired);
    }

    #[tokio::test]
    async fn stale_resume_then_login_then_listing() {
        let gateway = MockGateway::new();
        gateway.on(
            Method::Get,
            &format!("{APP}/"),
            GatewayResponse::redirect(format!("{AUTH}/customer/account/login/")),
        );
        let store = MemoryStateStore::with_state(sample_state("brewer"));
        let mut session = SessionManager::new(gateway, store, Endpoints::default());

        let error = session.resume().await.unwrap_err();
        assert!(matches!(error, SessionError::Expired));
        assert_eq!(session.phase(), SessionPhase::Expired);

        script_login(session.gateway());
        session.login(&Credentials::new("brewer", "secret")).await.unwrap();
        session.gateway().on(
            Method::Get,
            &format!("{APP}/my-recipes/data?page=1"),
            listing_page(&[(9, "Stout")], None),
        );

        let recipes = session.list_recipes().await.unwrap();
        assert_eq!(recipes.len(), 1);
        assert_eq!(recipes[0].name, "Stout");
    }

    #[tokio::test]
    async fn resume_refreshes_tokens() {
        let gateway = MockGateway::new();
        gateway.on(Method::Get, &format!("{APP}/"), landing_html("csrf-2", "api-2"));
        let store = MemoryStateStore::with_state(sample_state("brewer"));
        let mut session = SessionManager::new(gateway, store.clone(), Endpoints::default());

        let state = session.resume().await.unwrap();
        assert_eq!(session.phase(), SessionPhase::Authenticated);
        assert_eq!(state.csrf_token, "csrf-2");
        assert_eq!(store.snapshot().unwrap().csrf_token, "csrf-2");

        let resumed = &session.gateway().requests()[0];
        assert_eq!(resumed.header_value("cookie"), Some("session=persisted"));
    }

    #[tokio::test]
    async fn resume_without_state_is_expired() {
        let mut session = manager(MockGateway::new());
        assert!(matches!(session.resume().await, Err(SessionError::Expired)));
        assert!(session.gateway().requests().is_empty());
    }

    #[tokio::test]
    async fn establish_requires_credentials_without_state() {
        let mut session = manager(MockGateway::new());
        let error = session.establish(None).await.unwrap_err();
        assert!(matches!(error, SessionError::Authentication(_)));
    }

    #[tokio::test]
    async fn rejected_write_carries_status_and_body() {
        let gateway = MockGateway::new();
        gateway.on(
            Method::Put,
            &format!("{APP}/recipes/5"),
            GatewayResponse::new(422, r#"{"message":"The name field is required."}"#),
        );
        let mut session = authenticated_session(gateway);

        let error = session.update(5, &json!({"name": ""})).await.unwrap_err();
        match error {
            SessionError::RemoteWrite { status, body } => {
                assert_eq!(status, 422);
                assert!(body.contains("name field"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!SessionError::RemoteWrite {
            status: 422,
            body: String::new()
        }
        .is_fatal());
    }

    #[tokio::test]
    async fn create_reports_new_id() {
        let gateway = MockGateway::new();
        gateway.on(
            Method::Post,
            &format!("{APP}/recipes"),
            GatewayResponse::new(201, r#"{"id": 77, "name": "Pale Ale"}"#),
        );
        let mut session = authenticated_session(gateway);
        let document = crate::translate::translate_recipe(&crate::test_support::sample_recipe(
            1, "Pale Ale",
        ))
        .unwrap();

        assert_eq!(session.create(&document).await.unwrap(), Some(77));
        let request = &session.gateway().requests()[0];
        match &request.body {
            RequestBody::Json(body) => assert_eq!(body["name"], json!("Pale Ale")),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn logout_clears_state_even_when_remote_fails() {
        let gateway = MockGateway::new();
        gateway.fail(
            Method::Get,
            &format!("{APP}/logout"),
            GatewayError::Transport("connection reset".to_string()),
        );
        let store = MemoryStateStore::with_state(sample_state("brewer"));
        let mut session = SessionManager::new(gateway, store.clone(), Endpoints::default());

        session.logout().await.unwrap();
        assert_eq!(session.phase(), SessionPhase::LoggedOut);
        assert!(store.snapshot().is_none());
        assert_eq!(session.gateway().requests().len(), 1);
    }

    #[test]
    fn endpoints_reject_non_http_urls() {
        assert!(Endpoints::new("ftp://auth", DEFAULT_APP_URL).is_err());
        let endpoints = Endpoints::new("https://auth.example/", "https://app.example").unwrap();
        assert_eq!(endpoints.record(3), "https://app.example/recipes/data/3");
        assert_eq!(
            endpoints.login_post(),
            "https://auth.example/customer/account/loginPost/"
        );
    }

    #[test]
    fn login_redirect_detection_ignores_query() {
        assert!(is_login_redirect("https://auth.example/customer/account/login/"));
        assert!(is_login_redirect("/login"));
        assert!(!is_login_redirect("https://brew.example/recipes?next=/login"));
    }

    #[test]
    fn state_debug_redacts_tokens() {
        let rendered = format!("{:?}", sample_state("brewer"));
        assert!(!rendered.contains("csrf-0"));
        assert!(!rendered.contains("persisted"));
        let rendered = format!("{:?}", Credentials::new("brewer", "hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
