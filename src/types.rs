use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Result, VkError};

pub(crate) const DEFAULT_API_URL: &str = "https://api.vk.com/method";
pub(crate) const DEFAULT_API_VERSION: &str = "5.101";
pub(crate) const DEFAULT_AUTH_URL: &str = "https://oauth.vk.com/authorize";
pub(crate) const DEFAULT_TOKEN_URL: &str = "https://oauth.vk.com/access_token";
pub(crate) const DEFAULT_REDIRECT_URI: &str = "https://oauth.vk.com/blank.html";
pub(crate) const DEFAULT_DISPLAY: &str = "mobile";

/// Application and user credentials for a password login
#[derive(Clone)]
pub struct Credentials {
    /// Application (client) ID
    pub app_id: String,
    /// Phone number or e-mail used to sign in
    pub login: String,
    pub password: String,
    /// Requested permissions, either a bit mask or comma separated names
    pub scope: String,
}

impl Credentials {
    pub fn new(
        app_id: impl ToString,
        login: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.to_string(),
            login: login.into(),
            password: password.into(),
            scope: String::new(),
        }
    }

    /// Set the requested scope
    pub fn scope(mut self, scope: impl ToString) -> Self {
        self.scope = scope.to_string();
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

/// Access token obtained from an authorization flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    /// Lifetime in seconds; `0` for tokens issued with the `offline` permission
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Unix timestamp (seconds) when the token was received
    pub issued_at: u64,
}

impl Token {
    pub fn new(access_token: impl Into<String>, expires_in: u64, user_id: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in,
            user_id,
            issued_at: unix_now(),
        }
    }

    /// Unix timestamp when the token expires, `None` if it never does.
    ///
    /// A lifetime too large to add to the issue time counts as unlimited.
    pub fn expires_at(&self) -> Option<u64> {
        if self.expires_in == 0 {
            return None;
        }
        self.issued_at.checked_add(self.expires_in)
    }

    /// Check if the token is expired or will expire within 5 minutes
    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .is_some_and(|at| at <= unix_now().saturating_add(300))
    }

    /// Parse the token out of a redirect URL such as
    /// `https://oauth.vk.com/blank.html#access_token=...&expires_in=86400&user_id=1`.
    ///
    /// This is what the browser lands on at the end of a manual implicit flow.
    pub fn from_redirect_url(redirect: &str) -> Result<Self> {
        let url = Url::parse(redirect)?;
        Self::from_fragment(url.fragment().unwrap_or_default(), None)
    }

    /// Parse an `application/x-www-form-urlencoded` fragment.
    ///
    /// When `expected_state` is given and the fragment echoes a different
    /// `state`, the token is rejected.
    pub(crate) fn from_fragment(fragment: &str, expected_state: Option<&str>) -> Result<Self> {
        let mut access_token = None;
        let mut expires_in = None;
        let mut user_id = None;
        let mut state = None;

        for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            match key.as_ref() {
                "access_token" => access_token = Some(value.into_owned()),
                "expires_in" => expires_in = Some(value.into_owned()),
                "user_id" => user_id = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => {
                    return Err(VkError::OAuth {
                        error: value.into_owned(),
                        description: fragment_value(fragment, "error_description"),
                    });
                }
                _ => {}
            }
        }

        let access_token = access_token.ok_or(VkError::MissingField("access_token"))?;
        let expires_in = expires_in
            .ok_or(VkError::MissingField("expires_in"))?
            .parse::<u64>()
            .map_err(|e| VkError::oauth(format!("invalid expires_in: {}", e)))?;

        if let (Some(expected), Some(received)) = (expected_state, state.as_deref())
            && !expected.is_empty()
            && expected != received
        {
            return Err(VkError::oauth("State mismatch - possible CSRF attack"));
        }

        Ok(Token::new(access_token, expires_in, user_id))
    }
}

fn fragment_value(fragment: &str, name: &str) -> String {
    url::form_urlencoded::parse(fragment.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default()
}

/// How many times the implicit flow is attempted and how long to wait
/// between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of dialog fetch cycles; `0` is treated as `1`
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            interval: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

/// Configuration of the OAuth endpoints used by the implicit and
/// authorization code flows
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Authorization dialog URL (default: "https://oauth.vk.com/authorize")
    pub auth_url: String,
    /// Code exchange URL (default: "https://oauth.vk.com/access_token")
    pub token_url: String,
    /// Redirect URI (default: "https://oauth.vk.com/blank.html")
    pub redirect_uri: String,
    /// Dialog appearance (default: "mobile")
    pub display: String,
    /// API version sent with the dialog request
    pub version: String,
    /// Opaque value echoed back in the redirect; random by default
    pub state: String,
    /// Ask the user to grant permissions again even if already granted
    pub revoke: bool,
    pub retry: RetryPolicy,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            display: DEFAULT_DISPLAY.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            state: generate_random_state(),
            revoke: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl OAuthConfig {
    /// Create a new config builder
    pub fn builder() -> OAuthConfigBuilder {
        OAuthConfigBuilder::default()
    }

    /// Query parameters of the implicit-flow authorization dialog
    pub(crate) fn dialog_params<'a>(
        &'a self,
        app_id: &'a str,
        scope: &'a str,
    ) -> [(&'a str, &'a str); 8] {
        [
            ("client_id", app_id),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("display", self.display.as_str()),
            ("scope", scope),
            ("response_type", "token"),
            ("v", self.version.as_str()),
            ("state", self.state.as_str()),
            ("revoke", if self.revoke { "1" } else { "0" }),
        ]
    }

    /// Build the authorization dialog URL for an implicit flow
    ///
    /// Open it in a browser, sign in, then hand the final address bar
    /// contents to [`Token::from_redirect_url`].
    pub fn authorization_url(&self, app_id: &str, scope: &str) -> Result<Url> {
        let mut url = Url::parse(&self.auth_url)?;
        url.query_pairs_mut()
            .extend_pairs(self.dialog_params(app_id, scope));
        Ok(url)
    }
}

/// Builder for OAuthConfig
#[derive(Debug, Clone, Default)]
pub struct OAuthConfigBuilder {
    auth_url: Option<String>,
    token_url: Option<String>,
    redirect_uri: Option<String>,
    display: Option<String>,
    version: Option<String>,
    state: Option<String>,
    revoke: Option<bool>,
    retry: Option<RetryPolicy>,
}

impl OAuthConfigBuilder {
    /// Set the authorization dialog URL
    pub fn auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = Some(auth_url.into());
        self
    }

    /// Set the code exchange URL
    pub fn token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = Some(token_url.into());
        self
    }

    /// Set the redirect URI
    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Set the API version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set a fixed state value instead of a random one
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn revoke(mut self, revoke: bool) -> Self {
        self.revoke = Some(revoke);
        self
    }

    /// Set the number of login attempts and the pause between them
    pub fn retry(mut self, attempts: u32, interval: Duration) -> Self {
        self.retry = Some(RetryPolicy::new(attempts, interval));
        self
    }

    /// Build the OAuthConfig
    pub fn build(self) -> OAuthConfig {
        let defaults = OAuthConfig::default();
        OAuthConfig {
            auth_url: self.auth_url.unwrap_or(defaults.auth_url),
            token_url: self.token_url.unwrap_or(defaults.token_url),
            redirect_uri: self.redirect_uri.unwrap_or(defaults.redirect_uri),
            display: self.display.unwrap_or(defaults.display),
            version: self.version.unwrap_or(defaults.version),
            state: self.state.unwrap_or(defaults.state),
            revoke: self.revoke.unwrap_or(defaults.revoke),
            retry: self.retry.unwrap_or(defaults.retry),
        }
    }
}

/// Configuration of the REST endpoint
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of API methods (default: "https://api.vk.com/method")
    pub api_url: String,
    /// API version injected into every call (default: "5.101")
    pub version: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

impl ApiConfig {
    /// Create a new config builder
    pub fn builder() -> ApiConfigBuilder {
        ApiConfigBuilder::default()
    }
}

/// Builder for ApiConfig
#[derive(Debug, Clone, Default)]
pub struct ApiConfigBuilder {
    api_url: Option<String>,
    version: Option<String>,
}

impl ApiConfigBuilder {
    /// Set the base URL of API methods
    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    /// Set the API version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Build the ApiConfig
    pub fn build(self) -> ApiConfig {
        let defaults = ApiConfig::default();
        ApiConfig {
            api_url: self.api_url.unwrap_or(defaults.api_url),
            version: self.version.unwrap_or(defaults.version),
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Generate a random state string for CSRF protection
pub(crate) fn generate_random_state() -> String {
    use base64::{Engine as _, engine::general_purpose};
    use rand::RngCore;

    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
