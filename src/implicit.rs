//! OAuth 2.0 Implicit Grant performed headlessly.
//!
//! vk.com has no endpoint that accepts a password directly, so the session
//! walks the same pages a browser would: the authorization dialog, the
//! login form, the permissions form, and finally the redirect whose
//! fragment carries the token.
//!
//! Every decision is made from the path and query of the URL a step ends
//! on. Page markup is only mined for form fields to send back.

use tracing::{debug, error, info, warn};
use url::Url;

use crate::classify::{classify_dialog, classify_step};
use crate::form::{self, FormData};
use crate::transport::{Browser, Page};
use crate::{Credentials, OAuthConfig, Result, RetryPolicy, Token, VkError};

const GET_AUTH_DIALOG_ERROR_MSG: &str = "Failed to open authorization dialog.";
const POST_AUTH_DIALOG_ERROR_MSG: &str = "Form submission failed.";
const POST_ACCESS_DIALOG_ERROR_MSG: &str = "Failed to process access dialog.";
const GET_ACCESS_TOKEN_ERROR_MSG: &str = "Failed to receive access token.";

/// Login form field names
const LOGIN_FIELD: &str = "email";
const PASSWORD_FIELD: &str = "pass";

/// Query key present while the permissions dialog is pending
const CONSENT_MARKER: &str = "__q_hash";
/// Query key present when the login page is shown again after a failed login
const RETRY_LOGIN_MARKER: &str = "email";

/// Where a step of the flow ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checkpoint {
    /// Logged in, the permissions dialog awaits confirmation
    Consent,
    /// Login page shown again: wrong login or password
    InvalidGrant,
    Blocked,
    Other,
}

/// Mutable state of one authorization attempt
struct AuthorizationState {
    current_url: Url,
    current_html: String,
    attempts_remaining: u32,
}

impl AuthorizationState {
    fn advance(&mut self, page: Page) {
        self.current_url = page.url;
        self.current_html = page.body;
    }
}

/// Session authorized with OAuth 2.0 Implicit Grant using a login and
/// password
///
/// # Example
///
/// ```no_run
/// use vkcom_auth::{ApiConfig, Credentials, ImplicitSession, OAuthConfig, TokenSession};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let credentials = Credentials::new(123456, "user@example.com", "password").scope("friends");
/// let session = ImplicitSession::new(credentials, OAuthConfig::default())?;
///
/// let token = session.authorize().await?;
/// let api = TokenSession::from_token(&token, ApiConfig::default())?;
/// # Ok(())
/// # }
/// ```
pub struct ImplicitSession {
    browser: Browser,
    config: OAuthConfig,
    credentials: Credentials,
    auth_path: String,
    redirect_path: String,
}

impl ImplicitSession {
    /// Create a new session
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URLs cannot be parsed or the
    /// HTTP client cannot be built
    pub fn new(credentials: Credentials, config: OAuthConfig) -> Result<Self> {
        let auth_path = Url::parse(&config.auth_url)?.path().to_string();
        let redirect_path = Url::parse(&config.redirect_uri)?.path().to_string();

        Ok(Self {
            browser: Browser::new()?,
            config,
            credentials,
            auth_path,
            redirect_path,
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Authorize using the configured retry policy
    pub async fn authorize(&self) -> Result<Token> {
        self.authorize_with(self.config.retry).await
    }

    /// Authorize with an explicit retry policy
    ///
    /// An attempt that ends neither in the token redirect nor in a
    /// terminal error is repeated after `retry.interval`, up to
    /// `retry.attempts` times in total.
    ///
    /// # Errors
    ///
    /// - [`VkError::InvalidGrant`] for a wrong login or password
    /// - [`VkError::InvalidUser`] for a blocked account
    /// - [`VkError::AttemptsExceeded`] when no attempt reached the redirect
    /// - [`VkError::OAuth`], [`VkError::MissingField`] and
    ///   [`VkError::MissingFormAction`] when a step fails
    pub async fn authorize_with(&self, retry: RetryPolicy) -> Result<Token> {
        let attempts = retry.attempts.max(1);
        let mut attempts_remaining = attempts;

        loop {
            attempts_remaining -= 1;
            debug!(
                auth_url = %self.config.auth_url,
                attempt = attempts - attempts_remaining,
                max_attempts = attempts,
                "Getting authorization dialog"
            );

            let page = self.fetch_dialog().await?;
            let mut state = AuthorizationState {
                current_url: page.url,
                current_html: page.body,
                attempts_remaining,
            };

            if self.is_authorize_page(&state.current_url) {
                debug!(path = state.current_url.path(), "Submitting login form");
                let page = self.submit_credentials(&state).await?;
                state.advance(page);
            }

            match self.checkpoint(&state.current_url) {
                Checkpoint::Consent => {
                    debug!(path = state.current_url.path(), "Granting permissions");
                    let page = self.submit_consent(&state).await?;
                    state.advance(page);
                }
                Checkpoint::InvalidGrant => {
                    error!(login = %self.credentials.login, "Invalid login or password");
                    return Err(VkError::InvalidGrant);
                }
                Checkpoint::Blocked => {
                    error!(login = %self.credentials.login, "User is blocked");
                    return Err(VkError::InvalidUser);
                }
                Checkpoint::Other => {}
            }

            if self.is_redirect_page(&state.current_url) {
                let token = self.fetch_token().await?;
                info!(
                    user_id = ?token.user_id,
                    expires_in = token.expires_in,
                    "Authorized successfully"
                );
                return Ok(token);
            }

            if state.attempts_remaining == 0 {
                error!(attempts, "Login attempts exceeded");
                return Err(VkError::AttemptsExceeded { attempts });
            }

            warn!(
                path = state.current_url.path(),
                attempts_remaining = state.attempts_remaining,
                retry_in = ?retry.interval,
                "Authorization did not complete, retrying"
            );
            tokio::time::sleep(retry.interval).await;
        }
    }

    /// Open the authorization dialog; returns the page it settles on
    async fn fetch_dialog(&self) -> Result<Page> {
        let params = self
            .config
            .dialog_params(&self.credentials.app_id, &self.credentials.scope);
        let page = self.browser.get(&self.config.auth_url, &params).await?;
        classify_dialog(page.status, &page.body, GET_AUTH_DIALOG_ERROR_MSG).inspect_err(|e| {
            error!(status = page.status, error = %e, "Authorization dialog request failed");
        })?;
        Ok(page)
    }

    /// Fill in the login form and submit it
    async fn submit_credentials(&self, state: &AuthorizationState) -> Result<Page> {
        let (action, mut form) = submittable_form(state, "login")?;
        form.set(LOGIN_FIELD, self.credentials.login.as_str());
        form.set(PASSWORD_FIELD, self.credentials.password.as_str());

        let page = self.browser.post_form(action, &form.fields).await?;
        classify_step(page.status, POST_AUTH_DIALOG_ERROR_MSG).inspect_err(|_| {
            error!(status = page.status, "Login form submission failed");
        })?;
        Ok(page)
    }

    /// Confirm the permissions dialog as is
    async fn submit_consent(&self, state: &AuthorizationState) -> Result<Page> {
        let (action, form) = submittable_form(state, "permissions")?;

        let page = self.browser.post_form(action, &form.fields).await?;
        classify_step(page.status, POST_ACCESS_DIALOG_ERROR_MSG).inspect_err(|_| {
            error!(status = page.status, "Permissions form submission failed");
        })?;
        Ok(page)
    }

    /// Request the dialog once more; being authorized now, the server
    /// redirects straight to the redirect URI with the token in the fragment
    async fn fetch_token(&self) -> Result<Token> {
        let params = self
            .config
            .dialog_params(&self.credentials.app_id, &self.credentials.scope);
        let page = self.browser.get(&self.config.auth_url, &params).await?;
        classify_step(page.status, GET_ACCESS_TOKEN_ERROR_MSG).inspect_err(|_| {
            error!(status = page.status, "Access token request failed");
        })?;

        let location = page
            .redirects
            .last()
            .ok_or_else(|| VkError::oauth(GET_ACCESS_TOKEN_ERROR_MSG))?;
        Token::from_fragment(
            location.fragment().unwrap_or_default(),
            Some(self.config.state.as_str()),
        )
    }

    fn checkpoint(&self, url: &Url) -> Checkpoint {
        let on_authorize_page = self.is_authorize_page(url);
        if on_authorize_page && has_query_key(url, CONSENT_MARKER) {
            Checkpoint::Consent
        } else if on_authorize_page && has_query_key(url, RETRY_LOGIN_MARKER) {
            Checkpoint::InvalidGrant
        } else if url.query_pairs().any(|(k, v)| k == "act" && v == "blocked") {
            Checkpoint::Blocked
        } else {
            Checkpoint::Other
        }
    }

    fn is_authorize_page(&self, url: &Url) -> bool {
        url.path() == self.auth_path
    }

    fn is_redirect_page(&self, url: &Url) -> bool {
        url.path() == self.redirect_path
    }
}

fn has_query_key(url: &Url, key: &str) -> bool {
    url.query_pairs().any(|(k, _)| k == key)
}

/// Extract the page's POST form and resolve its action against the page URL
fn submittable_form(state: &AuthorizationState, page: &'static str) -> Result<(Url, FormData)> {
    let form = form::extract(&state.current_html);
    if form.action.is_empty() {
        error!(path = state.current_url.path(), page, "No POST form on page");
        return Err(VkError::MissingFormAction(page));
    }
    let action = state
        .current_url
        .join(&form.action)
        .map_err(|e| VkError::oauth(format!("Invalid {page} form action: {e}")))?;
    Ok((action, form))
}
