use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error};

use crate::classify::OAuthErrorBody;
use crate::{OAuthConfig, Result, Token, VkError};

/// Session authorized with OAuth 2.0 Authorization Code Grant
///
/// The authorization code is obtained by a server-side application from
/// the redirect after the user approves the dialog; this session exchanges
/// it for an access token.
pub struct CodeSession {
    client: reqwest::Client,
    config: OAuthConfig,
    app_id: String,
    app_secret: String,
    code: String,
}

impl CodeSession {
    pub fn new(
        app_id: impl ToString,
        app_secret: impl Into<String>,
        code: impl Into<String>,
        config: OAuthConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VkError::ClientCreation(e.to_string()))?;

        Ok(Self {
            client,
            config,
            app_id: app_id.to_string(),
            app_secret: app_secret.into(),
            code: code.into(),
        })
    }

    /// Exchange the authorization code for an access token
    ///
    /// # Errors
    ///
    /// Returns an OAuth error if the server rejects the code, answers with
    /// an empty object, or omits `access_token` / `expires_in`
    pub async fn authorize(&self) -> Result<Token> {
        let params = [
            ("client_id", self.app_id.as_str()),
            ("client_secret", self.app_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", self.code.as_str()),
        ];

        debug!(token_url = %self.config.token_url, "Exchanging authorization code");
        let response = self
            .client
            .get(&self.config.token_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| e.without_url())?;
        let content: Value = response.json().await.map_err(|e| e.without_url())?;

        token_from_content(content).inspect_err(|e| {
            error!(error = %e, "Authorization code exchange failed");
        })
    }
}

fn token_from_content(content: Value) -> Result<Token> {
    if content.get("error").is_some() {
        let error: OAuthErrorBody = serde_json::from_value(content)?;
        return Err(error.into());
    }
    if content.as_object().is_none_or(|map| map.is_empty()) {
        return Err(VkError::oauth("got empty authorization response"));
    }

    let access_token = content
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or(VkError::MissingField("access_token"))?;
    let expires_in = content
        .get("expires_in")
        .and_then(Value::as_u64)
        .ok_or(VkError::MissingField("expires_in"))?;
    let user_id = content.get("user_id").map(|id| match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    Ok(Token::new(access_token, expires_in, user_id))
}
