use serde_json::{Map, Value};

use crate::{ApiResponse, Result, TokenSession};

/// vk.com REST API
///
/// Methods are addressed by their dotted names:
///
/// ```no_run
/// use vkcom_auth::{Api, ApiConfig, TokenSession};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let api = Api::new(TokenSession::new("access-token", ApiConfig::default())?);
///
/// let users = api
///     .method("users.get")
///     .param("user_ids", vec![1, 2])
///     .param("fields", "bdate")
///     .send()
///     .await?;
/// println!("{users}");
/// # Ok(())
/// # }
/// ```
pub struct Api {
    session: TokenSession,
}

impl Api {
    pub fn new(session: TokenSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &TokenSession {
        &self.session
    }

    /// Start building a call of the named method
    pub fn method(&self, name: impl Into<String>) -> MethodCall<'_> {
        MethodCall {
            api: self,
            name: name.into(),
            params: Map::new(),
        }
    }

    /// Call a method and return the contents of `response`
    ///
    /// # Errors
    ///
    /// Besides transport errors, API errors become [`crate::VkError::Api`]
    /// and empty answers [`crate::VkError::EmptyResponse`]
    pub async fn call(&self, name: &str, params: Map<String, Value>) -> Result<Value> {
        self.session.request(name, params).await?.into_result()
    }
}

/// Pending call of an API method
#[must_use = "a method call does nothing until sent"]
pub struct MethodCall<'a> {
    api: &'a Api,
    name: String,
    params: Map<String, Value>,
}

impl MethodCall<'_> {
    /// Add a parameter; empty values are left out of the request
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send the call, returning the payload or raising API errors
    pub async fn send(self) -> Result<Value> {
        self.api.call(&self.name, self.params).await
    }

    /// Send the call, keeping API errors as data
    pub async fn send_raw(self) -> Result<ApiResponse> {
        self.api.session.request(&self.name, self.params).await
    }
}
