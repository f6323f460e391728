use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::classify::{ApiResponse, classify_api, is_falsy};
use crate::{ApiConfig, Result, Token, VkError};

/// Session for sending authorized requests to API methods
///
/// # Example
///
/// ```no_run
/// use vkcom_auth::{ApiConfig, ApiResponse, TokenSession};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let session = TokenSession::new("access-token", ApiConfig::default())?;
/// let mut params = serde_json::Map::new();
/// params.insert("user_ids".into(), "1".into());
///
/// match session.request("users.get", params).await? {
///     ApiResponse::Success(users) => println!("{users}"),
///     ApiResponse::ApiError(error) => eprintln!("{error}"),
///     ApiResponse::EmptyResponse => eprintln!("nothing returned"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct TokenSession {
    client: reqwest::Client,
    config: ApiConfig,
    access_token: String,
}

impl TokenSession {
    /// Create a session from a pre-issued access token
    pub fn new(access_token: impl Into<String>, config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VkError::ClientCreation(e.to_string()))?;

        Ok(Self {
            client,
            config,
            access_token: access_token.into(),
        })
    }

    /// Create a session from the token returned by an authorization flow
    pub fn from_token(token: &Token, config: ApiConfig) -> Result<Self> {
        Self::new(token.access_token.clone(), config)
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Parameters injected into every request
    pub fn required_params(&self) -> [(&str, &str); 2] {
        [
            ("v", self.config.version.as_str()),
            ("access_token", self.access_token.as_str()),
        ]
    }

    /// Call an API method
    ///
    /// Parameters with empty values (`null`, `false`, `0`, `""`, empty
    /// arrays and objects) are dropped; `v` and `access_token` always come
    /// from the session.
    ///
    /// # Errors
    ///
    /// Transport failures (non-2xx statuses, undecodable bodies) and JSON
    /// without `response` or `error` are errors. API-level errors are
    /// returned as [`ApiResponse::ApiError`].
    pub async fn request(
        &self,
        method_name: &str,
        params: Map<String, Value>,
    ) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.config.api_url.trim_end_matches('/'), method_name);
        let query = self.build_query(params);

        // The query carries the access token; reqwest errors embed the URL.
        let response = match self.client.get(&url).query(&query).send().await {
            Ok(response) => response,
            Err(e) => {
                let e = e.without_url();
                error!(method = method_name, error = %e, "API request failed");
                return Err(e.into());
            }
        };

        let status = response.status().as_u16();
        debug!(method = method_name, status, "API request finished");

        let body = response.text().await.map_err(|e| e.without_url())?;
        let classified = classify_api(status, &body);
        if let Err(e) = &classified {
            error!(method = method_name, status, error = %e, "API response rejected");
        }
        classified
    }

    fn build_query(&self, params: Map<String, Value>) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = params
            .into_iter()
            .filter(|(key, value)| !is_falsy(value) && key != "v" && key != "access_token")
            .map(|(key, value)| (key, param_to_string(&value)))
            .collect();
        query.extend(
            self.required_params()
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );
        query
    }
}

/// Render a parameter the way the API expects it: lists are comma
/// separated, booleans are `1`/`0`.
fn param_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Array(items) => items
            .iter()
            .map(param_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(server: &MockServer) -> TokenSession {
        let config = ApiConfig::builder()
            .api_url(format!("{}/method", server.uri()))
            .version("5.101")
            .build();
        TokenSession::new("secret-token", config).unwrap()
    }

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    async fn respond(server: &MockServer, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path("/method/users.get"))
            .respond_with(
                ResponseTemplate::new(status).set_body_raw(body.to_string(), "application/json"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_data_request() {
        let server = MockServer::start().await;
        respond(&server, 200, json!({"response": {"key": "value"}})).await;

        let response = session(&server)
            .request("users.get", params(json!({"key": "value"})))
            .await
            .unwrap();
        assert_eq!(response, ApiResponse::Success(json!({"key": "value"})));
    }

    #[tokio::test]
    async fn test_error_request() {
        let server = MockServer::start().await;
        respond(
            &server,
            200,
            json!({"error": {"error_code": -1, "error_msg": "m", "request_params": {}}}),
        )
        .await;

        let response = session(&server)
            .request("users.get", Map::new())
            .await
            .unwrap();
        let ApiResponse::ApiError(error) = response else {
            panic!("expected an API error, got {response:?}");
        };
        assert_eq!(error.code, -1);
        assert_eq!(error.message, "m");
        assert!(error.request_params.is_empty());
    }

    #[tokio::test]
    async fn test_empty_request() {
        let server = MockServer::start().await;
        respond(&server, 200, json!({})).await;

        let response = session(&server)
            .request("users.get", Map::new())
            .await
            .unwrap();
        assert_eq!(response, ApiResponse::EmptyResponse);
    }

    #[tokio::test]
    async fn test_http_error_is_transport_error() {
        let server = MockServer::start().await;
        respond(&server, 401, json!({"error": {"error_code": 5}})).await;

        let err = session(&server)
            .request("users.get", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VkError::Http { status: 401, .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_required_params_injected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/method/users.get"))
            .and(query_param("v", "5.101"))
            .and(query_param("access_token", "secret-token"))
            .and(query_param("user_ids", "1,2"))
            .and(query_param("extended", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(json!({"response": []}).to_string(), "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = session(&server)
            .request(
                "users.get",
                params(json!({
                    "user_ids": [1, 2],
                    "extended": true,
                    "v": "3.0",
                    "access_token": "stolen",
                })),
            )
            .await
            .unwrap();
        assert_eq!(response, ApiResponse::Success(json!([])));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_falsy_params_dropped() {
        let server = MockServer::start().await;
        respond(&server, 200, json!({"response": 1})).await;

        session(&server)
            .request(
                "users.get",
                params(json!({
                    "fields": "",
                    "count": 0,
                    "offset": null,
                    "user_ids": "1",
                })),
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let keys: Vec<String> = requests[0]
            .url
            .query_pairs()
            .map(|(key, _)| key.into_owned())
            .collect();
        assert!(keys.contains(&"user_ids".to_string()));
        assert!(!keys.contains(&"fields".to_string()));
        assert!(!keys.contains(&"count".to_string()));
        assert!(!keys.contains(&"offset".to_string()));
        assert_eq!(keys.iter().filter(|key| *key == "v").count(), 1);
    }

    #[tokio::test]
    async fn test_network_error_hides_token() {
        let config = ApiConfig::builder()
            .api_url("http://127.0.0.1:1/method")
            .build();
        let session = TokenSession::new("SUPERSECRET", config).unwrap();

        let err = session
            .request("users.get", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, VkError::Network(_)));
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
        assert!(!err.to_string().contains("SUPERSECRET"));
        assert!(!format!("{err:?}").contains("SUPERSECRET"));
    }

    #[test]
    fn test_param_to_string() {
        assert_eq!(param_to_string(&json!("a")), "a");
        assert_eq!(param_to_string(&json!(42)), "42");
        assert_eq!(param_to_string(&json!(false)), "0");
        assert_eq!(param_to_string(&json!(["a", 2])), "a,2");
    }
}
