//! Mapping of raw HTTP statuses and payloads onto [`VkError`] and
//! [`ApiResponse`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{Result, VkError};

/// Outcome of an API method call
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// Contents of the `response` key
    Success(Value),
    ApiError(ApiError),
    /// The API returned an empty body or an empty JSON value
    EmptyResponse,
}

impl ApiResponse {
    /// Turn API-level failures into errors, keeping only the payload
    pub fn into_result(self) -> Result<Value> {
        match self {
            ApiResponse::Success(payload) => Ok(payload),
            ApiResponse::ApiError(error) => Err(VkError::Api(error)),
            ApiResponse::EmptyResponse => Err(VkError::EmptyResponse),
        }
    }
}

/// Error reported by an API method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(rename = "error_code", default)]
    pub code: i64,
    #[serde(rename = "error_msg", default)]
    pub message: String,
    /// Parameters of the failed request as echoed by the API
    #[serde(default, deserialize_with = "deserialize_request_params")]
    pub request_params: BTreeMap<String, String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error {}: \"{}\". Parameters: {:?}.",
            self.code, self.message, self.request_params
        )
    }
}

/// Accepts both `{"name": "value"}` and vk's `[{"key": .., "value": ..}]`.
fn deserialize_request_params<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let mut params = BTreeMap::new();
    match raw {
        Value::Object(map) => {
            for (key, value) in map {
                params.insert(key, scalar_to_string(&value));
            }
        }
        Value::Array(items) => {
            for item in items {
                if let Some(key) = item.get("key").and_then(Value::as_str) {
                    let value = item.get("value").map(scalar_to_string).unwrap_or_default();
                    params.insert(key.to_string(), value);
                }
            }
        }
        _ => {}
    }
    Ok(params)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Whether a JSON value counts as "not provided"
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Classify the raw answer of an API method call.
///
/// Non-2xx statuses are transport errors and the body is not decoded.
pub fn classify_api(status: u16, body: &str) -> Result<ApiResponse> {
    if !(200..300).contains(&status) {
        return Err(VkError::Http {
            status,
            body: body.to_string(),
        });
    }
    if body.trim().is_empty() {
        return Ok(ApiResponse::EmptyResponse);
    }
    let payload: Value = serde_json::from_str(body)?;
    classify_payload(payload)
}

/// Classify an already decoded API payload
pub fn classify_payload(mut payload: Value) -> Result<ApiResponse> {
    if let Some(response) = payload.get_mut("response") {
        return Ok(ApiResponse::Success(response.take()));
    }
    if let Some(error) = payload.get_mut("error") {
        let error: ApiError = serde_json::from_value(error.take())?;
        return Ok(ApiResponse::ApiError(error));
    }
    if is_falsy(&payload) {
        return Ok(ApiResponse::EmptyResponse);
    }
    Err(VkError::UnexpectedResponse(payload.to_string()))
}

/// Error body of the OAuth server
#[derive(Debug, Default, Deserialize)]
pub(crate) struct OAuthErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

impl From<OAuthErrorBody> for VkError {
    fn from(body: OAuthErrorBody) -> Self {
        VkError::OAuth {
            error: body.error,
            description: body.error_description,
        }
    }
}

/// Classify the status of the authorization dialog response.
///
/// A 401 carries a JSON description of the problem; every other
/// non-200 status collapses into `fallback`.
pub(crate) fn classify_dialog(status: u16, body: &str, fallback: &str) -> Result<()> {
    match status {
        200 => Ok(()),
        401 => {
            let error: OAuthErrorBody =
                serde_json::from_str(body).unwrap_or_else(|_| OAuthErrorBody {
                    error: crate::error::OAUTH_ERROR.to_string(),
                    error_description: body.to_string(),
                });
            Err(error.into())
        }
        _ => Err(VkError::oauth(fallback)),
    }
}

/// Classify a form submission or token request; anything but 200 fails.
pub(crate) fn classify_step(status: u16, message: &str) -> Result<()> {
    if status == 200 {
        Ok(())
    } else {
        Err(VkError::oauth(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success() {
        let response = classify_api(200, r#"{"response": {"key": "value"}}"#).unwrap();
        assert_eq!(response, ApiResponse::Success(json!({"key": "value"})));
    }

    #[test]
    fn test_api_error() {
        let response = classify_api(
            200,
            r#"{"error": {"error_code": -1, "error_msg": "m", "request_params": {}}}"#,
        )
        .unwrap();
        assert_eq!(
            response,
            ApiResponse::ApiError(ApiError {
                code: -1,
                message: "m".into(),
                request_params: BTreeMap::new(),
            })
        );
    }

    #[test]
    fn test_api_error_params_list() {
        let response = classify_payload(json!({"error": {
            "error_code": 5,
            "error_msg": "User authorization failed: invalid access_token (4).",
            "request_params": [
                {"key": "method", "value": "users.get"},
                {"key": "oauth", "value": "1"},
                {"key": "v", "value": 5.101}
            ]
        }}))
        .unwrap();

        let ApiResponse::ApiError(error) = response else {
            panic!("expected an API error");
        };
        assert_eq!(error.code, 5);
        assert_eq!(error.request_params["method"], "users.get");
        assert_eq!(error.request_params["v"], "5.101");

        let err = ApiResponse::ApiError(error).into_result().unwrap_err();
        assert!(err.to_string().starts_with("Error 5: \"User authorization failed"));
    }

    #[test]
    fn test_empty() {
        assert_eq!(classify_api(200, "{}").unwrap(), ApiResponse::EmptyResponse);
        assert_eq!(classify_api(200, "").unwrap(), ApiResponse::EmptyResponse);
        assert_eq!(classify_api(200, "null").unwrap(), ApiResponse::EmptyResponse);
        assert!(matches!(
            ApiResponse::EmptyResponse.into_result(),
            Err(VkError::EmptyResponse)
        ));
    }

    #[test]
    fn test_unexpected_shape() {
        let err = classify_api(200, r#"{"data": 1}"#).unwrap_err();
        assert!(matches!(err, VkError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_transport_errors() {
        let err = classify_api(502, r#"{"response": 1}"#).unwrap_err();
        assert!(matches!(err, VkError::Http { status: 502, .. }));

        let err = classify_api(200, "<html>").unwrap_err();
        assert!(matches!(err, VkError::Serialization(_)));
    }

    #[test]
    fn test_falsy() {
        assert!(is_falsy(&json!(null)));
        assert!(is_falsy(&json!("")));
        assert!(is_falsy(&json!(0)));
        assert!(is_falsy(&json!(0.0)));
        assert!(is_falsy(&json!(false)));
        assert!(is_falsy(&json!([])));
        assert!(!is_falsy(&json!("0")));
        assert!(!is_falsy(&json!(-1)));
        assert!(!is_falsy(&json!([0])));
    }

    #[test]
    fn test_dialog_statuses() {
        assert!(classify_dialog(200, "", "failed").is_ok());

        let err = classify_dialog(
            401,
            r#"{"error": "invalid_client", "error_description": "client_id is incorrect"}"#,
            "failed",
        )
        .unwrap_err();
        match err {
            VkError::OAuth { error, description } => {
                assert_eq!(error, "invalid_client");
                assert_eq!(description, "client_id is incorrect");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = classify_dialog(500, "oops", "failed").unwrap_err();
        assert_eq!(err.to_string(), "OAuth error: oauth_error: failed");
    }

    #[test]
    fn test_step_status() {
        assert!(classify_step(200, "Form submission failed.").is_ok());
        assert!(classify_step(302, "Form submission failed.").is_err());
    }
}
