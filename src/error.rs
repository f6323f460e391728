use thiserror::Error;

use crate::classify::ApiError;

pub(crate) const OAUTH_ERROR: &str = "oauth_error";

/// Error types for vk.com authorization and API calls
#[derive(Error, Debug)]
pub enum VkError {
    /// Generic failure of an authorization step, or an error reported by
    /// the OAuth server itself.
    #[error("OAuth error: {error}: {description}")]
    OAuth { error: String, description: String },

    #[error("invalid_grant: invalid login or password")]
    InvalidGrant,

    #[error("invalid_user: user is blocked")]
    InvalidUser,

    #[error("{0}")]
    Api(ApiError),

    #[error("empty response")]
    EmptyResponse,

    /// The API answered with JSON that has neither `response` nor `error`.
    #[error("Unexpected API response: {0}")]
    UnexpectedResponse(String),

    #[error("{0:?} is missing in response")]
    MissingField(&'static str),

    #[error("No POST form with an action found on the {0} page")]
    MissingFormAction(&'static str),

    #[error("{attempts} login attempts exceeded")]
    AttemptsExceeded { attempts: u32 },

    #[error("Too many redirects (limit {0})")]
    TooManyRedirects(usize),

    /// A redirect's `Location` header could not be resolved to a URL.
    #[error("Invalid redirect location: {0}")]
    InvalidRedirect(url::ParseError),

    #[error("Failed to create HTTP client: {0}")]
    ClientCreation(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: {status}: {body}")]
    Http { status: u16, body: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "browser")]
    #[error("Failed to open browser: {0}")]
    BrowserLaunch(String),
}

/// Coarse classification of a [`VkError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OAuth,
    InvalidGrant,
    InvalidUser,
    Api,
    EmptyResponse,
    /// Response decoded fine but had a shape the API never documents.
    Protocol,
    /// Non-2xx status, connection failure or undecodable body.
    Transport,
    Config,
}

impl VkError {
    /// Build a generic OAuth error carrying only a description.
    pub(crate) fn oauth(description: impl Into<String>) -> Self {
        VkError::OAuth {
            error: OAUTH_ERROR.to_string(),
            description: description.into(),
        }
    }

    /// Which part of the taxonomy this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VkError::OAuth { .. }
            | VkError::MissingField(_)
            | VkError::MissingFormAction(_)
            | VkError::AttemptsExceeded { .. } => ErrorKind::OAuth,
            VkError::InvalidGrant => ErrorKind::InvalidGrant,
            VkError::InvalidUser => ErrorKind::InvalidUser,
            VkError::Api(_) => ErrorKind::Api,
            VkError::EmptyResponse => ErrorKind::EmptyResponse,
            VkError::UnexpectedResponse(_) => ErrorKind::Protocol,
            VkError::Network(_)
            | VkError::Http { .. }
            | VkError::Serialization(_)
            | VkError::TooManyRedirects(_)
            | VkError::InvalidRedirect(_) => ErrorKind::Transport,
            VkError::UrlParse(_) | VkError::ClientCreation(_) => ErrorKind::Config,
            #[cfg(feature = "browser")]
            VkError::BrowserLaunch(_) => ErrorKind::Config,
        }
    }

    /// OAuth error code as the vk.com OAuth server would spell it.
    pub fn oauth_code(&self) -> Option<&str> {
        match self {
            VkError::OAuth { error, .. } => Some(error),
            VkError::MissingField(_)
            | VkError::MissingFormAction(_)
            | VkError::AttemptsExceeded { .. } => Some(OAUTH_ERROR),
            VkError::InvalidGrant => Some("invalid_grant"),
            VkError::InvalidUser => Some("invalid_user"),
            _ => None,
        }
    }
}

/// Result type alias for vk.com operations
pub type Result<T> = std::result::Result<T, VkError>;
