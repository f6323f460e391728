//! # vkcom-auth
//!
//! A Rust client for the vk.com REST API with headless OAuth login.
//!
//! vk.com issues user tokens only through its OAuth dialog. Besides taking a
//! pre-issued token, this library can walk that dialog itself: it fetches
//! the login page, submits the credentials and the permissions form, and
//! reads the token from the final redirect, just as a browser would.
//!
//! ## Features
//!
//! - **Token sessions**: call any API method with a pre-issued token
//! - **Implicit Grant login**: obtain a user token from a login and password
//! - **Authorization Code Grant**: exchange a code for a token
//! - **Typed errors**: OAuth, invalid credentials, blocked users, API errors
//! - **Browser Integration**: open the dialog for a manual login (default)
//!
//! ## Quick Start
//!
//! ```no_run
//! use vkcom_auth::{Api, ApiConfig, Credentials, ImplicitSession, OAuthConfig, TokenSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = Credentials::new(123456, "user@example.com", "password")
//!         .scope("friends,offline");
//!     let session = ImplicitSession::new(credentials, OAuthConfig::default())?;
//!     let token = session.authorize().await?;
//!
//!     let api = Api::new(TokenSession::from_token(&token, ApiConfig::default())?);
//!     let me = api.method("users.get").send().await?;
//!     println!("{me}");
//!     Ok(())
//! }
//! ```

mod api;
mod classify;
mod code;
mod error;
pub mod form;
mod implicit;
pub mod permissions;
mod session;
mod transport;
mod types;

#[cfg(feature = "browser")]
mod browser;

// Public API exports
pub use api::{Api, MethodCall};
pub use classify::{ApiError, ApiResponse, classify_api, classify_payload};
pub use code::CodeSession;
pub use error::{ErrorKind, Result, VkError};
pub use form::FormData;
pub use implicit::ImplicitSession;
pub use permissions::{Permission, bit_scope};
pub use session::TokenSession;
pub use types::{
    ApiConfig, ApiConfigBuilder, Credentials, OAuthConfig, OAuthConfigBuilder, RetryPolicy, Token,
};

#[cfg(feature = "browser")]
pub use browser::open_browser;
