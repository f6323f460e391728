//! Headless implicit-flow login followed by an API call
//!
//! Reads `VK_APP_ID`, `VK_LOGIN` and `VK_PASSWORD` from the environment.
//!
//! Run with: RUST_LOG=vkcom_auth=debug cargo run --example implicit_login

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use vkcom_auth::{
    Api, ApiConfig, Credentials, ImplicitSession, OAuthConfig, Permission, TokenSession, VkError,
    permissions::scope_names,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let credentials = Credentials::new(
        std::env::var("VK_APP_ID")?,
        std::env::var("VK_LOGIN")?,
        std::env::var("VK_PASSWORD")?,
    )
    .scope(scope_names(&[Permission::Friends, Permission::Offline]));

    let config = OAuthConfig::builder()
        .retry(3, Duration::from_secs(5))
        .build();
    let session = ImplicitSession::new(credentials, config)?;

    let token = match session.authorize().await {
        Ok(token) => token,
        Err(VkError::InvalidGrant) => anyhow::bail!("wrong login or password"),
        Err(VkError::InvalidUser) => anyhow::bail!("this account is blocked"),
        Err(e) => return Err(e.into()),
    };

    println!("Authorized as user {:?}", token.user_id);
    match token.expires_at() {
        Some(at) => println!("Token expires at unix time {}", at),
        None => println!("Token never expires"),
    }

    let api = Api::new(TokenSession::from_token(&token, ApiConfig::default())?);
    let friends = api
        .method("friends.get")
        .param("order", "hints")
        .param("count", 5)
        .send()
        .await?;
    println!("Friends: {}", friends);

    Ok(())
}
