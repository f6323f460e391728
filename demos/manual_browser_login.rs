//! Implicit flow completed by hand in a browser
//!
//! Required features: `browser`
//!
//! Run with: cargo run --example manual_browser_login -- <app_id>

use std::io::{self, Write};

use vkcom_auth::{
    Api, ApiConfig, OAuthConfig, Permission, Token, TokenSession, bit_scope, open_browser,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_id = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: manual_browser_login <app_id>"))?;

    let scope = bit_scope(&[Permission::Friends, Permission::Offline]).to_string();
    let url = OAuthConfig::default().authorization_url(&app_id, &scope)?;

    println!("Opening the authorization dialog:");
    println!("{}\n", url);
    if let Err(e) = open_browser(url.as_str()) {
        println!("{}; open the link above yourself.", e);
    }

    print!("Paste the address of the blank page you land on: ");
    io::stdout().flush()?;

    let mut redirect = String::new();
    io::stdin().read_line(&mut redirect)?;
    let token = Token::from_redirect_url(redirect.trim())?;

    println!(
        "\nAccess token: {}...",
        &token.access_token[..8.min(token.access_token.len())]
    );

    let api = Api::new(TokenSession::from_token(&token, ApiConfig::default())?);
    let me = api.method("users.get").send().await?;
    println!("Signed in as: {}", me);

    Ok(())
}
