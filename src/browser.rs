use crate::{Result, VkError};

/// Open a URL in the user's default web browser
///
/// Used for the manual implicit flow: open the authorization dialog, sign
/// in, then paste the final `blank.html#...` address into
/// [`Token::from_redirect_url`](crate::Token::from_redirect_url).
///
/// # Errors
///
/// Returns an error if the browser cannot be launched
///
/// # Example
///
/// ```no_run
/// use vkcom_auth::{OAuthConfig, open_browser};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let url = OAuthConfig::default().authorization_url("123456", "friends,offline")?;
/// open_browser(url.as_str())?;
/// # Ok(())
/// # }
/// ```
pub fn open_browser(url: &str) -> Result<()> {
    webbrowser::open(url).map_err(launch_error)
}

fn launch_error(e: std::io::Error) -> VkError {
    VkError::BrowserLaunch(e.to_string())
}
