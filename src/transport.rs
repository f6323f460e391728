//! Browser-like HTTP transport for the login dialog.
//!
//! Redirects are followed by hand so that every `Location` header the
//! server sends stays visible; the implicit flow reads the token from the
//! fragment of the last one.

use std::time::Duration;

use indexmap::IndexMap;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use tracing::debug;
use url::Url;

use crate::{Result, VkError};

pub(crate) const MAX_REDIRECTS: usize = 10;

/// A page reached after following all redirects
#[derive(Debug, Clone)]
pub(crate) struct Page {
    pub url: Url,
    pub status: u16,
    pub body: String,
    /// Resolved `Location` targets, in the order they were followed
    pub redirects: Vec<Url>,
}

/// Cookie-keeping HTTP client that records redirect history
pub(crate) struct Browser {
    client: reqwest::Client,
}

impl Browser {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| VkError::ClientCreation(e.to_string()))?;
        Ok(Self { client })
    }

    /// GET a URL with extra query parameters
    pub async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<Page> {
        let mut url = Url::parse(url)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let response = self.client.get(url.clone()).send().await?;
        self.follow(url, response).await
    }

    /// POST form fields as `application/x-www-form-urlencoded`
    pub async fn post_form(&self, url: Url, fields: &IndexMap<String, String>) -> Result<Page> {
        let response = self.client.post(url.clone()).form(fields).send().await?;
        self.follow(url, response).await
    }

    /// Follow redirects until a non-redirect response arrives.
    ///
    /// Every hop is a GET, which is what browsers do for the 302/303
    /// answers the login pages use.
    async fn follow(&self, mut url: Url, mut response: reqwest::Response) -> Result<Page> {
        let mut redirects = Vec::new();

        loop {
            let status = response.status();
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);

            let Some(location) = location.filter(|_| status.is_redirection()) else {
                let body = response.text().await?;
                return Ok(Page {
                    url,
                    status: status.as_u16(),
                    body,
                    redirects,
                });
            };

            if redirects.len() >= MAX_REDIRECTS {
                return Err(VkError::TooManyRedirects(MAX_REDIRECTS));
            }

            let next = url.join(&location).map_err(VkError::InvalidRedirect)?;
            debug!(status = %status, path = next.path(), "Following redirect");
            redirects.push(next.clone());

            let mut request_url = next.clone();
            request_url.set_fragment(None);
            response = self.client.get(request_url).send().await?;
            url = next;
        }
    }
}
