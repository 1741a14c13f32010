//! Authenticated portal sessions and polite unauthenticated fetching.

use super::error::ScrapeError;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36";

/// HTTP client for the account-gated game portal.
///
/// Holds a cookie jar; [`login`](Self::login) must succeed before any page
/// fetch. Sessions carry no expiry tracking, staleness surfaces as failed
/// page fetches on the next run.
pub struct PortalClient {
    client: reqwest::Client,
    base_url: String,
}

impl PortalClient {
    /// The portal serves a legacy TLS setup, so certificate verification is
    /// disabled for this client only.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Perform the three-step login handshake:
    /// 1. GET the login page and lift the hidden CSRF token.
    /// 2. POST the credentials with the token.
    /// 3. GET the aime-list endpoint to finalize the session cookie.
    ///
    /// Steps are strictly sequential; never run two logins for the same
    /// credentials concurrently.
    pub async fn login(&self, sega_id: &str, password: &str) -> Result<(), ScrapeError> {
        let login_page = self
            .client
            .get(&self.base_url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header("Referer", &self.base_url)
            .send()
            .await?
            .text()
            .await?;

        let token = extract_csrf_token(&login_page)?;

        let response = self
            .client
            .post(format!("{}/submit", self.base_url))
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Accept", "application/x-www-form-urlencoded")
            .header("Referer", &self.base_url)
            .form(&[("segaId", sega_id), ("password", password), ("token", &token)])
            .send()
            .await?;

        // failed logins redirect to the error page with a 200
        if response.url().as_str() == format!("{}/error/", self.base_url) {
            return Err(ScrapeError::InvalidCredentials);
        }

        self.client
            .get(format!("{}/aimeList/submit/?idx=0", self.base_url))
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Referer", format!("{}/submit", self.base_url))
            .send()
            .await?
            .error_for_status()?;

        debug!("Portal login complete");
        Ok(())
    }

    /// Fetch a portal page relative to the base URL, e.g. `/record`.
    pub async fn get_page(&self, path: &str) -> Result<String, ScrapeError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

fn extract_csrf_token(html: &str) -> Result<String, ScrapeError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(r#".black input[type="hidden"]"#)
        .map_err(|e| ScrapeError::parse(format!("bad selector: {}", e)))?;
    document
        .select(&selector)
        .find_map(|input| input.value().attr("value"))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ScrapeError::parse("CSRF token not found on login page"))
}

/// Retry policy for unauthenticated page fetches.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// Fetch a URL, sleeping `policy.backoff` and retrying on any failure, up to
/// `policy.max_attempts` attempts. The backoff sleep observes `cancel`.
pub async fn fetch_with_retry(
    client: &reqwest::Client,
    url: &str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> Result<String, ScrapeError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result: Result<String, ScrapeError> = match client.get(url).send().await {
            Ok(response) => match response.error_for_status() {
                Ok(response) => return Ok(response.text().await?),
                Err(e) => Err(ScrapeError::Network(e)),
            },
            Err(e) => Err(ScrapeError::Network(e)),
        };

        let err = result.unwrap_err();
        if attempt >= policy.max_attempts {
            return Err(err);
        }
        warn!(
            "Fetch of {} failed (attempt {}/{}), retrying in {:?}: {}",
            url, attempt, policy.max_attempts, policy.backoff, err
        );
        tokio::select! {
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            _ = tokio::time::sleep(policy.backoff) => {}
        }
    }
}
