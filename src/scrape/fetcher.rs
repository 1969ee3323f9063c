// =============================================================================
// scrape/fetcher.rs — GETTING THE PAGE INTO UTF-8
// =============================================================================
//
// One GET per listing page. Anything outside 2xx is a fetch error. The body is
// decoded using the charset the server declares in Content-Type (the listing
// site has served ISO-8859-1 for a long time), falling back to UTF-8 when
// nothing is declared. Parsing only ever sees decoded text.
//
// No retries and no backoff: a failed page fails the run, and the next run
// starts from scratch anyway.
// =============================================================================

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, info};

use crate::error::ScrapeError;

/// Build the shared HTTP client for a run.
pub fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
}

/// Fetch one page and return its body as text.
pub async fn fetch_page(client: &Client, url: &str) -> Result<String, ScrapeError> {
    info!(url = %url, "loading content");

    let response = client.get(url).send().await.map_err(|e| ScrapeError::Fetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Fetch {
            url: url.to_string(),
            reason: format!("status code is {}", status.as_u16()),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    debug!(url = %url, content_type = %content_type, "got response");

    response.text().await.map_err(|e| ScrapeError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
