//! Shared HTTP plumbing for venue adapters: retry with exponential backoff,
//! rate-limit header tracking, and uniform failure classification into
//! [`VenueError`].

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::time::{sleep, timeout};
use tracing::{error, warn};

use crate::error::VenueError;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 150;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A host allow-listed for relaxed TLS verification because of a known
/// broken CRL endpoint. Empty by default; operators populate
/// it explicitly, never as a blanket opt-out.
pub fn build_client(danger_accept_invalid_certs_for: &[&str], host: &str) -> Client {
    let relaxed = danger_accept_invalid_certs_for
        .iter()
        .any(|h| h.eq_ignore_ascii_case(host));

    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .danger_accept_invalid_certs(relaxed)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// GET `url` with retry/backoff, deserializing the JSON body into `T`.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    headers: &[(&str, String)],
) -> Result<T, VenueError> {
    let mut backoff = INITIAL_BACKOFF_MS;

    for attempt in 0..MAX_RETRIES {
        let mut req = client.get(url);
        for (name, value) in headers {
            req = req.header(*name, value);
        }

        match timeout(REQUEST_TIMEOUT, req.send()).await {
            Ok(Ok(response)) => {
                if let Some(remaining) = response
                    .headers()
                    .get("X-RateLimit-Remaining")
                    .or_else(|| response.headers().get("X-MBX-USED-WEIGHT-1M"))
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u32>().ok())
                {
                    if remaining < 10 {
                        warn!(url, remaining, "venue rate limit running low");
                    }
                }

                if response.status().as_u16() == 429 {
                    let retry_after = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(backoff / 1000 + 1);
                    warn!(url, retry_after, "venue rate limited, backing off");
                    sleep(Duration::from_secs(retry_after)).await;
                    continue;
                }

                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    error!(url, status, "venue returned error status");
                    return Err(VenueError::http_error(status, format!("{url} -> {status}")));
                }

                return response
                    .json::<T>()
                    .await
                    .map_err(|e| VenueError::parse(format!("{url}: {e}")));
            }
            Ok(Err(e)) => {
                warn!(url, attempt, error = %e, "venue request failed");
                if e.is_timeout() {
                    return Err(VenueError::timeout(e.to_string()));
                }
            }
            Err(_) => {
                warn!(url, attempt, "venue request timed out");
            }
        }

        if attempt + 1 < MAX_RETRIES {
            sleep(Duration::from_millis(backoff)).await;
            backoff = (backoff * 2).min(5_000);
        }
    }

    Err(VenueError::transport(format!(
        "max retries exceeded for {url}"
    )))
}
