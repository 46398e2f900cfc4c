//! Ingress response bodies and blocking client helpers for a running minion.

use std::thread::sleep;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use minion_core::CrawlProgress;

use crate::error::{io_err, DaemonError};

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Reply to a webhook delivery, sent after the acknowledgment cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    pub status: String,
    pub defer_response: bool,
    pub succeeded: bool,
    pub acknowledged: bool,
}

impl HookResponse {
    pub fn received(succeeded: bool, acknowledged: bool) -> Self {
        Self {
            status: "Received".to_string(),
            defer_response: false,
            succeeded,
            acknowledged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecrawlResponse {
    pub is_success: bool,
    pub is_new_crawler: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub is_success: bool,
    pub progress: CrawlProgress,
}

/// Ask a running minion to start a crawl.
pub fn request_recrawl(base_url: &str) -> Result<RecrawlResponse, DaemonError> {
    call_with_retry(base_url, "POST", "/recrawl")
}

/// Read the crawl progress of a running minion.
pub fn request_progress(base_url: &str) -> Result<ProgressResponse, DaemonError> {
    call_with_retry(base_url, "GET", "/crawlerProgress")
}

/// Succeeds when the minion answers its health check.
pub fn request_health(base_url: &str) -> Result<(), DaemonError> {
    let url = endpoint(base_url, "/healthz");
    let body = send(&url, "GET")?
        .into_string()
        .map_err(|e| io_err(format!("reading {url}"), e))?;
    if body.trim() == "OK" {
        Ok(())
    } else {
        Err(DaemonError::Protocol(format!(
            "unexpected health response: {body}"
        )))
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Connection failures are retried briefly so a freshly started minion has
/// time to bind; any other failure returns immediately.
fn call_with_retry<T: DeserializeOwned>(
    base_url: &str,
    method: &str,
    path: &str,
) -> Result<T, DaemonError> {
    let url = endpoint(base_url, path);

    let mut last_not_running: Option<DaemonError> = None;
    for attempt in 0..CONNECT_ATTEMPTS {
        match send(&url, method) {
            Ok(response) => {
                return response
                    .into_json::<T>()
                    .map_err(|e| io_err(format!("decoding {url}"), e))
            }
            Err(err @ DaemonError::NotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt + 1 < CONNECT_ATTEMPTS {
                    sleep(CONNECT_RETRY_DELAY);
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        DaemonError::Protocol(format!("{method} {url} retry loop exited unexpectedly"))
    }))
}

fn send(url: &str, method: &str) -> Result<ureq::Response, DaemonError> {
    ureq::request(method, url)
        .timeout(Duration::from_secs(10))
        .call()
        .map_err(|err| match err {
            ureq::Error::Status(status, response) => DaemonError::Protocol(format!(
                "{method} {url} returned HTTP {status}: {}",
                response.into_string().unwrap_or_default()
            )),
            ureq::Error::Transport(transport) => DaemonError::NotRunning {
                url: url.to_string(),
                message: transport.to_string(),
            },
        })
}
