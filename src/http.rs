use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::warn;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

pub(crate) fn user_agent() -> String {
    format!("research-store/{}", env!("CARGO_PKG_VERSION"))
}

pub(crate) fn build_client(accept: &'static str, timeout: Duration) -> reqwest::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(accept));
    Client::builder()
        .default_headers(headers)
        .user_agent(user_agent())
        .timeout(timeout)
        .build()
}

/// Sends the request built by `make_req`, retrying transient failures with a
/// linear backoff. The final response is returned whatever its status.
pub(crate) fn send_with_retries<F>(mut make_req: F, service: &str) -> reqwest::Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        let delay = Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1));
        match make_req().send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < MAX_RETRIES && is_retryable_status(status) {
                    warn!(service, status, attempt, "retrying request");
                    thread::sleep(delay);
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    warn!(service, error = %err, attempt, "retrying request");
                    thread::sleep(delay);
                    attempt += 1;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(200));
    }
}
