//! Single-shot HTTP GET with a hard deadline and caller cancellation.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Failure to fetch a URL.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("error status {status} from {url}")]
    Status { url: String, status: StatusCode },
    #[error("failed to send request to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out after {}s", .after.as_secs())]
    Timeout { url: String, after: Duration },
    #[error("request to {url} cancelled")]
    Cancelled { url: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// HTTP fetcher shared by every downloader.
///
/// The fetcher supplies no default headers; each caller passes the header
/// set its site needs.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    /// Create a fetcher whose requests each get `timeout` end to end.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().build().map_err(FetchError::Client)?;
        Ok(Self { client, timeout })
    }

    /// GET `url` and return the whole body.
    ///
    /// The deadline covers connect, headers and body. Cancelling `cancel`
    /// abandons the transfer immediately; the in-flight request is dropped
    /// with this future, so nothing outlives the call.
    ///
    /// # Errors
    ///
    /// Returns an error on a non-2xx status, a transport failure, the
    /// deadline expiring, or cancellation.
    pub async fn fetch(
        &self,
        url: &str,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, FetchError> {
        debug!(url = %url, "get");

        let request = async {
            let response = self
                .client
                .get(url)
                .headers(headers.clone())
                .send()
                .await
                .map_err(|source| FetchError::Request {
                    url: url.to_string(),
                    source,
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                });
            }

            let body = response.bytes().await.map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
            Ok(body.to_vec())
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(FetchError::Cancelled { url: url.to_string() }),
            result = tokio::time::timeout(self.timeout, request) => {
                result.unwrap_or_else(|_| {
                    Err(FetchError::Timeout {
                        url: url.to_string(),
                        after: self.timeout,
                    })
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .and(header("referer", "https://example.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNGDATA".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("referer", "https://example.com/".parse().unwrap());

        let body = fetcher
            .fetch(
                &format!("{}/img.png", server.uri()),
                &headers,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(body, b"PNGDATA");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .fetch(
                &format!("{}/missing", server.uri()),
                &HeaderMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Status { status, .. } if status == StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn test_fetch_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Duration::from_millis(200)).unwrap();
        let err = fetcher
            .fetch(&server.uri(), &HeaderMap::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_fetch_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Duration::from_secs(30)).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = fetcher
            .fetch(&server.uri(), &HeaderMap::new(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Cancelled { .. }));
    }
}
