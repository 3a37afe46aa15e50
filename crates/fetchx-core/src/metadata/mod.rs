//! Metadata backend client.
//!
//! One call fetches one page of items for a `(provider, media type, query,
//! page, per page)` tuple. An empty page is the provider's end-of-results
//! signal; any network, HTTP or decoding failure is a transient
//! [`FetchError`].

mod http;
mod parse;

use std::sync::Arc;

use crate::control::ControlToken;
use crate::provider::{MediaType, Provider};
use crate::retry::{self, classify_curl_error, classify_http_status, Classify, ErrorKind, RetryPolicy};

pub use http::HttpMetadataSource;
pub use parse::parse_page;

/// Parameters of one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub provider: Provider,
    pub media_type: MediaType,
    pub query: String,
    pub page: u32,
    pub per_page: u32,
}

/// One normalized item. Either field may be missing in the raw response;
/// such items are skipped by the job loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: Option<String>,
    pub url: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            url: Some(url.into()),
        }
    }
}

/// One page of results, in backend order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<Item>,
    /// Total hits reported by the backend, if any.
    pub total: Option<u64>,
}

impl Page {
    /// True when the provider has nothing more to give.
    pub fn is_end_of_results(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("metadata request failed: {0}")]
    Curl(#[from] curl::Error),
    #[error("metadata backend returned HTTP {0}")]
    Http(u32),
    #[error("malformed metadata response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("metadata fetch task failed: {0}")]
    Task(String),
}

impl Classify for FetchError {
    fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Curl(e) => classify_curl_error(e),
            FetchError::Http(code) => classify_http_status(*code),
            FetchError::Malformed(_) | FetchError::Url(_) | FetchError::Task(_) => ErrorKind::Other,
        }
    }
}

/// Something that can produce pages of items. Implementations block; the
/// [`MetadataClient`] runs them on the blocking pool.
pub trait MetadataSource: Send + Sync {
    fn fetch_page(&self, req: &PageRequest) -> Result<Page, FetchError>;
}

/// Async front of a [`MetadataSource`] with the shared retry policy applied.
#[derive(Clone)]
pub struct MetadataClient {
    source: Arc<dyn MetadataSource>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for MetadataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataClient")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl MetadataClient {
    pub fn new(source: Arc<dyn MetadataSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// Fetch one page, retrying transient failures per policy. A pause or
    /// stop on `token` abandons the remaining retries.
    pub async fn fetch_page(&self, req: &PageRequest, token: &mut ControlToken) -> Result<Page, FetchError> {
        retry::run_with_retry(&self.retry, token, |attempt| {
            let source = Arc::clone(&self.source);
            let req = req.clone();
            async move {
                tracing::debug!(
                    provider = %req.provider,
                    page = req.page,
                    attempt,
                    "fetching metadata page"
                );
                tokio::task::spawn_blocking(move || source.fetch_page(&req))
                    .await
                    .map_err(|e| FetchError::Task(e.to_string()))?
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::JobControl;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FailsThenServes {
        failures: u32,
        status: u32,
        calls: AtomicU32,
    }

    impl MetadataSource for FailsThenServes {
        fn fetch_page(&self, _req: &PageRequest) -> Result<Page, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(FetchError::Http(self.status));
            }
            Ok(Page {
                items: vec![Item::new("1", "https://cdn.example/1.jpg")],
                total: Some(1),
            })
        }
    }

    fn request() -> PageRequest {
        PageRequest {
            provider: Provider::Pexels,
            media_type: MediaType::Images,
            query: "cats".into(),
            page: 1,
            per_page: 80,
        }
    }

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            ..RetryPolicy::metadata()
        }
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let source = Arc::new(FailsThenServes {
            failures: 1,
            status: 502,
            calls: AtomicU32::new(0),
        });
        let client = MetadataClient::new(source.clone(), quick_retry());
        let page = client.fetch_page(&request(), &mut JobControl::new().subscribe()).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let source = Arc::new(FailsThenServes {
            failures: 5,
            status: 404,
            calls: AtomicU32::new(0),
        });
        let client = MetadataClient::new(source.clone(), quick_retry());
        let err = client.fetch_page(&request(), &mut JobControl::new().subscribe()).await.unwrap_err();
        assert!(matches!(err, FetchError::Http(404)));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_page_is_end_of_results() {
        assert!(Page::default().is_end_of_results());
    }
}
