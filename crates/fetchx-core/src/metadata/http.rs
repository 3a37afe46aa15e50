//! libcurl-backed metadata source: `GET {backend}/metadata/{provider}/{route}`.

use std::time::Duration;
use url::Url;

use super::{parse_page, FetchError, MetadataSource, Page, PageRequest};

/// Talks to the metadata backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    backend: Url,
    timeout: Duration,
}

impl HttpMetadataSource {
    pub fn new(backend_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let backend = Url::parse(backend_url)?;
        if backend.cannot_be_a_base() {
            return Err(FetchError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        Ok(Self { backend, timeout })
    }

    /// Full request URL for one page.
    pub fn page_url(&self, req: &PageRequest) -> Result<Url, FetchError> {
        let mut url = self.backend.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend([
                "metadata",
                req.provider.as_str(),
                req.provider.route(req.media_type),
            ]);
        url.query_pairs_mut()
            .clear()
            .append_pair("query", &req.query)
            .append_pair("page", &req.page.to_string())
            .append_pair("perPage", &req.per_page.to_string());
        Ok(url)
    }
}

impl MetadataSource for HttpMetadataSource {
    /// Runs in the current thread; call from `spawn_blocking` if used from async code.
    fn fetch_page(&self, req: &PageRequest) -> Result<Page, FetchError> {
        let url = self.page_url(req)?;
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str())?;
        easy.get(true)?;
        easy.follow_location(true)?;
        easy.max_redirections(5)?;
        easy.connect_timeout(Duration::from_secs(15).min(self.timeout))?;
        easy.timeout(self.timeout)?;

        let mut list = curl::easy::List::new();
        list.append("Accept: application/json")?;
        easy.http_headers(list)?;

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            tracing::warn!(provider = %req.provider, page = req.page, "metadata backend returned HTTP {}", code);
            return Err(FetchError::Http(code));
        }

        let page = parse_page(&body, req.provider, req.media_type)?;
        tracing::debug!(
            provider = %req.provider,
            page = req.page,
            items = page.items.len(),
            total = ?page.total,
            "metadata page received"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MediaType, Provider};

    fn req(provider: Provider, media_type: MediaType) -> PageRequest {
        PageRequest {
            provider,
            media_type,
            query: "red cars & bikes".into(),
            page: 3,
            per_page: 80,
        }
    }

    #[test]
    fn builds_route_and_query() {
        let src = HttpMetadataSource::new("https://backend.example.com", Duration::from_secs(5)).unwrap();
        let url = src.page_url(&req(Provider::Pixabay, MediaType::Images)).unwrap();
        assert_eq!(url.path(), "/metadata/pixabay/photos");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("query".to_string(), "red cars & bikes".to_string()),
                ("page".to_string(), "3".to_string()),
                ("perPage".to_string(), "80".to_string()),
            ]
        );
    }

    #[test]
    fn keeps_backend_path_prefix() {
        let src = HttpMetadataSource::new("http://127.0.0.1:3000/api/", Duration::from_secs(5)).unwrap();
        let url = src.page_url(&req(Provider::Pexels, MediaType::Videos)).unwrap();
        assert_eq!(url.path(), "/api/metadata/pexels/videos");
    }

    #[test]
    fn rejects_unusable_backend_urls() {
        assert!(HttpMetadataSource::new("not a url", Duration::from_secs(5)).is_err());
        assert!(HttpMetadataSource::new("mailto:someone@example.com", Duration::from_secs(5)).is_err());
    }
}
