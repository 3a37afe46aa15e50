//! Backend response decoding: `{ items: [...], total?: number }`.

use serde::Deserialize;
use serde_json::Value;

use super::{Item, Page};
use crate::provider::{MediaType, Provider};

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default)]
    items: Option<Vec<Value>>,
    #[serde(default)]
    total: Option<u64>,
}

/// Decodes a response body and normalizes its items for `provider`.
///
/// A body without an `items` array decodes to an empty page, which the job
/// loop treats as end-of-results.
pub fn parse_page(body: &[u8], provider: Provider, media: MediaType) -> Result<Page, serde_json::Error> {
    let raw: RawPage = serde_json::from_slice(body)?;
    let items = raw
        .items
        .unwrap_or_default()
        .iter()
        .map(|item| Item {
            id: Provider::extract_id(item),
            url: provider.extract_url(item, media),
        })
        .collect();
    Ok(Page {
        items,
        total: raw.total,
    })
}
