//! Provider catalog: static description of every stock-media source.
//!
//! Each provider knows how a media type maps to its backend route, how to
//! pull the asset URL out of one raw item, its page size, and its hard caps.
//! The catalog fixes the rotation order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of asset a job downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Images,
    Videos,
}

impl MediaType {
    /// Maps free-form input onto a media type; anything but "videos" means images.
    pub fn normalize(input: &str) -> Self {
        if input.trim().eq_ignore_ascii_case("videos") {
            MediaType::Videos
        } else {
            MediaType::Images
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Images => "images",
            MediaType::Videos => "videos",
        }
    }

    /// File extension used for downloaded assets.
    pub fn extension(self) -> &'static str {
        match self {
            MediaType::Images => "jpg",
            MediaType::Videos => "mp4",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stock-media source reachable through the metadata backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Pexels,
    Unsplash,
    Pixabay,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Pexels => "pexels",
            Provider::Unsplash => "unsplash",
            Provider::Pixabay => "pixabay",
        }
    }

    /// Whether the provider can serve this media type at all. Unsplash has no videos.
    pub fn supports(self, media: MediaType) -> bool {
        !matches!((self, media), (Provider::Unsplash, MediaType::Videos))
    }

    /// Backend route segment: `/metadata/{provider}/{route}`.
    pub fn route(self, media: MediaType) -> &'static str {
        match (self, media) {
            (Provider::Pexels, m) => m.as_str(),
            (Provider::Pixabay, MediaType::Videos) => "videos",
            (Provider::Pixabay, MediaType::Images) => "photos",
            (Provider::Unsplash, _) => "images",
        }
    }

    /// Page size requested from the backend, fixed when a job is created.
    pub fn per_page(self, media: MediaType) -> u32 {
        match (self, media) {
            (Provider::Pexels, MediaType::Images) => 80,
            (Provider::Pexels, MediaType::Videos) => 30,
            (Provider::Unsplash, _) => 30,
            (Provider::Pixabay, MediaType::Images) => 80,
            (Provider::Pixabay, MediaType::Videos) => 50,
        }
    }

    /// Hard quota enforced client-side, before any request is made.
    pub fn default_caps(self) -> ProviderCaps {
        match self {
            Provider::Pexels => ProviderCaps::default(),
            Provider::Unsplash => ProviderCaps {
                max_page: Some(125),
                max_items: None,
            },
            Provider::Pixabay => ProviderCaps {
                max_page: None,
                max_items: Some(500),
            },
        }
    }

    /// Best-quality asset URL of one raw backend item.
    pub fn extract_url(self, item: &Value, media: MediaType) -> Option<String> {
        let url = match (self, media) {
            (Provider::Pexels, MediaType::Videos) => item.pointer("/video_files/0/link"),
            (Provider::Pexels, MediaType::Images) => item.pointer("/src/original"),
            (Provider::Unsplash, _) => item.pointer("/urls/full"),
            (Provider::Pixabay, MediaType::Videos) => item.pointer("/videos/large/url"),
            (Provider::Pixabay, MediaType::Images) => item.get("largeImageURL"),
        };
        url.and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Stable item identifier; providers use numeric or string ids.
    pub fn extract_id(item: &Value) -> Option<String> {
        match item.get("id")? {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-provider hard caps. A provider whose cursor crosses a cap is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderCaps {
    /// Highest page number that may be requested.
    pub max_page: Option<u32>,
    /// Most assets that may be downloaded from this provider in one job.
    pub max_items: Option<u64>,
}

impl ProviderCaps {
    /// True when requesting `next_page` or downloading past `downloaded` would break a cap.
    pub fn reached(&self, next_page: u32, downloaded: u64) -> bool {
        self.max_page.is_some_and(|max| next_page > max)
            || self.max_items.is_some_and(|max| downloaded >= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub provider: Provider,
    pub caps: ProviderCaps,
}

/// Fixed rotation order plus caps for every provider in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCatalog {
    entries: Vec<CatalogEntry>,
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::new([Provider::Pexels, Provider::Unsplash, Provider::Pixabay])
    }
}

impl ProviderCatalog {
    /// Catalog over `order`, each provider with its default caps. Duplicates are dropped.
    pub fn new(order: impl IntoIterator<Item = Provider>) -> Self {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        for provider in order {
            if entries.iter().all(|e| e.provider != provider) {
                entries.push(CatalogEntry {
                    provider,
                    caps: provider.default_caps(),
                });
            }
        }
        Self { entries }
    }

    /// Replace the caps of one provider (no-op if it is not in the catalog).
    pub fn with_caps(mut self, provider: Provider, caps: ProviderCaps) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.provider == provider) {
            entry.caps = caps;
        }
        self
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.entries.iter().map(|e| e.provider)
    }

    pub fn caps(&self, provider: Provider) -> ProviderCaps {
        self.entries
            .iter()
            .find(|e| e.provider == provider)
            .map(|e| e.caps)
            .unwrap_or_default()
    }
}
