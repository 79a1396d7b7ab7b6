mod unsplash;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::db::models::Item;

pub use self::unsplash::UnsplashClient;

#[derive(Debug, Error)]
pub enum ImageSourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("No API key configured")]
    MissingApiKey,
}

/// Image metadata as listed by the external source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalPhoto {
    pub id: String,
    pub preview_url: String,
    pub full_url: String,
    pub alt: Option<String>,
}

impl ExternalPhoto {
    pub fn into_item(self) -> Item {
        let mut item = Item::new(self.id, self.preview_url, self.full_url);
        if let Some(alt) = self.alt.filter(|a| !a.is_empty()) {
            item.alt = alt;
        }
        item
    }
}

/// Raw bytes of a downloaded image.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl Download {
    /// File name to save under: the alt text when present, else `image`,
    /// with an extension taken from the content type.
    pub fn file_name(&self, alt: Option<&str>) -> String {
        download_file_name(alt, self.content_type.as_deref())
    }
}

/// Paginated public image listing and search.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn list_photos(
        &self,
        page: u32,
        per_page: usize,
    ) -> Result<Vec<ExternalPhoto>, ImageSourceError>;

    async fn search_photos(
        &self,
        query: &str,
        page: u32,
        per_page: usize,
    ) -> Result<Vec<ExternalPhoto>, ImageSourceError>;

    /// Fetch the image behind a locator as a blob.
    async fn download(&self, url: &str) -> Result<Download, ImageSourceError>;
}

pub fn download_file_name(alt: Option<&str>, content_type: Option<&str>) -> String {
    let ext = content_type
        .and_then(|ct| ct.split(';').next())
        .and_then(|ct| ct.split('/').nth(1))
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(|e| if e == "jpeg" { "jpg" } else { e })
        .unwrap_or("jpg");

    let stem: String = alt
        .unwrap_or("")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { "image" } else { stem };

    format!("{}.{}", stem, ext)
}
