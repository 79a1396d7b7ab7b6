use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use url::Url;

use super::{Download, ExternalPhoto, ImageSource, ImageSourceError};

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    small: String,
    full: String,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    id: String,
    urls: PhotoUrls,
    alt_description: Option<String>,
}

/// `/photos` answers with a bare array, `/search/photos` wraps it in `results`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PhotosResponse {
    List(Vec<UnsplashPhoto>),
    Search {
        #[serde(default)]
        results: Vec<UnsplashPhoto>,
    },
}

impl PhotosResponse {
    fn into_photos(self) -> Vec<ExternalPhoto> {
        let photos = match self {
            PhotosResponse::List(photos) => photos,
            PhotosResponse::Search { results } => results,
        };
        photos
            .into_iter()
            .map(|p| ExternalPhoto {
                id: p.id,
                preview_url: p.urls.small,
                full_url: p.urls.full,
                alt: p.alt_description,
            })
            .collect()
    }
}

pub struct UnsplashClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl UnsplashClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, ImageSourceError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            api_key,
        })
    }

    fn endpoint(
        &self,
        path: &str,
        page: u32,
        per_page: usize,
        query: Option<&str>,
    ) -> Result<Url, ImageSourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ImageSourceError::MissingApiKey)?;

        let mut url = self.base_url.join(path)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page", &page.to_string());
            pairs.append_pair("per_page", &per_page.to_string());
            if let Some(q) = query {
                pairs.append_pair("query", q);
            }
            pairs.append_pair("client_id", api_key);
        }
        Ok(url)
    }

    async fn fetch_photos(&self, url: Url) -> Result<Vec<ExternalPhoto>, ImageSourceError> {
        tracing::debug!("GET {}", url.path());
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ImageSourceError::Status(response.status().as_u16()));
        }
        let body: PhotosResponse = response.json().await?;
        Ok(body.into_photos())
    }
}

#[async_trait]
impl ImageSource for UnsplashClient {
    async fn list_photos(
        &self,
        page: u32,
        per_page: usize,
    ) -> Result<Vec<ExternalPhoto>, ImageSourceError> {
        let url = self.endpoint("photos", page, per_page, None)?;
        self.fetch_photos(url).await
    }

    async fn search_photos(
        &self,
        query: &str,
        page: u32,
        per_page: usize,
    ) -> Result<Vec<ExternalPhoto>, ImageSourceError> {
        let url = self.endpoint("search/photos", page, per_page, Some(query))?;
        self.fetch_photos(url).await
    }

    async fn download(&self, url: &str) -> Result<Download, ImageSourceError> {
        let url = Url::parse(url)?;
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ImageSourceError::Status(response.status().as_u16()));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        Ok(Download {
            bytes,
            content_type,
        })
    }
}
