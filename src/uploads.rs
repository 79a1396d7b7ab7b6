use base64::Engine;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;

use crate::db::models::{Item, PublicUpload};
use crate::error::{AppError, AppResult};
use crate::gateway::{CollectionPath, DocumentGateway, GatewayError};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub bytes: Bytes,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
}

/// Checked before anything is sent anywhere.
pub fn validate_file_size(len: usize, max: usize) -> AppResult<()> {
    if len == 0 {
        return Err(AppError::Validation("File is empty".into()));
    }
    if len > max {
        return Err(AppError::Validation(format!(
            "File is too large; choose a file under {} KB",
            max / 1024
        )));
    }
    Ok(())
}

/// Inline the image as a `data:` URL, the way public uploads store it.
pub fn to_data_url(file_name: &str, bytes: &[u8]) -> String {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    format!(
        "data:{};base64,{}",
        mime.essence_str(),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Timestamp format used for `createdAt`; sorts lexicographically.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct UploadService {
    gateway: Arc<dyn DocumentGateway>,
    max_file_bytes: usize,
}

impl UploadService {
    pub fn new(gateway: Arc<dyn DocumentGateway>, max_file_bytes: usize) -> Self {
        Self {
            gateway,
            max_file_bytes,
        }
    }

    /// Store a new public upload owned by the signed-in user.
    pub async fn upload(&self, session: &Session, request: UploadRequest) -> AppResult<Item> {
        let user = session.require_user()?;
        validate_file_size(request.bytes.len(), self.max_file_bytes)?;

        let record = PublicUpload {
            image_base64: to_data_url(&request.file_name, &request.bytes),
            title: non_blank(request.title).unwrap_or_else(|| "Untitled".to_string()),
            description: non_blank(request.description)
                .unwrap_or_else(|| "No description".to_string()),
            link: non_blank(request.link).unwrap_or_default(),
            created_at: timestamp_now(),
            user_id: user.id.to_string(),
            ..PublicUpload::default()
        };

        let data = serde_json::to_value(&record).map_err(GatewayError::from)?;
        let path = self
            .gateway
            .create(&CollectionPath::public_uploads(), data)
            .await?;

        tracing::info!("{} uploaded {} as {}", user.id, request.file_name, path);
        Ok(record.into_item(path.id()))
    }
}
