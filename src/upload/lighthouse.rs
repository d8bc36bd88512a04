use super::{ContentId, UploadError, Uploader};
use crate::config::UploadConfig;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::Path;

/// Uploads files to a Lighthouse/IPFS `add` endpoint
#[derive(Debug)]
pub struct LighthouseUploader {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl LighthouseUploader {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.resolve_api_key(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl Uploader for LighthouseUploader {
    async fn upload(&self, path: &Path) -> Result<ContentId, UploadError> {
        let api_key = self.api_key.as_deref().ok_or(UploadError::MissingApiKey)?;

        let bytes = tokio::fs::read(path).await.map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "batch.json".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/json")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UploadError::Rejected {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response.json().await?;
        content_hash(&body).ok_or(UploadError::MissingContentId)
    }
}

/// The node answers `{"Name", "Hash", "Size"}`; SDK-style wrappers nest it
/// under `data`.
fn content_hash(body: &Value) -> Option<ContentId> {
    body.get("Hash")
        .or_else(|| body.get("data").and_then(|data| data.get("Hash")))
        .and_then(Value::as_str)
        .filter(|hash| !hash.is_empty())
        .map(str::to_string)
}
