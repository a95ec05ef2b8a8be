//! Bulk-import transport
//!
//! One submission is a multipart POST: an `importRequest` JSON part holding
//! the descriptor, followed by one `files` part per referenced file.

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use super::config::{TransportConfig, API_KEY_ENV};
use super::error::{ImportError, ImportResult};
use super::request::ImportJobDescriptor;

/// One staged file attached to a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err.to_string())
    }
}

/// The external bulk-import service
#[async_trait]
pub trait BulkImportTransport: Send + Sync {
    /// Submit one job; returns the service's opaque import id
    async fn submit(
        &self,
        descriptor: &ImportJobDescriptor,
        files: Vec<FilePart>,
    ) -> Result<String, TransportError>;
}

/// HubSpot CRM imports API client
pub struct HubSpotTransport {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HubSpotTransport {
    pub fn new(config: &TransportConfig) -> ImportResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ImportError::config(format!("{} is not set", API_KEY_ENV)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ImportError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }

    fn form(descriptor: &ImportJobDescriptor, files: Vec<FilePart>) -> Result<Form, TransportError> {
        let request = serde_json::to_string(descriptor)
            .map_err(|e| TransportError::Request(format!("Failed to encode importRequest: {}", e)))?;

        let mut form = Form::new().part(
            "importRequest",
            Part::text(request).mime_str("application/json")?,
        );

        for file in files {
            form = form.part(
                "files",
                Part::bytes(file.content)
                    .file_name(file.file_name)
                    .mime_str("text/csv")?,
            );
        }

        Ok(form)
    }
}

#[async_trait]
impl BulkImportTransport for HubSpotTransport {
    #[instrument(skip(self, descriptor, files), fields(job = %descriptor.name, files = files.len()))]
    async fn submit(
        &self,
        descriptor: &ImportJobDescriptor,
        files: Vec<FilePart>,
    ) -> Result<String, TransportError> {
        let form = Self::form(descriptor, files)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "Bulk import responded");

        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        import_id_from(status, &body)
    }
}

fn import_id_from(status: StatusCode, body: &str) -> Result<String, TransportError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| TransportError::InvalidResponse(format!("{} ({}): {}", status, e, body)))?;

    match json.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(TransportError::InvalidResponse(format!(
            "response has no import id: {}",
            body
        ))),
    }
}
