//! Google Drive v3 client.
//!
//! Only the three calls the service needs are wrapped: `files.list`,
//! `files.get?alt=media` and `files.export`. The [`DriveApi`] trait is the seam
//! traversal and search are written against.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;

use crate::models::FileList;

/// Fields requested from `files.list`.
const LIST_FIELDS: &str = "nextPageToken, files(id,name,mimeType)";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Drive request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Drive rejected the access token")]
    Unauthorized,

    #[error("Drive item not found: {0}")]
    NotFound(String),

    #[error("Drive API error {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// A `files.list` call. Every listing spans all drives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub q: String,
    pub page_token: Option<String>,
    pub page_size: Option<u32>,
}

impl ListQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Default::default()
        }
    }

    pub fn page_token(mut self, token: Option<String>) -> Self {
        self.page_token = token;
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }
}

/// Escape a literal for embedding inside single quotes in a Drive `q` string.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Fetch a single page of `files.list`.
    async fn list_files(&self, query: &ListQuery) -> Result<FileList, DriveError>;

    /// Download a binary file's content as stored.
    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError>;

    /// Export a Google-native document to `mime_type`.
    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, DriveError>;
}

/// Drive client bound to one user's access token for the duration of a request.
pub struct DriveClient {
    http: Client,
    api_base: String,
    access_token: String,
}

impl DriveClient {
    pub fn new(http: Client, api_base: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, DriveError> {
        let url = format!("{}{}", self.api_base, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, error = %e, "Drive request failed");
                DriveError::Transport(e)
            })?;

        check_status(response, path).await
    }

    /// Read the body chunk by chunk until the transfer completes.
    async fn read_chunked(&self, mut response: Response, file_id: &str) -> Result<Vec<u8>, DriveError> {
        let mut buffer = match response.content_length() {
            Some(len) => Vec::with_capacity(len as usize),
            None => Vec::new(),
        };

        let mut chunks = 0usize;
        while let Some(chunk) = response.chunk().await? {
            buffer.extend_from_slice(&chunk);
            chunks += 1;
        }

        tracing::debug!(
            file_id = %file_id,
            chunks = chunks,
            size = buffer.len(),
            "Transfer complete"
        );

        Ok(buffer)
    }
}

#[async_trait]
impl DriveApi for DriveClient {
    async fn list_files(&self, query: &ListQuery) -> Result<FileList, DriveError> {
        let page_size = query.page_size.map(|size| size.to_string());

        let mut params = vec![
            ("q", query.q.as_str()),
            ("fields", LIST_FIELDS),
            ("corpora", "allDrives"),
            ("includeItemsFromAllDrives", "true"),
            ("supportsAllDrives", "true"),
        ];
        if let Some(token) = &query.page_token {
            params.push(("pageToken", token.as_str()));
        }
        if let Some(size) = &page_size {
            params.push(("pageSize", size.as_str()));
        }

        let response = self.get("/files", &params).await?;

        response.json::<FileList>().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse files.list response");
            DriveError::Transport(e)
        })
    }

    async fn download(&self, file_id: &str) -> Result<Vec<u8>, DriveError> {
        let path = format!("/files/{}", urlencoding::encode(file_id));
        let response = self
            .get(&path, &[("alt", "media"), ("supportsAllDrives", "true")])
            .await?;

        self.read_chunked(response, file_id).await
    }

    async fn export(&self, file_id: &str, mime_type: &str) -> Result<Vec<u8>, DriveError> {
        let path = format!("/files/{}/export", urlencoding::encode(file_id));
        let response = self.get(&path, &[("mimeType", mime_type)]).await?;

        self.read_chunked(response, file_id).await
    }
}

async fn check_status(response: Response, path: &str) -> Result<Response, DriveError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(DriveError::Unauthorized),
        StatusCode::NOT_FOUND => Err(DriveError::NotFound(path.to_string())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, path = %path, "Drive API error");
            Err(DriveError::Api { status, body })
        }
    }
}
