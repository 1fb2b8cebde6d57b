//! Transcription service client.
//!
//! [`TranscriptionApi`] is the seam between the workflow and the remote
//! service; [`AssemblyAiClient`] implements it over the AssemblyAI REST API.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Limit for establishing a connection. Applies to every request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

use crate::config::{API_KEY_ENV_VAR, ApiConfig};
use crate::error::ApiError;
use crate::job::{AudioUrl, JobId, JobStatus, SourceFile};

/// Remote operations the workflow depends on.
///
/// Each method issues exactly one request.
#[async_trait]
pub trait TranscriptionApi: Send + Sync {
    /// Upload a media file; returns the URL the service hosts it at.
    async fn upload(&self, file: &SourceFile) -> Result<AudioUrl, ApiError>;

    /// Create a transcription job for previously uploaded audio.
    async fn create_transcript(&self, audio_url: &AudioUrl) -> Result<JobId, ApiError>;

    /// Fetch the current state of a transcription job.
    async fn transcript_status(&self, job_id: &JobId) -> Result<StatusReport, ApiError>;
}

/// Job state as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusReport {
    /// Raw status string; see [`JobStatus::from_remote`].
    pub status: String,
    /// Transcript, present once completed.
    #[serde(default)]
    pub text: Option<String>,
    /// Failure reason, present when the job failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            text: None,
            error: None,
        }
    }

    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new("completed")
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::new("failed")
        }
    }

    /// Parsed status, `None` if the service sent something unrecognised.
    pub fn job_status(&self) -> Option<JobStatus> {
        JobStatus::from_remote(&self.status)
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Serialize)]
struct CreateTranscriptRequest<'a> {
    audio_url: &'a str,
}

#[derive(Deserialize)]
struct CreateTranscriptResponse {
    id: String,
}

/// AssemblyAI REST client.
///
/// The API key goes verbatim into the `Authorization` header, without a
/// scheme prefix.
///
/// Submission and status calls are bounded by the request timeout. Uploads
/// are bounded only by the upload timeout, if one is set, since sending a
/// large file can legitimately take much longer.
pub struct AssemblyAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
    upload_timeout: Option<Duration>,
}

impl fmt::Debug for AssemblyAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .field("upload_timeout", &self.upload_timeout)
            .finish()
    }
}

impl AssemblyAiClient {
    /// Create a client for the API rooted at `base_url`.
    ///
    /// `request_timeout` bounds submission and status calls. Uploads are
    /// unbounded until [`AssemblyAiClient::with_upload_timeout`] says otherwise.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            request_timeout,
            upload_timeout: None,
        })
    }

    /// Bound uploads by `timeout`. `None` lets an upload run as long as the
    /// connection stays up.
    pub fn with_upload_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Create a client from configuration, resolving the API key.
    ///
    /// A missing key is not an error here: the service rejects the requests
    /// and that rejection is what the caller sees.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().unwrap_or_else(|| {
            warn!(
                env_var = API_KEY_ENV_VAR,
                "No API key configured, requests will be rejected by the service"
            );
            String::new()
        });
        let upload_timeout =
            (config.upload_timeout_secs > 0).then(|| Duration::from_secs(config.upload_timeout_secs));
        Ok(Self::new(
            config.base_url.clone(),
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_upload_timeout(upload_timeout))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Multipart part sharing the file's buffer rather than copying it.
    fn file_part(file: &SourceFile) -> Part {
        let part = || {
            Part::stream_with_length(reqwest::Body::from(file.bytes().clone()), file.len() as u64)
                .file_name(file.name().to_string())
        };
        part().mime_str(file.mime_type()).unwrap_or_else(|e| {
            warn!(mime = file.mime_type(), error = %e, "Invalid MIME type, uploading without one");
            part()
        })
    }
}

/// Send a request and turn transport failures and non-success statuses into
/// [`ApiError`]s.
async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
    let response = request.send().await.map_err(|e| {
        if e.is_builder() {
            ApiError::InvalidRequest(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ApiError::Http {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl TranscriptionApi for AssemblyAiClient {
    async fn upload(&self, file: &SourceFile) -> Result<AudioUrl, ApiError> {
        let url = self.endpoint("upload");
        debug!(url = %url, file = file.name(), bytes = file.len(), "Uploading file");

        let form = Form::new().part("file", Self::file_part(file));
        let mut request = self
            .http
            .post(&url)
            .header(AUTHORIZATION, &self.api_key)
            .multipart(form);
        if let Some(timeout) = self.upload_timeout {
            request = request.timeout(timeout);
        }

        let body: UploadResponse = decode(send(request).await?).await?;
        Ok(AudioUrl::new(body.upload_url))
    }

    async fn create_transcript(&self, audio_url: &AudioUrl) -> Result<JobId, ApiError> {
        let url = self.endpoint("transcript");
        debug!(url = %url, audio_url = %audio_url, "Requesting transcription");

        let request = self
            .http
            .post(&url)
            .header(AUTHORIZATION, &self.api_key)
            .timeout(self.request_timeout)
            .json(&CreateTranscriptRequest {
                audio_url: audio_url.as_str(),
            });

        let body: CreateTranscriptResponse = decode(send(request).await?).await?;
        Ok(JobId::new(body.id))
    }

    async fn transcript_status(&self, job_id: &JobId) -> Result<StatusReport, ApiError> {
        let url = self.endpoint(&format!("transcript/{}", job_id));

        let request = self
            .http
            .get(&url)
            .header(AUTHORIZATION, &self.api_key)
            .timeout(self.request_timeout);

        decode(send(request).await?).await
    }
}
