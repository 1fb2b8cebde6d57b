//! Transcription job model.
//!
//! A [`TranscriptionJob`] is created for every workflow run and owned by it
//! until the run ends. Nothing here is persisted.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Extension to MIME type table for the media types the picker accepts.
const MIME_BY_EXTENSION: &[(&str, &str)] = &[
    ("aac", "audio/aac"),
    ("aiff", "audio/aiff"),
    ("amr", "audio/amr"),
    ("flac", "audio/flac"),
    ("m4a", "audio/mp4"),
    ("mp3", "audio/mpeg"),
    ("oga", "audio/ogg"),
    ("ogg", "audio/ogg"),
    ("opus", "audio/opus"),
    ("wav", "audio/wav"),
    ("weba", "audio/webm"),
    ("wma", "audio/x-ms-wma"),
    ("avi", "video/x-msvideo"),
    ("m4v", "video/mp4"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("mp4", "video/mp4"),
    ("mpeg", "video/mpeg"),
    ("webm", "video/webm"),
    ("wmv", "video/x-ms-wmv"),
];

/// A user-selected media file, held in memory for upload.
///
/// Clones share the same buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    mime_type: String,
    data: Bytes,
}

impl SourceFile {
    /// Create a source file from raw bytes.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, inferring its MIME type from the extension.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read media file: {}", path.display()))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Path has no file name: {}", path.display()))?;
        let mime_type = mime_type_for(path);

        debug!(name = %name, mime = mime_type, bytes = data.len(), "Loaded media file");
        Ok(Self::new(name, mime_type, data))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The shared buffer, for handing to the HTTP client without a copy.
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Keeps file contents out of logs.
impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Guess a MIME type from a path's extension (case-insensitive).
pub fn mime_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return FALLBACK_MIME;
    };
    MIME_BY_EXTENSION
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
        .unwrap_or(FALLBACK_MIME)
}

/// URL of an uploaded file, hosted by the transcription service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AudioUrl(String);

impl AudioUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a transcription job at the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a transcription job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Map a status string reported by the service.
    ///
    /// The service spells failure as either `failed` or `error`.
    /// Returns `None` for anything unrecognised.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status {
            "queued" => Some(JobStatus::Queued),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" | "error" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One transcription attempt for a single source file.
///
/// Status only moves forward (queued, processing, then completed or failed),
/// and result text exists only once the job is completed.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    source: SourceFile,
    audio_url: Option<AudioUrl>,
    job_id: Option<JobId>,
    status: JobStatus,
    result_text: Option<String>,
}

impl TranscriptionJob {
    pub fn new(source: SourceFile) -> Self {
        Self {
            source,
            audio_url: None,
            job_id: None,
            status: JobStatus::Queued,
            result_text: None,
        }
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn audio_url(&self) -> Option<&AudioUrl> {
        self.audio_url.as_ref()
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn result_text(&self) -> Option<&str> {
        self.result_text.as_deref()
    }

    pub(crate) fn set_audio_url(&mut self, url: AudioUrl) {
        self.audio_url = Some(url);
    }

    pub(crate) fn set_job_id(&mut self, id: JobId) {
        self.job_id = Some(id);
    }

    /// Record a queued, processing or failed status report.
    ///
    /// Returns `true` if the status changed. Reports that would move the job
    /// backwards, or out of a terminal state, are ignored. Completion carries
    /// the transcript and goes through [`TranscriptionJob::complete`].
    pub fn observe(&mut self, status: JobStatus) -> bool {
        if status == JobStatus::Completed {
            debug!("Completion must carry text, ignoring bare completed report");
            return false;
        }
        if !self.can_move_to(status) {
            debug!(from = %self.status, to = %status, "Ignoring backward status report");
            return false;
        }
        let changed = self.status != status;
        self.status = status;
        changed
    }

    /// Mark the job completed with its transcript.
    ///
    /// Returns `false` (and leaves the job untouched) if it already failed
    /// or completed.
    pub fn complete(&mut self, text: String) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.result_text = Some(text);
        true
    }

    fn can_move_to(&self, next: JobStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        next.rank() >= self.status.rank()
    }
}

#[cfg(test)]
#[path = "job_test.rs"]
mod tests;
