//! Error taxonomy for the transcription workflow.

use std::fmt;
use std::time::Duration;

use crate::job::JobId;

/// Workflow step an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Upload,
    Submission,
    StatusCheck,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Upload => "upload",
            Stage::Submission => "submission",
            Stage::StatusCheck => "status check",
        })
    }
}

/// Coarse classification of a [`WorkflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Upload,
    Submission,
    Transcription,
    StatusCheck,
    Network,
    Decode,
    InvalidRequest,
    Timeout,
    Busy,
    Cancelled,
}

/// Failure of a workflow run or one of its steps.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("Upload failed with HTTP {status}: {body}")]
    Upload { status: u16, body: String },

    #[error("Transcription request failed with HTTP {status}: {body}")]
    Submission { status: u16, body: String },

    #[error("Transcription {job_id} failed: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Transcription {
        job_id: JobId,
        reason: Option<String>,
    },

    #[error("Status check failed with HTTP {status}: {body}")]
    StatusCheck { status: u16, body: String },

    #[error("Network error during {stage}: {message}")]
    Network { stage: Stage, message: String },

    #[error("Unexpected response during {stage}: {message}")]
    Decode { stage: Stage, message: String },

    #[error("Could not build {stage} request: {message}")]
    InvalidRequest { stage: Stage, message: String },

    #[error("Transcription {job_id} not finished after {}s", .waited.as_secs())]
    Timeout { job_id: JobId, waited: Duration },

    #[error("A transcription is already running")]
    WorkflowBusy,

    #[error("Transcription cancelled")]
    Cancelled,
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::NoFileSelected => ErrorKind::Input,
            WorkflowError::Upload { .. } => ErrorKind::Upload,
            WorkflowError::Submission { .. } => ErrorKind::Submission,
            WorkflowError::Transcription { .. } => ErrorKind::Transcription,
            WorkflowError::StatusCheck { .. } => ErrorKind::StatusCheck,
            WorkflowError::Network { .. } => ErrorKind::Network,
            WorkflowError::Decode { .. } => ErrorKind::Decode,
            WorkflowError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            WorkflowError::Timeout { .. } => ErrorKind::Timeout,
            WorkflowError::WorkflowBusy => ErrorKind::Busy,
            WorkflowError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Returns a short message suitable for display in the UI.
    ///
    /// Full details belong in the log, not here.
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::NoFileSelected => "Please select a file first!".to_string(),
            WorkflowError::Upload { status, .. } | WorkflowError::Submission { status, .. }
                if *status == 401 || *status == 403 =>
            {
                "The transcription service rejected the API key. Check your settings.".to_string()
            }
            WorkflowError::Upload { .. } => "Uploading the file failed. Please try again.".to_string(),
            WorkflowError::Submission { .. } => {
                "The transcription service did not accept the file. Please try again.".to_string()
            }
            WorkflowError::Transcription { .. } => {
                "The service could not transcribe this file.".to_string()
            }
            WorkflowError::StatusCheck { .. } | WorkflowError::Decode { .. } => {
                "Something went wrong talking to the transcription service.".to_string()
            }
            WorkflowError::Network { .. } => {
                "Could not reach the transcription service. Check your connection.".to_string()
            }
            WorkflowError::InvalidRequest { .. } => {
                "The request could not be sent. Check your API key and service URL.".to_string()
            }
            WorkflowError::Timeout { .. } => "Transcription took too long. Try again later.".to_string(),
            WorkflowError::WorkflowBusy => "A transcription is already in progress.".to_string(),
            WorkflowError::Cancelled => "Transcription cancelled.".to_string(),
        }
    }
}

/// Errors from a single call to the transcription service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (connect, timeout, reset).
    #[error("Request failed: {0}")]
    Network(String),

    /// The response body was not what the endpoint documents.
    #[error("Failed to parse response: {0}")]
    Decode(String),

    /// The request could not be built, e.g. a key that is not a valid
    /// header value. Nothing was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Whether retrying the same idempotent request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Http { status, .. } => *status == 429 || (500..600).contains(status),
            ApiError::Decode(_) | ApiError::InvalidRequest(_) => false,
        }
    }

    /// Classify this error as a failure of `stage`.
    ///
    /// HTTP rejections become the stage's own error; transport failures and
    /// malformed bodies keep their class.
    pub fn at(self, stage: Stage) -> WorkflowError {
        let transient = self.is_transient();
        match self {
            ApiError::Http { status, body } => match stage {
                Stage::Upload => WorkflowError::Upload { status, body },
                Stage::Submission => WorkflowError::Submission { status, body },
                Stage::StatusCheck if transient => {
                    WorkflowError::Network {
                        stage,
                        message: format!("HTTP {}: {}", status, body),
                    }
                }
                Stage::StatusCheck => WorkflowError::StatusCheck { status, body },
            },
            ApiError::Network(message) => WorkflowError::Network { stage, message },
            ApiError::Decode(message) => WorkflowError::Decode { stage, message },
            ApiError::InvalidRequest(message) => WorkflowError::InvalidRequest { stage, message },
        }
    }
}
