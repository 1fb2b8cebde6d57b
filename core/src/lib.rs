//! Upload a media file to AssemblyAI, wait for the transcription job and
//! return its text.
//!
//! [`TranscriptionWorkflow`] drives the three service calls in sequence and
//! publishes [`WorkflowSnapshot`]s for whatever front end renders them.

pub mod api;
pub mod config;
pub mod dirs;
pub mod error;
pub mod job;
pub mod poll;
pub mod workflow;

pub use api::{AssemblyAiClient, StatusReport, TranscriptionApi};
pub use config::Config;
pub use error::{ApiError, ErrorKind, Stage, WorkflowError};
pub use job::{AudioUrl, JobId, JobStatus, SourceFile, TranscriptionJob};
pub use poll::{PollPolicy, RetryPolicy};
pub use workflow::{Phase, SnapshotReceiver, TranscriptionWorkflow, WorkflowSnapshot};
