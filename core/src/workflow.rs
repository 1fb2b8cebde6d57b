//! Upload, submit and poll workflow.
//!
//! A run moves through `Idle -> Uploading -> Submitting -> Polling` and ends
//! in `Completed` or `Failed`. Every transition publishes an immutable
//! [`WorkflowSnapshot`] to subscribers. Only one run may be active at a time.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{AssemblyAiClient, TranscriptionApi};
use crate::config::Config;
use crate::error::{Stage, WorkflowError};
use crate::job::{AudioUrl, JobId, JobStatus, SourceFile, TranscriptionJob};
use crate::poll::{PollPolicy, RetryPolicy};

/// Progress once the file is staged for upload.
pub const PROGRESS_STAGED: u8 = 30;
/// Progress once the upload has completed.
pub const PROGRESS_UPLOADED: u8 = 60;
/// Progress once the job has been accepted.
pub const PROGRESS_SUBMITTED: u8 = 90;
/// Progress once the job has resolved.
pub const PROGRESS_DONE: u8 = 100;

const EVENT_CAPACITY: usize = 64;

/// Workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Uploading,
    Submitting,
    Polling,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

/// Observable state of the workflow at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    /// Increments with every call to `run`.
    pub run_id: u64,
    pub phase: Phase,
    /// Progress checkpoint in `0..=100`.
    pub progress: u8,
    pub file_name: Option<String>,
    pub audio_url: Option<AudioUrl>,
    pub job_id: Option<JobId>,
    pub job_status: Option<JobStatus>,
    /// Transcript, set only in `Completed`.
    pub result: Option<String>,
    /// Cause of the last failure.
    pub error: Option<WorkflowError>,
}

impl WorkflowSnapshot {
    fn idle(run_id: u64) -> Self {
        Self {
            run_id,
            phase: Phase::Idle,
            progress: 0,
            file_name: None,
            audio_url: None,
            job_id: None,
            job_status: None,
            result: None,
            error: None,
        }
    }
}

impl Default for WorkflowSnapshot {
    fn default() -> Self {
        Self::idle(0)
    }
}

/// Snapshot receiver type.
pub type SnapshotReceiver = broadcast::Receiver<WorkflowSnapshot>;

/// Releases the busy flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Orchestrates upload, job submission and polling against a transcription
/// service.
pub struct TranscriptionWorkflow {
    api: Arc<dyn TranscriptionApi>,
    poll: PollPolicy,
    retry: RetryPolicy,
    running: AtomicBool,
    next_run_id: AtomicU64,
    latest: Mutex<WorkflowSnapshot>,
    events: broadcast::Sender<WorkflowSnapshot>,
}

impl TranscriptionWorkflow {
    /// Create a workflow with default polling and retry policies.
    pub fn new(api: Arc<dyn TranscriptionApi>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            poll: PollPolicy::default(),
            retry: RetryPolicy::default(),
            running: AtomicBool::new(false),
            next_run_id: AtomicU64::new(0),
            latest: Mutex::new(WorkflowSnapshot::default()),
            events,
        }
    }

    /// Create a workflow talking to AssemblyAI as configured.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = AssemblyAiClient::from_config(&config.api)?;
        Ok(Self::new(Arc::new(client))
            .with_poll_policy(PollPolicy::from(&config.polling))
            .with_retry_policy(RetryPolicy::from(&config.retry)))
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Subscribe to snapshots published from now on.
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.events.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether a run is in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Upload `file` and return the URL the service hosts it at.
    pub async fn submit(
        &self,
        file: Option<&SourceFile>,
        cancel: &CancellationToken,
    ) -> Result<AudioUrl, WorkflowError> {
        let file = file.ok_or(WorkflowError::NoFileSelected)?;
        ensure_active(cancel)?;

        info!(file = file.name(), bytes = file.len(), "Uploading file");
        let audio_url = cancellable(cancel, self.api.upload(file))
            .await?
            .map_err(|e| e.at(Stage::Upload))?;

        info!(audio_url = %audio_url, "File uploaded");
        Ok(audio_url)
    }

    /// Create a transcription job for uploaded audio.
    pub async fn request_transcription(
        &self,
        audio_url: &AudioUrl,
        cancel: &CancellationToken,
    ) -> Result<JobId, WorkflowError> {
        ensure_active(cancel)?;

        let job_id = cancellable(cancel, self.api.create_transcript(audio_url))
            .await?
            .map_err(|e| e.at(Stage::Submission))?;

        info!(job_id = %job_id, "Transcription started");
        Ok(job_id)
    }

    /// Check job status until it completes or fails.
    pub async fn poll_until_terminal(
        &self,
        job_id: &JobId,
        cancel: &CancellationToken,
    ) -> Result<String, WorkflowError> {
        self.poll_job(job_id, cancel, |_| {}).await
    }

    /// Run the whole workflow for `file`.
    pub async fn run(&self, file: Option<SourceFile>) -> Result<String, WorkflowError> {
        self.run_with_cancel(file, &CancellationToken::new()).await
    }

    /// Run the whole workflow for `file`, aborting when `cancel` fires.
    ///
    /// Fails with [`WorkflowError::WorkflowBusy`] if another run is active.
    pub async fn run_with_cancel(
        &self,
        file: Option<SourceFile>,
        cancel: &CancellationToken,
    ) -> Result<String, WorkflowError> {
        let _guard = self.try_begin()?;
        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed) + 1;
        let mut snapshot = WorkflowSnapshot::idle(run_id);

        let Some(file) = file else {
            let err = WorkflowError::NoFileSelected;
            warn!(run_id, "Run requested without a file");
            snapshot.error = Some(err.clone());
            self.publish(&snapshot);
            return Err(err);
        };

        snapshot.file_name = Some(file.name().to_string());
        let mut job = TranscriptionJob::new(file);

        let result = self.drive(&mut job, &mut snapshot, cancel).await;
        snapshot.job_status = job.job_id().map(|_| job.status());

        match result {
            Ok(text) => {
                job.complete(text.clone());
                snapshot.job_status = Some(job.status());
                snapshot.phase = Phase::Completed;
                snapshot.progress = PROGRESS_DONE;
                snapshot.result = Some(text.clone());
                self.publish(&snapshot);
                info!(run_id, chars = text.len(), "Transcription completed");
                Ok(text)
            }
            Err(err) => {
                snapshot.phase = Phase::Failed;
                snapshot.error = Some(err.clone());
                self.publish(&snapshot);
                error!(run_id, kind = ?err.kind(), error = %err, "Transcription run failed");
                Err(err)
            }
        }
    }

    fn try_begin(&self) -> Result<RunGuard<'_>, WorkflowError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WorkflowError::WorkflowBusy)?;
        Ok(RunGuard(&self.running))
    }

    async fn drive(
        &self,
        job: &mut TranscriptionJob,
        snapshot: &mut WorkflowSnapshot,
        cancel: &CancellationToken,
    ) -> Result<String, WorkflowError> {
        self.enter(snapshot, Phase::Uploading, PROGRESS_STAGED);
        let audio_url = self.submit(Some(job.source()), cancel).await?;
        job.set_audio_url(audio_url.clone());
        snapshot.audio_url = Some(audio_url.clone());

        self.enter(snapshot, Phase::Submitting, PROGRESS_UPLOADED);
        let job_id = self.request_transcription(&audio_url, cancel).await?;
        job.set_job_id(job_id.clone());
        snapshot.job_id = Some(job_id.clone());
        snapshot.job_status = Some(job.status());

        self.enter(snapshot, Phase::Polling, PROGRESS_SUBMITTED);
        self.poll_job(&job_id, cancel, |status| {
            if job.observe(status) && !status.is_terminal() {
                snapshot.job_status = Some(job.status());
                self.publish(snapshot);
            }
        })
        .await
    }

    fn enter(&self, snapshot: &mut WorkflowSnapshot, phase: Phase, progress: u8) {
        debug!(run_id = snapshot.run_id, phase = ?phase, progress, "Workflow transition");
        snapshot.phase = phase;
        snapshot.progress = progress;
        self.publish(snapshot);
    }

    fn publish(&self, snapshot: &WorkflowSnapshot) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = snapshot.clone();
        // Ignore send errors (no subscribers)
        let _ = self.events.send(snapshot.clone());
    }

    /// Poll loop. `on_status` sees every recognised status except `completed`.
    async fn poll_job(
        &self,
        job_id: &JobId,
        cancel: &CancellationToken,
        mut on_status: impl FnMut(JobStatus),
    ) -> Result<String, WorkflowError> {
        let started = Instant::now();
        let deadline = self.poll.max_wait().map(|limit| started + limit);
        let mut reports: u32 = 0;
        let mut retries: u32 = 0;

        loop {
            ensure_active(cancel)?;

            let outcome = cancellable(cancel, self.api.transcript_status(job_id)).await?;
            let report = match outcome {
                Ok(report) => {
                    retries = 0;
                    report
                }
                Err(e) if self.retry.should_retry(retries, &e) => {
                    let delay = self.retry.delay_for(retries);
                    retries += 1;
                    warn!(
                        job_id = %job_id,
                        error = %e,
                        attempt = retries,
                        max_retries = self.retry.max_retries(),
                        delay_ms = delay.as_millis() as u64,
                        "Status check failed, retrying"
                    );
                    self.pause(delay, job_id, started, deadline, cancel).await?;
                    continue;
                }
                Err(e) => return Err(e.at(Stage::StatusCheck)),
            };
            reports += 1;

            debug!(job_id = %job_id, status = %report.status, check = reports, "Checking status");
            match report.job_status() {
                Some(JobStatus::Completed) => {
                    let text = report.text.unwrap_or_else(|| {
                        warn!(job_id = %job_id, "Completed job has no text");
                        String::new()
                    });
                    return Ok(text);
                }
                Some(JobStatus::Failed) => {
                    on_status(JobStatus::Failed);
                    return Err(WorkflowError::Transcription {
                        job_id: job_id.clone(),
                        reason: report.error,
                    });
                }
                Some(status) => on_status(status),
                None => {
                    warn!(job_id = %job_id, status = %report.status, "Unrecognised job status, still polling");
                }
            }

            let delay = self.poll.delay_after(reports);
            self.pause(delay, job_id, started, deadline, cancel).await?;
        }
    }

    /// Sleep before the next status check, never past the deadline.
    ///
    /// Fails with `Timeout` if the deadline has already passed.
    async fn pause(
        &self,
        delay: Duration,
        job_id: &JobId,
        started: Instant,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        let mut wake = Instant::now() + delay;
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(WorkflowError::Timeout {
                    job_id: job_id.clone(),
                    waited: started.elapsed(),
                });
            }
            wake = wake.min(deadline);
        }
        cancellable(cancel, tokio::time::sleep_until(wake)).await
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), WorkflowError> {
    if cancel.is_cancelled() {
        return Err(WorkflowError::Cancelled);
    }
    Ok(())
}

/// Drive `future` to completion unless `cancel` fires first.
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, WorkflowError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WorkflowError::Cancelled),
        output = future => Ok(output),
    }
}

#[cfg(test)]
#[path = "workflow_test.rs"]
mod tests;
