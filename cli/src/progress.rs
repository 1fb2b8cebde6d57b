//! Terminal progress bar driven by workflow snapshots.

use audioscribe_core::{Phase, SnapshotReceiver, WorkflowSnapshot};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::logging::Console;

const TEMPLATE: &str = "{spinner} [{bar:30}] {pos:>3}% {msg}";

pub struct ProgressView {
    bar: ProgressBar,
    console: Console,
    task: JoinHandle<()>,
}

impl ProgressView {
    /// Start rendering snapshots from `events` until a run finishes.
    ///
    /// Log lines written through `console` are drawn above the bar.
    pub fn spawn(events: SnapshotReceiver, console: &Console) -> Self {
        let bar = ProgressBar::new(100);
        match ProgressStyle::with_template(TEMPLATE) {
            Ok(style) => bar.set_style(style.progress_chars("=> ")),
            Err(e) => tracing::debug!(error = %e, "Falling back to default progress style"),
        }

        console.attach(bar.clone());
        let task = tokio::spawn(render(events, bar.clone()));
        Self {
            bar,
            console: console.clone(),
            task,
        }
    }

    /// Stop rendering and remove the bar from the terminal.
    pub fn finish(self) {
        self.task.abort();
        self.console.detach();
        self.bar.finish_and_clear();
    }
}

async fn render(mut events: SnapshotReceiver, bar: ProgressBar) {
    loop {
        match events.recv().await {
            Ok(snapshot) => {
                bar.set_position(u64::from(snapshot.progress));
                bar.set_message(describe(&snapshot));
                if snapshot.phase.is_terminal() {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}

/// One-line status text for a snapshot.
pub fn describe(snapshot: &WorkflowSnapshot) -> String {
    match snapshot.phase {
        Phase::Idle => "Waiting".to_string(),
        Phase::Uploading => match &snapshot.file_name {
            Some(name) => format!("Uploading {name}"),
            None => "Uploading".to_string(),
        },
        Phase::Submitting => "Starting transcription".to_string(),
        Phase::Polling => match snapshot.job_status {
            Some(status) => format!("Transcribing ({status})"),
            None => "Transcribing".to_string(),
        },
        Phase::Completed => "Done".to_string(),
        Phase::Failed => "Failed".to_string(),
    }
}
