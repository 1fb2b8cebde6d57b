use super::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_file() -> SourceFile {
    SourceFile::new("memo.mp3", "audio/mpeg", vec![1, 2, 3])
}

#[test]
fn test_new_job_is_queued_without_result() {
    let job = TranscriptionJob::new(sample_file());

    assert_eq!(job.status(), JobStatus::Queued);
    assert!(job.audio_url().is_none());
    assert!(job.job_id().is_none());
    assert!(job.result_text().is_none());
}

#[test]
fn test_status_moves_forward() {
    let mut job = TranscriptionJob::new(sample_file());

    assert!(job.observe(JobStatus::Processing));
    assert_eq!(job.status(), JobStatus::Processing);
    assert!(job.complete("hello".to_string()));
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.result_text(), Some("hello"));
}

#[test]
fn test_repeated_status_is_not_a_change() {
    let mut job = TranscriptionJob::new(sample_file());

    assert!(!job.observe(JobStatus::Queued));
    assert!(job.observe(JobStatus::Processing));
    assert!(!job.observe(JobStatus::Processing));
}

#[test]
fn test_backward_report_is_ignored() {
    let mut job = TranscriptionJob::new(sample_file());
    job.observe(JobStatus::Processing);

    assert!(!job.observe(JobStatus::Queued));
    assert_eq!(job.status(), JobStatus::Processing);
}

#[test]
fn test_terminal_states_are_final() {
    let mut failed = TranscriptionJob::new(sample_file());
    assert!(failed.observe(JobStatus::Failed));
    assert!(!failed.complete("late".to_string()));
    assert!(!failed.observe(JobStatus::Processing));
    assert_eq!(failed.status(), JobStatus::Failed);
    assert!(failed.result_text().is_none());

    let mut completed = TranscriptionJob::new(sample_file());
    completed.complete("done".to_string());
    assert!(!completed.observe(JobStatus::Failed));
    assert_eq!(completed.result_text(), Some("done"));
}

#[test]
fn test_remote_status_mapping() {
    assert_eq!(JobStatus::from_remote("queued"), Some(JobStatus::Queued));
    assert_eq!(JobStatus::from_remote("processing"), Some(JobStatus::Processing));
    assert_eq!(JobStatus::from_remote("completed"), Some(JobStatus::Completed));
    assert_eq!(JobStatus::from_remote("failed"), Some(JobStatus::Failed));
    assert_eq!(JobStatus::from_remote("error"), Some(JobStatus::Failed));
    assert_eq!(JobStatus::from_remote("paused"), None);
    assert_eq!(JobStatus::from_remote("COMPLETED"), None);
}

#[test]
fn test_mime_type_from_extension() {
    assert_eq!(mime_type_for(&PathBuf::from("a/b/talk.MP3")), "audio/mpeg");
    assert_eq!(mime_type_for(&PathBuf::from("clip.mov")), "video/quicktime");
    assert_eq!(mime_type_for(&PathBuf::from("notes.txt")), "application/octet-stream");
    assert_eq!(mime_type_for(&PathBuf::from("no_extension")), "application/octet-stream");
}

#[test]
fn test_source_file_debug_hides_contents() {
    let file = SourceFile::new("memo.wav", "audio/wav", vec![0xAB; 4]);
    let debug = format!("{:?}", file);

    assert!(debug.contains("memo.wav"));
    assert!(debug.contains("bytes: 4"));
    assert!(!debug.contains("171"));
}

#[tokio::test]
async fn test_load_reads_bytes_and_infers_mime() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("interview.m4a");
    tokio::fs::write(&path, b"fake audio").await.unwrap();

    let file = SourceFile::load(&path).await.unwrap();

    assert_eq!(file.name(), "interview.m4a");
    assert_eq!(file.mime_type(), "audio/mp4");
    assert_eq!(file.data(), b"fake audio");
    assert_eq!(file.len(), 10);
}

#[tokio::test]
async fn test_load_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    let result = SourceFile::load(temp.path().join("missing.wav")).await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("missing.wav"));
}

#[test]
fn test_clone_shares_file_buffer() {
    let file = SourceFile::new("long.mp4", "video/mp4", vec![0u8; 1024]);
    let copy = file.clone();

    assert_eq!(file.bytes().as_ptr(), copy.bytes().as_ptr());
    assert_eq!(copy.len(), 1024);
}
