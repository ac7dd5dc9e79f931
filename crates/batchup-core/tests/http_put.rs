//! HTTP PUT executor against a local test server.

mod common;

use std::fs;
use std::path::Path;
use std::time::Duration;

use batchup_core::config::SchedulerConfig;
use batchup_core::http_put::{HttpPutUploader, PutOptions};
use batchup_core::item::FileItem;
use batchup_core::retry::{RetryPolicy, UploadError};
use batchup_core::scheduler::{
    BatchEvent, BatchOutcome, BatchScheduler, ChannelObserver, NoopObserver, ProgressReporter,
    Uploader,
};
use batchup_core::tier::DeviceTier;
use common::put_server::{self, PutServerOptions};

fn options() -> PutOptions {
    PutOptions {
        connect_timeout: Duration::from_secs(5),
        stall_timeout: Duration::from_secs(5),
        max_duration: Duration::from_secs(30),
        headers: vec![("X-Api-Key".to_string(), "secret".to_string())],
    }
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

fn write_file(dir: &Path, name: &str, body: &[u8]) -> FileItem {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    FileItem::from_path(&path).unwrap()
}

#[tokio::test]
async fn put_streams_file_under_prefix() {
    let server = put_server::start();
    let dir = tempfile::tempdir().unwrap();
    let body: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    let item = write_file(dir.path(), "a.bin", &body);

    let uploader = HttpPutUploader::new(
        &format!("{}bucket", server.base_url),
        Some("album".to_string()),
        options(),
        fast_retry(1),
    )
    .unwrap();
    let receipt = uploader
        .upload(item.clone(), ProgressReporter::discard())
        .await
        .unwrap();

    assert_eq!(receipt.id, item.id);
    assert_eq!(receipt.status, 200);
    assert_eq!(receipt.bytes, body.len() as u64);
    assert!(receipt.url.ends_with("/bucket/album/a.bin"), "{}", receipt.url);

    let received = server.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].path, "/bucket/album/a.bin");
    assert_eq!(received[0].body, body);
    assert_eq!(received[0].header("x-api-key"), Some("secret"));
    let disposition = received[0].header("content-disposition").unwrap();
    assert!(disposition.contains("filename=\"a.bin\""), "{}", disposition);
}

#[tokio::test]
async fn transient_503_is_retried_within_one_attempt() {
    let server = put_server::start_with_options(PutServerOptions {
        fail_first: 1,
        fail_status: 503,
    });
    let dir = tempfile::tempdir().unwrap();
    let item = write_file(dir.path(), "b.txt", b"hello");

    let uploader = HttpPutUploader::new(&server.base_url, None, options(), fast_retry(3)).unwrap();
    let receipt = uploader
        .upload(item, ProgressReporter::discard())
        .await
        .unwrap();

    assert_eq!(receipt.status, 200);
    assert_eq!(server.request_count(), 2);
    assert_eq!(server.received().len(), 1);
}

#[tokio::test]
async fn forbidden_is_not_retried() {
    let server = put_server::start_with_options(PutServerOptions {
        fail_first: usize::MAX,
        fail_status: 403,
    });
    let dir = tempfile::tempdir().unwrap();
    let item = write_file(dir.path(), "c.txt", b"nope");

    let uploader = HttpPutUploader::new(&server.base_url, None, options(), fast_retry(5)).unwrap();
    let err = uploader
        .upload(item, ProgressReporter::discard())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Http(403)), "{:?}", err);
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn missing_local_file_is_an_io_error() {
    let server = put_server::start();
    let dir = tempfile::tempdir().unwrap();
    let item = FileItem {
        id: "gone".to_string(),
        name: "gone.txt".to_string(),
        path: dir.path().join("gone.txt"),
        size: 4,
    };

    let uploader = HttpPutUploader::new(&server.base_url, None, options(), fast_retry(1)).unwrap();
    let err = uploader
        .upload(item, ProgressReporter::discard())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Io(_)), "{:?}", err);
    assert_eq!(server.request_count(), 0);
}

#[test]
fn rejects_non_http_endpoints() {
    assert!(HttpPutUploader::new("ftp://example.com/", None, options(), fast_retry(1)).is_err());
    assert!(HttpPutUploader::new("not a url", None, options(), fast_retry(1)).is_err());
}

#[tokio::test]
async fn whole_batch_is_uploaded_through_scheduler() {
    let server = put_server::start();
    let dir = tempfile::tempdir().unwrap();
    let items: Vec<FileItem> = (0..8)
        .map(|i| write_file(dir.path(), &format!("f{i}.dat"), format!("file {i}").as_bytes()))
        .collect();

    let uploader = HttpPutUploader::new(&server.base_url, None, options(), fast_retry(2)).unwrap();
    let outcome = BatchScheduler::new(
        items,
        uploader,
        NoopObserver,
        DeviceTier::Mid,
        &SchedulerConfig::default(),
    )
    .run()
    .await;

    let receipts = match outcome {
        BatchOutcome::Succeeded(receipts) => receipts,
        other => panic!("expected success, got {:?}", other),
    };
    assert_eq!(receipts.len(), 8);

    let mut paths: Vec<String> = server.received().into_iter().map(|r| r.path).collect();
    paths.sort();
    let expected: Vec<String> = (0..8).map(|i| format!("/f{i}.dat")).collect();
    assert_eq!(paths, expected);
}

#[tokio::test]
async fn finished_file_reports_full_progress_before_settling() {
    let server = put_server::start();
    let dir = tempfile::tempdir().unwrap();
    let item = write_file(dir.path(), "only.bin", &[7u8; 4096]);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let uploader = HttpPutUploader::new(&server.base_url, None, options(), fast_retry(1)).unwrap();
    let outcome = BatchScheduler::new(
        vec![item],
        uploader,
        ChannelObserver::new(tx),
        DeviceTier::Low,
        &SchedulerConfig::default(),
    )
    .run()
    .await;
    assert!(outcome.is_success());

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let saw_full = events.iter().any(|e| match e {
        BatchEvent::Progress(rows) => rows
            .iter()
            .any(|r| r.name == "only.bin" && r.progress == 100),
        _ => false,
    });
    assert!(saw_full, "{:?}", events);
    assert_eq!(events.last(), Some(&BatchEvent::Succeeded { count: 1 }));
}
