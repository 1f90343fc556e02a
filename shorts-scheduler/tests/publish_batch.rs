use jiff::ToSpan;
use jiff::civil::{DateTime, date};
use pretty_assertions::assert_eq;
use shorts_scheduler::metadata::{DescribeVideo, Metadata, MetadataOutcome};
use shorts_scheduler::publish::PublishOrchestrator;
use shorts_scheduler::schedule::ScheduleCursor;
use shorts_scheduler::youtube_api::{UploadRequest, Video, VideoUploader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

struct TitledByName;

impl DescribeVideo for TitledByName {
    async fn describe(&self, video: &Path) -> MetadataOutcome {
        let name = video.file_stem().unwrap().to_string_lossy();
        MetadataOutcome::Generated(Metadata::new(&name, "A short."))
    }
}

/// Accepts every upload except the `fail_on`th (1-based).
struct Uploads {
    fail_on: Option<usize>,
    seen: Mutex<Vec<(PathBuf, String)>>,
}

impl Uploads {
    fn failing_on(fail_on: Option<usize>) -> Self {
        Self {
            fail_on,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl VideoUploader for Uploads {
    async fn upload(&self, request: UploadRequest) -> eyre::Result<Video> {
        let mut seen = self.seen.lock().unwrap();
        seen.push((
            request.path().to_path_buf(),
            request.status().publish_at.clone().unwrap(),
        ));
        if Some(seen.len()) == self.fail_on {
            eyre::bail!("HTTP 500 from upload endpoint");
        }
        Ok(Video {
            id: format!("vid-{}", seen.len()),
            snippet: None,
            status: None,
        })
    }
}

struct Batch {
    dir: tempfile::TempDir,
    videos: Vec<PathBuf>,
}

impl Batch {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let videos: Vec<_> = ["one.mp4", "two.mp4", "three.mov"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                std::fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect();
        Self { dir, videos }
    }

    async fn cursor_after(&self, last: DateTime) -> ScheduleCursor {
        let cursor = ScheduleCursor::new(self.dir.path().join("schedule_state.json"));
        cursor.advance_and_persist(last).await.unwrap();
        cursor
    }

    fn recorded(&self) -> DateTime {
        let json = std::fs::read(self.dir.path().join("schedule_state.json")).unwrap();
        let state: serde_json::Value = serde_json::from_slice(&json).unwrap();
        state["last_scheduled_date"].as_str().unwrap().parse().unwrap()
    }
}

#[tokio::test]
async fn all_succeed() {
    let batch = Batch::new();
    let cursor = batch.cursor_after(date(2025, 3, 14).at(12, 0, 0, 0)).await;
    let orchestrator =
        PublishOrchestrator::new(TitledByName, Uploads::failing_on(None), cursor, "28");

    let report = orchestrator.run(&batch.videos).await.unwrap();

    assert!(report.is_complete());
    assert!(report.skipped.is_empty());
    let slots: Vec<_> = report.published.iter().map(|p| p.slot).collect();
    assert_eq!(
        slots,
        [
            date(2025, 3, 15).at(12, 0, 0, 0),
            date(2025, 3, 16).at(12, 0, 0, 0),
            date(2025, 3, 17).at(12, 0, 0, 0),
        ]
    );
    let ids: Vec<_> = report.published.iter().map(|p| p.video_id.as_str()).collect();
    assert_eq!(ids, ["vid-1", "vid-2", "vid-3"]);
    assert_eq!(report.published[2].title, "three");

    for video in &batch.videos {
        assert!(!video.exists(), "{} still exists", video.display());
    }
    assert_eq!(batch.recorded(), date(2025, 3, 17).at(12, 0, 0, 0));
}

#[tokio::test]
async fn second_upload_fails() {
    let batch = Batch::new();
    let cursor = batch.cursor_after(date(2025, 3, 14).at(12, 0, 0, 0)).await;
    let uploads = Uploads::failing_on(Some(2));
    let orchestrator = PublishOrchestrator::new(TitledByName, uploads, cursor, "28");

    let report = orchestrator.run(&batch.videos).await.unwrap();

    assert_eq!(report.published.len(), 1);
    assert_eq!(report.published[0].path, batch.videos[0]);
    let failure = report.failure.expect("batch should have stopped");
    assert_eq!(failure.path, batch.videos[1]);
    assert_eq!(failure.slot, date(2025, 3, 16).at(12, 0, 0, 0));
    assert_eq!(failure.video_id, None);
    assert!(format!("{:#}", failure.error).contains("HTTP 500"));
    assert_eq!(report.skipped, [batch.videos[2].clone()]);

    assert!(!batch.videos[0].exists());
    assert!(batch.videos[1].exists());
    assert!(batch.videos[2].exists());
    assert_eq!(batch.recorded(), date(2025, 3, 15).at(12, 0, 0, 0));
}

#[tokio::test]
async fn first_run_starts_today_and_next_run_continues() {
    let batch = Batch::new();
    let state = batch.dir.path().join("schedule_state.json");

    let first = PublishOrchestrator::new(
        TitledByName,
        Uploads::failing_on(Some(2)),
        ScheduleCursor::new(&state),
        "28",
    );
    let report = first.run(&batch.videos).await.unwrap();
    let today = jiff::Zoned::now().date().at(12, 0, 0, 0);
    assert_eq!(report.published[0].slot, today);

    let second = PublishOrchestrator::new(
        TitledByName,
        Uploads::failing_on(None),
        ScheduleCursor::new(&state),
        "28",
    );
    let report = second.run(&batch.videos[1..]).await.unwrap();
    let slots: Vec<_> = report.published.iter().map(|p| p.slot).collect();
    assert_eq!(
        slots,
        [
            today.checked_add(24.hours()).unwrap(),
            today.checked_add(48.hours()).unwrap(),
        ]
    );
}
