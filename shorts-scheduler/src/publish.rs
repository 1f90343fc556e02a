//! Publishing a batch of videos, one scheduled day each.

use crate::Error;
use crate::metadata::DescribeVideo;
use crate::schedule::ScheduleCursor;
use crate::youtube_api::{UploadRequest, VideoUploader};
use eyre::Context;
use jiff::civil::DateTime;
use std::path::{Path, PathBuf};

/// A video that was uploaded and scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVideo {
    pub path: PathBuf,
    pub video_id: String,
    pub slot: DateTime,
    pub title: String,
    /// Whether the title and description came from a fallback instead of the model.
    pub fallback: bool,
}

/// The video that ended the batch.
#[derive(Debug)]
pub struct PublishFailure {
    pub path: PathBuf,
    pub slot: DateTime,
    /// Set when the upload itself went through but cleanup afterwards did not.
    pub video_id: Option<String>,
    pub error: eyre::Report,
}

/// What happened to each video handed to [`PublishOrchestrator::run`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub published: Vec<PublishedVideo>,
    pub failure: Option<PublishFailure>,
    /// Videos after the failed one, in order. They were not touched.
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Drives metadata generation, upload, cleanup and the schedule cursor for a batch.
#[derive(Debug)]
pub struct PublishOrchestrator<D, U> {
    metadata: D,
    uploader: U,
    cursor: ScheduleCursor,
    category_id: String,
}

impl<D, U> PublishOrchestrator<D, U>
where
    D: DescribeVideo,
    U: VideoUploader,
{
    pub fn new(
        metadata: D,
        uploader: U,
        cursor: ScheduleCursor,
        category_id: impl Into<String>,
    ) -> Self {
        Self {
            metadata,
            uploader,
            cursor,
            category_id: category_id.into(),
        }
    }

    /// Publishes `videos` in order, giving each the next free day.
    ///
    /// The batch stops at the first video that can't be published; that video's file is kept
    /// and the cursor is left at the last successful slot. Only problems with the schedule
    /// state before the first upload are returned as `Err`.
    pub async fn run(&self, videos: &[PathBuf]) -> Result<BatchReport, Error> {
        let mut report = BatchReport::default();
        let mut slot = self.cursor.next_slot().await?;
        tracing::info!(videos = videos.len(), first_slot = %slot, "starting batch");

        for (i, video) in videos.iter().enumerate() {
            match self.publish_one(video, slot).await {
                Ok((published, next)) => {
                    report.published.push(published);
                    slot = next;
                }
                Err((video_id, error)) => {
                    tracing::error!(
                        path = %video.display(),
                        %slot,
                        error = %format!("{error:#}"),
                        "publishing failed, stopping batch"
                    );
                    report.failure = Some(PublishFailure {
                        path: video.clone(),
                        slot,
                        video_id,
                        error,
                    });
                    report.skipped = videos[i + 1..].to_vec();
                    break;
                }
            }
        }

        Ok(report)
    }

    /// On failure, also returns the video ID if the upload had already succeeded.
    #[tracing::instrument(skip(self, video), fields(path = %video.display(), %slot))]
    async fn publish_one(
        &self,
        video: &Path,
        slot: DateTime,
    ) -> Result<(PublishedVideo, DateTime), (Option<String>, eyre::Report)> {
        let outcome = self.metadata.describe(video).await;
        let fallback = outcome.fallback_reason().is_some();
        let metadata = outcome.into_metadata();

        let request = UploadRequest::scheduled(&metadata, video, slot, &self.category_id);
        let uploaded = self
            .uploader
            .upload(request)
            .await
            .with_context(|| format!("upload {}", video.display()))
            .map_err(|e| (None, e))?;
        tracing::info!(video_id = %uploaded.id, "scheduled video");

        let cleanup = async {
            tokio::fs::remove_file(video)
                .await
                .with_context(|| format!("delete {}", video.display()))?;
            self.cursor
                .advance_and_persist(slot)
                .await
                .context("record scheduled slot")
        };
        let next = cleanup.await.map_err(|e| (Some(uploaded.id.clone()), e))?;

        Ok((
            PublishedVideo {
                path: video.to_path_buf(),
                video_id: uploaded.id,
                slot,
                title: metadata.title().to_string(),
                fallback,
            },
            next,
        ))
    }
}
