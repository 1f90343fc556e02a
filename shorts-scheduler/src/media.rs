//! Pulling audio and a still frame out of a video with `ffmpeg`.

use crate::config::FfmpegConfig;
use eyre::Context;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Extracts the artifacts metadata generation needs from a video file.
pub trait MediaExtractor {
    /// Writes the video's audio track to `dest` as 16 kHz mono WAV.
    fn extract_audio(
        &self,
        video: &Path,
        dest: &Path,
    ) -> impl Future<Output = eyre::Result<()>> + Send;

    /// Writes the first frame of the video to `dest` as a JPEG.
    fn extract_frame(
        &self,
        video: &Path,
        dest: &Path,
    ) -> impl Future<Output = eyre::Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    binary: PathBuf,
}

impl Ffmpeg {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            binary: config.binary.clone(),
        }
    }

    /// `ffmpeg` reading `video`, with the flags every invocation shares.
    fn command(&self, video: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-nostdin", "-y", "-loglevel", "error", "-i"])
            .arg(video)
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, what: &str, mut cmd: Command, dest: &Path) -> eyre::Result<()> {
        let output = cmd
            .arg(dest)
            .output()
            .await
            .with_context(|| format!("spawn {} (is it installed?)", self.binary.display()))?;

        if !output.status.success() {
            eyre::bail!(
                "ffmpeg could not {what} ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        // ffmpeg happily exits 0 without writing anything when there is no matching stream
        let written = tokio::fs::metadata(dest)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !written {
            eyre::bail!("ffmpeg could not {what}: no output produced");
        }
        Ok(())
    }
}

impl MediaExtractor for Ffmpeg {
    #[tracing::instrument(skip(self), level = tracing::Level::DEBUG)]
    async fn extract_audio(&self, video: &Path, dest: &Path) -> eyre::Result<()> {
        let mut cmd = self.command(video);
        cmd.args(["-vn", "-ac", "1", "-ar", "16000", "-c:a", "pcm_s16le"]);
        self.run("extract audio", cmd, dest).await
    }

    #[tracing::instrument(skip(self), level = tracing::Level::DEBUG)]
    async fn extract_frame(&self, video: &Path, dest: &Path) -> eyre::Result<()> {
        let mut cmd = self.command(video);
        cmd.args(["-frames:v", "1", "-q:v", "2"]);
        self.run("extract a frame", cmd, dest).await
    }
}
