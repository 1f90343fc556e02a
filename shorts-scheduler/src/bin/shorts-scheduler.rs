use clap::Parser;
use eyre::Context;
use shorts_scheduler::credentials::CredentialManager;
use shorts_scheduler::media::Ffmpeg;
use shorts_scheduler::metadata::MetadataGenerator;
use shorts_scheduler::oauth::{OAUTH_DONE_HTML, OAuthManager};
use shorts_scheduler::ollama::Ollama;
use shorts_scheduler::publish::PublishOrchestrator;
use shorts_scheduler::schedule::{self, ScheduleCursor};
use shorts_scheduler::transcribe::WhisperCpp;
use shorts_scheduler::{Config, library};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Rough processing time per video when the model runs on the CPU.
const CPU_MINUTES_PER_VIDEO: usize = 4;
/// Rough processing time per video when the model runs on a GPU.
const GPU_MINUTES_PER_VIDEO: usize = 1;

/// Upload a folder of short videos to YouTube, one scheduled day each.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON configuration file. Defaults are used for anything it leaves out.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory with the videos to publish (overrides the configuration).
    #[arg(long, value_name = "DIR")]
    videos: Option<PathBuf>,

    /// Show the schedule that would be used without authenticating or uploading.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())
        .await
        .context("load configuration")?;
    if let Some(videos) = args.videos {
        config.video_dir = videos;
    }

    let videos = library::discover_videos(&config.video_dir, &config.video_extensions)
        .await
        .context("find videos")?;
    if videos.is_empty() {
        tracing::info!(dir = %config.video_dir.display(), "no videos to publish");
        return Ok(());
    }
    tracing::info!(
        count = videos.len(),
        cpu_minutes = videos.len() * CPU_MINUTES_PER_VIDEO,
        gpu_minutes = videos.len() * GPU_MINUTES_PER_VIDEO,
        "found videos"
    );

    let cursor = ScheduleCursor::new(&config.state_file);

    if args.dry_run {
        let mut slot = cursor.next_slot().await.context("read schedule")?;
        for video in &videos {
            tracing::info!(
                path = %video.display(),
                publish_at = %schedule::publish_at(slot),
                "would schedule"
            );
            slot = schedule::following(slot)?;
        }
        return Ok(());
    }

    let http = reqwest::Client::new();

    let oauth = OAuthManager::new(config.oauth.client_credentials().await?, OAUTH_DONE_HTML);
    let youtube = CredentialManager::new(&config.token_file, oauth)
        .authenticated_client(http.clone())
        .await
        .context("authenticate with YouTube")?;

    let metadata = MetadataGenerator::new(
        Ffmpeg::new(&config.ffmpeg),
        WhisperCpp::new(&config.whisper),
        Ollama::new(&config.ollama, http),
        &config,
    );
    let orchestrator =
        PublishOrchestrator::new(metadata, youtube, cursor, &config.upload.category_id);
    let report = orchestrator.run(&videos).await?;

    for published in &report.published {
        tracing::info!(
            path = %published.path.display(),
            video_id = %published.video_id,
            publish_at = %schedule::publish_at(published.slot),
            title = %published.title,
            fallback = published.fallback,
            "published"
        );
    }
    if let Some(failure) = &report.failure {
        tracing::error!(
            path = %failure.path.display(),
            skipped = report.skipped.len(),
            error = %format!("{:#}", failure.error),
            "batch stopped early; remaining videos are left for the next run"
        );
    } else {
        tracing::info!(published = report.published.len(), "all videos scheduled");
    }

    Ok(())
}
