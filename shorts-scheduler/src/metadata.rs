//! Title and description synthesis for a single video.
//!
//! The video's audio is transcribed and, together with its first frame, handed to a
//! text-generation model that is asked for a JSON object with a `title` and a `description`.
//! Generation never fails outward: when any step goes wrong the result degrades to one of two
//! fixed pairs, and [`MetadataOutcome`] says which step it was.

use crate::config::Config;
use crate::media::MediaExtractor;
use crate::ollama::TextGenerator;
use crate::transcribe::{self, Transcriber};
use eyre::Context;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Tag every description ends with.
pub const SHORTS_TAG: &str = "#shorts";

/// Used when generation ran but produced nothing usable.
const FALLBACK_A: (&str, &str) = ("Daily Short", "Cool video");

/// Used when generation itself failed.
const FALLBACK_B: (&str, &str) = ("Daily Upload", "Check this out!");

/// A title and description ready to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    title: String,
    description: String,
}

impl Metadata {
    /// Trims both parts and tags the description with exactly one [`SHORTS_TAG`].
    ///
    /// Words that already are the tag (in any case) are dropped first; other hashtags that merely
    /// start with it, like `#shortsfeed`, are kept. Whitespace between words collapses to single
    /// spaces.
    pub fn new(title: &str, description: &str) -> Self {
        let untagged = description
            .split_whitespace()
            .filter(|word| !word.eq_ignore_ascii_case(SHORTS_TAG))
            .collect::<Vec<_>>()
            .join(" ");
        let description = if untagged.is_empty() {
            SHORTS_TAG.to_string()
        } else {
            format!("{untagged} {SHORTS_TAG}")
        };
        Self {
            title: title.trim().to_string(),
            description,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Why generation fell back to a fixed pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// No frame could be read from the video.
    FrameUnavailable(String),
    /// The model answered with JSON that lacks `title` or `description`.
    MissingKeys,
    /// The scratch directory for intermediate files couldn't be created.
    Workspace(String),
    /// Audio extraction or speech-to-text failed.
    Transcription(String),
    /// The model couldn't be reached or its answer wasn't a usable JSON object.
    Synthesis(String),
}

impl FallbackReason {
    fn fallback(&self) -> Metadata {
        let (title, description) = match self {
            Self::FrameUnavailable(_) | Self::MissingKeys => FALLBACK_A,
            Self::Workspace(_) | Self::Transcription(_) | Self::Synthesis(_) => FALLBACK_B,
        };
        Metadata::new(title, description)
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameUnavailable(e) => write!(f, "no frame: {e}"),
            Self::MissingKeys => write!(f, "reply lacks title or description"),
            Self::Workspace(e) => write!(f, "no scratch space: {e}"),
            Self::Transcription(e) => write!(f, "transcription failed: {e}"),
            Self::Synthesis(e) => write!(f, "generation failed: {e}"),
        }
    }
}

/// What [`MetadataGenerator::generate`] came up with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    Generated(Metadata),
    Fallback {
        metadata: Metadata,
        reason: FallbackReason,
    },
}

impl MetadataOutcome {
    /// The fixed pair that goes with `reason`.
    pub fn fallback(reason: FallbackReason) -> Self {
        Self::Fallback {
            metadata: reason.fallback(),
            reason,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Self::Generated(metadata) | Self::Fallback { metadata, .. } => metadata,
        }
    }

    pub fn into_metadata(self) -> Metadata {
        match self {
            Self::Generated(metadata) | Self::Fallback { metadata, .. } => metadata,
        }
    }

    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Self::Generated(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Anything that can describe a video. Never fails; see [`MetadataOutcome`].
pub trait DescribeVideo {
    fn describe(&self, video: &Path) -> impl Future<Output = MetadataOutcome> + Send;
}

/// Substitutes the transcript into a prompt template.
pub fn build_prompt(template: &str, transcript: &str) -> String {
    template.replace("{transcript}", transcript)
}

/// Interprets the model's reply.
///
/// `Ok(None)` means the reply was a JSON object without both keys. Anything that isn't a JSON
/// object, or has non-string values for the keys, is an error.
pub fn parse_reply(reply: &str) -> eyre::Result<Option<(String, String)>> {
    let value: serde_json::Value = serde_json::from_str(reply).context("parse model reply")?;
    let object = value
        .as_object()
        .ok_or_else(|| eyre::eyre!("model reply is not a JSON object"))?;
    let (Some(title), Some(description)) = (object.get("title"), object.get("description")) else {
        return Ok(None);
    };
    let title = title
        .as_str()
        .ok_or_else(|| eyre::eyre!("title is not a string"))?;
    let description = description
        .as_str()
        .ok_or_else(|| eyre::eyre!("description is not a string"))?;
    Ok(Some((title.to_string(), description.to_string())))
}

/// Derives metadata from a video's content.
#[derive(Debug)]
pub struct MetadataGenerator<M, T, G> {
    media: M,
    transcriber: T,
    generator: G,
    work_dir: PathBuf,
    prompt: String,
}

impl<M, T, G> MetadataGenerator<M, T, G>
where
    M: MediaExtractor + Sync,
    T: Transcriber + Sync,
    G: TextGenerator + Sync,
{
    pub fn new(media: M, transcriber: T, generator: G, config: &Config) -> Self {
        Self {
            media,
            transcriber,
            generator,
            work_dir: config.work_dir.clone(),
            prompt: config.metadata.prompt.clone(),
        }
    }

    /// Produces a title and description for `video`.
    ///
    /// Intermediate files (frame, audio) are created in a scratch directory that is removed
    /// before this returns, whatever the outcome.
    #[tracing::instrument(skip(self, video), fields(video = %video.display()))]
    pub async fn generate(&self, video: &Path) -> MetadataOutcome {
        let outcome = match tempfile::Builder::new()
            .prefix("shorts-scheduler-")
            .tempdir_in(&self.work_dir)
        {
            Ok(scratch) => self.generate_in(video, scratch.path()).await,
            Err(e) => MetadataOutcome::fallback(FallbackReason::Workspace(e.to_string())),
        };

        match &outcome {
            MetadataOutcome::Generated(metadata) => {
                tracing::info!(title = metadata.title(), "generated metadata");
            }
            MetadataOutcome::Fallback { metadata, reason } => {
                tracing::warn!(%reason, title = metadata.title(), "using fallback metadata");
            }
        }
        outcome
    }

    async fn generate_in(&self, video: &Path, scratch: &Path) -> MetadataOutcome {
        let frame = scratch.join("frame.jpg");
        if let Err(e) = self.media.extract_frame(video, &frame).await {
            return MetadataOutcome::fallback(FallbackReason::FrameUnavailable(format!("{e:#}")));
        }

        let transcript = match self.transcript(video, scratch).await {
            Ok(transcript) => transcript,
            Err(e) => {
                return MetadataOutcome::fallback(FallbackReason::Transcription(format!("{e:#}")));
            }
        };
        tracing::debug!(%transcript, "transcribed video");

        let prompt = build_prompt(&self.prompt, &transcript);
        let reply = match self.generator.generate(&prompt, Some(&frame)).await {
            Ok(reply) => reply,
            Err(e) => return MetadataOutcome::fallback(FallbackReason::Synthesis(format!("{e:#}"))),
        };

        match parse_reply(&reply) {
            Ok(Some((title, description))) => {
                MetadataOutcome::Generated(Metadata::new(&title, &description))
            }
            Ok(None) => MetadataOutcome::fallback(FallbackReason::MissingKeys),
            Err(e) => MetadataOutcome::fallback(FallbackReason::Synthesis(format!("{e:#}"))),
        }
    }

    /// Extracts the audio track, transcribes it, and removes the audio file again.
    async fn transcript(&self, video: &Path, scratch: &Path) -> eyre::Result<String> {
        let audio = scratch.join("audio.wav");
        let segments = async {
            self.media
                .extract_audio(video, &audio)
                .await
                .context("extract audio track")?;
            self.transcriber
                .transcribe(&audio)
                .await
                .context("transcribe audio")
        }
        .await;

        if let Err(e) = tokio::fs::remove_file(&audio).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(audio = %audio.display(), error = %e, "could not remove audio");
            }
        }

        Ok(transcribe::join_segments(&segments?))
    }
}

impl<M, T, G> DescribeVideo for MetadataGenerator<M, T, G>
where
    M: MediaExtractor + Sync,
    T: Transcriber + Sync,
    G: TextGenerator + Sync,
{
    async fn describe(&self, video: &Path) -> MetadataOutcome {
        self.generate(video).await
    }
}
