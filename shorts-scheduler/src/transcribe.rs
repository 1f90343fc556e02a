//! Speech-to-text with a local whisper.cpp model.
//!
//! The model runs on the CPU through the `whisper-cli` tool, which writes its result as JSON
//! next to the audio file. Only the segment texts and their offsets are used.

use crate::config::WhisperConfig;
use eyre::Context;
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// One timed piece of a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

pub trait Transcriber {
    /// Transcribes an audio file into ordered segments.
    fn transcribe(&self, audio: &Path)
    -> impl Future<Output = eyre::Result<Vec<Segment>>> + Send;
}

/// Joins segment texts into a single transcript, separated by single spaces.
pub fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    transcription: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    offsets: WhisperOffsets,
    text: String,
}

/// Milliseconds from the start of the audio.
#[derive(Debug, Deserialize)]
struct WhisperOffsets {
    from: u64,
    to: u64,
}

fn parse_output(json: &[u8]) -> eyre::Result<Vec<Segment>> {
    let output: WhisperOutput = serde_json::from_slice(json).context("parse whisper output")?;
    Ok(output
        .transcription
        .into_iter()
        .map(|s| Segment {
            start: Duration::from_millis(s.offsets.from),
            end: Duration::from_millis(s.offsets.to),
            text: s.text,
        })
        .collect())
}

/// Runs `whisper-cli` with a fixed model, CPU only.
#[derive(Debug, Clone)]
pub struct WhisperCpp {
    binary: PathBuf,
    model: PathBuf,
    threads: u16,
    beam_size: u8,
    language: String,
}

impl WhisperCpp {
    pub fn new(config: &WhisperConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            model: config.model.clone(),
            threads: config.threads,
            beam_size: config.beam_size,
            language: config.language.clone(),
        }
    }
}

impl Transcriber for WhisperCpp {
    #[tracing::instrument(skip(self), level = tracing::Level::DEBUG)]
    async fn transcribe(&self, audio: &Path) -> eyre::Result<Vec<Segment>> {
        // whisper-cli appends ".json" to this prefix
        let prefix = audio.with_extension("");
        let json_path = audio.with_extension("json");

        let output = Command::new(&self.binary)
            .arg("--model")
            .arg(&self.model)
            .arg("--file")
            .arg(audio)
            .arg("--threads")
            .arg(self.threads.to_string())
            .arg("--beam-size")
            .arg(self.beam_size.to_string())
            .arg("--language")
            .arg(&self.language)
            .args(["--no-gpu", "--no-prints", "--output-json", "--output-file"])
            .arg(&prefix)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("spawn {} (is it installed?)", self.binary.display()))?;

        let result = if output.status.success() {
            match tokio::fs::read(&json_path).await {
                Ok(json) => parse_output(&json),
                Err(e) => Err(e).with_context(|| format!("read {}", json_path.display())),
            }
        } else {
            Err(eyre::eyre!(
                "whisper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        };

        let _ = tokio::fs::remove_file(&json_path).await;
        let segments = result?;
        tracing::debug!(segments = segments.len(), "transcribed audio");
        Ok(segments)
    }
}
