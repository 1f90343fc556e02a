//! Scheduled publishing of short videos to YouTube.
//!
//! The pipeline takes an ordered list of local video files and, one at a time, derives a
//! title/description from the video's content, uploads it as a private video with a scheduled
//! publish time, deletes the local file, and records the slot it used so that the next run
//! continues where this one left off.
//!
//! The moving parts, leaf-first:
//!
//! - [`credentials::CredentialManager`] resolves an OAuth token (reuse, refresh, or interactive
//!   consent via [`oauth::OAuthManager`]) and hands out a [`youtube_api::YouTubeClient`].
//! - [`schedule::ScheduleCursor`] owns the durable "last scheduled date" record.
//! - [`metadata::MetadataGenerator`] runs [`media`] extraction, [`transcribe`] and [`ollama`]
//!   text generation, degrading to fixed fallbacks instead of failing.
//! - [`publish::PublishOrchestrator`] drives the batch and stops at the first failed upload.

pub mod config;
pub mod credentials;
mod error;
pub mod library;
pub mod media;
pub mod metadata;
pub mod oauth;
pub mod ollama;
pub mod publish;
mod record;
pub mod schedule;
pub mod transcribe;
pub mod youtube_api;

pub use config::Config;
pub use error::{BoxError, Error};
