//! Client for the parts of the YouTube Data API v3 needed to publish videos.
//!
//! Uploads go through the resumable protocol of `videos.insert`: a first request carries the
//! video resource (title, description, privacy, publish time) and returns an upload session
//! URL, a second request sends the bytes to that URL and returns the created [`Video`].
//!
//! Scheduling only works for private videos; YouTube flips them to public at `publishAt`.

pub mod client;
pub mod videos;

pub use client::{VideoUploader, YouTubeClient};
pub use videos::{PrivacyStatus, UploadRequest, Video, VideoSnippet, VideoStatus};
