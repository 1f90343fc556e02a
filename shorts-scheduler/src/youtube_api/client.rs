//! Authenticated access to the YouTube Data API.

use crate::credentials::{LiveCredential, TokenSource};
use crate::oauth::OAuthManager;
use crate::youtube_api::videos::{UploadRequest, Video};
use eyre::Context;
use http::Method;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::instrument;

/// Endpoint for media uploads to `videos.insert`.
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Something that can create a video from an [`UploadRequest`].
pub trait VideoUploader {
    /// Uploads the request's file with its metadata and returns the created video.
    fn upload(&self, request: UploadRequest) -> impl Future<Output = eyre::Result<Video>> + Send;
}

/// Client for the YouTube Data API v3.
///
/// Every request asks the shared [`LiveCredential`] for its access token, so a token that
/// expires during a long batch is refreshed before the next request goes out.
#[derive(Debug)]
pub struct YouTubeClient<S = OAuthManager> {
    credential: Arc<LiveCredential<S>>,
    upload_url: String,
    client: reqwest::Client,
}

impl<S> Clone for YouTubeClient<S> {
    fn clone(&self) -> Self {
        Self {
            credential: Arc::clone(&self.credential),
            upload_url: self.upload_url.clone(),
            client: self.client.clone(),
        }
    }
}

impl<S: TokenSource> YouTubeClient<S> {
    pub fn new(credential: LiveCredential<S>, client: reqwest::Client) -> Self {
        Self {
            credential: Arc::new(credential),
            upload_url: UPLOAD_URL.to_string(),
            client,
        }
    }

    pub fn credential(&self) -> &LiveCredential<S> {
        &self.credential
    }

    /// Sends uploads somewhere other than Google, e.g. a local test server.
    pub fn with_upload_url(mut self, upload_url: impl Into<String>) -> Self {
        self.upload_url = upload_url.into();
        self
    }

    /// Sends a request with the bearer token attached and turns non-2xx answers into errors.
    ///
    /// # Arguments
    ///
    /// * `method` - The HTTP method to use
    /// * `url` - The API endpoint URL
    /// * `build` - Adds query parameters, headers and body to the request
    #[instrument(skip(self, build), level = tracing::Level::TRACE)]
    pub(crate) async fn make_authenticated_request(
        &self,
        method: Method,
        url: &str,
        build: impl FnOnce(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    ) -> eyre::Result<reqwest::Response> {
        let access_token = self
            .credential
            .fresh_access_token()
            .await
            .context("get fresh access token")?;
        let request = self
            .client
            .request(method.clone(), url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"));

        let response = build(request)
            .send()
            .await
            .with_context(|| format!("send {method} request to YouTube API: {url}"))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(eyre::eyre!(
                "YouTube API {} request failed with status {}: {}",
                method,
                status_code,
                error_text
            ));
        }

        Ok(response)
    }

    /// Creates a video using the resumable upload protocol.
    ///
    /// The first request sends the video resource and returns an upload session URL in its
    /// `Location` header; the second sends the file to that URL and returns the new video.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.upload`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/videos/insert>
    #[instrument(skip(self, request), fields(path = %request.path().display()))]
    pub async fn insert_video(&self, request: UploadRequest) -> eyre::Result<Video> {
        let path = request.path();
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("open {}", path.display()))?;
        let len = file
            .metadata()
            .await
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        let content_type = content_type_for(path);

        let session = self
            .make_authenticated_request(Method::POST, &self.upload_url, |r| {
                r.query(&[("uploadType", "resumable"), ("part", "snippet,status")])
                    .header("X-Upload-Content-Type", content_type)
                    .header("X-Upload-Content-Length", len)
                    .json(&request)
            })
            .await
            .context("start resumable upload")?;
        let session_url = session
            .headers()
            .get(LOCATION)
            .ok_or_else(|| eyre::eyre!("YouTube did not return an upload session URL"))?
            .to_str()
            .context("read upload session URL")?
            .to_string();
        tracing::debug!(bytes = len, "upload session started");

        let response = self
            .make_authenticated_request(Method::PUT, &session_url, |r| {
                r.header(CONTENT_TYPE, content_type)
                    .header(CONTENT_LENGTH, len)
                    .body(reqwest::Body::from(file))
            })
            .await
            .context("send video bytes")?;

        let video: Video = response
            .json()
            .await
            .context("parse YouTube API videos.insert response as JSON")?;

        tracing::info!(video_id = %video.id, "uploaded video");
        Ok(video)
    }
}

impl<S: TokenSource + Send + Sync> VideoUploader for YouTubeClient<S> {
    async fn upload(&self, request: UploadRequest) -> eyre::Result<Video> {
        self.insert_video(request).await
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}
