//! YouTube Videos API types.

use crate::metadata::Metadata;
use crate::schedule;
use jiff::civil::DateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Who can see a video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#status.privacyStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrivacyStatus {
    /// The video is public and can be viewed by anyone.
    Public,
    /// The video is unlisted and can only be viewed by people with the link.
    Unlisted,
    /// The video can only be viewed by the owner. Required for scheduled publishing.
    Private,
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Unlisted => write!(f, "unlisted"),
            Self::Private => write!(f, "private"),
        }
    }
}

/// Basic details about a video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#snippet>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
}

/// Upload, processing, and privacy status of a video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#status>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStatus {
    #[serde(rename = "privacyStatus")]
    pub privacy_status: PrivacyStatus,
    /// When a private video becomes public, as `YYYY-MM-DDTHH:MM:SSZ`.
    #[serde(rename = "publishAt", skip_serializing_if = "Option::is_none")]
    pub publish_at: Option<String>,
    #[serde(rename = "selfDeclaredMadeForKids", skip_serializing_if = "Option::is_none")]
    pub self_declared_made_for_kids: Option<bool>,
    /// Only present in responses.
    #[serde(rename = "uploadStatus", skip_serializing_if = "Option::is_none")]
    pub upload_status: Option<String>,
}

/// A `video` resource as returned by `videos.insert`.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    pub id: String,
    pub snippet: Option<VideoSnippet>,
    pub status: Option<VideoStatus>,
}

/// Everything needed to create one scheduled video.
///
/// Serializes to the `video` resource sent with the upload; the file itself is sent
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadRequest {
    snippet: VideoSnippet,
    status: VideoStatus,
    #[serde(skip)]
    path: PathBuf,
}

impl UploadRequest {
    /// A private video that YouTube publishes at `slot`, not made for kids.
    pub fn scheduled(
        metadata: &Metadata,
        path: impl Into<PathBuf>,
        slot: DateTime,
        category_id: &str,
    ) -> Self {
        Self {
            snippet: VideoSnippet {
                title: metadata.title().to_string(),
                description: metadata.description().to_string(),
                category_id: category_id.to_string(),
            },
            status: VideoStatus {
                privacy_status: PrivacyStatus::Private,
                publish_at: Some(schedule::publish_at(slot)),
                self_declared_made_for_kids: Some(false),
                upload_status: None,
            },
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snippet(&self) -> &VideoSnippet {
        &self.snippet
    }

    pub fn status(&self) -> &VideoStatus {
        &self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;
    use jiff::civil::date;

    #[test]
    fn scheduled_request_body() {
        let request = UploadRequest::scheduled(
            &Metadata::new("Heat Pumps Explained", "How heat moves uphill."),
            "videos/clip.mp4",
            date(2025, 3, 15).at(12, 0, 0, 0),
            "28",
        );

        assert_eq!(request.path(), Path::new("videos/clip.mp4"));
        assert_json_snapshot!(request, @r###"
        {
          "snippet": {
            "title": "Heat Pumps Explained",
            "description": "How heat moves uphill. #shorts",
            "categoryId": "28"
          },
          "status": {
            "privacyStatus": "private",
            "publishAt": "2025-03-15T12:00:00Z",
            "selfDeclaredMadeForKids": false
          }
        }
        "###);
    }

    #[test]
    fn deserialize_insert_response() {
        let json = r#"{
            "kind": "youtube#video",
            "etag": "abc",
            "id": "dQw4w9WgXcQ",
            "snippet": {"title": "T", "description": "D #shorts", "categoryId": "28", "channelId": "UC1"},
            "status": {"uploadStatus": "uploaded", "privacyStatus": "private", "publishAt": "2025-03-15T12:00:00Z"}
        }"#;

        let video: Video = serde_json::from_str(json).unwrap();
        assert_eq!(video.id, "dQw4w9WgXcQ");
        let status = video.status.unwrap();
        assert_eq!(status.privacy_status, PrivacyStatus::Private);
        assert_eq!(status.upload_status.as_deref(), Some("uploaded"));
        assert_eq!(status.publish_at.as_deref(), Some("2025-03-15T12:00:00Z"));
    }
}
