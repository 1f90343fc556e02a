//! Run configuration.
//!
//! Everything that used to be a module-level constant (folders, model names, the prompt) lives
//! in [`Config`], which is handed to each component when it is constructed.

use crate::Error;
use crate::record;
use eyre::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Instructions sent to the text-generation model. `{transcript}` is replaced with the
/// transcript of the video being described.
pub const DEFAULT_PROMPT: &str = r#"Analyze the image and the transcript below.
TRANSCRIPT: "{transcript}"

INSTRUCTIONS:
1. The transcript contains the actual topic. Use it as your primary source.
2. The image only shows the visual style.
3. Create a viral YouTube Shorts title and a one-sentence description.

OUTPUT FORMAT (valid JSON only):
{"title": "[Topic] Tips/Tricks/Hacks or Explaining [Topic]", "description": "Explaining how [topic] works with tips."}"#;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for videos to publish.
    pub video_dir: PathBuf,
    /// File extensions (without the dot, case-insensitive) that count as videos.
    pub video_extensions: Vec<String>,
    /// Directory under which per-video scratch directories are created.
    pub work_dir: PathBuf,
    /// Where the last scheduled publish date is recorded.
    pub state_file: PathBuf,
    /// Where the OAuth token is recorded.
    pub token_file: PathBuf,
    pub oauth: OAuthConfig,
    pub ffmpeg: FfmpegConfig,
    pub whisper: WhisperConfig,
    pub ollama: OllamaConfig,
    pub metadata: MetadataConfig,
    pub upload: UploadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            video_dir: PathBuf::from("videos"),
            video_extensions: vec!["mp4".to_string(), "mov".to_string()],
            work_dir: std::env::temp_dir(),
            state_file: PathBuf::from("schedule_state.json"),
            token_file: PathBuf::from("tokens.json"),
            oauth: OAuthConfig::default(),
            ffmpeg: FfmpegConfig::default(),
            whisper: WhisperConfig::default(),
            ollama: OllamaConfig::default(),
            metadata: MetadataConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from a JSON file, or the defaults if no file is given.
    pub async fn load(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let bytes = record::read(path)
            .await
            .map_err(|e| Error::io("read configuration", e))?
            .ok_or_else(|| {
                Error::io(
                    "read configuration",
                    eyre::eyre!("{} does not exist", path.display()),
                )
            })?;
        record::parse(&bytes).map_err(|e| Error::configuration(path, e))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Google's installed-app client file, used when `client_id` is not given inline.
    pub client_secrets_file: PathBuf,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_secrets_file: PathBuf::from("client_secrets.json"),
            client_id: None,
            client_secret: None,
            auth_uri: crate::oauth::AUTH_URL.to_string(),
            token_uri: crate::oauth::TOKEN_URL.to_string(),
        }
    }
}

/// The OAuth client the user registered in the Google Cloud console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_uri: String,
    pub token_uri: String,
}

/// Shape of the `client_secrets.json` file Google hands out for installed (or web) apps.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    #[serde(alias = "web")]
    installed: ClientSecretsEntry,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsEntry {
    client_id: String,
    client_secret: Option<String>,
    auth_uri: Option<String>,
    token_uri: Option<String>,
}

impl OAuthConfig {
    /// Resolves the OAuth client, reading `client_secrets_file` unless the id is set inline.
    pub async fn client_credentials(&self) -> Result<ClientCredentials, Error> {
        if let Some(client_id) = &self.client_id {
            return Ok(ClientCredentials {
                client_id: client_id.clone(),
                client_secret: self.client_secret.clone(),
                auth_uri: self.auth_uri.clone(),
                token_uri: self.token_uri.clone(),
            });
        }

        let path = &self.client_secrets_file;
        let bytes = record::read(path)
            .await
            .map_err(Error::auth)?
            .ok_or_else(|| {
                Error::auth(eyre::eyre!(
                    "no OAuth client configured and {} does not exist",
                    path.display()
                ))
            })?;
        let file: ClientSecretsFile = record::parse(&bytes)
            .with_context(|| format!("parse {}", path.display()))
            .map_err(Error::auth)?;
        let entry = file.installed;
        Ok(ClientCredentials {
            client_id: entry.client_id,
            client_secret: entry.client_secret.or_else(|| self.client_secret.clone()),
            auth_uri: entry.auth_uri.unwrap_or_else(|| self.auth_uri.clone()),
            token_uri: entry.token_uri.unwrap_or_else(|| self.token_uri.clone()),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub binary: PathBuf,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// The whisper.cpp command line tool.
    pub binary: PathBuf,
    /// A ggml model file. The `base` model is plenty for getting the topic of a short.
    pub model: PathBuf,
    pub threads: u16,
    pub beam_size: u8,
    pub language: String,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("whisper-cli"),
            model: PathBuf::from("models/ggml-base.bin"),
            threads: 4,
            beam_size: 5,
            language: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    /// Must be a vision model, since the request carries a frame of the video.
    pub model: String,
    /// Forwarded as the `num_gpu` option; `None` leaves the choice to Ollama.
    pub num_gpu: Option<u32>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "qwen3-vl:2b".to_string(),
            num_gpu: Some(99),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub prompt: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// YouTube video category; 28 is "Science & Technology".
    pub category_id: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            category_id: "28".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_script_layout() {
        let config = Config::default();
        assert_eq!(config.video_dir, PathBuf::from("videos"));
        assert_eq!(config.state_file, PathBuf::from("schedule_state.json"));
        assert_eq!(config.video_extensions, ["mp4", "mov"]);
        assert_eq!(config.ollama.model, "qwen3-vl:2b");
        assert_eq!(config.upload.category_id, "28");
        assert!(config.metadata.prompt.contains("{transcript}"));
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"video_dir": "clips", "ollama": {"model": "llava"}}"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).await.unwrap();
        assert_eq!(config.video_dir, PathBuf::from("clips"));
        assert_eq!(config.ollama.model, "llava");
        assert_eq!(config.ollama.base_url, "http://127.0.0.1:11434");
        assert_eq!(config.whisper.beam_size, 5);
    }

    #[tokio::test]
    async fn malformed_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"video_dir": 12}"#).unwrap();

        let err = Config::load(Some(&path)).await.unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn reads_installed_client_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_secrets.json");
        std::fs::write(
            &path,
            r#"{"installed": {
                "client_id": "abc.apps.googleusercontent.com",
                "client_secret": "shh",
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token",
                "redirect_uris": ["http://localhost"]
            }}"#,
        )
        .unwrap();

        let oauth = OAuthConfig {
            client_secrets_file: path,
            ..OAuthConfig::default()
        };
        let credentials = oauth.client_credentials().await.unwrap();
        assert_eq!(
            credentials,
            ClientCredentials {
                client_id: "abc.apps.googleusercontent.com".to_string(),
                client_secret: Some("shh".to_string()),
                auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
                token_uri: "https://oauth2.googleapis.com/token".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn inline_client_id_skips_secrets_file() {
        let oauth = OAuthConfig {
            client_secrets_file: PathBuf::from("/definitely/not/here.json"),
            client_id: Some("inline".to_string()),
            ..OAuthConfig::default()
        };
        let credentials = oauth.client_credentials().await.unwrap();
        assert_eq!(credentials.client_id, "inline");
        assert_eq!(credentials.token_uri, crate::oauth::TOKEN_URL);
    }

    #[tokio::test]
    async fn missing_client_secrets_is_an_auth_error() {
        let oauth = OAuthConfig {
            client_secrets_file: PathBuf::from("/definitely/not/here.json"),
            ..OAuthConfig::default()
        };
        let err = oauth.client_credentials().await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)), "{err:?}");
    }
}
