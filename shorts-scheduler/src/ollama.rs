//! Text generation through a local [Ollama](https://ollama.com) server.

use crate::config::OllamaConfig;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use tracing::instrument;

pub trait TextGenerator {
    /// Sends `prompt` (and optionally an image) to the model and returns its reply verbatim.
    ///
    /// The model is asked to answer with JSON only, but nothing here checks that it did.
    fn generate(
        &self,
        prompt: &str,
        image: Option<&Path>,
    ) -> impl Future<Output = eyre::Result<String>> + Send;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    format: &'static str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    num_gpu: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

/// Client for Ollama's `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct Ollama {
    base_url: String,
    model: String,
    num_gpu: Option<u32>,
    client: reqwest::Client,
}

impl Ollama {
    pub fn new(config: &OllamaConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            num_gpu: config.num_gpu,
            client,
        }
    }
}

impl TextGenerator for Ollama {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str, image: Option<&Path>) -> eyre::Result<String> {
        let mut images = Vec::new();
        if let Some(image) = image {
            let bytes = tokio::fs::read(image)
                .await
                .with_context(|| format!("read {}", image.display()))?;
            images.push(STANDARD.encode(bytes));
        }

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
                images,
            }],
            format: "json",
            stream: false,
            options: self.num_gpu.map(|num_gpu| ChatOptions { num_gpu }),
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("send chat request to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            eyre::bail!("Ollama chat request failed with status {status}: {error_text}");
        }

        let response: ChatResponse = response
            .json()
            .await
            .context("parse Ollama chat response as JSON")?;
        tracing::debug!(reply = %response.message.content, "model replied");
        Ok(response.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ollama(server: &MockServer, num_gpu: Option<u32>) -> Ollama {
        Ollama::new(
            &OllamaConfig {
                base_url: format!("{}/", server.uri()),
                model: "qwen3-vl:2b".to_string(),
                num_gpu,
            },
            reqwest::Client::new(),
        )
    }

    #[tokio::test]
    async fn sends_prompt_and_image_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "qwen3-vl:2b",
                "format": "json",
                "stream": false,
                "options": {"num_gpu": 99},
                "messages": [{
                    "role": "user",
                    "content": "describe this",
                    "images": [STANDARD.encode(b"jpeg bytes")],
                }],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "qwen3-vl:2b",
                "message": {"role": "assistant", "content": "{\"title\": \"T\"}"},
                "done": true,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame.jpg");
        std::fs::write(&frame, b"jpeg bytes").unwrap();

        let reply = ollama(&server, Some(99))
            .generate("describe this", Some(&frame))
            .await
            .unwrap();
        assert_eq!(reply, r#"{"title": "T"}"#);
    }

    #[tokio::test]
    async fn server_error_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let err = ollama(&server, None).generate("hi", None).await.unwrap_err();
        assert!(format!("{err:#}").contains("model not found"), "{err:#}");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let server = MockServer::start().await;
        let generator = ollama(&server, None);
        drop(server);

        assert!(generator.generate("hi", None).await.is_err());
    }
}
