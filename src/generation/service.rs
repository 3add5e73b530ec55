// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Generation service client
//!
//! The remote service exposes `POST /generate`, streaming SSE-style
//! `data:` lines of `{"text": ...}` fragments terminated by `[DONE]`.
//! Failures are reported in-band as fragments prefixed with `Error:` so
//! the consumer loop has a single code path for terminal conditions.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::GenerationConfig;
use crate::error::{Result, SageError};

/// Sending half of a generation's fragment channel.
pub type FragmentSender = mpsc::UnboundedSender<String>;

/// One generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Raw image bytes, in conversation order.
    pub images: Vec<Vec<u8>>,
    pub config: GenerationConfig,
}

/// The remote inference contract consumed by the engine.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Stream a generation into `sender`. Implementations must return
    /// only after they are done writing; dropping `sender` closes the
    /// stream for the consumer. Errors are sent as `Error:` fragments.
    async fn generate(
        &self,
        request: GenerationRequest,
        sender: FragmentSender,
        cancel: CancellationToken,
    );

    /// One-shot, non-streaming generation (titles, summaries).
    async fn generate_once(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct FragmentPayload {
    #[serde(default)]
    text: String,
}

/// HTTP client for the remote generation service.
pub struct HttpGenerationService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGenerationService {
    pub fn new(addr: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: addr.trim_end_matches('/').to_string(),
        }
    }

    fn request_body(prompt: &str, images: &[Vec<u8>], config: &GenerationConfig, stream: bool) -> serde_json::Value {
        use base64::Engine as _;
        let encoded: Vec<String> = images
            .iter()
            .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes))
            .collect();
        json!({
            "prompt": prompt,
            "model_code": config.model,
            "stream": stream,
            "images": encoded,
            "config": {
                "temperature": config.temperature,
                "top_p": config.top_p,
                "top_k": config.top_k,
                "output_length": config.output_length,
            },
        })
    }

    /// Run the streaming request, forwarding fragments. Split out so the
    /// cancellation select in `generate` stays readable.
    async fn stream_generation(
        &self,
        request: &GenerationRequest,
        sender: &FragmentSender,
    ) -> std::result::Result<(), String> {
        let body = Self::request_body(&request.prompt, &request.images, &request.config, true);
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Failed to connect to server: {}", e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("Server returned {}: {}", status, text));
        }

        let mut bytes = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| format!("Stream interrupted: {}", e))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                let line = line.trim_end();
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    return Ok(());
                }
                let Ok(payload) = serde_json::from_str::<FragmentPayload>(data) else {
                    continue;
                };
                if !payload.text.is_empty() && sender.send(payload.text).is_err() {
                    // Consumer went away; stop reading.
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn generate(
        &self,
        request: GenerationRequest,
        sender: FragmentSender,
        cancel: CancellationToken,
    ) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            result = self.stream_generation(&request, &sender) => {
                if let Err(message) = result {
                    let _ = sender.send(format!("Error: {}", message));
                }
            }
        }
        // Dropping `sender` here closes the stream for the consumer.
    }

    async fn generate_once(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let body = Self::request_body(prompt, &[], config, false);
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(SageError::Generation(format!(
                "server returned {}: {}",
                status, text
            )));
        }

        let payload: FragmentPayload = response.json().await?;
        Ok(payload.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let service = HttpGenerationService::new("http://localhost:8000/");
        assert_eq!(service.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_request_body_shape() {
        let config = GenerationConfig::default();
        let body = HttpGenerationService::request_body("hi", &[vec![1, 2, 3]], &config, true);
        assert_eq!(body["prompt"], "hi");
        assert_eq!(body["stream"], true);
        assert_eq!(body["model_code"], config.model);
        assert_eq!(body["config"]["top_k"], 40);
        // Images are base64 strings on the wire.
        assert_eq!(body["images"][0], "AQID");
    }

    #[test]
    fn test_fragment_payload_tolerates_missing_text() {
        let payload: FragmentPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(payload.text, "");
    }
}
