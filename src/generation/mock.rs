// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock generation service for testing
//!
//! Scripts fragment streams per call and records every prompt it saw, so
//! tests can assert on both sides of the contract without a server.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::GenerationConfig;
use crate::error::{Result, SageError};
use crate::generation::service::{FragmentSender, GenerationRequest, GenerationService};

#[derive(Default)]
struct MockState {
    scripts: VecDeque<Vec<String>>,
    prompts: Vec<String>,
    image_counts: Vec<usize>,
    once_response: Option<String>,
    once_models: Vec<String>,
}

/// A scripted [`GenerationService`].
///
/// Each call to `generate` pops the next fragment list and replays it;
/// when the queue is empty the stream closes immediately. `generate_once`
/// returns the configured response or an error when none is set.
#[derive(Default)]
pub struct MockGenerationService {
    state: Mutex<MockState>,
}

impl MockGenerationService {
    /// A service that closes every stream immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// A service replaying the given fragment lists, one per call.
    pub fn scripted(scripts: Vec<Vec<String>>) -> Self {
        Self {
            state: Mutex::new(MockState {
                scripts: scripts.into(),
                ..MockState::default()
            }),
        }
    }

    /// Queue another scripted response.
    pub fn push_script(&self, fragments: Vec<String>) {
        self.state.lock().unwrap().scripts.push_back(fragments);
    }

    /// Set the response for `generate_once`.
    pub fn set_once_response(&self, text: impl Into<String>) {
        self.state.lock().unwrap().once_response = Some(text.into());
    }

    /// All prompts passed to `generate`, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().unwrap().prompts.clone()
    }

    /// Image counts per `generate` call.
    pub fn image_counts(&self) -> Vec<usize> {
        self.state.lock().unwrap().image_counts.clone()
    }

    /// The model used by the most recent `generate_once` call.
    pub fn last_once_model(&self) -> Option<String> {
        self.state.lock().unwrap().once_models.last().cloned()
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    async fn generate(
        &self,
        request: GenerationRequest,
        sender: FragmentSender,
        cancel: CancellationToken,
    ) {
        let fragments = {
            let mut state = self.state.lock().unwrap();
            state.prompts.push(request.prompt.clone());
            state.image_counts.push(request.images.len());
            state.scripts.pop_front().unwrap_or_default()
        };

        for fragment in fragments {
            if cancel.is_cancelled() {
                return;
            }
            if sender.send(fragment).is_err() {
                return;
            }
            // Let the consumer interleave like a real stream would.
            tokio::task::yield_now().await;
        }
    }

    async fn generate_once(&self, _prompt: &str, config: &GenerationConfig) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.once_models.push(config.model.clone());
        state
            .once_response
            .clone()
            .ok_or_else(|| SageError::Generation("no scripted response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_mock_replays_script_and_records_prompt() {
        let service = MockGenerationService::scripted(vec![vec!["a".to_string(), "b".to_string()]]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        service
            .generate(
                GenerationRequest {
                    prompt: "p1".to_string(),
                    images: vec![vec![0u8]],
                    config: GenerationConfig::default(),
                },
                tx,
                CancellationToken::new(),
            )
            .await;

        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
        assert_eq!(rx.recv().await, None);
        assert_eq!(service.prompts(), vec!["p1".to_string()]);
        assert_eq!(service.image_counts(), vec![1]);
    }

    #[tokio::test]
    async fn test_generate_once_without_script_errors() {
        let service = MockGenerationService::new();
        let result = service
            .generate_once("p", &GenerationConfig::default())
            .await;
        assert!(result.is_err());
    }
}
