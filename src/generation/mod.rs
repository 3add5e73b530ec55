// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Generation driver
//!
//! Starts a cancellable concurrent generation task against the remote
//! service and exposes its output as a stream of text fragments. The task
//! always closes the stream, whether it finishes, fails, or is cancelled,
//! so consumers can treat stream closure as the single terminal event.

pub mod mock;
pub mod service;

pub use mock::MockGenerationService;
pub use service::{FragmentSender, GenerationRequest, GenerationService, HttpGenerationService};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::config::GenerationConfig;
use crate::error::Result;

/// A fragment with this prefix is a terminal error signal, not
/// conversation text.
pub const ERROR_PREFIX: &str = "Error:";

/// Receiving half of a generation's fragment channel.
#[derive(Debug)]
pub struct GenerationStream {
    rx: mpsc::UnboundedReceiver<String>,
}

impl GenerationStream {
    /// Wait for the next fragment. `None` means the stream closed.
    pub async fn next_fragment(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Expose the stream as a `futures` Stream for async consumers.
    pub fn into_stream(self) -> UnboundedReceiverStream<String> {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Whether a fragment is the terminal error signal.
pub fn is_error_fragment(fragment: &str) -> bool {
    fragment.starts_with(ERROR_PREFIX)
}

/// Drives generations against a [`GenerationService`].
#[derive(Clone)]
pub struct Generator {
    service: Arc<dyn GenerationService>,
}

impl Generator {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    /// Launch a generation task. Returns the fragment stream and the
    /// token that cancels the task. The task owns the sending half and
    /// drops it on exit, closing the stream.
    pub fn start(
        &self,
        prompt: String,
        images: Vec<Vec<u8>>,
        config: GenerationConfig,
    ) -> (GenerationStream, CancellationToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let service = self.service.clone();
        let task_cancel = cancel.clone();
        let request = GenerationRequest {
            prompt,
            images,
            config,
        };
        tokio::spawn(async move {
            service.generate(request, tx, task_cancel).await;
        });

        (GenerationStream { rx }, cancel)
    }

    /// One-shot, non-streaming generation used for session titles.
    pub async fn generate_title(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let mut title_config = config.clone();
        title_config.model = config.title_model.clone();
        title_config.temperature = 1.0;
        title_config.output_length = 256;
        self.service.generate_once(prompt, &title_config).await
    }
}
