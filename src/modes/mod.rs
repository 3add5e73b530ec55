// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mode strategies
//!
//! The session delegates context loading, prompt assembly, and the
//! generation profile to whichever [`ModeStrategy`] is active. Switching
//! modes replaces the strategy value wholesale and forces a context
//! reload.

pub mod agent;
pub mod chat;
pub mod coding;
pub mod documenting;
pub mod prompt;

pub use agent::AgentStrategy;
pub use chat::ChatStrategy;
pub use coding::CodingStrategy;
pub use documenting::DocumentingStrategy;

use std::sync::Arc;

use crate::config::{GenerationConfig, Mode, Settings};
use crate::error::Result;
use crate::message::Message;
use crate::source::SourceLoader;
use crate::tools::ToolRegistry;

/// Role preamble for the coding assistant.
pub const CODING_ROLE: &str = "You are an expert software engineer acting as a coding assistant. \
You read the provided project source carefully and answer with precise, working code.\n";

/// Role preamble for the documentation assistant.
pub const DOCUMENTING_ROLE: &str = "You are a technical writer acting as a documentation assistant. \
You read the provided project source carefully and produce clear, accurate documentation.\n";

/// Shared output-format instructions for the source-aware modes.
pub const CODER_INSTRUCTIONS: &str = "\nWhen you create or update a file, emit a section per file: \
the relative path in backticks on its own line, followed by a fenced code block containing the \
complete file content.\n";

/// Behavior contract for one assistant mode.
pub trait ModeStrategy: Send + Sync {
    /// Which mode this strategy implements.
    fn mode(&self) -> Mode;

    /// The role section of the prompt. Empty for plain chat.
    fn role_prompt(&self) -> String;

    /// Load (or reload) mode-specific context. Called on every mode
    /// switch and before every generation so file edits are reflected.
    fn load_context(&mut self, settings: &Settings, loader: &dyn SourceLoader) -> Result<()>;

    /// Assemble the full prompt for the given conversation.
    fn build_prompt(&self, messages: &[Message]) -> String;

    /// Generation parameters for this mode. Agent mode overrides the
    /// model/temperature profile.
    fn generation_config(&self, settings: &Settings) -> GenerationConfig {
        settings.generation.clone()
    }

    /// Whether assistant responses should be scanned for tool calls.
    fn handles_tool_calls(&self) -> bool {
        false
    }
}

/// Construct the strategy for `mode`.
pub fn strategy_for(mode: Mode, tools: &Arc<ToolRegistry>) -> Box<dyn ModeStrategy> {
    match mode {
        Mode::Coding => Box::new(CodingStrategy::default()),
        Mode::Documenting => Box::new(DocumentingStrategy::default()),
        Mode::Chat => Box::new(ChatStrategy),
        Mode::Agent => Box::new(AgentStrategy::new(tools.clone())),
    }
}
