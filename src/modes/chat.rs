// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat mode
//!
//! A pure conversation: no role, no project context, just history.

use crate::config::{Mode, Settings};
use crate::error::Result;
use crate::message::Message;
use crate::modes::{prompt, ModeStrategy};
use crate::source::SourceLoader;

pub struct ChatStrategy;

impl ModeStrategy for ChatStrategy {
    fn mode(&self) -> Mode {
        Mode::Chat
    }

    fn role_prompt(&self) -> String {
        String::new()
    }

    fn load_context(&mut self, _settings: &Settings, _loader: &dyn SourceLoader) -> Result<()> {
        Ok(())
    }

    fn build_prompt(&self, messages: &[Message]) -> String {
        prompt::build_prompt("", "", "", "", "", messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_history_only() {
        let strategy = ChatStrategy;
        let built = strategy.build_prompt(&[Message::user("hello")]);
        assert!(built.starts_with(prompt::CONVERSATION_HISTORY_HEADER));
        assert!(built.ends_with("AI Assistant:\n"));
    }

    #[test]
    fn test_empty_history_builds_empty_prompt() {
        let strategy = ChatStrategy;
        assert_eq!(strategy.build_prompt(&[]), "");
    }
}
