// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Coding mode
//!
//! The default strategy: project source and context documents are loaded
//! into the prompt alongside the conversation.

use crate::config::{Mode, Settings};
use crate::error::Result;
use crate::message::Message;
use crate::modes::{prompt, ModeStrategy, CODER_INSTRUCTIONS, CODING_ROLE};
use crate::source::SourceLoader;

#[derive(Default)]
pub struct CodingStrategy {
    system_instructions: String,
    related_documents: String,
    project_source: String,
}

impl ModeStrategy for CodingStrategy {
    fn mode(&self) -> Mode {
        Mode::Coding
    }

    fn role_prompt(&self) -> String {
        CODING_ROLE.to_string()
    }

    fn load_context(&mut self, settings: &Settings, loader: &dyn SourceLoader) -> Result<()> {
        self.related_documents = loader.load_documents()?;
        self.project_source = loader.load_project_source(&settings.sources)?;
        Ok(())
    }

    fn build_prompt(&self, messages: &[Message]) -> String {
        prompt::build_prompt(
            CODING_ROLE,
            CODER_INSTRUCTIONS,
            &self.system_instructions,
            &self.related_documents,
            &self.project_source,
            messages,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSourceLoader;

    #[test]
    fn test_loaded_source_appears_in_prompt() {
        let mut strategy = CodingStrategy::default();
        let loader = StaticSourceLoader::with_source("`main.rs`\n```\nfn main() {}\n```");
        strategy.load_context(&Settings::default(), &loader).unwrap();

        let built = strategy.build_prompt(&[Message::user("explain")]);
        assert!(built.contains(prompt::PROJECT_SOURCE_HEADER));
        assert!(built.contains("fn main() {}"));
        assert!(built.ends_with("AI Assistant:\n"));
    }

    #[test]
    fn test_load_failure_propagates() {
        let mut strategy = CodingStrategy::default();
        let loader = StaticSourceLoader::failing("disk gone");
        assert!(strategy.load_context(&Settings::default(), &loader).is_err());
    }
}
