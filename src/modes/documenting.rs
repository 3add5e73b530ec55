// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Documenting mode
//!
//! Same context loading as coding mode with a documentation role.

use crate::config::{Mode, Settings};
use crate::error::Result;
use crate::message::Message;
use crate::modes::{prompt, ModeStrategy, CODER_INSTRUCTIONS, DOCUMENTING_ROLE};
use crate::source::SourceLoader;

#[derive(Default)]
pub struct DocumentingStrategy {
    system_instructions: String,
    related_documents: String,
    project_source: String,
}

impl ModeStrategy for DocumentingStrategy {
    fn mode(&self) -> Mode {
        Mode::Documenting
    }

    fn role_prompt(&self) -> String {
        DOCUMENTING_ROLE.to_string()
    }

    fn load_context(&mut self, settings: &Settings, loader: &dyn SourceLoader) -> Result<()> {
        self.related_documents = loader.load_documents()?;
        self.project_source = loader.load_project_source(&settings.sources)?;
        Ok(())
    }

    fn build_prompt(&self, messages: &[Message]) -> String {
        prompt::build_prompt(
            DOCUMENTING_ROLE,
            CODER_INSTRUCTIONS,
            &self.system_instructions,
            &self.related_documents,
            &self.project_source,
            messages,
        )
    }
}
