// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Agent mode
//!
//! No project context is loaded; the model works purely through tool
//! calls. The role prompt embeds the tool definitions and the payload
//! protocol, and generation runs with the agent model profile.

use std::sync::Arc;

use crate::config::{GenerationConfig, Mode, Settings};
use crate::error::Result;
use crate::message::Message;
use crate::modes::{prompt, ModeStrategy};
use crate::source::SourceLoader;
use crate::tools::ToolRegistry;

const AGENT_ROLE_PREAMBLE: &str = "You are an autonomous assistant that works by calling tools. \
To call tools, end your response with a JSON array of objects of the form \
{\"tool\": <name>, \"args\": {...}}. When you are finished, respond without any tool calls.\n\n\
Available tools:\n";

pub struct AgentStrategy {
    tools: Arc<ToolRegistry>,
}

impl AgentStrategy {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

impl ModeStrategy for AgentStrategy {
    fn mode(&self) -> Mode {
        Mode::Agent
    }

    fn role_prompt(&self) -> String {
        let docs = self.tools.docs_json().unwrap_or_else(|_| "[]".to_string());
        format!("{}{}\n", AGENT_ROLE_PREAMBLE, docs)
    }

    fn load_context(&mut self, _settings: &Settings, _loader: &dyn SourceLoader) -> Result<()> {
        Ok(())
    }

    fn build_prompt(&self, messages: &[Message]) -> String {
        prompt::build_prompt(&self.role_prompt(), "", "", "", "", messages)
    }

    fn generation_config(&self, settings: &Settings) -> GenerationConfig {
        let mut config = settings.generation.clone();
        config.model = settings.agent.model.clone();
        config.temperature = settings.agent.temperature;
        config
    }

    fn handles_tool_calls(&self) -> bool {
        true
    }
}
