// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt assembly
//!
//! Builds the full prompt string from its sections. Sections are omitted
//! entirely when empty; when any history exists the prompt ends with the
//! `AI Assistant:` cue that signals the completion point to the model.

use crate::message::{Message, MessageKind};

pub const SYSTEM_INSTRUCTIONS_HEADER: &str = "# SYSTEM INSTRUCTIONS\n\n";
pub const RELATED_DOCUMENTS_HEADER: &str = "# RELATED DOCUMENTS\n\n";
pub const PROJECT_SOURCE_HEADER: &str = "# PROJECT SOURCE CODE\n\n";
pub const CONVERSATION_HISTORY_HEADER: &str = "# CONVERSATION HISTORY\n\n";
pub const SEPARATOR: &str = "\n\n---\n\n";

/// Construct the full prompt from its components.
pub fn build_prompt(
    role: &str,
    instructions: &str,
    system_instructions: &str,
    related_documents: &str,
    project_source: &str,
    messages: &[Message],
) -> String {
    let mut out = String::new();

    let mut has_predefined = false;
    if !role.is_empty() {
        out.push_str(role);
        has_predefined = true;
    }
    if !instructions.is_empty() {
        out.push_str(instructions);
        has_predefined = true;
    }

    if !system_instructions.is_empty() {
        if has_predefined {
            out.push_str(SEPARATOR);
        }
        out.push_str(SYSTEM_INSTRUCTIONS_HEADER);
        out.push_str(system_instructions);
        out.push_str(SEPARATOR);
    } else if has_predefined {
        out.push_str(SEPARATOR);
    }

    if !related_documents.is_empty() {
        out.push_str(RELATED_DOCUMENTS_HEADER);
        out.push_str(related_documents);
        out.push_str(SEPARATOR);
    }

    if !project_source.is_empty() {
        out.push_str(PROJECT_SOURCE_HEADER);
        out.push_str(project_source);
        out.push_str(SEPARATOR);
    }

    if !messages.is_empty() {
        out.push_str(CONVERSATION_HISTORY_HEADER);
        out.push_str(&render_history(messages));
        out.push_str("AI Assistant:\n");
    }

    out
}

/// Render the conversation history section body.
pub fn render_history(messages: &[Message]) -> String {
    let mut out = String::new();
    for msg in messages {
        match msg.kind {
            MessageKind::User => {
                out.push_str("User:\n");
                out.push_str(&msg.content);
                out.push('\n');
            }
            MessageKind::Image => {
                out.push_str(&msg.content);
                out.push('\n');
            }
            MessageKind::Assistant => {
                // The in-flight placeholder is empty; skip it.
                if msg.content.is_empty() {
                    continue;
                }
                out.push_str("AI Assistant:\n");
                out.push_str(&msg.content);
                out.push('\n');
            }
            MessageKind::ToolCall => {
                out.push_str("Tool Call:\n");
                out.push_str(&msg.content);
                out.push('\n');
            }
            MessageKind::ToolResult => {
                out.push_str("Tool Result:\n");
                out.push_str(&msg.content);
                out.push('\n');
            }
            _ => {}
        }
    }
    out
}
