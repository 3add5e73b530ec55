// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation message model
//!
//! A [`Message`] is one typed entry in a session's conversation. Messages
//! are plain values owned by exactly one session; branching clones them.

use serde::{Deserialize, Serialize};

/// The kind of a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// A user prompt
    User,
    /// A model response (empty while streaming into the placeholder)
    Assistant,
    /// An echoed `:command` invocation
    Command,
    /// Successful command output
    CommandResult,
    /// Failed command output, or any surfaced engine error
    CommandError,
    /// A tool call issued by the model (agent mode)
    ToolCall,
    /// The result of an executed tool call
    ToolResult,
    /// An attached image; `content` is the file path
    Image,
    /// UI banner shown at startup, never sent to the model
    Init,
    /// Working-directory notice, never sent to the model
    Directory,
}

/// One entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub content: String,
    /// Base64-encoded inline payload for `Image` messages delivered
    /// without a backing file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux_data: Option<String>,
}

impl Message {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            aux_data: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Assistant, content)
    }

    pub fn command(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Command, content)
    }

    pub fn command_result(content: impl Into<String>) -> Self {
        Self::new(MessageKind::CommandResult, content)
    }

    pub fn command_error(content: impl Into<String>) -> Self {
        Self::new(MessageKind::CommandError, content)
    }

    pub fn tool_call(content: impl Into<String>) -> Self {
        Self::new(MessageKind::ToolCall, content)
    }

    pub fn tool_result(content: impl Into<String>) -> Self {
        Self::new(MessageKind::ToolResult, content)
    }

    /// An image referenced by file path.
    pub fn image(path: impl Into<String>) -> Self {
        Self::new(MessageKind::Image, path)
    }

    /// An image carried inline as a base64 payload.
    pub fn inline_image(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Image,
            content: name.into(),
            aux_data: Some(payload.into()),
        }
    }

    /// Whether this entry counts for selection in visual-style modes.
    /// Init and Directory messages are UI furniture.
    pub fn is_selectable(&self) -> bool {
        !matches!(self.kind, MessageKind::Init | MessageKind::Directory)
    }

    /// Whether this message ends a backward image scan: the previous
    /// conversational turn is a user prompt or an assistant reply.
    pub fn is_turn_boundary(&self) -> bool {
        matches!(self.kind, MessageKind::User | MessageKind::Assistant)
    }
}
