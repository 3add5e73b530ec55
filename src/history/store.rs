// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! History store implementation
//!
//! Conversations are stored as markdown files under `.sage/history/`: a
//! `---` frontmatter block carrying metadata, then the messages rendered
//! as role-header sections so history files stay readable in any editor.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::config::SourceConfig;
use crate::error::{Result, SageError};
use crate::message::{Message, MessageKind};

const HISTORY_DIR: &str = ".sage/history";

/// Snapshot handed to the store on save.
#[derive(Debug, Clone)]
pub struct ConversationData {
    pub filename: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    pub sources: SourceConfig,
}

/// Metadata recovered on load.
#[derive(Debug, Clone)]
pub struct ConversationMetadata {
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub sources: SourceConfig,
}

/// One entry in the history listing.
#[derive(Debug, Clone)]
pub struct ConversationInfo {
    pub filename: String,
    pub title: String,
    pub modified_at: DateTime<Utc>,
}

/// Markdown-file-backed conversation store.
pub struct HistoryStore {
    history_path: PathBuf,
}

impl HistoryStore {
    /// Open (creating if needed) the history directory under `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let history_path = root.into().join(HISTORY_DIR);
        std::fs::create_dir_all(&history_path).map_err(|e| {
            SageError::History(format!(
                "could not create history directory at {}: {}",
                history_path.display(),
                e
            ))
        })?;
        Ok(Self { history_path })
    }

    /// Save a conversation snapshot.
    pub fn save(&self, data: &ConversationData) -> Result<()> {
        let mut out = String::new();
        out.push_str("---\n");
        out.push_str(&format!("title: {}\n", data.title));
        out.push_str(&format!("createdAt: {}\n", data.created_at.to_rfc3339()));
        out.push_str(&format!("modifiedAt: {}\n", Utc::now().to_rfc3339()));
        if !data.sources.files.is_empty() {
            out.push_str(&format!("files: {}\n", serde_json::to_string(&data.sources.files)?));
        }
        if !data.sources.dirs.is_empty() {
            out.push_str(&format!("dirs: {}\n", serde_json::to_string(&data.sources.dirs)?));
        }
        if !data.sources.exclusions.is_empty() {
            out.push_str(&format!(
                "exclusions: {}\n",
                serde_json::to_string(&data.sources.exclusions)?
            ));
        }
        out.push_str("---\n\n");
        out.push_str(&render_messages(&data.messages));

        let path = self.history_path.join(&data.filename);
        std::fs::write(path, out)?;
        Ok(())
    }

    /// Load a conversation by filename.
    pub fn load(&self, filename: &str) -> Result<(ConversationMetadata, Vec<Message>)> {
        let path = self.history_path.join(filename);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SageError::History(format!("could not read {}: {}", filename, e)))?;
        parse_conversation(&content)
    }

    /// List stored conversations, most recently modified first.
    pub fn list(&self) -> Result<Vec<ConversationInfo>> {
        let mut infos = Vec::new();
        for entry in std::fs::read_dir(&self.history_path)? {
            let entry = entry?;
            let filename = entry.file_name().to_string_lossy().to_string();
            if !filename.ends_with(".md") {
                continue;
            }
            let content = std::fs::read_to_string(entry.path())?;
            let Ok((metadata, _)) = parse_conversation(&content) else {
                tracing::warn!(file = %filename, "skipping malformed history file");
                continue;
            };
            infos.push(ConversationInfo {
                filename,
                title: metadata.title,
                modified_at: metadata.modified_at,
            });
        }
        infos.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(infos)
    }
}

fn role_header(kind: MessageKind) -> Option<&'static str> {
    match kind {
        MessageKind::User => Some("User:"),
        MessageKind::Assistant => Some("AI Assistant:"),
        MessageKind::Image => Some("Image:"),
        MessageKind::Command => Some("Command Execute:"),
        MessageKind::CommandResult => Some("Command Execute Result:"),
        MessageKind::CommandError => Some("Command Execute Error:"),
        MessageKind::ToolCall => Some("Tool Call:"),
        MessageKind::ToolResult => Some("Tool Result:"),
        // UI furniture never persists.
        MessageKind::Init | MessageKind::Directory => None,
    }
}

fn kind_for_header(line: &str) -> Option<MessageKind> {
    match line {
        "User:" => Some(MessageKind::User),
        "AI Assistant:" => Some(MessageKind::Assistant),
        "Image:" => Some(MessageKind::Image),
        "Command Execute:" => Some(MessageKind::Command),
        "Command Execute Result:" => Some(MessageKind::CommandResult),
        "Command Execute Error:" => Some(MessageKind::CommandError),
        "Tool Call:" => Some(MessageKind::ToolCall),
        "Tool Result:" => Some(MessageKind::ToolResult),
        _ => None,
    }
}

/// Render messages as role-header sections.
pub fn render_messages(messages: &[Message]) -> String {
    let mut out = String::new();
    for msg in messages {
        let Some(header) = role_header(msg.kind) else {
            continue;
        };
        if msg.kind == MessageKind::Assistant && msg.content.is_empty() {
            // Never persist an in-flight placeholder.
            continue;
        }
        out.push_str(header);
        out.push('\n');
        if msg.kind == MessageKind::Image {
            out.push_str(&format!("![image]({})", msg.content));
        } else {
            out.push_str(&msg.content);
        }
        out.push_str("\n\n");
    }
    out
}

fn parse_conversation(content: &str) -> Result<(ConversationMetadata, Vec<Message>)> {
    let mut parts = content.splitn(3, "---\n");
    let (Some(_), Some(front), Some(body)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(SageError::History("missing frontmatter".to_string()));
    };

    let mut title = String::new();
    let mut created_at = Utc::now();
    let mut modified_at = Utc::now();
    let mut sources = SourceConfig::default();

    for line in front.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "title" => title = value.to_string(),
            "createdAt" => {
                created_at = DateTime::parse_from_rfc3339(value)
                    .map_err(|e| SageError::History(format!("bad createdAt: {}", e)))?
                    .with_timezone(&Utc);
            }
            "modifiedAt" => {
                modified_at = DateTime::parse_from_rfc3339(value)
                    .map_err(|e| SageError::History(format!("bad modifiedAt: {}", e)))?
                    .with_timezone(&Utc);
            }
            "files" => sources.files = serde_json::from_str(value).unwrap_or_default(),
            "dirs" => sources.dirs = serde_json::from_str(value).unwrap_or_default(),
            "exclusions" => sources.exclusions = serde_json::from_str(value).unwrap_or_default(),
            _ => {}
        }
    }

    let messages = parse_messages(body);
    Ok((
        ConversationMetadata {
            title,
            created_at,
            modified_at,
            sources,
        },
        messages,
    ))
}

fn parse_messages(body: &str) -> Vec<Message> {
    let image_link = regex::Regex::new(r"^!\[image\]\((.*)\)$").expect("static regex");
    let mut messages = Vec::new();
    let mut current: Option<(MessageKind, String)> = None;

    let mut flush = |current: &mut Option<(MessageKind, String)>| {
        if let Some((kind, raw)) = current.take() {
            let mut content = raw.trim_end().to_string();
            if kind == MessageKind::Image {
                if let Some(caps) = image_link.captures(content.trim()) {
                    content = caps[1].to_string();
                }
            }
            messages.push(Message::new(kind, content));
        }
    };

    for line in body.lines() {
        if let Some(kind) = kind_for_header(line.trim_end()) {
            flush(&mut current);
            current = Some((kind, String::new()));
        } else if let Some((_, content)) = current.as_mut() {
            content.push_str(line);
            content.push('\n');
        }
    }
    flush(&mut current);

    messages
}
