// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! User settings
//!
//! Settings live in `.sage/config.toml` under the working tree, with a
//! fall-back to the per-user config directory. Everything has a default so
//! a missing file is never an error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SageError};

/// Model codes accepted by the generation service.
pub const AVAILABLE_MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
];

/// The assistant behavior mode. Selects which mode strategy is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Mode {
    #[default]
    Coding,
    Documenting,
    Chat,
    Agent,
}

impl Mode {
    pub const ALL: &'static [Mode] = &[Mode::Coding, Mode::Documenting, Mode::Chat, Mode::Agent];
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Coding => "Coding",
            Mode::Documenting => "Documenting",
            Mode::Chat => "Chat",
            Mode::Agent => "Agent",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Mode {
    type Err = SageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "coding" => Ok(Mode::Coding),
            "documenting" => Ok(Mode::Documenting),
            "chat" => Ok(Mode::Chat),
            "agent" => Ok(Mode::Agent),
            other => Err(SageError::Config(format!("unknown mode: {}", other))),
        }
    }
}

/// Model generation parameters sent with every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub output_length: i32,
    /// Model used for one-shot title generation.
    pub title_model: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-pro".to_string(),
            temperature: 1.0,
            top_p: 0.95,
            top_k: 40,
            output_length: 65536,
            title_model: "gemini-2.0-flash-lite".to_string(),
        }
    }
}

/// Generation profile and loop bound used in agent mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub model: String,
    pub temperature: f32,
    /// Maximum tool-call/generation round trips before the loop is cut off.
    pub max_tool_rounds: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-pro".to_string(),
            temperature: 0.7,
            max_tool_rounds: 25,
        }
    }
}

/// Which parts of the project are loaded as source context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub dirs: Vec<String>,
    pub files: Vec<String>,
    pub exclusions: Vec<String>,
}

impl SourceConfig {
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }
}

/// Address of the remote generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "http://localhost:8000".to_string(),
        }
    }
}

/// Application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub mode: Mode,
    pub generation: GenerationConfig,
    pub agent: AgentConfig,
    pub sources: SourceConfig,
    pub server: ServerConfig,
}

impl Settings {
    /// The project-local settings path under `root`.
    pub fn local_path(root: &Path) -> PathBuf {
        root.join(".sage").join("config.toml")
    }

    /// The per-user settings path, if a config directory exists.
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sage").join("config.toml"))
    }

    /// Load settings: project-local first, then per-user, then defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let local = Self::local_path(root);
        if local.exists() {
            return Self::load_from(&local);
        }
        if let Some(user) = Self::user_path() {
            if user.exists() {
                return Self::load_from(&user);
            }
        }
        Ok(Self::default())
    }

    fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings to the project-local path, creating `.sage/` if needed.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = Self::local_path(root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Whether the given model code is accepted.
    pub fn is_known_model(model: &str) -> bool {
        AVAILABLE_MODELS.contains(&model)
    }
}
