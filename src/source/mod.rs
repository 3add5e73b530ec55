// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Context and project-source loading
//!
//! The engine never touches the filesystem for context directly; it goes
//! through [`SourceLoader`]. The default implementation reads the
//! `Context/` directory for provided documents and walks the configured
//! dirs/files (minus exclusions) for project source, rendering each file
//! as a backtick-quoted path followed by a fenced block.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::SourceConfig;
use crate::error::{Result, SageError};

/// Name of the directory holding provided documents at the project root.
const CONTEXT_DIR_NAME: &str = "Context";

/// Default exclusion patterns applied on top of the configured ones.
const DEFAULT_EXCLUSIONS: &[&str] = &[".git", ".sage", "target", "node_modules"];

/// Loads the context documents and project source for prompt assembly.
pub trait SourceLoader: Send + Sync {
    /// Load the provided documents from the context directory.
    /// Returns an empty string when the directory does not exist.
    fn load_documents(&self) -> Result<String>;

    /// Load the project source text scoped by `sources`.
    /// Returns an empty string when nothing is scoped in.
    fn load_project_source(&self, sources: &SourceConfig) -> Result<String>;
}

/// Filesystem-backed loader rooted at the working tree.
pub struct FsSourceLoader {
    root: PathBuf,
}

impl FsSourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn render_file(&self, path: &Path) -> Result<Option<String>> {
        let bytes = std::fs::read(path)?;
        let Ok(content) = String::from_utf8(bytes) else {
            // Binary file, skip it.
            return Ok(None);
        };

        let display = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let mut content = content;
        if !content.ends_with('\n') {
            content.push('\n');
        }
        Ok(Some(format!("`{}`\n```\n{}```", display, content)))
    }

    fn is_excluded(path: &Path, exclusions: &[glob::Pattern]) -> bool {
        let text = path.to_string_lossy().replace('\\', "/");
        exclusions.iter().any(|p| {
            p.matches(&text)
                || path
                    .components()
                    .any(|c| p.matches(&c.as_os_str().to_string_lossy()))
        })
    }

    fn compile_exclusions(sources: &SourceConfig) -> Vec<glob::Pattern> {
        DEFAULT_EXCLUSIONS
            .iter()
            .copied()
            .map(String::from)
            .chain(sources.exclusions.iter().cloned())
            .filter_map(|p| glob::Pattern::new(&p).ok())
            .collect()
    }
}

impl SourceLoader for FsSourceLoader {
    fn load_documents(&self) -> Result<String> {
        let context_path = self.root.join(CONTEXT_DIR_NAME);
        if !context_path.is_dir() {
            return Ok(String::new());
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(&context_path).sort_by_file_name() {
            let entry = entry
                .map_err(|e| SageError::Context(format!("error walking context directory: {}", e)))?;
            if entry.file_type().is_file() {
                if let Some(doc) = self.render_file(entry.path())? {
                    documents.push(doc);
                }
            }
        }

        Ok(documents.join("\n\n"))
    }

    fn load_project_source(&self, sources: &SourceConfig) -> Result<String> {
        if sources.is_empty() {
            return Ok(String::new());
        }

        let exclusions = Self::compile_exclusions(sources);
        let mut rendered = Vec::new();

        for dir in &sources.dirs {
            let dir_path = self.root.join(dir);
            if !dir_path.is_dir() {
                return Err(SageError::Context(format!(
                    "source directory not found: {}",
                    dir
                )));
            }
            for entry in WalkDir::new(&dir_path).sort_by_file_name() {
                let entry = entry
                    .map_err(|e| SageError::Context(format!("error walking {}: {}", dir, e)))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
                if Self::is_excluded(relative, &exclusions) {
                    continue;
                }
                if let Some(doc) = self.render_file(entry.path())? {
                    rendered.push(doc);
                }
            }
        }

        for file in &sources.files {
            let file_path = self.root.join(file);
            if !file_path.is_file() {
                return Err(SageError::Context(format!("source file not found: {}", file)));
            }
            if Self::is_excluded(Path::new(file), &exclusions) {
                continue;
            }
            if let Some(doc) = self.render_file(&file_path)? {
                rendered.push(doc);
            }
        }

        Ok(rendered.join("\n\n"))
    }
}

/// Fixed-content loader for tests and embedding front ends.
#[derive(Debug, Clone, Default)]
pub struct StaticSourceLoader {
    pub documents: String,
    pub project_source: String,
    /// When set, both load calls fail with this message.
    pub fail_with: Option<String>,
}

impl StaticSourceLoader {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_source(project_source: impl Into<String>) -> Self {
        Self {
            project_source: project_source.into(),
            ..Self::default()
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }
}

impl SourceLoader for StaticSourceLoader {
    fn load_documents(&self) -> Result<String> {
        match &self.fail_with {
            Some(msg) => Err(SageError::Context(msg.clone())),
            None => Ok(self.documents.clone()),
        }
    }

    fn load_project_source(&self, _sources: &SourceConfig) -> Result<String> {
        match &self.fail_with {
            Some(msg) => Err(SageError::Context(msg.clone())),
            None => Ok(self.project_source.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_documents_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let loader = FsSourceLoader::new(dir.path());
        assert_eq!(loader.load_documents().unwrap(), "");
    }

    #[test]
    fn test_documents_rendered_with_path_and_fence() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Context/notes.md", "remember the invariant");
        let loader = FsSourceLoader::new(dir.path());

        let docs = loader.load_documents().unwrap();
        assert!(docs.starts_with("`Context/notes.md`\n```\n"));
        assert!(docs.contains("remember the invariant\n```"));
    }

    #[test]
    fn test_empty_scoping_loads_nothing() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/lib.rs", "fn a() {}");
        let loader = FsSourceLoader::new(dir.path());

        let out = loader.load_project_source(&SourceConfig::default()).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn test_dir_scoping_with_exclusion() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/lib.rs", "fn a() {}");
        write(dir.path(), "src/gen.rs", "fn g() {}");
        let loader = FsSourceLoader::new(dir.path());

        let sources = SourceConfig {
            dirs: vec!["src".to_string()],
            files: vec![],
            exclusions: vec!["src/gen.rs".to_string()],
        };
        let out = loader.load_project_source(&sources).unwrap();
        assert!(out.contains("`src/lib.rs`"));
        assert!(!out.contains("gen.rs"));
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        let loader = FsSourceLoader::new(dir.path());
        let sources = SourceConfig {
            dirs: vec!["no-such-dir".to_string()],
            ..SourceConfig::default()
        };
        assert!(loader.load_project_source(&sources).is_err());
    }

    #[test]
    fn test_explicit_file_scoping() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "README.md", "# hello");
        let loader = FsSourceLoader::new(dir.path());
        let sources = SourceConfig {
            files: vec!["README.md".to_string()],
            ..SourceConfig::default()
        };
        let out = loader.load_project_source(&sources).unwrap();
        assert!(out.contains("`README.md`"));
        assert!(out.contains("# hello"));
    }

    #[test]
    fn test_static_loader_failure() {
        let loader = StaticSourceLoader::failing("boom");
        assert!(loader.load_documents().is_err());
        assert!(loader.load_project_source(&SourceConfig::default()).is_err());
    }
}
