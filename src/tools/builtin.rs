// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools
//!
//! Sub-agent delegation markers plus the file tools. Delegation tools do
//! not run anything themselves; they emit a `_special_agent_request`
//! payload the hosting front end routes to the named sub-agent.

use serde_json::{json, Map, Value};
use walkdir::WalkDir;

use crate::error::{Result, SageError};
use crate::tools::{ArgumentDefinition, ToolContext, ToolDefinition, ToolFn, ToolRegistryBuilder};

/// Register the full built-in tool set.
pub fn register_all(builder: ToolRegistryBuilder) -> ToolRegistryBuilder {
    builder
        .register(
            delegation_definition(
                "coding_agent",
                "Delegates a coding task to a specialized agent. Use this for any code writing, modification, or explanation.",
            ),
            coding_agent as ToolFn,
        )
        .register(
            delegation_definition(
                "writing_agent",
                "Delegates a prose or documentation task to a specialized writing agent.",
            ),
            writing_agent as ToolFn,
        )
        .register(
            delegation_definition(
                "general_agent",
                "Delegates a general research or reasoning task to a general-purpose agent.",
            ),
            general_agent as ToolFn,
        )
        .register(
            delegation_definition(
                "main_agent",
                "Returns control to the main agent to continue the conversation or summarize results. Use this after a specialized agent has completed its task.",
            ),
            main_agent as ToolFn,
        )
        .register(
            paths_definition("read_files", "Reads the content of files given an array of paths."),
            read_files as ToolFn,
        )
        .register(
            paths_definition(
                "read_directories",
                "Reads the content of directories given an array of paths.",
            ),
            read_directories as ToolFn,
        )
        .register(
            paths_definition(
                "upsert_files",
                "Create or update files. This tool parses the file sections of your last response and applies the changes.",
            ),
            upsert_files as ToolFn,
        )
}

fn delegation_definition(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        args: vec![ArgumentDefinition {
            name: "prompt".to_string(),
            arg_type: "string".to_string(),
            description: "The detailed prompt or task for the agent.".to_string(),
        }],
    }
}

fn paths_definition(name: &str, description: &str) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        args: vec![ArgumentDefinition {
            name: "paths".to_string(),
            arg_type: "array".to_string(),
            description: "An array of relative paths.".to_string(),
        }],
    }
}

fn delegate(agent: &str, args: &Map<String, Value>) -> Result<String> {
    let prompt = args
        .get("prompt")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| SageError::ToolExecution("missing or invalid 'prompt' argument".to_string()))?;

    let request = json!({
        "_special_agent_request": agent,
        "prompt": prompt,
    });
    Ok(request.to_string())
}

fn coding_agent(_ctx: &ToolContext, args: &Map<String, Value>, _last: &str) -> Result<String> {
    delegate("coding_agent", args)
}

fn writing_agent(_ctx: &ToolContext, args: &Map<String, Value>, _last: &str) -> Result<String> {
    delegate("writing_agent", args)
}

fn general_agent(_ctx: &ToolContext, args: &Map<String, Value>, _last: &str) -> Result<String> {
    delegate("general_agent", args)
}

fn main_agent(_ctx: &ToolContext, args: &Map<String, Value>, _last: &str) -> Result<String> {
    delegate("main_agent", args)
}

fn parse_paths(args: &Map<String, Value>) -> Result<Vec<String>> {
    let paths = args
        .get("paths")
        .ok_or_else(|| SageError::ToolExecution("missing required argument: paths".to_string()))?;
    let array = paths.as_array().ok_or_else(|| {
        SageError::ToolExecution("invalid type for argument 'paths': expected array of strings".to_string())
    })?;

    array
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.as_str().map(String::from).ok_or_else(|| {
                SageError::ToolExecution(format!("invalid path at index {}: not a string", i))
            })
        })
        .collect()
}

fn render_file(ctx: &ToolContext, rel: &str) -> Result<String> {
    let path = ctx.root.join(rel);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| SageError::ToolExecution(format!("failed to read {}: {}", rel, e)))?;
    let mut content = content;
    if !content.ends_with('\n') {
        content.push('\n');
    }
    Ok(format!("`{}`\n```\n{}```", rel, content))
}

fn read_files(ctx: &ToolContext, args: &Map<String, Value>, _last: &str) -> Result<String> {
    let paths = parse_paths(args)?;
    if paths.is_empty() {
        return Ok("No files specified.".to_string());
    }

    let rendered: Result<Vec<String>> = paths.iter().map(|p| render_file(ctx, p)).collect();
    Ok(rendered?.join("\n\n"))
}

fn read_directories(ctx: &ToolContext, args: &Map<String, Value>, _last: &str) -> Result<String> {
    let paths = parse_paths(args)?;
    if paths.is_empty() {
        return Ok("No directories specified.".to_string());
    }

    let mut rendered = Vec::new();
    for dir in &paths {
        let dir_path = ctx.root.join(dir);
        if !dir_path.is_dir() {
            return Err(SageError::ToolExecution(format!("directory not found: {}", dir)));
        }
        for entry in WalkDir::new(&dir_path).sort_by_file_name() {
            let entry =
                entry.map_err(|e| SageError::ToolExecution(format!("error walking {}: {}", dir, e)))?;
            if entry.file_type().is_file() {
                let rel = entry
                    .path()
                    .strip_prefix(&ctx.root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                rendered.push(render_file(ctx, &rel)?);
            }
        }
    }
    Ok(rendered.join("\n\n"))
}

/// Apply the file sections of an assistant response. A file section is a
/// backtick-quoted path on its own line, immediately followed by a fenced
/// code block holding the full file content (the same shape the source
/// loader emits into prompts).
fn upsert_files(ctx: &ToolContext, _args: &Map<String, Value>, last_response: &str) -> Result<String> {
    let sections = extract_file_sections(last_response);
    if sections.is_empty() {
        return Ok("No file changes were applied.".to_string());
    }

    let mut created = Vec::new();
    let mut updated = Vec::new();
    for (rel, content) in sections {
        if rel.contains("..") {
            return Err(SageError::ToolExecution(format!(
                "refusing path outside the working tree: {}",
                rel
            )));
        }
        let path = ctx.root.join(&rel);
        let existed = path.exists();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SageError::ToolExecution(format!("failed to create {}: {}", rel, e)))?;
        }
        std::fs::write(&path, content)
            .map_err(|e| SageError::ToolExecution(format!("failed to write {}: {}", rel, e)))?;
        if existed {
            updated.push(rel);
        } else {
            created.push(rel);
        }
    }

    let mut summary = String::from("File upsert summary:");
    if !created.is_empty() {
        summary.push_str(&format!("\n  created: {}", created.join(", ")));
    }
    if !updated.is_empty() {
        summary.push_str(&format!("\n  updated: {}", updated.join(", ")));
    }
    Ok(summary)
}

/// Extract `(path, content)` pairs from a response's file sections.
pub fn extract_file_sections(text: &str) -> Vec<(String, String)> {
    let path_line = regex::Regex::new(r"^`([^`]+)`\s*$").expect("static regex");
    let mut sections = Vec::new();

    let mut lines = text.lines().peekable();
    while let Some(line) = lines.next() {
        let Some(caps) = path_line.captures(line.trim_end()) else {
            continue;
        };
        let Some(fence) = lines.peek().map(|l| l.trim_end()) else {
            break;
        };
        if !fence.starts_with("```") {
            continue;
        }
        lines.next(); // consume the opening fence

        let mut content = String::new();
        for body_line in lines.by_ref() {
            if body_line.trim_end() == "```" {
                sections.push((caps[1].to_string(), content));
                break;
            }
            content.push_str(body_line);
            content.push('\n');
        }
    }

    sections
}
