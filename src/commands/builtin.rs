// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in commands
//!
//! The command surface: mode/model/temperature switches, source scoping,
//! shell passthrough, session management, and the visual-mode triggers.

use std::fmt::Write as _;
use std::process::Command as ProcessCommand;

use crate::commands::{CommandAction, CommandOutput, CommandRegistryBuilder};
use crate::config::{Mode, Settings, AVAILABLE_MODELS};
use crate::session::Session;

/// Register the built-in command set.
pub fn register_all(builder: CommandRegistryBuilder) -> CommandRegistryBuilder {
    builder
        .register("mode", "Switch assistant mode (e.g., :mode Coding).", mode_cmd, Some(mode_completer))
        .register("model", "Switch generation model (e.g., :model gemini-2.5-pro).", model_cmd, Some(model_completer))
        .register("temp", "Show or set the generation temperature.", temp_cmd, None)
        .register("file", "Add project source files/directories. Clears all when empty.", file_cmd, None)
        .register("exclude", "Exclude paths from project source. Clears exclusions when empty.", exclude_cmd, None)
        .register("list", "List the current project source scoping.", list_cmd, None)
        .register("shell", "Execute a shell command.", shell_cmd, None)
        .register("help", "Show this help message.", help_cmd, None)
        .register("rename", "Rename the current session title.", rename_cmd, None)
        .register("new", "Start a new chat session.", new_cmd, None)
        .register("history", "View conversation history.", history_cmd, None)
        .register("visual", "Enter visual mode for message selection.", visual_cmd, None)
        .register("gen", "Enter generate mode to re-generate a response.", gen_cmd, None)
        .register("edit", "Enter edit mode to edit a user prompt.", edit_cmd, None)
        .register("branch", "Enter branch mode to branch from a message.", branch_cmd, None)
        .register("q", "Quit the application.", quit_cmd, None)
        .register("quit", "Quit the application.", quit_cmd, None)
}

fn mode_completer(_settings: &Settings) -> Vec<String> {
    Mode::ALL.iter().map(|m| m.to_string()).collect()
}

fn model_completer(_settings: &Settings) -> Vec<String> {
    AVAILABLE_MODELS.iter().map(|m| m.to_string()).collect()
}

fn mode_cmd(args: &str, session: &mut Session) -> (CommandOutput, bool) {
    if args.is_empty() {
        let mut b = String::new();
        let _ = writeln!(b, "Current mode: {}", session.config().mode);
        let _ = writeln!(b, "Available modes:");
        for mode in Mode::ALL {
            let _ = writeln!(b, "- {}", mode);
        }
        let _ = write!(b, "Usage: :mode <mode_name>");
        return (CommandOutput::text(b), true);
    }

    let Ok(mode) = args.parse::<Mode>() else {
        return (
            CommandOutput::text(format!(
                "Error: mode '{}' not found. Use ':mode' to see available modes.",
                args
            )),
            false,
        );
    };

    match session.set_mode(mode) {
        Ok(()) => (CommandOutput::text(format!("Switched mode to: {}", mode)), true),
        Err(e) => (
            CommandOutput::text(format!(
                "Switched mode to: {}, but failed to reload context: {}",
                mode, e
            )),
            false,
        ),
    }
}

fn model_cmd(args: &str, session: &mut Session) -> (CommandOutput, bool) {
    if args.is_empty() {
        let mut b = String::new();
        let _ = writeln!(b, "Current model: {}", session.config().generation.model);
        let _ = writeln!(b, "Available models:");
        for model in AVAILABLE_MODELS {
            let _ = writeln!(b, "- {}", model);
        }
        let _ = write!(b, "Usage: :model <model_name>");
        return (CommandOutput::text(b), true);
    }

    if !Settings::is_known_model(args) {
        return (
            CommandOutput::text(format!(
                "Error: model '{}' not found. Use ':model' to see available models.",
                args
            )),
            false,
        );
    }

    session.config_mut().generation.model = args.to_string();
    (CommandOutput::text(format!("Switched model to: {}", args)), true)
}

fn temp_cmd(args: &str, session: &mut Session) -> (CommandOutput, bool) {
    if args.is_empty() {
        return (
            CommandOutput::text(format!(
                "Current temperature: {:.1}\nUsage: :temp <value>",
                session.config().generation.temperature
            )),
            true,
        );
    }

    let Ok(temp) = args.parse::<f32>() else {
        return (
            CommandOutput::text(format!(
                "Error: invalid temperature value '{}'. Please provide a number.",
                args
            )),
            false,
        );
    };
    if !(0.0..=2.0).contains(&temp) {
        return (
            CommandOutput::text("Error: temperature must be between 0.0 and 2.0."),
            false,
        );
    }

    session.config_mut().generation.temperature = temp;
    (CommandOutput::text(format!("Set temperature to: {:.1}", temp)), true)
}

fn scoping_summary(settings: &Settings) -> String {
    let mut b = String::new();
    if !settings.sources.dirs.is_empty() {
        let _ = writeln!(b, "Directories: {}", settings.sources.dirs.join(", "));
    }
    if !settings.sources.files.is_empty() {
        let _ = writeln!(b, "Files: {}", settings.sources.files.join(", "));
    }
    if !settings.sources.exclusions.is_empty() {
        let _ = writeln!(b, "Exclusions: {}", settings.sources.exclusions.join(", "));
    }
    b.trim_end().to_string()
}

fn file_cmd(args: &str, session: &mut Session) -> (CommandOutput, bool) {
    let paths: Vec<&str> = args.split_whitespace().collect();

    if paths.is_empty() {
        session.config_mut().sources.dirs.clear();
        session.config_mut().sources.files.clear();
        return (
            CommandOutput::text(
                "Project source cleared. The next prompt will not include any project source code.",
            ),
            true,
        );
    }

    let root = session.root().to_path_buf();
    let mut invalid = Vec::new();
    let mut new_dirs = Vec::new();
    let mut new_files = Vec::new();
    for p in paths {
        let full = root.join(p);
        if full.is_dir() {
            new_dirs.push(p.to_string());
        } else if full.is_file() {
            new_files.push(p.to_string());
        } else {
            invalid.push(p.to_string());
        }
    }

    let sources = &mut session.config_mut().sources;
    for d in new_dirs {
        if !sources.dirs.contains(&d) {
            sources.dirs.push(d);
        }
    }
    for f in new_files {
        if !sources.files.contains(&f) {
            sources.files.push(f);
        }
    }

    let mut b = String::from("Project source updated.");
    let summary = scoping_summary(session.config());
    if !summary.is_empty() {
        b.push('\n');
        b.push_str(&summary);
    }
    if !invalid.is_empty() {
        let _ = write!(
            b,
            "\nWarning: The following paths do not exist and were ignored: {}",
            invalid.join(", ")
        );
    }
    (CommandOutput::text(b), true)
}

fn exclude_cmd(args: &str, session: &mut Session) -> (CommandOutput, bool) {
    let paths: Vec<String> = args.split_whitespace().map(String::from).collect();

    if paths.is_empty() {
        session.config_mut().sources.exclusions.clear();
        return match session.reload_context() {
            Ok(()) => (CommandOutput::text("Project source exclusions cleared."), true),
            Err(e) => (
                CommandOutput::text(format!(
                    "Project source exclusions cleared, but failed to reload context: {}",
                    e
                )),
                false,
            ),
        };
    }

    {
        let sources = &mut session.config_mut().sources;
        sources.dirs.retain(|d| !paths.contains(d));
        sources.files.retain(|f| !paths.contains(f));
        for p in paths {
            if !sources.exclusions.contains(&p) {
                sources.exclusions.push(p);
            }
        }
    }

    if let Err(e) = session.reload_context() {
        return (
            CommandOutput::text(format!(
                "Project source updated, but failed to reload context: {}",
                e
            )),
            false,
        );
    }

    let mut b = String::from("Project source updated.");
    let summary = scoping_summary(session.config());
    if !summary.is_empty() {
        b.push('\n');
        b.push_str(&summary);
    }
    (CommandOutput::text(b), true)
}

fn list_cmd(_args: &str, session: &mut Session) -> (CommandOutput, bool) {
    let summary = scoping_summary(session.config());
    if summary.is_empty() {
        return (CommandOutput::text("No project source is scoped in."), true);
    }
    (CommandOutput::text(summary), true)
}

fn shell_cmd(args: &str, _session: &mut Session) -> (CommandOutput, bool) {
    if args.is_empty() {
        return (CommandOutput::text("Usage: :shell <command>"), false);
    }

    // Strip one level of surrounding quotes so pipes can be used inside
    // the shell command without being treated as command pipes.
    let mut command = args;
    let bytes = command.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"'))
    {
        command = &command[1..command.len() - 1];
    }

    let output = match ProcessCommand::new("sh").arg("-c").arg(command).output() {
        Ok(output) => output,
        Err(e) => {
            return (CommandOutput::text(format!("Command failed: {}", e)), false);
        }
    };

    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        let combined = format!("Command failed: {}\n{}", output.status, text);
        return (CommandOutput::text(combined.trim().to_string()), false);
    }
    (CommandOutput::text(text.trim().to_string()), true)
}

fn help_cmd(_args: &str, session: &mut Session) -> (CommandOutput, bool) {
    let mut b = String::from("Sage Help\n\nCommands:\n");
    for (name, description) in session.command_registry().descriptions() {
        let _ = writeln!(b, "  {:<10} {}", name, description);
    }
    (CommandOutput::text(b.trim_end().to_string()), true)
}

fn rename_cmd(args: &str, session: &mut Session) -> (CommandOutput, bool) {
    if args.trim().is_empty() {
        return (CommandOutput::text("Usage: :rename <title>"), false);
    }
    session.set_title(args);
    (CommandOutput::text(format!("Renamed session to: {}", args)), true)
}

fn new_cmd(_args: &str, _session: &mut Session) -> (CommandOutput, bool) {
    (CommandOutput::transition(CommandAction::NewSession), true)
}

fn history_cmd(_args: &str, _session: &mut Session) -> (CommandOutput, bool) {
    (CommandOutput::transition(CommandAction::HistoryMode), true)
}

fn quit_cmd(_args: &str, _session: &mut Session) -> (CommandOutput, bool) {
    (CommandOutput::transition(CommandAction::Quit), true)
}

fn has_selectable_messages(session: &Session) -> bool {
    session.messages().iter().any(|m| m.is_selectable())
}

fn visual_cmd(_args: &str, session: &mut Session) -> (CommandOutput, bool) {
    if !has_selectable_messages(session) {
        return (
            CommandOutput::text("Cannot enter visual mode: no messages to select."),
            false,
        );
    }
    (CommandOutput::transition(CommandAction::VisualMode), true)
}

fn gen_cmd(_args: &str, session: &mut Session) -> (CommandOutput, bool) {
    if !has_selectable_messages(session) {
        return (
            CommandOutput::text("Cannot enter generate mode: no messages to select."),
            false,
        );
    }
    (CommandOutput::transition(CommandAction::GenerateMode), true)
}

fn edit_cmd(_args: &str, session: &mut Session) -> (CommandOutput, bool) {
    if !has_selectable_messages(session) {
        return (
            CommandOutput::text("Cannot enter edit mode: no messages to select."),
            false,
        );
    }
    (CommandOutput::transition(CommandAction::EditMode), true)
}

fn branch_cmd(_args: &str, session: &mut Session) -> (CommandOutput, bool) {
    if !has_selectable_messages(session) {
        return (
            CommandOutput::text("Cannot enter branch mode: no messages to select."),
            false,
        );
    }
    (CommandOutput::transition(CommandAction::BranchMode), true)
}
