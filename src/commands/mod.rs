// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Command registry and dispatch
//!
//! Commands are registered once on an explicit registry object at
//! composition time and dispatched from session input. Input may chain
//! commands with `|`; a segment's whitespace-normalized output becomes
//! extra arguments for the next segment.

pub mod builtin;
pub mod pipeline;

use std::collections::HashMap;

use crate::config::Settings;
use crate::session::Session;

/// The prefix marking command input.
pub const COMMAND_PREFIX: char = ':';

/// What a command asks the caller to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Plain textual output; the only pipeable kind.
    Text,
    /// Reset the session.
    NewSession,
    /// Enter visual selection mode.
    VisualMode,
    /// Enter visual generate mode.
    GenerateMode,
    /// Enter visual edit mode.
    EditMode,
    /// Enter visual branch mode.
    BranchMode,
    /// Enter history browsing mode.
    HistoryMode,
    /// Quit the application.
    Quit,
}

/// Structured result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub action: CommandAction,
    pub payload: String,
}

impl CommandOutput {
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            action: CommandAction::Text,
            payload: payload.into(),
        }
    }

    pub fn transition(action: CommandAction) -> Self {
        Self {
            action,
            payload: String::new(),
        }
    }
}

/// A command handler: arguments plus the session it may mutate.
pub type CommandHandler = Box<dyn Fn(&str, &mut Session) -> (CommandOutput, bool) + Send + Sync>;

/// Provides argument suggestions for a command, keyed by current config.
pub type ArgumentCompleter = fn(&Settings) -> Vec<String>;

struct RegisteredCommand {
    handler: CommandHandler,
    completer: Option<ArgumentCompleter>,
    description: &'static str,
}

/// Explicit command registry.
pub struct CommandRegistry {
    commands: HashMap<String, RegisteredCommand>,
}

/// Builder for a [`CommandRegistry`].
#[derive(Default)]
pub struct CommandRegistryBuilder {
    commands: HashMap<String, RegisteredCommand>,
}

impl CommandRegistryBuilder {
    pub fn register(
        mut self,
        name: &str,
        description: &'static str,
        handler: impl Fn(&str, &mut Session) -> (CommandOutput, bool) + Send + Sync + 'static,
        completer: Option<ArgumentCompleter>,
    ) -> Self {
        self.commands.insert(
            name.to_string(),
            RegisteredCommand {
                handler: Box::new(handler),
                completer,
                description,
            },
        );
        self
    }

    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            commands: self.commands,
        }
    }
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::default()
    }

    /// The registry with the built-in command set.
    pub fn builtin() -> Self {
        builtin::register_all(Self::builder()).build()
    }

    /// Available command names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// `(name, description)` pairs for help output, sorted by name.
    pub fn descriptions(&self) -> Vec<(String, &'static str)> {
        let mut rows: Vec<(String, &'static str)> = self
            .commands
            .iter()
            .map(|(name, cmd)| (name.clone(), cmd.description))
            .collect();
        rows.sort();
        rows
    }

    /// Argument suggestions for a command, if it has a completer.
    pub fn argument_suggestions(&self, command: &str, settings: &Settings) -> Vec<String> {
        self.commands
            .get(command)
            .and_then(|cmd| cmd.completer)
            .map(|completer| completer(settings))
            .unwrap_or_default()
    }

    /// Dispatch command input (including the leading prefix), running the
    /// full pipeline. Returns the final output and success flag.
    pub fn dispatch(&self, input: &str, session: &mut Session) -> (CommandOutput, bool) {
        let Some(rest) = input.strip_prefix(COMMAND_PREFIX) else {
            return (
                CommandOutput::text(format!(
                    "Invalid command syntax. Use {}<command> [args]",
                    COMMAND_PREFIX
                )),
                false,
            );
        };

        let segments = pipeline::split_pipeline(rest);
        if segments.iter().any(|s| s.trim().is_empty()) {
            return (CommandOutput::text("empty command"), false);
        }

        let mut previous: Option<(CommandOutput, bool)> = None;
        for segment in segments {
            let piped_args = match previous {
                None => None,
                Some((output, ok)) => {
                    if !ok {
                        // A failed segment fails the whole pipeline.
                        return (output, false);
                    }
                    if output.action != CommandAction::Text {
                        return (
                            CommandOutput::text("cannot pipe: previous command output is not pipeable"),
                            false,
                        );
                    }
                    Some(normalize_whitespace(&output.payload))
                }
            };

            let mut tokens = segment.split_whitespace();
            let name = tokens.next().unwrap_or_default().to_string();
            let mut args = tokens.collect::<Vec<_>>().join(" ");
            if let Some(piped) = piped_args {
                if args.is_empty() {
                    args = piped;
                } else if !piped.is_empty() {
                    args = format!("{} {}", args, piped);
                }
            }

            let Some(command) = self.commands.get(&name) else {
                return (
                    CommandOutput::text(format!("Unknown command: {}", name)),
                    false,
                );
            };

            previous = Some((command.handler)(&args, session));
        }

        previous.unwrap_or((CommandOutput::text("empty command"), false))
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n b\tc "), "a b c");
        assert_eq!(normalize_whitespace(""), "");
    }

    fn echo_registry() -> CommandRegistry {
        CommandRegistry::builder()
            .register(
                "echo",
                "Echo arguments.",
                |args, _s| (CommandOutput::text(args.to_string()), true),
                None,
            )
            .register(
                "fail",
                "Always fails.",
                |_args, _s| (CommandOutput::text("boom"), false),
                None,
            )
            .register(
                "quitcmd",
                "Transition.",
                |_args, _s| (CommandOutput::transition(CommandAction::Quit), true),
                None,
            )
            .build()
    }

    fn test_session() -> Session {
        crate::session::testing::blank_session()
    }

    #[test]
    fn test_dispatch_unknown_command() {
        let registry = echo_registry();
        let mut session = test_session();
        let (output, ok) = registry.dispatch(":nope", &mut session);
        assert!(!ok);
        assert!(output.payload.contains("Unknown command: nope"));
    }

    #[test]
    fn test_dispatch_pipes_normalized_output() {
        let registry = echo_registry();
        let mut session = test_session();
        let (output, ok) = registry.dispatch(":echo  a   b | echo", &mut session);
        assert!(ok);
        assert_eq!(output.payload, "a b");
    }

    #[test]
    fn test_dispatch_appends_piped_args_after_own() {
        let registry = echo_registry();
        let mut session = test_session();
        let (output, ok) = registry.dispatch(":echo tail | echo head", &mut session);
        assert!(ok);
        assert_eq!(output.payload, "head tail");
    }

    #[test]
    fn test_pipeline_fails_on_failed_segment() {
        let registry = echo_registry();
        let mut session = test_session();
        let (output, ok) = registry.dispatch(":fail | echo", &mut session);
        assert!(!ok);
        assert_eq!(output.payload, "boom");
    }

    #[test]
    fn test_pipeline_fails_on_non_pipeable_output() {
        let registry = echo_registry();
        let mut session = test_session();
        let (output, ok) = registry.dispatch(":quitcmd | echo", &mut session);
        assert!(!ok);
        assert!(output.payload.contains("not pipeable"));
    }

    #[test]
    fn test_empty_segment_is_hard_error() {
        let registry = echo_registry();
        let mut session = test_session();
        let (output, ok) = registry.dispatch(":echo a | | echo b", &mut session);
        assert!(!ok);
        assert_eq!(output.payload, "empty command");
    }

    #[test]
    fn test_bare_prefix_is_invalid() {
        let registry = echo_registry();
        let mut session = test_session();
        let (output, ok) = registry.dispatch(":", &mut session);
        assert!(!ok);
        assert_eq!(output.payload, "empty command");
    }
}
