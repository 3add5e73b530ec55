// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session management
//!
//! The [`Session`] is the aggregate root: it owns the conversation
//! messages, the active mode strategy, the configuration, and the handle
//! of the in-flight generation (at most one at a time). All methods are
//! synchronous and non-blocking; generation output arrives through the
//! stream returned by [`Event::GenerationStarted`], and the caller feeds
//! fragments back via [`Session::append_to_last`].

pub mod event;

pub use event::Event;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::commands::{CommandAction, CommandRegistry, COMMAND_PREFIX};
use crate::config::{Mode, Settings};
use crate::error::{Result, SageError};
use crate::generation::{GenerationService, Generator};
use crate::history::{ConversationData, HistoryStore};
use crate::message::{Message, MessageKind};
use crate::modes::{strategy_for, ModeStrategy};
use crate::source::{FsSourceLoader, SourceLoader};
use crate::tools::ToolRegistry;

const DEFAULT_TITLE: &str = "New Chat";

/// Relative directory holding pasted images; the only place
/// `delete_messages` will clean up files from.
const IMAGES_DIR: &str = ".sage/images";

const TITLE_PROMPT: &str = "Generate a short title (at most six words, no quotes) for a \
conversation that starts with the following prompt:\n\n{{PROMPT}}";

/// Manages the state of a single conversation.
pub struct Session {
    config: Settings,
    root: PathBuf,
    registry: Arc<CommandRegistry>,
    tools: Arc<ToolRegistry>,
    loader: Arc<dyn SourceLoader>,
    generator: Generator,
    history: Arc<HistoryStore>,
    strategy: Box<dyn ModeStrategy>,
    messages: Vec<Message>,
    cancel: Option<CancellationToken>,
    title: String,
    title_generated: bool,
    history_filename: String,
    created_at: DateTime<Utc>,
    tool_rounds: usize,
}

/// Builder for constructing [`Session`] instances at the composition root.
pub struct SessionBuilder {
    settings: Settings,
    root: PathBuf,
    service: Option<Arc<dyn GenerationService>>,
    loader: Option<Arc<dyn SourceLoader>>,
    registry: Option<Arc<CommandRegistry>>,
    tools: Option<Arc<ToolRegistry>>,
    initial_messages: Vec<Message>,
}

impl SessionBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            root: std::env::current_dir().unwrap_or_default(),
            service: None,
            loader: None,
            registry: None,
            tools: None,
            initial_messages: Vec::new(),
        }
    }

    /// Set the working-tree root (defaults to the current directory).
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the generation service (required).
    pub fn with_service(mut self, service: Arc<dyn GenerationService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Set the source loader (defaults to a filesystem loader at the root).
    pub fn with_loader(mut self, loader: Arc<dyn SourceLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the command registry (defaults to the built-in set).
    pub fn with_registry(mut self, registry: Arc<CommandRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the tool registry (defaults to the built-in set at the root).
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Seed the session with messages (used by branch and load).
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.initial_messages = messages;
        self
    }

    pub fn build(self) -> Result<Session> {
        let service = self
            .service
            .ok_or_else(|| SageError::Config("no generation service set".into()))?;
        let tools = self
            .tools
            .unwrap_or_else(|| Arc::new(ToolRegistry::builtin(&self.root)));
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(FsSourceLoader::new(&self.root)));
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(CommandRegistry::builtin()));
        let history = Arc::new(HistoryStore::open(&self.root)?);
        let strategy = strategy_for(self.settings.mode, &tools);

        Ok(Session {
            strategy,
            config: self.settings,
            root: self.root,
            registry,
            tools,
            loader,
            generator: Generator::new(service),
            history,
            messages: self.initial_messages,
            cancel: None,
            title: DEFAULT_TITLE.to_string(),
            title_generated: false,
            history_filename: String::new(),
            created_at: Utc::now(),
            tool_rounds: 0,
        })
    }
}

impl Session {
    /// Create a builder for constructing a session.
    pub fn builder(settings: Settings) -> SessionBuilder {
        SessionBuilder::new(settings)
    }

    // ---- input routing ----

    /// Process user input: a prompt, or a `:command` pipeline.
    pub fn handle_input(&mut self, input: &str) -> Event {
        self.handle_input_opts(input, false)
    }

    /// Like [`Session::handle_input`] but without echoing the command
    /// message into history. Used by programmatic front ends.
    pub fn handle_input_silent(&mut self, input: &str) -> Event {
        self.handle_input_opts(input, true)
    }

    fn handle_input_opts(&mut self, input: &str, silent: bool) -> Event {
        if input.trim().is_empty() {
            return Event::NoOp;
        }

        if !input.starts_with(COMMAND_PREFIX) {
            // A new user prompt.
            self.tool_rounds = 0;
            self.messages.push(Message::user(input));
            return self.start_generation();
        }

        let registry = self.registry.clone();
        let (output, success) = registry.dispatch(input, self);

        if success {
            match output.action {
                CommandAction::Text => {}
                CommandAction::NewSession => {
                    self.new_session();
                    return Event::NewSessionStarted;
                }
                CommandAction::VisualMode => return Event::VisualModeStarted,
                CommandAction::GenerateMode => return Event::GenerateModeStarted,
                CommandAction::EditMode => return Event::EditModeStarted,
                CommandAction::BranchMode => return Event::BranchModeStarted,
                CommandAction::HistoryMode => return Event::HistoryModeStarted,
                CommandAction::Quit => return Event::Quit,
            }
        }

        if !silent {
            self.messages.push(Message::command(input));
        }
        if success {
            self.messages.push(Message::command_result(output.payload));
        } else {
            self.messages.push(Message::command_error(output.payload));
        }
        Event::MessagesUpdated
    }

    // ---- generation lifecycle ----

    /// Start a generation for the current conversation.
    ///
    /// Context is reloaded first so file edits are always reflected; a
    /// reload failure aborts the turn with an error message. On success
    /// an empty assistant placeholder is appended and the fragment stream
    /// is handed to the caller.
    pub fn start_generation(&mut self) -> Event {
        if let Err(e) = self.reload_context() {
            warn!(error = %e, "context reload failed before generation");
            self.messages.push(Message::command_error(format!(
                "Failed to reload context before generation:\n{}",
                e
            )));
            return Event::MessagesUpdated;
        }

        let prompt = self.strategy.build_prompt(&self.messages);

        let images = match self.collect_recent_images() {
            Ok(images) => images,
            Err(e) => {
                self.messages.push(Message::command_error(format!(
                    "Failed to resolve image attachments:\n{}",
                    e
                )));
                return Event::MessagesUpdated;
            }
        };

        // At most one generation per session: cancel any in-flight task
        // before starting the next.
        if let Some(previous) = self.cancel.take() {
            previous.cancel();
        }

        let config = self.strategy.generation_config(&self.config);
        let (stream, cancel) = self.generator.start(prompt, images, config);
        self.cancel = Some(cancel);

        // Placeholder the streamed fragments accumulate onto.
        self.messages.push(Message::assistant(""));

        Event::GenerationStarted(stream)
    }

    /// Cancel any ongoing generation. Idempotent; safe with none active.
    pub fn cancel_generation(&self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }

    /// Whether a generation is in flight.
    pub fn is_generating(&self) -> bool {
        self.cancel.is_some()
    }

    /// Mark the in-flight generation finished (stream closed).
    pub fn complete_generation(&mut self) {
        self.cancel = None;
    }

    /// Truncate history to the prompt at `index` and regenerate. The
    /// addressed message must be a user prompt or an image.
    pub fn regenerate_from(&mut self, index: usize) -> Event {
        let valid = self
            .messages
            .get(index)
            .map(|m| matches!(m.kind, MessageKind::User | MessageKind::Image))
            .unwrap_or(false);
        if !valid {
            self.messages
                .push(Message::command_error("Invalid index for regeneration."));
            return Event::MessagesUpdated;
        }

        self.messages.truncate(index + 1);
        self.start_generation()
    }

    /// Run the agent tool loop against the last assistant response.
    /// No-op outside agent mode.
    pub fn process_ai_response(&mut self) -> Event {
        if !self.strategy.handles_tool_calls() {
            return Event::NoOp;
        }
        crate::agent::process_response(self)
    }

    // Collect inline images attached immediately before the new user
    // turn, oldest first, resolved to raw bytes.
    fn collect_recent_images(&self) -> Result<Vec<Vec<u8>>> {
        let mut paths: Vec<&Message> = Vec::new();
        for msg in self.messages.iter().rev().skip(1) {
            if msg.kind == MessageKind::Image {
                paths.push(msg);
            } else if msg.is_turn_boundary() {
                break;
            }
        }
        paths.reverse();

        paths
            .into_iter()
            .map(|msg| match &msg.aux_data {
                Some(payload) => base64::engine::general_purpose::STANDARD
                    .decode(payload)
                    .map_err(|e| {
                        SageError::Session(format!("bad inline image {}: {}", msg.content, e))
                    }),
                None => std::fs::read(self.root.join(&msg.content)).map_err(|e| {
                    SageError::Session(format!("cannot read image {}: {}", msg.content, e))
                }),
            })
            .collect()
    }

    // ---- message plumbing ----

    /// The current conversation messages.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append a message (UI notices, pasted images).
    pub fn add_message(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// Replace the last message (error fragments replacing the placeholder).
    pub fn replace_last_message(&mut self, msg: Message) {
        if let Some(last) = self.messages.last_mut() {
            *last = msg;
        }
    }

    /// Append streamed text onto the last message's content.
    pub fn append_to_last(&mut self, fragment: &str) {
        if let Some(last) = self.messages.last_mut() {
            last.content.push_str(fragment);
        }
    }

    /// Remove the trailing user/assistant pair after a failed or
    /// cancelled generation.
    pub fn remove_last_interaction(&mut self) {
        if self.messages.len() >= 2 {
            self.messages.truncate(self.messages.len() - 2);
        }
    }

    /// Edit a user message in place. Only `User` messages may be edited.
    pub fn edit_message(&mut self, index: usize, new_content: impl Into<String>) -> Result<()> {
        let len = self.messages.len();
        let msg = self
            .messages
            .get_mut(index)
            .ok_or_else(|| SageError::Session(format!("index out of bounds: {} (len {})", index, len)))?;
        if msg.kind != MessageKind::User {
            return Err(SageError::Session(format!(
                "can only edit user messages, but got {:?} at index {}",
                msg.kind, index
            )));
        }
        msg.content = new_content.into();
        Ok(())
    }

    /// Remove the messages at `indices` in one batch. Image files under
    /// the session's image directory are cleaned up best-effort.
    pub fn delete_messages(&mut self, indices: &[usize]) {
        if indices.is_empty() {
            return;
        }

        let to_delete: std::collections::HashSet<usize> = indices
            .iter()
            .copied()
            .filter(|&i| i < self.messages.len())
            .collect();

        for &idx in &to_delete {
            let msg = &self.messages[idx];
            if msg.kind != MessageKind::Image || msg.aux_data.is_some() {
                continue;
            }
            if !Path::new(&msg.content).starts_with(IMAGES_DIR) {
                warn!(path = %msg.content, "skipping image cleanup outside the images directory");
                continue;
            }
            let full = self.root.join(&msg.content);
            if let Err(e) = std::fs::remove_file(&full) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %full.display(), error = %e, "failed to delete image file");
                }
            }
        }

        let mut index = 0;
        self.messages.retain(|_| {
            let keep = !to_delete.contains(&index);
            index += 1;
            keep
        });
    }

    // ---- mode & context ----

    /// Switch the active mode. The strategy is replaced first; a failed
    /// context reload leaves the switch in place and reports the error.
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.config.mode = mode;
        self.strategy = strategy_for(mode, &self.tools);
        self.reload_context()
    }

    /// Reload the active strategy's context from the loader.
    pub fn reload_context(&mut self) -> Result<()> {
        self.strategy.load_context(&self.config, self.loader.as_ref())
    }

    /// The full prompt that would be sent right now (token counting, UI).
    pub fn current_prompt(&self) -> String {
        self.strategy.build_prompt(&self.messages)
    }

    // ---- title ----

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_title_generated(&self) -> bool {
        self.title_generated
    }

    /// Manually set the title. Blank input is ignored.
    pub fn set_title(&mut self, title: &str) {
        if title.trim().is_empty() {
            return;
        }
        self.title = title.to_string();
        self.title_generated = true;
    }

    /// Generate a title from the first user prompt, once per session.
    /// Falls back to the prompt's first words on service failure.
    pub async fn generate_title(&mut self, user_prompt: &str) -> String {
        // Set first to prevent concurrent calls.
        self.title_generated = true;

        let prompt = TITLE_PROMPT.replace("{{PROMPT}}", user_prompt);
        match self
            .generator
            .generate_title(&prompt, &self.config.generation)
            .await
        {
            Ok(title) if !title.trim().is_empty() => {
                // Models sometimes add quotes.
                self.title = title.trim().trim_matches('"').to_string();
            }
            Ok(_) => {
                self.title = fallback_title(user_prompt);
            }
            Err(e) => {
                warn!(error = %e, "title generation failed, falling back to first words");
                self.title = fallback_title(user_prompt);
            }
        }
        self.title.clone()
    }

    // ---- persistence, branching, reset ----

    /// Persist the conversation. A fresh, unmodified session is skipped.
    pub fn save_conversation(&mut self) -> Result<()> {
        let snippet = crate::history::render_messages(&self.messages);
        if snippet.is_empty() && self.title == DEFAULT_TITLE {
            return Ok(());
        }

        if self.history_filename.is_empty() {
            self.history_filename = format!("{}.md", self.created_at.timestamp());
        }

        let data = ConversationData {
            filename: self.history_filename.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            messages: self.messages.clone(),
            sources: self.config.sources.clone(),
        };
        self.history.save(&data)
    }

    /// Load a conversation from history, replacing the current state.
    /// The current conversation is saved first (non-fatally).
    pub fn load_conversation(&mut self, filename: &str) -> Result<()> {
        if !self.messages.is_empty() {
            if let Err(e) = self.save_conversation() {
                warn!(error = %e, "could not save current conversation before loading another");
            }
        }

        let (metadata, messages) = self.history.load(filename)?;

        self.messages = messages;
        self.title = metadata.title;
        self.title_generated = true;
        self.created_at = metadata.created_at;
        self.history_filename = filename.to_string();
        self.config.sources = metadata.sources;
        self.tool_rounds = 0;

        self.reload_context()
    }

    /// Persist and create a new independent session owning a copy of
    /// messages `[0..=end_index]`. This session is unaffected.
    pub fn branch(&mut self, end_index: usize) -> Result<Session> {
        if end_index >= self.messages.len() {
            return Err(SageError::Session(format!(
                "invalid index for branching: {}",
                end_index
            )));
        }

        self.save_conversation()?;

        let mut branched = Session {
            config: self.config.clone(),
            root: self.root.clone(),
            registry: self.registry.clone(),
            tools: self.tools.clone(),
            loader: self.loader.clone(),
            generator: self.generator.clone(),
            history: self.history.clone(),
            strategy: strategy_for(self.config.mode, &self.tools),
            messages: self.messages[..=end_index].to_vec(),
            cancel: None,
            title: DEFAULT_TITLE.to_string(),
            title_generated: false,
            history_filename: String::new(),
            created_at: Utc::now(),
            tool_rounds: 0,
        };
        branched.reload_context()?;
        Ok(branched)
    }

    /// Persist the conversation (unless fresh) and reset to a new
    /// session, restoring the on-disk source scoping.
    pub fn new_session(&mut self) {
        if let Err(e) = self.save_conversation() {
            warn!(error = %e, "could not save conversation for new session");
        }

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }

        self.messages.clear();
        self.title = DEFAULT_TITLE.to_string();
        self.title_generated = false;
        self.created_at = Utc::now();
        self.history_filename.clear();
        self.tool_rounds = 0;

        // Ad-hoc :file/:exclude edits do not survive a reset.
        self.config.sources = Settings::load(&self.root)
            .map(|s| s.sources)
            .unwrap_or_default();

        self.strategy = strategy_for(self.config.mode, &self.tools);
        if let Err(e) = self.reload_context() {
            warn!(error = %e, "context reload failed for new session");
            self.messages.push(Message::command_error(format!(
                "Failed to reload context for new session: {}",
                e
            )));
        }
    }

    // ---- accessors ----

    pub fn config(&self) -> &Settings {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Settings {
        &mut self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn command_registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn history_filename(&self) -> &str {
        &self.history_filename
    }

    pub(crate) fn tool_rounds(&self) -> usize {
        self.tool_rounds
    }

    pub(crate) fn bump_tool_rounds(&mut self) {
        self.tool_rounds += 1;
    }

    pub(crate) fn reset_tool_rounds(&mut self) {
        self.tool_rounds = 0;
    }
}

/// First words of the prompt, used when title generation fails.
fn fallback_title(prompt: &str) -> String {
    let words: Vec<&str> = prompt.split_whitespace().collect();
    let take = words.len().min(5);
    let mut title = words[..take].join(" ");
    if words.len() > take {
        title.push_str("...");
    }
    title
}

#[cfg(test)]
pub mod testing {
    //! Session fixtures shared by unit tests.

    use super::*;
    use crate::generation::MockGenerationService;
    use crate::source::StaticSourceLoader;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    /// A fresh root directory under the system temp dir.
    pub fn unique_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "sage-test-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    /// A session wired to an empty mock service and static loader.
    pub fn blank_session() -> Session {
        session_with_scripts(vec![])
    }

    /// A session whose mock service replays the given fragment lists.
    pub fn session_with_scripts(scripts: Vec<Vec<String>>) -> Session {
        Session::builder(Settings::default())
            .with_root(unique_root())
            .with_service(Arc::new(MockGenerationService::scripted(scripts)))
            .with_loader(Arc::new(StaticSourceLoader::empty()))
            .build()
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{blank_session, session_with_scripts, unique_root};
    use super::*;
    use crate::generation::MockGenerationService;
    use crate::source::StaticSourceLoader;

    async fn drain(session: &mut Session, event: Event) -> String {
        let mut stream = event.into_stream().expect("expected GenerationStarted");
        let mut text = String::new();
        while let Some(fragment) = stream.next_fragment().await {
            if crate::generation::is_error_fragment(&fragment) {
                session.replace_last_message(Message::command_error(fragment.clone()));
            } else {
                session.append_to_last(&fragment);
            }
            text.push_str(&fragment);
        }
        session.complete_generation();
        text
    }

    #[tokio::test]
    async fn test_blank_input_is_noop() {
        let mut session = blank_session();
        assert!(matches!(session.handle_input("   "), Event::NoOp));
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_prompt_appends_user_and_placeholder() {
        let mut session = session_with_scripts(vec![vec!["hey".to_string()]]);
        let event = session.handle_input("hi");

        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0], Message::user("hi"));
        assert_eq!(session.messages()[1], Message::assistant(""));
        assert!(session.is_generating());

        drain(&mut session, event).await;
        assert_eq!(session.messages()[1], Message::assistant("hey"));
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn test_immediate_close_leaves_empty_placeholder() {
        let mut session = session_with_scripts(vec![vec![]]);
        let event = session.handle_input("hi");
        drain(&mut session, event).await;

        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1], Message::assistant(""));
    }

    #[tokio::test]
    async fn test_error_fragment_replaces_placeholder() {
        let mut session =
            session_with_scripts(vec![vec!["Error: server returned 500".to_string()]]);
        let event = session.handle_input("hi");
        drain(&mut session, event).await;

        let last = session.messages().last().unwrap();
        assert_eq!(last.kind, MessageKind::CommandError);
        assert!(last.content.contains("server returned 500"));
    }

    #[tokio::test]
    async fn test_context_failure_aborts_generation() {
        let mut session = Session::builder(Settings::default())
            .with_root(unique_root())
            .with_service(Arc::new(MockGenerationService::new()))
            .with_loader(Arc::new(StaticSourceLoader::failing("disk gone")))
            .build()
            .unwrap();

        let event = session.handle_input("hi");
        assert!(matches!(event, Event::MessagesUpdated));
        let last = session.messages().last().unwrap();
        assert_eq!(last.kind, MessageKind::CommandError);
        assert!(last.content.contains("disk gone"));
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn test_command_appends_echo_and_result() {
        let mut session = blank_session();
        let event = session.handle_input(":model");
        assert!(matches!(event, Event::MessagesUpdated));

        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[0].kind, MessageKind::Command);
        assert_eq!(session.messages()[1].kind, MessageKind::CommandResult);
    }

    #[tokio::test]
    async fn test_silent_command_skips_echo() {
        let mut session = blank_session();
        session.handle_input_silent(":model");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].kind, MessageKind::CommandResult);
    }

    #[tokio::test]
    async fn test_unknown_command_is_error_message() {
        let mut session = blank_session();
        session.handle_input(":frobnicate");
        assert_eq!(session.messages()[1].kind, MessageKind::CommandError);
        assert!(session.messages()[1].content.contains("Unknown command"));
    }

    #[tokio::test]
    async fn test_mode_transition_emits_event_without_logging() {
        let mut session = blank_session();
        session.add_message(Message::user("hi"));
        let event = session.handle_input(":visual");
        assert!(matches!(event, Event::VisualModeStarted));
        // Nothing logged for a transition.
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_quit_event() {
        let mut session = blank_session();
        assert!(matches!(session.handle_input(":q"), Event::Quit));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let mut session = session_with_scripts(vec![vec!["x".to_string()]]);
        session.cancel_generation();

        let event = session.handle_input("hi");
        session.cancel_generation();
        session.cancel_generation();
        drain(&mut session, event).await;
        session.cancel_generation();
    }

    #[tokio::test]
    async fn test_regenerate_from_invalid_index() {
        let mut session = session_with_scripts(vec![vec!["a".to_string()]]);
        let event = session.handle_input("hi");
        drain(&mut session, event).await;

        let before = session.messages().len();
        // Index 1 is the assistant message.
        let event = session.regenerate_from(1);
        assert!(matches!(event, Event::MessagesUpdated));
        assert_eq!(session.messages().len(), before + 1);
        assert_eq!(
            session.messages().last().unwrap().kind,
            MessageKind::CommandError
        );
    }

    #[tokio::test]
    async fn test_regenerate_truncates_and_restarts() {
        let mut session = session_with_scripts(vec![
            vec!["first".to_string()],
            vec!["second".to_string()],
        ]);
        let event = session.handle_input("hi");
        drain(&mut session, event).await;
        assert_eq!(session.messages()[1], Message::assistant("first"));

        let event = session.regenerate_from(0);
        drain(&mut session, event).await;
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1], Message::assistant("second"));
    }

    #[tokio::test]
    async fn test_edit_message_only_user() {
        let mut session = blank_session();
        session.add_message(Message::user("one"));
        session.add_message(Message::assistant("two"));

        session.edit_message(0, "edited").unwrap();
        assert_eq!(session.messages()[0].content, "edited");

        assert!(session.edit_message(1, "nope").is_err());
        assert!(session.edit_message(9, "nope").is_err());
    }

    #[tokio::test]
    async fn test_delete_messages_batch() {
        let mut session = blank_session();
        session.add_message(Message::user("a"));
        session.add_message(Message::assistant("b"));
        session.add_message(Message::user("c"));

        session.delete_messages(&[0, 2, 99]);
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "b");
    }

    #[tokio::test]
    async fn test_delete_image_cleans_up_file() {
        let mut session = blank_session();
        let images = session.root().join(IMAGES_DIR);
        std::fs::create_dir_all(&images).unwrap();
        let file = images.join("shot.png");
        std::fs::write(&file, b"png").unwrap();

        session.add_message(Message::image(format!("{}/shot.png", IMAGES_DIR)));
        session.delete_messages(&[0]);

        assert!(session.messages().is_empty());
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_branch_copies_prefix_and_isolates() {
        let mut session = blank_session();
        session.add_message(Message::user("one"));
        session.add_message(Message::assistant("two"));
        session.add_message(Message::user("three"));
        session.set_title("Parent");

        let mut branched = session.branch(1).unwrap();
        assert_eq!(branched.messages().len(), 2);
        assert_eq!(branched.messages(), &session.messages()[..2]);

        branched.edit_message(0, "mutated").unwrap();
        assert_eq!(session.messages()[0].content, "one");
        assert_eq!(session.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_branch_out_of_bounds_fails() {
        let mut session = blank_session();
        session.add_message(Message::user("one"));
        assert!(session.branch(5).is_err());
    }

    #[tokio::test]
    async fn test_new_session_resets_state() {
        let mut session = blank_session();
        session.add_message(Message::user("hello"));
        session.set_title("Something");
        session.config_mut().sources.dirs = vec!["src".to_string()];

        session.new_session();
        assert!(session.messages().is_empty());
        assert_eq!(session.title(), DEFAULT_TITLE);
        assert!(!session.is_title_generated());
        // Ad-hoc scoping edits are gone.
        assert!(session.config().sources.dirs.is_empty());
    }

    #[tokio::test]
    async fn test_save_load_round_trip_via_session() {
        let mut session = blank_session();
        session.add_message(Message::user("hello"));
        session.add_message(Message::assistant("world"));
        session.set_title("Round Trip");
        session.save_conversation().unwrap();
        let filename = session.history_filename().to_string();
        assert!(!filename.is_empty());

        let (metadata, messages) = session.history().load(&filename).unwrap();
        assert_eq!(metadata.title, "Round Trip");
        assert_eq!(messages.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_last_interaction() {
        let mut session = blank_session();
        session.add_message(Message::user("keep"));
        session.add_message(Message::user("drop-user"));
        session.add_message(Message::assistant("drop-ai"));

        session.remove_last_interaction();
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].content, "keep");

        // Too short to remove a pair.
        session.remove_last_interaction();
        assert_eq!(session.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_current_prompt_matches_strategy() {
        let mut session = blank_session();
        session.add_message(Message::user("show me"));
        let prompt = session.current_prompt();
        assert!(prompt.contains("User:\nshow me"));
        assert!(prompt.ends_with("AI Assistant:\n"));
    }

    #[tokio::test]
    async fn test_fresh_session_not_saved() {
        let mut session = blank_session();
        session.save_conversation().unwrap();
        assert!(session.history_filename().is_empty());
        assert!(session.history().list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_conversation_restores_state() {
        let mut session = blank_session();
        session.add_message(Message::user("saved prompt"));
        session.add_message(Message::assistant("saved reply"));
        session.set_title("Saved");
        session.config_mut().sources.dirs = vec!["src".to_string()];
        session.save_conversation().unwrap();
        let filename = session.history_filename().to_string();

        session.new_session();
        assert!(session.messages().is_empty());

        session.load_conversation(&filename).unwrap();
        assert_eq!(session.title(), "Saved");
        assert!(session.is_title_generated());
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.config().sources.dirs, vec!["src".to_string()]);
    }

    #[tokio::test]
    async fn test_title_generation_and_fallback() {
        let service = Arc::new(MockGenerationService::new());
        service.set_once_response("\"Quoted Title\"");
        let mut session = Session::builder(Settings::default())
            .with_root(unique_root())
            .with_service(service)
            .with_loader(Arc::new(StaticSourceLoader::empty()))
            .build()
            .unwrap();

        let title = session.generate_title("explain lifetimes").await;
        assert_eq!(title, "Quoted Title");
        assert!(session.is_title_generated());

        // Service failure falls back to the first words.
        let mut failing = blank_session();
        let title = failing
            .generate_title("one two three four five six seven")
            .await;
        assert_eq!(title, "one two three four five...");
    }

    #[tokio::test]
    async fn test_set_title_ignores_blank() {
        let mut session = blank_session();
        session.set_title("   ");
        assert_eq!(session.title(), DEFAULT_TITLE);
        session.set_title("Real");
        assert_eq!(session.title(), "Real");
    }

    #[tokio::test]
    async fn test_images_collected_backward_in_order() {
        use base64::Engine as _;
        let payload_a = base64::engine::general_purpose::STANDARD.encode(b"img-a");
        let payload_b = base64::engine::general_purpose::STANDARD.encode(b"img-b");

        let service = Arc::new(MockGenerationService::scripted(vec![vec![]]));
        let mut session = Session::builder(Settings::default())
            .with_root(unique_root())
            .with_service(service.clone())
            .with_loader(Arc::new(StaticSourceLoader::empty()))
            .build()
            .unwrap();

        session.add_message(Message::user("earlier turn"));
        session.add_message(Message::inline_image("a.png", payload_a));
        session.add_message(Message::inline_image("b.png", payload_b));
        let event = session.handle_input("what do you see?");
        drain(&mut session, event).await;

        assert_eq!(service.image_counts(), vec![2]);
    }

    #[tokio::test]
    async fn test_single_flight_cancels_previous() {
        let mut session = session_with_scripts(vec![
            vec!["slow".to_string()],
            vec!["fast".to_string()],
        ]);
        let first = session.handle_input("one");
        let mut first_stream = first.into_stream().unwrap();

        // Start a second generation without draining the first.
        let second = session.handle_input("two");
        // The first stream still closes (task exits on cancel or drain).
        while first_stream.next_fragment().await.is_some() {}
        drain(&mut session, second).await;
    }

    #[tokio::test]
    async fn test_mode_switch_reloads_context() {
        let mut session = blank_session();
        session.set_mode(Mode::Agent).unwrap();
        assert_eq!(session.config().mode, Mode::Agent);

        session.set_mode(Mode::Chat).unwrap();
        assert_eq!(session.config().mode, Mode::Chat);
    }
}
