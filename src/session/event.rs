// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session events
//!
//! Every state-mutating session call returns an [`Event`] telling the
//! caller what happened and what to do next. Events are transient and
//! never persisted.

use crate::generation::GenerationStream;

/// The outcome of a session operation.
#[derive(Debug)]
pub enum Event {
    /// Nothing significant happened.
    NoOp,
    /// The message list changed; re-render.
    MessagesUpdated,
    /// A generation task started; consume the stream until it closes.
    GenerationStarted(GenerationStream),
    /// The session was reset.
    NewSessionStarted,
    /// Enter visual selection mode.
    VisualModeStarted,
    /// Enter visual generate mode.
    GenerateModeStarted,
    /// Enter visual edit mode.
    EditModeStarted,
    /// Enter visual branch mode.
    BranchModeStarted,
    /// Enter history browsing mode.
    HistoryModeStarted,
    /// Quit the application.
    Quit,
}

impl Event {
    /// Take the stream out of a `GenerationStarted` event.
    pub fn into_stream(self) -> Option<GenerationStream> {
        match self {
            Event::GenerationStarted(stream) => Some(stream),
            _ => None,
        }
    }
}
