// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Agent tool loop
//!
//! After a generation stream closes in agent mode, the last assistant
//! response is scanned for a tool-call payload. Extracted calls are
//! executed against the tool registry, each call/result pair is appended
//! to history, and generation re-enters so the model can react. The loop
//! terminates when a response carries no payload, or when the configured
//! round bound is hit.

use crate::message::{Message, MessageKind};
use crate::session::{Event, Session};
use crate::tools::ToolCall;

/// Extract a tool-call payload from an assistant response.
///
/// Accepts a fenced ```json block containing an array of
/// `{"tool", "args"}` objects, or the first balanced top-level JSON array
/// in the text that parses as one. Returns `None` when the response holds
/// no payload.
pub fn extract_tool_calls(content: &str) -> Option<Vec<ToolCall>> {
    for block in fenced_json_blocks(content) {
        if let Some(calls) = parse_calls(&block) {
            return Some(calls);
        }
    }

    let mut search_from = 0;
    while let Some(offset) = content[search_from..].find('[') {
        let start = search_from + offset;
        if let Some(end) = balanced_array_end(&content[start..]) {
            if let Some(calls) = parse_calls(&content[start..start + end]) {
                return Some(calls);
            }
        }
        search_from = start + 1;
    }

    None
}

fn parse_calls(candidate: &str) -> Option<Vec<ToolCall>> {
    let calls: Vec<ToolCall> = serde_json::from_str(candidate).ok()?;
    if calls.is_empty() {
        return None;
    }
    Some(calls)
}

fn fenced_json_blocks(content: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut lines = content.lines();
    while let Some(line) = lines.next() {
        let fence = line.trim();
        if fence != "```json" && fence != "```" {
            continue;
        }
        let mut body = String::new();
        for inner in lines.by_ref() {
            if inner.trim() == "```" {
                blocks.push(body);
                body = String::new();
                break;
            }
            body.push_str(inner);
            body.push('\n');
        }
    }
    blocks
}

/// Byte length of the balanced array starting at `text[0] == '['`,
/// respecting JSON string literals.
fn balanced_array_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Run one round of the tool loop against the session's last assistant
/// response. Called by `Session::process_ai_response` in agent mode.
pub(crate) fn process_response(session: &mut Session) -> Event {
    let Some(last) = session.messages().last() else {
        return Event::NoOp;
    };
    if last.kind != MessageKind::Assistant || last.content.is_empty() {
        return Event::NoOp;
    }
    let response = last.content.clone();

    let Some(calls) = extract_tool_calls(&response) else {
        session.reset_tool_rounds();
        return Event::NoOp;
    };

    let max_rounds = session.config().agent.max_tool_rounds;
    if session.tool_rounds() >= max_rounds {
        session.reset_tool_rounds();
        session.add_message(Message::command_error(format!(
            "Tool-call round limit reached ({}); stopping the agent loop.",
            max_rounds
        )));
        return Event::MessagesUpdated;
    }

    let results = session.tools().execute_calls(&calls, &response);
    for result in &results {
        let call_json = serde_json::to_string_pretty(&result.call)
            .unwrap_or_else(|_| format!("{{\"tool\": \"{}\"}}", result.call.name));
        session.add_message(Message::tool_call(call_json));

        let result_json = serde_json::to_string_pretty(&result.to_wire())
            .unwrap_or_else(|_| format!("{{\"tool\": \"{}\"}}", result.call.name));
        session.add_message(Message::tool_result(result_json));
    }

    session.bump_tool_rounds();
    session.start_generation()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_fenced_block() {
        let response = "I'll read it.\n```json\n[{\"tool\": \"read_files\", \"args\": {\"paths\": [\"a\"]}}]\n```\n";
        let calls = extract_tool_calls(response).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_files");
    }

    #[test]
    fn test_extract_from_bare_array() {
        let response = "Running: [{\"tool\": \"general_agent\", \"args\": {\"prompt\": \"x\"}}] now";
        let calls = extract_tool_calls(response).unwrap();
        assert_eq!(calls[0].name, "general_agent");
    }

    #[test]
    fn test_no_payload_yields_none() {
        assert!(extract_tool_calls("no json here").is_none());
        assert!(extract_tool_calls("").is_none());
        // An array that is not a tool-call array is not a payload.
        assert!(extract_tool_calls("values: [1, 2, 3]").is_none());
    }

    #[test]
    fn test_empty_array_is_no_payload() {
        assert!(extract_tool_calls("```json\n[]\n```").is_none());
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        let response = r#"[{"tool": "read_files", "args": {"paths": ["weird[0].txt"]}}]"#;
        let calls = extract_tool_calls(response).unwrap();
        assert_eq!(calls[0].args["paths"][0], "weird[0].txt");
    }

    #[test]
    fn test_first_parseable_array_wins() {
        let response = "scores [9/10] then [{\"tool\": \"main_agent\", \"args\": {\"prompt\": \"done\"}}]";
        let calls = extract_tool_calls(response).unwrap();
        assert_eq!(calls[0].name, "main_agent");
    }

    #[test]
    fn test_multiple_calls_preserved_in_order() {
        let response = "```json\n[{\"tool\": \"a\"}, {\"tool\": \"b\"}]\n```";
        let calls = extract_tool_calls(response).unwrap();
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
