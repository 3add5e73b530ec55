// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for agent mode
//!
//! A fixed set of tools the model can call through the JSON payload
//! protocol. The registry is an explicit object populated once at
//! composition time; registration order is deterministic.

pub mod builtin;

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SageError};

/// A single tool call from the model.
///
/// The model returns a JSON array of these objects:
/// `[{"tool": "read_files", "args": {"paths": ["README.md"]}}]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(rename = "tool")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

/// The result of executing a single tool call.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub call: ToolCall,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    /// Serialize to the `{tool, output?, error?}` wire shape.
    pub fn to_wire(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("tool".to_string(), Value::String(self.call.name.clone()));
        if !self.output.is_empty() {
            obj.insert("output".to_string(), Value::String(self.output.clone()));
        }
        if let Some(err) = &self.error {
            obj.insert("error".to_string(), Value::String(err.clone()));
        }
        Value::Object(obj)
    }
}

/// Argument description presented to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: String,
    pub description: String,
}

/// A tool definition presented to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "tool")]
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgumentDefinition>,
}

/// Tool implementation. Receives the call arguments and the full text of
/// the assistant response the call was extracted from (some tools, like
/// `upsert_files`, parse the response itself).
pub type ToolFn = fn(ctx: &ToolContext, args: &Map<String, Value>, last_response: &str) -> Result<String>;

/// Context shared by all tool executions.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Working-tree root all relative paths resolve against.
    pub root: PathBuf,
}

struct RegisteredTool {
    definition: ToolDefinition,
    run: ToolFn,
}

/// Explicit tool registry. Iteration order is name order.
pub struct ToolRegistry {
    context: ToolContext,
    tools: BTreeMap<String, RegisteredTool>,
}

/// Builder for a [`ToolRegistry`].
pub struct ToolRegistryBuilder {
    context: ToolContext,
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, definition: ToolDefinition, run: ToolFn) -> Self {
        self.tools
            .insert(definition.name.clone(), RegisteredTool { definition, run });
        self
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            context: self.context,
            tools: self.tools,
        }
    }
}

impl ToolRegistry {
    pub fn builder(root: impl Into<PathBuf>) -> ToolRegistryBuilder {
        ToolRegistryBuilder {
            context: ToolContext { root: root.into() },
            tools: BTreeMap::new(),
        }
    }

    /// The registry with the built-in tool set.
    pub fn builtin(root: impl Into<PathBuf>) -> Self {
        builtin::register_all(Self::builder(root)).build()
    }

    /// Registered tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    /// JSON document of all definitions, embedded in the agent role prompt.
    pub fn docs_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.definitions())?)
    }

    /// Execute a batch of calls in order. Failures never abort the batch;
    /// each lands in its result's `error` field, unknown names included.
    pub fn execute_calls(&self, calls: &[ToolCall], last_response: &str) -> Vec<ToolResult> {
        calls
            .iter()
            .map(|call| {
                let outcome = match self.tools.get(&call.name) {
                    Some(tool) => (tool.run)(&self.context, &call.args, last_response),
                    None => Err(SageError::ToolExecution(format!(
                        "tool '{}' not found",
                        call.name
                    ))),
                };
                match outcome {
                    Ok(output) => ToolResult {
                        call: call.clone(),
                        output,
                        error: None,
                    },
                    Err(err) => ToolResult {
                        call: call.clone(),
                        output: String::new(),
                        error: Some(err.to_string()),
                    },
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(_ctx: &ToolContext, args: &Map<String, Value>, _last: &str) -> Result<String> {
        Ok(args
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    fn always_fails(_ctx: &ToolContext, _args: &Map<String, Value>, _last: &str) -> Result<String> {
        Err(SageError::ToolExecution("broken".to_string()))
    }

    fn test_registry() -> ToolRegistry {
        ToolRegistry::builder("/tmp")
            .register(
                ToolDefinition {
                    name: "echo".to_string(),
                    description: "Echo text".to_string(),
                    args: vec![],
                },
                echo,
            )
            .register(
                ToolDefinition {
                    name: "broken".to_string(),
                    description: "Always fails".to_string(),
                    args: vec![],
                },
                always_fails,
            )
            .build()
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            name: name.to_string(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_call_wire_format_round_trip() {
        let parsed: Vec<ToolCall> =
            serde_json::from_str(r#"[{"tool": "echo", "args": {"text": "hi"}}]"#).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "echo");

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back[0]["tool"], "echo");
        assert_eq!(back[0]["args"]["text"], "hi");
    }

    #[test]
    fn test_args_optional_on_the_wire() {
        let parsed: Vec<ToolCall> = serde_json::from_str(r#"[{"tool": "list"}]"#).unwrap();
        assert!(parsed[0].args.is_empty());
        // And absent args are not re-serialized.
        let back = serde_json::to_string(&parsed[0]).unwrap();
        assert!(!back.contains("args"));
    }

    #[test]
    fn test_execute_success_and_failure_in_one_batch() {
        let registry = test_registry();
        let calls = vec![
            call("echo", serde_json::json!({"text": "ok"})),
            call("broken", serde_json::json!({})),
        ];
        let results = registry.execute_calls(&calls, "");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].output, "ok");
        assert!(results[0].error.is_none());
        assert!(results[1].error.as_deref().unwrap().contains("broken"));
    }

    #[test]
    fn test_unknown_tool_is_per_call_error() {
        let registry = test_registry();
        let results = registry.execute_calls(&[call("nope", serde_json::json!({}))], "");
        assert_eq!(results.len(), 1);
        assert!(results[0].error.as_deref().unwrap().contains("not found"));
    }

    #[test]
    fn test_result_wire_shape_omits_empty_fields() {
        let result = ToolResult {
            call: call("echo", serde_json::json!({})),
            output: "done".to_string(),
            error: None,
        };
        let wire = result.to_wire();
        assert_eq!(wire["tool"], "echo");
        assert_eq!(wire["output"], "done");
        assert!(wire.get("error").is_none());
    }

    #[test]
    fn test_definitions_sorted_by_name() {
        let registry = test_registry();
        assert_eq!(registry.names(), vec!["broken", "echo"]);
    }
}
