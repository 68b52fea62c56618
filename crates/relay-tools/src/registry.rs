// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use relay_model::{ToolCallRequest, ToolResult, ToolSchema};

use crate::{Tool, ToolContext};

/// Central registry holding all available tools, keyed by bare tool id.
///
/// Dispatch uses the dotted `tool.action` name from a [`ToolCallRequest`]:
/// the prefix selects the tool, the suffix is handed to it as the action.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.id().to_string(), Arc::new(tool));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(id).cloned()
    }

    /// Schemas for ALL registered tools, sorted by dotted name.
    pub fn catalog(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> =
            self.tools.values().flat_map(|t| t.catalog()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Schemas only for the tools an agent is allowed to use.
    /// `allowed` holds bare tool ids, not dotted action names.
    pub fn catalog_for(&self, allowed: &BTreeSet<String>) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .filter(|t| allowed.contains(t.id()))
            .flat_map(|t| t.catalog())
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tools.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Execute one tool call.  Unknown tools and malformed names come back
    /// as failed results.  The call runs on its own task so a panicking tool
    /// is absorbed into a failed result instead of tearing down the runner.
    pub async fn dispatch(&self, call: &ToolCallRequest, ctx: &ToolContext) -> ToolResult {
        let Some((tool_id, action)) = call.name.split_once('.') else {
            return ToolResult::err(format!(
                "malformed tool name: {} (expected tool.action)",
                call.name
            ));
        };
        let Some(tool) = self.tools.get(tool_id).cloned() else {
            return ToolResult::err(format!("unknown tool: {tool_id}"));
        };

        let action = action.to_string();
        let arguments = call.arguments.clone();
        let ctx = ctx.clone();
        let task =
            tokio::spawn(async move { tool.execute(&action, &arguments, &ctx).await });
        match task.await {
            Ok(result) => result,
            Err(e) => ToolResult::err(format!("tool execution panicked: {e}")),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
