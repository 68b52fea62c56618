// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use relay_model::{ToolCallRequest, ToolResult};

/// Events emitted by a run for observers (UIs, logs, tests).
///
/// Delivery is best-effort: a dropped receiver is ignored, and a run
/// produces the same outcome whether or not anyone is listening.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A complete text response from the model
    TextComplete(String),
    /// The model has requested a tool call
    ToolCallStarted(ToolCallRequest),
    /// A tool call finished
    ToolCallFinished {
        call_id: Option<String>,
        tool_name: String,
        result: ToolResult,
    },
    /// A supervisor handed a task to a sub-agent
    Delegated { sub_agent_id: String, task: String },
    /// The sub-agent run came back
    DelegationFinished { sub_agent_id: String, success: bool },
    /// The run reached a terminal state
    TurnComplete,
}
