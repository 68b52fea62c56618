// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Control-envelope extraction for gateways without native tool calling.
//!
//! When a model cannot emit structured tool calls it is prompted to answer
//! with a JSON envelope instead: `{"tool_call": {"name": ..., "arguments":
//! ...}}` to invoke a tool, or `{"final_answer": "..."}` to finish.  This
//! module classifies raw assistant text against that protocol.

use serde::Deserialize;
use serde_json::Value;

use relay_model::ToolCallRequest;

/// What a piece of assistant text asks the loop to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// The text was a `tool_call` envelope.
    ToolCall(ToolCallRequest),
    /// The text was a `final_answer` envelope.
    FinalAnswer(String),
    /// Anything else.  Per protocol, plain text *is* the final answer;
    /// malformed JSON lands here rather than raising an error.
    PlainText(String),
}

#[derive(Deserialize)]
struct Envelope {
    tool_call: Option<EnvelopeCall>,
    final_answer: Option<String>,
}

#[derive(Deserialize)]
struct EnvelopeCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn strip_markdown_fence(text: &str) -> &str {
    let t = text.trim_start();
    if t.starts_with("```") {
        if let Some(nl) = t.find('\n') {
            let body = &t[nl + 1..];
            // Trim trailing closing fence
            if let Some(close) = body.rfind("\n```") {
                return &body[..close + 1];
            }
            return body;
        }
    }
    text
}

fn try_envelope(candidate: &str) -> Option<Directive> {
    let env: Envelope = serde_json::from_str(candidate.trim()).ok()?;
    if let Some(call) = env.tool_call {
        if call.name.is_empty() {
            return None;
        }
        return Some(Directive::ToolCall(ToolCallRequest {
            // The envelope carries no call id; results are matched by order.
            id: None,
            name: call.name,
            arguments: call.arguments,
        }));
    }
    env.final_answer.map(Directive::FinalAnswer)
}

/// Classify assistant text against the envelope protocol.
///
/// Tries the bare text first, then the text with a surrounding markdown
/// fence removed.  Text that parses as JSON but is not a recognised
/// envelope, or does not parse at all, is returned as
/// [`Directive::PlainText`] unchanged.
pub fn classify(text: &str) -> Directive {
    if let Some(d) = try_envelope(text) {
        return d;
    }
    let unfenced = strip_markdown_fence(text);
    if unfenced != text {
        if let Some(d) = try_envelope(unfenced) {
            return d;
        }
    }
    Directive::PlainText(text.to_string())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
