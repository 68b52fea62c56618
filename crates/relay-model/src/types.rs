use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Transcript types ─────────────────────────────────────────────────────────

/// One entry in a session transcript.
///
/// The transcript is an append-only log: the runner only ever pushes new
/// turns, so a `Turn` captures everything needed to replay the conversation
/// to a gateway on the next round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    /// Text supplied by the caller (or synthesized by the supervisor as a
    /// corrective / result-feedback message).
    User { text: String },
    /// A model response: free text, requested tool calls, or both.
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    /// The outcome of one tool invocation, fed back to the model.
    ToolResult {
        /// Mirrors the id of the originating [`ToolCallRequest`].  `None` for
        /// calls that arrived through the JSON envelope (which carries no id).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        tool_name: String,
        result: ToolResult,
    },
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant { text: Some(text.into()), tool_calls: Vec::new() }
    }

    pub fn assistant_calls(text: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Assistant { text, tool_calls }
    }

    pub fn tool_result(
        call_id: Option<String>,
        tool_name: impl Into<String>,
        result: ToolResult,
    ) -> Self {
        Self::ToolResult { call_id, tool_name: tool_name.into(), result }
    }

    /// The plain text of this turn, when it has one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::User { text } => Some(text),
            Self::Assistant { text, .. } => text.as_deref(),
            Self::ToolResult { .. } => None,
        }
    }

    /// Approximate token count used for request-size logging (chars/4).
    pub fn approx_tokens(&self) -> usize {
        let chars = match self {
            Self::User { text } => text.len(),
            Self::Assistant { text, tool_calls } => {
                let call_chars: usize = tool_calls
                    .iter()
                    .map(|c| c.name.len() + c.arguments.to_string().len())
                    .sum();
                text.as_deref().map(str::len).unwrap_or(0) + call_chars
            }
            Self::ToolResult { tool_name, result, .. } => {
                tool_name.len() + result.render().len()
            }
        };
        (chars / 4).max(1)
    }
}

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque identifier from the gateway (forwarded verbatim into the
    /// matching result turn).  Envelope-derived calls have no id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Dotted `tool.action` name, e.g. `file.readFile`.
    pub name: String,
    /// Parsed JSON argument object.
    #[serde(default)]
    pub arguments: Value,
}

/// The outcome of one tool invocation.
///
/// Constructed only through [`ToolResult::ok`] / [`ToolResult::err`] so the
/// `success` flag can never disagree with which payload field is populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Successful result carrying a structured payload.
    pub fn ok(output: Value) -> Self {
        Self { success: true, output: Some(output), error: None }
    }

    /// Successful result carrying plain text.
    pub fn ok_text(text: impl Into<String>) -> Self {
        Self::ok(Value::String(text.into()))
    }

    /// Failed result carrying an error message.
    pub fn err(msg: impl Into<String>) -> Self {
        Self { success: false, output: None, error: Some(msg.into()) }
    }

    /// Plain-text rendering for transcripts and logs.
    pub fn render(&self) -> String {
        if self.success {
            match &self.output {
                Some(Value::String(s)) => s.clone(),
                Some(v) => v.to_string(),
                None => String::new(),
            }
        } else {
            format!("error: {}", self.error.as_deref().unwrap_or("unknown"))
        }
    }
}

// ─── Gateway request / response types ─────────────────────────────────────────

/// A tool schema advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Dotted `tool.action` name.
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: Value,
}

/// Sampling options forwarded to the gateway.
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Request sent to a gateway for one model round-trip.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub history: Vec<Turn>,
    /// Schemas for natively-advertised tools.  Empty when the agent relies
    /// on the JSON envelope protocol (or has no tools at all).
    pub tools: Vec<ToolSchema>,
    pub options: GenerationOptions,
}

/// A single streamed event from the gateway.
#[derive(Debug, Clone)]
pub enum ResponseEvent {
    /// A text delta streamed from the model
    TextDelta(String),
    /// The model wants to call a tool.  Gateways that interleave chunks for
    /// parallel calls key them by `index`; `arguments` fragments for one
    /// index are concatenated before parsing.
    ToolCall {
        index: u32,
        id: String,
        name: String,
        arguments: String,
    },
    /// Final usage statistics
    Usage { input_tokens: u32, output_tokens: u32 },
    /// The stream finished normally
    Done,
    /// A recoverable error (non-fatal warning)
    Error(String),
}

/// Token usage from one round-trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // ── Turn construction ─────────────────────────────────────────────────────

    #[test]
    fn turn_user_carries_text() {
        let t = Turn::user("hello");
        assert_eq!(t.as_text(), Some("hello"));
    }

    #[test]
    fn turn_assistant_carries_text() {
        let t = Turn::assistant("reply");
        assert_eq!(t.as_text(), Some("reply"));
        match t {
            Turn::Assistant { tool_calls, .. } => assert!(tool_calls.is_empty()),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn turn_assistant_calls_may_omit_text() {
        let call = ToolCallRequest {
            id: Some("c1".into()),
            name: "file.readFile".into(),
            arguments: json!({"filePath": "a.txt"}),
        };
        let t = Turn::assistant_calls(None, vec![call]);
        assert!(t.as_text().is_none());
    }

    #[test]
    fn turn_tool_result_has_no_text_accessor() {
        let t = Turn::tool_result(Some("c1".into()), "file.readFile", ToolResult::ok_text("hi"));
        assert!(t.as_text().is_none());
    }

    // ── ToolResult invariant ──────────────────────────────────────────────────

    #[test]
    fn tool_result_ok_has_output_and_no_error() {
        let r = ToolResult::ok(json!({"n": 1}));
        assert!(r.success);
        assert!(r.output.is_some());
        assert!(r.error.is_none());
    }

    #[test]
    fn tool_result_err_has_error_and_no_output() {
        let r = ToolResult::err("boom");
        assert!(!r.success);
        assert!(r.output.is_none());
        assert_eq!(r.error.as_deref(), Some("boom"));
    }

    #[test]
    fn tool_result_render_string_is_verbatim() {
        let r = ToolResult::ok_text("plain");
        assert_eq!(r.render(), "plain");
    }

    #[test]
    fn tool_result_render_error_is_prefixed() {
        let r = ToolResult::err("nope");
        assert_eq!(r.render(), "error: nope");
    }

    // ── Token approximation ───────────────────────────────────────────────────

    #[test]
    fn approx_tokens_text_divides_by_four() {
        let t = Turn::user("12345678");
        assert_eq!(t.approx_tokens(), 2);
    }

    #[test]
    fn approx_tokens_minimum_is_one() {
        let t = Turn::user("");
        assert_eq!(t.approx_tokens(), 1);
    }

    // ── Serialisation round-trip ──────────────────────────────────────────────

    #[test]
    fn turn_serialises_with_kind_tag() {
        let t = Turn::user("payload");
        let json = serde_json::to_string(&t).unwrap();
        assert!(json.contains(r#""kind":"user""#), "tagged form expected: {json}");
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_text(), Some("payload"));
    }

    #[test]
    fn assistant_without_calls_omits_tool_calls_field() {
        let t = Turn::assistant("hi");
        let json = serde_json::to_string(&t).unwrap();
        assert!(!json.contains("tool_calls"), "empty tool_calls should be skipped: {json}");
    }

    #[test]
    fn tool_result_turn_round_trips() {
        let t = Turn::tool_result(None, "file.writeFile", ToolResult::err("denied"));
        let json = serde_json::to_string(&t).unwrap();
        assert!(!json.contains("call_id"), "None call_id should be skipped: {json}");
        let back: Turn = serde_json::from_str(&json).unwrap();
        match back {
            Turn::ToolResult { call_id, tool_name, result } => {
                assert!(call_id.is_none());
                assert_eq!(tool_name, "file.writeFile");
                assert!(!result.success);
            }
            _ => panic!("wrong variant"),
        }
    }
}
