// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use relay_config::AgentDefinition;
use relay_model::{
    Gateway, GenerationOptions, GenerationRequest, ResponseEvent, ToolCallRequest, ToolResult,
    Turn,
};
use relay_tools::{ToolContext, ToolRegistry};

use crate::{
    error::EngineError,
    events::EngineEvent,
    prompts::{render_tool_catalog, system_prompt},
    protocol::{classify, Directive},
    session::ExecutionSession,
};

/// Everything a run needs besides the agent definition itself: the
/// cancellation signal, prompt variables, an optional event sink and the
/// workspace the file tool resolves relative paths against.
///
/// Passed down explicitly; there are no global registries to reach into.
#[derive(Clone, Default)]
pub struct RunContext {
    pub cancel: CancellationToken,
    pub vars: HashMap<String, String>,
    pub events: Option<mpsc::Sender<EngineEvent>>,
    pub workspace_root: Option<PathBuf>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Derive a context for a sub-agent run.  The child's cancellation token
    /// is a child of this one: cancelling the parent cancels the child, but
    /// not the other way around.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            vars: self.vars.clone(),
            events: self.events.clone(),
            workspace_root: self.workspace_root.clone(),
        }
    }

    pub(crate) fn tool_context(&self) -> ToolContext {
        ToolContext {
            cancel: self.cancel.clone(),
            workspace_root: self.workspace_root.clone(),
        }
    }

    pub(crate) async fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}

/// One executed tool call, recorded in run order.
#[derive(Debug, Clone)]
pub struct ToolLogEntry {
    pub request: ToolCallRequest,
    pub result: ToolResult,
}

/// Terminal state of one run.  Every variant carries the full transcript.
#[derive(Debug)]
pub enum RunOutcome {
    Success {
        final_answer: String,
        tool_log: Vec<ToolLogEntry>,
        history: Vec<Turn>,
    },
    Failure {
        /// Which terminal condition ended the run.  `error.to_string()` is
        /// the display form.
        error: EngineError,
        history: Vec<Turn>,
    },
    Cancelled {
        history: Vec<Turn>,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn history(&self) -> &[Turn] {
        match self {
            Self::Success { history, .. }
            | Self::Failure { history, .. }
            | Self::Cancelled { history } => history,
        }
    }
}

/// A native tool call under assembly.  Gateways that stream parallel calls
/// interleave fragments keyed by index; fragments for one index are
/// concatenated before the arguments are parsed.
struct PendingCall {
    id: String,
    name: String,
    args_buf: String,
}

/// A fully assembled call plus, when the accumulated argument text was not
/// valid JSON, the parse error.  Such a call is still recorded in history
/// (arguments held as the raw string) but is answered with a failed
/// [`ToolResult`] instead of being dispatched.
pub(crate) struct CollectedCall {
    pub request: ToolCallRequest,
    pub parse_error: Option<String>,
}

impl PendingCall {
    fn finish(self) -> CollectedCall {
        if self.args_buf.trim().is_empty() {
            return CollectedCall {
                request: ToolCallRequest {
                    id: Some(self.id),
                    name: self.name,
                    arguments: Value::Object(Default::default()),
                },
                parse_error: None,
            };
        }
        match serde_json::from_str::<Value>(&self.args_buf) {
            Ok(arguments) => CollectedCall {
                request: ToolCallRequest { id: Some(self.id), name: self.name, arguments },
                parse_error: None,
            },
            Err(e) => CollectedCall {
                request: ToolCallRequest {
                    id: Some(self.id),
                    name: self.name,
                    arguments: Value::String(self.args_buf),
                },
                parse_error: Some(format!("invalid tool arguments: {e}")),
            },
        }
    }
}

/// Drives the model ↔ tool loop for one agent at a time.
///
/// Stateless between runs: the per-run state lives in an
/// [`ExecutionSession`] created inside [`Runner::run`] and returned as part
/// of the outcome.
pub struct Runner {
    gateway: Arc<dyn Gateway>,
    tools: Arc<ToolRegistry>,
    options: GenerationOptions,
}

impl Runner {
    pub fn new(gateway: Arc<dyn Gateway>, tools: Arc<ToolRegistry>) -> Self {
        Self { gateway, tools, options: GenerationOptions::default() }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Run `agent` against `prompt`, bounded by the agent's iteration limit.
    ///
    /// `prior_history` seeds the transcript for conversation continuity; the
    /// new user turn is appended after it.  Returns a [`RunOutcome`], never
    /// an `Err`: gateway transport failures and budget exhaustion come back
    /// as `Failure` carrying the matching [`EngineError`] and the transcript.
    pub async fn run(
        &self,
        prompt: &str,
        prior_history: Vec<Turn>,
        ctx: &RunContext,
        agent: Arc<AgentDefinition>,
    ) -> RunOutcome {
        let catalog = self.tools.catalog_for(&agent.allowed_tools);
        let catalog_block = render_tool_catalog(&catalog);
        let system = system_prompt(&agent, &ctx.vars, Some(&catalog_block), None);

        let mut session = ExecutionSession::new(agent);
        session.push_many(prior_history);
        session.push(Turn::user(prompt));
        let mut tool_log: Vec<ToolLogEntry> = Vec::new();

        loop {
            if session.budget_left() == 0 {
                debug!(
                    session_id = %session.id,
                    agent = %session.agent.id,
                    iterations = session.iteration,
                    "iteration budget exhausted"
                );
                ctx.emit(EngineEvent::TurnComplete).await;
                return RunOutcome::Failure {
                    error: EngineError::IterationBudgetExceeded,
                    history: session.history,
                };
            }
            if ctx.cancel.is_cancelled() {
                return RunOutcome::Cancelled { history: session.history };
            }

            session.iteration += 1;
            let turn = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                result = self.stream_one_turn(&system, &session, &catalog) => Some(result),
            };
            let (text, calls) = match turn {
                None => return RunOutcome::Cancelled { history: session.history },
                Some(Err(e)) => {
                    warn!(agent = %session.agent.id, "gateway failure: {e:#}");
                    return RunOutcome::Failure {
                        error: EngineError::Gateway(format!("{e:#}")),
                        history: session.history,
                    };
                }
                Some(Ok(t)) => t,
            };

            // Classification: native calls always win; otherwise the text is
            // tried against the JSON envelope; anything else is the final
            // answer.
            let (commentary, calls) = if !calls.is_empty() {
                (text, calls)
            } else {
                match classify(text.as_deref().unwrap_or("")) {
                    Directive::ToolCall(request) => {
                        // Keep the raw envelope text as commentary so the
                        // transcript records the request verbatim.
                        (text, vec![CollectedCall { request, parse_error: None }])
                    }
                    Directive::FinalAnswer(answer) | Directive::PlainText(answer) => {
                        session.push(Turn::assistant(answer.clone()));
                        ctx.emit(EngineEvent::TextComplete(answer.clone())).await;
                        ctx.emit(EngineEvent::TurnComplete).await;
                        return RunOutcome::Success {
                            final_answer: answer,
                            tool_log,
                            history: session.history,
                        };
                    }
                }
            };

            // Tool path.  One assistant turn records all requests of this
            // round-trip; results follow strictly in request order.
            session.push(Turn::assistant_calls(
                commentary,
                calls.iter().map(|c| c.request.clone()).collect(),
            ));

            let tool_ctx = ctx.tool_context();
            for call in calls {
                // An in-flight tool is allowed to finish; the signal is only
                // honored between dispatches.
                if ctx.cancel.is_cancelled() {
                    return RunOutcome::Cancelled { history: session.history };
                }
                ctx.emit(EngineEvent::ToolCallStarted(call.request.clone())).await;
                let result = match &call.parse_error {
                    Some(err) => ToolResult::err(err.clone()),
                    None => self.tools.dispatch(&call.request, &tool_ctx).await,
                };
                ctx.emit(EngineEvent::ToolCallFinished {
                    call_id: call.request.id.clone(),
                    tool_name: call.request.name.clone(),
                    result: result.clone(),
                })
                .await;
                session.push(Turn::tool_result(
                    call.request.id.clone(),
                    call.request.name.clone(),
                    result.clone(),
                ));
                tool_log.push(ToolLogEntry { request: call.request, result });
            }
        }
    }

    /// One gateway round-trip: stream the response, accumulating text and
    /// assembling native tool calls.  An `Err` here is a transport failure
    /// and terminal for the run.
    async fn stream_one_turn(
        &self,
        system: &str,
        session: &ExecutionSession,
        catalog: &[relay_model::ToolSchema],
    ) -> anyhow::Result<(Option<String>, Vec<CollectedCall>)> {
        debug!(
            session_id = %session.id,
            iteration = session.iteration,
            approx_tokens = session.token_count,
            "requesting completion"
        );
        let req = GenerationRequest {
            system_prompt: system.to_string(),
            history: session.history.clone(),
            tools: catalog.to_vec(),
            options: self.options.clone(),
        };
        let mut stream = self.gateway.generate(req).await?;

        let mut full_text = String::new();
        let mut pending: HashMap<u32, PendingCall> = HashMap::new();

        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::TextDelta(delta) => full_text.push_str(&delta),
                ResponseEvent::ToolCall { index, id, name, arguments } => {
                    let pc = pending.entry(index).or_insert_with(|| PendingCall {
                        id: String::new(),
                        name: String::new(),
                        args_buf: String::new(),
                    });
                    if !id.is_empty() {
                        pc.id = id;
                    }
                    if !name.is_empty() {
                        pc.name = name;
                    }
                    pc.args_buf.push_str(&arguments);
                }
                ResponseEvent::Usage { input_tokens, output_tokens } => {
                    debug!(
                        session_id = %session.id,
                        input_tokens,
                        output_tokens,
                        "gateway usage"
                    );
                }
                ResponseEvent::Done => break,
                ResponseEvent::Error(e) => {
                    warn!(session_id = %session.id, "gateway stream warning: {e}");
                }
            }
        }

        // Flush assembled calls ordered by index.  A call without a name
        // cannot be dispatched and is dropped.
        let mut sorted: Vec<(u32, PendingCall)> = pending.into_iter().collect();
        sorted.sort_by_key(|(idx, _)| *idx);
        let calls = sorted
            .into_iter()
            .filter_map(|(_, pc)| {
                if pc.name.is_empty() {
                    warn!(call_id = %pc.id, "dropping tool call with empty name");
                    return None;
                }
                Some(pc.finish())
            })
            .collect();

        let text = if full_text.is_empty() { None } else { Some(full_text) };
        Ok((text, calls))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_call_empty_arguments_become_object() {
        let pc = PendingCall { id: "c1".into(), name: "file.readFile".into(), args_buf: "".into() };
        let call = pc.finish();
        assert!(call.parse_error.is_none());
        assert_eq!(call.request.arguments, serde_json::json!({}));
    }

    #[test]
    fn pending_call_fragments_parse_once_joined() {
        let pc = PendingCall {
            id: "c1".into(),
            name: "file.readFile".into(),
            args_buf: r#"{"filePath": "a.txt"}"#.into(),
        };
        let call = pc.finish();
        assert!(call.parse_error.is_none());
        assert_eq!(call.request.arguments["filePath"], "a.txt");
    }

    #[test]
    fn pending_call_bad_json_is_kept_with_parse_error() {
        let pc = PendingCall {
            id: "c1".into(),
            name: "file.readFile".into(),
            args_buf: r#"{"filePath": "#.into(),
        };
        let call = pc.finish();
        assert!(call.parse_error.is_some());
        assert_eq!(call.request.arguments, Value::String(r#"{"filePath": "#.into()));
    }

    #[test]
    fn child_context_cancels_with_parent_not_vice_versa() {
        let parent = RunContext::new();
        let child = parent.child();
        let grandchild = child.child();

        child.cancel.cancel();
        assert!(child.cancel.is_cancelled());
        assert!(grandchild.cancel.is_cancelled());
        assert!(!parent.cancel.is_cancelled());
    }
}
