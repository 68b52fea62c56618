// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Supervisor delegation protocol.
//!
//! A supervisor agent has no tools.  Its model output is parsed against a
//! two-pattern grammar:
//!
//! ```text
//! [DELEGATE agent_id] Task Description: <text>
//! [FINAL_ANSWER] <text>
//! ```
//!
//! A valid delegation runs the named leaf agent through the ordinary
//! tool-calling loop with a child cancellation token; the result comes back
//! into the supervisor's transcript as a synthetic user turn.  Grammar
//! violations and invalid agent ids get one corrective turn per offending
//! iteration and never terminate the run by themselves; only the shared
//! iteration budget does.

use std::sync::{Arc, OnceLock};

use futures::StreamExt;
use regex::Regex;
use tracing::{debug, info, warn};

use relay_config::{AgentDefinition, AgentRegistry, AgentRole};
use relay_model::{Gateway, GenerationRequest, ResponseEvent, Turn};

use crate::{
    error::EngineError,
    events::EngineEvent,
    prompts::{render_agent_roster, system_prompt},
    runner::{RunContext, RunOutcome, Runner},
    session::ExecutionSession,
};

/// Outcome of one sub-agent run, as fed back to the supervising model.
#[derive(Debug, Clone, PartialEq)]
pub enum DelegationResult {
    Succeeded(String),
    Failed(String),
}

/// One delegation performed during a supervised run.  Carried in the
/// [`SupervisionReport`] alongside the transcript, never persisted on its
/// own.
#[derive(Debug, Clone)]
pub struct DelegationRecord {
    pub sub_agent_id: String,
    pub task: String,
    pub result: DelegationResult,
}

/// Terminal state of a supervised run.
#[derive(Debug)]
pub struct SupervisionReport {
    pub outcome: RunOutcome,
    pub delegations: Vec<DelegationRecord>,
}

/// What one piece of supervisor output asks for.
#[derive(Debug, PartialEq)]
enum SupervisorDirective {
    Delegate { agent_id: String, task: String },
    Final(String),
    Unrecognized,
}

fn delegate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*\[DELEGATE\s+([A-Za-z0-9_\-]+)\]\s*Task Description:\s*(.+)$")
            .unwrap()
    })
}

fn final_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^\s*\[FINAL_ANSWER\]\s*(.*)$").unwrap())
}

fn parse_directive(text: &str) -> SupervisorDirective {
    if let Some(caps) = delegate_re().captures(text) {
        return SupervisorDirective::Delegate {
            agent_id: caps[1].to_string(),
            task: caps[2].trim().to_string(),
        };
    }
    if let Some(caps) = final_re().captures(text) {
        return SupervisorDirective::Final(caps[1].trim().to_string());
    }
    SupervisorDirective::Unrecognized
}

/// Runs supervisor agents, delegating their sub-tasks through a [`Runner`].
pub struct Supervisor {
    gateway: Arc<dyn Gateway>,
    runner: Runner,
    agents: Arc<AgentRegistry>,
}

impl Supervisor {
    pub fn new(gateway: Arc<dyn Gateway>, runner: Runner, agents: Arc<AgentRegistry>) -> Self {
        Self { gateway, runner, agents }
    }

    /// Run `supervisor` against `task`, bounded by its iteration limit.
    pub async fn run(
        &self,
        task: &str,
        ctx: &RunContext,
        supervisor: Arc<AgentDefinition>,
    ) -> SupervisionReport {
        let delegates: Vec<Arc<AgentDefinition>> = supervisor
            .delegates_to
            .iter()
            .filter_map(|id| self.agents.get(id))
            .collect();
        let roster = render_agent_roster(&delegates);
        let system = system_prompt(&supervisor, &ctx.vars, None, Some(&roster));

        let mut session = ExecutionSession::new(supervisor);
        session.push(Turn::user(task));
        let mut delegations: Vec<DelegationRecord> = Vec::new();

        loop {
            if session.budget_left() == 0 {
                debug!(
                    session_id = %session.id,
                    agent = %session.agent.id,
                    "supervisor budget exhausted"
                );
                ctx.emit(EngineEvent::TurnComplete).await;
                return SupervisionReport {
                    outcome: RunOutcome::Failure {
                        error: EngineError::IterationBudgetExceeded,
                        history: session.history,
                    },
                    delegations,
                };
            }
            if ctx.cancel.is_cancelled() {
                return SupervisionReport {
                    outcome: RunOutcome::Cancelled { history: session.history },
                    delegations,
                };
            }

            session.iteration += 1;
            let turn = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => None,
                result = self.one_text_turn(&system, &session) => Some(result),
            };
            let text = match turn {
                None => {
                    return SupervisionReport {
                        outcome: RunOutcome::Cancelled { history: session.history },
                        delegations,
                    }
                }
                Some(Err(e)) => {
                    warn!(agent = %session.agent.id, "gateway failure: {e:#}");
                    return SupervisionReport {
                        outcome: RunOutcome::Failure {
                            error: EngineError::Gateway(format!("{e:#}")),
                            history: session.history,
                        },
                        delegations,
                    };
                }
                Some(Ok(text)) => text,
            };

            session.push(Turn::assistant(text.clone()));
            ctx.emit(EngineEvent::TextComplete(text.clone())).await;

            match parse_directive(&text) {
                SupervisorDirective::Final(answer) => {
                    ctx.emit(EngineEvent::TurnComplete).await;
                    return SupervisionReport {
                        outcome: RunOutcome::Success {
                            final_answer: answer,
                            tool_log: Vec::new(),
                            history: session.history,
                        },
                        delegations,
                    };
                }
                SupervisorDirective::Delegate { agent_id, task } => {
                    match self.validate_delegate(&session.agent, &agent_id) {
                        Ok(sub_agent) => {
                            info!(
                                supervisor = %session.agent.id,
                                sub_agent = %agent_id,
                                "delegating"
                            );
                            ctx.emit(EngineEvent::Delegated {
                                sub_agent_id: agent_id.clone(),
                                task: task.clone(),
                            })
                            .await;

                            let child_ctx = ctx.child();
                            let outcome =
                                self.runner.run(&task, Vec::new(), &child_ctx, sub_agent).await;
                            // Cancellation only reaches the child through us.
                            if ctx.cancel.is_cancelled() {
                                return SupervisionReport {
                                    outcome: RunOutcome::Cancelled { history: session.history },
                                    delegations,
                                };
                            }
                            let result = match outcome {
                                RunOutcome::Success { final_answer, .. } => {
                                    DelegationResult::Succeeded(final_answer)
                                }
                                RunOutcome::Failure { error, .. } => {
                                    DelegationResult::Failed(error.to_string())
                                }
                                RunOutcome::Cancelled { .. } => {
                                    DelegationResult::Failed("cancelled".into())
                                }
                            };
                            ctx.emit(EngineEvent::DelegationFinished {
                                sub_agent_id: agent_id.clone(),
                                success: matches!(result, DelegationResult::Succeeded(_)),
                            })
                            .await;

                            let feedback = match &result {
                                DelegationResult::Succeeded(text) => {
                                    format!("Result from agent {agent_id}: {text}")
                                }
                                DelegationResult::Failed(reason) => {
                                    format!("Result from agent {agent_id}: FAILED: {reason}")
                                }
                            };
                            session.push(Turn::user(feedback));
                            delegations.push(DelegationRecord {
                                sub_agent_id: agent_id,
                                task,
                                result,
                            });
                        }
                        Err(corrective) => {
                            debug!(
                                supervisor = %session.agent.id,
                                target = %agent_id,
                                "invalid delegation target"
                            );
                            session.push(Turn::user(corrective));
                        }
                    }
                }
                SupervisorDirective::Unrecognized => {
                    debug!(supervisor = %session.agent.id, "unparseable supervisor output");
                    session.push(Turn::user(format!(
                        "Your last message did not match the required format. Respond with \
                         exactly one of:\n\
                         [DELEGATE agent_id] Task Description: <text>\n\
                         [FINAL_ANSWER] <text>\n\
                         Valid agent ids: {}",
                        join_ids(&session.agent.delegates_to)
                    )));
                }
            }
        }
    }

    /// Check a delegation target against the supervisor's allow-list and the
    /// leaf-only rule.  Registry construction already enforces both; this
    /// guards hand-built definitions that bypassed it.
    fn validate_delegate(
        &self,
        supervisor: &AgentDefinition,
        agent_id: &str,
    ) -> Result<Arc<AgentDefinition>, String> {
        if !supervisor.delegates_to.contains(agent_id) {
            return Err(format!(
                "Agent {agent_id} is not available to you. Valid agent ids: {}",
                join_ids(&supervisor.delegates_to)
            ));
        }
        let Some(sub_agent) = self.agents.get(agent_id) else {
            return Err(format!(
                "Agent {agent_id} does not exist. Valid agent ids: {}",
                join_ids(&supervisor.delegates_to)
            ));
        };
        if sub_agent.role != AgentRole::Leaf {
            return Err(format!(
                "Agent {agent_id} cannot be delegated to. Valid agent ids: {}",
                join_ids(&supervisor.delegates_to)
            ));
        }
        Ok(sub_agent)
    }

    /// One tool-free gateway round-trip returning the full response text.
    async fn one_text_turn(
        &self,
        system: &str,
        session: &ExecutionSession,
    ) -> anyhow::Result<String> {
        debug!(
            session_id = %session.id,
            iteration = session.iteration,
            approx_tokens = session.token_count,
            "requesting completion"
        );
        let req = GenerationRequest {
            system_prompt: system.to_string(),
            history: session.history.clone(),
            tools: Vec::new(),
            options: Default::default(),
        };
        let mut stream = self.gateway.generate(req).await?;
        let mut full_text = String::new();
        while let Some(event) = stream.next().await {
            match event? {
                ResponseEvent::TextDelta(delta) => full_text.push_str(&delta),
                ResponseEvent::ToolCall { name, .. } => {
                    // No tools are advertised; anything the gateway invents
                    // is dropped and the grammar check handles the fallout.
                    warn!(session_id = %session.id, tool = %name, "supervisor gateway sent a tool call");
                }
                ResponseEvent::Done => break,
                ResponseEvent::Error(e) => {
                    warn!(session_id = %session.id, "gateway stream warning: {e}");
                }
                ResponseEvent::Usage { .. } => {}
            }
        }
        Ok(full_text)
    }
}

fn join_ids(ids: &std::collections::BTreeSet<String>) -> String {
    if ids.is_empty() {
        return "(none)".into();
    }
    ids.iter().cloned().collect::<Vec<_>>().join(", ")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
