// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use uuid::Uuid;

use relay_config::AgentDefinition;
use relay_model::Turn;

/// Per-run conversation state.
///
/// Created when a run starts, mutated only by the loop that owns it, and
/// handed back inside the [`RunOutcome`](crate::RunOutcome) when the run
/// ends.  Callers that want continuity across runs keep the returned
/// history and seed the next run with it.
#[derive(Debug)]
pub struct ExecutionSession {
    pub id: String,
    pub agent: Arc<AgentDefinition>,
    pub history: Vec<Turn>,
    /// Gateway round-trips consumed so far.  Incremented once per model
    /// call, never per tool call.
    pub iteration: u32,
    /// Approximate total token count for the current history (chars/4),
    /// logged with every gateway request.
    pub token_count: usize,
}

impl ExecutionSession {
    pub fn new(agent: Arc<AgentDefinition>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent,
            history: Vec::new(),
            iteration: 0,
            token_count: 0,
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.token_count += turn.approx_tokens();
        self.history.push(turn);
    }

    pub fn push_many(&mut self, turns: impl IntoIterator<Item = Turn>) {
        for t in turns {
            self.push(t);
        }
    }

    /// Remaining round-trips before the agent's iteration budget is spent.
    pub fn budget_left(&self) -> u32 {
        self.agent.iteration_limit.saturating_sub(self.iteration)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
