// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Terminal run errors.
///
/// Only these abort a run; everything else (tool failures, malformed
/// envelopes, patch conflicts, invalid delegations) is absorbed into the
/// transcript as a failed result or corrective turn so the model can
/// self-correct.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Transport-level gateway failure (connect, auth, rate limit).
    #[error("gateway error: {0}")]
    Gateway(String),

    /// The iteration budget ran out before a final answer.
    #[error("max iterations exceeded")]
    IterationBudgetExceeded,

    /// The engine was asked to run an agent id it does not know.
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    /// The named agent has the wrong role for the requested entry point.
    #[error("agent {id} has role {role}, expected {expected}")]
    WrongRole {
        id: String,
        role: String,
        expected: String,
    },
}
