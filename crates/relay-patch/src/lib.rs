// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Unified-diff patch engine.
//!
//! [`create`] produces standard unified-diff text from two versions of a
//! file; [`PatchSet::apply`] applies such text back onto a base, tolerating
//! positional drift up to a caller-chosen fuzz factor.  A failing hunk is an
//! `Err` value, never a panic, so callers can surface conflicts to a model
//! and retry.
//!
//! The round-trip guarantee (applying a patch created from `a` and `b`
//! back onto `a` yields `b`) holds for all inputs after CRLF
//! normalisation, including files without a trailing newline (tracked
//! through `\ No newline at end of file` markers).

mod apply;
mod create;

pub use apply::{apply, apply_sequential, PatchSet};
pub use create::{create, create_with_context};

use thiserror::Error;

/// Why a patch could not be parsed or applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("no hunks found in patch text")]
    NoHunks,
    #[error("malformed hunk header: {0}")]
    MalformedHeader(String),
    /// A hunk's context/deletion lines were not found within `fuzz` lines of
    /// the expected position.  `hunk` is 1-based.
    #[error("hunk {hunk} does not apply near line {line} (fuzz {fuzz})")]
    HunkMismatch { hunk: usize, line: usize, fuzz: u32 },
    /// A hunk landed before the end of the previous hunk's range.
    #[error("hunk {hunk} overlaps the previous hunk")]
    HunkOverlap { hunk: usize },
    /// An insertion-only hunk found its added lines already present at the
    /// target position.  Re-applying the same patch would duplicate content.
    #[error("hunk {hunk} appears to be already applied")]
    AlreadyApplied { hunk: usize },
}

/// Failure from [`apply_sequential`]: the 0-based index of the first patch
/// that failed, with the underlying error.  Output from the patches before
/// `index` is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("patch {index} failed to apply: {source}")]
pub struct SequentialPatchError {
    pub index: usize,
    #[source]
    pub source: PatchError,
}

/// CRLF → LF.  Both sides of every diff operation go through this first.
pub(crate) fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
}
