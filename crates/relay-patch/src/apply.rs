// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::{normalize, PatchError, SequentialPatchError};

// ── Hunk data structures ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum HunkLine {
    /// Unchanged line — must exist in the base, kept verbatim.
    Context(String),
    /// Line removed from the base.
    Del(String),
    /// Line inserted into the output.
    Add(String),
}

#[derive(Debug, Clone)]
struct Hunk {
    /// Old-file start from `@@ -N,M ...` (1-based; 0 when M is 0).
    old_start: usize,
    old_len: usize,
    lines: Vec<HunkLine>,
}

impl Hunk {
    /// Lines that must already be present in the base (Context + Del), in order.
    fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(s) | HunkLine::Del(s) => Some(s.as_str()),
                HunkLine::Add(_) => None,
            })
            .collect()
    }

    /// 0-based expected position of `old_lines()` in the base.  A zero-length
    /// old range records the insertion index directly.
    fn anchor(&self) -> usize {
        if self.old_len == 0 {
            self.old_start
        } else {
            self.old_start.saturating_sub(1)
        }
    }
}

/// A parsed patch: ordered hunks plus whether the patched file should end
/// without a trailing newline.
#[derive(Debug, Clone)]
pub struct PatchSet {
    hunks: Vec<Hunk>,
    new_ends_without_newline: bool,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

fn hunk_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap()
    })
}

impl PatchSet {
    /// Parse unified-diff text.  `---`/`+++` file headers are skipped, hunk
    /// bodies accept space/minus/plus prefixes, blank lines inside a hunk
    /// count as empty context, and `\ No newline at end of file` markers are
    /// honoured for the new side.
    pub fn parse(text: &str) -> Result<Self, PatchError> {
        let mut hunks: Vec<Hunk> = Vec::new();
        let mut current: Option<Hunk> = None;
        let mut new_ends_without_newline = false;
        // Whether the previously parsed body line contributes to the new
        // side (Add or Context) — that is what a following `\` marker refers to.
        let mut last_on_new_side = false;

        for line in text.lines() {
            if line.starts_with("--- ") || line.starts_with("+++ ") {
                continue;
            }
            if line.starts_with("@@") {
                if let Some(h) = current.take() {
                    hunks.push(h);
                }
                let caps = hunk_header_re()
                    .captures(line)
                    .ok_or_else(|| PatchError::MalformedHeader(line.to_string()))?;
                let num = |i: usize, default: usize| -> usize {
                    caps.get(i)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(default)
                };
                current = Some(Hunk {
                    old_start: num(1, 0),
                    old_len: num(2, 1),
                    lines: Vec::new(),
                });
                last_on_new_side = false;
                continue;
            }
            let Some(h) = current.as_mut() else {
                // Junk before the first hunk header — ignore.
                continue;
            };
            if let Some(rest) = line.strip_prefix(' ') {
                h.lines.push(HunkLine::Context(rest.to_string()));
                last_on_new_side = true;
            } else if line.starts_with('\\') {
                if last_on_new_side {
                    new_ends_without_newline = true;
                }
            } else if let Some(rest) = line.strip_prefix('-') {
                h.lines.push(HunkLine::Del(rest.to_string()));
                last_on_new_side = false;
            } else if let Some(rest) = line.strip_prefix('+') {
                h.lines.push(HunkLine::Add(rest.to_string()));
                last_on_new_side = true;
            } else if line.is_empty() {
                // A blank diff line with no prefix = context empty line
                h.lines.push(HunkLine::Context(String::new()));
                last_on_new_side = true;
            }
            // Unknown line type — ignore
        }
        if let Some(h) = current.take() {
            hunks.push(h);
        }

        if hunks.is_empty() {
            return Err(PatchError::NoHunks);
        }
        Ok(Self { hunks, new_ends_without_newline })
    }

    pub fn hunk_count(&self) -> usize {
        self.hunks.len()
    }

    /// Apply this patch to `base`.
    ///
    /// Each hunk is located at its recorded position adjusted by the drift
    /// observed on earlier hunks; `fuzz` widens the search by up to that many
    /// lines in either direction (nearest offset wins).  Context and deleted
    /// lines must match exactly wherever the hunk lands.  An insertion-only
    /// hunk whose lines are already present at the target position is
    /// rejected as [`PatchError::AlreadyApplied`] rather than duplicated.
    /// All hunks apply or none do — the base is never half-patched.
    pub fn apply(&self, base: &str, fuzz: u32) -> Result<String, PatchError> {
        let base = normalize(base);
        let base_has_final_newline = base.ends_with('\n');
        let lines: Vec<&str> = base.lines().collect();

        let mut out: Vec<String> = Vec::new();
        let mut cursor = 0usize;
        let mut drift: i64 = 0;

        for (i, hunk) in self.hunks.iter().enumerate() {
            let number = i + 1;
            let want = hunk.old_lines();
            let anchor = hunk.anchor() as i64 + drift;
            let pos = find_position(&lines, &want, anchor, fuzz, cursor).ok_or({
                PatchError::HunkMismatch { hunk: number, line: hunk.old_start, fuzz }
            })?;
            if pos < cursor {
                return Err(PatchError::HunkOverlap { hunk: number });
            }
            if want.is_empty() {
                // With no context or deletions to anchor on, the only
                // double-apply signal is the inserted text itself.
                let adds: Vec<&str> = hunk
                    .lines
                    .iter()
                    .filter_map(|l| match l {
                        HunkLine::Add(s) => Some(s.as_str()),
                        _ => None,
                    })
                    .collect();
                if !adds.is_empty()
                    && pos + adds.len() <= lines.len()
                    && lines[pos..pos + adds.len()].iter().zip(&adds).all(|(a, b)| a == b)
                {
                    return Err(PatchError::AlreadyApplied { hunk: number });
                }
            }
            if pos as i64 != anchor {
                debug!(hunk = number, expected = anchor, found = pos, "hunk applied with offset");
            }

            out.extend(lines[cursor..pos].iter().map(|s| s.to_string()));
            let mut idx = pos;
            for l in &hunk.lines {
                match l {
                    HunkLine::Context(_) => {
                        out.push(lines[idx].to_string());
                        idx += 1;
                    }
                    HunkLine::Del(_) => {
                        idx += 1;
                    }
                    HunkLine::Add(s) => out.push(s.clone()),
                }
            }
            cursor = idx;
            drift += pos as i64 - hunk.anchor() as i64;
        }

        let last_hunk_reached_eof = cursor >= lines.len();
        out.extend(lines[cursor..].iter().map(|s| s.to_string()));

        if out.is_empty() {
            return Ok(String::new());
        }
        let mut result = out.join("\n");
        // When the patch rewrote the end of the file the new side decides the
        // trailing newline; otherwise the base's tail is untouched.
        let trailing_newline = if last_hunk_reached_eof {
            !self.new_ends_without_newline
        } else {
            base_has_final_newline
        };
        if trailing_newline {
            result.push('\n');
        }
        Ok(result)
    }
}

/// Search for `want` in `lines` around `anchor`, trying offsets
/// 0, +1, -1, ... up to `fuzz`.  Positions before `min_pos` (already consumed
/// by earlier hunks) are never considered.  An empty `want` is a pure
/// insertion and matches any valid index.
fn find_position(
    lines: &[&str],
    want: &[&str],
    anchor: i64,
    fuzz: u32,
    min_pos: usize,
) -> Option<usize> {
    let mut offsets: Vec<i64> = Vec::with_capacity(fuzz as usize * 2 + 1);
    offsets.push(0);
    for d in 1..=fuzz as i64 {
        offsets.push(d);
        offsets.push(-d);
    }

    for off in offsets {
        let p = anchor + off;
        if p < min_pos as i64 {
            continue;
        }
        let p = p as usize;
        if want.is_empty() {
            if p <= lines.len() {
                return Some(p);
            }
            continue;
        }
        if p + want.len() > lines.len() {
            continue;
        }
        if lines[p..p + want.len()].iter().zip(want).all(|(a, b)| a == b) {
            return Some(p);
        }
    }
    None
}

/// Parse and apply `patch` to `base`.  Empty patch text (what [`crate::create`]
/// returns for identical inputs) is a no-op.
pub fn apply(patch: &str, base: &str, fuzz: u32) -> Result<String, PatchError> {
    if patch.trim().is_empty() {
        return Ok(base.to_string());
    }
    PatchSet::parse(patch)?.apply(base, fuzz)
}

/// Apply `patches` in order, feeding each output into the next patch.
///
/// On failure the intermediate output is discarded: the caller gets only the
/// index of the failing patch and the underlying error, and should treat the
/// base as unchanged.
pub fn apply_sequential<S: AsRef<str>>(
    patches: &[S],
    base: &str,
    fuzz: u32,
) -> Result<String, SequentialPatchError> {
    let mut current = base.to_string();
    for (index, patch) in patches.iter().enumerate() {
        current = apply(patch.as_ref(), &current, fuzz)
            .map_err(|source| SequentialPatchError { index, source })?;
    }
    Ok(current)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
