// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use similar::{ChangeTag, TextDiff};

use crate::normalize;

const DEFAULT_CONTEXT: usize = 3;

/// Create unified-diff text transforming `old` into `new`, with the default
/// three lines of context.  The labels go into the `---`/`+++` file headers
/// (typically the old and new file paths).  Identical inputs produce an
/// empty string.
pub fn create(old_label: &str, new_label: &str, old: &str, new: &str) -> String {
    create_with_context(old_label, new_label, old, new, DEFAULT_CONTEXT)
}

/// Like [`create`] but with an explicit context radius per hunk.
pub fn create_with_context(
    old_label: &str,
    new_label: &str,
    old: &str,
    new: &str,
    context: usize,
) -> String {
    let old = normalize(old);
    let new = normalize(new);
    if old == new {
        return String::new();
    }

    let diff = TextDiff::from_lines(old.as_str(), new.as_str());
    let groups = diff.grouped_ops(context);
    if groups.is_empty() {
        return String::new();
    }

    let mut out = format!("--- {old_label}\n+++ {new_label}\n");
    for group in &groups {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_start = first.old_range().start;
        let old_len = last.old_range().end - old_start;
        let new_start = first.new_range().start;
        let new_len = last.new_range().end - new_start;
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            display_start(old_start, old_len),
            old_len,
            display_start(new_start, new_len),
            new_len,
        ));

        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Equal => ' ',
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                };
                let value = change.value();
                out.push(sign);
                out.push_str(value.strip_suffix('\n').unwrap_or(value));
                out.push('\n');
                // Only the final line of either side can lack a newline.
                if !value.ends_with('\n') {
                    out.push_str("\\ No newline at end of file\n");
                }
            }
        }
    }
    out
}

/// Unified headers are 1-based, except that a zero-length range is anchored
/// at the line *before* the edit and keeps the 0-based value.
fn display_start(start: usize, len: usize) -> usize {
    if len == 0 {
        start
    } else {
        start + 1
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_produce_empty_patch() {
        assert_eq!(create("a", "b", "a\nb\n", "a\nb\n"), "");
    }

    #[test]
    fn simple_replacement_has_header_and_hunk() {
        let patch = create("a", "b", "a\nb\nc\n", "a\nX\nc\n");
        assert!(patch.starts_with("--- a\n+++ b\n"));
        assert!(patch.contains("@@ -1,3 +1,3 @@"));
        assert!(patch.contains("-b\n"));
        assert!(patch.contains("+X\n"));
    }

    #[test]
    fn context_lines_carry_space_prefix() {
        let patch = create("a", "b", "a\nb\nc\n", "a\nX\nc\n");
        assert!(patch.contains(" a\n"));
        assert!(patch.contains(" c\n"));
    }

    #[test]
    fn pure_insertion_into_empty_file() {
        let patch = create("a", "b", "", "x\ny\n");
        assert!(patch.contains("@@ -0,0 +1,2 @@"), "got: {patch}");
        assert!(patch.contains("+x\n+y\n"));
    }

    #[test]
    fn deletion_to_empty_file() {
        let patch = create("a", "b", "x\n", "");
        assert!(patch.contains("@@ -1,1 +0,0 @@"), "got: {patch}");
        assert!(patch.contains("-x\n"));
    }

    #[test]
    fn missing_final_newline_emits_marker() {
        let patch = create("a", "b", "a\nb", "a\nc");
        let markers = patch.matches("\\ No newline at end of file").count();
        assert_eq!(markers, 2, "one marker per side: {patch}");
    }

    #[test]
    fn distant_edits_produce_separate_hunks() {
        let old: String = (1..=30).map(|n| format!("line{n}\n")).collect();
        let new = old.replace("line2\n", "LINE2\n").replace("line28\n", "LINE28\n");
        let patch = create("a", "b", &old, &new);
        let hunk_headers = patch.matches("@@ -").count();
        assert_eq!(hunk_headers, 2, "edits 26 lines apart must not share a hunk: {patch}");
    }

    #[test]
    fn labels_appear_in_file_headers() {
        let patch = create("src/old.txt", "src/new.txt", "a\n", "b\n");
        assert!(patch.starts_with("--- src/old.txt\n+++ src/new.txt\n"), "got: {patch}");
    }

    #[test]
    fn crlf_input_is_normalised() {
        let patch = create("a", "b", "a\r\nb\r\n", "a\r\nc\r\n");
        assert!(patch.contains("-b\n"));
        assert!(!patch.contains('\r'));
    }
}
