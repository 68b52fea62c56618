// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use relay_model::{ToolResult, ToolSchema};

use crate::tool::{Tool, ToolContext};

/// Filesystem tool: `file.readFile`, `file.writeFile`, `file.patchFile`.
///
/// `patchFile` holds a per-path async mutex for its read-modify-write cycle
/// so concurrent patches against the same file serialize instead of losing
/// updates.  Reads and writes of distinct paths run freely in parallel.
pub struct FileTool {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    /// Fuzz used by `patchFile` when the call omits `fuzzFactor`.
    default_fuzz: u32,
}

impl FileTool {
    pub fn new(default_fuzz: u32) -> Self {
        Self { locks: Mutex::new(HashMap::new()), default_fuzz }
    }

    async fn path_lock(&self, path: &PathBuf) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(path.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    async fn read_file(&self, path: PathBuf) -> ToolResult {
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => ToolResult::ok(json!({ "content": content })),
            Err(e) => ToolResult::err(format!("cannot read {}: {e}", path.display())),
        }
    }

    async fn write_file(&self, path: PathBuf, content: &str) -> ToolResult {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return ToolResult::err(format!(
                        "cannot create {}: {e}",
                        parent.display()
                    ));
                }
            }
        }
        match tokio::fs::write(&path, content).await {
            Ok(()) => ToolResult::ok(json!({ "bytesWritten": content.len() })),
            Err(e) => ToolResult::err(format!("cannot write {}: {e}", path.display())),
        }
    }

    async fn patch_file(&self, path: PathBuf, patch: &str, fuzz: u32) -> ToolResult {
        let lock = self.path_lock(&path).await;
        let _guard = lock.lock().await;

        let base = match tokio::fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) => return ToolResult::err(format!("cannot read {}: {e}", path.display())),
        };
        let set = match relay_patch::PatchSet::parse(patch) {
            Ok(s) => s,
            Err(e) => return ToolResult::err(format!("invalid patch: {e}")),
        };
        let patched = match set.apply(&base, fuzz) {
            Ok(s) => s,
            Err(e) => {
                debug!(path = %path.display(), fuzz, "patch rejected: {e}");
                return ToolResult::err(format!("patch did not apply: {e}"));
            }
        };
        if let Err(e) = tokio::fs::write(&path, &patched).await {
            return ToolResult::err(format!("cannot write {}: {e}", path.display()));
        }
        ToolResult::ok(json!({ "hunksApplied": set.hunk_count() }))
    }
}

impl Default for FileTool {
    fn default() -> Self {
        Self::new(0)
    }
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolResult> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolResult::err(format!("missing required string argument: {key}")))
}

#[async_trait]
impl Tool for FileTool {
    fn id(&self) -> &str {
        "file"
    }

    fn catalog(&self) -> Vec<ToolSchema> {
        vec![
            ToolSchema {
                name: "file.readFile".into(),
                description: "Read a UTF-8 text file and return its content.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "filePath": { "type": "string", "description": "Path to the file" }
                    },
                    "required": ["filePath"]
                }),
            },
            ToolSchema {
                name: "file.writeFile".into(),
                description: "Write a UTF-8 text file, creating parent directories and \
                              replacing any existing content."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "filePath": { "type": "string", "description": "Path to the file" },
                        "content":  { "type": "string", "description": "Full new file content" }
                    },
                    "required": ["filePath", "content"]
                }),
            },
            ToolSchema {
                name: "file.patchFile".into(),
                description: "Apply a unified diff to an existing file. Hunks must match \
                              within fuzzFactor lines of their recorded positions; a \
                              failing hunk leaves the file untouched."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "filePath":   { "type": "string", "description": "Path to the file" },
                        "patch":      { "type": "string", "description": "Unified diff text" },
                        "fuzzFactor": { "type": "integer", "minimum": 0,
                                        "description": "Maximum line drift per hunk" }
                    },
                    "required": ["filePath", "patch"]
                }),
            },
        ]
    }

    async fn execute(&self, action: &str, arguments: &Value, ctx: &ToolContext) -> ToolResult {
        let path = match require_str(arguments, "filePath") {
            Ok(p) => ctx.resolve(p),
            Err(e) => return e,
        };
        match action {
            "readFile" => self.read_file(path).await,
            "writeFile" => match require_str(arguments, "content") {
                Ok(content) => self.write_file(path, content).await,
                Err(e) => e,
            },
            "patchFile" => match require_str(arguments, "patch") {
                Ok(patch) => {
                    let fuzz = arguments
                        .get("fuzzFactor")
                        .and_then(Value::as_u64)
                        .map(|f| f as u32)
                        .unwrap_or(self.default_fuzz);
                    self.patch_file(path, patch, fuzz).await
                }
                Err(e) => e,
            },
            other => ToolResult::err(format!("unknown action: file.{other}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
