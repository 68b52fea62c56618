use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use relay_model::{ToolResult, ToolSchema};

/// Ambient state passed to every tool execution.
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Cooperative cancellation signal for the enclosing run.  Long-running
    /// tools should poll this and bail out with a failed result.
    pub cancel: CancellationToken,
    /// Base directory for resolving relative paths.  `None` = process cwd.
    pub workspace_root: Option<PathBuf>,
}

impl ToolContext {
    /// Resolve `path` against the workspace root when it is relative.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = PathBuf::from(path);
        if p.is_absolute() {
            return p;
        }
        match &self.workspace_root {
            Some(root) => root.join(p),
            None => p,
        }
    }
}

/// Trait that every built-in and user-defined tool must implement.
///
/// A tool is a namespace of actions: `id()` is the bare tool id (`"file"`),
/// `catalog()` advertises one schema per action under the dotted
/// `tool.action` name, and `execute()` receives the action part of whichever
/// dotted name was called.  Failures are data, never panics — wrap them in
/// [`ToolResult::err`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> &str;

    /// Schemas for every action this tool exposes.  Names must be prefixed
    /// with `"{id}."`.
    fn catalog(&self) -> Vec<ToolSchema>;

    async fn execute(&self, action: &str, arguments: &Value, ctx: &ToolContext) -> ToolResult;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
