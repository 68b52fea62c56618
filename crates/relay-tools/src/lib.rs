// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool abstraction and dispatch.
//!
//! A [`Tool`] groups related actions behind one id; callers address a single
//! action with a dotted name such as `file.readFile`.  The [`ToolRegistry`]
//! owns the installed tools, advertises their catalogs and routes dotted
//! names to the right implementation, running each call on its own task so a
//! panicking tool surfaces as a failed [`relay_model::ToolResult`] instead of
//! taking the engine down.

pub mod builtin;
mod registry;
mod tool;

pub use builtin::FileTool;
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolContext};
