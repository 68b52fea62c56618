// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Built-in tools shipped with the engine.

mod file;

pub use file::FileTool;
