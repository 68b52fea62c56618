// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod loader;
mod registry;
mod schema;

pub use loader::load;
pub use registry::{AgentRegistry, RegistryError};
pub use schema::*;
