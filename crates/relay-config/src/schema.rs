// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

fn default_iteration_limit() -> u32 {
    20
}
fn default_fuzz_factor() -> u32 {
    0
}
fn default_role() -> AgentRole {
    AgentRole::Leaf
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    /// Agent roster.  Delegation wiring between these definitions is
    /// validated when an `AgentRegistry` is built from them.
    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Gateway identifier.  Only `"mock"` is built in; real transports are
    /// registered by the embedding application.
    pub provider: String,
    /// Model name forwarded to the gateway
    pub name: String,
    /// Maximum tokens to request in a single generation
    pub max_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "mock".into(),
            name: "mock-model".into(),
            max_tokens: Some(4096),
            temperature: Some(0.2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Default iteration budget for agents that do not set their own.
    #[serde(default = "default_iteration_limit")]
    pub iteration_limit: u32,
    /// Default fuzz factor for `file.patchFile` when the call omits one.
    #[serde(default = "default_fuzz_factor")]
    pub fuzz_factor: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            iteration_limit: default_iteration_limit(),
            fuzz_factor: default_fuzz_factor(),
        }
    }
}

/// Whether an agent does its own work or coordinates other agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Executes tool calls itself; may not delegate.
    Leaf,
    /// Delegates to leaf agents via the bracketed directive protocol;
    /// has no tools of its own.
    Supervisor,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leaf => write!(f, "leaf"),
            Self::Supervisor => write!(f, "supervisor"),
        }
    }
}

/// Static description of one agent: identity, prompt, capability envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    /// Human-readable display name.  Empty means "use the id".
    #[serde(default)]
    pub name: String,
    /// System prompt template.  `{NAME}` placeholders are substituted from
    /// run-context variables; `{TOOL_CATALOG}` and `{AGENT_ROSTER}` are
    /// filled in by the engine.
    pub system_prompt: String,
    /// Tool ids this agent may use (the whole `file` tool, not per-action).
    #[serde(default)]
    pub allowed_tools: BTreeSet<String>,
    #[serde(default = "default_role")]
    pub role: AgentRole,
    /// Ids of agents a supervisor may delegate to.  Must be empty for leaves.
    #[serde(default)]
    pub delegates_to: BTreeSet<String>,
    /// Maximum model round-trips per run.
    #[serde(default = "default_iteration_limit")]
    pub iteration_limit: u32,
}

impl AgentDefinition {
    /// Minimal leaf definition for tests and programmatic construction.
    pub fn leaf(id: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            system_prompt: system_prompt.into(),
            allowed_tools: BTreeSet::new(),
            role: AgentRole::Leaf,
            delegates_to: BTreeSet::new(),
            iteration_limit: default_iteration_limit(),
        }
    }

    /// Minimal supervisor definition delegating to the given agent ids.
    pub fn supervisor(
        id: impl Into<String>,
        system_prompt: impl Into<String>,
        delegates_to: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            system_prompt: system_prompt.into(),
            allowed_tools: BTreeSet::new(),
            role: AgentRole::Supervisor,
            delegates_to: delegates_to.into_iter().map(Into::into).collect(),
            iteration_limit: default_iteration_limit(),
        }
    }

    /// Display name for prompts and logs, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_iteration_limit(mut self, limit: u32) -> Self {
        self.iteration_limit = limit;
        self
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_config_defaults_to_mock() {
        let m = ModelConfig::default();
        assert_eq!(m.provider, "mock");
        assert_eq!(m.max_tokens, Some(4096));
    }

    #[test]
    fn engine_config_defaults() {
        let e = EngineConfig::default();
        assert_eq!(e.iteration_limit, 20);
        assert_eq!(e.fuzz_factor, 0);
    }

    #[test]
    fn agent_definition_deserialises_with_defaults() {
        let toml = r#"
            id = "worker"
            system_prompt = "You are a worker."
        "#;
        let def: AgentDefinition = toml::from_str(toml).unwrap();
        assert_eq!(def.role, AgentRole::Leaf);
        assert!(def.allowed_tools.is_empty());
        assert!(def.delegates_to.is_empty());
        assert_eq!(def.iteration_limit, 20);
        assert_eq!(def.display_name(), "worker");
    }

    #[test]
    fn display_name_prefers_explicit_name() {
        let def = AgentDefinition::leaf("worker", "p").with_name("Worker Bee");
        assert_eq!(def.display_name(), "Worker Bee");
    }

    #[test]
    fn agent_definition_parses_supervisor_role() {
        let toml = r#"
            id = "boss"
            system_prompt = "Coordinate."
            role = "supervisor"
            delegates_to = ["worker"]
        "#;
        let def: AgentDefinition = toml::from_str(toml).unwrap();
        assert_eq!(def.role, AgentRole::Supervisor);
        assert!(def.delegates_to.contains("worker"));
    }

    #[test]
    fn config_parses_agent_array() {
        let toml = r#"
            [[agents]]
            id = "a"
            system_prompt = "p"

            [[agents]]
            id = "b"
            system_prompt = "q"
            allowed_tools = ["file"]
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.agents.len(), 2);
        assert!(cfg.agents[1].allowed_tools.contains("file"));
    }

    #[test]
    fn agent_role_display() {
        assert_eq!(AgentRole::Leaf.to_string(), "leaf");
        assert_eq!(AgentRole::Supervisor.to_string(), "supervisor");
    }
}
