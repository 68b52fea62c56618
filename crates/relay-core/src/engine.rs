// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use relay_config::{AgentRegistry, AgentRole, Config};
use relay_model::{Gateway, GenerationOptions};
use relay_tools::ToolRegistry;

use crate::{
    error::EngineError,
    runner::{RunContext, RunOutcome, Runner},
    supervisor::{SupervisionReport, Supervisor},
};

/// The explicitly constructed entry point for embedding applications.
///
/// Holds the gateway, the tool registry and the validated agent roster
/// behind `Arc`s.  Nothing here is global: a config change swaps the parts
/// through [`Engine::reconfigure`] and in-flight runs keep the `Arc`s they
/// started with.
pub struct Engine {
    gateway: Arc<dyn Gateway>,
    tools: Arc<ToolRegistry>,
    agents: Arc<AgentRegistry>,
    options: GenerationOptions,
}

impl Engine {
    /// Build an engine from a loaded config.  Fails when the agent roster
    /// contains invalid delegation wiring.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        tools: Arc<ToolRegistry>,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let agents = Arc::new(AgentRegistry::new(config.agents.clone())?);
        Ok(Self {
            gateway,
            tools,
            agents,
            options: GenerationOptions {
                max_tokens: config.model.max_tokens,
                temperature: config.model.temperature,
            },
        })
    }

    /// Replace gateway, tools and roster after a config change.  Runs that
    /// are already in flight are unaffected.
    pub fn reconfigure(
        &mut self,
        gateway: Arc<dyn Gateway>,
        tools: Arc<ToolRegistry>,
        config: &Config,
    ) -> anyhow::Result<()> {
        self.agents = Arc::new(AgentRegistry::new(config.agents.clone())?);
        self.gateway = gateway;
        self.tools = tools;
        self.options = GenerationOptions {
            max_tokens: config.model.max_tokens,
            temperature: config.model.temperature,
        };
        Ok(())
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    fn runner(&self) -> Runner {
        Runner::new(self.gateway.clone(), self.tools.clone()).with_options(self.options.clone())
    }

    /// Run a leaf agent through the tool-calling loop.
    pub async fn run_agent(
        &self,
        agent_id: &str,
        prompt: &str,
        ctx: &RunContext,
    ) -> Result<RunOutcome, EngineError> {
        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| EngineError::UnknownAgent(agent_id.to_string()))?;
        if agent.role != AgentRole::Leaf {
            return Err(EngineError::WrongRole {
                id: agent_id.to_string(),
                role: agent.role.to_string(),
                expected: AgentRole::Leaf.to_string(),
            });
        }
        Ok(self.runner().run(prompt, Vec::new(), ctx, agent).await)
    }

    /// Run a supervisor agent through the delegation protocol.
    pub async fn run_supervisor(
        &self,
        agent_id: &str,
        task: &str,
        ctx: &RunContext,
    ) -> Result<SupervisionReport, EngineError> {
        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| EngineError::UnknownAgent(agent_id.to_string()))?;
        if agent.role != AgentRole::Supervisor {
            return Err(EngineError::WrongRole {
                id: agent_id.to_string(),
                role: agent.role.to_string(),
                expected: AgentRole::Supervisor.to_string(),
            });
        }
        let supervisor = Supervisor::new(self.gateway.clone(), self.runner(), self.agents.clone());
        Ok(supervisor.run(task, ctx, agent).await)
    }
}
