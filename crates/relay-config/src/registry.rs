// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::{AgentDefinition, AgentRole};

/// Errors detected while validating an agent roster.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate agent id: {0}")]
    DuplicateId(String),
    #[error("agent {agent} delegates to unknown agent {target}")]
    UnknownDelegate { agent: String, target: String },
    #[error("agent {agent} delegates to {target}, which is a supervisor (hierarchies are one level deep)")]
    DelegateNotLeaf { agent: String, target: String },
    #[error("leaf agent {0} must not have delegates")]
    LeafWithDelegates(String),
}

/// Validated, immutable agent roster.
///
/// All delegation-shape rules are enforced here, once, at construction:
/// ids are unique, every `delegates_to` target exists and is a leaf, and
/// leaves delegate to nobody.  After `new` succeeds, the supervisor loop can
/// trust the shape of any definition it pulls out.
#[derive(Debug)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<AgentDefinition>>,
}

impl AgentRegistry {
    pub fn new(defs: Vec<AgentDefinition>) -> Result<Self, RegistryError> {
        let mut agents: HashMap<String, Arc<AgentDefinition>> = HashMap::new();
        for def in defs {
            if agents.contains_key(&def.id) {
                return Err(RegistryError::DuplicateId(def.id));
            }
            agents.insert(def.id.clone(), Arc::new(def));
        }

        for def in agents.values() {
            match def.role {
                AgentRole::Leaf => {
                    if !def.delegates_to.is_empty() {
                        return Err(RegistryError::LeafWithDelegates(def.id.clone()));
                    }
                }
                AgentRole::Supervisor => {
                    for target in &def.delegates_to {
                        let Some(t) = agents.get(target) else {
                            return Err(RegistryError::UnknownDelegate {
                                agent: def.id.clone(),
                                target: target.clone(),
                            });
                        };
                        if t.role != AgentRole::Leaf {
                            return Err(RegistryError::DelegateNotLeaf {
                                agent: def.id.clone(),
                                target: target.clone(),
                            });
                        }
                    }
                }
            }
        }

        Ok(Self { agents })
    }

    pub fn get(&self, id: &str) -> Option<Arc<AgentDefinition>> {
        self.agents.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_roster_is_valid() {
        let reg = AgentRegistry::new(vec![]).unwrap();
        assert!(reg.is_empty());
    }

    #[test]
    fn get_returns_registered_agent() {
        let reg = AgentRegistry::new(vec![AgentDefinition::leaf("worker", "p")]).unwrap();
        assert!(reg.get("worker").is_some());
        assert!(reg.get("other").is_none());
    }

    #[test]
    fn duplicate_id_rejected() {
        let err = AgentRegistry::new(vec![
            AgentDefinition::leaf("a", "p"),
            AgentDefinition::leaf("a", "q"),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn supervisor_with_valid_leaf_delegate_accepted() {
        let reg = AgentRegistry::new(vec![
            AgentDefinition::leaf("worker", "p"),
            AgentDefinition::supervisor("boss", "q", ["worker"]),
        ])
        .unwrap();
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn unknown_delegate_rejected() {
        let err = AgentRegistry::new(vec![AgentDefinition::supervisor("boss", "q", ["ghost"])])
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnknownDelegate { target, .. } if target == "ghost"
        ));
    }

    #[test]
    fn supervisor_delegating_to_supervisor_rejected() {
        let err = AgentRegistry::new(vec![
            AgentDefinition::supervisor("mid", "p", Vec::<String>::new()),
            AgentDefinition::supervisor("boss", "q", ["mid"]),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DelegateNotLeaf { target, .. } if target == "mid"
        ));
    }

    #[test]
    fn leaf_with_delegates_rejected() {
        let mut def = AgentDefinition::leaf("worker", "p");
        def.delegates_to.insert("other".into());
        let err = AgentRegistry::new(vec![def, AgentDefinition::leaf("other", "q")]).unwrap_err();
        assert!(matches!(err, RegistryError::LeafWithDelegates(id) if id == "worker"));
    }

    #[test]
    fn ids_are_sorted() {
        let reg = AgentRegistry::new(vec![
            AgentDefinition::leaf("zeta", "p"),
            AgentDefinition::leaf("alpha", "p"),
        ])
        .unwrap();
        assert_eq!(reg.ids(), vec!["alpha", "zeta"]);
    }
}
