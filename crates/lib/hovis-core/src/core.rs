use log::trace;

use crate::agent::{AgentId, AgentKind};

/// The engine's global node list. Every node of the scenario is registered here once and keeps
/// its slot for the whole run.
#[derive(Debug, Clone, Default)]
pub struct Core {
    agents: Vec<AgentKind>,
}

impl Core {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_agent(&mut self, kind: AgentKind) -> AgentId {
        let agent_id = AgentId::from(self.agents.len() as u64);
        self.agents.push(kind);
        trace!("Node {} created as {}", agent_id, kind);
        agent_id
    }

    pub fn add_agents(&mut self, kind: AgentKind, count: usize) -> Vec<AgentId> {
        (0..count).map(|_| self.add_agent(kind)).collect()
    }

    pub fn kind_of(&self, agent_id: AgentId) -> Option<AgentKind> {
        self.agents.get(agent_id.as_usize()).copied()
    }

    pub fn agents_of(&self, kind: AgentKind) -> Vec<AgentId> {
        self.agents
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == kind)
            .map(|(idx, _)| AgentId::from(idx as u64))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
