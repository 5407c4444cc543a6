use std::fmt;
use std::fmt::Debug;
use std::str::FromStr;

use serde::Deserialize;

/// Slot of a node in the engine's global node list. Slots are handed out in creation order,
/// starting at zero, and never reused.
#[derive(Deserialize, Default, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct AgentId(u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AgentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<u64>()?;
        Ok(Self(id))
    }
}

impl From<u64> for AgentId {
    fn from(f: u64) -> Self {
        Self(f)
    }
}

impl AgentId {
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }
    pub fn as_u64(&self) -> u64 {
        self.0
    }
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// The role a node plays in the simulated network. The core network entities are created
/// first by the EPC, then base stations, mobile devices and finally the remote server.
#[derive(Deserialize, Debug, Hash, Copy, Default, Clone, PartialEq, Eq)]
pub enum AgentKind {
    Pgw,
    Sgw,
    Mme,
    BaseStation,
    #[default]
    Ue,
    Server,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Pgw => write!(f, "PGW"),
            AgentKind::Sgw => write!(f, "SGW"),
            AgentKind::Mme => write!(f, "MME"),
            AgentKind::BaseStation => write!(f, "BaseStation"),
            AgentKind::Ue => write!(f, "UE"),
            AgentKind::Server => write!(f, "Server"),
        }
    }
}
