use std::net::Ipv4Addr;

use thiserror::Error;

use hovis_core::agent::AgentId;

pub type NetResult<T> = Result<T, NetError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetError {
    #[error("address pool {network}/{prefix} is exhausted")]
    AddressExhausted { network: Ipv4Addr, prefix: u8 },

    #[error("invalid network {0}/{1}")]
    InvalidNetwork(Ipv4Addr, u8),

    #[error("node {0} is not known to the stack")]
    UnknownNode(AgentId),

    #[error("IMSI {0} is not installed")]
    UnknownImsi(u64),

    #[error("node {node} has no route to {destination}")]
    Unroutable { node: AgentId, destination: Ipv4Addr },

    #[error("invalid link parameters: {0}")]
    InvalidLink(String),

    #[error("no cell is installed to attach IMSI {0}")]
    NoCell(u64),
}
