use std::collections::VecDeque;
use std::net::Ipv4Addr;

use log::{info, trace};
use typed_builder::TypedBuilder;

use hovis_core::agent::{AgentId, AgentKind};
use hovis_core::bucket::TimeMS;
use hovis_core::core::Core;
use hovis_models::error::{NetError, NetResult};
use hovis_models::net::address::{Ipv4Pool, StaticRouting};
use hovis_models::net::traffic::Packet;

use crate::lte::stack::LteStack;

/// Interface of the server's point-to-point device toward the PGW.
const SERVER_INTERFACE_TOWARD_PGW: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, TypedBuilder)]
pub struct LinkSettings {
    #[builder(default = 10_000_000_000)]
    pub data_rate_bps: u64,
    #[builder(default = TimeMS::from(10u64))]
    pub delay: TimeMS,
    #[builder(default = 1500)]
    pub mtu: u32,
    #[builder(default = Ipv4Addr::new(1, 0, 0, 0))]
    pub network: Ipv4Addr,
    #[builder(default = 8)]
    pub prefix: u8,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// One direction of a point-to-point link. Packets are serialized one after the other at the
/// data rate and arrive after the propagation delay.
#[derive(Clone, Debug)]
pub struct PointToPointLink {
    settings: LinkSettings,
    busy_until_ns: u64,
    in_flight: VecDeque<(TimeMS, Packet)>,
}

impl PointToPointLink {
    pub fn new(settings: LinkSettings) -> NetResult<Self> {
        if settings.data_rate_bps == 0 {
            return Err(NetError::InvalidLink("data rate must be positive".to_string()));
        }
        if settings.mtu == 0 {
            return Err(NetError::InvalidLink("MTU must be positive".to_string()));
        }
        Ok(Self {
            settings,
            busy_until_ns: 0,
            in_flight: VecDeque::new(),
        })
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Queues a packet for transmission and returns its arrival time at the far end.
    pub fn transmit(&mut self, now: TimeMS, packet: Packet) -> NetResult<TimeMS> {
        if packet.size > self.settings.mtu {
            return Err(NetError::InvalidLink(format!(
                "packet of {} bytes exceeds the MTU of {}",
                packet.size, self.settings.mtu
            )));
        }
        let start = self.busy_until_ns.max(now.as_u64() * 1_000_000);
        let serialization = packet.size as u64 * 8 * 1_000_000_000 / self.settings.data_rate_bps;
        self.busy_until_ns = start + serialization;
        let arrival = TimeMS::from(self.busy_until_ns / 1_000_000) + self.settings.delay;
        self.in_flight.push_back((arrival, packet));
        Ok(arrival)
    }

    /// Packets that reached the far end by `now`, in transmission order.
    pub fn arrivals(&mut self, now: TimeMS) -> Vec<Packet> {
        let mut arrived = Vec::new();
        while let Some((at, _)) = self.in_flight.front() {
            if *at > now {
                break;
            }
            if let Some((_, packet)) = self.in_flight.pop_front() {
                arrived.push(packet);
            }
        }
        arrived
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

/// The server outside the LTE network that sources the downlink flows.
#[derive(Clone, Debug)]
pub struct RemoteEndpoint {
    pub node: AgentId,
    pub address: Ipv4Addr,
    pub pgw_address: Ipv4Addr,
    routing: StaticRouting,
    link: PointToPointLink,
}

impl RemoteEndpoint {
    /// Creates the server node, links it to the PGW, addresses both ends of the link and adds
    /// the route toward the UE network.
    pub fn provision(core: &mut Core, stack: &LteStack, settings: LinkSettings) -> NetResult<Self> {
        let pgw = stack
            .epc()
            .ok_or_else(|| NetError::InvalidLink("the EPC has no PGW yet".to_string()))?
            .pgw;
        let link = PointToPointLink::new(settings)?;
        let node = core.add_agent(AgentKind::Server);

        let mut pool = Ipv4Pool::new(settings.network, settings.prefix)?;
        let address = pool.allocate()?;
        let pgw_address = pool.allocate()?;

        let mut routing = StaticRouting::new();
        routing.add_network_route(
            stack.settings().ue_network,
            stack.settings().ue_prefix,
            SERVER_INTERFACE_TOWARD_PGW,
        );
        info!(
            "Server node {} at {} linked to PGW node {} at {} with {} ms delay",
            node, address, pgw, pgw_address, settings.delay
        );
        Ok(Self {
            node,
            address,
            pgw_address,
            routing,
            link,
        })
    }

    pub fn routing(&self) -> &StaticRouting {
        &self.routing
    }

    pub fn send(&mut self, now: TimeMS, packet: Packet) -> NetResult<TimeMS> {
        if self.routing.lookup(packet.destination).is_none() {
            return Err(NetError::Unroutable {
                node: self.node,
                destination: packet.destination,
            });
        }
        let arrival = self.link.transmit(now, packet)?;
        trace!("Packet {} to {} arrives at {}", packet.seq, packet.destination, arrival);
        Ok(arrival)
    }

    /// Packets delivered to the PGW by `now`.
    pub fn arrivals(&mut self, now: TimeMS) -> Vec<Packet> {
        self.link.arrivals(now)
    }

    pub fn link(&self) -> &PointToPointLink {
        &self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hovis_models::net::traffic::TransportMode;

    fn packet(seq: u64) -> Packet {
        Packet::new(seq, 512, TransportMode::Udp, Ipv4Addr::new(7, 0, 0, 2), 10000)
    }

    #[test]
    fn packets_arrive_after_the_delay() {
        let mut link = PointToPointLink::new(LinkSettings::default()).unwrap();
        assert_eq!(link.transmit(TimeMS::from(5u64), packet(0)).unwrap(), TimeMS::from(15u64));
        assert!(link.arrivals(TimeMS::from(14u64)).is_empty());
        assert_eq!(link.arrivals(TimeMS::from(15u64)), vec![packet(0)]);
        assert_eq!(link.in_flight(), 0);
    }

    #[test]
    fn slow_links_serialize_packets() {
        let settings = LinkSettings::builder().data_rate_bps(540 * 8 * 1000).build();
        let mut link = PointToPointLink::new(settings).unwrap();
        let first = link.transmit(TimeMS::ZERO, packet(0)).unwrap();
        let second = link.transmit(TimeMS::ZERO, packet(1)).unwrap();
        assert_eq!(first, TimeMS::from(11u64));
        assert_eq!(second, TimeMS::from(12u64));
    }

    #[test]
    fn zero_rate_is_rejected() {
        let settings = LinkSettings::builder().data_rate_bps(0).build();
        assert!(matches!(
            PointToPointLink::new(settings),
            Err(NetError::InvalidLink(_))
        ));
    }
}
