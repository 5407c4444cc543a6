use std::net::Ipv4Addr;

use log::trace;

use crate::error::{NetError, NetResult};

pub fn prefix_mask(prefix: u8) -> u32 {
    match prefix {
        0 => 0,
        p => u32::MAX << (32 - p.min(32) as u32),
    }
}

pub fn in_network(address: Ipv4Addr, network: Ipv4Addr, prefix: u8) -> bool {
    let mask = prefix_mask(prefix);
    u32::from(address) & mask == u32::from(network) & mask
}

/// Sequential host addresses out of one network, skipping the network and broadcast addresses.
#[derive(Clone, Debug)]
pub struct Ipv4Pool {
    network: Ipv4Addr,
    prefix: u8,
    next_host: u32,
}

impl Ipv4Pool {
    pub fn new(network: Ipv4Addr, prefix: u8) -> NetResult<Self> {
        if prefix > 30 || u32::from(network) & !prefix_mask(prefix) != 0 {
            return Err(NetError::InvalidNetwork(network, prefix));
        }
        Ok(Self {
            network,
            prefix,
            next_host: 1,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        in_network(address, self.network, self.prefix)
    }

    pub fn allocate(&mut self) -> NetResult<Ipv4Addr> {
        let broadcast = !prefix_mask(self.prefix);
        if self.next_host >= broadcast {
            return Err(NetError::AddressExhausted {
                network: self.network,
                prefix: self.prefix,
            });
        }
        let address = Ipv4Addr::from(u32::from(self.network) | self.next_host);
        self.next_host += 1;
        trace!("Allocated {} from {}/{}", address, self.network, self.prefix);
        Ok(address)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub network: Ipv4Addr,
    pub prefix: u8,
    pub gateway: Option<Ipv4Addr>,
    pub interface: u32,
}

/// Static routing table of one node. Lookups pick the longest matching prefix; the default
/// route matches everything.
#[derive(Clone, Debug, Default)]
pub struct StaticRouting {
    routes: Vec<Route>,
}

impl StaticRouting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default_route(&mut self, gateway: Ipv4Addr, interface: u32) {
        self.routes.retain(|route| route.prefix != 0);
        self.routes.push(Route {
            network: Ipv4Addr::UNSPECIFIED,
            prefix: 0,
            gateway: Some(gateway),
            interface,
        });
    }

    pub fn add_network_route(&mut self, network: Ipv4Addr, prefix: u8, interface: u32) {
        self.routes.push(Route {
            network,
            prefix,
            gateway: None,
            interface,
        });
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn lookup(&self, destination: Ipv4Addr) -> Option<&Route> {
        self.routes
            .iter()
            .filter(|route| in_network(destination, route.network, route.prefix))
            .max_by_key(|route| route.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ue_pool_starts_after_gateway() {
        let mut pool = Ipv4Pool::new(Ipv4Addr::new(7, 0, 0, 0), 8).unwrap();
        assert_eq!(pool.allocate().unwrap(), Ipv4Addr::new(7, 0, 0, 1));
        assert_eq!(pool.allocate().unwrap(), Ipv4Addr::new(7, 0, 0, 2));
        assert!(pool.contains(Ipv4Addr::new(7, 255, 0, 3)));
        assert!(!pool.contains(Ipv4Addr::new(1, 0, 0, 1)));
    }

    #[test]
    fn small_pool_runs_out() {
        let mut pool = Ipv4Pool::new(Ipv4Addr::new(10, 0, 0, 0), 30).unwrap();
        assert!(pool.allocate().is_ok());
        assert!(pool.allocate().is_ok());
        assert_eq!(
            pool.allocate(),
            Err(NetError::AddressExhausted {
                network: Ipv4Addr::new(10, 0, 0, 0),
                prefix: 30
            })
        );
    }

    #[test]
    fn host_bits_in_network_are_rejected() {
        assert!(Ipv4Pool::new(Ipv4Addr::new(7, 0, 0, 1), 8).is_err());
    }

    #[test]
    fn longest_prefix_wins() {
        let mut routing = StaticRouting::new();
        routing.set_default_route(Ipv4Addr::new(7, 0, 0, 1), 1);
        routing.add_network_route(Ipv4Addr::new(7, 0, 0, 0), 8, 2);
        assert_eq!(routing.lookup(Ipv4Addr::new(7, 0, 0, 9)).unwrap().interface, 2);
        assert_eq!(routing.lookup(Ipv4Addr::new(1, 0, 0, 1)).unwrap().interface, 1);
        assert!(StaticRouting::new().lookup(Ipv4Addr::new(1, 0, 0, 1)).is_none());
    }
}
