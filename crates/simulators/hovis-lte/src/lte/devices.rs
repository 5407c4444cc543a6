use std::net::Ipv4Addr;

use indexmap::IndexMap;
use log::{debug, info, warn};
use typed_builder::TypedBuilder;

use hovis_core::agent::{AgentId, AgentKind};
use hovis_core::bucket::TimeMS;
use hovis_core::core::Core;
use hovis_models::device::mobility::{
    Mobility, MobilityModel, Point2D, RandomDirection2d, Rectangle,
};
use hovis_models::device::placement::UniformDisc;
use hovis_models::dist::{DistParams, RngSampler, UnitSampler};
use hovis_models::error::NetResult;
use hovis_models::net::address::StaticRouting;
use hovis_models::net::radio::Imsi;

use crate::lte::stack::LteStack;

/// Interface of the UE's LTE device in its routing table.
const UE_LTE_INTERFACE: u32 = 1;

const PLACEMENT_STREAM: u64 = 1;
const SPEED_STREAM: u64 = 1 << 20;
const PAUSE_STREAM: u64 = 2 << 20;
const DIRECTION_STREAM: u64 = 3 << 20;

/// Seed of an independent random stream derived from the run seed.
pub fn stream_seed(seed: u64, stream: u64) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(stream.wrapping_mul(0xBF58_476D_1CE4_E5B9))
}

#[derive(Clone, Copy, Debug, TypedBuilder)]
pub struct DeviceSettings {
    pub count: u32,
    pub min_speed: f64,
    pub max_speed: f64,
    pub center: Point2D,
    pub rho: f64,
    pub bounds: Rectangle,
    #[builder(default = 2.0)]
    pub pause_secs: f64,
    #[builder(default)]
    pub seed: u64,
}

#[derive(Clone, Debug)]
pub struct MobileDevice {
    pub node: AgentId,
    pub imsi: Imsi,
    pub address: Ipv4Addr,
    pub routing: StaticRouting,
    mobility: Mobility,
}

impl MobileDevice {
    pub fn position_at(&mut self, now: TimeMS) -> Point2D {
        self.mobility.position_at(now)
    }
}

/// The UEs of the scenario in install order, looked up by IMSI.
#[derive(Clone, Debug, Default)]
pub struct MobileDevices {
    devices: IndexMap<Imsi, MobileDevice>,
}

impl MobileDevices {
    /// Creates the UE nodes, places them on the disc, installs their mobility and LTE devices,
    /// assigns addresses, attaches them and sets their default route.
    pub fn provision(
        core: &mut Core,
        stack: &mut LteStack,
        settings: &DeviceSettings,
    ) -> NetResult<Self> {
        info!(
            "Creating {} UEs around {} within {} m",
            settings.count, settings.center, settings.rho
        );
        let nodes = core.add_agents(AgentKind::Ue, settings.count as usize);
        let mut disc = UniformDisc::new(
            settings.center,
            settings.rho,
            stream_seed(settings.seed, PLACEMENT_STREAM),
        );

        let mut installed = Vec::with_capacity(nodes.len());
        for (index, node) in nodes.into_iter().enumerate() {
            let start = disc.next_position();
            if !settings.bounds.contains(&start) {
                warn!(
                    "UE node {} starts at {}, outside its movement bounds",
                    node, start
                );
            }
            let mobility = Self::random_direction(settings, start, index as u64);
            installed.push((node, mobility));
        }

        let mut devices = IndexMap::with_capacity(installed.len());
        for (node, mut mobility) in installed.into_iter() {
            let imsi = stack.install_ue_device(node);
            let address = stack.assign_ue_address(imsi)?;
            let cell_id = stack.attach(imsi, &mobility.position_at(TimeMS::ZERO))?;

            let mut routing = StaticRouting::new();
            routing.set_default_route(stack.ue_default_gateway(), UE_LTE_INTERFACE);
            debug!(
                "UE node {} is IMSI {} at {}, attaching to cell {}",
                node, imsi, address, cell_id
            );
            devices.insert(
                imsi,
                MobileDevice {
                    node,
                    imsi,
                    address,
                    routing,
                    mobility,
                },
            );
        }
        Ok(Self { devices })
    }

    fn random_direction(settings: &DeviceSettings, start: Point2D, index: u64) -> Mobility {
        let speed = RngSampler::new(
            &DistParams::uniform(settings.min_speed, settings.max_speed)
                .with_seed(stream_seed(settings.seed, SPEED_STREAM + index)),
        );
        let pause = RngSampler::new(
            &DistParams::constant(settings.pause_secs)
                .with_seed(stream_seed(settings.seed, PAUSE_STREAM + index)),
        );
        let direction = UnitSampler::new(stream_seed(settings.seed, DIRECTION_STREAM + index));
        Mobility::RandomDirection(RandomDirection2d::new(
            start,
            settings.bounds,
            speed,
            pause,
            direction,
        ))
    }

    pub fn position_of(&mut self, imsi: Imsi, now: TimeMS) -> Option<Point2D> {
        self.devices
            .get_mut(&imsi)
            .map(|device| device.position_at(now))
    }

    pub fn get(&self, imsi: Imsi) -> Option<&MobileDevice> {
        self.devices.get(&imsi)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MobileDevice> {
        self.devices.values()
    }

    pub fn imsis(&self) -> Vec<Imsi> {
        self.devices.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hovis_models::device::placement::HexGridLayout;
    use hovis_models::net::handover::HandoverSettings;
    use hovis_models::net::radio::RadioSettings;

    use crate::lte::stack::StackSettings;
    use crate::lte::topology::Topology;

    fn settings(seed: u64) -> DeviceSettings {
        DeviceSettings::builder()
            .count(3)
            .min_speed(10.0)
            .max_speed(50.0)
            .center(Point2D::new(0.0, 300.0))
            .rho(200.0)
            .bounds(Rectangle::new(-600.0, 600.0, -400.0, 800.0))
            .seed(seed)
            .build()
    }

    fn provision(seed: u64) -> (Core, LteStack, MobileDevices) {
        let mut core = Core::new();
        let mut stack = LteStack::new(
            StackSettings::default(),
            RadioSettings::default(),
            HandoverSettings::default(),
        )
        .unwrap();
        stack.create_epc(&mut core);
        Topology::provision(&mut core, &mut stack, &HexGridLayout::default(), 3);
        let devices = MobileDevices::provision(&mut core, &mut stack, &settings(seed)).unwrap();
        (core, stack, devices)
    }

    #[test]
    fn devices_are_addressed_and_routed() {
        let (_, stack, devices) = provision(7);
        assert_eq!(devices.imsis(), vec![1, 2, 3]);
        for (index, device) in devices.iter().enumerate() {
            assert_eq!(device.node.as_u64(), 6 + index as u64);
            assert_eq!(device.address, Ipv4Addr::new(7, 0, 0, 2 + index as u8));
            let route = device.routing.lookup(Ipv4Addr::new(1, 0, 0, 1)).unwrap();
            assert_eq!(route.gateway, Some(stack.ue_default_gateway()));
            assert_eq!(route.interface, UE_LTE_INTERFACE);
        }
    }

    #[test]
    fn start_positions_lie_on_the_disc() {
        let (_, _, mut devices) = provision(7);
        for imsi in devices.imsis() {
            let start = devices.position_of(imsi, TimeMS::ZERO).unwrap();
            assert!(start.distance_to(&Point2D::new(0.0, 300.0)) <= 200.0);
        }
    }

    #[test]
    fn same_seed_same_trajectories() {
        let (_, _, mut first) = provision(11);
        let (_, _, mut second) = provision(11);
        for step in [0u64, 1500, 4000, 9000] {
            let now = TimeMS::from(step);
            for imsi in first.imsis() {
                assert_eq!(first.position_of(imsi, now), second.position_of(imsi, now));
            }
        }
        assert!(first.position_of(9, TimeMS::from(9000u64)).is_none());
    }

    #[test]
    fn streams_do_not_collide() {
        assert_ne!(stream_seed(0, SPEED_STREAM), stream_seed(0, SPEED_STREAM + 1));
        assert_ne!(stream_seed(1, PLACEMENT_STREAM), stream_seed(2, PLACEMENT_STREAM));
        assert_ne!(
            stream_seed(5, PAUSE_STREAM) | 1,
            stream_seed(5, DIRECTION_STREAM) | 1
        );
    }
}
