use std::collections::VecDeque;
use std::net::Ipv4Addr;

use indexmap::IndexMap;
use log::{debug, info};
use typed_builder::TypedBuilder;

use hovis_core::bucket::TimeMS;
use hovis_models::net::radio::Imsi;
use hovis_models::net::traffic::{
    CbrSettings, CbrSource, Packet, PacketSink, TcpSender, TcpSettings, TransportMode,
};

use crate::lte::devices::MobileDevices;
use crate::lte::remote::RemoteEndpoint;

#[derive(Clone, Copy, Debug, TypedBuilder)]
pub struct TrafficSettings {
    #[builder(default)]
    pub mode: TransportMode,
    #[builder(default)]
    pub cbr: CbrSettings,
    #[builder(default)]
    pub tcp: TcpSettings,
    /// One-way delay of acknowledgements from a UE back to the server.
    #[builder(default = TimeMS::from(11u64))]
    pub ack_delay: TimeMS,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Downlink flow from the server to one UE.
#[derive(Clone, Debug)]
pub struct Flow {
    pub imsi: Imsi,
    pub destination: Ipv4Addr,
    source: CbrSource,
    sender: Option<TcpSender>,
    sink: PacketSink,
    connect_at: Option<TimeMS>,
    acks: VecDeque<(TimeMS, u32)>,
}

impl Flow {
    pub fn received_bytes(&self) -> u64 {
        self.sink.received_bytes()
    }

    pub fn received_packets(&self) -> u64 {
        self.sink.received_packets()
    }

    pub fn packets_sent(&self) -> u64 {
        self.source.packets_sent()
    }

    /// Whether the flow may carry data. UDP flows always can.
    pub fn is_connected(&self) -> bool {
        self.sender
            .as_ref()
            .map(|sender| sender.is_established())
            .unwrap_or(true)
    }

    fn poll_udp(&mut self, now: TimeMS, next_seq: &mut u64, out: &mut Vec<Packet>) {
        for payload in self.source.tick(now) {
            out.push(Packet::new(
                *next_seq,
                payload,
                TransportMode::Udp,
                self.destination,
                self.source.port(),
            ));
            *next_seq += 1;
        }
    }

    fn poll_tcp(
        &mut self,
        now: TimeMS,
        settings: &TrafficSettings,
        next_seq: &mut u64,
        out: &mut Vec<Packet>,
    ) {
        let Some(sender) = self.sender.as_mut() else {
            return;
        };
        while let Some((at, bytes)) = self.acks.front().copied() {
            if at > now {
                break;
            }
            sender.on_ack(bytes);
            self.acks.pop_front();
        }

        if !sender.is_established() {
            if now < settings.cbr.start {
                return;
            }
            let connect_at = *self
                .connect_at
                .get_or_insert(now + settings.ack_delay + settings.ack_delay);
            if now < connect_at {
                return;
            }
            sender.establish();
            debug!("TCP connection to {} established at {}", self.destination, now);
        }

        for payload in self.source.tick(now) {
            sender.offer(payload);
        }
        while let Some(segment) = sender.next_segment() {
            out.push(Packet::new(
                *next_seq,
                segment,
                TransportMode::Tcp,
                self.destination,
                self.source.port(),
            ));
            *next_seq += 1;
        }
    }
}

/// The CBR flows of the scenario, one per UE, all in the same transport mode.
#[derive(Clone, Debug)]
pub struct TrafficPlane {
    settings: TrafficSettings,
    flows: IndexMap<Imsi, Flow>,
    next_seq: u64,
}

impl TrafficPlane {
    /// Installs a CBR source on the server toward every UE and a sink on every UE.
    pub fn provision(
        settings: TrafficSettings,
        devices: &MobileDevices,
        remote: &RemoteEndpoint,
    ) -> Self {
        let sender = match settings.mode {
            TransportMode::Udp => None,
            TransportMode::Tcp => Some(TcpSender::new(settings.tcp)),
        };
        let flows: IndexMap<Imsi, Flow> = devices
            .iter()
            .map(|device| {
                let flow = Flow {
                    imsi: device.imsi,
                    destination: device.address,
                    source: CbrSource::new(settings.cbr, device.address),
                    sender: sender.clone(),
                    sink: PacketSink::builder().port(settings.cbr.port).build(),
                    connect_at: None,
                    acks: VecDeque::new(),
                };
                (device.imsi, flow)
            })
            .collect();
        info!(
            "{} {} flows of {} bps from {} starting at {} ms",
            flows.len(),
            settings.mode,
            settings.cbr.data_rate_bps,
            remote.address,
            settings.cbr.start
        );
        Self {
            settings,
            flows,
            next_seq: 0,
        }
    }

    pub fn mode(&self) -> TransportMode {
        self.settings.mode
    }

    /// Packets the server puts on the wire at `now`.
    pub fn emit(&mut self, now: TimeMS) -> Vec<Packet> {
        let mut out = Vec::new();
        for flow in self.flows.values_mut() {
            match self.settings.mode {
                TransportMode::Udp => flow.poll_udp(now, &mut self.next_seq, &mut out),
                TransportMode::Tcp => {
                    flow.poll_tcp(now, &self.settings, &mut self.next_seq, &mut out)
                }
            }
        }
        out
    }

    /// Hands a packet delivered over the radio to the sink of its UE.
    pub fn receive(&mut self, now: TimeMS, imsi: Imsi, packet: &Packet) {
        let Some(flow) = self.flows.get_mut(&imsi) else {
            return;
        };
        if flow.sink.receive(now, packet) && flow.sender.is_some() {
            flow.acks
                .push_back((now + self.settings.ack_delay, packet.payload));
        }
    }

    pub fn flow(&self, imsi: Imsi) -> Option<&Flow> {
        self.flows.get(&imsi)
    }

    pub fn flows(&self) -> impl Iterator<Item = &Flow> {
        self.flows.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hovis_core::core::Core;
    use hovis_models::device::mobility::{Point2D, Rectangle};
    use hovis_models::device::placement::HexGridLayout;
    use hovis_models::net::handover::HandoverSettings;
    use hovis_models::net::radio::RadioSettings;

    use crate::lte::devices::DeviceSettings;
    use crate::lte::remote::LinkSettings;
    use crate::lte::stack::{LteStack, StackSettings};
    use crate::lte::topology::Topology;

    fn plane(mode: TransportMode) -> TrafficPlane {
        let mut core = Core::new();
        let mut stack = LteStack::new(
            StackSettings::default(),
            RadioSettings::default(),
            HandoverSettings::default(),
        )
        .unwrap();
        stack.create_epc(&mut core);
        Topology::provision(&mut core, &mut stack, &HexGridLayout::default(), 3);
        let device_settings = DeviceSettings::builder()
            .count(2)
            .min_speed(10.0)
            .max_speed(50.0)
            .center(Point2D::new(0.0, 300.0))
            .rho(200.0)
            .bounds(Rectangle::new(-600.0, 600.0, -400.0, 800.0))
            .build();
        let devices = MobileDevices::provision(&mut core, &mut stack, &device_settings).unwrap();
        let remote = RemoteEndpoint::provision(&mut core, &stack, LinkSettings::default()).unwrap();
        TrafficPlane::provision(
            TrafficSettings::builder().mode(mode).build(),
            &devices,
            &remote,
        )
    }

    fn emit_until(plane: &mut TrafficPlane, last: u64) -> Vec<(u64, Packet)> {
        let mut sent = Vec::new();
        for now in 0..=last {
            for packet in plane.emit(TimeMS::from(now)) {
                sent.push((now, packet));
            }
        }
        sent
    }

    #[test]
    fn udp_flows_start_after_one_second() {
        let mut plane = plane(TransportMode::Udp);
        let sent = emit_until(&mut plane, 1010);
        assert!(sent.iter().all(|(now, _)| *now > 1000));
        assert!(sent.iter().all(|(_, packet)| packet.size == 540));

        let first = plane.flow(1).unwrap().destination;
        let to_first = sent
            .iter()
            .filter(|(_, packet)| packet.destination == first)
            .count();
        // 10 ms at 10 Mbps in 512 byte packets
        assert_eq!(to_first, 24);
        assert!(plane.flows().all(|flow| flow.is_connected()));
    }

    #[test]
    fn tcp_waits_for_the_handshake() {
        let mut plane = plane(TransportMode::Tcp);
        let sent = emit_until(&mut plane, 1030);
        assert!(!sent.is_empty());
        assert!(sent.iter().all(|(now, _)| *now > 1022));
        assert!(plane.flows().all(|flow| flow.is_connected()));
        assert!(sent
            .iter()
            .all(|(_, packet)| packet.size == packet.payload + 40));
    }

    #[test]
    fn sinks_count_payload() {
        let mut plane = plane(TransportMode::Udp);
        let packet = emit_until(&mut plane, 1001)
            .into_iter()
            .map(|(_, packet)| packet)
            .next()
            .unwrap();
        let imsi = plane
            .flows()
            .find(|flow| flow.destination == packet.destination)
            .map(|flow| flow.imsi)
            .unwrap();
        plane.receive(TimeMS::from(1015u64), imsi, &packet);
        let flow = plane.flow(imsi).unwrap();
        assert_eq!(flow.received_bytes(), 512);
        assert_eq!(flow.received_packets(), 1);
    }
}
