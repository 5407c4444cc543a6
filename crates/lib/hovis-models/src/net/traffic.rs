use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

use serde::Deserialize;
use typed_builder::TypedBuilder;

use hovis_core::bucket::TimeMS;

const IPV4_HEADER: u32 = 20;
const UDP_HEADER: u32 = 8;
const TCP_HEADER: u32 = 20;

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Udp,
    #[default]
    Tcp,
}

impl TransportMode {
    pub fn header_bytes(&self) -> u32 {
        match self {
            TransportMode::Udp => IPV4_HEADER + UDP_HEADER,
            TransportMode::Tcp => IPV4_HEADER + TCP_HEADER,
        }
    }
}

impl Display for TransportMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportMode::Udp => write!(f, "UDP"),
            TransportMode::Tcp => write!(f, "TCP"),
        }
    }
}

/// An IP packet on its way to a UE. `size` is the size on the wire, headers included, which is
/// what the receiving node's IP layer reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Packet {
    pub seq: u64,
    pub payload: u32,
    pub size: u32,
    pub destination: Ipv4Addr,
    pub port: u16,
}

impl Packet {
    pub fn new(
        seq: u64,
        payload: u32,
        mode: TransportMode,
        destination: Ipv4Addr,
        port: u16,
    ) -> Self {
        Self {
            seq,
            payload,
            size: payload + mode.header_bytes(),
            destination,
            port,
        }
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, TypedBuilder)]
pub struct CbrSettings {
    #[builder(default = 10_000_000)]
    pub data_rate_bps: u64,
    #[builder(default = 512)]
    pub packet_size: u32,
    #[builder(default = 10000)]
    pub port: u16,
    #[builder(default = TimeMS::from(1000u64))]
    pub start: TimeMS,
}

impl Default for CbrSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Constant bit rate source. Each tick adds the bits the source may send during the elapsed
/// time and emits as many whole packets as that credit allows.
#[derive(Clone, Debug)]
pub struct CbrSource {
    settings: CbrSettings,
    destination: Ipv4Addr,
    credit_bits: u64,
    last_tick: Option<TimeMS>,
    sent: u64,
}

impl CbrSource {
    pub fn new(settings: CbrSettings, destination: Ipv4Addr) -> Self {
        Self {
            settings,
            destination,
            credit_bits: 0,
            last_tick: None,
            sent: 0,
        }
    }

    pub fn destination(&self) -> Ipv4Addr {
        self.destination
    }

    pub fn port(&self) -> u16 {
        self.settings.port
    }

    pub fn packets_sent(&self) -> u64 {
        self.sent
    }

    /// Payload sizes of the packets due by `now`.
    pub fn tick(&mut self, now: TimeMS) -> Vec<u32> {
        if now < self.settings.start {
            return Vec::new();
        }
        let elapsed = match self.last_tick {
            Some(last) => now - last,
            None => TimeMS::ZERO,
        };
        self.last_tick = Some(now);
        self.credit_bits += self.settings.data_rate_bps * elapsed.as_u64() / 1000;

        let packet_bits = self.settings.packet_size as u64 * 8;
        let mut due = Vec::new();
        while self.credit_bits >= packet_bits {
            self.credit_bits -= packet_bits;
            self.sent += 1;
            due.push(self.settings.packet_size);
        }
        due
    }
}

/// Counts what arrives on the listening port once the sink has started.
#[derive(Clone, Debug, TypedBuilder)]
pub struct PacketSink {
    #[builder(default = 10000)]
    pub port: u16,
    #[builder(default = TimeMS::ZERO)]
    pub start: TimeMS,
    #[builder(default)]
    received_bytes: u64,
    #[builder(default)]
    received_packets: u64,
}

impl PacketSink {
    pub fn receive(&mut self, now: TimeMS, packet: &Packet) -> bool {
        if now < self.start || packet.port != self.port {
            return false;
        }
        self.received_bytes += packet.payload as u64;
        self.received_packets += 1;
        true
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn received_packets(&self) -> u64 {
        self.received_packets
    }
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, TypedBuilder)]
pub struct TcpSettings {
    #[builder(default = 536)]
    pub segment_size: u32,
    #[builder(default = 65535)]
    pub window: u64,
    #[builder(default = 131072)]
    pub send_buffer: u64,
}

impl Default for TcpSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Sender side of a lossless TCP connection: a bounded send buffer drained into the network
/// as long as the bytes in flight stay within the window.
#[derive(Clone, Debug)]
pub struct TcpSender {
    settings: TcpSettings,
    established: bool,
    buffered: u64,
    in_flight: u64,
    refused: u64,
}

impl TcpSender {
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            settings,
            established: false,
            buffered: 0,
            in_flight: 0,
            refused: 0,
        }
    }

    pub fn establish(&mut self) {
        self.established = true;
    }

    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Queues application data; returns false when the send buffer cannot take it.
    pub fn offer(&mut self, bytes: u32) -> bool {
        if self.buffered + bytes as u64 > self.settings.send_buffer {
            self.refused += bytes as u64;
            return false;
        }
        self.buffered += bytes as u64;
        true
    }

    pub fn next_segment(&mut self) -> Option<u32> {
        if !self.established || self.buffered == 0 {
            return None;
        }
        let segment = self.buffered.min(self.settings.segment_size as u64);
        if self.in_flight + segment > self.settings.window {
            return None;
        }
        self.buffered -= segment;
        self.in_flight += segment;
        Some(segment as u32)
    }

    pub fn on_ack(&mut self, bytes: u32) {
        self.in_flight = self.in_flight.saturating_sub(bytes as u64);
    }

    pub fn buffered(&self) -> u64 {
        self.buffered
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight
    }

    pub fn refused(&self) -> u64 {
        self.refused
    }
}

/// Downlink RLC transmission buffer of one UE at its serving eNB. A limited buffer drops new
/// packets at the tail when full. Grants may split a packet; it is delivered once its last
/// byte has been sent.
#[derive(Clone, Debug, Default)]
pub struct RlcBuffer {
    limit: Option<u64>,
    queue: VecDeque<Packet>,
    queued_bytes: u64,
    head_sent: u64,
    dropped_bytes: u64,
}

impl RlcBuffer {
    pub const UM_BUFFER_BYTES: u64 = 10240;

    pub fn for_mode(mode: TransportMode) -> Self {
        match mode {
            TransportMode::Udp => Self::limited(Self::UM_BUFFER_BYTES),
            TransportMode::Tcp => Self::default(),
        }
    }

    pub fn limited(limit: u64) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn push(&mut self, packet: Packet) -> bool {
        if let Some(limit) = self.limit {
            if self.queued_bytes + packet.size as u64 > limit {
                self.dropped_bytes += packet.size as u64;
                return false;
            }
        }
        self.queued_bytes += packet.size as u64;
        self.queue.push_back(packet);
        true
    }

    pub fn backlog(&self) -> u64 {
        self.queued_bytes - self.head_sent
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.dropped_bytes
    }

    /// Sends up to `grant` bytes and returns the packets completed by it.
    pub fn drain(&mut self, grant: u64) -> Vec<Packet> {
        let mut remaining = grant;
        let mut delivered = Vec::new();
        while remaining > 0 {
            let Some(head) = self.queue.front() else {
                break;
            };
            let left_in_head = head.size as u64 - self.head_sent;
            if remaining < left_in_head {
                self.head_sent += remaining;
                break;
            }
            remaining -= left_in_head;
            self.head_sent = 0;
            self.queued_bytes -= head.size as u64;
            if let Some(packet) = self.queue.pop_front() {
                delivered.push(packet);
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(seq: u64, mode: TransportMode) -> Packet {
        Packet::new(seq, 512, mode, Ipv4Addr::new(7, 0, 0, 2), 10000)
    }

    #[test]
    fn cbr_rate_over_one_second() {
        let mut source = CbrSource::new(CbrSettings::default(), Ipv4Addr::new(7, 0, 0, 2));
        let mut total = 0;
        for ms in 0..=2000u64 {
            total += source.tick(TimeMS::from(ms)).len();
        }
        assert_eq!(total, 10_000_000 / 4096);
    }

    #[test]
    fn cbr_is_silent_before_start() {
        let mut source = CbrSource::new(CbrSettings::default(), Ipv4Addr::new(7, 0, 0, 2));
        for ms in 0..1000u64 {
            assert!(source.tick(TimeMS::from(ms)).is_empty());
        }
    }

    #[test]
    fn udp_buffer_drops_at_tail() {
        let mut buffer = RlcBuffer::for_mode(TransportMode::Udp);
        let mut accepted = 0;
        for seq in 0..30 {
            if buffer.push(packet(seq, TransportMode::Udp)) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 10240 / 540);
        assert_eq!(buffer.dropped_bytes(), (30 - accepted) * 540);
    }

    #[test]
    fn tcp_buffer_is_unbounded() {
        let mut buffer = RlcBuffer::for_mode(TransportMode::Tcp);
        for seq in 0..100 {
            assert!(buffer.push(packet(seq, TransportMode::Tcp)));
        }
        assert_eq!(buffer.backlog(), 100 * 552);
    }

    #[test]
    fn partial_grants_complete_packets() {
        let mut buffer = RlcBuffer::default();
        buffer.push(packet(0, TransportMode::Udp));
        buffer.push(packet(1, TransportMode::Udp));
        assert!(buffer.drain(300).is_empty());
        assert_eq!(buffer.backlog(), 780);
        let delivered = buffer.drain(300);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].seq, 0);
        assert_eq!(buffer.backlog(), 480);
    }

    #[test]
    fn tcp_window_limits_flight() {
        let mut sender = TcpSender::new(TcpSettings::default());
        for _ in 0..256 {
            sender.offer(512);
        }
        assert!(!sender.offer(512));
        assert_eq!(sender.next_segment(), None);
        sender.establish();
        let mut flown = 0u64;
        while let Some(segment) = sender.next_segment() {
            flown += segment as u64;
        }
        assert!(flown <= 65535);
        assert!(flown > 65535 - 536);
        sender.on_ack(536);
        assert_eq!(sender.next_segment(), Some(536));
    }

    #[test]
    fn sink_counts_payload_after_start() {
        let mut sink = PacketSink::builder().start(TimeMS::from(10u64)).build();
        assert!(!sink.receive(TimeMS::from(5u64), &packet(0, TransportMode::Udp)));
        assert!(sink.receive(TimeMS::from(10u64), &packet(1, TransportMode::Udp)));
        assert_eq!(sink.received_bytes(), 512);
    }
}
