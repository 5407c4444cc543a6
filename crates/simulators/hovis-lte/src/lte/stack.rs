use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use hashbrown::HashMap;
use log::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

use hovis_core::agent::{AgentId, AgentKind};
use hovis_core::bucket::TimeMS;
use hovis_core::core::Core;
use hovis_core::metrics::Consumable;
use hovis_core::scheduler::{EventOrder, EventQueue};
use hovis_models::device::mobility::Point2D;
use hovis_models::device::placement::SectorSite;
use hovis_models::error::{NetError, NetResult};
use hovis_models::net::address::Ipv4Pool;
use hovis_models::net::capacity::{CapacitySettings, CellCapacity, Demand};
use hovis_models::net::handover::{A2A4RsrqHandover, HandoverSettings, MeasurementReport};
use hovis_models::net::radio::{
    CellId, CellSite, Imsi, Measurement, RadioEnvironment, RadioSettings, Rnti,
};
use hovis_models::net::traffic::{Packet, RlcBuffer, TransportMode};

use crate::lte::bucket::LteEvent;

#[derive(Clone, Copy, Debug, TypedBuilder)]
pub struct StackSettings {
    #[builder(default = TimeMS::from(20u64))]
    pub connection_setup_delay: TimeMS,
    #[builder(default = TimeMS::from(20u64))]
    pub handover_delay: TimeMS,
    #[builder(default = TimeMS::from(480u64))]
    pub report_interval: TimeMS,
    #[builder(default = Ipv4Addr::new(7, 0, 0, 0))]
    pub ue_network: Ipv4Addr,
    #[builder(default = 8)]
    pub ue_prefix: u8,
    #[builder(default)]
    pub transport: TransportMode,
    #[builder(default)]
    pub capacity: CapacitySettings,
}

impl Default for StackSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Core network nodes, created before anything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Epc {
    pub pgw: AgentId,
    pub sgw: AgentId,
    pub mme: AgentId,
}

/// Trace sources of the stack. Traces are queued while events are handled and handed to
/// whoever is connected once the event is done.
#[derive(Clone, Debug, PartialEq)]
pub enum StackTrace {
    ConnectionEstablished {
        enb_node: AgentId,
        imsi: Imsi,
        cell_id: CellId,
        rnti: Rnti,
    },
    HandoverEndOk {
        enb_node: AgentId,
        imsi: Imsi,
        cell_id: CellId,
        rnti: Rnti,
    },
    RecvMeasurementReport {
        imsi: Imsi,
        cell_id: CellId,
        rnti: Rnti,
        report: MeasurementReport,
    },
    Ipv4Rx {
        ue_node: AgentId,
        imsi: Imsi,
        size: u32,
    },
}

impl StackTrace {
    /// Path of the eNB trace source that fired, for the connection traces.
    pub fn context(&self) -> Option<String> {
        match self {
            StackTrace::ConnectionEstablished { enb_node, .. } => Some(format!(
                "/NodeList/{}/DeviceList/0/LteEnbRrc/ConnectionEstablished",
                enb_node
            )),
            StackTrace::HandoverEndOk { enb_node, .. } => Some(format!(
                "/NodeList/{}/DeviceList/0/LteEnbRrc/HandoverEndOk",
                enb_node
            )),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RrcState {
    Idle,
    Connecting { cell_id: CellId, rnti: Rnti },
    Connected { cell_id: CellId, rnti: Rnti },
    HandingOver { source: CellId, target: CellId },
}

impl RrcState {
    /// The cell holding the UE context. During a handover that is still the source.
    pub fn serving_cell(&self) -> Option<CellId> {
        match self {
            RrcState::Idle => None,
            RrcState::Connecting { cell_id, .. } | RrcState::Connected { cell_id, .. } => {
                Some(*cell_id)
            }
            RrcState::HandingOver { source, .. } => Some(*source),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EnbDevice {
    pub node: AgentId,
    pub cell_id: CellId,
    pub site: SectorSite,
    next_rnti: Rnti,
    capacity: CellCapacity,
}

impl EnbDevice {
    fn allocate_rnti(&mut self) -> Rnti {
        let rnti = self.next_rnti;
        self.next_rnti = self.next_rnti.checked_add(1).unwrap_or(1);
        rnti
    }
}

#[derive(Clone, Debug)]
pub struct UeContext {
    pub node: AgentId,
    pub imsi: Imsi,
    pub address: Option<Ipv4Addr>,
    pub state: RrcState,
    rlc: RlcBuffer,
}

impl UeContext {
    pub fn backlog(&self) -> u64 {
        self.rlc.backlog()
    }

    pub fn dropped_bytes(&self) -> u64 {
        self.rlc.dropped_bytes()
    }
}

/// The LTE/EPC network: eNB and UE devices, RRC connection handling, measurement reporting,
/// X2 handovers and the downlink data path from the PGW to the UEs.
pub struct LteStack {
    settings: StackSettings,
    radio: RadioEnvironment,
    handover: A2A4RsrqHandover,
    epc: Option<Epc>,
    enbs: BTreeMap<CellId, EnbDevice>,
    ues: BTreeMap<Imsi, UeContext>,
    ue_nodes: BTreeMap<AgentId, Imsi>,
    by_address: HashMap<Ipv4Addr, Imsi>,
    x2: BTreeSet<(CellId, CellId)>,
    address_pool: Ipv4Pool,
    gateway: Ipv4Addr,
    outbox: Vec<StackTrace>,
}

impl LteStack {
    pub fn new(
        settings: StackSettings,
        radio_settings: RadioSettings,
        handover_settings: HandoverSettings,
    ) -> NetResult<Self> {
        let mut address_pool = Ipv4Pool::new(settings.ue_network, settings.ue_prefix)?;
        let gateway = address_pool.allocate()?;
        Ok(Self {
            settings,
            radio: RadioEnvironment::new(radio_settings),
            handover: A2A4RsrqHandover::new(handover_settings),
            epc: None,
            enbs: BTreeMap::new(),
            ues: BTreeMap::new(),
            ue_nodes: BTreeMap::new(),
            by_address: HashMap::new(),
            x2: BTreeSet::new(),
            address_pool,
            gateway,
            outbox: Vec::new(),
        })
    }

    pub fn settings(&self) -> &StackSettings {
        &self.settings
    }

    pub fn radio(&self) -> &RadioEnvironment {
        &self.radio
    }

    pub fn handover_settings(&self) -> &HandoverSettings {
        self.handover.settings()
    }

    pub fn create_epc(&mut self, core: &mut Core) -> Epc {
        let epc = Epc {
            pgw: core.add_agent(AgentKind::Pgw),
            sgw: core.add_agent(AgentKind::Sgw),
            mme: core.add_agent(AgentKind::Mme),
        };
        info!(
            "EPC created with PGW {}, SGW {}, MME {}",
            epc.pgw, epc.sgw, epc.mme
        );
        self.epc = Some(epc);
        epc
    }

    pub fn epc(&self) -> Option<Epc> {
        self.epc
    }

    /// Installs an eNB device on `node`. Cell ids are handed out from 1 in install order.
    pub fn install_enb_device(&mut self, node: AgentId, site: SectorSite) -> CellId {
        let cell_id = self.enbs.len() as CellId + 1;
        self.radio.add_cell(CellSite {
            cell_id,
            position: site.position,
            orientation: site.orientation,
        });
        self.enbs.insert(
            cell_id,
            EnbDevice {
                node,
                cell_id,
                site,
                next_rnti: 1,
                capacity: CellCapacity::with_settings(&self.settings.capacity),
            },
        );
        debug!(
            "Cell {} installed on node {} at {} facing {}",
            cell_id, node, site.position, site.orientation
        );
        cell_id
    }

    /// Connects every pair of the given cells.
    pub fn add_x2_interface(&mut self, cells: &[CellId]) {
        for (index, first) in cells.iter().enumerate() {
            for second in cells.iter().skip(index + 1) {
                self.x2.insert((*first, *second));
                self.x2.insert((*second, *first));
            }
        }
        debug!("{} X2 interfaces between {} cells", self.x2.len() / 2, cells.len());
    }

    pub fn has_x2(&self, source: CellId, target: CellId) -> bool {
        self.x2.contains(&(source, target))
    }

    /// Installs a UE device on `node`. IMSIs are handed out from 1 in install order.
    pub fn install_ue_device(&mut self, node: AgentId) -> Imsi {
        let imsi = self.ues.len() as Imsi + 1;
        self.ues.insert(
            imsi,
            UeContext {
                node,
                imsi,
                address: None,
                state: RrcState::Idle,
                rlc: RlcBuffer::for_mode(self.settings.transport),
            },
        );
        self.ue_nodes.insert(node, imsi);
        imsi
    }

    pub fn assign_ue_address(&mut self, imsi: Imsi) -> NetResult<Ipv4Addr> {
        let ue = self.ues.get_mut(&imsi).ok_or(NetError::UnknownImsi(imsi))?;
        let address = self.address_pool.allocate()?;
        ue.address = Some(address);
        self.by_address.insert(address, imsi);
        debug!("IMSI {} got address {}", imsi, address);
        Ok(address)
    }

    pub fn ue_default_gateway(&self) -> Ipv4Addr {
        self.gateway
    }

    /// Selects the cell with the strongest RSRP at `at` and starts the RRC connection.
    pub fn attach(&mut self, imsi: Imsi, at: &Point2D) -> NetResult<CellId> {
        let cell_id = self
            .radio
            .strongest_cell(at)
            .ok_or(NetError::NoCell(imsi))?;
        let enb = self.enbs.get_mut(&cell_id).ok_or(NetError::NoCell(imsi))?;
        let ue = self.ues.get_mut(&imsi).ok_or(NetError::UnknownImsi(imsi))?;
        let rnti = enb.allocate_rnti();
        ue.state = RrcState::Connecting { cell_id, rnti };
        debug!("IMSI {} at {} selected cell {}", imsi, at, cell_id);
        Ok(cell_id)
    }

    /// Arms the pending RRC connection setups.
    pub fn initialize(&mut self, queue: &mut EventQueue<LteEvent>) {
        for ue in self.ues.values() {
            if let RrcState::Connecting { .. } = ue.state {
                queue.schedule_in(
                    self.settings.connection_setup_delay,
                    EventOrder::CONTROL,
                    LteEvent::ConnectionSetup { imsi: ue.imsi },
                );
            }
        }
    }

    pub fn complete_connection(&mut self, imsi: Imsi, queue: &mut EventQueue<LteEvent>) {
        let Some(ue) = self.ues.get_mut(&imsi) else {
            warn!("Connection setup for unknown IMSI {}", imsi);
            return;
        };
        let RrcState::Connecting { cell_id, rnti } = ue.state else {
            warn!("IMSI {} is not waiting for a connection", imsi);
            return;
        };
        let Some(enb) = self.enbs.get(&cell_id) else {
            warn!("IMSI {} connected to unknown cell {}", imsi, cell_id);
            return;
        };
        ue.state = RrcState::Connected { cell_id, rnti };
        self.outbox.push(StackTrace::ConnectionEstablished {
            enb_node: enb.node,
            imsi,
            cell_id,
            rnti,
        });

        let interval = self.settings.report_interval;
        queue.schedule_repeating(
            queue.now() + interval,
            interval,
            EventOrder::CONTROL,
            LteEvent::MeasurementPeriod { imsi },
        );
    }

    /// Measures every cell at the UE position and sends the period's reports to the serving
    /// eNB, which may start a handover. Returns the serving cell measurement.
    pub fn report_measurements(
        &mut self,
        imsi: Imsi,
        at: &Point2D,
        queue: &mut EventQueue<LteEvent>,
    ) -> Option<(CellId, Rnti, Measurement)> {
        let RrcState::Connected { cell_id, rnti } = self.ues.get(&imsi)?.state else {
            trace!("IMSI {} skips its measurement period", imsi);
            return None;
        };

        let measurements = self.radio.measure(at);
        let reports =
            MeasurementReport::for_period(self.handover.settings(), cell_id, &measurements);
        let mut target = None;
        for report in reports.into_iter() {
            if let Some(decided) = self.handover.on_report(cell_id, imsi, &report) {
                target.get_or_insert(decided);
            }
            self.outbox.push(StackTrace::RecvMeasurementReport {
                imsi,
                cell_id,
                rnti,
                report,
            });
        }
        if let Some(target) = target {
            self.start_handover(imsi, cell_id, target, queue);
        }

        measurements
            .into_iter()
            .find(|m| m.cell_id == cell_id)
            .map(|m| (cell_id, rnti, m))
    }

    fn start_handover(
        &mut self,
        imsi: Imsi,
        source: CellId,
        target: CellId,
        queue: &mut EventQueue<LteEvent>,
    ) {
        if !self.has_x2(source, target) {
            warn!(
                "No X2 interface from cell {} to {}, IMSI {} stays",
                source, target, imsi
            );
            return;
        }
        let Some(ue) = self.ues.get_mut(&imsi) else {
            return;
        };
        ue.state = RrcState::HandingOver { source, target };
        self.handover.forget(source, imsi);
        info!(
            "Handover of IMSI {} from cell {} to {} at {}",
            imsi,
            source,
            target,
            queue.now()
        );
        queue.schedule_in(
            self.settings.handover_delay,
            EventOrder::CONTROL,
            LteEvent::HandoverComplete { imsi, target },
        );
    }

    /// The target admits the UE with a fresh RNTI. The RLC buffer belongs to the UE, so queued
    /// data is scheduled by the target from the next TTI on.
    pub fn complete_handover(&mut self, imsi: Imsi, target: CellId) {
        let Some(ue) = self.ues.get_mut(&imsi) else {
            warn!("Handover completion for unknown IMSI {}", imsi);
            return;
        };
        if ue.state.serving_cell().is_none() {
            warn!("IMSI {} completed a handover without a connection", imsi);
            return;
        }
        let Some(enb) = self.enbs.get_mut(&target) else {
            warn!("Handover of IMSI {} to unknown cell {}", imsi, target);
            return;
        };
        let rnti = enb.allocate_rnti();
        ue.state = RrcState::Connected {
            cell_id: target,
            rnti,
        };
        self.outbox.push(StackTrace::HandoverEndOk {
            enb_node: enb.node,
            imsi,
            cell_id: target,
            rnti,
        });
    }

    /// PGW side of the data path: puts the packet into the RLC buffer of the UE owning the
    /// destination address. Returns whether the buffer accepted it.
    pub fn route_downlink(&mut self, packet: Packet) -> NetResult<bool> {
        let Some(imsi) = self.by_address.get(&packet.destination) else {
            let node = self.epc.map(|epc| epc.pgw).unwrap_or_default();
            return Err(NetError::Unroutable {
                node,
                destination: packet.destination,
            });
        };
        let ue = self.ues.get_mut(imsi).ok_or(NetError::UnknownImsi(*imsi))?;
        Ok(ue.rlc.push(packet))
    }

    /// One TTI of downlink scheduling in every cell. Returns the packets completed during the
    /// TTI with the IMSI receiving them.
    pub fn schedule_tti<F>(&mut self, mut position_of: F) -> Vec<(Imsi, Packet)>
    where
        F: FnMut(Imsi) -> Option<Point2D>,
    {
        let mut backlogged: BTreeMap<CellId, Vec<(Imsi, f64)>> = BTreeMap::new();
        for ue in self.ues.values() {
            let RrcState::Connected { cell_id, .. } = ue.state else {
                continue;
            };
            if ue.rlc.backlog() == 0 {
                continue;
            }
            let Some(position) = position_of(ue.imsi) else {
                continue;
            };
            if let Some(sinr_db) = self.radio.sinr_db(cell_id, &position) {
                backlogged
                    .entry(cell_id)
                    .or_default()
                    .push((ue.imsi, sinr_db));
            }
        }

        let mut delivered = Vec::new();
        for (cell_id, waiting) in backlogged.into_iter() {
            let Some(enb) = self.enbs.get_mut(&cell_id) else {
                continue;
            };
            let demands: Vec<Demand> = waiting
                .iter()
                .filter_map(|(imsi, sinr_db)| {
                    self.ues.get(imsi).map(|ue| Demand {
                        backlog: ue.rlc.backlog(),
                        sinr_db: *sinr_db,
                    })
                })
                .collect();
            let grants = enb.capacity.share(&demands);
            for ((imsi, _), grant) in waiting.iter().zip(grants.into_iter()) {
                let Some(ue) = self.ues.get_mut(imsi) else {
                    continue;
                };
                for packet in ue.rlc.drain(grant) {
                    self.outbox.push(StackTrace::Ipv4Rx {
                        ue_node: ue.node,
                        imsi: *imsi,
                        size: packet.size,
                    });
                    delivered.push((*imsi, packet));
                }
            }
        }
        delivered
    }

    pub fn drain_traces(&mut self) -> Vec<StackTrace> {
        std::mem::take(&mut self.outbox)
    }

    pub fn ue(&self, imsi: Imsi) -> Option<&UeContext> {
        self.ues.get(&imsi)
    }

    pub fn ues(&self) -> impl Iterator<Item = &UeContext> {
        self.ues.values()
    }

    pub fn imsi_of_node(&self, node: AgentId) -> Option<Imsi> {
        self.ue_nodes.get(&node).copied()
    }

    pub fn enb(&self, cell_id: CellId) -> Option<&EnbDevice> {
        self.enbs.get(&cell_id)
    }

    pub fn cell_count(&self) -> usize {
        self.enbs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hovis_models::device::placement::HexGridLayout;

    fn stack_with_cells(count: u32) -> (Core, LteStack) {
        let mut core = Core::new();
        let mut stack = LteStack::new(
            StackSettings::default(),
            RadioSettings::default(),
            HandoverSettings::default(),
        )
        .unwrap();
        stack.create_epc(&mut core);
        let layout = HexGridLayout::default();
        let cells: Vec<CellId> = (0..count)
            .map(|index| {
                let node = core.add_agent(AgentKind::BaseStation);
                stack.install_enb_device(node, layout.sector(index))
            })
            .collect();
        stack.add_x2_interface(&cells);
        (core, stack)
    }

    #[test]
    fn identifiers_follow_install_order() {
        let (mut core, mut stack) = stack_with_cells(3);
        assert_eq!(stack.cell_count(), 3);
        assert!(stack.has_x2(1, 3) && stack.has_x2(3, 1));
        let first = stack.install_ue_device(core.add_agent(AgentKind::Ue));
        let second = stack.install_ue_device(core.add_agent(AgentKind::Ue));
        assert_eq!((first, second), (1, 2));
        assert_eq!(stack.imsi_of_node(AgentId::from(6u64)), Some(1));
        assert_eq!(stack.ue_default_gateway(), Ipv4Addr::new(7, 0, 0, 1));
        assert_eq!(
            stack.assign_ue_address(first).unwrap(),
            Ipv4Addr::new(7, 0, 0, 2)
        );
        assert_eq!(stack.assign_ue_address(9), Err(NetError::UnknownImsi(9)));
    }

    #[test]
    fn attach_without_cells_fails() {
        let (mut core, mut stack) = stack_with_cells(0);
        let imsi = stack.install_ue_device(core.add_agent(AgentKind::Ue));
        assert_eq!(
            stack.attach(imsi, &Point2D::new(0.0, 0.0)),
            Err(NetError::NoCell(imsi))
        );
    }

    #[test]
    fn connection_is_traced_after_setup() {
        let (mut core, mut stack) = stack_with_cells(3);
        let imsi = stack.install_ue_device(core.add_agent(AgentKind::Ue));
        let cell_id = stack.attach(imsi, &Point2D::new(200.0, 0.0)).unwrap();
        assert_eq!(cell_id, 1);

        let mut queue = EventQueue::new();
        stack.initialize(&mut queue);
        assert_eq!(queue.peek_time(), Some(TimeMS::from(20u64)));
        let (_, event) = queue.pop_next().unwrap();
        assert_eq!(event, LteEvent::ConnectionSetup { imsi });
        stack.complete_connection(imsi, &mut queue);

        let traces = stack.drain_traces();
        assert_eq!(traces.len(), 1);
        assert_eq!(
            traces[0].context().unwrap(),
            "/NodeList/3/DeviceList/0/LteEnbRrc/ConnectionEstablished"
        );
        assert_eq!(queue.peek_time(), Some(TimeMS::from(500u64)));
    }

    #[test]
    fn queued_data_follows_the_ue_through_handover() {
        let (mut core, mut stack) = stack_with_cells(3);
        let imsi = stack.install_ue_device(core.add_agent(AgentKind::Ue));
        let address = stack.assign_ue_address(imsi).unwrap();
        stack.attach(imsi, &Point2D::new(200.0, 0.0)).unwrap();
        let mut queue = EventQueue::new();
        stack.initialize(&mut queue);
        stack.complete_connection(imsi, &mut queue);
        stack.drain_traces();

        let packet = Packet::new(0, 512, TransportMode::Udp, address, 10000);
        assert!(stack.route_downlink(packet).unwrap());
        let queued = stack.ue(imsi).unwrap().backlog();
        assert_eq!(queued, packet.size as u64);

        stack.complete_handover(imsi, 2);
        let ue = stack.ue(imsi).unwrap();
        assert_eq!(ue.state.serving_cell(), Some(2));
        assert_eq!(ue.backlog(), queued);
        let traces = stack.drain_traces();
        assert_eq!(
            traces[0].context().unwrap(),
            "/NodeList/4/DeviceList/0/LteEnbRrc/HandoverEndOk"
        );

        let near_cell_two = Point2D::new(-100.0, 173.0);
        let mut delivered = Vec::new();
        for _ in 0..100 {
            delivered.extend(stack.schedule_tti(|_| Some(near_cell_two)));
            if !delivered.is_empty() {
                break;
            }
        }
        assert_eq!(delivered, vec![(imsi, packet)]);
        assert_eq!(stack.ue(imsi).unwrap().backlog(), 0);
    }

    #[test]
    fn unknown_destinations_are_unroutable() {
        let (_, mut stack) = stack_with_cells(1);
        let packet = Packet::new(0, 512, TransportMode::Udp, Ipv4Addr::new(7, 0, 0, 9), 10000);
        assert!(matches!(
            stack.route_downlink(packet),
            Err(NetError::Unroutable { .. })
        ));
    }
}
