use std::collections::BTreeMap;

use log::{debug, info, trace};

use hovis_core::agent::AgentId;
use hovis_core::bucket::TimeMS;
use hovis_models::device::mobility::Point2D;
use hovis_models::net::handover::MeasResult;
use hovis_models::net::radio::Imsi;
use hovis_output::trace::{CellMeasurement, TraceRecord, TraceWriter};

use crate::lte::devices::MobileDevices;
use crate::lte::stack::StackTrace;
use crate::lte::topology::Topology;

pub const SAMPLING_PERIOD: TimeMS = TimeMS(100);

/// Nodes created ahead of the UEs besides the eNBs: PGW, SGW and MME.
const EPC_NODES: u64 = 3;

/// IMSI of the UE on node slot `node`, given that the PGW, SGW, MME and all eNBs were created
/// before the first UE. `None` for slots below the first UE.
pub fn imsi_from_node(node: AgentId, enb_count: u32) -> Option<Imsi> {
    (node.as_u64() + 1)
        .checked_sub(enb_count as u64 + EPC_NODES)
        .filter(|imsi| *imsi > 0)
}

/// Per-UE sampling state: the bytes received since the last sample.
#[derive(Clone, Debug)]
pub struct SamplingTask {
    pub node: AgentId,
    pub imsi: Imsi,
    accumulator: u64,
}

impl SamplingTask {
    fn record(&mut self, bytes: u32) {
        self.accumulator += bytes as u64;
    }

    fn take(&mut self) -> u64 {
        std::mem::take(&mut self.accumulator)
    }
}

fn to_cell_measurement(result: &MeasResult) -> CellMeasurement {
    CellMeasurement {
        cell_id: result.cell_id,
        rsrp: result.rsrp_range,
        rsrq: result.rsrq_range,
    }
}

/// Owner of the telemetry stream. Samples UEs on their timers and turns the stack's traces
/// into records as they are delivered.
pub struct Telemetry {
    writer: TraceWriter,
    tasks: BTreeMap<Imsi, SamplingTask>,
    period: TimeMS,
}

impl Telemetry {
    pub fn new(writer: TraceWriter) -> Self {
        Self {
            writer,
            tasks: BTreeMap::new(),
            period: SAMPLING_PERIOD,
        }
    }

    pub fn period(&self) -> TimeMS {
        self.period
    }

    /// One `Cell state` record per eNB, in creation order.
    pub fn dump_initial_state(&mut self, now: TimeMS, topology: &Topology) {
        for station in topology.stations() {
            let position = station.position();
            self.writer.write(&TraceRecord::CellState {
                time: now,
                cell_id: station.cell_id,
                x: position.x,
                y: position.y,
                direction: station.direction,
            });
        }
        debug!("Dumped the state of {} cells", topology.len());
    }

    /// Creates the sampling task of every UE. The IMSI from the stack must match the one
    /// implied by the node slot.
    pub fn setup_callbacks(&mut self, devices: &MobileDevices, enb_count: u32) {
        for device in devices.iter() {
            match imsi_from_node(device.node, enb_count) {
                Some(imsi) if imsi == device.imsi => {}
                derived => panic!(
                    "UE node {} has IMSI {} but its slot implies {:?}",
                    device.node, device.imsi, derived
                ),
            }
            self.tasks.insert(
                device.imsi,
                SamplingTask {
                    node: device.node,
                    imsi: device.imsi,
                    accumulator: 0,
                },
            );
        }
        info!(
            "Sampling {} UEs every {} ms",
            self.tasks.len(),
            self.period
        );
    }

    pub fn sampled(&self) -> Vec<Imsi> {
        self.tasks.keys().copied().collect()
    }

    pub fn on_trace(&mut self, now: TimeMS, stack_trace: &StackTrace) {
        match stack_trace {
            StackTrace::ConnectionEstablished { imsi, cell_id, .. }
            | StackTrace::HandoverEndOk { imsi, cell_id, .. } => {
                self.writer.write(&TraceRecord::UeSeenAtCell {
                    time: now,
                    cell_id: *cell_id,
                    imsi: *imsi,
                    context: stack_trace.context().unwrap_or_default(),
                });
            }
            StackTrace::RecvMeasurementReport {
                imsi,
                cell_id,
                report,
                ..
            } => {
                self.writer.write(&TraceRecord::MeasurementReport {
                    time: now,
                    cell_id: *cell_id,
                    imsi: *imsi,
                    meas_id: report.meas_id,
                    serving: CellMeasurement {
                        cell_id: *cell_id,
                        ..to_cell_measurement(&report.serving)
                    },
                    neighbours: report.neighbours.iter().map(to_cell_measurement).collect(),
                });
            }
            StackTrace::Ipv4Rx { imsi, size, .. } => match self.tasks.get_mut(imsi) {
                Some(task) => task.record(*size),
                None => trace!("No sampling task for IMSI {}", imsi),
            },
        }
    }

    /// Writes the `UE state` record of one UE and restarts its byte count.
    pub fn sample(&mut self, now: TimeMS, imsi: Imsi, position: Point2D) {
        let Some(task) = self.tasks.get_mut(&imsi) else {
            return;
        };
        let rx_bytes = task.take();
        self.writer.write(&TraceRecord::UeState {
            time: now,
            imsi,
            x: position.x,
            y: position.y,
            rx_bytes,
        });
    }

    pub fn written(&self) -> u64 {
        self.writer.written()
    }

    pub fn close(self) {
        info!("Telemetry stream closed after {} records", self.writer.written());
        self.writer.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hovis_testutils::writer::SharedBuffer;

    #[test]
    fn slots_map_to_imsis() {
        assert_eq!(imsi_from_node(AgentId::from(8u64), 5), Some(1));
        assert_eq!(imsi_from_node(AgentId::from(11u64), 5), Some(4));
        assert_eq!(imsi_from_node(AgentId::from(7u64), 5), None);
        assert_eq!(imsi_from_node(AgentId::from(0u64), 5), None);
    }

    #[test]
    fn sample_resets_the_count() {
        let buffer = SharedBuffer::new();
        let mut telemetry = Telemetry::new(TraceWriter::new(Box::new(buffer.clone())));
        telemetry.tasks.insert(
            1,
            SamplingTask {
                node: AgentId::from(8u64),
                imsi: 1,
                accumulator: 0,
            },
        );
        let rx = StackTrace::Ipv4Rx {
            ue_node: AgentId::from(8u64),
            imsi: 1,
            size: 540,
        };
        telemetry.on_trace(TimeMS::from(1050u64), &rx);
        telemetry.on_trace(TimeMS::from(1100u64), &rx);
        telemetry.sample(TimeMS::from(1100u64), 1, Point2D::new(1.5, -2.0));
        telemetry.sample(TimeMS::from(1200u64), 1, Point2D::new(1.5, -2.0));
        telemetry.close();

        assert_eq!(
            buffer.lines(),
            vec![
                "1100 ms: UE state: IMSI 1 at 1.5 -2 with 1080 received bytes",
                "1200 ms: UE state: IMSI 1 at 1.5 -2 with 0 received bytes",
            ]
        );
    }
}
