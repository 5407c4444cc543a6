use log::{debug, info, warn};
use typed_builder::TypedBuilder;

use hovis_core::bucket::{Bucket, TimeMS};
use hovis_core::core::Core;
use hovis_core::scheduler::{EventOrder, EventQueue};
use hovis_models::net::radio::{CellId, Imsi};
use hovis_output::result::Results;

use crate::lte::devices::MobileDevices;
use crate::lte::remote::RemoteEndpoint;
use crate::lte::stack::LteStack;
use crate::lte::telemetry::Telemetry;
use crate::lte::topology::Topology;
use crate::lte::traffic::TrafficPlane;

/// Length of one downlink scheduling interval.
pub const TTI: TimeMS = TimeMS(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LteEvent {
    /// Moves packets one TTI along the server, the link, the PGW and the radio.
    NetworkTick,
    ConnectionSetup { imsi: Imsi },
    MeasurementPeriod { imsi: Imsi },
    HandoverComplete { imsi: Imsi, target: CellId },
    SampleUe { imsi: Imsi },
    FlushTraces,
}

/// The network models driven by the events.
#[derive(TypedBuilder)]
pub struct BucketModels {
    pub stack: LteStack,
    pub traffic: TrafficPlane,
    #[builder(default)]
    pub results: Option<Results>,
    #[builder(default = TimeMS::from(250u64))]
    pub output_interval: TimeMS,
}

#[derive(TypedBuilder)]
pub struct LteBucket {
    pub core: Core,
    pub topology: Topology,
    pub devices: MobileDevices,
    pub remote: RemoteEndpoint,
    pub models: BucketModels,
    #[builder(default)]
    pub telemetry: Option<Telemetry>,
}

impl LteBucket {
    /// Writes the initial cell states and starts sampling every UE.
    pub fn connect_telemetry(&mut self, mut telemetry: Telemetry) {
        telemetry.dump_initial_state(TimeMS::ZERO, &self.topology);
        telemetry.setup_callbacks(&self.devices, self.topology.len() as u32);
        self.telemetry = Some(telemetry);
    }

    pub fn stack(&self) -> &LteStack {
        &self.models.stack
    }

    pub fn traffic(&self) -> &TrafficPlane {
        &self.models.traffic
    }

    fn network_tick(&mut self, now: TimeMS) {
        for packet in self.models.traffic.emit(now) {
            if let Err(e) = self.remote.send(now, packet) {
                warn!("Server failed to send packet {}: {}", packet.seq, e);
            }
        }
        for packet in self.remote.arrivals(now) {
            match self.models.stack.route_downlink(packet) {
                Ok(true) => {}
                Ok(false) => debug!("RLC buffer dropped packet {}", packet.seq),
                Err(e) => warn!("PGW dropped packet {}: {}", packet.seq, e),
            }
        }

        let devices = &mut self.devices;
        let delivered = self
            .models
            .stack
            .schedule_tti(|imsi| devices.position_of(imsi, now));
        for (imsi, packet) in delivered.iter() {
            self.models.traffic.receive(now, *imsi, packet);
        }
    }

    fn measurement_period(&mut self, now: TimeMS, imsi: Imsi, queue: &mut EventQueue<LteEvent>) {
        let Some(position) = self.devices.position_of(imsi, now) else {
            warn!("Measurement period for unknown IMSI {}", imsi);
            return;
        };
        let serving = self
            .models
            .stack
            .report_measurements(imsi, &position, queue);
        let Some((cell_id, rnti, measurement)) = serving else {
            return;
        };
        if let Some(writer) = self
            .models
            .results
            .as_mut()
            .and_then(|results| results.rsrp_sinr.as_mut())
        {
            writer.add_data(
                now,
                cell_id,
                imsi,
                rnti,
                measurement.rsrp_dbm,
                measurement.sinr_db,
            );
        }
    }

    fn flush_traces(&mut self, now: TimeMS) {
        let Some(results) = self.models.results.as_mut() else {
            return;
        };
        if let Some(writer) = results.dl_rx.as_mut() {
            for flow in self.models.traffic.flows() {
                let Some(ue) = self.models.stack.ue(flow.imsi) else {
                    continue;
                };
                let cell_id = ue.state.serving_cell().unwrap_or_default();
                writer.add_data(
                    now,
                    flow.imsi,
                    cell_id,
                    flow.received_bytes(),
                    ue.dropped_bytes(),
                );
            }
        }
        results.write_to_file();
    }

    fn dispatch_traces(&mut self, now: TimeMS) {
        let traces = self.models.stack.drain_traces();
        if let Some(telemetry) = self.telemetry.as_mut() {
            for stack_trace in traces.iter() {
                telemetry.on_trace(now, stack_trace);
            }
        }
    }
}

impl Bucket for LteBucket {
    type E = LteEvent;

    fn initialize(&mut self, queue: &mut EventQueue<LteEvent>) {
        self.models.stack.initialize(queue);
        queue.schedule_repeating(TimeMS::ZERO, TTI, EventOrder::NETWORK, LteEvent::NetworkTick);

        if let Some(telemetry) = &self.telemetry {
            let period = telemetry.period();
            for imsi in telemetry.sampled() {
                queue.schedule_repeating(
                    period,
                    period,
                    EventOrder::TELEMETRY,
                    LteEvent::SampleUe { imsi },
                );
            }
        }
        if self.models.results.is_some() {
            let interval = self.models.output_interval;
            queue.schedule_repeating(interval, interval, EventOrder::TELEMETRY, LteEvent::FlushTraces);
        }
        info!(
            "{} UEs attached to {} cells, {} traffic over {}",
            self.devices.len(),
            self.topology.len(),
            self.models.traffic.mode(),
            self.remote.address
        );
    }

    fn handle(&mut self, event: LteEvent, queue: &mut EventQueue<LteEvent>) {
        let now = queue.now();
        match event {
            LteEvent::NetworkTick => self.network_tick(now),
            LteEvent::ConnectionSetup { imsi } => {
                self.models.stack.complete_connection(imsi, queue);
            }
            LteEvent::MeasurementPeriod { imsi } => self.measurement_period(now, imsi, queue),
            LteEvent::HandoverComplete { imsi, target } => {
                self.models.stack.complete_handover(imsi, target);
            }
            LteEvent::SampleUe { imsi } => {
                let position = self.devices.position_of(imsi, now);
                if let (Some(telemetry), Some(position)) = (self.telemetry.as_mut(), position) {
                    telemetry.sample(now, imsi, position);
                }
            }
            LteEvent::FlushTraces => self.flush_traces(now),
        }
        self.dispatch_traces(now);
    }

    fn terminate(self) {
        let LteBucket {
            telemetry, models, ..
        } = self;
        for flow in models.traffic.flows() {
            debug!(
                "IMSI {} received {} of {} packets",
                flow.imsi,
                flow.received_packets(),
                flow.packets_sent()
            );
        }
        if let Some(telemetry) = telemetry {
            telemetry.close();
        }
        if let Some(results) = models.results {
            results.close_files();
        }
    }
}
