use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use hovis_core::bucket::TimeMS;
use hovis_core::core::Core;
use hovis_core::scheduler::EventScheduler;
use hovis_models::device::mobility::Point2D;
use hovis_models::device::placement::HexGridLayout;
use hovis_models::error::NetResult;
use hovis_output::logger::{initiate_logger, initiate_stderr_logger};
use hovis_output::rem::RemGrid;
use hovis_output::result::{OutputSettings, Results};
use hovis_output::trace::TraceWriter;
use hovis_output::ui::SimUIMetadata;

use crate::lte::bucket::{BucketModels, LteBucket};
use crate::lte::devices::{DeviceSettings, MobileDevices};
use crate::lte::map::render_map;
use crate::lte::remote::{LinkSettings, RemoteEndpoint};
use crate::lte::stack::{LteStack, StackSettings};
use crate::lte::telemetry::Telemetry;
use crate::lte::topology::Topology;
use crate::lte::traffic::{TrafficPlane, TrafficSettings};
use crate::simulation::config::{BaseConfig, BaseConfigReader, CliArgs};
use crate::simulation::ui::SimRenderer;

pub type LteScheduler = EventScheduler<LteBucket>;

/// Stops the run on a provisioning failure. A partially built scenario is never simulated.
fn provisioned<T>(step: &str, result: NetResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("Failed to provision the {}: {}", step, e),
    }
}

pub struct SimulationBuilder {
    base_config: BaseConfig,
    config_path: PathBuf,
    config_file: String,
    metadata: SimUIMetadata,
    trace_output: Option<Box<dyn Write + Send>>,
}

impl SimulationBuilder {
    pub fn new(args: &CliArgs) -> Self {
        let (mut base_config, config_path, config_file) = match &args.config {
            Some(base_config_file) => Self::read_config(base_config_file),
            None => (BaseConfig::default(), PathBuf::from("."), String::from("<defaults>")),
        };
        base_config.apply_overrides(args);
        Self::with_config(base_config, config_path, &config_file)
    }

    fn read_config(base_config_file: &str) -> (BaseConfig, PathBuf, String) {
        if !Path::new(base_config_file).exists() {
            panic!("Configuration file {} is not found.", base_config_file);
        }
        let config_path = Path::new(base_config_file)
            .parent()
            .unwrap_or_else(|| {
                panic!("Invalid directory for the configuration file");
            })
            .to_path_buf();

        let config_reader = BaseConfigReader::new(base_config_file);
        match config_reader.parse() {
            Ok(base_config) => (base_config, config_path, base_config_file.to_owned()),
            Err(e) => {
                panic!("Error while parsing the base configuration file: {}", e);
            }
        }
    }

    pub fn with_config(base_config: BaseConfig, config_path: PathBuf, config_file: &str) -> Self {
        let metadata = Self::build_metadata(&base_config, config_file);
        Self {
            base_config,
            config_path,
            config_file: config_file.to_owned(),
            metadata,
            trace_output: None,
        }
    }

    /// Sends the telemetry stream somewhere other than standard output.
    pub fn with_trace_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.trace_output = Some(out);
        self
    }

    fn build_metadata(base_config: &BaseConfig, config_file: &str) -> SimUIMetadata {
        SimUIMetadata {
            scenario: base_config.simulation_settings.scenario.clone(),
            transport: base_config.simulation_settings.transport.to_string(),
            config_file: config_file.to_owned(),
            log_path: base_config
                .log_settings
                .as_ref()
                .map(|settings| settings.log_path.clone())
                .unwrap_or_else(|| String::from("stderr")),
        }
    }

    pub fn config(&self) -> &BaseConfig {
        &self.base_config
    }

    pub fn is_map_mode(&self) -> bool {
        self.base_config.simulation_settings.render_map
    }

    pub fn use_tui(&self) -> bool {
        self.base_config.simulation_settings.tui
    }

    fn start_logging(&self) {
        match &self.base_config.log_settings {
            Some(log_settings) => initiate_logger(&self.config_path, log_settings),
            None => initiate_stderr_logger("info"),
        }
        info!("Using configuration {}", self.config_file);
    }

    /// Provisions the network in its fixed order: EPC, eNBs, UEs, server, flows. Later steps
    /// read the identifiers and addresses handed out by the earlier ones.
    pub fn build_network(&self) -> LteBucket {
        self.start_logging();
        let mut core = Core::new();

        info!("Building the LTE/EPC stack...");
        let mut stack = provisioned("LTE stack", self.build_stack());
        stack.create_epc(&mut core);

        info!("Building the topology...");
        let scenario = &self.base_config.scenario_settings;
        let topology = Topology::provision(
            &mut core,
            &mut stack,
            &HexGridLayout::default(),
            scenario.enb_count,
        );

        info!("Building the mobile devices...");
        let devices = provisioned(
            "mobile devices",
            MobileDevices::provision(&mut core, &mut stack, &self.device_settings()),
        );

        info!("Building the remote endpoint...");
        let remote = provisioned(
            "remote endpoint",
            RemoteEndpoint::provision(&mut core, &stack, LinkSettings::default()),
        );

        info!("Building the traffic flows...");
        let traffic = TrafficPlane::provision(self.traffic_settings(), &devices, &remote);

        LteBucket::builder()
            .core(core)
            .topology(topology)
            .devices(devices)
            .remote(remote)
            .models(self.build_bucket_models(stack, traffic))
            .build()
    }

    /// Builds the network, connects the telemetry stream and arms the stop time.
    pub fn build(&mut self) -> LteScheduler {
        let mut bucket = self.build_network();

        info!("Connecting telemetry...");
        let writer = match self.trace_output.take() {
            Some(out) => TraceWriter::new(out),
            None => TraceWriter::stdout(),
        };
        bucket.connect_telemetry(Telemetry::new(writer));

        info!("Building scheduler...");
        EventScheduler::builder()
            .bucket(bucket)
            .duration(self.duration())
            .build()
    }

    /// Writes the radio environment map of the provisioned cells. Returns the number of points.
    pub fn render_map(&self) -> u64 {
        let bucket = self.build_network();
        let map_file = self
            .config_path
            .join(&self.base_config.simulation_settings.map_file);
        match render_map(bucket.stack().radio(), &RemGrid::default(), &map_file) {
            Ok(written) => written,
            Err(e) => panic!("Failed to write the map to {}: {}", map_file.display(), e),
        }
    }

    fn build_stack(&self) -> NetResult<LteStack> {
        let settings = StackSettings::builder()
            .transport(self.base_config.simulation_settings.transport)
            .build();
        LteStack::new(
            settings,
            self.base_config.radio_settings,
            self.base_config.handover_settings,
        )
    }

    fn device_settings(&self) -> DeviceSettings {
        let scenario = &self.base_config.scenario_settings;
        DeviceSettings::builder()
            .count(scenario.ue_count)
            .min_speed(scenario.min_speed)
            .max_speed(scenario.max_speed)
            .center(Point2D::new(scenario.x_pos, scenario.y_pos))
            .rho(scenario.rho)
            .bounds(scenario.bounds)
            .seed(self.base_config.simulation_settings.seed)
            .build()
    }

    fn traffic_settings(&self) -> TrafficSettings {
        TrafficSettings::builder()
            .mode(self.base_config.simulation_settings.transport)
            .build()
    }

    fn output_settings(&self) -> OutputSettings {
        self.base_config
            .output_settings
            .clone()
            .unwrap_or_else(|| OutputSettings::lte_traces(&self.config_path.to_string_lossy()))
    }

    fn build_bucket_models(&self, stack: LteStack, traffic: TrafficPlane) -> BucketModels {
        if !self.base_config.simulation_settings.enable_traces {
            return BucketModels::builder().stack(stack).traffic(traffic).build();
        }
        let output_settings = self.output_settings();
        info!("Writing trace tables to {}", output_settings.output_path);
        BucketModels::builder()
            .stack(stack)
            .traffic(traffic)
            .results(Some(Results::new(&output_settings)))
            .output_interval(output_settings.output_interval)
            .build()
    }

    fn duration(&self) -> TimeMS {
        self.base_config.simulation_settings.duration()
    }

    pub fn metadata(&self) -> SimUIMetadata {
        self.metadata.clone()
    }

    pub fn renderer(&self) -> SimRenderer {
        SimRenderer::new()
    }
}
