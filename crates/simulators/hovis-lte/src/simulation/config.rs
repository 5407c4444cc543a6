use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use hovis_core::bucket::TimeMS;
use hovis_models::device::mobility::Rectangle;
use hovis_models::net::handover::HandoverSettings;
use hovis_models::net::radio::RadioSettings;
use hovis_models::net::traffic::TransportMode;
use hovis_output::logger::LogSettings;
use hovis_output::result::OutputSettings;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct BaseConfig {
    #[serde(default)]
    pub simulation_settings: SimSettings,
    #[serde(default)]
    pub scenario_settings: ScenarioSettings,
    #[serde(default)]
    pub handover_settings: HandoverSettings,
    #[serde(default)]
    pub radio_settings: RadioSettings,
    pub log_settings: Option<LogSettings>,
    pub output_settings: Option<OutputSettings>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SimSettings {
    pub scenario: String,
    /// Run length in seconds.
    pub duration: u64,
    pub seed: u64,
    pub transport: TransportMode,
    pub render_map: bool,
    pub map_file: String,
    pub enable_traces: bool,
    pub tui: bool,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            scenario: "handover".to_string(),
            duration: 60,
            seed: 0,
            transport: TransportMode::Tcp,
            render_map: false,
            map_file: "rem.dat".to_string(),
            enable_traces: false,
            tui: false,
        }
    }
}

impl SimSettings {
    pub fn duration(&self) -> TimeMS {
        TimeMS::from_secs(self.duration)
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ScenarioSettings {
    pub enb_count: u32,
    pub ue_count: u32,
    pub max_speed: f64,
    pub min_speed: f64,
    pub x_pos: f64,
    pub y_pos: f64,
    pub rho: f64,
    pub bounds: Rectangle,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            enb_count: 5,
            ue_count: 4,
            max_speed: 50.0,
            min_speed: 10.0,
            x_pos: 0.0,
            y_pos: 300.0,
            rho: 200.0,
            bounds: Rectangle::new(-600.0, 600.0, -400.0, 800.0),
        }
    }
}

/// Command line of the experiment. Every flag overrides the matching configuration value.
#[derive(Parser, Debug, Default)]
#[command(author, version, long_about = None)]
pub struct CliArgs {
    #[arg(short = 'c', long, value_name = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Render the radio environment map to the map file and quit
    #[arg(long)]
    pub map: bool,

    /// Write the DlRsrpSinrStats and DlRxStats trace tables
    #[arg(long)]
    pub traces: bool,

    /// Use UDP instead of TCP for the 10 Mbps downlink flow of each UE
    #[arg(long)]
    pub udp: bool,

    /// Duration of the simulation in seconds
    #[arg(long)]
    pub duration: Option<u64>,

    #[arg(long, alias = "NeighbourCellOffset")]
    pub neighbour_cell_offset: Option<u8>,

    #[arg(long, alias = "ServingCellThreshold")]
    pub serving_cell_threshold: Option<u8>,

    #[arg(long, alias = "UE_Count")]
    pub ue_count: Option<u32>,

    #[arg(long, alias = "ENB_Count")]
    pub enb_count: Option<u32>,

    #[arg(long, alias = "max_speed")]
    pub max_speed: Option<f64>,

    #[arg(long, alias = "min_speed")]
    pub min_speed: Option<f64>,

    #[arg(long, alias = "x_pos", allow_hyphen_values = true)]
    pub x_pos: Option<f64>,

    #[arg(long, alias = "y_pos", allow_hyphen_values = true)]
    pub y_pos: Option<f64>,

    #[arg(long)]
    pub rho: Option<f64>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Show a progress screen on stderr while the simulation runs
    #[arg(long)]
    pub tui: bool,
}

impl BaseConfig {
    pub fn apply_overrides(&mut self, args: &CliArgs) {
        let sim = &mut self.simulation_settings;
        sim.render_map |= args.map;
        sim.enable_traces |= args.traces;
        sim.tui |= args.tui;
        if args.udp {
            sim.transport = TransportMode::Udp;
        }
        if let Some(duration) = args.duration {
            sim.duration = duration;
        }
        if let Some(seed) = args.seed {
            sim.seed = seed;
        }

        let handover = &mut self.handover_settings;
        if let Some(offset) = args.neighbour_cell_offset {
            handover.neighbour_cell_offset = offset;
        }
        if let Some(threshold) = args.serving_cell_threshold {
            handover.serving_cell_threshold = threshold;
        }

        let scenario = &mut self.scenario_settings;
        if let Some(ue_count) = args.ue_count {
            scenario.ue_count = ue_count;
        }
        if let Some(enb_count) = args.enb_count {
            scenario.enb_count = enb_count;
        }
        if let Some(max_speed) = args.max_speed {
            scenario.max_speed = max_speed;
        }
        if let Some(min_speed) = args.min_speed {
            scenario.min_speed = min_speed;
        }
        if let Some(x_pos) = args.x_pos {
            scenario.x_pos = x_pos;
        }
        if let Some(y_pos) = args.y_pos {
            scenario.y_pos = y_pos;
        }
        if let Some(rho) = args.rho {
            scenario.rho = rho;
        }
    }
}

pub struct BaseConfigReader {
    file_path: PathBuf,
}

impl BaseConfigReader {
    pub fn new(file_name: &str) -> Self {
        let file_path = PathBuf::from(file_name);
        Self { file_path }
    }

    pub fn parse(&self) -> Result<BaseConfig, Box<dyn std::error::Error>> {
        let parsing_result = std::fs::read_to_string(&self.file_path)?;
        let config: BaseConfig = toml::from_str(&parsing_result)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_experiment_defaults() {
        let config: BaseConfig = toml::from_str("").unwrap();
        assert_eq!(config.simulation_settings.duration, 60);
        assert_eq!(config.simulation_settings.transport, TransportMode::Tcp);
        assert_eq!(config.scenario_settings.enb_count, 5);
        assert_eq!(config.scenario_settings.ue_count, 4);
        assert_eq!(config.handover_settings.serving_cell_threshold, 30);
        assert_eq!(config.handover_settings.neighbour_cell_offset, 1);
        assert!(config.log_settings.is_none());
    }

    #[test]
    fn partial_tables_keep_the_other_defaults() {
        let config: BaseConfig = toml::from_str(
            r#"
            [simulation_settings]
            duration = 5
            transport = "udp"

            [scenario_settings]
            ue_count = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.simulation_settings.duration(), TimeMS::from(5000u64));
        assert_eq!(config.simulation_settings.transport, TransportMode::Udp);
        assert_eq!(config.scenario_settings.ue_count, 2);
        assert_eq!(config.scenario_settings.rho, 200.0);
    }

    #[test]
    fn command_line_wins_over_file() {
        let args = CliArgs::parse_from([
            "hovis-lte",
            "--udp",
            "--duration",
            "10",
            "--NeighbourCellOffset",
            "3",
            "--ue-count",
            "7",
            "--x-pos",
            "-50",
        ]);
        let mut config = BaseConfig::default();
        config.apply_overrides(&args);
        assert_eq!(config.simulation_settings.transport, TransportMode::Udp);
        assert_eq!(config.simulation_settings.duration, 10);
        assert_eq!(config.handover_settings.neighbour_cell_offset, 3);
        assert_eq!(config.handover_settings.serving_cell_threshold, 30);
        assert_eq!(config.scenario_settings.ue_count, 7);
        assert_eq!(config.scenario_settings.x_pos, -50.0);
    }
}
