use std::fs;
use std::path::{Path, PathBuf};

use arrow::datatypes::Schema;
use serde::Deserialize;

use hovis_core::bucket::TimeMS;

use crate::tables::rsrp::RsrpSinrWriter;
use crate::tables::rx::DlRxWriter;

#[derive(Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
pub enum OutputType {
    DlRsrpSinrStats,
    DlRxStats,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OutputSettings {
    pub output_interval: TimeMS,
    pub output_path: String,
    pub outputs: Vec<Outputs>,
}

impl OutputSettings {
    /// Both LTE trace tables as parquet files, flushed every 250 ms.
    pub fn lte_traces(output_path: &str) -> Self {
        Self {
            output_interval: TimeMS::from(250u64),
            output_path: output_path.to_string(),
            outputs: vec![
                Outputs {
                    output_type: OutputType::DlRsrpSinrStats,
                    output_filename: "DlRsrpSinrStats.parquet".to_string(),
                },
                Outputs {
                    output_type: OutputType::DlRxStats,
                    output_filename: "DlRxStats.parquet".to_string(),
                },
            ],
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Outputs {
    pub output_type: OutputType,
    pub output_filename: String,
}

pub trait ResultWriter {
    fn schema() -> Schema;
    fn write_to_file(&mut self);
    fn close_file(self);
}

fn output_file(
    settings: &OutputSettings,
    output_path: &Path,
    output_type: OutputType,
) -> Option<PathBuf> {
    settings
        .outputs
        .iter()
        .filter(|output| output.output_type == output_type)
        .last()
        .map(|output| output_path.join(&output.output_filename))
}

#[derive(Debug)]
pub struct Results {
    pub rsrp_sinr: Option<RsrpSinrWriter>,
    pub dl_rx: Option<DlRxWriter>,
}

impl Results {
    pub fn new(output_settings: &OutputSettings) -> Self {
        let output_path = Path::new(&output_settings.output_path);
        if !output_path.exists() {
            if let Err(e) = fs::create_dir_all(output_path) {
                panic!("Failed to create output directory: {}", e);
            }
        }

        let rsrp_sinr = output_file(output_settings, output_path, OutputType::DlRsrpSinrStats)
            .map(RsrpSinrWriter::new);
        let dl_rx =
            output_file(output_settings, output_path, OutputType::DlRxStats).map(DlRxWriter::new);
        Self { rsrp_sinr, dl_rx }
    }

    pub fn write_to_file(&mut self) {
        if let Some(writer) = &mut self.rsrp_sinr {
            writer.write_to_file();
        }
        if let Some(writer) = &mut self.dl_rx {
            writer.write_to_file();
        }
    }

    pub fn close_files(mut self) {
        self.write_to_file();
        if let Some(writer) = self.rsrp_sinr {
            writer.close_file();
        }
        if let Some(writer) = self.dl_rx {
            writer.close_file();
        }
    }
}
