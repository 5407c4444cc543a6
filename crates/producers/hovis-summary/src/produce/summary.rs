use std::error::Error;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

use clap::Parser;
use log::info;

use hovis_core::bucket::TimeMS;
use hovis_output::tracker::{write_rows, DataTracker};

pub const CELL_SUMMARY_FILE: &str = "cell_summary.csv";
pub const UE_CELLS_FILE: &str = "ue_cells.csv";

#[derive(Parser, Debug, Clone)]
#[command(author, version, long_about = None)]
pub struct CliArgs {
    /// Captured telemetry stream of one run
    #[arg(short = 'i', long, value_name = "LOG_FILE")]
    pub input: String,

    #[arg(short = 'o', long, value_name = "OUTPUT_DIR", default_value = ".")]
    pub output: String,

    /// Duration of the captured run in seconds
    #[arg(long, default_value_t = 60)]
    pub duration: u64,

    #[arg(long, alias = "ENB_Count", default_value_t = 5)]
    pub enb_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryCounts {
    pub cells: usize,
    pub intervals: usize,
}

pub struct Summariser {
    input: PathBuf,
    output: PathBuf,
    duration: TimeMS,
    enb_count: u16,
}

impl Summariser {
    pub fn new(args: &CliArgs) -> Self {
        Self {
            input: PathBuf::from(&args.input),
            output: PathBuf::from(&args.output),
            duration: TimeMS::from_secs(args.duration),
            enb_count: args.enb_count,
        }
    }

    /// Rebuilds the tracker from the input log and writes the per-cell summary and the serving
    /// periods of every UE.
    pub fn summarise(&self) -> Result<SummaryCounts, Box<dyn Error>> {
        let reader = BufReader::new(File::open(&self.input)?);
        let tracker = DataTracker::from_reader(reader)?;
        info!(
            "Read {} cells and {} UEs from {}",
            tracker.cells().len(),
            tracker.ues().len(),
            self.input.display()
        );

        if !self.output.exists() {
            fs::create_dir_all(&self.output)?;
        }
        let summaries = tracker.cell_summaries(self.duration, self.enb_count);
        let intervals = tracker.association_intervals(self.duration);
        write_rows(&self.output.join(CELL_SUMMARY_FILE), &summaries)?;
        write_rows(&self.output.join(UE_CELLS_FILE), &intervals)?;
        Ok(SummaryCounts {
            cells: summaries.len(),
            intervals: intervals.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
0 ms: Cell state: Cell 1 at 0.5 0 direction 0
0 ms: Cell state: Cell 2 at -0.25 0.433013 direction 120
0 ms: Cell state: Cell 3 at -0.25 -0.433013 direction 240
20 ms: UE seen at cell: Cell 1 saw IMSI 1 (context: /NodeList/3/DeviceList/0/LteEnbRrc/ConnectionEstablished)
20 ms: UE seen at cell: Cell 1 saw IMSI 2 (context: /NodeList/3/DeviceList/0/LteEnbRrc/ConnectionEstablished)
100 ms: UE state: IMSI 1 at 3.5 4 with 0 received bytes
100 ms: UE state: IMSI 2 at -3.5 4 with 0 received bytes
1260 ms: UE seen at cell: Cell 2 saw IMSI 1 (context: /NodeList/4/DeviceList/0/LteEnbRrc/HandoverEndOk)
1300 ms: UE state: IMSI 1 at 100.5 4 with 540 received bytes
";

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hovis-summary-{}-{}", name, std::process::id()))
    }

    #[test]
    fn writes_both_tables() {
        let dir = scratch("tables");
        fs::create_dir_all(&dir).unwrap();
        let input = dir.join("run.log");
        fs::write(&input, LOG).unwrap();

        let args = CliArgs::parse_from([
            "hovis-summary",
            "-i",
            input.to_str().unwrap(),
            "-o",
            dir.join("out").to_str().unwrap(),
            "--duration",
            "2",
            "--enb-count",
            "3",
        ]);
        let counts = Summariser::new(&args).summarise().unwrap();
        assert_eq!(counts, SummaryCounts { cells: 3, intervals: 3 });

        let cells = fs::read_to_string(dir.join("out").join(CELL_SUMMARY_FILE)).unwrap();
        assert_eq!(cells.lines().count(), 4);
        assert!(cells.lines().next().unwrap().starts_with("cell_id,handovers"));
        let periods = fs::read_to_string(dir.join("out").join(UE_CELLS_FILE)).unwrap();
        let rows: Vec<&str> = periods.lines().collect();
        assert_eq!(rows[0], "imsi,cell_id,start_ms,end_ms");
        assert_eq!(rows[1], "1,1,0,1300");
        assert_eq!(rows[2], "1,2,1300,1999");
        assert_eq!(rows[3], "2,1,0,1999");
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_input_is_an_error() {
        let args = CliArgs::parse_from(["hovis-summary", "-i", "/nonexistent/run.log"]);
        assert!(Summariser::new(&args).summarise().is_err());
    }
}
