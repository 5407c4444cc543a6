use std::collections::BTreeMap;
use std::error::Error;
use std::io::BufRead;
use std::path::Path;

use csv::WriterBuilder;
use log::{debug, warn};
use serde::Serialize;

use hovis_core::bucket::TimeMS;

use crate::trace::TraceRecord;

type Series<T> = Vec<(TimeMS, T)>;

#[derive(Debug, Clone, Default)]
pub struct CellTrack {
    pub coords: Series<(f64, f64)>,
    pub direction: Series<u32>,
}

impl CellTrack {
    pub fn position(&self) -> Option<(f64, f64)> {
        self.coords.first().map(|(_, coords)| *coords)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UeTrack {
    pub coords: Series<(f64, f64)>,
    pub bytes_rx: Series<u64>,
    pub cell_associated: Series<u16>,
    pub rsrp: BTreeMap<u16, Series<u8>>,
    pub rsrq: BTreeMap<u16, Series<u8>>,
}

/// Time series rebuilt from the telemetry stream, keyed by cell id or IMSI.
#[derive(Debug, Clone, Default)]
pub struct DataTracker {
    cells: BTreeMap<u16, CellTrack>,
    ues: BTreeMap<u64, UeTrack>,
}

impl DataTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a captured stream. Lines that are not telemetry records are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, Box<dyn Error>> {
        let mut tracker = Self::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<TraceRecord>() {
                Ok(record) => tracker.add_record(&record),
                Err(e) => warn!("Skipping line: {}", e),
            }
        }
        Ok(tracker)
    }

    pub fn add_record(&mut self, record: &TraceRecord) {
        match record {
            TraceRecord::CellState {
                time,
                cell_id,
                x,
                y,
                direction,
            } => {
                let cell = self.cells.entry(*cell_id).or_default();
                cell.coords.push((*time, (*x, *y)));
                cell.direction.push((*time, *direction));
            }
            TraceRecord::UeState {
                time,
                imsi,
                x,
                y,
                rx_bytes,
            } => {
                let ue = self.ues.entry(*imsi).or_default();
                ue.coords.push((*time, (*x, *y)));
                ue.bytes_rx.push((*time, *rx_bytes));
            }
            TraceRecord::UeSeenAtCell {
                time,
                cell_id,
                imsi,
                ..
            } => {
                let ue = self.ues.entry(*imsi).or_default();
                ue.cell_associated.push((*time, *cell_id));
            }
            TraceRecord::MeasurementReport {
                time,
                imsi,
                serving,
                neighbours,
                ..
            } => {
                let ue = self.ues.entry(*imsi).or_default();
                for measurement in std::iter::once(serving).chain(neighbours.iter()) {
                    ue.rsrp
                        .entry(measurement.cell_id)
                        .or_default()
                        .push((*time, measurement.rsrp));
                    ue.rsrq
                        .entry(measurement.cell_id)
                        .or_default()
                        .push((*time, measurement.rsrq));
                }
            }
        }
    }

    pub fn cells(&self) -> &BTreeMap<u16, CellTrack> {
        &self.cells
    }

    pub fn ues(&self) -> &BTreeMap<u64, UeTrack> {
        &self.ues
    }

    pub fn latest_cell(&self, imsi: u64) -> Option<u16> {
        self.ues
            .get(&imsi)
            .and_then(|ue| ue.cell_associated.last())
            .map(|(_, cell)| *cell)
    }

    /// Serving periods of every UE. Period starts are rounded to the 100 ms telemetry grid and
    /// capped at `duration - 1`; a period ends where the next one starts, the last one at
    /// `duration - 1`.
    pub fn association_intervals(&self, duration: TimeMS) -> Vec<AssociationInterval> {
        let end_of_run = duration.as_u64().saturating_sub(1);
        let mut intervals = Vec::new();
        for (imsi, ue) in self.ues.iter() {
            let starts: Vec<(u64, u16)> = ue
                .cell_associated
                .iter()
                .map(|(time, cell)| (round_to_hundred(time.as_u64()).min(end_of_run), *cell))
                .collect();
            for (index, (start, cell_id)) in starts.iter().enumerate() {
                let end = starts
                    .get(index + 1)
                    .map(|(next_start, _)| *next_start)
                    .unwrap_or(end_of_run)
                    .max(*start);
                intervals.push(AssociationInterval {
                    imsi: *imsi,
                    cell_id: *cell_id,
                    start_ms: *start,
                    end_ms: end,
                });
            }
        }
        intervals
    }

    /// Per-cell statistics over the serving periods. Cells `1..=cell_count` without any
    /// period are reported with zeros.
    pub fn cell_summaries(&self, duration: TimeMS, cell_count: u16) -> Vec<CellSummary> {
        let intervals = self.association_intervals(duration);
        let mut summaries: BTreeMap<u16, CellAccumulator> = (1..=cell_count)
            .map(|cell_id| (cell_id, CellAccumulator::default()))
            .collect();

        for interval in intervals.iter() {
            let Some(ue) = self.ues.get(&interval.imsi) else {
                continue;
            };
            let acc = summaries.entry(interval.cell_id).or_default();
            acc.handovers += 1;
            acc.ues.push(interval.imsi);
            acc.duration += interval.end_ms.saturating_sub(interval.start_ms);

            let in_interval = |time: &TimeMS| interval.contains(time.as_u64());
            if let Some(series) = ue.rsrq.get(&interval.cell_id) {
                acc.rsrq.extend(series.iter().filter(|(t, _)| in_interval(t)).map(|(_, v)| *v as f64));
            }
            if let Some(series) = ue.rsrp.get(&interval.cell_id) {
                acc.rsrp.extend(series.iter().filter(|(t, _)| in_interval(t)).map(|(_, v)| *v as f64));
            }
            acc.throughput.extend(
                ue.bytes_rx
                    .iter()
                    .filter(|(t, _)| in_interval(t))
                    .map(|(_, v)| *v as f64),
            );
            if let Some((cx, cy)) = self
                .cells
                .get(&interval.cell_id)
                .and_then(|cell| cell.position())
            {
                acc.distance.extend(
                    ue.coords
                        .iter()
                        .filter(|(t, _)| in_interval(t))
                        .map(|(_, (x, y))| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt()),
                );
            }
        }

        debug!("Summarised {} serving periods", intervals.len());
        summaries
            .into_iter()
            .map(|(cell_id, acc)| acc.into_summary(cell_id))
            .collect()
    }
}

/// Python-style rounding of a millisecond timestamp to the nearest 100, ties to even.
pub fn round_to_hundred(time: u64) -> u64 {
    let base = time / 100 * 100;
    let rest = time % 100;
    match rest {
        r if r < 50 => base,
        r if r > 50 => base + 100,
        _ if (base / 100) % 2 == 0 => base,
        _ => base + 100,
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationInterval {
    pub imsi: u64,
    pub cell_id: u16,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl AssociationInterval {
    pub fn contains(&self, time: u64) -> bool {
        time >= self.start_ms && time <= self.end_ms
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CellSummary {
    pub cell_id: u16,
    pub handovers: u32,
    pub connected_ues: u32,
    pub total_duration_ms: u64,
    pub mean_distance: f64,
    pub mean_throughput: f64,
    pub mean_rsrq: f64,
    pub mean_rsrp: f64,
}

#[derive(Default)]
struct CellAccumulator {
    handovers: u32,
    ues: Vec<u64>,
    duration: u64,
    distance: Vec<f64>,
    throughput: Vec<f64>,
    rsrq: Vec<f64>,
    rsrp: Vec<f64>,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

impl CellAccumulator {
    fn into_summary(mut self, cell_id: u16) -> CellSummary {
        self.ues.sort_unstable();
        self.ues.dedup();
        CellSummary {
            cell_id,
            handovers: self.handovers,
            connected_ues: self.ues.len() as u32,
            total_duration_ms: self.duration,
            mean_distance: mean(&self.distance),
            mean_throughput: mean(&self.throughput),
            mean_rsrq: mean(&self.rsrq),
            mean_rsrp: mean(&self.rsrp),
        }
    }
}

pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Box<dyn Error>> {
    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
