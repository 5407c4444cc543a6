use std::collections::BTreeMap;

use log::debug;
use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::net::radio::{CellId, Imsi, Measurement};

/// Report configured for event A2, serving cell worse than threshold.
pub const A2_MEAS_ID: u8 = 1;
/// Report configured for event A4, neighbour better than threshold.
pub const A4_MEAS_ID: u8 = 2;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, TypedBuilder)]
pub struct HandoverSettings {
    #[builder(default = 30)]
    pub serving_cell_threshold: u8,
    #[builder(default = 1)]
    pub neighbour_cell_offset: u8,
}

impl Default for HandoverSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeasResult {
    pub cell_id: CellId,
    pub rsrp_range: u8,
    pub rsrq_range: u8,
}

impl From<&Measurement> for MeasResult {
    fn from(measurement: &Measurement) -> Self {
        Self {
            cell_id: measurement.cell_id,
            rsrp_range: measurement.rsrp_range(),
            rsrq_range: measurement.rsrq_range(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeasurementReport {
    pub meas_id: u8,
    pub serving: MeasResult,
    pub neighbours: Vec<MeasResult>,
}

impl MeasurementReport {
    /// Builds the reports a UE sends for one measurement period: the A4 report with every
    /// detectable neighbour first, then the A2 report when the serving cell is below threshold.
    pub fn for_period(
        settings: &HandoverSettings,
        serving: CellId,
        measurements: &[Measurement],
    ) -> Vec<MeasurementReport> {
        let Some(serving) = measurements
            .iter()
            .find(|m| m.cell_id == serving)
            .map(MeasResult::from)
        else {
            return Vec::new();
        };
        let mut neighbours: Vec<MeasResult> = measurements
            .iter()
            .filter(|m| m.cell_id != serving.cell_id)
            .map(MeasResult::from)
            .filter(|m| m.rsrq_range > 0)
            .collect();
        neighbours.sort_by_key(|m| m.cell_id);

        let mut reports = vec![MeasurementReport {
            meas_id: A4_MEAS_ID,
            serving,
            neighbours,
        }];
        if serving.rsrq_range < settings.serving_cell_threshold {
            reports.push(MeasurementReport {
                meas_id: A2_MEAS_ID,
                serving,
                neighbours: Vec::new(),
            });
        }
        reports
    }
}

/// RSRQ based A2-A4 handover decision. Neighbour RSRQ from A4 reports is remembered per
/// serving cell and UE; an A2 report triggers the evaluation against the best remembered
/// neighbour.
#[derive(Clone, Debug, Default)]
pub struct A2A4RsrqHandover {
    settings: HandoverSettings,
    neighbours: BTreeMap<(CellId, Imsi), BTreeMap<CellId, u8>>,
}

impl A2A4RsrqHandover {
    pub fn new(settings: HandoverSettings) -> Self {
        Self {
            settings,
            neighbours: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &HandoverSettings {
        &self.settings
    }

    /// Feeds a report received by `serving` and returns the target cell when a handover
    /// should start.
    pub fn on_report(
        &mut self,
        serving: CellId,
        imsi: Imsi,
        report: &MeasurementReport,
    ) -> Option<CellId> {
        match report.meas_id {
            A4_MEAS_ID => {
                let table = self.neighbours.entry((serving, imsi)).or_default();
                for neighbour in report.neighbours.iter() {
                    table.insert(neighbour.cell_id, neighbour.rsrq_range);
                }
                None
            }
            A2_MEAS_ID if report.serving.rsrq_range < self.settings.serving_cell_threshold => {
                self.evaluate(serving, imsi, report.serving.rsrq_range)
            }
            _ => None,
        }
    }

    /// Drops what the serving cell knew about a UE that is leaving it.
    pub fn forget(&mut self, serving: CellId, imsi: Imsi) {
        self.neighbours.remove(&(serving, imsi));
    }

    fn evaluate(&self, serving: CellId, imsi: Imsi, serving_rsrq: u8) -> Option<CellId> {
        let table = self.neighbours.get(&(serving, imsi))?;
        let (best_cell, best_rsrq) = table
            .iter()
            .filter(|(cell_id, _)| **cell_id != serving)
            .fold(None, |best: Option<(CellId, u8)>, (&cell_id, &rsrq)| match best {
                Some((_, best_rsrq)) if best_rsrq >= rsrq => best,
                _ => Some((cell_id, rsrq)),
            })?;
        let gain = best_rsrq as i32 - serving_rsrq as i32;
        debug!(
            "IMSI {} at cell {}: best neighbour {} is {} RSRQ steps better",
            imsi, serving, best_cell, gain
        );
        if gain >= self.settings.neighbour_cell_offset as i32 {
            Some(best_cell)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(cell_id: CellId, rsrq_range: u8) -> MeasResult {
        MeasResult {
            cell_id,
            rsrp_range: 50,
            rsrq_range,
        }
    }

    fn a4(serving: MeasResult, neighbours: Vec<MeasResult>) -> MeasurementReport {
        MeasurementReport {
            meas_id: A4_MEAS_ID,
            serving,
            neighbours,
        }
    }

    fn a2(serving: MeasResult) -> MeasurementReport {
        MeasurementReport {
            meas_id: A2_MEAS_ID,
            serving,
            neighbours: Vec::new(),
        }
    }

    #[test]
    fn handover_to_best_neighbour() {
        let mut algorithm = A2A4RsrqHandover::new(HandoverSettings::default());
        let serving = result(1, 20);
        let report = a4(serving, vec![result(2, 22), result(3, 25)]);
        assert_eq!(algorithm.on_report(1, 7, &report), None);
        assert_eq!(algorithm.on_report(1, 7, &a2(serving)), Some(3));
    }

    #[test]
    fn offset_blocks_marginal_neighbours() {
        let settings = HandoverSettings::builder().neighbour_cell_offset(3).build();
        let mut algorithm = A2A4RsrqHandover::new(settings);
        let serving = result(1, 20);
        algorithm.on_report(1, 7, &a4(serving, vec![result(2, 22)]));
        assert_eq!(algorithm.on_report(1, 7, &a2(serving)), None);
    }

    #[test]
    fn no_neighbours_no_handover() {
        let mut algorithm = A2A4RsrqHandover::new(HandoverSettings::default());
        assert_eq!(algorithm.on_report(1, 7, &a2(result(1, 10))), None);
    }

    #[test]
    fn forgotten_ue_starts_over() {
        let mut algorithm = A2A4RsrqHandover::new(HandoverSettings::default());
        let serving = result(1, 20);
        algorithm.on_report(1, 7, &a4(serving, vec![result(2, 30)]));
        algorithm.forget(1, 7);
        assert_eq!(algorithm.on_report(1, 7, &a2(serving)), None);
    }

    #[test]
    fn period_reports_follow_the_threshold() {
        let settings = HandoverSettings::default();
        let measurements = vec![
            Measurement {
                cell_id: 2,
                rsrp_dbm: -90.0,
                rsrq_db: -4.0,
                sinr_db: 1.0,
            },
            Measurement {
                cell_id: 1,
                rsrp_dbm: -95.0,
                rsrq_db: -6.0,
                sinr_db: -1.0,
            },
            Measurement {
                cell_id: 3,
                rsrp_dbm: -140.0,
                rsrq_db: -40.0,
                sinr_db: -30.0,
            },
        ];
        let reports = MeasurementReport::for_period(&settings, 1, &measurements);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].meas_id, A4_MEAS_ID);
        assert_eq!(reports[0].neighbours, vec![result_with(2, 51, 32)]);
        assert_eq!(reports[1].meas_id, A2_MEAS_ID);
        assert!(reports[1].neighbours.is_empty());

        let strong = MeasurementReport::for_period(&settings, 2, &measurements);
        assert_eq!(strong.len(), 1);
    }

    fn result_with(cell_id: CellId, rsrp_range: u8, rsrq_range: u8) -> MeasResult {
        MeasResult {
            cell_id,
            rsrp_range,
            rsrq_range,
        }
    }
}
