use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::device::mobility::Point2D;

pub type CellId = u16;
pub type Imsi = u64;
pub type Rnti = u16;

const SPEED_OF_LIGHT: f64 = 299_792_458.0;
const THERMAL_NOISE_DBM_HZ: f64 = -174.0;
const SUBCARRIER_SPACING_HZ: f64 = 15_000.0;
const SUBCARRIERS_PER_RB: f64 = 12.0;

pub const RB_BANDWIDTH_HZ: f64 = 180_000.0;

/// Downlink radio parameters shared by every cell.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, TypedBuilder)]
pub struct RadioSettings {
    #[builder(default = 30.0)]
    pub tx_power_dbm: f64,
    #[builder(default = 25)]
    pub resource_blocks: u32,
    #[builder(default = 2120.0)]
    pub dl_frequency_mhz: f64,
    #[builder(default = 9.0)]
    pub noise_figure_db: f64,
    #[builder(default = 70.0)]
    pub beamwidth_deg: f64,
    #[builder(default = 20.0)]
    pub max_attenuation_db: f64,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RadioSettings {
    pub fn wavelength(&self) -> f64 {
        SPEED_OF_LIGHT / (self.dl_frequency_mhz * 1e6)
    }

    pub fn tx_power_per_re_dbm(&self) -> f64 {
        self.tx_power_dbm - 10.0 * (SUBCARRIERS_PER_RB * self.resource_blocks as f64).log10()
    }

    pub fn noise_per_re_dbm(&self) -> f64 {
        THERMAL_NOISE_DBM_HZ + 10.0 * SUBCARRIER_SPACING_HZ.log10() + self.noise_figure_db
    }

    pub fn bandwidth_hz(&self) -> f64 {
        RB_BANDWIDTH_HZ * self.resource_blocks as f64
    }
}

pub fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

pub fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}

/// Free-space loss in dB, never negative.
pub fn friis_loss_db(settings: &RadioSettings, distance: f64) -> f64 {
    if distance <= 0.0 {
        return 0.0;
    }
    let ratio = 4.0 * std::f64::consts::PI * distance / settings.wavelength();
    (20.0 * ratio.log10()).max(0.0)
}

/// Parabolic sector antenna gain in dB for a receiver at `azimuth` degrees.
pub fn parabolic_gain_db(settings: &RadioSettings, orientation: f64, azimuth: f64) -> f64 {
    let mut phi = azimuth - orientation;
    while phi > 180.0 {
        phi -= 360.0;
    }
    while phi < -180.0 {
        phi += 360.0;
    }
    -(12.0 * (phi / settings.beamwidth_deg).powi(2)).min(settings.max_attenuation_db)
}

/// Reported RSRP index, 3GPP TS 36.133 table 9.1.4-1.
pub fn rsrp_range(rsrp_dbm: f64) -> u8 {
    (rsrp_dbm + 141.0).floor().clamp(0.0, 97.0) as u8
}

/// Reported RSRQ index, 3GPP TS 36.133 table 9.1.7-1.
pub fn rsrq_range(rsrq_db: f64) -> u8 {
    (2.0 * rsrq_db + 40.0).floor().clamp(0.0, 34.0) as u8
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellSite {
    pub cell_id: CellId,
    pub position: Point2D,
    pub orientation: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    pub cell_id: CellId,
    pub rsrp_dbm: f64,
    pub rsrq_db: f64,
    pub sinr_db: f64,
}

impl Measurement {
    pub fn rsrp_range(&self) -> u8 {
        rsrp_range(self.rsrp_dbm)
    }

    pub fn rsrq_range(&self) -> u8 {
        rsrq_range(self.rsrq_db)
    }
}

/// Every cell is fully loaded, so each one interferes on every resource element.
#[derive(Clone, Debug, Default)]
pub struct RadioEnvironment {
    settings: RadioSettings,
    cells: Vec<CellSite>,
}

impl RadioEnvironment {
    pub fn new(settings: RadioSettings) -> Self {
        Self {
            settings,
            cells: Vec::new(),
        }
    }

    pub fn settings(&self) -> &RadioSettings {
        &self.settings
    }

    pub fn add_cell(&mut self, cell: CellSite) {
        self.cells.push(cell);
        self.cells.sort_by_key(|site| site.cell_id);
    }

    pub fn cells(&self) -> &[CellSite] {
        &self.cells
    }

    pub fn cell(&self, cell_id: CellId) -> Option<&CellSite> {
        self.cells.iter().find(|site| site.cell_id == cell_id)
    }

    pub fn rsrp_dbm(&self, cell: &CellSite, at: &Point2D) -> f64 {
        let distance = cell.position.distance_to(at);
        let gain = if distance > 0.0 {
            parabolic_gain_db(
                &self.settings,
                cell.orientation,
                cell.position.azimuth_to(at),
            )
        } else {
            0.0
        };
        self.settings.tx_power_per_re_dbm() + gain - friis_loss_db(&self.settings, distance)
    }

    /// Measurements of every cell at `at`, in ascending cell id order.
    pub fn measure(&self, at: &Point2D) -> Vec<Measurement> {
        let received: Vec<f64> = self
            .cells
            .iter()
            .map(|cell| dbm_to_mw(self.rsrp_dbm(cell, at)))
            .collect();
        let noise = dbm_to_mw(self.settings.noise_per_re_dbm());
        let total: f64 = received.iter().sum();

        self.cells
            .iter()
            .zip(received.iter())
            .map(|(cell, &own)| Measurement {
                cell_id: cell.cell_id,
                rsrp_dbm: mw_to_dbm(own),
                rsrq_db: mw_to_dbm(own / (total + noise)),
                sinr_db: mw_to_dbm(own / (total - own + noise)),
            })
            .collect()
    }

    pub fn sinr_db(&self, serving: CellId, at: &Point2D) -> Option<f64> {
        self.measure(at)
            .into_iter()
            .find(|m| m.cell_id == serving)
            .map(|m| m.sinr_db)
    }

    pub fn strongest_cell(&self, at: &Point2D) -> Option<CellId> {
        self.cells
            .iter()
            .map(|cell| (cell.cell_id, self.rsrp_dbm(cell, at)))
            .fold(None, |best: Option<(CellId, f64)>, (cell_id, rsrp)| match best {
                Some((_, best_rsrp)) if best_rsrp >= rsrp => best,
                _ => Some((cell_id, rsrp)),
            })
            .map(|(cell_id, _)| cell_id)
    }

    /// SINR of the best server at `at`, as drawn in the radio environment map.
    pub fn best_sinr_db(&self, at: &Point2D) -> f64 {
        self.measure(at)
            .iter()
            .map(|m| m.sinr_db)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cells() -> RadioEnvironment {
        let mut env = RadioEnvironment::new(RadioSettings::default());
        env.add_cell(CellSite {
            cell_id: 2,
            position: Point2D::new(500.0, 0.0),
            orientation: 180.0,
        });
        env.add_cell(CellSite {
            cell_id: 1,
            position: Point2D::new(0.0, 0.0),
            orientation: 0.0,
        });
        env
    }

    #[test]
    fn report_ranges_are_clamped() {
        assert_eq!(rsrp_range(-200.0), 0);
        assert_eq!(rsrp_range(-90.5), 50);
        assert_eq!(rsrp_range(-20.0), 97);
        assert_eq!(rsrq_range(-30.0), 0);
        assert_eq!(rsrq_range(-5.0), 30);
        assert_eq!(rsrq_range(0.0), 34);
    }

    #[test]
    fn antenna_attenuation_is_bounded() {
        let settings = RadioSettings::default();
        assert_eq!(parabolic_gain_db(&settings, 120.0, 120.0), 0.0);
        assert_eq!(parabolic_gain_db(&settings, 0.0, 180.0), -20.0);
        let half_power = parabolic_gain_db(&settings, 0.0, 35.0);
        assert!((half_power + 3.0).abs() < 1e-9);
        assert_eq!(
            parabolic_gain_db(&settings, 350.0, 10.0),
            parabolic_gain_db(&settings, 0.0, 20.0)
        );
    }

    #[test]
    fn path_loss_grows_with_distance() {
        let settings = RadioSettings::default();
        let near = friis_loss_db(&settings, 100.0);
        let far = friis_loss_db(&settings, 200.0);
        assert!((far - near - 20.0 * 2f64.log10()).abs() < 1e-9);
    }

    #[test]
    fn equidistant_cells_split_rsrq() {
        let env = two_cells();
        let measurements = env.measure(&Point2D::new(250.0, 0.0));
        assert_eq!(measurements[0].cell_id, 1);
        assert_eq!(measurements[1].cell_id, 2);
        assert!((measurements[0].rsrp_dbm - measurements[1].rsrp_dbm).abs() < 1e-9);
        assert!((measurements[0].rsrq_db + 3.0103).abs() < 0.01);
        assert!(measurements[0].sinr_db.abs() < 0.01);
    }

    #[test]
    fn strongest_cell_is_the_nearer_one() {
        let env = two_cells();
        assert_eq!(env.strongest_cell(&Point2D::new(100.0, 0.0)), Some(1));
        assert_eq!(env.strongest_cell(&Point2D::new(400.0, 0.0)), Some(2));
    }

    #[test]
    fn noise_per_resource_element() {
        let settings = RadioSettings::default();
        assert!((settings.noise_per_re_dbm() + 123.239).abs() < 0.01);
        assert!((settings.tx_power_per_re_dbm() - 5.2288).abs() < 0.01);
    }
}
