use std::f64::consts::PI;

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::device::mobility::Point2D;
use crate::dist::UnitSampler;

/// Draws positions uniformly over a disc.
#[derive(Clone, Debug)]
pub struct UniformDisc {
    center: Point2D,
    rho: f64,
    sampler: UnitSampler,
}

impl UniformDisc {
    pub fn new(center: Point2D, rho: f64, seed: u64) -> Self {
        Self {
            center,
            rho,
            sampler: UnitSampler::new(seed),
        }
    }

    pub fn next_position(&mut self) -> Point2D {
        let radius = self.rho * self.sampler.next_unit().sqrt();
        let theta = 2.0 * PI * self.sampler.next_unit();
        Point2D::new(
            self.center.x + radius * theta.cos(),
            self.center.y + radius * theta.sin(),
        )
    }
}

/// A placed sector: antenna position and boresight in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectorSite {
    pub position: Point2D,
    pub orientation: f64,
}

/// Three-sector sites on a hexagonal grid. Every three consecutive eNBs share one site and point
/// 120 degrees apart; odd rows are shifted by half the inter-site distance.
#[derive(Deserialize, Clone, Copy, Debug, TypedBuilder)]
pub struct HexGridLayout {
    #[builder(default = 500.0)]
    pub inter_site_distance: f64,
    #[builder(default = 0.5)]
    pub sector_offset: f64,
    #[builder(default = 1)]
    pub grid_width: u32,
    #[builder(default = 0.0)]
    pub x_min: f64,
    #[builder(default = 0.0)]
    pub y_min: f64,
}

impl Default for HexGridLayout {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HexGridLayout {
    pub const SECTORS_PER_SITE: u32 = 3;

    pub fn sector(&self, index: u32) -> SectorSite {
        let row_spacing = self.inter_site_distance * 0.75f64.sqrt();
        let site = index / Self::SECTORS_PER_SITE;
        let sites_per_bi_row = 2 * self.grid_width + 1;
        let mut row = (site / sites_per_bi_row) * 2;
        let mut column = site % sites_per_bi_row;
        if column >= self.grid_width {
            row += 1;
            column -= self.grid_width;
        }

        let mut x = self.x_min + self.inter_site_distance * column as f64;
        let y = self.y_min + row_spacing * row as f64;
        if row % 2 == 1 {
            x -= self.inter_site_distance / 2.0;
        }

        let orientation = ((index % Self::SECTORS_PER_SITE) * 120) as f64;
        let boresight = orientation.to_radians();
        SectorSite {
            position: Point2D::new(
                x + self.sector_offset * boresight.cos(),
                y + self.sector_offset * boresight.sin(),
            ),
            orientation,
        }
    }

    pub fn sectors(&self, count: u32) -> Vec<SectorSite> {
        (0..count).map(|index| self.sector(index)).collect()
    }
}
