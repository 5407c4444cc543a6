use serde::Deserialize;
use typed_builder::TypedBuilder;

use hovis_core::metrics::{Consumable, Feasibility, Metric, MetricSettings};

use crate::net::radio::RB_BANDWIDTH_HZ;

#[derive(Deserialize, Default, Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct ResourceBlocks(pub f64);

impl Metric for ResourceBlocks {}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, TypedBuilder)]
pub struct CapacitySettings {
    #[builder(default = 25)]
    pub resource_blocks: u32,
    #[builder(default = 4.4)]
    pub max_spectral_efficiency: f64,
    #[builder(default = 1)]
    pub tti_ms: u64,
}

impl Default for CapacitySettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MetricSettings for CapacitySettings {}

/// What a backlogged UE asks of its cell for one TTI.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Demand {
    pub backlog: u64,
    pub sinr_db: f64,
}

/// Downlink resource blocks of one cell, handed out again every TTI.
#[derive(Clone, Copy, Debug)]
pub struct CellCapacity {
    settings: CapacitySettings,
    available: ResourceBlocks,
}

impl Consumable<ResourceBlocks> for CellCapacity {
    type S = CapacitySettings;

    fn with_settings(settings: &CapacitySettings) -> Self {
        Self {
            settings: *settings,
            available: ResourceBlocks(settings.resource_blocks as f64),
        }
    }

    fn reset(&mut self) {
        self.available = ResourceBlocks(self.settings.resource_blocks as f64);
    }

    fn consume(&mut self, amount: ResourceBlocks) -> Feasibility<ResourceBlocks> {
        if amount.0 <= self.available.0 {
            self.available.0 -= amount.0;
            Feasibility::Feasible(amount)
        } else {
            Feasibility::Infeasible(self.available)
        }
    }

    fn available(&self) -> ResourceBlocks {
        self.available
    }
}

impl CellCapacity {
    /// Bytes a single resource block carries during one TTI at the given SINR.
    pub fn bytes_per_rb(&self, sinr_db: f64) -> f64 {
        let sinr = 10f64.powf(sinr_db / 10.0);
        let efficiency = (1.0 + sinr)
            .log2()
            .min(self.settings.max_spectral_efficiency);
        RB_BANDWIDTH_HZ * efficiency * self.settings.tti_ms as f64 / 1000.0 / 8.0
    }

    /// Splits the TTI's resource blocks round-robin over the backlogged demands. A UE that needs
    /// less than its share returns the rest to the others. Grants are whole bytes, in the order
    /// of `demands`.
    pub fn share(&mut self, demands: &[Demand]) -> Vec<u64> {
        self.reset();
        let mut grants = vec![0u64; demands.len()];
        let mut waiting: Vec<usize> = demands
            .iter()
            .enumerate()
            .filter(|(_, demand)| demand.backlog > 0 && self.bytes_per_rb(demand.sinr_db) > 0.0)
            .map(|(index, _)| index)
            .collect();

        while !waiting.is_empty() && self.available.0 > 0.0 {
            let fair_share = self.available.0 / waiting.len() as f64;
            let mut satisfied = Vec::new();
            for &index in waiting.iter() {
                let per_rb = self.bytes_per_rb(demands[index].sinr_db);
                let needed = demands[index].backlog as f64 / per_rb;
                if needed <= fair_share {
                    let granted = self.allot(ResourceBlocks(needed));
                    grants[index] = demands[index]
                        .backlog
                        .min((granted.0 * per_rb).ceil() as u64);
                    satisfied.push(index);
                }
            }
            if satisfied.is_empty() {
                for &index in waiting.iter() {
                    let per_rb = self.bytes_per_rb(demands[index].sinr_db);
                    let granted = self.allot(ResourceBlocks(fair_share));
                    grants[index] = (granted.0 * per_rb).floor() as u64;
                }
                break;
            }
            waiting.retain(|index| !satisfied.contains(index));
        }
        grants
    }

    /// Takes `amount` or whatever is left when rounding has eaten into the budget.
    fn allot(&mut self, amount: ResourceBlocks) -> ResourceBlocks {
        match self.consume(amount) {
            Feasibility::Feasible(granted) => granted,
            Feasibility::Infeasible(left) => {
                self.available = ResourceBlocks(0.0);
                left
            }
        }
    }
}
