use log::info;

use hovis_core::agent::{AgentId, AgentKind};
use hovis_core::core::Core;
use hovis_models::device::mobility::{ConstantPosition, Point2D};
use hovis_models::device::placement::HexGridLayout;
use hovis_models::net::radio::CellId;

use crate::lte::stack::LteStack;

#[derive(Clone, Debug)]
pub struct BaseStation {
    pub node: AgentId,
    pub cell_id: CellId,
    /// Sector heading in degrees, one of 0, 120 and 240.
    pub direction: u32,
    mobility: ConstantPosition,
}

impl BaseStation {
    pub fn position(&self) -> Point2D {
        self.mobility.position
    }
}

#[derive(Clone, Debug, Default)]
pub struct Topology {
    stations: Vec<BaseStation>,
}

impl Topology {
    /// Creates `count` eNB nodes on the hexagonal grid, installs their devices and connects
    /// every pair of them over X2.
    pub fn provision(
        core: &mut Core,
        stack: &mut LteStack,
        layout: &HexGridLayout,
        count: u32,
    ) -> Self {
        let nodes = core.add_agents(AgentKind::BaseStation, count as usize);
        let stations: Vec<BaseStation> = nodes
            .into_iter()
            .zip(layout.sectors(count))
            .enumerate()
            .map(|(index, (node, site))| BaseStation {
                node,
                cell_id: stack.install_enb_device(node, site),
                direction: (index as u32 % HexGridLayout::SECTORS_PER_SITE) * 120,
                mobility: ConstantPosition::builder().position(site.position).build(),
            })
            .collect();

        let cells: Vec<CellId> = stations.iter().map(|station| station.cell_id).collect();
        stack.add_x2_interface(&cells);
        info!(
            "{} eNBs placed with an inter-site distance of {} m",
            stations.len(),
            layout.inter_site_distance
        );
        Self { stations }
    }

    pub fn stations(&self) -> &[BaseStation] {
        &self.stations
    }

    pub fn station(&self, cell_id: CellId) -> Option<&BaseStation> {
        self.stations.iter().find(|station| station.cell_id == cell_id)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}
