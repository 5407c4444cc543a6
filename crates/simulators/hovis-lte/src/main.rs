use clap::Parser;
use log::info;

use hovis_lte::lte::bucket::LteBucket;
use hovis_lte::simulation::builder::{LteScheduler, SimulationBuilder};
use hovis_lte::simulation::config::CliArgs;
use hovis_runner::runner::{run_headless, run_simulation};

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() {
    let args = CliArgs::parse();
    let start = std::time::Instant::now();
    let mut builder = SimulationBuilder::new(&args);

    if builder.is_map_mode() {
        let written = builder.render_map();
        info!("Map of {} points rendered in {} ms.", written, start.elapsed().as_millis());
        return;
    }

    let scheduler = builder.build();
    if builder.use_tui() {
        run_simulation::<LteBucket, LteScheduler, _>(
            scheduler,
            builder.metadata(),
            builder.renderer(),
        );
    } else {
        let stopped_at = run_headless::<LteBucket, LteScheduler>(scheduler);
        info!("Simulation stopped at {} ms.", stopped_at);
    }
    info!("Simulation finished in {} ms.", start.elapsed().as_millis());
}
