use std::error::Error;
use std::path::Path;

use log::info;

use hovis_models::device::mobility::Point2D;
use hovis_models::net::radio::RadioEnvironment;
use hovis_output::rem::{RemGrid, RemWriter};

/// Linear SINR of the best server at `at`.
pub fn best_sinr_linear(radio: &RadioEnvironment, at: &Point2D) -> f64 {
    10f64.powf(radio.best_sinr_db(at) / 10.0)
}

/// Writes the radio environment map of the cells over `grid` to `path`. Returns the number of
/// points written.
pub fn render_map(
    radio: &RadioEnvironment,
    grid: &RemGrid,
    path: &Path,
) -> Result<u64, Box<dyn Error>> {
    let mut writer = RemWriter::create(path)?;
    let written = writer.write_grid(grid, |x, y| best_sinr_linear(radio, &Point2D::new(x, y)))?;
    writer.finish()?;
    info!(
        "Radio environment map of {} cells written to {} ({} points)",
        radio.cells().len(),
        path.display(),
        written
    );
    Ok(written)
}
