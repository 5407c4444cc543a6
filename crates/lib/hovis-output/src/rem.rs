use std::error::Error;
use std::io::Write;
use std::path::Path;

use csv::{Writer, WriterBuilder};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RemPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub sinr: f64,
}

/// Sampling grid of a radio environment map. Both axes include their end points.
#[derive(Deserialize, Debug, Clone, Copy, TypedBuilder)]
pub struct RemGrid {
    #[builder(default = -750.0)]
    pub x_min: f64,
    #[builder(default = 750.0)]
    pub x_max: f64,
    #[builder(default = -550.0)]
    pub y_min: f64,
    #[builder(default = 950.0)]
    pub y_max: f64,
    #[builder(default = 100)]
    pub x_res: u32,
    #[builder(default = 100)]
    pub y_res: u32,
    #[builder(default = 0.0)]
    pub z: f64,
}

impl Default for RemGrid {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RemGrid {
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let x_step = (self.x_max - self.x_min) / self.x_res as f64;
        let y_step = (self.y_max - self.y_min) / self.y_res as f64;
        (0..=self.x_res).flat_map(move |i| {
            (0..=self.y_res).map(move |j| {
                (
                    self.x_min + i as f64 * x_step,
                    self.y_min + j as f64 * y_step,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        (self.x_res as usize + 1) * (self.y_res as usize + 1)
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Tab separated `x y z sinr` rows without a header, SINR as a linear ratio.
pub struct RemWriter<W: Write> {
    writer: Writer<W>,
}

impl RemWriter<std::fs::File> {
    pub fn create(path: &Path) -> Result<Self, Box<dyn Error>> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> RemWriter<W> {
    pub fn new(out: W) -> Self {
        let writer = WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(out);
        Self { writer }
    }

    pub fn write_point(&mut self, point: &RemPoint) -> Result<(), Box<dyn Error>> {
        self.writer.serialize(point)?;
        Ok(())
    }

    /// Samples `sinr_at` over the grid and writes every point.
    pub fn write_grid<F>(&mut self, grid: &RemGrid, mut sinr_at: F) -> Result<u64, Box<dyn Error>>
    where
        F: FnMut(f64, f64) -> f64,
    {
        let mut written = 0;
        for (x, y) in grid.points() {
            self.write_point(&RemPoint {
                x,
                y,
                z: grid.z,
                sinr: sinr_at(x, y),
            })?;
            written += 1;
        }
        Ok(written)
    }

    pub fn finish(mut self) -> Result<(), Box<dyn Error>> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_grid_has_end_points() {
        let grid = RemGrid::default();
        let points: Vec<(f64, f64)> = grid.points().collect();
        assert_eq!(points.len(), 101 * 101);
        assert_eq!(points.len(), grid.len());
        assert_eq!(points[0], (-750.0, -550.0));
        assert_eq!(points[points.len() - 1], (750.0, 950.0));
    }

    #[test]
    fn rows_are_tab_separated() {
        let mut out = Vec::new();
        {
            let mut writer = RemWriter::new(&mut out);
            writer
                .write_point(&RemPoint {
                    x: -750.0,
                    y: 10.5,
                    z: 0.0,
                    sinr: 2.5,
                })
                .unwrap();
            writer.finish().unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "-750.0\t10.5\t0.0\t2.5\n");
    }
}
