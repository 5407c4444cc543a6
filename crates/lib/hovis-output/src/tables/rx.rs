use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, RecordBatch, UInt16Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};

use hovis_core::bucket::TimeMS;

use crate::result::ResultWriter;
use crate::writer::WriterType;

/// Downlink bytes delivered to and dropped for each UE during one output interval.
#[derive(Debug)]
pub struct DlRxWriter {
    time_step: Vec<u64>,
    imsi: Vec<u64>,
    cell_id: Vec<u16>,
    rx_bytes: Vec<u64>,
    dropped_bytes: Vec<u64>,
    to_output: WriterType,
}

impl DlRxWriter {
    pub fn new(output_file: PathBuf) -> Self {
        Self {
            to_output: WriterType::new(&output_file, Self::schema()),
            time_step: Vec::new(),
            imsi: Vec::new(),
            cell_id: Vec::new(),
            rx_bytes: Vec::new(),
            dropped_bytes: Vec::new(),
        }
    }

    pub fn add_data(
        &mut self,
        time_step: TimeMS,
        imsi: u64,
        cell_id: u16,
        rx_bytes: u64,
        dropped_bytes: u64,
    ) {
        self.time_step.push(time_step.as_u64());
        self.imsi.push(imsi);
        self.cell_id.push(cell_id);
        self.rx_bytes.push(rx_bytes);
        self.dropped_bytes.push(dropped_bytes);
    }
}

impl ResultWriter for DlRxWriter {
    fn schema() -> Schema {
        let time_ms = Field::new("time_step", DataType::UInt64, false);
        let imsi = Field::new("imsi", DataType::UInt64, false);
        let cell_id = Field::new("cell_id", DataType::UInt16, false);
        let rx_bytes = Field::new("rx_bytes", DataType::UInt64, false);
        let dropped_bytes = Field::new("dropped_bytes", DataType::UInt64, false);
        Schema::new(vec![time_ms, imsi, cell_id, rx_bytes, dropped_bytes])
    }

    fn write_to_file(&mut self) {
        if self.time_step.is_empty() {
            return;
        }
        let record_batch = match RecordBatch::try_from_iter(vec![
            (
                "time_step",
                Arc::new(UInt64Array::from(std::mem::take(&mut self.time_step))) as ArrayRef,
            ),
            (
                "imsi",
                Arc::new(UInt64Array::from(std::mem::take(&mut self.imsi))) as ArrayRef,
            ),
            (
                "cell_id",
                Arc::new(UInt16Array::from(std::mem::take(&mut self.cell_id))) as ArrayRef,
            ),
            (
                "rx_bytes",
                Arc::new(UInt64Array::from(std::mem::take(&mut self.rx_bytes))) as ArrayRef,
            ),
            (
                "dropped_bytes",
                Arc::new(UInt64Array::from(std::mem::take(&mut self.dropped_bytes))) as ArrayRef,
            ),
        ]) {
            Ok(batch) => batch,
            Err(e) => panic!("Failed to convert results to record batch: {}", e),
        };
        self.to_output.record_batch_to_file(&record_batch);
    }

    fn close_file(self) {
        self.to_output.close()
    }
}
