use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, RecordBatch, UInt16Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};

use hovis_core::bucket::TimeMS;

use crate::result::ResultWriter;
use crate::writer::WriterType;

/// Downlink RSRP and SINR seen by each UE for its serving cell.
#[derive(Debug)]
pub struct RsrpSinrWriter {
    time_step: Vec<u64>,
    cell_id: Vec<u16>,
    imsi: Vec<u64>,
    rnti: Vec<u16>,
    rsrp: Vec<f64>,
    sinr: Vec<f64>,
    to_output: WriterType,
}

impl RsrpSinrWriter {
    pub fn new(output_file: PathBuf) -> Self {
        Self {
            to_output: WriterType::new(&output_file, Self::schema()),
            time_step: Vec::new(),
            cell_id: Vec::new(),
            imsi: Vec::new(),
            rnti: Vec::new(),
            rsrp: Vec::new(),
            sinr: Vec::new(),
        }
    }

    pub fn add_data(
        &mut self,
        time_step: TimeMS,
        cell_id: u16,
        imsi: u64,
        rnti: u16,
        rsrp_dbm: f64,
        sinr_db: f64,
    ) {
        self.time_step.push(time_step.as_u64());
        self.cell_id.push(cell_id);
        self.imsi.push(imsi);
        self.rnti.push(rnti);
        self.rsrp.push(rsrp_dbm);
        self.sinr.push(sinr_db);
    }
}

impl ResultWriter for RsrpSinrWriter {
    fn schema() -> Schema {
        let time_ms = Field::new("time_step", DataType::UInt64, false);
        let cell_id = Field::new("cell_id", DataType::UInt16, false);
        let imsi = Field::new("imsi", DataType::UInt64, false);
        let rnti = Field::new("rnti", DataType::UInt16, false);
        let rsrp = Field::new("rsrp", DataType::Float64, false);
        let sinr = Field::new("sinr", DataType::Float64, false);
        Schema::new(vec![time_ms, cell_id, imsi, rnti, rsrp, sinr])
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
                "cell_id",
                Arc::new(UInt16Array::from(std::mem::take(&mut self.cell_id))) as ArrayRef,
            ),
            (
                "imsi",
                Arc::new(UInt64Array::from(std::mem::take(&mut self.imsi))) as ArrayRef,
            ),
            (
                "rnti",
                Arc::new(UInt16Array::from(std::mem::take(&mut self.rnti))) as ArrayRef,
            ),
            (
                "rsrp",
                Arc::new(Float64Array::from(std::mem::take(&mut self.rsrp))) as ArrayRef,
            ),
            (
                "sinr",
                Arc::new(Float64Array::from(std::mem::take(&mut self.sinr))) as ArrayRef,
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
