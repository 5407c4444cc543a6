use std::fs::File;
use std::path::Path;

use arrow::csv::Writer;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchWriter};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

/// Columnar output file. The extension of the file name picks the format.
#[derive(Debug)]
pub enum WriterType {
    Parquet(WriterParquet),
    Csv(WriterCsv),
}

impl WriterType {
    pub fn new(file_name: &Path, schema: Schema) -> Self {
        if file_name.exists() {
            match std::fs::remove_file(file_name) {
                Ok(_) => {}
                Err(e) => panic!("Error deleting file: {}", e),
            }
        }
        match file_name.extension().and_then(|ext| ext.to_str()) {
            Some("parquet") => WriterType::Parquet(WriterParquet::new(file_name, schema)),
            Some("csv") => WriterType::Csv(WriterCsv::new(file_name)),
            _ => panic!("Invalid file extension for {}", file_name.display()),
        }
    }

    pub fn record_batch_to_file(&mut self, record_batch: &RecordBatch) {
        match self {
            WriterType::Parquet(to_output) => {
                if let Err(e) = to_output.writer.write(record_batch) {
                    panic!("Failed to write parquet: {}", e);
                }
            }
            WriterType::Csv(to_output) => {
                if let Err(e) = to_output.writer.write(record_batch) {
                    panic!("Failed to write csv: {}", e);
                }
            }
        }
    }

    pub fn close(self) {
        match self {
            WriterType::Parquet(to_output) => to_output.close(),
            WriterType::Csv(to_output) => to_output.close(),
        }
    }
}

#[derive(Debug)]
pub struct WriterParquet {
    pub writer: ArrowWriter<File>,
}

impl WriterParquet {
    fn new(file_name: &Path, schema: Schema) -> Self {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let output_file = match File::create(file_name) {
            Ok(file) => file,
            Err(e) => panic!("Failed to create {}: {}", file_name.display(), e),
        };
        let writer = match ArrowWriter::try_new(output_file, SchemaRef::from(schema), Some(props)) {
            Ok(writer) => writer,
            Err(e) => panic!("Failed to create parquet writer: {}", e),
        };
        Self { writer }
    }

    pub fn close(self) {
        if let Err(e) = self.writer.close() {
            panic!("Failed to close parquet file: {}", e);
        }
    }
}

#[derive(Debug)]
pub struct WriterCsv {
    pub writer: Writer<File>,
}

impl WriterCsv {
    fn new(file_name: &Path) -> Self {
        let output_file = match File::create(file_name) {
            Ok(file) => file,
            Err(e) => panic!("Failed to create {}: {}", file_name.display(), e),
        };
        Self {
            writer: Writer::new(output_file),
        }
    }

    pub fn close(self) {
        if let Err(e) = self.writer.close() {
            panic!("Failed to close csv file: {}", e);
        }
    }
}
