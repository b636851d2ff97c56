use anyhow::Result;
use arrow::array::{ArrayRef, Float32Array, Float32Builder, Float64Array, ListBuilder, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use log::{info, warn};
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::models::Dataset;

pub const DEPTH_COLUMN: &str = "DEPTH";

pub fn dataset_directory_name(index: usize) -> String {
    format!("dataset_{}", index)
}

pub struct ParquetFormatter {
    output_directory: PathBuf,
    chunk_size: usize,
}

impl ParquetFormatter {
    pub fn new<P: AsRef<Path>>(output_directory: P, chunk_size: usize) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Write one dataset as `file_partNNN.parquet` chunks in its own
    /// directory. Returns the number of files written.
    pub fn convert(&self, dataset: &Dataset) -> Result<usize> {
        let rows = dataset.row_count();
        if rows == 0 {
            warn!("Dataset {} has no rows, nothing to write", dataset.index);
            return Ok(0);
        }

        let directory = self
            .output_directory
            .join(dataset_directory_name(dataset.index));
        create_dir_all(&directory)?;

        let schema = Arc::new(dataset_schema(dataset));
        let total_chunks = rows.div_ceil(self.chunk_size);
        info!(
            "Dataset {}: writing {} rows in {} chunks",
            dataset.index, rows, total_chunks
        );

        for chunk in 0..total_chunks {
            let start = chunk * self.chunk_size;
            let end = (start + self.chunk_size).min(rows);
            let output_path = directory.join(format!("file_part{:03}.parquet", chunk));
            self.write_chunk(dataset, start..end, schema.clone(), &output_path)?;
        }

        Ok(total_chunks)
    }

    fn write_chunk(
        &self,
        dataset: &Dataset,
        rows: std::ops::Range<usize>,
        schema: Arc<Schema>,
        output_path: &Path,
    ) -> Result<()> {
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(dataset.columns.len() + 1);
        arrays.push(Arc::new(Float64Array::from(
            dataset.depths[rows.clone()].to_vec(),
        )));

        let mut position = 0;
        for column in &dataset.columns {
            arrays.push(build_column(dataset, rows.clone(), position, column.items));
            position += column.items;
        }

        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let file = File::create(output_path)?;
        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

        writer.write(&batch)?;
        writer.close()?;

        Ok(())
    }
}

/// `DEPTH` first, then one column per channel in dataset order.
pub fn dataset_schema(dataset: &Dataset) -> Schema {
    let mut fields = vec![Field::new(DEPTH_COLUMN, DataType::Float64, false)];
    for column in &dataset.columns {
        let data_type = if column.items == 1 {
            DataType::Float32
        } else {
            DataType::List(Arc::new(Field::new("item", DataType::Float32, true)))
        };
        fields.push(Field::new(column.mnemonic.as_str(), data_type, true));
    }
    Schema::new(fields)
}

fn nullable(value: f32) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

/// Values `position..position + items` of each row, NaN as null.
fn build_column(
    dataset: &Dataset,
    rows: std::ops::Range<usize>,
    position: usize,
    items: usize,
) -> ArrayRef {
    let stride = dataset.item_count;
    if items == 1 {
        let values: Vec<Option<f32>> = rows
            .map(|r| nullable(dataset.values[r * stride + position]))
            .collect();
        return Arc::new(Float32Array::from(values));
    }

    let mut builder = ListBuilder::new(Float32Builder::new());
    for r in rows {
        let start = r * stride + position;
        for &value in &dataset.values[start..start + items] {
            builder.values().append_option(nullable(value));
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}
