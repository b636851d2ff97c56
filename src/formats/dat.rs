use anyhow::{Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use log::info;
use serde::Serialize;
use std::fs::{create_dir_all, rename, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::{Column, Dataset};

pub const MANIFEST_NAME: &str = "datasets.json";

pub fn dataset_file_name(index: usize) -> String {
    format!("Dataset_{}.dat", index)
}

/// One entry of `datasets.json`.
#[derive(Debug, Serialize)]
pub struct DatasetManifest<'a> {
    pub file: String,
    pub samples_per_frame: usize,
    pub step: f64,
    pub rows: usize,
    /// Values per row after the depth
    pub item_count: usize,
    pub depth_range: Option<(f64, f64)>,
    pub columns: &'a [Column],
}

pub struct DatFormatter {
    output_directory: PathBuf,
}

impl DatFormatter {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    /// Write one dataset and return its file path.
    ///
    /// Rows go to a `.tmp` file first, which only takes the final name once
    /// every row is on disk.
    pub fn write_dataset(&self, dataset: &Dataset) -> Result<PathBuf> {
        create_dir_all(&self.output_directory)?;

        let path = self
            .output_directory
            .join(dataset_file_name(dataset.index));
        let tmp_path = path.with_extension("dat.tmp");

        let file = File::create(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        let mut out = BufWriter::new(file);
        for i in 0..dataset.row_count() {
            if let Some((depth, values)) = dataset.row(i) {
                out.write_f32::<LittleEndian>(depth as f32)?;
                for &value in values {
                    out.write_f32::<LittleEndian>(value)?;
                }
            }
        }
        out.flush()?;
        drop(out);

        rename(&tmp_path, &path)
            .with_context(|| format!("renaming {} into place", tmp_path.display()))?;

        info!(
            "Wrote {} rows of {} values to {}",
            dataset.row_count(),
            dataset.item_count,
            path.display()
        );
        Ok(path)
    }

    pub fn write_manifest(&self, datasets: &[Dataset]) -> Result<PathBuf> {
        let entries: Vec<DatasetManifest> = datasets
            .iter()
            .map(|d| DatasetManifest {
                file: dataset_file_name(d.index),
                samples_per_frame: d.samples_per_frame,
                step: d.step,
                rows: d.row_count(),
                item_count: d.item_count,
                depth_range: d.depth_range(),
                columns: &d.columns,
            })
            .collect();

        let path = self.output_directory.join(MANIFEST_NAME);
        let file = File::create(&path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &entries)?;
        Ok(path)
    }
}
