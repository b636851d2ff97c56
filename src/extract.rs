//! Frame extraction.
//!
//! Walks the data records of one logical file and turns every frame into
//! one row per dataset and sub-sample. Rows always come out with depth
//! increasing: up-logged tapes are walked backwards at every level.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::format_spec::DataFormat;
use crate::index::RecordIndex;
use crate::models::{
    Column, Dataset, DatasetLayout, DepthMode, Direction, Extraction, LogicalFile, NULL_VALUE,
};
use crate::progress::{ProgressSink, Stage};
use crate::repr::{self, ReprCode};
use crate::units::DepthUnit;

const ABSENT_TOLERANCE: f64 = 1e-5;

/// Frame index and depth for the `position`-th frame to emit from a record.
///
/// `record_depth` is the depth recorded at the start of the record and
/// `step` the frame spacing, both in meters. Up-logged records hold frames
/// of decreasing depth, so they are emitted last frame first, starting at
/// `record_depth - (frame_count - 1) * step`.
pub fn direction_adjusted_frame_depth(
    record_depth: f64,
    frame_count: usize,
    step: f64,
    direction: Direction,
    position: usize,
) -> (usize, f64) {
    match direction {
        Direction::Up => {
            let start = record_depth - frame_count.saturating_sub(1) as f64 * step;
            (
                frame_count.saturating_sub(1 + position),
                start + position as f64 * step,
            )
        }
        Direction::Down | Direction::Neither => (position, record_depth + position as f64 * step),
    }
}

/// Frame index for the `position`-th frame to emit when depth is in-frame.
fn frame_at(position: usize, frame_count: usize, direction: Direction) -> usize {
    match direction {
        Direction::Up => frame_count.saturating_sub(1 + position),
        Direction::Down | Direction::Neither => position,
    }
}

/// Rows of one record, held back until the whole record decoded.
#[derive(Default)]
struct Staged {
    depths: Vec<f64>,
    values: Vec<f32>,
}

pub struct FrameExtractor<'a> {
    data: &'a [u8],
    index: &'a RecordIndex,
    format: &'a DataFormat,
    layout: &'a DatasetLayout,
    depth_unit: DepthUnit,
    depth_code: ReprCode,
    depth_channel: Option<usize>,
    frame_size: usize,
    frame_spacing: f64,
}

impl<'a> FrameExtractor<'a> {
    /// Resolve everything the walk needs up front.
    ///
    /// # Errors
    ///
    /// `UnknownDepthUnit` when depth or frame spacing cannot be converted to
    /// meters, `NoChannels` when no dataset was planned and `InvalidFrame`
    /// for a zero frame size or a depth code with no numeric decoding.
    pub fn new(
        data: &'a [u8],
        index: &'a RecordIndex,
        format: &'a DataFormat,
        layout: &'a DatasetLayout,
    ) -> Result<Self> {
        let depth_unit = format.depth_unit()?;
        let frame_spacing = format.frame_spacing_meters()?;

        if layout.datasets.is_empty() {
            return Err(Error::NoChannels);
        }

        let frame_size = format.channel_frame_size();
        if frame_size == 0 {
            return Err(Error::InvalidFrame("frame size is zero".to_string()));
        }
        if let Some(declared) = format.spec.declared_frame_size {
            if declared != frame_size {
                warn!(
                    "Declared frame size {} differs from channel total {}; using {}",
                    declared, frame_size, frame_size
                );
            }
        }

        let code = format.depth_repr_code();
        let depth_code = ReprCode::try_from(code)
            .ok()
            .filter(|c| c.is_numeric())
            .ok_or_else(|| {
                Error::InvalidFrame(format!("depth representation code {} is not numeric", code))
            })?;

        Ok(Self {
            data,
            index,
            format,
            layout,
            depth_unit,
            depth_code,
            depth_channel: format.depth_channel(),
            frame_size,
            frame_spacing,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn direction(&self) -> Direction {
        self.format.spec.direction
    }

    fn depth_width(&self) -> usize {
        match self.format.spec.depth_mode {
            DepthMode::PerRecord => self.depth_code.size().unwrap_or(0),
            DepthMode::PerFrame => 0,
        }
    }

    /// Extract every data record of `file`.
    pub fn run(&self, file: &LogicalFile, progress: &mut dyn ProgressSink) -> Result<Extraction> {
        let mut datasets: Vec<Dataset> = self
            .layout
            .datasets
            .iter()
            .map(|plan| {
                let columns = plan
                    .channels
                    .iter()
                    .map(|&c| {
                        let channel = &self.format.channels[c];
                        Column {
                            mnemonic: channel.mnemonic.clone(),
                            units: channel.units.clone(),
                            items: channel.items_per_frame,
                            fast: channel.fast,
                        }
                    })
                    .collect();
                Dataset::new(plan, columns)
            })
            .collect();

        let total = file.data_record_count();
        progress.start(Stage::Extracting, total as u64);

        let records: Box<dyn Iterator<Item = usize>> = match self.direction() {
            Direction::Up => Box::new(file.data_records().rev()),
            Direction::Down | Direction::Neither => Box::new(file.data_records()),
        };

        let mut staged: Vec<Staged> = datasets.iter().map(|_| Staged::default()).collect();
        let mut payload = Vec::new();
        let mut processed = 0;
        let mut skipped = 0;
        let mut frames = 0;

        for (n, record) in records.enumerate() {
            for rows in staged.iter_mut() {
                rows.depths.clear();
                rows.values.clear();
            }

            let result = self
                .index
                .read_payload(self.data, record, &mut payload)
                .and_then(|_| self.extract_record(&payload, &mut staged));

            match result {
                Ok(frame_count) => {
                    for (dataset, rows) in datasets.iter_mut().zip(staged.iter()) {
                        dataset.depths.extend_from_slice(&rows.depths);
                        dataset.values.extend_from_slice(&rows.values);
                    }
                    frames += frame_count;
                    processed += 1;
                }
                Err(err) if err.is_recoverable() => {
                    warn!("Skipping data record {}: {}", record, err);
                    skipped += 1;
                }
                Err(err) => return Err(err),
            }
            progress.advance(Stage::Extracting, n as u64 + 1);
        }

        info!(
            "Extracted {} frames from {} data records ({} skipped) into {} datasets",
            frames,
            processed,
            skipped,
            datasets.len()
        );

        Ok(Extraction {
            datasets,
            records_processed: processed,
            records_skipped: skipped,
            frames,
        })
    }

    /// Decode one reassembled data record into `staged`.
    fn extract_record(&self, payload: &[u8], staged: &mut [Staged]) -> Result<usize> {
        let depth_width = self.depth_width();
        if payload.len() < depth_width {
            return Err(Error::TruncatedRecord {
                needed: depth_width,
                available: payload.len(),
            });
        }

        let frame_count = (payload.len() - depth_width) / self.frame_size;
        let leftover = (payload.len() - depth_width) % self.frame_size;
        if leftover != 0 {
            debug!("{} bytes after the last whole frame", leftover);
        }

        let record_depth = match self.format.spec.depth_mode {
            DepthMode::PerRecord => Some(self.read_depth(payload)?),
            DepthMode::PerFrame => None,
        };

        let direction = self.direction();
        for position in 0..frame_count {
            let (frame, depth) = match (record_depth, self.depth_channel) {
                (Some(record_depth), _) => direction_adjusted_frame_depth(
                    record_depth,
                    frame_count,
                    self.frame_spacing,
                    direction,
                    position,
                ),
                (None, Some(channel)) => {
                    let frame = frame_at(position, frame_count, direction);
                    let start = depth_width
                        + frame * self.frame_size
                        + self.format.channels[channel].offset;
                    (frame, self.read_depth(&payload[start..])?)
                }
                (None, None) => {
                    return Err(Error::InvalidFrame("no depth reference".to_string()))
                }
            };

            let start = depth_width + frame * self.frame_size;
            let frame_bytes = &payload[start..start + self.frame_size];
            self.emit_frame(frame_bytes, depth, staged)?;
        }

        Ok(frame_count)
    }

    fn read_depth(&self, bytes: &[u8]) -> Result<f64> {
        let raw = repr::decode_number(bytes, self.depth_code)?;
        Ok(self.depth_unit.to_meters(raw))
    }

    /// Append one row per dataset and sub-sample of a frame.
    fn emit_frame(&self, frame: &[u8], depth: f64, staged: &mut [Staged]) -> Result<()> {
        let direction = self.direction();
        let sign = direction.sign();
        let absent = self.format.spec.absent_value;

        for (plan, rows) in self.layout.datasets.iter().zip(staged.iter_mut()) {
            for n in 0..plan.samples_per_frame {
                let sample = match direction {
                    Direction::Up => plan.samples_per_frame - 1 - n,
                    Direction::Down | Direction::Neither => n,
                };
                // Up logs use sign -1 with samples reversed, so depths within a frame still rise.
                rows.depths.push(depth + sign * sample as f64 * plan.step);

                for &c in &plan.channels {
                    let channel = &self.format.channels[c];
                    let code = channel
                        .repr()
                        .ok_or(Error::UnsupportedCode(channel.repr_code))?;
                    let width = channel
                        .item_width()
                        .ok_or(Error::UnsupportedCode(channel.repr_code))?;
                    let base = channel.offset + sample * channel.items_per_frame * width;

                    for item in 0..channel.items_per_frame {
                        let pos = base + item * width;
                        let bytes = frame.get(pos..).ok_or(Error::TruncatedRecord {
                            needed: pos + width,
                            available: frame.len(),
                        })?;
                        let value = repr::decode_number(bytes, code)?;
                        rows.values.push(if (value - absent).abs() < ABSENT_TOLERANCE {
                            NULL_VALUE
                        } else {
                            value as f32
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
