//! Dataset layout planning.

use log::debug;

use crate::format_spec::DataFormat;
use crate::models::{DatasetLayout, DatasetPlan, DatasetSlot};

/// Group decodable channels by samples per frame.
///
/// Datasets appear in the order their sample count is first seen. Each
/// member channel gets a slot whose position is the running sum of the
/// items of the channels placed before it. The per-frame depth channel is
/// not a member of any dataset. `frame_spacing` is in meters.
pub fn plan_datasets(format: &mut DataFormat, frame_spacing: f64) -> DatasetLayout {
    let depth_channel = format.depth_channel();
    let mut datasets: Vec<DatasetPlan> = Vec::new();

    for (i, channel) in format.channels.iter_mut().enumerate() {
        channel.dataset = None;
        if Some(i) == depth_channel || !channel.is_numeric() {
            continue;
        }

        let n = match datasets
            .iter()
            .position(|d| d.samples_per_frame == channel.samples)
        {
            Some(n) => n,
            None => {
                datasets.push(DatasetPlan {
                    index: datasets.len(),
                    samples_per_frame: channel.samples,
                    step: frame_spacing.abs() / channel.samples as f64,
                    channels: Vec::new(),
                    item_count: 0,
                });
                datasets.len() - 1
            }
        };

        let plan = &mut datasets[n];
        channel.dataset = Some(DatasetSlot {
            dataset: n,
            index: plan.channels.len(),
            position: plan.item_count,
        });
        plan.channels.push(i);
        plan.item_count += channel.items_per_frame;
    }

    let max_samples = datasets
        .iter()
        .map(|d| d.samples_per_frame)
        .max()
        .unwrap_or(0);

    for plan in &datasets {
        debug!(
            "Dataset {}: {} samples per frame, step {} m, {} channels, {} items per row",
            plan.index,
            plan.samples_per_frame,
            plan.step,
            plan.channels.len(),
            plan.item_count
        );
    }

    DatasetLayout {
        datasets,
        max_samples,
    }
}
