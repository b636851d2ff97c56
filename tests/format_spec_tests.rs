mod common;

use common::{lis_f32, FormatSpecBuilder};
use lis_parser::format_spec::DataFormat;
use lis_parser::models::{DepthMode, Direction};
use lis_parser::planner::plan_datasets;
use lis_parser::units::DepthUnit;
use lis_parser::Error;
use std::collections::HashSet;

// ============================================================================
// Entry blocks
// ============================================================================

#[test]
fn test_defaults_without_entries() {
    let payload = FormatSpecBuilder::new()
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    assert_eq!(format.spec.direction, Direction::Neither);
    assert_eq!(format.spec.depth_mode, DepthMode::PerFrame);
    assert_eq!(format.spec.absent_value, -999.25);
    assert_eq!(format.spec.frame_spacing_units, ".1IN");
    assert_eq!(format.spec.depth_units, ".1IN");
    assert_eq!(format.spec.depth_repr_code, 68);
    assert_eq!(format.spec.declared_frame_size, None);
}

#[test]
fn test_global_parameters() {
    let payload = FormatSpecBuilder::new()
        .direction(1)
        .frame_spacing(0.5, "FT")
        .absent_value(-9999.0)
        .depth_per_record("M")
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    assert_eq!(format.spec.direction, Direction::Up);
    assert_eq!(format.spec.frame_spacing, 0.5);
    assert_eq!(format.frame_spacing_unit().unwrap(), DepthUnit::Feet);
    assert!((format.frame_spacing_meters().unwrap() - 0.1524).abs() < 1e-9);
    assert_eq!(format.spec.absent_value, -9999.0);
    assert_eq!(format.spec.depth_mode, DepthMode::PerRecord);
    assert_eq!(format.depth_units(), "M");
    assert_eq!(format.depth_channel(), None);
}

#[test]
fn test_down_direction_code() {
    let payload = FormatSpecBuilder::new()
        .direction(255)
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();
    assert_eq!(format.spec.direction, Direction::Down);
}

#[test]
fn test_undefined_entry_types_are_skipped() {
    let payload = FormatSpecBuilder::new()
        .entry(10, 66, &[7])
        .entry(21, 65, b"JUNK")
        .direction(1)
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    assert_eq!(format.spec.direction, Direction::Up);
    assert_eq!(format.channels.len(), 1);
}

#[test]
fn test_undecodable_entry_keeps_default() {
    // Code 50 has a width but no known layout.
    let payload = FormatSpecBuilder::new()
        .entry(12, 50, &[1, 2, 3, 4])
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();
    assert_eq!(format.spec.absent_value, -999.25);
}

#[test]
fn test_blank_unit_entry_keeps_default() {
    let payload = FormatSpecBuilder::new()
        .entry(9, 65, b"    ")
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();
    assert_eq!(format.spec.frame_spacing_units, ".1IN");
}

#[test]
fn test_missing_terminator() {
    let mut payload = Vec::new();
    payload.extend_from_slice(&[8, 4, 68]);
    payload.extend_from_slice(&lis_f32(6.0));
    assert!(matches!(
        DataFormat::parse(&payload, None),
        Err(Error::TruncatedFormatSpec { .. })
    ));
}

// ============================================================================
// Datum blocks
// ============================================================================

#[test]
fn test_fast_channel_threshold() {
    let payload = FormatSpecBuilder::new()
        .channel("WF1", "", 400, 1, 68)
        .channel("WF2", "", 404, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    assert_eq!(format.channels[0].items_per_frame, 100);
    assert!(!format.channels[0].fast);
    assert_eq!(format.channels[1].items_per_frame, 101);
    assert!(format.channels[1].fast);
}

#[test]
fn test_duplicate_mnemonics_renamed() {
    let payload = FormatSpecBuilder::new()
        .channel("DEPT", "M", 4, 1, 68)
        .channel("GR", "GAPI", 4, 1, 68)
        .channel("DEPT", "M", 4, 1, 68)
        .channel("GR", "GAPI", 4, 1, 68)
        .channel("dept", "M", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    let names: Vec<&str> = format.channels.iter().map(|c| c.mnemonic.as_str()).collect();
    assert_eq!(names, vec!["DEPT", "GR", "DEP1", "GR_1", "DEP2"]);

    // Both depth spellings share one counter; generated names never clash
    // with names already on the tape.
    let payload = FormatSpecBuilder::new()
        .channel("DEPT", "M", 4, 1, 68)
        .channel("DEPT", "M", 4, 1, 68)
        .channel("DEP", "M", 4, 1, 68)
        .channel("DEP", "M", 4, 1, 68)
        .channel("GR", "GAPI", 4, 1, 68)
        .channel("GR", "GAPI", 4, 1, 68)
        .channel("GR_1", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    let names: Vec<&str> = format.channels.iter().map(|c| c.mnemonic.as_str()).collect();
    assert_eq!(
        names,
        vec!["DEPT", "DEP1", "DEP", "DEP2", "GR", "GR_1", "GR_1_1"]
    );
    let unique: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(unique.len(), names.len());
}

#[test]
fn test_renamed_columns_are_unique_in_output() {
    let payload = FormatSpecBuilder::new()
        .frame_spacing(0.1, "M")
        .channel("DEPT", "M", 4, 1, 68)
        .channel("GR", "GAPI", 4, 1, 68)
        .channel("GR", "GAPI", 4, 1, 68)
        .channel("GR_1", "GAPI", 4, 1, 68)
        .build();
    let mut format = DataFormat::parse(&payload, None).unwrap();
    let layout = plan_datasets(&mut format, 0.1);

    let columns: Vec<&str> = layout.datasets[0]
        .channels
        .iter()
        .map(|&c| format.channels[c].mnemonic.as_str())
        .collect();
    assert_eq!(columns, vec!["GR", "GR_1", "GR_1_1"]);
}

#[test]
fn test_channel_offsets() {
    let payload = FormatSpecBuilder::new()
        .channel("DEPT", "M", 4, 1, 68)
        .channel("FLAG", "", 2, 1, 79)
        .channel("TEXT", "", 6, 1, 65)
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    let offsets: Vec<usize> = format.channels.iter().map(|c| c.offset).collect();
    assert_eq!(offsets, vec![0, 4, 6, 12]);
    assert_eq!(format.channel_frame_size(), 16);
    assert_eq!(format.spec.frame_size, 16);
}

#[test]
fn test_zero_samples_read_as_one() {
    let payload = FormatSpecBuilder::new()
        .channel("GR", "GAPI", 8, 0, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    assert_eq!(format.channels[0].samples, 1);
    assert_eq!(format.channels[0].items_per_frame, 2);
}

#[test]
fn test_partial_datum_block_ignored() {
    let mut payload = FormatSpecBuilder::new()
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    payload.extend_from_slice(&[b' '; 20]);

    let format = DataFormat::parse(&payload, None).unwrap();
    assert_eq!(format.channels.len(), 1);
}

#[test]
fn test_no_channels() {
    let payload = FormatSpecBuilder::new().direction(1).build();
    assert!(matches!(
        DataFormat::parse(&payload, None),
        Err(Error::NoChannels)
    ));
}

// ============================================================================
// Depth and frame size
// ============================================================================

#[test]
fn test_depth_channel_selection() {
    let payload = FormatSpecBuilder::new()
        .channel("GR", "GAPI", 4, 1, 68)
        .channel("DEP", "FT", 2, 1, 79)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    assert_eq!(format.depth_channel(), Some(1));
    assert_eq!(format.depth_repr_code(), 79);
    assert_eq!(format.depth_unit().unwrap(), DepthUnit::Feet);
}

#[test]
fn test_depth_channel_defaults_to_first() {
    let payload = FormatSpecBuilder::new()
        .entry(14, 65, b"CM  ")
        .channel("TDEP", "", 4, 1, 68)
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    assert_eq!(format.depth_channel(), Some(0));
    // Blank channel units fall back to the depth units entry.
    assert_eq!(format.depth_unit().unwrap(), DepthUnit::Centimeters);
}

#[test]
fn test_unknown_depth_unit() {
    let payload = FormatSpecBuilder::new()
        .channel("DEPT", "FURL", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, None).unwrap();

    assert!(matches!(format.depth_unit(), Err(Error::UnknownDepthUnit(u)) if u == "FURL"));
}

#[test]
fn test_declared_frame_size_wins() {
    let payload = FormatSpecBuilder::new()
        .frame_size(12)
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, Some(100)).unwrap();

    assert_eq!(format.spec.declared_frame_size, Some(12));
    assert_eq!(format.spec.frame_size, 12);
    assert_eq!(format.channel_frame_size(), 4);
}

#[test]
fn test_frame_size_from_first_data_record() {
    let payload = FormatSpecBuilder::new()
        .depth_per_record("M")
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let format = DataFormat::parse(&payload, Some(44)).unwrap();

    assert_eq!(format.spec.frame_size, 40);
}

// ============================================================================
// Dataset planning
// ============================================================================

#[test]
fn test_plan_groups_by_samples() {
    let payload = FormatSpecBuilder::new()
        .frame_spacing(0.1, "M")
        .channel("DEPT", "M", 4, 1, 68)
        .channel("GR", "GAPI", 4, 1, 68)
        .channel("RES", "OHMM", 16, 4, 68)
        .channel("NEU", "PU", 4, 1, 68)
        .build();
    let mut format = DataFormat::parse(&payload, None).unwrap();
    let spacing = format.frame_spacing_meters().unwrap();
    let layout = plan_datasets(&mut format, spacing);

    assert_eq!(layout.datasets.len(), 2);
    assert_eq!(layout.max_samples, 4);

    let regular = &layout.datasets[0];
    assert_eq!(regular.samples_per_frame, 1);
    assert_eq!(regular.channels, vec![1, 3]);
    assert_eq!(regular.item_count, 2);
    assert!((regular.step - 0.1).abs() < 1e-6);

    let fine = &layout.datasets[1];
    assert_eq!(fine.samples_per_frame, 4);
    assert_eq!(fine.channels, vec![2]);
    assert_eq!(fine.item_count, 1);
    assert!((fine.step - 0.025).abs() < 1e-6);

    assert_eq!(format.channels[0].dataset, None);
    let neu = format.channels[3].dataset.unwrap();
    assert_eq!((neu.dataset, neu.index, neu.position), (0, 1, 1));
    let res = format.channels[2].dataset.unwrap();
    assert_eq!((res.dataset, res.index, res.position), (1, 0, 0));
}

#[test]
fn test_plan_skips_non_numeric_channels() {
    let payload = FormatSpecBuilder::new()
        .channel("DEPT", "M", 4, 1, 68)
        .channel("TEXT", "", 8, 1, 65)
        .channel("LRF", "", 4, 1, 50)
        .channel("GR", "GAPI", 4, 1, 68)
        .build();
    let mut format = DataFormat::parse(&payload, None).unwrap();
    let layout = plan_datasets(&mut format, 0.1);

    assert_eq!(layout.datasets.len(), 1);
    assert_eq!(layout.datasets[0].channels, vec![3]);
    assert_eq!(format.channels[1].items_per_frame, 0);
    assert_eq!(format.channels[1].dataset, None);
    assert_eq!(format.channels[2].dataset, None);
    assert_eq!(format.channels[3].offset, 16);
}

#[test]
fn test_plan_multi_item_channel() {
    let payload = FormatSpecBuilder::new()
        .depth_per_record("M")
        .channel("GR", "GAPI", 4, 1, 68)
        .channel("WF", "", 24, 2, 79)
        .build();
    let mut format = DataFormat::parse(&payload, None).unwrap();
    let layout = plan_datasets(&mut format, 0.2);

    assert_eq!(layout.datasets.len(), 2);
    assert_eq!(format.channels[1].items_per_frame, 6);
    assert_eq!(layout.datasets[1].item_count, 6);
    assert!((layout.datasets[1].step - 0.1).abs() < 1e-12);
}
