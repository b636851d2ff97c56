//! Logical file segmentation.
//!
//! A logical file is a maximal run of normal data records. Every other
//! record is attached to one logical file for bookkeeping.

use log::debug;

use crate::index::RecordIndex;
use crate::models::{LogicalFile, RecordType};

/// Split the index into logical files, in tape order.
///
/// Records before the first run go to the first file, records after the
/// last run to the last file. Between two runs, trailers close the
/// preceding file and everything else opens the following one.
pub fn segment(index: &RecordIndex) -> Vec<LogicalFile> {
    let records = index.records();

    let mut files: Vec<LogicalFile> = Vec::new();
    let mut i = 0;
    while i < records.len() {
        if records[i].record_type == RecordType::NormalData {
            let first = i;
            while i + 1 < records.len() && records[i + 1].record_type == RecordType::NormalData {
                i += 1;
            }
            files.push(LogicalFile::new(first, i));
        }
        i += 1;
    }

    if files.is_empty() {
        return files;
    }

    let mut next_file = 0;
    for (i, record) in records.iter().enumerate() {
        if record.record_type == RecordType::NormalData {
            continue;
        }
        while next_file < files.len() && files[next_file].first_data_record < i {
            next_file += 1;
        }
        let owner = if next_file == files.len() {
            files.len() - 1
        } else if next_file > 0 && record.record_type.is_trailer() {
            next_file - 1
        } else {
            next_file
        };
        files[owner].attach(record.record_type, i);
    }

    debug!("Found {} logical files", files.len());
    files
}

/// Index of the logical file with the widest address span.
///
/// Ties go to the earliest file. `None` when there are no files.
pub fn select_active(index: &RecordIndex, files: &[LogicalFile]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (n, file) in files.iter().enumerate() {
        let first = index.address(file.first_data_record).unwrap_or(0);
        let last = index.address(file.last_data_record).unwrap_or(0);
        let span = last.saturating_sub(first);
        match best {
            Some((_, best_span)) if best_span >= span => {}
            _ => best = Some((n, span)),
        }
    }
    best.map(|(n, _)| n)
}
