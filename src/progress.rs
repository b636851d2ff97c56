//! Progress reporting hooks.

use log::info;

/// Coarse phases of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Indexing,
    Extracting,
    Writing,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Indexing => "indexing",
            Stage::Extracting => "extracting",
            Stage::Writing => "writing",
        }
    }
}

/// Receives monotonically increasing step counts.
///
/// Sinks have no influence on decoding; [`NoProgress`] is a valid choice
/// everywhere.
pub trait ProgressSink {
    fn start(&mut self, _stage: Stage, _total: u64) {}

    fn advance(&mut self, stage: Stage, position: u64);
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&mut self, _stage: Stage, _position: u64) {}
}

/// Logs a line each time a stage crosses another tenth of its total.
#[derive(Debug, Default)]
pub struct LogProgress {
    total: u64,
    last_decile: u64,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn start(&mut self, stage: Stage, total: u64) {
        self.total = total;
        self.last_decile = 0;
        info!("Started {} ({} steps)", stage.name(), total);
    }

    fn advance(&mut self, stage: Stage, position: u64) {
        if self.total == 0 {
            return;
        }
        let decile = (position.min(self.total) * 10) / self.total;
        if decile > self.last_decile {
            self.last_decile = decile;
            info!("{} {}%", stage.name(), decile * 10);
        }
    }
}
