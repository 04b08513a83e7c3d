use serde::{Deserialize, Serialize};

pub mod progress;
pub mod table;
pub mod target;

// Re-exports for convenience
pub use progress::*;
pub use table::*;
pub use target::*;

/// Lifecycle phase of a single extraction request. Each phase owns a fixed
/// slice of the overall percentage so that the polled value only ever grows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Init,
    Browser,
    Discovery,
    Scraping,
    Processing,
    Export,
    Archive,
}

impl Phase {
    /// Inclusive `(start, end)` percentage range reserved for the phase.
    pub fn range(self) -> (u8, u8) {
        match self {
            Phase::Init => (0, 0),
            Phase::Browser => (5, 5),
            Phase::Discovery => (10, 15),
            Phase::Scraping => (15, 65),
            Phase::Processing => (65, 70),
            Phase::Export => (70, 90),
            Phase::Archive => (90, 100),
        }
    }

    pub fn start(self) -> u8 {
        self.range().0
    }

    pub fn end(self) -> u8 {
        self.range().1
    }

    /// Percentage for `done` of `total` units of work inside this phase.
    /// An empty phase reports its end value.
    pub fn percentage(self, done: usize, total: usize) -> u8 {
        let (start, end) = self.range();
        if total == 0 {
            return end;
        }
        let span = (end - start) as usize;
        let done = done.min(total);
        start + (done * span / total) as u8
    }
}
