use std::sync::atomic::{AtomicUsize, Ordering};

/// Hooks a bulk load reports through. Both counters are 1-based and reach
/// `total` when the phase is done.
pub trait LoadProgress: Sync {
    fn on_record(&self, _done: usize, _total: usize) {}

    fn on_index_entry(&self, _done: usize, _total: usize) {}
}

pub struct NoProgress;

impl LoadProgress for NoProgress {}

/// Counts completed records and index entries.
#[derive(Debug, Default)]
pub struct AtomicProgress {
    pub records: AtomicUsize,
    pub index_entries: AtomicUsize,
}

impl AtomicProgress {
    pub fn new() -> Self {
        AtomicProgress::default()
    }

    pub fn records(&self) -> usize {
        self.records.load(Ordering::Relaxed)
    }

    pub fn index_entries(&self) -> usize {
        self.index_entries.load(Ordering::Relaxed)
    }
}

impl LoadProgress for AtomicProgress {
    fn on_record(&self, done: usize, _total: usize) {
        self.records.store(done, Ordering::Relaxed);
    }

    fn on_index_entry(&self, done: usize, _total: usize) {
        self.index_entries.store(done, Ordering::Relaxed);
    }
}
