use std::path::PathBuf;

/// When the store file is fsynced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Immediate, // fsync after every commit
    None,      // Let OS handle it
}

/// How a random slot is resolved to a stored quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Draw an id in `[0, max_id)` and take the first quote at or after it.
    /// Quotes that follow a gap in the id space are picked more often.
    SeekForward,
    /// Draw an id in `[1, max_id]` and retry when it is absent.
    Rejection,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage_path: PathBuf,
    pub sync_mode: SyncMode,

    // Loader
    pub max_text_chars: usize,

    // Random sample cache
    pub pool_capacity: usize,
    pub max_random: usize,
    pub sampling: Sampling,
    pub rejection_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./quotations.db"),
            sync_mode: SyncMode::Immediate,

            max_text_chars: 300,

            pool_capacity: 2000,
            max_random: 50,
            sampling: Sampling::SeekForward,
            rejection_attempts: 16,
        }
    }
}

impl Config {
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Config {
            storage_path: storage_path.into(),
            ..Config::default()
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_pool_capacity(mut self, pool_capacity: usize) -> Self {
        self.pool_capacity = pool_capacity;
        self
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_max_text_chars(mut self, max_text_chars: usize) -> Self {
        self.max_text_chars = max_text_chars;
        self
    }
}
