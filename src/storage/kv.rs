use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::path::Path;
use chrono::Utc;
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, info};
use crate::core::config::SyncMode;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::log::{CommitBatch, LogOp, StoreLog};

/// Key/value pair handed out by cursors.
pub type Entry = (Vec<u8>, Vec<u8>);

#[derive(Debug, Clone, Default)]
struct Bucket {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
    sequence: u64,
    // Bumped on every clear. Not persisted.
    generation: u64,
}

#[derive(Debug, Default)]
struct StoreState {
    buckets: HashMap<String, Bucket>,
    txid: u64,
}

impl StoreState {
    fn apply(&mut self, op: LogOp) {
        match op {
            LogOp::CreateBucket(name) => {
                self.buckets.entry(name).or_default();
            }
            LogOp::Put { bucket, key, value } => {
                self.buckets.entry(bucket).or_default().entries.insert(key, value);
            }
            LogOp::ClearBucket(name) => {
                if let Some(bucket) = self.buckets.get_mut(&name) {
                    bucket.entries.clear();
                    bucket.generation += 1;
                }
            }
            LogOp::SetSequence { bucket, value } => {
                self.buckets.entry(bucket).or_default().sequence = value;
            }
        }
    }

    /// Everything needed to rebuild this state from an empty file.
    fn snapshot(&self) -> CommitBatch {
        let mut names: Vec<&String> = self.buckets.keys().collect();
        names.sort();

        let mut ops = Vec::new();
        for name in names {
            let bucket = &self.buckets[name];
            ops.push(LogOp::CreateBucket(name.clone()));
            for (key, value) in &bucket.entries {
                ops.push(LogOp::Put {
                    bucket: name.clone(),
                    key: key.clone(),
                    value: value.clone(),
                });
            }
            ops.push(LogOp::SetSequence {
                bucket: name.clone(),
                value: bucket.sequence,
            });
        }

        CommitBatch {
            txid: self.txid,
            timestamp: Utc::now(),
            ops,
        }
    }
}

/// Single-file embedded key/value store with named buckets of ordered keys.
///
/// Readers never wait for a whole write transaction, only for the moment a
/// committed batch is published. Write transactions are serialized: at most
/// one holds the upgradable lock at any time.
pub struct KvStore {
    state: RwLock<StoreState>,
    log: Mutex<StoreLog>,
}

impl KvStore {
    pub fn open(path: impl AsRef<Path>, sync_mode: SyncMode) -> Result<Self> {
        let path = path.as_ref();
        let (log, batches) = StoreLog::open(path, sync_mode)?;

        let mut state = StoreState::default();
        for batch in batches {
            state.txid = batch.txid;
            for op in batch.ops {
                state.apply(op);
            }
        }

        info!(
            path = %path.display(),
            buckets = state.buckets.len(),
            txid = state.txid,
            "opened store"
        );

        Ok(KvStore {
            state: RwLock::new(state),
            log: Mutex::new(log),
        })
    }

    /// Point lookup. A missing bucket reads as empty.
    pub fn get(&self, bucket: &str, key: &[u8]) -> Option<Vec<u8>> {
        let state = self.state.read();
        state.buckets.get(bucket)?.entries.get(key).cloned()
    }

    /// Number of times the bucket has been cleared since the store was
    /// opened. Ids read under one generation mean nothing under another.
    pub fn generation(&self, bucket: &str) -> u64 {
        self.state.read().buckets.get(bucket).map_or(0, |b| b.generation)
    }

    pub fn bucket_len(&self, bucket: &str) -> usize {
        self.state.read().buckets.get(bucket).map_or(0, |b| b.entries.len())
    }

    pub fn sequence(&self, bucket: &str) -> u64 {
        self.state.read().buckets.get(bucket).map_or(0, |b| b.sequence)
    }

    /// Fresh cursor over one bucket.
    pub fn cursor(&self, bucket: &str) -> Cursor<'_> {
        Cursor {
            store: self,
            bucket: bucket.to_string(),
            position: None,
        }
    }

    /// Runs `f` inside a write transaction. The transaction commits when `f`
    /// returns `Ok` and leaves no trace when it returns `Err`.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut WriteTx<'_>) -> Result<T>,
    {
        let guard = self.state.upgradable_read();

        let mut tx = WriteTx::new(&guard);
        let out = f(&mut tx)?;
        let ops = tx.into_ops();

        if ops.is_empty() {
            return Ok(out);
        }

        let batch = CommitBatch {
            txid: guard.txid + 1,
            timestamp: Utc::now(),
            ops,
        };
        self.log.lock().append(&batch)?;

        let mut state = RwLockUpgradableReadGuard::upgrade(guard);
        state.txid = batch.txid;
        let op_count = batch.ops.len();
        for op in batch.ops {
            state.apply(op);
        }

        debug!(txid = state.txid, ops = op_count, "committed");
        Ok(out)
    }

    /// Rewrites the file so it holds only live data.
    pub fn compact(&self) -> Result<()> {
        let guard = self.state.upgradable_read();
        let snapshot = guard.snapshot();
        let mut log = self.log.lock();

        let before = log.position;
        log.rewrite(&snapshot)?;
        info!(before, after = log.position, "compacted store file");
        Ok(())
    }

    pub fn file_size(&self) -> u64 {
        self.log.lock().position
    }

    pub fn sync(&self) -> Result<()> {
        self.log.lock().sync()
    }
}

/// Bucket cursor in the style of an ordered B-tree cursor. Every step takes
/// a short shared lock, so a scan sees commits published between steps.
pub struct Cursor<'a> {
    store: &'a KvStore,
    bucket: String,
    position: Option<Vec<u8>>,
}

impl<'a> Cursor<'a> {
    fn step<F>(&mut self, pick: F) -> Option<Entry>
    where
        F: FnOnce(&BTreeMap<Vec<u8>, Vec<u8>>, Option<&[u8]>) -> Option<Entry>,
    {
        let found = {
            let state = self.store.state.read();
            let bucket = state.buckets.get(&self.bucket)?;
            pick(&bucket.entries, self.position.as_deref())
        };

        if let Some((key, _)) = &found {
            self.position = Some(key.clone());
        }
        found
    }

    pub fn first(&mut self) -> Option<Entry> {
        self.step(|entries, _| {
            entries.iter().next().map(|(k, v)| (k.clone(), v.clone()))
        })
    }

    pub fn last(&mut self) -> Option<Entry> {
        self.step(|entries, _| {
            entries.iter().next_back().map(|(k, v)| (k.clone(), v.clone()))
        })
    }

    /// Entry after the current position, or the first entry if the cursor
    /// has not moved yet.
    pub fn next(&mut self) -> Option<Entry> {
        self.step(|entries, position| {
            let lower = match position {
                Some(key) => Bound::Excluded(key),
                None => Bound::Unbounded,
            };
            entries
                .range::<[u8], _>((lower, Bound::Unbounded))
                .next()
                .map(|(k, v)| (k.clone(), v.clone()))
        })
    }

    pub fn prev(&mut self) -> Option<Entry> {
        self.step(|entries, position| {
            let upper = match position {
                Some(key) => Bound::Excluded(key),
                None => Bound::Unbounded,
            };
            entries
                .range::<[u8], _>((Bound::Unbounded, upper))
                .next_back()
                .map(|(k, v)| (k.clone(), v.clone()))
        })
    }

    /// First entry whose key is at or after `key`.
    pub fn seek(&mut self, key: &[u8]) -> Option<Entry> {
        self.step(|entries, _| {
            entries
                .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
                .next()
                .map(|(k, v)| (k.clone(), v.clone()))
        })
    }
}

#[derive(Debug, Default)]
struct StagedBucket {
    cleared: bool,
    clears: u64,
    writes: BTreeMap<Vec<u8>, Vec<u8>>,
    sequence: Option<u64>,
}

/// Write transaction. Sees committed state plus its own staged writes.
pub struct WriteTx<'a> {
    committed: &'a StoreState,
    staged: HashMap<String, StagedBucket>,
    created: Vec<String>,
    ops: Vec<LogOp>,
}

impl<'a> WriteTx<'a> {
    fn new(committed: &'a StoreState) -> Self {
        WriteTx {
            committed,
            staged: HashMap::new(),
            created: Vec::new(),
            ops: Vec::new(),
        }
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.committed.buckets.contains_key(bucket) || self.created.iter().any(|b| b == bucket)
    }

    fn require_bucket(&self, bucket: &str) -> Result<()> {
        if self.bucket_exists(bucket) {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::NotFound, format!("bucket '{}' does not exist", bucket)))
        }
    }

    pub fn create_bucket_if_missing(&mut self, bucket: &str) {
        if !self.bucket_exists(bucket) {
            self.created.push(bucket.to_string());
            self.ops.push(LogOp::CreateBucket(bucket.to_string()));
        }
    }

    pub fn get(&self, bucket: &str, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(staged) = self.staged.get(bucket) {
            if let Some(value) = staged.writes.get(key) {
                return Some(value.clone());
            }
            if staged.cleared {
                return None;
            }
        }
        self.committed.buckets.get(bucket)?.entries.get(key).cloned()
    }

    pub fn put(&mut self, bucket: &str, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.require_bucket(bucket)?;

        self.staged
            .entry(bucket.to_string())
            .or_default()
            .writes
            .insert(key.to_vec(), value.clone());
        self.ops.push(LogOp::Put {
            bucket: bucket.to_string(),
            key: key.to_vec(),
            value,
        });
        Ok(())
    }

    /// Removes every entry of the bucket. The sequence is left alone.
    pub fn clear_bucket(&mut self, bucket: &str) -> Result<()> {
        self.require_bucket(bucket)?;

        let staged = self.staged.entry(bucket.to_string()).or_default();
        staged.cleared = true;
        staged.clears += 1;
        staged.writes.clear();
        self.ops.push(LogOp::ClearBucket(bucket.to_string()));
        Ok(())
    }

    /// Generation the bucket will have once this transaction commits.
    pub fn generation(&self, bucket: &str) -> u64 {
        let committed = self.committed.buckets.get(bucket).map_or(0, |b| b.generation);
        committed + self.staged.get(bucket).map_or(0, |s| s.clears)
    }

    pub fn sequence(&self, bucket: &str) -> u64 {
        self.staged
            .get(bucket)
            .and_then(|s| s.sequence)
            .or_else(|| self.committed.buckets.get(bucket).map(|b| b.sequence))
            .unwrap_or(0)
    }

    pub fn set_sequence(&mut self, bucket: &str, value: u64) -> Result<()> {
        self.require_bucket(bucket)?;
        self.staged.entry(bucket.to_string()).or_default().sequence = Some(value);
        Ok(())
    }

    /// Increments and returns the bucket's sequence. Values are unique
    /// within the transaction and across committed transactions.
    pub fn next_sequence(&mut self, bucket: &str) -> Result<u64> {
        let next = self.sequence(bucket) + 1;
        self.set_sequence(bucket, next)?;
        Ok(next)
    }

    fn into_ops(mut self) -> Vec<LogOp> {
        let mut sequences: Vec<(String, u64)> = self
            .staged
            .iter()
            .filter_map(|(name, staged)| staged.sequence.map(|value| (name.clone(), value)))
            .collect();
        sequences.sort();

        for (bucket, value) in sequences {
            self.ops.push(LogOp::SetSequence { bucket, value });
        }
        self.ops
    }
}
