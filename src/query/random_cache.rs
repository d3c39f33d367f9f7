use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, RwLock};
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};
use crate::core::error::Result;
use crate::core::types::Quote;
use crate::query::sampler::Sampler;

enum RefillRequest {
    /// Quotes were served; the count waits in `CachePool::pending`.
    Wake,
    /// Answered once every pending refill is done.
    Barrier(Sender<()>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub pool_len: usize,
    pub capacity: usize,
    pub pooled_serves: u64,
    pub direct_serves: u64,
    pub refills: u64,
}

struct CachePool {
    pool: RwLock<VecDeque<Quote>>,
    // Serializes refills from the worker and from `refill_now`.
    refill_lock: Mutex<()>,
    sampler: Arc<dyn Sampler>,
    capacity: usize,
    // Quotes served but not yet replaced. Requests made while the worker is
    // busy add up here instead of queueing.
    pending: AtomicUsize,
    pooled_serves: AtomicU64,
    direct_serves: AtomicU64,
    refills: AtomicU64,
}

impl CachePool {
    /// First fill when the pool is empty, otherwise drops the `n` served
    /// quotes from the head and appends `n` fresh ones. Sampling happens
    /// before the write lock is taken.
    fn refill(&self, n: usize) -> Result<()> {
        let _guard = self.refill_lock.lock();

        if self.pool.read().is_empty() {
            let fresh = self.sampler.sample(self.capacity)?;
            let mut pool = self.pool.write();
            if pool.is_empty() {
                pool.extend(fresh);
                debug!(len = pool.len(), "random pool filled");
            }
        } else {
            let fresh = self.sampler.sample(n.min(self.capacity))?;
            let mut pool = self.pool.write();
            let served = n.min(pool.len());
            pool.drain(..served);
            pool.extend(fresh);
        }

        self.refills.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn refill_pending(&self) {
        let n = self.pending.swap(0, Ordering::AcqRel);
        if n == 0 {
            return;
        }
        if let Err(e) = self.refill(n) {
            warn!(error = %e, "random pool refill failed, keeping stale pool");
        }
    }
}

/// Pool of pre-sampled random quotes. Requests are served from the head of
/// the pool and a background worker replaces what was served.
pub struct RandomQuoteCache {
    shared: Arc<CachePool>,
    max_random: usize,
    refill_tx: Option<Sender<RefillRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl RandomQuoteCache {
    pub fn new(sampler: Arc<dyn Sampler>, capacity: usize, max_random: usize) -> Result<Self> {
        let shared = Arc::new(CachePool {
            pool: RwLock::new(VecDeque::with_capacity(capacity)),
            refill_lock: Mutex::new(()),
            sampler,
            capacity,
            pending: AtomicUsize::new(0),
            pooled_serves: AtomicU64::new(0),
            direct_serves: AtomicU64::new(0),
            refills: AtomicU64::new(0),
        });

        // One slot: a queued wake-up already covers every later request.
        let (tx, rx) = channel::bounded::<RefillRequest>(1);
        let worker_pool = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("quote-pool-refill".to_string())
            .spawn(move || {
                for request in rx.iter() {
                    match request {
                        RefillRequest::Wake => worker_pool.refill_pending(),
                        RefillRequest::Barrier(done) => {
                            worker_pool.refill_pending();
                            let _ = done.send(());
                        }
                    }
                }
            })?;

        Ok(RandomQuoteCache {
            shared,
            max_random: max_random.max(1),
            refill_tx: Some(tx),
            worker: Some(worker),
        })
    }

    /// Exactly `n` random quotes, `n` clamped to `[1, max_random]`, unless
    /// the store is empty. Serves from the pool when it holds more than `n`
    /// quotes and samples the store directly otherwise. Either way a refill
    /// is requested and not waited for; requests made while one is running
    /// merge into a single refill.
    pub fn get_random(&self, n: usize) -> Result<Vec<Quote>> {
        let n = n.clamp(1, self.max_random);

        let pooled: Option<Vec<Quote>> = {
            let pool = self.shared.pool.read();
            if pool.len() > n {
                Some(pool.iter().take(n).cloned().collect())
            } else {
                None
            }
        };

        let quotes = match pooled {
            Some(quotes) => {
                self.shared.pooled_serves.fetch_add(1, Ordering::Relaxed);
                quotes
            }
            None => {
                let quotes = self.shared.sampler.sample(n)?;
                self.shared.direct_serves.fetch_add(1, Ordering::Relaxed);
                quotes
            }
        };

        if self.shared.pending.fetch_add(n, Ordering::AcqRel) == 0 {
            if let Some(tx) = &self.refill_tx {
                // Full means a wake-up is already queued.
                let _ = tx.try_send(RefillRequest::Wake);
            }
        }
        Ok(quotes)
    }

    /// Runs a refill on the calling thread.
    pub fn refill_now(&self, n: usize) -> Result<()> {
        self.shared.refill(n)
    }

    /// Fills an empty pool before the first request arrives.
    pub fn warm_up(&self) -> Result<()> {
        self.shared.refill(0)
    }

    /// Blocks until every refill requested so far has run.
    pub fn wait_for_refills(&self) {
        let (done_tx, done_rx) = channel::bounded(1);
        if let Some(tx) = &self.refill_tx {
            // Only fails once the worker has exited.
            if tx.send(RefillRequest::Barrier(done_tx)).is_ok() {
                let _ = done_rx.recv();
            }
        }
    }

    /// Empties the pool. The next request samples directly and starts a
    /// first fill.
    pub fn invalidate(&self) {
        let _guard = self.shared.refill_lock.lock();
        self.shared.pool.write().clear();
    }

    pub fn pool_len(&self) -> usize {
        self.shared.pool.read().len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            pool_len: self.pool_len(),
            capacity: self.shared.capacity,
            pooled_serves: self.shared.pooled_serves.load(Ordering::Relaxed),
            direct_serves: self.shared.direct_serves.load(Ordering::Relaxed),
            refills: self.shared.refills.load(Ordering::Relaxed),
        }
    }
}

impl Drop for RandomQuoteCache {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        drop(self.refill_tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
