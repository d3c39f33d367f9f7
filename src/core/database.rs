use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::stats::{DatabaseStats, LoadReport, StoreStats};
use crate::core::types::{ImportRecord, Quote, QuoteId};
use crate::index::word_index::{WordIndex, INDEX_BUCKET};
use crate::interchange::{read_import_file, write_export, write_export_file};
use crate::query::engine::{QueryEngine, QueryOutcome};
use crate::query::random_cache::RandomQuoteCache;
use crate::query::sampler::RandomSampler;
use crate::storage::kv::KvStore;
use crate::storage::records::{RecordStore, DATA_BUCKET};
use crate::writer::bulk_loader::BulkLoader;
use crate::writer::progress::{LoadProgress, NoProgress};

/// One quote store file with its word index, query engine and random pool.
pub struct QuoteDatabase {
    config: Config,

    kv: Arc<KvStore>,
    records: RecordStore,
    index: WordIndex,

    loader: BulkLoader,
    engine: Arc<QueryEngine>,
    random: Arc<RandomQuoteCache>,
}

impl QuoteDatabase {
    /// Opens or creates the store at `config.storage_path`. Fails with
    /// `StoreUnavailable` when the file cannot be opened or is locked by
    /// another handle.
    pub fn open(config: Config) -> Result<Self> {
        let kv = Arc::new(KvStore::open(&config.storage_path, config.sync_mode)?);
        kv.update(|tx| {
            tx.create_bucket_if_missing(DATA_BUCKET);
            tx.create_bucket_if_missing(INDEX_BUCKET);
            Ok(())
        })?;

        let records = RecordStore::new(kv.clone());
        let index = WordIndex::new(kv.clone());
        let engine = Arc::new(QueryEngine::new(records.clone(), index.clone()));

        let sampler = Arc::new(RandomSampler::new(
            records.clone(),
            config.sampling,
            config.rejection_attempts,
        ));
        let random = Arc::new(RandomQuoteCache::new(
            sampler,
            config.pool_capacity,
            config.max_random,
        )?);

        info!(
            path = %config.storage_path.display(),
            quotes = records.len(),
            words = index.len(),
            "quote database ready"
        );

        Ok(QuoteDatabase {
            loader: BulkLoader::from_config(&config),
            config,
            kv,
            records,
            index,
            engine,
            random,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn load(&self, records: Vec<ImportRecord>) -> Result<LoadReport> {
        self.load_with_progress(records, &NoProgress)
    }

    pub fn load_with_progress(
        &self,
        records: Vec<ImportRecord>,
        progress: &dyn LoadProgress,
    ) -> Result<LoadReport> {
        self.loader.load(&self.kv, records, progress)
    }

    /// Replaces the whole store with `records` and compacts the file.
    pub fn rebuild(&self, records: Vec<ImportRecord>) -> Result<LoadReport> {
        let report = self.loader.rebuild(&self.kv, records, &NoProgress)?;
        self.kv.compact()?;
        self.random.invalidate();
        Ok(report)
    }

    /// Loads a JSON import file. A file that does not parse commits nothing.
    pub fn import_file(&self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let records = read_import_file(path)?;
        self.load(records)
    }

    /// Every stored quote in ascending id order.
    pub fn dump(&self) -> Result<Vec<Quote>> {
        self.records.scan_all().collect()
    }

    pub fn dump_to<W: Write>(&self, writer: W) -> Result<()> {
        write_export(writer, self.dump()?)
    }

    pub fn dump_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        write_export_file(path, self.dump()?)
    }

    pub fn get(&self, id: QuoteId) -> Result<Option<Quote>> {
        self.records.get(id)
    }

    pub fn query_by_term(&self, term: &str) -> Vec<Quote> {
        self.engine.query_by_term(term)
    }

    pub fn try_query_by_term(&self, term: &str) -> Result<QueryOutcome> {
        self.engine.try_query_by_term(term)
    }

    /// `n` random quotes, `n` clamped to `[1, max_random]`. Errors give an
    /// empty list.
    pub fn query_random(&self, n: usize) -> Vec<Quote> {
        match self.random.get_random(n) {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!(n, error = %e, "random query failed, returning no results");
                Vec::new()
            }
        }
    }

    /// Fills the random pool now instead of on the first request.
    pub fn warm_up_random(&self) -> Result<()> {
        self.random.warm_up()
    }

    /// Shared handle for request threads.
    pub fn engine(&self) -> Arc<QueryEngine> {
        Arc::clone(&self.engine)
    }

    pub fn random_cache(&self) -> Arc<RandomQuoteCache> {
        Arc::clone(&self.random)
    }

    pub fn store_stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            records: self.records.len(),
            index_entries: self.index.len(),
            max_id: self.records.max_id()?.value(),
            file_bytes: self.kv.file_size(),
        })
    }

    pub fn stats(&self) -> Result<DatabaseStats> {
        Ok(DatabaseStats {
            store: self.store_stats()?,
            queries: self.engine.stats(),
            cache: self.random.stats(),
        })
    }

    pub fn sync(&self) -> Result<()> {
        self.kv.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SyncMode;

    fn open(dir: &tempfile::TempDir) -> QuoteDatabase {
        let config = Config::new(dir.path().join("quotes.db"))
            .with_sync_mode(SyncMode::None)
            .with_pool_capacity(50);
        QuoteDatabase::open(config).unwrap()
    }

    #[test]
    fn fresh_store_is_empty_but_usable() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);

        assert!(db.query_by_term("anything").is_empty());
        assert!(db.query_random(5).is_empty());
        assert!(db.dump().unwrap().is_empty());
        let stats = db.store_stats().unwrap();
        assert_eq!(stats.records, 0);
        assert_eq!(stats.max_id, 0);
    }

    #[test]
    fn rebuild_compacts_and_resets_pool() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let many: Vec<ImportRecord> = (0..100)
            .map(|i| ImportRecord::new("Anon", format!("Quote number {}.", i)))
            .collect();
        db.load(many).unwrap();
        db.warm_up_random().unwrap();
        let before = db.store_stats().unwrap().file_bytes;

        let report = db.rebuild(vec![ImportRecord::new("Solo", "Only one left.")]).unwrap();
        assert_eq!(report.accepted, 1);
        assert!(db.store_stats().unwrap().file_bytes < before);
        assert_eq!(db.random_cache().pool_len(), 0);
        assert_eq!(db.query_random(3).iter().map(|q| q.id).collect::<Vec<_>>(), vec![QuoteId(1); 3]);
    }

    #[test]
    fn stats_roll_up() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        db.load(vec![ImportRecord::new("Plato", "Know thyself.")]).unwrap();
        db.query_by_term("thyself");
        db.query_by_term("hysel");

        let stats = db.stats().unwrap();
        assert_eq!(stats.store.records, 1);
        assert_eq!(stats.store.max_id, 1);
        assert_eq!(stats.queries.index_hits, 1);
        assert_eq!(stats.queries.fallback_scans, 1);
        assert_eq!(stats.queries.learned_terms, 1);
        assert_eq!(stats.cache.capacity, 50);
    }
}
