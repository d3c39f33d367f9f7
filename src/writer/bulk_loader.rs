use std::collections::{BTreeMap, HashSet};
use rayon::prelude::*;
use tracing::info;
use crate::analysis::analyzer::Analyzer;
use crate::analysis::normalizer::normalize;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::stats::LoadReport;
use crate::core::types::{ImportRecord, Quote};
use crate::index::word_index::{IdSet, WordIndex, INDEX_BUCKET};
use crate::storage::kv::{KvStore, WriteTx};
use crate::storage::records::{RecordStore, DATA_BUCKET};
use crate::writer::progress::LoadProgress;

/// An import record after the order-independent work is done.
struct PreparedRecord {
    author: String,
    text: String,
    content_hash: [u8; 32],
    oversized: bool,
    words: Vec<String>,
    author_key: String,
}

/// Turns an ordered list of import records into stored quotes plus the
/// word index, inside a single write transaction.
pub struct BulkLoader {
    analyzer: Analyzer,
    max_text_chars: usize,
}

impl BulkLoader {
    pub fn new(max_text_chars: usize) -> Self {
        BulkLoader {
            analyzer: Analyzer::quote_words(),
            max_text_chars,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        BulkLoader::new(config.max_text_chars)
    }

    /// Appends `records` to the store. Ids continue from the data bucket's
    /// sequence and existing index entries keep their ids.
    pub fn load(
        &self,
        kv: &KvStore,
        records: Vec<ImportRecord>,
        progress: &dyn LoadProgress,
    ) -> Result<LoadReport> {
        info!(records = records.len(), "loading quotes");
        let prepared = self.prepare(records);

        let report = kv.update(|tx| self.load_in(tx, &prepared, progress))?;
        info!(?report, "load finished");
        Ok(report)
    }

    /// Drops every quote and index entry, restarts ids at 1 and loads
    /// `records`, all in one transaction.
    pub fn rebuild(
        &self,
        kv: &KvStore,
        records: Vec<ImportRecord>,
        progress: &dyn LoadProgress,
    ) -> Result<LoadReport> {
        info!(records = records.len(), "rebuilding store");
        let prepared = self.prepare(records);

        let report = kv.update(|tx| {
            tx.create_bucket_if_missing(DATA_BUCKET);
            tx.create_bucket_if_missing(INDEX_BUCKET);
            tx.clear_bucket(DATA_BUCKET)?;
            tx.clear_bucket(INDEX_BUCKET)?;
            tx.set_sequence(DATA_BUCKET, 0)?;
            self.load_in(tx, &prepared, progress)
        })?;
        info!(?report, "rebuild finished");
        Ok(report)
    }

    /// Normalization, hashing and word extraction. Runs in parallel and
    /// keeps input order.
    fn prepare(&self, records: Vec<ImportRecord>) -> Vec<PreparedRecord> {
        records
            .into_par_iter()
            .map(|record| {
                let normalized = normalize(&record.text);
                let oversized = normalized.chars().count() > self.max_text_chars;
                let content_hash = *blake3::hash(normalized.as_bytes()).as_bytes();

                let words = if oversized {
                    Vec::new()
                } else {
                    self.analyzer.analyze(&record.text)
                };

                PreparedRecord {
                    author_key: normalize(&record.author),
                    author: record.author.trim().to_string(),
                    text: record.text.trim().to_string(),
                    content_hash,
                    oversized,
                    words,
                }
            })
            .collect()
    }

    fn load_in(
        &self,
        tx: &mut WriteTx<'_>,
        prepared: &[PreparedRecord],
        progress: &dyn LoadProgress,
    ) -> Result<LoadReport> {
        tx.create_bucket_if_missing(DATA_BUCKET);
        tx.create_bucket_if_missing(INDEX_BUCKET);

        let total = prepared.len();
        let mut report = LoadReport {
            total,
            ..LoadReport::default()
        };

        let mut seen: HashSet<[u8; 32]> = HashSet::with_capacity(total);
        let mut postings: BTreeMap<String, IdSet> = BTreeMap::new();

        for (i, record) in prepared.iter().enumerate() {
            progress.on_record(i + 1, total);

            if record.oversized {
                report.oversized += 1;
                continue;
            }
            if !seen.insert(record.content_hash) {
                report.duplicates += 1;
                continue;
            }

            let id = RecordStore::next_id_in(tx)?;
            let quote = Quote::new(id, record.text.clone(), record.author.clone());
            RecordStore::put_in(tx, &quote)?;
            report.accepted += 1;

            for word in &record.words {
                postings.entry(word.clone()).or_default().insert(id.value());
            }

            // Authors are indexed whole, stop word or not.
            if !record.author_key.is_empty() {
                postings.entry(record.author_key.clone()).or_default().insert(id.value());
            }
        }

        let entries = postings.len();
        for (i, (word, mut ids)) in postings.into_iter().enumerate() {
            if let Some(existing) = WordIndex::get_in(tx, &word)? {
                ids |= existing;
            }
            WordIndex::put_in(tx, &word, &ids)?;
            progress.on_index_entry(i + 1, entries);
        }
        report.index_entries = entries;

        Ok(report)
    }
}
