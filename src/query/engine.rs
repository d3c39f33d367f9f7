use std::sync::atomic::{AtomicU64, Ordering};
use serde::{Serialize, Deserialize};
use tracing::{debug, warn};
use crate::analysis::normalizer::normalize;
use crate::core::error::Result;
use crate::core::types::{Quote, QuoteId};
use crate::index::word_index::{IdSet, IndexLookup, WordIndex};
use crate::storage::records::RecordStore;

/// Which tier answered a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuerySource {
    /// Whole-word match from the word index.
    IndexHit,
    /// Substring match from a scan of every stored quote.
    FallbackScan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub quotes: Vec<Quote>,
    pub source: QuerySource,
    /// The scan result was written to the index.
    pub learned: bool,
}

impl QueryOutcome {
    fn empty() -> Self {
        QueryOutcome {
            quotes: Vec::new(),
            source: QuerySource::IndexHit,
            learned: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub index_hits: u64,
    pub fallback_scans: u64,
    pub learned_terms: u64,
    pub errors: u64,
}

/// Two-tier term lookup: the word index first, then a full scan whose
/// non-empty result is promoted into the index.
pub struct QueryEngine {
    records: RecordStore,
    index: WordIndex,
    index_hits: AtomicU64,
    fallback_scans: AtomicU64,
    learned_terms: AtomicU64,
    errors: AtomicU64,
}

impl QueryEngine {
    pub fn new(records: RecordStore, index: WordIndex) -> Self {
        QueryEngine {
            records,
            index,
            index_hits: AtomicU64::new(0),
            fallback_scans: AtomicU64::new(0),
            learned_terms: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Quotes matching `term`. Store errors are logged and give an empty list.
    pub fn query_by_term(&self, term: &str) -> Vec<Quote> {
        match self.try_query_by_term(term) {
            Ok(outcome) => outcome.quotes,
            Err(e) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                warn!(term, error = %e, "query failed, returning no results");
                Vec::new()
            }
        }
    }

    pub fn try_query_by_term(&self, term: &str) -> Result<QueryOutcome> {
        let term = normalize(term);
        if term.is_empty() {
            return Ok(QueryOutcome::empty());
        }

        let generation = self.records.generation();
        let lookup = self.index.lookup(&term)?;
        let quotes = self.resolve(&term, &lookup);
        if !quotes.is_empty() {
            self.index_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(QueryOutcome {
                quotes,
                source: QuerySource::IndexHit,
                learned: false,
            });
        }

        let (quotes, discovered) = self.scan(&term);
        let learned = self.index.learn_on_miss(&term, &lookup, &discovered, generation)?;
        if learned {
            self.learned_terms.fetch_add(1, Ordering::Relaxed);
        }

        Ok(QueryOutcome {
            quotes,
            source: QuerySource::FallbackScan,
            learned,
        })
    }

    /// Resolves index ids to quotes. Ids with no stored quote are skipped,
    /// and so are quotes that do not contain `term`: a rebuild can reuse an
    /// id between the index read and the record read.
    fn resolve(&self, term: &str, lookup: &IndexLookup) -> Vec<Quote> {
        let ids = match lookup {
            IndexLookup::Hit(ids) => ids,
            IndexLookup::HitEmpty | IndexLookup::Miss => return Vec::new(),
        };

        let mut quotes = Vec::with_capacity(ids.len() as usize);
        for id in ids.iter().map(QuoteId) {
            match self.records.get(id) {
                Ok(Some(quote)) if matches_term(&quote, term) => quotes.push(quote),
                Ok(Some(_)) => debug!(id = id.value(), "indexed quote no longer matches"),
                Ok(None) => debug!(id = id.value(), "index points at a missing quote"),
                Err(e) => warn!(id = id.value(), error = %e, "skipping unreadable quote"),
            }
        }
        quotes
    }

    /// Substring match of `term` against every quote's normalized text and
    /// author.
    fn scan(&self, term: &str) -> (Vec<Quote>, IdSet) {
        self.fallback_scans.fetch_add(1, Ordering::Relaxed);
        debug!(term, "index miss, scanning all quotes");

        let mut quotes = Vec::new();
        let mut discovered = IdSet::new();
        for quote in self.records.scan_all() {
            let quote = match quote {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(error = %e, "skipping undecodable quote during scan");
                    continue;
                }
            };

            if matches_term(&quote, term) {
                discovered.insert(quote.id.value());
                quotes.push(quote);
            }
        }
        (quotes, discovered)
    }

    pub fn stats(&self) -> QueryStats {
        QueryStats {
            index_hits: self.index_hits.load(Ordering::Relaxed),
            fallback_scans: self.fallback_scans.load(Ordering::Relaxed),
            learned_terms: self.learned_terms.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

fn matches_term(quote: &Quote, term: &str) -> bool {
    normalize(&quote.text).contains(term) || normalize(&quote.author).contains(term)
}
