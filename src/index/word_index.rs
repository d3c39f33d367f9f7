use std::sync::Arc;
use roaring::RoaringTreemap;
use tracing::debug;
use crate::core::error::{Error, Result};
use crate::core::types::QuoteId;
use crate::storage::kv::{KvStore, WriteTx};
use crate::storage::records::DATA_BUCKET;

/// Bucket holding `normalized word -> id set`.
pub const INDEX_BUCKET: &str = "index";

/// Set of quote ids stored under one word.
pub type IdSet = RoaringTreemap;

/// Result of a point lookup. An entry that exists but holds no ids is
/// kept apart from a missing entry so negative results are never mistaken
/// for cached ones.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexLookup {
    Hit(IdSet),
    HitEmpty,
    Miss,
}

impl IndexLookup {
    pub fn ids(&self) -> Vec<QuoteId> {
        match self {
            IndexLookup::Hit(ids) => ids.iter().map(QuoteId).collect(),
            IndexLookup::HitEmpty | IndexLookup::Miss => Vec::new(),
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, IndexLookup::Miss)
    }

    fn from_entry(ids: Option<IdSet>) -> Self {
        match ids {
            None => IndexLookup::Miss,
            Some(ids) if ids.is_empty() => IndexLookup::HitEmpty,
            Some(ids) => IndexLookup::Hit(ids),
        }
    }
}

pub fn encode_ids(ids: &IdSet) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(ids.serialized_size());
    ids.serialize_into(&mut buf)?;
    Ok(buf)
}

pub fn decode_ids(bytes: &[u8]) -> Result<IdSet> {
    RoaringTreemap::deserialize_from(bytes)
        .map_err(|e| Error::corruption(format!("bad id set: {}", e)))
}

/// Durable word -> quote ids mapping. It is a cache over the record store:
/// it may lack words, but every id it holds under a word belongs to a quote
/// whose normalized text or author contains that word.
#[derive(Clone)]
pub struct WordIndex {
    kv: Arc<KvStore>,
}

impl WordIndex {
    pub fn new(kv: Arc<KvStore>) -> Self {
        WordIndex { kv }
    }

    pub fn lookup(&self, word: &str) -> Result<IndexLookup> {
        let ids = self.kv
            .get(INDEX_BUCKET, word.as_bytes())
            .map(|bytes| decode_ids(&bytes))
            .transpose()?;
        Ok(IndexLookup::from_entry(ids))
    }

    /// Replaces the entry for `word`.
    pub fn put(&self, word: &str, ids: &IdSet) -> Result<()> {
        self.kv.update(|tx| Self::put_in(tx, word, ids))
    }

    pub fn put_in(tx: &mut WriteTx<'_>, word: &str, ids: &IdSet) -> Result<()> {
        tx.put(INDEX_BUCKET, word.as_bytes(), encode_ids(ids)?)
    }

    pub fn get_in(tx: &WriteTx<'_>, word: &str) -> Result<Option<IdSet>> {
        tx.get(INDEX_BUCKET, word.as_bytes())
            .map(|bytes| decode_ids(&bytes))
            .transpose()
    }

    /// Promotes the result of a full-store scan into the index. `seen` is
    /// the entry the query found before scanning and `generation` the data
    /// generation the scan started under.
    ///
    /// Nothing is written for an empty result, so unmatched words stay
    /// misses and keep being scanned for. Nothing is written either when the
    /// entry changed since `seen` or the store was rebuilt since
    /// `generation`; check and write share one transaction. Returns whether
    /// an entry was written.
    pub fn learn_on_miss(
        &self,
        word: &str,
        seen: &IndexLookup,
        discovered: &IdSet,
        generation: u64,
    ) -> Result<bool> {
        if discovered.is_empty() || word.is_empty() {
            return Ok(false);
        }

        let learned = self.kv.update(|tx| {
            if tx.generation(DATA_BUCKET) != generation {
                return Ok(false);
            }
            if IndexLookup::from_entry(Self::get_in(tx, word)?) != *seen {
                return Ok(false);
            }
            Self::put_in(tx, word, discovered)?;
            Ok(true)
        })?;

        if learned {
            debug!(word, ids = discovered.len(), "learned index entry");
        } else {
            debug!(word, "store changed during scan, not learning");
        }
        Ok(learned)
    }

    pub fn len(&self) -> usize {
        self.kv.bucket_len(INDEX_BUCKET)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
