use std::sync::Arc;
use crate::core::error::{Error, Result};
use crate::core::types::{Quote, QuoteId};
use crate::storage::kv::{Cursor, KvStore, WriteTx};

/// Bucket holding `id -> Quote`.
pub const DATA_BUCKET: &str = "data";

/// Durable `QuoteId -> Quote` mapping, ordered by id.
#[derive(Clone)]
pub struct RecordStore {
    kv: Arc<KvStore>,
}

impl RecordStore {
    pub fn new(kv: Arc<KvStore>) -> Self {
        RecordStore { kv }
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Quote> {
        let quote: Quote = bincode::deserialize(value)?;
        match QuoteId::from_key(key) {
            Some(id) if id == quote.id => Ok(quote),
            _ => Err(Error::corruption(format!(
                "record key {:?} does not match quote id {}", key, quote.id.value()
            ))),
        }
    }

    pub fn get(&self, id: QuoteId) -> Result<Option<Quote>> {
        match self.kv.get(DATA_BUCKET, &id.to_key()) {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Single-record durable write.
    pub fn put(&self, quote: &Quote) -> Result<()> {
        self.kv.update(|tx| Self::put_in(tx, quote))
    }

    pub fn put_in(tx: &mut WriteTx<'_>, quote: &Quote) -> Result<()> {
        let value = bincode::serialize(quote)?;
        tx.put(DATA_BUCKET, &quote.id.to_key(), value)
    }

    /// Next id of the data bucket's sequence. Never hands out the same
    /// value twice, even within one transaction.
    pub fn next_id_in(tx: &mut WriteTx<'_>) -> Result<QuoteId> {
        Ok(QuoteId(tx.next_sequence(DATA_BUCKET)?))
    }

    /// Largest stored id, or 0 when the store is empty.
    pub fn max_id(&self) -> Result<QuoteId> {
        match self.kv.cursor(DATA_BUCKET).last() {
            Some((key, _)) => QuoteId::from_key(&key)
                .ok_or_else(|| Error::corruption(format!("bad record key {:?}", key))),
            None => Ok(QuoteId(0)),
        }
    }

    /// First quote whose id is at or after `from`.
    pub fn seek(&self, from: QuoteId) -> Result<Option<Quote>> {
        match self.kv.cursor(DATA_BUCKET).seek(&from.to_key()) {
            Some((key, value)) => Ok(Some(Self::decode(&key, &value)?)),
            None => Ok(None),
        }
    }

    /// Lowest-id quote, if any.
    pub fn first(&self) -> Result<Option<Quote>> {
        match self.kv.cursor(DATA_BUCKET).first() {
            Some((key, value)) => Ok(Some(Self::decode(&key, &value)?)),
            None => Ok(None),
        }
    }

    /// Changes whenever the store is rebuilt, so ids read before and after
    /// can be told apart.
    pub fn generation(&self) -> u64 {
        self.kv.generation(DATA_BUCKET)
    }

    /// Lazy ascending scan. Each call starts a fresh cursor.
    pub fn scan_all(&self) -> RecordScan<'_> {
        RecordScan {
            cursor: self.kv.cursor(DATA_BUCKET),
        }
    }

    pub fn len(&self) -> usize {
        self.kv.bucket_len(DATA_BUCKET)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct RecordScan<'a> {
    cursor: Cursor<'a>,
}

impl<'a> Iterator for RecordScan<'a> {
    type Item = Result<Quote>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.cursor.next()?;
        Some(RecordStore::decode(&key, &value))
    }
}
