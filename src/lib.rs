pub mod core;
pub mod storage;
pub mod analysis;
pub mod index;
pub mod query;
pub mod writer;
pub mod interchange;

pub use crate::core::config::{Config, Sampling, SyncMode};
pub use crate::core::database::QuoteDatabase;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::stats::{DatabaseStats, LoadReport, StoreStats};
pub use crate::core::types::{ImportRecord, Quote, QuoteId};
pub use crate::query::engine::{QueryOutcome, QuerySource};

/*
┌──────────────────────────────────────────────────────────────────────────────┐
│                           QUOTEDB STRUCT ARCHITECTURE                        │
└──────────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────────── CORE LAYER ─────────────────────────────────┐
│  ┌────────────────────────────────────────────────────────────────────────┐  │
│  │                         struct QuoteDatabase                           │  │
│  │ config: Config                      // path, sync, limits, sampling    │  │
│  │ kv: Arc<KvStore>                    // single-file store               │  │
│  │ records: RecordStore                // "data" bucket                   │  │
│  │ index: WordIndex                    // "index" bucket                  │  │
│  │ loader: BulkLoader                  // dedup + id assignment + words   │  │
│  │ engine: Arc<QueryEngine>            // index tier, then fallback scan  │  │
│  │ random: Arc<RandomQuoteCache>       // pool + refill worker            │  │
│  └────────────────────────────────────────────────────────────────────────┘  │
└──────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────── STORAGE LAYER ────────────────────────────────┐
│  ┌─────────────────────────┐  ┌──────────────────────────────────────────┐   │
│  │ struct KvStore          │  │ struct StoreLog                          │   │
│  │ • state: RwLock<..>     │  │ • magic "QUOTEDB\0"                      │   │
│  │   bucket -> BTreeMap    │  │ • frames [len][crc32][bincode batch]     │   │
│  │ • update(|tx| ..)       │──│ • append / sync / rewrite (compact)      │   │
│  │ • cursor: first/last/   │  │ • _lock: FileLock (flock, exclusive)     │   │
│  │   next/prev/seek        │  └──────────────────────────────────────────┘   │
│  └─────────────────────────┘                                                 │
│  ┌─────────────────────────┐  ┌──────────────────────────────────────────┐   │
│  │ struct RecordStore      │  │ struct WordIndex                         │   │
│  │ key: u64 big-endian     │  │ key: normalized word                     │   │
│  │ value: bincode Quote    │  │ value: RoaringTreemap of ids             │   │
│  │ get/put/seek/max_id/    │  │ lookup -> Hit | HitEmpty | Miss          │   │
│  │ next_id_in/scan_all     │  │ put / learn_on_miss                      │   │
│  └─────────────────────────┘  └──────────────────────────────────────────┘   │
└──────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────── ANALYSIS LAYER ───────────────────────────────┐
│  normalize(): runs of spaces and ?!.;,* -> one space, trim, lowercase;       │
│               tabs and newlines pass through unchanged                       │
│  Analyzer "quote_words" = NormalizingTokenizer + StopWordFilter              │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── QUERY LAYER ─────────────────────────────────┐
│  QueryEngine::try_query_by_term                                              │
│    normalize(term) ──► WordIndex::lookup ──► resolve ids ──► non-empty? done │
│                                   │                                          │
│                                   └──► scan_all substring match ──► learn    │
│                                                                              │
│  RandomQuoteCache::get_random(n)                                             │
│    pool.len() > n ? serve head : Sampler::sample(n)                          │
│    then pending += n, Wake ──► bounded(1) channel ──► worker thread          │
│                         take pending, drop it from head, append fresh        │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── WRITE LAYER ─────────────────────────────────┐
│  BulkLoader::load                                                            │
│    rayon: normalize + blake3 + words (ordered)                               │
│    one KvStore::update:                                                      │
│      skip oversized, skip duplicate hash, next_id_in, put_in                 │
│      accumulate word -> ids, merge stored set, WordIndex::put_in             │
│    LoadProgress hooks: on_record / on_index_entry                            │
└──────────────────────────────────────────────────────────────────────────────┘
*/
