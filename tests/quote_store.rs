use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use quotedb::analysis::normalizer::normalize;
use quotedb::{
    Config, ErrorKind, ImportRecord, Quote, QuoteDatabase, QuoteId, QuerySource, Sampling, SyncMode,
};

fn config(dir: &tempfile::TempDir) -> Config {
    Config::new(dir.path().join("quotations.db"))
        .with_sync_mode(SyncMode::None)
        .with_pool_capacity(200)
}

fn corpus() -> Vec<ImportRecord> {
    vec![
        ImportRecord::new("Plato", "The unexamined life is not worth living."),
        ImportRecord::new("Seneca", "Luck is what happens when preparation meets opportunity."),
        ImportRecord::new("Marcus Aurelius", "The happiness of your life depends upon the quality of your thoughts."),
        ImportRecord::new("Lao Tzu", "A journey of a thousand miles begins with a single step."),
        ImportRecord::new("Epictetus", "It's not what happens to you, but how you react to it that matters."),
        ImportRecord::new("Confucius", "It does not matter how slowly you go as long as you do not stop."),
    ]
}

fn sorted_ids(quotes: &[Quote]) -> Vec<QuoteId> {
    let mut ids: Vec<QuoteId> = quotes.iter().map(|q| q.id).collect();
    ids.sort();
    ids
}

#[test]
fn duplicate_plato_is_stored_once_and_found_by_author() {
    let dir = tempfile::tempdir().unwrap();
    let db = QuoteDatabase::open(config(&dir)).unwrap();

    let report = db.load(vec![
        ImportRecord::new("Plato", "The unexamined life is not worth living."),
        ImportRecord::new("Plato", "The unexamined life is not worth living."),
    ]).unwrap();
    assert_eq!(report.accepted, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(db.dump().unwrap().len(), 1);

    let by_word = db.try_query_by_term("unexamined").unwrap();
    assert_eq!(by_word.source, QuerySource::IndexHit);
    assert_eq!(sorted_ids(&by_word.quotes), vec![QuoteId(1)]);

    let by_author = db.try_query_by_term("plato").unwrap();
    assert_eq!(by_author.source, QuerySource::IndexHit);
    assert_eq!(sorted_ids(&by_author.quotes), vec![QuoteId(1)]);
}

#[test]
fn absent_word_is_rescanned_every_time() {
    let dir = tempfile::tempdir().unwrap();
    let db = QuoteDatabase::open(config(&dir)).unwrap();
    db.load(corpus()).unwrap();
    let words_before = db.store_stats().unwrap().index_entries;

    assert!(db.query_by_term("zzzznotaword").is_empty());
    assert!(db.query_by_term("zzzznotaword").is_empty());

    let stats = db.stats().unwrap();
    assert_eq!(stats.queries.fallback_scans, 2);
    assert_eq!(stats.queries.learned_terms, 0);
    assert_eq!(stats.store.index_entries, words_before);
}

#[test]
fn fallback_result_is_learned_as_superset() {
    let dir = tempfile::tempdir().unwrap();
    let db = QuoteDatabase::open(config(&dir)).unwrap();
    db.load(corpus()).unwrap();

    // "happen" is only a substring of indexed words.
    let first = db.try_query_by_term("happen").unwrap();
    assert_eq!(first.source, QuerySource::FallbackScan);
    assert!(first.learned);
    assert_eq!(first.quotes.len(), 2);

    let again = db.try_query_by_term("happen").unwrap();
    assert_eq!(again.source, QuerySource::IndexHit);
    let first_ids: HashSet<QuoteId> = first.quotes.iter().map(|q| q.id).collect();
    let again_ids: HashSet<QuoteId> = again.quotes.iter().map(|q| q.id).collect();
    assert!(again_ids.is_superset(&first_ids));
}

#[test]
fn stop_words_are_not_indexed_but_still_found() {
    let dir = tempfile::tempdir().unwrap();
    let db = QuoteDatabase::open(config(&dir)).unwrap();
    db.load(corpus()).unwrap();

    let outcome = db.try_query_by_term("the").unwrap();
    assert_eq!(outcome.source, QuerySource::FallbackScan);
    assert!(!outcome.quotes.is_empty());
    assert!(outcome.quotes.iter().all(|q| normalize(&q.text).contains("the")
        || normalize(&q.author).contains("the")));
}

#[test]
fn long_quotes_never_stored() {
    let dir = tempfile::tempdir().unwrap();
    let db = QuoteDatabase::open(config(&dir)).unwrap();

    let mut records = corpus();
    records.push(ImportRecord::new("Rambler", "blah ".repeat(61)));
    let report = db.load(records).unwrap();
    assert_eq!(report.oversized, 1);

    for quote in db.dump().unwrap() {
        assert!(normalize(&quote.text).chars().count() <= 300);
        assert_ne!(quote.author, "Rambler");
    }
}

#[test]
fn normalized_texts_are_unique() {
    let dir = tempfile::tempdir().unwrap();
    let db = QuoteDatabase::open(config(&dir)).unwrap();

    let mut records = corpus();
    records.extend(corpus().into_iter().map(|r| ImportRecord::new(r.author, r.text.to_uppercase())));
    records.push(ImportRecord::new("Plato", "the unexamined life, is not worth living!!"));
    db.load(records).unwrap();

    let quotes = db.dump().unwrap();
    let normalized: HashSet<String> = quotes.iter().map(|q| normalize(&q.text)).collect();
    assert_eq!(normalized.len(), quotes.len());
    assert_eq!(quotes.len(), corpus().len());
}

#[test]
fn random_count_is_exact_and_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let db = QuoteDatabase::open(config(&dir)).unwrap();
    db.load(corpus()).unwrap();

    // Direct sampling before the pool exists, pooled serving after.
    for _ in 0..2 {
        for n in [1usize, 2, 7, 50] {
            assert_eq!(db.query_random(n).len(), n);
        }
        assert_eq!(db.query_random(0).len(), 1);
        assert_eq!(db.query_random(51).len(), 50);
        assert_eq!(db.query_random(10_000).len(), 50);
        db.random_cache().wait_for_refills();
    }
    assert!(db.stats().unwrap().cache.pooled_serves > 0);
}

#[test]
fn rejection_sampling_yields_stored_quotes() {
    let dir = tempfile::tempdir().unwrap();
    let db = QuoteDatabase::open(config(&dir).with_sampling(Sampling::Rejection)).unwrap();
    db.load(corpus()).unwrap();

    let stored: HashSet<QuoteId> = db.dump().unwrap().iter().map(|q| q.id).collect();
    let sample = db.query_random(20);
    assert_eq!(sample.len(), 20);
    assert!(sample.iter().all(|q| stored.contains(&q.id)));
}

#[test]
fn dump_and_reload_keeps_record_set() {
    let dir = tempfile::tempdir().unwrap();
    let db = QuoteDatabase::open(config(&dir)).unwrap();
    db.load(corpus()).unwrap();
    let export = dir.path().join("dump.json");
    db.dump_to_file(&export).unwrap();

    let other_dir = tempfile::tempdir().unwrap();
    let copy = QuoteDatabase::open(config(&other_dir)).unwrap();
    copy.import_file(&export).unwrap();

    let pairs = |quotes: Vec<Quote>| -> HashSet<(String, String)> {
        quotes.into_iter().map(|q| (q.author, q.text)).collect()
    };
    assert_eq!(pairs(db.dump().unwrap()), pairs(copy.dump().unwrap()));

    let mut first = Vec::new();
    let mut second = Vec::new();
    db.dump_to(&mut first).unwrap();
    copy.dump_to(&mut second).unwrap();
    assert_eq!(first, second);
}

#[test]
fn malformed_import_commits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let db = QuoteDatabase::open(config(&dir)).unwrap();
    db.load(corpus()).unwrap();
    let before = db.store_stats().unwrap();

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, r#"[{"author": "A", "text": "fine"}, {"author": "B", "text": "#).unwrap();
    let err = db.import_file(&bad).unwrap_err();
    assert!(err.is(ErrorKind::MalformedImport));

    assert_eq!(db.store_stats().unwrap(), before);
}

#[test]
fn store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let db = QuoteDatabase::open(config(&dir)).unwrap();
        db.load(corpus()).unwrap();
        assert_eq!(db.query_by_term("ourne").len(), 1);
    }

    let db = QuoteDatabase::open(config(&dir)).unwrap();
    assert_eq!(db.dump().unwrap().len(), corpus().len());
    assert_eq!(db.get(QuoteId(1)).unwrap().unwrap().author, "Plato");

    // The learned entry was persisted.
    let outcome = db.try_query_by_term("ourne").unwrap();
    assert_eq!(outcome.source, QuerySource::IndexHit);

    // Ids continue after the stored ones.
    db.load(vec![ImportRecord::new("New", "A brand new quote.")]).unwrap();
    assert_eq!(db.store_stats().unwrap().max_id, corpus().len() as u64 + 1);
}

#[cfg(unix)]
#[test]
fn second_handle_on_same_file_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let _db = QuoteDatabase::open(config(&dir)).unwrap();

    let err = QuoteDatabase::open(config(&dir)).err().unwrap();
    assert!(err.is(ErrorKind::StoreUnavailable));
}

#[test]
fn concurrent_queries_and_random_requests() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(QuoteDatabase::open(config(&dir)).unwrap());
    db.load(corpus()).unwrap();

    let terms = ["life", "happen", "journey", "zzzz", "matter", "plato", "step"];
    let handles: Vec<_> = (0..6)
        .map(|worker| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for round in 0..30 {
                    let term = terms[(worker + round) % terms.len()];
                    let quotes = db.query_by_term(term);
                    assert!(quotes.iter().all(|q| normalize(&q.text).contains(term)
                        || normalize(&q.author).contains(term)));
                    assert_eq!(db.query_random(5).len(), 5);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = db.stats().unwrap();
    assert_eq!(stats.queries.errors, 0);
    assert_eq!(stats.store.records, corpus().len());
}

fn numbered(count: usize, text: &str) -> Vec<ImportRecord> {
    (0..count)
        .map(|i| ImportRecord::new(format!("Author {}", i), format!("{} number {}.", text, i)))
        .collect()
}

#[test]
fn queries_racing_rebuilds_only_return_matching_quotes() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(QuoteDatabase::open(config(&dir)).unwrap());
    let brave = numbered(40, "Courage is grace under pressure");
    let plain = numbered(40, "Nothing much here");
    db.load(brave.clone()).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let rebuilder = {
        let (db, stop) = (Arc::clone(&db), Arc::clone(&stop));
        let (brave, plain) = (brave.clone(), plain.clone());
        thread::spawn(move || {
            for round in 0..40 {
                let records = if round % 2 == 0 { plain.clone() } else { brave.clone() };
                db.rebuild(records).unwrap();
            }
            stop.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let (db, stop) = (Arc::clone(&db), Arc::clone(&stop));
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    for term in ["ourag", "courage", "grace"] {
                        let quotes = db.query_by_term(term);
                        assert!(quotes.iter().all(|q| normalize(&q.text).contains(term)));
                    }
                }
            })
        })
        .collect();

    rebuilder.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    db.rebuild(plain).unwrap();
    for term in ["ourag", "courage", "grace"] {
        assert!(db.query_by_term(term).is_empty(), "{} survived the rebuild", term);
    }
    assert_eq!(db.stats().unwrap().queries.errors, 0);
}

#[test]
fn random_count_holds_while_the_store_shrinks() {
    let dir = tempfile::tempdir().unwrap();
    // No pool, so every request samples the store.
    let db = Arc::new(QuoteDatabase::open(config(&dir).with_pool_capacity(0)).unwrap());
    let many = numbered(200, "Many");
    let one = numbered(1, "Lonely");
    db.load(many.clone()).unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let rebuilder = {
        let (db, stop) = (Arc::clone(&db), Arc::clone(&stop));
        thread::spawn(move || {
            for round in 0..40 {
                let records = if round % 2 == 0 { one.clone() } else { many.clone() };
                db.rebuild(records).unwrap();
            }
            stop.store(true, Ordering::SeqCst);
        })
    };

    let sampler = {
        let (db, stop) = (Arc::clone(&db), Arc::clone(&stop));
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                assert_eq!(db.query_random(5).len(), 5);
            }
        })
    };

    rebuilder.join().unwrap();
    sampler.join().unwrap();
}
