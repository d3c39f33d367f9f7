use rand::Rng;
use crate::core::config::Sampling;
use crate::core::error::Result;
use crate::core::types::{Quote, QuoteId};
use crate::storage::records::RecordStore;

/// Source of random quotes for the random cache.
pub trait Sampler: Send + Sync {
    /// `n` quotes drawn independently; the same quote may appear twice.
    /// Returns an empty list when the store holds no quotes.
    fn sample(&self, n: usize) -> Result<Vec<Quote>>;
}

pub struct RandomSampler {
    records: RecordStore,
    sampling: Sampling,
    rejection_attempts: usize,
}

impl RandomSampler {
    pub fn new(records: RecordStore, sampling: Sampling, rejection_attempts: usize) -> Self {
        RandomSampler {
            records,
            sampling,
            rejection_attempts,
        }
    }

    /// First quote at or after a random start below `max_id`. Wraps to the
    /// lowest id when nothing is stored past the start, which happens when
    /// the store shrank after `max_id` was read. `None` only for an empty
    /// store.
    fn seek_forward<R: Rng>(&self, rng: &mut R, max_id: u64) -> Result<Option<Quote>> {
        let start = rng.gen_range(0..max_id);
        match self.records.seek(QuoteId(start))? {
            Some(quote) => Ok(Some(quote)),
            None => self.records.first(),
        }
    }

    fn rejection<R: Rng>(&self, rng: &mut R, max_id: u64) -> Result<Option<Quote>> {
        for _ in 0..self.rejection_attempts {
            let id = rng.gen_range(1..=max_id);
            if let Some(quote) = self.records.get(QuoteId(id))? {
                return Ok(Some(quote));
            }
        }
        self.seek_forward(rng, max_id)
    }
}

impl Sampler for RandomSampler {
    fn sample(&self, n: usize) -> Result<Vec<Quote>> {
        let max_id = self.records.max_id()?.value();
        if max_id == 0 {
            return Ok(Vec::new());
        }

        let mut rng = rand::thread_rng();
        let mut quotes = Vec::with_capacity(n);
        for _ in 0..n {
            let quote = match self.sampling {
                Sampling::SeekForward => self.seek_forward(&mut rng, max_id)?,
                Sampling::Rejection => self.rejection(&mut rng, max_id)?,
            };
            match quote {
                Some(quote) => quotes.push(quote),
                None => break,
            }
        }
        Ok(quotes)
    }
}
