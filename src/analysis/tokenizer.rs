use crate::analysis::normalizer::normalize;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;

    fn name(&self) -> &str;

    fn clone_box(&self) -> Box<dyn Tokenizer>;
}

/// Normalizes the whole text, then splits it on whitespace.
///
/// Every token is therefore a whole word of `normalize(text)`, which is what
/// lets index entries be checked against a plain substring scan.
#[derive(Clone, Default)]
pub struct NormalizingTokenizer;

impl Tokenizer for NormalizingTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        normalize(text)
            .split_whitespace()
            .map(String::from)
            .collect()
    }

    fn name(&self) -> &str {
        "normalizing"
    }

    fn clone_box(&self) -> Box<dyn Tokenizer> {
        Box::new(NormalizingTokenizer)
    }
}
