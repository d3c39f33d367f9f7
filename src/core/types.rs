use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub u64);

impl QuoteId {
    pub fn new(id: u64) -> Self {
        QuoteId(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// 8-byte big-endian key, so byte order in the store equals id order.
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(key: &[u8]) -> Option<Self> {
        let bytes: [u8; 8] = key.try_into().ok()?;
        Some(QuoteId(u64::from_be_bytes(bytes)))
    }
}

impl From<u64> for QuoteId {
    fn from(id: u64) -> Self {
        QuoteId(id)
    }
}

/// A stored quotation. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    pub author: String,
}

impl Quote {
    pub fn new(id: QuoteId, text: impl Into<String>, author: impl Into<String>) -> Self {
        Quote {
            id,
            text: text.into(),
            author: author.into(),
        }
    }
}

/// One entry of a bulk import. Older dumps use capitalised field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    #[serde(default, alias = "Name", alias = "name")]
    pub author: String,
    #[serde(alias = "Text")]
    pub text: String,
}

impl ImportRecord {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        ImportRecord {
            author: author.into(),
            text: text.into(),
        }
    }
}

impl From<Quote> for ImportRecord {
    fn from(quote: Quote) -> Self {
        ImportRecord {
            author: quote.author,
            text: quote.text,
        }
    }
}
