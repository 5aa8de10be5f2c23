use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Separator between the field and the word inside an index term. U+0001 is
/// never expected to occur in either side.
pub const TERM_SEPARATOR: char = '\u{1}';

/// One indexed (field, word) pair of a document, e.g. `("content", "db")`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keyword {
    pub field: String,
    pub word: String,
}

impl Keyword {
    pub fn new(field: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            word: word.into(),
        }
    }

    /// Render the inverted-index key for this keyword. An empty word yields
    /// the empty term, which is never indexed.
    pub fn to_term(&self) -> String {
        if self.word.is_empty() {
            return String::new();
        }
        format!("{}{}{}", self.field, TERM_SEPARATOR, self.word)
    }
}

/// A document as the engine sees it. `doc_id` is the caller-supplied business
/// identifier; `int_id` is assigned by the local indexer on insert and is the
/// sort key of inverted postings. The payload is opaque bytes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Document {
    pub doc_id: String,
    pub int_id: u64,
    pub bits: u64,
    pub keywords: Vec<Keyword>,
    pub payload: Vec<u8>,
}

impl Document {
    /// Encode this document for the forward index.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a forward-index record.
    pub fn decode(bytes: &[u8]) -> Result<Document> {
        Ok(bincode::deserialize(bytes)?)
    }
}
