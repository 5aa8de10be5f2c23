pub mod document;
pub mod filter;
pub mod query;

pub use document::{Document, Keyword, TERM_SEPARATOR};
pub use filter::BitsFilter;
pub use query::TermQuery;
