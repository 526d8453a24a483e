//! Full-text indexing: tokenization, the persisted inverted index, and the
//! queue that keeps it current.

pub mod inverted;
pub mod queue;
pub mod tokenizer;

pub use inverted::{IndexDocument, IndexableResource, InvertedIndex};
pub use queue::{IndexQueue, IndexTicket};
pub use tokenizer::{term_frequencies, tokenize};
