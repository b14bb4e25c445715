//! Lexical BM25 search over server and tool descriptions.
//!
//! Indices are built once from a [`ServerRegistry`](crate::registry::ServerRegistry)
//! and only read afterwards, so ranking never takes a lock.

pub mod index;
pub mod ranker;
pub mod tokenizer;

pub use index::{RegistryIndices, SearchIndex, B, K1};
pub use ranker::{rank, RankedResult, TopK, DEFAULT_TOP_K};
pub use tokenizer::tokenize;
