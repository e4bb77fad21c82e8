//! Search module - lemma extraction, ranking and snippets / 搜索模块
//!
//! Architecture principles:
//! - One lemma extractor serves indexing, query parsing and snippet building
//! - The engine only reads the index; it never writes
//! - Call direction: API → Search → Repository (unidirectional)

pub mod engine;
pub mod lemma;
pub mod schema;
pub mod snippet;

pub use engine::{SearchEngine, SearchError};
pub use lemma::{LemmaCounts, LemmaExtractor};
pub use schema::{SearchHit, SearchOptions, SearchResults};
pub use snippet::SnippetSelector;
