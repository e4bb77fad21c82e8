//! Indexer module - turns crawled pages into the lemma index / 索引模块
//!
//! - maintainer: incremental index updates (index / deindex one page)
//! - service: start / stop / single-page orchestration over all configured sites

pub mod maintainer;
pub mod service;

pub use maintainer::IndexMaintainer;
pub use service::{IndexingError, IndexingService, ROOT_UNAVAILABLE, STOPPED_BY_USER};
