use site_search::indexer::IndexingService;
use site_search::repository::Repository;
use site_search::search::SearchEngine;

/// Shared application state handed to every handler
pub struct AppState {
    pub repo: Repository,
    pub indexing: IndexingService,
    pub search: SearchEngine,
}
