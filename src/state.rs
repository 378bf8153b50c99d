use std::sync::Arc;

use sitesearch_backend::config::IndexingConfig;
use sitesearch_backend::indexing::IndexingService;
use sitesearch_backend::morphology::Morphology;
use sitesearch_backend::search::{Lemmatizer, QueryProcessor};
use sitesearch_backend::storage::SearchStore;

/// Shared application state / 应用共享状态
pub struct AppState {
    pub store: Arc<dyn SearchStore>,
    pub indexing: Arc<IndexingService>,
    pub query: QueryProcessor,
}

impl AppState {
    pub fn new(
        config: &IndexingConfig,
        store: Arc<dyn SearchStore>,
        morphology: Arc<dyn Morphology>,
    ) -> sitesearch_backend::Result<Self> {
        let lemmatizer = Lemmatizer::new(morphology);
        let indexing = IndexingService::new(config, store.clone(), lemmatizer.clone())?;
        let query = QueryProcessor::new(store.clone(), lemmatizer);

        Ok(Self {
            store,
            indexing: Arc::new(indexing),
            query,
        })
    }
}
