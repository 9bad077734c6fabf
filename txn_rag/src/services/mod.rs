pub mod answer;
pub mod embedding;
pub mod history;
pub mod llm;
pub mod prompt;
pub mod query_cache;
pub mod rag;
pub mod user_store;
pub mod vector_index;

use std::sync::Arc;

use crate::config::AppConfig;

/// Shared service state injected into every handler. Built once at startup;
/// the per-user store map inside is the only mutable structure.
pub struct AppState {
    pub config: AppConfig,
    pub embedder: Arc<dyn embedding::Embedder>,
    pub llm: Arc<dyn llm::ChatModel>,
    pub stores: Arc<user_store::UserStores>,
    pub history: Arc<history::ChatHistory>,
    pub cache: Arc<query_cache::QueryCache>,
    pub kernel: rag::RagKernel,
}
