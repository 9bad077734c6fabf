use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use finsight_observability::{info, init_tracing, TracingConfig};

use txn_rag::config::AppConfig;
use txn_rag::handlers;
use txn_rag::services::embedding::{Embedder, LocalEmbedder};
use txn_rag::services::history::ChatHistory;
use txn_rag::services::llm::{ChatModel, OpenAiChatClient};
use txn_rag::services::query_cache::QueryCache;
use txn_rag::services::rag::{KernelConfig, RagKernel};
use txn_rag::services::user_store::UserStores;
use txn_rag::services::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    init_tracing(TracingConfig::for_service("txn-rag"));

    let config = AppConfig::from_env();

    info!(model = %config.embedding_model_id, "Loading embedding model...");
    let embedder: Arc<dyn Embedder> = Arc::new(
        LocalEmbedder::new(&config.embedding_model_id).expect("failed to load embedding model"),
    );
    info!(dimension = embedder.dimension(), "✅ Embedding model ready");

    let llm: Arc<dyn ChatModel> = Arc::new(
        OpenAiChatClient::from_config(&config).expect("failed to build LLM client"),
    );

    let history = Arc::new(ChatHistory::connect(config.chat_history_url.as_deref()).await);
    let stores = Arc::new(UserStores::new(config.store_ttl_seconds));
    let cache = Arc::new(QueryCache::new(config.query_cache_ttl_seconds));
    let kernel = RagKernel {
        config: KernelConfig {
            top_k: config.vector_top_k,
            smart_full_max: config.smart_full_max_docs,
        },
    };

    let host = config.host.clone();
    let port = config.port;
    let allow_origins = config.allow_origins.clone();

    let state = web::Data::new(AppState {
        config,
        embedder,
        llm,
        stores,
        history,
        cache,
        kernel,
    });

    info!("🚀 [txn-rag] starting on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = if allow_origins.iter().any(|o| o == "*") {
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
        } else {
            allow_origins
                .iter()
                .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
                .allow_any_method()
                .allow_any_header()
                .supports_credentials()
        };

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
