pub mod health;
pub mod ingest;
pub mod query;
pub mod stream;

use actix_web::web;

/// Route table for the service; shared by `main` and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(health::root))
        .route("/status", web::get().to(health::status))
        .route("/test-connection", web::post().to(health::test_connection))
        .route("/ingest", web::post().to(ingest::ingest))
        .route("/query", web::post().to(query::query))
        .route("/prompt", web::post().to(query::prompt))
        .route("/query/stream", web::post().to(stream::query_stream))
        .route("/history", web::get().to(query::history));
}
