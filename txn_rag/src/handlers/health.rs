use actix_web::{web, HttpResponse};
use finsight_observability::warn;

use crate::models::{StatusQuery, StatusResponse, TestConnectionResponse};
use crate::services::llm::ChatMessage;
use crate::services::AppState;

pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Ingestion status for one user.
pub async fn status(state: web::Data<AppState>, query: web::Query<StatusQuery>) -> HttpResponse {
    let body = match state.stores.status(&query.user_id) {
        Some((count, updated_at)) => StatusResponse {
            ingested: true,
            count,
            updated_at: Some(updated_at),
        },
        None => StatusResponse { ingested: false, count: 0, updated_at: None },
    };
    HttpResponse::Ok().json(body)
}

/// One-shot probe of the generation gateway. The embedder is loaded at
/// startup or the process refuses to serve, so it is always reported ready.
pub async fn test_connection(state: web::Data<AppState>) -> HttpResponse {
    let probe = [ChatMessage::user("Say 'OK' if you are reachable.")];

    let body = match state.llm.complete(&probe).await {
        Ok(reply) => TestConnectionResponse {
            llm_reachable: true,
            embedding_loaded: true,
            reply: Some(reply),
        },
        Err(e) => {
            warn!(error = %e, "LLM connection test failed");
            TestConnectionResponse { llm_reachable: false, embedding_loaded: true, reply: None }
        }
    };
    HttpResponse::Ok().json(body)
}
