//! Streaming query endpoint (`/query/stream`).
//!
//! Server-sent events: one `metadata` frame before the first model chunk,
//! `chunk` frames carrying text fragments in order, a `metadata_final` frame
//! with statistics and pagination, then `done`. Any failure emits a single
//! `error` frame and closes the stream; dropping the connection cancels the
//! in-flight model call with it.

use actix_web::web::Bytes;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;

use crate::errors::ServiceResult;
use crate::models::{Pagination, QueryMode, QueryRequest};
use crate::services::answer::statistical_answer;
use crate::services::llm::LlmError;
use crate::services::query_cache::QueryCache;
use crate::services::rag::build_messages;
use crate::services::AppState;

use super::query::{forced_mode, resolve_store, validate_prompt};

fn frame(event: &str, data: &serde_json::Value) -> Bytes {
    Bytes::from(format!("event: {event}\ndata: {data}\n\n"))
}

fn error_frame(err: &LlmError) -> Bytes {
    let kind = match err {
        LlmError::Timeout => "UPSTREAM_TIMEOUT",
        _ => "UPSTREAM_UNAVAILABLE",
    };
    frame(
        "error",
        &serde_json::json!({ "error_kind": kind, "message": err.to_string() }),
    )
}

pub async fn query_stream(
    state: web::Data<AppState>,
    body: web::Json<QueryRequest>,
) -> ServiceResult<HttpResponse> {
    let req = body.into_inner();
    validate_prompt(&req.prompt)?;

    // Steps up to kernel output are synchronous with the request; failures
    // here are plain HTTP errors, not stream frames.
    let store = resolve_store(&state, &req.user_id, req.context_data.clone()).await?;
    let outcome = state
        .kernel
        .run(&state.embedder, &store, &req.prompt, forced_mode(req.use_full_data))
        .await?;
    let query_id = QueryCache::query_id(&req.prompt, &outcome.filters);

    let prompt = req.prompt;
    let user_id = req.user_id;
    let page = req.page.max(1);
    let page_size = req.page_size.clamp(1, 100);

    let sse = async_stream::stream! {
        yield Ok::<Bytes, actix_web::Error>(frame("metadata", &serde_json::json!({
            "mode": outcome.mode,
            "matching_transactions_count": outcome.matching_count,
            "filters_applied": outcome.filters_applied,
        })));

        let mut answer = String::new();
        let mut failed = false;

        if outcome.mode == QueryMode::Statistical {
            let stats = outcome.statistics.clone().unwrap_or_default();
            let text = statistical_answer(&stats, &outcome.filters_applied, outcome.language);
            answer.push_str(&text);
            yield Ok(frame("chunk", &serde_json::json!({ "text": text })));
        } else {
            let messages = build_messages(&store, &outcome, &prompt);
            match state.llm.stream(&messages).await {
                Err(e) => {
                    failed = true;
                    yield Ok(error_frame(&e));
                }
                Ok(mut chunks) => {
                    while let Some(item) = chunks.next().await {
                        match item {
                            Ok(text) => {
                                answer.push_str(&text);
                                yield Ok(frame("chunk", &serde_json::json!({ "text": text })));
                            }
                            Err(e) => {
                                failed = true;
                                yield Ok(error_frame(&e));
                                break;
                            }
                        }
                    }
                }
            }
        }

        if !failed {
            let pagination = Pagination::compute(page, page_size, outcome.matched.len());
            yield Ok(frame("metadata_final", &serde_json::json!({
                "statistics": outcome.statistics,
                "pagination": pagination,
            })));
            yield Ok(frame("done", &serde_json::json!({})));

            state
                .history
                .append(
                    &user_id,
                    &prompt,
                    &answer,
                    &query_id,
                    &outcome.mode.to_string(),
                    outcome.matching_count,
                    &outcome.filters_applied,
                )
                .await;
        }
    };

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(sse))
}
