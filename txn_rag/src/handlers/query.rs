use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use finsight_observability::info;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::{
    HistoryQuery, Pagination, PromptRequest, QueryMode, QueryRequest, RagResponse, Statistics,
    Transaction, TransactionView,
};
use crate::nlp::extract_filters;
use crate::services::answer::statistical_answer;
use crate::services::query_cache::{CachedQuery, QueryCache};
use crate::services::rag::{build_messages, KernelOutcome};
use crate::services::user_store::UserStore;
use crate::services::AppState;

use super::ingest::build_corpus;

pub(crate) fn validate_prompt(prompt: &str) -> ServiceResult<()> {
    if prompt.trim().is_empty() {
        return Err(ServiceError::EmptyPrompt);
    }
    Ok(())
}

pub(crate) fn forced_mode(use_full_data: Option<bool>) -> Option<QueryMode> {
    use_full_data.map(|full| if full { QueryMode::SmartFull } else { QueryMode::VectorSearch })
}

/// Resolve the corpus for a query: inline `context_data` is ingested
/// ephemerally for this call only, otherwise the user's stored corpus is
/// snapshotted.
pub(crate) async fn resolve_store(
    state: &AppState,
    user_id: &str,
    context_data: Option<Vec<Transaction>>,
) -> ServiceResult<Arc<UserStore>> {
    match context_data {
        Some(data) if !data.is_empty() => {
            let now = Utc::now();
            let (documents, index) = build_corpus(state, data).await?;
            Ok(Arc::new(UserStore { documents, index, created_at: now, updated_at: now }))
        }
        _ => state.stores.get(user_id).ok_or(ServiceError::NotIngested),
    }
}

/// Run the kernel and produce the answer text: the deterministic fast path
/// for statistics, a model call for everything else.
pub(crate) async fn run_query(
    state: &AppState,
    store: &Arc<UserStore>,
    prompt: &str,
    forced: Option<QueryMode>,
) -> ServiceResult<(KernelOutcome, String)> {
    let outcome = state.kernel.run(&state.embedder, store, prompt, forced).await?;

    let answer = match outcome.mode {
        QueryMode::Statistical => {
            let stats = outcome.statistics.clone().unwrap_or_default();
            statistical_answer(&stats, &outcome.filters_applied, outcome.language)
        }
        _ => {
            let messages = build_messages(store, &outcome, prompt);
            state.llm.complete(&messages).await.map_err(ServiceError::from)?
        }
    };

    Ok((outcome, answer))
}

struct PageOpts {
    page: usize,
    page_size: usize,
    show_all: bool,
}

#[allow(clippy::too_many_arguments)]
fn build_response(
    store: &UserStore,
    query_id: String,
    mode: QueryMode,
    answer: String,
    filters_applied: Vec<String>,
    statistics: Option<Statistics>,
    matched: &[usize],
    matching_count: usize,
    opts: &PageOpts,
) -> RagResponse {
    let page = opts.page.max(1);
    let page_size = opts.page_size.clamp(1, 100);

    let (transactions, pagination) = if opts.show_all && !matched.is_empty() {
        let pagination = Pagination::compute(page, page_size, matched.len());
        let views: Vec<TransactionView> = matched
            .iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .map(|&ord| TransactionView::from(&store.documents[ord].txn))
            .collect();
        (Some(views), Some(pagination))
    } else {
        (None, None)
    };

    RagResponse {
        query_id,
        mode,
        answer,
        matching_transactions_count: matching_count,
        filters_applied,
        transactions,
        pagination,
        statistics,
    }
}

/// `/query`: one-shot query, optionally over inline context data.
pub async fn query(
    state: web::Data<AppState>,
    body: web::Json<QueryRequest>,
) -> ServiceResult<HttpResponse> {
    let req = body.into_inner();
    validate_prompt(&req.prompt)?;

    let store = resolve_store(&state, &req.user_id, req.context_data).await?;
    let (outcome, answer) =
        run_query(&state, &store, &req.prompt, forced_mode(req.use_full_data)).await?;

    let query_id = QueryCache::query_id(&req.prompt, &outcome.filters);
    let response = build_response(
        &store,
        query_id,
        outcome.mode,
        answer,
        outcome.filters_applied.clone(),
        outcome.statistics.clone(),
        &outcome.matched,
        outcome.matching_count,
        &PageOpts { page: req.page, page_size: req.page_size, show_all: req.show_all },
    );

    state
        .history
        .append(
            &req.user_id,
            &req.prompt,
            &response.answer,
            &response.query_id,
            &outcome.mode.to_string(),
            outcome.matching_count,
            &outcome.filters_applied,
        )
        .await;

    Ok(HttpResponse::Ok().json(response))
}

/// `/prompt`: query against the pre-ingested corpus. The LLM runs at most
/// once per logical query; later pages are served from the cache.
pub async fn prompt(
    state: web::Data<AppState>,
    body: web::Json<PromptRequest>,
) -> ServiceResult<HttpResponse> {
    let req = body.into_inner();
    validate_prompt(&req.prompt)?;

    let store = state.stores.get(&req.user_id).ok_or(ServiceError::NotIngested)?;

    let filters = extract_filters(&req.prompt);
    let query_id = req
        .query_id
        .clone()
        .unwrap_or_else(|| QueryCache::query_id(&req.prompt, &filters));

    if req.page > 1 {
        if let Some(cached) = state.cache.get(&query_id) {
            // Ordinals only make sense against the store build they were
            // computed from.
            if cached.store_stamp == store.updated_at {
                info!(query_id = %query_id, page = req.page, "serving page from query cache");
                let response = build_response(
                    &store,
                    query_id,
                    cached.mode,
                    cached.answer,
                    cached.filters_applied,
                    cached.statistics,
                    &cached.matched,
                    cached.matching_count,
                    &PageOpts { page: req.page, page_size: req.page_size, show_all: req.show_all },
                );
                return Ok(HttpResponse::Ok().json(response));
            }
        }
    }

    let (outcome, answer) =
        run_query(&state, &store, &req.prompt, forced_mode(req.use_full_data)).await?;

    state.cache.put(
        query_id.clone(),
        CachedQuery {
            answer: answer.clone(),
            mode: outcome.mode,
            filters_applied: outcome.filters_applied.clone(),
            statistics: outcome.statistics.clone(),
            matching_count: outcome.matching_count,
            matched: outcome.matched.clone(),
            store_stamp: store.updated_at,
        },
    );

    let response = build_response(
        &store,
        query_id,
        outcome.mode,
        answer,
        outcome.filters_applied.clone(),
        outcome.statistics.clone(),
        &outcome.matched,
        outcome.matching_count,
        &PageOpts { page: req.page, page_size: req.page_size, show_all: req.show_all },
    );

    state
        .history
        .append(
            &req.user_id,
            &req.prompt,
            &response.answer,
            &response.query_id,
            &outcome.mode.to_string(),
            outcome.matching_count,
            &outcome.filters_applied,
        )
        .await;

    Ok(HttpResponse::Ok().json(response))
}

/// `GET /history`: recent chat interactions for a user.
pub async fn history(state: web::Data<AppState>, query: web::Query<HistoryQuery>) -> HttpResponse {
    let entries = state.history.list(&query.user_id, query.limit).await;
    HttpResponse::Ok().json(serde_json::json!({
        "user_id": query.user_id,
        "history": entries,
    }))
}
