use actix_web::{web, HttpResponse};
use finsight_observability::info;

use crate::errors::{ServiceError, ServiceResult};
use crate::models::{Document, IngestRequest, IngestResponse, Transaction};
use crate::services::embedding::embed_documents;
use crate::services::vector_index::VectorIndex;
use crate::services::AppState;

/// Render, embed and index a transaction batch. Any embedding failure fails
/// the whole build, so no partial store can ever be published.
pub(crate) async fn build_corpus(
    state: &AppState,
    transactions: Vec<Transaction>,
) -> ServiceResult<(Vec<Document>, VectorIndex)> {
    if transactions.len() > state.config.corpus_max_docs {
        return Err(ServiceError::CorpusTooLarge {
            got: transactions.len(),
            limit: state.config.corpus_max_docs,
        });
    }

    let documents: Vec<Document> = transactions
        .into_iter()
        .map(Document::from_transaction)
        .collect();
    let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();

    let vectors = embed_documents(state.embedder.clone(), texts)
        .await
        .map_err(|e| ServiceError::Internal(format!("embedding failed: {e}")))?;
    let index = VectorIndex::from_embeddings(vectors, state.embedder.dimension())
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    Ok((documents, index))
}

/// Ingest a user's corpus. Repeat calls replace the previous corpus
/// atomically; the last commit wins.
pub async fn ingest(
    state: web::Data<AppState>,
    body: web::Json<IngestRequest>,
) -> ServiceResult<HttpResponse> {
    let IngestRequest { context_data, user_id } = body.into_inner();
    let count = context_data.len();

    state.stores.sweep_idle();
    let (documents, index) = build_corpus(&state, context_data).await?;
    state.stores.replace(&user_id, documents, index);

    info!(user_id = %user_id, ingested = count, "corpus ingested");
    Ok(HttpResponse::Ok().json(IngestResponse { ingested: count, user_id }))
}
