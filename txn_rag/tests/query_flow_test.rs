//! End-to-end handler tests over the full query pipeline, with a
//! deterministic bag-of-tokens embedder and a canned chat model standing in
//! for the real providers.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::{test, web, App};
use async_trait::async_trait;
use serde_json::json;

use txn_rag::config::AppConfig;
use txn_rag::handlers;
use txn_rag::models::RagResponse;
use txn_rag::services::embedding::Embedder;
use txn_rag::services::history::ChatHistory;
use txn_rag::services::llm::{ChatMessage, ChatModel, ChunkStream, LlmError};
use txn_rag::services::query_cache::QueryCache;
use txn_rag::services::rag::{KernelConfig, RagKernel};
use txn_rag::services::user_store::UserStores;
use txn_rag::services::AppState;

const CANNED_ANSWER: &str = "Here is what I found in your transactions.";
const TEST_DIM: usize = 64;

/// Deterministic bag-of-tokens embedder: shared tokens give cosine overlap.
struct TokenEmbedder;

impl Embedder for TokenEmbedder {
    fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; TEST_DIM];
                for token in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
                    if token.is_empty() {
                        continue;
                    }
                    let mut hasher = std::collections::hash_map::DefaultHasher::new();
                    token.hash(&mut hasher);
                    v[(hasher.finish() % TEST_DIM as u64) as usize] += 1.0;
                }
                v
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        TEST_DIM
    }
}

/// Counts calls and always answers the same text; the stream yields the
/// same answer word by word.
struct CannedLlm {
    calls: AtomicUsize,
}

impl CannedLlm {
    fn new() -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl ChatModel for CannedLlm {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CANNED_ANSWER.to_string())
    }

    async fn stream(&self, _messages: &[ChatMessage]) -> Result<ChunkStream, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunks: Vec<Result<String, LlmError>> = CANNED_ANSWER
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        allow_origins: vec!["*".to_string()],
        llm_api_key: "test-key".to_string(),
        llm_base_url: "http://localhost:0".to_string(),
        llm_model: "test-model".to_string(),
        llm_temperature: 0.0,
        llm_top_p: 0.9,
        llm_max_tokens: 3000,
        llm_frequency_penalty: 0.3,
        llm_presence_penalty: 0.3,
        llm_timeout_seconds: 5,
        embedding_model_id: "test".to_string(),
        vector_top_k: 50,
        smart_full_max_docs: 200,
        corpus_max_docs: 500_000,
        store_ttl_seconds: 3600,
        query_cache_ttl_seconds: 1800,
        chat_history_url: None,
    }
}

fn test_state(llm: Arc<CannedLlm>, config: AppConfig) -> web::Data<AppState> {
    let llm: Arc<dyn ChatModel> = llm;
    let embedder: Arc<dyn Embedder> = Arc::new(TokenEmbedder);
    web::Data::new(AppState {
        kernel: RagKernel {
            config: KernelConfig {
                top_k: config.vector_top_k,
                smart_full_max: config.smart_full_max_docs,
            },
        },
        config,
        embedder,
        llm,
        stores: Arc::new(UserStores::new(3600)),
        history: Arc::new(ChatHistory::disabled()),
        cache: Arc::new(QueryCache::new(1800)),
    })
}

fn txn(id: &str, amount: f64, date: &str, kind: &str, mode: &str, narration: &str) -> serde_json::Value {
    json!({
        "txnId": id,
        "accountNumber": "XXXX1234",
        "createdAt": date,
        "amount": amount,
        "type": kind,
        "mode": mode,
        "narration": narration,
    })
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .configure(handlers::configure),
        )
        .await
    };
}

async fn ingest<S, B>(app: &S, user_id: &str, txns: Vec<serde_json::Value>)
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/ingest")
        .set_json(json!({ "user_id": user_id, "context_data": txns }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert!(resp.status().is_success(), "ingest failed: {}", resp.status());
}

async fn query_json<S, B>(app: &S, uri: &str, body: serde_json::Value) -> RagResponse
where
    S: actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse<B>,
        Error = actix_web::Error,
    >,
    B: actix_web::body::MessageBody,
{
    let req = test::TestRequest::post().uri(uri).set_json(body).to_request();
    test::call_and_read_body_json(app, req).await
}

#[actix_web::test]
async fn status_and_isolation_across_users() {
    let state = test_state(CannedLlm::new(), test_config());
    let app = test_app!(state);

    let u1: Vec<_> = (0..10)
        .map(|i| txn(&format!("u1-{i}"), 100.0, "2024-01-10", "DEBIT", "UPI", "groceries"))
        .collect();
    let u2: Vec<_> = (0..5)
        .map(|i| txn(&format!("u2-{i}"), 200.0, "2024-01-11", "CREDIT", "NEFT", "salary"))
        .collect();
    ingest(&app, "U1", u1).await;
    ingest(&app, "U2", u2).await;

    let status: serde_json::Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/status?user_id=U1").to_request(),
    )
    .await;
    assert_eq!(status["ingested"], json!(true));
    assert_eq!(status["count"], json!(10));

    let status: serde_json::Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/status?user_id=U2").to_request(),
    )
    .await;
    assert_eq!(status["count"], json!(5));

    // A U1 query never surfaces a U2 transaction.
    let response = query_json(
        &app,
        "/query",
        json!({ "user_id": "U1", "prompt": "show me all my transactions" }),
    )
    .await;
    let transactions = response.transactions.expect("expected a transaction page");
    assert!(!transactions.is_empty());
    assert!(transactions.iter().all(|t| t.transaction_id.starts_with("u1-")));
}

#[actix_web::test]
async fn query_without_ingest_is_rejected() {
    let state = test_state(CannedLlm::new(), test_config());
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({ "user_id": "ghost", "prompt": "anything" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error_kind"], json!("NOT_INGESTED"));
}

#[actix_web::test]
async fn whitespace_prompt_is_rejected() {
    let state = test_state(CannedLlm::new(), test_config());
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/query")
        .set_json(json!({ "user_id": "U1", "prompt": "   " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error_kind"], json!("EMPTY_PROMPT"));
}

#[actix_web::test]
async fn oversized_ingest_is_rejected() {
    let mut config = test_config();
    config.corpus_max_docs = 3;
    let state = test_state(CannedLlm::new(), config);
    let app = test_app!(state);

    let txns: Vec<_> = (0..5)
        .map(|i| txn(&format!("t{i}"), 10.0, "2024-01-01", "DEBIT", "UPI", "x"))
        .collect();
    let req = test::TestRequest::post()
        .uri("/ingest")
        .set_json(json!({ "user_id": "U1", "context_data": txns }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 413);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error_kind"], json!("CORPUS_TOO_LARGE"));
}

#[actix_web::test]
async fn statistical_hindi_query_skips_the_llm() {
    let llm = CannedLlm::new();
    let state = test_state(llm.clone(), test_config());
    let app = test_app!(state);

    let txns: Vec<_> = (0..5)
        .map(|i| txn(&format!("t{i}"), 2000.0, "2024-01-10", "DEBIT", "UPI", "kirana"))
        .collect();
    ingest(&app, "U1", txns).await;

    let response = query_json(
        &app,
        "/query",
        json!({ "user_id": "U1", "prompt": "कुल कितने डेबिट हुए?" }),
    )
    .await;

    assert_eq!(response.mode.to_string(), "STATISTICAL");
    let stats = response.statistics.expect("statistics expected");
    assert_eq!(stats.count, 5);
    assert_eq!(stats.total, 10_000.0);
    // Deterministic fast path: the model is never invoked.
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    // The answer carries a Devanagari table.
    assert!(response.answer.contains("मीट्रिक"));
    assert!(response.answer.contains("|"));
}

#[actix_web::test]
async fn hinglish_amount_filter_is_sound() {
    let state = test_state(CannedLlm::new(), test_config());
    let app = test_app!(state);

    let txns = vec![
        txn("small", 100.0, "2024-01-05", "CREDIT", "UPI", "gift"),
        txn("edge", 1000.0, "2024-01-05", "CREDIT", "UPI", "topup"),
        txn("mid", 5000.0, "2024-01-06", "CREDIT", "UPI", "refund"),
        txn("big", 12000.0, "2024-01-07", "CREDIT", "UPI", "bonus"),
    ];
    ingest(&app, "U1", txns).await;

    let response = query_json(
        &app,
        "/query",
        json!({ "user_id": "U1", "prompt": "Mujhe ₹1000 se zyada wali UPI transactions dikhao" }),
    )
    .await;

    assert!(response.filters_applied.iter().any(|f| f.contains("amount > 1000")));
    assert!(response.filters_applied.iter().any(|f| f == "mode=UPI"));

    // "se zyada" is strict: the ₹1000 transaction itself stays out.
    let transactions = response.transactions.expect("transaction page expected");
    let mut amounts: Vec<f64> = transactions.iter().map(|t| t.amount).collect();
    amounts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(amounts, vec![5000.0, 12000.0]);
    assert_eq!(response.matching_transactions_count, 2);

    // "at least" keeps the threshold in.
    let response = query_json(
        &app,
        "/query",
        json!({ "user_id": "U1", "prompt": "UPI transactions of at least ₹1000" }),
    )
    .await;

    assert!(response.filters_applied.iter().any(|f| f.contains("amount ≥ 1000")));
    assert_eq!(response.matching_transactions_count, 3);
    let transactions = response.transactions.expect("transaction page expected");
    assert!(transactions.iter().any(|t| t.amount == 1000.0));
}

#[actix_web::test]
async fn vector_search_ranks_token_overlap_first() {
    let state = test_state(CannedLlm::new(), test_config());
    let app = test_app!(state);

    let txns = vec![
        txn("T1", 500.0, "2024-03-01", "DEBIT", "UPI", "Zomato order lunch"),
        txn("T2", 20000.0, "2024-03-05", "DEBIT", "FT", "Rent"),
    ];
    ingest(&app, "U1", txns).await;

    let response = query_json(
        &app,
        "/query",
        json!({ "user_id": "U1", "prompt": "Show the zomato transaction" }),
    )
    .await;

    assert_eq!(response.mode.to_string(), "VECTOR_SEARCH");
    assert!(response.matching_transactions_count >= 1);
    let transactions = response.transactions.expect("transaction page expected");
    assert_eq!(transactions[0].transaction_id, "T1");
}

#[actix_web::test]
async fn pagination_covers_all_matches_exactly_once() {
    let state = test_state(CannedLlm::new(), test_config());
    let app = test_app!(state);

    let txns: Vec<_> = (0..45)
        .map(|i| txn(&format!("t{i:02}"), 100.0 + i as f64, "2024-02-10", "DEBIT", "UPI", "spend"))
        .collect();
    ingest(&app, "U1", txns).await;

    let mut seen = std::collections::HashSet::new();
    let mut total_pages = 0;
    for page in 1..=3 {
        let response = query_json(
            &app,
            "/query",
            json!({
                "user_id": "U1",
                "prompt": "show me all UPI debits",
                "page": page,
                "page_size": 20
            }),
        )
        .await;
        let pagination = response.pagination.expect("pagination expected");
        total_pages = pagination.total_pages;
        assert_eq!(pagination.total_items, 45);
        let transactions = response.transactions.expect("page expected");
        assert!(transactions.len() <= 20);
        for t in transactions {
            assert!(seen.insert(t.transaction_id), "duplicate across pages");
        }
    }
    assert_eq!(total_pages, 3);
    assert_eq!(seen.len(), 45);
}

#[actix_web::test]
async fn prompt_pages_reuse_the_cached_answer() {
    let llm = CannedLlm::new();
    let state = test_state(llm.clone(), test_config());
    let app = test_app!(state);

    let txns: Vec<_> = (0..30)
        .map(|i| txn(&format!("t{i:02}"), 50.0 + i as f64, "2024-02-10", "DEBIT", "UPI", "spend"))
        .collect();
    ingest(&app, "U1", txns).await;

    let first = query_json(
        &app,
        "/prompt",
        json!({ "user_id": "U1", "prompt": "show me all UPI debits", "page": 1, "page_size": 10 }),
    )
    .await;
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);

    let second = query_json(
        &app,
        "/prompt",
        json!({
            "user_id": "U1",
            "prompt": "show me all UPI debits",
            "page": 2,
            "page_size": 10,
            "query_id": first.query_id,
        }),
    )
    .await;

    // Page 2 came from the cache: same answer, no extra model call.
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.answer, first.answer);
    assert_eq!(second.pagination.unwrap().page, 2);
}

#[actix_web::test]
async fn stream_chunks_concatenate_to_the_unary_answer() {
    let llm = CannedLlm::new();
    let state = test_state(llm.clone(), test_config());
    let app = test_app!(state);

    let txns = vec![
        txn("T1", 500.0, "2024-03-01", "DEBIT", "UPI", "Zomato order"),
        txn("T2", 900.0, "2024-03-02", "DEBIT", "UPI", "Groceries"),
    ];
    ingest(&app, "U1", txns).await;

    let payload = json!({ "user_id": "U1", "prompt": "tell me about my spending habits" });

    let unary = query_json(&app, "/query", payload.clone()).await;

    let req = test::TestRequest::post()
        .uri("/query/stream")
        .set_json(payload)
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    let body = String::from_utf8(body.to_vec()).unwrap();

    // Frame order: metadata, chunks, metadata_final, done.
    let events: Vec<&str> = body
        .split("\n\n")
        .filter(|f| !f.is_empty())
        .filter_map(|f| f.lines().next())
        .map(|l| l.trim_start_matches("event: "))
        .collect();
    assert_eq!(events.first(), Some(&"metadata"));
    assert_eq!(events.last(), Some(&"done"));
    assert_eq!(events[events.len() - 2], "metadata_final");
    assert!(events.iter().filter(|e| **e == "chunk").count() > 1);

    // Concatenated chunk text equals the unary answer.
    let mut streamed = String::new();
    for frame in body.split("\n\n") {
        let mut lines = frame.lines();
        if lines.next() != Some("event: chunk") {
            continue;
        }
        let data = lines.next().unwrap().trim_start_matches("data: ");
        let value: serde_json::Value = serde_json::from_str(data).unwrap();
        streamed.push_str(value["text"].as_str().unwrap());
    }
    assert_eq!(streamed, unary.answer);
}

#[actix_web::test]
async fn analytical_summary_buckets_only_the_requested_month() {
    use chrono::Datelike;

    let state = test_state(CannedLlm::new(), test_config());
    let app = test_app!(state);

    let today = chrono::Utc::now().date_naive();
    let first_of_this = today.with_day(1).unwrap();
    let last_of_prev = first_of_this - chrono::Duration::days(1);
    let prev_month = last_of_prev.format("%Y-%m").to_string();
    let prev_date = last_of_prev.format("%Y-%m-%d").to_string();
    let this_date = today.format("%Y-%m-%d").to_string();

    let mut txns: Vec<_> = (0..6)
        .map(|i| txn(&format!("prev-{i}"), 300.0, &prev_date, "DEBIT", "UPI", "spend"))
        .collect();
    txns.push(txn("now-0", 900.0, &this_date, "DEBIT", "CARD", "spend"));
    ingest(&app, "U1", txns).await;

    let response = query_json(
        &app,
        "/query",
        json!({ "user_id": "U1", "prompt": "Summarize my spending last month" }),
    )
    .await;

    assert_eq!(response.mode.to_string(), "ANALYTICAL");
    assert!(!response.answer.is_empty());
    let monthly = response.statistics.expect("statistics").monthly.expect("monthly buckets");
    let months: Vec<&String> = monthly.keys().collect();
    assert_eq!(months, vec![&prev_month]);
    assert_eq!(monthly[&prev_month].count, 6);
}

#[actix_web::test]
async fn reingest_replaces_the_corpus() {
    let state = test_state(CannedLlm::new(), test_config());
    let app = test_app!(state);

    let first: Vec<_> = (0..4)
        .map(|i| txn(&format!("old-{i}"), 10.0, "2024-01-01", "DEBIT", "UPI", "old"))
        .collect();
    ingest(&app, "U1", first).await;

    let second: Vec<_> = (0..2)
        .map(|i| txn(&format!("new-{i}"), 10.0, "2024-01-02", "DEBIT", "UPI", "new"))
        .collect();
    ingest(&app, "U1", second).await;

    let status: serde_json::Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/status?user_id=U1").to_request(),
    )
    .await;
    assert_eq!(status["count"], json!(2));

    let response = query_json(
        &app,
        "/query",
        json!({ "user_id": "U1", "prompt": "show me all transactions" }),
    )
    .await;
    let transactions = response.transactions.expect("page expected");
    assert!(transactions.iter().all(|t| t.transaction_id.starts_with("new-")));
}
