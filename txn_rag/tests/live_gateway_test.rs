//! Tests against the real LLM gateway. Ignored by default; run with
//! `cargo test -- --ignored` after exporting LLM_API_KEY (and optionally
//! LLM_BASE_URL / LLM_MODEL).

use futures_util::StreamExt;

use txn_rag::config::AppConfig;
use txn_rag::services::llm::{ChatMessage, ChatModel, OpenAiChatClient};

#[tokio::test]
#[ignore] // Requires network access and LLM_API_KEY
async fn unary_completion_round_trips() {
    let config = AppConfig::from_env();
    let client = OpenAiChatClient::from_config(&config).expect("client");

    let reply = client
        .complete(&[ChatMessage::user("Reply with the single word OK.")])
        .await
        .expect("completion");
    assert!(!reply.trim().is_empty());
}

#[tokio::test]
#[ignore] // Requires network access and LLM_API_KEY
async fn streaming_yields_ordered_fragments() {
    let config = AppConfig::from_env();
    let client = OpenAiChatClient::from_config(&config).expect("client");

    let mut stream = client
        .stream(&[ChatMessage::user("Count from 1 to 5, digits only.")])
        .await
        .expect("stream start");

    let mut full = String::new();
    while let Some(chunk) = stream.next().await {
        full.push_str(&chunk.expect("chunk"));
    }
    assert!(!full.trim().is_empty());
}
