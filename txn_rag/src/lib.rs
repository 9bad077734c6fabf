//! Transaction RAG service: retrieval-augmented question answering over a
//! user's bank-transaction corpus.
//!
//! The pipeline per query: extract a structured filter from the prompt,
//! detect its language, classify it into one of four execution modes, run
//! the retrieval/aggregation kernel for that mode, then either synthesize a
//! deterministic statistical answer or assemble a prompt bundle and call the
//! chat model — unary or streamed.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod nlp;
pub mod services;
