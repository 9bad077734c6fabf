use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    // Server
    pub host: String,
    pub port: u16,
    pub allow_origins: Vec<String>,

    // LLM gateway
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_top_p: f32,
    pub llm_max_tokens: u32,
    pub llm_frequency_penalty: f32,
    pub llm_presence_penalty: f32,
    pub llm_timeout_seconds: u64,

    // Embeddings
    pub embedding_model_id: String,

    // Retrieval and stores
    pub vector_top_k: usize,
    pub smart_full_max_docs: usize,
    pub corpus_max_docs: usize,
    pub store_ttl_seconds: u64,
    pub query_cache_ttl_seconds: u64,

    // Chat history (optional)
    pub chat_history_url: Option<String>,
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            host: env::var("BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parsed("PORT", 9000),
            allow_origins: env::var("ALLOW_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            llm_api_key: env::var("LLM_API_KEY").expect("LLM_API_KEY must be set"),
            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "meta-llama/llama-3.2-3b-instruct:free".to_string()),
            llm_temperature: env_parsed("LLM_TEMPERATURE", 0.8),
            llm_top_p: env_parsed("LLM_TOP_P", 0.9),
            llm_max_tokens: env_parsed("LLM_MAX_TOKENS", 3000),
            llm_frequency_penalty: env_parsed("LLM_FREQUENCY_PENALTY", 0.3),
            llm_presence_penalty: env_parsed("LLM_PRESENCE_PENALTY", 0.3),
            llm_timeout_seconds: env_parsed("LLM_TIMEOUT_SECONDS", 60),

            embedding_model_id: env::var("EMBEDDING_MODEL_ID")
                .unwrap_or_else(|_| "sentence-transformers/all-MiniLM-L6-v2".to_string()),

            vector_top_k: env_parsed("VECTOR_TOP_K", 50),
            smart_full_max_docs: env_parsed("SMART_FULL_MAX_DOCS", 200),
            corpus_max_docs: env_parsed("CORPUS_MAX_DOCS", 500_000),
            store_ttl_seconds: env_parsed("STORE_TTL_SECONDS", 3600),
            query_cache_ttl_seconds: env_parsed("QUERY_CACHE_TTL_SECONDS", 1800),

            chat_history_url: env::var("CHAT_HISTORY_URL").ok(),
        }
    }
}
