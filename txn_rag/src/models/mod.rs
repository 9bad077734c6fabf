use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod document;

pub use document::{format_inr, format_transaction, parse_transaction_text, Document};

/// Cash-flow direction of a transaction. The amount itself is always
/// non-negative; the direction is carried exclusively here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxnType {
    Credit,
    Debit,
}

impl TxnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnType::Credit => "CREDIT",
            TxnType::Debit => "DEBIT",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "CREDIT" => Some(TxnType::Credit),
            "DEBIT" => Some(TxnType::Debit),
            _ => None,
        }
    }
}

impl std::fmt::Display for TxnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bank transaction as received from upstream FI pipelines. Every field is
/// optional on the wire; aliases cover the field-name variants different
/// account services emit (`accountNumber`/`accountId`, `txnMode`/`mode`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub txn_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default, alias = "date")]
    pub created_at: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default, alias = "balance")]
    pub current_balance: Option<f64>,
    #[serde(default, alias = "txnMode")]
    pub mode: Option<String>,
    #[serde(default)]
    pub narration: Option<String>,
    #[serde(default, alias = "txnRef")]
    pub reference: Option<String>,
    #[serde(default, rename = "type")]
    pub txn_type: Option<String>,
    #[serde(default, rename = "pk_GSI_1")]
    pub pk_gsi_1: Option<String>,
}

impl Transaction {
    /// Direction of the transaction, read from the plain `type` field or the
    /// composite `pk_GSI_1 = "TYPE#CREDIT"` attribute.
    pub fn kind(&self) -> Option<TxnType> {
        if let Some(t) = self.txn_type.as_deref().and_then(TxnType::parse) {
            return Some(t);
        }
        self.pk_gsi_1
            .as_deref()
            .map(|v| v.trim_start_matches("TYPE#"))
            .and_then(TxnType::parse)
    }

    /// Payment mode, uppercased for storage and comparison.
    pub fn mode_normalized(&self) -> Option<String> {
        self.mode
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_uppercase)
    }

    /// Calendar date of the transaction, taken from the first ten characters
    /// of `createdAt` (date or datetime forms both normalize this way).
    pub fn date(&self) -> Option<NaiveDate> {
        let raw = self.created_at.as_deref()?;
        let prefix = raw.get(..10)?;
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
    }

    /// Monthly bucket key in `YYYY-MM` form.
    pub fn month_key(&self) -> Option<String> {
        self.date().map(|d| d.format("%Y-%m").to_string())
    }

    /// Account identifier preferred for display: the (possibly masked)
    /// account number, falling back to the opaque account id.
    pub fn display_account(&self) -> &str {
        self.account_number
            .as_deref()
            .or(self.account_id.as_deref())
            .unwrap_or("N/A")
    }
}

/// One of the four execution pipelines a query can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryMode {
    VectorSearch,
    Analytical,
    Statistical,
    SmartFull,
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryMode::VectorSearch => "VECTOR_SEARCH",
            QueryMode::Analytical => "ANALYTICAL",
            QueryMode::Statistical => "STATISTICAL",
            QueryMode::SmartFull => "SMART_FULL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bucket {
    pub count: u64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlyBucket {
    pub count: u64,
    pub credit_sum: f64,
    pub debit_sum: f64,
    pub net: f64,
}

/// Aggregates over a filtered set of transactions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub count: u64,
    pub total: f64,
    pub average: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_type: Option<BTreeMap<String, Bucket>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_mode: Option<BTreeMap<String, Bucket>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly: Option<BTreeMap<String, MonthlyBucket>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn compute(page: usize, page_size: usize, total_items: usize) -> Self {
        let total_pages = total_items.div_ceil(page_size.max(1));
        Self {
            page,
            page_size,
            total_items,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// Transaction as rendered in API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub transaction_id: String,
    pub account_number: String,
    pub date: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub txn_type: String,
    pub mode: String,
    pub narration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl From<&Transaction> for TransactionView {
    fn from(txn: &Transaction) -> Self {
        Self {
            transaction_id: txn.txn_id.clone().unwrap_or_else(|| "N/A".to_string()),
            account_number: txn.display_account().to_string(),
            date: txn
                .date()
                .map(|d| d.to_string())
                .or_else(|| txn.created_at.clone())
                .unwrap_or_else(|| "N/A".to_string()),
            amount: txn.amount,
            txn_type: txn
                .kind()
                .map(|k| k.as_str().to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            mode: txn.mode_normalized().unwrap_or_else(|| "N/A".to_string()),
            narration: txn.narration.clone().unwrap_or_default(),
            balance_after: txn.current_balance,
            reference: txn.reference.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    20
}

fn default_show_all() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub context_data: Vec<Transaction>,
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
    pub user_id: String,
    #[serde(default)]
    pub context_data: Option<Vec<Transaction>>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_show_all")]
    pub show_all: bool,
    #[serde(default)]
    pub use_full_data: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
    pub user_id: String,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_show_all")]
    pub show_all: bool,
    #[serde(default)]
    pub use_full_data: Option<bool>,
    #[serde(default)]
    pub query_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusQuery {
    pub user_id: String,
}

fn default_history_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryQuery {
    pub user_id: String,
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub ingested: usize,
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ingested: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConnectionResponse {
    pub llm_reachable: bool,
    pub embedding_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub query_id: String,
    pub mode: QueryMode,
    pub answer: String,
    pub matching_transactions_count: usize,
    pub filters_applied: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<TransactionView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn transaction_accepts_field_aliases() {
        let txn: Transaction = serde_json::from_value(json!({
            "txnId": "T1",
            "accountNumber": "XXXX9812",
            "date": "2024-03-01T10:30:00",
            "amount": 450.0,
            "balance": 12000.5,
            "txnMode": "upi",
            "txnRef": "REF-7",
            "pk_GSI_1": "TYPE#DEBIT"
        }))
        .unwrap();

        assert_eq!(txn.kind(), Some(TxnType::Debit));
        assert_eq!(txn.mode_normalized().as_deref(), Some("UPI"));
        assert_eq!(txn.date(), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(txn.current_balance, Some(12000.5));
        assert_eq!(txn.reference.as_deref(), Some("REF-7"));
        assert_eq!(txn.display_account(), "XXXX9812");
    }

    #[test]
    fn kind_prefers_plain_type_field() {
        let txn: Transaction = serde_json::from_value(json!({
            "type": "credit",
            "pk_GSI_1": "TYPE#DEBIT"
        }))
        .unwrap();
        assert_eq!(txn.kind(), Some(TxnType::Credit));
    }

    #[test]
    fn query_mode_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&QueryMode::SmartFull).unwrap(),
            "\"SMART_FULL\""
        );
        assert_eq!(QueryMode::VectorSearch.to_string(), "VECTOR_SEARCH");
    }

    #[test]
    fn pagination_total_pages_is_ceiling() {
        let p = Pagination::compute(1, 20, 41);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let last = Pagination::compute(3, 20, 41);
        assert!(!last.has_next);
        assert!(last.has_prev);

        let empty = Pagination::compute(1, 20, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }
}
