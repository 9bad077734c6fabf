//! Canonical document rendering for transactions.
//!
//! The same rendering feeds both the embedding model and the LLM context, so
//! the text a vector was built from is exactly the text the model reads.

use super::Transaction;

/// The atomic unit of embedding and LLM context: the canonical text plus the
/// typed record it was rendered from.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub txn: Transaction,
}

impl Document {
    pub fn from_transaction(txn: Transaction) -> Self {
        Self {
            text: format_transaction(&txn),
            txn,
        }
    }
}

/// Render an amount with the rupee symbol, comma grouping and two decimals.
pub fn format_inr(value: f64) -> String {
    let rendered = format!("{:.2}", value.abs());
    let (whole, frac) = rendered.split_once('.').unwrap_or((rendered.as_str(), "00"));

    let digits: Vec<char> = whole.chars().collect();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}₹{grouped}.{frac}")
}

fn parse_inr(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-').collect();
    cleaned.parse().ok()
}

/// Canonical multi-line rendering of a transaction. Field order is stable:
/// id, account, date, amount, type, mode, narration, then extras when present.
pub fn format_transaction(txn: &Transaction) -> String {
    let mut text = format!(
        "Transaction ID: {}\nAccount Number: {}\nDate: {}\nAmount: {}\nType: {}\nMode: {}\nNarration: {}\n",
        txn.txn_id.as_deref().unwrap_or("N/A"),
        txn.display_account(),
        txn.date()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "N/A".to_string()),
        format_inr(txn.amount),
        txn.kind().map(|k| k.as_str()).unwrap_or("N/A"),
        txn.mode_normalized().unwrap_or_else(|| "N/A".to_string()),
        txn.narration.as_deref().unwrap_or(""),
    );

    if let Some(balance) = txn.current_balance {
        text.push_str(&format!("Balance: {}\n", format_inr(balance)));
    }
    if let Some(reference) = txn.reference.as_deref().filter(|r| !r.is_empty()) {
        text.push_str(&format!("Reference: {}\n", reference));
    }

    text
}

/// Parse a canonical rendering back into a transaction. Inverse of
/// [`format_transaction`] over the standard fields.
pub fn parse_transaction_text(text: &str) -> Transaction {
    let mut txn = Transaction::default();

    for line in text.lines() {
        let Some((label, raw_value)) = line.split_once(':') else {
            continue;
        };
        let value = raw_value.trim_start();
        let present = || {
            if value == "N/A" || value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        };

        match label {
            "Transaction ID" => txn.txn_id = present(),
            "Account Number" => txn.account_number = present(),
            "Date" => txn.created_at = present(),
            "Amount" => txn.amount = parse_inr(value).unwrap_or(0.0),
            "Type" => txn.txn_type = present(),
            "Mode" => txn.mode = present(),
            "Narration" => txn.narration = Some(value.to_string()),
            "Balance" => txn.current_balance = parse_inr(value),
            "Reference" => txn.reference = present(),
            _ => {}
        }
    }

    txn
}
