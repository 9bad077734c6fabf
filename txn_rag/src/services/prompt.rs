//! Prompt assembly.
//!
//! Builds the two-message bundle sent to the chat model: a fixed analyst
//! system role plus a user message carrying, in order, the language
//! directive, the question, the applied filters, the statistics block and
//! the context documents. A character budget bounds the context; documents
//! are dropped from the tail, never the statistics.

use crate::models::{format_inr, Statistics};
use crate::nlp::Language;
use crate::services::llm::ChatMessage;

/// Rough character budget for the context section (≈6k tokens).
pub const MAX_CONTEXT_CHARS: usize = 24_000;

const DOC_SEPARATOR: &str = "\n=== TRANSACTION ===\n";

const SYSTEM_PROMPT: &str = "You are a careful financial analyst for a personal banking assistant. \
You answer questions about the user's own bank transactions using ONLY the transaction context and \
statistics provided to you; never invent transactions that are not present in the context. \
Format answers as markdown, using tables where they make the numbers clearer. \
Always respond in the same language as the user's question. \
Be specific with amounts, dates and transaction ids, and keep a warm, concise tone.";

pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// Plain-text rendering of a statistics block for model context. The numbers
/// always describe the entire matched set, not the sampled documents.
pub fn render_statistics(stats: &Statistics) -> String {
    let mut lines = vec![
        format!("Matching transactions: {}", stats.count),
        format!("Total amount: {}", format_inr(stats.total)),
        format!("Average amount: {}", format_inr(stats.average)),
    ];
    if let Some(min) = stats.min {
        lines.push(format!("Smallest: {}", format_inr(min)));
    }
    if let Some(max) = stats.max {
        lines.push(format!("Largest: {}", format_inr(max)));
    }

    if let Some(by_type) = &stats.by_type {
        lines.push("By type:".to_string());
        for (kind, bucket) in by_type {
            lines.push(format!(
                "  - {kind}: {} transactions, {}",
                bucket.count,
                format_inr(bucket.total)
            ));
        }
    }
    if let Some(by_mode) = &stats.by_mode {
        lines.push("By mode:".to_string());
        for (mode, bucket) in by_mode {
            lines.push(format!(
                "  - {mode}: {} transactions, {}",
                bucket.count,
                format_inr(bucket.total)
            ));
        }
    }
    if let Some(monthly) = &stats.monthly {
        lines.push("Monthly:".to_string());
        for (month, bucket) in monthly.iter().rev().take(12) {
            lines.push(format!(
                "  - {month}: {} transactions, credits {}, debits {}, net {}",
                bucket.count,
                format_inr(bucket.credit_sum),
                format_inr(bucket.debit_sum),
                format_inr(bucket.net)
            ));
        }
    }

    lines.join("\n")
}

/// Assemble the message bundle for one query.
pub fn assemble(
    prompt: &str,
    language: Language,
    filters_applied: &[String],
    statistics: Option<&Statistics>,
    context_texts: &[&str],
    context_budget: usize,
) -> Vec<ChatMessage> {
    let mut user = String::new();

    user.push_str(language.directive());
    user.push_str("\n\nUSER QUESTION: ");
    user.push_str(prompt);

    user.push_str("\n\nAPPLIED FILTERS:\n");
    if filters_applied.is_empty() {
        user.push_str("- none\n");
    } else {
        for filter in filters_applied {
            user.push_str("- ");
            user.push_str(filter);
            user.push('\n');
        }
    }

    if let Some(stats) = statistics {
        user.push_str("\nSTATISTICS (computed over the entire matched set):\n");
        user.push_str(&render_statistics(stats));
        user.push('\n');
    }

    let (kept, total) = fit_context(context_texts, context_budget);
    if total > 0 {
        user.push_str(&format!(
            "\nTRANSACTION CONTEXT ({} of {} shown):",
            kept.len(),
            total
        ));
        for text in &kept {
            user.push_str(DOC_SEPARATOR);
            user.push_str(text);
        }
    }

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Keep documents from the head until the budget is spent.
fn fit_context<'a>(texts: &[&'a str], budget: usize) -> (Vec<&'a str>, usize) {
    let mut kept = Vec::new();
    let mut used = 0usize;
    for text in texts {
        let cost = text.len() + DOC_SEPARATOR.len();
        if used + cost > budget {
            break;
        }
        used += cost;
        kept.push(*text);
    }
    (kept, texts.len())
}
