//! Deterministic answer generation for the statistical fast path.
//!
//! No model call: the reply is synthesized straight from the aggregates, in
//! the language of the question, and is safe to cache.

use crate::models::{format_inr, Statistics};
use crate::nlp::Language;

/// Short markdown block: a one-line verdict plus a table of the salient
/// numbers, with per-type and per-mode rows when available.
pub fn statistical_answer(
    stats: &Statistics,
    filters_applied: &[String],
    language: Language,
) -> String {
    if stats.count == 0 {
        return match language {
            Language::HindiDevanagari => {
                "आपके सवाल से मेल खाने वाली कोई ट्रांज़ैक्शन नहीं मिली।".to_string()
            }
            Language::Hinglish => {
                "Aapke filters ke hisaab se koi transaction nahi mili.".to_string()
            }
            Language::English => "No transactions found matching your query.".to_string(),
        };
    }

    let filter_note = if filters_applied.is_empty() {
        String::new()
    } else {
        format!(" ({})", filters_applied.join(", "))
    };

    let (verdict, metric_h, value_h, count_l, total_l, average_l, min_l, max_l) = match language {
        Language::HindiDevanagari => (
            format!(
                "आपके सवाल से {} ट्रांज़ैक्शन मेल खाती हैं, कुल राशि {}{}।",
                stats.count,
                format_inr(stats.total),
                filter_note
            ),
            "मीट्रिक",
            "मान",
            "कुल ट्रांज़ैक्शन",
            "कुल राशि",
            "औसत",
            "न्यूनतम",
            "अधिकतम",
        ),
        Language::Hinglish => (
            format!(
                "Aapke query se {} transactions match hui, total {}{}.",
                stats.count,
                format_inr(stats.total),
                filter_note
            ),
            "Metric",
            "Value",
            "Count",
            "Total",
            "Average",
            "Minimum",
            "Maximum",
        ),
        Language::English => (
            format!(
                "Found {} matching transaction(s) totalling {}{}.",
                stats.count,
                format_inr(stats.total),
                filter_note
            ),
            "Metric",
            "Value",
            "Count",
            "Total",
            "Average",
            "Minimum",
            "Maximum",
        ),
    };

    let mut out = String::new();
    out.push_str(&verdict);
    out.push_str("\n\n");
    out.push_str(&format!("| {metric_h} | {value_h} |\n|---|---|\n"));
    out.push_str(&format!("| {count_l} | {} |\n", stats.count));
    out.push_str(&format!("| {total_l} | {} |\n", format_inr(stats.total)));
    out.push_str(&format!("| {average_l} | {} |\n", format_inr(stats.average)));
    if let Some(min) = stats.min {
        out.push_str(&format!("| {min_l} | {} |\n", format_inr(min)));
    }
    if let Some(max) = stats.max {
        out.push_str(&format!("| {max_l} | {} |\n", format_inr(max)));
    }

    if let Some(by_type) = &stats.by_type {
        for (kind, bucket) in by_type {
            out.push_str(&format!(
                "| {kind} | {} × {} |\n",
                bucket.count,
                format_inr(bucket.total)
            ));
        }
    }
    if let Some(by_mode) = &stats.by_mode {
        for (mode, bucket) in by_mode {
            out.push_str(&format!(
                "| {mode} | {} × {} |\n",
                bucket.count,
                format_inr(bucket.total)
            ));
        }
    }

    out
}
