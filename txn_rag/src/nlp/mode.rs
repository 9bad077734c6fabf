//! Deterministic query-mode classification.
//!
//! Routes a prompt to one of the four execution pipelines based on fixed
//! signal-word sets (English, Devanagari and Hinglish) plus the extracted
//! filter. Pure function of its inputs.

use std::sync::LazyLock;

use regex::Regex;

use super::filters::FilterSpec;
use crate::models::QueryMode;

static STATISTICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(count|how many|number of|total amount|total transactions|sum of|sum|average|avg|minimum|maximum|kitna|kitne|kitni|कितना|कितने|कितनी|कुल)\b",
    )
    .unwrap()
});

static ANALYTICAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(summari[sz]e|summary|overview|analy\w*|pattern|patterns|trend|trends|unusual|anomal\w*|scan|insight|insights|samjhao|vishleshan|सारांश|विश्लेषण|समझाओ)\b",
    )
    .unwrap()
});

static LOOKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\b(transaction id|txn id|reference number)\b)|(\b(find|show)\b[^.?!]{0,60}\btransaction\b)")
        .unwrap()
});

static BROAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(all|every|saari|sabhi|sab|list|everything|सभी|सारी)\b").unwrap()
});

/// Select exactly one execution mode for the prompt.
///
/// Priority: pure statistics (no narrative needed) → analytical narration →
/// specific lookup → filtered scan → vector search default.
pub fn classify(prompt: &str, filters: &FilterSpec) -> QueryMode {
    let statistical = STATISTICAL_RE.is_match(prompt);
    let analytical = ANALYTICAL_RE.is_match(prompt);
    let broad = BROAD_RE.is_match(prompt);
    let lookup = LOOKUP_RE.is_match(prompt)
        || !filters.txn_ids.is_empty()
        || !filters.narration_terms.is_empty();

    if statistical && !analytical {
        return QueryMode::Statistical;
    }
    if analytical {
        return QueryMode::Analytical;
    }
    if lookup && !broad {
        return QueryMode::VectorSearch;
    }
    if filters.has_predicates() {
        return QueryMode::SmartFull;
    }
    QueryMode::VectorSearch
}
