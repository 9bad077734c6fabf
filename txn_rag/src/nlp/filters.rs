//! Natural-language filter extraction.
//!
//! Parses a free-text prompt (English, Devanagari Hindi or Hinglish) into a
//! structured [`FilterSpec`]. Extraction is best-effort and side-effect-free:
//! unrecognized clauses are simply absent, never errors.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use regex::Regex;

use crate::models::{Transaction, TxnType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Amount,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

/// One side of an amount predicate. "above ₹500" is a strict bound; "at
/// least ₹500" (and both ends of a "between") are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountBound {
    pub value: f64,
    pub inclusive: bool,
}

impl AmountBound {
    pub fn inclusive(value: f64) -> Self {
        Self { value, inclusive: true }
    }

    pub fn exclusive(value: f64) -> Self {
        Self { value, inclusive: false }
    }
}

/// Structured filter derived from a prompt. Predicates are conjunctive across
/// fields and disjunctive within set-valued fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub amount_min: Option<AmountBound>,
    pub amount_max: Option<AmountBound>,
    pub types: Vec<TxnType>,
    pub modes: Vec<String>,
    pub accounts: Vec<String>,
    pub txn_ids: Vec<String>,
    pub narration_terms: Vec<String>,
    pub strict_narration: bool,
    pub top_n: Option<usize>,
    pub sort: Option<SortSpec>,
    pub keywords: Vec<String>,
}

impl FilterSpec {
    /// True when the spec carries anything that narrows or orders the corpus.
    /// Free-text keywords alone do not count.
    pub fn has_predicates(&self) -> bool {
        self.date_from.is_some()
            || self.date_to.is_some()
            || self.amount_min.is_some()
            || self.amount_max.is_some()
            || !self.types.is_empty()
            || !self.modes.is_empty()
            || !self.accounts.is_empty()
            || !self.txn_ids.is_empty()
            || !self.narration_terms.is_empty()
            || self.top_n.is_some()
            || self.sort.is_some()
    }

    /// Conjunctive predicate check against a single transaction.
    pub fn matches(&self, txn: &Transaction) -> bool {
        if self.date_from.is_some() || self.date_to.is_some() {
            match txn.date() {
                Some(d) => {
                    if self.date_from.is_some_and(|from| d < from) {
                        return false;
                    }
                    if self.date_to.is_some_and(|to| d > to) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        if let Some(min) = self.amount_min {
            let pass = if min.inclusive { txn.amount >= min.value } else { txn.amount > min.value };
            if !pass {
                return false;
            }
        }
        if let Some(max) = self.amount_max {
            let pass = if max.inclusive { txn.amount <= max.value } else { txn.amount < max.value };
            if !pass {
                return false;
            }
        }

        if !self.types.is_empty() {
            match txn.kind() {
                Some(kind) if self.types.contains(&kind) => {}
                _ => return false,
            }
        }

        if !self.modes.is_empty() {
            match txn.mode_normalized() {
                Some(mode) if self.modes.iter().any(|m| *m == mode) => {}
                _ => return false,
            }
        }

        if !self.accounts.is_empty() {
            let hit = self.accounts.iter().any(|wanted| {
                txn.account_number
                    .as_deref()
                    .is_some_and(|a| a.eq_ignore_ascii_case(wanted))
                    || txn
                        .account_id
                        .as_deref()
                        .is_some_and(|a| a.eq_ignore_ascii_case(wanted))
            });
            if !hit {
                return false;
            }
        }

        if !self.txn_ids.is_empty() {
            match txn.txn_id.as_deref() {
                Some(id) if self.txn_ids.iter().any(|t| t.eq_ignore_ascii_case(id)) => {}
                _ => return false,
            }
        }

        if !self.narration_terms.is_empty() {
            let narration = txn.narration.as_deref().unwrap_or("");
            let hit = self.narration_terms.iter().any(|term| {
                if self.strict_narration {
                    word_bounded_contains(narration, term)
                } else {
                    narration.to_lowercase().contains(&term.to_lowercase())
                }
            });
            if !hit {
                return false;
            }
        }

        true
    }

    /// Human-readable renderings of the applied predicates, as surfaced in
    /// `filters_applied` and the LLM prompt.
    pub fn descriptions(&self) -> Vec<String> {
        let mut out = Vec::new();

        match (self.date_from, self.date_to) {
            (Some(from), Some(to)) if from == to => out.push(format!("date = {from}")),
            (Some(from), Some(to)) => out.push(format!("date {from} to {to}")),
            (Some(from), None) => out.push(format!("date ≥ {from}")),
            (None, Some(to)) => out.push(format!("date ≤ {to}")),
            (None, None) => {}
        }

        match (self.amount_min, self.amount_max) {
            (Some(min), Some(max))
                if min.value == max.value && min.inclusive && max.inclusive =>
            {
                out.push(format!("amount = {}", fmt_num(min.value)))
            }
            (Some(min), Some(max)) => out.push(format!(
                "amount between {} and {}",
                fmt_num(min.value),
                fmt_num(max.value)
            )),
            (Some(min), None) => {
                let op = if min.inclusive { "≥" } else { ">" };
                out.push(format!("amount {op} {}", fmt_num(min.value)));
            }
            (None, Some(max)) => {
                let op = if max.inclusive { "≤" } else { "<" };
                out.push(format!("amount {op} {}", fmt_num(max.value)));
            }
            (None, None) => {}
        }

        for t in &self.types {
            out.push(format!("type={t}"));
        }
        for m in &self.modes {
            out.push(format!("mode={m}"));
        }
        for a in &self.accounts {
            out.push(format!("account={a}"));
        }
        for t in &self.txn_ids {
            out.push(format!("txn_id={t}"));
        }
        for n in &self.narration_terms {
            if self.strict_narration {
                out.push(format!("narration = \"{n}\""));
            } else {
                out.push(format!("narration ~ \"{n}\""));
            }
        }

        if let Some(sort) = self.sort {
            let field = match sort.field {
                SortField::Amount => "amount",
                SortField::Date => "date",
            };
            let order = match sort.order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            match self.top_n {
                Some(n) => out.push(format!("top {n} by {field} {order}")),
                None => out.push(format!("sort {field} {order}")),
            }
        }

        out
    }
}

fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}

/// Word-bounded, case-insensitive phrase search used for strict narration
/// matching of person names.
fn word_bounded_contains(haystack: &str, needle: &str) -> bool {
    let hay = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = hay[start..].find(&needle) {
        let at = start + pos;
        let end = at + needle.len();
        let before_ok = at == 0 || !hay[..at].chars().next_back().is_some_and(char::is_alphanumeric);
        let after_ok = end == hay.len() || !hay[end..].chars().next().is_some_and(char::is_alphanumeric);
        if before_ok && after_ok {
            return true;
        }
        start = at + 1;
    }
    false
}

// ---------------------------------------------------------------------------
// Static tables and patterns
// ---------------------------------------------------------------------------

static MONTHS: phf::Map<&'static str, u32> = phf::phf_map! {
    "january" => 1, "jan" => 1, "जनवरी" => 1,
    "february" => 2, "feb" => 2, "फरवरी" => 2,
    "march" => 3, "mar" => 3, "मार्च" => 3,
    "april" => 4, "apr" => 4, "अप्रैल" => 4,
    "may" => 5, "मई" => 5,
    "june" => 6, "jun" => 6, "जून" => 6,
    "july" => 7, "jul" => 7, "जुलाई" => 7,
    "august" => 8, "aug" => 8, "अगस्त" => 8,
    "september" => 9, "sep" => 9, "सितंबर" => 9,
    "october" => 10, "oct" => 10, "अक्टूबर" => 10,
    "november" => 11, "nov" => 11, "नवंबर" => 11,
    "december" => 12, "dec" => 12, "दिसंबर" => 12,
};

const MONTH_NAMES: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sep|oct|nov|dec|जनवरी|फरवरी|मार्च|अप्रैल|मई|जून|जुलाई|अगस्त|सितंबर|अक्टूबर|नवंबर|दिसंबर";

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

static DAY_MONTH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTH_NAMES})\s+(\d{{4}})\b"
    ))
    .unwrap()
});

static MONTH_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b({MONTH_NAMES})\b(?:\s+(\d{{4}}))?")).unwrap()
});

static LAST_MONTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(last|previous|pichle|pichhle)\s+(month|maheene|mahine|महीने)\b)|(?:पिछले\s+महीने)")
        .unwrap()
});

static LAST_N_DAYS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:last|past|pichle|pichhle)\s+(\d+)\s+(?:days|din|दिन)\b").unwrap()
});

static BARE_YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());

static TODAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(today|aaj)\b").unwrap());

static CARD_PHRASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(credit|debit)\s+card(s)?\b").unwrap());

static MODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(upi|neft|rtgs|imps|cash|card|atm|ft)\b").unwrap());

static CREDIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(credit|credits|credited|incoming|received|deposit|deposits|deposited|jama|क्रेडिट|जमा)\b")
        .unwrap()
});

static DEBIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(debit|debits|debited|spent|spending|spends|paid|withdrawal|withdrawals|withdrawn|outgoing|expense|expenses|kharcha|kharche|डेबिट|खर्च|खर्चा)\b")
        .unwrap()
});

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(₹\s*|\brs\.?\s*|\binr\s*|\brupees?\s*)?(\d+(?:,\d+)*(?:\.\d+)?)\s*(k|l|lakh|lakhs|thousand)?\b")
        .unwrap()
});

// Strict bounds ("above ₹X" excludes ₹X itself)...
static ABOVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(above|over|exceeding|greater than|more than|se zyada|zyada|se adhik)\b)|(?:से\s+(?:ज्यादा|अधिक))")
        .unwrap()
});

static BELOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(below|under|less than|se kam|kam)\b)|(?:से\s+कम)").unwrap()
});

// ...while "at least/at most" keep the boundary value in.
static AT_LEAST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(at least|minimum of)\b").unwrap());

static AT_MOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(at most|no more than|maximum of)\b").unwrap());

static ACCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:account|acc|a/c|khata|खाता)\s*(?:number|no|#)?\s*[:=]?\s*(\d{6,})").unwrap()
});

static TXN_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:transaction id|txn id|transaction number|txn no)\s*[:#]?\s*([a-z0-9][a-z0-9\-]*)")
        .unwrap()
});

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).unwrap());

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(?:by|from|to|with|se|ko)\s+)([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)").unwrap()
});

static TOP_N_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\btop\s+(\d+)\b").unwrap());

static HIGHEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(top|highest|largest|biggest|maximum)\b").unwrap());

static LOWEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(smallest|lowest|minimum)\b").unwrap());

static RECENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(latest|recent|newest)\b").unwrap());

static OLDEST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(oldest|earliest)\b").unwrap());

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "in", "on", "at", "for", "with", "was", "were", "is",
    "are", "be", "been", "to", "from", "by", "me", "my", "i", "you", "your", "please", "show",
    "give", "get", "did", "do", "does", "what", "which", "how", "many", "much", "all", "every",
    "list", "display", "find", "transaction", "transactions", "txn", "between", "above", "below",
    "under", "over", "than", "last", "this", "that", "month", "months", "week", "year", "days",
    "since", "more", "less", "where", "when", "have", "has", "had",
    // Hinglish fillers
    "mujhe", "meri", "mere", "mera", "saari", "sabhi", "sab", "dikhao", "batao", "wali", "wale",
    "kitna", "kitne", "kitni", "kya", "aur", "hai", "hain", "ka", "ki", "ke", "ko", "se",
    "zyada", "kam", "paisa", "paise", "rupees", "rupaye", "pichle", "din",
];

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract a [`FilterSpec`] from a prompt, resolving relative dates against
/// the current UTC date.
pub fn extract_filters(prompt: &str) -> FilterSpec {
    extract_filters_at(prompt, Utc::now().date_naive())
}

/// Extract a [`FilterSpec`], resolving relative dates against `today`.
pub fn extract_filters_at(prompt: &str, today: NaiveDate) -> FilterSpec {
    let mut spec = FilterSpec::default();
    let mut lower = prompt.to_lowercase();

    // Modes first: "credit card" / "debit card" are CARD, and must not leak
    // into type detection.
    if CARD_PHRASE_RE.is_match(&lower) {
        push_unique(&mut spec.modes, "CARD".to_string());
        lower = CARD_PHRASE_RE.replace_all(&lower, " card ").into_owned();
    }
    if lower.contains("fund transfer") {
        push_unique(&mut spec.modes, "FT".to_string());
    }
    for cap in MODE_RE.captures_iter(&lower) {
        push_unique(&mut spec.modes, cap[1].to_uppercase());
    }

    if CREDIT_RE.is_match(&lower) {
        spec.types.push(TxnType::Credit);
    }
    if DEBIT_RE.is_match(&lower) {
        spec.types.push(TxnType::Debit);
    }

    // Dates. `scrubbed` accumulates the text with date (and count) tokens
    // blanked out so the amount scan does not mistake them for amounts.
    let mut scrubbed = lower.clone();
    extract_dates(&lower, today, &mut spec, &mut scrubbed);

    // Top-N and ordering, before amounts ("top 5" is not ₹5).
    if let Some(cap) = TOP_N_RE.captures(&scrubbed) {
        spec.top_n = cap[1].parse().ok();
        scrubbed = TOP_N_RE.replace_all(&scrubbed, " ").into_owned();
    }
    if HIGHEST_RE.is_match(&scrubbed) {
        spec.sort = Some(SortSpec { field: SortField::Amount, order: SortOrder::Desc });
        spec.top_n = spec.top_n.or(Some(10));
    } else if LOWEST_RE.is_match(&scrubbed) {
        spec.sort = Some(SortSpec { field: SortField::Amount, order: SortOrder::Asc });
        spec.top_n = spec.top_n.or(Some(10));
    } else if RECENT_RE.is_match(&scrubbed) {
        spec.sort = Some(SortSpec { field: SortField::Date, order: SortOrder::Desc });
    } else if OLDEST_RE.is_match(&scrubbed) {
        spec.sort = Some(SortSpec { field: SortField::Date, order: SortOrder::Asc });
    } else if spec.top_n.is_some() {
        spec.sort = Some(SortSpec { field: SortField::Amount, order: SortOrder::Desc });
    }

    // Account and txn-id constraints (scrub them before the amount pass so a
    // nine-digit account number is not read as ₹).
    for cap in ACCOUNT_RE.captures_iter(&scrubbed.clone()) {
        push_unique(&mut spec.accounts, cap[1].to_string());
        scrubbed = scrubbed.replacen(&cap[1], " ", 1);
    }
    for cap in TXN_ID_RE.captures_iter(&scrubbed.clone()) {
        push_unique(&mut spec.txn_ids, cap[1].to_string());
        scrubbed = scrubbed.replacen(&cap[1], " ", 1);
    }
    for cap in QUOTED_RE.captures_iter(prompt) {
        // Apostrophes inside words ("what's ... friend's") produce bogus
        // single-quote captures; only space-free tokens are taken from them.
        let token = match (cap.get(1), cap.get(2)) {
            (Some(m), _) => m.as_str().trim(),
            (None, Some(m)) if !m.as_str().trim().contains(' ') => m.as_str().trim(),
            _ => continue,
        };
        if token.is_empty() {
            continue;
        }
        let is_id_like = !token.contains(' ')
            && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && token.chars().any(|c| c.is_ascii_digit());
        if is_id_like {
            if token.len() >= 6 && token.chars().all(|c| c.is_ascii_digit()) {
                push_unique(&mut spec.accounts, token.to_string());
            } else {
                push_unique(&mut spec.txn_ids, token.to_string());
            }
        } else {
            push_unique(&mut spec.narration_terms, token.to_string());
            spec.strict_narration = spec.strict_narration || token.contains(' ');
        }
    }

    // Person names after by/from/to/with (Hinglish: se/ko), matched against
    // the original casing. Multi-word names are matched strictly.
    for cap in NAME_RE.captures_iter(prompt) {
        let name = cap[1].trim().to_string();
        if MONTHS.contains_key(name.to_lowercase().as_str()) {
            continue;
        }
        spec.strict_narration = spec.strict_narration || name.contains(' ');
        push_unique(&mut spec.narration_terms, name);
    }

    extract_amounts(&scrubbed, &mut spec);

    spec.keywords = extract_keywords(&lower, &spec);

    spec
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.iter().any(|v| *v == value) {
        list.push(value);
    }
}

fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_y, next_m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let to = NaiveDate::from_ymd_opt(next_y, next_m, 1)? - Duration::days(1);
    Some((from, to))
}

fn extract_dates(lower: &str, today: NaiveDate, spec: &mut FilterSpec, scrubbed: &mut String) {
    // Absolute ISO dates
    let iso: Vec<NaiveDate> = ISO_DATE_RE
        .captures_iter(lower)
        .filter_map(|c| NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?))
        .collect();
    if !iso.is_empty() {
        *scrubbed = ISO_DATE_RE.replace_all(scrubbed, " ").into_owned();
        if iso.len() >= 2 {
            spec.date_from = iso.iter().min().copied();
            spec.date_to = iso.iter().max().copied();
        } else if lower.contains("since") || lower.contains("from") {
            spec.date_from = Some(iso[0]);
            spec.date_to = Some(today);
        } else {
            spec.date_from = Some(iso[0]);
            spec.date_to = Some(iso[0]);
        }
        return;
    }

    // "10 Feb 2024" style
    if let Some(cap) = DAY_MONTH_YEAR_RE.captures(lower) {
        let day: u32 = cap[1].parse().unwrap_or(1);
        let month = MONTHS.get(&cap[2]).copied().unwrap_or(1);
        let year: i32 = cap[3].parse().unwrap_or(today.year());
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            *scrubbed = DAY_MONTH_YEAR_RE.replace_all(scrubbed, " ").into_owned();
            if lower.contains("since") {
                spec.date_from = Some(date);
                spec.date_to = Some(today);
            } else {
                spec.date_from = Some(date);
                spec.date_to = Some(date);
            }
            return;
        }
    }

    // Relative phrases
    if LAST_MONTH_RE.is_match(lower) {
        let first_of_this = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap();
        let last_of_prev = first_of_this - Duration::days(1);
        if let Some((from, to)) = month_range(last_of_prev.year(), last_of_prev.month()) {
            spec.date_from = Some(from);
            spec.date_to = Some(to);
        }
        return;
    }
    if let Some(cap) = LAST_N_DAYS_RE.captures(lower) {
        if let Ok(n) = cap[1].parse::<i64>() {
            *scrubbed = LAST_N_DAYS_RE.replace_all(scrubbed, " ").into_owned();
            spec.date_from = Some(today - Duration::days((n - 1).max(0)));
            spec.date_to = Some(today);
            return;
        }
    }
    if lower.contains("this week") {
        let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        spec.date_from = Some(monday);
        spec.date_to = Some(today);
        return;
    }
    if lower.contains("this month") || lower.contains("is maheene") || lower.contains("इस महीने") {
        spec.date_from = NaiveDate::from_ymd_opt(today.year(), today.month(), 1);
        spec.date_to = Some(today);
        return;
    }
    if lower.contains("this year") {
        spec.date_from = NaiveDate::from_ymd_opt(today.year(), 1, 1);
        spec.date_to = Some(today);
        return;
    }
    if lower.contains("yesterday") {
        let y = today - Duration::days(1);
        spec.date_from = Some(y);
        spec.date_to = Some(y);
        return;
    }
    if TODAY_RE.is_match(lower) || lower.contains("आज") {
        spec.date_from = Some(today);
        spec.date_to = Some(today);
        return;
    }

    // Month name, with optional year
    if let Some(cap) = MONTH_YEAR_RE.captures(lower) {
        if let Some(month) = MONTHS.get(&cap[1]).copied() {
            let year = cap
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or_else(|| today.year());
            if let Some((from, to)) = month_range(year, month) {
                *scrubbed = MONTH_YEAR_RE.replace_all(scrubbed, " ").into_owned();
                spec.date_from = Some(from);
                spec.date_to = Some(to);
                return;
            }
        }
    }

    // Bare year ("in 2024")
    if let Some(cap) = BARE_YEAR_RE.captures(lower) {
        if let Ok(year) = cap[1].parse::<i32>() {
            *scrubbed = BARE_YEAR_RE.replace_all(scrubbed, " ").into_owned();
            spec.date_from = NaiveDate::from_ymd_opt(year, 1, 1);
            spec.date_to = NaiveDate::from_ymd_opt(year, 12, 31);
        }
    }
}

fn extract_amounts(scrubbed: &str, spec: &mut FilterSpec) {
    let mut amounts: Vec<f64> = Vec::new();
    let mut any_currency_marked = false;

    for cap in AMOUNT_RE.captures_iter(scrubbed) {
        let marked = cap.get(1).is_some();
        let suffix = cap.get(3).map(|m| m.as_str());
        let digits = cap[2].replace(',', "");

        // A bare 20xx with no currency marker or suffix is a year, not money.
        if !marked && suffix.is_none() && digits.len() == 4 && digits.starts_with("20") {
            continue;
        }

        let Ok(mut value) = digits.parse::<f64>() else { continue };
        value *= match suffix {
            Some("k") | Some("thousand") => 1_000.0,
            Some("l") | Some("lakh") | Some("lakhs") => 100_000.0,
            _ => 1.0,
        };
        any_currency_marked |= marked;
        amounts.push(value);
    }

    if amounts.is_empty() {
        return;
    }

    // Inclusive phrases first: "no more than" must not be read as the
    // strict "more than".
    if scrubbed.contains("between") && amounts.len() >= 2 {
        let (mut min, mut max) = (amounts[0], amounts[1]);
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }
        spec.amount_min = Some(AmountBound::inclusive(min));
        spec.amount_max = Some(AmountBound::inclusive(max));
    } else if AT_LEAST_RE.is_match(scrubbed) {
        spec.amount_min = Some(AmountBound::inclusive(amounts[0]));
    } else if AT_MOST_RE.is_match(scrubbed) {
        spec.amount_max = Some(AmountBound::inclusive(amounts[0]));
    } else if ABOVE_RE.is_match(scrubbed) {
        spec.amount_min = Some(AmountBound::exclusive(amounts[0]));
    } else if BELOW_RE.is_match(scrubbed) {
        spec.amount_max = Some(AmountBound::exclusive(amounts[0]));
    } else if amounts.len() == 1 && any_currency_marked {
        spec.amount_min = Some(AmountBound::inclusive(amounts[0]));
        spec.amount_max = Some(AmountBound::inclusive(amounts[0]));
    }
}

fn extract_keywords(lower: &str, spec: &FilterSpec) -> Vec<String> {
    let mode_words: Vec<String> = spec.modes.iter().map(|m| m.to_lowercase()).collect();
    let mut keywords = Vec::new();

    for raw in lower.split(|c: char| !c.is_alphanumeric()) {
        let word = raw.trim();
        if word.len() < 3 || word.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        if STOPWORDS.contains(&word)
            || MONTHS.contains_key(word)
            || mode_words.iter().any(|m| m == word)
            || CREDIT_RE.is_match(word)
            || DEBIT_RE.is_match(word)
            || HIGHEST_RE.is_match(word)
            || LOWEST_RE.is_match(word)
        {
            continue;
        }
        push_unique(&mut keywords, word.to_string());
    }

    keywords
}
