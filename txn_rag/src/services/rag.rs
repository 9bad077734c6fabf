//! Retrieval / aggregation kernel.
//!
//! For each query mode this produces the LLM context subset, the statistics
//! and the matched set used for display and pagination. Scans and
//! aggregations run over the user's store snapshot; nothing here mutates
//! shared state.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use finsight_observability::info;

use crate::errors::ServiceError;
use crate::models::{Bucket, Document, MonthlyBucket, QueryMode, Statistics, TxnType};
use crate::nlp::{
    classify, detect_language, extract_filters, FilterSpec, Language, SortField, SortOrder,
    SortSpec,
};
use crate::services::embedding::{embed_query, Embedder};
use crate::services::llm::ChatMessage;
use crate::services::prompt::{assemble, MAX_CONTEXT_CHARS};
use crate::services::user_store::UserStore;

/// Upper bound on representative documents passed to the model in
/// analytical mode.
pub const ANALYTICAL_SAMPLE_MAX: usize = 60;
const ANALYTICAL_TOP_BY_AMOUNT: usize = 20;

#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub top_k: usize,
    pub smart_full_max: usize,
}

/// Everything a mode pipeline produces for one query.
#[derive(Debug, Clone)]
pub struct KernelOutcome {
    pub mode: QueryMode,
    pub filters: FilterSpec,
    pub filters_applied: Vec<String>,
    pub language: Language,
    /// Count of transactions satisfying the filter (or retrieved, for
    /// vector search) before any display limit.
    pub matching_count: usize,
    /// Display-ordered ordinals into the store's documents, after `top_n`.
    pub matched: Vec<usize>,
    /// Ordinals selected as LLM context, in context order.
    pub context: Vec<usize>,
    pub statistics: Option<Statistics>,
}

pub struct RagKernel {
    pub config: KernelConfig,
}

impl RagKernel {
    pub async fn run(
        &self,
        embedder: &Arc<dyn Embedder>,
        store: &UserStore,
        prompt: &str,
        forced: Option<QueryMode>,
    ) -> Result<KernelOutcome, ServiceError> {
        let filters = extract_filters(prompt);
        let language = detect_language(prompt);
        let mode = forced.unwrap_or_else(|| classify(prompt, &filters));
        info!(mode = %mode, corpus = store.documents.len(), "dispatching query");

        match mode {
            QueryMode::VectorSearch => {
                self.vector_search(embedder, store, prompt, filters, language).await
            }
            QueryMode::Statistical => Ok(self.statistical(store, filters, language)),
            QueryMode::Analytical => Ok(self.analytical(store, filters, language)),
            QueryMode::SmartFull => Ok(self.smart_full(store, filters, language)),
        }
    }

    async fn vector_search(
        &self,
        embedder: &Arc<dyn Embedder>,
        store: &UserStore,
        prompt: &str,
        filters: FilterSpec,
        language: Language,
    ) -> Result<KernelOutcome, ServiceError> {
        let k = self.config.top_k.min(store.documents.len());
        let query_vec = embed_query(embedder.clone(), prompt.to_string())
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let hits = store.index.search(&query_vec, k);
        let matched: Vec<usize> = hits
            .iter()
            .map(|h| h.ordinal)
            .filter(|&ord| filters.matches(&store.documents[ord].txn))
            .collect();

        Ok(KernelOutcome {
            mode: QueryMode::VectorSearch,
            filters_applied: filters.descriptions(),
            filters,
            language,
            matching_count: matched.len(),
            context: matched.clone(),
            matched,
            statistics: None,
        })
    }

    fn statistical(
        &self,
        store: &UserStore,
        filters: FilterSpec,
        language: Language,
    ) -> KernelOutcome {
        let mut matched = filter_ordinals(&store.documents, &filters);
        let statistics = compute_statistics(&store.documents, &matched, true, false);
        let matching_count = matched.len();

        let sort = filters.sort.unwrap_or(SortSpec {
            field: SortField::Amount,
            order: SortOrder::Desc,
        });
        sort_ordinals(&store.documents, &mut matched, sort);

        KernelOutcome {
            mode: QueryMode::Statistical,
            filters_applied: filters.descriptions(),
            filters,
            language,
            matching_count,
            matched,
            context: Vec::new(),
            statistics: Some(statistics),
        }
    }

    fn analytical(
        &self,
        store: &UserStore,
        filters: FilterSpec,
        language: Language,
    ) -> KernelOutcome {
        let mut matched = filter_ordinals(&store.documents, &filters);
        let statistics = compute_statistics(&store.documents, &matched, true, true);
        let matching_count = matched.len();
        let context = analytical_sample(&store.documents, &matched);

        let sort = filters.sort.unwrap_or(SortSpec {
            field: SortField::Amount,
            order: SortOrder::Desc,
        });
        sort_ordinals(&store.documents, &mut matched, sort);

        KernelOutcome {
            mode: QueryMode::Analytical,
            filters_applied: filters.descriptions(),
            filters,
            language,
            matching_count,
            matched,
            context,
            statistics: Some(statistics),
        }
    }

    fn smart_full(
        &self,
        store: &UserStore,
        filters: FilterSpec,
        language: Language,
    ) -> KernelOutcome {
        let mut matched = filter_ordinals(&store.documents, &filters);
        let statistics = compute_statistics(&store.documents, &matched, false, false);
        let matching_count = matched.len();

        let sort = filters.sort.unwrap_or(SortSpec {
            field: SortField::Date,
            order: SortOrder::Desc,
        });
        sort_ordinals(&store.documents, &mut matched, sort);

        if let Some(n) = filters.top_n {
            matched.truncate(n);
        }

        // Context: the (already ordered) matches up to the ceiling, with
        // keyword-hitting narrations pulled to the front.
        let mut context = matched.clone();
        if !filters.keywords.is_empty() {
            let keywords = &filters.keywords;
            context.sort_by_key(|&ord| {
                let narration = store.documents[ord]
                    .txn
                    .narration
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase();
                !keywords.iter().any(|k| narration.contains(k))
            });
        }
        context.truncate(self.config.smart_full_max);

        KernelOutcome {
            mode: QueryMode::SmartFull,
            filters_applied: filters.descriptions(),
            filters,
            language,
            matching_count,
            matched,
            context,
            statistics: Some(statistics),
        }
    }
}

/// Assemble the chat messages for an outcome. Statistics go into the prompt
/// only for the modes that computed them for narration.
pub fn build_messages(store: &UserStore, outcome: &KernelOutcome, prompt: &str) -> Vec<ChatMessage> {
    let texts: Vec<&str> = outcome
        .context
        .iter()
        .map(|&ord| store.documents[ord].text.as_str())
        .collect();

    let statistics = match outcome.mode {
        QueryMode::Analytical | QueryMode::SmartFull => outcome.statistics.as_ref(),
        _ => None,
    };

    assemble(
        prompt,
        outcome.language,
        &outcome.filters_applied,
        statistics,
        &texts,
        MAX_CONTEXT_CHARS,
    )
}

/// Ordinals of all documents satisfying the filter, in corpus order.
pub fn filter_ordinals(docs: &[Document], filters: &FilterSpec) -> Vec<usize> {
    docs.iter()
        .enumerate()
        .filter(|(_, d)| filters.matches(&d.txn))
        .map(|(i, _)| i)
        .collect()
}

/// Sort ordinals by the given spec. Amount sorts break ties by date
/// descending, then txnId ascending; date sorts break ties by txnId.
pub fn sort_ordinals(docs: &[Document], ordinals: &mut [usize], sort: SortSpec) {
    ordinals.sort_by(|&a, &b| {
        let ta = &docs[a].txn;
        let tb = &docs[b].txn;
        let primary = match sort.field {
            SortField::Amount => {
                let ord = ta
                    .amount
                    .partial_cmp(&tb.amount)
                    .unwrap_or(std::cmp::Ordering::Equal);
                match sort.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            }
            SortField::Date => {
                let ord = ta.date().cmp(&tb.date());
                match sort.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            }
        };
        primary
            .then_with(|| tb.date().cmp(&ta.date()))
            .then_with(|| ta.txn_id.cmp(&tb.txn_id))
    });
}

/// Aggregate the filtered set. The tuple is always computed; type/mode and
/// monthly breakdowns are opt-in per mode.
pub fn compute_statistics(
    docs: &[Document],
    ordinals: &[usize],
    with_breakdowns: bool,
    with_monthly: bool,
) -> Statistics {
    let count = ordinals.len() as u64;
    let total: f64 = ordinals.iter().map(|&i| docs[i].txn.amount).sum();
    let average = if count > 0 { total / count as f64 } else { 0.0 };
    let min = ordinals
        .iter()
        .map(|&i| docs[i].txn.amount)
        .reduce(f64::min);
    let max = ordinals
        .iter()
        .map(|&i| docs[i].txn.amount)
        .reduce(f64::max);

    let mut stats = Statistics { count, total, average, min, max, ..Statistics::default() };

    if with_breakdowns && count > 0 {
        let mut by_type: BTreeMap<String, Bucket> = BTreeMap::new();
        let mut by_mode: BTreeMap<String, Bucket> = BTreeMap::new();
        for &i in ordinals {
            let txn = &docs[i].txn;
            if let Some(kind) = txn.kind() {
                let bucket = by_type.entry(kind.as_str().to_string()).or_default();
                bucket.count += 1;
                bucket.total += txn.amount;
            }
            if let Some(mode) = txn.mode_normalized() {
                let bucket = by_mode.entry(mode).or_default();
                bucket.count += 1;
                bucket.total += txn.amount;
            }
        }
        if !by_type.is_empty() {
            stats.by_type = Some(by_type);
        }
        if !by_mode.is_empty() {
            stats.by_mode = Some(by_mode);
        }
    }

    if with_monthly && count > 0 {
        let mut monthly: BTreeMap<String, MonthlyBucket> = BTreeMap::new();
        for &i in ordinals {
            let txn = &docs[i].txn;
            let Some(key) = txn.month_key() else { continue };
            let bucket = monthly.entry(key).or_default();
            bucket.count += 1;
            match txn.kind() {
                Some(TxnType::Credit) => bucket.credit_sum += txn.amount,
                Some(TxnType::Debit) => bucket.debit_sum += txn.amount,
                None => {}
            }
            bucket.net = bucket.credit_sum - bucket.debit_sum;
        }
        if !monthly.is_empty() {
            stats.monthly = Some(monthly);
        }
    }

    stats
}

/// Bounded representative sample for analytical narration: the largest
/// amounts first, then a stratified pick across months, most recent first.
fn analytical_sample(docs: &[Document], matched: &[usize]) -> Vec<usize> {
    let mut sample = Vec::new();
    let mut seen = HashSet::new();

    let mut by_amount = matched.to_vec();
    sort_ordinals(docs, &mut by_amount, SortSpec {
        field: SortField::Amount,
        order: SortOrder::Desc,
    });
    for &ord in by_amount.iter().take(ANALYTICAL_TOP_BY_AMOUNT) {
        if seen.insert(ord) {
            sample.push(ord);
        }
    }

    let mut months: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for &ord in matched {
        let key = docs[ord].txn.month_key().unwrap_or_else(|| "0000-00".to_string());
        months.entry(key).or_default().push(ord);
    }
    let buckets: Vec<Vec<usize>> = months
        .into_iter()
        .rev()
        .map(|(_, mut ords)| {
            sort_ordinals(docs, &mut ords, SortSpec {
                field: SortField::Date,
                order: SortOrder::Desc,
            });
            ords
        })
        .collect();

    let mut cursors = vec![0usize; buckets.len()];
    'fill: loop {
        let mut progressed = false;
        for (bi, bucket) in buckets.iter().enumerate() {
            while cursors[bi] < bucket.len() {
                let ord = bucket[cursors[bi]];
                cursors[bi] += 1;
                if seen.insert(ord) {
                    sample.push(ord);
                    progressed = true;
                    if sample.len() >= ANALYTICAL_SAMPLE_MAX {
                        break 'fill;
                    }
                    break;
                }
            }
        }
        if !progressed {
            break;
        }
    }

    sample
}
