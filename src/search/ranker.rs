use std::num::NonZeroUsize;

use crate::lib::errors::RouterError;

use super::{index::SearchIndex, tokenizer::tokenize};

/// Result count used when the caller does not pass `top_k`.
pub const DEFAULT_TOP_K: usize = 5;

/// Validated, strictly positive result count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopK(NonZeroUsize);

impl TopK {
    /// Accept the caller's optional `top_k`, defaulting to [`DEFAULT_TOP_K`].
    pub fn from_request(raw: Option<i64>) -> Result<Self, RouterError> {
        let Some(value) = raw else {
            return Ok(Self::default());
        };
        usize::try_from(value)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Self)
            .ok_or_else(|| RouterError::InvalidArgument {
                field: "top_k",
                message: format!("must be a positive integer, got {value}"),
            })
    }

    pub fn new(value: usize) -> Option<Self> {
        NonZeroUsize::new(value).map(Self)
    }

    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for TopK {
    fn default() -> Self {
        Self(NonZeroUsize::MIN.saturating_add(DEFAULT_TOP_K - 1))
    }
}

/// One ranked document.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub doc_id: usize,
    pub score: f64,
    pub rank: usize,
}

/// Score every document against `query` and keep the best `top_k`.
///
/// Order is score descending, then doc id ascending, so equal scores (including
/// the all-zero result of an empty query) come back in registration order.
/// Repeated query terms count once.
pub fn rank(index: &SearchIndex, query: &str, top_k: TopK) -> Vec<RankedResult> {
    let mut terms = tokenize(query);
    terms.sort_unstable();
    terms.dedup();

    let mut scores = vec![0.0_f64; index.len()];
    for term in &terms {
        index.accumulate(term, &mut scores);
    }

    let mut order: Vec<(usize, f64)> = scores.into_iter().enumerate().collect();
    order.sort_by(|(a_id, a_score), (b_id, b_score)| {
        b_score.total_cmp(a_score).then_with(|| a_id.cmp(b_id))
    });

    order
        .into_iter()
        .take(top_k.get())
        .enumerate()
        .map(|(rank, (doc_id, score))| RankedResult {
            doc_id,
            score,
            rank,
        })
        .collect()
}
