use std::collections::HashSet;

use vedakb_core::types::{AggregatedResult, Passage, RankOrder, RawHit};

fn sort_key(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Merges hits from every collection into at most `top_k` passages.
///
/// With `RankOrder::Score` hits are stably sorted by descending score first;
/// ties and NaN scores keep arrival order relative to each other. Text is
/// truncated before deduplication, so two hits that only differ past the
/// truncation point collapse into the first one.
pub fn aggregate(mut hits: Vec<RawHit>, top_k: usize, ordering: RankOrder) -> AggregatedResult {
    if top_k == 0 {
        return AggregatedResult::default();
    }
    if ordering == RankOrder::Score {
        hits.sort_by(|a, b| sort_key(b.score).total_cmp(&sort_key(a.score)));
    }

    let mut seen = HashSet::new();
    let mut passages = Vec::with_capacity(top_k);
    for passage in hits.into_iter().filter_map(Passage::from_hit) {
        if !seen.insert(passage.text.clone()) {
            continue;
        }
        passages.push(passage);
        if passages.len() == top_k {
            break;
        }
    }
    AggregatedResult::new(passages)
}
