//! Weighted reciprocal rank fusion

use std::collections::HashMap;

/// One ranked list of chunk ids (best first) with its fusion weight
#[derive(Debug, Clone, Copy)]
pub struct RankedList<'a> {
    pub ids: &'a [String],
    pub weight: f64,
}

/// Fuse ranked lists: each id scores `weight / (rrf_k + rank)` per list it
/// appears in, rank 1-based. Ties break on id so output is deterministic.
pub fn fuse_rrf(lists: &[RankedList<'_>], rrf_k: u32) -> Vec<(String, f64)> {
    let rrf_base = f64::from(rrf_k.max(1));
    let mut merged = HashMap::<&str, f64>::new();

    for list in lists {
        if list.weight <= 0.0 {
            continue;
        }
        for (index, id) in list.ids.iter().enumerate() {
            let contribution = list.weight / (rrf_base + (index + 1) as f64);
            *merged.entry(id.as_str()).or_insert(0.0) += contribution;
        }
    }

    let mut out: Vec<(String, f64)> = merged
        .into_iter()
        .map(|(id, score)| (id.to_string(), score))
        .collect();
    out.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}
