//! Budget-constrained chunk selection.
//!
//! Greedy pack by descending score. Greedy is the right shape here: costs
//! are near-uniform and the score is the value signal, so the knapsack
//! solves itself. Two slack margins keep the final document inside the
//! caller's budget: only 95% of it is spendable at all (formatting
//! overhead lives in the other 5%), and packing stops early at 98% of
//! that — the remaining tail would only admit trivially small chunks.

use crate::models::ScoredChunk;

/// Fraction of the caller's budget the selector may spend.
const EFFECTIVE_FRACTION: f64 = 0.95;
/// Stop scanning once this share of the effective budget is packed.
const STOP_FRACTION: f64 = 0.98;
/// Token overhead charged per chunk for its rendered header.
pub const CHUNK_OVERHEAD: usize = 50;

/// Pack ranked chunks under `budget` tokens. Input must be sorted by
/// descending score; ties keep their input order.
pub fn select_chunks(ranked: Vec<ScoredChunk>, budget: usize) -> Vec<ScoredChunk> {
    let effective = (budget as f64 * EFFECTIVE_FRACTION).floor() as usize;
    let stop_at = (effective as f64 * STOP_FRACTION) as usize;

    let mut selected = Vec::new();
    let mut total = 0usize;

    for candidate in ranked {
        if total >= stop_at {
            break;
        }
        let cost = candidate.chunk.tokens + CHUNK_OVERHEAD;
        if total + cost <= effective {
            total += cost;
            selected.push(candidate);
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkKind};
    use std::path::PathBuf;

    fn scored(rel: &str, tokens: usize, score: f64) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: Chunk::make_id(rel, 1),
                path: PathBuf::from(rel),
                rel_path: rel.to_string(),
                content: String::new(),
                start_line: 1,
                end_line: 1,
                kind: ChunkKind::Function,
                name: None,
                language: "python".to_string(),
                tokens,
            },
            score,
        }
    }

    #[test]
    fn budget_is_never_exceeded() {
        let ranked: Vec<ScoredChunk> = (0..10)
            .map(|i| scored(&format!("f{}.py", i), 10_000, 1.0 - i as f64 * 0.01))
            .collect();
        let selected = select_chunks(ranked, 25_000);

        // 25k budget → 23,750 effective; two 10,050-cost chunks fit.
        assert_eq!(selected.len(), 2);
        let spent: usize = selected.iter().map(|s| s.chunk.tokens + CHUNK_OVERHEAD).sum();
        assert!(spent <= 23_750);
    }

    #[test]
    fn highest_scores_win() {
        let ranked = vec![
            scored("best.py", 100, 10.0),
            scored("good.py", 100, 5.0),
            scored("meh.py", 100, 1.0),
        ];
        let selected = select_chunks(ranked, 400);
        // 380 effective; two chunks of cost 150 fit, the third does not.
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].chunk.rel_path, "best.py");
        assert_eq!(selected[1].chunk.rel_path, "good.py");
    }

    #[test]
    fn oversized_chunk_is_skipped_not_fatal() {
        let ranked = vec![
            scored("huge.py", 1_000_000, 10.0),
            scored("small.py", 50, 5.0),
        ];
        let selected = select_chunks(ranked, 1_000);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].chunk.rel_path, "small.py");
    }

    #[test]
    fn stops_once_nearly_full() {
        // First chunk lands right at the stop threshold; nothing after it
        // is considered even though it would fit.
        let ranked = vec![scored("a.py", 930, 2.0), scored("b.py", 1, 1.0)];
        let selected = select_chunks(ranked, 1_000);
        // effective 950, stop at 931; a costs 980 > 950 → skipped,
        // b costs 51 → fits.
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].chunk.rel_path, "b.py");

        let ranked = vec![scored("a.py", 880, 2.0), scored("b.py", 1, 1.0)];
        let selected = select_chunks(ranked, 1_000);
        // a costs 930 ≤ 950 and puts the total at 930 < 931, so b (51)
        // no longer fits the 950 cap but is still scanned.
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].chunk.rel_path, "a.py");
    }

    #[test]
    fn empty_input_selects_nothing() {
        assert!(select_chunks(Vec::new(), 50_000).is_empty());
    }
}
