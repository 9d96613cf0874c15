//! Greedy merge loop over token ids.
//!
//! Each step finds the lowest rank among all adjacent pairs, then merges
//! *every* non-overlapping occurrence of that pair, scanning left to right.
//! The loop stops when no adjacent pair has a rank. Every step removes at
//! least one symbol, so a chunk of `n` symbols needs at most `n - 1` steps.
//!
//! Two implementations produce identical output:
//!
//! - [`merge_linear`] rescans a flat vector. Cheap for short chunks.
//! - [`merge_heap`] keeps a min-heap of candidate pairs over a flat
//!   doubly-linked list and validates entries lazily. It pops a whole rank
//!   at a time and applies it in position order, which is the same as one
//!   left-to-right pass.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::merges::{MergeRankTable, Rank};
use super::vocab::TokenId;

/// Chunks with fewer symbols than this use the linear scan.
pub const HEAP_THRESHOLD: usize = 64;

/// Merge a sequence of single-byte token ids.
pub fn byte_pair_merge(symbols: Vec<TokenId>, merges: &MergeRankTable) -> Vec<TokenId> {
    if symbols.len() < 2 {
        return symbols;
    }
    if symbols.len() < HEAP_THRESHOLD {
        merge_linear(symbols, merges)
    } else {
        merge_heap(&symbols, merges)
    }
}

/// Pass-based merge on a flat vector.
pub fn merge_linear(mut symbols: Vec<TokenId>, merges: &MergeRankTable) -> Vec<TokenId> {
    let mut scratch = Vec::with_capacity(symbols.len());

    while symbols.len() >= 2 {
        let best = symbols
            .windows(2)
            .filter_map(|w| merges.rule(w[0], w[1]).map(|rule| (rule, w[0], w[1])))
            .min_by_key(|(rule, _, _)| rule.rank);
        let Some((rule, left, right)) = best else {
            break;
        };

        scratch.clear();
        let mut i = 0;
        while i < symbols.len() {
            if i + 1 < symbols.len() && symbols[i] == left && symbols[i + 1] == right {
                scratch.push(rule.merged);
                i += 2;
            } else {
                scratch.push(symbols[i]);
                i += 1;
            }
        }
        std::mem::swap(&mut symbols, &mut scratch);
    }

    symbols
}

const NONE: u32 = u32::MAX;

struct Node {
    token_id: TokenId,
    prev: u32,
    next: u32,
    alive: bool,
}

fn build_nodes(ids: &[TokenId]) -> Vec<Node> {
    let n = ids.len();
    ids.iter()
        .enumerate()
        .map(|(i, &id)| Node {
            token_id: id,
            prev: if i > 0 { (i - 1) as u32 } else { NONE },
            next: if i + 1 < n { (i + 1) as u32 } else { NONE },
            alive: true,
        })
        .collect()
}

/// Rank of merging node `i` with its successor.
#[inline]
fn pair_rank(nodes: &[Node], i: u32, merges: &MergeRankTable) -> Option<Rank> {
    if i == NONE {
        return None;
    }
    let j = nodes[i as usize].next;
    if j == NONE {
        return None;
    }
    merges.rank_of(nodes[i as usize].token_id, nodes[j as usize].token_id)
}

/// Heap-driven merge on a linked list. Same output as [`merge_linear`].
pub fn merge_heap(symbols: &[TokenId], merges: &MergeRankTable) -> Vec<TokenId> {
    if symbols.len() < 2 {
        return symbols.to_vec();
    }

    let mut nodes = build_nodes(symbols);
    let mut heap: BinaryHeap<Reverse<(Rank, u32)>> = BinaryHeap::with_capacity(symbols.len());
    for i in 0..(symbols.len() - 1) as u32 {
        if let Some(rank) = pair_rank(&nodes, i, merges) {
            heap.push(Reverse((rank, i)));
        }
    }

    let mut batch: Vec<u32> = Vec::new();
    let mut touched: Vec<u32> = Vec::new();

    while let Some(Reverse((rank, first))) = heap.pop() {
        batch.clear();
        batch.push(first);
        while let Some(&Reverse((next_rank, idx))) = heap.peek() {
            if next_rank != rank {
                break;
            }
            heap.pop();
            batch.push(idx);
        }
        // Node indices follow list order, so sorting gives a left-to-right pass.
        batch.sort_unstable();
        batch.dedup();

        touched.clear();
        for &i in &batch {
            let node = &nodes[i as usize];
            if !node.alive || node.next == NONE {
                continue;
            }
            let j = node.next;
            // Stale entries: the pair at `i` changed since it was pushed.
            let Some(rule) = merges.rule(node.token_id, nodes[j as usize].token_id) else {
                continue;
            };
            if rule.rank != rank {
                continue;
            }

            let j_next = nodes[j as usize].next;
            let left = &mut nodes[i as usize];
            left.token_id = rule.merged;
            left.next = j_next;
            if j_next != NONE {
                nodes[j_next as usize].prev = i;
            }
            nodes[j as usize].alive = false;
            touched.push(i);
        }

        // New pairs only become candidates once the whole rank is applied.
        for &i in &touched {
            if let Some(r) = pair_rank(&nodes, i, merges) {
                heap.push(Reverse((r, i)));
            }
            let prev = nodes[i as usize].prev;
            if let Some(r) = pair_rank(&nodes, prev, merges) {
                heap.push(Reverse((r, prev)));
            }
        }
    }

    let mut out = Vec::with_capacity(symbols.len());
    let mut cur = 0u32;
    while cur != NONE {
        out.push(nodes[cur as usize].token_id);
        cur = nodes[cur as usize].next;
    }
    out
}
