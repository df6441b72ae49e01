//! BPE training: the iterative merge loop
//!
//! Pre-tokenizes the corpus, counts adjacent pairs, then repeatedly merges
//! the most frequent pair until the requested vocabulary size is reached or
//! no pair occurs anymore.
//!
//! The two tie-break strategies maintain the pair index differently. FIRST
//! reproduces a naive rescan: after every merge the index is rebuilt, so the
//! tie key is the pair's position in a fresh left-to-right sweep. LEXICAL
//! keeps one index alive for the whole run and patches only the pair counts
//! in the merged neighbourhood.

use crate::chunk::SymbolChunk;
use crate::invariants;
use crate::pair_index::{PairIndex, TieBreak};
use crate::pretokenize::Pretokenizer;
use crate::vocab::Vocabulary;
use crate::{Error, Pair, TokenId};
use log::{debug, info};
use std::collections::HashMap;

/// Everything a training run produces; the ordered merge list is
/// authoritative, the lookup map and vocabulary are derived from it.
#[derive(Debug)]
pub struct TrainedModel {
    pub merges: Vec<Pair>,
    pub merges_lookup: HashMap<Pair, TokenId>,
    pub vocab: Vocabulary,
}

/// Learn up to `vocab_size - 256` merges from `text`.
pub fn train(
    pretokenizer: &Pretokenizer,
    text: &str,
    vocab_size: usize,
    tie_break: TieBreak,
    verbose: bool,
) -> Result<TrainedModel, Error> {
    if vocab_size < 256 {
        return Err(Error::InvalidArgument(format!(
            "vocab_size must be at least 256, got {vocab_size}"
        )));
    }

    let mut chunks: Vec<SymbolChunk> = pretokenizer
        .split(text)?
        .into_iter()
        .map(|chunk| SymbolChunk::from_bytes(chunk.as_bytes()))
        .collect();

    let mut index = scan_pairs(&chunks, tie_break);
    let mut merges = Vec::with_capacity(vocab_size - 256);
    let mut merges_lookup = HashMap::with_capacity(vocab_size - 256);
    let mut vocab = Vocabulary::new_bytes();

    for new_id in 256..vocab_size as TokenId {
        let Some((pair, count)) = index.top() else {
            break;
        };

        merges.push(pair);
        merges_lookup.insert(pair, new_id);
        vocab.push_merge(pair);

        if verbose {
            info!(
                "merge pair ({}, {}) -> {} count {}",
                pair.0, pair.1, new_id, count
            );
        } else {
            debug!(
                "merge pair ({}, {}) -> {} count {}",
                pair.0, pair.1, new_id, count
            );
        }

        match tie_break {
            TieBreak::First => {
                for chunk in &mut chunks {
                    merge_chunk(chunk, pair, new_id, None);
                }
                index = scan_pairs(&chunks, tie_break);
            }
            TieBreak::Lexical => {
                for chunk in &mut chunks {
                    merge_chunk(chunk, pair, new_id, Some(&mut index));
                }
                invariants::assert_pair_counts_consistent(&chunks, &index);
            }
        }
    }

    if verbose {
        let remaining: usize = chunks.iter().map(SymbolChunk::len).sum();
        info!(
            "corpus of {} bytes holds {} symbols after {} merges",
            text.len(),
            remaining,
            merges.len()
        );
    }

    Ok(TrainedModel {
        merges,
        merges_lookup,
        vocab,
    })
}

/// Count every adjacent pair across all chunks in one left-to-right sweep.
pub(crate) fn scan_pairs(chunks: &[SymbolChunk], tie_break: TieBreak) -> PairIndex {
    let mut index = PairIndex::new(tie_break);
    for chunk in chunks {
        for pair in chunk.pairs() {
            index.bump(pair, 1);
        }
    }
    index
}

/// Replace every adjacent `(a, b)` in `chunk` with `new_id`, left to right,
/// non-overlapping.
///
/// With an index, each merge also patches the counts in its neighbourhood:
/// the merged pair goes down by one, the pairs the rewrite destroyed
/// (`(prev, a)` and `(b, after)`) go down, and the pairs it created
/// (`(prev, new_id)` and `(new_id, after)`) go up.
pub(crate) fn merge_chunk(
    chunk: &mut SymbolChunk,
    (a, b): Pair,
    new_id: TokenId,
    mut index: Option<&mut PairIndex>,
) {
    let mut cursor = chunk.head();
    while let Some(cur) = cursor {
        let Some(next) = chunk.next(cur) else {
            break;
        };
        if chunk.id(cur) != a || chunk.id(next) != b {
            cursor = Some(next);
            continue;
        }

        let prev = chunk.prev(cur);
        let after = chunk.merge_at(cur, new_id);

        if let Some(index) = index.as_deref_mut() {
            index.bump((a, b), -1);
            if let Some(p) = prev {
                index.bump((chunk.id(p), a), -1);
                index.bump((chunk.id(p), new_id), 1);
            }
            if let Some(n) = after {
                index.bump((b, chunk.id(n)), -1);
                index.bump((new_id, chunk.id(n)), 1);
            }
        }

        // Resume after the merged cell so consecutive matches cannot
        // overlap: `a b b` yields `[new, b]`, `a a a` yields `[new, a]`.
        cursor = after;
    }
}
