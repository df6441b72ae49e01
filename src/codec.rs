//! Encoding and decoding with a learned merge table
//!
//! Encoding splits out registered special tokens first, pre-tokenizes the
//! ordinary stretches, then applies merges inside each chunk in the order
//! they were learned: a work queue keyed by merge rank replays the
//! training history, earliest merge first, leftmost occurrence first.
//! A greedy scan-per-pass variant is available behind an explicit flag;
//! where the two disagree, learned order is the canonical answer.

use crate::chunk::SymbolChunk;
use crate::pretokenize::Pretokenizer;
use crate::vocab::Vocabulary;
use crate::{Error, Pair, TokenId};
use log::warn;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// One stretch of the input: ordinary text to be pre-tokenized, or a
/// special-token occurrence that bypasses the merge table.
#[derive(Debug, PartialEq, Eq)]
enum Fragment<'t> {
    Text(&'t str),
    Special(TokenId),
}

/// Split `text` on registered special-token strings.
///
/// The earliest occurrence wins; among specials starting at the same
/// position the longest string wins, so a special sharing a prefix with a
/// longer one never shadows it.
fn split_on_special<'t>(
    text: &'t str,
    special_tokens: &HashMap<String, TokenId>,
) -> Vec<Fragment<'t>> {
    if special_tokens.is_empty() {
        return vec![Fragment::Text(text)];
    }

    let mut fragments = Vec::new();
    let mut rest = text;
    loop {
        let mut found: Option<(usize, &str, TokenId)> = None;
        for (token, &id) in special_tokens {
            let Some(at) = rest.find(token.as_str()) else {
                continue;
            };
            let better = match found {
                None => true,
                Some((best_at, best_token, _)) => {
                    at < best_at || (at == best_at && token.len() > best_token.len())
                }
            };
            if better {
                found = Some((at, token.as_str(), id));
            }
        }

        let Some((at, token, id)) = found else {
            if !rest.is_empty() {
                fragments.push(Fragment::Text(rest));
            }
            return fragments;
        };

        if at > 0 {
            fragments.push(Fragment::Text(&rest[..at]));
        }
        fragments.push(Fragment::Special(id));
        rest = &rest[at + token.len()..];
    }
}

/// A possible merge between two live cells, keyed by the merge's learned
/// ID. Lower IDs were learned earlier and apply first; the left position
/// breaks ties so equal-rank occurrences go left to right.
#[derive(Debug, PartialEq, Eq)]
struct RankedMerge {
    id: TokenId,
    left: usize,
    right: usize,
}

impl Ord for RankedMerge {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest-learned merge
        // at the leftmost position pops first.
        other
            .id
            .cmp(&self.id)
            .then_with(|| other.left.cmp(&self.left))
    }
}

impl PartialOrd for RankedMerge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub(crate) fn encode(
    text: &str,
    pretokenizer: &Pretokenizer,
    merges_lookup: &HashMap<Pair, TokenId>,
    special_tokens: &HashMap<String, TokenId>,
    greedy: bool,
) -> Result<Vec<TokenId>, Error> {
    if text.len() > crate::MAX_INPUT_SIZE {
        return Err(Error::InvalidArgument(format!(
            "input text too large: {} bytes (max {})",
            text.len(),
            crate::MAX_INPUT_SIZE
        )));
    }

    let mut out = Vec::new();
    for fragment in split_on_special(text, special_tokens) {
        match fragment {
            Fragment::Special(id) => out.push(id),
            Fragment::Text(part) => {
                for chunk in pretokenizer.split(part)? {
                    let tokens = if greedy {
                        encode_chunk_greedy(chunk.as_bytes(), merges_lookup)
                    } else {
                        encode_chunk_ranked(chunk.as_bytes(), merges_lookup)
                    };
                    if out.len() + tokens.len() > crate::MAX_OUTPUT_TOKENS {
                        return Err(Error::InvalidArgument(format!(
                            "output would exceed {} tokens",
                            crate::MAX_OUTPUT_TOKENS
                        )));
                    }
                    out.extend(tokens);
                }
            }
        }
    }
    Ok(out)
}

/// Canonical encoding: replay merges in learned order within one chunk.
fn encode_chunk_ranked(bytes: &[u8], merges_lookup: &HashMap<Pair, TokenId>) -> Vec<TokenId> {
    let mut chunk = SymbolChunk::from_bytes(bytes);
    let mut queue = BinaryHeap::new();

    let push_candidate = |queue: &mut BinaryHeap<RankedMerge>,
                              chunk: &SymbolChunk,
                              left: usize,
                              right: usize| {
        if let Some(&id) = merges_lookup.get(&(chunk.id(left), chunk.id(right))) {
            queue.push(RankedMerge { id, left, right });
        }
    };

    let mut cursor = chunk.head();
    while let (Some(left), Some(right)) = (cursor, cursor.and_then(|i| chunk.next(i))) {
        push_candidate(&mut queue, &chunk, left, right);
        cursor = Some(right);
    }

    while let Some(RankedMerge { id, left, right }) = queue.pop() {
        // Cells may have merged away or changed since this candidate was
        // queued; only apply it if the pair still holds exactly this merge.
        if !chunk.is_alive(left) || !chunk.is_alive(right) || chunk.next(left) != Some(right) {
            continue;
        }
        if merges_lookup.get(&(chunk.id(left), chunk.id(right))) != Some(&id) {
            continue;
        }

        let after = chunk.merge_at(left, id);
        if let Some(p) = chunk.prev(left) {
            push_candidate(&mut queue, &chunk, p, left);
        }
        if let Some(n) = after {
            push_candidate(&mut queue, &chunk, left, n);
        }
    }

    chunk.symbols().collect()
}

/// Greedy approximation: scan for any merge-table pair, pass after pass,
/// until a pass changes nothing.
fn encode_chunk_greedy(bytes: &[u8], merges_lookup: &HashMap<Pair, TokenId>) -> Vec<TokenId> {
    let mut ids: Vec<TokenId> = bytes.iter().map(|&b| TokenId::from(b)).collect();
    loop {
        let mut out = Vec::with_capacity(ids.len());
        let mut merged = false;
        let mut i = 0;
        while i < ids.len() {
            if i + 1 < ids.len() {
                if let Some(&id) = merges_lookup.get(&(ids[i], ids[i + 1])) {
                    out.push(id);
                    i += 2;
                    merged = true;
                    continue;
                }
            }
            out.push(ids[i]);
            i += 1;
        }
        ids = out;
        if !merged {
            return ids;
        }
    }
}

/// Map token IDs back to bytes. Special tokens expand to their literal
/// string; unknown IDs are skipped with a warning.
pub(crate) fn decode(
    tokens: &[TokenId],
    vocab: &Vocabulary,
    special_text: &HashMap<TokenId, String>,
) -> Vec<u8> {
    let mut bytes = Vec::new();
    for &id in tokens {
        if let Some(text) = special_text.get(&id) {
            bytes.extend_from_slice(text.as_bytes());
        } else if let Some(expansion) = vocab.get(id) {
            bytes.extend_from_slice(expansion);
        } else {
            warn!("skipping unknown token id {id} during decode");
        }
    }
    bytes
}
