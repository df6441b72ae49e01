//! Runtime invariant assertions for trainer and codec correctness.
//!
//! Debug-mode checks for the properties the data structures promise:
//! pair counts that mirror the chunks, a vocabulary that tracks the merge
//! list, encoded token IDs inside the learned range or the registered
//! specials. In release builds every helper compiles to a no-op.

use crate::chunk::SymbolChunk;
use crate::pair_index::PairIndex;
use crate::{TokenId, Tokenizer};
use std::collections::HashMap;

/// Asserts that the index holds exactly the adjacent-pair counts present
/// in `chunks`: no stale counts, no missed pairs.
///
/// # Panics
///
/// Panics in debug builds if any count disagrees with a full recount.
pub fn assert_pair_counts_consistent(chunks: &[SymbolChunk], index: &PairIndex) {
    #[cfg(debug_assertions)]
    {
        let mut observed: HashMap<crate::Pair, i64> = HashMap::new();
        for chunk in chunks {
            for pair in chunk.pairs() {
                *observed.entry(pair).or_insert(0) += 1;
            }
        }

        for (pair, count) in index.iter_counts() {
            let actual = observed.get(&pair).copied().unwrap_or(0);
            debug_assert!(
                count == actual,
                "invariant violation: index says pair {pair:?} occurs {count} times, chunks hold {actual}"
            );
        }
        for (pair, &count) in &observed {
            debug_assert!(
                index.lookup(*pair) == Some(count),
                "invariant violation: pair {pair:?} occurs {count} times but the index missed it"
            );
        }
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = (chunks, index);
    }
}

/// Asserts that every token ID in the slice is below `limit` or is a
/// registered special token.
///
/// Encoded output may only contain byte symbols, learned merges and the
/// caller's special IDs, which sit above the learned range by
/// construction.
///
/// # Panics
///
/// Panics in debug builds if any token ID fails both checks.
#[inline]
pub fn assert_tokens_in_bounds(
    tokens: &[TokenId],
    limit: usize,
    special_text: &HashMap<TokenId, String>,
) {
    #[cfg(debug_assertions)]
    {
        for (i, &token) in tokens.iter().enumerate() {
            debug_assert!(
                (token as usize) < limit || special_text.contains_key(&token),
                "invariant violation: token[{i}] = {token} >= limit ({limit}) and is not a special token"
            );
        }
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = (tokens, limit, special_text);
    }
}

/// Asserts that a tokenizer's vocabulary covers exactly the byte symbols
/// plus one entry per learned merge.
///
/// # Panics
///
/// Panics in debug builds if the vocabulary and merge list disagree.
#[inline]
pub fn assert_vocab_consistent(tokenizer: &Tokenizer) {
    #[cfg(debug_assertions)]
    {
        let vocab_size = tokenizer.vocab_size();
        let expected = 256 + tokenizer.merges().len();
        debug_assert!(
            vocab_size == expected,
            "invariant violation: vocab covers {vocab_size} ids, merges imply {expected}"
        );
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = tokenizer;
    }
}
