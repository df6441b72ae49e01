//! Vocabulary: token ID to byte-sequence mapping, derived from merges

use crate::{Pair, TokenId};

/// Byte expansion for every learned token ID.
///
/// IDs `0..=255` are the raw bytes. Every merge appends one entry whose
/// bytes are the concatenation of the two merged entries, so the table is
/// fully determined by the ordered merge list.
#[derive(Debug)]
pub struct Vocabulary {
    entries: Vec<Vec<u8>>,
}

impl Vocabulary {
    /// Create the initial vocabulary of 256 single-byte tokens.
    pub fn new_bytes() -> Self {
        let entries = (0u16..256).map(|b| vec![b as u8]).collect();
        Vocabulary { entries }
    }

    /// Rebuild a vocabulary by replaying merges from ID 256 upward.
    pub fn from_merges(merges: &[Pair]) -> Self {
        let mut vocab = Self::new_bytes();
        for &pair in merges {
            vocab.push_merge(pair);
        }
        vocab
    }

    /// Append the entry for a newly learned merge and return its token ID.
    ///
    /// Both halves must already be present; the trainer only records merges
    /// of symbols it has previously assigned.
    pub fn push_merge(&mut self, (a, b): Pair) -> TokenId {
        let mut bytes = self.entries[a as usize].clone();
        bytes.extend_from_slice(&self.entries[b as usize]);
        self.entries.push(bytes);
        (self.entries.len() - 1) as TokenId
    }

    pub fn get(&self, id: TokenId) -> Option<&[u8]> {
        self.entries.get(id as usize).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in ID order, for the vocab dump.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &[u8])> {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, bytes)| (id as TokenId, bytes.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_vocab_is_byte_identity() {
        let vocab = Vocabulary::new_bytes();
        assert_eq!(vocab.len(), 256);
        for i in 0..=255u8 {
            assert_eq!(vocab.get(TokenId::from(i)), Some(&[i][..]));
        }
    }

    #[test]
    fn push_merge_concatenates() {
        let mut vocab = Vocabulary::new_bytes();
        let id = vocab.push_merge((TokenId::from(b'h'), TokenId::from(b'i')));
        assert_eq!(id, 256);
        assert_eq!(vocab.get(256), Some(&b"hi"[..]));

        let id = vocab.push_merge((256, TokenId::from(b'!')));
        assert_eq!(id, 257);
        assert_eq!(vocab.get(257), Some(&b"hi!"[..]));
    }

    #[test]
    fn from_merges_replays_in_order() {
        let merges = vec![(98, 99), (97, 256)];
        let vocab = Vocabulary::from_merges(&merges);
        assert_eq!(vocab.len(), 258);
        assert_eq!(vocab.get(256), Some(&b"bc"[..]));
        assert_eq!(vocab.get(257), Some(&b"abc"[..]));
    }

    #[test]
    fn get_out_of_range_is_none() {
        let vocab = Vocabulary::new_bytes();
        assert_eq!(vocab.get(256), None);
    }
}
