//! Linked symbol stream backing one pre-tokenized chunk
//!
//! Merging a pair rewrites the left cell in place and unlinks the right
//! cell, so neighbour indices stay valid across merges and the trainer can
//! patch pair counts without rescanning the chunk.

use crate::{Pair, TokenId};

#[derive(Debug, Clone)]
struct Cell {
    id: TokenId,
    prev: Option<usize>,
    next: Option<usize>,
    alive: bool,
}

/// One chunk of the corpus as a linked sequence of symbol IDs.
///
/// Cells live in an arena `Vec`; removal marks a cell dead and relinks its
/// neighbours instead of shifting storage.
#[derive(Debug, Clone)]
pub struct SymbolChunk {
    cells: Vec<Cell>,
    head: Option<usize>,
    live: usize,
}

impl SymbolChunk {
    pub fn from_ids(ids: &[TokenId]) -> Self {
        let cells: Vec<Cell> = ids
            .iter()
            .enumerate()
            .map(|(i, &id)| Cell {
                id,
                prev: if i == 0 { None } else { Some(i - 1) },
                next: if i + 1 < ids.len() { Some(i + 1) } else { None },
                alive: true,
            })
            .collect();

        SymbolChunk {
            head: if cells.is_empty() { None } else { Some(0) },
            live: cells.len(),
            cells,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let ids: Vec<TokenId> = bytes.iter().map(|&b| TokenId::from(b)).collect();
        Self::from_ids(&ids)
    }

    /// Number of live symbols.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn head(&self) -> Option<usize> {
        self.head
    }

    pub fn id(&self, index: usize) -> TokenId {
        self.cells[index].id
    }

    pub fn is_alive(&self, index: usize) -> bool {
        self.cells[index].alive
    }

    pub fn next(&self, index: usize) -> Option<usize> {
        self.cells[index].next
    }

    pub fn prev(&self, index: usize) -> Option<usize> {
        self.cells[index].prev
    }

    /// Merge the symbol at `cursor` with its successor.
    ///
    /// The cell at `cursor` is rewritten to `new_id` and the successor is
    /// unlinked. Returns the index now following `cursor`, if any. The
    /// cursor must be alive and must have a successor.
    pub fn merge_at(&mut self, cursor: usize, new_id: TokenId) -> Option<usize> {
        debug_assert!(self.cells[cursor].alive, "merge_at on dead cell");
        let victim = self.cells[cursor]
            .next
            .expect("merge_at requires a successor");

        let after = self.cells[victim].next;
        self.cells[cursor].id = new_id;
        self.cells[cursor].next = after;
        if let Some(a) = after {
            self.cells[a].prev = Some(cursor);
        }

        let dead = &mut self.cells[victim];
        dead.alive = false;
        dead.prev = None;
        dead.next = None;
        self.live -= 1;

        after
    }

    /// Traverse live cell indices in sequence order.
    pub fn indices(&self) -> Indices<'_> {
        Indices {
            chunk: self,
            cursor: self.head,
        }
    }

    /// Traverse live symbol IDs in sequence order.
    pub fn symbols(&self) -> impl Iterator<Item = TokenId> + '_ {
        self.indices().map(|i| self.id(i))
    }

    /// Iterate over all adjacent symbol pairs.
    pub fn pairs(&self) -> impl Iterator<Item = Pair> + '_ {
        PairIter {
            chunk: self,
            cursor: self.head,
        }
    }
}

pub struct Indices<'a> {
    chunk: &'a SymbolChunk,
    cursor: Option<usize>,
}

impl Iterator for Indices<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let index = self.cursor?;
        self.cursor = self.chunk.next(index);
        Some(index)
    }
}

struct PairIter<'a> {
    chunk: &'a SymbolChunk,
    cursor: Option<usize>,
}

impl Iterator for PairIter<'_> {
    type Item = Pair;

    fn next(&mut self) -> Option<Pair> {
        let left = self.cursor?;
        let right = self.chunk.next(left)?;
        self.cursor = Some(right);
        Some((self.chunk.id(left), self.chunk.id(right)))
    }
}
