//! # bytepair
//!
//! Pure Rust byte-pair-encoding tokenizer: trainer, codec and plain-text
//! model persistence, modeled on the GPT-2/GPT-4 pipeline.
//!
//! ## Features
//!
//! - 🦀 Pure Rust - no bindings to a C tokenizer
//! - 📖 Train a merge table from any UTF-8 corpus
//! - ✂️ GPT-2 and GPT-4 pre-tokenization patterns, or bring your own
//! - 🔖 Special tokens that bypass the learned merges
//! - 💾 Plain-text `minbpe v1` model format
//!
//! ## Example
//!
//! ```
//! use bytepair::Tokenizer;
//!
//! # fn main() -> Result<(), bytepair::Error> {
//! let mut tokenizer = Tokenizer::new();
//! tokenizer.train("aaabdaaabac", 258, false)?;
//!
//! let tokens = tokenizer.encode("aaabac")?;
//! assert_eq!(tokenizer.decode(&tokens), b"aaabac");
//! # Ok(())
//! # }
//! ```

use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;

pub mod chunk;
mod codec;
pub mod invariants;
pub mod model;
pub mod pair_index;
pub mod pretokenize;
mod trainer;
pub mod vocab;

pub use model::{read_encoded, write_encoded};
pub use pair_index::TieBreak;
pub use pretokenize::{SplitPreset, GPT2_SPLIT_PATTERN, GPT4_SPLIT_PATTERN};
pub use vocab::Vocabulary;

use pretokenize::Pretokenizer;

/// Maximum input text size in bytes (10MB).
pub const MAX_INPUT_SIZE: usize = 10 * 1024 * 1024;

/// Maximum output tokens per encode call - prevents memory exhaustion.
pub const MAX_OUTPUT_TOKENS: usize = 1_000_000;

/// Type alias for token IDs
///
/// IDs `0..=255` are the raw bytes, IDs from 256 upward are learned merges
/// in the order they were discovered. Special tokens live in the same
/// space at caller-chosen IDs above the learned range.
pub type TokenId = u32;

/// An ordered pair of adjacent symbol IDs.
pub type Pair = (TokenId, TokenId);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("pattern error: {0}")]
    Pattern(#[from] fancy_regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model format error: {0}")]
    Format(String),

    #[error("state error: {0}")]
    State(String),
}

/// BPE tokenizer: learned merge table, vocabulary, split pattern and
/// special tokens.
///
/// A fresh instance knows only the 256 byte symbols. `train` fills the
/// merge table from a corpus; `encode`/`decode` use it; `save` and
/// `from_model_file` persist it.
///
/// # Example
///
/// ```
/// use bytepair::{SplitPreset, Tokenizer};
///
/// # fn main() -> Result<(), bytepair::Error> {
/// let mut tokenizer = Tokenizer::with_preset(SplitPreset::Gpt4)?;
/// tokenizer.train("low lower lowest", 300, false)?;
/// let tokens = tokenizer.encode("lower")?;
/// assert_eq!(tokenizer.decode(&tokens), b"lower");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Tokenizer {
    pretokenizer: Pretokenizer,
    special_tokens: HashMap<String, TokenId>,
    special_text: HashMap<TokenId, String>,
    merges: Vec<Pair>,
    merges_lookup: HashMap<Pair, TokenId>,
    vocab: Vocabulary,
    tie_break: TieBreak,
    greedy_encode: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    /// Create a tokenizer with no split pattern: the whole input is a
    /// single chunk.
    pub fn new() -> Self {
        Self::from_parts(Pretokenizer::identity(), Vec::new(), Vec::new())
    }

    /// Create a tokenizer using one of the built-in split patterns.
    #[must_use = "with_preset returns a Result that must be handled"]
    pub fn with_preset(preset: SplitPreset) -> Result<Self, Error> {
        Self::with_pattern(preset.pattern())
    }

    /// Create a tokenizer with a custom split pattern.
    ///
    /// The empty pattern means no splitting. Anything else must compile as
    /// a `fancy_regex` pattern or construction fails with
    /// [`Error::Pattern`].
    #[must_use = "with_pattern returns a Result that must be handled"]
    pub fn with_pattern(pattern: &str) -> Result<Self, Error> {
        Ok(Self::from_parts(
            Pretokenizer::from_pattern(pattern)?,
            Vec::new(),
            Vec::new(),
        ))
    }

    fn from_parts(
        pretokenizer: Pretokenizer,
        merges: Vec<Pair>,
        specials: Vec<(String, TokenId)>,
    ) -> Self {
        let merges_lookup = merges
            .iter()
            .enumerate()
            .map(|(rank, &pair)| (pair, 256 + rank as TokenId))
            .collect();
        let vocab = Vocabulary::from_merges(&merges);
        let special_tokens: HashMap<String, TokenId> = specials.into_iter().collect();
        let special_text = special_tokens
            .iter()
            .map(|(token, &id)| (id, token.clone()))
            .collect();

        Tokenizer {
            pretokenizer,
            special_tokens,
            special_text,
            merges,
            merges_lookup,
            vocab,
            tie_break: TieBreak::default(),
            greedy_encode: false,
        }
    }

    /// Choose how equal pair counts are broken during training.
    ///
    /// [`TieBreak::First`] (the default) prefers the pair seen earliest in
    /// a scan of the corpus; [`TieBreak::Lexical`] prefers the
    /// component-wise smaller pair.
    pub fn set_tie_break(&mut self, strategy: TieBreak) {
        self.tie_break = strategy;
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Switch `encode` to the greedy scan-per-pass approximation.
    ///
    /// The default encoder replays merges strictly in the order they were
    /// learned, which is the canonical behaviour; the greedy scan can
    /// disagree with it on some corpora but needs no priority queue.
    pub fn set_greedy_encode(&mut self, greedy: bool) {
        self.greedy_encode = greedy;
    }

    /// The split pattern in use; empty when the input is not split.
    pub fn pattern(&self) -> &str {
        self.pretokenizer.pattern()
    }

    /// Learned merges in discovery order; merge `k` produced token
    /// `256 + k`.
    pub fn merges(&self) -> &[Pair] {
        &self.merges
    }

    /// Vocabulary size: 256 byte symbols plus one per learned merge.
    /// Special tokens are not counted.
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Registered special tokens.
    pub fn special_tokens(&self) -> &HashMap<String, TokenId> {
        &self.special_tokens
    }

    /// Train the merge table on `text`, learning up to `vocab_size - 256`
    /// merges.
    ///
    /// Replaces any previously learned state. Training stops early when no
    /// adjacent pair remains in the corpus; the result is a partial
    /// vocabulary, not an error.
    ///
    /// # Arguments
    ///
    /// * `text` - UTF-8 training corpus, materialized in memory
    /// * `vocab_size` - target vocabulary size, at least 256
    /// * `verbose` - emit a log record per learned merge
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `vocab_size < 256`; [`Error::Pattern`]
    /// if the split pattern fails during matching.
    #[must_use = "train returns a Result that must be handled"]
    pub fn train(&mut self, text: &str, vocab_size: usize, verbose: bool) -> Result<(), Error> {
        let trained = trainer::train(
            &self.pretokenizer,
            text,
            vocab_size,
            self.tie_break,
            verbose,
        )?;
        self.merges = trained.merges;
        self.merges_lookup = trained.merges_lookup;
        self.vocab = trained.vocab;
        invariants::assert_vocab_consistent(self);
        Ok(())
    }

    /// Encode text into a sequence of token IDs.
    ///
    /// Registered special-token occurrences map to their IDs; everything
    /// else is split by the pattern and merged chunk by chunk.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] on oversized input or output;
    /// [`Error::Pattern`] if the split pattern fails during matching.
    #[must_use = "encode returns a Result that must be handled"]
    pub fn encode(&self, text: &str) -> Result<Vec<TokenId>, Error> {
        let tokens = codec::encode(
            text,
            &self.pretokenizer,
            &self.merges_lookup,
            &self.special_tokens,
            self.greedy_encode,
        )?;
        invariants::assert_tokens_in_bounds(&tokens, self.vocab.len(), &self.special_text);
        Ok(tokens)
    }

    /// Encode multiple texts in parallel.
    ///
    /// Outputs are in input order. Safe because encoding never mutates the
    /// tokenizer.
    #[must_use = "encode_batch returns a Result that must be handled"]
    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<TokenId>>, Error> {
        texts.par_iter().map(|text| self.encode(text)).collect()
    }

    /// Decode token IDs back into bytes.
    ///
    /// Special tokens expand to their registered string. Unknown IDs are
    /// skipped with a logged warning; round-trip is guaranteed at the byte
    /// level, so the result need not be valid UTF-8 at token boundaries.
    pub fn decode(&self, tokens: &[TokenId]) -> Vec<u8> {
        codec::decode(tokens, &self.vocab, &self.special_text)
    }

    /// Decode token IDs into a string, replacing invalid UTF-8.
    pub fn decode_text(&self, tokens: &[TokenId]) -> String {
        String::from_utf8_lossy(&self.decode(tokens)).into_owned()
    }

    /// Register the special tokens, replacing any previous registration.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if an ID collides with the byte symbols
    /// or the learned merge range.
    #[must_use = "set_special_tokens returns a Result that must be handled"]
    pub fn set_special_tokens<I>(&mut self, entries: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = (String, TokenId)>,
    {
        let learned_limit = 256 + self.merges.len() as TokenId;
        let mut special_tokens = HashMap::new();
        let mut special_text = HashMap::new();
        for (token, id) in entries {
            // Whitespace would break the model file's token-id lines, and
            // the empty string would match everywhere.
            if token.is_empty() || token.chars().any(char::is_whitespace) {
                return Err(Error::InvalidArgument(format!(
                    "special token {token:?} must be non-empty and free of whitespace"
                )));
            }
            if id < learned_limit {
                return Err(Error::InvalidArgument(format!(
                    "special token {token:?} id {id} collides with learned ids 0..{learned_limit}"
                )));
            }
            special_text.insert(id, token.clone());
            special_tokens.insert(token, id);
        }
        self.special_tokens = special_tokens;
        self.special_text = special_text;
        Ok(())
    }

    /// Register special tokens from `token id` pairs, one per line.
    #[must_use = "set_special_tokens_from_str returns a Result that must be handled"]
    pub fn set_special_tokens_from_str(&mut self, input: &str) -> Result<(), Error> {
        let entries = model::parse_special_tokens(input)?;
        self.set_special_tokens(entries)
    }

    /// Register special tokens from a file of `token id` pairs.
    #[must_use = "load_special_tokens returns a Result that must be handled"]
    pub fn load_special_tokens<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let input = std::fs::read_to_string(path)?;
        self.set_special_tokens_from_str(&input)
    }

    /// Save the model in the plain-text `minbpe v1` format.
    ///
    /// With `write_vocab`, also writes a human-readable `<path>.vocab`
    /// sibling file (for inspection only; it is never read back).
    ///
    /// # Errors
    ///
    /// [`Error::State`] when no merges have been learned yet;
    /// [`Error::Io`] on file errors.
    #[must_use = "save returns a Result that must be handled"]
    pub fn save<P: AsRef<Path>>(&self, path: P, write_vocab: bool) -> Result<(), Error> {
        let path = path.as_ref();
        model::save_model(
            path,
            self.pretokenizer.pattern(),
            &self.special_tokens,
            &self.merges,
        )?;

        if write_vocab {
            let mut vocab_path = path.as_os_str().to_os_string();
            vocab_path.push(".vocab");
            model::write_vocab_dump(Path::new(&vocab_path), &self.vocab)?;
        }
        Ok(())
    }

    /// Load a tokenizer from a `minbpe v1` model file.
    ///
    /// The vocabulary is rebuilt by replaying the merge list; the split
    /// pattern is recompiled from its stored source.
    ///
    /// # Errors
    ///
    /// [`Error::Format`] for a wrong version line, malformed contents or a
    /// special-token ID inside the learned range; [`Error::Pattern`] if
    /// the stored pattern no longer compiles; [`Error::Io`] on file
    /// errors.
    #[must_use = "from_model_file returns a Result that must be handled"]
    pub fn from_model_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let loaded = model::load_model(path.as_ref())?;
        let pretokenizer = Pretokenizer::from_pattern(&loaded.pattern)?;
        let tokenizer = Self::from_parts(pretokenizer, loaded.merges, loaded.special_tokens);
        invariants::assert_vocab_consistent(&tokenizer);
        Ok(tokenizer)
    }
}
