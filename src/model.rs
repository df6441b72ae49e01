//! Plain-text model persistence and token binary helpers
//!
//! The model format is line-oriented with LF endings:
//!
//! ```text
//! minbpe v1
//! <regex pattern, possibly empty>
//! <number of special tokens>
//! <token-string> <id>        (one per special token)
//! <a> <b>                    (one per merge, in learned order)
//! ```
//!
//! A merge line's position assigns its ID: line k (zero-based) defines
//! token `256 + k`. The lookup map and vocabulary are rebuilt from the
//! merge list on load, never stored.

use crate::vocab::Vocabulary;
use crate::{Error, Pair, TokenId};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

pub(crate) const MODEL_VERSION: &str = "minbpe v1";

/// Parsed contents of a model file, before derived state is rebuilt.
#[derive(Debug)]
pub(crate) struct ModelFile {
    pub pattern: String,
    pub special_tokens: Vec<(String, TokenId)>,
    pub merges: Vec<Pair>,
}

pub(crate) fn save_model(
    path: &Path,
    pattern: &str,
    special_tokens: &HashMap<String, TokenId>,
    merges: &[Pair],
) -> Result<(), Error> {
    if merges.is_empty() {
        return Err(Error::State(
            "refusing to save a model with no learned merges".to_string(),
        ));
    }

    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{MODEL_VERSION}")?;
    writeln!(writer, "{pattern}")?;
    writeln!(writer, "{}", special_tokens.len())?;

    let mut specials: Vec<(&String, &TokenId)> = special_tokens.iter().collect();
    specials.sort_by_key(|&(token, &id)| (id, token.clone()));
    for (token, id) in specials {
        writeln!(writer, "{token} {id}")?;
    }

    for (a, b) in merges {
        writeln!(writer, "{a} {b}")?;
    }
    writer.flush()?;
    Ok(())
}

pub(crate) fn load_model(path: &Path) -> Result<ModelFile, Error> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let version = lines
        .next()
        .ok_or_else(|| Error::Format("model file is empty".to_string()))??;
    if version != MODEL_VERSION {
        return Err(Error::Format(format!(
            "unexpected model version: {version:?} (expected {MODEL_VERSION:?})"
        )));
    }

    let pattern = lines
        .next()
        .ok_or_else(|| Error::Format("model file missing pattern line".to_string()))??;

    let special_count: usize = lines
        .next()
        .ok_or_else(|| Error::Format("model file missing special-token count".to_string()))??
        .trim()
        .parse()
        .map_err(|_| Error::Format("special-token count is not a number".to_string()))?;

    let mut special_tokens = Vec::with_capacity(special_count);
    for _ in 0..special_count {
        let line = lines
            .next()
            .ok_or_else(|| Error::Format("model file ends inside special tokens".to_string()))??;
        let mut parts = line.split_whitespace();
        let (Some(token), Some(id)) = (parts.next(), parts.next()) else {
            return Err(Error::Format(format!("malformed special token line: {line:?}")));
        };
        let id: TokenId = id
            .parse()
            .map_err(|_| Error::Format(format!("bad special token id in line: {line:?}")))?;
        special_tokens.push((token.to_string(), id));
    }

    let mut merges = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(a), Some(b)) = (parts.next(), parts.next()) else {
            return Err(Error::Format(format!("malformed merge line: {line:?}")));
        };
        let a: TokenId = a
            .parse()
            .map_err(|_| Error::Format(format!("bad merge symbol in line: {line:?}")))?;
        let b: TokenId = b
            .parse()
            .map_err(|_| Error::Format(format!("bad merge symbol in line: {line:?}")))?;

        // Each merge may only reference bytes or earlier merges, otherwise
        // vocabulary replay would read past the table.
        let defined = 256 + merges.len() as TokenId;
        if a >= defined || b >= defined {
            return Err(Error::Format(format!(
                "merge ({a}, {b}) references a symbol not yet defined at id {defined}"
            )));
        }
        merges.push((a, b));
    }

    let learned_limit = 256 + merges.len() as TokenId;
    for (token, id) in &special_tokens {
        if *id < learned_limit {
            return Err(Error::Format(format!(
                "special token {token:?} id {id} collides with learned ids 0..{learned_limit}"
            )));
        }
    }

    Ok(ModelFile {
        pattern,
        special_tokens,
        merges,
    })
}

/// Write the human-readable vocab dump: one `<id>: "<bytes>"` line per
/// entry, non-printable bytes rendered as the replacement glyph.
pub(crate) fn write_vocab_dump(path: &Path, vocab: &Vocabulary) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (id, bytes) in vocab.iter() {
        let rendered: String = bytes
            .iter()
            .map(|&b| if (32..=126).contains(&b) { b as char } else { '\u{FFFD}' })
            .collect();
        writeln!(writer, "{id:<6}: \"{rendered}\"")?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse special-token registrations: whitespace-separated `token id`
/// pairs. Token strings must not contain whitespace, which the format
/// makes unrepresentable anyway.
pub(crate) fn parse_special_tokens(input: &str) -> Result<Vec<(String, TokenId)>, Error> {
    let mut entries = Vec::new();
    let mut fields = input.split_whitespace();
    while let Some(token) = fields.next() {
        let id = fields.next().ok_or_else(|| {
            Error::Format(format!("special token {token:?} has no id"))
        })?;
        let id: TokenId = id
            .parse()
            .map_err(|_| Error::Format(format!("bad id {id:?} for special token {token:?}")))?;
        entries.push((token.to_string(), id));
    }
    Ok(entries)
}

/// Write encoded token IDs as a flat little-endian u32 sequence.
pub fn write_encoded<P: AsRef<Path>>(path: P, tokens: &[TokenId]) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    for &token in tokens {
        writer.write_all(&token.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read encoded token IDs back until end of file.
pub fn read_encoded<P: AsRef<Path>>(path: P) -> Result<Vec<TokenId>, Error> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.len() % 4 != 0 {
        return Err(Error::Format(format!(
            "encoded token file is truncated: {} trailing bytes",
            bytes.len() % 4
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|word| TokenId::from_le_bytes([word[0], word[1], word[2], word[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn model_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.model");

        let specials: HashMap<String, TokenId> =
            [("<|end|>".to_string(), 5000)].into_iter().collect();
        let merges = vec![(98, 99), (97, 256)];
        save_model(&path, crate::GPT2_SPLIT_PATTERN, &specials, &merges).unwrap();

        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded.pattern, crate::GPT2_SPLIT_PATTERN);
        assert_eq!(loaded.special_tokens, vec![("<|end|>".to_string(), 5000)]);
        assert_eq!(loaded.merges, merges);
    }

    #[test]
    fn empty_pattern_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.model");
        save_model(&path, "", &HashMap::new(), &[(120, 121)]).unwrap();

        let loaded = load_model(&path).unwrap();
        assert_eq!(loaded.pattern, "");
        assert!(loaded.special_tokens.is_empty());
        assert_eq!(loaded.merges, vec![(120, 121)]);
    }

    #[test]
    fn save_without_merges_is_a_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.model");
        let err = save_model(&path, "", &HashMap::new(), &[]).unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[test]
    fn wrong_version_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.model");
        fs::write(&path, "minbpe v2\n\n0\n97 98\n").unwrap();
        let err = load_model(&path).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn forward_reference_in_merges_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fwd.model");
        // First merge line may only reference bytes, not id 300.
        fs::write(&path, "minbpe v1\n\n0\n97 300\n").unwrap();
        let err = load_model(&path).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn special_id_collision_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clash.model");
        // One merge: learned ids span 0..257, so special id 256 collides.
        fs::write(&path, "minbpe v1\n\n1\n<|end|> 256\n97 98\n").unwrap();
        let err = load_model(&path).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn vocab_dump_renders_printable_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.vocab");

        let vocab = Vocabulary::from_merges(&[(104, 105)]);
        write_vocab_dump(&path, &vocab).unwrap();

        let dump = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 257);
        assert_eq!(lines[104], "104   : \"h\"");
        assert_eq!(lines[256], "256   : \"hi\"");
        // Non-printable bytes render as the replacement glyph.
        assert_eq!(lines[0], "0     : \"\u{FFFD}\"");
    }

    #[test]
    fn parse_special_tokens_reads_pairs() {
        let entries = parse_special_tokens("<|end|> 100257\n<|fim|> 100258\n").unwrap();
        assert_eq!(
            entries,
            vec![
                ("<|end|>".to_string(), 100257),
                ("<|fim|>".to_string(), 100258),
            ]
        );
        assert!(parse_special_tokens("").unwrap().is_empty());
    }

    #[test]
    fn parse_special_tokens_rejects_garbage() {
        assert!(matches!(
            parse_special_tokens("<|end|>").unwrap_err(),
            Error::Format(_)
        ));
        assert!(matches!(
            parse_special_tokens("<|end|> notanumber").unwrap_err(),
            Error::Format(_)
        ));
    }

    #[test]
    fn encoded_tokens_round_trip_as_u32_le() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.bin");

        let tokens = vec![0, 255, 256, 100257, u32::MAX];
        write_encoded(&path, &tokens).unwrap();

        let raw = fs::read(&path).unwrap();
        assert_eq!(raw.len(), tokens.len() * 4);
        assert_eq!(&raw[..4], &[0, 0, 0, 0]);
        assert_eq!(&raw[8..12], &[0, 1, 0, 0]); // 256 little-endian

        assert_eq!(read_encoded(&path).unwrap(), tokens);
    }

    #[test]
    fn truncated_token_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("torn.bin");
        fs::write(&path, [1, 0, 0, 0, 2, 0]).unwrap();
        let err = read_encoded(&path).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
