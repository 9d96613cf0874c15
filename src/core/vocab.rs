//! Artifact parsing and the token string ↔ id store.
//!
//! A vocabulary is shipped as up to four files sharing a path prefix:
//!
//! ```text
//! gpt2.merges     first_id second_id merged_id   (one rule per line, rank = rule index)
//! gpt2.bytes      token id for byte 0, 1, ... 255 (one per line)
//! gpt2.specials   NAME id                        (PAD, BOS, EOS, UNK, MASK)
//! gpt2.json       {"token-string": id, ...}      (optional)
//! ```
//!
//! Parsers report the artifact kind and the 1-based line of the first
//! offending line. All load-time problems are fatal.

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::merges::MergeTriple;
use super::special::{SpecialIds, SpecialKind};

/// Integer identifier of a token.
pub type TokenId = u32;

/// Which artifact an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Merges,
    ByteTable,
    Specials,
    VocabJson,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactKind::Merges => "merge table",
            ArtifactKind::ByteTable => "byte table",
            ArtifactKind::Specials => "specials",
            ArtifactKind::VocabJson => "vocabulary JSON",
        })
    }
}

/// Errors that can occur while loading or validating a vocabulary.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("cannot read {kind} artifact {}: {source}", .path.display())]
    ArtifactMissing {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// `line` is 1-based; 0 means the problem is not tied to one line.
    #[error("malformed {kind} artifact at line {line}: {reason}")]
    ArtifactMalformed {
        kind: ArtifactKind,
        line: usize,
        reason: String,
    },
    #[error("inconsistent vocabulary: {0}")]
    VocabularyInconsistent(String),
}

impl VocabError {
    fn malformed(kind: ArtifactKind, line: usize, reason: impl Into<String>) -> Self {
        VocabError::ArtifactMalformed {
            kind,
            line,
            reason: reason.into(),
        }
    }
}

/// Locations of the artifact files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub merges: PathBuf,
    pub bytes: PathBuf,
    pub specials: PathBuf,
    pub vocab: Option<PathBuf>,
}

impl ArtifactPaths {
    /// `<prefix>.merges`, `<prefix>.bytes` and `<prefix>.specials`, no JSON.
    pub fn from_prefix(prefix: impl AsRef<Path>) -> Self {
        let prefix = prefix.as_ref();
        Self {
            merges: with_suffix(prefix, "merges"),
            bytes: with_suffix(prefix, "bytes"),
            specials: with_suffix(prefix, "specials"),
            vocab: None,
        }
    }

    pub fn with_vocab(mut self, path: impl Into<PathBuf>) -> Self {
        self.vocab = Some(path.into());
        self
    }
}

// Appends rather than replacing an extension, so "gpt2.v1" keeps its ".v1".
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn parse_id(field: &str, kind: ArtifactKind, line: usize) -> Result<TokenId, VocabError> {
    field
        .parse::<TokenId>()
        .map_err(|_| VocabError::malformed(kind, line, format!("invalid token id {field:?}")))
}

/// Parse exactly `N` whitespace-separated ids from one line.
fn parse_ids<const N: usize>(
    text: &str,
    kind: ArtifactKind,
    line: usize,
) -> Result<[TokenId; N], VocabError> {
    let mut ids = [0; N];
    let mut fields = text.split_whitespace();
    for slot in ids.iter_mut() {
        let field = fields.next().ok_or_else(|| {
            VocabError::malformed(kind, line, format!("expected {N} ids, got {text:?}"))
        })?;
        *slot = parse_id(field, kind, line)?;
    }
    if fields.next().is_some() {
        return Err(VocabError::malformed(
            kind,
            line,
            format!("expected {N} ids, got {text:?}"),
        ));
    }
    Ok(ids)
}

/// Non-blank lines with their 1-based line numbers.
fn content_lines(data: &str) -> impl Iterator<Item = (usize, &str)> {
    data.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

/// Parse a merge table. Rule *n* (counting non-blank lines) has rank *n*.
pub fn parse_merges(data: &str) -> Result<Vec<MergeTriple>, VocabError> {
    let mut merges = Vec::new();
    let mut seen: FxHashMap<(TokenId, TokenId), usize> = FxHashMap::default();

    for (line_no, line) in content_lines(data) {
        let [left, right, merged] = parse_ids::<3>(line, ArtifactKind::Merges, line_no)?;
        if let Some(first) = seen.insert((left, right), line_no) {
            return Err(VocabError::malformed(
                ArtifactKind::Merges,
                line_no,
                format!("pair ({left}, {right}) already ranked at line {first}"),
            ));
        }
        merges.push(MergeTriple {
            left,
            right,
            merged,
        });
    }

    Ok(merges)
}

/// Parse the byte table: line *b* holds the token id of byte *b*.
pub fn parse_byte_table(data: &str) -> Result<[TokenId; 256], VocabError> {
    let mut table = [0; 256];
    let mut owner: FxHashMap<TokenId, usize> = FxHashMap::default();
    let mut count = 0usize;
    let mut last_line = 0usize;

    for (line_no, line) in content_lines(data) {
        if count == 256 {
            return Err(VocabError::malformed(
                ArtifactKind::ByteTable,
                line_no,
                "more than 256 entries",
            ));
        }
        let [id] = parse_ids::<1>(line, ArtifactKind::ByteTable, line_no)?;
        if let Some(other) = owner.insert(id, count) {
            return Err(VocabError::malformed(
                ArtifactKind::ByteTable,
                line_no,
                format!("byte {count} reuses id {id} of byte {other}"),
            ));
        }
        table[count] = id;
        count += 1;
        last_line = line_no;
    }

    if count != 256 {
        return Err(VocabError::malformed(
            ArtifactKind::ByteTable,
            last_line,
            format!("expected 256 entries, found {count}"),
        ));
    }
    Ok(table)
}

/// Parse `NAME id` lines. All five names must appear exactly once.
pub fn parse_specials(data: &str) -> Result<SpecialIds, VocabError> {
    let mut ids: [Option<TokenId>; 5] = [None; 5];
    let mut last_line = 0usize;

    for (line_no, line) in content_lines(data) {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(id), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(VocabError::malformed(
                ArtifactKind::Specials,
                line_no,
                format!("expected `NAME id`, got {line:?}"),
            ));
        };
        let kind = SpecialKind::from_name(name).ok_or_else(|| {
            VocabError::malformed(
                ArtifactKind::Specials,
                line_no,
                format!("bad special name {name:?}"),
            )
        })?;
        let id = parse_id(id, ArtifactKind::Specials, line_no)?;
        let slot = &mut ids[kind as usize];
        if slot.is_some() {
            return Err(VocabError::malformed(
                ArtifactKind::Specials,
                line_no,
                format!("{kind} is listed twice"),
            ));
        }
        *slot = Some(id);
        last_line = line_no;
    }

    let mut resolved = [0; 5];
    for kind in SpecialKind::ALL {
        resolved[kind as usize] = ids[kind as usize].ok_or_else(|| {
            VocabError::malformed(ArtifactKind::Specials, last_line, format!("{kind} is missing"))
        })?;
    }
    Ok(SpecialIds::from_array(resolved))
}

/// Parse a `{"token": id}` JSON object.
pub fn parse_vocab_json(data: &[u8]) -> Result<FxHashMap<String, TokenId>, VocabError> {
    let map: FxHashMap<String, TokenId> = serde_json::from_slice(data).map_err(|e| {
        VocabError::malformed(ArtifactKind::VocabJson, e.line(), e.to_string())
    })?;

    let mut ids: FxHashSet<TokenId> = FxHashSet::default();
    ids.reserve(map.len());
    for (token, &id) in &map {
        if !ids.insert(id) {
            return Err(VocabError::malformed(
                ArtifactKind::VocabJson,
                0,
                format!("id {id} is used by {token:?} and another token"),
            ));
        }
    }
    Ok(map)
}

fn read_artifact(kind: ArtifactKind, path: &Path) -> Result<String, VocabError> {
    std::fs::read_to_string(path).map_err(|source| VocabError::ArtifactMissing {
        kind,
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_merges_file(path: &Path) -> Result<Vec<MergeTriple>, VocabError> {
    let merges = parse_merges(&read_artifact(ArtifactKind::Merges, path)?)?;
    debug!(path = %path.display(), rules = merges.len(), "parsed merge table");
    Ok(merges)
}

pub fn load_byte_table_file(path: &Path) -> Result<[TokenId; 256], VocabError> {
    let table = parse_byte_table(&read_artifact(ArtifactKind::ByteTable, path)?)?;
    debug!(path = %path.display(), "parsed byte table");
    Ok(table)
}

pub fn load_specials_file(path: &Path) -> Result<SpecialIds, VocabError> {
    let specials = parse_specials(&read_artifact(ArtifactKind::Specials, path)?)?;
    debug!(path = %path.display(), ?specials, "parsed specials");
    Ok(specials)
}

pub fn load_vocab_json_file(path: &Path) -> Result<FxHashMap<String, TokenId>, VocabError> {
    let data = std::fs::read(path).map_err(|source| VocabError::ArtifactMissing {
        kind: ArtifactKind::VocabJson,
        path: path.to_path_buf(),
        source,
    })?;
    let tokens = parse_vocab_json(&data)?;
    debug!(path = %path.display(), tokens = tokens.len(), "parsed vocabulary JSON");
    Ok(tokens)
}

/// Bidirectional token string ↔ id map.
///
/// Both directions are one-to-one; inserting a string or id that is already
/// bound to something else fails.
#[derive(Debug, Clone, Default)]
pub struct VocabularyStore {
    token_to_id: FxHashMap<String, TokenId>,
    id_to_token: FxHashMap<TokenId, String>,
}

impl VocabularyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed JSON map. Shared ids are malformed.
    pub fn from_map(map: FxHashMap<String, TokenId>) -> Result<Self, VocabError> {
        let mut id_to_token = FxHashMap::default();
        id_to_token.reserve(map.len());
        for (token, &id) in &map {
            if let Some(other) = id_to_token.insert(id, token.clone()) {
                return Err(VocabError::malformed(
                    ArtifactKind::VocabJson,
                    0,
                    format!("id {id} is used by both {other:?} and {token:?}"),
                ));
            }
        }
        Ok(Self {
            token_to_id: map,
            id_to_token,
        })
    }

    /// Bind `token` to `id`. Re-inserting an identical binding is a no-op.
    pub fn insert(&mut self, token: String, id: TokenId) -> Result<(), VocabError> {
        if let Some(existing) = self.id_to_token.get(&id) {
            if *existing == token {
                return Ok(());
            }
            return Err(VocabError::VocabularyInconsistent(format!(
                "id {id} is bound to {existing:?}, cannot rebind to {token:?}"
            )));
        }
        if let Some(&existing) = self.token_to_id.get(&token) {
            return Err(VocabError::VocabularyInconsistent(format!(
                "token {token:?} is bound to id {existing}, cannot rebind to {id}"
            )));
        }
        self.id_to_token.insert(id, token.clone());
        self.token_to_id.insert(token, id);
        Ok(())
    }

    #[inline]
    pub fn id_for(&self, token: &str) -> Option<TokenId> {
        self.token_to_id.get(token).copied()
    }

    #[inline]
    pub fn token_for(&self, id: TokenId) -> Option<&str> {
        self.id_to_token.get(&id).map(String::as_str)
    }

    pub fn contains_id(&self, id: TokenId) -> bool {
        self.id_to_token.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }

    pub fn max_id(&self) -> Option<TokenId> {
        self.id_to_token.keys().copied().max()
    }

    /// All bindings, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &str)> {
        self.id_to_token.iter().map(|(&id, token)| (id, token.as_str()))
    }
}
