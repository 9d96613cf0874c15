//! The loaded, validated, immutable vocabulary.
//!
//! All cross-artifact checks happen here, once:
//!
//! - every byte id names the byte's single-symbol token
//! - every merge names tokens that exist by the time the rule is reached,
//!   and its result is the concatenation of its inputs
//! - special ids stay clear of byte ids and merge results
//!
//! Encoding can then rely on every id it produces being decodable.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::info;

use super::bpe::byte_pair_merge;
use super::byte_level::ByteMapper;
use super::merges::{MergeRankTable, MergeTriple, Rank};
use super::special::{SpecialIds, SpecialKind, SpecialLiterals, SpecialTokens};
use super::vocab::{
    load_byte_table_file, load_merges_file, load_specials_file, load_vocab_json_file,
    ArtifactPaths, TokenId, VocabError, VocabularyStore,
};

/// Load-time configuration.
#[derive(Debug, Clone, Default)]
pub struct VocabularyOptions {
    pub byte_mapper: ByteMapper,
    pub special_literals: SpecialLiterals,
}

impl VocabularyOptions {
    pub fn with_byte_mapper(mut self, mapper: ByteMapper) -> Self {
        self.byte_mapper = mapper;
        self
    }

    pub fn with_special_literal(mut self, kind: SpecialKind, literal: impl Into<String>) -> Self {
        self.special_literals = self.special_literals.with(kind, literal);
        self
    }
}

/// Parsed artifacts, before validation.
#[derive(Debug, Clone)]
pub struct VocabularyParts {
    pub byte_ids: [TokenId; 256],
    pub merges: Vec<MergeTriple>,
    pub specials: SpecialIds,
    /// Token strings from the vocabulary JSON. When absent, strings are
    /// derived from the byte table and the merges.
    pub tokens: Option<FxHashMap<String, TokenId>>,
}

/// Read and validate the artifacts with default options.
pub fn load_vocabulary(paths: &ArtifactPaths) -> Result<Vocabulary, VocabError> {
    load_vocabulary_with(paths, &VocabularyOptions::default())
}

pub fn load_vocabulary_with(
    paths: &ArtifactPaths,
    options: &VocabularyOptions,
) -> Result<Vocabulary, VocabError> {
    let parts = VocabularyParts {
        merges: load_merges_file(&paths.merges)?,
        byte_ids: load_byte_table_file(&paths.bytes)?,
        specials: load_specials_file(&paths.specials)?,
        tokens: paths.vocab.as_deref().map(load_vocab_json_file).transpose()?,
    };
    Vocabulary::from_parts(parts, options)
}

fn inconsistent(message: String) -> VocabError {
    VocabError::VocabularyInconsistent(message)
}

/// Byte table, merge ranks, token strings and special tokens.
///
/// Immutable after construction and safe to share across threads.
#[derive(Debug)]
pub struct Vocabulary {
    mapper: ByteMapper,
    store: VocabularyStore,
    merges: MergeRankTable,
    byte_ids: [TokenId; 256],
    specials: SpecialTokens,
    has_token_file: bool,
}

impl Vocabulary {
    pub fn from_parts(
        parts: VocabularyParts,
        options: &VocabularyOptions,
    ) -> Result<Self, VocabError> {
        let merges = MergeRankTable::from_triples(parts.merges)?;
        let has_token_file = parts.tokens.is_some();
        let mut store = match parts.tokens {
            Some(map) => VocabularyStore::from_map(map)?,
            None => VocabularyStore::new(),
        };
        let mapper = options.byte_mapper.clone();

        for (byte, &id) in parts.byte_ids.iter().enumerate() {
            let symbol = mapper.byte_to_symbol(byte as u8).to_string();
            let existing = store.token_for(id).map(|t| t == symbol);
            match existing {
                Some(true) => {}
                Some(false) => {
                    return Err(inconsistent(format!(
                        "byte {byte} maps to id {id}, spelled {:?} instead of {symbol:?}",
                        store.token_for(id).unwrap_or_default()
                    )))
                }
                None if has_token_file => {
                    return Err(inconsistent(format!(
                        "byte {byte} maps to id {id}, which the vocabulary does not contain"
                    )))
                }
                None => store.insert(symbol, id)?,
            }
        }

        for (rank, rule) in merges.iter().enumerate() {
            let joined = match (store.token_for(rule.left), store.token_for(rule.right)) {
                (Some(left), Some(right)) => format!("{left}{right}"),
                _ => {
                    return Err(inconsistent(format!(
                        "merge rule {rank} ({} {} -> {}) uses an id with no token",
                        rule.left, rule.right, rule.merged
                    )))
                }
            };
            let existing = store.token_for(rule.merged).map(|t| t == joined);
            match existing {
                Some(true) => {}
                Some(false) => {
                    return Err(inconsistent(format!(
                        "merge rule {rank} produces {joined:?} but id {} is spelled {:?}",
                        rule.merged,
                        store.token_for(rule.merged).unwrap_or_default()
                    )))
                }
                None if has_token_file => {
                    return Err(inconsistent(format!(
                        "merge rule {rank} produces id {}, which the vocabulary does not contain",
                        rule.merged
                    )))
                }
                None => store.insert(joined, rule.merged)?,
            }
        }

        let regular: FxHashSet<TokenId> = parts
            .byte_ids
            .iter()
            .copied()
            .chain(merges.iter().map(|rule| rule.merged))
            .collect();

        let mut literals: [String; 5] = Default::default();
        for (kind, id) in parts.specials.iter() {
            if regular.contains(&id) {
                return Err(inconsistent(format!(
                    "special token {kind} has id {id}, which is also a byte or merge result"
                )));
            }
            let literal = match store.token_for(id) {
                Some(existing) => existing.to_string(),
                None => {
                    let literal = options.special_literals.get(kind).to_string();
                    store.insert(literal.clone(), id)?;
                    literal
                }
            };
            literals[kind as usize] = literal;
        }
        let specials = SpecialTokens::new(parts.specials, literals)?;

        info!(
            merges = merges.len(),
            tokens = store.len(),
            vocab_file = has_token_file,
            "loaded byte-level BPE vocabulary"
        );

        Ok(Self {
            mapper,
            store,
            merges,
            byte_ids: parts.byte_ids,
            specials,
            has_token_file,
        })
    }

    pub fn byte_mapper(&self) -> &ByteMapper {
        &self.mapper
    }

    pub fn store(&self) -> &VocabularyStore {
        &self.store
    }

    pub fn merges(&self) -> &MergeRankTable {
        &self.merges
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.specials
    }

    pub fn byte_ids(&self) -> &[TokenId; 256] {
        &self.byte_ids
    }

    #[inline]
    pub fn byte_id(&self, byte: u8) -> TokenId {
        self.byte_ids[byte as usize]
    }

    pub fn id_for(&self, token: &str) -> Option<TokenId> {
        self.store.id_for(token)
    }

    pub fn token_for(&self, id: TokenId) -> Option<&str> {
        self.store.token_for(id)
    }

    pub fn unknown_id(&self) -> TokenId {
        self.specials.unknown_id()
    }

    /// Whether token strings came from a vocabulary JSON.
    pub fn has_token_file(&self) -> bool {
        self.has_token_file
    }

    /// Largest id + 1.
    pub fn vocab_size(&self) -> usize {
        self.store.max_id().map_or(0, |id| id as usize + 1)
    }

    /// Rank of merging two token strings, `None` if they never merge.
    pub fn rank_of_tokens(&self, left: &str, right: &str) -> Option<Rank> {
        self.merges.rank_of(self.id_for(left)?, self.id_for(right)?)
    }

    /// The token two strings merge into.
    pub fn merged_token_of(&self, left: &str, right: &str) -> Option<&str> {
        let merged = self.merges.merged_of(self.id_for(left)?, self.id_for(right)?)?;
        self.token_for(merged)
    }

    /// Byte-level BPE over one chunk: byte ids, then the merge loop.
    pub fn bpe(&self, bytes: &[u8]) -> Vec<TokenId> {
        let symbols = bytes.iter().map(|&b| self.byte_id(b)).collect();
        byte_pair_merge(symbols, &self.merges)
    }
}
