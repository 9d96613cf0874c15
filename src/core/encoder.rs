//! Text → token ids.

use aho_corasick::{AhoCorasick, MatchKind};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

use super::cache::{CachePolicy, EncodeCache};
use super::pretokenize::{PreTokenizer, RegexEngine, GPT2_PATTERN};
use super::special::EncodePolicy;
use super::tokenizer::TokenizerError;
use super::vocab::TokenId;
use super::vocabulary::Vocabulary;

/// Encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    pub pattern: String,
    pub engine: RegexEngine,
    pub cache: CachePolicy,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            pattern: GPT2_PATTERN.to_string(),
            engine: RegexEngine::default(),
            cache: CachePolicy::default(),
        }
    }
}

impl EncoderOptions {
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_engine(mut self, engine: RegexEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }
}

/// A stretch of the input: a pre-tokenized chunk or a matched special literal.
enum Piece {
    Text { start: usize, end: usize },
    Special(TokenId),
}

/// Byte-level BPE encoder over a shared [`Vocabulary`].
///
/// - Sequential [`encode`](Self::encode) is the fast path for ordinary inputs.
/// - [`encode_rayon`](Self::encode_rayon) parallelises across the chunks of
///   one very large text.
/// - [`encode_batch`](Self::encode_batch) parallelises across texts.
///
/// The chunk cache is shared by all of them.
pub struct Encoder {
    vocab: Arc<Vocabulary>,
    pretokenizer: PreTokenizer,
    special_matcher: Option<AhoCorasick>,
    special_match_ids: Vec<TokenId>,
    cache: EncodeCache,
}

impl Encoder {
    pub fn new(vocab: Arc<Vocabulary>, options: &EncoderOptions) -> Result<Self, TokenizerError> {
        let pretokenizer = PreTokenizer::new(&options.pattern, options.engine)?;

        // Kinds that share an id share a literal; match each literal once.
        let mut literals: Vec<&str> = Vec::new();
        let mut special_match_ids = Vec::new();
        for (_, id, literal) in vocab.special_tokens().iter() {
            if !literal.is_empty() && !literals.contains(&literal) {
                literals.push(literal);
                special_match_ids.push(id);
            }
        }
        let special_matcher = if literals.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&literals)?,
            )
        };

        debug!(
            pattern = %options.pattern,
            engine = ?options.engine,
            cache = ?options.cache,
            "built encoder"
        );

        Ok(Self {
            vocab,
            pretokenizer,
            special_matcher,
            special_match_ids,
            cache: EncodeCache::new(options.cache),
        })
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn pretokenizer(&self) -> &PreTokenizer {
        &self.pretokenizer
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.cache.policy()
    }

    /// Encode `text` according to `policy`.
    ///
    /// `encode("")` is empty, or just `[BOS, EOS]` when the policy asks for
    /// them.
    pub fn encode(&self, text: &str, policy: EncodePolicy) -> Result<Vec<TokenId>, TokenizerError> {
        let pieces = self.pieces(text, policy)?;
        let mut ids = Vec::with_capacity(text.len() / 3 + 2);
        for piece in &pieces {
            self.encode_piece_into(text, piece, &mut ids);
        }
        Ok(self.vocab.special_tokens().inject(ids, policy))
    }

    /// Encode one large text, merging its chunks in parallel.
    ///
    /// Only worth it for inputs in the megabyte range; below that the rayon
    /// overhead outweighs the gain.
    pub fn encode_rayon(
        &self,
        text: &str,
        policy: EncodePolicy,
    ) -> Result<Vec<TokenId>, TokenizerError> {
        let pieces = self.pieces(text, policy)?;
        let per_piece: Vec<Vec<TokenId>> = pieces
            .par_iter()
            .map(|piece| {
                let mut ids = Vec::new();
                self.encode_piece_into(text, piece, &mut ids);
                ids
            })
            .collect();
        let ids = per_piece.into_iter().flatten().collect();
        Ok(self.vocab.special_tokens().inject(ids, policy))
    }

    /// Encode many texts in parallel. Fails if any single text fails.
    pub fn encode_batch(
        &self,
        texts: &[String],
        policy: EncodePolicy,
    ) -> Result<Vec<Vec<TokenId>>, TokenizerError> {
        texts
            .par_iter()
            .map(|text| self.encode(text, policy))
            .collect()
    }

    /// Byte-level BPE on a single pre-tokenized chunk, through the cache.
    pub fn encode_chunk(&self, chunk: &str) -> Vec<TokenId> {
        match chunk.as_bytes() {
            [] => Vec::new(),
            &[byte] => vec![self.vocab.byte_id(byte)],
            bytes => {
                if let Some(ids) = self.cache.get(chunk) {
                    return ids;
                }
                let ids = self.vocab.bpe(bytes);
                self.cache.insert(chunk, &ids);
                ids
            }
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn encode_piece_into(&self, text: &str, piece: &Piece, out: &mut Vec<TokenId>) {
        match *piece {
            Piece::Text { start, end } => out.extend(self.encode_chunk(&text[start..end])),
            Piece::Special(id) => out.push(id),
        }
    }

    /// Split `text` into chunks, carving out special literals first when the
    /// policy allows them.
    fn pieces(&self, text: &str, policy: EncodePolicy) -> Result<Vec<Piece>, TokenizerError> {
        let mut pieces = Vec::new();
        let matcher = match &self.special_matcher {
            Some(matcher) if policy.allow_special_text => matcher,
            _ => {
                self.push_chunks(text, 0, &mut pieces)?;
                return Ok(pieces);
            }
        };

        let mut last_end = 0;
        for m in matcher.find_iter(text) {
            if m.start() > last_end {
                self.push_chunks(&text[last_end..m.start()], last_end, &mut pieces)?;
            }
            pieces.push(Piece::Special(self.special_match_ids[m.pattern().as_usize()]));
            last_end = m.end();
        }
        if last_end < text.len() {
            self.push_chunks(&text[last_end..], last_end, &mut pieces)?;
        }
        Ok(pieces)
    }

    fn push_chunks(
        &self,
        segment: &str,
        offset: usize,
        pieces: &mut Vec<Piece>,
    ) -> Result<(), TokenizerError> {
        for (start, end) in self.pretokenizer.split(segment)? {
            pieces.push(Piece::Text {
                start: offset + start,
                end: offset + end,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("pretokenizer", &self.pretokenizer)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
