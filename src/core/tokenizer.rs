use std::sync::Arc;
use thiserror::Error;

use super::cache::CachePolicy;
use super::decoder::{Decoder, DecoderOptions};
use super::encoder::{Encoder, EncoderOptions};
use super::pretokenize::RegexEngine;
use super::special::{EncodePolicy, SpecialTokens};
use super::streaming::StreamingDecoder;
use super::vocab::{ArtifactPaths, TokenId, VocabError};
use super::vocabulary::{load_vocabulary_with, Vocabulary, VocabularyOptions};

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("Regex compilation error (fancy-regex): {0}")]
    Regex(#[from] fancy_regex::Error),
    #[cfg(feature = "pcre2")]
    #[error("Regex compilation error (PCRE2): {0}")]
    Pcre2(#[from] pcre2::Error),
    #[error("PCRE2 feature not enabled. Compile with --features pcre2")]
    Pcre2NotEnabled,
    #[error("Aho-Corasick build error: {0}")]
    AhoCorasick(#[from] aho_corasick::BuildError),
    #[error("Pre-tokenization failed: {0}")]
    PreTokenize(String),
    #[error("Unknown token id: {0}")]
    UnknownId(TokenId),
    #[error("Decoding error: invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Encoder and decoder configuration for a [`Tokenizer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizerOptions {
    pub encoder: EncoderOptions,
    pub decoder: DecoderOptions,
}

impl TokenizerOptions {
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.encoder = self.encoder.with_pattern(pattern);
        self
    }

    pub fn with_engine(mut self, engine: RegexEngine) -> Self {
        self.encoder = self.encoder.with_engine(engine);
        self
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.encoder = self.encoder.with_cache(cache);
        self
    }

    pub fn with_unknown_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.decoder = self.decoder.with_unknown_placeholder(placeholder);
        self
    }

    pub fn with_skip_special_tokens(mut self, skip: bool) -> Self {
        self.decoder = self.decoder.with_skip_special_tokens(skip);
        self
    }
}

/// Byte-level BPE tokenizer: one vocabulary, one encoder, one decoder.
///
/// # Performance Characteristics
///
/// - **Single text encoding**: [`encode`](Self::encode) runs sequentially,
///   which is the fastest option until inputs reach roughly a megabyte.
/// - **Very large single texts**: [`encode_rayon`](Self::encode_rayon)
///   merges chunks in parallel.
/// - **Batches**: [`encode_batch`](Self::encode_batch) and
///   [`decode_batch`](Self::decode_batch) parallelise across texts.
///
/// Repeated chunks skip the merge loop through the encode cache, which is
/// unbounded unless configured otherwise.
///
/// ```ignore
/// let tokenizer = Tokenizer::from_artifacts(&ArtifactPaths::from_prefix("gpt2"))?;
/// let ids = tokenizer.encode("Hello world", EncodePolicy::wrapped())?;
/// assert_eq!(tokenizer.decode(&ids), "<s>Hello world</s>");
/// ```
#[derive(Debug)]
pub struct Tokenizer {
    vocab: Arc<Vocabulary>,
    encoder: Encoder,
    decoder: Decoder,
}

impl Tokenizer {
    pub fn new(vocab: Arc<Vocabulary>, options: TokenizerOptions) -> Result<Self, TokenizerError> {
        let encoder = Encoder::new(Arc::clone(&vocab), &options.encoder)?;
        let decoder = Decoder::new(Arc::clone(&vocab), options.decoder);
        Ok(Self {
            vocab,
            encoder,
            decoder,
        })
    }

    /// Load artifacts with default options.
    pub fn from_artifacts(paths: &ArtifactPaths) -> Result<Self, TokenizerError> {
        Self::from_artifacts_with(paths, &VocabularyOptions::default(), TokenizerOptions::default())
    }

    pub fn from_artifacts_with(
        paths: &ArtifactPaths,
        vocab_options: &VocabularyOptions,
        options: TokenizerOptions,
    ) -> Result<Self, TokenizerError> {
        let vocab = load_vocabulary_with(paths, vocab_options)?;
        Self::new(Arc::new(vocab), options)
    }

    pub fn encode(&self, text: &str, policy: EncodePolicy) -> Result<Vec<TokenId>, TokenizerError> {
        self.encoder.encode(text, policy)
    }

    pub fn encode_rayon(
        &self,
        text: &str,
        policy: EncodePolicy,
    ) -> Result<Vec<TokenId>, TokenizerError> {
        self.encoder.encode_rayon(text, policy)
    }

    pub fn encode_batch(
        &self,
        texts: &[String],
        policy: EncodePolicy,
    ) -> Result<Vec<Vec<TokenId>>, TokenizerError> {
        self.encoder.encode_batch(texts, policy)
    }

    /// Total decode: unknown ids and invalid UTF-8 are replaced.
    pub fn decode(&self, ids: &[TokenId]) -> String {
        self.decoder.decode(ids)
    }

    pub fn decode_bytes(&self, ids: &[TokenId]) -> Vec<u8> {
        self.decoder.decode_bytes(ids)
    }

    pub fn decode_strict(&self, ids: &[TokenId]) -> Result<String, TokenizerError> {
        self.decoder.decode_strict(ids)
    }

    pub fn decode_batch(&self, id_lists: &[Vec<TokenId>]) -> Vec<String> {
        self.decoder.decode_batch(id_lists)
    }

    pub fn streaming_decoder(&self) -> StreamingDecoder {
        StreamingDecoder::new(self.decoder.clone())
    }

    /// Largest token id + 1.
    pub fn vocab_size(&self) -> usize {
        self.vocab.vocab_size()
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        self.vocab.special_tokens()
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn cache_len(&self) -> usize {
        self.encoder.cache_len()
    }

    pub fn clear_cache(&self) {
        self.encoder.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::merges::MergeTriple;
    use crate::core::special::SpecialIds;
    use crate::core::vocabulary::VocabularyParts;

    // The classic example: l=1 o=2 w=3 low=4, with "lo"=5. Other bytes get
    // 100 + b so they stay clear of the small ids; specials sit at 10..=14.
    fn make_test_tokenizer(options: TokenizerOptions) -> Tokenizer {
        let mut byte_ids = [0; 256];
        for (b, id) in byte_ids.iter_mut().enumerate() {
            *id = b as TokenId + 100;
        }
        byte_ids[b'l' as usize] = 1;
        byte_ids[b'o' as usize] = 2;
        byte_ids[b'w' as usize] = 3;
        let parts = VocabularyParts {
            byte_ids,
            merges: vec![
                MergeTriple { left: 1, right: 2, merged: 5 },
                MergeTriple { left: 5, right: 3, merged: 4 },
            ],
            specials: SpecialIds::new(10, 11, 12, 13, 14),
            tokens: None,
        };
        let vocab = Vocabulary::from_parts(parts, &VocabularyOptions::default()).unwrap();
        Tokenizer::new(Arc::new(vocab), options).unwrap()
    }

    #[test]
    fn test_encode_decode() {
        let tokenizer = make_test_tokenizer(TokenizerOptions::default());
        let ids = tokenizer.encode("low", EncodePolicy::PLAIN).unwrap();
        assert_eq!(ids, vec![4]);
        assert_eq!(tokenizer.decode(&[4]), "low");
    }

    #[test]
    fn test_roundtrip() {
        let tokenizer = make_test_tokenizer(TokenizerOptions::default());
        for text in ["", "low lower lowest", "  spaced  out\n", "naïve 日本語 🦀", "it's 42!"] {
            let ids = tokenizer.encode(text, EncodePolicy::PLAIN).unwrap();
            assert_eq!(tokenizer.decode(&ids), text);
            assert_eq!(tokenizer.decode_strict(&ids).unwrap(), text);
        }
    }

    #[test]
    fn test_wrapped_roundtrip() {
        let tokenizer = make_test_tokenizer(TokenizerOptions::default());
        let ids = tokenizer.encode("low", EncodePolicy::wrapped()).unwrap();
        assert_eq!(ids, vec![11, 4, 12]);
        assert_eq!(tokenizer.decode(&ids), "<s>low</s>");

        let skipping = make_test_tokenizer(TokenizerOptions::default().with_skip_special_tokens(true));
        assert!(skipping.decoder().options().skip_special_tokens);
        assert!(!tokenizer.decoder().options().skip_special_tokens);
        assert_eq!(skipping.decode(&ids), "low");
    }

    #[test]
    fn test_unknown_id() {
        let tokenizer = make_test_tokenizer(TokenizerOptions::default());
        assert_eq!(tokenizer.decode(&[4, 77]), "low\u{FFFD}");
        assert!(matches!(
            tokenizer.decode_strict(&[77]),
            Err(TokenizerError::UnknownId(77))
        ));
    }

    #[test]
    fn test_vocab_size() {
        let tokenizer = make_test_tokenizer(TokenizerOptions::default());
        assert_eq!(tokenizer.vocab_size(), 356);
        assert_eq!(tokenizer.special_tokens().unknown_id(), 13);
    }

    #[test]
    fn test_cache_works() {
        let tokenizer = make_test_tokenizer(TokenizerOptions::default());
        tokenizer.encode("low low", EncodePolicy::PLAIN).unwrap();
        assert!(tokenizer.cache_len() > 0);
        tokenizer.clear_cache();
        assert_eq!(tokenizer.cache_len(), 0);

        let uncached = make_test_tokenizer(TokenizerOptions::default().with_cache(CachePolicy::Disabled));
        uncached.encode("low low", EncodePolicy::PLAIN).unwrap();
        assert_eq!(uncached.cache_len(), 0);
    }

    #[test]
    fn test_streaming_decoder() {
        let tokenizer = make_test_tokenizer(TokenizerOptions::default());
        let ids = tokenizer.encode("日本", EncodePolicy::PLAIN).unwrap();
        let mut stream = tokenizer.streaming_decoder();
        let mut out = String::new();
        for id in ids {
            if let Some(text) = stream.add_token(id) {
                out.push_str(&text);
            }
        }
        out.push_str(&stream.flush());
        assert_eq!(out, "日本");
    }

    #[cfg(not(feature = "pcre2"))]
    #[test]
    fn test_pcre2_not_enabled() {
        let mut byte_ids = [0; 256];
        for (b, id) in byte_ids.iter_mut().enumerate() {
            *id = b as TokenId;
        }
        let parts = VocabularyParts {
            byte_ids,
            merges: Vec::new(),
            specials: SpecialIds::new(256, 257, 258, 259, 260),
            tokens: None,
        };
        let vocab = Vocabulary::from_parts(parts, &VocabularyOptions::default()).unwrap();
        let result = Tokenizer::new(
            Arc::new(vocab),
            TokenizerOptions::default().with_engine(RegexEngine::Pcre2),
        );
        assert!(matches!(result, Err(TokenizerError::Pcre2NotEnabled)));
    }

    #[test]
    fn test_missing_artifacts() {
        let result = Tokenizer::from_artifacts(&ArtifactPaths::from_prefix("/nonexistent/gpt2"));
        assert!(matches!(
            result,
            Err(TokenizerError::Vocab(VocabError::ArtifactMissing { .. }))
        ));
    }
}
