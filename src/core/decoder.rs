//! Token ids → bytes → text.

use rayon::prelude::*;
use std::sync::Arc;
use tracing::trace;

use super::tokenizer::TokenizerError;
use super::vocab::TokenId;
use super::vocabulary::Vocabulary;

/// Decoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Emitted in place of ids the vocabulary does not know.
    pub unknown_placeholder: String,
    /// Drop special tokens instead of emitting their literal.
    pub skip_special_tokens: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            unknown_placeholder: char::REPLACEMENT_CHARACTER.to_string(),
            skip_special_tokens: false,
        }
    }
}

impl DecoderOptions {
    pub fn with_unknown_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.unknown_placeholder = placeholder.into();
        self
    }

    pub fn with_skip_special_tokens(mut self, skip: bool) -> Self {
        self.skip_special_tokens = skip;
        self
    }
}

/// Inverse of the encoder.
///
/// [`decode`](Self::decode) never fails: unknown ids become the placeholder
/// and invalid UTF-8 becomes U+FFFD. [`decode_strict`](Self::decode_strict)
/// reports both instead.
#[derive(Debug, Clone)]
pub struct Decoder {
    vocab: Arc<Vocabulary>,
    options: DecoderOptions,
}

impl Decoder {
    pub fn new(vocab: Arc<Vocabulary>, options: DecoderOptions) -> Self {
        Self { vocab, options }
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    pub fn decode(&self, ids: &[TokenId]) -> String {
        String::from_utf8_lossy(&self.decode_bytes(ids)).into_owned()
    }

    /// Raw bytes, which may end in the middle of a UTF-8 sequence.
    pub fn decode_bytes(&self, ids: &[TokenId]) -> Vec<u8> {
        let mut out = Vec::with_capacity(ids.len() * 4);
        for &id in ids {
            self.append_id(id, &mut out);
        }
        out
    }

    pub fn decode_strict(&self, ids: &[TokenId]) -> Result<String, TokenizerError> {
        let mut out = Vec::with_capacity(ids.len() * 4);
        for &id in ids {
            if !self.append_known(id, &mut out) {
                return Err(TokenizerError::UnknownId(id));
            }
        }
        Ok(String::from_utf8(out)?)
    }

    pub fn decode_batch(&self, id_lists: &[Vec<TokenId>]) -> Vec<String> {
        id_lists.par_iter().map(|ids| self.decode(ids)).collect()
    }

    pub(crate) fn append_id(&self, id: TokenId, out: &mut Vec<u8>) {
        if !self.append_known(id, out) {
            trace!(id, "unknown token id, substituting placeholder");
            out.extend_from_slice(self.options.unknown_placeholder.as_bytes());
        }
    }

    /// Returns `false` without touching `out` if `id` is unknown.
    fn append_known(&self, id: TokenId, out: &mut Vec<u8>) -> bool {
        let specials = self.vocab.special_tokens();
        if let Some(kind) = specials.kind_of(id) {
            if !self.options.skip_special_tokens {
                out.extend_from_slice(specials.literal(kind).as_bytes());
            }
            return true;
        }
        match self.vocab.token_for(id) {
            Some(token) => {
                self.vocab.byte_mapper().decode_into(token, out);
                true
            }
            None => false,
        }
    }
}
