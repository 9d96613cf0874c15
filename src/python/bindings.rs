//! Python bindings for the bytebpe tokenizer.
//!
//! # Thread Safety
//!
//! The tokenizer is immutable apart from its internal cache, which is
//! lock-protected, so one instance can be shared across Python threads.
//! Batch operations release the GIL and run on Rayon.
//!
//! # Example
//!
//! ```python
//! from bytebpe import Tokenizer
//!
//! tokenizer = Tokenizer.from_prefix("models/gpt2", vocab="models/gpt2.json")
//!
//! ids = tokenizer.encode("Hello, world!", add_bos=True, add_eos=True)
//! text = tokenizer.decode(ids)
//!
//! decoder = tokenizer.streaming_decoder()
//! for token_id in token_stream:
//!     if text := decoder.add_token(token_id):
//!         print(text, end="", flush=True)
//! ```

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::core::{
    ArtifactPaths, CachePolicy, EncodePolicy, StreamingDecoder, TokenId, Tokenizer,
    TokenizerError, TokenizerOptions, VocabError, VocabularyOptions,
};

fn to_py_err(err: TokenizerError) -> PyErr {
    match err {
        TokenizerError::Vocab(VocabError::ArtifactMissing { .. }) => {
            PyIOError::new_err(err.to_string())
        }
        other => PyValueError::new_err(other.to_string()),
    }
}

fn policy(add_bos: bool, add_eos: bool, allow_special: bool) -> EncodePolicy {
    EncodePolicy::default()
        .with_bos(add_bos)
        .with_eos(add_eos)
        .with_special_text(allow_special)
}

/// Python wrapper for the Rust Tokenizer.
#[pyclass(name = "Tokenizer")]
pub struct PyTokenizer {
    inner: Tokenizer,
}

#[pymethods]
impl PyTokenizer {
    /// Load a tokenizer from `<prefix>.merges`, `<prefix>.bytes` and
    /// `<prefix>.specials`.
    ///
    /// Args:
    ///     prefix: Path prefix shared by the artifact files
    ///     vocab: Optional path to a `{"token": id}` JSON vocabulary
    ///     cache_size: Maximum cached chunks; None for unbounded, 0 to disable
    ///     skip_special_tokens: Drop special tokens when decoding
    ///
    /// Raises:
    ///     IOError: If an artifact cannot be read
    ///     ValueError: If an artifact is malformed or inconsistent
    #[new]
    #[pyo3(signature = (prefix, vocab=None, cache_size=None, skip_special_tokens=false))]
    fn new(
        prefix: &str,
        vocab: Option<&str>,
        cache_size: Option<usize>,
        skip_special_tokens: bool,
    ) -> PyResult<Self> {
        let mut paths = ArtifactPaths::from_prefix(prefix);
        if let Some(vocab) = vocab {
            paths = paths.with_vocab(vocab);
        }
        let cache = cache_size.map_or(CachePolicy::Unbounded, CachePolicy::bounded);
        let options = TokenizerOptions::default()
            .with_cache(cache)
            .with_skip_special_tokens(skip_special_tokens);
        let inner = Tokenizer::from_artifacts_with(&paths, &VocabularyOptions::default(), options)
            .map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Same as the constructor.
    #[staticmethod]
    #[pyo3(signature = (prefix, vocab=None, cache_size=None, skip_special_tokens=false))]
    fn from_prefix(
        prefix: &str,
        vocab: Option<&str>,
        cache_size: Option<usize>,
        skip_special_tokens: bool,
    ) -> PyResult<Self> {
        Self::new(prefix, vocab, cache_size, skip_special_tokens)
    }

    /// Encode text to token IDs.
    ///
    /// Args:
    ///     text: Input text to encode
    ///     add_bos: Prepend the BOS token
    ///     add_eos: Append the EOS token
    ///     allow_special: Match special token literals in the text
    ///
    /// Returns:
    ///     List of token IDs
    #[pyo3(signature = (text, add_bos=false, add_eos=false, allow_special=false))]
    fn encode(
        &self,
        text: &str,
        add_bos: bool,
        add_eos: bool,
        allow_special: bool,
    ) -> PyResult<Vec<TokenId>> {
        self.inner
            .encode(text, policy(add_bos, add_eos, allow_special))
            .map_err(to_py_err)
    }

    /// Batch encode multiple texts in parallel.
    #[pyo3(signature = (texts, add_bos=false, add_eos=false, allow_special=false))]
    fn encode_batch(
        &self,
        py: Python<'_>,
        texts: Vec<String>,
        add_bos: bool,
        add_eos: bool,
        allow_special: bool,
    ) -> PyResult<Vec<Vec<TokenId>>> {
        let policy = policy(add_bos, add_eos, allow_special);
        py.allow_threads(|| self.inner.encode_batch(&texts, policy))
            .map_err(to_py_err)
    }

    /// Decode token IDs to a string.
    ///
    /// Unknown IDs and invalid UTF-8 are replaced with U+FFFD.
    fn decode(&self, tokens: Vec<TokenId>) -> String {
        self.inner.decode(&tokens)
    }

    /// Decode token IDs to raw bytes.
    fn decode_bytes(&self, tokens: Vec<TokenId>) -> Vec<u8> {
        self.inner.decode_bytes(&tokens)
    }

    /// Decode token IDs, failing on unknown IDs or invalid UTF-8.
    ///
    /// Raises:
    ///     ValueError: On the first unknown ID, or if the bytes are not valid UTF-8
    fn decode_strict(&self, tokens: Vec<TokenId>) -> PyResult<String> {
        self.inner.decode_strict(&tokens).map_err(to_py_err)
    }

    /// Batch decode multiple token lists in parallel.
    fn decode_batch(&self, py: Python<'_>, token_lists: Vec<Vec<TokenId>>) -> Vec<String> {
        py.allow_threads(|| self.inner.decode_batch(&token_lists))
    }

    /// Largest token ID + 1.
    #[getter]
    fn vocab_size(&self) -> usize {
        self.inner.vocab_size()
    }

    #[getter]
    fn pad_id(&self) -> TokenId {
        self.inner.special_tokens().pad_id()
    }

    #[getter]
    fn bos_id(&self) -> TokenId {
        self.inner.special_tokens().bos_id()
    }

    #[getter]
    fn eos_id(&self) -> TokenId {
        self.inner.special_tokens().eos_id()
    }

    #[getter]
    fn unk_id(&self) -> TokenId {
        self.inner.special_tokens().unknown_id()
    }

    #[getter]
    fn mask_id(&self) -> TokenId {
        self.inner.special_tokens().mask_id()
    }

    /// Create a streaming decoder for UTF-8 safe token-by-token decoding.
    ///
    /// Example:
    ///     decoder = tokenizer.streaming_decoder()
    ///     for token_id in token_stream:
    ///         if text := decoder.add_token(token_id):
    ///             print(text, end="", flush=True)
    ///     print(decoder.flush())
    fn streaming_decoder(&self) -> PyStreamingDecoder {
        PyStreamingDecoder {
            inner: self.inner.streaming_decoder(),
        }
    }

    /// Clear the encoding cache.
    fn clear_cache(&self) {
        self.inner.clear_cache();
    }

    /// Get the number of entries in the cache.
    #[getter]
    fn cache_len(&self) -> usize {
        self.inner.cache_len()
    }

    fn __repr__(&self) -> String {
        format!("Tokenizer(vocab_size={})", self.inner.vocab_size())
    }
}

/// Python wrapper for the streaming decoder.
///
/// Buffers incomplete UTF-8 sequences and only emits complete characters.
#[pyclass(name = "StreamingDecoder")]
pub struct PyStreamingDecoder {
    inner: StreamingDecoder,
}

#[pymethods]
impl PyStreamingDecoder {
    /// Add a token and return any complete UTF-8 characters.
    ///
    /// Returns:
    ///     String of complete characters, or None if still buffering
    fn add_token(&mut self, token_id: TokenId) -> Option<String> {
        self.inner.add_token(token_id)
    }

    /// Add multiple tokens at once and return complete UTF-8 characters.
    fn add_tokens(&mut self, token_ids: Vec<TokenId>) -> Option<String> {
        self.inner.add_tokens(&token_ids)
    }

    /// Flush any remaining buffered bytes, replacing an incomplete tail
    /// with U+FFFD.
    fn flush(&mut self) -> String {
        self.inner.flush()
    }

    /// Reset the decoder state, discarding any buffered bytes.
    fn reset(&mut self) {
        self.inner.reset();
    }

    #[getter]
    fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }

    #[getter]
    fn pending_bytes(&self) -> usize {
        self.inner.pending_bytes()
    }

    fn __repr__(&self) -> String {
        format!(
            "StreamingDecoder(pending_bytes={})",
            self.inner.pending_bytes()
        )
    }
}
