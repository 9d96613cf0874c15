//! bytebpe: byte-level BPE tokenization over GPT-2 style merge tables whose
//! token ids have been remapped by an external tool.
//!
//! ```ignore
//! use bytebpe::{ArtifactPaths, EncodePolicy, Tokenizer};
//!
//! let paths = ArtifactPaths::from_prefix("models/gpt2").with_vocab("models/gpt2.json");
//! let tokenizer = Tokenizer::from_artifacts(&paths)?;
//! let ids = tokenizer.encode("Hello world", EncodePolicy::PLAIN)?;
//! assert_eq!(tokenizer.decode(&ids), "Hello world");
//! ```

pub mod core;
#[cfg(feature = "python")]
mod python;

pub use core::{
    load_vocabulary, load_vocabulary_with, ArtifactKind, ArtifactPaths, ByteMapper, CachePolicy,
    Decoder, DecoderOptions, EncodePolicy, Encoder, EncoderOptions, RegexEngine, SpecialKind,
    SpecialLiterals, SpecialTokens, StreamingDecoder, TokenId, Tokenizer, TokenizerError,
    TokenizerOptions, VocabError, Vocabulary, VocabularyOptions, VocabularyParts, GPT2_PATTERN,
};
