//! Core byte-level BPE engine.
//!
//! # Architecture
//!
//! - [`Vocabulary`]: the validated, immutable tables (byte table, merge
//!   ranks, token strings, special tokens), loaded once and shared via `Arc`
//! - [`Encoder`]: pre-tokenization, special literal matching, the merge loop
//!   and the chunk cache
//! - [`Decoder`] / [`StreamingDecoder`]: ids back to bytes and text
//! - [`Tokenizer`]: one vocabulary with its encoder and decoder
//! - [`byte_level`]: the byte ↔ symbol alphabet vocabulary strings are spelled in
//!
//! # Performance
//!
//! - Merges work on `(id, id)` pairs in an FxHashMap, never on strings
//! - Long chunks use a heap over a linked list instead of repeated rescans
//! - Aho-Corasick matches special literals in one pass
//! - An LRU-backed cache skips the merge loop for repeated chunks
//! - Rayon parallelises batches and very large single texts

mod bpe;
pub mod byte_level;
mod cache;
mod decoder;
mod encoder;
mod merges;
mod pretokenize;
mod special;
mod streaming;
mod tokenizer;
mod vocab;
mod vocabulary;

pub use bpe::{byte_pair_merge, merge_heap, merge_linear, HEAP_THRESHOLD};
pub use byte_level::{byte_level_decode, byte_level_encode, ByteMapper, GPT2_BYTE_TO_CHAR};
pub use cache::{CachePolicy, EncodeCache};
pub use decoder::{Decoder, DecoderOptions};
pub use encoder::{Encoder, EncoderOptions};
pub use merges::{MergeRankTable, MergeRule, MergeTriple, Rank};
pub use pretokenize::{PreTokenizer, RegexEngine, GPT2_PATTERN};
pub use special::{EncodePolicy, SpecialIds, SpecialKind, SpecialLiterals, SpecialTokens};
pub use streaming::StreamingDecoder;
pub use tokenizer::{Tokenizer, TokenizerError, TokenizerOptions};
pub use vocab::{
    load_byte_table_file, load_merges_file, load_specials_file, load_vocab_json_file,
    parse_byte_table, parse_merges, parse_specials, parse_vocab_json, ArtifactKind,
    ArtifactPaths, TokenId, VocabError, VocabularyStore,
};
pub use vocabulary::{
    load_vocabulary, load_vocabulary_with, Vocabulary, VocabularyOptions, VocabularyParts,
};
