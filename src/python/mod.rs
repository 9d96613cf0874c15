mod bindings;

use crate::core::GPT2_PATTERN;
pub use bindings::{PyStreamingDecoder, PyTokenizer};

use pyo3::prelude::*;

/// bytebpe - byte-level BPE tokenizer over remapped GPT-2 merge tables
///
/// - Merges on id pairs with a heap for long chunks
/// - Rayon parallelism for batch encoding and decoding
/// - Aho-Corasick special literal matching
/// - LRU-backed chunk cache
/// - UTF-8 streaming decoder for token-by-token output
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTokenizer>()?;
    m.add_class::<PyStreamingDecoder>()?;
    m.add("GPT2_PATTERN", GPT2_PATTERN)?;
    Ok(())
}
