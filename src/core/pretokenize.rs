//! Regex chunking of input text before byte-level merging.
//!
//! Merges never cross a chunk boundary, so the pattern decides things like
//! "a leading space belongs to the following word".

use fancy_regex::Regex as FancyRegex;

#[cfg(feature = "pcre2")]
use pcre2::bytes::Regex as Pcre2Regex;

use super::tokenizer::TokenizerError;

/// GPT-2 pre-tokenization pattern.
pub const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Which regex engine runs the pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegexEngine {
    /// fancy-regex: pure Rust, supports the look-ahead the GPT-2 pattern needs.
    #[default]
    Fancy,
    /// PCRE2 with JIT when available. Requires the `pcre2` feature.
    Pcre2,
}

enum RegexBackend {
    Fancy(Box<FancyRegex>),
    #[cfg(feature = "pcre2")]
    Pcre2(Pcre2Regex),
}

impl RegexBackend {
    fn build(pattern: &str, engine: RegexEngine) -> Result<Self, TokenizerError> {
        match engine {
            RegexEngine::Fancy => Ok(RegexBackend::Fancy(Box::new(FancyRegex::new(pattern)?))),
            #[cfg(feature = "pcre2")]
            RegexEngine::Pcre2 => {
                let mut builder = pcre2::bytes::RegexBuilder::new();
                builder.jit_if_available(true);
                builder.utf(true);
                builder.ucp(true);
                Ok(RegexBackend::Pcre2(builder.build(pattern)?))
            }
            #[cfg(not(feature = "pcre2"))]
            RegexEngine::Pcre2 => Err(TokenizerError::Pcre2NotEnabled),
        }
    }

    /// All matches as (start, end) byte offsets.
    fn find_iter(&self, text: &str) -> Result<Vec<(usize, usize)>, TokenizerError> {
        match self {
            RegexBackend::Fancy(regex) => regex
                .find_iter(text)
                .map(|m| {
                    m.map(|m| (m.start(), m.end()))
                        .map_err(|e| TokenizerError::PreTokenize(e.to_string()))
                })
                .collect(),
            #[cfg(feature = "pcre2")]
            RegexBackend::Pcre2(regex) => regex
                .find_iter(text.as_bytes())
                .map(|m| {
                    m.map(|m| (m.start(), m.end()))
                        .map_err(|e| TokenizerError::PreTokenize(e.to_string()))
                })
                .collect(),
        }
    }
}

/// Compiled pre-tokenization pattern.
pub struct PreTokenizer {
    backend: RegexBackend,
    pattern: String,
    engine: RegexEngine,
}

impl PreTokenizer {
    pub fn new(pattern: &str, engine: RegexEngine) -> Result<Self, TokenizerError> {
        Ok(Self {
            backend: RegexBackend::build(pattern, engine)?,
            pattern: pattern.to_string(),
            engine,
        })
    }

    /// [`GPT2_PATTERN`] on the default engine.
    pub fn gpt2() -> Result<Self, TokenizerError> {
        Self::new(GPT2_PATTERN, RegexEngine::default())
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn engine(&self) -> RegexEngine {
        self.engine
    }

    /// Byte ranges of the chunks of `text`.
    ///
    /// A regex runtime failure aborts the whole split instead of dropping
    /// the chunk.
    pub fn split(&self, text: &str) -> Result<Vec<(usize, usize)>, TokenizerError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        self.backend.find_iter(text)
    }

    pub fn chunks<'t>(&self, text: &'t str) -> Result<Vec<&'t str>, TokenizerError> {
        Ok(self
            .split(text)?
            .into_iter()
            .map(|(start, end)| &text[start..end])
            .collect())
    }
}

impl std::fmt::Debug for PreTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreTokenizer")
            .field("pattern", &self.pattern)
            .field("engine", &self.engine)
            .finish()
    }
}
