//! ByteLevel mapping between raw bytes and printable symbols.
//!
//! Byte-level BPE vocabularies are stored as text, but the merge algorithm has
//! to work on arbitrary byte sequences. Every byte (0-255) is therefore given a
//! printable Unicode surrogate, and vocabulary strings are spelled in that
//! 256-symbol alphabet.
//!
//! # Canonical table
//!
//! The GPT-2 family uses a fixed table that every reimplementation has to
//! reproduce exactly, otherwise pretrained vocabularies stop matching:
//!
//! - Bytes 33-126 (`!` to `~`): map to themselves
//! - Bytes 161-172 (`¡` to `¬`): map to themselves
//! - Bytes 174-255 (`®` to `ÿ`): map to themselves
//! - The remaining 68 bytes (0-32, 127-160, 173), in ascending order, take
//!   U+0100, U+0101, ... U+0143
//!
//! So a space (0x20) becomes `Ġ` (U+0120) and the soft hyphen (0xAD) becomes
//! `Ń` (U+0143).
//!
//! Other tables can be supplied through [`ByteMapper::from_table`]; they only
//! have to be collision free.

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

use super::vocab::VocabError;

/// Bytes that are their own symbol in the canonical table.
const fn is_self_mapped(byte: u8) -> bool {
    matches!(byte, 33..=126 | 161..=172 | 174..=255)
}

const fn canonical_table() -> [char; 256] {
    let mut table = ['\0'; 256];
    let mut next = 0x100u32;
    let mut i = 0usize;
    while i < 256 {
        let byte = i as u8;
        table[i] = if is_self_mapped(byte) {
            byte as char
        } else {
            // U+0100..=U+0143, all scalar values
            let ch = match char::from_u32(next) {
                Some(ch) => ch,
                None => char::REPLACEMENT_CHARACTER,
            };
            next += 1;
            ch
        };
        i += 1;
    }
    table
}

/// Canonical GPT-2 byte → symbol table, computed at compile time.
pub const GPT2_BYTE_TO_CHAR: [char; 256] = canonical_table();

static GPT2_CHAR_TO_BYTE: LazyLock<FxHashMap<char, u8>> = LazyLock::new(|| invert(&GPT2_BYTE_TO_CHAR));

fn invert(table: &[char; 256]) -> FxHashMap<char, u8> {
    table
        .iter()
        .enumerate()
        .map(|(byte, &ch)| (ch, byte as u8))
        .collect()
}

/// Bidirectional byte ↔ symbol mapping.
///
/// Both directions are total over the alphabet: `byte_to_symbol` is defined for
/// every `u8`, and `symbol_to_byte` returns `Some` exactly for the 256 symbols
/// the table produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteMapper {
    byte_to_char: [char; 256],
    char_to_byte: FxHashMap<char, u8>,
}

impl ByteMapper {
    /// The canonical GPT-2 mapping.
    pub fn gpt2() -> Self {
        Self {
            byte_to_char: GPT2_BYTE_TO_CHAR,
            char_to_byte: GPT2_CHAR_TO_BYTE.clone(),
        }
    }

    /// Build a mapper from a custom byte → symbol table.
    ///
    /// Fails if two bytes share a symbol, since the inverse would then be
    /// ambiguous.
    pub fn from_table(table: [char; 256]) -> Result<Self, VocabError> {
        let mut char_to_byte = FxHashMap::default();
        for (byte, &ch) in table.iter().enumerate() {
            if let Some(previous) = char_to_byte.insert(ch, byte as u8) {
                return Err(VocabError::VocabularyInconsistent(format!(
                    "byte table assigns {ch:?} to both byte {previous} and byte {byte}"
                )));
            }
        }
        Ok(Self {
            byte_to_char: table,
            char_to_byte,
        })
    }

    #[inline]
    pub fn byte_to_symbol(&self, byte: u8) -> char {
        self.byte_to_char[byte as usize]
    }

    #[inline]
    pub fn symbol_to_byte(&self, symbol: char) -> Option<u8> {
        self.char_to_byte.get(&symbol).copied()
    }

    /// Check if a character is part of this mapper's alphabet.
    #[inline]
    pub fn contains(&self, symbol: char) -> bool {
        self.char_to_byte.contains_key(&symbol)
    }

    /// The full byte → symbol table.
    pub fn table(&self) -> &[char; 256] {
        &self.byte_to_char
    }

    /// Spell raw bytes in the symbol alphabet.
    pub fn encode(&self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| self.byte_to_symbol(b)).collect()
    }

    /// Invert a symbol string back to raw bytes.
    ///
    /// Returns `None` if any character is outside the alphabet.
    pub fn decode(&self, text: &str) -> Option<Vec<u8>> {
        text.chars().map(|ch| self.symbol_to_byte(ch)).collect()
    }

    /// Append the raw bytes of `text` to `out`.
    ///
    /// Characters outside the alphabet are appended as their own UTF-8 bytes,
    /// which keeps decoding total. Returns `false` if that fallback was used.
    pub fn decode_into(&self, text: &str, out: &mut Vec<u8>) -> bool {
        let mut clean = true;
        for ch in text.chars() {
            match self.symbol_to_byte(ch) {
                Some(b) => out.push(b),
                None => {
                    let mut buf = [0u8; 4];
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                    clean = false;
                }
            }
        }
        clean
    }
}

impl Default for ByteMapper {
    fn default() -> Self {
        Self::gpt2()
    }
}

/// Encode a byte slice with the canonical GPT-2 table.
///
/// ```ignore
/// assert_eq!(byte_level_encode(b" hello"), "Ġhello");
/// assert_eq!(byte_level_encode("你".as_bytes()), "ä½ł");
/// ```
#[inline]
pub fn byte_level_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| GPT2_BYTE_TO_CHAR[b as usize]).collect()
}

/// Decode a canonical ByteLevel string back to raw bytes.
///
/// Returns `None` if the string contains characters outside the alphabet.
#[inline]
pub fn byte_level_decode(text: &str) -> Option<Vec<u8>> {
    text.chars()
        .map(|ch| GPT2_CHAR_TO_BYTE.get(&ch).copied())
        .collect()
}
