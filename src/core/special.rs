//! Reserved tokens: PAD, BOS, EOS, UNK and MASK.
//!
//! Special tokens never take part in byte mapping or merging. They reach an id
//! sequence in two ways only:
//!
//! - programmatically, through [`EncodePolicy::add_bos`] / [`EncodePolicy::add_eos`]
//! - by literal match in input text, when the caller sets
//!   [`EncodePolicy::allow_special_text`]
//!
//! The id of each kind comes from the specials artifact. The literal text
//! comes from the vocabulary JSON when one is supplied, otherwise from
//! [`SpecialLiterals`].

use rustc_hash::FxHashMap;
use std::fmt;

use super::vocab::{TokenId, VocabError};

/// The fixed set of reserved token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpecialKind {
    Pad,
    Bos,
    Eos,
    Unk,
    Mask,
}

impl SpecialKind {
    pub const ALL: [SpecialKind; 5] = [
        SpecialKind::Pad,
        SpecialKind::Bos,
        SpecialKind::Eos,
        SpecialKind::Unk,
        SpecialKind::Mask,
    ];

    /// Name used in the specials artifact.
    pub fn name(self) -> &'static str {
        match self {
            SpecialKind::Pad => "PAD",
            SpecialKind::Bos => "BOS",
            SpecialKind::Eos => "EOS",
            SpecialKind::Unk => "UNK",
            SpecialKind::Mask => "MASK",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PAD" => Some(SpecialKind::Pad),
            "BOS" => Some(SpecialKind::Bos),
            "EOS" => Some(SpecialKind::Eos),
            "UNK" => Some(SpecialKind::Unk),
            "MASK" => Some(SpecialKind::Mask),
            _ => None,
        }
    }

    /// Literal used by RoBERTa-style GPT-2 vocabularies.
    pub fn default_literal(self) -> &'static str {
        match self {
            SpecialKind::Pad => "<pad>",
            SpecialKind::Bos => "<s>",
            SpecialKind::Eos => "</s>",
            SpecialKind::Unk => "<unk>",
            SpecialKind::Mask => "<mask>",
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SpecialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Token ids of the five special kinds, as read from the specials artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialIds([TokenId; 5]);

impl SpecialIds {
    pub fn new(pad: TokenId, bos: TokenId, eos: TokenId, unk: TokenId, mask: TokenId) -> Self {
        Self([pad, bos, eos, unk, mask])
    }

    pub(crate) fn from_array(ids: [TokenId; 5]) -> Self {
        Self(ids)
    }

    #[inline]
    pub fn get(&self, kind: SpecialKind) -> TokenId {
        self.0[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpecialKind, TokenId)> + '_ {
        SpecialKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }
}

/// Fallback literal text for each special kind.
///
/// Only consulted when the vocabulary has no string for a special id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialLiterals([String; 5]);

impl SpecialLiterals {
    pub fn get(&self, kind: SpecialKind) -> &str {
        &self.0[kind.index()]
    }

    /// Replace the literal for one kind.
    pub fn with(mut self, kind: SpecialKind, literal: impl Into<String>) -> Self {
        self.0[kind.index()] = literal.into();
        self
    }
}

impl Default for SpecialLiterals {
    fn default() -> Self {
        Self(SpecialKind::ALL.map(|kind| kind.default_literal().to_string()))
    }
}

/// How special tokens are handled for one encode call.
///
/// The default adds nothing and treats special literals in the text as
/// ordinary text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodePolicy {
    /// Prepend the BOS id.
    pub add_bos: bool,
    /// Append the EOS id.
    pub add_eos: bool,
    /// Match special literals in the input as whole tokens.
    pub allow_special_text: bool,
}

impl EncodePolicy {
    /// No injection, no literal matching.
    pub const PLAIN: EncodePolicy = EncodePolicy {
        add_bos: false,
        add_eos: false,
        allow_special_text: false,
    };

    /// Wrap the sequence in BOS ... EOS.
    pub fn wrapped() -> Self {
        Self {
            add_bos: true,
            add_eos: true,
            allow_special_text: false,
        }
    }

    pub fn with_bos(mut self, add_bos: bool) -> Self {
        self.add_bos = add_bos;
        self
    }

    pub fn with_eos(mut self, add_eos: bool) -> Self {
        self.add_eos = add_eos;
        self
    }

    pub fn with_special_text(mut self, allow: bool) -> Self {
        self.allow_special_text = allow;
        self
    }
}

/// Resolved special tokens: ids, literals and reverse lookup.
#[derive(Debug, Clone)]
pub struct SpecialTokens {
    ids: SpecialIds,
    literals: [String; 5],
    by_id: FxHashMap<TokenId, SpecialKind>,
}

impl SpecialTokens {
    /// Pair each id with its literal.
    ///
    /// Several kinds may share an id (PAD = EOS is common); [`kind_of`](Self::kind_of)
    /// then reports the first kind in PAD, BOS, EOS, UNK, MASK order. Two kinds
    /// with different ids must not share a literal.
    pub fn new(ids: SpecialIds, literals: [String; 5]) -> Result<Self, VocabError> {
        let mut by_id = FxHashMap::default();
        for (kind, id) in ids.iter() {
            by_id.entry(id).or_insert(kind);
        }

        for a in SpecialKind::ALL {
            for b in SpecialKind::ALL.into_iter().filter(|&b| b > a) {
                if ids.get(a) != ids.get(b) && literals[a.index()] == literals[b.index()] {
                    return Err(VocabError::VocabularyInconsistent(format!(
                        "special tokens {a} and {b} share the literal {:?} but have different ids",
                        literals[a.index()]
                    )));
                }
            }
        }

        Ok(Self {
            ids,
            literals,
            by_id,
        })
    }

    #[inline]
    pub fn id(&self, kind: SpecialKind) -> TokenId {
        self.ids.get(kind)
    }

    pub fn ids(&self) -> SpecialIds {
        self.ids
    }

    pub fn literal(&self, kind: SpecialKind) -> &str {
        &self.literals[kind.index()]
    }

    #[inline]
    pub fn is_special(&self, id: TokenId) -> bool {
        self.by_id.contains_key(&id)
    }

    #[inline]
    pub fn kind_of(&self, id: TokenId) -> Option<SpecialKind> {
        self.by_id.get(&id).copied()
    }

    pub fn unknown_id(&self) -> TokenId {
        self.id(SpecialKind::Unk)
    }

    pub fn pad_id(&self) -> TokenId {
        self.id(SpecialKind::Pad)
    }

    pub fn bos_id(&self) -> TokenId {
        self.id(SpecialKind::Bos)
    }

    pub fn eos_id(&self) -> TokenId {
        self.id(SpecialKind::Eos)
    }

    pub fn mask_id(&self) -> TokenId {
        self.id(SpecialKind::Mask)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpecialKind, TokenId, &str)> + '_ {
        SpecialKind::ALL
            .into_iter()
            .map(|kind| (kind, self.id(kind), self.literal(kind)))
    }

    /// Apply the BOS/EOS part of `policy` to an encoded sequence.
    pub fn inject(&self, mut ids: Vec<TokenId>, policy: EncodePolicy) -> Vec<TokenId> {
        if policy.add_bos {
            ids.insert(0, self.bos_id());
        }
        if policy.add_eos {
            ids.push(self.eos_id());
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_literals() -> [String; 5] {
        SpecialKind::ALL.map(|k| k.default_literal().to_string())
    }

    #[test]
    fn test_names_roundtrip() {
        for kind in SpecialKind::ALL {
            assert_eq!(SpecialKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(SpecialKind::from_name("pad"), None);
        assert_eq!(SpecialKind::from_name("SEP"), None);
    }

    #[test]
    fn test_lookup() {
        let specials =
            SpecialTokens::new(SpecialIds::new(1, 0, 2, 3, 50264), default_literals()).unwrap();
        assert_eq!(specials.bos_id(), 0);
        assert_eq!(specials.unknown_id(), 3);
        assert!(specials.is_special(50264));
        assert!(!specials.is_special(4));
        assert_eq!(specials.kind_of(2), Some(SpecialKind::Eos));
        assert_eq!(specials.literal(SpecialKind::Mask), "<mask>");
    }

    #[test]
    fn test_shared_id_reports_first_kind() {
        let mut literals = default_literals();
        literals[SpecialKind::Eos.index()] = "<pad>".to_string();
        let specials = SpecialTokens::new(SpecialIds::new(7, 0, 7, 3, 4), literals).unwrap();
        assert_eq!(specials.kind_of(7), Some(SpecialKind::Pad));
    }

    #[test]
    fn test_shared_literal_with_distinct_ids_is_rejected() {
        let mut literals = default_literals();
        literals[SpecialKind::Mask.index()] = "<unk>".to_string();
        let err = SpecialTokens::new(SpecialIds::new(1, 0, 2, 3, 4), literals).unwrap_err();
        assert!(matches!(err, VocabError::VocabularyInconsistent(_)));
    }

    #[test]
    fn test_inject() {
        let specials =
            SpecialTokens::new(SpecialIds::new(1, 0, 2, 3, 4), default_literals()).unwrap();
        assert_eq!(specials.inject(vec![10, 11], EncodePolicy::PLAIN), vec![10, 11]);
        assert_eq!(
            specials.inject(vec![10, 11], EncodePolicy::wrapped()),
            vec![0, 10, 11, 2]
        );
        assert_eq!(
            specials.inject(Vec::new(), EncodePolicy::default().with_eos(true)),
            vec![2]
        );
    }

    #[test]
    fn test_literal_overrides() {
        let literals = SpecialLiterals::default().with(SpecialKind::Bos, "<|startoftext|>");
        assert_eq!(literals.get(SpecialKind::Bos), "<|startoftext|>");
        assert_eq!(literals.get(SpecialKind::Eos), "</s>");
    }
}
