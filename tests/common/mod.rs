//! Shared fixture: a small GPT-2 style vocabulary written to disk.
//!
//! Byte `b` has id `b`. Merge rule `i` produces id `256 + i`. The five
//! special tokens follow the merges in PAD, BOS, EOS, UNK, MASK order.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use bytebpe::core::byte_level::GPT2_BYTE_TO_CHAR;
use bytebpe::{
    ArtifactPaths, SpecialKind, TokenId, Tokenizer, TokenizerOptions, Vocabulary,
    VocabularyOptions,
};
use tempfile::TempDir;

/// Merge rules as token strings, in rank order.
pub const MERGES: &[(&str, &str)] = &[
    ("Ġ", "t"),
    ("h", "e"),
    ("Ġt", "he"),
    ("i", "n"),
    ("Ġ", "a"),
    ("e", "r"),
    ("o", "w"),
    ("l", "ow"),
    ("Ġ", "low"),
    ("Ġlow", "er"),
    ("Ġ", "w"),
    ("o", "r"),
    ("Ġw", "or"),
    ("l", "d"),
    ("Ġwor", "ld"),
    ("Ġ", "in"),
    // 你 = E4 BD A0, 好 = E5 A5 BD
    ("ä", "½"),
    ("ä½", "ł"),
    ("å", "¥"),
    ("å¥", "½"),
    ("Ċ", "Ċ"),
];

pub fn special_id(kind: SpecialKind) -> TokenId {
    (256 + MERGES.len() + kind as usize) as TokenId
}

/// Artifacts on disk, removed when dropped.
pub struct Fixture {
    pub dir: TempDir,
    pub prefix: PathBuf,
    pub json: PathBuf,
    pub tokens: HashMap<String, TokenId>,
}

impl Fixture {
    pub fn paths(&self) -> ArtifactPaths {
        ArtifactPaths::from_prefix(&self.prefix)
    }

    pub fn paths_with_json(&self) -> ArtifactPaths {
        self.paths().with_vocab(&self.json)
    }

    /// Id of a token string, panicking if the fixture does not define it.
    pub fn id(&self, token: &str) -> TokenId {
        *self
            .tokens
            .get(token)
            .unwrap_or_else(|| panic!("fixture has no token {token:?}"))
    }

    /// Overwrite one artifact file, e.g. `"merges"`.
    pub fn overwrite(&self, suffix: &str, contents: &str) {
        let path = PathBuf::from(format!("{}.{suffix}", self.prefix.display()));
        fs::write(path, contents).unwrap();
    }

    pub fn write_json(&self, tokens: &HashMap<String, TokenId>) {
        fs::write(&self.json, serde_json::to_vec(tokens).unwrap()).unwrap();
    }
}

/// Token string → id for bytes, merges and specials.
pub fn fixture_tokens() -> HashMap<String, TokenId> {
    let mut tokens: HashMap<String, TokenId> = GPT2_BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(b, ch)| (ch.to_string(), b as TokenId))
        .collect();
    for (i, (left, right)) in MERGES.iter().enumerate() {
        tokens.insert(format!("{left}{right}"), (256 + i) as TokenId);
    }
    for kind in SpecialKind::ALL {
        tokens.insert(kind.default_literal().to_string(), special_id(kind));
    }
    tokens
}

pub fn merges_text(tokens: &HashMap<String, TokenId>) -> String {
    MERGES
        .iter()
        .map(|(left, right)| {
            format!(
                "{} {} {}\n",
                tokens[*left],
                tokens[*right],
                tokens[&format!("{left}{right}")]
            )
        })
        .collect()
}

pub fn bytes_text() -> String {
    (0..256).map(|b| format!("{b}\n")).collect()
}

pub fn specials_text() -> String {
    SpecialKind::ALL
        .iter()
        .map(|&kind| format!("{} {}\n", kind.name(), special_id(kind)))
        .collect()
}

/// Write `<dir>/gpt2.{merges,bytes,specials}` and `<dir>/gpt2.json`.
pub fn write_artifacts() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let prefix = dir.path().join("gpt2");
    let json = dir.path().join("gpt2.json");
    let tokens = fixture_tokens();

    let fixture = Fixture {
        dir,
        prefix,
        json,
        tokens,
    };
    fixture.overwrite("merges", &merges_text(&fixture.tokens));
    fixture.overwrite("bytes", &bytes_text());
    fixture.overwrite("specials", &specials_text());
    fixture.write_json(&fixture.tokens);
    fixture
}

pub fn create_tokenizer(fixture: &Fixture) -> Tokenizer {
    create_tokenizer_with(fixture, TokenizerOptions::default())
}

pub fn create_tokenizer_with(fixture: &Fixture, options: TokenizerOptions) -> Tokenizer {
    let vocab = bytebpe::load_vocabulary_with(&fixture.paths(), &VocabularyOptions::default())
        .unwrap();
    Tokenizer::new(Arc::new(vocab), options).unwrap()
}

pub fn load_vocabulary(fixture: &Fixture) -> Vocabulary {
    bytebpe::load_vocabulary(&fixture.paths()).unwrap()
}
