//! Loading tests for the on-disk artifacts.

mod common;

use bytebpe::{ArtifactKind, EncodePolicy, SpecialKind, Tokenizer, VocabError, VocabularyOptions};
use common::{fixture_tokens, merges_text, special_id, specials_text, write_artifacts};

/// Test that the token strings derived from the byte table and merges match the JSON.
#[test]
fn test_json_agrees_with_derived_strings() {
    let fixture = write_artifacts();
    let derived = bytebpe::load_vocabulary(&fixture.paths()).unwrap();
    let from_json = bytebpe::load_vocabulary(&fixture.paths_with_json()).unwrap();

    assert!(!derived.has_token_file());
    assert!(from_json.has_token_file());
    assert_eq!(derived.vocab_size(), from_json.vocab_size());
    assert_eq!(derived.vocab_size(), fixture.tokens.len());

    for (token, &id) in &fixture.tokens {
        assert_eq!(derived.id_for(token), Some(id), "derived id for {token:?}");
        assert_eq!(from_json.token_for(id), Some(token.as_str()), "JSON token for {id}");
    }
}

/// Test that a special literal spelled in the JSON wins over the default.
#[test]
fn test_json_special_literal() {
    let fixture = write_artifacts();
    let mut tokens = fixture_tokens();
    tokens.remove(SpecialKind::Eos.default_literal());
    tokens.insert("<|endoftext|>".to_string(), special_id(SpecialKind::Eos));
    fixture.write_json(&tokens);

    let tokenizer = Tokenizer::from_artifacts(&fixture.paths_with_json()).unwrap();
    let specials = tokenizer.special_tokens();
    assert_eq!(specials.literal(SpecialKind::Eos), "<|endoftext|>");
    assert_eq!(specials.literal(SpecialKind::Bos), "<s>");

    let eos = special_id(SpecialKind::Eos);
    let ids = tokenizer
        .encode("<|endoftext|>", EncodePolicy::default().with_special_text(true))
        .unwrap();
    assert_eq!(ids, vec![eos]);
    assert_eq!(tokenizer.decode(&[eos]), "<|endoftext|>");
}

/// Test that configured literals are used when no JSON is present.
#[test]
fn test_configured_special_literal() {
    let fixture = write_artifacts();
    let options = VocabularyOptions::default().with_special_literal(SpecialKind::Pad, "[PAD]");
    let vocab = bytebpe::load_vocabulary_with(&fixture.paths(), &options).unwrap();
    let pad = special_id(SpecialKind::Pad);
    assert_eq!(vocab.token_for(pad), Some("[PAD]"));
    assert_eq!(vocab.special_tokens().literal(SpecialKind::Pad), "[PAD]");
}

#[test]
fn test_missing_artifact() {
    let fixture = write_artifacts();
    std::fs::remove_file(&fixture.paths().specials).unwrap();

    match bytebpe::load_vocabulary(&fixture.paths()) {
        Err(VocabError::ArtifactMissing { kind, path, .. }) => {
            assert_eq!(kind, ArtifactKind::Specials);
            assert_eq!(path, fixture.paths().specials);
        }
        other => panic!("expected a missing specials artifact, got {other:?}"),
    }
}

#[test]
fn test_missing_vocab_json() {
    let fixture = write_artifacts();
    let paths = fixture.paths().with_vocab(fixture.dir.path().join("absent.json"));
    assert!(matches!(
        bytebpe::load_vocabulary(&paths),
        Err(VocabError::ArtifactMissing {
            kind: ArtifactKind::VocabJson,
            ..
        })
    ));
}

/// Test that a bad merge line reports its 1-based line number.
#[test]
fn test_malformed_merges_line() {
    let fixture = write_artifacts();
    fixture.overwrite("merges", "220 116 256\n\n104 101\n");

    match bytebpe::load_vocabulary(&fixture.paths()) {
        Err(VocabError::ArtifactMalformed { kind, line, .. }) => {
            assert_eq!(kind, ArtifactKind::Merges);
            assert_eq!(line, 3);
        }
        other => panic!("expected a malformed merge table, got {other:?}"),
    }
}

#[test]
fn test_short_byte_table() {
    let fixture = write_artifacts();
    let short: String = (0..255).map(|b| format!("{b}\n")).collect();
    fixture.overwrite("bytes", &short);

    assert!(matches!(
        bytebpe::load_vocabulary(&fixture.paths()),
        Err(VocabError::ArtifactMalformed {
            kind: ArtifactKind::ByteTable,
            line: 255,
            ..
        })
    ));
}

#[test]
fn test_bad_special_name() {
    let fixture = write_artifacts();
    fixture.overwrite("specials", &format!("{}CLS 999\n", specials_text()));

    match bytebpe::load_vocabulary(&fixture.paths()) {
        Err(VocabError::ArtifactMalformed { kind, line, reason }) => {
            assert_eq!(kind, ArtifactKind::Specials);
            assert_eq!(line, 6);
            assert!(reason.contains("CLS"), "{reason}");
        }
        other => panic!("expected a malformed specials file, got {other:?}"),
    }
}

#[test]
fn test_invalid_json() {
    let fixture = write_artifacts();
    std::fs::write(&fixture.json, "{\n  \"a\": 1,\n  \"b\": \n}").unwrap();

    match bytebpe::load_vocabulary(&fixture.paths_with_json()) {
        Err(VocabError::ArtifactMalformed { kind, line, .. }) => {
            assert_eq!(kind, ArtifactKind::VocabJson);
            assert_eq!(line, 4);
        }
        other => panic!("expected malformed JSON, got {other:?}"),
    }
}

/// Test that a JSON spelling that disagrees with the merges is rejected.
#[test]
fn test_json_disagrees_with_merges() {
    let fixture = write_artifacts();
    let mut tokens = fixture_tokens();
    let id = tokens.remove("Ġthe").unwrap();
    tokens.insert("Ġthee".to_string(), id);
    fixture.write_json(&tokens);

    let err = bytebpe::load_vocabulary(&fixture.paths_with_json()).unwrap_err();
    assert!(
        matches!(err, VocabError::VocabularyInconsistent(_)),
        "unexpected error: {err}"
    );
}

#[test]
fn test_json_missing_merge_result() {
    let fixture = write_artifacts();
    let mut tokens = fixture_tokens();
    tokens.remove("Ġworld");
    fixture.write_json(&tokens);

    assert!(matches!(
        bytebpe::load_vocabulary(&fixture.paths_with_json()),
        Err(VocabError::VocabularyInconsistent(_))
    ));
}

/// Test that a merge may only use ids defined by the bytes or an earlier merge.
#[test]
fn test_merge_with_unknown_input() {
    let fixture = write_artifacts();
    let merges = format!("9999 116 400\n{}", merges_text(&fixture.tokens));
    fixture.overwrite("merges", &merges);

    assert!(matches!(
        bytebpe::load_vocabulary(&fixture.paths()),
        Err(VocabError::VocabularyInconsistent(_))
    ));
}

#[test]
fn test_special_id_collides_with_byte() {
    let fixture = write_artifacts();
    let specials = specials_text().replacen(
        &format!("PAD {}", special_id(SpecialKind::Pad)),
        "PAD 32",
        1,
    );
    fixture.overwrite("specials", &specials);

    assert!(matches!(
        bytebpe::load_vocabulary(&fixture.paths()),
        Err(VocabError::VocabularyInconsistent(_))
    ));
}

/// Test that loading through the tokenizer wraps vocabulary errors.
#[test]
fn test_tokenizer_surfaces_vocab_error() {
    let fixture = write_artifacts();
    fixture.overwrite("bytes", "");
    let err = Tokenizer::from_artifacts(&fixture.paths()).unwrap_err();
    assert!(matches!(err, bytebpe::TokenizerError::Vocab(_)), "{err}");
}
