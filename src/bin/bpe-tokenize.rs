//! Encode or decode line by line with a byte-level BPE vocabulary.
//!
//! ```text
//! bpe-tokenize encode <prefix> [input|-] [--vocab <json>] [--bos] [--eos] [--specials] [--verbose]
//! bpe-tokenize decode <prefix> [input|-] [--vocab <json>] [--skip-specials] [--verbose]
//! ```
//!
//! `encode` prints one line of space-separated ids per input line; `decode`
//! reads such lines and prints the text. Input defaults to stdin.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bytebpe::{
    ArtifactPaths, EncodePolicy, TokenId, Tokenizer, TokenizerOptions, VocabularyOptions,
};

const USAGE: &str = "\
usage: bpe-tokenize encode <prefix> [input|-] [--vocab <json>] [--bos] [--eos] [--specials] [--verbose]
       bpe-tokenize decode <prefix> [input|-] [--vocab <json>] [--skip-specials] [--verbose]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Encode,
    Decode,
}

#[derive(Debug)]
struct Args {
    mode: Mode,
    prefix: PathBuf,
    input: Option<PathBuf>,
    vocab: Option<PathBuf>,
    policy: EncodePolicy,
    skip_specials: bool,
    verbose: bool,
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> Result<Args> {
    let mode = match argv.next().as_deref() {
        Some("encode") => Mode::Encode,
        Some("decode") => Mode::Decode,
        Some(other) => bail!("unknown command {other:?}\n{USAGE}"),
        None => bail!("missing command\n{USAGE}"),
    };

    let mut positional = Vec::new();
    let mut args = Args {
        mode,
        prefix: PathBuf::new(),
        input: None,
        vocab: None,
        policy: EncodePolicy::default(),
        skip_specials: false,
        verbose: false,
    };

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--vocab" => {
                let path = argv.next().context("--vocab needs a path")?;
                args.vocab = Some(PathBuf::from(path));
            }
            "--bos" if mode == Mode::Encode => args.policy.add_bos = true,
            "--eos" if mode == Mode::Encode => args.policy.add_eos = true,
            "--specials" if mode == Mode::Encode => args.policy.allow_special_text = true,
            "--skip-specials" if mode == Mode::Decode => args.skip_specials = true,
            "--verbose" | "-v" => args.verbose = true,
            flag if flag.starts_with('-') && flag != "-" => {
                bail!("unknown option {flag:?}\n{USAGE}")
            }
            _ => positional.push(arg.clone()),
        }
    }

    let mut positional = positional.into_iter();
    args.prefix = positional
        .next()
        .map(PathBuf::from)
        .with_context(|| format!("missing artifact prefix\n{USAGE}"))?;
    args.input = positional.next().filter(|p| p != "-").map(PathBuf::from);
    if let Some(extra) = positional.next() {
        bail!("unexpected argument {extra:?}\n{USAGE}");
    }
    Ok(args)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_input(input: Option<&PathBuf>) -> Result<Box<dyn BufRead>> {
    Ok(match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("cannot open input {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    })
}

fn parse_ids(line: &str, line_no: usize) -> Result<Vec<TokenId>> {
    line.split_whitespace()
        .map(|field| {
            field
                .parse::<TokenId>()
                .with_context(|| format!("line {line_no}: invalid token id {field:?}"))
        })
        .collect()
}

fn load_tokenizer(args: &Args) -> Result<Tokenizer> {
    let mut paths = ArtifactPaths::from_prefix(&args.prefix);
    if let Some(vocab) = &args.vocab {
        paths = paths.with_vocab(vocab);
    }
    let options = TokenizerOptions::default().with_skip_special_tokens(args.skip_specials);
    let tokenizer = Tokenizer::from_artifacts_with(&paths, &VocabularyOptions::default(), options)
        .with_context(|| format!("failed to load vocabulary {}", args.prefix.display()))?;
    info!(vocab_size = tokenizer.vocab_size(), mode = ?args.mode, "tokenizer ready");
    Ok(tokenizer)
}

/// Process `input` line by line, writing one output line per input line.
fn run(
    args: &Args,
    tokenizer: &Tokenizer,
    input: impl BufRead,
    mut out: impl Write,
) -> Result<()> {
    for (idx, line) in input.lines().enumerate() {
        let line = line.context("failed to read input")?;
        match args.mode {
            Mode::Encode => {
                let ids = tokenizer
                    .encode(&line, args.policy)
                    .with_context(|| format!("line {}: encoding failed", idx + 1))?;
                let rendered: Vec<String> = ids.iter().map(TokenId::to_string).collect();
                writeln!(out, "{}", rendered.join(" "))?;
            }
            Mode::Decode => {
                let ids = parse_ids(&line, idx + 1)?;
                writeln!(out, "{}", tokenizer.decode(&ids))?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    init_tracing(args.verbose);
    let tokenizer = load_tokenizer(&args)?;
    let input = open_input(args.input.as_ref())?;
    let stdout = io::stdout();
    run(&args, &tokenizer, input, BufWriter::new(stdout.lock()))
}

#[cfg(test)]
#[path = "../../tests/common/mod.rs"]
mod common;
