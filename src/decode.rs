//! Decode engine: evaluates grammar tokens against a parse environment.
//!
//! Every token parse is a pure function `(token, environment, encoding) -> Result<environment>`.
//! Failures are ordinary [`ParseError`] values: [`Cho`](crate::ast::TokenKind::Cho) and
//! [`Rep`](crate::ast::TokenKind::Rep) recover from them by trying the next alternative or
//! stopping, everything else propagates them to the caller. The caller's environment is
//! never touched, so a failed parse leaks nothing.

use crate::ast::{Token, TokenKind};
use crate::backtrack;
use crate::directory;
use crate::encoding::{Encoding, Sign};
use crate::environment::Environment;
use crate::expr::ValueExpr;
use crate::greedy;
use crate::history::EntryKind;
use crate::source::ByteSource;
use log::{info, trace};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Predicate mismatch: {name} at offset {offset}")]
    PredicateMismatch { name: String, offset: u64 },
    #[error("Insufficient data: {requested} bytes requested at offset {offset}, {available} available")]
    InsufficientData {
        offset: u64,
        requested: u64,
        available: u64,
    },
    #[error("Expression inapplicable: {0}")]
    ExpressionInapplicable(String),
    #[error("All {tried} alternatives of {name} failed at offset {offset}")]
    AllAlternativesFailed {
        name: String,
        offset: u64,
        tried: usize,
    },
    #[error("Recursion limit exceeded: {0}")]
    RecursionLimitExceeded(String),
    #[error("Directory depth {depth} is not defined by the format (offset {offset})")]
    DepthUndefined { depth: usize, offset: u64 },
    #[error("Repetition limit exceeded: {count} > {limit} for {name}")]
    RepetitionLimitExceeded { name: String, count: u64, limit: u64 },
}

/// Resource bounds for one decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Maximum number of simultaneously open groups.
    pub max_recursion: usize,
    /// Maximum count accepted by a counted repetition or a directory table.
    pub max_repetitions: u64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            max_recursion: 64,
            max_repetitions: 1 << 20,
        }
    }
}

/// A grammar bundled with the configuration it is decoded with.
#[derive(Debug, Clone)]
pub struct Format {
    pub name: String,
    pub token: Arc<Token>,
    pub encoding: Encoding,
    pub options: DecodeOptions,
}

impl Format {
    pub fn new(name: &str, token: Arc<Token>, encoding: Encoding) -> Self {
        Format {
            name: name.to_string(),
            token,
            encoding,
            options: DecodeOptions::default(),
        }
    }

    pub fn with_options(self, options: DecodeOptions) -> Self {
        Format { options, ..self }
    }

    /// Decode `source` from offset 0.
    pub fn decode<'a>(&self, source: &'a dyn ByteSource) -> Result<Environment<'a>, ParseError> {
        decode(self, source)
    }
}

/// Decode a whole source with `format`, starting at offset 0.
pub fn decode<'a>(format: &Format, source: &'a dyn ByteSource) -> Result<Environment<'a>, ParseError> {
    info!("Decoding {} ({} bytes)", format.name, source.size());
    let env = Environment::new(source);
    let result = parse(&format.token, &env, &format.encoding, &format.options);
    match &result {
        Ok(done) => info!(
            "{}: matched, {} records, cursor at {}",
            format.name,
            done.history().len(),
            done.offset()
        ),
        Err(e) => info!("{}: no match: {}", format.name, e),
    }
    result
}

fn size_of(expr: &ValueExpr, env: &Environment<'_>, enc: &Encoding, what: &str) -> Result<u64, ParseError> {
    let v = expr
        .eval_int(env, enc)
        .ok_or_else(|| ParseError::ExpressionInapplicable(format!("size of {what}")))?;
    u64::try_from(v).map_err(|_| ParseError::ExpressionInapplicable(format!("negative size {v} of {what}")))
}

/// Parse `token` at the environment's cursor.
pub fn parse<'a>(
    token: &Arc<Token>,
    env: &Environment<'a>,
    inherited: &Encoding,
    opts: &DecodeOptions,
) -> Result<Environment<'a>, ParseError> {
    let enc = token.encoding.unwrap_or(*inherited);
    match &token.kind {
        TokenKind::Def { size, predicate } => {
            let n = size_of(size, env, &enc, &token.name)?;
            let next = env.read_value(&token.name, n, enc, EntryKind::Def)?;
            if predicate.eval(&next, &enc) {
                Ok(next)
            } else {
                Err(ParseError::PredicateMismatch {
                    name: token.name.clone(),
                    offset: env.offset(),
                })
            }
        }
        TokenKind::Nod { size } => {
            let n = size_of(size, env, &enc, "skip")?;
            let end = env.offset().checked_add(n).filter(|&end| end <= env.source().size());
            match end {
                Some(end) => Ok(env.seek(end)),
                None => Err(ParseError::InsufficientData {
                    offset: env.offset(),
                    requested: n,
                    available: env.source().size().saturating_sub(env.offset()),
                }),
            }
        }
        TokenKind::Seq(children) => {
            let mut cur = open(token, env, opts)?;
            for child in children {
                cur = parse(child, &cur, &enc, opts)?;
            }
            Ok(cur.leave())
        }
        TokenKind::Cho(alternatives) => {
            let (_, done) = backtrack::first_match(&token.name, alternatives, env, |alt, attempt| {
                parse(alt, attempt, &enc, opts)
            })?;
            Ok(done)
        }
        TokenKind::Rep(inner) => {
            let cur = open(token, env, opts)?;
            let done = backtrack::repeat_until_fail(&cur, opts.max_repetitions, |attempt| {
                parse(inner, attempt, &enc, opts)
            });
            Ok(done.leave())
        }
        TokenKind::RepN { inner, count } => {
            let n = count.eval_int(env, &enc).ok_or_else(|| {
                ParseError::ExpressionInapplicable(format!("repetition count of {}", token.name))
            })?;
            let n = u64::try_from(n).map_err(|_| {
                ParseError::ExpressionInapplicable(format!("negative repetition count {n} of {}", token.name))
            })?;
            if n > opts.max_repetitions {
                return Err(ParseError::RepetitionLimitExceeded {
                    name: token.name.clone(),
                    count: n,
                    limit: opts.max_repetitions,
                });
            }
            let cur = open(token, env, opts)?;
            let done = backtrack::repeat_n(&cur, n, |attempt| parse(inner, attempt, &enc, opts))?;
            Ok(done.leave())
        }
        TokenKind::Pre { inner, predicate } => {
            if predicate.eval(env, &enc) {
                parse(inner, env, &enc, opts)
            } else {
                trace!("pre: predicate false at offset {}, skipping", env.offset());
                Ok(env.clone())
            }
        }
        TokenKind::Sub { inner, offset } => {
            let at = offset
                .eval_int(env, &enc)
                .and_then(|v| u64::try_from(v).ok())
                .ok_or_else(|| ParseError::ExpressionInapplicable("sub offset".to_string()))?;
            let cur = open(token, env, opts)?.seek(at);
            let done = parse(inner, &cur, &enc, opts)?;
            Ok(done.leave().seek(env.offset()))
        }
        TokenKind::Fix(body) => {
            let cur = open(token, env, opts)?;
            let done = parse(body, &cur, &enc, opts)?;
            Ok(done.leave())
        }
        TokenKind::SelfRef(target) => {
            let anchor = env
                .frames()
                .find(|f| matches!(f.token.kind, TokenKind::Fix(_)) && f.token.name == *target)
                .map(|f| Arc::clone(&f.token))
                .ok_or_else(|| {
                    ParseError::ExpressionInapplicable(format!("no enclosing recursion anchor {target}"))
                })?;
            parse(&anchor, env, &enc, opts)
        }
        TokenKind::Greedy { predicate } => greedy::read_greedy(&token.name, predicate, env, &enc),
        TokenKind::Let { value, predicate } => {
            let v = value
                .eval_int(env, &enc)
                .ok_or_else(|| ParseError::ExpressionInapplicable(format!("value of {}", token.name)))?;
            let stored = Encoding::big_endian().with_sign(Sign::Signed);
            let next = env.add_constant(&token.name, v.to_be_bytes().to_vec(), stored);
            if predicate.eval(&next, &enc) {
                Ok(next)
            } else {
                Err(ParseError::PredicateMismatch {
                    name: token.name.clone(),
                    offset: env.offset(),
                })
            }
        }
        TokenKind::ResourceDirectory(shape) => {
            let cur = open(token, env, opts)?;
            let (done, table) = directory::decode_tree(shape, &cur, opts)?;
            Ok(done.add_directory(table).leave())
        }
    }
}

/// Open a group for `token`, enforcing the recursion bound.
fn open<'a>(token: &Arc<Token>, env: &Environment<'a>, opts: &DecodeOptions) -> Result<Environment<'a>, ParseError> {
    if env.depth() >= opts.max_recursion {
        return Err(ParseError::RecursionLimitExceeded(format!(
            "{} groups open at offset {} entering {}",
            env.depth(),
            env.offset(),
            token.name
        )));
    }
    Ok(env.enter(token))
}
