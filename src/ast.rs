//! Grammar tokens: immutable descriptions of how to read and validate a region of bytes.
//!
//! Tokens are built once and shared through `Arc`, so one grammar can drive any number
//! of decodes (also from different threads). The free functions in this module are the
//! building blocks formats are composed from:
//!
//! | Builder | Reads |
//! |---------|-------|
//! | [`def`] | a field of `size` bytes, gated by a predicate on its value |
//! | [`nod`] | skips `size` bytes without recording them |
//! | [`seq`] | children left to right |
//! | [`cho`] | the first alternative that succeeds (backtracking) |
//! | [`rep`] / [`repn`] | until the inner token fails / exactly `count` times |
//! | [`pre`] | the inner token only when a predicate holds |
//! | [`sub`] | the inner token at an absolute offset, then returns to the cursor |
//! | [`fix`] / [`self_ref`] | a recursive grammar |
//! | [`greedy`] | a field whose length is found by probing byte by byte |
//! | [`let_`] | nothing; appends a computed value |
//! | [`resource_directory`] | a PE resource directory tree |

use crate::directory::DirectoryShape;
use crate::encoding::Encoding;
use crate::expr::{con, Expr, ValueExpr};
use std::sync::Arc;

#[derive(Debug)]
pub struct Token {
    pub name: String,
    pub kind: TokenKind,
    /// Overrides the inherited encoding for this token and its children.
    pub encoding: Option<Encoding>,
}

#[derive(Debug)]
pub enum TokenKind {
    Def { size: ValueExpr, predicate: Expr },
    Nod { size: ValueExpr },
    Seq(Vec<Arc<Token>>),
    Cho(Vec<Arc<Token>>),
    Rep(Arc<Token>),
    RepN { inner: Arc<Token>, count: ValueExpr },
    Pre { inner: Arc<Token>, predicate: Expr },
    Sub { inner: Arc<Token>, offset: ValueExpr },
    /// Recursion anchor: [`TokenKind::SelfRef`] with this token's name re-enters it.
    Fix(Arc<Token>),
    SelfRef(String),
    Greedy { predicate: Expr },
    Let { value: ValueExpr, predicate: Expr },
    ResourceDirectory(DirectoryShape),
}

impl Token {
    pub fn new(name: &str, kind: TokenKind) -> Arc<Token> {
        Arc::new(Token {
            name: name.to_string(),
            kind,
            encoding: None,
        })
    }

    /// Short type label used by exporters ("Seq", "Def", ...).
    pub fn label(&self) -> &'static str {
        match &self.kind {
            TokenKind::Def { .. } => "Def",
            TokenKind::Nod { .. } => "Nod",
            TokenKind::Seq(_) => "Seq",
            TokenKind::Cho(_) => "Cho",
            TokenKind::Rep(_) => "Rep",
            TokenKind::RepN { .. } => "RepN",
            TokenKind::Pre { .. } => "Pre",
            TokenKind::Sub { .. } => "Sub",
            TokenKind::Fix(_) => "Fix",
            TokenKind::SelfRef(_) => "SelfRef",
            TokenKind::Greedy { .. } => "Greedy",
            TokenKind::Let { .. } => "Let",
            TokenKind::ResourceDirectory(_) => "ResourceDirectory",
        }
    }

    /// Whether a successful parse of this token opens a group in the history.
    pub fn is_group(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Seq(_)
                | TokenKind::Rep(_)
                | TokenKind::RepN { .. }
                | TokenKind::Sub { .. }
                | TokenKind::Fix(_)
                | TokenKind::ResourceDirectory(_)
        )
    }
}

/// Returns a copy of `token` that reads with `encoding`.
pub fn with_encoding(token: Token, encoding: Encoding) -> Arc<Token> {
    Arc::new(Token {
        encoding: Some(encoding),
        ..token
    })
}

fn plain(name: &str, kind: TokenKind) -> Token {
    Token {
        name: name.to_string(),
        kind,
        encoding: None,
    }
}

pub fn def(name: &str, size: u64) -> Arc<Token> {
    def_if(name, size, Expr::True)
}

pub fn def_if(name: &str, size: u64, predicate: Expr) -> Arc<Token> {
    def_sized(name, con(size as i128), predicate)
}

/// Field whose size is computed from earlier values.
pub fn def_sized(name: &str, size: ValueExpr, predicate: Expr) -> Arc<Token> {
    Token::new(name, TokenKind::Def { size, predicate })
}

/// [`def_if`] with an explicit encoding.
pub fn def_enc(name: &str, size: ValueExpr, predicate: Expr, encoding: Encoding) -> Arc<Token> {
    with_encoding(plain(name, TokenKind::Def { size, predicate }), encoding)
}

pub fn nod(size: ValueExpr) -> Arc<Token> {
    Token::new("", TokenKind::Nod { size })
}

pub fn seq(name: &str, children: Vec<Arc<Token>>) -> Arc<Token> {
    Token::new(name, TokenKind::Seq(children))
}

/// [`seq`] whose children read with `encoding` unless they override it.
pub fn seq_enc(name: &str, encoding: Encoding, children: Vec<Arc<Token>>) -> Arc<Token> {
    with_encoding(plain(name, TokenKind::Seq(children)), encoding)
}

pub fn cho(name: &str, alternatives: Vec<Arc<Token>>) -> Arc<Token> {
    Token::new(name, TokenKind::Cho(alternatives))
}

pub fn rep(name: &str, inner: Arc<Token>) -> Arc<Token> {
    Token::new(name, TokenKind::Rep(inner))
}

pub fn repn(name: &str, inner: Arc<Token>, count: ValueExpr) -> Arc<Token> {
    Token::new(name, TokenKind::RepN { inner, count })
}

pub fn pre(inner: Arc<Token>, predicate: Expr) -> Arc<Token> {
    Token::new("", TokenKind::Pre { inner, predicate })
}

pub fn sub(inner: Arc<Token>, offset: ValueExpr) -> Arc<Token> {
    Token::new("", TokenKind::Sub { inner, offset })
}

pub fn fix(name: &str, body: Arc<Token>) -> Arc<Token> {
    Token::new(name, TokenKind::Fix(body))
}

pub fn self_ref(name: &str) -> Arc<Token> {
    Token::new(name, TokenKind::SelfRef(name.to_string()))
}

pub fn greedy(name: &str, predicate: Expr) -> Arc<Token> {
    Token::new(name, TokenKind::Greedy { predicate })
}

pub fn let_(name: &str, value: ValueExpr) -> Arc<Token> {
    let_if(name, value, Expr::True)
}

pub fn let_if(name: &str, value: ValueExpr, predicate: Expr) -> Arc<Token> {
    Token::new(name, TokenKind::Let { value, predicate })
}

/// PE resource directory rooted at the cursor. `delta` yields the section's
/// virtual-address-to-file-offset delta used to locate leaf payloads.
pub fn resource_directory(name: &str, delta: ValueExpr) -> Arc<Token> {
    Token::new(name, TokenKind::ResourceDirectory(DirectoryShape::new(delta)))
}
