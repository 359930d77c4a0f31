//! `scrapile-syntax` - Grammar tables, lexer, parser engine, and incremental
//! syntax trees for the Scrapile language family.
//!
//! This crate is the grammar-agnostic parsing core. A language plugs in by
//! describing its terminals, productions, and precedence rules with
//! [`GrammarBuilder`]; `compile` turns that description into an immutable
//! [`Language`] table that every parse shares read-only:
//!
//! - **Grammar tables**: a deterministic shift/reduce/goto automaton with
//!   conflict-resolution metadata (see `grammar`)
//! - **Lexer**: a restartable, state-aware table lexer (see `lexer`)
//! - **Parser**: a table-driven engine with local error recovery that always
//!   produces a tree (see `parser`)
//! - **Syntax tree**: lossless `rowan` trees with structural sharing (see
//!   `syntax`)
//! - **Incremental reparse**: edit-driven subtree reuse (see `reparse`)
//!
//! # Design Principles
//!
//! - **Lossless**: all source text is preserved, including whitespace and
//!   comments
//! - **Error-tolerant**: parsing continues after errors, producing a partial
//!   tree with ERROR/MISSING annotations instead of failing the call
//! - **Incremental**: a reparse reuses every green subtree outside the edited
//!   region, and the result is equivalent to a from-scratch parse
//!
//! # Example
//!
//! ```
//! use scrapile_syntax::{parse, Assoc, GrammarBuilder};
//!
//! let mut g = GrammarBuilder::new("arith");
//! let ws = g.extra_pattern("whitespace", r"[ \t\r\n]+");
//! let num = g.terminal_pattern("number", r"[0-9]+");
//! let plus = g.literal("+");
//! let expr = g.nonterminal("expr");
//! g.precedence(Assoc::Left, &[plus]);
//! g.production(expr, &[expr.into(), plus.into(), expr.into()]);
//! g.production(expr, &[num.into()]);
//! g.start(expr);
//! let _ = ws;
//!
//! let lang = g.compile().unwrap();
//! let parsed = parse(&lang, "1 + 2 + 3");
//! assert!(parsed.ok());
//! assert_eq!(parsed.syntax().kind(), lang.kind_of(expr.into()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod query;
pub mod reparse;
pub mod syntax;

pub use grammar::{
    Assoc, CompileError, GrammarBuilder, Language, LexState, NonterminalId, Sym, TerminalId,
    TerminalSet,
};
pub use lexer::{next_token, tokenize, ExternalScanner, ScannedToken, Token};
pub use parser::{parse, Parse, ParseError};
pub use query::{Capture, Query, QueryError, QueryMatch};
pub use reparse::{reparse, Edit, ReparseError};
pub use syntax::{
    LineIndex, Point, PointRange, SyntaxElement, SyntaxKind, SyntaxNode, SyntaxNodeExt,
    SyntaxToken,
};
