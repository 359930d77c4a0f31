//! Grammar descriptions and compiled parse tables.
//!
//! A language is described with [`GrammarBuilder`]: terminals (literal
//! spellings, regex patterns, or external tokens), nonterminals with their
//! productions, precedence declarations, and extras (trivia). `compile`
//! validates the description, resolves conflicts, and produces an immutable
//! [`Language`] — the process-wide table every parse shares read-only.
//!
//! # Naming conventions
//!
//! Nonterminals whose name starts with `_` are *hidden*: they structure the
//! grammar but never appear as nodes in the tree (their children are spliced
//! into the parent). This mirrors the convention of grammar files in the
//! tree-sitter family.

mod compile;
mod table;

pub use table::{Action, Language, LexState, Production, StateId, SymbolInfo, TerminalSet};

use smol_str::SmolStr;
use std::sync::Arc;
use thiserror::Error;

use crate::lexer::ExternalScanner;

/// A terminal symbol handle returned by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TerminalId(pub(crate) u16);

/// A nonterminal symbol handle returned by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonterminalId(pub(crate) u16);

/// Any grammar symbol (terminal or nonterminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sym(pub(crate) u16);

impl From<TerminalId> for Sym {
    fn from(id: TerminalId) -> Self {
        Sym(id.0)
    }
}

impl From<NonterminalId> for Sym {
    fn from(id: NonterminalId) -> Self {
        Sym(id.0)
    }
}

/// Associativity of a precedence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    /// Left-associative: `a op b op c` groups as `(a op b) op c`.
    Left,
    /// Right-associative: `a op b op c` groups as `a op (b op c)`.
    Right,
    /// Non-associative: `a op b op c` is a syntax error.
    Nonassoc,
}

/// A precedence level handle. Levels bind tighter in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecLevel(pub(crate) u8);

/// Errors reported by [`GrammarBuilder::compile`].
///
/// These are fatal: parsing cannot proceed without a valid table. Syntax
/// errors in *input text*, by contrast, are never fatal — they are recorded
/// in the tree.
#[derive(Debug, Error)]
pub enum CompileError {
    /// No start symbol was declared.
    #[error("grammar has no start symbol")]
    NoStartSymbol,

    /// Two symbols share a name.
    #[error("duplicate symbol name `{name}`")]
    DuplicateSymbol {
        /// The offending name.
        name: SmolStr,
    },

    /// A nonterminal was declared but given no productions.
    #[error("rule `{rule}` has no productions")]
    EmptyRule {
        /// The offending rule.
        rule: SmolStr,
    },

    /// A rule can never be derived from the start symbol.
    #[error("rule `{rule}` is unreachable from the start symbol")]
    UnreachableRule {
        /// The offending rule.
        rule: SmolStr,
    },

    /// Two reduce actions are equally valid and carry equal explicit
    /// precedence, so neither declaration order nor precedence can break
    /// the tie.
    #[error("ambiguous grammar: `{first}` and `{second}` are equally valid on `{token}`")]
    AmbiguousGrammar {
        /// The lookahead terminal the conflict occurs on.
        token: SmolStr,
        /// First conflicting rule.
        first: SmolStr,
        /// Second conflicting rule.
        second: SmolStr,
    },

    /// A terminal's regex pattern failed to compile.
    #[error("invalid pattern for terminal `{terminal}`: {message}")]
    InvalidPattern {
        /// The terminal whose pattern is invalid.
        terminal: SmolStr,
        /// The underlying pattern error.
        message: String,
    },
}

// =========================================================================
// Builder internals
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymbolClass {
    Eof,
    Error,
    Missing,
    Terminal,
    Nonterminal,
}

#[derive(Debug, Clone)]
pub(crate) enum TermSource {
    /// Reserved symbols (EOF, ERROR, MISSING) and nonterminals.
    None,
    /// A fixed spelling; candidates for missing-token insertion.
    Literal(SmolStr),
    /// A regex pattern lexed by the grammar's DFA.
    Pattern(String),
    /// Lexed by the registered external scanner hook.
    External,
}

#[derive(Debug, Clone)]
pub(crate) struct ProdDef {
    pub(crate) lhs: u16,
    pub(crate) rhs: Vec<u16>,
    pub(crate) fields: Vec<Option<SmolStr>>,
    pub(crate) prec: Option<PrecLevel>,
}

/// Builds a grammar description for [`compile`](GrammarBuilder::compile).
pub struct GrammarBuilder {
    pub(crate) name: SmolStr,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) prods: Vec<ProdDef>,
    pub(crate) prec_assoc: Vec<Assoc>,
    pub(crate) start: Option<NonterminalId>,
    pub(crate) scanner: Option<Arc<dyn ExternalScanner>>,
    pub(crate) duplicate: Option<SmolStr>,
}

impl GrammarBuilder {
    /// Creates a builder for a language with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        let symbols = vec![
            SymbolInfo::reserved("end of file", SymbolClass::Eof),
            SymbolInfo::reserved("ERROR", SymbolClass::Error),
            SymbolInfo::reserved("MISSING", SymbolClass::Missing),
        ];
        Self {
            name: SmolStr::new(name),
            symbols,
            prods: Vec::new(),
            prec_assoc: Vec::new(),
            start: None,
            scanner: None,
            duplicate: None,
        }
    }

    fn add_symbol(&mut self, name: SmolStr, class: SymbolClass, source: TermSource) -> u16 {
        if self.duplicate.is_none() && self.symbols.iter().any(|s| s.name == name) {
            self.duplicate = Some(name.clone());
        }
        let id = self.symbols.len() as u16;
        self.symbols.push(SymbolInfo {
            name,
            class,
            source,
            is_extra: false,
            is_hidden: false,
            prec: None,
            col: 0,
        });
        id
    }

    /// Declares a terminal lexed by a regex pattern.
    pub fn terminal_pattern(&mut self, name: &str, pattern: &str) -> TerminalId {
        let id = self.add_symbol(
            SmolStr::new(name),
            SymbolClass::Terminal,
            TermSource::Pattern(pattern.to_owned()),
        );
        TerminalId(id)
    }

    /// Declares a terminal with a fixed spelling. Its name is the spelling.
    ///
    /// Literal terminals are the candidates for missing-token insertion
    /// during error recovery; only a fixed spelling can be synthesized at
    /// zero width.
    pub fn literal(&mut self, spelling: &str) -> TerminalId {
        let id = self.add_symbol(
            SmolStr::new(spelling),
            SymbolClass::Terminal,
            TermSource::Literal(SmolStr::new(spelling)),
        );
        TerminalId(id)
    }

    /// Declares an extra (trivia) terminal: valid everywhere, preserved in
    /// the tree, never part of a production.
    pub fn extra_pattern(&mut self, name: &str, pattern: &str) -> TerminalId {
        let id = self.terminal_pattern(name, pattern);
        self.symbols[id.0 as usize].is_extra = true;
        id
    }

    /// Declares a terminal produced by the external scanner hook rather
    /// than a lexical rule.
    pub fn external_token(&mut self, name: &str) -> TerminalId {
        let id = self.add_symbol(SmolStr::new(name), SymbolClass::Terminal, TermSource::External);
        TerminalId(id)
    }

    /// Registers the external scanner consulted for external tokens.
    pub fn external_scanner(&mut self, scanner: Arc<dyn ExternalScanner>) {
        self.scanner = Some(scanner);
    }

    /// Declares a nonterminal. Names starting with `_` are hidden.
    pub fn nonterminal(&mut self, name: &str) -> NonterminalId {
        let hidden = name.starts_with('_');
        let id = self.add_symbol(SmolStr::new(name), SymbolClass::Nonterminal, TermSource::None);
        self.symbols[id as usize].is_hidden = hidden;
        NonterminalId(id)
    }

    /// Declares a precedence level for the given terminals. Later calls
    /// declare tighter-binding levels.
    pub fn precedence(&mut self, assoc: Assoc, terminals: &[TerminalId]) -> PrecLevel {
        let level = PrecLevel(self.prec_assoc.len() as u8);
        self.prec_assoc.push(assoc);
        for t in terminals {
            self.symbols[t.0 as usize].prec = Some(level);
        }
        level
    }

    /// Adds a production for `lhs`. Returns a handle for attaching field
    /// names and an explicit precedence.
    pub fn production(&mut self, lhs: NonterminalId, rhs: &[Sym]) -> ProductionRef<'_> {
        let symbols: Vec<u16> = rhs.iter().map(|s| s.0).collect();
        let fields = vec![None; symbols.len()];
        self.prods.push(ProdDef {
            lhs: lhs.0,
            rhs: symbols,
            fields,
            prec: None,
        });
        let idx = self.prods.len() - 1;
        ProductionRef { builder: self, idx }
    }

    /// Declares the start symbol.
    pub fn start(&mut self, start: NonterminalId) {
        self.start = Some(start);
    }

    /// Validates the grammar and compiles it to an immutable [`Language`].
    ///
    /// # Errors
    ///
    /// See [`CompileError`] for the failure taxonomy.
    pub fn compile(self) -> Result<Arc<Language>, CompileError> {
        compile::compile(self).map(Arc::new)
    }
}

/// Handle for decorating the most recently added production.
pub struct ProductionRef<'g> {
    builder: &'g mut GrammarBuilder,
    idx: usize,
}

impl ProductionRef<'_> {
    /// Names the right-hand-side position `idx` for field-based child
    /// lookup.
    pub fn field(self, idx: usize, name: &str) -> Self {
        self.builder.prods[self.idx].fields[idx] = Some(SmolStr::new(name));
        self
    }

    /// Overrides the production's precedence. Without this, a production
    /// inherits the precedence of its rightmost terminal.
    pub fn prec(self, level: PrecLevel) -> Self {
        self.builder.prods[self.idx].prec = Some(level);
        self
    }
}
