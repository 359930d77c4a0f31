//! The compiled, immutable parse-table representation.
//!
//! A [`Language`] is constructed once by [`GrammarBuilder::compile`], shared
//! read-only (behind an `Arc`) by every parse on every thread, and never
//! mutated afterwards.

use regex_automata::dfa::dense;
use rowan::NodeOrToken;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::fmt;
use std::sync::Arc;

use crate::grammar::{GrammarBuilder, PrecLevel, Sym, SymbolClass, TermSource};
use crate::lexer::ExternalScanner;
use crate::syntax::{SyntaxElement, SyntaxKind, SyntaxNode};

/// Index of a parser state in the action/goto tables.
pub type StateId = u32;

/// The lexical state a token was produced in.
///
/// Lexical context is derived from the parser state: the set of terminals
/// valid in that state restricts which lexical rules may fire. Carrying the
/// state makes the lexer restartable from any byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexState(pub(crate) StateId);

/// One table action for a `(state, terminal)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// No valid transition; triggers error recovery.
    Error,
    /// Consume the lookahead and enter the given state.
    Shift(StateId),
    /// Pop the production's right-hand side and emit its node.
    Reduce(u32),
}

/// Metadata for one grammar symbol.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub(crate) name: SmolStr,
    pub(crate) class: SymbolClass,
    pub(crate) source: TermSource,
    pub(crate) is_extra: bool,
    pub(crate) is_hidden: bool,
    pub(crate) prec: Option<PrecLevel>,
    /// Column in the action table (terminals) or goto table (nonterminals).
    pub(crate) col: u16,
}

impl SymbolInfo {
    pub(crate) fn reserved(name: &str, class: SymbolClass) -> Self {
        Self {
            name: SmolStr::new(name),
            class,
            source: TermSource::None,
            is_extra: false,
            is_hidden: false,
            prec: None,
            col: 0,
        }
    }

    /// The symbol's declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One production in compiled form.
#[derive(Debug, Clone)]
pub struct Production {
    pub(crate) lhs: u16,
    pub(crate) rhs: Vec<u16>,
    pub(crate) fields: Vec<Option<SmolStr>>,
}

impl Production {
    /// Number of right-hand-side symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    /// Returns `true` for an epsilon production.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }
}

/// A set of terminals, indexed by symbol id.
///
/// Passed to external scanners so they can see which of their tokens are
/// currently expected.
#[derive(Clone, PartialEq, Eq)]
pub struct TerminalSet {
    bits: Vec<u64>,
}

impl TerminalSet {
    pub(crate) fn new(n_symbols: usize) -> Self {
        Self {
            bits: vec![0; n_symbols.div_ceil(64)],
        }
    }

    pub(crate) fn insert(&mut self, sym: u16) {
        self.bits[usize::from(sym) / 64] |= 1 << (usize::from(sym) % 64);
    }

    pub(crate) fn contains_raw(&self, sym: u16) -> bool {
        self.bits
            .get(usize::from(sym) / 64)
            .is_some_and(|word| word & (1 << (usize::from(sym) % 64)) != 0)
    }

    /// Returns `true` if the given terminal is in the set.
    #[must_use]
    pub fn contains(&self, terminal: crate::grammar::TerminalId) -> bool {
        self.contains_raw(terminal.0)
    }
}

impl fmt::Debug for TerminalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for (word_idx, word) in self.bits.iter().enumerate() {
            for bit in 0..64 {
                if word & (1 << bit) != 0 {
                    set.entry(&(word_idx * 64 + bit));
                }
            }
        }
        set.finish()
    }
}

pub(crate) struct LexTables {
    /// Anchored multi-pattern DFA over all literal and pattern terminals.
    pub(crate) dfa: Option<dense::DFA<Vec<u32>>>,
    /// Pattern index (declaration order) to terminal symbol id.
    pub(crate) pattern_syms: Vec<u16>,
}

/// An immutable, compiled language definition.
///
/// Holds the deterministic action/goto tables, the lexical DFA, the symbol
/// and production metadata, and the optional external scanner hook. Shared
/// process-wide; all concurrent parses read it without locking.
pub struct Language {
    pub(crate) name: SmolStr,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) prods: Vec<Production>,
    pub(crate) start: u16,

    // Dense tables: `actions` is indexed by `state * n_term_cols + col`,
    // `gotos` by `state * n_nt_cols + col` (u32::MAX = no goto).
    pub(crate) n_term_cols: usize,
    pub(crate) n_nt_cols: usize,
    pub(crate) actions: Vec<Action>,
    pub(crate) gotos: Vec<u32>,
    /// Per state: symbol accepted on end-of-input, or `u16::MAX`.
    pub(crate) accepts: Vec<u16>,
    /// Per state: terminals with a non-error action, plus extras.
    pub(crate) valid: Vec<TerminalSet>,
    /// Per state: whether any valid terminal is external.
    pub(crate) external_valid: Vec<bool>,
    /// Per nonterminal column: the automaton entry state for parses rooted
    /// at that nonterminal (used by the incremental reparser).
    pub(crate) entries: Vec<StateId>,

    pub(crate) lex: LexTables,
    /// Literal spelling to terminal symbol id (queries, diagnostics).
    pub(crate) literals: FxHashMap<SmolStr, u16>,
    pub(crate) scanner: Option<Arc<dyn ExternalScanner>>,
}

// The lexical DFA is large and uninformative; Debug shows the shape only.
impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Language")
            .field("name", &self.name)
            .field("symbols", &self.symbols.len())
            .field("productions", &self.prods.len())
            .field("states", &self.accepts.len())
            .finish_non_exhaustive()
    }
}

impl Language {
    /// The language name given to the builder.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tree kind for a grammar symbol.
    #[must_use]
    pub fn kind_of(&self, sym: Sym) -> SyntaxKind {
        SyntaxKind(sym.0)
    }

    /// The display name of a tree kind.
    #[must_use]
    pub fn kind_name(&self, kind: SyntaxKind) -> &str {
        self.symbols
            .get(usize::from(kind.0))
            .map_or("?", SymbolInfo::name)
    }

    /// Looks up a symbol by its declared name.
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<Sym> {
        let idx = self.symbols.iter().position(|s| s.name == name)?;
        Some(Sym(idx as u16))
    }

    /// Looks up a literal terminal by its spelling.
    #[must_use]
    pub fn literal(&self, spelling: &str) -> Option<Sym> {
        self.literals.get(spelling).map(|&id| Sym(id))
    }

    /// The declared start symbol.
    #[must_use]
    pub fn start_symbol(&self) -> Sym {
        Sym(self.start)
    }

    /// Returns `true` if `kind` is a terminal (token) kind.
    #[must_use]
    pub fn is_terminal(&self, kind: SyntaxKind) -> bool {
        self.class(kind.0) == SymbolClass::Terminal
    }

    /// Returns `true` if `kind` is a nonterminal (node) kind.
    #[must_use]
    pub fn is_nonterminal(&self, kind: SyntaxKind) -> bool {
        self.class(kind.0) == SymbolClass::Nonterminal
    }

    /// Returns `true` if `kind` is an extra (trivia) terminal.
    #[must_use]
    pub fn is_extra(&self, kind: SyntaxKind) -> bool {
        self.symbols
            .get(usize::from(kind.0))
            .is_some_and(|s| s.is_extra)
    }

    pub(crate) fn class(&self, sym: u16) -> SymbolClass {
        self.symbols[usize::from(sym)].class
    }

    pub(crate) fn symbol_count(&self) -> u16 {
        self.symbols.len() as u16
    }

    pub(crate) fn is_hidden_raw(&self, sym: u16) -> bool {
        self.symbols[usize::from(sym)].is_hidden
    }

    pub(crate) fn is_extra_raw(&self, sym: u16) -> bool {
        self.symbols[usize::from(sym)].is_extra
    }

    pub(crate) fn is_insertable(&self, sym: u16) -> bool {
        matches!(self.symbols[usize::from(sym)].source, TermSource::Literal(_))
    }

    pub(crate) fn action(&self, state: StateId, terminal: u16) -> Action {
        let info = &self.symbols[usize::from(terminal)];
        match info.class {
            SymbolClass::Eof | SymbolClass::Terminal => {
                self.actions[state as usize * self.n_term_cols + usize::from(info.col)]
            }
            _ => Action::Error,
        }
    }

    pub(crate) fn goto(&self, state: StateId, nonterminal: u16) -> Option<StateId> {
        let info = &self.symbols[usize::from(nonterminal)];
        let target = self.gotos[state as usize * self.n_nt_cols + usize::from(info.col)];
        (target != u32::MAX).then_some(target)
    }

    pub(crate) fn accept_symbol(&self, state: StateId) -> Option<u16> {
        let sym = self.accepts[state as usize];
        (sym != u16::MAX).then_some(sym)
    }

    pub(crate) fn valid_terminals(&self, state: StateId) -> &TerminalSet {
        &self.valid[state as usize]
    }

    pub(crate) fn has_external_valid(&self, state: StateId) -> bool {
        self.scanner.is_some() && self.external_valid[state as usize]
    }

    pub(crate) fn entry_state(&self, nonterminal: u16) -> StateId {
        let info = &self.symbols[usize::from(nonterminal)];
        self.entries[usize::from(info.col)]
    }

    pub(crate) fn production(&self, prod: u32) -> &Production {
        &self.prods[prod as usize]
    }

    pub(crate) fn scanner(&self) -> Option<&Arc<dyn ExternalScanner>> {
        self.scanner.as_ref()
    }

    // =====================================================================
    // Field-based child lookup
    // =====================================================================

    /// Finds the child of `node` occupying the right-hand-side position
    /// named `field` in the production that built it.
    ///
    /// Returns `None` when the node's children do not align with any of its
    /// productions (error recovery may leave extra or missing children) or
    /// when no production of this kind names the field.
    #[must_use]
    pub fn child_by_field(&self, node: &SyntaxNode, field: &str) -> Option<SyntaxElement> {
        let (prod, elements) = self.match_production(node)?;
        prod.fields
            .iter()
            .zip(elements)
            .find(|(f, _)| f.as_deref() == Some(field))
            .map(|(_, elem)| elem)
    }

    /// Matches a node's children against its kind's productions, returning
    /// the production and the child elements aligned with its right-hand
    /// side.
    pub(crate) fn match_production(
        &self,
        node: &SyntaxNode,
    ) -> Option<(&Production, Vec<SyntaxElement>)> {
        let kind = node.kind().0;
        let children: Vec<SyntaxElement> = node
            .children_with_tokens()
            .filter(|el| {
                let k = el.kind().0;
                !self.is_extra_raw(k) && self.class(k) != SymbolClass::Error
            })
            .collect();

        'prods: for prod in self.prods.iter().filter(|p| p.lhs == kind) {
            if prod.rhs.len() != children.len() {
                continue;
            }
            for (&sym, child) in prod.rhs.iter().zip(&children) {
                let child_kind = child.kind().0;
                let matches = if self.is_hidden_raw(sym) {
                    // A hidden symbol stands for whatever single element it
                    // expanded to.
                    true
                } else if self.class(child_kind) == SymbolClass::Missing {
                    // A missing leaf wraps a zero-width token of the
                    // expected kind.
                    match child {
                        NodeOrToken::Node(n) => n
                            .first_token()
                            .is_some_and(|t| t.kind().0 == sym),
                        NodeOrToken::Token(_) => false,
                    }
                } else {
                    child_kind == sym
                };
                if !matches {
                    continue 'prods;
                }
            }
            return Some((prod, children));
        }
        None
    }
}

pub(crate) struct CompiledTables {
    pub(crate) n_term_cols: usize,
    pub(crate) n_nt_cols: usize,
    pub(crate) actions: Vec<Action>,
    pub(crate) gotos: Vec<u32>,
    pub(crate) accepts: Vec<u16>,
    pub(crate) valid: Vec<TerminalSet>,
    pub(crate) external_valid: Vec<bool>,
    pub(crate) entries: Vec<StateId>,
}

impl Language {
    pub(crate) fn from_parts(
        builder: GrammarBuilder,
        prods: Vec<Production>,
        tables: CompiledTables,
        lex: LexTables,
    ) -> Self {
        let mut literals = FxHashMap::default();
        for (idx, info) in builder.symbols.iter().enumerate() {
            if let TermSource::Literal(spelling) = &info.source {
                literals.insert(spelling.clone(), idx as u16);
            }
        }
        Self {
            name: builder.name,
            symbols: builder.symbols,
            prods,
            start: builder.start.map(|s| s.0).unwrap_or_default(),
            n_term_cols: tables.n_term_cols,
            n_nt_cols: tables.n_nt_cols,
            actions: tables.actions,
            gotos: tables.gotos,
            accepts: tables.accepts,
            valid: tables.valid,
            external_valid: tables.external_valid,
            entries: tables.entries,
            lex,
            literals,
            scanner: builder.scanner,
        }
    }
}
