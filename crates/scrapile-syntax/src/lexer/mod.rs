//! Table-driven lexer.
//!
//! Terminal patterns are compiled into one anchored multi-pattern DFA at
//! grammar-compile time (see `grammar`); lexing is a single forward walk of
//! that DFA per token. Among the rules that match, the longest match wins;
//! ties are broken by terminal declaration order. Candidates that are not
//! valid in the current lexical state lose to valid ones, which is what
//! disambiguates context-sensitive tokens.
//!
//! The lexer is restartable: a token records the lexical state it was
//! produced in, and [`next_token`] can resume from any byte offset given
//! that state. The incremental reparser depends on this.
//!
//! Lexing never fails. Input that no rule matches becomes a synthetic
//! [`SyntaxKind::ERROR`] token covering exactly one code point, which the
//! parser's recovery then consumes.

use regex_automata::dfa::Automaton;
use regex_automata::{Anchored, Input};
use text_size::{TextRange, TextSize};

use crate::grammar::{Language, LexState, StateId, TerminalId, TerminalSet};
use crate::syntax::{LineIndex, PointRange, SyntaxKind};

/// A token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    /// The terminal kind, or [`SyntaxKind::ERROR`] / [`SyntaxKind::EOF`].
    pub kind: SyntaxKind,
    /// The byte range of the token in the source text.
    pub range: TextRange,
    /// The line/column range of the token.
    pub points: PointRange,
    /// The lexical state the token was produced in.
    pub state: LexState,
}

impl Token {
    /// Returns the length of the token in bytes.
    #[must_use]
    pub fn len(&self) -> TextSize {
        self.range.len()
    }

    /// Returns `true` if the token has zero length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// A token produced by an external scanner hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedToken {
    /// The external terminal that was recognized.
    pub terminal: TerminalId,
    /// Its length in bytes. Must be non-zero.
    pub len: usize,
}

/// Hand-written scanner hook for context-sensitive tokens.
///
/// Registered on the grammar builder; consulted before the lexical DFA
/// whenever the current state expects at least one external terminal.
pub trait ExternalScanner: Send + Sync {
    /// Attempts to recognize an external token at `offset`.
    ///
    /// `valid` is the set of terminals the parser can currently accept;
    /// scanners should only produce terminals in that set.
    fn scan(&self, text: &str, offset: usize, valid: &TerminalSet) -> Option<ScannedToken>;
}

/// Lexes the token at `offset`, resuming in the given lexical state.
///
/// This is the restart surface used by hosts; the parser drives an
/// internal cursor over the same routine. Builds a fresh line index for the
/// point coordinates, so prefer the parser-level APIs in hot paths.
#[must_use]
pub fn next_token(lang: &Language, text: &str, offset: TextSize, state: LexState) -> Token {
    let line_index = LineIndex::new(text);
    let lexer = Lexer::new(lang, text, &line_index, TextRange::new(0.into(), line_index.len()));
    lexer.lex_at(usize::from(offset), state.0, true)
}

/// Lexes the entire text without state restrictions.
///
/// A convenience for debugging and token dumps; the parser lexes lazily and
/// state-aware instead.
#[must_use]
pub fn tokenize(lang: &Language, text: &str) -> Vec<Token> {
    let line_index = LineIndex::new(text);
    let range = TextRange::new(0.into(), line_index.len());
    let mut lexer = Lexer::new(lang, text, &line_index, range);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.lex_at(lexer.offset, lexer.entry_state(), false);
        lexer.offset = usize::from(token.range.end());
        if token.kind == SyntaxKind::EOF {
            break;
        }
        tokens.push(token);
    }
    tokens
}

/// Cursor over one text buffer, bounded to a byte range.
pub(crate) struct Lexer<'a> {
    lang: &'a Language,
    text: &'a str,
    line_index: &'a LineIndex,
    pub(crate) offset: usize,
    end: usize,
    /// Cached lookahead keyed by (offset, parser state): reduces re-lexing
    /// when the engine peeks repeatedly.
    cache: Option<(usize, StateId, Token)>,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(
        lang: &'a Language,
        text: &'a str,
        line_index: &'a LineIndex,
        range: TextRange,
    ) -> Self {
        Self {
            lang,
            text,
            line_index,
            offset: usize::from(range.start()),
            end: usize::from(range.end()),
            cache: None,
        }
    }

    fn entry_state(&self) -> StateId {
        self.lang.entry_state(self.lang.start_symbol().0)
    }

    /// Peeks the token at the cursor in the given parser state.
    pub(crate) fn peek(&mut self, state: StateId) -> Token {
        if let Some((offset, cached_state, token)) = self.cache {
            if offset == self.offset && cached_state == state {
                return token;
            }
        }
        let token = self.lex_at(self.offset, state, true);
        self.cache = Some((self.offset, state, token));
        token
    }

    /// Consumes the token last returned by `peek`.
    pub(crate) fn bump(&mut self, token: Token) {
        self.offset = usize::from(token.range.end());
        self.cache = None;
    }

    fn token(&self, kind: SyntaxKind, start: usize, end: usize, state: StateId) -> Token {
        let range = TextRange::new(TextSize::from(start as u32), TextSize::from(end as u32));
        Token {
            kind,
            range,
            points: self.line_index.point_range(range),
            state: LexState(state),
        }
    }

    /// Lexes one token at `offset`. With `restrict` set, rules outside the
    /// state's valid-terminal set only apply when no valid rule matches.
    pub(crate) fn lex_at(&self, offset: usize, state: StateId, restrict: bool) -> Token {
        if offset >= self.end {
            return self.token(SyntaxKind::EOF, self.end, self.end, state);
        }

        if restrict && self.lang.has_external_valid(state) {
            if let Some(scanner) = self.lang.scanner() {
                let valid = self.lang.valid_terminals(state);
                if let Some(scanned) = scanner.scan(self.text, offset, valid) {
                    if scanned.len > 0 {
                        return self.token(
                            SyntaxKind(scanned.terminal.0),
                            offset,
                            offset + scanned.len,
                            state,
                        );
                    }
                }
            }
        }

        let valid = self.lang.valid_terminals(state);
        let mut best_valid: Option<(usize, usize)> = None;
        let mut best_any: Option<(usize, usize)> = None;

        if let Some(dfa) = self.lang.lex.dfa.as_ref() {
            let slice = &self.text.as_bytes()[offset..self.end];
            let input = Input::new(slice).anchored(Anchored::Yes);
            if let Ok(mut sid) = dfa.start_state_forward(&input) {
                let record =
                    |sid, len: usize, best_valid: &mut Option<(usize, usize)>, best_any: &mut Option<(usize, usize)>| {
                        if len == 0 {
                            return;
                        }
                        for j in 0..dfa.match_len(sid) {
                            let pid = dfa.match_pattern(sid, j).as_usize();
                            let cand = (len, pid);
                            if is_better(cand, *best_any) {
                                *best_any = Some(cand);
                            }
                            let sym = self.lang.lex.pattern_syms[pid];
                            let usable = !restrict
                                || valid.contains_raw(sym)
                                || self.lang.is_extra_raw(sym);
                            if usable && is_better(cand, *best_valid) {
                                *best_valid = Some(cand);
                            }
                        }
                    };

                let mut dead = false;
                for (i, &byte) in slice.iter().enumerate() {
                    sid = dfa.next_state(sid, byte);
                    if dfa.is_special_state(sid) {
                        if dfa.is_match_state(sid) {
                            // Dense DFA matches are delayed by one byte: a
                            // match reported here ended at offset `i`.
                            record(sid, i, &mut best_valid, &mut best_any);
                        } else if dfa.is_dead_state(sid) || dfa.is_quit_state(sid) {
                            dead = true;
                            break;
                        }
                    }
                }
                if !dead {
                    sid = dfa.next_eoi_state(sid);
                    if dfa.is_match_state(sid) {
                        record(sid, slice.len(), &mut best_valid, &mut best_any);
                    }
                }
            }
        }

        if let Some((len, pid)) = best_valid.or(best_any) {
            let sym = self.lang.lex.pattern_syms[pid];
            return self.token(SyntaxKind(sym), offset, offset + len, state);
        }

        // No rule matched: emit an ERROR token covering one code point so
        // recovery can advance.
        let width = self.text[offset..]
            .chars()
            .next()
            .map_or(1, char::len_utf8);
        self.token(SyntaxKind::ERROR, offset, offset + width, state)
    }
}

fn is_better(cand: (usize, usize), current: Option<(usize, usize)>) -> bool {
    match current {
        None => true,
        Some((len, pid)) => cand.0 > len || (cand.0 == len && cand.1 < pid),
    }
}
