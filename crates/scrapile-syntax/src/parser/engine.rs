//! The shift/reduce automaton and its error recovery.
//!
//! The engine drives the compiled tables over the lexer's output with an
//! explicit frame stack; each frame carries the green elements accumulated
//! for one grammar symbol. Extras (trivia) and recovery debris occupy
//! transparent frames of their own: they do not participate in reduces but
//! are absorbed into the node being built when a reduce pops past them, so
//! trivia ends up as a sibling at the outermost enclosing level and node
//! spans stay tight around their own tokens.
//!
//! Recovery, attempted in order when no action exists:
//!
//! 1. *Insertion*: synthesize a zero-width MISSING leaf for a literal
//!    terminal whose shift, after a dry run of the pending reduces, makes
//!    the current lookahead valid.
//! 2. *Deletion*: move the lookahead into the debris buffer (it surfaces as
//!    an ERROR node sibling ahead of the next shifted token) and retry.
//! 3. *Popping*: at end of input, fold abandoned frames into the debris
//!    buffer until a valid configuration or the entry frame is reached.
//!
//! Deletion consumes input and popping shrinks the stack, so recovery
//! terminates, and the engine always returns a root node of the requested
//! kind spanning the whole input.

use rowan::{GreenNode, NodeOrToken};
use text_size::TextRange;
use tracing::trace;

use crate::grammar::{Action, Language, StateId};
use crate::lexer::{Lexer, Token};
use crate::parser::sink::TreeSink;
use crate::parser::ParseError;
use crate::syntax::{GreenElement, LineIndex, SyntaxKind};

/// Maximum missing-token insertions at a single byte offset.
const MAX_INSERTIONS: u32 = 3;

/// Dry-run depth for insertion viability checks.
const MAX_SIMULATED_REDUCES: u32 = 64;

pub(crate) struct RawParse {
    pub(crate) green: GreenNode,
    pub(crate) errors: Vec<ParseError>,
    pub(crate) has_error: bool,
}

/// Parses `span` of `text` with the automaton rooted at `target`.
///
/// `target` must be a nonterminal kind of `lang`; the full parse uses the
/// start symbol, the incremental reparser restarts at inner node kinds.
pub(crate) fn parse_at(
    lang: &Language,
    text: &str,
    line_index: &LineIndex,
    span: TextRange,
    target: SyntaxKind,
) -> RawParse {
    Engine::new(lang, text, line_index, span, target).run()
}

struct Frame {
    state: StateId,
    elements: Vec<GreenElement>,
    /// Transparent frames (extras, recovery debris) are skipped by reduces
    /// and absorbed into whatever node is built across them.
    transparent: bool,
}

struct Engine<'a> {
    lang: &'a Language,
    lexer: Lexer<'a>,
    sink: TreeSink<'a>,
    frames: Vec<Frame>,
    errors: Vec<ParseError>,
    has_error: bool,
    target: u16,
    /// (byte offset, insertions performed there).
    insert_guard: (usize, u32),
    /// Consecutive reduces that did not shrink the stack; breaks
    /// unit-production cycles a malformed grammar could encode.
    unit_reduces: u32,
    reported_eof: bool,
}

impl<'a> Engine<'a> {
    fn new(
        lang: &'a Language,
        text: &'a str,
        line_index: &'a LineIndex,
        span: TextRange,
        target: SyntaxKind,
    ) -> Self {
        let entry = lang.entry_state(target.0);
        Self {
            lang,
            lexer: Lexer::new(lang, text, line_index, span),
            sink: TreeSink::new(text),
            frames: vec![Frame {
                state: entry,
                elements: Vec::new(),
                transparent: false,
            }],
            errors: Vec::new(),
            has_error: false,
            target: target.0,
            insert_guard: (usize::MAX, 0),
            unit_reduces: 0,
            reported_eof: false,
        }
    }

    fn run(mut self) -> RawParse {
        let unit_limit = u32::from(self.lang.symbol_count()) * 2 + 8;
        let green = loop {
            if self.unit_reduces > unit_limit {
                // A reduce cycle is not making progress; force recovery.
                match self.force_progress() {
                    Some(root) => break root,
                    None => continue,
                }
            }

            let la = self.next_lookahead();
            if la.kind == SyntaxKind::EOF {
                match self.at_eof(&la) {
                    Some(root) => break root,
                    None => continue,
                }
            }

            match self.lang.action(self.state(), la.kind.0) {
                Action::Shift(next) => self.shift(next, la),
                Action::Reduce(prod) => {
                    if !self.reduce(prod) {
                        match self.force_progress() {
                            Some(root) => break root,
                            None => continue,
                        }
                    }
                }
                Action::Error => self.recover(la),
            }
        };
        RawParse {
            green,
            errors: self.errors,
            has_error: self.has_error,
        }
    }

    fn state(&self) -> StateId {
        self.frames.last().map_or(0, |f| f.state)
    }

    /// Grammar symbols on the stack, not counting the entry frame.
    fn symbols_on_stack(&self) -> usize {
        self.frames.iter().skip(1).filter(|f| !f.transparent).count()
    }

    /// Advances over extras, buffering them as pending trivia, and returns
    /// the next meaningful token without consuming it.
    fn next_lookahead(&mut self) -> Token {
        loop {
            let token = self.lexer.peek(self.state());
            if token.kind != SyntaxKind::EOF && self.lang.is_extra_raw(token.kind.0) {
                self.sink.push_trivia(&token);
                self.lexer.bump(token);
                continue;
            }
            return token;
        }
    }

    /// Flushes pending trivia and debris as transparent frames under the
    /// next symbol frame.
    fn flush_lead(&mut self) {
        let state = self.state();
        for element in self.sink.take_lead() {
            self.frames.push(Frame {
                state,
                elements: vec![element],
                transparent: true,
            });
        }
    }

    fn shift(&mut self, next: StateId, la: Token) {
        self.flush_lead();
        let token = self.sink.token_green(la.kind, la.range);
        self.frames.push(Frame {
            state: next,
            elements: vec![token],
            transparent: false,
        });
        self.lexer.bump(la);
        self.unit_reduces = 0;
    }

    /// Applies a reduce. Returns `false` when the stack cannot satisfy the
    /// production, which only happens after heavy recovery.
    fn reduce(&mut self, prod: u32) -> bool {
        let production = self.lang.production(prod);
        let n = production.len();
        let lhs = production.lhs;
        if self.symbols_on_stack() < n {
            return false;
        }

        // Pop n symbol frames plus the transparent frames between them.
        let mut popped: Vec<Frame> = Vec::new();
        let mut symbols = 0;
        while symbols < n {
            let frame = self.frames.pop().expect("guarded by symbols_on_stack");
            if !frame.transparent {
                symbols += 1;
            }
            popped.push(frame);
        }
        let mut children = Vec::new();
        for frame in popped.into_iter().rev() {
            children.extend(frame.elements);
        }

        let elements = if self.lang.is_hidden_raw(lhs) {
            children
        } else {
            vec![NodeOrToken::Node(GreenNode::new(
                SyntaxKind(lhs).into(),
                children,
            ))]
        };

        match self.lang.goto(self.state(), lhs) {
            Some(next) => {
                self.frames.push(Frame {
                    state: next,
                    elements,
                    transparent: false,
                });
                if n <= 1 {
                    self.unit_reduces += 1;
                } else {
                    self.unit_reduces = 0;
                }
                true
            }
            None => {
                // A follow-set reduce fired in a context with no goto; fold
                // the node into the debris instead of losing it.
                trace!(rule = self.lang.kind_name(SyntaxKind(lhs)), "reduce without goto");
                self.has_error = true;
                self.sink.push_abandoned(elements);
                self.unit_reduces += 1;
                true
            }
        }
    }

    fn recover(&mut self, la: Token) {
        if self.try_insert(&la) {
            return;
        }
        trace!(
            token = self.lang.kind_name(la.kind),
            offset = u32::from(la.range.start()),
            "recovery deletes token"
        );
        self.note(
            format!("unexpected `{}`", self.lang.kind_name(la.kind)),
            la.range,
        );
        self.sink.push_deleted(&la);
        self.lexer.bump(la);
        self.has_error = true;
        self.unit_reduces = 0;
    }

    fn at_eof(&mut self, la: &Token) -> Option<GreenNode> {
        if self.symbols_on_stack() == 1 {
            if let Some(accepted) = self.lang.accept_symbol(self.state()) {
                if accepted == self.target {
                    return Some(self.finish_accept());
                }
            }
        }
        if let Action::Reduce(prod) = self.lang.action(self.state(), 0) {
            if self.reduce(prod) {
                return None;
            }
            return Some(self.finish_root());
        }
        if self.try_insert(la) {
            return None;
        }
        if self.frames.len() > 1 {
            if !self.reported_eof {
                self.note("unexpected end of input".to_owned(), la.range);
                self.reported_eof = true;
            }
            self.pop_into_debris();
            return None;
        }
        Some(self.finish_root())
    }

    /// Missing-token insertion: find a literal terminal whose shift, after
    /// dry-running the pending reduces, makes the lookahead valid.
    fn try_insert(&mut self, la: &Token) -> bool {
        let offset = usize::from(la.range.start());
        if self.insert_guard.0 == offset && self.insert_guard.1 >= MAX_INSERTIONS {
            return false;
        }

        for sym in 0..self.lang.symbol_count() {
            if !self.lang.is_insertable(sym)
                || !self.lang.valid_terminals(self.state()).contains_raw(sym)
            {
                continue;
            }
            let Action::Shift(next) = self.lang.action(self.state(), sym) else {
                continue;
            };
            if !self.unblocks(next, la.kind.0) {
                continue;
            }

            trace!(
                token = self.lang.kind_name(SyntaxKind(sym)),
                offset = offset as u32,
                "recovery inserts missing token"
            );
            self.note(
                format!("expected `{}`", self.lang.kind_name(SyntaxKind(sym))),
                TextRange::empty(la.range.start()),
            );
            self.flush_lead();
            let missing = self.sink.missing_leaf(SyntaxKind(sym));
            self.frames.push(Frame {
                state: next,
                elements: vec![missing],
                transparent: false,
            });
            self.has_error = true;
            if self.insert_guard.0 == offset {
                self.insert_guard.1 += 1;
            } else {
                self.insert_guard = (offset, 1);
            }
            return true;
        }
        false
    }

    /// Dry-runs the automaton from `first` (stacked on the current symbol
    /// frames) to check whether `la` becomes consumable.
    fn unblocks(&self, first: StateId, la: u16) -> bool {
        let mut states: Vec<StateId> = self
            .frames
            .iter()
            .filter(|f| !f.transparent)
            .map(|f| f.state)
            .collect();
        states.push(first);
        for _ in 0..MAX_SIMULATED_REDUCES {
            let top = *states.last().expect("simulated stack is never empty");
            if la == 0
                && states.len() == 2
                && self.lang.accept_symbol(top) == Some(self.target)
            {
                return true;
            }
            match self.lang.action(top, la) {
                Action::Shift(_) => return true,
                Action::Reduce(prod) => {
                    let production = self.lang.production(prod);
                    let n = production.len();
                    if n + 1 > states.len() {
                        return false;
                    }
                    states.truncate(states.len() - n);
                    let below = *states.last().expect("simulated stack is never empty");
                    match self.lang.goto(below, production.lhs) {
                        Some(next) => states.push(next),
                        None => return false,
                    }
                }
                Action::Error => return false,
            }
        }
        false
    }

    fn pop_into_debris(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.sink.push_abandoned(frame.elements);
        }
        self.has_error = true;
        self.unit_reduces = 0;
    }

    fn force_progress(&mut self) -> Option<GreenNode> {
        if self.frames.len() > 1 {
            self.pop_into_debris();
            None
        } else {
            Some(self.finish_root())
        }
    }

    fn finish_accept(&mut self) -> GreenNode {
        let top = self.frames.pop().expect("accept leaves the target frame");
        let mut leading: Vec<GreenElement> = Vec::new();
        for frame in self.frames.drain(1..) {
            leading.extend(frame.elements);
        }
        let trailing = self.sink.take_lead();

        let mut elements = top.elements;
        let single_target = elements.len() == 1
            && matches!(
                &elements[0],
                NodeOrToken::Node(node) if node.kind() == SyntaxKind(self.target).into()
            );

        if single_target {
            let NodeOrToken::Node(node) = elements.remove(0) else {
                unreachable!("checked above");
            };
            if leading.is_empty() && trailing.is_empty() {
                return node;
            }
            // Surrounding extras live inside the root so the tree spans the
            // whole input.
            return rebuild_with_surroundings(&node, leading, trailing);
        }

        let mut children = leading;
        children.extend(elements);
        children.extend(trailing);
        GreenNode::new(SyntaxKind(self.target).into(), children)
    }

    /// Builds a best-effort root when the input never reduced to the
    /// target: everything parsed so far becomes the root's children, with
    /// leftovers wrapped in an ERROR node.
    fn finish_root(&mut self) -> GreenNode {
        self.has_error = true;
        let mut children = Vec::new();
        for frame in self.frames.drain(1..) {
            children.extend(frame.elements);
        }
        children.extend(self.sink.take_lead());
        GreenNode::new(SyntaxKind(self.target).into(), children)
    }

    fn note(&mut self, message: String, range: TextRange) {
        self.errors.push(ParseError { message, range });
    }
}

fn rebuild_with_surroundings(
    node: &GreenNode,
    leading: Vec<GreenElement>,
    trailing: Vec<GreenElement>,
) -> GreenNode {
    let mut children = leading;
    children.extend(node.children().map(|child| match child {
        NodeOrToken::Node(n) => NodeOrToken::Node(n.to_owned()),
        NodeOrToken::Token(t) => NodeOrToken::Token(t.to_owned()),
    }));
    children.extend(trailing);
    GreenNode::new(node.kind(), children)
}
