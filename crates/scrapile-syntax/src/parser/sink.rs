//! Sink assembling green elements for the parser engine.
//!
//! The sink owns the two side buffers the automaton cannot express in its
//! stack: pending trivia (extras lexed ahead of the next real token) and
//! recovery debris (tokens deleted while resynchronizing). Both are flushed
//! in front of the next shifted token, so every byte of input ends up in
//! the tree exactly once.

use rowan::{GreenNode, GreenToken, NodeOrToken};
use text_size::TextRange;

use crate::lexer::Token;
use crate::syntax::{GreenElement, SyntaxKind};

pub(crate) struct TreeSink<'a> {
    text: &'a str,
    /// Extras waiting to be attached before the next shifted token.
    pending: Vec<GreenElement>,
    /// Deleted tokens (and their leading extras) accumulated by recovery.
    debris: Vec<GreenElement>,
}

impl<'a> TreeSink<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            text,
            pending: Vec::new(),
            debris: Vec::new(),
        }
    }

    pub(crate) fn token_green(&self, kind: SyntaxKind, range: TextRange) -> GreenElement {
        let text = &self.text[usize::from(range.start())..usize::from(range.end())];
        NodeOrToken::Token(GreenToken::new(kind.into(), text))
    }

    /// Buffers an extra (trivia) token.
    pub(crate) fn push_trivia(&mut self, token: &Token) {
        let green = self.token_green(token.kind, token.range);
        self.pending.push(green);
    }

    /// Moves the pending extras and the given token into the debris buffer
    /// (token deletion during recovery).
    pub(crate) fn push_deleted(&mut self, token: &Token) {
        let green = self.token_green(token.kind, token.range);
        self.debris.append(&mut self.pending);
        self.debris.push(green);
    }

    /// Folds abandoned stack elements into the debris buffer (stack popping
    /// during recovery). Frames pop newest-first, so each batch goes in
    /// front of what recovery collected after it.
    pub(crate) fn push_abandoned(&mut self, elements: Vec<GreenElement>) {
        self.debris.splice(0..0, elements);
    }

    /// A zero-width MISSING node standing in for an expected token.
    pub(crate) fn missing_leaf(&self, expected: SyntaxKind) -> GreenElement {
        let token = NodeOrToken::Token(GreenToken::new(expected.into(), ""));
        NodeOrToken::Node(GreenNode::new(SyntaxKind::MISSING.into(), vec![token]))
    }

    /// Drains the buffers into the elements that lead the next shifted
    /// token: an ERROR node wrapping any debris, then the pending extras.
    pub(crate) fn take_lead(&mut self) -> Vec<GreenElement> {
        let mut lead = Vec::new();
        if !self.debris.is_empty() {
            let children: Vec<GreenElement> = self.debris.drain(..).collect();
            lead.push(NodeOrToken::Node(GreenNode::new(
                SyntaxKind::ERROR.into(),
                children,
            )));
        }
        lead.append(&mut self.pending);
        lead
    }
}
