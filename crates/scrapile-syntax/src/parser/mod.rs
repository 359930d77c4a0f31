//! Table-driven parser.
//!
//! The parser drives the compiled shift/reduce automaton over the lexer's
//! token stream and builds a lossless `rowan` green tree:
//!
//! 1. **Lexing**: tokens are produced lazily, restricted by the current
//!    parser state (see `lexer`)
//! 2. **Driving**: shifts and reduces per the action/goto tables, with
//!    local error recovery when no action exists (see `engine`)
//! 3. **Tree building**: green nodes are assembled bottom-up; trivia and
//!    recovery debris are attached by the sink (see `sink`)
//!
//! Parsing never fails: malformed input yields a tree with ERROR/MISSING
//! annotations and a diagnostics list, never an `Err`.

pub(crate) mod engine;
pub(crate) mod sink;

use std::sync::Arc;
use text_size::{TextRange, TextSize};

use crate::grammar::Language;
use crate::syntax::{LineIndex, PointRange, SyntaxKind, SyntaxNode};

/// Parses `text` under the given language.
///
/// The returned [`Parse`] always contains a tree rooted at the language's
/// start symbol, even for empty or arbitrarily malformed input.
#[must_use]
pub fn parse(lang: &Arc<Language>, text: &str) -> Parse {
    let line_index = Arc::new(LineIndex::new(text));
    let span = TextRange::new(TextSize::from(0), line_index.len());
    let raw = engine::parse_at(lang, text, &line_index, span, lang.kind_of(lang.start_symbol()));
    Parse {
        lang: Arc::clone(lang),
        green: raw.green,
        errors: raw.errors,
        line_index,
        has_error: raw.has_error,
    }
}

/// Result of parsing source text: a syntax tree plus diagnostics.
///
/// Cheap to clone; the tree and line index are shared. A tree handed out
/// here is never mutated — reparsing produces a new `Parse` that shares
/// unaffected green subtrees with this one, and both stay valid.
#[derive(Debug, Clone)]
pub struct Parse {
    lang: Arc<Language>,
    green: rowan::GreenNode,
    errors: Vec<ParseError>,
    line_index: Arc<LineIndex>,
    has_error: bool,
}

impl Parse {
    pub(crate) fn from_parts(
        lang: Arc<Language>,
        green: rowan::GreenNode,
        errors: Vec<ParseError>,
        line_index: Arc<LineIndex>,
        has_error: bool,
    ) -> Self {
        Self {
            lang,
            green,
            errors,
            line_index,
            has_error,
        }
    }

    /// Returns the root syntax node.
    #[must_use]
    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.green.clone())
    }

    /// The language this tree was parsed under.
    #[must_use]
    pub fn language(&self) -> &Arc<Language> {
        &self.lang
    }

    /// Returns the parsing diagnostics.
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Returns `true` if parsing produced no errors.
    #[must_use]
    pub fn ok(&self) -> bool {
        !self.has_error && self.errors.is_empty()
    }

    /// Returns `true` if the tree contains ERROR or MISSING nodes.
    #[must_use]
    pub fn contains_errors(&self) -> bool {
        self.has_error
    }

    /// The line index for this tree's text.
    #[must_use]
    pub fn line_index(&self) -> &Arc<LineIndex> {
        &self.line_index
    }

    /// The line/column range for a byte range in this tree.
    #[must_use]
    pub fn point_range(&self, range: TextRange) -> PointRange {
        self.line_index.point_range(range)
    }

    /// The display name of a kind under this tree's language.
    #[must_use]
    pub fn kind_name(&self, kind: SyntaxKind) -> &str {
        self.lang.kind_name(kind)
    }
}

/// A parsing diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// The byte range where the error occurred.
    pub range: TextRange,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}..{}",
            self.message,
            u32::from(self.range.start()),
            u32::from(self.range.end())
        )
    }
}

impl std::error::Error for ParseError {}
