//! Tree query patterns.
//!
//! A small s-expression sublanguage for locating node shapes in a syntax
//! tree, consumed by highlighting and indentation collaborators:
//!
//! ```text
//! (binary_expr (number) @left "+" (number) @right)
//! (var_decl name: (ident) @name)
//! (_)            ; any node
//! _              ; any node or token
//! ```
//!
//! A named group matches a node of that kind whose non-trivia children
//! contain the child patterns in order (gaps are allowed). `"literal"`
//! matches a token by spelling, `field:` constrains the child to occupy
//! that field of the parent's production, and `@name` captures the
//! preceding element.

use logos::Logos;
use smol_str::SmolStr;
use std::sync::Arc;
use thiserror::Error;

use crate::grammar::Language;
use crate::syntax::{SyntaxElement, SyntaxKind, SyntaxNode};

/// Errors from [`Query::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The pattern source failed to parse.
    #[error("query parse error at offset {offset}: {message}")]
    Parse {
        /// Byte offset of the error in the pattern source.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// A named group refers to a kind the language does not define.
    #[error("unknown node kind `{name}`")]
    UnknownKind {
        /// The unknown name.
        name: SmolStr,
    },

    /// A quoted literal refers to a spelling the language does not define.
    #[error("unknown token literal `{spelling}`")]
    UnknownLiteral {
        /// The unknown spelling.
        spelling: SmolStr,
    },
}

/// A compiled query: one or more patterns over one language.
#[derive(Debug, Clone)]
pub struct Query {
    lang: Arc<Language>,
    patterns: Vec<Pattern>,
}

/// One match of a query pattern against a tree.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    /// Index of the pattern that matched.
    pub pattern: usize,
    /// Captured elements, in capture-site order.
    pub captures: Vec<Capture>,
}

/// A single capture binding.
#[derive(Debug, Clone)]
pub struct Capture {
    /// The capture name (without the `@`).
    pub name: SmolStr,
    /// The captured node or token.
    pub node: SyntaxElement,
}

#[derive(Debug, Clone)]
struct Pattern {
    kind: PatternKind,
    field: Option<SmolStr>,
    capture: Option<SmolStr>,
    children: Vec<Pattern>,
}

#[derive(Debug, Clone)]
enum PatternKind {
    /// `(kind ...)`.
    Node(SyntaxKind),
    /// `(_ ...)`.
    AnyNode,
    /// `_`.
    Any,
    /// `"spelling"`.
    Literal(SyntaxKind),
}

impl Query {
    /// Compiles `source` against a language.
    ///
    /// # Errors
    ///
    /// Fails on malformed pattern syntax or names the language does not
    /// define.
    pub fn new(lang: &Arc<Language>, source: &str) -> Result<Self, QueryError> {
        let tokens = tokenize(source)?;
        let mut parser = PatternParser {
            lang,
            tokens,
            pos: 0,
        };
        let mut patterns = Vec::new();
        while !parser.at_end() {
            patterns.push(parser.pattern()?);
        }
        if patterns.is_empty() {
            return Err(QueryError::Parse {
                offset: 0,
                message: "empty query".to_owned(),
            });
        }
        Ok(Self {
            lang: Arc::clone(lang),
            patterns,
        })
    }

    /// Matches every pattern against every node under `root`.
    #[must_use]
    pub fn matches(&self, root: &SyntaxNode) -> Vec<QueryMatch> {
        let mut results = Vec::new();
        for node in root.descendants() {
            let element = SyntaxElement::Node(node.clone());
            for (index, pattern) in self.patterns.iter().enumerate() {
                let mut captures = Vec::new();
                if self.matches_element(pattern, &element, &mut captures) {
                    results.push(QueryMatch {
                        pattern: index,
                        captures,
                    });
                }
            }
        }
        results
    }

    fn matches_element(
        &self,
        pattern: &Pattern,
        element: &SyntaxElement,
        captures: &mut Vec<Capture>,
    ) -> bool {
        let checkpoint = captures.len();
        let matched = match &pattern.kind {
            PatternKind::Any => true,
            PatternKind::AnyNode => element.as_node().is_some(),
            PatternKind::Literal(kind) => {
                element.as_token().is_some_and(|t| t.kind() == *kind)
            }
            PatternKind::Node(kind) => match element.as_node() {
                Some(node) if node.kind() == *kind => {
                    self.matches_children(pattern, node, captures)
                }
                _ => false,
            },
        };
        if !matched {
            captures.truncate(checkpoint);
            return false;
        }
        if let Some(name) = &pattern.capture {
            captures.push(Capture {
                name: name.clone(),
                node: element.clone(),
            });
        }
        true
    }

    fn matches_children(
        &self,
        pattern: &Pattern,
        node: &SyntaxNode,
        captures: &mut Vec<Capture>,
    ) -> bool {
        if pattern.children.is_empty() {
            return true;
        }
        let children: Vec<SyntaxElement> = node
            .children_with_tokens()
            .filter(|el| !self.lang.is_extra(el.kind()))
            .collect();

        // Field constraints are resolved against the production that built
        // this node, when one aligns.
        let fields: Vec<Option<SmolStr>> = match self.lang.match_production(node) {
            Some((prod, elements)) => {
                let mut by_child = vec![None; children.len()];
                for (field, element) in prod.fields.iter().zip(&elements) {
                    if let Some(idx) = children.iter().position(|c| c == element) {
                        by_child[idx] = field.clone();
                    }
                }
                by_child
            }
            None => vec![None; children.len()],
        };

        self.match_sequence(&pattern.children, &children, &fields, captures)
    }

    /// Matches child patterns as an ordered subsequence, backtracking over
    /// which child each pattern binds to.
    fn match_sequence(
        &self,
        patterns: &[Pattern],
        children: &[SyntaxElement],
        fields: &[Option<SmolStr>],
        captures: &mut Vec<Capture>,
    ) -> bool {
        let Some((first, rest)) = patterns.split_first() else {
            return true;
        };
        for (idx, child) in children.iter().enumerate() {
            if let Some(wanted) = &first.field {
                if fields[idx].as_ref() != Some(wanted) {
                    continue;
                }
            }
            let checkpoint = captures.len();
            if self.matches_element(first, child, captures)
                && self.match_sequence(rest, &children[idx + 1..], &fields[idx + 1..], captures)
            {
                return true;
            }
            captures.truncate(checkpoint);
        }
        false
    }
}

// =========================================================================
// Pattern lexing and parsing
// =========================================================================

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip(r";[^\n\r]*", allow_greedy = true))]
enum PatternToken {
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("_", priority = 3)]
    Underscore,

    #[regex(r#""([^"\\]|\\.)*""#)]
    Literal,

    #[regex(r"@[A-Za-z_][A-Za-z0-9_.]*")]
    Capture,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*:")]
    Field,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
}

fn tokenize(source: &str) -> Result<Vec<(PatternToken, std::ops::Range<usize>, SmolStr)>, QueryError> {
    let mut tokens = Vec::new();
    let mut lexer = PatternToken::lexer(source);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, span, SmolStr::new(lexer.slice()))),
            Err(()) => {
                return Err(QueryError::Parse {
                    offset: span.start,
                    message: format!("unexpected character `{}`", lexer.slice()),
                })
            }
        }
    }
    Ok(tokens)
}

struct PatternParser<'a> {
    lang: &'a Arc<Language>,
    tokens: Vec<(PatternToken, std::ops::Range<usize>, SmolStr)>,
    pos: usize,
}

impl PatternParser<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<PatternToken> {
        self.tokens.get(self.pos).map(|(t, _, _)| t.clone())
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or_else(|| self.tokens.last().map_or(0, |(_, s, _)| s.end), |(_, s, _)| s.start)
    }

    fn bump(&mut self) -> Option<(PatternToken, SmolStr)> {
        let (token, _, text) = self.tokens.get(self.pos)?.clone();
        self.pos += 1;
        Some((token, text))
    }

    fn error(&self, message: &str) -> QueryError {
        QueryError::Parse {
            offset: self.offset(),
            message: message.to_owned(),
        }
    }

    /// pattern := [field] element [capture]
    fn pattern(&mut self) -> Result<Pattern, QueryError> {
        let field = if matches!(self.peek(), Some(PatternToken::Field)) {
            let (_, text) = self.bump().expect("peeked");
            Some(SmolStr::new(text.trim_end_matches(':')))
        } else {
            None
        };

        let mut pattern = self.element()?;
        pattern.field = field;

        if matches!(self.peek(), Some(PatternToken::Capture)) {
            let (_, text) = self.bump().expect("peeked");
            pattern.capture = Some(SmolStr::new(&text[1..]));
        }
        Ok(pattern)
    }

    fn element(&mut self) -> Result<Pattern, QueryError> {
        match self.bump() {
            Some((PatternToken::LParen, _)) => {
                let kind = match self.bump() {
                    Some((PatternToken::Ident, name)) => {
                        let sym = self
                            .lang
                            .symbol(&name)
                            .ok_or(QueryError::UnknownKind { name: name.clone() })?;
                        PatternKind::Node(self.lang.kind_of(sym))
                    }
                    Some((PatternToken::Underscore, _)) => PatternKind::AnyNode,
                    _ => return Err(self.error("expected a node kind or `_` after `(`")),
                };
                let mut children = Vec::new();
                loop {
                    match self.peek() {
                        Some(PatternToken::RParen) => {
                            self.bump();
                            break;
                        }
                        Some(_) => children.push(self.pattern()?),
                        None => return Err(self.error("unclosed `(`")),
                    }
                }
                Ok(Pattern {
                    kind,
                    field: None,
                    capture: None,
                    children,
                })
            }
            Some((PatternToken::Literal, text)) => {
                let spelling = SmolStr::new(&text[1..text.len() - 1]);
                let sym = self
                    .lang
                    .literal(&spelling)
                    .ok_or(QueryError::UnknownLiteral { spelling })?;
                Ok(Pattern {
                    kind: PatternKind::Literal(self.lang.kind_of(sym)),
                    field: None,
                    capture: None,
                    children: Vec::new(),
                })
            }
            Some((PatternToken::Underscore, _)) => Ok(Pattern {
                kind: PatternKind::Any,
                field: None,
                capture: None,
                children: Vec::new(),
            }),
            _ => Err(self.error("expected `(`, `_`, or a quoted literal")),
        }
    }
}
