//! Syntax tree types.
//!
//! Trees are `rowan` red/green trees: green nodes are immutable and
//! structurally shared (a reparse reuses every green subtree outside the
//! edited region by reference), red nodes are cheap cursors with parent
//! pointers and absolute offsets. Node kinds are the compiled grammar's
//! symbol ids, so one tree type serves every [`Language`].
//!
//! The reserved kinds are [`SyntaxKind::EOF`], [`SyntaxKind::ERROR`]
//! (recovery wrapped skipped input) and [`SyntaxKind::MISSING`] (recovery
//! synthesized a zero-width expected token). Everything else is resolved to
//! a name via [`Language::kind_name`].
//!
//! [`Language`]: crate::grammar::Language
//! [`Language::kind_name`]: crate::grammar::Language::kind_name

mod line_index;

pub use line_index::{LineIndex, Point, PointRange};

/// A syntax node or token kind: a raw grammar symbol id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyntaxKind(pub u16);

impl SyntaxKind {
    /// The end-of-input marker kind.
    pub const EOF: SyntaxKind = SyntaxKind(0);
    /// Kind of nodes that wrap input skipped during error recovery.
    pub const ERROR: SyntaxKind = SyntaxKind(1);
    /// Kind of zero-width nodes standing in for an expected token.
    pub const MISSING: SyntaxKind = SyntaxKind(2);
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind.0)
    }
}

/// The rowan language adapter for grammar-defined trees.
///
/// Kinds are dynamic (symbol ids of whatever grammar produced the tree), so
/// the conversion is the identity in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableLanguage {}

impl rowan::Language for TableLanguage {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        SyntaxKind(raw.0)
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

/// A syntax node.
pub type SyntaxNode = rowan::SyntaxNode<TableLanguage>;

/// A syntax token (tree leaf).
pub type SyntaxToken = rowan::SyntaxToken<TableLanguage>;

/// Either a node or a token.
pub type SyntaxElement = rowan::SyntaxElement<TableLanguage>;

/// Green element used while constructing trees.
pub(crate) type GreenElement = rowan::NodeOrToken<rowan::GreenNode, rowan::GreenToken>;

/// Error and missing flags on nodes.
pub trait SyntaxNodeExt {
    /// Returns `true` if this node is, or contains, an ERROR or MISSING
    /// node.
    fn has_error(&self) -> bool;

    /// Returns `true` if this node stands in for a token that was expected
    /// but absent, inserted by error recovery.
    fn is_missing(&self) -> bool;
}

impl SyntaxNodeExt for SyntaxNode {
    fn has_error(&self) -> bool {
        self.kind() == SyntaxKind::ERROR
            || self.kind() == SyntaxKind::MISSING
            || self
                .descendants()
                .any(|n| n.kind() == SyntaxKind::ERROR || n.kind() == SyntaxKind::MISSING)
    }

    fn is_missing(&self) -> bool {
        self.kind() == SyntaxKind::MISSING
    }
}
