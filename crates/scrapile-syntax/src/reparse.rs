//! Incremental reparsing.
//!
//! `reparse` takes a previous [`Parse`], the edits applied to its text, and
//! the resulting new text, and produces an updated tree plus the byte
//! ranges whose node structure changed. Green subtrees outside the damaged
//! region are reused by reference; the old tree stays valid and both trees
//! share structure.
//!
//! Strategy, cheapest first:
//!
//! 1. **Leaf splice** — all damage strictly inside one token (typical for
//!    typing within a comment, string, or identifier): re-lex just that
//!    token and replace the green leaf.
//! 2. **Node splice** — re-run the automaton on the smallest error-free
//!    node enclosing the damage with a whole-token margin, entering at that
//!    node's kind, and replace the green subtree on a clean result.
//! 3. **Full reparse** — anything else.
//!
//! Equivalence with a from-scratch parse of the new text is the contract;
//! both splice paths bail to the fallback whenever one of their gates
//! fails. Incrementality is a performance optimization, never a
//! correctness compromise.

use rowan::NodeOrToken;
use std::sync::Arc;
use text_size::{TextRange, TextSize};
use thiserror::Error;
use tracing::debug;

use crate::grammar::Language;
use crate::parser::{engine, parse, Parse, ParseError};
use crate::syntax::{
    LineIndex, Point, SyntaxElement, SyntaxKind, SyntaxNode, SyntaxNodeExt, SyntaxToken,
};

/// A single contiguous text replacement, in the coordinate space of the
/// text it is applied to. A reparse request carries edits in application
/// order, each described in the space produced by its predecessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    /// Start of the replaced range.
    pub start: TextSize,
    /// End of the replaced range in the pre-edit text.
    pub old_end: TextSize,
    /// End of the replacement in the post-edit text.
    pub new_end: TextSize,
    /// Line/column of `start`.
    pub start_point: Point,
    /// Line/column of `old_end` in the pre-edit text.
    pub old_end_point: Point,
    /// Line/column of `new_end` in the post-edit text.
    pub new_end_point: Point,
}

impl Edit {
    /// Describes replacing `range` with `new_len` bytes, computing the
    /// point coordinates from the given pre-edit line index.
    #[must_use]
    pub fn replace(range: TextRange, new_len: TextSize, line_index: &LineIndex) -> Self {
        let new_end = range.start() + new_len;
        Self {
            start: range.start(),
            old_end: range.end(),
            new_end,
            start_point: line_index.point(range.start()),
            old_end_point: line_index.point(range.end()),
            // The caller's post-edit line index is not available here; the
            // row/column of the replacement end is recomputed from the new
            // text during reparse, so an approximation is acceptable.
            new_end_point: line_index.point(range.start()),
        }
    }
}

/// Hard failures of [`reparse`].
///
/// These indicate a caller error (edits inconsistent with the tree they
/// claim to describe), not a parse failure — malformed *text* never fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReparseError {
    /// An edit's ranges do not fit the tree produced by its predecessors.
    #[error("edit {index} is inconsistent with the prior tree: {reason}")]
    InconsistentEdit {
        /// Index of the offending edit.
        index: usize,
        /// What was inconsistent.
        reason: String,
    },

    /// The edits do not produce a text of the given length.
    #[error("new text is {actual} bytes but the edits produce {expected}")]
    LengthMismatch {
        /// Length implied by the old tree plus the edits.
        expected: u32,
        /// Actual length of the new text.
        actual: u32,
    },
}

/// Reparses after `edits` transformed the old tree's text into `new_text`.
///
/// Returns the new tree and the changed byte ranges (sorted,
/// non-overlapping, in new-text coordinates) whose node structure differs
/// from the old tree.
///
/// # Errors
///
/// Fails only when the edits are inconsistent with the old tree; see
/// [`ReparseError`].
pub fn reparse(
    old: &Parse,
    edits: &[Edit],
    new_text: &str,
) -> Result<(Parse, Vec<TextRange>), ReparseError> {
    let lang = Arc::clone(old.language());
    let old_len = old.line_index().len();
    let expected = validate_edits(old_len, edits)?;
    if u32::from(expected) != new_text.len() as u32 {
        return Err(ReparseError::LengthMismatch {
            expected: u32::from(expected),
            actual: new_text.len() as u32,
        });
    }

    if edits.is_empty() {
        return Ok((old.clone(), Vec::new()));
    }

    let delta = i64::from(u32::from(expected)) - i64::from(u32::from(old_len));
    let old_damage = old_coordinate_damage(edits);
    let line_index = Arc::new(LineIndex::new(new_text));

    if let Some(result) = try_leaf_splice(&lang, old, old_damage, delta, new_text, &line_index) {
        debug!(?old_damage, "incremental leaf splice");
        return Ok(result);
    }
    if let Some(result) = try_node_splice(&lang, old, old_damage, delta, new_text, &line_index) {
        debug!(?old_damage, "incremental node splice");
        return Ok(result);
    }

    debug!(?old_damage, "full reparse fallback");
    let fresh = parse(&lang, new_text);
    let changed = leaf_diff(
        &old.syntax(),
        &fresh.syntax(),
        TextSize::from(0),
        line_index.len(),
    );
    Ok((fresh, changed))
}

// =========================================================================
// Edit validation and coordinate mapping
// =========================================================================

fn validate_edits(old_len: TextSize, edits: &[Edit]) -> Result<TextSize, ReparseError> {
    let mut len = u32::from(old_len);
    for (index, edit) in edits.iter().enumerate() {
        let (start, old_end, new_end) = (
            u32::from(edit.start),
            u32::from(edit.old_end),
            u32::from(edit.new_end),
        );
        if start > old_end || start > new_end {
            return Err(ReparseError::InconsistentEdit {
                index,
                reason: format!("range {start}..{old_end} (new end {new_end}) is inverted"),
            });
        }
        if old_end > len {
            return Err(ReparseError::InconsistentEdit {
                index,
                reason: format!("old end {old_end} is past the text length {len}"),
            });
        }
        len = len - (old_end - start) + (new_end - start);
    }
    Ok(TextSize::from(len))
}

/// The union of the edited ranges, mapped back to the old tree's
/// coordinate space. Positions inside an earlier replacement snap outward,
/// so the result is conservative (never too small).
fn old_coordinate_damage(edits: &[Edit]) -> TextRange {
    let mut start = u32::MAX;
    let mut end = 0u32;
    for (i, edit) in edits.iter().enumerate() {
        let mut s = u32::from(edit.start);
        let mut e = u32::from(edit.old_end);
        for prior in edits[..i].iter().rev() {
            let (p_start, p_old, p_new) = (
                u32::from(prior.start),
                u32::from(prior.old_end),
                u32::from(prior.new_end),
            );
            s = if s >= p_new {
                s - p_new + p_old
            } else if s > p_start {
                p_start
            } else {
                s
            };
            e = if e >= p_new {
                e - p_new + p_old
            } else if e > p_start {
                p_old
            } else {
                e
            };
        }
        start = start.min(s);
        end = end.max(e);
    }
    if start > end {
        start = end;
    }
    TextRange::new(TextSize::from(start), TextSize::from(end))
}

fn shift_errors(errors: &[ParseError], boundary: TextSize, delta: i64) -> Vec<ParseError> {
    errors
        .iter()
        .map(|error| {
            if error.range.start() >= boundary {
                let start = (i64::from(u32::from(error.range.start())) + delta).max(0) as u32;
                let end = (i64::from(u32::from(error.range.end())) + delta).max(0) as u32;
                ParseError {
                    message: error.message.clone(),
                    range: TextRange::new(start.into(), end.max(start).into()),
                }
            } else {
                error.clone()
            }
        })
        .collect()
}

// =========================================================================
// Leaf splice
// =========================================================================

fn try_leaf_splice(
    lang: &Arc<Language>,
    old: &Parse,
    old_damage: TextRange,
    delta: i64,
    new_text: &str,
    line_index: &Arc<LineIndex>,
) -> Option<(Parse, Vec<TextRange>)> {
    let root = old.syntax();
    let NodeOrToken::Token(token) = root.covering_element(old_damage) else {
        return None;
    };
    let range = token.text_range();
    // Strict interior: an edit touching a token boundary can merge it with
    // a neighbor, which a leaf splice cannot express.
    if range.start() >= old_damage.start() || old_damage.end() >= range.end() {
        return None;
    }
    let kind = token.kind();
    if !lang.is_terminal(kind) || kind == SyntaxKind::ERROR {
        return None;
    }

    let new_end = (i64::from(u32::from(range.end())) + delta) as u32;
    let new_range = TextRange::new(range.start(), TextSize::from(new_end));

    // Re-lex from the token start against the whole remaining text, so a
    // token that would now extend past its old boundary is caught.
    let full = TextRange::new(TextSize::from(0), line_index.len());
    let lexer = crate::lexer::Lexer::new(lang, new_text, line_index, full);
    let entry = lang.entry_state(lang.start_symbol().0);
    let relexed = lexer.lex_at(usize::from(range.start()), entry, false);
    if relexed.kind != kind || relexed.range != new_range {
        return None;
    }

    let slice = &new_text[usize::from(new_range.start())..usize::from(new_range.end())];
    let green = token.replace_with(rowan::GreenToken::new(kind.into(), slice));
    let parse = Parse::from_parts(
        Arc::clone(lang),
        green,
        shift_errors(old.errors(), old_damage.end(), delta),
        Arc::clone(line_index),
        old.contains_errors(),
    );
    Some((parse, vec![new_range]))
}

// =========================================================================
// Node splice
// =========================================================================

/// Candidate subtrees to retry before giving up on splicing.
const MAX_SPLICE_CANDIDATES: usize = 4;

fn try_node_splice(
    lang: &Arc<Language>,
    old: &Parse,
    old_damage: TextRange,
    delta: i64,
    new_text: &str,
    line_index: &Arc<LineIndex>,
) -> Option<(Parse, Vec<TextRange>)> {
    let root = old.syntax();
    let extended = extend_to_token_margin(&root, old_damage);

    let start_node = match root.covering_element(extended) {
        NodeOrToken::Node(node) => node,
        NodeOrToken::Token(token) => token.parent()?,
    };

    let mut tried = 0;
    for node in start_node.ancestors() {
        if tried >= MAX_SPLICE_CANDIDATES {
            break;
        }
        if node.parent().is_none() {
            // The root is a full reparse, not a splice.
            break;
        }
        let range = node.text_range();
        if range.start() >= extended.start() || extended.end() >= range.end() {
            continue;
        }
        if !lang.is_nonterminal(node.kind()) || node.has_error() {
            continue;
        }
        tried += 1;

        let new_end = (i64::from(u32::from(range.end())) + delta) as u32;
        let slice = TextRange::new(range.start(), TextSize::from(new_end));
        let raw = engine::parse_at(lang, new_text, line_index, slice, node.kind());
        if raw.has_error || !raw.errors.is_empty() {
            continue;
        }
        if raw.green.kind() != node.kind().into()
            || u32::from(raw.green.text_len()) != u32::from(slice.len())
        {
            continue;
        }

        let new_subtree = SyntaxNode::new_root(raw.green.clone());
        let changed = leaf_diff(&node, &new_subtree, slice.start(), slice.len());
        let green = node.replace_with(raw.green);
        let parse = Parse::from_parts(
            Arc::clone(lang),
            green,
            shift_errors(old.errors(), old_damage.end(), delta),
            Arc::clone(line_index),
            old.contains_errors(),
        );
        return Some((parse, changed));
    }
    None
}

/// Widens damage to whole-token boundaries plus one token on each side, so
/// lexical effects that spill across token edges invalidate the neighbors
/// too.
fn extend_to_token_margin(root: &SyntaxNode, damage: TextRange) -> TextRange {
    let root_range = root.text_range();
    let start = match root.token_at_offset(damage.start()).left_biased() {
        Some(token) => token
            .prev_token()
            .map_or(token.text_range().start(), |prev| prev.text_range().start()),
        None => damage.start(),
    };
    let end = match root.token_at_offset(damage.end()).right_biased() {
        Some(token) => token
            .next_token()
            .map_or(token.text_range().end(), |next| next.text_range().end()),
        None => damage.end(),
    };
    TextRange::new(
        start.max(root_range.start()),
        end.min(root_range.end()).max(start),
    )
}

// =========================================================================
// Changed ranges
// =========================================================================

/// Ordered leaf diff: trims the common token prefix and suffix (by kind
/// and text) and reports the differing span in new-text coordinates.
fn leaf_diff(
    old_node: &SyntaxNode,
    new_node: &SyntaxNode,
    new_base: TextSize,
    new_span_len: TextSize,
) -> Vec<TextRange> {
    let old_tokens = leaf_tokens(old_node);
    let new_tokens = leaf_tokens(new_node);

    let same = |a: &SyntaxToken, b: &SyntaxToken| a.kind() == b.kind() && a.text() == b.text();

    let max_common = old_tokens.len().min(new_tokens.len());
    let mut prefix = 0;
    while prefix < max_common && same(&old_tokens[prefix], &new_tokens[prefix]) {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < max_common - prefix
        && same(
            &old_tokens[old_tokens.len() - 1 - suffix],
            &new_tokens[new_tokens.len() - 1 - suffix],
        )
    {
        suffix += 1;
    }

    if old_tokens.len() == new_tokens.len() && prefix + suffix >= new_tokens.len() {
        return Vec::new();
    }

    let prefix_bytes: u32 = new_tokens[..prefix]
        .iter()
        .map(|t| u32::from(t.text_range().len()))
        .sum();
    let suffix_bytes: u32 = new_tokens[new_tokens.len() - suffix..]
        .iter()
        .map(|t| u32::from(t.text_range().len()))
        .sum();

    let start = u32::from(new_base) + prefix_bytes;
    let end = (u32::from(new_base) + u32::from(new_span_len)).saturating_sub(suffix_bytes);
    let end = end.max(start);
    vec![TextRange::new(start.into(), end.into())]
}

fn leaf_tokens(node: &SyntaxNode) -> Vec<SyntaxToken> {
    node.descendants_with_tokens()
        .filter_map(SyntaxElement::into_token)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(start: u32, old_end: u32, new_end: u32) -> Edit {
        Edit {
            start: start.into(),
            old_end: old_end.into(),
            new_end: new_end.into(),
            start_point: Point::default(),
            old_end_point: Point::default(),
            new_end_point: Point::default(),
        }
    }

    #[test]
    fn test_validate_rejects_inverted_edit() {
        let err = validate_edits(TextSize::from(10), &[edit(5, 3, 6)]);
        assert!(matches!(err, Err(ReparseError::InconsistentEdit { index: 0, .. })));
    }

    #[test]
    fn test_validate_rejects_out_of_bounds_edit() {
        let err = validate_edits(TextSize::from(4), &[edit(2, 9, 9)]);
        assert!(matches!(err, Err(ReparseError::InconsistentEdit { index: 0, .. })));
    }

    #[test]
    fn test_validate_tracks_length_across_edits() {
        // 10 bytes, replace 2..4 with 3 bytes (11), then delete 0..5 (6).
        let len = validate_edits(TextSize::from(10), &[edit(2, 4, 5), edit(0, 5, 0)])
            .expect("edits are consistent");
        assert_eq!(u32::from(len), 6);
    }

    #[test]
    fn test_old_damage_single_edit() {
        let damage = old_coordinate_damage(&[edit(3, 5, 9)]);
        assert_eq!(damage, TextRange::new(3.into(), 5.into()));
    }

    #[test]
    fn test_old_damage_spans_sequential_edits() {
        // Second edit's coordinates live after the first grew the text by 4.
        let damage = old_coordinate_damage(&[edit(3, 5, 9), edit(10, 12, 12)]);
        assert_eq!(damage, TextRange::new(3.into(), 8.into()));
    }
}
