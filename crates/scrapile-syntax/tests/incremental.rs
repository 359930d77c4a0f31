//! Incremental reparsing: equivalence with from-scratch parses and
//! changed-range minimality.

mod common;

use common::*;
use scrapile_syntax::{parse, reparse, Edit, Point, ReparseError};
use text_size::{TextRange, TextSize};

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

/// Replaces `range` in `text` with `replacement`, returning the new text
/// and the describing edit.
fn apply(text: &str, start: u32, old_end: u32, replacement: &str) -> (String, Edit) {
    let mut new_text = String::new();
    new_text.push_str(&text[..start as usize]);
    new_text.push_str(replacement);
    new_text.push_str(&text[old_end as usize..]);
    let e = edit(start, old_end, start + replacement.len() as u32);
    (new_text, e)
}

#[test]
fn test_incremental_equivalence() {
    let lang = stmts();
    let cases: &[(&str, u32, u32, &str)] = &[
        // Append at the end of the document.
        ("x = 1;", 6, 6, " y = 2;"),
        // Insert a statement in the middle.
        ("x = 1;\nz = 3;", 7, 7, "y = 2;\n"),
        // Replace a number inside a statement.
        ("x = (1 + 2);\ny = 3;", 5, 6, "7"),
        // Edit confined to a comment.
        ("x = 1; // note\ny = 2;", 10, 14, "nose"),
        // Delete a token, introducing an error.
        ("x = 1 + 2;", 6, 7, ""),
        // Replace an operator with garbage.
        ("x = 1 + 2;", 6, 7, "@"),
        // Grow an identifier.
        ("abc = 1;", 2, 3, "cdef"),
        // Everything from empty.
        ("", 0, 0, "x = 1;"),
        // Everything to empty.
        ("x = 1;", 0, 6, ""),
    ];

    for &(source, start, old_end, replacement) in cases {
        let old = parse(&lang, source);
        let (new_text, e) = apply(source, start, old_end, replacement);
        let (incremental, changed) =
            reparse(&old, &[e], &new_text).expect("edit is consistent");
        let fresh = parse(&lang, &new_text);
        assert_eq!(
            full_repr(&incremental),
            full_repr(&fresh),
            "equivalence for {source:?} -> {new_text:?} (changed {changed:?})"
        );
        assert_eq!(leaf_text(&incremental), new_text);
    }
}

#[test]
fn test_comment_edit_is_confined_to_the_token() {
    let lang = stmts();
    let source = "x = 1; // note\ny = 2;";
    let old = parse(&lang, source);
    // Replace `not` inside the comment, strictly interior to the token.
    let (new_text, e) = apply(source, 10, 13, "nos");
    let (incremental, changed) = reparse(&old, &[e], &new_text).expect("consistent");

    assert!(incremental.ok());
    assert_eq!(leaf_text(&incremental), "x = 1; // nose\ny = 2;");
    // The comment token spans 7..14; the changed range may not exceed it.
    let comment = TextRange::new(7.into(), 14.into());
    assert_eq!(changed.len(), 1, "changed: {changed:?}");
    assert!(
        comment.contains_range(changed[0]),
        "changed {changed:?} exceeds the comment token"
    );
}

#[test]
fn test_identifier_interior_edit_is_confined() {
    let lang = stmts();
    let source = "abc = 1;";
    let old = parse(&lang, source);
    let (new_text, e) = apply(source, 1, 2, "x");
    let (incremental, changed) = reparse(&old, &[e], &new_text).expect("consistent");

    assert!(incremental.ok());
    assert_eq!(changed, vec![TextRange::new(0.into(), 3.into())]);
    assert_eq!(leaf_text(&incremental), "axc = 1;");
}

#[test]
fn test_append_at_end_confines_changed_range() {
    let lang = stmts();
    let source = "x = 1;";
    let old = parse(&lang, source);
    let (new_text, e) = apply(source, 6, 6, "z");
    let (_incremental, changed) = reparse(&old, &[e], &new_text).expect("consistent");

    // Nothing before the insertion point may be reported as changed.
    for range in &changed {
        assert!(
            range.start() >= TextSize::from(6),
            "changed {changed:?} reaches before the insertion"
        );
    }
}

#[test]
fn test_operator_breaking_edit_reports_minimal_range() {
    let lang = arith();
    let source = "1+2+3";
    let old = parse(&lang, source);
    assert!(old.ok());

    let (new_text, e) = apply(source, 1, 2, "-");
    let (incremental, changed) = reparse(&old, &[e], &new_text).expect("consistent");

    assert!(incremental.contains_errors());
    assert_eq!(changed, vec![TextRange::new(1.into(), 2.into())]);

    let fresh = parse(&lang, &new_text);
    assert_eq!(full_repr(&incremental), full_repr(&fresh));
}

#[test]
fn test_statement_interior_edit_stays_inside_statement() {
    let lang = stmts();
    let source = "x = (1 + 2);\ny = 3;";
    let old = parse(&lang, source);
    let (new_text, e) = apply(source, 5, 6, "7");
    let (incremental, changed) = reparse(&old, &[e], &new_text).expect("consistent");

    assert!(incremental.ok());
    assert_eq!(changed.len(), 1, "changed: {changed:?}");
    // The first statement spans 0..12; the change must not leak into the
    // second statement.
    assert!(u32::from(changed[0].end()) <= 12, "changed: {changed:?}");
}

#[test]
fn test_multiple_edits_in_one_request() {
    let lang = stmts();
    let source = "x = 1; y = 2;";
    let old = parse(&lang, source);
    // Replace `1` with `11` (grows by 1), then replace `2` (now at 12..13)
    // with `22`.
    let step1 = edit(4, 5, 6);
    let step2 = edit(12, 13, 14);
    let new_text = "x = 11; y = 22;";
    let (incremental, _changed) =
        reparse(&old, &[step1, step2], new_text).expect("edits are consistent");
    let fresh = parse(&lang, new_text);
    assert_eq!(full_repr(&incremental), full_repr(&fresh));
}

#[test]
fn test_old_tree_remains_valid_after_reparse() {
    let lang = stmts();
    let source = "x = 1;";
    let old = parse(&lang, source);
    let (new_text, e) = apply(source, 4, 5, "2");
    let (new, _changed) = reparse(&old, &[e], &new_text).expect("consistent");

    // Both trees stay independently usable.
    assert_eq!(leaf_text(&old), "x = 1;");
    assert_eq!(leaf_text(&new), "x = 2;");
    assert!(old.ok() && new.ok());
}

#[test]
fn test_inconsistent_edit_is_a_hard_error() {
    let lang = stmts();
    let old = parse(&lang, "x = 1;");
    let err = reparse(&old, &[edit(2, 40, 40)], "x = 1;").expect_err("edit out of bounds");
    assert!(matches!(err, ReparseError::InconsistentEdit { index: 0, .. }));
}

#[test]
fn test_length_mismatch_is_a_hard_error() {
    let lang = stmts();
    let old = parse(&lang, "x = 1;");
    // The edit claims to grow the text by one byte, but the new text did
    // not.
    let err = reparse(&old, &[edit(4, 5, 6)], "x = 1;").expect_err("length mismatch");
    assert!(matches!(err, ReparseError::LengthMismatch { .. }));
}

#[test]
fn test_no_edits_returns_the_same_tree() {
    let lang = stmts();
    let old = parse(&lang, "x = 1;");
    let (new, changed) = reparse(&old, &[], "x = 1;").expect("no-op reparse");
    assert!(changed.is_empty());
    assert_eq!(full_repr(&old), full_repr(&new));
}
