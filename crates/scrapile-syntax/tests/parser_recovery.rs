//! Error recovery: the parser always produces a tree.

mod common;

use common::*;
use scrapile_syntax::{parse, SyntaxKind, SyntaxNodeExt};

#[test]
fn test_empty_input_parses() {
    let lang = stmts();
    let parsed = parse(&lang, "");
    assert!(parsed.ok(), "errors: {:?}", parsed.errors());
    assert_eq!(parsed.kind_name(parsed.syntax().kind()), "program");
}

#[test]
fn test_clean_program_has_no_errors() {
    let lang = stmts();
    let parsed = parse(&lang, "x = 1;\ny = (x + 2) * 3; // trailing note\n");
    assert!(parsed.ok(), "errors: {:?}", parsed.errors());
    assert!(!parsed.contains_errors());
    assert_eq!(stmt_count(&parsed), 2);
}

#[test]
fn test_arbitrary_garbage_still_produces_a_tree() {
    let lang = stmts();
    for source in ["@#$%^&*", "===;;;(((", "\u{0}\u{1}\u{2}", "x = = = 1;"] {
        let parsed = parse(&lang, source);
        assert_eq!(parsed.kind_name(parsed.syntax().kind()), "program");
        assert!(parsed.contains_errors(), "source {source:?} must be flagged");
        assert_eq!(leaf_text(&parsed), source, "coverage for {source:?}");
    }
}

#[test]
fn test_total_span_coverage() {
    let lang = stmts();
    for source in [
        "",
        "x = 1;",
        "x = 1; y = 2;",
        "x = (1 + 2;",
        "x = 1 y = 2;",
        "// only a comment",
        "  \n\t ",
        "x = 1; @@ y = 2;",
    ] {
        let parsed = parse(&lang, source);
        assert_eq!(leaf_text(&parsed), source, "coverage for {source:?}");
    }
}

#[test]
fn test_determinism() {
    let lang = stmts();
    for source in ["x = 1; y = 2;", "x = (1 + 2;", "@@@@"] {
        let first = parse(&lang, source);
        let second = parse(&lang, source);
        assert_eq!(full_repr(&first), full_repr(&second), "source {source:?}");
    }
}

#[test]
fn test_missing_semicolon_is_inserted() {
    let lang = stmts();
    let parsed = parse(&lang, "x = 1 y = 2;");
    assert!(!parsed.ok());
    assert!(
        parsed
            .errors()
            .iter()
            .any(|e| e.message == "expected `;`"),
        "errors: {:?}",
        parsed.errors()
    );

    let root = parsed.syntax();
    assert!(
        root.descendants().any(|n| n.is_missing()),
        "tree must contain a MISSING node"
    );
    // Both statements survive around the insertion point.
    assert_eq!(stmt_count(&parsed), 2);
}

#[test]
fn test_missing_close_paren_is_inserted() {
    let lang = stmts();
    let parsed = parse(&lang, "x = (1 + 2;");
    assert!(!parsed.ok());
    assert!(
        parsed
            .errors()
            .iter()
            .any(|e| e.message == "expected `)`"),
        "errors: {:?}",
        parsed.errors()
    );
    assert_eq!(stmt_count(&parsed), 1);
}

#[test]
fn test_stray_token_is_deleted_into_error_node() {
    let lang = stmts();
    let parsed = parse(&lang, "x = 1; ) y = 2;");
    assert!(!parsed.ok());
    assert!(
        parsed
            .errors()
            .iter()
            .any(|e| e.message == "unexpected `)`"),
        "errors: {:?}",
        parsed.errors()
    );

    let root = parsed.syntax();
    let error_node = root
        .descendants()
        .find(|n| n.kind() == SyntaxKind::ERROR)
        .expect("deleted token is wrapped in an ERROR node");
    // Trivia adjacent to the deletion is absorbed into the ERROR node.
    assert_eq!(error_node.text().to_string().trim(), ")");
    assert_eq!(stmt_count(&parsed), 2);
}

#[test]
fn test_unlexable_codepoint_is_recovered() {
    let lang = stmts();
    let parsed = parse(&lang, "x = 1\u{a7} + 2;");
    assert!(!parsed.ok());
    assert!(parsed.contains_errors());
    assert_eq!(leaf_text(&parsed), "x = 1\u{a7} + 2;");
    // The surrounding structure survives: there is still one statement.
    assert_eq!(stmt_count(&parsed), 1);
}

#[test]
fn test_truncated_input_reports_eof() {
    let lang = stmts();
    let parsed = parse(&lang, "x = (");
    assert!(!parsed.ok());
    assert!(parsed.contains_errors());
    assert_eq!(leaf_text(&parsed), "x = (");
}

#[test]
fn test_error_flags_are_local() {
    let lang = stmts();
    let parsed = parse(&lang, "x = 1; y = @; z = 3;");
    let root = parsed.syntax();
    let stmts: Vec<_> = root
        .children()
        .filter(|n| parsed.kind_name(n.kind()) == "stmt")
        .collect();
    assert!(stmts.len() >= 2, "tree: {}", render(&parsed));
    // First statement is clean even though a later one is broken.
    assert!(!stmts[0].has_error(), "tree: {}", render(&parsed));
}

#[test]
fn test_concurrent_parses_share_the_language() {
    let lang = stmts();
    std::thread::scope(|scope| {
        let a = scope.spawn(|| parse(&lang, "x = 1;"));
        let b = scope.spawn(|| parse(&lang, "y = 2;"));
        assert!(a.join().expect("thread a").ok());
        assert!(b.join().expect("thread b").ok());
    });
}

fn stmt_count(parsed: &scrapile_syntax::Parse) -> usize {
    parsed
        .syntax()
        .descendants()
        .filter(|n| parsed.kind_name(n.kind()) == "stmt")
        .count()
}
