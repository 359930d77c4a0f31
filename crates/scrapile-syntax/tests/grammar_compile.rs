//! Grammar validation, conflict resolution, and table behavior.

mod common;

use common::*;
use expect_test::expect;
use scrapile_syntax::{parse, Assoc, CompileError, GrammarBuilder};

#[test]
fn test_arith_snapshot() {
    let lang = arith();
    expect![[r#"
        expr@0..3
          expr@0..1
            number@0..1 "1"
          +@1..2 "+"
          expr@2..3
            number@2..3 "2"
    "#]]
    .assert_eq(&snapshot_parse(&lang, "1+2"));
}

#[test]
fn test_unreachable_rule_is_rejected() {
    let mut g = GrammarBuilder::new("unreachable");
    let num = g.terminal_pattern("number", r"[0-9]+");
    let a = g.nonterminal("a");
    let b = g.nonterminal("b");
    g.production(a, &[num.into()]);
    g.production(b, &[num.into()]);
    g.start(a);
    let err = g.compile().expect_err("rule b is unreachable");
    assert!(
        matches!(err, CompileError::UnreachableRule { ref rule } if rule == "b"),
        "got {err:?}"
    );
}

#[test]
fn test_rule_without_productions_is_rejected() {
    let mut g = GrammarBuilder::new("empty-rule");
    let num = g.terminal_pattern("number", r"[0-9]+");
    let a = g.nonterminal("a");
    let _c = g.nonterminal("c");
    g.production(a, &[num.into()]);
    g.start(a);
    let err = g.compile().expect_err("rule c has no productions");
    assert!(
        matches!(err, CompileError::EmptyRule { ref rule } if rule == "c"),
        "got {err:?}"
    );
}

#[test]
fn test_duplicate_symbol_is_rejected() {
    let mut g = GrammarBuilder::new("dup");
    let plus = g.literal("+");
    let _again = g.literal("+");
    let a = g.nonterminal("a");
    g.production(a, &[plus.into()]);
    g.start(a);
    let err = g.compile().expect_err("duplicate literal");
    assert!(
        matches!(err, CompileError::DuplicateSymbol { ref name } if name == "+"),
        "got {err:?}"
    );
}

#[test]
fn test_missing_start_symbol_is_rejected() {
    let mut g = GrammarBuilder::new("no-start");
    let num = g.terminal_pattern("number", r"[0-9]+");
    let a = g.nonterminal("a");
    g.production(a, &[num.into()]);
    let err = g.compile().expect_err("no start symbol");
    assert!(matches!(err, CompileError::NoStartSymbol), "got {err:?}");
}

#[test]
fn test_invalid_pattern_is_rejected() {
    let mut g = GrammarBuilder::new("bad-pattern");
    let bad = g.terminal_pattern("bad", "[");
    let a = g.nonterminal("a");
    g.production(a, &[bad.into()]);
    g.start(a);
    let err = g.compile().expect_err("pattern does not compile");
    assert!(
        matches!(err, CompileError::InvalidPattern { ref terminal, .. } if terminal == "bad"),
        "got {err:?}"
    );
}

#[test]
fn test_equal_explicit_precedence_is_ambiguous() {
    let mut g = GrammarBuilder::new("amb");
    let num = g.terminal_pattern("number", r"[0-9]+");
    let s = g.nonterminal("s");
    let a = g.nonterminal("a");
    let b = g.nonterminal("b");
    let level = g.precedence(Assoc::Left, &[]);
    g.production(s, &[a.into()]);
    g.production(s, &[b.into()]);
    g.production(a, &[num.into()]).prec(level);
    g.production(b, &[num.into()]).prec(level);
    g.start(s);
    let err = g.compile().expect_err("equal explicit precedence");
    assert!(
        matches!(err, CompileError::AmbiguousGrammar { .. }),
        "got {err:?}"
    );
}

#[test]
fn test_reduce_reduce_resolved_by_declaration_order() {
    let mut g = GrammarBuilder::new("decl-order");
    let num = g.terminal_pattern("number", r"[0-9]+");
    let s = g.nonterminal("s");
    let a = g.nonterminal("a");
    let b = g.nonterminal("b");
    g.production(s, &[a.into()]);
    g.production(s, &[b.into()]);
    g.production(a, &[num.into()]);
    g.production(b, &[num.into()]);
    g.start(s);
    let lang = g.compile().expect("declaration order breaks the tie");

    let parsed = parse(&lang, "5");
    assert!(parsed.ok(), "errors: {:?}", parsed.errors());
    let root = parsed.syntax();
    let child = root.children().next().expect("s has one child");
    assert_eq!(lang.kind_name(child.kind()), "a");
}

#[test]
fn test_dangling_else_prefers_shift() {
    let mut g = GrammarBuilder::new("dangling");
    let _ws = g.extra_pattern("whitespace", r"[ \t\r\n]+");
    let kw_if = g.literal("if");
    let kw_else = g.literal("else");
    let x = g.literal("x");
    let stmt = g.nonterminal("stmt");
    g.production(stmt, &[kw_if.into(), stmt.into()]);
    g.production(stmt, &[kw_if.into(), stmt.into(), kw_else.into(), stmt.into()]);
    g.production(stmt, &[x.into()]);
    g.start(stmt);
    let lang = g.compile().expect("dangling else compiles");

    expect![[r#"
        stmt@0..14
          if@0..2 "if"
          stmt@3..14
            if@3..5 "if"
            stmt@6..7
              x@6..7 "x"
            else@8..12 "else"
            stmt@13..14
              x@13..14 "x"
    "#]]
    .assert_eq(&snapshot_parse(&lang, "if if x else x"));
}

fn binary_grammar() -> std::sync::Arc<scrapile_syntax::Language> {
    let mut g = GrammarBuilder::new("binary");
    let num = g.terminal_pattern("number", r"[0-9]+");
    let plus = g.literal("+");
    let minus = g.literal("-");
    let star = g.literal("*");
    let expr = g.nonterminal("expr");
    g.precedence(Assoc::Left, &[plus, minus]);
    g.precedence(Assoc::Left, &[star]);
    g.production(expr, &[expr.into(), plus.into(), expr.into()]);
    g.production(expr, &[expr.into(), minus.into(), expr.into()]);
    g.production(expr, &[expr.into(), star.into(), expr.into()]);
    g.production(expr, &[num.into()]);
    g.start(expr);
    g.compile().expect("binary grammar compiles")
}

#[test]
fn test_precedence_binds_multiplication_tighter() {
    let lang = binary_grammar();
    expect![[r#"
        expr@0..5
          expr@0..1
            number@0..1 "1"
          +@1..2 "+"
          expr@2..5
            expr@2..3
              number@2..3 "2"
            *@3..4 "*"
            expr@4..5
              number@4..5 "3"
    "#]]
    .assert_eq(&snapshot_parse(&lang, "1+2*3"));
}

#[test]
fn test_left_associativity_groups_to_the_left() {
    let lang = binary_grammar();
    expect![[r#"
        expr@0..5
          expr@0..3
            expr@0..1
              number@0..1 "1"
            -@1..2 "-"
            expr@2..3
              number@2..3 "2"
          -@3..4 "-"
          expr@4..5
            number@4..5 "3"
    "#]]
    .assert_eq(&snapshot_parse(&lang, "1-2-3"));
}

#[test]
fn test_nonassoc_chain_is_an_error() {
    let mut g = GrammarBuilder::new("nonassoc");
    let num = g.terminal_pattern("number", r"[0-9]+");
    let lt = g.literal("<");
    let expr = g.nonterminal("expr");
    g.precedence(Assoc::Nonassoc, &[lt]);
    g.production(expr, &[expr.into(), lt.into(), expr.into()]);
    g.production(expr, &[num.into()]);
    g.start(expr);
    let lang = g.compile().expect("nonassoc grammar compiles");

    assert!(parse(&lang, "1<2").ok());
    let chained = parse(&lang, "1<2<3");
    assert!(!chained.ok(), "chained nonassoc must be rejected");
}

#[test]
fn test_language_handle_metadata() {
    let lang = stmts();
    assert_eq!(lang.name(), "stmts");
    let stmt = lang.symbol("stmt").expect("stmt is declared");
    assert_eq!(lang.kind_name(lang.kind_of(stmt)), "stmt");
    assert!(lang.literal(";").is_some());
    assert!(lang.symbol("no_such_rule").is_none());
}
