//! Shared grammars and tree-rendering helpers for the engine tests.
#![allow(dead_code)]

use std::sync::Arc;

use scrapile_syntax::{
    parse, Assoc, GrammarBuilder, Language, Parse, SyntaxElement, SyntaxNode,
};

/// The arithmetic grammar from the design notes: `expr := expr '+' expr |
/// number`, left associative.
pub fn arith() -> Arc<Language> {
    let mut g = GrammarBuilder::new("arith");
    let _ws = g.extra_pattern("whitespace", r"[ \t\r\n]+");
    let num = g.terminal_pattern("number", r"[0-9]+");
    let plus = g.literal("+");
    let expr = g.nonterminal("expr");
    g.precedence(Assoc::Left, &[plus]);
    g.production(expr, &[expr.into(), plus.into(), expr.into()]);
    g.production(expr, &[num.into()]);
    g.start(expr);
    g.compile().expect("arith grammar compiles")
}

/// A statement-list grammar exercising recovery, fields, and incremental
/// reparsing: assignments over an expression grammar with parentheses.
pub fn stmts() -> Arc<Language> {
    let mut g = GrammarBuilder::new("stmts");
    let _ws = g.extra_pattern("whitespace", r"[ \t\r\n]+");
    let _comment = g.extra_pattern("line_comment", r"//[^\n\r]*");
    let lparen = g.literal("(");
    let rparen = g.literal(")");
    let semi = g.literal(";");
    let eq = g.literal("=");
    let plus = g.literal("+");
    let star = g.literal("*");
    let number = g.terminal_pattern("number", r"[0-9]+");
    let ident = g.terminal_pattern("ident", r"[a-zA-Z_][a-zA-Z0-9_]*");

    let program = g.nonterminal("program");
    let stmt_list = g.nonterminal("_stmts");
    let stmt = g.nonterminal("stmt");
    let expr = g.nonterminal("expr");

    g.precedence(Assoc::Left, &[plus]);
    g.precedence(Assoc::Left, &[star]);

    g.production(program, &[stmt_list.into()]);
    g.production(stmt_list, &[]);
    g.production(stmt_list, &[stmt_list.into(), stmt.into()]);
    g.production(
        stmt,
        &[ident.into(), eq.into(), expr.into(), semi.into()],
    )
    .field(0, "name")
    .field(2, "value");
    g.production(expr, &[expr.into(), plus.into(), expr.into()])
        .field(0, "left")
        .field(2, "right");
    g.production(expr, &[expr.into(), star.into(), expr.into()])
        .field(0, "left")
        .field(2, "right");
    g.production(expr, &[number.into()]);
    g.production(expr, &[ident.into()]);
    g.production(expr, &[lparen.into(), expr.into(), rparen.into()]);
    g.start(program);
    g.compile().expect("stmts grammar compiles")
}

/// Renders a parse the way the snapshot tests expect: nested kinds with
/// ranges, token text quoted, trivia omitted.
pub fn snapshot_parse(lang: &Arc<Language>, source: &str) -> String {
    render(&parse(lang, source))
}

pub fn render(parsed: &Parse) -> String {
    let mut out = String::new();
    format_node(parsed, &parsed.syntax(), &mut out, 0);

    if !parsed.ok() {
        out.push_str("---\nerrors:\n");
        for err in parsed.errors() {
            out.push_str(&format!("  - {err}\n"));
        }
    }
    out
}

fn format_node(parsed: &Parse, node: &SyntaxNode, out: &mut String, depth: usize) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!(
        "{}{}@{:?}\n",
        indent,
        parsed.kind_name(node.kind()),
        node.text_range()
    ));

    for child in node.children_with_tokens() {
        match child {
            SyntaxElement::Node(n) => format_node(parsed, &n, out, depth + 1),
            SyntaxElement::Token(t) => {
                if parsed.language().is_extra(t.kind()) {
                    continue;
                }
                out.push_str(&format!(
                    "{}{}@{:?} {:?}\n",
                    "  ".repeat(depth + 1),
                    parsed.kind_name(t.kind()),
                    t.text_range(),
                    t.text()
                ));
            }
        }
    }
}

/// Full structural rendering including trivia, used for equivalence
/// checks between incremental and from-scratch parses.
pub fn full_repr(parsed: &Parse) -> String {
    let mut out = String::new();
    full_node(parsed, &parsed.syntax(), &mut out, 0);
    out
}

fn full_node(parsed: &Parse, node: &SyntaxNode, out: &mut String, depth: usize) {
    let indent = "  ".repeat(depth);
    out.push_str(&format!(
        "{}{}@{:?}\n",
        indent,
        parsed.kind_name(node.kind()),
        node.text_range()
    ));
    for child in node.children_with_tokens() {
        match child {
            SyntaxElement::Node(n) => full_node(parsed, &n, out, depth + 1),
            SyntaxElement::Token(t) => {
                out.push_str(&format!(
                    "{}{}@{:?} {:?}\n",
                    "  ".repeat(depth + 1),
                    parsed.kind_name(t.kind()),
                    t.text_range(),
                    t.text()
                ));
            }
        }
    }
}

/// Concatenation of every leaf token's text, in order.
pub fn leaf_text(parsed: &Parse) -> String {
    parsed.syntax().text().to_string()
}
