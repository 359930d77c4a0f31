//! `scrapile-lang` - The Scrapile language definition.
//!
//! Scrapile is a small imperative language: a `main` block plus function
//! definitions, `var` declarations, `mut` mutations, `if`/`while` control
//! flow, and an expression grammar with tuples, lists, builtin calls
//! (`join!(...)`), and the `<>` string-concatenation operator.
//!
//! This crate describes those tokens and productions against the
//! grammar-agnostic engine in `scrapile-syntax` and exposes the compiled
//! tables through [`language`], the process-wide immutable handle: it is
//! compiled once, shared by every parse on every thread, and every call
//! returns the same handle identity.
//!
//! # Example
//!
//! ```
//! let parsed = scrapile_lang::parse("main { var x = 1 + 2; }");
//! assert!(parsed.ok());
//! let root = parsed.syntax();
//! assert_eq!(parsed.kind_name(root.kind()), "source_file");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use once_cell::sync::Lazy;
use std::sync::Arc;

use scrapile_syntax::{Assoc, GrammarBuilder, Language, Parse};

static LANGUAGE: Lazy<Arc<Language>> =
    Lazy::new(|| grammar().compile().expect("the Scrapile grammar is valid"));

/// The process-wide Scrapile language handle.
///
/// Safe to call repeatedly and from any thread; always returns the same
/// handle.
#[must_use]
pub fn language() -> &'static Arc<Language> {
    &LANGUAGE
}

/// Parses Scrapile source text.
#[must_use]
pub fn parse(text: &str) -> Parse {
    scrapile_syntax::parse(language(), text)
}

/// The Scrapile grammar description.
///
/// Token spellings and production shapes follow the original language:
/// whitespace plus `//`, `#`, and `/* */` comments are trivia; keywords
/// are reserved ahead of identifiers; identifiers may contain `-`; a
/// trailing `!` marks a builtin name.
#[allow(clippy::too_many_lines)]
fn grammar() -> GrammarBuilder {
    let mut g = GrammarBuilder::new("scrapile");

    // Trivia.
    let _whitespace = g.extra_pattern("whitespace", r"[ \t\r\n\f]+");
    let _line_comment = g.extra_pattern("line_comment", r"//[^\n\r]*");
    let _hash_comment = g.extra_pattern("hash_comment", r"#[^\n\r]*");
    let _block_comment = g.extra_pattern("block_comment", r"/\*[^*]*\*+([^/*][^*]*\*+)*/");

    // Keywords, declared before `ident` so equal-length matches resolve to
    // the keyword.
    let kw_main = g.literal("main");
    let kw_var = g.literal("var");
    let kw_mut = g.literal("mut");
    let kw_if = g.literal("if");
    let kw_else = g.literal("else");
    let kw_while = g.literal("while");
    let kw_fn = g.literal("fn");
    let kw_true = g.literal("true");
    let kw_false = g.literal("false");

    // Punctuation. Closers come first: recovery prefers inserting the
    // earliest-declared viable literal.
    let semi = g.literal(";");
    let rparen = g.literal(")");
    let rbrace = g.literal("}");
    let rbracket = g.literal("]");
    let lparen = g.literal("(");
    let lbrace = g.literal("{");
    let lbracket = g.literal("[");
    let comma = g.literal(",");
    let colon = g.literal(":");
    let dot = g.literal(".");
    let arrow = g.literal("->");
    let eq = g.literal("=");
    let ee = g.literal("==");
    let ne = g.literal("!=");
    let le = g.literal("<=");
    let ge = g.literal(">=");
    let lt = g.literal("<");
    let gt = g.literal(">");
    let plus = g.literal("+");
    let add_eq = g.literal("+=");
    let minus = g.literal("-");
    let sub_eq = g.literal("-=");
    let star = g.literal("*");
    let mul_eq = g.literal("*=");
    let slash = g.literal("/");
    let div_eq = g.literal("/=");
    let percent = g.literal("%");
    let mod_eq = g.literal("%=");
    let and_and = g.literal("&&");
    let or_or = g.literal("||");
    let bang = g.literal("!");
    let concat = g.literal("<>");

    // Value tokens.
    let number = g.terminal_pattern("number", r"[0-9]+(\.[0-9]+)?");
    let string = g.terminal_pattern(
        "string",
        r#""([^"\\]|\\["\\bnfrt]|\\u[a-fA-F0-9]{4})*""#,
    );
    let builtin = g.terminal_pattern("builtin", r"[a-zA-Z_][a-zA-Z0-9_\-]*!");
    let ident = g.terminal_pattern("ident", r"[a-zA-Z_][a-zA-Z0-9_\-]*");

    // Expression precedence, loosest first.
    g.precedence(Assoc::Left, &[or_or]);
    g.precedence(Assoc::Left, &[and_and]);
    g.precedence(Assoc::Left, &[ee, ne]);
    g.precedence(Assoc::Left, &[lt, gt, le, ge]);
    g.precedence(Assoc::Left, &[concat]);
    g.precedence(Assoc::Left, &[plus, minus]);
    g.precedence(Assoc::Left, &[star, slash, percent]);
    let prec_unary = g.precedence(Assoc::Right, &[]);
    g.precedence(Assoc::Left, &[dot]);

    // Rules. `_`-prefixed rules are hidden: they shape the tables but are
    // spliced into their parent in the tree.
    let source_file = g.nonterminal("source_file");
    let items = g.nonterminal("_items");
    let item = g.nonterminal("_item");
    let main_def = g.nonterminal("main_def");
    let func_def = g.nonterminal("func_def");
    let param_list = g.nonterminal("param_list");
    let params = g.nonterminal("_params");
    let param = g.nonterminal("param");
    let block = g.nonterminal("block");
    let stmts = g.nonterminal("_stmts");
    let stmt = g.nonterminal("_stmt");
    let var_decl = g.nonterminal("var_decl");
    let assign_stmt = g.nonterminal("assign_stmt");
    let expr_stmt = g.nonterminal("expr_stmt");
    let if_stmt = g.nonterminal("if_stmt");
    let while_stmt = g.nonterminal("while_stmt");
    let ty = g.nonterminal("type");
    let types = g.nonterminal("_types");
    let expr = g.nonterminal("_expr");
    let exprs = g.nonterminal("_exprs");
    let binary_expr = g.nonterminal("binary_expr");
    let unary_expr = g.nonterminal("unary_expr");
    let paren_expr = g.nonterminal("paren_expr");
    let tuple_expr = g.nonterminal("tuple_expr");
    let list_expr = g.nonterminal("list_expr");
    let call_expr = g.nonterminal("call_expr");
    let builtin_expr = g.nonterminal("builtin_expr");
    let field_expr = g.nonterminal("field_expr");
    let method_expr = g.nonterminal("method_expr");
    let arg_list = g.nonterminal("arg_list");

    g.production(source_file, &[items.into()]);
    g.production(items, &[]);
    g.production(items, &[items.into(), item.into()]);
    g.production(item, &[main_def.into()]);
    g.production(item, &[func_def.into()]);

    g.production(main_def, &[kw_main.into(), block.into()])
        .field(1, "body");

    g.production(
        func_def,
        &[
            kw_fn.into(),
            ident.into(),
            param_list.into(),
            arrow.into(),
            ty.into(),
            block.into(),
        ],
    )
    .field(1, "name")
    .field(2, "params")
    .field(4, "return")
    .field(5, "body");
    g.production(
        func_def,
        &[
            kw_fn.into(),
            ident.into(),
            arrow.into(),
            ty.into(),
            block.into(),
        ],
    )
    .field(1, "name")
    .field(3, "return")
    .field(4, "body");

    g.production(param_list, &[lparen.into(), rparen.into()]);
    g.production(param_list, &[lparen.into(), params.into(), rparen.into()]);
    g.production(
        param_list,
        &[lparen.into(), params.into(), comma.into(), rparen.into()],
    );
    g.production(params, &[param.into()]);
    g.production(params, &[params.into(), comma.into(), param.into()]);
    g.production(param, &[ident.into(), colon.into(), ty.into()])
        .field(0, "name")
        .field(2, "type");

    g.production(block, &[lbrace.into(), stmts.into(), rbrace.into()]);
    g.production(stmts, &[]);
    g.production(stmts, &[stmts.into(), stmt.into()]);
    g.production(stmt, &[var_decl.into()]);
    g.production(stmt, &[assign_stmt.into()]);
    g.production(stmt, &[expr_stmt.into()]);
    g.production(stmt, &[if_stmt.into()]);
    g.production(stmt, &[while_stmt.into()]);
    g.production(stmt, &[block.into()]);

    g.production(
        var_decl,
        &[kw_var.into(), ident.into(), eq.into(), expr.into(), semi.into()],
    )
    .field(1, "name")
    .field(3, "value");
    g.production(
        var_decl,
        &[
            kw_var.into(),
            ident.into(),
            colon.into(),
            ty.into(),
            eq.into(),
            expr.into(),
            semi.into(),
        ],
    )
    .field(1, "name")
    .field(3, "type")
    .field(5, "value");
    g.production(
        var_decl,
        &[
            kw_var.into(),
            kw_mut.into(),
            ident.into(),
            eq.into(),
            expr.into(),
            semi.into(),
        ],
    )
    .field(2, "name")
    .field(4, "value");
    g.production(
        var_decl,
        &[
            kw_var.into(),
            kw_mut.into(),
            ident.into(),
            colon.into(),
            ty.into(),
            eq.into(),
            expr.into(),
            semi.into(),
        ],
    )
    .field(2, "name")
    .field(4, "type")
    .field(6, "value");

    for op in [eq, add_eq, sub_eq, mul_eq, div_eq, mod_eq] {
        g.production(
            assign_stmt,
            &[kw_mut.into(), ident.into(), op.into(), expr.into(), semi.into()],
        )
        .field(1, "name")
        .field(2, "operator")
        .field(3, "value");
    }

    g.production(expr_stmt, &[expr.into(), semi.into()]);

    g.production(
        if_stmt,
        &[
            kw_if.into(),
            lparen.into(),
            expr.into(),
            rparen.into(),
            stmt.into(),
        ],
    )
    .field(2, "cond")
    .field(4, "then");
    g.production(
        if_stmt,
        &[
            kw_if.into(),
            lparen.into(),
            expr.into(),
            rparen.into(),
            stmt.into(),
            kw_else.into(),
            stmt.into(),
        ],
    )
    .field(2, "cond")
    .field(4, "then")
    .field(6, "else");

    g.production(
        while_stmt,
        &[
            kw_while.into(),
            lparen.into(),
            expr.into(),
            rparen.into(),
            stmt.into(),
        ],
    )
    .field(2, "cond")
    .field(4, "body");

    g.production(ty, &[ident.into()]);
    g.production(ty, &[lparen.into(), rparen.into()]);
    g.production(ty, &[lparen.into(), types.into(), rparen.into()]);
    g.production(
        ty,
        &[lparen.into(), types.into(), comma.into(), rparen.into()],
    );
    g.production(types, &[ty.into()]);
    g.production(types, &[types.into(), comma.into(), ty.into()]);

    g.production(expr, &[binary_expr.into()]);
    g.production(expr, &[unary_expr.into()]);
    g.production(expr, &[paren_expr.into()]);
    g.production(expr, &[tuple_expr.into()]);
    g.production(expr, &[list_expr.into()]);
    g.production(expr, &[call_expr.into()]);
    g.production(expr, &[builtin_expr.into()]);
    g.production(expr, &[field_expr.into()]);
    g.production(expr, &[method_expr.into()]);
    g.production(expr, &[number.into()]);
    g.production(expr, &[string.into()]);
    g.production(expr, &[kw_true.into()]);
    g.production(expr, &[kw_false.into()]);
    g.production(expr, &[ident.into()]);

    for op in [
        or_or, and_and, ee, ne, lt, gt, le, ge, concat, plus, minus, star, slash, percent,
    ] {
        g.production(binary_expr, &[expr.into(), op.into(), expr.into()])
            .field(0, "left")
            .field(1, "operator")
            .field(2, "right");
    }

    for op in [minus, bang] {
        g.production(unary_expr, &[op.into(), expr.into()])
            .field(0, "operator")
            .field(1, "operand")
            .prec(prec_unary);
    }

    g.production(paren_expr, &[lparen.into(), expr.into(), rparen.into()]);

    g.production(tuple_expr, &[lparen.into(), rparen.into()]);
    g.production(
        tuple_expr,
        &[lparen.into(), expr.into(), comma.into(), rparen.into()],
    );
    g.production(
        tuple_expr,
        &[
            lparen.into(),
            expr.into(),
            comma.into(),
            exprs.into(),
            rparen.into(),
        ],
    );
    g.production(
        tuple_expr,
        &[
            lparen.into(),
            expr.into(),
            comma.into(),
            exprs.into(),
            comma.into(),
            rparen.into(),
        ],
    );
    g.production(exprs, &[expr.into()]);
    g.production(exprs, &[exprs.into(), comma.into(), expr.into()]);

    g.production(list_expr, &[lbracket.into(), rbracket.into()]);
    g.production(list_expr, &[lbracket.into(), exprs.into(), rbracket.into()]);
    g.production(
        list_expr,
        &[
            lbracket.into(),
            exprs.into(),
            comma.into(),
            rbracket.into(),
        ],
    );

    g.production(call_expr, &[ident.into(), arg_list.into()])
        .field(0, "function")
        .field(1, "arguments");
    g.production(builtin_expr, &[builtin.into(), arg_list.into()])
        .field(0, "function")
        .field(1, "arguments");
    g.production(arg_list, &[lparen.into(), rparen.into()]);
    g.production(arg_list, &[lparen.into(), exprs.into(), rparen.into()]);
    g.production(
        arg_list,
        &[lparen.into(), exprs.into(), comma.into(), rparen.into()],
    );

    g.production(field_expr, &[expr.into(), dot.into(), ident.into()])
        .field(0, "value")
        .field(2, "field");
    g.production(
        method_expr,
        &[expr.into(), dot.into(), ident.into(), arg_list.into()],
    )
    .field(0, "value")
    .field(2, "method")
    .field(3, "arguments");

    g.start(source_file);
    g
}
