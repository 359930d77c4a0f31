//! Command-line front end for the Scrapile parser.
//!
//! Mainly a debugging surface: dump the syntax tree or token stream of a
//! source file, or run a query pattern against it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use scrapile_syntax::{tokenize, Query, SyntaxElement, SyntaxNode};

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a source file and print its syntax tree.
    Parse {
        /// The path of the program source code.
        input_file: PathBuf,
        /// Also print trivia (whitespace and comments).
        #[arg(long)]
        trivia: bool,
    },
    /// Print the token stream of a source file.
    Tokens {
        /// The path of the program source code.
        input_file: PathBuf,
    },
    /// Run a query pattern against a source file.
    Query {
        /// The path of the program source code.
        input_file: PathBuf,
        /// The pattern, e.g. `(var_decl name: _ @name)`.
        pattern: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("scrapile error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Parse { input_file, trivia } => {
            let source = read(&input_file)?;
            let parsed = scrapile_lang::parse(&source);
            info!(errors = parsed.errors().len(), "parsed {}", input_file.display());

            print_node(&parsed, &parsed.syntax(), 0, trivia);
            if !parsed.ok() {
                eprintln!();
                for error in parsed.errors() {
                    let points = parsed.point_range(error.range);
                    eprintln!(
                        "error at {}:{}: {}",
                        points.start.row + 1,
                        points.start.column + 1,
                        error.message
                    );
                }
                std::process::exit(1);
            }
        }
        Command::Tokens { input_file } => {
            let source = read(&input_file)?;
            let lang = scrapile_lang::language();
            for token in tokenize(lang, &source) {
                println!(
                    "{}@{:?} {:?}",
                    lang.kind_name(token.kind),
                    token.range,
                    &source[usize::from(token.range.start())..usize::from(token.range.end())]
                );
            }
        }
        Command::Query {
            input_file,
            pattern,
        } => {
            let source = read(&input_file)?;
            let lang = scrapile_lang::language();
            let parsed = scrapile_lang::parse(&source);
            let query = Query::new(lang, &pattern).context("invalid query pattern")?;
            for m in query.matches(&parsed.syntax()) {
                for capture in &m.captures {
                    let range = capture.node.text_range();
                    let points = parsed.point_range(range);
                    println!(
                        "{}:{}: @{} {:?}",
                        points.start.row + 1,
                        points.start.column + 1,
                        capture.name,
                        capture.node.to_string()
                    );
                }
            }
        }
    }
    Ok(())
}

fn read(path: &PathBuf) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn print_node(parsed: &scrapile_syntax::Parse, node: &SyntaxNode, depth: usize, trivia: bool) {
    println!(
        "{}{}@{:?}",
        "  ".repeat(depth),
        parsed.kind_name(node.kind()),
        node.text_range()
    );
    for child in node.children_with_tokens() {
        match child {
            SyntaxElement::Node(n) => print_node(parsed, &n, depth + 1, trivia),
            SyntaxElement::Token(t) => {
                if !trivia && parsed.language().is_extra(t.kind()) {
                    continue;
                }
                println!(
                    "{}{}@{:?} {:?}",
                    "  ".repeat(depth + 1),
                    parsed.kind_name(t.kind()),
                    t.text_range(),
                    t.text()
                );
            }
        }
    }
}
