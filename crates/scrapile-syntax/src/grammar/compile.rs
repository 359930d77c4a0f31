//! Grammar validation and parse-table construction.
//!
//! Tables are SLR: LR(0) item sets with follow-set reduces. Every
//! nonterminal is seeded with its own augmented entry state so the
//! incremental reparser can restart the automaton at any node kind; as a
//! consequence end-of-input is a member of every nonterminal's follow set.
//!
//! Conflict resolution:
//! - shift/reduce: explicit precedence decides when both sides carry it
//!   (equal levels fall back to the level's associativity); otherwise the
//!   shift wins.
//! - reduce/reduce: the highest explicit precedence wins, otherwise the
//!   earliest-declared production. Two candidates with *equal explicit*
//!   precedence are a compile error.

use regex_automata::dfa::dense;
use regex_automata::dfa::StartKind;
use regex_automata::MatchKind;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::grammar::table::{
    Action, CompiledTables, Language, LexTables, Production, StateId, SymbolInfo, TerminalSet,
};
use crate::grammar::{Assoc, CompileError, GrammarBuilder, PrecLevel, SymbolClass, TermSource};

/// An LR(0) item: a production id and a dot position. Production ids at or
/// past the real production count are the synthetic entry productions, one
/// per nonterminal.
type Item = (u32, u16);

/// Shared inputs of the item-set construction.
struct ItemContext<'a> {
    n_real: u32,
    prods: &'a [Production],
    nt_syms: &'a [u16],
    prods_by_lhs: &'a FxHashMap<u16, Vec<u32>>,
    symbols: &'a [SymbolInfo],
}

impl ItemContext<'_> {
    /// Right-hand side of a production, synthetic entry productions
    /// included.
    fn rhs(&self, prod: u32) -> &[u16] {
        if prod < self.n_real {
            &self.prods[prod as usize].rhs
        } else {
            std::slice::from_ref(&self.nt_syms[(prod - self.n_real) as usize])
        }
    }

    fn close(&self, set: &mut BTreeSet<Item>) {
        let mut work: Vec<Item> = set.iter().copied().collect();
        while let Some((prod, dot)) = work.pop() {
            let Some(&next) = self.rhs(prod).get(usize::from(dot)) else {
                continue;
            };
            if self.symbols[usize::from(next)].class == SymbolClass::Nonterminal {
                for &p in self.prods_by_lhs.get(&next).map_or(&[][..], Vec::as_slice) {
                    if set.insert((p, 0)) {
                        work.push((p, 0));
                    }
                }
            }
        }
    }
}

#[derive(Default)]
struct Collection {
    state_ids: FxHashMap<Vec<Item>, StateId>,
    state_items: Vec<Vec<Item>>,
    transitions: Vec<BTreeMap<u16, StateId>>,
    queue: Vec<StateId>,
}

impl Collection {
    fn intern(&mut self, items: Vec<Item>) -> StateId {
        if let Some(&id) = self.state_ids.get(&items) {
            return id;
        }
        let id = self.state_items.len() as StateId;
        self.state_ids.insert(items.clone(), id);
        self.state_items.push(items);
        self.transitions.push(BTreeMap::new());
        self.queue.push(id);
        id
    }
}

pub(crate) fn compile(mut builder: GrammarBuilder) -> Result<Language, CompileError> {
    if let Some(name) = builder.duplicate.take() {
        return Err(CompileError::DuplicateSymbol { name });
    }
    let start = builder.start.ok_or(CompileError::NoStartSymbol)?;

    // Assign table columns: terminals (EOF first), then nonterminals.
    let mut term_syms: Vec<u16> = vec![0];
    let mut nt_syms: Vec<u16> = Vec::new();
    for (idx, info) in builder.symbols.iter_mut().enumerate() {
        match info.class {
            SymbolClass::Terminal => {
                info.col = term_syms.len() as u16;
                term_syms.push(idx as u16);
            }
            SymbolClass::Nonterminal => {
                info.col = nt_syms.len() as u16;
                nt_syms.push(idx as u16);
            }
            SymbolClass::Eof | SymbolClass::Error | SymbolClass::Missing => {}
        }
    }

    let prods: Vec<Production> = builder
        .prods
        .iter()
        .map(|p| Production {
            lhs: p.lhs,
            rhs: p.rhs.clone(),
            fields: p.fields.clone(),
        })
        .collect();

    validate(&builder, &prods, start.0, &nt_syms)?;

    let lex = build_lex_tables(&builder)?;

    let n_real = prods.len() as u32;
    let prods_by_lhs: FxHashMap<u16, Vec<u32>> = {
        let mut map: FxHashMap<u16, Vec<u32>> = FxHashMap::default();
        for (idx, prod) in prods.iter().enumerate() {
            map.entry(prod.lhs).or_default().push(idx as u32);
        }
        map
    };

    // Effective precedence: explicit annotation, else the rightmost
    // terminal that carries a declared level.
    let prod_prec: Vec<Option<PrecLevel>> = builder
        .prods
        .iter()
        .map(|p| {
            p.prec.or_else(|| {
                p.rhs
                    .iter()
                    .rev()
                    .find_map(|&sym| builder.symbols[usize::from(sym)].prec)
            })
        })
        .collect();

    let ctx = ItemContext {
        n_real,
        prods: &prods,
        nt_syms: &nt_syms,
        prods_by_lhs: &prods_by_lhs,
        symbols: &builder.symbols,
    };

    // Canonical LR(0) collection, seeded with one entry state per
    // nonterminal.
    let mut collection = Collection::default();
    let mut entries: Vec<StateId> = Vec::with_capacity(nt_syms.len());
    for ordinal in 0..nt_syms.len() {
        let mut seed = BTreeSet::from([(n_real + ordinal as u32, 0u16)]);
        ctx.close(&mut seed);
        entries.push(collection.intern(seed.into_iter().collect()));
    }

    while let Some(state) = collection.queue.pop() {
        // Group kernel successors by the symbol after the dot.
        let items = collection.state_items[state as usize].clone();
        let mut by_symbol: BTreeMap<u16, BTreeSet<Item>> = BTreeMap::new();
        for &(prod, dot) in &items {
            if let Some(&next) = ctx.rhs(prod).get(usize::from(dot)) {
                by_symbol.entry(next).or_default().insert((prod, dot + 1));
            }
        }
        for (sym, mut kernel) in by_symbol {
            ctx.close(&mut kernel);
            let target = collection.intern(kernel.into_iter().collect());
            collection.transitions[state as usize].insert(sym, target);
        }
    }

    let state_items = collection.state_items;
    let transitions = collection.transitions;

    let follow = follow_sets(&builder, &prods, start.0, &nt_syms);

    // Fill the action/goto tables, resolving conflicts as we go.
    let n_states = state_items.len();
    let n_term_cols = term_syms.len();
    let n_nt_cols = nt_syms.len();
    let mut actions = vec![Action::Error; n_states * n_term_cols];
    let mut gotos = vec![u32::MAX; n_states * n_nt_cols];
    let mut accepts = vec![u16::MAX; n_states];
    let mut valid = Vec::with_capacity(n_states);
    let mut external_valid = vec![false; n_states];

    for state in 0..n_states {
        // Reduce candidates per lookahead terminal, in declaration order.
        let mut reduces: BTreeMap<u16, Vec<u32>> = BTreeMap::new();
        for &(prod, dot) in &state_items[state] {
            if usize::from(dot) < ctx.rhs(prod).len() {
                continue;
            }
            if prod >= n_real {
                accepts[state] = nt_syms[(prod - n_real) as usize];
                continue;
            }
            let lhs = prods[prod as usize].lhs;
            for &t in &follow[usize::from(lhs)] {
                reduces.entry(t).or_default().push(prod);
            }
        }

        let mut state_valid = TerminalSet::new(builder.symbols.len());
        for (&sym, &target) in &transitions[state] {
            let info = &builder.symbols[usize::from(sym)];
            match info.class {
                SymbolClass::Terminal => {
                    let reduce = reduces.remove(&sym);
                    let action = resolve(
                        &builder,
                        &prods,
                        &prod_prec,
                        sym,
                        Some(target),
                        reduce.as_deref().unwrap_or(&[]),
                    )?;
                    actions[state * n_term_cols + usize::from(info.col)] = action;
                }
                SymbolClass::Nonterminal => {
                    gotos[state * n_nt_cols + usize::from(info.col)] = target;
                }
                SymbolClass::Eof | SymbolClass::Error | SymbolClass::Missing => {}
            }
        }
        for (sym, prods_for_sym) in reduces {
            let info = &builder.symbols[usize::from(sym)];
            let action = resolve(&builder, &prods, &prod_prec, sym, None, &prods_for_sym)?;
            actions[state * n_term_cols + usize::from(info.col)] = action;
        }

        for (col, &sym) in term_syms.iter().enumerate().skip(1) {
            let info = &builder.symbols[usize::from(sym)];
            let has_action = actions[state * n_term_cols + col] != Action::Error;
            if has_action || info.is_extra {
                state_valid.insert(sym);
            }
            if has_action && matches!(info.source, TermSource::External) {
                external_valid[state] = true;
            }
        }
        valid.push(state_valid);
    }

    debug!(
        language = %builder.name,
        states = n_states,
        productions = prods.len(),
        terminals = n_term_cols - 1,
        "compiled grammar tables"
    );

    let tables = CompiledTables {
        n_term_cols,
        n_nt_cols,
        actions,
        gotos,
        accepts,
        valid,
        external_valid,
        entries,
    };
    Ok(Language::from_parts(builder, prods, tables, lex))
}

// =========================================================================
// Validation
// =========================================================================

fn validate(
    builder: &GrammarBuilder,
    prods: &[Production],
    start: u16,
    nt_syms: &[u16],
) -> Result<(), CompileError> {
    for &nt in nt_syms {
        if !prods.iter().any(|p| p.lhs == nt) {
            return Err(CompileError::EmptyRule {
                rule: builder.symbols[usize::from(nt)].name.clone(),
            });
        }
    }

    // Reachability from the start symbol through production right-hand
    // sides.
    let mut reachable = BTreeSet::from([start]);
    let mut work = vec![start];
    while let Some(nt) = work.pop() {
        for prod in prods.iter().filter(|p| p.lhs == nt) {
            for &sym in &prod.rhs {
                if builder.symbols[usize::from(sym)].class == SymbolClass::Nonterminal
                    && reachable.insert(sym)
                {
                    work.push(sym);
                }
            }
        }
    }
    for &nt in nt_syms {
        if !reachable.contains(&nt) {
            return Err(CompileError::UnreachableRule {
                rule: builder.symbols[usize::from(nt)].name.clone(),
            });
        }
    }
    Ok(())
}

// =========================================================================
// Follow sets
// =========================================================================

fn follow_sets(
    builder: &GrammarBuilder,
    prods: &[Production],
    start: u16,
    nt_syms: &[u16],
) -> Vec<BTreeSet<u16>> {
    let n_symbols = builder.symbols.len();
    let is_nt =
        |sym: u16| builder.symbols[usize::from(sym)].class == SymbolClass::Nonterminal;

    let mut nullable = BTreeSet::new();
    loop {
        let mut changed = false;
        for prod in prods {
            if !nullable.contains(&prod.lhs)
                && prod.rhs.iter().all(|s| nullable.contains(s))
            {
                nullable.insert(prod.lhs);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut first: Vec<BTreeSet<u16>> = vec![BTreeSet::new(); n_symbols];
    for (idx, info) in builder.symbols.iter().enumerate() {
        if info.class == SymbolClass::Terminal {
            first[idx].insert(idx as u16);
        }
    }
    loop {
        let mut changed = false;
        for prod in prods {
            for &sym in &prod.rhs {
                let add: Vec<u16> = first[usize::from(sym)].iter().copied().collect();
                for t in add {
                    changed |= first[usize::from(prod.lhs)].insert(t);
                }
                if !nullable.contains(&sym) {
                    break;
                }
            }
        }
        if !changed {
            break;
        }
    }

    let mut follow: Vec<BTreeSet<u16>> = vec![BTreeSet::new(); n_symbols];
    follow[usize::from(start)].insert(0); // EOF
    loop {
        let mut changed = false;
        for prod in prods {
            let mut trailer: BTreeSet<u16> = follow[usize::from(prod.lhs)].clone();
            for &sym in prod.rhs.iter().rev() {
                if is_nt(sym) {
                    for &t in &trailer {
                        changed |= follow[usize::from(sym)].insert(t);
                    }
                    if nullable.contains(&sym) {
                        let firsts: Vec<u16> =
                            first[usize::from(sym)].iter().copied().collect();
                        trailer.extend(firsts);
                    } else {
                        trailer = first[usize::from(sym)].clone();
                    }
                } else {
                    trailer = BTreeSet::from([sym]);
                }
            }
        }
        if !changed {
            break;
        }
    }

    // Any nonterminal can be an incremental restart root, so end-of-input
    // must be able to follow all of them.
    for &nt in nt_syms {
        follow[usize::from(nt)].insert(0);
    }
    follow
}

// =========================================================================
// Conflict resolution
// =========================================================================

fn resolve(
    builder: &GrammarBuilder,
    prods: &[Production],
    prod_prec: &[Option<PrecLevel>],
    token: u16,
    shift: Option<StateId>,
    reduces: &[u32],
) -> Result<Action, CompileError> {
    let rule_name = |p: u32| builder.symbols[usize::from(prods[p as usize].lhs)].name.clone();

    let reduce = match reduces {
        [] => None,
        [only] => Some(*only),
        many => {
            let explicit: Vec<u32> = many
                .iter()
                .copied()
                .filter(|&p| builder.prods[p as usize].prec.is_some())
                .collect();
            if explicit.is_empty() {
                // Declaration order: the earliest production wins.
                Some(many.iter().copied().min().unwrap_or(many[0]))
            } else {
                let best = explicit
                    .iter()
                    .copied()
                    .max_by_key(|&p| builder.prods[p as usize].prec.map(|l| l.0))
                    .unwrap_or(explicit[0]);
                let best_level = builder.prods[best as usize].prec;
                if let Some(other) = explicit
                    .iter()
                    .copied()
                    .find(|&p| p != best && builder.prods[p as usize].prec == best_level)
                {
                    return Err(CompileError::AmbiguousGrammar {
                        token: builder.symbols[usize::from(token)].name.clone(),
                        first: rule_name(best.min(other)),
                        second: rule_name(best.max(other)),
                    });
                }
                Some(best)
            }
        }
    };

    match (shift, reduce) {
        (None, None) => Ok(Action::Error),
        (Some(target), None) => Ok(Action::Shift(target)),
        (None, Some(prod)) => Ok(Action::Reduce(prod)),
        (Some(target), Some(prod)) => {
            let tok_prec = builder.symbols[usize::from(token)].prec;
            let red_prec = prod_prec[prod as usize];
            match (tok_prec, red_prec) {
                (Some(tp), Some(rp)) if rp.0 > tp.0 => Ok(Action::Reduce(prod)),
                (Some(tp), Some(rp)) if tp.0 > rp.0 => Ok(Action::Shift(target)),
                (Some(tp), Some(_)) => match builder.prec_assoc[usize::from(tp.0)] {
                    Assoc::Left => Ok(Action::Reduce(prod)),
                    Assoc::Right => Ok(Action::Shift(target)),
                    Assoc::Nonassoc => Ok(Action::Error),
                },
                // Default shift bias.
                _ => Ok(Action::Shift(target)),
            }
        }
    }
}

// =========================================================================
// Lexical tables
// =========================================================================

fn build_lex_tables(builder: &GrammarBuilder) -> Result<LexTables, CompileError> {
    let mut patterns: Vec<String> = Vec::new();
    let mut pattern_syms: Vec<u16> = Vec::new();
    for (idx, info) in builder.symbols.iter().enumerate() {
        match &info.source {
            TermSource::Literal(spelling) => {
                patterns.push(regex_syntax::escape(spelling));
                pattern_syms.push(idx as u16);
            }
            TermSource::Pattern(pattern) => {
                patterns.push(pattern.clone());
                pattern_syms.push(idx as u16);
            }
            TermSource::None | TermSource::External => {}
        }
    }

    if patterns.is_empty() {
        return Ok(LexTables {
            dfa: None,
            pattern_syms,
        });
    }

    let config = dense::Config::new()
        .match_kind(MatchKind::All)
        .start_kind(StartKind::Anchored);

    // Compile each pattern on its own first so errors can name the
    // offending terminal.
    for (pattern, &sym) in patterns.iter().zip(&pattern_syms) {
        dense::Builder::new()
            .configure(config.clone())
            .build(pattern)
            .map_err(|err| CompileError::InvalidPattern {
                terminal: builder.symbols[usize::from(sym)].name.clone(),
                message: err.to_string(),
            })?;
    }

    let pattern_refs: Vec<&str> = patterns.iter().map(String::as_str).collect();
    let dfa = dense::Builder::new()
        .configure(config)
        .build_many(&pattern_refs)
        .map_err(|err| CompileError::InvalidPattern {
            terminal: builder.name.clone(),
            message: err.to_string(),
        })?;

    Ok(LexTables {
        dfa: Some(dfa),
        pattern_syms,
    })
}
