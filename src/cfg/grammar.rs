//! Byte-level context-free grammars.

use std::fmt::Debug;

use rustc_hash::FxHashMap;

use super::ByteSet;
use crate::dfa::Dfa;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymIdx(u32);

impl SymIdx {
    pub fn as_index(&self) -> usize {
        self.0 as usize
    }
}

struct Symbol {
    name: String,
    bytes: Option<ByteSet>,
    rules: Vec<Vec<SymIdx>>,
}

impl Symbol {
    fn is_terminal(&self) -> bool {
        self.bytes.is_some()
    }
}

/// Grammar under construction. Symbol `0` is the start symbol, named `start`.
pub struct Grammar {
    symbols: Vec<Symbol>,
    symbol_by_name: FxHashMap<String, SymIdx>,
    terminals: FxHashMap<ByteSet, SymIdx>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    pub fn new() -> Self {
        let mut grammar = Grammar {
            symbols: vec![],
            symbol_by_name: FxHashMap::default(),
            terminals: FxHashMap::default(),
        };
        let _ = grammar.symbol("start");
        grammar
    }

    pub fn start(&self) -> SymIdx {
        SymIdx(0)
    }

    fn sym_data(&self, sym: SymIdx) -> &Symbol {
        &self.symbols[sym.as_index()]
    }

    pub fn sym_name(&self, sym: SymIdx) -> &str {
        &self.sym_data(sym).name
    }

    pub fn is_terminal(&self, sym: SymIdx) -> bool {
        self.sym_data(sym).is_terminal()
    }

    pub fn num_rules(&self, sym: SymIdx) -> usize {
        self.sym_data(sym).rules.len()
    }

    pub fn add_rule(&mut self, lhs: SymIdx, rhs: Vec<SymIdx>) {
        debug_assert!(!self.is_terminal(lhs));
        self.symbols[lhs.as_index()].rules.push(rhs);
    }

    /// The terminal matching any byte of `bytes`, shared between equal sets.
    pub fn terminal(&mut self, bytes: ByteSet) -> SymIdx {
        if let Some(sym) = self.terminals.get(&bytes) {
            return *sym;
        }
        let mut name = format!("T:{}", bytes);
        if name.len() > 40 {
            name = format!("T@{}", self.terminals.len());
        }
        let sym = self.fresh_symbol(&name);
        self.symbols[sym.as_index()].bytes = Some(bytes.clone());
        self.terminals.insert(bytes, sym);
        sym
    }

    /// A sequence of terminals spelling `bytes`.
    pub fn literal(&mut self, bytes: &[u8]) -> Vec<SymIdx> {
        bytes
            .iter()
            .map(|b| self.terminal(ByteSet::from_bytes([*b])))
            .collect()
    }

    /// Adds right-linear rules recognizing the language of `dfa`, returns their root symbol.
    pub fn add_dfa(&mut self, name: &str, dfa: &Dfa) -> SymIdx {
        let states: Vec<SymIdx> = (0..dfa.num_states())
            .map(|state| self.fresh_symbol(&format!("{name}#{state}")))
            .collect();
        for (state, &lhs) in states.iter().enumerate() {
            let state = state as crate::primitives::StateId;
            // Group bytes by target so each edge becomes a single terminal.
            let mut targets: Vec<(crate::primitives::StateId, ByteSet)> = vec![];
            for (byte, next) in dfa.edges(state) {
                match targets.iter_mut().find(|(target, _)| *target == next) {
                    Some((_, bytes)) => bytes.add(byte),
                    None => targets.push((next, ByteSet::from_bytes([byte]))),
                }
            }
            for (next, bytes) in targets {
                let terminal = self.terminal(bytes);
                self.add_rule(lhs, vec![terminal, states[next as usize]]);
            }
            if dfa.is_accepting(state) {
                self.add_rule(lhs, vec![]);
            }
        }
        states[dfa.start_state() as usize]
    }

    pub fn fresh_symbol(&mut self, name0: &str) -> SymIdx {
        let mut name = name0.to_string();
        let mut idx = 2;
        while self.symbol_by_name.contains_key(&name) {
            name = format!("{}#{}", name0, idx);
            idx += 1;
        }

        let sym = SymIdx(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            name: name.clone(),
            bytes: None,
            rules: vec![],
        });
        self.symbol_by_name.insert(name, sym);
        sym
    }

    pub fn symbol(&mut self, name: &str) -> SymIdx {
        match self.symbol_by_name.get(name) {
            Some(sym) => *sym,
            None => self.fresh_symbol(name),
        }
    }

    pub fn compile(&self) -> CompiledGrammar {
        CompiledGrammar::from_grammar(self)
    }
}

impl Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut num_terminals = 0;
        let mut num_rules = 0;
        for sym in &self.symbols {
            if sym.is_terminal() {
                num_terminals += 1;
                continue;
            }
            for rule in &sym.rules {
                num_rules += 1;
                let rhs: Vec<&str> = rule.iter().map(|s| self.sym_name(*s)).collect();
                if rhs.is_empty() {
                    writeln!(f, "{} ::= ϵ", sym.name)?;
                } else {
                    writeln!(f, "{} ::= {}", sym.name, rhs.join(" "))?;
                }
            }
        }
        writeln!(
            f,
            "stats: {} terminals; {} non-terminals with {} rules",
            num_terminals,
            self.symbols.len() - num_terminals,
            num_rules
        )
    }
}

/// Position of a dot inside the flattened rule bodies of a [`CompiledGrammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleIdx(u32);

impl RuleIdx {
    pub fn advance(&self) -> RuleIdx {
        RuleIdx(self.0 + 1)
    }
}

pub struct CompiledSymbol {
    pub name: String,
    pub bytes: Option<ByteSet>,
    pub is_nullable: bool,
    pub rules: Vec<RuleIdx>,
}

/// Read-only grammar tables used by the Earley parser.
pub struct CompiledGrammar {
    start: SymIdx,
    symbols: Vec<CompiledSymbol>,
    /// Rule bodies back to back, each one followed by `None`.
    rules: Vec<Option<SymIdx>>,
}

impl CompiledGrammar {
    fn from_grammar(grammar: &Grammar) -> Self {
        let mut symbols = Vec::with_capacity(grammar.symbols.len());
        let mut rules = vec![];
        for sym in &grammar.symbols {
            let mut starts = Vec::with_capacity(sym.rules.len());
            for rule in &sym.rules {
                starts.push(RuleIdx(rules.len() as u32));
                rules.extend(rule.iter().map(|s| Some(*s)));
                rules.push(None);
            }
            symbols.push(CompiledSymbol {
                name: sym.name.clone(),
                bytes: sym.bytes.clone(),
                is_nullable: false,
                rules: starts,
            });
        }

        // A symbol is nullable when one of its rules consists only of nullable symbols.
        loop {
            let mut changed = false;
            for idx in 0..symbols.len() {
                if symbols[idx].is_nullable {
                    continue;
                }
                let nullable = grammar.symbols[idx]
                    .rules
                    .iter()
                    .any(|rule| rule.iter().all(|s| symbols[s.as_index()].is_nullable));
                if nullable {
                    symbols[idx].is_nullable = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        CompiledGrammar {
            start: grammar.start(),
            symbols,
            rules,
        }
    }

    pub fn start(&self) -> SymIdx {
        self.start
    }

    pub fn sym_data(&self, sym: SymIdx) -> &CompiledSymbol {
        &self.symbols[sym.as_index()]
    }

    pub fn rules_of(&self, sym: SymIdx) -> &[RuleIdx] {
        &self.sym_data(sym).rules
    }

    /// The symbol after the dot, `None` when the rule is complete.
    pub fn sym_idx_at(&self, rule: RuleIdx) -> Option<SymIdx> {
        self.rules[rule.0 as usize]
    }

    /// Whether the symbol after the dot is a terminal matching `byte`.
    pub fn scans(&self, rule: RuleIdx, byte: u8) -> bool {
        self.sym_idx_at(rule)
            .and_then(|sym| self.sym_data(sym).bytes.as_ref())
            .is_some_and(|bytes| bytes.contains(byte))
    }

    pub fn num_symbols(&self) -> usize {
        self.symbols.len()
    }
}
