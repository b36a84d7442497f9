//! Byte-level Earley recognizer with a stack of rows, one row per consumed byte.

use std::fmt::Debug;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::byteset::byte_to_string;
use super::grammar::{CompiledGrammar, RuleIdx, SymIdx};
use crate::vocabulary::Recognizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Item {
    rule_idx: RuleIdx,
    start: u32,
    sym_idx: SymIdx,
}

impl Item {
    fn new(sym: SymIdx, rule: RuleIdx, start: usize) -> Self {
        Item {
            sym_idx: sym,
            rule_idx: rule,
            start: start as u32,
        }
    }

    fn start_pos(&self) -> usize {
        self.start as usize
    }

    fn advance_dot(&self) -> Self {
        Item::new(self.sym_idx, self.rule_idx.advance(), self.start_pos())
    }
}

#[derive(Clone)]
pub struct Row {
    byte: Option<u8>,
    items: Vec<Item>,
    accepting: bool,
}

impl Row {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }
}

impl Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.byte {
            Some(b) => write!(f, "row after {}", byte_to_string(b))?,
            None => write!(f, "initial row")?,
        }
        write!(f, ": {} items", self.items.len())?;
        if self.accepting {
            write!(f, ", accepting")?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Parser {
    grammar: Arc<CompiledGrammar>,
    rows: Vec<Row>,
}

impl Parser {
    pub fn new(grammar: Arc<CompiledGrammar>) -> Self {
        let start = grammar.start();
        let init_items = grammar
            .rules_of(start)
            .iter()
            .map(|r| Item::new(start, *r, 0))
            .collect();
        let mut parser = Parser {
            grammar,
            rows: vec![],
        };
        let row = parser.make_row(init_items, None);
        parser.rows.push(row);
        parser
    }

    pub fn grammar(&self) -> &Arc<CompiledGrammar> {
        &self.grammar
    }

    /// Number of bytes consumed.
    pub fn num_bytes(&self) -> usize {
        self.rows.len() - 1
    }

    pub fn curr_row(&self) -> &Row {
        &self.rows[self.rows.len() - 1]
    }

    /// The input so far is a complete sentence.
    pub fn is_accepting(&self) -> bool {
        self.curr_row().is_accepting()
    }

    /// No continuation of the input so far can be accepted.
    pub fn is_dead(&self) -> bool {
        self.curr_row().is_empty()
    }

    pub fn scan(&self, b: u8) -> Row {
        let items = self
            .curr_row()
            .items
            .iter()
            .filter(|item| self.grammar.scans(item.rule_idx, b))
            .map(|item| item.advance_dot())
            .collect();
        self.make_row(items, Some(b))
    }

    pub fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Drops the last `n` rows, the initial row is always kept.
    pub fn pop_rows(&mut self, n: usize) {
        let keep = self.rows.len().saturating_sub(n).max(1);
        self.rows.truncate(keep);
    }

    /// Consumes all of `bytes`, or none of them.
    pub fn try_push_bytes(&mut self, bytes: &[u8]) -> bool {
        for (consumed, b) in bytes.iter().enumerate() {
            if !self.try_push_byte(*b) {
                self.pop_rows(consumed);
                return false;
            }
        }
        true
    }

    fn make_row(&self, mut items: Vec<Item>, byte: Option<u8>) -> Row {
        let curr_idx = self.rows.len();
        let mut seen: FxHashSet<Item> = items.iter().copied().collect();
        let mut agenda = items.clone();
        let mut predicted: FxHashSet<SymIdx> = FxHashSet::default();
        let mut accepting = false;

        while let Some(item) = agenda.pop() {
            let mut to_add = vec![];
            match self.grammar.sym_idx_at(item.rule_idx) {
                None => {
                    // complete
                    if item.sym_idx == self.grammar.start() && item.start_pos() == 0 {
                        accepting = true;
                    }
                    // Items started in this row are completed through the nullable check.
                    if item.start_pos() < curr_idx {
                        for waiting in &self.rows[item.start_pos()].items {
                            if self.grammar.sym_idx_at(waiting.rule_idx) == Some(item.sym_idx) {
                                to_add.push(waiting.advance_dot());
                            }
                        }
                    }
                }
                Some(after_dot) => {
                    let sym_data = self.grammar.sym_data(after_dot);
                    if sym_data.is_nullable {
                        to_add.push(item.advance_dot());
                    }
                    if predicted.insert(after_dot) {
                        for rule in &sym_data.rules {
                            to_add.push(Item::new(after_dot, *rule, curr_idx));
                        }
                    }
                }
            }

            for new_item in to_add {
                if seen.insert(new_item) {
                    items.push(new_item);
                    agenda.push(new_item);
                }
            }
        }

        Row {
            byte,
            items,
            accepting,
        }
    }
}

impl Recognizer for Parser {
    fn try_push_byte(&mut self, byte: u8) -> bool {
        let row = self.scan(byte);
        if row.is_empty() {
            false
        } else {
            self.push_row(row);
            true
        }
    }

    fn pop_bytes(&mut self, num: usize) {
        self.pop_rows(num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{ByteSet, Grammar};

    fn parser(build: impl FnOnce(&mut Grammar)) -> Parser {
        let mut grammar = Grammar::new();
        build(&mut grammar);
        Parser::new(Arc::new(grammar.compile()))
    }

    fn accepts(parser: &mut Parser, input: &[u8]) -> bool {
        let before = parser.num_bytes();
        let accepted = parser.try_push_bytes(input) && parser.is_accepting();
        parser.pop_rows(parser.num_bytes() - before);
        accepted
    }

    /// `start: "(" start ")" start | ϵ`
    fn balanced(grammar: &mut Grammar) {
        let start = grammar.start();
        let open = grammar.terminal(ByteSet::from_bytes(*b"("));
        let close = grammar.terminal(ByteSet::from_bytes(*b")"));
        grammar.add_rule(start, vec![open, start, close, start]);
        grammar.add_rule(start, vec![]);
    }

    #[test]
    fn balanced_parentheses() {
        let mut parser = parser(balanced);
        assert!(parser.is_accepting());
        for input in ["()", "(())", "()()", "(()())()"] {
            assert!(accepts(&mut parser, input.as_bytes()), "{input}");
        }
        for input in ["(", ")", "(()", "())", "x"] {
            assert!(!accepts(&mut parser, input.as_bytes()), "{input}");
        }
        assert_eq!(parser.num_bytes(), 0);
    }

    #[test]
    fn prefixes_stay_alive() {
        let mut parser = parser(balanced);
        assert!(parser.try_push_bytes(b"(("));
        assert!(!parser.is_accepting());
        assert!(!parser.is_dead());
        assert!(!parser.try_push_bytes(b"))x"));
        assert_eq!(parser.num_bytes(), 2);
        assert!(parser.try_push_bytes(b"))"));
        assert!(parser.is_accepting());
    }

    #[test]
    fn nullable_in_the_middle() {
        // start: "a" opt "b", opt: "c" | ϵ
        let mut parser = parser(|grammar| {
            let start = grammar.start();
            let opt = grammar.symbol("opt");
            let a = grammar.literal(b"a");
            let b = grammar.literal(b"b");
            let c = grammar.literal(b"c");
            grammar.add_rule(opt, c);
            grammar.add_rule(opt, vec![]);
            grammar.add_rule(start, [a, vec![opt], b].concat());
        });
        assert!(accepts(&mut parser, b"ab"));
        assert!(accepts(&mut parser, b"acb"));
        assert!(!accepts(&mut parser, b"accb"));
        assert!(!accepts(&mut parser, b"a"));
    }

    #[test]
    fn left_recursion() {
        // start: start "+" "1" | "1"
        let mut parser = parser(|grammar| {
            let start = grammar.start();
            let plus = grammar.literal(b"+");
            let one = grammar.literal(b"1");
            grammar.add_rule(start, [vec![start], plus, one.clone()].concat());
            grammar.add_rule(start, one);
        });
        assert!(accepts(&mut parser, b"1"));
        assert!(accepts(&mut parser, b"1+1+1"));
        assert!(!accepts(&mut parser, b"1+"));
        assert!(!accepts(&mut parser, b"+1"));
    }
}
