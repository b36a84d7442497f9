//! Compiles a regular expression into a pruned, byte-level deterministic automaton.
//!
//! Construction goes through `regex-automata`'s dense DFA (Thompson NFA, subset construction and,
//! by default, minimization) and is then re-encoded into [`Dfa`]:
//!
//! - states are numbered densely in breadth-first order, `0` is always the start state,
//! - bytes are grouped into equivalence classes, so the transition table has one column per class,
//! - states that can't be reached from the start, and states from which no accepting state can be
//!   reached, are dropped: a transition either leads somewhere a match is still possible or fails.
//!
//! Being in a non-accepting state only means more input is required.

use std::collections::VecDeque;

use bincode::{Decode, Encode};
use log::debug;
use regex_automata::dfa::{dense, Automaton, StartKind};
use regex_automata::util::primitives::StateID as AutomataStateId;
use regex_automata::util::{start, syntax};
use regex_automata::{Anchored, MatchKind};
use rustc_hash::FxHashMap as HashMap;

use crate::grammar::Grammar;
use crate::prelude::*;
use crate::{Error, Result};

const DEAD: StateId = StateId::MAX;

/// Knobs for automaton construction.
#[derive(Clone, Debug)]
pub struct Config {
    minimize: bool,
    unicode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minimize: true,
            unicode: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimizes the automaton before re-encoding it. Indexing cost grows with the number of
    /// states, so this is on by default.
    pub fn minimize(self, yes: bool) -> Self {
        Self {
            minimize: yes,
            ..self
        }
    }

    /// Enables Unicode-aware classes (`\d`, `\w`, `.` match non-ASCII scalars encoded as UTF-8).
    /// When disabled, patterns operate on raw bytes.
    pub fn unicode(self, yes: bool) -> Self {
        Self {
            unicode: yes,
            ..self
        }
    }
}

/// Deterministic finite automaton over bytes.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Dfa {
    /// Equivalence class of every byte, always 256 entries.
    byte_classes: Vec<u8>,
    /// Number of byte classes, the stride of `transitions`.
    alphabet_len: usize,
    /// Row-major `state * alphabet_len + class` table, `DEAD` marks a failing transition.
    transitions: Vec<StateId>,
    /// Whether the input consumed so far is a full match when the automaton is in this state.
    accepting: Vec<bool>,
}

impl Dfa {
    /// Compiles a regular expression with the default [`Config`].
    pub fn new(regex: &str) -> Result<Self> {
        Self::with_config(regex, &Config::default())
    }

    /// Compiles a regular expression, failing on syntax errors or unsupported constructs.
    pub fn with_config(regex: &str, config: &Config) -> Result<Self> {
        let dfa = dense::Builder::new()
            .configure(
                dense::Config::new()
                    .minimize(config.minimize)
                    .match_kind(MatchKind::All)
                    .start_kind(StartKind::Anchored),
            )
            .syntax(
                syntax::Config::new()
                    .unicode(config.unicode)
                    .utf8(config.unicode),
            )
            .build(regex)
            .map_err(Box::new)?;

        let start_state = match dfa.universal_start_state(Anchored::Yes) {
            Some(s) => s,
            None => dfa
                .start_state(&start::Config::new().anchored(Anchored::Yes))
                .map_err(|_| Error::DfaHasNoStartState)?,
        };

        let classes = dfa.byte_classes();
        let byte_classes: Vec<u8> = (0..=255u8).map(|b| classes.get(b)).collect();
        let alphabet_len = byte_classes.iter().map(|&c| c as usize + 1).max().unwrap_or(1);
        let mut representatives = vec![0u8; alphabet_len];
        for b in (0..=255u8).rev() {
            representatives[byte_classes[b as usize] as usize] = b;
        }

        // Explore everything reachable from the start state.
        let mut ids: HashMap<AutomataStateId, usize> = HashMap::default();
        let mut states = vec![start_state];
        ids.insert(start_state, 0);
        let mut edges: Vec<Vec<usize>> = vec![];
        let mut accepting: Vec<bool> = vec![];
        let mut current = 0;
        while current < states.len() {
            let state = states[current];
            accepting.push(dfa.is_match_state(dfa.next_eoi_state(state)));
            let mut row = Vec::with_capacity(alphabet_len);
            for &byte in &representatives {
                let next = dfa.next_state(state, byte);
                if dfa.is_dead_state(next) || dfa.is_quit_state(next) {
                    row.push(usize::MAX);
                    continue;
                }
                let id = *ids.entry(next).or_insert_with(|| {
                    states.push(next);
                    states.len() - 1
                });
                row.push(id);
            }
            edges.push(row);
            current += 1;
        }

        let live = Self::live_states(&edges, &accepting);

        // Renumber live states in breadth-first order from the start state.
        let mut renumbered = vec![DEAD; states.len()];
        renumbered[0] = 0;
        let mut order = vec![0usize];
        let mut queue = VecDeque::from([0usize]);
        while let Some(state) = queue.pop_front() {
            for &next in &edges[state] {
                if next != usize::MAX && live[next] && renumbered[next] == DEAD {
                    renumbered[next] = order.len() as StateId;
                    order.push(next);
                    queue.push_back(next);
                }
            }
        }

        let mut transitions = Vec::with_capacity(order.len() * alphabet_len);
        for &old in &order {
            for &next in &edges[old] {
                if next == usize::MAX || !live[next] {
                    transitions.push(DEAD);
                } else {
                    transitions.push(renumbered[next]);
                }
            }
        }
        let accepting: Vec<bool> = order.iter().map(|&old| accepting[old]).collect();

        debug!(
            "compiled dfa: {} states ({} explored), {} byte classes, {} accepting",
            order.len(),
            states.len(),
            alphabet_len,
            accepting.iter().filter(|a| **a).count()
        );

        Ok(Self {
            byte_classes,
            alphabet_len,
            transitions,
            accepting,
        })
    }

    /// Marks states from which an accepting state is reachable.
    fn live_states(edges: &[Vec<usize>], accepting: &[bool]) -> Vec<bool> {
        let mut reverse: Vec<Vec<usize>> = vec![vec![]; edges.len()];
        for (from, row) in edges.iter().enumerate() {
            for &to in row {
                if to != usize::MAX {
                    reverse[to].push(from);
                }
            }
        }
        let mut live = accepting.to_vec();
        let mut stack: Vec<usize> = (0..edges.len()).filter(|&s| accepting[s]).collect();
        while let Some(state) = stack.pop() {
            for &prev in &reverse[state] {
                if !live[prev] {
                    live[prev] = true;
                    stack.push(prev);
                }
            }
        }
        live
    }

    /// Returns the ID of the start state, always `0`.
    pub fn start_state(&self) -> StateId {
        0
    }

    pub fn num_states(&self) -> usize {
        self.accepting.len()
    }

    /// Number of byte equivalence classes.
    pub fn alphabet_len(&self) -> usize {
        self.alphabet_len
    }

    /// Follows the transition on `byte`, or `None` if that byte is forbidden in `state`.
    #[inline]
    pub fn next_state(&self, state: StateId, byte: u8) -> Option<StateId> {
        let class = self.byte_classes[byte as usize] as usize;
        match self
            .transitions
            .get(state as usize * self.alphabet_len + class)
        {
            Some(&next) if next != DEAD => Some(next),
            _ => None,
        }
    }

    /// Walks all `bytes` starting at `state`.
    pub fn walk(&self, state: StateId, bytes: &[u8]) -> Option<StateId> {
        bytes
            .iter()
            .try_fold(state, |state, &byte| self.next_state(state, byte))
    }

    pub fn is_accepting(&self, state: StateId) -> bool {
        self.accepting.get(state as usize).copied().unwrap_or(false)
    }

    /// Whether the whole of `bytes` is in the automaton's language.
    pub fn accepts(&self, bytes: &[u8]) -> bool {
        self.walk(self.start_state(), bytes)
            .is_some_and(|state| self.is_accepting(state))
    }

    /// Accepting states in ascending order.
    pub fn final_states(&self) -> Vec<StateId> {
        (0..self.num_states() as StateId)
            .filter(|&s| self.accepting[s as usize])
            .collect()
    }

    /// True when no input at all is accepted.
    pub fn is_empty_language(&self) -> bool {
        !self.accepting.iter().any(|a| *a)
    }

    /// All allowed `(byte, next state)` pairs of `state`, ordered by byte.
    pub fn edges(&self, state: StateId) -> impl Iterator<Item = (u8, StateId)> + '_ {
        (0..=255u8).filter_map(move |byte| self.next_state(state, byte).map(|next| (byte, next)))
    }
}

/// Compiles the regular form of a grammar.
pub fn compile(grammar: &Grammar, config: &Config) -> Result<Dfa> {
    match grammar {
        Grammar::Regex(regex) => Dfa::with_config(regex, config),
        Grammar::Cfg(_) => Err(Error::CfgNotRegular),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_language() {
        let dfa = Dfa::new("0|[1-9][0-9]*").expect("Dfa failed");
        assert_eq!(dfa.start_state(), 0);
        assert!(!dfa.is_accepting(dfa.start_state()));
        for accepted in ["0", "7", "12", "9000"] {
            assert!(dfa.accepts(accepted.as_bytes()), "{accepted}");
        }
        for rejected in ["", "01", "1a", "-1"] {
            assert!(!dfa.accepts(rejected.as_bytes()), "{rejected}");
        }
        // `0` can't be continued, so the byte after it fails right away.
        let zero = dfa.next_state(0, b'0').expect("Zero allowed");
        assert_eq!(dfa.next_state(zero, b'1'), None);
    }

    #[test]
    fn later_alternatives_survive_an_earlier_match() {
        let dfa = Dfa::new("a|ab|axy").expect("Dfa failed");
        assert!(dfa.accepts(b"a"));
        assert!(dfa.accepts(b"ab"));
        assert!(dfa.accepts(b"axy"));

        let ax = dfa.walk(0, b"ax").expect("Prefix of axy");
        assert!(!dfa.is_accepting(ax));
        assert!(dfa.walk(0, b"abx").is_none());
    }

    #[test]
    fn dead_ends_are_pruned() {
        let dfa = Dfa::new("a").expect("Dfa failed");
        assert_eq!(dfa.num_states(), 2);
        assert!(dfa.walk(0, b"ax").is_none());
        assert_eq!(dfa.final_states(), vec![1]);

        for minimize in [true, false] {
            let dfa = Dfa::with_config("abc|abd", &Config::new().minimize(minimize))
                .expect("Dfa failed");
            for state in 0..dfa.num_states() as StateId {
                let can_finish = dfa.is_accepting(state) || dfa.edges(state).next().is_some();
                assert!(can_finish, "state {state} is a dead end");
            }
        }
    }

    #[test]
    fn multibyte_characters_are_walked_per_byte() {
        let dfa = Dfa::new("é+").expect("Dfa failed");
        let bytes = "é".as_bytes();
        let half = dfa.next_state(0, bytes[0]).expect("First byte allowed");
        assert!(!dfa.is_accepting(half));
        let full = dfa.next_state(half, bytes[1]).expect("Second byte allowed");
        assert!(dfa.is_accepting(full));
        assert!(dfa.accepts("ééé".as_bytes()));
        assert!(!dfa.accepts(&bytes[..1]));
    }

    #[test]
    fn minimization_keeps_the_language() {
        let regex = "(ab|cb)(x|y)*|[a-c]{2}z";
        let minimized = Dfa::new(regex).expect("Dfa failed");
        let plain = Dfa::with_config(regex, &Config::new().minimize(false)).expect("Dfa failed");
        assert!(minimized.num_states() <= plain.num_states());
        for input in ["ab", "cbxyx", "acz", "bbz", "abz", "cb", "", "abxz"] {
            assert_eq!(
                minimized.accepts(input.as_bytes()),
                plain.accepts(input.as_bytes()),
                "{input}"
            );
        }
    }

    #[test]
    fn compilation_is_deterministic() {
        let regex = r#"\{[ ]?"name"[ ]?:[ ]?"[a-z]+"[ ]?\}"#;
        assert_eq!(
            Dfa::new(regex).expect("Dfa failed"),
            Dfa::new(regex).expect("Dfa failed")
        );
    }

    #[test]
    fn empty_language() {
        let dfa = Dfa::new("[a&&b]").expect("Dfa failed");
        assert!(dfa.is_empty_language());
        assert_eq!(dfa.num_states(), 1);
        assert!(dfa.next_state(0, b'a').is_none());
    }

    #[test]
    fn byte_mode_without_unicode() {
        let dfa = Dfa::with_config(r"(?-u:\xFF)[0-9]", &Config::new().unicode(false))
            .expect("Dfa failed");
        assert!(dfa.accepts(&[0xFF, b'3']));
        assert!(!dfa.accepts("٣".as_bytes()));
    }

    #[test]
    fn invalid_pattern() {
        match Dfa::new("(ab") {
            Err(Error::IndexDfaError(_)) => {}
            other => unreachable!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn cfg_is_not_regular() {
        let grammar = Grammar::Cfg("start: \"a\"".to_string());
        assert!(matches!(
            compile(&grammar, &Config::default()),
            Err(Error::CfgNotRegular)
        ));
    }
}
