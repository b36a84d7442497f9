//! Building an `Index` to efficiently map vocabulary tokens to state transitions.

use std::time::Instant;

use bincode::{Decode, Encode};
use log::debug;
use rayon::prelude::*;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use crate::dfa::Dfa;
use crate::prelude::*;
use crate::vocabulary::TokenTrie;
use crate::{Error, Result};

/// `Index` efficiently maps vocabulary tokens to state transitions.
#[derive(Clone, Debug, PartialEq, Encode, Decode)]
pub struct Index {
    /// The ID of the initial state in the automaton, processing begins from this state.
    initial_state: StateId,
    /// A collection of states considered as terminal states.
    final_states: HashSet<StateId>,
    /// A mapping of state transitions, defined by tokens ids and their corresponding state changes.
    ///
    /// ### Example
    /// ```ignore
    /// transitions = {
    ///    0: {10: 1, 15: 2},
    ///    1: {20: 3, 25: 2},
    ///    2: {30: 3},
    ///    3: {40: 3, EOS: 3},
    /// }
    ///  +----------------------------+
    ///  |   State 0 (initial)        |
    ///  +----------------------------+
    ///        |               |
    ///   Token ID 10     Token ID 15
    ///        |               |
    ///  +-----------+         |
    ///  |  State 1  |--25--+  |
    ///  +-----------+      |  |
    ///        |         +-----------+
    ///   Token ID 20    |  State 2  |
    ///        |         +-----------+
    ///        |               |
    ///        |          Token ID 30
    ///  +----------------------------+
    ///  |   State 3 (final)          |
    ///  +----------------------------+
    /// ```
    ///
    /// Every state listed here can still reach a final state, states which can't are removed
    /// together with the transitions leading to them.
    transitions: HashMap<StateId, HashMap<TokenId, StateId>>,
    /// The token ID reserved for the "end-of-sequence" token.
    eos_token_id: TokenId,
    /// The size of the vocabulary used to build the index.
    vocab_size: usize,
}

/// The `Index` structure is designed to efficiently map tokens from a given vocabulary
/// to state transitions within a finite-state automaton.
///
/// ## Usage:
/// The `Index` is typically constructed by combining a vocabulary and regular expressions.
/// Once built, it can be used to efficiently evaluate token sequences or to validate input data.
///
/// ## Example:
/// ```rust
/// use guided_decoding::prelude::*;
///
/// # fn run() -> Result<(), guided_decoding::Error> {
/// let regex = "0|[1-9][0-9]*";
/// let mut vocabulary = Vocabulary::new(3);
/// for (token, token_id) in [("0", 0), ("1", 1), ("12", 2)] {
///     vocabulary.try_insert(token, token_id)?;
/// }
/// let index = Index::new(regex, &vocabulary)?;
///
/// let initial_state = index.initial_state();
/// assert!(!index.is_final_state(&initial_state));
///
/// let allowed_tokens = index.allowed_tokens(&initial_state).expect("Some allowed tokens");
/// assert_eq!(allowed_tokens, vec![0, 1, 2]);
///
/// let state = index.next_state(&initial_state, &2).expect("Token 12 is allowed");
/// assert!(index.is_final_state(&state));
/// assert!(index.allowed_tokens(&state).expect("Some allowed tokens").contains(&3));
/// # Ok(())
/// # }
/// # run().expect("Index example failed");
/// ```
///
/// ## Performance:
/// - **Complexity**:
///   The vocabulary is walked as a byte trie, so tokens sharing a prefix share the automaton
///   walk of that prefix. States are processed in parallel.
/// - **Construction Cost**:
///   Cost grows with the number of reachable automaton states times the part of the trie each
///   of them accepts, minimizing the automaton keeps it down.
impl Index {
    /// Builds an `Index` from regular expression and vocabulary tokens.
    pub fn new(regex: &str, vocabulary: &Vocabulary) -> Result<Self> {
        let dfa = Dfa::new(regex)?;
        Self::from_dfa(&dfa, vocabulary)
    }

    /// Builds an `Index` from an already compiled automaton.
    ///
    /// Fails with [`Error::IndexError`] when no sequence of vocabulary tokens spells a string
    /// of the automaton's language.
    pub fn from_dfa(dfa: &Dfa, vocabulary: &Vocabulary) -> Result<Self> {
        let started = Instant::now();
        let eos_token_id = vocabulary.eos_token_id();
        let trie = vocabulary.trie();

        // Breadth first over token transitions, one frontier at a time.
        let start = dfa.start_state();
        let mut reached: Vec<(StateId, Vec<(TokenId, StateId)>)> = vec![];
        let mut seen: HashSet<StateId> = HashSet::from_iter([start]);
        let mut frontier = vec![start];
        while !frontier.is_empty() {
            let walked: Vec<Vec<(TokenId, StateId)>> = frontier
                .par_iter()
                .map(|&state| Self::token_transitions(dfa, &trie, state))
                .collect();

            let mut next_frontier = vec![];
            for (state, edges) in frontier.into_iter().zip(walked) {
                for &(_, next) in &edges {
                    if seen.insert(next) {
                        next_frontier.push(next);
                    }
                }
                reached.push((state, edges));
            }
            frontier = next_frontier;
        }

        let live = Self::live_states(dfa, &reached);
        if !live.contains(&start) {
            return Err(Error::IndexError);
        }

        let mut transitions: HashMap<StateId, HashMap<TokenId, StateId>> = HashMap::default();
        let mut final_states: HashSet<StateId> = HashSet::default();
        for (state, edges) in &reached {
            if !live.contains(state) {
                continue;
            }
            let mut state_transitions: HashMap<TokenId, StateId> = edges
                .iter()
                .filter(|(_, next)| live.contains(next))
                .copied()
                .collect();
            if dfa.is_accepting(*state) {
                final_states.insert(*state);
                state_transitions.insert(eos_token_id, *state);
            }
            transitions.insert(*state, state_transitions);
        }

        debug!(
            "built index: {} of {} reached states kept, {} transitions, {:?}",
            transitions.len(),
            reached.len(),
            transitions.values().map(|t| t.len()).sum::<usize>(),
            started.elapsed()
        );

        Ok(Self {
            initial_state: start,
            final_states,
            transitions,
            eos_token_id,
            vocab_size: vocabulary.len(),
        })
    }

    /// Every token walkable from `state`, ordered by token id.
    fn token_transitions(dfa: &Dfa, trie: &TokenTrie, state: StateId) -> Vec<(TokenId, StateId)> {
        let mut edges = vec![];
        trie.walk(
            state,
            &|state, byte| dfa.next_state(state, byte),
            &mut |token_id, next| edges.push((token_id, next)),
        );
        edges.sort_unstable();
        edges
    }

    /// States from which a final state can be reached through token transitions.
    fn live_states(dfa: &Dfa, reached: &[(StateId, Vec<(TokenId, StateId)>)]) -> HashSet<StateId> {
        let mut reverse: HashMap<StateId, Vec<StateId>> = HashMap::default();
        for (state, edges) in reached {
            for &(_, next) in edges {
                reverse.entry(next).or_default().push(*state);
            }
        }

        let mut stack: Vec<StateId> = reached
            .iter()
            .map(|(state, _)| *state)
            .filter(|state| dfa.is_accepting(*state))
            .collect();
        let mut live: HashSet<StateId> = stack.iter().copied().collect();
        while let Some(state) = stack.pop() {
            for &prev in reverse.get(&state).into_iter().flatten() {
                if live.insert(prev) {
                    stack.push(prev);
                }
            }
        }

        if live.len() < reached.len() {
            debug!(
                "pruned {} states without a token path to a final state",
                reached.len() - live.len()
            );
        }
        live
    }

    /// Returns the ID of the initial state in the automaton.
    pub fn initial_state(&self) -> StateId {
        self.initial_state
    }

    /// Returns set of final states.
    pub fn final_states(&self) -> &HashSet<StateId> {
        &self.final_states
    }

    /// Returns state transitions map of tokens ids and their corresponding transition states.
    pub fn transitions(&self) -> &HashMap<StateId, HashMap<TokenId, StateId>> {
        &self.transitions
    }

    /// Checks if state is in final states set or not.
    pub fn is_final_state(&self, state: &StateId) -> bool {
        self.final_states.contains(state)
    }

    /// Lists allowed tokens for a give state ID, in ascending order, or `None` if it is not
    /// found in `Index`.
    pub fn allowed_tokens(&self, state: &StateId) -> Option<Vec<TokenId>> {
        self.transitions.get(state).map(|res| {
            let mut allowed: Vec<TokenId> = res.keys().cloned().collect();
            allowed.sort_unstable();
            allowed
        })
    }

    pub fn allowed_tokens_iter(&self, state: &StateId) -> Option<impl Iterator<Item = &TokenId>> {
        self.transitions.get(state).map(|map| map.keys())
    }

    /// Returns transition state for a given state and token id or `None` otherwise.
    pub fn next_state(&self, state: &StateId, token_id: &TokenId) -> Option<StateId> {
        if token_id == &self.eos_token_id {
            return None;
        }
        Some(*self.transitions.get(state)?.get(token_id)?)
    }

    /// Whether `token_id` may follow in `state`, EOS included.
    pub fn is_allowed(&self, state: &StateId, token_id: &TokenId) -> bool {
        self.transitions
            .get(state)
            .is_some_and(|map| map.contains_key(token_id))
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn eos_token_id(&self) -> TokenId {
        self.eos_token_id
    }

    /// Number of states kept in the index.
    pub fn num_states(&self) -> usize {
        self.transitions.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (index, _) = bincode::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(index)
    }
}

impl std::fmt::Display for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Index object with transitions:")?;
        let mut states: Vec<&StateId> = self.transitions.keys().collect();
        states.sort_unstable();
        for state_id in states {
            let mut token_ids: Vec<(&TokenId, &StateId)> = self.transitions[state_id].iter().collect();
            token_ids.sort_unstable();
            writeln!(f, "{:?} -> {:?}", state_id, token_ids)?;
        }
        Ok(())
    }
}
