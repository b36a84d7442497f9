//! Byte trie over the tokens of a [`Vocabulary`](super::Vocabulary).
//!
//! Walking the trie together with an automaton visits every shared token prefix once, instead of
//! once per token.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::primitives::TokenId;

/// Incremental byte matcher driven by [`TokenTrie::walk_recognizer`].
///
/// The recognizer keeps a stack of states, one per accepted byte.
pub trait Recognizer {
    /// Pushes the state reached through `byte`, returns `false` and leaves the stack untouched
    /// if the byte is not allowed.
    fn try_push_byte(&mut self, byte: u8) -> bool;
    /// Drops the `num` most recently pushed states.
    fn pop_bytes(&mut self, num: usize);
}

#[derive(Clone, Debug)]
struct TrieNode {
    byte: u8,
    /// Children are stored contiguously, ordered by byte.
    children: Range<u32>,
    /// Tokens whose bytes end at this node.
    tokens: Vec<TokenId>,
}

#[derive(Clone, Debug)]
pub struct TokenTrie {
    nodes: Vec<TrieNode>,
    num_tokens: usize,
}

#[derive(Default)]
struct PendingNode {
    children: BTreeMap<u8, usize>,
    tokens: Vec<TokenId>,
}

impl TokenTrie {
    /// Builds the trie from `(id, bytes)` pairs. Empty tokens can't be walked and are skipped.
    pub fn new<'a>(tokens: impl IntoIterator<Item = (TokenId, &'a [u8])>) -> Self {
        let mut pending = vec![PendingNode::default()];
        let mut num_tokens = 0;
        for (id, bytes) in tokens {
            if bytes.is_empty() {
                continue;
            }
            let mut node = 0;
            for &byte in bytes {
                node = match pending[node].children.get(&byte) {
                    Some(&child) => child,
                    None => {
                        pending.push(PendingNode::default());
                        let child = pending.len() - 1;
                        pending[node].children.insert(byte, child);
                        child
                    }
                };
            }
            pending[node].tokens.push(id);
            num_tokens += 1;
        }

        // Lay nodes out breadth first so siblings are contiguous.
        let mut order = vec![(0usize, 0u8)];
        let mut nodes = Vec::with_capacity(pending.len());
        let mut current = 0;
        while current < order.len() {
            let (old, byte) = order[current];
            let start = order.len() as u32;
            for (&child_byte, &child) in &pending[old].children {
                order.push((child, child_byte));
            }
            let mut tokens = std::mem::take(&mut pending[old].tokens);
            tokens.sort_unstable();
            nodes.push(TrieNode {
                byte,
                children: start..order.len() as u32,
                tokens,
            });
            current += 1;
        }

        Self { nodes, num_tokens }
    }

    /// Number of tokens stored in the trie.
    pub fn num_tokens(&self) -> usize {
        self.num_tokens
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Ids of the tokens spelled exactly by `bytes`, ascending.
    pub fn token_ids(&self, bytes: &[u8]) -> &[TokenId] {
        let mut node = 0usize;
        for &byte in bytes {
            match self.child_at_byte(node, byte) {
                Some(child) => node = child,
                None => return &[],
            }
        }
        &self.nodes[node].tokens
    }

    fn child_at_byte(&self, node: usize, byte: u8) -> Option<usize> {
        let children = &self.nodes[node].children;
        let siblings = &self.nodes[children.start as usize..children.end as usize];
        siblings
            .binary_search_by_key(&byte, |n| n.byte)
            .ok()
            .map(|i| children.start as usize + i)
    }

    /// Walks every token against a deterministic transition function.
    ///
    /// `visit` is called with each token id and the state reached after its last byte, for all
    /// tokens whose bytes never hit a failing transition from `start`. Subtrees below a failing
    /// transition are skipped.
    pub fn walk<S: Copy>(
        &self,
        start: S,
        next: &impl Fn(S, u8) -> Option<S>,
        visit: &mut impl FnMut(TokenId, S),
    ) {
        self.walk_node(0, start, next, visit)
    }

    fn walk_node<S: Copy>(
        &self,
        node: usize,
        state: S,
        next: &impl Fn(S, u8) -> Option<S>,
        visit: &mut impl FnMut(TokenId, S),
    ) {
        let children = self.nodes[node].children.clone();
        for child in children {
            let child = child as usize;
            if let Some(state) = next(state, self.nodes[child].byte) {
                for &token_id in &self.nodes[child].tokens {
                    visit(token_id, state);
                }
                self.walk_node(child, state, next, visit);
            }
        }
    }

    /// Same traversal as [`walk`](Self::walk), driving a stateful [`Recognizer`] instead.
    ///
    /// The recognizer's stack is left as it was found.
    pub fn walk_recognizer(&self, recognizer: &mut impl Recognizer, visit: &mut impl FnMut(TokenId)) {
        self.walk_recognizer_node(0, recognizer, visit)
    }

    fn walk_recognizer_node(
        &self,
        node: usize,
        recognizer: &mut impl Recognizer,
        visit: &mut impl FnMut(TokenId),
    ) {
        let children = self.nodes[node].children.clone();
        for child in children {
            let child = child as usize;
            if recognizer.try_push_byte(self.nodes[child].byte) {
                for &token_id in &self.nodes[child].tokens {
                    visit(token_id);
                }
                self.walk_recognizer_node(child, recognizer, visit);
                recognizer.pop_bytes(1);
            }
        }
    }
}
