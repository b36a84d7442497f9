//! Guided decoding for context-free grammars.
//!
//! Context-free grammars can't be compiled into a finite automaton, so instead of a precomputed
//! [`Index`](crate::index::Index) the allowed tokens are found at every step by walking the
//! vocabulary trie with an Earley recognizer: each trie edge pushes one parser row and
//! backtracking pops it.

use std::sync::Arc;

use log::{debug, warn};

use crate::guide::TokenGuide;
use crate::primitives::{StateId, TokenId};
use crate::vocabulary::{TokenTrie, Vocabulary};
use crate::{Error, Result};

mod byteset;
mod grammar;
pub mod lark;
mod parser;

pub use byteset::ByteSet;
pub use grammar::{CompiledGrammar, Grammar, SymIdx};
pub use parser::Parser;

/// Token guide driven by a context-free grammar.
///
/// ```rust
/// use std::sync::Arc;
/// use guided_decoding::prelude::*;
///
/// # fn run() -> Result<(), guided_decoding::Error> {
/// let mut vocabulary = Vocabulary::new(3);
/// for (token, token_id) in [("(", 0), (")", 1), ("()", 2)] {
///     vocabulary.try_insert(token, token_id)?;
/// }
///
/// let grammar = r#"start: ("(" start ")")*"#;
/// let mut guide = CfgGuide::new(grammar, Arc::new(vocabulary))?;
/// guide.advance(0)?;
/// guide.advance(2)?;
/// assert!(!guide.is_finished());
/// assert_eq!(guide.allowed_tokens(), vec![0, 1, 2]);
/// guide.advance(1)?;
/// assert!(guide.is_finished());
/// # Ok(())
/// # }
/// # run().expect("CfgGuide example failed");
/// ```
#[derive(Clone)]
pub struct CfgGuide {
    vocabulary: Arc<Vocabulary>,
    trie: Arc<TokenTrie>,
    parser: Parser,
    /// Allowed tokens at the current position, ascending.
    allowed: Vec<TokenId>,
    eos_consumed: bool,
}

impl CfgGuide {
    /// Reads a grammar in the Lark syntax, see [`lark`].
    pub fn new(source: &str, vocabulary: Arc<Vocabulary>) -> Result<Self> {
        let grammar = lark::parse(source)?;
        Self::from_grammar(&grammar, vocabulary)
    }

    /// Fails with [`Error::IndexError`] if no token is allowed at the start.
    pub fn from_grammar(grammar: &Grammar, vocabulary: Arc<Vocabulary>) -> Result<Self> {
        debug!("cfg guide for grammar:\n{grammar:?}");
        let trie = Arc::new(vocabulary.trie());
        let parser = Parser::new(Arc::new(grammar.compile()));
        let mut guide = Self {
            vocabulary,
            trie,
            parser,
            allowed: vec![],
            eos_consumed: false,
        };
        guide.compute_allowed();
        if guide.allowed.is_empty() {
            return Err(Error::IndexError);
        }
        Ok(guide)
    }

    fn compute_allowed(&mut self) {
        let mut allowed = vec![];
        self.trie
            .walk_recognizer(&mut self.parser, &mut |token_id| allowed.push(token_id));
        if self.parser.is_accepting() {
            allowed.push(self.vocabulary.eos_token_id());
        }
        allowed.sort_unstable();
        allowed.dedup();
        self.allowed = allowed;
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.parser.num_bytes()
    }

    pub fn allowed_tokens(&self) -> &[TokenId] {
        &self.allowed
    }

    pub fn advance(&mut self, token_id: TokenId) -> Result<()> {
        let eos_token_id = self.vocabulary.eos_token_id();
        let illegal = Error::IllegalToken {
            state: self.position() as StateId,
            token_id,
        };
        if token_id == eos_token_id && (self.eos_consumed || self.parser.is_accepting()) {
            self.eos_consumed = true;
            self.allowed = vec![eos_token_id];
            return Ok(());
        }
        if self.eos_consumed || self.allowed.binary_search(&token_id).is_err() {
            return Err(illegal);
        }
        let Some(bytes) = self.vocabulary.token(token_id) else {
            return Err(illegal);
        };
        if !self.parser.try_push_bytes(bytes) {
            return Err(illegal);
        }

        self.compute_allowed();
        if self.allowed.is_empty() {
            warn!(
                "no token can follow after {} bytes, the vocabulary can't complete the grammar here",
                self.position()
            );
        }
        Ok(())
    }

    /// The input is a complete sentence, or EOS was consumed.
    pub fn is_finished(&self) -> bool {
        self.eos_consumed || self.parser.is_accepting()
    }

    pub fn reset(&mut self) {
        self.parser.pop_rows(self.parser.num_bytes());
        self.eos_consumed = false;
        self.compute_allowed();
    }
}

impl TokenGuide for CfgGuide {
    fn allowed_tokens(&self) -> Vec<TokenId> {
        self.allowed.clone()
    }

    fn advance(&mut self, token_id: TokenId) -> Result<()> {
        CfgGuide::advance(self, token_id)
    }

    fn is_finished(&self) -> bool {
        CfgGuide::is_finished(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocabulary(eos_token_id: TokenId, tokens: &[(&str, TokenId)]) -> Arc<Vocabulary> {
        let mut vocabulary = Vocabulary::new(eos_token_id);
        for (token, token_id) in tokens {
            vocabulary
                .try_insert(*token, *token_id)
                .expect("Insert failed");
        }
        Arc::new(vocabulary)
    }

    const ARITHMETIC: &str = r#"
        start: expr
        expr: term (("+" | "-") term)*
        term: factor ("*" factor)*
        factor: INT | "(" expr ")"
        %import common.INT
    "#;

    #[test]
    fn arithmetic_expressions() {
        let vocabulary = vocabulary(
            8,
            &[("1", 0), ("2", 1), ("+", 2), ("*", 3), ("(", 4), (")", 5), ("1+", 6), ("x", 7)],
        );
        let mut guide = CfgGuide::new(ARITHMETIC, vocabulary).expect("Guide failed");
        assert_eq!(guide.allowed_tokens(), &[0, 1, 4, 6]);

        // (1+2)*12
        for token_id in [4, 6, 1, 5, 3, 0, 1] {
            guide.advance(token_id).expect("Token allowed");
        }
        assert!(guide.is_finished());
        assert_eq!(guide.allowed_tokens(), &[0, 1, 2, 3, 6, 8]);
        assert_eq!(guide.position(), 8);
        guide.advance(8).expect("EOS allowed");
        assert_eq!(guide.allowed_tokens(), &[8]);
    }

    #[test]
    fn nesting_is_tracked() {
        let vocabulary = vocabulary(3, &[("(", 0), (")", 1), ("()", 2)]);
        let mut guide =
            CfgGuide::new(r#"start: "(" start ")" | "()""#, vocabulary).expect("Guide failed");

        for _ in 0..3 {
            guide.advance(0).expect("Open allowed");
        }
        guide.advance(2).expect("Pair allowed");
        for remaining in (0..3).rev() {
            assert!(!guide.is_finished());
            assert_eq!(guide.allowed_tokens(), &[1]);
            guide.advance(1).expect("Close allowed");
            assert_eq!(guide.is_finished(), remaining == 0);
        }
        assert_eq!(guide.allowed_tokens(), &[3]);
    }

    #[test]
    fn illegal_tokens_keep_position() {
        let vocabulary = vocabulary(2, &[("a", 0), ("b", 1)]);
        let mut guide = CfgGuide::new(r#"start: "a" "b""#, vocabulary).expect("Guide failed");

        for token_id in [1, 2, 17] {
            match guide.advance(token_id) {
                Err(Error::IllegalToken { state: 0, token_id: id }) => assert_eq!(id, token_id),
                other => unreachable!("{other:?}"),
            }
        }
        guide.advance(0).expect("a allowed");
        assert!(matches!(
            guide.advance(0),
            Err(Error::IllegalToken { state: 1, .. })
        ));
        assert_eq!(guide.position(), 1);

        guide.reset();
        assert_eq!(guide.position(), 0);
        assert_eq!(guide.allowed_tokens(), &[0]);
    }

    #[test]
    fn unsatisfiable_start() {
        let vocabulary = vocabulary(1, &[("a", 0)]);
        match CfgGuide::new(r#"start: "b""#, vocabulary) {
            Err(e) => assert!(e.is_unsatisfiable()),
            Ok(_) => unreachable!("nothing spells b"),
        }
    }

    #[test]
    fn works_through_the_trait() {
        let vocabulary = vocabulary(2, &[("a", 0), ("b", 1)]);
        let mut guide: Box<dyn TokenGuide> = Box::new(
            CfgGuide::new(r#"start: "a"+ "b"?"#, vocabulary).expect("Guide failed"),
        );
        guide.advance(0).expect("a allowed");
        guide.advance(0).expect("a allowed");
        let mut mask = vec![false; 3];
        guide.write_mask_into(&mut mask);
        assert_eq!(mask, vec![true, true, true]);
        guide.advance(1).expect("b allowed");
        assert_eq!(guide.allowed_tokens(), vec![2]);
    }
}
