//! Per-request decoding state on top of a shared, immutable [`Index`].

use std::sync::Arc;

use log::trace;

use crate::index::Index;
use crate::primitives::{StateId, TokenId};
use crate::{Error, Result};

/// Something that tells which tokens may come next and follows the chosen ones.
pub trait TokenGuide {
    /// Tokens allowed in the current state, ascending.
    fn allowed_tokens(&self) -> Vec<TokenId>;

    /// Consumes `token_id`, failing with [`Error::IllegalToken`] if it isn't allowed.
    fn advance(&mut self, token_id: TokenId) -> Result<()>;

    /// Whether generation may stop here.
    fn is_finished(&self) -> bool;

    /// Sets `mask[id]` for every allowed token and clears the rest.
    ///
    /// Ids beyond the end of `mask` are ignored.
    fn write_mask_into(&self, mask: &mut [bool]) {
        mask.fill(false);
        for token_id in self.allowed_tokens() {
            if let Some(allowed) = mask.get_mut(token_id as usize) {
                *allowed = true;
            }
        }
    }
}

/// Walks an [`Index`] one token at a time.
///
/// Any number of guides can share the same index.
///
/// ```rust
/// use std::sync::Arc;
/// use guided_decoding::prelude::*;
///
/// # fn run() -> Result<(), guided_decoding::Error> {
/// let mut vocabulary = Vocabulary::new(2);
/// vocabulary.try_insert("a", 0)?;
/// vocabulary.try_insert("b", 1)?;
///
/// let index = Arc::new(Index::new("ab", &vocabulary)?);
/// let mut guide = Guide::new(index);
/// assert_eq!(guide.allowed_tokens(), vec![0]);
///
/// guide.advance(0)?;
/// assert!(guide.advance(0).is_err());
/// guide.advance(1)?;
/// assert!(guide.is_finished());
/// assert_eq!(guide.allowed_tokens(), vec![2]);
/// # Ok(())
/// # }
/// # run().expect("Guide example failed");
/// ```
#[derive(Clone, Debug)]
pub struct Guide {
    index: Arc<Index>,
    state: StateId,
    eos_consumed: bool,
}

impl Guide {
    pub fn new(index: Arc<Index>) -> Self {
        let state = index.initial_state();
        Self {
            index,
            state,
            eos_consumed: false,
        }
    }

    pub fn index(&self) -> &Arc<Index> {
        &self.index
    }

    /// Current state of the underlying index.
    pub fn state(&self) -> StateId {
        self.state
    }

    pub fn allowed_tokens(&self) -> Vec<TokenId> {
        if self.eos_consumed {
            return vec![self.index.eos_token_id()];
        }
        self.index.allowed_tokens(&self.state).unwrap_or_default()
    }

    /// Moves to the state reached by `token_id` and returns it.
    ///
    /// An illegal token leaves the guide where it was.
    pub fn advance(&mut self, token_id: TokenId) -> Result<StateId> {
        let eos_token_id = self.index.eos_token_id();
        if token_id == eos_token_id && (self.eos_consumed || self.index.is_final_state(&self.state)) {
            self.eos_consumed = true;
            return Ok(self.state);
        }
        if self.eos_consumed {
            return Err(Error::IllegalToken {
                state: self.state,
                token_id,
            });
        }
        match self.index.next_state(&self.state, &token_id) {
            Some(next) => {
                trace!("guide {} -[{}]-> {}", self.state, token_id, next);
                self.state = next;
                Ok(next)
            }
            None => Err(Error::IllegalToken {
                state: self.state,
                token_id,
            }),
        }
    }

    /// The current state is final, or EOS was consumed.
    pub fn is_finished(&self) -> bool {
        self.eos_consumed || self.index.is_final_state(&self.state)
    }

    pub fn reset(&mut self) {
        self.state = self.index.initial_state();
        self.eos_consumed = false;
    }
}

impl TokenGuide for Guide {
    fn allowed_tokens(&self) -> Vec<TokenId> {
        Guide::allowed_tokens(self)
    }

    fn advance(&mut self, token_id: TokenId) -> Result<()> {
        Guide::advance(self, token_id).map(|_| ())
    }

    fn is_finished(&self) -> bool {
        Guide::is_finished(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarBuilder, TypeDescription};
    use crate::prelude::*;

    fn vocabulary(eos_token_id: TokenId, tokens: &[(&str, TokenId)]) -> Vocabulary {
        let mut vocabulary = Vocabulary::new(eos_token_id);
        for (token, token_id) in tokens {
            vocabulary
                .try_insert(*token, *token_id)
                .expect("Insert failed");
        }
        vocabulary
    }

    fn guide(regex: &str, vocabulary: &Vocabulary) -> Guide {
        Guide::new(Arc::new(Index::new(regex, vocabulary).expect("Index failed")))
    }

    #[test]
    fn choice_guide() {
        let vocabulary = vocabulary(3, &[("a", 0), ("b", 1), ("c", 2)]);
        let grammar = GrammarBuilder::new()
            .grammar(&TypeDescription::Choice(vec!["a".into(), "b".into()]))
            .expect("Grammar failed");
        let mut guide = guide(grammar.source(), &vocabulary);

        assert!(!guide.is_finished());
        assert_eq!(guide.allowed_tokens(), vec![0, 1]);
        guide.advance(1).expect("b is allowed");
        assert!(guide.is_finished());
        assert_eq!(guide.allowed_tokens(), vec![3]);
        guide.advance(3).expect("EOS is allowed");
        assert!(guide.is_finished());
        assert_eq!(guide.allowed_tokens(), vec![3]);
        guide.advance(3).expect("EOS keeps being allowed");
    }

    #[test]
    fn illegal_tokens_never_advance() {
        let vocabulary = vocabulary(3, &[("0", 0), ("1", 1), ("-", 2)]);
        let mut guide = guide(r"-?(0|1[01]*)", &vocabulary);

        let initial = guide.state();
        for token_id in [3, 42] {
            match guide.advance(token_id) {
                Err(Error::IllegalToken { state, token_id: id }) => {
                    assert_eq!(state, initial);
                    assert_eq!(id, token_id);
                }
                other => unreachable!("{other:?}"),
            }
            assert_eq!(guide.state(), initial);
        }

        guide.advance(2).expect("Minus allowed");
        let minus = guide.state();
        assert!(guide.advance(2).is_err());
        assert_eq!(guide.state(), minus);
        assert!(!guide.is_finished());

        guide.advance(1).expect("One allowed");
        guide.advance(3).expect("EOS allowed");
        assert!(matches!(
            guide.advance(0),
            Err(Error::IllegalToken { token_id: 0, .. })
        ));
    }

    #[test]
    fn guides_share_an_index() {
        let vocabulary = vocabulary(2, &[("x", 0), ("y", 1)]);
        let index = Arc::new(Index::new("x+y", &vocabulary).expect("Index failed"));
        let mut first = Guide::new(index.clone());
        let second = Guide::new(index.clone());

        first.advance(0).expect("x allowed");
        first.advance(0).expect("x allowed");
        assert_ne!(first.state(), second.state());
        assert_eq!(second.allowed_tokens(), vec![0]);
        assert_eq!(first.allowed_tokens(), vec![0, 1]);
        assert_eq!(Arc::strong_count(&index), 3);

        first.reset();
        assert_eq!(first.state(), second.state());
    }

    #[test]
    fn mask_matches_allowed_tokens() {
        let vocabulary = vocabulary(4, &[("a", 0), ("b", 1), ("c", 2), ("ab", 3)]);
        let guide = guide("ab?", &vocabulary);

        let mut mask = vec![true; 6];
        guide.write_mask_into(&mut mask);
        assert_eq!(mask, vec![true, false, false, true, false, false]);

        let mut short = vec![false; 1];
        guide.write_mask_into(&mut short);
        assert_eq!(short, vec![true]);
    }

    #[test]
    fn sequences_of_tokens_spell_matches() {
        let vocabulary = vocabulary(
            6,
            &[("1", 0), ("2", 1), ("12", 2), ("-", 3), ("1-", 4), ("x", 5)],
        );
        let regex = r"[12]{2}(-[12]+)?";
        let dfa = crate::dfa::Dfa::new(regex).expect("Dfa failed");
        let mut guide = guide(regex, &vocabulary);

        for tokens in [
            vec![0, 1],
            vec![2],
            vec![2, 3, 0],
            vec![0, 4, 1, 1],
            vec![1, 1, 3, 2],
        ] {
            guide.reset();
            let mut text = vec![];
            for token_id in &tokens {
                guide.advance(*token_id).expect("Token allowed");
                text.extend(vocabulary.token(*token_id).expect("Known token"));
            }
            assert!(guide.is_finished(), "{tokens:?}");
            assert!(dfa.accepts(&text));
            guide.advance(6).expect("EOS allowed");
        }

        guide.reset();
        guide.advance(2).expect("12 allowed");
        guide.advance(3).expect("Dash allowed");
        assert!(!guide.is_finished());
        assert!(guide.advance(6).is_err());
    }
}
