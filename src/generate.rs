//! Guided generation loop around a token-level model.

use std::time::Instant;

use log::debug;

use crate::guide::TokenGuide;
use crate::primitives::TokenId;
use crate::vocabulary::Vocabulary;
use crate::{Error, Result};

/// A model choosing the next token among the allowed ones.
pub trait Model {
    /// Returns the chosen token and its log-probability.
    ///
    /// `allowed` is never empty and ascending, `generated` excludes the prompt.
    fn next_token(
        &mut self,
        prompt: &str,
        generated: &[TokenId],
        allowed: &[TokenId],
    ) -> Result<(TokenId, f32)>;
}

impl<F> Model for F
where
    F: FnMut(&str, &[TokenId], &[TokenId]) -> Result<(TokenId, f32)>,
{
    fn next_token(
        &mut self,
        prompt: &str,
        generated: &[TokenId],
        allowed: &[TokenId],
    ) -> Result<(TokenId, f32)> {
        self(prompt, generated, allowed)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
    /// Generated tokens, EOS excluded.
    pub token_ids: Vec<TokenId>,
    pub text: Vec<u8>,
    /// Sum of the log-probabilities of the chosen tokens.
    pub score: f32,
    /// Generation ended with EOS rather than by running out of tokens.
    pub finished: bool,
}

impl Generation {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }
}

/// Generates at most `max_tokens` tokens, EOS included, following `guide`.
///
/// A choice outside of the allowed tokens fails with [`Error::IllegalToken`]. A guide left with
/// no allowed token fails with [`Error::IndexError`].
pub fn generate<M, G>(
    model: &mut M,
    guide: &mut G,
    vocabulary: &Vocabulary,
    prompt: &str,
    max_tokens: usize,
) -> Result<Generation>
where
    M: Model + ?Sized,
    G: TokenGuide + ?Sized,
{
    let started = Instant::now();
    let eos_token_id = vocabulary.eos_token_id();
    let mut token_ids = vec![];
    let mut score = 0.0;
    let mut finished = false;

    for _ in 0..max_tokens {
        let allowed = guide.allowed_tokens();
        if allowed.is_empty() {
            return Err(Error::IndexError);
        }
        let (token_id, logprob) = model.next_token(prompt, &token_ids, &allowed)?;
        guide.advance(token_id)?;
        score += logprob;
        if token_id == eos_token_id {
            finished = true;
            break;
        }
        token_ids.push(token_id);
    }

    debug!(
        "generated {} tokens in {:?}, finished: {}",
        token_ids.len(),
        started.elapsed(),
        finished
    );
    Ok(Generation {
        text: vocabulary.decode(&token_ids),
        token_ids,
        score,
        finished,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cfg::CfgGuide;
    use crate::grammar::{GrammarBuilder, TypeDescription};
    use crate::guide::Guide;
    use crate::index::Index;

    fn vocabulary() -> Vocabulary {
        let mut vocabulary = Vocabulary::new(5);
        for (token, token_id) in [("1", 0), ("2", 1), ("-", 2), ("12", 3), ("a", 4)] {
            vocabulary
                .try_insert(token, token_id)
                .expect("Insert failed");
        }
        vocabulary
    }

    /// Always picks the largest allowed id.
    fn greedy(_: &str, _: &[TokenId], allowed: &[TokenId]) -> Result<(TokenId, f32)> {
        allowed
            .last()
            .map(|token_id| (*token_id, -0.5))
            .ok_or_else(|| Error::Model("nothing to choose from".into()))
    }

    struct Scripted(Vec<TokenId>);

    impl Model for Scripted {
        fn next_token(
            &mut self,
            _: &str,
            generated: &[TokenId],
            _: &[TokenId],
        ) -> Result<(TokenId, f32)> {
            self.0
                .get(generated.len())
                .map(|token_id| (*token_id, -1.0))
                .ok_or_else(|| Error::Model("script exhausted".into()))
        }
    }

    fn integer_guide(vocabulary: &Vocabulary) -> Guide {
        let grammar = GrammarBuilder::new()
            .grammar(&TypeDescription::Integer)
            .expect("Grammar failed");
        let index = Index::new(grammar.source(), vocabulary).expect("Index failed");
        Guide::new(Arc::new(index))
    }

    #[test]
    fn scripted_generation() {
        let vocabulary = vocabulary();
        let mut guide = integer_guide(&vocabulary);
        let mut model = Scripted(vec![2, 3, 1, 5]);

        let generation =
            generate(&mut model, &mut guide, &vocabulary, "a number", 10).expect("Generation failed");
        assert_eq!(generation.token_ids, vec![2, 3, 1]);
        assert_eq!(generation.text, b"-122".to_vec());
        assert_eq!(generation.text_lossy(), "-122");
        assert_eq!(generation.score, -4.0);
        assert!(generation.finished);
    }

    #[test]
    fn budget_stops_generation() {
        let vocabulary = vocabulary();
        let mut guide = integer_guide(&vocabulary);
        // EOS has the largest id, so greedy picks it as soon as it's allowed.
        let mut model = greedy;

        let generation =
            generate(&mut model, &mut guide, &vocabulary, "", 1).expect("Generation failed");
        assert_eq!(generation.token_ids, vec![3]);
        assert!(!generation.finished);

        let generation =
            generate(&mut model, &mut guide, &vocabulary, "", 1).expect("Generation failed");
        assert!(generation.token_ids.is_empty());
        assert!(generation.finished);
    }

    #[test]
    fn illegal_choices_surface() {
        let vocabulary = vocabulary();
        let mut guide = integer_guide(&vocabulary);
        let mut model = Scripted(vec![4]);
        assert!(matches!(
            generate(&mut model, &mut guide, &vocabulary, "", 10),
            Err(Error::IllegalToken { token_id: 4, .. })
        ));

        let mut failing = |_: &str, _: &[TokenId], _: &[TokenId]| -> Result<(TokenId, f32)> {
            Err(Error::Model("out of memory".into()))
        };
        assert!(matches!(
            generate(&mut failing, &mut guide, &vocabulary, "", 10),
            Err(Error::Model(_))
        ));
    }

    #[test]
    fn cfg_generation() {
        let vocabulary = Arc::new(vocabulary());
        let mut guide = CfgGuide::new(r#"start: "a" ("-" start)?"#, vocabulary.clone())
            .expect("Guide failed");
        let mut model = Scripted(vec![4, 2, 4, 5]);

        let generation = generate(
            &mut model,
            &mut guide as &mut dyn TokenGuide,
            &vocabulary,
            "",
            10,
        )
        .expect("Generation failed");
        assert_eq!(generation.text_lossy(), "a-a");
        assert!(generation.finished);
    }
}
