//! Creates `Vocabulary` manually or from pretrained large language model.

use bincode::{Decode, Encode};
#[cfg(feature = "huggingface-hub")]
use locator::{HFLocator, Locator};
#[cfg(feature = "huggingface-hub")]
use processor::TokenProcessor;
use rustc_hash::FxHashMap as HashMap;
#[cfg(feature = "huggingface-hub")]
use tokenizers::normalizers::Sequence;
#[cfg(feature = "huggingface-hub")]
use tokenizers::{FromPretrainedParameters, NormalizerWrapper, Tokenizer};

use crate::prelude::*;
use crate::{Error, Result};

#[cfg(feature = "huggingface-hub")]
mod locator;
#[cfg(feature = "huggingface-hub")]
mod processor;
pub mod trie;

pub use trie::{Recognizer, TokenTrie};

/// `Vocabulary` of large language model.
///
/// ## Examples
///
/// ### Create an empty vocabulary and manually insert some tokens.
/// ```rust
/// use guided_decoding::prelude::*;
///
/// let eos_token_id = 1;
/// let mut vocabulary = Vocabulary::new(eos_token_id);
///
/// vocabulary.try_insert("token", 0).expect("New token inserted");
/// assert_eq!(vocabulary.token_ids("token"), Some(&vec![0]));
/// assert_eq!(vocabulary.token(0), Some(&b"token".to_vec()));
/// assert_eq!(vocabulary.tokens().len(), 1);
/// assert_eq!(vocabulary.eos_token_id(), eos_token_id);
///
/// vocabulary.remove("token");
/// assert_eq!(vocabulary.token_ids("token"), None);
/// ```
#[cfg_attr(
    feature = "huggingface-hub",
    doc = r##"
### Create a vocabulary from a pretrained model.
```rust,no_run
use guided_decoding::prelude::*;

let vocabulary = Vocabulary::from_pretrained("openai-community/gpt2", None);
```
"##
)]
#[derive(Clone, Debug, Default, PartialEq, Encode, Decode)]
pub struct Vocabulary {
    eos_token_id: TokenId,
    tokens: HashMap<Token, Vec<TokenId>>,
    /// Reverse of `tokens`.
    ids: HashMap<TokenId, Token>,
}

impl Vocabulary {
    /// Creates an empty vocabulary.
    pub fn new(eos_token_id: TokenId) -> Self {
        Self {
            eos_token_id,
            tokens: HashMap::default(),
            ids: HashMap::default(),
        }
    }

    /// Creates the vocabulary of pre-trained model from Hugging Face Hub.
    #[cfg(feature = "huggingface-hub")]
    pub fn from_pretrained(
        model: &str,
        parameters: Option<FromPretrainedParameters>,
    ) -> Result<Self> {
        Self::from_pretrained_with_locator::<HFLocator>(model, parameters)
    }

    #[doc(hidden)]
    #[inline(always)]
    #[cfg(feature = "huggingface-hub")]
    fn from_pretrained_with_locator<L: Locator>(
        model: &str,
        parameters: Option<FromPretrainedParameters>,
    ) -> Result<Self> {
        let mut tokenizer = Tokenizer::from_pretrained(model, parameters.clone())
            .map_err(|e| Error::TokenizersError(crate::error::TokenizersError(e)))?;
        Self::filter_prepend_normalizers(&mut tokenizer);

        // Locate eos_token_id in defined locations.
        let eos_token_id = L::locate_eos_token_id(model, &tokenizer, &parameters);
        let Some(eos_token_id) = eos_token_id else {
            return Err(Error::UnsupportedTokenizer {
                model: model.to_string(),
                reason: "EOS token id".to_string(),
            });
        };

        // Start building the vocabulary from eos_token_id and added tokens.
        let mut vocabulary = Vocabulary::new(eos_token_id);
        for (id, added_token) in tokenizer.get_added_tokens_decoder().iter() {
            if !added_token.special && id != &eos_token_id {
                vocabulary.try_insert(added_token.content.clone(), *id)?
            }
        }

        // Process each vocabulary token according to the tokenizer's level.
        let Ok(processor) = TokenProcessor::new(&tokenizer) else {
            return Err(Error::UnsupportedTokenizer {
                model: model.to_string(),
                reason: "Token processor".to_string(),
            });
        };
        for (token, token_id) in tokenizer.get_vocab(false) {
            if token_id != eos_token_id && vocabulary.token(token_id).is_none() {
                let processed_token = processor.process(&token)?;
                vocabulary.try_insert(processed_token, token_id)?;
            }
        }

        Ok(vocabulary)
    }

    /// Returns all tokens with their token ids in vocabulary.
    pub fn tokens(&self) -> &HashMap<Token, Vec<TokenId>> {
        &self.tokens
    }

    /// Returns all token ids per provided token if available in the vocabulary.
    pub fn token_ids(&self, token: impl AsRef<[u8]>) -> Option<&Vec<TokenId>> {
        self.tokens.get(token.as_ref())
    }

    /// Returns the bytes of a token id, `None` for unknown ids and for the EOS token.
    pub fn token(&self, id: TokenId) -> Option<&Token> {
        self.ids.get(&id)
    }

    /// Gets the identifier of the special end of the sentence token.
    pub fn eos_token_id(&self) -> TokenId {
        self.eos_token_id
    }

    /// Inserts a token to the vocabulary with the specified identifier.
    pub fn try_insert(&mut self, token: impl Into<Token>, id: TokenId) -> Result<(), Error> {
        if id == self.eos_token_id {
            return Err(Error::EOSTokenDisallowed);
        }
        if self.ids.contains_key(&id) {
            return Err(Error::DuplicateTokenId(id));
        }
        let token = token.into();
        self.ids.insert(id, token.clone());
        self.tokens.entry(token).or_default().push(id);
        Ok(())
    }

    /// Removes a given token from the vocabulary.
    pub fn remove(&mut self, token: impl Into<Token>) {
        let token = token.into();
        if let Some(ids) = self.tokens.remove(&token) {
            for id in ids {
                self.ids.remove(&id);
            }
        }
    }

    pub fn len(&self) -> usize {
        // +1 for eos_token_id which is not in self.tokens map.
        self.ids.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Concatenates the bytes of `token_ids`. The EOS token and unknown ids contribute nothing.
    pub fn decode(&self, token_ids: &[TokenId]) -> Vec<u8> {
        token_ids
            .iter()
            .filter_map(|id| self.ids.get(id))
            .flatten()
            .copied()
            .collect()
    }

    /// `(id, bytes)` pairs ordered by id.
    pub fn sorted_tokens(&self) -> Vec<(TokenId, &Token)> {
        let mut sorted: Vec<(TokenId, &Token)> =
            self.ids.iter().map(|(id, token)| (*id, token)).collect();
        sorted.sort_unstable_by_key(|(id, _)| *id);
        sorted
    }

    /// Content signature, the vocabulary half of a cache key.
    ///
    /// Only the id to bytes table and the EOS id contribute, so two vocabularies built in a
    /// different insertion order have the same signature.
    pub fn signature(&self) -> Signature {
        let eos = self.eos_token_id.to_le_bytes();
        let sorted = self.sorted_tokens();
        let ids: Vec<[u8; 4]> = sorted.iter().map(|(id, _)| id.to_le_bytes()).collect();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(2 * sorted.len() + 1);
        parts.push(eos.as_slice());
        for ((_, token), id) in sorted.iter().zip(&ids) {
            parts.push(id.as_slice());
            parts.push(token.as_slice());
        }
        Signature::from_parts(parts)
    }

    /// Builds the byte trie of every token but EOS.
    pub fn trie(&self) -> TokenTrie {
        TokenTrie::new(self.ids.iter().map(|(id, token)| (*id, token.as_slice())))
    }

    /// Filters out `Prepend` kind of tokenizer's normalizers.
    #[cfg(feature = "huggingface-hub")]
    fn filter_prepend_normalizers(tokenizer: &mut Tokenizer) {
        // Main concern is prepend normalizers, for example https://github.com/google/sentencepiece
        // In `sentencepiece` tokenizer, `▁` is used to denote spaces in the source text,
        // e.g. `Hello World.` could be tokenized as: [Hello] [▁Wor] [ld] [.]
        //
        // We don't want to deal with the special characters, so we remove `Prepend` normalizers.
        if let Some(normalizer) = tokenizer.get_normalizer() {
            match normalizer {
                NormalizerWrapper::Sequence(normalization_sequence) => {
                    let new_sequence = Sequence::new(
                        normalization_sequence
                            .get_normalizers()
                            .iter()
                            .filter_map(|normalizer| match normalizer {
                                NormalizerWrapper::Prepend(_) => None,
                                _ => Some(normalizer.clone()),
                            })
                            .collect(),
                    );
                    tokenizer.with_normalizer(Some(new_sequence));
                }
                NormalizerWrapper::Prepend(_) => {
                    tokenizer.with_normalizer(None::<NormalizerWrapper>);
                }
                _ => {}
            }
        }
    }
}

impl std::fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Vocabulary object with eos_token_id={:?} and the following token_ids to tokens:",
            self.eos_token_id
        )?;
        for (token_id, token) in self.sorted_tokens() {
            writeln!(
                f,
                "{:?} -> {:?}",
                token_id,
                token
                    .iter()
                    .map(|b| format!("0x{:02X}", b))
                    .collect::<Vec<_>>()
            )?;
        }
        Ok(())
    }
}

impl TryFrom<(TokenId, HashMap<Token, Vec<TokenId>>)> for Vocabulary {
    type Error = Error;

    fn try_from(values: (TokenId, HashMap<Token, Vec<TokenId>>)) -> Result<Self, Self::Error> {
        let (eos_token_id, tokens) = values;
        let mut vocabulary = Vocabulary::new(eos_token_id);
        for (token, ids) in tokens {
            for id in ids {
                vocabulary.try_insert(token.clone(), id)?;
            }
        }
        Ok(vocabulary)
    }
}

impl TryFrom<(TokenId, HashMap<String, Vec<TokenId>>)> for Vocabulary {
    type Error = Error;

    fn try_from(values: (TokenId, HashMap<String, Vec<TokenId>>)) -> Result<Self, Self::Error> {
        let (eos_token_id, tokens) = values;
        let tokens = tokens
            .into_iter()
            .map(|(token, ids)| (token.into_bytes(), ids))
            .collect::<HashMap<Token, Vec<TokenId>>>();
        Vocabulary::try_from((eos_token_id, tokens))
    }
}
