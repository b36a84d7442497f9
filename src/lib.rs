//! # Guided_decoding
//!
//! `guided_decoding` crate constrains the tokens an autoregressive model may produce, so that the
//! finished text is guaranteed to match a regular expression, a JSON schema, a set of choices or
//! a context-free grammar. It provides a convenient way to:
//!
//! - describe the expected output with a [`grammar::TypeDescription`] and lower it to a grammar
//!
//! - compile regular grammars into a [`dfa::Dfa`] and combine it with a
//!   [`vocabulary::Vocabulary`] into an [`index::Index`], mapping every automaton state to the
//!   tokens allowed there
//!
//! - walk an index or a context-free grammar token by token with a [`guide::TokenGuide`]
//!
//! ## `json_schema`
//!
//! [`json_schema`] module provides interfaces to generate a regular expression based on a given JSON schema, depending on its type:
//! - [`json_schema::regex_from_str`]
//! - [`json_schema::regex_from_value`]
//!
//! Whitespace pattern could be customized, otherwise the default [`json_schema::WHITESPACE`] pattern is used.
//! Schemas are validated before any regex is produced, recursive schemas are rejected.
//!
//! ## `Index`
//!
//! Once [`index::Index`] is built, it can be used to evaluate or validate token sequences. Every
//! state it exposes has at least one allowed token: a vocabulary unable to spell any sentence of
//! the grammar is reported when the index is built, not in the middle of a generation.
//!
//! ### Complexity and construction cost
//!
//! `Index` can accommodate large vocabularies and complex regular expressions. However, its size **may** grow
//! significantly with the complexity of the input, as well as time and computational resources.
//! The [`cache`] module keeps built indexes around, keyed by grammar and vocabulary.
//!
//! ## Context-free grammars
//!
//! Grammars which aren't regular are handled by [`cfg::CfgGuide`], which runs an Earley parser
//! over the vocabulary trie at every step instead of precomputing an index.
//!
//! ## Example
//!
//! Basic example of how it all fits together.
//!
//! ```rust
//! # use guided_decoding::Error;
//! use std::sync::Arc;
//! use guided_decoding::prelude::*;
//!
//! # fn main() -> Result<(), Error> {
//! // Define a JSON schema
//! let schema = r#"{
//!     "type": "object",
//!     "properties": {
//!         "name": { "type": "string" },
//!         "age": { "type": "integer" }
//!     },
//!     "required": ["name", "age"]
//! }"#;
//!
//! // Generate a regular expression from it
//! let regex = json_schema::regex_from_str(&schema, None)?;
//! println!("Generated regex: {}", regex);
//!
//! // Create `Vocabulary` manually (but loading it from a pretrained model is also possible)
//! let mut vocabulary = Vocabulary::new(128);
//! for byte in 0..128u8 {
//!     vocabulary.try_insert(vec![byte], byte as TokenId)?;
//! }
//! vocabulary.try_insert("\"name\"", 129)?;
//!
//! // Create new `Index` from regex and a given `Vocabulary`
//! let index = Index::new(&regex, &vocabulary)?;
//!
//! let initial_state = index.initial_state();
//! println!("Is initial state {} a final state? {}", initial_state, index.is_final_state(&initial_state));
//!
//! let allowed_tokens = index.allowed_tokens(&initial_state).expect("Some allowed tokens");
//! println!("Allowed tokens at initial state are {:?}", allowed_tokens);
//! assert_eq!(allowed_tokens, vec![b'{' as TokenId]);
//!
//! // Follow the index token by token
//! let mut guide = Guide::new(Arc::new(index));
//! for token_id in [b'{' as TokenId, 129, b':' as TokenId, b'"' as TokenId] {
//!     guide.advance(token_id)?;
//! }
//! println!("Next allowed tokens are {:?}", guide.allowed_tokens());
//! assert!(!guide.is_finished());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cfg;
pub mod dfa;
pub mod error;
pub mod generate;
pub mod grammar;
pub mod guide;
pub mod index;
pub mod json_schema;
pub mod outline;
pub mod prelude;
pub mod primitives;
pub mod vocabulary;

pub use error::{Error, JsonSchemaParserError, Result};
