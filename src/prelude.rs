//! Library's interface essentials.

#[cfg(feature = "huggingface-hub")]
pub use tokenizers::FromPretrainedParameters;

pub use super::cache::IndexCache;
pub use super::cfg::CfgGuide;
pub use super::dfa::Dfa;
pub use super::error::JsonSchemaParserError;
pub use super::grammar::{Grammar, GrammarBuilder, TypeDescription};
pub use super::guide::{Guide, TokenGuide};
pub use super::index::Index;
pub use super::json_schema;
pub use super::primitives::{Signature, StateId, Token, TokenId};
pub use super::vocabulary::Vocabulary;
