use std::path::PathBuf;

use hf_hub::api::sync::{ApiBuilder, ApiError};
use hf_hub::{Repo, RepoType};
use serde::Deserialize;
use tokenizers::{FromPretrainedParameters, Tokenizer};

use crate::primitives::TokenId;

/// Files commonly holding the EOS token, most reliable first.
const COMMON_LOCATIONS: &[EosTokenLocation] = &[
    // Most of the time it's found as an id in `config.json`.
    EosTokenLocation {
        file: "config.json",
        location: EosTokenField::Id,
    },
    EosTokenLocation {
        file: "generation_config.json",
        location: EosTokenField::Id,
    },
    // Otherwise it's a token which has to be mapped to its id.
    EosTokenLocation {
        file: "special_tokens_map.json",
        location: EosTokenField::Object,
    },
    EosTokenLocation {
        file: "tokenizer_config.json",
        location: EosTokenField::Value,
    },
];

#[derive(Debug, Deserialize)]
struct Id {
    eos_token_id: u64,
}

#[derive(Debug, Deserialize)]
struct Content {
    content: String,
}

#[derive(Debug, Deserialize)]
struct Object {
    eos_token: Content,
}

#[derive(Debug, Deserialize)]
struct Value {
    eos_token: String,
}

enum EosTokenField {
    Id,
    Value,
    Object,
}

struct EosTokenLocation {
    file: &'static str,
    location: EosTokenField,
}

/// Locates the end of sequence token id of a model.
pub(crate) trait Locator {
    fn locate_eos_token_id(
        model: &str,
        tokenizer: &Tokenizer,
        parameters: &Option<FromPretrainedParameters>,
    ) -> Option<TokenId>;
}

/// Looks the EOS token up in the model's files on Hugging Face Hub.
pub(crate) struct HFLocator;

impl Locator for HFLocator {
    fn locate_eos_token_id(
        model: &str,
        tokenizer: &Tokenizer,
        parameters: &Option<FromPretrainedParameters>,
    ) -> Option<TokenId> {
        COMMON_LOCATIONS
            .iter()
            .find_map(|location| location.lookup(model, tokenizer, parameters))
    }
}

impl EosTokenLocation {
    fn lookup(
        &self,
        model: &str,
        tokenizer: &Tokenizer,
        parameters: &Option<FromPretrainedParameters>,
    ) -> Option<TokenId> {
        let file_path = Self::download_file(model, self.file, parameters.clone()).ok()?;
        let file = std::fs::File::open(file_path).ok()?;

        match self.location {
            EosTokenField::Id => {
                let config: Id = serde_json::from_reader(file).ok()?;
                TokenId::try_from(config.eos_token_id).ok()
            }
            EosTokenField::Value => {
                let config: Value = serde_json::from_reader(file).ok()?;
                tokenizer.token_to_id(&config.eos_token)
            }
            EosTokenField::Object => {
                let config: Object = serde_json::from_reader(file).ok()?;
                tokenizer.token_to_id(&config.eos_token.content)
            }
        }
    }

    fn download_file(
        model: &str,
        file: &str,
        parameters: Option<FromPretrainedParameters>,
    ) -> Result<PathBuf, ApiError> {
        let params = parameters.unwrap_or_default();

        let mut builder = ApiBuilder::new();
        if let Some(token) = params.token {
            builder = builder.with_token(Some(token));
        }
        let api = builder.build()?;

        let repo = Repo::with_revision(model.to_string(), RepoType::Model, params.revision);
        api.repo(repo).get(file)
    }
}
