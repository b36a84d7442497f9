use thiserror::Error;

use crate::primitives::{StateId, TokenId};

pub type Result<T, E = crate::Error> = std::result::Result<T, E>;

#[cfg(feature = "huggingface-hub")]
#[derive(Error, Debug)]
#[error("{0}")]
pub struct TokenizersError(pub tokenizers::Error);

#[derive(Error, Debug)]
pub enum Error {
    #[error("The vocabulary does not allow us to build a sequence that matches the input")]
    IndexError,
    #[error("Failed to build DFA {0}")]
    IndexDfaError(#[from] Box<regex_automata::dfa::dense::BuildError>),
    #[error("Index failed since anchored start state doesn't exist")]
    DfaHasNoStartState,
    #[error("Context-free grammars can't be compiled into a finite automaton, use `CfgGuide` instead")]
    CfgNotRegular,
    #[error("Invalid grammar at line {line}: {reason}")]
    CfgSyntax { line: usize, reason: String },
    #[error("Token {token_id} is not allowed in state {state}")]
    IllegalToken { state: StateId, token_id: TokenId },
    #[error("Unable to parse response: {output} ({reason})")]
    ParseError { output: String, reason: String },
    #[error("Choice must contain at least one option")]
    EmptyChoice,
    #[error("EOS token should not be inserted into Vocabulary")]
    EOSTokenDisallowed,
    #[error("Token id {0} is already present in Vocabulary")]
    DuplicateTokenId(TokenId),
    #[error("Index serialization failed: {0}")]
    Serialization(String),
    #[error("Model failed to produce a token: {0}")]
    Model(String),
    #[error(transparent)]
    JsonSchemaParserError(#[from] JsonSchemaParserError),
    #[cfg(feature = "huggingface-hub")]
    #[error(transparent)]
    TokenizersError(#[from] TokenizersError),
    #[cfg(feature = "huggingface-hub")]
    #[error("Unsupported tokenizer for {model}: {reason}, please open an issue with the full error message")]
    UnsupportedTokenizer { model: String, reason: String },
    #[cfg(feature = "huggingface-hub")]
    #[error("Tokenizer is not supported by token processor")]
    UnsupportedByTokenProcessor,
    #[cfg(feature = "huggingface-hub")]
    #[error("Decoder unpacking failed for token processor")]
    DecoderUnpackingFailed,
    #[cfg(feature = "huggingface-hub")]
    #[error("Token processing failed for byte level processor")]
    ByteProcessorFailed,
    #[cfg(feature = "huggingface-hub")]
    #[error("Token processing failed for byte fallback level processor")]
    ByteFallbackProcessorFailed,
}

impl Error {
    /// Whether the error means the grammar can't be realized with the given vocabulary.
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, Self::IndexError)
    }
}

/// Problems found in a JSON schema, always reported before any automaton is built.
#[derive(Error, Debug)]
pub enum JsonSchemaParserError {
    #[error("serde json error")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("The Json definition must be an object or a boolean, got: {0}")]
    NotAnObject(Box<serde_json::Value>),
    #[error("The `false` schema doesn't accept any value")]
    FalseSchema,
    #[error("Unsupported JSON Schema structure {0} \nMake sure it is valid to the JSON Schema specification and check if it's supported.")]
    UnsupportedJsonSchema(Box<serde_json::Value>),
    #[error("'properties' must be an object")]
    PropertiesMustBeAnObject,
    #[error("Property '{0}' must be described by a schema object")]
    PropertyMustBeAnObject(Box<str>),
    #[error("'required' must be an array of strings")]
    RequiredMustBeAnArray,
    #[error("Required property '{0}' is not declared in 'properties'")]
    UnknownRequiredProperty(Box<str>),
    #[error("'allOf' must be an array")]
    AllOfMustBeAnArray,
    #[error("'anyOf' must be an array")]
    AnyOfMustBeAnArray,
    #[error("'oneOf' must be an array")]
    OneOfMustBeAnArray,
    #[error("'prefixItems' must be an array")]
    PrefixItemsMustBeAnArray,
    #[error("'items' must be a schema")]
    ItemsMustBeASchema,
    #[error("'enum' must be an array")]
    EnumMustBeAnArray,
    #[error("'enum' must list at least one value")]
    EmptyEnum,
    #[error("Value {value} of '{keyword}' doesn't match declared type '{expected}'")]
    TypeMismatch {
        keyword: Box<str>,
        expected: Box<str>,
        value: Box<serde_json::Value>,
    },
    #[error("'$ref' must be a string")]
    RefMustBeAString,
    #[error("External references are not supported: {0}")]
    ExternalReferencesNotSupported(Box<str>),
    #[error("Invalid reference format: {0}")]
    InvalidReferenceFormat(Box<str>),
    #[error("Invalid reference path: {0}")]
    InvalidReferencePath(Box<str>),
    #[error("Recursive reference can't be expressed as a regular expression: {0}")]
    RecursiveReference(Box<str>),
    #[error("'type' must be a string or an array of strings")]
    TypeMustBeAString,
    #[error("Unsupported type: {0}")]
    UnsupportedType(Box<str>),
    #[error("'{0}' must be a non-negative integer")]
    InvalidBound(Box<str>),
    #[error("'pattern' must be a string")]
    PatternMustBeAString,
    #[error("maxLength must be greater than or equal to minLength")]
    MaxBoundError,
    #[error("Format {0} is not supported")]
    StringTypeUnsupportedFormat(Box<str>),
}
