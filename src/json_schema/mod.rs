//! Provides interfaces to generate a regular expression based on a given JSON schema.
//!
//! An optional custom pattern could be passed as well to handle whitespace within the regex.
//! If `None`, the default [`WHITESPACE`] pattern is used.
//!
//! Generation happens in two steps. The document is first validated and converted into a typed
//! [`ast::Schema`] tree, then that tree is lowered into regex text. Any malformed input fails in
//! the first step, so no partial regex is ever produced.
//!
//! ## Supported features
//!
//! Note, that only some of the features of JSON schema are supported for regex generation.
//!
//! ### Supported constraints
//!
//! #### Common
//!  - `type`
//!     - Specifies the data type (string, number, integer, boolean, array, object, null),
//!       or an array of those types.
//!  - `enum`
//!     - Lists the allowed values, which must agree with the declared `type`.
//!  - `const`
//!     - Specifies a single allowed value.
//!
//! #### Object
//! - `properties`, `required`
//! - `additionalProperties`, `minProperties`, `maxProperties`
//!
//! #### Array
//! - `items`, `prefixItems`, `minItems`, `maxItems`
//!
//! #### String
//! - `minLength`, `maxLength`, `pattern`
//! - `format`, these are supported [`FormatType`]
//!
//! #### Number
//! - `minDigitsInteger`, `maxDigitsInteger`
//! - `minDigitsFraction`, `maxDigitsFraction`
//! - `minDigitsExponent`, `maxDigitsExponent`
//!
//! #### Integer
//! - `minDigits`, `maxDigits`
//!
//! #### Logical
//! - `allOf`, `anyOf`, `oneOf`
//!
//! ### References
//!
//! Only local references are supported. A reference which, directly or through other
//! references, points back to itself has no regular equivalent and is rejected with
//! [`JsonSchemaParserError::RecursiveReference`](crate::JsonSchemaParserError::RecursiveReference).
//!
//! ### Unconstrained objects
//!
//! An empty object means unconstrained, allowing any JSON type. Nested unconstrained arrays and
//! objects are limited to a depth of 2 unless the schema sets `depth`.

use serde_json::Value;
pub use types::*;

pub mod ast;
mod parsing;
pub mod types;

use crate::{JsonSchemaParserError, Result};

/// Generates a regular expression string from given JSON schema string.
///
/// # Example
///
/// ```rust
/// # use guided_decoding::Error;
/// use guided_decoding::prelude::*;
///
/// # fn main() -> Result<(), Error> {
///     let schema = r#"{
///         "type": "object",
///         "properties": {
///             "name": { "type": "string" },
///             "age": { "type": "integer" }
///         },
///         "required": ["name", "age"]
///     }"#;
///
///     let regex = json_schema::regex_from_str(schema, None)?;
///     println!("Generated regex: {}", regex);
///
///     // Custom whitespace pattern could be passed as well
///     let regex = json_schema::regex_from_str(schema, Some(r#"[\n ]*"#))?;
///     println!("Generated regex with custom whitespace pattern: {}", regex);
/// #   Ok(())
/// }
/// ```
pub fn regex_from_str(json: &str, whitespace_pattern: Option<&str>) -> Result<String> {
    let json_value: Value =
        serde_json::from_str(json).map_err(JsonSchemaParserError::SerdeJsonError)?;
    regex_from_value(&json_value, whitespace_pattern)
}

/// Generates a regular expression string from `serde_json::Value` type of JSON schema.
///
/// # Example
///
/// ```rust
/// # use guided_decoding::Error;
/// use guided_decoding::prelude::*;
/// use serde_json::json;
///
/// # fn main() -> Result<(), Error> {
///     let schema = json!({"type": "array", "items": {"type": "boolean"}, "maxItems": 2});
///     let regex = json_schema::regex_from_value(&schema, None)?;
///     assert!(regex.starts_with(r"\["));
/// #   Ok(())
/// }
/// ```
pub fn regex_from_value(json: &Value, whitespace_pattern: Option<&str>) -> Result<String> {
    let mut parser = parsing::Parser::new(json);
    if let Some(pattern) = whitespace_pattern {
        parser = parser.with_whitespace_pattern(pattern)
    }
    Ok(parser.root_to_regex()?)
}
