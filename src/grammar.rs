//! Turns a type description into a grammar the automaton compilers understand.
//!
//! [`GrammarBuilder::build`] maps a closed set of [`TypeDescription`]s onto a [`GrammarSpec`],
//! and [`GrammarBuilder::lower`] reduces that spec to one of the two backend forms of
//! [`Grammar`]: a regular expression, compiled by [`crate::dfa`], or a context-free grammar,
//! handled by [`crate::cfg`].
//!
//! ```rust
//! # use guided_decoding::Error;
//! use guided_decoding::grammar::{Grammar, GrammarBuilder, TypeDescription};
//!
//! # fn main() -> Result<(), Error> {
//! let builder = GrammarBuilder::new();
//! let spec = builder.build(&TypeDescription::Choice(vec!["yes".into(), "no".into()]))?;
//! assert_eq!(builder.lower(&spec)?, Grammar::Regex("(yes|no)".into()));
//! # Ok(())
//! # }
//! ```

use serde_json::Value;

use crate::json_schema;
use crate::primitives::Signature;
use crate::{Error, JsonSchemaParserError, Result};

pub static INTEGER: &str = r"[+-]?(0|[1-9][0-9]*)";
pub static FLOAT: &str = r"[+-]?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-][0-9]+)?";
pub static BOOLEAN: &str = r"(true|false)";

/// Everything a caller can ask the output to look like.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDescription {
    Integer,
    Float,
    Boolean,
    /// A JSON string literal, quotes included.
    String,
    /// A JSON string literal with a bounded number of characters.
    BoundedString {
        min_length: usize,
        max_length: Option<usize>,
    },
    Date,
    Time,
    DateTime,
    Uuid,
    Email,
    Uri,
    /// One of the given strings, verbatim.
    Choice(Vec<String>),
    JsonSchema(Value),
    /// A JSON schema document still in its textual form.
    JsonSchemaStr(String),
    Regex(String),
    /// Source of a context-free grammar, see [`crate::cfg`] for the syntax.
    Cfg(String),
}

/// Validated grammar, before lowering.
#[derive(Clone, Debug, PartialEq)]
pub enum GrammarSpec {
    Regex(String),
    Choice(Vec<String>),
    JsonSchema(Value),
    Cfg(String),
}

/// Backend form of a grammar.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Grammar {
    Regex(String),
    Cfg(String),
}

impl Grammar {
    /// Content signature, the grammar half of a cache key.
    pub fn signature(&self) -> Signature {
        let (kind, source) = match self {
            Grammar::Regex(regex) => (b"regex".as_slice(), regex.as_str()),
            Grammar::Cfg(source) => (b"cfg".as_slice(), source.as_str()),
        };
        Signature::from_parts([kind, source.as_bytes()])
    }

    pub fn source(&self) -> &str {
        match self {
            Grammar::Regex(source) | Grammar::Cfg(source) => source,
        }
    }

    pub fn is_regular(&self) -> bool {
        matches!(self, Grammar::Regex(_))
    }
}

#[derive(Clone, Debug, Default)]
pub struct GrammarBuilder {
    whitespace_pattern: Option<String>,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pattern used between JSON tokens, [`json_schema::WHITESPACE`] when not set.
    pub fn with_whitespace_pattern(self, whitespace_pattern: &str) -> Self {
        Self {
            whitespace_pattern: Some(whitespace_pattern.to_string()),
        }
    }

    /// Maps a type description onto a grammar spec.
    ///
    /// JSON schemas are fully validated here, so a malformed schema never reaches an automaton
    /// compiler.
    pub fn build(&self, description: &TypeDescription) -> Result<GrammarSpec> {
        let regex =
            |pattern: &str| -> Result<GrammarSpec> { Ok(GrammarSpec::Regex(pattern.to_string())) };
        match description {
            TypeDescription::Integer => regex(INTEGER),
            TypeDescription::Float => regex(FLOAT),
            TypeDescription::Boolean => regex(BOOLEAN),
            TypeDescription::String => regex(json_schema::STRING),
            TypeDescription::BoundedString {
                min_length,
                max_length,
            } => {
                if max_length.is_some_and(|max| max < *min_length) {
                    return Err(JsonSchemaParserError::MaxBoundError.into());
                }
                let max_length = max_length.map_or(String::new(), |max| max.to_string());
                Ok(GrammarSpec::Regex(format!(
                    r#""{}{{{},{}}}""#,
                    json_schema::STRING_INNER,
                    min_length,
                    max_length
                )))
            }
            TypeDescription::Date => regex(json_schema::FormatType::Date.to_unquoted_regex()),
            TypeDescription::Time => regex(json_schema::FormatType::Time.to_unquoted_regex()),
            TypeDescription::DateTime => {
                regex(json_schema::FormatType::DateTime.to_unquoted_regex())
            }
            TypeDescription::Uuid => regex(json_schema::FormatType::Uuid.to_unquoted_regex()),
            TypeDescription::Email => regex(json_schema::FormatType::Email.to_unquoted_regex()),
            TypeDescription::Uri => regex(json_schema::FormatType::Uri.to_unquoted_regex()),
            TypeDescription::Choice(options) => {
                if options.is_empty() {
                    return Err(Error::EmptyChoice);
                }
                Ok(GrammarSpec::Choice(options.clone()))
            }
            TypeDescription::JsonSchema(schema) => {
                self.json_schema_regex(schema)?;
                Ok(GrammarSpec::JsonSchema(schema.clone()))
            }
            TypeDescription::JsonSchemaStr(schema) => {
                let schema: Value =
                    serde_json::from_str(schema).map_err(JsonSchemaParserError::SerdeJsonError)?;
                self.json_schema_regex(&schema)?;
                Ok(GrammarSpec::JsonSchema(schema))
            }
            TypeDescription::Regex(pattern) => regex(pattern.as_str()),
            TypeDescription::Cfg(source) => Ok(GrammarSpec::Cfg(source.clone())),
        }
    }

    /// Reduces a spec to the form its automaton compiler consumes.
    pub fn lower(&self, spec: &GrammarSpec) -> Result<Grammar> {
        match spec {
            GrammarSpec::Regex(regex) => Ok(Grammar::Regex(regex.clone())),
            GrammarSpec::Choice(options) => {
                if options.is_empty() {
                    return Err(Error::EmptyChoice);
                }
                let options: Vec<String> = options.iter().map(|o| regex::escape(o)).collect();
                Ok(Grammar::Regex(format!("({})", options.join("|"))))
            }
            GrammarSpec::JsonSchema(schema) => Ok(Grammar::Regex(self.json_schema_regex(schema)?)),
            GrammarSpec::Cfg(source) => Ok(Grammar::Cfg(source.clone())),
        }
    }

    /// Shortcut for [`build`](Self::build) followed by [`lower`](Self::lower).
    pub fn grammar(&self, description: &TypeDescription) -> Result<Grammar> {
        self.lower(&self.build(description)?)
    }

    fn json_schema_regex(&self, schema: &Value) -> Result<String> {
        json_schema::regex_from_value(schema, self.whitespace_pattern.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dfa::Dfa;

    fn regex_of(description: TypeDescription) -> String {
        match GrammarBuilder::new().grammar(&description) {
            Ok(Grammar::Regex(regex)) => regex,
            other => unreachable!("{description:?} gave {other:?}"),
        }
    }

    #[test]
    fn primitives() {
        for (description, accepted, rejected) in [
            (
                TypeDescription::Integer,
                vec!["0", "-12", "+7", "1000"],
                vec!["", "01", "1.0", "--1"],
            ),
            (
                TypeDescription::Float,
                vec!["0", "1.5", "-0.25", "3e+10", "+2.5E-3"],
                vec!["1.", ".5", "1e5", "01.5"],
            ),
            (
                TypeDescription::Boolean,
                vec!["true", "false"],
                vec!["True", "yes", "truefalse"],
            ),
            (
                TypeDescription::String,
                vec![r#""""#, r#""hello""#, r#""a\"b""#],
                vec!["hello", r#""a"b""#],
            ),
            (
                TypeDescription::BoundedString {
                    min_length: 1,
                    max_length: Some(2),
                },
                vec![r#""a""#, r#""ab""#],
                vec![r#""""#, r#""abc""#],
            ),
            (
                TypeDescription::Date,
                vec!["2024-01-31"],
                vec![r#""2024-01-31""#, "2024-1-31"],
            ),
            (TypeDescription::Time, vec!["12:30:00"], vec!["25:00:00"]),
            (
                TypeDescription::DateTime,
                vec!["2024-01-31T12:30:00Z"],
                vec!["2024-01-31 12:30:00"],
            ),
            (
                TypeDescription::Uuid,
                vec!["123e4567-e89b-12d3-a456-426614174000"],
                vec!["123e4567e89b12d3a456426614174000"],
            ),
            (
                TypeDescription::Email,
                vec!["someone@example.com", "a.b@my.custom.domain"],
                vec!["someone", "someone@example", "someone@.example.com"],
            ),
            (
                TypeDescription::Uri,
                vec!["https://example.com/path?q=1"],
                vec!["example com"],
            ),
        ] {
            let regex = regex_of(description.clone());
            let dfa = Dfa::new(&regex).expect("Dfa failed");
            for text in accepted {
                assert!(dfa.accepts(text.as_bytes()), "{description:?} should accept {text}");
            }
            for text in rejected {
                assert!(!dfa.accepts(text.as_bytes()), "{description:?} should reject {text}");
            }
        }
    }

    #[test]
    fn choice_is_escaped_and_ordered() {
        let options = vec!["b".to_string(), "1.5".to_string(), "a+b".to_string()];
        assert_eq!(
            regex_of(TypeDescription::Choice(options)),
            r"(b|1\.5|a\+b)"
        );

        let dfa = Dfa::new(&regex_of(TypeDescription::Choice(vec![
            "a".into(),
            "b".into(),
        ])))
        .expect("Dfa failed");
        assert!(dfa.accepts(b"a"));
        assert!(dfa.accepts(b"b"));
        assert!(!dfa.accepts(b"c"));
        assert!(!dfa.accepts(b"ab"));
    }

    #[test]
    fn empty_choice_is_a_schema_error() {
        let builder = GrammarBuilder::new();
        assert!(matches!(
            builder.build(&TypeDescription::Choice(vec![])),
            Err(Error::EmptyChoice)
        ));
        assert!(matches!(
            builder.lower(&GrammarSpec::Choice(vec![])),
            Err(Error::EmptyChoice)
        ));
    }

    #[test]
    fn json_schemas_are_validated_when_built() {
        let builder = GrammarBuilder::new();
        for description in [
            TypeDescription::JsonSchema(json!({"type": "object", "properties": {"foo": "bar"}})),
            TypeDescription::JsonSchemaStr(
                r#"{"type": "object", "properties": {"foo": "bar"}}"#.into(),
            ),
            TypeDescription::JsonSchemaStr("{not json".into()),
            TypeDescription::JsonSchema(json!(0)),
        ] {
            match builder.build(&description) {
                Err(Error::JsonSchemaParserError(_)) => {}
                other => unreachable!("{description:?} gave {other:?}"),
            }
        }

        let schema = json!({"type": "object", "properties": {"bar": {"type": "integer"}}});
        let from_value = builder
            .build(&TypeDescription::JsonSchema(schema.clone()))
            .expect("Valid schema");
        let from_str = builder
            .build(&TypeDescription::JsonSchemaStr(schema.to_string()))
            .expect("Valid schema");
        assert_eq!(from_value, from_str);
        assert_eq!(from_value, GrammarSpec::JsonSchema(schema));
    }

    #[test]
    fn raw_grammars_are_kept_verbatim() {
        let builder = GrammarBuilder::new();
        assert_eq!(
            builder
                .grammar(&TypeDescription::Regex("a(b".into()))
                .expect("Not compiled yet"),
            Grammar::Regex("a(b".into())
        );
        let source = "start: \"(\" start \")\" | \"\"";
        let grammar = builder
            .grammar(&TypeDescription::Cfg(source.into()))
            .expect("Cfg kept");
        assert_eq!(grammar, Grammar::Cfg(source.into()));
        assert!(!grammar.is_regular());
        assert_eq!(grammar.source(), source);
    }

    #[test]
    fn signature_follows_lowered_source() {
        let schema = TypeDescription::JsonSchema(json!({
            "type": "object",
            "properties": {"a": {"type": "boolean"}}
        }));
        let default = GrammarBuilder::new().grammar(&schema).expect("Grammar");
        let spaced = GrammarBuilder::new()
            .with_whitespace_pattern(r"[ \n]*")
            .grammar(&schema)
            .expect("Grammar");
        assert_ne!(default.signature(), spaced.signature());
        assert_eq!(
            default.signature(),
            GrammarBuilder::new().grammar(&schema).expect("Grammar").signature()
        );

        let regex = Grammar::Regex("a".into());
        let cfg = Grammar::Cfg("a".into());
        assert_ne!(regex.signature(), cfg.signature());
    }
}
