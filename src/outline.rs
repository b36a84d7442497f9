//! Typed calls to a text model: render a prompt, generate, parse the answer.
//!
//! Parsing is independent from guided generation. A guided answer always has the right shape,
//! parsing then turns it into a value, an unguided one may also fail to parse.

use log::debug;
use serde_json::{Number, Value};

use crate::grammar::TypeDescription;
use crate::{Error, Result};

/// Floats with a fraction or an exponent, plain integers parse as [`OutputType::Integer`].
const FLOAT_LITERAL: &str = r"[+-]?(0|[1-9][0-9]*)(\.[0-9]+([eE][+-][0-9]+)?|[eE][+-][0-9]+)";

/// A model turning a prompt into text.
pub trait TextModel {
    fn generate(&mut self, prompt: &str) -> Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputType {
    Integer,
    Float,
    Boolean,
    String,
    /// Any literal value.
    Json,
}

impl OutputType {
    /// Parses `text` as a literal and checks its type.
    ///
    /// Accepted literals are integers, floats, `true`/`false` in either `True` or `true` case,
    /// strings quoted with `'` or `"`, and JSON documents.
    ///
    /// ```rust
    /// use guided_decoding::outline::OutputType;
    /// use serde_json::json;
    ///
    /// assert_eq!(OutputType::Integer.parse("6").ok(), Some(json!(6)));
    /// assert_eq!(OutputType::String.parse("'Hi, Mark!'").ok(), Some(json!("Hi, Mark!")));
    /// assert!(OutputType::Integer.parse("'Hello, world!'").is_err());
    /// ```
    pub fn parse(&self, text: &str) -> Result<Value> {
        let parse_error = |reason: String| Error::ParseError {
            output: text.to_string(),
            reason,
        };
        let value = parse_literal(text).map_err(parse_error)?;
        if self.accepts(&value) {
            Ok(value)
        } else {
            Err(parse_error(format!("{} is not {}", kind(&value), self.name())))
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            OutputType::Integer => value.is_i64() || value.is_u64(),
            OutputType::Float => value.is_f64(),
            OutputType::Boolean => value.is_boolean(),
            OutputType::String => value.is_string(),
            OutputType::Json => true,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            OutputType::Integer => "an integer",
            OutputType::Float => "a float",
            OutputType::Boolean => "a boolean",
            OutputType::String => "a string",
            OutputType::Json => "a value",
        }
    }

    /// Description of a grammar whose sentences parse as this type.
    pub fn type_description(&self) -> TypeDescription {
        match self {
            OutputType::Integer => TypeDescription::Integer,
            OutputType::Float => TypeDescription::Regex(FLOAT_LITERAL.to_string()),
            OutputType::Boolean => TypeDescription::Boolean,
            OutputType::String => TypeDescription::String,
            OutputType::Json => TypeDescription::JsonSchema(Value::Object(Default::default())),
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_f64() => "a float",
        Value::Number(_) => "an integer",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_literal(text: &str) -> std::result::Result<Value, String> {
    match text {
        "" => return Err("empty response".into()),
        "True" | "true" => return Ok(Value::Bool(true)),
        "False" | "false" => return Ok(Value::Bool(false)),
        "None" | "null" => return Ok(Value::Null),
        _ => {}
    }
    if let Some(quote @ ('\'' | '"')) = text.chars().next() {
        return parse_quoted(text, quote).map(Value::String);
    }
    if let Some(number) = parse_number(text) {
        return Ok(Value::Number(number));
    }
    serde_json::from_str(text).map_err(|e| e.to_string())
}

fn parse_number(text: &str) -> Option<Number> {
    let digits = text.strip_prefix(&['+', '-'][..]).unwrap_or(text);
    if digits.is_empty() || !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        let integer = text.strip_prefix('+').unwrap_or(text);
        if let Ok(n) = integer.parse::<i64>() {
            return Some(n.into());
        }
        if let Ok(n) = integer.parse::<u64>() {
            return Some(n.into());
        }
    }
    if !digits
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn parse_quoted(text: &str, quote: char) -> std::result::Result<String, String> {
    let mut chars = text.chars().skip(1);
    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err("unterminated string".into()),
            Some(c) if c == quote => break,
            Some('\\') => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('r') => value.push('\r'),
                Some('0') => value.push('\0'),
                Some(c @ ('\\' | '\'' | '"')) => value.push(c),
                Some(c) => {
                    value.push('\\');
                    value.push(c);
                }
                None => return Err("unterminated string".into()),
            },
            Some(c) => value.push(c),
        }
    }
    if chars.next().is_some() {
        return Err("trailing characters after string".into());
    }
    Ok(value)
}

/// A prompt template, a model and the expected type of the answer.
///
/// ```rust
/// use guided_decoding::outline::{Outline, OutputType, TextModel};
/// use serde_json::json;
///
/// struct Doubler;
///
/// impl TextModel for Doubler {
///     fn generate(&mut self, prompt: &str) -> guided_decoding::Result<String> {
///         let n: i64 = prompt.trim_start_matches("What is 2 times ").trim_end_matches('?').parse().unwrap_or(0);
///         Ok(format!(" {} ", 2 * n))
///     }
/// }
///
/// let mut outline = Outline::new(Doubler, |a: i64| format!("What is 2 times {a}?"), OutputType::Integer);
/// assert_eq!(outline.call(3).ok(), Some(json!(6)));
/// ```
pub struct Outline<M, F> {
    model: M,
    template: F,
    output_type: OutputType,
}

impl<M, F> Outline<M, F> {
    pub fn new(model: M, template: F, output_type: OutputType) -> Self {
        Self {
            model,
            template,
            output_type,
        }
    }

    pub fn output_type(&self) -> OutputType {
        self.output_type
    }

    /// Renders the prompt for `args`, generates and parses the trimmed answer.
    pub fn call<A>(&mut self, args: A) -> Result<Value>
    where
        M: TextModel,
        F: Fn(A) -> String,
    {
        let prompt = (self.template)(args);
        let response = self.model.generate(&prompt)?;
        let response = response.trim();
        debug!("outline response: {response:?}");
        self.output_type.parse(response)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::dfa::Dfa;
    use crate::grammar::GrammarBuilder;

    struct Canned(&'static str);

    impl TextModel for Canned {
        fn generate(&mut self, _: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn integer_output() {
        let mut outline = Outline::new(
            Canned("6"),
            |a: i64| format!("What is 2 times {a}?"),
            OutputType::Integer,
        );
        assert_eq!(outline.call(3).expect("Parse failed"), json!(6));
    }

    #[test]
    fn string_output() {
        for (response, expected) in [
            ("'Hello, world!'", "Hello, world!"),
            ("  'Hi, Mark!'\n", "Hi, Mark!"),
            (r#""it's""#, "it's"),
            (r"'it\'s'", "it's"),
        ] {
            let mut outline = Outline::new(
                Canned(response),
                |name: &str| format!("Say hi to {name}"),
                OutputType::String,
            );
            assert_eq!(outline.call("Mark").expect("Parse failed"), json!(expected));
        }
    }

    #[test]
    fn invalid_output() {
        let mut outline = Outline::new(
            Canned("not a number"),
            |a: i64| format!("What is 2 times {a}?"),
            OutputType::Integer,
        );
        assert!(matches!(outline.call(3), Err(Error::ParseError { .. })));
    }

    #[test]
    fn mismatched_output_type() {
        let mut outline = Outline::new(
            Canned("'Hello, world!'"),
            |a: i64| format!("What is 2 times {a}?"),
            OutputType::Integer,
        );
        match outline.call(3) {
            Err(e) => assert!(
                e.to_string()
                    .starts_with("Unable to parse response: 'Hello, world!'"),
                "{e}"
            ),
            Ok(value) => unreachable!("parsed into {value}"),
        }
    }

    #[test]
    fn literals() {
        for (output_type, text, expected) in [
            (OutputType::Integer, "-12", json!(-12)),
            (OutputType::Integer, "+7", json!(7)),
            (OutputType::Float, "2.5", json!(2.5)),
            (OutputType::Float, "-1e3", json!(-1000.0)),
            (OutputType::Boolean, "True", json!(true)),
            (OutputType::Boolean, "false", json!(false)),
            (OutputType::Json, r#"{"a": [1, 2]}"#, json!({"a": [1, 2]})),
            (OutputType::Json, "None", json!(null)),
        ] {
            assert_eq!(output_type.parse(text).expect("Parse failed"), expected, "{text}");
        }
        for (output_type, text) in [
            (OutputType::Float, "6"),
            (OutputType::Integer, "1.5"),
            (OutputType::Integer, "True"),
            (OutputType::Boolean, "1"),
            (OutputType::String, "'open"),
            (OutputType::String, "'a' 'b'"),
            (OutputType::Json, ""),
            (OutputType::Float, "inf"),
        ] {
            assert!(output_type.parse(text).is_err(), "{text}");
        }
    }

    #[test]
    fn guided_shapes_parse() {
        for (output_type, text) in [
            (OutputType::Integer, "-42"),
            (OutputType::Float, "3.25"),
            (OutputType::Boolean, "true"),
            (OutputType::String, r#""quoted""#),
        ] {
            let grammar = GrammarBuilder::new()
                .grammar(&output_type.type_description())
                .expect("Grammar failed");
            let dfa = Dfa::new(grammar.source()).expect("Dfa failed");
            assert!(dfa.accepts(text.as_bytes()), "{text}");
            assert!(output_type.parse(text).is_ok(), "{text}");
        }
    }

    #[test]
    fn float_grammar_excludes_integers() {
        let grammar = GrammarBuilder::new()
            .grammar(&OutputType::Float.type_description())
            .expect("Grammar failed");
        let dfa = Dfa::new(grammar.source()).expect("Dfa failed");
        for text in ["6", "-0", "10", "+7"] {
            assert!(!dfa.accepts(text.as_bytes()), "{text}");
            assert!(OutputType::Float.parse(text).is_err(), "{text}");
        }
        for text in ["0.5", "-1e+3", "2.0E-7", "+10.25"] {
            assert!(dfa.accepts(text.as_bytes()), "{text}");
            assert!(OutputType::Float.parse(text).is_ok(), "{text}");
        }
    }
}
