use std::num::NonZeroU64;

use regex::escape;
use serde_json::Value;

use crate::json_schema::ast::{
    ArraySchema, FreeObjectSchema, IntegerSchema, NumberSchema, ObjectSchema, Schema,
    StringSchema, DEFAULT_DEPTH,
};
use crate::json_schema::types;
use crate::JsonSchemaParserError;

type Result<T> = std::result::Result<T, JsonSchemaParserError>;

/// Lowers a [`Schema`] tree into a regular expression.
pub(crate) struct Parser<'a> {
    root: &'a Value,
    whitespace_pattern: &'a str,
    /// References currently being expanded, innermost last.
    visiting: Vec<String>,
}

impl<'a> Parser<'a> {
    pub fn new(root: &'a Value) -> Self {
        Self {
            root,
            whitespace_pattern: types::WHITESPACE,
            visiting: vec![],
        }
    }

    pub fn with_whitespace_pattern(self, whitespace_pattern: &'a str) -> Self {
        Self {
            whitespace_pattern,
            ..self
        }
    }

    /// Validates the root document and lowers it.
    pub fn root_to_regex(&mut self) -> Result<String> {
        let schema = Schema::from_value(self.root)?;
        self.to_regex(&schema)
    }

    #[allow(clippy::wrong_self_convention)]
    pub fn to_regex(&mut self, schema: &Schema) -> Result<String> {
        match schema {
            Schema::Any => self.parse_any(),
            Schema::Null => Ok(types::NULL.to_string()),
            Schema::Boolean => Ok(types::BOOLEAN.to_string()),
            Schema::Integer(integer) => self.parse_integer_type(integer),
            Schema::Number(number) => self.parse_number_type(number),
            Schema::String(string) => self.parse_string_type(string),
            Schema::Array(array) => self.parse_array_type(array),
            Schema::Tuple(prefix_items) => self.parse_prefix_items(prefix_items),
            Schema::Object(object) => self.parse_properties(object),
            Schema::FreeObject(object) => self.parse_object_type(object),
            Schema::Enum(values) => {
                let choices = values
                    .iter()
                    .map(|value| self.parse_literal(value))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!(r"({})", choices.join("|")))
            }
            Schema::Const(value) => self.parse_literal(value),
            Schema::AllOf(all_of) => {
                let subregexes = self.to_regexes(all_of)?;
                Ok(format!(r"({})", subregexes.join("")))
            }
            Schema::AnyOf(any_of) => {
                let subregexes = self.to_regexes(any_of)?;
                Ok(format!(r"({})", subregexes.join("|")))
            }
            Schema::OneOf(one_of) => {
                let xor_patterns: Vec<String> = self
                    .to_regexes(one_of)?
                    .into_iter()
                    .map(|subregex| format!(r"(?:{})", subregex))
                    .collect();
                Ok(format!(r"({})", xor_patterns.join("|")))
            }
            Schema::Ref(path) => self.parse_ref(path),
        }
    }

    fn to_regexes(&mut self, schemas: &[Schema]) -> Result<Vec<String>> {
        schemas.iter().map(|schema| self.to_regex(schema)).collect()
    }

    fn parse_any(&mut self) -> Result<String> {
        let types = [
            Schema::Boolean,
            Schema::Null,
            Schema::Number(NumberSchema::default()),
            Schema::Integer(IntegerSchema::default()),
            Schema::String(StringSchema::Plain),
            Schema::Array(ArraySchema::unconstrained(DEFAULT_DEPTH)),
            Schema::FreeObject(FreeObjectSchema::unconstrained(DEFAULT_DEPTH)),
        ];
        let regex = self
            .to_regexes(&types)?
            .into_iter()
            .map(|subregex| format!("({})", subregex))
            .collect::<Vec<_>>()
            .join("|");
        Ok(regex)
    }

    fn parse_properties(&mut self, object: &ObjectSchema) -> Result<String> {
        let mut regex = String::from(r"\{");

        let is_required: Vec<bool> = object
            .properties
            .iter()
            .map(|(name, _)| object.required.contains(name))
            .collect();

        let last_required_pos = is_required.iter().rposition(|&required| required);

        if let Some(last_required_pos) = last_required_pos {
            for (i, (name, value)) in object.properties.iter().enumerate() {
                let mut subregex = self.property_prefix(name);
                subregex += &self.to_regex(value)?;
                match i {
                    i if i < last_required_pos => {
                        subregex = format!("{}{},", subregex, self.whitespace_pattern)
                    }
                    i if i > last_required_pos => {
                        subregex = format!("{},{}", self.whitespace_pattern, subregex)
                    }
                    _ => (),
                }
                regex += &if is_required[i] {
                    subregex
                } else {
                    format!("({})?", subregex)
                };
            }
        } else {
            let mut property_subregexes = Vec::with_capacity(object.properties.len());
            for (name, value) in object.properties.iter() {
                let mut subregex = self.property_prefix(name);
                subregex += &self.to_regex(value)?;
                property_subregexes.push(subregex);
            }

            let mut possible_patterns = Vec::new();
            for i in 0..property_subregexes.len() {
                let mut pattern = String::new();
                for subregex in &property_subregexes[..i] {
                    pattern += &format!("({}{},)?", subregex, self.whitespace_pattern);
                }
                pattern += &property_subregexes[i];
                for subregex in &property_subregexes[i + 1..] {
                    pattern += &format!("({},{})?", self.whitespace_pattern, subregex);
                }
                possible_patterns.push(pattern);
            }

            if !possible_patterns.is_empty() {
                regex += &format!("({})?", possible_patterns.join("|"));
            }
        }

        regex += &format!("{}\\}}", self.whitespace_pattern);
        Ok(regex)
    }

    fn property_prefix(&self, name: &str) -> String {
        format!(r#"{0}"{1}"{0}:{0}"#, self.whitespace_pattern, escape(name))
    }

    fn parse_prefix_items(&mut self, prefix_items: &[Schema]) -> Result<String> {
        let element_patterns = self.to_regexes(prefix_items)?;
        let comma_split_pattern = format!("{0},{0}", self.whitespace_pattern);
        let tuple_inner = element_patterns.join(&comma_split_pattern);
        Ok(format!(r"\[{0}{tuple_inner}{0}\]", self.whitespace_pattern))
    }

    /// Matches exactly one JSON value, modulo whitespace between structural characters.
    fn parse_literal(&self, value: &Value) -> Result<String> {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                let json_string = serde_json::to_string(value)?;
                Ok(escape(&json_string))
            }
            Value::Array(items) => {
                let elements = items
                    .iter()
                    .map(|item| self.parse_literal(item))
                    .collect::<Result<Vec<_>>>()?;
                let separator = format!("{0},{0}", self.whitespace_pattern);
                Ok(format!(
                    r"\[{0}{1}{0}\]",
                    self.whitespace_pattern,
                    elements.join(&separator)
                ))
            }
            Value::Object(members) => {
                let members = members
                    .iter()
                    .map(|(key, value)| -> Result<String> {
                        let key = escape(&serde_json::to_string(key)?);
                        Ok(format!(
                            "{key}{0}:{0}{1}",
                            self.whitespace_pattern,
                            self.parse_literal(value)?
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let separator = format!("{0},{0}", self.whitespace_pattern);
                Ok(format!(
                    r"\{{{0}{1}{0}\}}",
                    self.whitespace_pattern,
                    members.join(&separator)
                ))
            }
        }
    }

    fn parse_ref(&mut self, ref_path: &str) -> Result<String> {
        let parts: Vec<&str> = ref_path.split('#').collect();
        let fragment = match parts.as_slice() {
            [fragment] | ["", fragment] => *fragment,
            [base, fragment] => match self.root.get("$id").and_then(Value::as_str) {
                Some(id) if id == *base => *fragment,
                _ => {
                    return Err(JsonSchemaParserError::ExternalReferencesNotSupported(
                        Box::from(ref_path),
                    ))
                }
            },
            _ => {
                return Err(JsonSchemaParserError::InvalidReferenceFormat(Box::from(
                    ref_path,
                )))
            }
        };

        if self.visiting.iter().any(|path| path == fragment) {
            return Err(JsonSchemaParserError::RecursiveReference(Box::from(
                ref_path,
            )));
        }

        let referenced = Self::resolve_local_ref(self.root, fragment)?;
        let schema = Schema::from_value(referenced)?;
        self.visiting.push(fragment.to_string());
        let result = self.to_regex(&schema);
        self.visiting.pop();
        result
    }

    fn resolve_local_ref<'b>(schema: &'b Value, fragment: &str) -> Result<&'b Value> {
        let mut current = schema;
        for part in fragment.split('/').filter(|s| !s.is_empty()) {
            let part = part.replace("~1", "/").replace("~0", "~");
            current = match current {
                Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => current.get(&part),
            }
            .ok_or_else(|| JsonSchemaParserError::InvalidReferencePath(Box::from(part.as_str())))?;
        }
        Ok(current)
    }

    fn parse_string_type(&mut self, string: &StringSchema) -> Result<String> {
        match string {
            StringSchema::Length { min, max } => {
                let formatted_max = max.map_or("".to_string(), |n| format!("{}", n));
                Ok(format!(
                    r#""{}{{{},{}}}""#,
                    types::STRING_INNER,
                    min,
                    formatted_max,
                ))
            }
            StringSchema::Pattern(pattern) => {
                let pattern = pattern.strip_prefix('^').unwrap_or(pattern);
                let pattern = pattern.strip_suffix('$').unwrap_or(pattern);
                Ok(format!(r#"("{}")"#, pattern))
            }
            StringSchema::Format(format_type) => Ok(format_type.to_regex().to_string()),
            StringSchema::Plain => Ok(types::STRING.to_string()),
        }
    }

    fn parse_number_type(&mut self, number: &NumberSchema) -> Result<String> {
        if !number.has_bounds() {
            return Ok(types::NUMBER.to_string());
        }

        let (min_digits_integer, max_digits_integer) = Self::validate_quantifiers(
            number.min_digits_integer,
            number.max_digits_integer,
            1,
        )?;
        let (min_digits_fraction, max_digits_fraction) = Self::validate_quantifiers(
            number.min_digits_fraction,
            number.max_digits_fraction,
            0,
        )?;
        let (min_digits_exponent, max_digits_exponent) = Self::validate_quantifiers(
            number.min_digits_exponent,
            number.max_digits_exponent,
            0,
        )?;

        let integers_quantifier = match (min_digits_integer, max_digits_integer) {
            (Some(min), Some(max)) => format!("{{{},{}}}", min, max),
            (Some(min), None) => format!("{{{},}}", min),
            (None, Some(max)) => format!("{{1,{}}}", max),
            (None, None) => "*".to_string(),
        };
        let fraction_quantifier = match (min_digits_fraction, max_digits_fraction) {
            (Some(min), Some(max)) => format!("{{{},{}}}", min, max),
            (Some(min), None) => format!("{{{},}}", min),
            (None, Some(max)) => format!("{{0,{}}}", max),
            (None, None) => "+".to_string(),
        };
        let exponent_quantifier = match (min_digits_exponent, max_digits_exponent) {
            (Some(min), Some(max)) => format!("{{{},{}}}", min, max),
            (Some(min), None) => format!("{{{},}}", min),
            (None, Some(max)) => format!("{{0,{}}}", max),
            (None, None) => "+".to_string(),
        };

        Ok(format!(
            r"((-)?(0|[1-9][0-9]{}))(\.[0-9]{})?([eE][+-][0-9]{})?",
            integers_quantifier, fraction_quantifier, exponent_quantifier
        ))
    }

    fn parse_integer_type(&mut self, integer: &IntegerSchema) -> Result<String> {
        if integer.min_digits.is_none() && integer.max_digits.is_none() {
            return Ok(types::INTEGER.to_string());
        }
        let (min_digits, max_digits) =
            Self::validate_quantifiers(integer.min_digits, integer.max_digits, 1)?;

        let quantifier = match (min_digits, max_digits) {
            (Some(min), Some(max)) => format!("{{{},{}}}", min, max),
            (Some(min), None) => format!("{{{},}}", min),
            (None, Some(max)) => format!("{{0,{}}}", max),
            (None, None) => "*".to_string(),
        };

        Ok(format!(r"(-)?(0|[1-9][0-9]{})", quantifier))
    }

    fn parse_object_type(&mut self, object: &FreeObjectSchema) -> Result<String> {
        let num_repeats = Self::get_num_items_pattern(object.min_properties, object.max_properties);

        if num_repeats.is_none() {
            return Ok(format!(r"\{{{}\}}", self.whitespace_pattern));
        }

        let allow_empty = if object.min_properties.unwrap_or(0) == 0 {
            "?"
        } else {
            ""
        };

        let value_pattern = match &object.additional {
            None => {
                let legal_types = self.legal_value_types(object.depth, false);
                let any_of = Schema::AnyOf(legal_types);
                self.to_regex(&any_of)?
            }
            Some(schema) => self.to_regex(schema)?,
        };

        let key_value_pattern = format!(
            "{}{1}:{1}{value_pattern}",
            types::STRING,
            self.whitespace_pattern,
        );
        let key_value_successor_pattern =
            format!("{0},{0}{key_value_pattern}", self.whitespace_pattern,);
        let multiple_key_value_pattern =
            format!("({key_value_pattern}({key_value_successor_pattern}){{0,}}){allow_empty}");

        Ok(format!(
            r"\{{{0}{1}{0}\}}",
            self.whitespace_pattern, multiple_key_value_pattern
        ))
    }

    fn parse_array_type(&mut self, array: &ArraySchema) -> Result<String> {
        let num_repeats = match Self::get_num_items_pattern(array.min_items, array.max_items) {
            Some(num_repeats) => num_repeats,
            None => return Ok(format!(r"\[{0}\]", self.whitespace_pattern)),
        };

        let allow_empty = if array.min_items.unwrap_or(0) == 0 {
            "?"
        } else {
            ""
        };

        let items_regex = match &array.items {
            Some(items) => self.to_regex(items)?,
            None => {
                // parse unconstrained object case
                let legal_types = self.legal_value_types(array.depth, true);
                self.to_regexes(&legal_types)?.join("|")
            }
        };

        Ok(format!(
            r"\[{0}(({1})(,{0}({1})){2}){3}{0}\]",
            self.whitespace_pattern, items_regex, num_repeats, allow_empty
        ))
    }

    /// Value types allowed inside unconstrained containers, nesting until `depth` runs out.
    fn legal_value_types(&self, depth: u64, with_integer: bool) -> Vec<Schema> {
        let mut legal_types = vec![
            Schema::Boolean,
            Schema::Null,
            Schema::Number(NumberSchema::default()),
        ];
        if with_integer {
            legal_types.push(Schema::Integer(IntegerSchema::default()));
        }
        legal_types.push(Schema::String(StringSchema::Plain));
        if depth > 0 {
            legal_types.push(Schema::FreeObject(FreeObjectSchema::unconstrained(
                depth - 1,
            )));
            legal_types.push(Schema::Array(ArraySchema::unconstrained(depth - 1)));
        }
        legal_types
    }

    fn validate_quantifiers(
        min_bound: Option<u64>,
        max_bound: Option<u64>,
        start_offset: u64,
    ) -> Result<(Option<NonZeroU64>, Option<NonZeroU64>)> {
        let min_bound = min_bound.map(|n| NonZeroU64::new(n.saturating_sub(start_offset)));
        let max_bound = max_bound.map(|n| NonZeroU64::new(n.saturating_sub(start_offset)));

        if let (Some(min), Some(max)) = (min_bound, max_bound) {
            if max < min {
                return Err(JsonSchemaParserError::MaxBoundError);
            }
        }

        Ok((min_bound.flatten(), max_bound.flatten()))
    }

    fn get_num_items_pattern(min_items: Option<u64>, max_items: Option<u64>) -> Option<String> {
        let min_items = min_items.unwrap_or(0);

        match max_items {
            None => Some(format!("{{{},}}", min_items.saturating_sub(1))),
            Some(max_items) => {
                if max_items < 1 {
                    None
                } else {
                    Some(format!(
                        "{{{},{}}}",
                        min_items.saturating_sub(1),
                        max_items.saturating_sub(1)
                    ))
                }
            }
        }
    }
}
