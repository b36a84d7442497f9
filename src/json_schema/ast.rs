//! Typed representation of the supported JSON schema subset.
//!
//! [`Schema::from_value`] validates a `serde_json::Value` while converting it, so every
//! structural problem is reported before any regex is produced. References are kept as
//! [`Schema::Ref`] nodes and resolved lazily during lowering, which keeps this tree finite even
//! for self-referential documents.

use serde_json::{Map, Value};

use crate::json_schema::types::{FormatType, JsonType};
use crate::JsonSchemaParserError;

type Result<T> = std::result::Result<T, JsonSchemaParserError>;

/// Default nesting budget for unconstrained arrays and objects.
pub const DEFAULT_DEPTH: u64 = 2;

/// Keywords that carry no constraint.
const ANNOTATIONS: &[&str] = &[
    "title",
    "description",
    "default",
    "examples",
    "$schema",
    "$id",
    "$comment",
    "definitions",
    "$defs",
    "deprecated",
    "readOnly",
    "writeOnly",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Any JSON value.
    Any,
    Null,
    Boolean,
    Integer(IntegerSchema),
    Number(NumberSchema),
    String(StringSchema),
    Array(ArraySchema),
    /// `prefixItems`: a fixed sequence of element schemas.
    Tuple(Vec<Schema>),
    /// An object with declared `properties`.
    Object(ObjectSchema),
    /// An object of arbitrary keys.
    FreeObject(FreeObjectSchema),
    Enum(Vec<Value>),
    Const(Value),
    AllOf(Vec<Schema>),
    AnyOf(Vec<Schema>),
    OneOf(Vec<Schema>),
    /// Local JSON pointer, resolved against the root document.
    Ref(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegerSchema {
    pub min_digits: Option<u64>,
    pub max_digits: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberSchema {
    pub min_digits_integer: Option<u64>,
    pub max_digits_integer: Option<u64>,
    pub min_digits_fraction: Option<u64>,
    pub max_digits_fraction: Option<u64>,
    pub min_digits_exponent: Option<u64>,
    pub max_digits_exponent: Option<u64>,
}

impl NumberSchema {
    pub fn has_bounds(&self) -> bool {
        *self != Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StringSchema {
    Plain,
    Length { min: u64, max: Option<u64> },
    Pattern(String),
    Format(FormatType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    /// `None` allows any value, nested containers bounded by `depth`.
    pub items: Option<Box<Schema>>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub depth: u64,
}

impl ArraySchema {
    pub fn unconstrained(depth: u64) -> Self {
        Self {
            items: None,
            min_items: None,
            max_items: None,
            depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    /// Properties in declaration order.
    pub properties: Vec<(String, Schema)>,
    pub required: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreeObjectSchema {
    /// Schema of every value, `None` allows any value bounded by `depth`.
    pub additional: Option<Box<Schema>>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub depth: u64,
}

impl FreeObjectSchema {
    pub fn unconstrained(depth: u64) -> Self {
        Self {
            additional: None,
            min_properties: None,
            max_properties: None,
            depth,
        }
    }
}

impl Schema {
    pub fn from_value(value: &Value) -> Result<Schema> {
        match value {
            Value::Bool(true) => Ok(Schema::Any),
            Value::Bool(false) => Err(JsonSchemaParserError::FalseSchema),
            Value::Object(obj) => Self::from_object(obj),
            other => Err(JsonSchemaParserError::NotAnObject(Box::new(other.clone()))),
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Result<Schema> {
        if obj.contains_key("properties") {
            Self::parse_properties(obj)
        } else if let Some(all_of) = obj.get("allOf") {
            Self::parse_list(all_of, JsonSchemaParserError::AllOfMustBeAnArray).map(Schema::AllOf)
        } else if let Some(any_of) = obj.get("anyOf") {
            Self::parse_list(any_of, JsonSchemaParserError::AnyOfMustBeAnArray).map(Schema::AnyOf)
        } else if let Some(one_of) = obj.get("oneOf") {
            Self::parse_list(one_of, JsonSchemaParserError::OneOfMustBeAnArray).map(Schema::OneOf)
        } else if let Some(prefix_items) = obj.get("prefixItems") {
            Self::parse_list(
                prefix_items,
                JsonSchemaParserError::PrefixItemsMustBeAnArray,
            )
            .map(Schema::Tuple)
        } else if obj.contains_key("enum") {
            Self::parse_enum(obj)
        } else if let Some(value) = obj.get("const") {
            Self::check_declared_type(obj, "const", value)?;
            Ok(Schema::Const(value.clone()))
        } else if let Some(reference) = obj.get("$ref") {
            match reference.as_str() {
                Some(path) => Ok(Schema::Ref(path.to_string())),
                None => Err(JsonSchemaParserError::RefMustBeAString),
            }
        } else if let Some(instance_type) = obj.get("type") {
            match instance_type {
                Value::String(name) => Self::parse_type(obj, name),
                Value::Array(names) => {
                    let alternatives = names
                        .iter()
                        .map(|name| match name.as_str() {
                            Some(name) => Self::parse_type(obj, name),
                            None => Err(JsonSchemaParserError::TypeMustBeAString),
                        })
                        .collect::<Result<Vec<_>>>()?;
                    match alternatives.len() {
                        0 => Err(JsonSchemaParserError::TypeMustBeAString),
                        _ => Ok(Schema::AnyOf(alternatives)),
                    }
                }
                _ => Err(JsonSchemaParserError::TypeMustBeAString),
            }
        } else if obj.keys().all(|key| ANNOTATIONS.contains(&key.as_str())) {
            // JSON Schema Spec: Empty object means unconstrained, any json type is legal
            Ok(Schema::Any)
        } else {
            Err(JsonSchemaParserError::UnsupportedJsonSchema(Box::new(
                Value::Object(obj.clone()),
            )))
        }
    }

    fn parse_list(value: &Value, error: JsonSchemaParserError) -> Result<Vec<Schema>> {
        match value {
            Value::Array(items) => items.iter().map(Self::from_value).collect(),
            _ => Err(error),
        }
    }

    fn parse_properties(obj: &Map<String, Value>) -> Result<Schema> {
        let properties = obj
            .get("properties")
            .and_then(Value::as_object)
            .ok_or(JsonSchemaParserError::PropertiesMustBeAnObject)?;

        let properties = properties
            .iter()
            .map(|(name, value)| match value {
                Value::Object(_) | Value::Bool(_) => Ok((name.clone(), Self::from_value(value)?)),
                _ => Err(JsonSchemaParserError::PropertyMustBeAnObject(Box::from(
                    name.as_str(),
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        let required = match obj.get("required") {
            None => vec![],
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| {
                    name.as_str()
                        .map(str::to_string)
                        .ok_or(JsonSchemaParserError::RequiredMustBeAnArray)
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(JsonSchemaParserError::RequiredMustBeAnArray),
        };
        if let Some(unknown) = required
            .iter()
            .find(|name| !properties.iter().any(|(key, _)| key == *name))
        {
            return Err(JsonSchemaParserError::UnknownRequiredProperty(Box::from(
                unknown.as_str(),
            )));
        }

        Ok(Schema::Object(ObjectSchema {
            properties,
            required,
        }))
    }

    fn parse_enum(obj: &Map<String, Value>) -> Result<Schema> {
        let values = obj
            .get("enum")
            .and_then(Value::as_array)
            .ok_or(JsonSchemaParserError::EnumMustBeAnArray)?;
        if values.is_empty() {
            return Err(JsonSchemaParserError::EmptyEnum);
        }
        for value in values {
            Self::check_declared_type(obj, "enum", value)?;
        }
        Ok(Schema::Enum(values.clone()))
    }

    /// Rejects `enum`/`const` values that contradict a declared `type`.
    fn check_declared_type(obj: &Map<String, Value>, keyword: &str, value: &Value) -> Result<()> {
        let declared: Vec<&str> = match obj.get("type") {
            None => return Ok(()),
            Some(Value::String(name)) => vec![name.as_str()],
            Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
            Some(_) => return Err(JsonSchemaParserError::TypeMustBeAString),
        };
        let mut admitted = false;
        for name in &declared {
            let json_type = JsonType::from_name(name)
                .ok_or_else(|| JsonSchemaParserError::UnsupportedType(Box::from(*name)))?;
            admitted |= json_type.admits(value);
        }
        if admitted {
            Ok(())
        } else {
            Err(JsonSchemaParserError::TypeMismatch {
                keyword: Box::from(keyword),
                expected: Box::from(declared.join(", ")),
                value: Box::new(value.clone()),
            })
        }
    }

    fn parse_type(obj: &Map<String, Value>, name: &str) -> Result<Schema> {
        match JsonType::from_name(name) {
            Some(JsonType::String) => Self::parse_string_type(obj),
            Some(JsonType::Integer) => Ok(Schema::Integer(IntegerSchema {
                min_digits: bound(obj, "minDigits")?,
                max_digits: bound(obj, "maxDigits")?,
            })),
            Some(JsonType::Number) => Ok(Schema::Number(NumberSchema {
                min_digits_integer: bound(obj, "minDigitsInteger")?,
                max_digits_integer: bound(obj, "maxDigitsInteger")?,
                min_digits_fraction: bound(obj, "minDigitsFraction")?,
                max_digits_fraction: bound(obj, "maxDigitsFraction")?,
                min_digits_exponent: bound(obj, "minDigitsExponent")?,
                max_digits_exponent: bound(obj, "maxDigitsExponent")?,
            })),
            Some(JsonType::Boolean) => Ok(Schema::Boolean),
            Some(JsonType::Null) => Ok(Schema::Null),
            Some(JsonType::Array) => Self::parse_array_type(obj),
            Some(JsonType::Object) => Self::parse_object_type(obj),
            None => Err(JsonSchemaParserError::UnsupportedType(Box::from(name))),
        }
    }

    fn parse_string_type(obj: &Map<String, Value>) -> Result<Schema> {
        let min_length = bound(obj, "minLength")?;
        let max_length = bound(obj, "maxLength")?;
        if min_length.is_some() || max_length.is_some() {
            let min = min_length.unwrap_or(0);
            if max_length.is_some_and(|max| max < min) {
                return Err(JsonSchemaParserError::MaxBoundError);
            }
            return Ok(Schema::String(StringSchema::Length {
                min,
                max: max_length,
            }));
        }
        if let Some(pattern) = obj.get("pattern") {
            let pattern = pattern
                .as_str()
                .ok_or(JsonSchemaParserError::PatternMustBeAString)?;
            return Ok(Schema::String(StringSchema::Pattern(pattern.to_string())));
        }
        if let Some(format) = obj.get("format").and_then(Value::as_str) {
            return match FormatType::from_str(format) {
                Some(format_type) => Ok(Schema::String(StringSchema::Format(format_type))),
                None => Err(JsonSchemaParserError::StringTypeUnsupportedFormat(
                    Box::from(format),
                )),
            };
        }
        Ok(Schema::String(StringSchema::Plain))
    }

    fn parse_array_type(obj: &Map<String, Value>) -> Result<Schema> {
        let min_items = bound(obj, "minItems")?;
        let max_items = bound(obj, "maxItems")?;
        if let (Some(min), Some(max)) = (min_items, max_items) {
            if max < min {
                return Err(JsonSchemaParserError::MaxBoundError);
            }
        }
        let items = match obj.get("items") {
            None => None,
            Some(items @ (Value::Object(_) | Value::Bool(_))) => {
                Some(Box::new(Self::from_value(items)?))
            }
            Some(_) => return Err(JsonSchemaParserError::ItemsMustBeASchema),
        };
        Ok(Schema::Array(ArraySchema {
            items,
            min_items,
            max_items,
            depth: bound(obj, "depth")?.unwrap_or(DEFAULT_DEPTH),
        }))
    }

    fn parse_object_type(obj: &Map<String, Value>) -> Result<Schema> {
        let min_properties = bound(obj, "minProperties")?;
        let mut max_properties = bound(obj, "maxProperties")?;
        let additional = match obj.get("additionalProperties") {
            None | Some(Value::Bool(true)) => None,
            Some(Value::Bool(false)) => {
                // Nothing is declared and nothing else is allowed: only `{}` fits.
                max_properties = Some(0);
                None
            }
            Some(schema) => Some(Box::new(Self::from_value(schema)?)),
        };
        if let (Some(min), Some(max)) = (min_properties, max_properties) {
            if max < min {
                return Err(JsonSchemaParserError::MaxBoundError);
            }
        }
        Ok(Schema::FreeObject(FreeObjectSchema {
            additional,
            min_properties,
            max_properties,
            depth: bound(obj, "depth")?.unwrap_or(DEFAULT_DEPTH),
        }))
    }
}

/// Reads an optional non-negative integer keyword.
fn bound(obj: &Map<String, Value>, key: &str) -> Result<Option<u64>> {
    match obj.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| JsonSchemaParserError::InvalidBound(Box::from(key))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn converts_nested_structures() {
        let schema = Schema::from_value(&json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "maxLength": 4},
                "tags": {"type": "array", "items": {"type": "string", "format": "uuid"}},
                "next": {"$ref": "#/$defs/node"}
            },
            "required": ["name"]
        }))
        .expect("Schema failed");

        let Schema::Object(object) = schema else {
            unreachable!("expected an object schema")
        };
        assert_eq!(object.required, vec!["name".to_string()]);
        let names: Vec<&str> = object.properties.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["name", "tags", "next"]);
        assert_eq!(
            object.properties[0].1,
            Schema::String(StringSchema::Length {
                min: 0,
                max: Some(4)
            })
        );
        assert_eq!(object.properties[2].1, Schema::Ref("#/$defs/node".into()));
    }

    #[test]
    fn unconstrained_forms() {
        for value in [json!({}), json!(true), json!({"title": "Anything"})] {
            assert_eq!(Schema::from_value(&value).expect("Schema failed"), Schema::Any);
        }
        assert_eq!(
            Schema::from_value(&json!({"type": ["string", "null"]})).expect("Schema failed"),
            Schema::AnyOf(vec![Schema::String(StringSchema::Plain), Schema::Null])
        );
    }

    #[test]
    fn rejects_malformed_documents() {
        for value in [
            json!(0),
            json!("string"),
            json!(false),
            json!({"type": "object", "properties": {"foo": "bar"}}),
            json!({"type": "object", "properties": []}),
            json!({"type": "object", "properties": {"a": {"type": "integer"}}, "required": "a"}),
            json!({"type": "object", "properties": {"a": {"type": "integer"}}, "required": ["b"]}),
            json!({"type": "unknown"}),
            json!({"type": 3}),
            json!({"enum": "a"}),
            json!({"enum": []}),
            json!({"allOf": {}}),
            json!({"$ref": 1}),
            json!({"type": "string", "minLength": -1}),
            json!({"type": "string", "minLength": 3, "maxLength": 2}),
            json!({"type": "array", "minItems": 3, "maxItems": 2}),
            json!({"type": "array", "items": 1}),
            json!({"type": "string", "format": "ipv8"}),
            json!({"type": "string", "pattern": 12}),
            json!({"not": {"type": "string"}}),
        ] {
            assert!(Schema::from_value(&value).is_err(), "{value} should fail");
        }
    }

    #[test]
    fn rejects_type_mismatches() {
        for value in [
            json!({"type": "integer", "const": "a"}),
            json!({"type": "integer", "const": 1.5}),
            json!({"type": "string", "enum": ["a", 1]}),
            json!({"type": ["string", "null"], "enum": [true]}),
        ] {
            match Schema::from_value(&value) {
                Err(JsonSchemaParserError::TypeMismatch { .. }) => {}
                other => unreachable!("{value} gave {other:?}"),
            }
        }
        for value in [
            json!({"type": "integer", "const": 2.0}),
            json!({"type": "number", "enum": [1, 2.5]}),
            json!({"type": ["string", "null"], "enum": ["a", null]}),
        ] {
            assert!(Schema::from_value(&value).is_ok(), "{value} should pass");
        }
    }

    #[test]
    fn additional_properties_false_means_empty_object() {
        let schema = Schema::from_value(&json!({"type": "object", "additionalProperties": false}))
            .expect("Schema failed");
        assert_eq!(
            schema,
            Schema::FreeObject(FreeObjectSchema {
                additional: None,
                min_properties: None,
                max_properties: Some(0),
                depth: DEFAULT_DEPTH,
            })
        );
    }
}
