//! Schema description format and validator for structured OCR output.
//!
//! A [`Schema`] is a small, explicit description of the JSON shape a caller
//! expects. It is read from and written as a subset of JSON Schema, so the
//! same value is both sent to the API's structured-output mode and used to
//! check what comes back:
//!
//! | JSON Schema | [`Schema`] |
//! |-------------|------------|
//! | `{}` / `true` | `Any` |
//! | `{"type": "string"}` | `String` |
//! | `{"type": "number"}` / `"integer"` / `"boolean"` | `Number` / `Integer` / `Boolean` |
//! | `{"enum": ["a", "b"]}` | `Enum` |
//! | `{"type": "array", "items": …}` | `Array` |
//! | `{"type": "object", "properties": …, "required": […], "additionalProperties": bool}` | `Object` |
//! | `{"type": ["string", "null"]}` | `Nullable(String)` |
//!
//! Any other keyword (`anyOf`, `$ref`, `const`, `pattern`, `minimum`, ...)
//! is refused with [`OcrError::InvalidSchema`] rather than ignored, so a
//! parsed schema is never looser than the file it came from. Annotations
//! such as `title` and `description` are accepted and dropped.
//!
//! [`Schema::validate`] never stops at the first problem: it walks the whole
//! value and returns every field-level error with its JSON path.

use crate::error::{OcrError, ValidationErrors};
use serde_json::{json, Map, Value};

/// Expected shape of a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Any value, including `null`.
    Any,
    String,
    Number,
    Integer,
    Boolean,
    /// A string drawn from a fixed set.
    Enum(Vec<String>),
    /// The inner schema, or `null`.
    Nullable(Box<Schema>),
    Array(Box<Schema>),
    Object(ObjectSchema),
}

/// Properties of an object schema, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    pub properties: Vec<(String, Schema)>,
    pub required: Vec<String>,
    /// Whether keys not listed in `properties` are accepted.
    pub additional_properties: bool,
}

impl Default for ObjectSchema {
    fn default() -> Self {
        Self {
            properties: Vec::new(),
            required: Vec::new(),
            additional_properties: true,
        }
    }
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property that must be present.
    pub fn required(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.push((name, schema));
        self
    }

    /// Add a property that may be absent.
    pub fn optional(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.push((name.into(), schema));
        self
    }

    /// Reject keys not declared as properties.
    pub fn deny_unknown(mut self) -> Self {
        self.additional_properties = false;
        self
    }

    pub fn property(&self, name: &str) -> Option<&Schema> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }
}

impl From<ObjectSchema> for Schema {
    fn from(o: ObjectSchema) -> Self {
        Schema::Object(o)
    }
}

impl Schema {
    /// An object with any keys and values: the default shape of `ocr_contents`.
    pub fn permissive_object() -> Self {
        Schema::Object(ObjectSchema::new())
    }

    pub fn array(items: Schema) -> Self {
        Schema::Array(Box::new(items))
    }

    pub fn nullable(inner: Schema) -> Self {
        Schema::Nullable(Box::new(inner))
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::Enum(values.into_iter().map(Into::into).collect())
    }

    /// Parse the supported JSON Schema subset.
    pub fn from_json(value: &Value) -> Result<Schema, OcrError> {
        parse_schema(value, "$")
    }

    /// Read a schema from a JSON file.
    pub fn from_json_str(text: &str) -> Result<Schema, OcrError> {
        let value: Value = serde_json::from_str(text).map_err(|e| OcrError::InvalidSchema {
            path: "$".into(),
            reason: format!("not valid JSON: {e}"),
        })?;
        Self::from_json(&value)
    }

    /// Emit the JSON Schema sent to the structured-output endpoint.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Schema::Any => json!({}),
            Schema::String => json!({"type": "string"}),
            Schema::Number => json!({"type": "number"}),
            Schema::Integer => json!({"type": "integer"}),
            Schema::Boolean => json!({"type": "boolean"}),
            Schema::Enum(values) => json!({"type": "string", "enum": values}),
            Schema::Nullable(inner) => {
                let mut v = inner.to_json_schema();
                match v.get("type").cloned() {
                    Some(Value::String(t)) => {
                        v["type"] = json!([t, "null"]);
                        if let Some(Value::Array(values)) = v.get_mut("enum") {
                            values.push(Value::Null);
                        }
                        v
                    }
                    _ => json!({"anyOf": [v, {"type": "null"}]}),
                }
            }
            Schema::Array(items) => json!({"type": "array", "items": items.to_json_schema()}),
            Schema::Object(o) => {
                let mut props = Map::new();
                for (name, schema) in &o.properties {
                    props.insert(name.clone(), schema.to_json_schema());
                }
                json!({
                    "type": "object",
                    "properties": props,
                    "required": o.required,
                    "additionalProperties": o.additional_properties,
                })
            }
        }
    }

    /// Check `value` against this schema, collecting every field error.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_at(self, value, "$", &mut errors);
        errors.into_result()
    }

    /// Like [`Schema::validate`] but records into an existing error list,
    /// rooted at `path`.
    pub fn validate_into(&self, value: &Value, path: &str, errors: &mut ValidationErrors) {
        validate_at(self, value, path, errors);
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────

fn invalid(path: &str, reason: impl Into<String>) -> OcrError {
    OcrError::InvalidSchema {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Keywords the validator enforces.
const CHECKED_KEYWORDS: &[&str] = &[
    "type",
    "properties",
    "required",
    "additionalProperties",
    "items",
    "enum",
];

/// Keywords that carry no constraint.
const ANNOTATIONS: &[&str] = &[
    "title",
    "description",
    "$schema",
    "$id",
    "$comment",
    "default",
    "examples",
];

fn parse_schema(value: &Value, path: &str) -> Result<Schema, OcrError> {
    let obj = match value {
        Value::Bool(true) => return Ok(Schema::Any),
        Value::Object(o) => o,
        other => return Err(invalid(path, format!("expected a schema object, found {}", type_name(other)))),
    };

    if let Some(key) = obj
        .keys()
        .find(|k| !CHECKED_KEYWORDS.contains(&k.as_str()) && !ANNOTATIONS.contains(&k.as_str()))
    {
        return Err(invalid(path, format!("unsupported keyword '{key}'")));
    }

    if let Some(values) = obj.get("enum") {
        let list = values
            .as_array()
            .ok_or_else(|| invalid(path, "'enum' must be an array"))?;
        let mut out = Vec::with_capacity(list.len());
        let mut nullable = false;
        for v in list {
            match v {
                Value::String(s) => out.push(s.clone()),
                Value::Null => nullable = true,
                other => {
                    return Err(invalid(
                        path,
                        format!("only string enum values are supported, found {}", type_name(other)),
                    ))
                }
            }
        }
        let schema = Schema::Enum(out);
        return Ok(if nullable { Schema::nullable(schema) } else { schema });
    }

    let type_field = match obj.get("type") {
        None => return Ok(Schema::Any),
        Some(t) => t,
    };

    match type_field {
        Value::String(t) => parse_typed(t, obj, path),
        Value::Array(types) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            if names.len() != types.len() {
                return Err(invalid(path, "'type' array must contain strings"));
            }
            let non_null: Vec<&str> = names.iter().copied().filter(|t| *t != "null").collect();
            match (non_null.as_slice(), names.len() - non_null.len()) {
                ([t], 1) => Ok(Schema::nullable(parse_typed(t, obj, path)?)),
                ([t], 0) => parse_typed(t, obj, path),
                _ => Err(invalid(path, "only [T] or [T, \"null\"] type unions are supported")),
            }
        }
        other => Err(invalid(path, format!("'type' must be a string, found {}", type_name(other)))),
    }
}

fn parse_typed(t: &str, obj: &Map<String, Value>, path: &str) -> Result<Schema, OcrError> {
    match t {
        "string" => Ok(Schema::String),
        "number" => Ok(Schema::Number),
        "integer" => Ok(Schema::Integer),
        "boolean" => Ok(Schema::Boolean),
        "array" => {
            let items = match obj.get("items") {
                Some(items) => parse_schema(items, &format!("{path}.items"))?,
                None => Schema::Any,
            };
            Ok(Schema::array(items))
        }
        "object" => {
            let mut schema = ObjectSchema::new();
            if let Some(props) = obj.get("properties") {
                let props = props
                    .as_object()
                    .ok_or_else(|| invalid(path, "'properties' must be an object"))?;
                for (name, sub) in props {
                    let sub = parse_schema(sub, &format!("{path}.properties.{name}"))?;
                    schema.properties.push((name.clone(), sub));
                }
            }
            if let Some(required) = obj.get("required") {
                let required = required
                    .as_array()
                    .ok_or_else(|| invalid(path, "'required' must be an array"))?;
                for r in required {
                    let name = r
                        .as_str()
                        .ok_or_else(|| invalid(path, "'required' entries must be strings"))?;
                    if schema.property(name).is_none() {
                        schema.properties.push((name.to_string(), Schema::Any));
                    }
                    schema.required.push(name.to_string());
                }
            }
            match obj.get("additionalProperties") {
                None => {}
                Some(Value::Bool(b)) => schema.additional_properties = *b,
                Some(_) => {
                    return Err(invalid(
                        path,
                        "only boolean 'additionalProperties' is supported",
                    ))
                }
            }
            Ok(Schema::Object(schema))
        }
        "null" => Err(invalid(path, "a bare 'null' type is not supported")),
        other => Err(invalid(path, format!("unknown type '{other}'"))),
    }
}

// ── Validation ───────────────────────────────────────────────────────────

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(expected: &str, found: &Value) -> String {
    format!("expected {expected}, found {}", type_name(found))
}

fn validate_at(schema: &Schema, value: &Value, path: &str, errors: &mut ValidationErrors) {
    match schema {
        Schema::Any => {}
        Schema::String => {
            if !value.is_string() {
                errors.push(path, mismatch("string", value));
            }
        }
        Schema::Number => {
            if !value.is_number() {
                errors.push(path, mismatch("number", value));
            }
        }
        Schema::Integer => {
            let whole = value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|f| f.fract() == 0.0);
            if !whole {
                errors.push(path, mismatch("integer", value));
            }
        }
        Schema::Boolean => {
            if !value.is_boolean() {
                errors.push(path, mismatch("boolean", value));
            }
        }
        Schema::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.iter().any(|a| a == s) => {}
            Some(s) => errors.push(
                path,
                format!("'{s}' is not one of [{}]", allowed.join(", ")),
            ),
            None => errors.push(path, mismatch("string", value)),
        },
        Schema::Nullable(inner) => {
            if !value.is_null() {
                validate_at(inner, value, path, errors);
            }
        }
        Schema::Array(items) => match value.as_array() {
            Some(list) => {
                for (i, item) in list.iter().enumerate() {
                    validate_at(items, item, &format!("{path}[{i}]"), errors);
                }
            }
            None => errors.push(path, mismatch("array", value)),
        },
        Schema::Object(o) => {
            let Some(map) = value.as_object() else {
                errors.push(path, mismatch("object", value));
                return;
            };
            for name in &o.required {
                if !map.contains_key(name) {
                    errors.push(format!("{path}.{name}"), "missing required field");
                }
            }
            for (key, v) in map {
                match o.property(key) {
                    Some(sub) => validate_at(sub, v, &format!("{path}.{key}"), errors),
                    None if !o.additional_properties => {
                        errors.push(format!("{path}.{key}"), "unexpected field")
                    }
                    None => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt_schema() -> Schema {
        ObjectSchema::new()
            .required("store", Schema::String)
            .required("total", Schema::Number)
            .optional(
                "items",
                Schema::array(
                    ObjectSchema::new()
                        .required("name", Schema::String)
                        .required("qty", Schema::Integer)
                        .into(),
                ),
            )
            .deny_unknown()
            .into()
    }

    #[test]
    fn conforming_value_passes() {
        let v = json!({
            "store": "Corner Shop",
            "total": 12.5,
            "items": [{"name": "tea", "qty": 2}]
        });
        assert!(receipt_schema().validate(&v).is_ok());
    }

    #[test]
    fn collects_every_field_error() {
        let v = json!({
            "store": 7,
            "items": [{"name": "tea", "qty": 1.5}, {"qty": 1}],
            "cashier": "Bob"
        });
        let errs = receipt_schema().validate(&v).unwrap_err();
        assert!(errs.has_path("$.store"), "{errs}");
        assert!(errs.has_path("$.total"), "{errs}");
        assert!(errs.has_path("$.items[0].qty"), "{errs}");
        assert!(errs.has_path("$.items[1].name"), "{errs}");
        assert!(errs.has_path("$.cashier"), "{errs}");
        assert_eq!(errs.len(), 5);
    }

    #[test]
    fn number_is_not_coerced_from_string() {
        let errs = Schema::Number.validate(&json!("12.5")).unwrap_err();
        assert_eq!(errs.errors[0].message, "expected number, found string");
    }

    #[test]
    fn permissive_object_accepts_any_mapping() {
        let s = Schema::permissive_object();
        assert!(s.validate(&json!({"a": {"b": [1, "x", null]}})).is_ok());
        assert!(s.validate(&json!([1, 2])).is_err());
    }

    #[test]
    fn enum_and_nullable() {
        let s = Schema::nullable(Schema::enumeration(["paid", "due"]));
        assert!(s.validate(&json!("paid")).is_ok());
        assert!(s.validate(&Value::Null).is_ok());
        let errs = s.validate(&json!("lost")).unwrap_err();
        assert!(errs.errors[0].message.contains("not one of [paid, due]"));
    }

    #[test]
    fn parses_json_schema_subset() {
        let raw = json!({
            "type": "object",
            "properties": {
                "date": {"type": ["string", "null"]},
                "lines": {"type": "array", "items": {"type": "string"}},
                "status": {"enum": ["ok", "void"]}
            },
            "required": ["lines"],
            "additionalProperties": false
        });
        let s = Schema::from_json(&raw).unwrap();
        let Schema::Object(o) = &s else { panic!("expected object") };
        assert_eq!(o.required, vec!["lines".to_string()]);
        assert!(!o.additional_properties);
        assert_eq!(o.property("date"), Some(&Schema::nullable(Schema::String)));
        assert_eq!(o.property("lines"), Some(&Schema::array(Schema::String)));
        assert_eq!(
            o.property("status"),
            Some(&Schema::enumeration(["ok", "void"]))
        );
    }

    #[test]
    fn emitted_schema_parses_back_to_same_shape() {
        let s = receipt_schema();
        let back = Schema::from_json(&s.to_json_schema()).unwrap();
        let (Schema::Object(a), Schema::Object(b)) = (&s, &back) else {
            panic!("expected objects")
        };
        assert_eq!(a.required, b.required);
        assert_eq!(a.additional_properties, b.additional_properties);
        for (name, schema) in &a.properties {
            assert_eq!(b.property(name), Some(schema), "property {name}");
        }
    }

    #[test]
    fn rejects_unsupported_constructs() {
        let err = Schema::from_json(&json!({"type": "date"})).unwrap_err();
        assert!(err.to_string().contains("unknown type 'date'"));

        let err = Schema::from_json(&json!({
            "type": "object",
            "additionalProperties": {"type": "string"}
        }))
        .unwrap_err();
        assert!(matches!(err, OcrError::InvalidSchema { .. }));

        assert!(Schema::from_json_str("{not json").is_err());
    }

    #[test]
    fn rejects_keywords_it_cannot_check() {
        let cases = [
            json!({"anyOf": [{"type": "string"}, {"type": "number"}]}),
            json!({"oneOf": [{"type": "string"}]}),
            json!({"allOf": [{"type": "string"}]}),
            json!({"$ref": "#/$defs/item"}),
            json!({"const": "fixed"}),
            json!({"type": "string", "maxLength": 3}),
            json!({"type": "string", "pattern": "^[A-Z]+$"}),
            json!({"type": "string", "format": "date"}),
            json!({"type": "number", "minimum": 0}),
            json!({"type": "array", "items": {"type": "string"}, "minItems": 1}),
        ];
        for raw in cases {
            let err = Schema::from_json(&raw).unwrap_err();
            assert!(
                matches!(err, OcrError::InvalidSchema { .. }),
                "{raw} should be rejected, got {err:?}"
            );
            assert!(err.to_string().contains("unsupported keyword"), "{err}");
        }
    }

    #[test]
    fn nested_unsupported_keyword_reports_its_path() {
        let raw = json!({
            "type": "object",
            "properties": {
                "total": {"type": "number", "exclusiveMinimum": 0}
            }
        });
        match Schema::from_json(&raw).unwrap_err() {
            OcrError::InvalidSchema { path, reason } => {
                assert_eq!(path, "$.properties.total");
                assert!(reason.contains("exclusiveMinimum"));
            }
            other => panic!("expected InvalidSchema, got {other:?}"),
        }
    }

    #[test]
    fn annotations_are_accepted() {
        let raw = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "title": "Receipt",
            "description": "A shop receipt",
            "type": "object",
            "properties": {
                "total": {"type": "number", "description": "Grand total", "examples": [9.99]}
            }
        });
        let s = Schema::from_json(&raw).unwrap();
        let Schema::Object(o) = &s else { panic!("expected object") };
        assert_eq!(o.property("total"), Some(&Schema::Number));
    }

    #[test]
    fn integer_accepts_whole_floats() {
        assert!(Schema::Integer.validate(&json!(1.0)).is_ok());
        assert!(Schema::Integer.validate(&json!(-3)).is_ok());
        let errs = Schema::Integer.validate(&json!(1.5)).unwrap_err();
        assert_eq!(errs.errors[0].message, "expected integer, found number");
    }

    #[test]
    fn empty_schema_is_any() {
        assert_eq!(Schema::from_json(&json!({})).unwrap(), Schema::Any);
        assert_eq!(Schema::from_json(&json!(true)).unwrap(), Schema::Any);
    }
}
