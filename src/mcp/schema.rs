//! Tool argument schemas and the validation every caller shares.
//!
//! A [`ToolSchema`] is an ordered list of named, typed parameters. Raw JSON
//! arguments are checked against it with [`validate`], which either produces
//! typed [`CallArguments`] or a [`ValidationErrors`] listing every offending
//! field. Nothing is ever partially applied.
//!
//! The same schema renders to the JSON-Schema-like object published by
//! `tools.list`, and [`ToolSchema::from_json_schema`] reads that object back,
//! so a client validating against a listing applies exactly the rules the
//! dispatcher applies.

use std::fmt;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Wire format of date parameters.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Any JSON string.
    String,
    /// A calendar date written as `YYYY-MM-DD`.
    Date,
    /// A JSON integer.
    Integer,
    /// Any JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
}

impl ParamType {
    const fn json_type(self) -> &'static str {
        match self {
            Self::String | Self::Date => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }

    fn from_json_schema(property: &Value) -> Option<Self> {
        let kind = property.get("type").and_then(Value::as_str)?;
        let format = property.get("format").and_then(Value::as_str);
        match (kind, format) {
            ("string", Some("date")) => Some(Self::Date),
            ("string", _) => Some(Self::String),
            ("integer", _) => Some(Self::Integer),
            ("number", _) => Some(Self::Number),
            ("boolean", _) => Some(Self::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date => f.write_str("a date in YYYY-MM-DD format"),
            Self::String => f.write_str("a string"),
            Self::Integer => f.write_str("an integer"),
            Self::Number => f.write_str("a number"),
            Self::Boolean => f.write_str("a boolean"),
        }
    }
}

/// A single named parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared type.
    pub kind: ParamType,
    /// Whether the parameter must be supplied.
    pub required: bool,
}

impl ParamSpec {
    /// Creates a required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            required: true,
        }
    }

    /// Creates an optional parameter.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Ordered set of parameters accepted by a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSchema {
    params: Vec<ParamSpec>,
}

impl ToolSchema {
    /// Creates an empty schema.
    #[must_use]
    pub const fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Returns the parameters in declaration order.
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Renders the schema as the JSON object published by `tools.list`.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut property = json!({
                "type": param.kind.json_type(),
                "description": param.description,
            });
            if param.kind == ParamType::Date {
                property["format"] = json!("date");
            }
            properties.insert(param.name.clone(), property);
        }

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Reads a schema back from its `tools.list` representation.
    ///
    /// # Errors
    ///
    /// Returns a description of the first construct that cannot be represented.
    pub fn from_json_schema(value: &Value) -> Result<Self, String> {
        if value.get("type").and_then(Value::as_str) != Some("object") {
            return Err("schema type must be \"object\"".to_string());
        }

        let required: Vec<&str> = match value.get("required") {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().ok_or("required entries must be strings"))
                .collect::<Result<_, _>>()?,
            Some(_) => return Err("required must be an array".to_string()),
        };

        let properties = match value.get("properties") {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err("properties must be an object".to_string()),
        };

        let mut schema = Self::new();
        for (name, property) in &properties {
            let kind = ParamType::from_json_schema(property)
                .ok_or_else(|| format!("unsupported type for property '{name}'"))?;
            let description = property
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let spec = if required.contains(&name.as_str()) {
                ParamSpec::required(name.clone(), kind, description)
            } else {
                ParamSpec::optional(name.clone(), kind, description)
            };
            schema = schema.param(spec);
        }

        if let Some(missing) = required.iter().find(|r| !properties.contains_key(**r)) {
            return Err(format!("required property '{missing}' is not declared"));
        }

        Ok(schema)
    }
}

/// A validated, typed argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// String parameter.
    Str(String),
    /// Date parameter.
    Date(NaiveDate),
    /// Integer parameter.
    Int(i64),
    /// Number parameter.
    Num(f64),
    /// Boolean parameter.
    Bool(bool),
}

impl ArgValue {
    /// Converts back to the JSON wire form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Str(s) => Value::from(s.as_str()),
            Self::Date(d) => Value::from(d.format(DATE_FORMAT).to_string()),
            Self::Int(i) => Value::from(*i),
            Self::Num(n) => Value::from(*n),
            Self::Bool(b) => Value::from(*b),
        }
    }
}

/// Arguments that passed validation against a tool's schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArguments {
    values: IndexMap<String, ArgValue>,
}

impl CallArguments {
    /// Returns the raw typed value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    /// Returns a string parameter.
    #[must_use]
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns a date parameter.
    #[must_use]
    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.values.get(name) {
            Some(ArgValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    /// Returns the number of supplied arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no arguments were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Converts back to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    /// The arguments were not a JSON object at all.
    NotAnObject,
    /// A required parameter was absent.
    Missing,
    /// The key is not declared by the schema.
    Unrecognized,
    /// The value does not have the declared type.
    WrongType(ParamType),
}

impl FieldProblem {
    const KNOWN: [Self; 8] = [
        Self::NotAnObject,
        Self::Missing,
        Self::Unrecognized,
        Self::WrongType(ParamType::String),
        Self::WrongType(ParamType::Date),
        Self::WrongType(ParamType::Integer),
        Self::WrongType(ParamType::Number),
        Self::WrongType(ParamType::Boolean),
    ];

    /// Reads back a problem from its displayed form.
    fn from_message(message: &str) -> Option<Self> {
        Self::KNOWN
            .into_iter()
            .find(|problem| problem.to_string() == message)
    }
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => f.write_str("arguments must be a JSON object"),
            Self::Missing => f.write_str("required field is missing"),
            Self::Unrecognized => f.write_str("unrecognized field"),
            Self::WrongType(kind) => write!(f, "expected {kind}"),
        }
    }
}

/// A rejected field and the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field name (`"args"` when the whole value was unusable).
    pub field: String,
    /// What was wrong with it.
    pub problem: FieldProblem,
}

/// Every field that failed validation, in schema order then input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Returns the individual field errors.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Returns the names of all offending fields.
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    /// Returns `true` if `field` is among the offending fields.
    #[must_use]
    pub fn mentions(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Structured form used in error envelopes.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|e| json!({ "field": e.field, "problem": e.problem.to_string() }))
                .collect(),
        )
    }

    /// Reads the structured form back, as found in a remote error's `fields`.
    ///
    /// Returns `None` unless every entry is a recognised field error.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        let errors = value
            .as_array()?
            .iter()
            .map(|entry| {
                Some(FieldError {
                    field: entry.get("field")?.as_str()?.to_string(),
                    problem: FieldProblem::from_message(entry.get("problem")?.as_str()?)?,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        (!errors.is_empty()).then_some(Self(errors))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.problem)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Parses a strict `YYYY-MM-DD` date.
///
/// Unpadded or signed components such as `2025-1-9` or `+202-11-09` are
/// rejected.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let bytes = raw.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits = [&bytes[0..4], &bytes[5..7], &bytes[8..10]];
    if !digits.iter().all(|part| part.iter().all(u8::is_ascii_digit)) {
        return None;
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

fn coerce(kind: ParamType, value: &Value) -> Option<ArgValue> {
    match kind {
        ParamType::String => value.as_str().map(|s| ArgValue::Str(s.to_string())),
        ParamType::Date => value.as_str().and_then(parse_date).map(ArgValue::Date),
        ParamType::Integer => value.as_i64().map(ArgValue::Int),
        ParamType::Number => value.as_f64().map(ArgValue::Num),
        ParamType::Boolean => value.as_bool().map(ArgValue::Bool),
    }
}

/// Validates raw JSON arguments against a schema.
///
/// `null` is treated as an empty object.
///
/// # Errors
///
/// Returns every offending field: missing required parameters, unrecognized
/// keys, and values that do not have their declared type.
pub fn validate(schema: &ToolSchema, raw: &Value) -> Result<CallArguments, ValidationErrors> {
    let empty = Map::new();
    let object = match raw {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => {
            return Err(ValidationErrors(vec![FieldError {
                field: "args".to_string(),
                problem: FieldProblem::NotAnObject,
            }]))
        }
    };

    let mut errors = Vec::new();
    let mut values = IndexMap::new();

    for param in schema.params() {
        match object.get(&param.name) {
            None if param.required => errors.push(FieldError {
                field: param.name.clone(),
                problem: FieldProblem::Missing,
            }),
            None => {}
            Some(value) => match coerce(param.kind, value) {
                Some(arg) => {
                    values.insert(param.name.clone(), arg);
                }
                None => errors.push(FieldError {
                    field: param.name.clone(),
                    problem: FieldProblem::WrongType(param.kind),
                }),
            },
        }
    }

    for key in object.keys() {
        if schema.get(key).is_none() {
            errors.push(FieldError {
                field: key.clone(),
                problem: FieldProblem::Unrecognized,
            });
        }
    }

    if errors.is_empty() {
        Ok(CallArguments { values })
    } else {
        Err(ValidationErrors(errors))
    }
}
