use std::fmt;

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Primitive kind of a contract field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Integer { minimum: Option<i64> },
    String { non_empty: bool, allowed: Option<&'static [&'static str]> },
    Object(ObjectSchema),
}

impl FieldKind {
    pub const fn integer() -> Self {
        Self::Integer { minimum: None }
    }

    pub const fn non_negative_integer() -> Self {
        Self::Integer { minimum: Some(0) }
    }

    pub const fn string() -> Self {
        Self::String { non_empty: false, allowed: None }
    }

    pub const fn text() -> Self {
        Self::String { non_empty: true, allowed: None }
    }

    pub const fn one_of(values: &'static [&'static str]) -> Self {
        Self::String { non_empty: true, allowed: Some(values) }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer { .. } => "integer",
            Self::String { .. } => "string",
            Self::Object(_) => "object",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Sent to the model as a generation hint.
    pub description: Option<&'static str>,
}

impl Field {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: true, description: None }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind, required: false, description: None }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ObjectSchema {
    pub fields: Vec<Field>,
}

impl ObjectSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// A named object shape plus the field hints transmitted to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Contract {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub root: ObjectSchema,
}

impl Contract {
    pub fn new(name: &'static str, fields: Vec<Field>) -> Self {
        Self { name, description: None, root: ObjectSchema::new(fields) }
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// Checks `candidate` against the contract and reports every issue found.
    pub fn validate(&self, candidate: &Value) -> Result<(), ContractViolation> {
        let mut issues = Vec::new();
        match candidate.as_object() {
            Some(object) => validate_object(&self.root, object, "", &mut issues),
            None => issues.push(ContractIssue::TypeMismatch {
                path: "$".to_string(),
                expected: "object",
                found: json_type_name(candidate),
            }),
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ContractViolation { contract: self.name, issues })
        }
    }

    /// JSON-Schema rendering of the contract, descriptions included.
    pub fn to_json_schema(&self) -> Value {
        let mut schema = object_json_schema(&self.root);
        if let (Some(description), Some(object)) = (self.description, schema.as_object_mut()) {
            object.insert("description".to_string(), Value::String(description.to_string()));
        }
        schema
    }
}

fn validate_object(
    schema: &ObjectSchema,
    object: &Map<String, Value>,
    prefix: &str,
    issues: &mut Vec<ContractIssue>,
) {
    for field in &schema.fields {
        let path = join_path(prefix, field.name);
        match object.get(field.name) {
            Some(value) => validate_field(field, value, &path, issues),
            None if field.required => issues.push(ContractIssue::MissingField { path }),
            None => {}
        }
    }

    for key in object.keys() {
        if schema.field(key).is_none() {
            issues.push(ContractIssue::UnexpectedField { path: join_path(prefix, key) });
        }
    }
}

fn validate_field(field: &Field, value: &Value, path: &str, issues: &mut Vec<ContractIssue>) {
    match (&field.kind, value) {
        (FieldKind::Integer { minimum }, Value::Number(number)) => {
            if let Some(found) = number.as_i64() {
                if let Some(minimum) = minimum {
                    if found < *minimum {
                        issues.push(ContractIssue::BelowMinimum {
                            path: path.to_string(),
                            minimum: *minimum,
                            found,
                        });
                    }
                }
            } else if number.as_u64().is_none() {
                issues.push(ContractIssue::TypeMismatch {
                    path: path.to_string(),
                    expected: "integer",
                    found: "number",
                });
            }
        }
        (FieldKind::String { non_empty, allowed }, Value::String(text)) => {
            if *non_empty && text.trim().is_empty() {
                issues.push(ContractIssue::EmptyString { path: path.to_string() });
            } else if let Some(allowed) = allowed {
                if !allowed.contains(&text.as_str()) {
                    issues.push(ContractIssue::NotAllowed {
                        path: path.to_string(),
                        value: text.clone(),
                    });
                }
            }
        }
        (FieldKind::Object(schema), Value::Object(object)) => {
            validate_object(schema, object, path, issues);
        }
        (kind, other) => issues.push(ContractIssue::TypeMismatch {
            path: path.to_string(),
            expected: kind.type_name(),
            found: json_type_name(other),
        }),
    }
}

fn object_json_schema(schema: &ObjectSchema) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in &schema.fields {
        let mut property = match &field.kind {
            FieldKind::Integer { minimum } => {
                let mut property = json!({ "type": "integer" });
                if let Some(minimum) = minimum {
                    property["minimum"] = json!(minimum);
                }
                property
            }
            FieldKind::String { non_empty, allowed } => {
                let mut property = json!({ "type": "string" });
                if *non_empty {
                    property["minLength"] = json!(1);
                }
                if let Some(allowed) = allowed {
                    property["enum"] = json!(allowed);
                }
                property
            }
            FieldKind::Object(nested) => object_json_schema(nested),
        };
        if let Some(description) = field.description {
            property["description"] = json!(description);
        }
        if field.required {
            required.push(field.name);
        }
        properties.insert(field.name.to_string(), property);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_i64() || number.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ContractIssue {
    MissingField { path: String },
    UnexpectedField { path: String },
    TypeMismatch { path: String, expected: &'static str, found: &'static str },
    BelowMinimum { path: String, minimum: i64, found: i64 },
    EmptyString { path: String },
    NotAllowed { path: String, value: String },
    Inconsistent { path: String, expected: String, found: String },
    Undecodable { message: String },
}

impl fmt::Display for ContractIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField { path } => write!(f, "`{path}` is required"),
            Self::UnexpectedField { path } => write!(f, "`{path}` is not declared"),
            Self::TypeMismatch { path, expected, found } => {
                write!(f, "`{path}` expected {expected}, found {found}")
            }
            Self::BelowMinimum { path, minimum, found } => {
                write!(f, "`{path}` must be >= {minimum}, found {found}")
            }
            Self::EmptyString { path } => write!(f, "`{path}` must not be empty"),
            Self::NotAllowed { path, value } => write!(f, "`{path}` does not allow `{value}`"),
            Self::Inconsistent { path, expected, found } => {
                write!(f, "`{path}` expected `{expected}`, found `{found}`")
            }
            Self::Undecodable { message } => write!(f, "payload could not be decoded: {message}"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[error("{contract} contract violated: {}", render_issues(.issues))]
pub struct ContractViolation {
    pub contract: &'static str,
    pub issues: Vec<ContractIssue>,
}

impl ContractViolation {
    pub fn single(contract: &'static str, issue: ContractIssue) -> Self {
        Self { contract, issues: vec![issue] }
    }
}

fn render_issues(issues: &[ContractIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Contract, ContractIssue, Field, FieldKind, ObjectSchema};

    fn shot_contract() -> Contract {
        Contract::new(
            "shot",
            vec![
                Field::required("made", FieldKind::non_negative_integer()).describe("Shots made."),
                Field::required(
                    "detail",
                    FieldKind::Object(ObjectSchema::new(vec![Field::required(
                        "zone",
                        FieldKind::text(),
                    )])),
                ),
                Field::optional("note", FieldKind::string()),
            ],
        )
    }

    #[test]
    fn accepts_conforming_value() {
        let value = json!({ "made": 3, "detail": { "zone": "paint" } });
        assert_eq!(shot_contract().validate(&value), Ok(()));
    }

    #[test]
    fn reports_missing_and_mismatched_fields_together() {
        let value = json!({ "made": "three", "detail": {} });
        let violation = shot_contract().validate(&value).expect_err("must reject");

        assert_eq!(violation.contract, "shot");
        assert_eq!(
            violation.issues,
            vec![
                ContractIssue::TypeMismatch {
                    path: "made".to_string(),
                    expected: "integer",
                    found: "string",
                },
                ContractIssue::MissingField { path: "detail.zone".to_string() },
            ]
        );
    }

    #[test]
    fn rejects_fractional_negative_and_empty_values() {
        let fractional = json!({ "made": 2.5, "detail": { "zone": "wing" } });
        let negative = json!({ "made": -1, "detail": { "zone": "wing" } });
        let empty = json!({ "made": 1, "detail": { "zone": "  " } });

        assert!(matches!(
            shot_contract().validate(&fractional).expect_err("fraction").issues[0],
            ContractIssue::TypeMismatch { expected: "integer", found: "number", .. }
        ));
        assert!(matches!(
            shot_contract().validate(&negative).expect_err("negative").issues[0],
            ContractIssue::BelowMinimum { minimum: 0, found: -1, .. }
        ));
        assert!(matches!(
            shot_contract().validate(&empty).expect_err("empty").issues[0],
            ContractIssue::EmptyString { .. }
        ));
    }

    #[test]
    fn rejects_undeclared_nesting() {
        let value = json!({ "made": 1, "detail": { "zone": "corner", "extra": { "x": 1 } } });
        let violation = shot_contract().validate(&value).expect_err("undeclared");
        assert_eq!(
            violation.issues,
            vec![ContractIssue::UnexpectedField { path: "detail.extra".to_string() }]
        );
    }

    #[test]
    fn non_object_root_is_a_type_mismatch() {
        let violation = shot_contract().validate(&json!([1, 2])).expect_err("array root");
        assert!(matches!(
            violation.issues[0],
            ContractIssue::TypeMismatch { expected: "object", found: "array", .. }
        ));
    }

    #[test]
    fn enumerated_strings_reject_other_values() {
        let contract =
            Contract::new("tier", vec![Field::required("label", FieldKind::one_of(&["a", "b"]))]);
        assert_eq!(contract.validate(&json!({ "label": "b" })), Ok(()));
        assert!(contract.validate(&json!({ "label": "c" })).is_err());
    }

    #[test]
    fn validation_is_idempotent() {
        let contract = shot_contract();
        let value = json!({ "made": 0, "detail": { "zone": "none" } });
        let first = contract.validate(&value);
        let second = contract.validate(&value);
        assert_eq!(first, second);
        assert!(first.is_ok());
    }

    #[test]
    fn json_schema_carries_descriptions_and_required_fields() {
        let schema = shot_contract().describe("A shot chart.").to_json_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["description"], "A shot chart.");
        assert_eq!(schema["required"], json!(["made", "detail"]));
        assert_eq!(schema["properties"]["made"]["minimum"], 0);
        assert_eq!(schema["properties"]["made"]["description"], "Shots made.");
        assert_eq!(schema["properties"]["detail"]["properties"]["zone"]["minLength"], 1);
    }
}
