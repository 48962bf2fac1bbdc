//! Structured service specification
//!
//! This is the shape the inference service is asked to produce and the
//! input the source renderer consumes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Specification of a single-endpoint HTTP microservice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Proposed service name (sanitized before use)
    pub service_name: String,

    /// The endpoint the service exposes
    pub endpoint: EndpointSpec,

    /// Optional storage hints, carried through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// URL path, starting with `/`
    pub path: String,

    pub method: HttpMethod,

    /// PascalCase name of the request model
    pub model_name: String,

    /// Fields of the request model
    #[serde(default)]
    pub schema_fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    #[serde(rename = "GET", alias = "get", alias = "Get")]
    Get,
    #[serde(rename = "POST", alias = "post", alias = "Post")]
    Post,
    #[serde(rename = "PUT", alias = "put", alias = "Put")]
    Put,
    #[serde(rename = "DELETE", alias = "delete", alias = "Delete")]
    Delete,
}

impl HttpMethod {
    /// Whether requests carry a JSON body
    pub fn has_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    /// snake_case field name
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Supported request field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Email,
    StringList,
    IntegerList,
    Object,
}

impl FieldType {
    /// Resolve a type name; accepts the Pydantic-style names the model
    /// tends to emit as well as plain ones
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        let ty = match normalized.as_str() {
            "str" | "string" | "String" => FieldType::String,
            "int" | "integer" | "i64" => FieldType::Integer,
            "float" | "number" | "f64" => FieldType::Number,
            "bool" | "boolean" => FieldType::Boolean,
            "EmailStr" | "email" => FieldType::Email,
            "List[str]" | "list[str]" | "string[]" | "array<string>" => FieldType::StringList,
            "List[int]" | "list[int]" | "integer[]" | "array<integer>" => FieldType::IntegerList,
            "Dict[str,Any]" | "dict" | "object" => FieldType::Object,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Email => "email",
            FieldType::StringList => "string[]",
            FieldType::IntegerList => "integer[]",
            FieldType::Object => "object",
        }
    }
}

impl TryFrom<String> for FieldType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        FieldType::from_name(&value).ok_or_else(|| format!("unsupported field type '{}'", value))
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl ServiceSpec {
    /// Parse the raw text returned by the inference model
    ///
    /// Markdown code fences are stripped. Empty output, malformed JSON and
    /// specs failing [`ServiceSpec::validate`] are all inference errors.
    pub fn from_model_output(raw: &str) -> Result<Self> {
        let cleaned = raw
            .trim()
            .replace("```json", "")
            .replace("```", "")
            .trim()
            .to_string();

        if cleaned.is_empty() {
            return Err(Error::Inference("model returned an empty response".to_string()));
        }

        let spec: ServiceSpec = serde_json::from_str(&cleaned).map_err(|e| {
            Error::Inference(format!(
                "failed to decode spec from model response ({}); raw response: '{}'",
                e,
                raw.trim()
            ))
        })?;

        spec.validate()
            .map_err(|e| Error::Inference(format!("model produced an invalid spec: {}", e)))?;

        Ok(spec)
    }

    /// Structural checks the renderer relies on
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(Error::Validation("service_name cannot be empty".to_string()));
        }

        let endpoint = &self.endpoint;
        if !endpoint.path.starts_with('/') || endpoint.path.chars().any(char::is_whitespace) {
            return Err(Error::Validation(format!(
                "endpoint path '{}' must start with '/' and contain no whitespace",
                endpoint.path
            )));
        }

        if !is_pascal_case(&endpoint.model_name) {
            return Err(Error::Validation(format!(
                "model_name '{}' must be a PascalCase identifier",
                endpoint.model_name
            )));
        }

        if endpoint.method.has_body() && endpoint.schema_fields.is_empty() {
            return Err(Error::Validation(format!(
                "{} endpoints need at least one schema field",
                endpoint.method
            )));
        }

        let mut seen = HashSet::new();
        for field in &endpoint.schema_fields {
            if !is_snake_case(&field.name) {
                return Err(Error::Validation(format!(
                    "field name '{}' must be snake_case",
                    field.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::Validation(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
        }

        Ok(())
    }
}

fn is_pascal_case(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

fn is_snake_case(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    }
}
