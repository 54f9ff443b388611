//! Deterministic signature extraction for stub generation.
//!
//! An external CLI turns catalogs into callable stub files on disk; this
//! module supplies the pure half of that pipeline. Given a catalog it
//! produces an order-stable, textual description of every tool's name,
//! parameters, and return type. Rendering the same catalog twice always
//! yields identical text.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::catalog::SessionCatalog;
use crate::protocol::ToolDescriptor;

/// The primitive type vocabulary of tool schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    /// A JSON string.
    String,
    /// A JSON integer.
    Integer,
    /// A JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
    /// JSON null.
    Null,
    /// Anything; used when the schema declares no type.
    Any,
}

impl SchemaType {
    /// Maps a JSON-schema `type` keyword to the vocabulary.
    pub fn from_json_type(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            "null" => Self::Null,
            _ => Self::Any,
        }
    }

    fn from_schema(schema: &Value) -> Self {
        schema
            .get("type")
            .and_then(Value::as_str)
            .map_or(Self::Any, Self::from_json_type)
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Null => "null",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// One parameter of a tool, extracted from its input schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// The parameter name.
    pub name: String,
    /// The declared type.
    pub ty: SchemaType,
    /// The declared description, possibly empty.
    pub description: String,
    /// Whether the schema lists the parameter as required.
    pub required: bool,
    /// The declared default value, if any.
    pub default: Option<Value>,
}

/// The extracted signature of one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSignature {
    /// The tool name.
    pub name: String,
    /// The tool description, possibly empty.
    pub description: String,
    /// Parameters in schema declaration order.
    pub params: Vec<ParamSpec>,
    /// The return type, taken from the output schema's `result` property.
    pub returns: SchemaType,
}

impl ToolSignature {
    /// Extracts the signature from a discovered descriptor.
    pub fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone().unwrap_or_default(),
            params: extract_params(&descriptor.input_schema),
            returns: extract_return_type(descriptor.output_schema.as_ref()),
        }
    }
}

impl fmt::Display for ToolSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", param.name, param.ty)?;
            if !param.required {
                match &param.default {
                    Some(default) => write!(f, " = {default}")?,
                    None => f.write_str(" = null")?,
                }
            }
        }
        write!(f, ") -> {}", self.returns)
    }
}

fn extract_params(input_schema: &Value) -> Vec<ParamSpec> {
    let required: Vec<&str> = input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = input_schema.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };
    properties
        .iter()
        .map(|(name, schema)| ParamSpec {
            name: name.clone(),
            ty: SchemaType::from_schema(schema),
            description: schema
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_owned(),
            required: required.contains(&name.as_str()),
            default: schema.get("default").cloned(),
        })
        .collect()
}

fn extract_return_type(output_schema: Option<&Value>) -> SchemaType {
    output_schema
        .and_then(|schema| schema.get("properties"))
        .and_then(|props| props.get("result"))
        .map_or(SchemaType::Any, SchemaType::from_schema)
}

/// Renders one session's catalog as stable text, one block per tool.
pub fn render_catalog(session_name: &str, catalog: &SessionCatalog) -> String {
    let mut out = format!("session {session_name}\n");
    for descriptor in catalog.iter() {
        let signature = ToolSignature::from_descriptor(descriptor);
        out.push_str(&format!("  {signature}\n"));
        if !signature.description.is_empty() {
            out.push_str(&format!("    {}\n", signature.description));
        }
        for param in &signature.params {
            if !param.description.is_empty() {
                out.push_str(&format!("    {}: {}\n", param.name, param.description));
            }
        }
    }
    out
}

/// Renders a whole group's catalogs, sessions in name order.
pub fn render_group(catalogs: &BTreeMap<String, SessionCatalog>) -> String {
    let mut out = String::new();
    for (name, catalog) in catalogs {
        out.push_str(&render_catalog(name, catalog));
    }
    out
}
