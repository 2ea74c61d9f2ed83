//! Tagged scalar values, records and record definitions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BagError, Result};
use crate::types::DataType;

/// A tagged scalar used as a value table cell.
///
/// Tag and payload always change together; there is no state in which a
/// payload exists without its tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CompoundDataType {
    #[default]
    Unknown,
    Float32(f32),
    UInt32(u32),
    Boolean(bool),
    String(String),
}

impl CompoundDataType {
    /// The data type tag.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Unknown => DataType::Unknown,
            Self::Float32(_) => DataType::Float32,
            Self::UInt32(_) => DataType::UInt32,
            Self::Boolean(_) => DataType::Boolean,
            Self::String(_) => DataType::String,
        }
    }

    /// The default value for a field of `data_type`.
    pub fn default_for(data_type: DataType) -> Result<Self> {
        match data_type {
            DataType::Float32 => Ok(Self::Float32(0.0)),
            DataType::UInt32 => Ok(Self::UInt32(0)),
            DataType::Boolean => Ok(Self::Boolean(false)),
            DataType::String => Ok(Self::String(String::new())),
            other => Err(BagError::invalid_argument(format!(
                "{other} is not a valid record field type"
            ))),
        }
    }

    pub fn as_f32(&self) -> Result<f32> {
        match self {
            Self::Float32(v) => Ok(*v),
            other => Err(mismatch(DataType::Float32, other)),
        }
    }

    pub fn as_u32(&self) -> Result<u32> {
        match self {
            Self::UInt32(v) => Ok(*v),
            other => Err(mismatch(DataType::UInt32, other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(v) => Ok(*v),
            other => Err(mismatch(DataType::Boolean, other)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Self::String(v) => Ok(v),
            other => Err(mismatch(DataType::String, other)),
        }
    }

    /// Encode the payload as JSON for the value table store.
    pub(crate) fn to_json(&self) -> Value {
        match self {
            Self::Unknown => Value::Null,
            Self::Float32(v) => match non_finite_name(*v) {
                Some(name) => Value::from(name),
                None => serde_json::json!(v),
            },
            Self::UInt32(v) => serde_json::json!(v),
            Self::Boolean(v) => Value::Bool(*v),
            Self::String(v) => Value::String(v.clone()),
        }
    }

    /// Decode a JSON payload written by [`to_json`](Self::to_json).
    pub(crate) fn from_json(value: &Value, data_type: DataType) -> Result<Self> {
        let decoded = match data_type {
            DataType::Float32 => value
                .as_f64()
                .map(|v| v as f32)
                .or_else(|| value.as_str().and_then(non_finite_value))
                .map(Self::Float32),
            DataType::UInt32 => value
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(Self::UInt32),
            DataType::Boolean => value.as_bool().map(Self::Boolean),
            DataType::String => value.as_str().map(|v| Self::String(v.to_string())),
            _ => None,
        };
        decoded.ok_or_else(|| {
            BagError::format(format!("stored value {value} is not a valid {data_type}"))
        })
    }
}

/// JSON has no number form for NaN or the infinities; they are stored by name.
fn non_finite_name(v: f32) -> Option<&'static str> {
    if v.is_nan() {
        Some("NaN")
    } else if v == f32::INFINITY {
        Some("Infinity")
    } else if v == f32::NEG_INFINITY {
        Some("-Infinity")
    } else {
        None
    }
}

fn non_finite_value(name: &str) -> Option<f32> {
    match name {
        "NaN" => Some(f32::NAN),
        "Infinity" => Some(f32::INFINITY),
        "-Infinity" => Some(f32::NEG_INFINITY),
        _ => None,
    }
}

fn mismatch(expected: DataType, found: &CompoundDataType) -> BagError {
    BagError::type_mismatch(format!(
        "expected {expected}, value holds {}",
        found.data_type()
    ))
}

impl From<f32> for CompoundDataType {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<u32> for CompoundDataType {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<bool> for CompoundDataType {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for CompoundDataType {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for CompoundDataType {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

/// Name and type of one record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered field schema shared by every record of a value table.
pub type RecordDefinition = Vec<FieldDefinition>;

/// One row of a value table, in definition order.
pub type Record = Vec<CompoundDataType>;

/// Check that every field of `definition` uses a supported record type.
pub(crate) fn validate_definition(definition: &[FieldDefinition]) -> Result<()> {
    if definition.is_empty() {
        return Err(BagError::invalid_argument("record definition is empty"));
    }
    let mut names = HashSet::new();
    for field in definition {
        if !names.insert(field.name.as_str()) {
            return Err(BagError::invalid_argument(format!(
                "field '{}' is defined more than once",
                field.name
            )));
        }
        CompoundDataType::default_for(field.data_type).map_err(|_| {
            BagError::invalid_argument(format!(
                "field '{}' has unsupported type {}",
                field.name, field.data_type
            ))
        })?;
    }
    Ok(())
}

/// Check `record` against `definition`: width first, then each field's tag.
pub(crate) fn validate_record(record: &[CompoundDataType], definition: &[FieldDefinition]) -> Result<()> {
    if record.len() != definition.len() {
        return Err(BagError::size_mismatch("record", definition.len(), record.len()));
    }
    for (value, field) in record.iter().zip(definition) {
        if value.data_type() != field.data_type {
            return Err(BagError::type_mismatch(format!(
                "field '{}' is {}, value is {}",
                field.name,
                field.data_type,
                value.data_type()
            )));
        }
    }
    Ok(())
}
