//! The attribute-record table behind a georeferenced metadata layer.
//!
//! Records live in memory and are written back as JSON attributes of the
//! layer's `values` group. Index 0 is the no-data record, created with the
//! default of each field's type.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::compound::{validate_definition, validate_record, CompoundDataType, Record, RecordDefinition};
use crate::error::{BagError, Result};
use crate::storage::{Attributes, Container};

pub(crate) const RECORD_DEFINITION_ATTR: &str = "Record Definition";
pub(crate) const RECORDS_ATTR: &str = "records";

/// A field addressed by position or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for Field<'_> {
    fn from(index: usize) -> Self {
        Field::Index(index)
    }
}

impl<'a> From<&'a str> for Field<'a> {
    fn from(name: &'a str) -> Self {
        Field::Name(name)
    }
}

/// Records sharing one [`RecordDefinition`], addressed by a dense index.
pub struct ValueTable {
    container: Arc<Container>,
    path: String,
    definition: RecordDefinition,
    field_indices: HashMap<String, usize>,
    records: Vec<Record>,
    dirty: bool,
}

fn index_fields(definition: &RecordDefinition) -> HashMap<String, usize> {
    definition
        .iter()
        .enumerate()
        .map(|(index, field)| (field.name.clone(), index))
        .collect()
}

impl ValueTable {
    /// Create the table with its no-data record and persist it.
    pub(crate) fn create(container: Arc<Container>, path: &str, definition: RecordDefinition) -> Result<Self> {
        validate_definition(&definition)?;
        let no_data = definition
            .iter()
            .map(|field| CompoundDataType::default_for(field.data_type))
            .collect::<Result<Record>>()?;

        let table = Self {
            field_indices: index_fields(&definition),
            container,
            path: path.to_string(),
            definition,
            records: vec![no_data],
            dirty: false,
        };
        table.container.create_group(path, table.attributes()?)?;
        Ok(table)
    }

    /// Load the table stored at `path`.
    pub(crate) fn open(container: Arc<Container>, path: &str) -> Result<Self> {
        let attrs = container.group_attributes(path)?;
        let definition: RecordDefinition = serde_json::from_value(
            attrs
                .get(RECORD_DEFINITION_ATTR)
                .cloned()
                .ok_or_else(|| BagError::format(format!("{path} has no record definition")))?,
        )?;
        validate_definition(&definition)
            .map_err(|e| BagError::format(format!("{path}: {e}")))?;

        let stored = attrs
            .get(RECORDS_ATTR)
            .and_then(Value::as_array)
            .ok_or_else(|| BagError::format(format!("{path} has no records")))?;
        let records = stored
            .iter()
            .map(|row| decode_record(row, &definition))
            .collect::<Result<Vec<_>>>()?;
        if records.is_empty() {
            return Err(BagError::format(format!("{path} is missing its no-data record")));
        }

        Ok(Self {
            field_indices: index_fields(&definition),
            container,
            path: path.to_string(),
            definition,
            records,
            dirty: false,
        })
    }

    pub fn definition(&self) -> &RecordDefinition {
        &self.definition
    }

    /// Position of the field called `name`.
    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.field_indices
            .get(name)
            .copied()
            .ok_or_else(|| BagError::not_found(format!("field '{name}'")))
    }

    /// Name of the field at `index`.
    pub fn field_name(&self, index: usize) -> Result<&str> {
        self.definition
            .get(index)
            .map(|field| field.name.as_str())
            .ok_or_else(|| {
                BagError::out_of_range(format!(
                    "field index {index} with {} fields",
                    self.definition.len()
                ))
            })
    }

    /// Every record, starting with the no-data record.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records, including the no-data record.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false: the no-data record is never removed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record and return its index.
    pub fn add_record(&mut self, record: Record) -> Result<usize> {
        self.container.ensure_writable("add record")?;
        validate_record(&record, &self.definition)?;
        self.records.push(record);
        self.dirty = true;
        Ok(self.records.len() - 1)
    }

    /// Append records in order. Nothing is appended if any record is invalid.
    pub fn add_records(&mut self, records: Vec<Record>) -> Result<()> {
        self.container.ensure_writable("add records")?;
        for record in &records {
            validate_record(record, &self.definition)?;
        }
        self.records.extend(records);
        self.dirty = true;
        Ok(())
    }

    /// The value of one field of one record.
    pub fn value<'a>(&self, record_index: usize, field: impl Into<Field<'a>>) -> Result<&CompoundDataType> {
        let field_index = self.resolve(field.into())?;
        let record = self.record(record_index)?;
        Ok(&record[field_index])
    }

    /// Replace one field of one record. The value's type must match the field.
    pub fn set_value<'a>(
        &mut self,
        record_index: usize,
        field: impl Into<Field<'a>>,
        value: impl Into<CompoundDataType>,
    ) -> Result<()> {
        self.container.ensure_writable("set value")?;
        let field_index = self.resolve(field.into())?;
        self.record(record_index)?;

        let value = value.into();
        let field = &self.definition[field_index];
        if value.data_type() != field.data_type {
            return Err(BagError::type_mismatch(format!(
                "field '{}' is {}, value is {}",
                field.name,
                field.data_type,
                value.data_type()
            )));
        }

        self.records[record_index][field_index] = value;
        self.dirty = true;
        Ok(())
    }

    /// Write pending changes to the container.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.container.ensure_writable("flush value table")?;
        self.container
            .update_group_attributes(&self.path, self.attributes()?)?;
        self.dirty = false;
        debug!(path = %self.path, records = self.records.len(), "Flushed value table");
        Ok(())
    }

    /// Whether changes are waiting to be flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn resolve(&self, field: Field<'_>) -> Result<usize> {
        match field {
            Field::Name(name) => self.field_index(name),
            Field::Index(index) if index < self.definition.len() => Ok(index),
            Field::Index(index) => Err(BagError::out_of_range(format!(
                "field index {index} with {} fields",
                self.definition.len()
            ))),
        }
    }

    fn record(&self, index: usize) -> Result<&Record> {
        self.records.get(index).ok_or_else(|| {
            BagError::out_of_range(format!(
                "record index {index} with {} records",
                self.records.len()
            ))
        })
    }

    fn attributes(&self) -> Result<Attributes> {
        let records: Vec<Value> = self
            .records
            .iter()
            .map(|record| Value::Array(record.iter().map(CompoundDataType::to_json).collect()))
            .collect();

        let mut attrs = Attributes::new();
        attrs.insert(RECORD_DEFINITION_ATTR.to_string(), serde_json::to_value(&self.definition)?);
        attrs.insert(RECORDS_ATTR.to_string(), json!(records));
        Ok(attrs)
    }
}

fn decode_record(row: &Value, definition: &RecordDefinition) -> Result<Record> {
    let values = row
        .as_array()
        .ok_or_else(|| BagError::format(format!("stored record {row} is not an array")))?;
    if values.len() != definition.len() {
        return Err(BagError::format(format!(
            "stored record has {} fields, definition has {}",
            values.len(),
            definition.len()
        )));
    }
    values
        .iter()
        .zip(definition)
        .map(|(value, field)| CompoundDataType::from_json(value, field.data_type))
        .collect()
}

impl std::fmt::Debug for ValueTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueTable")
            .field("path", &self.path)
            .field("definition", &self.definition)
            .field("records", &self.records.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}
