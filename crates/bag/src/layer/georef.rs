use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use super::descriptor::LayerDescriptor;
use super::{check_buffer, flat_count, flat_range, Raster};
use crate::compound::{validate_definition, RecordDefinition};
use crate::error::{BagError, Result};
use crate::items::ItemBuffer;
use crate::profiles::GeorefMetadataProfile;
use crate::storage::{self, attr_str, ArraySpec, Attributes, Container, StoreArray};
use crate::types::{DataType, LayerType, GEOREF_METADATA_PATH};
use crate::value_table::ValueTable;

pub(crate) const PROFILE_ATTR: &str = "Metadata Profile Type";
pub(crate) const KEY_TYPE_ATTR: &str = "key_type";

/// A raster of keys into a [`ValueTable`] of attribute records.
///
/// Key 0 refers to the table's no-data record. When the dataset has a
/// variable resolution extension, refined nodes are keyed through a
/// separate flat array addressed by refinement index.
pub struct GeorefMetadataLayer {
    descriptor: LayerDescriptor,
    container: Arc<Container>,
    profile: GeorefMetadataProfile,
    keys: Raster,
    varres_keys: Option<StoreArray>,
    vr_chunk_size: Option<u64>,
    value_table: ValueTable,
}

/// Older name for [`GeorefMetadataLayer`].
pub type CompoundLayer = GeorefMetadataLayer;

fn check_name(name: &str) -> Result<()> {
    if name.trim().is_empty() || name.contains('/') {
        return Err(BagError::invalid_argument(format!(
            "invalid georeferenced metadata layer name '{name}'"
        )));
    }
    Ok(())
}

/// Fail if any key in `buffer` has no record in a table of `records` entries.
fn check_keys(buffer: &ItemBuffer, records: usize, what: &str) -> Result<()> {
    let largest = match buffer {
        ItemBuffer::UInt8(keys) => keys.iter().map(|&key| u64::from(key)).max(),
        ItemBuffer::UInt16(keys) => keys.iter().map(|&key| u64::from(key)).max(),
        ItemBuffer::UInt32(keys) => keys.iter().map(|&key| u64::from(key)).max(),
        _ => None,
    };
    match largest {
        Some(key) if key >= records as u64 => Err(BagError::out_of_range(format!(
            "{what} key {key} has no record in a value table of {records}"
        ))),
        _ => Ok(()),
    }
}

impl GeorefMetadataLayer {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        container: Arc<Container>,
        id: u32,
        name: &str,
        key_type: DataType,
        profile: GeorefMetadataProfile,
        definition: RecordDefinition,
        dims: (u32, u32),
        chunk_size: u64,
        compression_level: u8,
    ) -> Result<Self> {
        check_name(name)?;
        if !key_type.is_key_type() {
            return Err(BagError::invalid_argument(format!(
                "{key_type} cannot key a value table; use uint8, uint16 or uint32"
            )));
        }
        let definition = match profile.definition() {
            Some(profile_definition) => profile_definition,
            None if definition.is_empty() => {
                return Err(BagError::invalid_argument(
                    "an unknown metadata profile needs a record definition",
                ))
            }
            None => definition,
        };
        validate_definition(&definition)?;

        let path = format!("{GEOREF_METADATA_PATH}/{name}");
        if container.node_exists(&path) {
            return Err(BagError::already_exists(format!("georeferenced metadata layer '{name}'")));
        }
        if !container.node_exists(GEOREF_METADATA_PATH) {
            container.create_group(GEOREF_METADATA_PATH, Attributes::new())?;
        }

        let descriptor = LayerDescriptor::new(
            id,
            LayerType::GeorefMetadata,
            name,
            path.as_str(),
            key_type,
            key_type.element_size(),
            chunk_size,
            compression_level,
        );
        let mut attrs = descriptor.settings_attributes();
        attrs.insert(PROFILE_ATTR.to_string(), json!(profile.as_str()));
        attrs.insert(KEY_TYPE_ATTR.to_string(), serde_json::to_value(key_type)?);
        container.create_group(&path, attrs)?;

        let spec = ArraySpec::grid(dims.0, dims.1, chunk_size, key_type, 0.0, compression_level);
        let keys = Raster::create(&container, &format!("{path}/keys"), &spec)?;
        let value_table = ValueTable::create(container.clone(), &format!("{path}/values"), definition)?;

        Ok(Self {
            descriptor,
            container,
            profile,
            keys,
            varres_keys: None,
            vr_chunk_size: None,
            value_table,
        })
    }

    /// Open the layer stored under `parent/name`.
    pub(crate) fn open(container: Arc<Container>, id: u32, parent: &str, name: &str) -> Result<Self> {
        let path = format!("{parent}/{name}");
        let attrs = container.group_attributes(&path)?;

        let profile = GeorefMetadataProfile::from_name(attr_str(&attrs, PROFILE_ATTR).unwrap_or_default());
        let key_type: DataType = serde_json::from_value(
            attrs
                .get(KEY_TYPE_ATTR)
                .cloned()
                .ok_or_else(|| BagError::format(format!("{path} has no key type")))?,
        )?;
        if !key_type.is_key_type() {
            return Err(BagError::format(format!("{path} has key type {key_type}")));
        }

        let keys = Raster::open(&container, &format!("{path}/keys"), key_type)?;
        let varres_path = format!("{path}/varres_keys");
        let varres_keys = if container.node_exists(&varres_path) {
            Some(container.open_array(&varres_path)?)
        } else {
            None
        };
        let value_table = ValueTable::open(container.clone(), &format!("{path}/values"))?;

        let mut descriptor = LayerDescriptor::new(
            id,
            LayerType::GeorefMetadata,
            name,
            path.as_str(),
            key_type,
            key_type.element_size(),
            0,
            0,
        );
        descriptor.load_attributes(&attrs);

        Ok(Self {
            descriptor,
            container,
            profile,
            keys,
            varres_keys,
            vr_chunk_size: None,
            value_table,
        })
    }

    pub fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    pub fn profile(&self) -> GeorefMetadataProfile {
        self.profile
    }

    /// Key type of the raster.
    pub fn key_type(&self) -> DataType {
        self.descriptor.data_type()
    }

    pub fn value_table(&self) -> &ValueTable {
        &self.value_table
    }

    pub fn value_table_mut(&mut self) -> &mut ValueTable {
        &mut self.value_table
    }

    /// Read keys in the inclusive bounding box.
    pub fn read(&self, row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<ItemBuffer> {
        let region = self.keys.region(row_start, col_start, row_end, col_end)?;
        self.keys.read(&region)
    }

    /// Write keys to the inclusive bounding box and flush the value table.
    pub fn write(
        &mut self,
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        buffer: &ItemBuffer,
    ) -> Result<()> {
        self.container.ensure_writable("write georeferenced metadata")?;
        let region = self.keys.region(row_start, col_start, row_end, col_end)?;
        check_keys(buffer, self.value_table.len(), self.descriptor.name())?;
        self.keys.write(&region, buffer, self.descriptor.name())?;
        self.value_table.flush()
    }

    /// Persist the value table.
    pub fn write_attributes(&mut self) -> Result<()> {
        self.container.ensure_writable("write georeferenced metadata attributes")?;
        self.value_table.flush()
    }

    /// Number of refined nodes with a stored key.
    pub fn vr_len(&self) -> u64 {
        self.varres_keys
            .as_ref()
            .and_then(|array| array.shape().first().copied())
            .unwrap_or(0)
    }

    /// Read keys of refined nodes `index_start..=index_end`.
    pub fn read_vr(&self, index_start: u32, index_end: u32) -> Result<ItemBuffer> {
        self.ensure_vr()?;
        let (start, end) = flat_range(0, index_start, 0, index_end)?;
        let len = self.vr_len();
        let array = match &self.varres_keys {
            Some(array) if u64::from(end) < len => array,
            _ => {
                return Err(BagError::out_of_range(format!(
                    "refinement index {end} with {len} stored keys"
                )))
            }
        };
        let subset = storage::subset(vec![u64::from(start)], vec![u64::from(end) - u64::from(start) + 1])?;
        storage::read_elements(array, &subset, self.key_type())
    }

    /// Write keys of refined nodes `index_start..=index_end`, growing the
    /// key array as needed.
    pub fn write_vr(&mut self, index_start: u32, index_end: u32, buffer: &ItemBuffer) -> Result<()> {
        self.container.ensure_writable("write georeferenced metadata")?;
        let chunk = self.ensure_vr()?;
        let (start, end) = flat_range(0, index_start, 0, index_end)?;
        let count = flat_count(start, end)?;
        check_buffer(buffer, self.key_type(), count, self.descriptor.name())?;
        check_keys(buffer, self.value_table.len(), self.descriptor.name())?;

        let required = u64::from(end) + 1;
        let spec = ArraySpec::growable(
            required,
            chunk,
            self.key_type(),
            0.0,
            self.descriptor.compression_level(),
        );
        let path = format!("{}/varres_keys", self.descriptor.internal_path());
        let array = match &mut self.varres_keys {
            Some(array) => {
                if array.shape().first().copied().unwrap_or(0) < required {
                    storage::resize_array(array, vec![required])?;
                }
                array
            }
            slot => slot.insert(self.container.create_array(&path, &spec)?),
        };

        let subset = storage::subset(vec![u64::from(start)], vec![count as u64])?;
        storage::write_elements(array, &subset, buffer)?;
        debug!(layer = %self.descriptor.name(), start, end, "Wrote refined keys");
        self.value_table.flush()
    }

    /// Allow VR addressing once the dataset has a VR extension.
    pub(crate) fn enable_vr(&mut self, chunk_size: u64) {
        self.vr_chunk_size = Some(chunk_size.max(1));
    }

    fn ensure_vr(&self) -> Result<u64> {
        self.vr_chunk_size.ok_or_else(|| {
            BagError::invalid_argument(format!(
                "dataset has no variable resolution extension for layer {}",
                self.descriptor.name()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::FieldDefinition;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn container(dir: &tempfile::TempDir) -> Arc<Container> {
        Arc::new(Container::create(&dir.path().join("g.bag")).unwrap())
    }

    fn custom_definition() -> RecordDefinition {
        vec![
            FieldDefinition::new("source", DataType::String),
            FieldDefinition::new("weight", DataType::Float32),
        ]
    }

    #[test]
    fn test_key_type_must_be_unsigned_small() {
        let dir = tempdir().unwrap();
        let result = GeorefMetadataLayer::create(
            container(&dir),
            2,
            "Elevation",
            DataType::Float32,
            GeorefMetadataProfile::Unknown,
            custom_definition(),
            (4, 4),
            0,
            0,
        );
        assert_eq!(result.err().unwrap().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_unknown_profile_requires_definition() {
        let dir = tempdir().unwrap();
        let result = GeorefMetadataLayer::create(
            container(&dir),
            2,
            "Elevation",
            DataType::UInt8,
            GeorefMetadataProfile::Unknown,
            Vec::new(),
            (4, 4),
            0,
            0,
        );
        assert_eq!(result.err().unwrap().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_duplicate_field_names_leave_no_layer() {
        let dir = tempdir().unwrap();
        let container = container(&dir);
        let mut definition = custom_definition();
        definition.push(FieldDefinition::new("source", DataType::UInt32));
        let result = GeorefMetadataLayer::create(
            container.clone(),
            2,
            "Elevation",
            DataType::UInt8,
            GeorefMetadataProfile::Unknown,
            definition,
            (4, 4),
            0,
            0,
        );
        assert_eq!(result.err().unwrap().kind(), ErrorKind::InvalidArgument);
        assert!(!container.node_exists(&format!("{GEOREF_METADATA_PATH}/Elevation")));
    }

    #[test]
    fn test_profile_overrides_definition() {
        let dir = tempdir().unwrap();
        let layer = GeorefMetadataLayer::create(
            container(&dir),
            2,
            "Elevation",
            DataType::UInt16,
            GeorefMetadataProfile::NoaaNbs2022_06,
            custom_definition(),
            (4, 4),
            0,
            0,
        )
        .unwrap();
        assert_eq!(layer.value_table().definition().len(), 16);
        assert_eq!(layer.descriptor().element_size(), 2);
    }

    #[test]
    fn test_keys_round_trip_and_reopen() {
        let dir = tempdir().unwrap();
        let container = container(&dir);
        let mut layer = GeorefMetadataLayer::create(
            container.clone(),
            2,
            "Elevation",
            DataType::UInt8,
            GeorefMetadataProfile::Unknown,
            custom_definition(),
            (5, 5),
            2,
            1,
        )
        .unwrap();

        let index = layer
            .value_table_mut()
            .add_record(vec!["H1".into(), 0.5f32.into()])
            .unwrap();
        assert_eq!(index, 1);
        layer.write(1, 1, 2, 2, &ItemBuffer::from(vec![1u8, 1, 0, 1])).unwrap();
        assert!(!layer.value_table().is_dirty());

        let reopened = GeorefMetadataLayer::open(container, 2, GEOREF_METADATA_PATH, "Elevation").unwrap();
        assert_eq!(reopened.read(1, 1, 2, 2).unwrap(), ItemBuffer::from(vec![1u8, 1, 0, 1]));
        assert_eq!(reopened.value_table().len(), 2);
        assert_eq!(reopened.key_type(), DataType::UInt8);
        assert_eq!(reopened.descriptor().chunk_size(), 2);
    }

    #[test]
    fn test_vr_keys_need_vr() {
        let dir = tempdir().unwrap();
        let mut layer = GeorefMetadataLayer::create(
            container(&dir),
            2,
            "Elevation",
            DataType::UInt32,
            GeorefMetadataProfile::Unknown,
            custom_definition(),
            (3, 3),
            0,
            0,
        )
        .unwrap();
        let err = layer.read_vr(0, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        layer.enable_vr(8);
        assert_eq!(layer.read_vr(0, 0).unwrap_err().kind(), ErrorKind::OutOfRange);
        layer
            .value_table_mut()
            .add_record(vec!["H1".into(), 0.5f32.into()])
            .unwrap();

        layer.write_vr(0, 2, &ItemBuffer::from(vec![0u32, 1, 0])).unwrap();
        layer.write_vr(10, 11, &ItemBuffer::from(vec![1u32, 1])).unwrap();
        assert_eq!(layer.vr_len(), 12);
        assert_eq!(layer.read_vr(1, 2).unwrap(), ItemBuffer::from(vec![1u32, 0]));
        assert_eq!(layer.read_vr(9, 11).unwrap(), ItemBuffer::from(vec![0u32, 1, 1]));
    }

    #[test]
    fn test_keys_must_name_a_record() {
        let dir = tempdir().unwrap();
        let mut layer = GeorefMetadataLayer::create(
            container(&dir),
            2,
            "Elevation",
            DataType::UInt16,
            GeorefMetadataProfile::Unknown,
            custom_definition(),
            (3, 3),
            0,
            0,
        )
        .unwrap();
        let err = layer.write(0, 0, 0, 1, &ItemBuffer::from(vec![0u16, 1])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(layer.read(0, 0, 0, 1).unwrap(), ItemBuffer::from(vec![0u16, 0]));

        layer
            .value_table_mut()
            .add_record(vec!["H1".into(), 0.5f32.into()])
            .unwrap();
        layer.write(0, 0, 0, 1, &ItemBuffer::from(vec![0u16, 1])).unwrap();

        layer.enable_vr(4);
        let err = layer.write_vr(0, 0, &ItemBuffer::from(vec![2u16])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(layer.vr_len(), 0);
    }

    #[test]
    fn test_vr_keys_full_index_range() {
        let dir = tempdir().unwrap();
        let mut layer = GeorefMetadataLayer::create(
            container(&dir),
            2,
            "Elevation",
            DataType::UInt32,
            GeorefMetadataProfile::Unknown,
            custom_definition(),
            (3, 3),
            0,
            0,
        )
        .unwrap();
        layer.enable_vr(8);

        let err = layer.write_vr(0, u32::MAX, &ItemBuffer::from(vec![0u32])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);
        assert_eq!(layer.read_vr(0, u32::MAX).unwrap_err().kind(), ErrorKind::OutOfRange);
        assert_eq!(layer.vr_len(), 0);
    }
}
