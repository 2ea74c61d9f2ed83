use std::sync::Arc;

use super::descriptor::LayerDescriptor;
use super::simple::null_fill;
use super::{fold_min_max, Raster};
use crate::error::{BagError, Result};
use crate::items::ItemBuffer;
use crate::storage::{ArraySpec, Attributes, Container};
use crate::types::{GroupType, LayerType};

/// One member of a NODE or ELEVATION group.
///
/// Members share the group's storage node. Layers discovered in datasets
/// older than 2.0 are legacy and cannot be written.
pub struct InterleavedLayer {
    descriptor: LayerDescriptor,
    container: Arc<Container>,
    group: GroupType,
    raster: Raster,
    legacy: bool,
}

fn member_path(layer_type: LayerType, group: GroupType) -> Result<String> {
    let member = group.member_name(layer_type).ok_or_else(|| {
        BagError::invalid_argument(format!("{layer_type} is not a member of the {group:?} group"))
    })?;
    Ok(format!("{}/{member}", group.path()))
}

impl InterleavedLayer {
    pub(crate) fn create(
        container: Arc<Container>,
        id: u32,
        layer_type: LayerType,
        group: GroupType,
        dims: (u32, u32),
        chunk_size: u64,
        compression_level: u8,
    ) -> Result<Self> {
        let path = member_path(layer_type, group)?;
        if !container.node_exists(group.path()) {
            container.create_group(group.path(), Attributes::new())?;
        }

        let data_type = layer_type.element_type();
        let descriptor = LayerDescriptor::new(
            id,
            layer_type,
            layer_type.name(),
            path.as_str(),
            data_type,
            data_type.element_size(),
            chunk_size,
            compression_level,
        );
        let mut attrs = descriptor.settings_attributes();
        attrs.extend(descriptor.min_max_attributes());
        let spec = ArraySpec::grid(
            dims.0,
            dims.1,
            chunk_size,
            data_type,
            f64::from(null_fill(layer_type)),
            compression_level,
        )
        .with_attributes(attrs);
        let raster = Raster::create(&container, &path, &spec)?;

        Ok(Self {
            descriptor,
            container,
            group,
            raster,
            legacy: false,
        })
    }

    pub(crate) fn open(
        container: Arc<Container>,
        id: u32,
        layer_type: LayerType,
        group: GroupType,
        legacy: bool,
    ) -> Result<Self> {
        let path = member_path(layer_type, group)?;
        let data_type = layer_type.element_type();
        let raster = Raster::open(&container, &path, data_type)?;
        let mut descriptor = LayerDescriptor::new(
            id,
            layer_type,
            layer_type.name(),
            path.as_str(),
            data_type,
            data_type.element_size(),
            0,
            0,
        );
        descriptor.load_attributes(raster.attributes());

        Ok(Self {
            descriptor,
            container,
            group,
            raster,
            legacy,
        })
    }

    pub fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    pub fn group(&self) -> GroupType {
        self.group
    }

    /// Whether the layer was read from a pre-2.0 dataset.
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    pub fn read(&self, row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<ItemBuffer> {
        let region = self.raster.region(row_start, col_start, row_end, col_end)?;
        self.raster.read(&region)
    }

    pub fn write(
        &mut self,
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        buffer: &ItemBuffer,
    ) -> Result<()> {
        self.ensure_writable()?;
        let region = self.raster.region(row_start, col_start, row_end, col_end)?;
        self.raster.write(&region, buffer, self.descriptor.name())?;
        let null = self.descriptor.layer_type().null_value();
        fold_min_max(self.descriptor.min_max_mut(), buffer, null);
        self.write_attributes()
    }

    pub fn write_attributes(&self) -> Result<()> {
        self.ensure_writable()?;
        self.container
            .update_array_attributes(self.descriptor.internal_path(), self.descriptor.min_max_attributes())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.legacy {
            return Err(BagError::read_only(format!(
                "legacy interleaved layer {}",
                self.descriptor.name()
            )));
        }
        self.container.ensure_writable("write interleaved layer")
    }
}
