//! Variable resolution layers.
//!
//! [`VrMetadata`] is addressed by the coarse grid and tells, per cell, where
//! that cell's refined nodes start in the flat refinement index space.
//! [`VrRefinements`] and [`VrNode`] are addressed by that flat index and
//! grow as refinements are written.

use std::mem::size_of;
use std::sync::Arc;

use tracing::debug;

use super::descriptor::{
    widen, LayerDescriptor, VrMetadataDescriptor, VrNodeDescriptor, VrRefinementsDescriptor,
};
use super::{flat_count, flat_range, Region};
use crate::error::{BagError, Result};
use crate::items::{Columnar, ItemBuffer, VrMetadataItem, VrNodeItem, VrRefinementsItem};
use crate::storage::{self, grid_chunk_shape, ColumnGroup, Container};
use crate::types::{DataType, LayerType, BAG_NULL_GENERIC};

fn descriptor_for<T>(id: u32, layer_type: LayerType, chunk_size: u64, compression_level: u8) -> Result<LayerDescriptor> {
    let path = layer_type
        .internal_path()
        .ok_or_else(|| BagError::invalid_argument(format!("{layer_type} has no fixed path")))?;
    Ok(LayerDescriptor::new(
        id,
        layer_type,
        layer_type.name(),
        path,
        DataType::Compound,
        size_of::<T>(),
        chunk_size,
        compression_level,
    ))
}

fn size_check(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(BagError::size_mismatch(what, expected, actual));
    }
    Ok(())
}

fn wrong_buffer(what: &str, buffer: &ItemBuffer) -> BagError {
    BagError::type_mismatch(format!("{what} cannot store a {} buffer", buffer.kind_name()))
}

/// Length of a 1-D column group.
fn flat_len<T: Columnar>(columns: &ColumnGroup<T>) -> u64 {
    columns.shape().first().copied().unwrap_or(0)
}

/// Read `start..=end` from a 1-D column group.
fn read_flat<T: Columnar>(columns: &ColumnGroup<T>, start: u32, end: u32) -> Result<Vec<T>> {
    let len = flat_len(columns);
    if u64::from(end) >= len {
        return Err(BagError::out_of_range(format!(
            "index {end} beyond {len} stored items in {}",
            columns.path()
        )));
    }
    let subset = storage::subset(vec![u64::from(start)], vec![u64::from(end) - u64::from(start) + 1])?;
    columns.read(&subset)
}

/// Write `items` to `start..=end` of a 1-D column group, growing it first.
fn write_flat<T: Columnar>(columns: &mut ColumnGroup<T>, start: u32, end: u32, items: &[T]) -> Result<()> {
    let required = u64::from(end) + 1;
    if flat_len(columns) < required {
        columns.resize(vec![required])?;
    }
    let subset = storage::subset(vec![u64::from(start)], vec![items.len() as u64])?;
    columns.write(&subset, items)
}

/// Per-cell sub-grid descriptions of the VR extension.
pub struct VrMetadata {
    descriptor: LayerDescriptor,
    vr_descriptor: VrMetadataDescriptor,
    container: Arc<Container>,
    columns: ColumnGroup<VrMetadataItem>,
    dims: (u32, u32),
}

impl VrMetadata {
    pub(crate) fn create(
        container: Arc<Container>,
        id: u32,
        dims: (u32, u32),
        chunk_size: u64,
        compression_level: u8,
    ) -> Result<Self> {
        let descriptor =
            descriptor_for::<VrMetadataItem>(id, LayerType::VarResMetadata, chunk_size, compression_level)?;
        let vr_descriptor = VrMetadataDescriptor::default();
        let mut attrs = descriptor.settings_attributes();
        attrs.extend(vr_descriptor.to_attributes());

        let columns = ColumnGroup::create(
            &container,
            descriptor.internal_path(),
            vec![u64::from(dims.0), u64::from(dims.1)],
            grid_chunk_shape(dims.0, dims.1, chunk_size),
            compression_level,
            attrs,
        )?;

        Ok(Self {
            descriptor,
            vr_descriptor,
            container,
            columns,
            dims,
        })
    }

    pub(crate) fn open(container: Arc<Container>, id: u32) -> Result<Self> {
        let mut descriptor = descriptor_for::<VrMetadataItem>(id, LayerType::VarResMetadata, 0, 0)?;
        let columns = ColumnGroup::open(&container, descriptor.internal_path())?;
        let (rows, cols) = match columns.shape().as_slice() {
            [rows, cols] => (*rows, *cols),
            other => {
                return Err(BagError::format(format!(
                    "VR metadata has shape {other:?}, expected 2-D"
                )))
            }
        };
        let dim = |value: u64| {
            u32::try_from(value).map_err(|_| BagError::format(format!("VR metadata dimension {value} too large")))
        };
        let dims = (dim(rows)?, dim(cols)?);
        let attrs = container.group_attributes(descriptor.internal_path())?;
        descriptor.load_attributes(&attrs);

        Ok(Self {
            descriptor,
            vr_descriptor: VrMetadataDescriptor::from_attributes(&attrs),
            container,
            columns,
            dims,
        })
    }

    pub fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    pub fn vr_descriptor(&self) -> &VrMetadataDescriptor {
        &self.vr_descriptor
    }

    pub fn vr_descriptor_mut(&mut self) -> &mut VrMetadataDescriptor {
        &mut self.vr_descriptor
    }

    pub fn read(&self, row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<ItemBuffer> {
        let region = Region::within(row_start, col_start, row_end, col_end, self.dims.0, self.dims.1)?;
        Ok(ItemBuffer::VrMetadata(self.columns.read(&region.subset()?)?))
    }

    pub fn write(
        &mut self,
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        buffer: &ItemBuffer,
    ) -> Result<()> {
        self.container.ensure_writable("write VR metadata")?;
        let region = Region::within(row_start, col_start, row_end, col_end, self.dims.0, self.dims.1)?;
        let items = buffer
            .as_vr_metadata()
            .ok_or_else(|| wrong_buffer(self.descriptor.name(), buffer))?;
        size_check(self.descriptor.name(), region.len(), items.len())?;

        self.columns.write(&region.subset()?, items)?;
        for item in items {
            self.vr_descriptor.fold(
                (item.dimensions_x, item.dimensions_y),
                (item.resolution_x, item.resolution_y),
            );
        }
        self.write_attributes()
    }

    pub fn write_attributes(&self) -> Result<()> {
        self.container.ensure_writable("write VR metadata attributes")?;
        self.container
            .update_group_attributes(self.descriptor.internal_path(), self.vr_descriptor.to_attributes())
    }
}

/// Depth and uncertainty of every refined node.
pub struct VrRefinements {
    descriptor: LayerDescriptor,
    vr_descriptor: VrRefinementsDescriptor,
    container: Arc<Container>,
    columns: ColumnGroup<VrRefinementsItem>,
}

impl VrRefinements {
    pub(crate) fn create(container: Arc<Container>, id: u32, chunk_size: u64, compression_level: u8) -> Result<Self> {
        let descriptor = descriptor_for::<VrRefinementsItem>(
            id,
            LayerType::VarResRefinement,
            chunk_size,
            compression_level,
        )?;
        let vr_descriptor = VrRefinementsDescriptor::default();
        let mut attrs = descriptor.settings_attributes();
        attrs.extend(vr_descriptor.to_attributes());

        let columns = ColumnGroup::create(
            &container,
            descriptor.internal_path(),
            vec![0],
            vec![chunk_size.max(1)],
            compression_level,
            attrs,
        )?;

        Ok(Self {
            descriptor,
            vr_descriptor,
            container,
            columns,
        })
    }

    pub(crate) fn open(container: Arc<Container>, id: u32) -> Result<Self> {
        let mut descriptor = descriptor_for::<VrRefinementsItem>(id, LayerType::VarResRefinement, 0, 0)?;
        let columns = ColumnGroup::open(&container, descriptor.internal_path())?;
        let attrs = container.group_attributes(descriptor.internal_path())?;
        descriptor.load_attributes(&attrs);

        Ok(Self {
            descriptor,
            vr_descriptor: VrRefinementsDescriptor::from_attributes(&attrs),
            container,
            columns,
        })
    }

    pub fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    pub fn vr_descriptor(&self) -> &VrRefinementsDescriptor {
        &self.vr_descriptor
    }

    pub fn vr_descriptor_mut(&mut self) -> &mut VrRefinementsDescriptor {
        &mut self.vr_descriptor
    }

    /// Number of stored refinements.
    pub fn len(&self) -> u64 {
        flat_len(&self.columns)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read refinements `col_start..=col_end`; rows must be 0.
    pub fn read(&self, row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<ItemBuffer> {
        let (start, end) = flat_range(row_start, col_start, row_end, col_end)?;
        Ok(ItemBuffer::VrRefinements(read_flat(&self.columns, start, end)?))
    }

    /// Write refinements `col_start..=col_end`; rows must be 0.
    pub fn write(
        &mut self,
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        buffer: &ItemBuffer,
    ) -> Result<()> {
        self.container.ensure_writable("write VR refinements")?;
        let (start, end) = flat_range(row_start, col_start, row_end, col_end)?;
        let items = buffer
            .as_vr_refinements()
            .ok_or_else(|| wrong_buffer(self.descriptor.name(), buffer))?;
        size_check(self.descriptor.name(), flat_count(start, end)?, items.len())?;

        write_flat(&mut self.columns, start, end, items)?;
        for item in items {
            if item.depth != BAG_NULL_GENERIC {
                widen(self.vr_descriptor.depth_mut(), item.depth);
            }
            if item.depth_uncrt != BAG_NULL_GENERIC {
                widen(self.vr_descriptor.uncertainty_mut(), item.depth_uncrt);
            }
        }
        debug!(start, end, "Wrote VR refinements");
        self.write_attributes()
    }

    pub fn write_attributes(&self) -> Result<()> {
        self.container.ensure_writable("write VR refinements attributes")?;
        self.container
            .update_group_attributes(self.descriptor.internal_path(), self.vr_descriptor.to_attributes())
    }
}

/// Hypothesis statistics of every refined node.
pub struct VrNode {
    descriptor: LayerDescriptor,
    vr_descriptor: VrNodeDescriptor,
    container: Arc<Container>,
    columns: ColumnGroup<VrNodeItem>,
}

impl VrNode {
    pub(crate) fn create(container: Arc<Container>, id: u32, chunk_size: u64, compression_level: u8) -> Result<Self> {
        let descriptor =
            descriptor_for::<VrNodeItem>(id, LayerType::VarResNode, chunk_size, compression_level)?;
        let vr_descriptor = VrNodeDescriptor::default();
        let mut attrs = descriptor.settings_attributes();
        attrs.extend(vr_descriptor.to_attributes());

        let columns = ColumnGroup::create(
            &container,
            descriptor.internal_path(),
            vec![0],
            vec![chunk_size.max(1)],
            compression_level,
            attrs,
        )?;

        Ok(Self {
            descriptor,
            vr_descriptor,
            container,
            columns,
        })
    }

    pub(crate) fn open(container: Arc<Container>, id: u32) -> Result<Self> {
        let mut descriptor = descriptor_for::<VrNodeItem>(id, LayerType::VarResNode, 0, 0)?;
        let columns = ColumnGroup::open(&container, descriptor.internal_path())?;
        let attrs = container.group_attributes(descriptor.internal_path())?;
        descriptor.load_attributes(&attrs);

        Ok(Self {
            descriptor,
            vr_descriptor: VrNodeDescriptor::from_attributes(&attrs),
            container,
            columns,
        })
    }

    pub fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    pub fn vr_descriptor(&self) -> &VrNodeDescriptor {
        &self.vr_descriptor
    }

    pub fn vr_descriptor_mut(&mut self) -> &mut VrNodeDescriptor {
        &mut self.vr_descriptor
    }

    /// Number of stored nodes.
    pub fn len(&self) -> u64 {
        flat_len(&self.columns)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&self, row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<ItemBuffer> {
        let (start, end) = flat_range(row_start, col_start, row_end, col_end)?;
        Ok(ItemBuffer::VrNode(read_flat(&self.columns, start, end)?))
    }

    pub fn write(
        &mut self,
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        buffer: &ItemBuffer,
    ) -> Result<()> {
        self.container.ensure_writable("write VR nodes")?;
        let (start, end) = flat_range(row_start, col_start, row_end, col_end)?;
        let items = buffer
            .as_vr_node()
            .ok_or_else(|| wrong_buffer(self.descriptor.name(), buffer))?;
        size_check(self.descriptor.name(), flat_count(start, end)?, items.len())?;

        write_flat(&mut self.columns, start, end, items)?;
        for item in items {
            self.vr_descriptor
                .fold(item.hyp_strength, item.num_hypotheses, item.n_samples);
        }
        self.write_attributes()
    }

    pub fn write_attributes(&self) -> Result<()> {
        self.container.ensure_writable("write VR node attributes")?;
        self.container
            .update_group_attributes(self.descriptor.internal_path(), self.vr_descriptor.to_attributes())
    }
}
