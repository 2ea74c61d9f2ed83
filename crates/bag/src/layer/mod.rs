//! The layer family.
//!
//! A dataset holds its layers as a closed set of variants behind [`Layer`].
//! Every variant reads and writes an inclusive bounding box
//! `(row_start, col_start) ..= (row_end, col_end)` in row-major order; the
//! flat-indexed VR layers use row 0 and treat the column bounds as an index
//! range.

mod descriptor;
mod georef;
mod interleaved;
mod simple;
mod surface_corrections;
mod vr;

pub use descriptor::{
    LayerDescriptor, SurfaceCorrectionsDescriptor, SurfaceTopography, VrMetadataDescriptor,
    VrNodeDescriptor, VrRefinementsDescriptor,
};
pub use georef::{CompoundLayer, GeorefMetadataLayer};
pub use interleaved::InterleavedLayer;
pub use simple::SimpleLayer;
pub use surface_corrections::SurfaceCorrections;
pub use vr::{VrMetadata, VrNode, VrRefinements};

pub(crate) use descriptor::widen;

use zarrs::array_subset::ArraySubset;

use crate::error::{BagError, Result};
use crate::items::ItemBuffer;
use crate::storage::{self, ArraySpec, Attributes, Container, StoreArray};
use crate::types::{DataType, LayerType};

/// Inclusive bounding box of a read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub row_start: u32,
    pub col_start: u32,
    pub row_end: u32,
    pub col_end: u32,
}

impl Region {
    /// Validate a bounding box against a `rows` x `columns` grid.
    pub fn within(
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        rows: u32,
        columns: u32,
    ) -> Result<Self> {
        if row_start > row_end || col_start > col_end {
            return Err(BagError::out_of_range(format!(
                "inverted region ({row_start}, {col_start}) to ({row_end}, {col_end})"
            )));
        }
        if row_end >= rows || col_end >= columns {
            return Err(BagError::out_of_range(format!(
                "region ({row_start}, {col_start}) to ({row_end}, {col_end}) outside {rows}x{columns} grid"
            )));
        }
        Ok(Self {
            row_start,
            col_start,
            row_end,
            col_end,
        })
    }

    pub fn rows(&self) -> u32 {
        self.row_end - self.row_start + 1
    }

    pub fn columns(&self) -> u32 {
        self.col_end - self.col_start + 1
    }

    /// Number of cells covered.
    pub fn len(&self) -> usize {
        self.rows() as usize * self.columns() as usize
    }

    /// The 2-D array subset covered.
    pub fn subset(&self) -> Result<ArraySubset> {
        storage::subset(
            vec![u64::from(self.row_start), u64::from(self.col_start)],
            vec![u64::from(self.rows()), u64::from(self.columns())],
        )
    }
}

/// Check a flat-index range addressed through the row/column signature.
pub(crate) fn flat_range(row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<(u32, u32)> {
    if row_start != 0 || row_end != 0 {
        return Err(BagError::out_of_range(format!(
            "flat-indexed layers use row 0, got rows {row_start}..={row_end}"
        )));
    }
    if col_start > col_end {
        return Err(BagError::out_of_range(format!(
            "inverted index range {col_start}..={col_end}"
        )));
    }
    Ok((col_start, col_end))
}

/// Number of items in the inclusive flat range `start..=end`.
pub(crate) fn flat_count(start: u32, end: u32) -> Result<usize> {
    let count = u64::from(end) - u64::from(start) + 1;
    usize::try_from(count)
        .map_err(|_| BagError::out_of_range(format!("index range {start}..={end} is too long")))
}

/// Fail unless `buffer` holds exactly `expected` elements of `data_type`.
pub(crate) fn check_buffer(buffer: &ItemBuffer, data_type: DataType, expected: usize, what: &str) -> Result<()> {
    if buffer.data_type() != data_type {
        return Err(BagError::type_mismatch(format!(
            "{what} holds {} elements, got a {} buffer",
            data_type,
            buffer.kind_name()
        )));
    }
    if buffer.len() != expected {
        return Err(BagError::size_mismatch(what, expected, buffer.len()));
    }
    Ok(())
}

/// A 2-D scalar array sized to the dataset grid.
pub(crate) struct Raster {
    array: StoreArray,
    rows: u32,
    columns: u32,
    data_type: DataType,
}

impl Raster {
    pub fn create(container: &Container, path: &str, spec: &ArraySpec) -> Result<Self> {
        let array = container.create_array(path, spec)?;
        Self::from_array(array, spec.data_type)
    }

    pub fn open(container: &Container, path: &str, data_type: DataType) -> Result<Self> {
        let array = container.open_array(path)?;
        Self::from_array(array, data_type)
    }

    fn from_array(array: StoreArray, data_type: DataType) -> Result<Self> {
        let (rows, columns) = match array.shape() {
            [rows, columns] => (*rows, *columns),
            other => {
                return Err(BagError::format(format!(
                    "{} is not a 2-D array, shape {other:?}",
                    array.path()
                )))
            }
        };
        let dim = |value: u64| {
            u32::try_from(value)
                .map_err(|_| BagError::format(format!("{} dimension {value} too large", array.path())))
        };
        let (rows, columns) = (dim(rows)?, dim(columns)?);
        Ok(Self {
            array,
            rows,
            columns,
            data_type,
        })
    }

    pub fn dims(&self) -> (u32, u32) {
        (self.rows, self.columns)
    }

    /// Attributes as stored when the array was opened.
    pub fn attributes(&self) -> &Attributes {
        self.array.attributes()
    }

    pub fn region(&self, row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<Region> {
        Region::within(row_start, col_start, row_end, col_end, self.rows, self.columns)
    }

    pub fn read(&self, region: &Region) -> Result<ItemBuffer> {
        storage::read_elements(&self.array, &region.subset()?, self.data_type)
    }

    pub fn write(&self, region: &Region, buffer: &ItemBuffer, what: &str) -> Result<()> {
        check_buffer(buffer, self.data_type, region.len(), what)?;
        storage::write_elements(&self.array, &region.subset()?, buffer)
    }
}

/// Fold a written scalar buffer into a min/max pair, skipping `null`.
pub(crate) fn fold_min_max(range: &mut (f32, f32), buffer: &ItemBuffer, null: f32) {
    match buffer {
        ItemBuffer::Float32(values) => values
            .iter()
            .filter(|v| **v != null && !v.is_nan())
            .for_each(|v| widen(range, *v)),
        ItemBuffer::UInt32(values) => values.iter().for_each(|v| widen(range, *v as f32)),
        ItemBuffer::UInt16(values) => values.iter().for_each(|v| widen(range, f32::from(*v))),
        ItemBuffer::UInt8(values) => values.iter().for_each(|v| widen(range, f32::from(*v))),
        _ => {}
    }
}

/// One layer of a dataset.
pub enum Layer {
    Simple(SimpleLayer),
    Interleaved(InterleavedLayer),
    GeorefMetadata(GeorefMetadataLayer),
    SurfaceCorrections(SurfaceCorrections),
    VrMetadata(VrMetadata),
    VrRefinements(VrRefinements),
    VrNode(VrNode),
}

impl Layer {
    pub fn descriptor(&self) -> &LayerDescriptor {
        match self {
            Self::Simple(layer) => layer.descriptor(),
            Self::Interleaved(layer) => layer.descriptor(),
            Self::GeorefMetadata(layer) => layer.descriptor(),
            Self::SurfaceCorrections(layer) => layer.descriptor(),
            Self::VrMetadata(layer) => layer.descriptor(),
            Self::VrRefinements(layer) => layer.descriptor(),
            Self::VrNode(layer) => layer.descriptor(),
        }
    }

    pub fn id(&self) -> u32 {
        self.descriptor().id()
    }

    pub fn layer_type(&self) -> LayerType {
        self.descriptor().layer_type()
    }

    pub fn name(&self) -> &str {
        self.descriptor().name()
    }

    /// Read the inclusive bounding box.
    pub fn read(&self, row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<ItemBuffer> {
        match self {
            Self::Simple(layer) => layer.read(row_start, col_start, row_end, col_end),
            Self::Interleaved(layer) => layer.read(row_start, col_start, row_end, col_end),
            Self::GeorefMetadata(layer) => layer.read(row_start, col_start, row_end, col_end),
            Self::SurfaceCorrections(layer) => layer.read(row_start, col_start, row_end, col_end),
            Self::VrMetadata(layer) => layer.read(row_start, col_start, row_end, col_end),
            Self::VrRefinements(layer) => layer.read(row_start, col_start, row_end, col_end),
            Self::VrNode(layer) => layer.read(row_start, col_start, row_end, col_end),
        }
    }

    /// Write the inclusive bounding box.
    pub fn write(
        &mut self,
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        buffer: &ItemBuffer,
    ) -> Result<()> {
        match self {
            Self::Simple(layer) => layer.write(row_start, col_start, row_end, col_end, buffer),
            Self::Interleaved(layer) => layer.write(row_start, col_start, row_end, col_end, buffer),
            Self::GeorefMetadata(layer) => layer.write(row_start, col_start, row_end, col_end, buffer),
            Self::SurfaceCorrections(layer) => {
                layer.write(row_start, col_start, row_end, col_end, buffer)
            }
            Self::VrMetadata(layer) => layer.write(row_start, col_start, row_end, col_end, buffer),
            Self::VrRefinements(layer) => layer.write(row_start, col_start, row_end, col_end, buffer),
            Self::VrNode(layer) => layer.write(row_start, col_start, row_end, col_end, buffer),
        }
    }

    /// Persist the descriptor's mutable fields without touching the payload.
    pub fn write_attributes(&mut self) -> Result<()> {
        match self {
            Self::Simple(layer) => layer.write_attributes(),
            Self::Interleaved(layer) => layer.write_attributes(),
            Self::GeorefMetadata(layer) => layer.write_attributes(),
            Self::SurfaceCorrections(layer) => layer.write_attributes(),
            Self::VrMetadata(layer) => layer.write_attributes(),
            Self::VrRefinements(layer) => layer.write_attributes(),
            Self::VrNode(layer) => layer.write_attributes(),
        }
    }

    pub fn as_simple(&self) -> Option<&SimpleLayer> {
        match self {
            Self::Simple(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_simple_mut(&mut self) -> Option<&mut SimpleLayer> {
        match self {
            Self::Simple(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_interleaved(&self) -> Option<&InterleavedLayer> {
        match self {
            Self::Interleaved(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_georef_metadata(&self) -> Option<&GeorefMetadataLayer> {
        match self {
            Self::GeorefMetadata(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_georef_metadata_mut(&mut self) -> Option<&mut GeorefMetadataLayer> {
        match self {
            Self::GeorefMetadata(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_surface_corrections(&self) -> Option<&SurfaceCorrections> {
        match self {
            Self::SurfaceCorrections(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_surface_corrections_mut(&mut self) -> Option<&mut SurfaceCorrections> {
        match self {
            Self::SurfaceCorrections(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_interleaved_mut(&mut self) -> Option<&mut InterleavedLayer> {
        match self {
            Self::Interleaved(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_vr_metadata(&self) -> Option<&VrMetadata> {
        match self {
            Self::VrMetadata(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_vr_metadata_mut(&mut self) -> Option<&mut VrMetadata> {
        match self {
            Self::VrMetadata(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_vr_refinements(&self) -> Option<&VrRefinements> {
        match self {
            Self::VrRefinements(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_vr_refinements_mut(&mut self) -> Option<&mut VrRefinements> {
        match self {
            Self::VrRefinements(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_vr_node(&self) -> Option<&VrNode> {
        match self {
            Self::VrNode(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_vr_node_mut(&mut self) -> Option<&mut VrNode> {
        match self {
            Self::VrNode(layer) => Some(layer),
            _ => None,
        }
    }

    /// Flush pending in-memory state of a writable layer.
    pub(crate) fn flush(&mut self) -> Result<()> {
        match self {
            Self::Interleaved(layer) if layer.is_legacy() => Ok(()),
            _ => self.write_attributes(),
        }
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("descriptor", self.descriptor())
            .finish()
    }
}

macro_rules! debug_by_descriptor {
    ($($layer:ident),* $(,)?) => {
        $(
            impl std::fmt::Debug for $layer {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.debug_struct(stringify!($layer))
                        .field("descriptor", self.descriptor())
                        .finish()
                }
            }
        )*
    };
}

debug_by_descriptor!(
    SimpleLayer,
    InterleavedLayer,
    GeorefMetadataLayer,
    SurfaceCorrections,
    VrMetadata,
    VrRefinements,
    VrNode,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_region_bounds() {
        let region = Region::within(1, 2, 3, 5, 10, 10).unwrap();
        assert_eq!(region.rows(), 3);
        assert_eq!(region.columns(), 4);
        assert_eq!(region.len(), 12);

        assert_eq!(
            Region::within(0, 0, 10, 0, 10, 10).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
        assert_eq!(
            Region::within(5, 0, 4, 0, 10, 10).unwrap_err().kind(),
            ErrorKind::OutOfRange
        );
    }

    #[test]
    fn test_flat_range_requires_row_zero() {
        assert_eq!(flat_range(0, 4, 0, 9).unwrap(), (4, 9));
        assert_eq!(flat_range(1, 0, 1, 0).unwrap_err().kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_flat_count_spans_full_index_space() {
        assert_eq!(flat_count(4, 9).unwrap(), 6);
        assert_eq!(flat_count(7, 7).unwrap(), 1);
        assert_eq!(flat_count(0, u32::MAX).unwrap() as u64, u64::from(u32::MAX) + 1);
    }

    #[test]
    fn test_check_buffer() {
        let buffer = ItemBuffer::from(vec![1.0f32, 2.0]);
        assert!(check_buffer(&buffer, DataType::Float32, 2, "elevation").is_ok());
        assert_eq!(
            check_buffer(&buffer, DataType::Float32, 3, "elevation").unwrap_err().kind(),
            ErrorKind::SizeMismatch
        );
        assert_eq!(
            check_buffer(&buffer, DataType::UInt32, 2, "num_soundings").unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_fold_min_max_skips_null() {
        let mut range = descriptor::EMPTY_RANGE;
        fold_min_max(&mut range, &ItemBuffer::from(vec![1_000_000.0f32, -4.0, 2.5]), 1_000_000.0);
        assert_eq!(range, (-4.0, 2.5));
    }
}
