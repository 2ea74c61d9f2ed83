//! Layer item types and the buffer returned by layer reads.
//!
//! Struct items are stored columnar: one array per field, all sharing the
//! item grid. [`Columnar`] describes that split for each item type.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::error::{BagError, Result};
use crate::types::{DataType, BAG_NULL_GENERIC, SURFACE_CORRECTOR_LIMIT};

/// Sub-grid description for one coarse cell of a variable resolution dataset.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct VrMetadataItem {
    /// Start of this cell's nodes in the flat refinement index space.
    pub index: u32,
    pub dimensions_x: u32,
    pub dimensions_y: u32,
    pub resolution_x: f32,
    pub resolution_y: f32,
    pub sw_corner_x: f32,
    pub sw_corner_y: f32,
}

/// Depth and uncertainty of one refined node.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct VrRefinementsItem {
    pub depth: f32,
    pub depth_uncrt: f32,
}

/// Hypothesis statistics of one refined node.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct VrNodeItem {
    pub hyp_strength: f32,
    pub num_hypotheses: u32,
    pub n_samples: u32,
}

/// Irregularly spaced vertical datum corrector: position plus one z per datum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct VerticalDatumCorrections {
    pub x: f64,
    pub y: f64,
    pub z: [f32; SURFACE_CORRECTOR_LIMIT],
}

/// Grid-aligned vertical datum corrector: one z per datum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct VerticalDatumCorrectionsGridded {
    pub z: [f32; SURFACE_CORRECTOR_LIMIT],
}

/// A manually edited sounding.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackingItem {
    pub row: u32,
    pub col: u32,
    /// Original depth before the edit.
    pub depth: f32,
    /// Original uncertainty before the edit.
    pub uncertainty: f32,
    /// Reason code for the edit.
    pub track_code: u8,
    /// Index of the list series the edit belongs to.
    pub list_series: u16,
}

/// A manually edited sounding inside a refined sub-grid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VrTrackingItem {
    pub row: u32,
    pub col: u32,
    pub sub_row: u32,
    pub sub_col: u32,
    pub depth: f32,
    pub uncertainty: f32,
    pub track_code: u8,
    pub list_series: u16,
}

/// Elements read from or written to a layer, in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemBuffer {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    VrMetadata(Vec<VrMetadataItem>),
    VrRefinements(Vec<VrRefinementsItem>),
    VrNode(Vec<VrNodeItem>),
    SurfaceCorrections(Vec<VerticalDatumCorrections>),
    GriddedCorrections(Vec<VerticalDatumCorrectionsGridded>),
}

macro_rules! buffer_accessors {
    ($($variant:ident => $ty:ty, $as_fn:ident, $into_fn:ident;)*) => {
        impl ItemBuffer {
            $(
                pub fn $as_fn(&self) -> Option<&[$ty]> {
                    match self {
                        Self::$variant(values) => Some(values.as_slice()),
                        _ => None,
                    }
                }

                pub fn $into_fn(self) -> Result<Vec<$ty>> {
                    match self {
                        Self::$variant(values) => Ok(values),
                        other => Err(BagError::type_mismatch(format!(
                            "expected {} buffer, got {}",
                            stringify!($variant),
                            other.kind_name()
                        ))),
                    }
                }
            )*
        }

        $(
            impl From<Vec<$ty>> for ItemBuffer {
                fn from(values: Vec<$ty>) -> Self {
                    Self::$variant(values)
                }
            }
        )*
    };
}

buffer_accessors! {
    Float32 => f32, as_f32, into_f32;
    Float64 => f64, as_f64, into_f64;
    UInt8 => u8, as_u8, into_u8;
    UInt16 => u16, as_u16, into_u16;
    UInt32 => u32, as_u32, into_u32;
    UInt64 => u64, as_u64, into_u64;
    VrMetadata => VrMetadataItem, as_vr_metadata, into_vr_metadata;
    VrRefinements => VrRefinementsItem, as_vr_refinements, into_vr_refinements;
    VrNode => VrNodeItem, as_vr_node, into_vr_node;
    SurfaceCorrections => VerticalDatumCorrections, as_surface_corrections, into_surface_corrections;
    GriddedCorrections => VerticalDatumCorrectionsGridded, as_gridded_corrections, into_gridded_corrections;
}

impl ItemBuffer {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::UInt8(v) => v.len(),
            Self::UInt16(v) => v.len(),
            Self::UInt32(v) => v.len(),
            Self::UInt64(v) => v.len(),
            Self::VrMetadata(v) => v.len(),
            Self::VrRefinements(v) => v.len(),
            Self::VrNode(v) => v.len(),
            Self::SurfaceCorrections(v) => v.len(),
            Self::GriddedCorrections(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type; struct items report [`DataType::Compound`].
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::UInt8(_) => DataType::UInt8,
            Self::UInt16(_) => DataType::UInt16,
            Self::UInt32(_) => DataType::UInt32,
            Self::UInt64(_) => DataType::UInt64,
            _ => DataType::Compound,
        }
    }

    /// Size in bytes of one element.
    pub fn element_size(&self) -> usize {
        match self {
            Self::VrMetadata(_) => std::mem::size_of::<VrMetadataItem>(),
            Self::VrRefinements(_) => std::mem::size_of::<VrRefinementsItem>(),
            Self::VrNode(_) => std::mem::size_of::<VrNodeItem>(),
            Self::SurfaceCorrections(_) => std::mem::size_of::<VerticalDatumCorrections>(),
            Self::GriddedCorrections(_) => std::mem::size_of::<VerticalDatumCorrectionsGridded>(),
            scalar => scalar.data_type().element_size(),
        }
    }

    /// The raw bytes of the buffer in native layout.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Float32(v) => bytemuck::cast_slice(v.as_slice()),
            Self::Float64(v) => bytemuck::cast_slice(v.as_slice()),
            Self::UInt8(v) => v.as_slice(),
            Self::UInt16(v) => bytemuck::cast_slice(v.as_slice()),
            Self::UInt32(v) => bytemuck::cast_slice(v.as_slice()),
            Self::UInt64(v) => bytemuck::cast_slice(v.as_slice()),
            Self::VrMetadata(v) => bytemuck::cast_slice(v.as_slice()),
            Self::VrRefinements(v) => bytemuck::cast_slice(v.as_slice()),
            Self::VrNode(v) => bytemuck::cast_slice(v.as_slice()),
            Self::SurfaceCorrections(v) => bytemuck::cast_slice(v.as_slice()),
            Self::GriddedCorrections(v) => bytemuck::cast_slice(v.as_slice()),
        }
    }

    /// Variant name used in error messages.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::Float32(_) => "Float32",
            Self::Float64(_) => "Float64",
            Self::UInt8(_) => "UInt8",
            Self::UInt16(_) => "UInt16",
            Self::UInt32(_) => "UInt32",
            Self::UInt64(_) => "UInt64",
            Self::VrMetadata(_) => "VrMetadata",
            Self::VrRefinements(_) => "VrRefinements",
            Self::VrNode(_) => "VrNode",
            Self::SurfaceCorrections(_) => "SurfaceCorrections",
            Self::GriddedCorrections(_) => "GriddedCorrections",
        }
    }
}

/// One stored field of a columnar item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub data_type: DataType,
    /// Value of never-written elements.
    pub fill: f64,
}

impl Column {
    pub const fn new(name: &'static str, data_type: DataType, fill: f64) -> Self {
        Self {
            name,
            data_type,
            fill,
        }
    }
}

/// Fixed-size records stored as one array per field.
pub trait Columnar: Sized {
    /// Stored fields, in the order used by `to_columns` and `from_columns`.
    const COLUMNS: &'static [Column];

    /// Split items into one scalar buffer per column.
    fn to_columns(items: &[Self]) -> Vec<ItemBuffer>;

    /// Reassemble items from one scalar buffer per column.
    fn from_columns(columns: Vec<ItemBuffer>) -> Result<Vec<Self>>;
}

/// Pull the next column out of a column iterator.
fn next_column(columns: &mut impl Iterator<Item = ItemBuffer>) -> Result<ItemBuffer> {
    columns
        .next()
        .ok_or_else(|| BagError::format("missing stored column"))
}

/// Length shared by every column, or a format error if they disagree.
fn common_len(lens: &[usize]) -> Result<usize> {
    let first = lens.first().copied().unwrap_or(0);
    if lens.iter().any(|&len| len != first) {
        return Err(BagError::format(format!(
            "stored columns have differing lengths {lens:?}"
        )));
    }
    Ok(first)
}

const NULL: f64 = BAG_NULL_GENERIC as f64;

impl Columnar for VrMetadataItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("index", DataType::UInt32, u32::MAX as f64),
        Column::new("dimensions_x", DataType::UInt32, 0.0),
        Column::new("dimensions_y", DataType::UInt32, 0.0),
        Column::new("resolution_x", DataType::Float32, 0.0),
        Column::new("resolution_y", DataType::Float32, 0.0),
        Column::new("sw_corner_x", DataType::Float32, 0.0),
        Column::new("sw_corner_y", DataType::Float32, 0.0),
    ];

    fn to_columns(items: &[Self]) -> Vec<ItemBuffer> {
        vec![
            items.iter().map(|i| i.index).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.dimensions_x).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.dimensions_y).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.resolution_x).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.resolution_y).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.sw_corner_x).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.sw_corner_y).collect::<Vec<_>>().into(),
        ]
    }

    fn from_columns(columns: Vec<ItemBuffer>) -> Result<Vec<Self>> {
        let mut columns = columns.into_iter();
        let index = next_column(&mut columns)?.into_u32()?;
        let dimensions_x = next_column(&mut columns)?.into_u32()?;
        let dimensions_y = next_column(&mut columns)?.into_u32()?;
        let resolution_x = next_column(&mut columns)?.into_f32()?;
        let resolution_y = next_column(&mut columns)?.into_f32()?;
        let sw_corner_x = next_column(&mut columns)?.into_f32()?;
        let sw_corner_y = next_column(&mut columns)?.into_f32()?;
        let len = common_len(&[
            index.len(),
            dimensions_x.len(),
            dimensions_y.len(),
            resolution_x.len(),
            resolution_y.len(),
            sw_corner_x.len(),
            sw_corner_y.len(),
        ])?;

        Ok((0..len)
            .map(|i| Self {
                index: index[i],
                dimensions_x: dimensions_x[i],
                dimensions_y: dimensions_y[i],
                resolution_x: resolution_x[i],
                resolution_y: resolution_y[i],
                sw_corner_x: sw_corner_x[i],
                sw_corner_y: sw_corner_y[i],
            })
            .collect())
    }
}

impl Columnar for VrRefinementsItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("depth", DataType::Float32, NULL),
        Column::new("depth_uncrt", DataType::Float32, NULL),
    ];

    fn to_columns(items: &[Self]) -> Vec<ItemBuffer> {
        vec![
            items.iter().map(|i| i.depth).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.depth_uncrt).collect::<Vec<_>>().into(),
        ]
    }

    fn from_columns(columns: Vec<ItemBuffer>) -> Result<Vec<Self>> {
        let mut columns = columns.into_iter();
        let depth = next_column(&mut columns)?.into_f32()?;
        let depth_uncrt = next_column(&mut columns)?.into_f32()?;
        common_len(&[depth.len(), depth_uncrt.len()])?;

        Ok(depth
            .into_iter()
            .zip(depth_uncrt)
            .map(|(depth, depth_uncrt)| Self { depth, depth_uncrt })
            .collect())
    }
}

impl Columnar for VrNodeItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("hyp_strength", DataType::Float32, NULL),
        Column::new("num_hypotheses", DataType::UInt32, 0.0),
        Column::new("n_samples", DataType::UInt32, 0.0),
    ];

    fn to_columns(items: &[Self]) -> Vec<ItemBuffer> {
        vec![
            items.iter().map(|i| i.hyp_strength).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.num_hypotheses).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.n_samples).collect::<Vec<_>>().into(),
        ]
    }

    fn from_columns(columns: Vec<ItemBuffer>) -> Result<Vec<Self>> {
        let mut columns = columns.into_iter();
        let hyp_strength = next_column(&mut columns)?.into_f32()?;
        let num_hypotheses = next_column(&mut columns)?.into_u32()?;
        let n_samples = next_column(&mut columns)?.into_u32()?;
        let len = common_len(&[hyp_strength.len(), num_hypotheses.len(), n_samples.len()])?;

        Ok((0..len)
            .map(|i| Self {
                hyp_strength: hyp_strength[i],
                num_hypotheses: num_hypotheses[i],
                n_samples: n_samples[i],
            })
            .collect())
    }
}

impl Columnar for TrackingItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("row", DataType::UInt32, 0.0),
        Column::new("col", DataType::UInt32, 0.0),
        Column::new("depth", DataType::Float32, 0.0),
        Column::new("uncertainty", DataType::Float32, 0.0),
        Column::new("track_code", DataType::UInt8, 0.0),
        Column::new("list_series", DataType::UInt16, 0.0),
    ];

    fn to_columns(items: &[Self]) -> Vec<ItemBuffer> {
        vec![
            items.iter().map(|i| i.row).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.col).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.depth).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.uncertainty).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.track_code).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.list_series).collect::<Vec<_>>().into(),
        ]
    }

    fn from_columns(columns: Vec<ItemBuffer>) -> Result<Vec<Self>> {
        let mut columns = columns.into_iter();
        let row = next_column(&mut columns)?.into_u32()?;
        let col = next_column(&mut columns)?.into_u32()?;
        let depth = next_column(&mut columns)?.into_f32()?;
        let uncertainty = next_column(&mut columns)?.into_f32()?;
        let track_code = next_column(&mut columns)?.into_u8()?;
        let list_series = next_column(&mut columns)?.into_u16()?;
        let len = common_len(&[
            row.len(),
            col.len(),
            depth.len(),
            uncertainty.len(),
            track_code.len(),
            list_series.len(),
        ])?;

        Ok((0..len)
            .map(|i| Self {
                row: row[i],
                col: col[i],
                depth: depth[i],
                uncertainty: uncertainty[i],
                track_code: track_code[i],
                list_series: list_series[i],
            })
            .collect())
    }
}

impl Columnar for VrTrackingItem {
    const COLUMNS: &'static [Column] = &[
        Column::new("row", DataType::UInt32, 0.0),
        Column::new("col", DataType::UInt32, 0.0),
        Column::new("sub_row", DataType::UInt32, 0.0),
        Column::new("sub_col", DataType::UInt32, 0.0),
        Column::new("depth", DataType::Float32, 0.0),
        Column::new("uncertainty", DataType::Float32, 0.0),
        Column::new("track_code", DataType::UInt8, 0.0),
        Column::new("list_series", DataType::UInt16, 0.0),
    ];

    fn to_columns(items: &[Self]) -> Vec<ItemBuffer> {
        vec![
            items.iter().map(|i| i.row).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.col).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.sub_row).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.sub_col).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.depth).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.uncertainty).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.track_code).collect::<Vec<_>>().into(),
            items.iter().map(|i| i.list_series).collect::<Vec<_>>().into(),
        ]
    }

    fn from_columns(columns: Vec<ItemBuffer>) -> Result<Vec<Self>> {
        let mut columns = columns.into_iter();
        let row = next_column(&mut columns)?.into_u32()?;
        let col = next_column(&mut columns)?.into_u32()?;
        let sub_row = next_column(&mut columns)?.into_u32()?;
        let sub_col = next_column(&mut columns)?.into_u32()?;
        let depth = next_column(&mut columns)?.into_f32()?;
        let uncertainty = next_column(&mut columns)?.into_f32()?;
        let track_code = next_column(&mut columns)?.into_u8()?;
        let list_series = next_column(&mut columns)?.into_u16()?;
        let len = common_len(&[
            row.len(),
            col.len(),
            sub_row.len(),
            sub_col.len(),
            depth.len(),
            uncertainty.len(),
            track_code.len(),
            list_series.len(),
        ])?;

        Ok((0..len)
            .map(|i| Self {
                row: row[i],
                col: col[i],
                sub_row: sub_row[i],
                sub_col: sub_col[i],
                depth: depth[i],
                uncertainty: uncertainty[i],
                track_code: track_code[i],
                list_series: list_series[i],
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_buffer_len_and_type() {
        let buffer = ItemBuffer::from(vec![1.0f32, 2.0, 3.0]);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.data_type(), DataType::Float32);
        assert_eq!(buffer.as_bytes().len(), 12);
        assert!(buffer.as_u32().is_none());
    }

    #[test]
    fn test_into_wrong_variant_is_type_mismatch() {
        let buffer = ItemBuffer::from(vec![1u8, 2]);
        assert_eq!(buffer.into_f32().unwrap_err().kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_struct_sizes_have_no_padding() {
        assert_eq!(std::mem::size_of::<VrMetadataItem>(), 28);
        assert_eq!(std::mem::size_of::<VrRefinementsItem>(), 8);
        assert_eq!(std::mem::size_of::<VrNodeItem>(), 12);
        assert_eq!(std::mem::size_of::<VerticalDatumCorrections>(), 56);
        let buffer = ItemBuffer::VrNode(vec![VrNodeItem::default(); 2]);
        assert_eq!(buffer.element_size(), 12);
        assert_eq!(buffer.as_bytes().len(), 24);
    }

    #[test]
    fn test_columns_reassemble_items() {
        let items = vec![
            VrMetadataItem {
                index: 0,
                dimensions_x: 3,
                dimensions_y: 4,
                resolution_x: 1.5,
                resolution_y: 2.5,
                sw_corner_x: 0.25,
                sw_corner_y: 0.75,
            },
            VrMetadataItem {
                index: 12,
                dimensions_x: 2,
                dimensions_y: 2,
                ..Default::default()
            },
        ];
        let columns = VrMetadataItem::to_columns(&items);
        assert_eq!(columns.len(), VrMetadataItem::COLUMNS.len());
        assert_eq!(VrMetadataItem::from_columns(columns).unwrap(), items);
    }

    #[test]
    fn test_tracking_columns_keep_narrow_types() {
        let items = vec![TrackingItem {
            row: 1,
            col: 2,
            depth: -10.5,
            uncertainty: 0.3,
            track_code: 7,
            list_series: 300,
        }];
        let columns = TrackingItem::to_columns(&items);
        assert_eq!(columns[4].data_type(), DataType::UInt8);
        assert_eq!(columns[5].data_type(), DataType::UInt16);
        assert_eq!(TrackingItem::from_columns(columns).unwrap(), items);
    }

    #[test]
    fn test_ragged_columns_are_format_errors() {
        let columns = vec![
            ItemBuffer::from(vec![1.0f32, 2.0]),
            ItemBuffer::from(vec![1.0f32]),
        ];
        assert_eq!(
            VrRefinementsItem::from_columns(columns).unwrap_err().kind(),
            ErrorKind::FormatError
        );
    }
}
