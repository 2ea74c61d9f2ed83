//! Layer descriptors.
//!
//! Every layer owns a [`LayerDescriptor`]. Layer kinds with extra persisted
//! state (VR statistics, surface corrector geometry) carry a second,
//! kind-specific descriptor next to it.

use serde_json::json;

use crate::descriptor::LayerEntry;
use crate::error::Result;
use crate::storage::{attr_f64, attr_u64, attr_str, Attributes};
use crate::types::{DataType, LayerType};

pub(crate) const CHUNK_SIZE_ATTR: &str = "chunk_size";
pub(crate) const COMPRESSION_LEVEL_ATTR: &str = "compression_level";

/// Initial value of a float statistic before anything is written.
pub(crate) const EMPTY_RANGE: (f32, f32) = (f32::MAX, f32::MIN);

/// Widen `range` to include `value`.
pub(crate) fn widen<T: PartialOrd + Copy>(range: &mut (T, T), value: T) {
    if value < range.0 {
        range.0 = value;
    }
    if value > range.1 {
        range.1 = value;
    }
}

/// Metadata common to every layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    id: u32,
    name: String,
    internal_path: String,
    layer_type: LayerType,
    data_type: DataType,
    element_size: usize,
    chunk_size: u64,
    compression_level: u8,
    min_max: (f32, f32),
}

impl LayerDescriptor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u32,
        layer_type: LayerType,
        name: impl Into<String>,
        internal_path: impl Into<String>,
        data_type: DataType,
        element_size: usize,
        chunk_size: u64,
        compression_level: u8,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            internal_path: internal_path.into(),
            layer_type,
            data_type,
            element_size,
            chunk_size,
            compression_level,
            min_max: EMPTY_RANGE,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage path of the layer inside the container.
    pub fn internal_path(&self) -> &str {
        &self.internal_path
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer_type
    }

    /// Element type returned by reads. Struct layers report `Compound`.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Size in bytes of one element.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn compression_level(&self) -> u8 {
        self.compression_level
    }

    /// Minimum and maximum of the written values.
    pub fn min_max(&self) -> (f32, f32) {
        self.min_max
    }

    pub fn set_min_max(&mut self, min: f32, max: f32) {
        self.min_max = (min, max);
    }

    /// Bytes needed to hold a `rows` x `columns` read.
    pub fn read_buffer_size(&self, rows: u32, columns: u32) -> usize {
        rows as usize * columns as usize * self.element_size
    }

    pub(crate) fn min_max_mut(&mut self) -> &mut (f32, f32) {
        &mut self.min_max
    }

    pub(crate) fn entry(&self) -> LayerEntry {
        LayerEntry {
            id: self.id,
            layer_type: self.layer_type,
            name: self.name.clone(),
            internal_path: self.internal_path.clone(),
        }
    }

    /// Chunking and compression attributes written when a layer is created.
    pub(crate) fn settings_attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(CHUNK_SIZE_ATTR.to_string(), json!(self.chunk_size));
        attrs.insert(COMPRESSION_LEVEL_ATTR.to_string(), json!(self.compression_level));
        attrs
    }

    /// Persisted min/max attributes for this layer type.
    pub(crate) fn min_max_attributes(&self) -> Attributes {
        let (min_name, max_name) = self.layer_type.min_max_attribute_names();
        let mut attrs = Attributes::new();
        attrs.insert(min_name.to_string(), json!(self.min_max.0));
        attrs.insert(max_name.to_string(), json!(self.min_max.1));
        attrs
    }

    /// Restore chunking, compression and min/max from stored attributes.
    pub(crate) fn load_attributes(&mut self, attrs: &Attributes) {
        if let Some(chunk_size) = attr_u64(attrs, CHUNK_SIZE_ATTR) {
            self.chunk_size = chunk_size;
        }
        if let Some(level) = attr_u64(attrs, COMPRESSION_LEVEL_ATTR) {
            self.compression_level = level.min(u64::from(u8::MAX)) as u8;
        }
        let (min_name, max_name) = self.layer_type.min_max_attribute_names();
        if let (Some(min), Some(max)) = (attr_f64(attrs, min_name), attr_f64(attrs, max_name)) {
            self.min_max = (min as f32, max as f32);
        }
    }
}

/// Persisted statistics of the VR metadata layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VrMetadataDescriptor {
    min_dimensions: (u32, u32),
    max_dimensions: (u32, u32),
    min_resolution: (f32, f32),
    max_resolution: (f32, f32),
}

impl Default for VrMetadataDescriptor {
    fn default() -> Self {
        Self {
            min_dimensions: (u32::MAX, u32::MAX),
            max_dimensions: (0, 0),
            min_resolution: (f32::MAX, f32::MAX),
            max_resolution: (f32::MIN, f32::MIN),
        }
    }
}

impl VrMetadataDescriptor {
    /// Smallest sub-grid dimensions written, as (x, y).
    pub fn min_dimensions(&self) -> (u32, u32) {
        self.min_dimensions
    }

    /// Largest sub-grid dimensions written, as (x, y).
    pub fn max_dimensions(&self) -> (u32, u32) {
        self.max_dimensions
    }

    /// Finest sub-grid resolution written, as (x, y).
    pub fn min_resolution(&self) -> (f32, f32) {
        self.min_resolution
    }

    /// Coarsest sub-grid resolution written, as (x, y).
    pub fn max_resolution(&self) -> (f32, f32) {
        self.max_resolution
    }

    pub fn set_min_dimensions(&mut self, x: u32, y: u32) {
        self.min_dimensions = (x, y);
    }

    pub fn set_max_dimensions(&mut self, x: u32, y: u32) {
        self.max_dimensions = (x, y);
    }

    pub fn set_min_resolution(&mut self, x: f32, y: f32) {
        self.min_resolution = (x, y);
    }

    pub fn set_max_resolution(&mut self, x: f32, y: f32) {
        self.max_resolution = (x, y);
    }

    /// Fold one cell's sub-grid description into the statistics. Cells
    /// without a refinement (zero dimensions) are ignored.
    pub(crate) fn fold(&mut self, dimensions: (u32, u32), resolution: (f32, f32)) {
        if dimensions.0 == 0 || dimensions.1 == 0 {
            return;
        }
        self.min_dimensions.0 = self.min_dimensions.0.min(dimensions.0);
        self.min_dimensions.1 = self.min_dimensions.1.min(dimensions.1);
        self.max_dimensions.0 = self.max_dimensions.0.max(dimensions.0);
        self.max_dimensions.1 = self.max_dimensions.1.max(dimensions.1);
        self.min_resolution.0 = self.min_resolution.0.min(resolution.0);
        self.min_resolution.1 = self.min_resolution.1.min(resolution.1);
        self.max_resolution.0 = self.max_resolution.0.max(resolution.0);
        self.max_resolution.1 = self.max_resolution.1.max(resolution.1);
    }

    pub(crate) fn to_attributes(self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("min_dimensions_x".into(), json!(self.min_dimensions.0));
        attrs.insert("min_dimensions_y".into(), json!(self.min_dimensions.1));
        attrs.insert("max_dimensions_x".into(), json!(self.max_dimensions.0));
        attrs.insert("max_dimensions_y".into(), json!(self.max_dimensions.1));
        attrs.insert("min_resolution_x".into(), json!(self.min_resolution.0));
        attrs.insert("min_resolution_y".into(), json!(self.min_resolution.1));
        attrs.insert("max_resolution_x".into(), json!(self.max_resolution.0));
        attrs.insert("max_resolution_y".into(), json!(self.max_resolution.1));
        attrs
    }

    pub(crate) fn from_attributes(attrs: &Attributes) -> Self {
        let mut descriptor = Self::default();
        let u32_pair = |x: &str, y: &str, fallback: (u32, u32)| {
            (
                attr_u64(attrs, x).map_or(fallback.0, |v| v as u32),
                attr_u64(attrs, y).map_or(fallback.1, |v| v as u32),
            )
        };
        let f32_pair = |x: &str, y: &str, fallback: (f32, f32)| {
            (
                attr_f64(attrs, x).map_or(fallback.0, |v| v as f32),
                attr_f64(attrs, y).map_or(fallback.1, |v| v as f32),
            )
        };
        descriptor.min_dimensions =
            u32_pair("min_dimensions_x", "min_dimensions_y", descriptor.min_dimensions);
        descriptor.max_dimensions =
            u32_pair("max_dimensions_x", "max_dimensions_y", descriptor.max_dimensions);
        descriptor.min_resolution =
            f32_pair("min_resolution_x", "min_resolution_y", descriptor.min_resolution);
        descriptor.max_resolution =
            f32_pair("max_resolution_x", "max_resolution_y", descriptor.max_resolution);
        descriptor
    }
}

/// Persisted statistics of the VR refinements layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VrRefinementsDescriptor {
    depth: (f32, f32),
    uncertainty: (f32, f32),
}

impl Default for VrRefinementsDescriptor {
    fn default() -> Self {
        Self {
            depth: EMPTY_RANGE,
            uncertainty: EMPTY_RANGE,
        }
    }
}

impl VrRefinementsDescriptor {
    pub fn min_max_depth(&self) -> (f32, f32) {
        self.depth
    }

    pub fn min_max_uncertainty(&self) -> (f32, f32) {
        self.uncertainty
    }

    pub fn set_min_max_depth(&mut self, min: f32, max: f32) {
        self.depth = (min, max);
    }

    pub fn set_min_max_uncertainty(&mut self, min: f32, max: f32) {
        self.uncertainty = (min, max);
    }

    pub(crate) fn depth_mut(&mut self) -> &mut (f32, f32) {
        &mut self.depth
    }

    pub(crate) fn uncertainty_mut(&mut self) -> &mut (f32, f32) {
        &mut self.uncertainty
    }

    pub(crate) fn to_attributes(self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("min_depth".into(), json!(self.depth.0));
        attrs.insert("max_depth".into(), json!(self.depth.1));
        attrs.insert("min_uncrt".into(), json!(self.uncertainty.0));
        attrs.insert("max_uncrt".into(), json!(self.uncertainty.1));
        attrs
    }

    pub(crate) fn from_attributes(attrs: &Attributes) -> Self {
        let get = |key: &str, fallback: f32| attr_f64(attrs, key).map_or(fallback, |v| v as f32);
        Self {
            depth: (get("min_depth", f32::MAX), get("max_depth", f32::MIN)),
            uncertainty: (get("min_uncrt", f32::MAX), get("max_uncrt", f32::MIN)),
        }
    }
}

/// Persisted statistics of the VR node layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VrNodeDescriptor {
    hyp_strength: (f32, f32),
    num_hypotheses: (u32, u32),
    n_samples: (u32, u32),
}

impl Default for VrNodeDescriptor {
    fn default() -> Self {
        Self {
            hyp_strength: EMPTY_RANGE,
            num_hypotheses: (u32::MAX, u32::MIN),
            n_samples: (u32::MAX, u32::MIN),
        }
    }
}

impl VrNodeDescriptor {
    pub fn min_max_hyp_strength(&self) -> (f32, f32) {
        self.hyp_strength
    }

    pub fn min_max_num_hypotheses(&self) -> (u32, u32) {
        self.num_hypotheses
    }

    pub fn min_max_n_samples(&self) -> (u32, u32) {
        self.n_samples
    }

    pub fn set_min_max_hyp_strength(&mut self, min: f32, max: f32) {
        self.hyp_strength = (min, max);
    }

    pub fn set_min_max_num_hypotheses(&mut self, min: u32, max: u32) {
        self.num_hypotheses = (min, max);
    }

    pub fn set_min_max_n_samples(&mut self, min: u32, max: u32) {
        self.n_samples = (min, max);
    }

    pub(crate) fn fold(&mut self, hyp_strength: f32, num_hypotheses: u32, n_samples: u32) {
        widen(&mut self.hyp_strength, hyp_strength);
        widen(&mut self.num_hypotheses, num_hypotheses);
        widen(&mut self.n_samples, n_samples);
    }

    pub(crate) fn to_attributes(self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("min_hyp_strength".into(), json!(self.hyp_strength.0));
        attrs.insert("max_hyp_strength".into(), json!(self.hyp_strength.1));
        attrs.insert("min_num_hypotheses".into(), json!(self.num_hypotheses.0));
        attrs.insert("max_num_hypotheses".into(), json!(self.num_hypotheses.1));
        attrs.insert("min_n_samples".into(), json!(self.n_samples.0));
        attrs.insert("max_n_samples".into(), json!(self.n_samples.1));
        attrs
    }

    pub(crate) fn from_attributes(attrs: &Attributes) -> Self {
        let float = |key: &str, fallback: f32| attr_f64(attrs, key).map_or(fallback, |v| v as f32);
        let int = |key: &str, fallback: u32| attr_u64(attrs, key).map_or(fallback, |v| v as u32);
        Self {
            hyp_strength: (float("min_hyp_strength", f32::MAX), float("max_hyp_strength", f32::MIN)),
            num_hypotheses: (int("min_num_hypotheses", u32::MAX), int("max_num_hypotheses", 0)),
            n_samples: (int("min_n_samples", u32::MAX), int("max_n_samples", 0)),
        }
    }
}

/// How surface correctors are positioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SurfaceTopography {
    #[default]
    Unknown,
    /// Correctors sit on a regular grid.
    GridExtents,
    /// Each corrector carries its own x, y position.
    IrregularlySpaced,
}

impl SurfaceTopography {
    /// Persisted numeric code.
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::GridExtents => 1,
            Self::IrregularlySpaced => 2,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Self::GridExtents,
            2 => Self::IrregularlySpaced,
            _ => Self::Unknown,
        }
    }
}

pub(crate) const SURFACE_TYPE_ATTR: &str = "surface_type";
pub(crate) const NUM_CORRECTORS_ATTR: &str = "num_correctors";
pub(crate) const VERTICAL_DATUM_ATTR: &str = "vertical_datum";

/// Geometry and datum description of the surface corrections layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCorrectionsDescriptor {
    topography: SurfaceTopography,
    num_correctors: u8,
    vertical_datums: String,
    origin: (f64, f64),
    spacing: (f64, f64),
    dims: (u32, u32),
}

impl SurfaceCorrectionsDescriptor {
    pub(crate) fn new(
        topography: SurfaceTopography,
        num_correctors: u8,
        dims: (u32, u32),
        origin: (f64, f64),
        spacing: (f64, f64),
    ) -> Self {
        Self {
            topography,
            num_correctors,
            vertical_datums: String::new(),
            origin,
            spacing,
            dims,
        }
    }

    pub fn topography(&self) -> SurfaceTopography {
        self.topography
    }

    pub fn num_correctors(&self) -> u8 {
        self.num_correctors
    }

    /// Vertical datum names, comma separated.
    pub fn vertical_datums(&self) -> &str {
        &self.vertical_datums
    }

    /// South-west corrector node position (x, y).
    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    /// Corrector node spacing (x, y).
    pub fn spacing(&self) -> (f64, f64) {
        self.spacing
    }

    /// Corrector grid dimensions as (rows, columns).
    pub fn dims(&self) -> (u32, u32) {
        self.dims
    }

    pub fn set_vertical_datums(&mut self, datums: impl Into<String>) {
        self.vertical_datums = datums.into();
    }

    pub fn set_origin(&mut self, x: f64, y: f64) {
        self.origin = (x, y);
    }

    pub fn set_spacing(&mut self, x: f64, y: f64) {
        self.spacing = (x, y);
    }

    pub(crate) fn to_attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(SURFACE_TYPE_ATTR.into(), json!(self.topography.code()));
        attrs.insert(NUM_CORRECTORS_ATTR.into(), json!(self.num_correctors));
        attrs.insert(VERTICAL_DATUM_ATTR.into(), json!(self.vertical_datums));
        attrs.insert("SW Corner X".into(), json!(self.origin.0));
        attrs.insert("SW Corner Y".into(), json!(self.origin.1));
        attrs.insert("Node Spacing X".into(), json!(self.spacing.0));
        attrs.insert("Node Spacing Y".into(), json!(self.spacing.1));
        attrs
    }

    /// Restore from stored attributes. Missing geometry falls back to the
    /// dataset's.
    pub(crate) fn from_attributes(
        attrs: &Attributes,
        dims: (u32, u32),
        origin: (f64, f64),
        spacing: (f64, f64),
    ) -> Result<Self> {
        let topography = SurfaceTopography::from_code(
            attr_u64(attrs, SURFACE_TYPE_ATTR).unwrap_or(0).min(u64::from(u8::MAX)) as u8,
        );
        let num_correctors = attr_u64(attrs, NUM_CORRECTORS_ATTR)
            .ok_or_else(|| crate::BagError::format("surface corrections without num_correctors"))?
            .min(u64::from(u8::MAX)) as u8;

        Ok(Self {
            topography,
            num_correctors,
            vertical_datums: attr_str(attrs, VERTICAL_DATUM_ATTR)
                .unwrap_or_default()
                .to_string(),
            origin: (
                attr_f64(attrs, "SW Corner X").unwrap_or(origin.0),
                attr_f64(attrs, "SW Corner Y").unwrap_or(origin.1),
            ),
            spacing: (
                attr_f64(attrs, "Node Spacing X").unwrap_or(spacing.0),
                attr_f64(attrs, "Node Spacing Y").unwrap_or(spacing.1),
            ),
            dims,
        })
    }
}
