//! Core enumerations and constants shared across the crate.

use serde::{Deserialize, Serialize};

/// Version string written into new datasets.
pub const BAG_VERSION: &str = "2.0.1";

/// Null value for elevation cells.
pub const BAG_NULL_ELEVATION: f32 = 1_000_000.0;

/// Null value for uncertainty cells.
pub const BAG_NULL_UNCERTAINTY: f32 = 1_000_000.0;

/// Null value for every other floating-point cell.
pub const BAG_NULL_GENERIC: f32 = 1_000_000.0;

/// Maximum number of vertical datum correctors per surface correction node.
pub const SURFACE_CORRECTOR_LIMIT: usize = 10;

/// Root group of every dataset.
pub const ROOT_PATH: &str = "/BAG_root";

/// Group holding the metadata blob.
pub const METADATA_PATH: &str = "/BAG_root/metadata";

/// Parent group of georeferenced metadata layers.
pub const GEOREF_METADATA_PATH: &str = "/BAG_root/georef_metadata";

/// Parent group name used by older writers.
pub const LEGACY_GEOREF_METADATA_PATH: &str = "/BAG_root/Georef_metadata";

/// Group holding the tracking list columns.
pub const TRACKING_LIST_PATH: &str = "/BAG_root/tracking_list";

/// Group holding the VR tracking list columns.
pub const VR_TRACKING_LIST_PATH: &str = "/BAG_root/varres_tracking_list";

/// How a dataset is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Element types used by layers and record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Float32,
    Float64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Boolean,
    String,
    Compound,
    Unknown,
}

impl DataType {
    /// Size in bytes of one element, 0 for variable or structured types.
    pub fn element_size(self) -> usize {
        match self {
            Self::Float32 | Self::UInt32 => 4,
            Self::Float64 | Self::UInt64 => 8,
            Self::UInt16 => 2,
            Self::UInt8 | Self::Boolean => 1,
            Self::String | Self::Compound | Self::Unknown => 0,
        }
    }

    /// Whether this type can index a value table.
    pub fn is_key_type(self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32)
    }

    /// Get the type name as a string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Compound => "compound",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a layer within a dataset.
///
/// The discriminants are the stable layer type ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayerType {
    Elevation = 0,
    Uncertainty = 1,
    HypothesisStrength = 2,
    NumHypotheses = 3,
    ShoalElevation = 4,
    StdDev = 5,
    NumSoundings = 6,
    AverageElevation = 7,
    NominalElevation = 8,
    SurfaceCorrection = 9,
    GeorefMetadata = 10,
    VarResMetadata = 11,
    VarResRefinement = 12,
    VarResNode = 13,
}

/// Older name for georeferenced metadata layers.
pub const COMPOUND: LayerType = LayerType::GeorefMetadata;

impl LayerType {
    /// Every layer type that can be created as a simple layer, in id order.
    pub const SIMPLE: [LayerType; 9] = [
        Self::Elevation,
        Self::Uncertainty,
        Self::HypothesisStrength,
        Self::NumHypotheses,
        Self::ShoalElevation,
        Self::StdDev,
        Self::NumSoundings,
        Self::AverageElevation,
        Self::NominalElevation,
    ];

    /// Stable numeric id.
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Display name, also used as the default layer name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Elevation => "Elevation",
            Self::Uncertainty => "Uncertainty",
            Self::HypothesisStrength => "Hypothesis_Strength",
            Self::NumHypotheses => "Num_Hypotheses",
            Self::ShoalElevation => "Shoal_Elevation",
            Self::StdDev => "Std_Dev",
            Self::NumSoundings => "Num_Soundings",
            Self::AverageElevation => "Average_Elevation",
            Self::NominalElevation => "Nominal_Elevation",
            Self::SurfaceCorrection => "Surface_Correction",
            Self::GeorefMetadata => "Georef_Metadata",
            Self::VarResMetadata => "Variable_Resolution_Metadata",
            Self::VarResRefinement => "Variable_Resolution_Refinement",
            Self::VarResNode => "Variable_Resolution_Node",
        }
    }

    /// Look a layer type up by display name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::SIMPLE
            .iter()
            .chain(&[
                Self::SurfaceCorrection,
                Self::GeorefMetadata,
                Self::VarResMetadata,
                Self::VarResRefinement,
                Self::VarResNode,
            ])
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Whether this type is one of the single-scalar raster layers.
    pub fn is_simple(self) -> bool {
        self.id() <= Self::NominalElevation.id()
    }

    /// Element type of a simple or interleaved layer of this type.
    pub fn element_type(self) -> DataType {
        match self {
            Self::NumHypotheses | Self::NumSoundings => DataType::UInt32,
            Self::SurfaceCorrection
            | Self::VarResMetadata
            | Self::VarResRefinement
            | Self::VarResNode => DataType::Compound,
            Self::GeorefMetadata => DataType::Unknown,
            _ => DataType::Float32,
        }
    }

    /// Stable storage path for layer types that are not keyed by name.
    pub fn internal_path(self) -> Option<&'static str> {
        let path = match self {
            Self::Elevation => "/BAG_root/elevation",
            Self::Uncertainty => "/BAG_root/uncertainty",
            Self::HypothesisStrength => "/BAG_root/hypotheses_strength",
            Self::NumHypotheses => "/BAG_root/num_hypotheses",
            Self::ShoalElevation => "/BAG_root/shoal_elevation",
            Self::StdDev => "/BAG_root/standard_dev",
            Self::NumSoundings => "/BAG_root/num_soundings",
            Self::AverageElevation => "/BAG_root/average",
            Self::NominalElevation => "/BAG_root/nominal_elevation",
            Self::SurfaceCorrection => "/BAG_root/vertical_datum_corrections",
            Self::VarResMetadata => "/BAG_root/varres_metadata",
            Self::VarResRefinement => "/BAG_root/varres_refinements",
            Self::VarResNode => "/BAG_root/varres_nodes",
            Self::GeorefMetadata => return None,
        };
        Some(path)
    }

    /// Attribute names holding the persisted minimum and maximum.
    pub(crate) fn min_max_attribute_names(self) -> (&'static str, &'static str) {
        match self {
            Self::Elevation => ("Minimum Elevation Value", "Maximum Elevation Value"),
            Self::Uncertainty => ("Minimum Uncertainty Value", "Maximum Uncertainty Value"),
            Self::HypothesisStrength => ("min_hyp_strength", "max_hyp_strength"),
            Self::NumHypotheses => ("min_num_hypotheses", "max_num_hypotheses"),
            Self::ShoalElevation => ("min_shoal_elevation", "max_shoal_elevation"),
            Self::StdDev => ("min_stddev", "max_stddev"),
            Self::NumSoundings => ("min_num_soundings", "max_num_soundings"),
            _ => ("min_value", "max_value"),
        }
    }

    /// Null value of a float layer of this type.
    pub fn null_value(self) -> f32 {
        match self {
            Self::Elevation | Self::ShoalElevation | Self::AverageElevation | Self::NominalElevation => {
                BAG_NULL_ELEVATION
            }
            Self::Uncertainty => BAG_NULL_UNCERTAINTY,
            _ => BAG_NULL_GENERIC,
        }
    }
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Group holding interleaved layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupType {
    /// Hypothesis statistics per node.
    Node,
    /// Per-node elevation solution statistics.
    Elevation,
}

impl GroupType {
    /// Storage path of the group.
    pub fn path(self) -> &'static str {
        match self {
            Self::Node => "/BAG_root/node",
            Self::Elevation => "/BAG_root/elevation_solution",
        }
    }

    /// Layer types that may live in this group.
    pub fn members(self) -> &'static [LayerType] {
        match self {
            Self::Node => &[LayerType::HypothesisStrength, LayerType::NumHypotheses],
            Self::Elevation => &[
                LayerType::ShoalElevation,
                LayerType::StdDev,
                LayerType::NumSoundings,
            ],
        }
    }

    /// Member array name for `layer_type`, or `None` if it is not a member.
    pub fn member_name(self, layer_type: LayerType) -> Option<&'static str> {
        if !self.members().contains(&layer_type) {
            return None;
        }
        Some(match layer_type {
            LayerType::HypothesisStrength => "hyp_strength",
            LayerType::NumHypotheses => "num_hypotheses",
            LayerType::ShoalElevation => "shoal_elevation",
            LayerType::StdDev => "stddev",
            _ => "num_soundings",
        })
    }
}

/// Split a dotted version string into numeric components.
///
/// Non-numeric components stop the parse.
pub(crate) fn parse_version(version: &str) -> Vec<u32> {
    version
        .trim()
        .split('.')
        .map_while(|part| part.trim().parse().ok())
        .collect()
}

/// Whether `version` is at least `major.minor`.
pub(crate) fn version_at_least(version: &str, major: u32, minor: u32) -> bool {
    let parts = parse_version(version);
    let have = (
        parts.first().copied().unwrap_or(0),
        parts.get(1).copied().unwrap_or(0),
    );
    have >= (major, minor)
}
