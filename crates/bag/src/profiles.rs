//! Metadata profiles: named record definitions for georeferenced metadata.

use serde::{Deserialize, Serialize};

use crate::compound::{CompoundDataType, FieldDefinition, Record, RecordDefinition};
use crate::types::DataType;

/// Known attribute standards for georeferenced metadata layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GeorefMetadataProfile {
    /// Caller-defined record definition.
    #[default]
    Unknown,
    /// NOAA National Bathymetric Source, June 2022.
    NoaaNbs2022_06,
    /// NOAA Office of Coast Survey, October 2022.
    NoaaOcs2022_10,
}

const NOAA_NBS_2022_06_FIELDS: &[(&str, DataType)] = &[
    ("data_assessment", DataType::UInt32),
    ("significant_features", DataType::Boolean),
    ("feature_least_depth", DataType::Boolean),
    ("feature_size", DataType::Float32),
    ("coverage", DataType::Boolean),
    ("bathy_coverage", DataType::Boolean),
    ("horizontal_uncert_fixed", DataType::Float32),
    ("horizontal_uncert_var", DataType::Float32),
    ("vertical_uncert_fixed", DataType::Float32),
    ("vertical_uncert_var", DataType::Float32),
    ("license_name", DataType::String),
    ("license_url", DataType::String),
    ("source_survey_id", DataType::String),
    ("source_institution", DataType::String),
    ("survey_date_start", DataType::String),
    ("survey_date_end", DataType::String),
];

const NOAA_OCS_2022_10_FIELDS: &[(&str, DataType)] = &[
    ("significant_features", DataType::Boolean),
    ("feature_least_depth", DataType::Boolean),
    ("feature_size", DataType::Float32),
    ("feature_size_var", DataType::Float32),
    ("coverage", DataType::Boolean),
    ("bathy_coverage", DataType::Boolean),
    ("horizontal_uncert_fixed", DataType::Float32),
    ("horizontal_uncert_var", DataType::Float32),
    ("survey_date_start", DataType::String),
    ("survey_date_end", DataType::String),
    ("source_institution", DataType::String),
    ("source_survey_id", DataType::String),
    ("license_name", DataType::String),
    ("license_url", DataType::String),
];

impl GeorefMetadataProfile {
    /// Persisted profile name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN_METADATA_PROFILE",
            Self::NoaaNbs2022_06 => "NOAA_NBS_2022_06",
            Self::NoaaOcs2022_10 => "NOAA_OCS_2022_10",
        }
    }

    /// Parse a persisted profile name. Unrecognized names map to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "NOAA_NBS_2022_06" => Self::NoaaNbs2022_06,
            "NOAA_OCS_2022_10" => Self::NoaaOcs2022_10,
            _ => Self::Unknown,
        }
    }

    /// The record definition this profile fixes, or `None` for `Unknown`.
    pub fn definition(self) -> Option<RecordDefinition> {
        let fields = match self {
            Self::Unknown => return None,
            Self::NoaaNbs2022_06 => NOAA_NBS_2022_06_FIELDS,
            Self::NoaaOcs2022_10 => NOAA_OCS_2022_10_FIELDS,
        };
        Some(
            fields
                .iter()
                .map(|(name, data_type)| FieldDefinition::new(*name, *data_type))
                .collect(),
        )
    }
}

impl std::fmt::Display for GeorefMetadataProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a record conforming to the NOAA_NBS_2022_06 profile.
#[allow(clippy::too_many_arguments)]
pub fn create_record_noaa_nbs_2022_06(
    data_assessment: u32,
    significant_features: bool,
    feature_least_depth: bool,
    feature_size: f32,
    coverage: bool,
    bathy_coverage: bool,
    horizontal_uncert_fixed: f32,
    horizontal_uncert_var: f32,
    vertical_uncert_fixed: f32,
    vertical_uncert_var: f32,
    license_name: &str,
    license_url: &str,
    source_survey_id: &str,
    source_institution: &str,
    survey_date_start: &str,
    survey_date_end: &str,
) -> Record {
    vec![
        CompoundDataType::from(data_assessment),
        significant_features.into(),
        feature_least_depth.into(),
        feature_size.into(),
        coverage.into(),
        bathy_coverage.into(),
        horizontal_uncert_fixed.into(),
        horizontal_uncert_var.into(),
        vertical_uncert_fixed.into(),
        vertical_uncert_var.into(),
        license_name.into(),
        license_url.into(),
        source_survey_id.into(),
        source_institution.into(),
        survey_date_start.into(),
        survey_date_end.into(),
    ]
}

/// Build a record conforming to the NOAA_OCS_2022_10 profile.
#[allow(clippy::too_many_arguments)]
pub fn create_record_noaa_ocs_2022_10(
    significant_features: bool,
    feature_least_depth: bool,
    feature_size: f32,
    feature_size_var: f32,
    coverage: bool,
    bathy_coverage: bool,
    horizontal_uncert_fixed: f32,
    horizontal_uncert_var: f32,
    survey_date_start: &str,
    survey_date_end: &str,
    source_institution: &str,
    source_survey_id: &str,
    license_name: &str,
    license_url: &str,
) -> Record {
    vec![
        CompoundDataType::from(significant_features),
        feature_least_depth.into(),
        feature_size.into(),
        feature_size_var.into(),
        coverage.into(),
        bathy_coverage.into(),
        horizontal_uncert_fixed.into(),
        horizontal_uncert_var.into(),
        survey_date_start.into(),
        survey_date_end.into(),
        source_institution.into(),
        source_survey_id.into(),
        license_name.into(),
        license_url.into(),
    ]
}
