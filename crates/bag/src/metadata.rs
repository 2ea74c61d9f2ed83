//! Dataset metadata.
//!
//! The ISO metadata document is kept as an opaque XML blob. The fields the
//! storage engine needs (grid size, resolution, corners and reference
//! systems) are carried alongside it as plain accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BagError, Result};

/// Grid and georeferencing description of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Number of grid rows.
    pub rows: u32,
    /// Number of grid columns.
    pub columns: u32,
    /// Node spacing along a column (y direction).
    pub row_resolution: f64,
    /// Node spacing along a row (x direction).
    pub column_resolution: f64,
    /// Lower-left node x coordinate.
    pub ll_corner_x: f64,
    /// Lower-left node y coordinate.
    pub ll_corner_y: f64,
    /// Upper-right node x coordinate.
    pub ur_corner_x: f64,
    /// Upper-right node y coordinate.
    pub ur_corner_y: f64,
    /// Horizontal reference system as WKT.
    #[serde(default)]
    pub horizontal_reference_system: String,
    /// Vertical reference system as WKT.
    #[serde(default)]
    pub vertical_reference_system: String,
    /// When the metadata was produced.
    #[serde(default)]
    pub date_stamp: Option<DateTime<Utc>>,
    /// The full metadata document, stored verbatim.
    #[serde(default)]
    pub xml: Option<String>,
}

impl Metadata {
    /// Describe a `rows` x `columns` grid whose lower-left node sits at
    /// `ll_corner` with the given node spacings. The upper-right corner is
    /// derived from the spacing.
    pub fn new(
        rows: u32,
        columns: u32,
        row_resolution: f64,
        column_resolution: f64,
        ll_corner: (f64, f64),
    ) -> Self {
        let ur_x = ll_corner.0 + f64::from(columns.saturating_sub(1)) * column_resolution;
        let ur_y = ll_corner.1 + f64::from(rows.saturating_sub(1)) * row_resolution;
        Self {
            rows,
            columns,
            row_resolution,
            column_resolution,
            ll_corner_x: ll_corner.0,
            ll_corner_y: ll_corner.1,
            ur_corner_x: ur_x,
            ur_corner_y: ur_y,
            horizontal_reference_system: String::new(),
            vertical_reference_system: String::new(),
            date_stamp: None,
            xml: None,
        }
    }

    /// Set both reference systems.
    pub fn with_reference_systems(
        mut self,
        horizontal: impl Into<String>,
        vertical: impl Into<String>,
    ) -> Self {
        self.horizontal_reference_system = horizontal.into();
        self.vertical_reference_system = vertical.into();
        self
    }

    /// Attach the metadata document.
    pub fn with_xml(mut self, xml: impl Into<String>) -> Self {
        self.xml = Some(xml.into());
        self
    }

    /// Set the date stamp.
    pub fn with_date_stamp(mut self, date_stamp: DateTime<Utc>) -> Self {
        self.date_stamp = Some(date_stamp);
        self
    }

    /// Check the fields the storage engine depends on.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.columns == 0 {
            return Err(BagError::invalid_argument(format!(
                "metadata grid must be non-empty, got {}x{}",
                self.rows, self.columns
            )));
        }
        let resolutions = [self.row_resolution, self.column_resolution];
        if resolutions.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(BagError::invalid_argument(format!(
                "metadata resolution must be positive, got ({}, {})",
                self.row_resolution, self.column_resolution
            )));
        }
        let corners = [self.ll_corner_x, self.ll_corner_y, self.ur_corner_x, self.ur_corner_y];
        if corners.iter().any(|c| !c.is_finite()) {
            return Err(BagError::invalid_argument(format!(
                "metadata corners must be finite, got ({}, {}) to ({}, {})",
                self.ll_corner_x, self.ll_corner_y, self.ur_corner_x, self.ur_corner_y
            )));
        }
        Ok(())
    }

    /// Serialize to the JSON stored in the container.
    pub(crate) fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Deserialize from the JSON stored in the container.
    pub(crate) fn from_json(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| BagError::format(format!("invalid metadata: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_derives_upper_right() {
        let metadata = Metadata::new(30, 40, 10.0, 5.0, (100.0, 200.0));
        assert_eq!(metadata.ur_corner_x, 100.0 + 39.0 * 5.0);
        assert_eq!(metadata.ur_corner_y, 200.0 + 29.0 * 10.0);
    }

    #[test]
    fn test_validate() {
        assert!(Metadata::new(10, 10, 1.0, 1.0, (0.0, 0.0)).validate().is_ok());
        assert!(Metadata::new(0, 10, 1.0, 1.0, (0.0, 0.0)).validate().is_err());
        assert!(Metadata::new(10, 10, 0.0, 1.0, (0.0, 0.0)).validate().is_err());
        assert!(Metadata::new(10, 10, 1.0, f64::NAN, (0.0, 0.0)).validate().is_err());
        assert!(Metadata::new(10, 10, f64::INFINITY, 1.0, (0.0, 0.0)).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_corners() {
        let err = Metadata::new(10, 10, 1.0, 1.0, (f64::NAN, 0.0)).validate().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);

        let mut metadata = Metadata::new(10, 10, 1.0, 1.0, (0.0, 0.0));
        metadata.ur_corner_y = f64::NEG_INFINITY;
        assert!(metadata.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_xml() {
        let metadata = Metadata::new(4, 5, 2.0, 2.0, (1.0, 1.0))
            .with_reference_systems("PROJCS[\"UTM 19N\"]", "VERT_CS[\"MLLW\"]")
            .with_xml("<gmi:MI_Metadata/>");
        let json = metadata.to_json().unwrap();
        let parsed = Metadata::from_json(&json).unwrap();
        assert_eq!(parsed, metadata);
    }
}
