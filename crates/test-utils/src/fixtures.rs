//! Common test fixtures for BAG tests.
//!
//! This module provides pre-defined survey grids and reference system
//! strings that represent common hydrographic survey setups.

/// Common survey grid definitions for testing.
pub mod grid {
    /// Survey grid specification for testing.
    #[derive(Debug, Clone, Copy)]
    pub struct SurveyGrid {
        pub rows: u32,
        pub columns: u32,
        pub row_resolution: f64,
        pub column_resolution: f64,
        /// Lower-left node (x, y).
        pub origin: (f64, f64),
    }

    impl SurveyGrid {
        /// Returns the total number of nodes.
        pub fn size(&self) -> usize {
            self.rows as usize * self.columns as usize
        }

        /// Returns the upper-right node (x, y).
        pub fn upper_right(&self) -> (f64, f64) {
            (
                self.origin.0 + f64::from(self.columns.saturating_sub(1)) * self.column_resolution,
                self.origin.1 + f64::from(self.rows.saturating_sub(1)) * self.row_resolution,
            )
        }
    }

    /// Small UTM survey, 10 m nodes.
    pub const SMALL_UTM: SurveyGrid = SurveyGrid {
        rows: 10,
        columns: 10,
        row_resolution: 10.0,
        column_resolution: 10.0,
        origin: (687_910.0, 5_554_620.0),
    };

    /// Non-square survey with anisotropic spacing.
    pub const RECT_ANISOTROPIC: SurveyGrid = SurveyGrid {
        rows: 30,
        columns: 20,
        row_resolution: 2.0,
        column_resolution: 4.0,
        origin: (300_000.0, 4_000_000.0),
    };

    /// A single node.
    pub const SINGLE_NODE: SurveyGrid = SurveyGrid {
        rows: 1,
        columns: 1,
        row_resolution: 1.0,
        column_resolution: 1.0,
        origin: (0.0, 0.0),
    };
}

/// Reference system strings used in sample metadata.
pub mod crs {
    /// UTM zone 19N on NAD83.
    pub const NAD83_UTM_19N: &str = "PROJCS[\"NAD83 / UTM zone 19N\",GEOGCS[\"NAD83\",DATUM[\"North_American_Datum_1983\"]],PROJECTION[\"Transverse_Mercator\"],PARAMETER[\"central_meridian\",-69]]";

    /// Mean lower low water.
    pub const MLLW: &str = "VERT_CS[\"MLLW\",VERT_DATUM[\"Mean Lower Low Water\",2005]]";
}

/// Common survey identifiers for georeferenced metadata records.
pub mod survey {
    pub const SURVEY_ID: &str = "H13385";
    pub const INSTITUTION: &str = "NOAA";
    pub const DATE_START: &str = "2021-05-01";
    pub const DATE_END: &str = "2021-06-15";
    pub const LICENSE_NAME: &str = "CC0-1.0";
    pub const LICENSE_URL: &str = "https://creativecommons.org/publicdomain/zero/1.0/";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_grid_size() {
        assert_eq!(grid::SMALL_UTM.size(), 100);
        assert_eq!(grid::RECT_ANISOTROPIC.size(), 600);
        assert_eq!(grid::SINGLE_NODE.size(), 1);
    }

    #[test]
    fn test_survey_grid_upper_right() {
        assert_eq!(grid::SMALL_UTM.upper_right(), (688_000.0, 5_554_710.0));
        assert_eq!(grid::SINGLE_NODE.upper_right(), (0.0, 0.0));
    }
}
