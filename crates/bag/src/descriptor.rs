//! Dataset-level descriptor: grid geometry, version and the layer catalog.

use serde::{Deserialize, Serialize};

use crate::error::{BagError, Result};
use crate::metadata::Metadata;
use crate::types::LayerType;

/// One entry in the dataset's layer catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerEntry {
    pub id: u32,
    pub layer_type: LayerType,
    pub name: String,
    pub internal_path: String,
}

/// Overall description of a dataset.
///
/// Dimensions, origin and spacing are fixed at creation and shared by every
/// fixed-resolution layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    dims: (u32, u32),
    origin: (f64, f64),
    grid_spacing: (f64, f64),
    projected_cover: (f64, f64, f64, f64),
    horizontal_reference_system: String,
    vertical_reference_system: String,
    version: String,
    read_only: bool,
    layers: Vec<LayerEntry>,
}

impl Descriptor {
    /// Derive the descriptor from dataset metadata.
    pub fn from_metadata(metadata: &Metadata, version: impl Into<String>, read_only: bool) -> Self {
        Self {
            dims: (metadata.rows, metadata.columns),
            origin: (metadata.ll_corner_x, metadata.ll_corner_y),
            grid_spacing: (metadata.column_resolution, metadata.row_resolution),
            projected_cover: (
                metadata.ll_corner_x,
                metadata.ll_corner_y,
                metadata.ur_corner_x,
                metadata.ur_corner_y,
            ),
            horizontal_reference_system: metadata.horizontal_reference_system.clone(),
            vertical_reference_system: metadata.vertical_reference_system.clone(),
            version: version.into(),
            read_only,
            layers: Vec::new(),
        }
    }

    /// Grid dimensions as (rows, columns).
    pub fn dims(&self) -> (u32, u32) {
        self.dims
    }

    /// Lower-left node position (x, y).
    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    /// Node spacing (x, y).
    pub fn grid_spacing(&self) -> (f64, f64) {
        self.grid_spacing
    }

    /// Projected coverage as (ll_x, ll_y, ur_x, ur_y).
    pub fn projected_cover(&self) -> (f64, f64, f64, f64) {
        self.projected_cover
    }

    pub fn horizontal_reference_system(&self) -> &str {
        &self.horizontal_reference_system
    }

    pub fn vertical_reference_system(&self) -> &str {
        &self.vertical_reference_system
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Every catalog entry, in id order.
    pub fn layer_entries(&self) -> &[LayerEntry] {
        &self.layers
    }

    /// Ids of every cataloged layer.
    pub fn layer_ids(&self) -> Vec<u32> {
        self.layers.iter().map(|entry| entry.id).collect()
    }

    /// Distinct layer types present, in first-seen order.
    ///
    /// Georeferenced metadata layers share one type and are listed once.
    pub fn layer_types(&self) -> Vec<LayerType> {
        let mut types = Vec::with_capacity(self.layers.len());
        for entry in &self.layers {
            if !types.contains(&entry.layer_type) {
                types.push(entry.layer_type);
            }
        }
        types
    }

    /// The id the next cataloged layer will receive.
    pub(crate) fn next_layer_id(&self) -> u32 {
        self.layers.len() as u32
    }

    /// Add a layer to the catalog. Internal paths must be unique.
    pub(crate) fn add_layer(&mut self, entry: LayerEntry) -> Result<()> {
        if self
            .layers
            .iter()
            .any(|existing| existing.internal_path == entry.internal_path)
        {
            return Err(BagError::already_exists(format!(
                "layer at {}",
                entry.internal_path
            )));
        }
        self.layers.push(entry);
        Ok(())
    }

    /// Geographic position of the node at (`row`, `column`).
    pub fn grid_to_geo(&self, row: u32, column: u32) -> (f64, f64) {
        let x = self.origin.0 + f64::from(column) * self.grid_spacing.0;
        let y = self.origin.1 + f64::from(row) * self.grid_spacing.1;
        (x, y)
    }

    /// Nearest node (row, column) to a geographic position, or `None` when
    /// the position falls outside the grid.
    pub fn geo_to_grid(&self, x: f64, y: f64) -> Option<(u32, u32)> {
        let column = ((x - self.origin.0) / self.grid_spacing.0).round();
        let row = ((y - self.origin.1) / self.grid_spacing.1).round();

        if !(column >= 0.0 && row >= 0.0) {
            return None;
        }
        if row >= f64::from(self.dims.0) || column >= f64::from(self.dims.1) {
            return None;
        }

        Some((row as u32, column as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Descriptor {
        let metadata = Metadata::new(100, 100, 10.0, 10.0, (687910.0, 5554620.0));
        Descriptor::from_metadata(&metadata, "2.0.1", false)
    }

    #[test]
    fn test_from_metadata() {
        let descriptor = sample();
        assert_eq!(descriptor.dims(), (100, 100));
        assert_eq!(descriptor.origin(), (687910.0, 5554620.0));
        assert_eq!(descriptor.grid_spacing(), (10.0, 10.0));
        assert_eq!(descriptor.projected_cover().2, 687910.0 + 990.0);
        assert!(!descriptor.is_read_only());
    }

    #[test]
    fn test_grid_to_geo_origin() {
        let descriptor = sample();
        assert_eq!(descriptor.grid_to_geo(0, 0), (687910.0, 5554620.0));
        assert_eq!(descriptor.geo_to_grid(687910.0, 5554620.0), Some((0, 0)));
    }

    #[test]
    fn test_grid_geo_inverse() {
        let descriptor = sample();
        for row in [0, 1, 17, 50, 99] {
            for column in [0, 3, 42, 99] {
                let (x, y) = descriptor.grid_to_geo(row, column);
                assert_eq!(descriptor.geo_to_grid(x, y), Some((row, column)));
            }
        }
    }

    #[test]
    fn test_column_drives_x() {
        let metadata = Metadata::new(10, 20, 2.0, 5.0, (0.0, 0.0));
        let descriptor = Descriptor::from_metadata(&metadata, "2.0.1", false);
        assert_eq!(descriptor.grid_to_geo(1, 3), (15.0, 2.0));
    }

    #[test]
    fn test_geo_to_grid_outside() {
        let descriptor = sample();
        assert_eq!(descriptor.geo_to_grid(0.0, 0.0), None);
        assert_eq!(descriptor.geo_to_grid(687910.0 + 1000.0, 5554620.0), None);
    }

    #[test]
    fn test_catalog_rejects_duplicate_paths() {
        let mut descriptor = sample();
        let entry = LayerEntry {
            id: 0,
            layer_type: LayerType::Elevation,
            name: "Elevation".to_string(),
            internal_path: "/BAG_root/elevation".to_string(),
        };
        descriptor.add_layer(entry.clone()).unwrap();
        assert!(descriptor.add_layer(entry).is_err());
        assert_eq!(descriptor.layer_ids(), vec![0]);
    }

    #[test]
    fn test_layer_types_are_distinct() {
        let mut descriptor = sample();
        for (id, name) in ["a", "b"].iter().enumerate() {
            descriptor
                .add_layer(LayerEntry {
                    id: id as u32,
                    layer_type: LayerType::GeorefMetadata,
                    name: name.to_string(),
                    internal_path: format!("/BAG_root/georef_metadata/{name}"),
                })
                .unwrap();
        }
        assert_eq!(descriptor.layer_types(), vec![LayerType::GeorefMetadata]);
        assert_eq!(descriptor.next_layer_id(), 2);
    }
}
