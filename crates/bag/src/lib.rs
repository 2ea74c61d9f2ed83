//! Bathymetric Attributed Grid (BAG) Storage Engine
//!
//! This crate reads and writes gridded bathymetry datasets stored as Zarr V3
//! directory stores. It provides:
//!
//! - **Fixed-resolution layers**: elevation, uncertainty and the other
//!   per-node surfaces, addressed by inclusive row/column bounding boxes
//! - **Georeferenced metadata**: rasters of keys into per-layer tables of
//!   attribute records
//! - **Surface corrections**: vertical datum correctors applied to a layer
//!   on read
//! - **Variable resolution**: refined sub-grids addressed by a flat index
//! - **Tracking lists**: audit trails of manually edited soundings
//!
//! # Architecture
//!
//! ```text
//! Dataset::create / Dataset::open
//!      │
//!      ├─► Container (directory store, read-only guard)
//!      │
//!      ├─► Descriptor (grid geometry, version, layer catalog)
//!      │
//!      ├─► Layers
//!      │     ├─► Simple / Interleaved ──► 2-D arrays
//!      │     ├─► GeorefMetadata ─────────► keys array + ValueTable
//!      │     ├─► SurfaceCorrections ─────► z (+ x, y) arrays
//!      │     └─► VR metadata / refinements / nodes ──► column groups
//!      │
//!      └─► TrackingList / VrTrackingList ──► column groups
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bag::{Dataset, ItemBuffer, LayerType, Metadata};
//!
//! let metadata = Metadata::new(100, 100, 10.0, 10.0, (687910.0, 5554620.0));
//! let mut dataset = Dataset::create("survey.bag", metadata, 100, 5)?;
//!
//! let elevation = dataset.simple_layer_mut(LayerType::Elevation)?.unwrap();
//! elevation.write(0, 0, 0, 2, &ItemBuffer::from(vec![-10.0f32, -11.0, -12.5]))?;
//!
//! dataset.close()?;
//! ```

pub mod compound;
pub mod config;
pub mod dataset;
pub mod descriptor;
pub mod error;
pub mod items;
pub mod layer;
pub mod metadata;
pub mod profiles;
mod storage;
pub mod tracking_list;
pub mod types;
pub mod value_table;

// Re-export commonly used types at crate root
pub use compound::{CompoundDataType, FieldDefinition, Record, RecordDefinition};
pub use config::BagConfig;
pub use dataset::Dataset;
pub use descriptor::{Descriptor, LayerEntry};
pub use error::{BagError, ErrorKind, Result};
pub use items::{
    ItemBuffer, TrackingItem, VerticalDatumCorrections, VerticalDatumCorrectionsGridded, VrMetadataItem,
    VrNodeItem, VrRefinementsItem, VrTrackingItem,
};
pub use layer::{
    CompoundLayer, GeorefMetadataLayer, InterleavedLayer, Layer, LayerDescriptor, SimpleLayer,
    SurfaceCorrections, SurfaceCorrectionsDescriptor, SurfaceTopography, VrMetadata,
    VrMetadataDescriptor, VrNode, VrNodeDescriptor, VrRefinements, VrRefinementsDescriptor,
};
pub use metadata::Metadata;
pub use profiles::{create_record_noaa_nbs_2022_06, create_record_noaa_ocs_2022_10, GeorefMetadataProfile};
pub use tracking_list::{TrackingList, TrackingRecord, VrTrackingList};
pub use types::{
    DataType, GroupType, LayerType, OpenMode, BAG_NULL_ELEVATION, BAG_NULL_GENERIC, BAG_NULL_UNCERTAINTY,
    BAG_VERSION, COMPOUND,
};
pub use value_table::{Field, ValueTable};
