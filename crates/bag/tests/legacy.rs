//! Integration test: datasets written by older versions of the format.

use std::fs;
use std::path::Path;

use bag::{
    Dataset, DataType, ErrorKind, GeorefMetadataProfile, GroupType, ItemBuffer, LayerType, Metadata, OpenMode,
};
use test_utils::fixtures::grid;
use test_utils::temp_dataset_path;

/// A current dataset with one interleaved layer and one georeferenced
/// metadata layer.
fn write_dataset(path: &Path) {
    let spec = grid::SMALL_UTM;
    let metadata = Metadata::new(
        spec.rows,
        spec.columns,
        spec.row_resolution,
        spec.column_resolution,
        spec.origin,
    );
    let mut dataset = Dataset::create(path, metadata, 5, 0).unwrap();
    dataset
        .create_interleaved_layer(LayerType::StdDev, GroupType::Elevation, 5, 0)
        .unwrap()
        .write(0, 0, 0, 1, &ItemBuffer::from(vec![0.5f32, 0.75]))
        .unwrap();
    dataset
        .create_georef_metadata_layer(
            DataType::UInt8,
            GeorefMetadataProfile::NoaaOcs2022_10,
            "Elevation",
            Vec::new(),
            5,
            0,
        )
        .unwrap();
    dataset.close().unwrap();
}

/// Rewrite the version attribute stored on the root group.
fn set_version(path: &Path, version: &str) {
    let root = path.join("BAG_root").join("zarr.json");
    let mut document: serde_json::Value = serde_json::from_str(&fs::read_to_string(&root).unwrap()).unwrap();
    document["attributes"]["Bag Version"] = serde_json::Value::from(version);
    fs::write(&root, serde_json::to_string_pretty(&document).unwrap()).unwrap();
}

#[test]
fn test_old_version_marks_interleaved_layers_legacy() {
    let (_dir, path) = temp_dataset_path("legacy");
    write_dataset(&path);
    set_version(&path, "1.6.2");

    let mut dataset = Dataset::open(&path, OpenMode::ReadWrite).unwrap();
    assert_eq!(dataset.descriptor().version(), "1.6.2");

    let layer = dataset.interleaved_layer_mut(LayerType::StdDev).unwrap();
    assert!(layer.is_legacy());
    assert_eq!(
        layer.read(0, 0, 0, 1).unwrap(),
        ItemBuffer::from(vec![0.5f32, 0.75])
    );
    let err = layer.write(0, 0, 0, 0, &ItemBuffer::from(vec![1.0f32])).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadOnlyViolation);
}

#[test]
fn test_old_version_skips_georef_metadata() {
    let (_dir, path) = temp_dataset_path("no_georef");
    write_dataset(&path);
    set_version(&path, "1.6.2");

    let dataset = Dataset::open(&path, OpenMode::ReadOnly).unwrap();
    assert!(dataset.georef_metadata_layer("Elevation").is_none());
    assert!(!dataset.layer_types().contains(&LayerType::GeorefMetadata));
}

#[test]
fn test_current_version_reads_capitalized_georef_group() {
    let (_dir, path) = temp_dataset_path("capitalized");
    write_dataset(&path);
    fs::rename(
        path.join("BAG_root").join("georef_metadata"),
        path.join("BAG_root").join("Georef_metadata"),
    )
    .unwrap();

    let dataset = Dataset::open(&path, OpenMode::ReadOnly).unwrap();
    let layer = dataset.georef_metadata_layer("Elevation").unwrap();
    assert_eq!(layer.profile(), GeorefMetadataProfile::NoaaOcs2022_10);
    assert!(!dataset.interleaved_layer(LayerType::StdDev).unwrap().is_legacy());
}
