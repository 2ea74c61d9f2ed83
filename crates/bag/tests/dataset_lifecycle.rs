//! Integration test: dataset creation, reopening and read-only enforcement.

use bag::{
    create_record_noaa_nbs_2022_06, BagConfig, DataType, Dataset, ErrorKind, GeorefMetadataProfile, GroupType,
    ItemBuffer, LayerType, Metadata, OpenMode, SurfaceTopography, TrackingItem, VerticalDatumCorrectionsGridded,
    VrMetadataItem, VrNodeItem, VrRefinementsItem, BAG_VERSION,
};
use test_utils::fixtures::{crs, grid, survey};
use test_utils::{assert_slice_approx_eq, create_depth_grid, temp_dataset_path};

fn sample_metadata() -> Metadata {
    let survey = grid::SMALL_UTM;
    Metadata::new(
        survey.rows,
        survey.columns,
        survey.row_resolution,
        survey.column_resolution,
        survey.origin,
    )
    .with_reference_systems(crs::NAD83_UTM_19N, crs::MLLW)
}

#[test]
fn test_create_then_reopen_round_trip() {
    let (_dir, path) = temp_dataset_path("roundtrip");
    let depths = create_depth_grid(10, 10);

    let mut dataset = Dataset::create(&path, sample_metadata(), 5, 3).unwrap();
    dataset
        .simple_layer_mut(LayerType::Elevation)
        .unwrap()
        .unwrap()
        .write(0, 0, 9, 9, &ItemBuffer::from(depths.clone()))
        .unwrap();
    dataset.close().unwrap();

    let dataset = Dataset::open(&path, OpenMode::ReadOnly).unwrap();
    assert_eq!(dataset.descriptor().version(), BAG_VERSION);
    assert_eq!(dataset.descriptor().dims(), (10, 10));
    assert_eq!(dataset.descriptor().horizontal_reference_system(), crs::NAD83_UTM_19N);
    assert_eq!(dataset.metadata(), &sample_metadata());
    assert_eq!(dataset.layers().len(), 2);

    let elevation = dataset.simple_layer(LayerType::Elevation).unwrap().unwrap();
    let read = elevation.read(0, 0, 9, 9).unwrap();
    assert_slice_approx_eq!(read.as_f32().unwrap(), &depths[..], 1e-5);
    assert_eq!(elevation.descriptor().min_max(), (-90.9, 0.0));
}

#[test]
fn test_open_missing_path_is_not_found() {
    let (_dir, path) = temp_dataset_path("missing");
    let err = Dataset::open(&path, OpenMode::ReadOnly).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_open_plain_directory_is_format_error() {
    let (_dir, path) = temp_dataset_path("plain");
    std::fs::create_dir_all(&path).unwrap();
    let err = Dataset::open(&path, OpenMode::ReadWrite).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FormatError);
}

#[test]
fn test_create_rejects_non_finite_corners() {
    let (_dir, path) = temp_dataset_path("nonfinite");
    let mut metadata = sample_metadata();
    metadata.ur_corner_x = f64::INFINITY;
    let err = Dataset::create(&path, metadata, 5, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(!path.exists());
}

#[test]
fn test_layer_catalog_grows_by_one() {
    let (_dir, path) = temp_dataset_path("catalog");
    let mut dataset = Dataset::create(&path, sample_metadata(), 5, 0).unwrap();
    assert_eq!(dataset.layer_types().len(), 2);

    dataset.create_simple_layer(LayerType::StdDev, 5, 0).unwrap();
    assert_eq!(dataset.layer_types().len(), 3);

    dataset.create_simple_layer(LayerType::NumSoundings, 5, 0).unwrap();
    assert_eq!(dataset.layer_types().len(), 4);
    assert_eq!(dataset.descriptor().layer_ids(), vec![0, 1, 2, 3]);

    let err = dataset.create_simple_layer(LayerType::StdDev, 5, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(dataset.layer_types().len(), 4);

    let err = dataset
        .create_simple_layer(LayerType::SurfaceCorrection, 5, 0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_reopen_discovers_created_layers() {
    let (_dir, path) = temp_dataset_path("discover");
    let mut dataset = Dataset::create(&path, sample_metadata(), 5, 0).unwrap();
    dataset.create_simple_layer(LayerType::NominalElevation, 5, 0).unwrap();
    dataset
        .create_interleaved_layer(LayerType::NumHypotheses, GroupType::Node, 5, 0)
        .unwrap();
    dataset.close().unwrap();

    let dataset = Dataset::open(&path, OpenMode::ReadWrite).unwrap();
    assert_eq!(
        dataset.layer_types(),
        vec![
            LayerType::Elevation,
            LayerType::Uncertainty,
            LayerType::NominalElevation,
            LayerType::NumHypotheses,
        ]
    );
    let node = dataset.interleaved_layer(LayerType::NumHypotheses).unwrap();
    assert!(!node.is_legacy());
    assert_eq!(node.group(), GroupType::Node);
}

#[test]
fn test_read_only_rejects_every_mutation() {
    let (_dir, path) = temp_dataset_path("readonly");
    Dataset::create(&path, sample_metadata(), 5, 0)
        .unwrap()
        .close()
        .unwrap();

    let mut dataset = Dataset::open(&path, OpenMode::ReadOnly).unwrap();
    assert!(dataset.is_read_only());
    assert!(dataset.descriptor().is_read_only());

    let err = dataset.create_simple_layer(LayerType::StdDev, 5, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadOnlyViolation);
    let err = dataset.create_vr(5, 0, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadOnlyViolation);

    let elevation = dataset.simple_layer_mut(LayerType::Elevation).unwrap().unwrap();
    let err = elevation
        .write(0, 0, 0, 0, &ItemBuffer::from(vec![-1.0f32]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadOnlyViolation);

    let tracking = dataset.tracking_list_mut();
    tracking.push(TrackingItem::default());
    assert_eq!(tracking.write().unwrap_err().kind(), ErrorKind::ReadOnlyViolation);

    let read = dataset
        .simple_layer(LayerType::Elevation)
        .unwrap()
        .unwrap()
        .read(0, 0, 0, 0)
        .unwrap();
    assert_eq!(read.as_f32().unwrap(), &[bag::BAG_NULL_ELEVATION]);
}

#[test]
fn test_read_only_rejects_extension_mutations() {
    let (_dir, path) = temp_dataset_path("readonly_extensions");
    let profile = GeorefMetadataProfile::NoaaNbs2022_06;
    {
        let mut dataset = Dataset::create(&path, sample_metadata(), 5, 0).unwrap();
        dataset
            .create_interleaved_layer(LayerType::NumHypotheses, GroupType::Node, 5, 0)
            .unwrap();
        dataset
            .create_georef_metadata_layer(DataType::UInt8, profile, "Elevation", Vec::new(), 5, 0)
            .unwrap();
        dataset
            .create_surface_corrections(SurfaceTopography::GridExtents, 2, 5, 0)
            .unwrap();
        dataset.create_vr(5, 0, true).unwrap();
        dataset.close().unwrap();
    }

    let mut dataset = Dataset::open(&path, OpenMode::ReadOnly).unwrap();
    let read_only = ErrorKind::ReadOnlyViolation;

    let err = dataset
        .create_interleaved_layer(LayerType::HypothesisStrength, GroupType::Node, 5, 0)
        .unwrap_err();
    assert_eq!(err.kind(), read_only);
    let err = dataset
        .create_georef_metadata_layer(DataType::UInt8, profile, "Uncertainty", Vec::new(), 5, 0)
        .unwrap_err();
    assert_eq!(err.kind(), read_only);
    let err = dataset
        .create_surface_corrections(SurfaceTopography::GridExtents, 2, 5, 0)
        .unwrap_err();
    assert_eq!(err.kind(), read_only);

    let georef = dataset.georef_metadata_layer_mut("Elevation").unwrap();
    let record = create_record_noaa_nbs_2022_06(
        1,
        true,
        true,
        1.0,
        true,
        true,
        0.5,
        0.01,
        0.3,
        0.013,
        survey::LICENSE_NAME,
        survey::LICENSE_URL,
        survey::SURVEY_ID,
        survey::INSTITUTION,
        survey::DATE_START,
        survey::DATE_END,
    );
    let table = georef.value_table_mut();
    assert_eq!(table.add_record(record.clone()).unwrap_err().kind(), read_only);
    assert_eq!(table.add_records(vec![record]).unwrap_err().kind(), read_only);
    assert_eq!(table.set_value(0, "feature_size", 2.0f32).unwrap_err().kind(), read_only);
    assert_eq!(table.len(), 1);
    let keys = ItemBuffer::from(vec![0u8]);
    assert_eq!(georef.write(0, 0, 0, 0, &keys).unwrap_err().kind(), read_only);
    assert_eq!(georef.write_vr(0, 0, &keys).unwrap_err().kind(), read_only);
    assert_eq!(georef.write_attributes().unwrap_err().kind(), read_only);

    let node = dataset.interleaved_layer_mut(LayerType::NumHypotheses).unwrap();
    let err = node.write(0, 0, 0, 0, &ItemBuffer::from(vec![1u32])).unwrap_err();
    assert_eq!(err.kind(), read_only);
    assert_eq!(node.write_attributes().unwrap_err().kind(), read_only);

    let corrections = dataset.surface_corrections_mut().unwrap();
    let gridded = ItemBuffer::GriddedCorrections(vec![VerticalDatumCorrectionsGridded::default()]);
    assert_eq!(corrections.write(0, 0, 0, 0, &gridded).unwrap_err().kind(), read_only);
    assert_eq!(corrections.write_attributes().unwrap_err().kind(), read_only);

    let metadata = dataset.vr_metadata_mut().unwrap();
    let cells = ItemBuffer::VrMetadata(vec![VrMetadataItem::default()]);
    assert_eq!(metadata.write(0, 0, 0, 0, &cells).unwrap_err().kind(), read_only);
    assert_eq!(metadata.write_attributes().unwrap_err().kind(), read_only);

    let refinements = dataset.vr_refinements_mut().unwrap();
    let items = ItemBuffer::VrRefinements(vec![VrRefinementsItem::default()]);
    assert_eq!(refinements.write(0, 0, 0, 0, &items).unwrap_err().kind(), read_only);
    assert_eq!(refinements.write_attributes().unwrap_err().kind(), read_only);
    assert!(refinements.is_empty());

    let nodes = dataset.vr_node_mut().unwrap();
    let items = ItemBuffer::VrNode(vec![VrNodeItem::default()]);
    assert_eq!(nodes.write(0, 0, 0, 0, &items).unwrap_err().kind(), read_only);
    assert_eq!(nodes.write_attributes().unwrap_err().kind(), read_only);

    let vr_tracking = dataset.vr_tracking_list_mut().unwrap();
    assert_eq!(vr_tracking.write().unwrap_err().kind(), read_only);

    let elevation = dataset.simple_layer_mut(LayerType::Elevation).unwrap().unwrap();
    assert_eq!(elevation.write_attributes().unwrap_err().kind(), read_only);
}

#[test]
fn test_tracking_list_persists_only_on_write() {
    let (_dir, path) = temp_dataset_path("tracking");
    let item = TrackingItem {
        row: 4,
        col: 7,
        depth: -12.25,
        uncertainty: 0.3,
        track_code: 1,
        list_series: 2,
    };

    let mut dataset = Dataset::create(&path, sample_metadata(), 5, 0).unwrap();
    dataset.tracking_list_mut().push(item);
    dataset.close().unwrap();
    let dataset = Dataset::open(&path, OpenMode::ReadWrite).unwrap();
    assert!(dataset.tracking_list().is_empty());
    drop(dataset);

    let mut dataset = Dataset::open(&path, OpenMode::ReadWrite).unwrap();
    dataset.tracking_list_mut().push(item);
    dataset.tracking_list_mut().write().unwrap();
    dataset.close().unwrap();

    let dataset = Dataset::open(&path, OpenMode::ReadOnly).unwrap();
    assert_eq!(dataset.tracking_list().items(), &[item]);
}

#[test]
fn test_create_with_config_rejects_invalid_settings() {
    let (_dir, path) = temp_dataset_path("config");
    let config = BagConfig {
        compression_level: 11,
        ..BagConfig::default()
    };
    let err = Dataset::create_with_config(&path, sample_metadata(), config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(!path.exists());
}

#[test]
fn test_drop_flushes_layer_attributes() {
    let (_dir, path) = temp_dataset_path("drop");
    {
        let mut dataset = Dataset::create(&path, sample_metadata(), 5, 0).unwrap();
        let uncertainty = dataset.simple_layer_mut(LayerType::Uncertainty).unwrap().unwrap();
        uncertainty.descriptor_mut().set_min_max(0.1, 2.5);
    }

    let dataset = Dataset::open(&path, OpenMode::ReadOnly).unwrap();
    let uncertainty = dataset.simple_layer(LayerType::Uncertainty).unwrap().unwrap();
    assert_eq!(uncertainty.descriptor().min_max(), (0.1, 2.5));
}
