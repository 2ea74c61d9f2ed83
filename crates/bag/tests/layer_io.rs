//! Integration test: bounded-region reads and writes across layer kinds.

use bag::{Dataset, ErrorKind, GroupType, ItemBuffer, Layer, LayerType, Metadata, OpenMode};
use test_utils::fixtures::grid;
use test_utils::{
    assert_approx_eq, assert_slice_approx_eq, create_depth_grid, create_uncertainty_grid, temp_dataset_path,
    with_null_cells,
};

fn rect_dataset(path: &std::path::Path) -> Dataset {
    let survey = grid::RECT_ANISOTROPIC;
    let metadata = Metadata::new(
        survey.rows,
        survey.columns,
        survey.row_resolution,
        survey.column_resolution,
        survey.origin,
    );
    Dataset::create(path, metadata, 8, 4).unwrap()
}

#[test]
fn test_partial_region_round_trip_across_chunks() {
    let (_dir, path) = temp_dataset_path("partial");
    let mut dataset = rect_dataset(&path);

    // rows 5..=14, cols 6..=17 straddle several 8x8 chunks
    let values = create_uncertainty_grid(10, 12);
    let uncertainty = dataset.simple_layer_mut(LayerType::Uncertainty).unwrap().unwrap();
    uncertainty
        .write(5, 6, 14, 17, &ItemBuffer::from(values.clone()))
        .unwrap();

    let read = uncertainty.read(5, 6, 14, 17).unwrap();
    assert_eq!(read.len(), 120);
    assert_slice_approx_eq!(read.as_f32().unwrap(), &values[..], 1e-5);

    let corner = uncertainty.read(5, 6, 5, 6).unwrap();
    assert_approx_eq!(corner.as_f32().unwrap()[0], values[0], 1e-6);
}

#[test]
fn test_out_of_range_and_size_mismatch() {
    let (_dir, path) = temp_dataset_path("bounds");
    let mut dataset = rect_dataset(&path);
    let elevation = dataset.simple_layer_mut(LayerType::Elevation).unwrap().unwrap();

    assert_eq!(elevation.read(0, 0, 30, 0).unwrap_err().kind(), ErrorKind::OutOfRange);
    assert_eq!(elevation.read(0, 0, 0, 20).unwrap_err().kind(), ErrorKind::OutOfRange);
    assert_eq!(elevation.read(3, 0, 2, 0).unwrap_err().kind(), ErrorKind::OutOfRange);

    let err = elevation
        .write(0, 0, 1, 1, &ItemBuffer::from(vec![-1.0f32; 3]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeMismatch);

    let err = elevation
        .write(0, 0, 0, 1, &ItemBuffer::from(vec![1u32, 2]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_statistics_ignore_null_values() {
    let (_dir, path) = temp_dataset_path("stats");
    let mut dataset = rect_dataset(&path);
    let null = LayerType::Elevation.null_value();
    let values = with_null_cells(create_depth_grid(2, 20), 3, null);

    let elevation = dataset.simple_layer_mut(LayerType::Elevation).unwrap().unwrap();
    elevation.write(0, 0, 1, 19, &ItemBuffer::from(values)).unwrap();

    let (min, max) = elevation.descriptor().min_max();
    assert_approx_eq!(min, -11.8, 1e-5);
    assert_approx_eq!(max, -0.1, 1e-5);
}

#[test]
fn test_uint_layer_round_trip() {
    let (_dir, path) = temp_dataset_path("uint");
    let mut dataset = rect_dataset(&path);
    let soundings = dataset.create_simple_layer(LayerType::NumSoundings, 8, 4).unwrap();

    let counts: Vec<u32> = (0..20).collect();
    soundings.write(29, 0, 29, 19, &ItemBuffer::from(counts.clone())).unwrap();
    assert_eq!(soundings.read(29, 0, 29, 19).unwrap().as_u32().unwrap(), &counts[..]);
    assert_eq!(soundings.read(0, 0, 0, 0).unwrap().as_u32().unwrap(), &[0]);
    assert_eq!(soundings.descriptor().min_max(), (0.0, 19.0));
}

#[test]
fn test_interleaved_membership_is_validated() {
    let (_dir, path) = temp_dataset_path("interleaved");
    let mut dataset = rect_dataset(&path);

    let err = dataset
        .create_interleaved_layer(LayerType::StdDev, GroupType::Node, 8, 0)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let std_dev = dataset
        .create_interleaved_layer(LayerType::StdDev, GroupType::Elevation, 8, 0)
        .unwrap();
    std_dev.write(0, 0, 0, 1, &ItemBuffer::from(vec![0.25f32, 0.5])).unwrap();
    assert_eq!(std_dev.descriptor().internal_path(), "/BAG_root/elevation_solution/stddev");

    let err = dataset.create_simple_layer(LayerType::StdDev, 8, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn test_layer_enum_dispatch() {
    let (_dir, path) = temp_dataset_path("dispatch");
    let mut dataset = rect_dataset(&path);

    let layer = dataset.layer_mut(LayerType::Elevation).unwrap().unwrap();
    assert!(matches!(layer, Layer::Simple(_)));
    layer.write(1, 1, 1, 2, &ItemBuffer::from(vec![-3.0f32, -4.0])).unwrap();
    let id = layer.id();

    let layer = dataset.layer_by_id(id).unwrap();
    assert_eq!(layer.layer_type(), LayerType::Elevation);
    assert_eq!(layer.name(), "Elevation");
    assert_eq!(layer.read(1, 1, 1, 2).unwrap().as_f32().unwrap(), &[-3.0, -4.0]);
    assert_eq!(layer.descriptor().read_buffer_size(1, 2), 8);
}

#[test]
fn test_layer_settings_survive_reopen() {
    let (_dir, path) = temp_dataset_path("settings");
    rect_dataset(&path).close().unwrap();

    let dataset = Dataset::open(&path, OpenMode::ReadOnly).unwrap();
    let elevation = dataset.simple_layer(LayerType::Elevation).unwrap().unwrap();
    assert_eq!(elevation.descriptor().chunk_size(), 8);
    assert_eq!(elevation.descriptor().compression_level(), 4);
    assert_eq!(elevation.dims(), (30, 20));
}
