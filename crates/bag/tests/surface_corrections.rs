//! Integration test: surface corrections and corrected reads.

use bag::{
    Dataset, ErrorKind, ItemBuffer, LayerType, Metadata, OpenMode, SurfaceTopography, VerticalDatumCorrections,
    VerticalDatumCorrectionsGridded, BAG_NULL_ELEVATION,
};
use test_utils::{assert_slice_approx_eq, create_constant_grid, temp_dataset_path};

const BASE_ELEVATION: f32 = -10.0;

/// A 4x4 grid at 10 m spacing from the origin, flat at `BASE_ELEVATION`.
fn flat_dataset(path: &std::path::Path) -> Dataset {
    let metadata = Metadata::new(4, 4, 10.0, 10.0, (0.0, 0.0));
    let mut dataset = Dataset::create(path, metadata, 4, 0).unwrap();
    dataset
        .simple_layer_mut(LayerType::Elevation)
        .unwrap()
        .unwrap()
        .write(0, 0, 3, 3, &ItemBuffer::from(create_constant_grid(4, 4, BASE_ELEVATION)))
        .unwrap();
    dataset
}

fn gridded(values: &[f32]) -> VerticalDatumCorrectionsGridded {
    let mut item = VerticalDatumCorrectionsGridded::default();
    item.z[..values.len()].copy_from_slice(values);
    item
}

fn positioned(x: f64, y: f64, z: f32) -> VerticalDatumCorrections {
    let mut item = VerticalDatumCorrections {
        x,
        y,
        ..Default::default()
    };
    item.z[0] = z;
    item
}

/// Two correctors per node: the node's flat index, and a constant 1.
fn write_grid_correctors(dataset: &mut Dataset) {
    let items: Vec<_> = (0..16).map(|i| gridded(&[i as f32, 1.0])).collect();
    dataset
        .create_surface_corrections(SurfaceTopography::GridExtents, 2, 4, 0)
        .unwrap()
        .write(0, 0, 3, 3, &ItemBuffer::GriddedCorrections(items))
        .unwrap();
}

fn corrected(dataset: &Dataset, rows: (u32, u32), cols: (u32, u32), corrector: u8) -> Vec<f32> {
    let elevation = dataset.simple_layer(LayerType::Elevation).unwrap().unwrap();
    dataset
        .surface_corrections()
        .unwrap()
        .read_corrected(rows.0, rows.1, cols.0, cols.1, corrector, elevation)
        .unwrap()
        .into_f32()
        .unwrap()
}

#[test]
fn test_grid_correctors_at_matching_nodes() {
    let (_dir, path) = temp_dataset_path("grid");
    let mut dataset = flat_dataset(&path);
    write_grid_correctors(&mut dataset);

    let values = corrected(&dataset, (1, 1), (0, 3), 0);
    assert_slice_approx_eq!(values, [-6.0, -5.0, -4.0, -3.0], 1e-5);

    let values = corrected(&dataset, (0, 3), (0, 3), 1);
    assert_slice_approx_eq!(values, vec![-9.0; 16], 1e-5);
}

#[test]
fn test_coarser_corrector_grid_blends_neighbours() {
    let (_dir, path) = temp_dataset_path("coarse");
    let mut dataset = flat_dataset(&path);
    write_grid_correctors(&mut dataset);
    dataset
        .surface_corrections_mut()
        .unwrap()
        .surface_descriptor_mut()
        .set_spacing(20.0, 20.0);

    // (0, 1) sits halfway between corrector nodes (0, 0) and (0, 1).
    let values = corrected(&dataset, (0, 0), (0, 1), 0);
    assert_slice_approx_eq!(values, [-10.0, -9.5], 1e-5);
}

#[test]
fn test_irregular_correctors_weighted_by_distance() {
    let (_dir, path) = temp_dataset_path("irregular");
    let mut dataset = flat_dataset(&path);
    let items = vec![positioned(0.0, 0.0, 2.0), positioned(20.0, 0.0, 4.0)];
    dataset
        .create_surface_corrections(SurfaceTopography::IrregularlySpaced, 1, 4, 0)
        .unwrap()
        .write(0, 0, 0, 1, &ItemBuffer::SurfaceCorrections(items.clone()))
        .unwrap();

    let values = corrected(&dataset, (0, 0), (0, 2), 0);
    assert_slice_approx_eq!(values, [-8.0, -7.0, -6.0], 1e-5);

    let stored = dataset.surface_corrections().unwrap().read(0, 0, 0, 1).unwrap();
    assert_eq!(stored, ItemBuffer::SurfaceCorrections(items));
}

#[test]
fn test_null_base_cells_stay_null() {
    let (_dir, path) = temp_dataset_path("nulls");
    let mut dataset = flat_dataset(&path);
    dataset
        .simple_layer_mut(LayerType::Elevation)
        .unwrap()
        .unwrap()
        .write(2, 2, 2, 2, &ItemBuffer::from(vec![BAG_NULL_ELEVATION]))
        .unwrap();
    write_grid_correctors(&mut dataset);

    let values = corrected(&dataset, (2, 2), (1, 3), 1);
    assert_eq!(values[1], BAG_NULL_ELEVATION);
    assert_slice_approx_eq!([values[0], values[2]], [-9.0, -9.0], 1e-5);
}

#[test]
fn test_corrected_read_errors() {
    let (_dir, path) = temp_dataset_path("errors");
    let mut dataset = flat_dataset(&path);
    write_grid_correctors(&mut dataset);

    let elevation = dataset.simple_layer(LayerType::Elevation).unwrap().unwrap();
    let corrections = dataset.surface_corrections().unwrap();
    let err = corrections.read_corrected(0, 0, 0, 0, 2, elevation).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfRange);

    let corrections = dataset.surface_corrections_mut().unwrap();
    let err = corrections
        .write(0, 0, 0, 0, &ItemBuffer::SurfaceCorrections(vec![positioned(0.0, 0.0, 1.0)]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let err = corrections
        .write(0, 0, 0, 1, &ItemBuffer::GriddedCorrections(vec![gridded(&[1.0, 1.0])]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeMismatch);
}

#[test]
fn test_creation_preconditions() {
    let (_dir, path) = temp_dataset_path("preconditions");
    let mut dataset = flat_dataset(&path);

    for (topography, count) in [
        (SurfaceTopography::GridExtents, 0),
        (SurfaceTopography::GridExtents, 11),
        (SurfaceTopography::Unknown, 2),
    ] {
        let err = dataset
            .create_surface_corrections(topography, count, 4, 0)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    assert!(dataset.surface_corrections().is_none());

    dataset
        .create_surface_corrections(SurfaceTopography::GridExtents, 10, 4, 0)
        .unwrap();
    let err = dataset
        .create_surface_corrections(SurfaceTopography::GridExtents, 1, 4, 0)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn test_surface_descriptor_survives_reopen() {
    let (_dir, path) = temp_dataset_path("reopen");
    {
        let mut dataset = flat_dataset(&path);
        write_grid_correctors(&mut dataset);
        let corrections = dataset.surface_corrections_mut().unwrap();
        corrections
            .surface_descriptor_mut()
            .set_vertical_datums("MLLW,NAVD88");
        corrections.write_attributes().unwrap();
        dataset.close().unwrap();
    }

    let dataset = Dataset::open(&path, OpenMode::ReadOnly).unwrap();
    let surface = dataset.surface_corrections().unwrap().surface_descriptor();
    assert_eq!(surface.topography(), SurfaceTopography::GridExtents);
    assert_eq!(surface.num_correctors(), 2);
    assert_eq!(surface.vertical_datums(), "MLLW,NAVD88");
    assert_eq!(surface.spacing(), (10.0, 10.0));

    let values = corrected(&dataset, (3, 3), (3, 3), 0);
    assert_slice_approx_eq!(values, [5.0], 1e-5);
}
