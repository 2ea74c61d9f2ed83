//! Subcommand implementations.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use tracing::info;

use bag::{
    create_record_noaa_nbs_2022_06, BagConfig, DataType, Dataset, GeorefMetadataProfile, ItemBuffer, LayerType,
    Metadata, OpenMode, BAG_NULL_ELEVATION,
};

/// Rows written per elevation band when filling a new dataset.
const BAND_ROWS: u32 = 256;

/// Grid geometry for `create`.
pub struct GridArgs {
    pub rows: u32,
    pub columns: u32,
    pub resolution: f64,
    pub origin: (f64, f64),
    pub horizontal_crs: String,
    pub vertical_crs: String,
}

/// Depth of the synthetic seafloor: 10 m at the south edge, deepening
/// northwards by 1% of the distance travelled.
fn synthetic_depth(row: u32, resolution: f64) -> f32 {
    -(10.0 + f64::from(row) * resolution * 0.01) as f32
}

pub fn create(path: &Path, grid: &GridArgs, config: BagConfig) -> Result<()> {
    let metadata = Metadata::new(
        grid.rows,
        grid.columns,
        grid.resolution,
        grid.resolution,
        grid.origin,
    )
    .with_reference_systems(grid.horizontal_crs.as_str(), grid.vertical_crs.as_str());

    let mut dataset = Dataset::create_with_config(path, metadata, config)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut row_start = 0;
    while row_start < grid.rows {
        let row_end = (row_start + BAND_ROWS).min(grid.rows) - 1;
        let mut depths = Vec::with_capacity((row_end - row_start + 1) as usize * grid.columns as usize);
        for row in row_start..=row_end {
            let depth = synthetic_depth(row, grid.resolution);
            depths.extend(std::iter::repeat(depth).take(grid.columns as usize));
        }
        let uncertainty: Vec<f32> = depths.iter().map(|d| 0.3 + d.abs() * 0.01).collect();

        let last_column = grid.columns - 1;
        dataset
            .simple_layer_mut(LayerType::Elevation)?
            .ok_or_else(|| anyhow!("new dataset has no elevation layer"))?
            .write(row_start, 0, row_end, last_column, &ItemBuffer::from(depths))?;
        dataset
            .simple_layer_mut(LayerType::Uncertainty)?
            .ok_or_else(|| anyhow!("new dataset has no uncertainty layer"))?
            .write(row_start, 0, row_end, last_column, &ItemBuffer::from(uncertainty))?;

        row_start = row_end + 1;
    }

    dataset.close()?;
    info!(path = %path.display(), rows = grid.rows, columns = grid.columns, "Created dataset");
    Ok(())
}

pub fn info(path: &Path) -> Result<()> {
    let dataset = Dataset::open(path, OpenMode::ReadOnly)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let descriptor = dataset.descriptor();

    let layers: Vec<Value> = dataset
        .layers()
        .iter()
        .map(|layer| {
            let d = layer.descriptor();
            json!({
                "id": d.id(),
                "type": d.layer_type().name(),
                "name": d.name(),
                "path": d.internal_path(),
                "data_type": d.data_type().to_string(),
                "min_max": [d.min_max().0, d.min_max().1],
                "chunk_size": d.chunk_size(),
                "compression_level": d.compression_level(),
            })
        })
        .collect();

    let report = json!({
        "path": path.display().to_string(),
        "version": descriptor.version(),
        "dims": [descriptor.dims().0, descriptor.dims().1],
        "origin": [descriptor.origin().0, descriptor.origin().1],
        "grid_spacing": [descriptor.grid_spacing().0, descriptor.grid_spacing().1],
        "horizontal_reference_system": descriptor.horizontal_reference_system(),
        "vertical_reference_system": descriptor.vertical_reference_system(),
        "layers": layers,
        "tracking_list_length": dataset.tracking_list().len(),
        "variable_resolution": dataset.vr_metadata().is_some(),
        "vr_refinements": dataset.vr_refinements().map(|r| r.len()),
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn read(path: &Path, layer: &str, start: (u32, u32), end: (u32, u32)) -> Result<()> {
    let dataset = Dataset::open(path, OpenMode::ReadOnly)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let buffer = match LayerType::from_name(layer).filter(|t| *t != LayerType::GeorefMetadata) {
        Some(layer_type) => dataset
            .layer(layer_type)?
            .ok_or_else(|| anyhow!("dataset has no {} layer", layer_type))?
            .read(start.0, start.1, end.0, end.1)?,
        None => dataset
            .georef_metadata_layer(layer)
            .ok_or_else(|| anyhow!("dataset has no layer named {}", layer))?
            .read(start.0, start.1, end.0, end.1)?,
    };

    let columns = (end.1 - start.1 + 1) as usize;
    for (i, row) in format_values(&buffer).chunks(columns).enumerate() {
        println!("{:>6}: {}", start.0 as usize + i, row.join(" "));
    }
    Ok(())
}

fn format_values(buffer: &ItemBuffer) -> Vec<String> {
    fn render<T: ToString>(values: &[T]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }
    fn debug<T: std::fmt::Debug>(values: &[T]) -> Vec<String> {
        values.iter().map(|v| format!("{v:?}")).collect()
    }

    match buffer {
        ItemBuffer::Float32(values) => values
            .iter()
            .map(|v| {
                if *v == BAG_NULL_ELEVATION {
                    "null".to_string()
                } else {
                    format!("{v:.3}")
                }
            })
            .collect(),
        ItemBuffer::Float64(values) => render(values),
        ItemBuffer::UInt8(values) => render(values),
        ItemBuffer::UInt16(values) => render(values),
        ItemBuffer::UInt32(values) => render(values),
        ItemBuffer::UInt64(values) => render(values),
        ItemBuffer::VrMetadata(values) => debug(values),
        ItemBuffer::VrRefinements(values) => debug(values),
        ItemBuffer::VrNode(values) => debug(values),
        ItemBuffer::SurfaceCorrections(values) => debug(values),
        ItemBuffer::GriddedCorrections(values) => debug(values),
    }
}

pub fn vr_create(path: &Path, chunk_size: u64, compression_level: u8, with_node: bool) -> Result<()> {
    let mut dataset = Dataset::open(path, OpenMode::ReadWrite)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    dataset.create_vr(chunk_size, compression_level, with_node)?;
    dataset.close()?;
    info!(path = %path.display(), with_node, "Added variable resolution extension");
    Ok(())
}

/// Split the grid into a west half of trusted full coverage and an east
/// half of partial coverage, one record each.
pub fn georef_sample(path: &Path, survey_id: &str, institution: &str, config: BagConfig) -> Result<()> {
    let mut dataset = Dataset::open_with_config(path, OpenMode::ReadWrite, config)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let (rows, columns) = dataset.descriptor().dims();

    let layer = dataset.create_georef_metadata_layer(
        DataType::UInt8,
        GeorefMetadataProfile::NoaaNbs2022_06,
        LayerType::Elevation.name(),
        Vec::new(),
        config.chunk_size,
        config.compression_level,
    )?;

    let record = |assessment: u32, coverage: bool| {
        create_record_noaa_nbs_2022_06(
            assessment,
            true,
            true,
            1.0,
            coverage,
            coverage,
            1.0,
            0.01,
            0.5,
            0.013,
            "CC0-1.0",
            "https://creativecommons.org/publicdomain/zero/1.0/",
            survey_id,
            institution,
            "",
            "",
        )
    };
    let full = layer.value_table_mut().add_record(record(1, true))?;
    let partial = layer.value_table_mut().add_record(record(2, false))?;

    let split = columns / 2;
    let keys: Vec<u8> = (0..rows)
        .flat_map(|_| (0..columns).map(|column| if column < split { full } else { partial }))
        .map(|key| key as u8)
        .collect();
    layer.write(0, 0, rows - 1, columns - 1, &ItemBuffer::from(keys))?;

    dataset.close()?;
    info!(path = %path.display(), records = 2, "Added georeferenced metadata layer");
    Ok(())
}
