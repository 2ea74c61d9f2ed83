//! Vertical datum surface corrections.
//!
//! Correctors are stored as a 3-D `z` array (`rows x columns x correctors`)
//! plus, for irregularly spaced correctors, 2-D `x` and `y` position arrays.
//! Corrected reads blend nearby correctors by inverse squared distance.

use std::mem::size_of;
use std::sync::Arc;

use tracing::debug;

use super::descriptor::{LayerDescriptor, SurfaceCorrectionsDescriptor, SurfaceTopography};
use super::simple::SimpleLayer;
use super::Region;
use crate::error::{BagError, Result};
use crate::items::{ItemBuffer, VerticalDatumCorrections, VerticalDatumCorrectionsGridded};
use crate::storage::{self, grid_chunk_shape, ArraySpec, Attributes, Container, StoreArray};
use crate::types::{DataType, LayerType, BAG_NULL_GENERIC, SURFACE_CORRECTOR_LIMIT};

/// Corrector offsets for one or more vertical datums.
pub struct SurfaceCorrections {
    descriptor: LayerDescriptor,
    surface: SurfaceCorrectionsDescriptor,
    container: Arc<Container>,
    z: StoreArray,
    positions: Option<(StoreArray, StoreArray)>,
    grid_origin: (f64, f64),
    grid_spacing: (f64, f64),
}

fn layer_path() -> Result<&'static str> {
    LayerType::SurfaceCorrection
        .internal_path()
        .ok_or_else(|| BagError::format("surface corrections have no storage path"))
}

fn element_size(topography: SurfaceTopography) -> usize {
    match topography {
        SurfaceTopography::IrregularlySpaced => size_of::<VerticalDatumCorrections>(),
        _ => size_of::<VerticalDatumCorrectionsGridded>(),
    }
}

impl SurfaceCorrections {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        container: Arc<Container>,
        id: u32,
        topography: SurfaceTopography,
        num_correctors: u8,
        dims: (u32, u32),
        grid_origin: (f64, f64),
        grid_spacing: (f64, f64),
        chunk_size: u64,
        compression_level: u8,
    ) -> Result<Self> {
        if topography == SurfaceTopography::Unknown {
            return Err(BagError::invalid_argument("surface topography must be known"));
        }
        if num_correctors == 0 || usize::from(num_correctors) > SURFACE_CORRECTOR_LIMIT {
            return Err(BagError::invalid_argument(format!(
                "{num_correctors} correctors requested, allowed 1-{SURFACE_CORRECTOR_LIMIT}"
            )));
        }

        let path = layer_path()?;
        let descriptor = LayerDescriptor::new(
            id,
            LayerType::SurfaceCorrection,
            LayerType::SurfaceCorrection.name(),
            path,
            DataType::Compound,
            element_size(topography),
            chunk_size,
            compression_level,
        );
        let surface =
            SurfaceCorrectionsDescriptor::new(topography, num_correctors, dims, grid_origin, grid_spacing);

        let mut attrs = descriptor.settings_attributes();
        attrs.extend(surface.to_attributes());
        container.create_group(path, attrs)?;

        let mut chunk_shape = grid_chunk_shape(dims.0, dims.1, chunk_size);
        chunk_shape.push(u64::from(num_correctors));
        let z_spec = ArraySpec {
            shape: vec![u64::from(dims.0), u64::from(dims.1), u64::from(num_correctors)],
            chunk_shape,
            data_type: DataType::Float32,
            fill: f64::from(BAG_NULL_GENERIC),
            compression_level,
            attributes: Attributes::new(),
        };
        let z = container.create_array(&format!("{path}/z"), &z_spec)?;

        let positions = if topography == SurfaceTopography::IrregularlySpaced {
            let spec = ArraySpec::grid(dims.0, dims.1, chunk_size, DataType::Float64, f64::NAN, compression_level);
            Some((
                container.create_array(&format!("{path}/x"), &spec)?,
                container.create_array(&format!("{path}/y"), &spec)?,
            ))
        } else {
            None
        };

        Ok(Self {
            descriptor,
            surface,
            container,
            z,
            positions,
            grid_origin,
            grid_spacing,
        })
    }

    pub(crate) fn open(
        container: Arc<Container>,
        id: u32,
        dims: (u32, u32),
        grid_origin: (f64, f64),
        grid_spacing: (f64, f64),
    ) -> Result<Self> {
        let path = layer_path()?;
        let attrs = container.group_attributes(path)?;
        let surface = SurfaceCorrectionsDescriptor::from_attributes(&attrs, dims, grid_origin, grid_spacing)?;

        let mut descriptor = LayerDescriptor::new(
            id,
            LayerType::SurfaceCorrection,
            LayerType::SurfaceCorrection.name(),
            path,
            DataType::Compound,
            element_size(surface.topography()),
            0,
            0,
        );
        descriptor.load_attributes(&attrs);

        let z = container.open_array(&format!("{path}/z"))?;
        let positions = if surface.topography() == SurfaceTopography::IrregularlySpaced {
            Some((
                container.open_array(&format!("{path}/x"))?,
                container.open_array(&format!("{path}/y"))?,
            ))
        } else {
            None
        };

        Ok(Self {
            descriptor,
            surface,
            container,
            z,
            positions,
            grid_origin,
            grid_spacing,
        })
    }

    pub fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    pub fn surface_descriptor(&self) -> &SurfaceCorrectionsDescriptor {
        &self.surface
    }

    pub fn surface_descriptor_mut(&mut self) -> &mut SurfaceCorrectionsDescriptor {
        &mut self.surface
    }

    fn region(&self, row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<Region> {
        let (rows, columns) = self.surface.dims();
        Region::within(row_start, col_start, row_end, col_end, rows, columns)
    }

    fn num_correctors(&self) -> usize {
        usize::from(self.surface.num_correctors())
    }

    /// Corrector values of `region`, `num_correctors` per node.
    fn read_z(&self, region: &Region, first: usize, count: usize) -> Result<Vec<f32>> {
        let subset = storage::subset(
            vec![u64::from(region.row_start), u64::from(region.col_start), first as u64],
            vec![u64::from(region.rows()), u64::from(region.columns()), count as u64],
        )?;
        storage::read_elements(&self.z, &subset, DataType::Float32)?.into_f32()
    }

    /// Read corrector nodes in the inclusive bounding box.
    pub fn read(&self, row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<ItemBuffer> {
        let region = self.region(row_start, col_start, row_end, col_end)?;
        let n = self.num_correctors();
        let z = self.read_z(&region, 0, n)?;
        let mut correctors = z.chunks(n).map(|values| {
            let mut z = [0.0f32; SURFACE_CORRECTOR_LIMIT];
            z[..n].copy_from_slice(values);
            z
        });

        match &self.positions {
            None => Ok(ItemBuffer::GriddedCorrections(
                correctors
                    .map(|z| VerticalDatumCorrectionsGridded { z })
                    .collect(),
            )),
            Some((x_array, y_array)) => {
                let subset = region.subset()?;
                let x = storage::read_elements(x_array, &subset, DataType::Float64)?.into_f64()?;
                let y = storage::read_elements(y_array, &subset, DataType::Float64)?.into_f64()?;
                let items = x
                    .into_iter()
                    .zip(y)
                    .map(|(x, y)| VerticalDatumCorrections {
                        x,
                        y,
                        z: correctors.next().unwrap_or_default(),
                    })
                    .collect();
                Ok(ItemBuffer::SurfaceCorrections(items))
            }
        }
    }

    /// Write corrector nodes to the inclusive bounding box. Grid extents
    /// take gridded items; irregular spacing takes positioned items.
    pub fn write(
        &mut self,
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        buffer: &ItemBuffer,
    ) -> Result<()> {
        self.container.ensure_writable("write surface corrections")?;
        let region = self.region(row_start, col_start, row_end, col_end)?;
        let n = self.num_correctors();
        let z_subset = storage::subset(
            vec![u64::from(region.row_start), u64::from(region.col_start), 0],
            vec![u64::from(region.rows()), u64::from(region.columns()), n as u64],
        )?;

        match (&self.positions, buffer) {
            (None, ItemBuffer::GriddedCorrections(items)) => {
                check_len(items.len(), region.len())?;
                let z: Vec<f32> = items.iter().flat_map(|item| item.z[..n].iter().copied()).collect();
                storage::write_elements(&self.z, &z_subset, &ItemBuffer::Float32(z))?;
            }
            (Some((x_array, y_array)), ItemBuffer::SurfaceCorrections(items)) => {
                check_len(items.len(), region.len())?;
                let z: Vec<f32> = items.iter().flat_map(|item| item.z[..n].iter().copied()).collect();
                let x: Vec<f64> = items.iter().map(|item| item.x).collect();
                let y: Vec<f64> = items.iter().map(|item| item.y).collect();
                let subset = region.subset()?;
                storage::write_elements(&self.z, &z_subset, &ItemBuffer::Float32(z))?;
                storage::write_elements(x_array, &subset, &ItemBuffer::Float64(x))?;
                storage::write_elements(y_array, &subset, &ItemBuffer::Float64(y))?;
            }
            (_, other) => {
                return Err(BagError::type_mismatch(format!(
                    "{:?} surface corrections cannot store a {} buffer",
                    self.surface.topography(),
                    other.kind_name()
                )))
            }
        }
        debug!(rows = region.rows(), columns = region.columns(), "Wrote surface correctors");
        Ok(())
    }

    /// Persist the surface descriptor (datums, origin, spacing).
    pub fn write_attributes(&self) -> Result<()> {
        self.container.ensure_writable("write surface corrections attributes")?;
        self.container
            .update_group_attributes(self.descriptor.internal_path(), self.surface.to_attributes())
    }

    /// Read one row of `base` corrected to the datum at `corrector`.
    pub fn read_corrected_row(
        &self,
        row: u32,
        col_start: u32,
        col_end: u32,
        corrector: u8,
        base: &SimpleLayer,
    ) -> Result<ItemBuffer> {
        self.read_corrected(row, row, col_start, col_end, corrector, base)
    }

    /// Read `base` over the inclusive bounding box, corrected to the datum at
    /// `corrector`. Null base cells stay null; cells no corrector reaches
    /// become null.
    pub fn read_corrected(
        &self,
        row_start: u32,
        row_end: u32,
        col_start: u32,
        col_end: u32,
        corrector: u8,
        base: &SimpleLayer,
    ) -> Result<ItemBuffer> {
        if corrector >= self.surface.num_correctors() {
            return Err(BagError::out_of_range(format!(
                "corrector {corrector} with {} correctors",
                self.surface.num_correctors()
            )));
        }
        let null = base.descriptor().layer_type().null_value();
        let values = base
            .read(row_start, col_start, row_end, col_end)?
            .into_f32()
            .map_err(|_| {
                BagError::type_mismatch(format!(
                    "{} is not a floating point layer",
                    base.descriptor().name()
                ))
            })?;

        let region = Region {
            row_start,
            col_start,
            row_end,
            col_end,
        };
        let correctors = match self.surface.topography() {
            SurfaceTopography::IrregularlySpaced => self.irregular_points(usize::from(corrector))?,
            _ => self.grid_points(&region, usize::from(corrector))?,
        };

        let mut corrected = Vec::with_capacity(values.len());
        for (cell, value) in values.into_iter().enumerate() {
            if value == null {
                corrected.push(null);
                continue;
            }
            let row = row_start + (cell as u32) / region.columns();
            let column = col_start + (cell as u32) % region.columns();
            let x = self.grid_origin.0 + f64::from(column) * self.grid_spacing.0;
            let y = self.grid_origin.1 + f64::from(row) * self.grid_spacing.1;

            corrected.push(match correctors.offset_at(x, y) {
                Some(offset) => (f64::from(value) + offset) as f32,
                None => null,
            });
        }
        Ok(ItemBuffer::Float32(corrected))
    }

    /// Corrector points covering `region` on the corrector grid.
    fn grid_points(&self, region: &Region, corrector: usize) -> Result<Correctors> {
        let (origin_x, origin_y) = self.surface.origin();
        let (spacing_x, spacing_y) = self.surface.spacing();
        if !(spacing_x > 0.0 && spacing_y > 0.0) {
            return Err(BagError::invalid_argument(format!(
                "surface corrector spacing ({spacing_x}, {spacing_y}) must be positive"
            )));
        }
        let (rows, columns) = self.surface.dims();

        let node_range = |start: f64, end: f64, origin: f64, spacing: f64, count: u32| {
            let max = f64::from(count.saturating_sub(1));
            let first = ((start - origin) / spacing).clamp(0.0, max).floor() as u32;
            let last = ((end - origin) / spacing).clamp(0.0, max).ceil() as u32;
            (first, last)
        };
        let (first_row, last_row) = node_range(
            self.grid_origin.1 + f64::from(region.row_start) * self.grid_spacing.1,
            self.grid_origin.1 + f64::from(region.row_end) * self.grid_spacing.1,
            origin_y,
            spacing_y,
            rows,
        );
        let (first_col, last_col) = node_range(
            self.grid_origin.0 + f64::from(region.col_start) * self.grid_spacing.0,
            self.grid_origin.0 + f64::from(region.col_end) * self.grid_spacing.0,
            origin_x,
            spacing_x,
            columns,
        );

        let window = Region::within(first_row, first_col, last_row, last_col, rows, columns)?;
        let z = self.read_z(&window, corrector, 1)?;

        Ok(Correctors::Grid {
            window,
            z,
            origin: (origin_x, origin_y),
            spacing: (spacing_x, spacing_y),
        })
    }

    /// Every positioned corrector with a value for `corrector`.
    fn irregular_points(&self, corrector: usize) -> Result<Correctors> {
        let (x_array, y_array) = self
            .positions
            .as_ref()
            .ok_or_else(|| BagError::format("irregular surface corrections without positions"))?;
        let (rows, columns) = self.surface.dims();
        let all = Region::within(0, 0, rows.saturating_sub(1), columns.saturating_sub(1), rows, columns)?;
        let subset = all.subset()?;

        let x = storage::read_elements(x_array, &subset, DataType::Float64)?.into_f64()?;
        let y = storage::read_elements(y_array, &subset, DataType::Float64)?.into_f64()?;
        let z = self.read_z(&all, corrector, 1)?;

        let points = x
            .into_iter()
            .zip(y)
            .zip(z)
            .filter(|((x, y), z)| x.is_finite() && y.is_finite() && *z != BAG_NULL_GENERIC)
            .map(|((x, y), z)| (x, y, f64::from(z)))
            .collect();
        Ok(Correctors::Points(points))
    }
}

fn check_len(actual: usize, expected: usize) -> Result<()> {
    if actual != expected {
        return Err(BagError::size_mismatch("surface corrections", expected, actual));
    }
    Ok(())
}

/// Correctors near a corrected region, in geographic coordinates.
enum Correctors {
    /// A window of the corrector grid.
    Grid {
        window: Region,
        z: Vec<f32>,
        origin: (f64, f64),
        spacing: (f64, f64),
    },
    /// Positioned correctors as (x, y, z).
    Points(Vec<(f64, f64, f64)>),
}

impl Correctors {
    /// Inverse squared distance blend of the correctors around (x, y).
    fn offset_at(&self, x: f64, y: f64) -> Option<f64> {
        match self {
            Self::Grid {
                window,
                z,
                origin,
                spacing,
            } => {
                let ratio = spacing.0 / spacing.1;
                let clamp_node = |value: f64, first: u32, last: u32| {
                    value.clamp(f64::from(first), f64::from(last))
                };
                let fr = clamp_node((y - origin.1) / spacing.1, window.row_start, window.row_end);
                let fc = clamp_node((x - origin.0) / spacing.0, window.col_start, window.col_end);

                let mut nodes = Vec::with_capacity(4);
                for row in [fr.floor() as u32, fr.ceil() as u32] {
                    for column in [fc.floor() as u32, fc.ceil() as u32] {
                        if nodes.contains(&(row, column)) {
                            continue;
                        }
                        nodes.push((row, column));
                    }
                }

                blend(
                    nodes.into_iter().filter_map(|(row, column)| {
                        let index = (row - window.row_start) as usize * window.columns() as usize
                            + (column - window.col_start) as usize;
                        let value = *z.get(index)?;
                        (value != BAG_NULL_GENERIC).then(|| {
                            (
                                origin.0 + f64::from(column) * spacing.0,
                                origin.1 + f64::from(row) * spacing.1,
                                f64::from(value),
                            )
                        })
                    }),
                    x,
                    y,
                    ratio,
                )
            }
            Self::Points(points) => blend(points.iter().copied(), x, y, 1.0),
        }
    }
}

fn blend(points: impl Iterator<Item = (f64, f64, f64)>, x: f64, y: f64, ratio: f64) -> Option<f64> {
    let mut weight_sum = 0.0;
    let mut weighted = 0.0;
    for (px, py, z) in points {
        let dx = px - x;
        let dy = (py - y) * ratio;
        let distance_sq = dx * dx + dy * dy;
        if distance_sq == 0.0 {
            return Some(z);
        }
        let weight = 1.0 / distance_sq;
        weight_sum += weight;
        weighted += weight * z;
    }
    (weight_sum > 0.0).then(|| weighted / weight_sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn container(dir: &tempfile::TempDir) -> Arc<Container> {
        Arc::new(Container::create(&dir.path().join("sc.bag")).unwrap())
    }

    #[test]
    fn test_creation_validation() {
        let dir = tempdir().unwrap();
        let container = container(&dir);
        let unknown = SurfaceCorrections::create(
            container.clone(),
            2,
            SurfaceTopography::Unknown,
            1,
            (4, 4),
            (0.0, 0.0),
            (1.0, 1.0),
            0,
            0,
        );
        assert_eq!(unknown.err().unwrap().kind(), ErrorKind::InvalidArgument);

        let too_many = SurfaceCorrections::create(
            container,
            2,
            SurfaceTopography::GridExtents,
            11,
            (4, 4),
            (0.0, 0.0),
            (1.0, 1.0),
            0,
            0,
        );
        assert_eq!(too_many.err().unwrap().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_gridded_round_trip() {
        let dir = tempdir().unwrap();
        let mut corrections = SurfaceCorrections::create(
            container(&dir),
            2,
            SurfaceTopography::GridExtents,
            2,
            (3, 3),
            (0.0, 0.0),
            (1.0, 1.0),
            2,
            1,
        )
        .unwrap();

        let mut z = [0.0f32; SURFACE_CORRECTOR_LIMIT];
        z[0] = 1.5;
        z[1] = -0.5;
        let items = vec![VerticalDatumCorrectionsGridded { z }; 2];
        corrections
            .write(1, 0, 1, 1, &ItemBuffer::GriddedCorrections(items.clone()))
            .unwrap();
        assert_eq!(
            corrections.read(1, 0, 1, 1).unwrap(),
            ItemBuffer::GriddedCorrections(items)
        );

        let wrong = ItemBuffer::SurfaceCorrections(vec![VerticalDatumCorrections::default()]);
        assert_eq!(
            corrections.write(0, 0, 0, 0, &wrong).unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_blend_exact_hit_and_midpoint() {
        let points = vec![(0.0, 0.0, 1.0), (2.0, 0.0, 3.0)];
        assert_eq!(blend(points.iter().copied(), 0.0, 0.0, 1.0), Some(1.0));
        assert_eq!(blend(points.iter().copied(), 1.0, 0.0, 1.0), Some(2.0));
        assert_eq!(blend(std::iter::empty(), 1.0, 0.0, 1.0), None);
    }
}
