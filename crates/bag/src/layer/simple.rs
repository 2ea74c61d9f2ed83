use std::sync::Arc;

use tracing::debug;

use super::descriptor::LayerDescriptor;
use super::{fold_min_max, Raster};
use crate::error::{BagError, Result};
use crate::items::ItemBuffer;
use crate::storage::{ArraySpec, Container};
use crate::types::LayerType;

/// A raster of one scalar per grid node.
pub struct SimpleLayer {
    descriptor: LayerDescriptor,
    container: Arc<Container>,
    raster: Raster,
}

impl SimpleLayer {
    pub(crate) fn create(
        container: Arc<Container>,
        id: u32,
        layer_type: LayerType,
        dims: (u32, u32),
        chunk_size: u64,
        compression_level: u8,
    ) -> Result<Self> {
        let path = layer_type.internal_path().filter(|_| layer_type.is_simple()).ok_or_else(|| {
            BagError::invalid_argument(format!("{layer_type} is not a simple layer type"))
        })?;
        let data_type = layer_type.element_type();
        let descriptor = LayerDescriptor::new(
            id,
            layer_type,
            layer_type.name(),
            path,
            data_type,
            data_type.element_size(),
            chunk_size,
            compression_level,
        );

        let mut attrs = descriptor.settings_attributes();
        attrs.extend(descriptor.min_max_attributes());
        let spec = ArraySpec::grid(
            dims.0,
            dims.1,
            chunk_size,
            data_type,
            f64::from(null_fill(layer_type)),
            compression_level,
        )
        .with_attributes(attrs);
        let raster = Raster::create(&container, path, &spec)?;

        Ok(Self {
            descriptor,
            container,
            raster,
        })
    }

    pub(crate) fn open(container: Arc<Container>, id: u32, layer_type: LayerType) -> Result<Self> {
        let path = layer_type
            .internal_path()
            .ok_or_else(|| BagError::invalid_argument(format!("{layer_type} has no fixed path")))?;
        let data_type = layer_type.element_type();
        let raster = Raster::open(&container, path, data_type)?;

        let mut descriptor = LayerDescriptor::new(
            id,
            layer_type,
            layer_type.name(),
            path,
            data_type,
            data_type.element_size(),
            0,
            0,
        );
        descriptor.load_attributes(raster.attributes());

        Ok(Self {
            descriptor,
            container,
            raster,
        })
    }

    pub fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    pub fn descriptor_mut(&mut self) -> &mut LayerDescriptor {
        &mut self.descriptor
    }

    /// Grid dimensions as (rows, columns).
    pub fn dims(&self) -> (u32, u32) {
        self.raster.dims()
    }

    pub fn read(&self, row_start: u32, col_start: u32, row_end: u32, col_end: u32) -> Result<ItemBuffer> {
        let region = self.raster.region(row_start, col_start, row_end, col_end)?;
        self.raster.read(&region)
    }

    /// Write the region and fold the buffer into the layer's min/max.
    pub fn write(
        &mut self,
        row_start: u32,
        col_start: u32,
        row_end: u32,
        col_end: u32,
        buffer: &ItemBuffer,
    ) -> Result<()> {
        self.container.ensure_writable("write layer")?;
        let region = self.raster.region(row_start, col_start, row_end, col_end)?;
        self.raster.write(&region, buffer, self.descriptor.name())?;

        let null = self.descriptor.layer_type().null_value();
        fold_min_max(self.descriptor.min_max_mut(), buffer, null);
        debug!(
            layer = %self.descriptor.name(),
            rows = region.rows(),
            columns = region.columns(),
            "Wrote region"
        );
        self.write_attributes()
    }

    pub fn write_attributes(&self) -> Result<()> {
        self.container.ensure_writable("write layer attributes")?;
        self.container
            .update_array_attributes(self.descriptor.internal_path(), self.descriptor.min_max_attributes())
    }
}

/// Fill value of never-written cells.
pub(crate) fn null_fill(layer_type: LayerType) -> f32 {
    if layer_type.element_type() == crate::types::DataType::Float32 {
        layer_type.null_value()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::DataType;
    use tempfile::tempdir;

    fn container(dir: &tempfile::TempDir) -> Arc<Container> {
        Arc::new(Container::create(&dir.path().join("simple.bag")).unwrap())
    }

    #[test]
    fn test_write_read_and_statistics() {
        let dir = tempdir().unwrap();
        let container = container(&dir);
        let mut layer =
            SimpleLayer::create(container.clone(), 0, LayerType::Elevation, (6, 8), 4, 1).unwrap();

        let values = ItemBuffer::from(vec![-1.0f32, -2.0, -3.0, 1_000_000.0]);
        layer.write(2, 3, 3, 4, &values).unwrap();
        assert_eq!(layer.read(2, 3, 3, 4).unwrap(), values);
        assert_eq!(layer.descriptor().min_max(), (-3.0, -1.0));

        let reopened = SimpleLayer::open(container, 0, LayerType::Elevation).unwrap();
        assert_eq!(reopened.descriptor().min_max(), (-3.0, -1.0));
        assert_eq!(reopened.descriptor().chunk_size(), 4);
        assert_eq!(reopened.dims(), (6, 8));
    }

    #[test]
    fn test_unwritten_cells_are_null() {
        let dir = tempdir().unwrap();
        let layer =
            SimpleLayer::create(container(&dir), 1, LayerType::Uncertainty, (3, 3), 0, 0).unwrap();
        assert_eq!(
            layer.read(0, 0, 0, 1).unwrap(),
            ItemBuffer::from(vec![1_000_000.0f32; 2])
        );
    }

    #[test]
    fn test_debug_names_layer() {
        let dir = tempdir().unwrap();
        let layer =
            SimpleLayer::create(container(&dir), 1, LayerType::Uncertainty, (3, 3), 0, 0).unwrap();
        let rendered = format!("{layer:?}");
        assert!(rendered.starts_with("SimpleLayer"));
        assert!(rendered.contains("Uncertainty"));
    }

    #[test]
    fn test_integer_layer() {
        let dir = tempdir().unwrap();
        let mut layer =
            SimpleLayer::create(container(&dir), 0, LayerType::NumSoundings, (2, 2), 0, 3).unwrap();
        assert_eq!(layer.descriptor().data_type(), DataType::UInt32);

        let err = layer
            .write(0, 0, 0, 0, &ItemBuffer::from(vec![1.0f32]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        layer.write(0, 0, 1, 1, &ItemBuffer::from(vec![4u32, 0, 9, 2])).unwrap();
        assert_eq!(layer.descriptor().min_max(), (0.0, 9.0));
    }

    #[test]
    fn test_size_mismatch() {
        let dir = tempdir().unwrap();
        let mut layer =
            SimpleLayer::create(container(&dir), 0, LayerType::Elevation, (4, 4), 0, 0).unwrap();
        let err = layer
            .write(0, 0, 1, 1, &ItemBuffer::from(vec![1.0f32; 3]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);
    }

    #[test]
    fn test_rejects_non_simple_type() {
        let dir = tempdir().unwrap();
        let result = SimpleLayer::create(container(&dir), 0, LayerType::VarResNode, (4, 4), 0, 0);
        assert_eq!(result.err().unwrap().kind(), ErrorKind::InvalidArgument);
    }
}
