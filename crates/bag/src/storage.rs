//! Zarr V3 container backing a dataset.
//!
//! A dataset is a directory store. Raster layers are 2-D arrays at fixed
//! paths below `/BAG_root`; struct layers and lists are groups with one
//! array per field (see [`ColumnGroup`]). Growable 1-D arrays are resized
//! by rewriting their metadata, which keeps every stored chunk valid.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;
use zarrs::array::codec::bytes_to_bytes::blosc::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode,
};
use zarrs::array::{Array, ArrayBuilder, DataType as ZarrDataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::{Group, GroupBuilder};
use zarrs_filesystem::FilesystemStore;

use crate::error::{BagError, Result};
use crate::items::{Columnar, ItemBuffer};
use crate::types::DataType;

pub(crate) type Store = FilesystemStore;
pub(crate) type StoreArray = Array<Store>;
pub(crate) type Attributes = Map<String, Value>;

/// Handle to the directory store of one open dataset.
pub(crate) struct Container {
    root: PathBuf,
    store: Arc<Store>,
    read_only: bool,
}

impl Container {
    /// Create a new, empty store at `path`. Fails if anything exists there.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(BagError::already_exists(path.display().to_string()));
        }
        std::fs::create_dir_all(path)?;
        let store = FilesystemStore::new(path)
            .map_err(|e| BagError::io(format!("{}: {e}", path.display())))?;

        Ok(Self {
            root: path.to_path_buf(),
            store: Arc::new(store),
            read_only: false,
        })
    }

    /// Open an existing store.
    pub fn open(path: &Path, read_only: bool) -> Result<Self> {
        if !path.exists() {
            return Err(BagError::not_found(path.display().to_string()));
        }
        if !path.is_dir() {
            return Err(BagError::format(format!(
                "{} is not a dataset directory",
                path.display()
            )));
        }
        let store = FilesystemStore::new(path)
            .map_err(|e| BagError::io(format!("{}: {e}", path.display())))?;

        Ok(Self {
            root: path.to_path_buf(),
            store: Arc::new(store),
            read_only,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Fail with `ReadOnlyViolation` when the store was opened read-only.
    pub fn ensure_writable(&self, operation: &str) -> Result<()> {
        if self.read_only {
            return Err(BagError::read_only(operation.to_string()));
        }
        Ok(())
    }

    fn node_dir(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Whether an array or group exists at `path`.
    pub fn node_exists(&self, path: &str) -> bool {
        self.node_dir(path).join("zarr.json").is_file()
    }

    /// Names of the array and group children of `path`, sorted.
    pub fn child_names(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.node_dir(path);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.path().join("zarr.json").is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Create a group and store its metadata.
    pub fn create_group(&self, path: &str, attributes: Attributes) -> Result<()> {
        let mut builder = GroupBuilder::new();
        builder.attributes(attributes);
        let group = builder
            .build(self.store.clone(), path)
            .map_err(|e| BagError::io(format!("create group {path}: {e}")))?;
        group
            .store_metadata()
            .map_err(|e| BagError::io(format!("store group {path}: {e}")))?;
        debug!(path = %path, "Created group");
        Ok(())
    }

    fn open_group(&self, path: &str) -> Result<Group<Store>> {
        if !self.node_exists(path) {
            return Err(BagError::not_found(path.to_string()));
        }
        Group::open(self.store.clone(), path)
            .map_err(|e| BagError::format(format!("open group {path}: {e}")))
    }

    /// Attributes of the group at `path`.
    pub fn group_attributes(&self, path: &str) -> Result<Attributes> {
        Ok(self.open_group(path)?.attributes().clone())
    }

    /// Merge `attributes` into the group at `path`.
    pub fn update_group_attributes(&self, path: &str, attributes: Attributes) -> Result<()> {
        let mut group = self.open_group(path)?;
        group.attributes_mut().extend(attributes);
        group
            .store_metadata()
            .map_err(|e| BagError::io(format!("store group {path}: {e}")))
    }

    /// Create an array and store its metadata.
    pub fn create_array(&self, path: &str, spec: &ArraySpec) -> Result<StoreArray> {
        let chunk_grid: zarrs::array::ChunkGrid = spec
            .chunk_shape
            .clone()
            .try_into()
            .map_err(|e| BagError::invalid_argument(format!("{:?}", e)))?;

        let mut binding = ArrayBuilder::new(
            spec.shape.clone(),
            zarr_data_type(spec.data_type)?,
            chunk_grid,
            fill_value(spec.data_type, spec.fill)?,
        );
        let mut builder = binding.attributes(spec.attributes.clone());

        if let Some(codec) = compression_codec(spec.compression_level, spec.data_type)? {
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let array = builder
            .build(self.store.clone(), path)
            .map_err(|e| BagError::io(format!("create array {path}: {e}")))?;
        array
            .store_metadata()
            .map_err(|e| BagError::io(format!("store array {path}: {e}")))?;

        debug!(
            path = %path,
            shape = ?spec.shape,
            chunks = ?spec.chunk_shape,
            dtype = %spec.data_type,
            compression = spec.compression_level,
            "Created array"
        );
        Ok(array)
    }

    /// Open the array at `path`.
    pub fn open_array(&self, path: &str) -> Result<StoreArray> {
        if !self.node_exists(path) {
            return Err(BagError::not_found(path.to_string()));
        }
        Array::open(self.store.clone(), path)
            .map_err(|e| BagError::format(format!("open array {path}: {e}")))
    }

    /// Merge `attributes` into the array at `path`.
    pub fn update_array_attributes(&self, path: &str, attributes: Attributes) -> Result<()> {
        let mut array = self.open_array(path)?;
        array.attributes_mut().extend(attributes);
        array
            .store_metadata()
            .map_err(|e| BagError::io(format!("store array {path}: {e}")))
    }
}

/// Shape, chunking and encoding of a new array.
#[derive(Debug, Clone)]
pub(crate) struct ArraySpec {
    pub shape: Vec<u64>,
    pub chunk_shape: Vec<u64>,
    pub data_type: DataType,
    pub fill: f64,
    pub compression_level: u8,
    pub attributes: Attributes,
}

impl ArraySpec {
    /// A `rows` x `columns` raster with square chunks. A chunk size of 0
    /// stores the raster as a single chunk.
    pub fn grid(
        rows: u32,
        columns: u32,
        chunk_size: u64,
        data_type: DataType,
        fill: f64,
        compression_level: u8,
    ) -> Self {
        Self {
            shape: vec![u64::from(rows), u64::from(columns)],
            chunk_shape: grid_chunk_shape(rows, columns, chunk_size),
            data_type,
            fill,
            compression_level,
            attributes: Attributes::new(),
        }
    }

    /// A 1-D array that starts at `len` elements and grows on demand.
    pub fn growable(len: u64, chunk: u64, data_type: DataType, fill: f64, compression_level: u8) -> Self {
        Self {
            shape: vec![len],
            chunk_shape: vec![chunk.max(1)],
            data_type,
            fill,
            compression_level,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Chunk shape of a `rows` x `columns` raster.
pub(crate) fn grid_chunk_shape(rows: u32, columns: u32, chunk_size: u64) -> Vec<u64> {
    vec![chunk_edge(chunk_size, rows), chunk_edge(chunk_size, columns)]
}

fn chunk_edge(chunk_size: u64, dim: u32) -> u64 {
    let dim = u64::from(dim).max(1);
    if chunk_size == 0 {
        dim
    } else {
        chunk_size.min(dim)
    }
}

fn zarr_data_type(data_type: DataType) -> Result<ZarrDataType> {
    match data_type {
        DataType::Float32 => Ok(ZarrDataType::Float32),
        DataType::Float64 => Ok(ZarrDataType::Float64),
        DataType::UInt8 => Ok(ZarrDataType::UInt8),
        DataType::UInt16 => Ok(ZarrDataType::UInt16),
        DataType::UInt32 => Ok(ZarrDataType::UInt32),
        DataType::UInt64 => Ok(ZarrDataType::UInt64),
        other => Err(BagError::invalid_argument(format!(
            "{other} cannot be stored as an array element"
        ))),
    }
}

fn fill_value(data_type: DataType, fill: f64) -> Result<FillValue> {
    match data_type {
        DataType::Float32 => Ok(FillValue::from(fill as f32)),
        DataType::Float64 => Ok(FillValue::from(fill)),
        DataType::UInt8 => Ok(FillValue::from(fill as u8)),
        DataType::UInt16 => Ok(FillValue::from(fill as u16)),
        DataType::UInt32 => Ok(FillValue::from(fill as u32)),
        DataType::UInt64 => Ok(FillValue::from(fill as u64)),
        other => Err(BagError::invalid_argument(format!(
            "{other} has no fill value"
        ))),
    }
}

/// Deflate (zlib) compression through blosc, shuffled by element width.
fn compression_codec(
    level: u8,
    data_type: DataType,
) -> Result<Option<Arc<dyn zarrs::array::codec::BytesToBytesCodecTraits>>> {
    if level == 0 {
        return Ok(None);
    }

    let level = BloscCompressionLevel::try_from(level).map_err(|_| {
        BagError::invalid_argument(format!("invalid compression level {level}"))
    })?;

    let codec = BloscCodec::new(
        BloscCompressor::Zlib,
        level,
        None,
        BloscShuffleMode::Shuffle,
        Some(data_type.element_size().max(1)),
    )
    .map_err(|e| BagError::invalid_argument(e.to_string()))?;

    Ok(Some(Arc::new(codec)))
}

/// Build a subset from a start corner and a shape.
pub(crate) fn subset(start: Vec<u64>, shape: Vec<u64>) -> Result<ArraySubset> {
    ArraySubset::new_with_start_shape(start, shape)
        .map_err(|e| BagError::invalid_argument(e.to_string()))
}

/// Change the extent of an array. Chunks already written stay valid.
pub(crate) fn resize_array(array: &mut StoreArray, shape: Vec<u64>) -> Result<()> {
    debug!(path = %array.path(), shape = ?shape, "Resizing array");
    array.set_shape(shape);
    array
        .store_metadata()
        .map_err(|e| BagError::io(format!("store array {}: {e}", array.path())))
}

macro_rules! element_io {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        /// Read `subset` of `array` into a scalar buffer of `data_type`.
        pub(crate) fn read_elements(
            array: &StoreArray,
            subset: &ArraySubset,
            data_type: DataType,
        ) -> Result<ItemBuffer> {
            match data_type {
                $(
                    DataType::$variant => array
                        .retrieve_array_subset_elements::<$ty>(subset)
                        .map(ItemBuffer::$variant)
                        .map_err(|e| BagError::io(format!("read {}: {e}", array.path()))),
                )*
                other => Err(BagError::invalid_argument(format!(
                    "{other} is not a stored element type"
                ))),
            }
        }

        /// Write a scalar buffer to `subset` of `array`.
        pub(crate) fn write_elements(
            array: &StoreArray,
            subset: &ArraySubset,
            buffer: &ItemBuffer,
        ) -> Result<()> {
            match buffer {
                $(
                    ItemBuffer::$variant(values) => array
                        .store_array_subset_elements::<$ty>(subset, values)
                        .map_err(|e| BagError::io(format!("write {}: {e}", array.path()))),
                )*
                other => Err(BagError::type_mismatch(format!(
                    "{} buffers are not stored element-wise",
                    other.kind_name()
                ))),
            }
        }
    };
}

element_io!(
    Float32 => f32,
    Float64 => f64,
    UInt8 => u8,
    UInt16 => u16,
    UInt32 => u32,
    UInt64 => u64,
);

/// A group holding one array per field of a [`Columnar`] item type.
pub(crate) struct ColumnGroup<T> {
    path: String,
    arrays: Vec<StoreArray>,
    _item: PhantomData<T>,
}

impl<T: Columnar> ColumnGroup<T> {
    /// Create the group and one array per column, all of `shape`.
    pub fn create(
        container: &Container,
        path: &str,
        shape: Vec<u64>,
        chunk_shape: Vec<u64>,
        compression_level: u8,
        attributes: Attributes,
    ) -> Result<Self> {
        container.create_group(path, attributes)?;

        let arrays = T::COLUMNS
            .iter()
            .map(|column| {
                let spec = ArraySpec {
                    shape: shape.clone(),
                    chunk_shape: chunk_shape.clone(),
                    data_type: column.data_type,
                    fill: column.fill,
                    compression_level,
                    attributes: Attributes::new(),
                };
                container.create_array(&format!("{path}/{}", column.name), &spec)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: path.to_string(),
            arrays,
            _item: PhantomData,
        })
    }

    /// Open an existing column group.
    pub fn open(container: &Container, path: &str) -> Result<Self> {
        let arrays = T::COLUMNS
            .iter()
            .map(|column| container.open_array(&format!("{path}/{}", column.name)))
            .collect::<Result<Vec<_>>>()?;

        let shape = arrays.first().map(|array| array.shape().to_vec());
        if arrays.iter().any(|array| Some(array.shape().to_vec()) != shape) {
            return Err(BagError::format(format!(
                "columns of {path} have differing shapes"
            )));
        }

        Ok(Self {
            path: path.to_string(),
            arrays,
            _item: PhantomData,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Shared shape of every column.
    pub fn shape(&self) -> Vec<u64> {
        self.arrays
            .first()
            .map(|array| array.shape().to_vec())
            .unwrap_or_default()
    }

    /// Read the items inside `subset`.
    pub fn read(&self, subset: &ArraySubset) -> Result<Vec<T>> {
        let columns = self
            .arrays
            .iter()
            .zip(T::COLUMNS)
            .map(|(array, column)| read_elements(array, subset, column.data_type))
            .collect::<Result<Vec<_>>>()?;
        T::from_columns(columns)
    }

    /// Write `items` to `subset`.
    pub fn write(&self, subset: &ArraySubset, items: &[T]) -> Result<()> {
        for (array, column) in self.arrays.iter().zip(T::to_columns(items)) {
            write_elements(array, subset, &column)?;
        }
        Ok(())
    }

    /// Change the extent of every column.
    pub fn resize(&mut self, shape: Vec<u64>) -> Result<()> {
        for array in &mut self.arrays {
            resize_array(array, shape.clone())?;
        }
        Ok(())
    }
}

/// Read a numeric attribute.
pub(crate) fn attr_f64(attributes: &Attributes, key: &str) -> Option<f64> {
    attributes.get(key).and_then(|v| v.as_f64())
}

/// Read an unsigned integer attribute.
pub(crate) fn attr_u64(attributes: &Attributes, key: &str) -> Option<u64> {
    attributes.get(key).and_then(|v| v.as_u64())
}

/// Read a string attribute.
pub(crate) fn attr_str<'a>(attributes: &'a Attributes, key: &str) -> Option<&'a str> {
    attributes.get(key).and_then(|v| v.as_str())
}
