//! The top-level dataset handle.
//!
//! A [`Dataset`] owns the container and every layer in it. Layers, value
//! tables and tracking lists are borrowed from the dataset, so none of them
//! can outlive it or be used after [`Dataset::close`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::compound::RecordDefinition;
use crate::config::{check_compression_level, BagConfig};
use crate::descriptor::Descriptor;
use crate::error::{BagError, Result};
use crate::layer::{
    GeorefMetadataLayer, InterleavedLayer, Layer, SimpleLayer, SurfaceCorrections, SurfaceTopography,
    VrMetadata, VrNode, VrRefinements,
};
use crate::metadata::Metadata;
use crate::profiles::GeorefMetadataProfile;
use crate::storage::{attr_str, Attributes, Container};
use crate::tracking_list::{TrackingList, VrTrackingList};
use crate::types::{
    version_at_least, DataType, GroupType, LayerType, OpenMode, BAG_VERSION, GEOREF_METADATA_PATH,
    LEGACY_GEOREF_METADATA_PATH, METADATA_PATH, ROOT_PATH,
};

/// Root attribute holding the format version.
pub(crate) const VERSION_ATTR: &str = "Bag Version";

/// Metadata group attribute holding the serialized [`Metadata`].
pub(crate) const METADATA_ATTR: &str = "metadata";

/// An open bathymetric dataset.
pub struct Dataset {
    container: Arc<Container>,
    config: BagConfig,
    metadata: Metadata,
    descriptor: Descriptor,
    layers: Vec<Layer>,
    tracking_list: TrackingList,
    vr_tracking_list: Option<VrTrackingList>,
    closed: bool,
}

impl Dataset {
    /// Create a dataset at `path` with Elevation and Uncertainty layers.
    pub fn create(path: impl AsRef<Path>, metadata: Metadata, chunk_size: u64, compression_level: u8) -> Result<Self> {
        let config = BagConfig {
            chunk_size,
            compression_level,
            ..BagConfig::default()
        };
        Self::create_with_config(path, metadata, config)
    }

    /// Create a dataset using the storage settings in `config`.
    pub fn create_with_config(path: impl AsRef<Path>, metadata: Metadata, config: BagConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate().map_err(BagError::invalid_argument)?;
        metadata.validate()?;

        let container = Arc::new(Container::create(path)?);

        let mut root_attrs = Attributes::new();
        root_attrs.insert(VERSION_ATTR.to_string(), json!(BAG_VERSION));
        container.create_group(ROOT_PATH, root_attrs)?;

        let mut metadata_attrs = Attributes::new();
        metadata_attrs.insert(METADATA_ATTR.to_string(), metadata.to_json()?);
        container.create_group(METADATA_PATH, metadata_attrs)?;

        let tracking_list = TrackingList::create(container.clone(), config.vr_chunk_size, config.compression_level)?;
        let descriptor = Descriptor::from_metadata(&metadata, BAG_VERSION, false);

        let mut dataset = Self {
            container,
            config,
            metadata,
            descriptor,
            layers: Vec::new(),
            tracking_list,
            vr_tracking_list: None,
            closed: false,
        };
        dataset.create_simple_layer(LayerType::Elevation, config.chunk_size, config.compression_level)?;
        dataset.create_simple_layer(LayerType::Uncertainty, config.chunk_size, config.compression_level)?;

        let (rows, columns) = dataset.descriptor.dims();
        info!(
            path = %path.display(),
            rows,
            columns,
            chunk_size = config.chunk_size,
            compression_level = config.compression_level,
            "Created dataset"
        );
        Ok(dataset)
    }

    /// Open an existing dataset and discover its layers.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::open_with_config(path, mode, BagConfig::default())
    }

    /// Open an existing dataset, using `config` for anything created later.
    pub fn open_with_config(path: impl AsRef<Path>, mode: OpenMode, config: BagConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate().map_err(BagError::invalid_argument)?;
        let read_only = mode == OpenMode::ReadOnly;
        let container = Arc::new(Container::open(path, read_only)?);

        if !container.node_exists(ROOT_PATH) {
            return Err(BagError::format(format!("{} has no {ROOT_PATH} group", path.display())));
        }
        let root_attrs = container.group_attributes(ROOT_PATH)?;
        let version = attr_str(&root_attrs, VERSION_ATTR)
            .ok_or_else(|| BagError::format(format!("{} has no version", path.display())))?
            .to_string();

        if !container.node_exists(METADATA_PATH) {
            return Err(BagError::format(format!("{} has no metadata", path.display())));
        }
        let metadata_attrs = container.group_attributes(METADATA_PATH)?;
        let metadata = Metadata::from_json(
            metadata_attrs
                .get(METADATA_ATTR)
                .ok_or_else(|| BagError::format(format!("{} has no metadata", path.display())))?,
        )?;

        let tracking_list = TrackingList::open(container.clone(), config.vr_chunk_size, config.compression_level)?;
        let descriptor = Descriptor::from_metadata(&metadata, version.as_str(), read_only);

        let mut dataset = Self {
            container,
            config,
            metadata,
            descriptor,
            layers: Vec::new(),
            tracking_list,
            vr_tracking_list: None,
            closed: false,
        };
        dataset.discover_layers()?;

        info!(
            path = %path.display(),
            version = %version,
            read_only,
            layers = dataset.layers.len(),
            "Opened dataset"
        );
        Ok(dataset)
    }

    fn discover_layers(&mut self) -> Result<()> {
        let container = self.container.clone();
        let version = self.descriptor.version().to_string();
        let current = version_at_least(&version, 2, 0);

        for layer_type in LayerType::SIMPLE {
            let Some(path) = layer_type.internal_path() else {
                continue;
            };
            if container.node_exists(path) {
                let id = self.descriptor.next_layer_id();
                let layer = SimpleLayer::open(container.clone(), id, layer_type)?;
                self.insert_layer(Layer::Simple(layer))?;
            }
        }

        for group in [GroupType::Node, GroupType::Elevation] {
            if !container.node_exists(group.path()) {
                continue;
            }
            for &layer_type in group.members() {
                let Some(member) = group.member_name(layer_type) else {
                    continue;
                };
                if !container.node_exists(&format!("{}/{member}", group.path())) {
                    continue;
                }
                let id = self.descriptor.next_layer_id();
                let layer = InterleavedLayer::open(container.clone(), id, layer_type, group, !current)?;
                self.insert_layer(Layer::Interleaved(layer))?;
            }
        }

        if LayerType::SurfaceCorrection
            .internal_path()
            .is_some_and(|path| container.node_exists(path))
        {
            let id = self.descriptor.next_layer_id();
            let layer = SurfaceCorrections::open(
                container.clone(),
                id,
                self.descriptor.dims(),
                self.descriptor.origin(),
                self.descriptor.grid_spacing(),
            )?;
            self.insert_layer(Layer::SurfaceCorrections(layer))?;
        }

        if current {
            self.discover_georef_layers()?;
        }

        if LayerType::VarResMetadata
            .internal_path()
            .is_some_and(|path| container.node_exists(path))
        {
            let id = self.descriptor.next_layer_id();
            self.insert_layer(Layer::VrMetadata(VrMetadata::open(container.clone(), id)?))?;
            let id = self.descriptor.next_layer_id();
            self.insert_layer(Layer::VrRefinements(VrRefinements::open(container.clone(), id)?))?;

            if LayerType::VarResNode
                .internal_path()
                .is_some_and(|path| container.node_exists(path))
            {
                let id = self.descriptor.next_layer_id();
                self.insert_layer(Layer::VrNode(VrNode::open(container.clone(), id)?))?;
            }

            self.vr_tracking_list = Some(VrTrackingList::open(
                container.clone(),
                self.config.vr_chunk_size,
                self.config.compression_level,
            )?);
            self.enable_georef_vr();
        }

        Ok(())
    }

    fn discover_georef_layers(&mut self) -> Result<()> {
        let container = self.container.clone();
        let mut seen: Vec<String> = Vec::new();

        for parent in [GEOREF_METADATA_PATH, LEGACY_GEOREF_METADATA_PATH] {
            if !container.node_exists(parent) {
                continue;
            }
            for name in container.child_names(parent)? {
                if seen.contains(&name) {
                    continue;
                }
                if parent == LEGACY_GEOREF_METADATA_PATH {
                    warn!(layer = %name, parent, "Reading georeferenced metadata from legacy path");
                }
                let id = self.descriptor.next_layer_id();
                let layer = GeorefMetadataLayer::open(container.clone(), id, parent, &name)?;
                self.insert_layer(Layer::GeorefMetadata(layer))?;
                seen.push(name);
            }
        }
        Ok(())
    }

    fn enable_georef_vr(&mut self) {
        let chunk_size = self.config.vr_chunk_size;
        for layer in &mut self.layers {
            if let Some(georef) = layer.as_georef_metadata_mut() {
                georef.enable_vr(chunk_size);
            }
        }
    }

    fn insert_layer(&mut self, layer: Layer) -> Result<()> {
        self.descriptor.add_layer(layer.descriptor().entry())?;
        debug!(
            id = layer.id(),
            layer_type = %layer.layer_type(),
            name = %layer.name(),
            "Registered layer"
        );
        self.layers.push(layer);
        Ok(())
    }

    fn has_layer_type(&self, layer_type: LayerType) -> bool {
        self.layers.iter().any(|layer| layer.layer_type() == layer_type)
    }

    /// Storage location of the dataset.
    pub fn path(&self) -> PathBuf {
        self.container.root().to_path_buf()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &BagConfig {
        &self.config
    }

    pub fn is_read_only(&self) -> bool {
        self.container.is_read_only()
    }

    /// Every layer, in id order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Distinct layer types present. Georeferenced metadata layers appear once.
    pub fn layer_types(&self) -> Vec<LayerType> {
        self.descriptor.layer_types()
    }

    pub fn layer_by_id(&self, id: u32) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id() == id)
    }

    pub fn layer_by_id_mut(&mut self, id: u32) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.id() == id)
    }

    /// The layer of `layer_type`. Georeferenced metadata layers are keyed by
    /// name and must be looked up with [`georef_metadata_layer`](Self::georef_metadata_layer).
    pub fn layer(&self, layer_type: LayerType) -> Result<Option<&Layer>> {
        reject_georef(layer_type)?;
        Ok(self.layers.iter().find(|layer| layer.layer_type() == layer_type))
    }

    pub fn layer_mut(&mut self, layer_type: LayerType) -> Result<Option<&mut Layer>> {
        reject_georef(layer_type)?;
        Ok(self.layers.iter_mut().find(|layer| layer.layer_type() == layer_type))
    }

    /// The simple layer of `layer_type`, if created.
    pub fn simple_layer(&self, layer_type: LayerType) -> Result<Option<&SimpleLayer>> {
        reject_non_simple(layer_type)?;
        Ok(self
            .layers
            .iter()
            .filter_map(Layer::as_simple)
            .find(|layer| layer.descriptor().layer_type() == layer_type))
    }

    pub fn simple_layer_mut(&mut self, layer_type: LayerType) -> Result<Option<&mut SimpleLayer>> {
        reject_non_simple(layer_type)?;
        Ok(self
            .layers
            .iter_mut()
            .filter_map(Layer::as_simple_mut)
            .find(|layer| layer.descriptor().layer_type() == layer_type))
    }

    /// The interleaved layer of `layer_type`, if present.
    pub fn interleaved_layer(&self, layer_type: LayerType) -> Option<&InterleavedLayer> {
        self.layers
            .iter()
            .filter_map(Layer::as_interleaved)
            .find(|layer| layer.descriptor().layer_type() == layer_type)
    }

    pub fn interleaved_layer_mut(&mut self, layer_type: LayerType) -> Option<&mut InterleavedLayer> {
        self.layers
            .iter_mut()
            .filter_map(Layer::as_interleaved_mut)
            .find(|layer| layer.descriptor().layer_type() == layer_type)
    }

    /// The georeferenced metadata layer named `name`.
    pub fn georef_metadata_layer(&self, name: &str) -> Option<&GeorefMetadataLayer> {
        self.layers
            .iter()
            .filter_map(Layer::as_georef_metadata)
            .find(|layer| layer.descriptor().name() == name)
    }

    pub fn georef_metadata_layer_mut(&mut self, name: &str) -> Option<&mut GeorefMetadataLayer> {
        self.layers
            .iter_mut()
            .filter_map(Layer::as_georef_metadata_mut)
            .find(|layer| layer.descriptor().name() == name)
    }

    /// Every georeferenced metadata layer.
    pub fn georef_metadata_layers(&self) -> Vec<&GeorefMetadataLayer> {
        self.layers.iter().filter_map(Layer::as_georef_metadata).collect()
    }

    /// Alias of [`georef_metadata_layer`](Self::georef_metadata_layer).
    pub fn compound_layer(&self, name: &str) -> Option<&GeorefMetadataLayer> {
        self.georef_metadata_layer(name)
    }

    pub fn compound_layer_mut(&mut self, name: &str) -> Option<&mut GeorefMetadataLayer> {
        self.georef_metadata_layer_mut(name)
    }

    pub fn compound_layers(&self) -> Vec<&GeorefMetadataLayer> {
        self.georef_metadata_layers()
    }

    pub fn surface_corrections(&self) -> Option<&SurfaceCorrections> {
        self.layers.iter().find_map(Layer::as_surface_corrections)
    }

    pub fn surface_corrections_mut(&mut self) -> Option<&mut SurfaceCorrections> {
        self.layers.iter_mut().find_map(Layer::as_surface_corrections_mut)
    }

    /// VR metadata, or `None` before [`create_vr`](Self::create_vr).
    pub fn vr_metadata(&self) -> Option<&VrMetadata> {
        self.layers.iter().find_map(Layer::as_vr_metadata)
    }

    pub fn vr_metadata_mut(&mut self) -> Option<&mut VrMetadata> {
        self.layers.iter_mut().find_map(Layer::as_vr_metadata_mut)
    }

    pub fn vr_refinements(&self) -> Option<&VrRefinements> {
        self.layers.iter().find_map(Layer::as_vr_refinements)
    }

    pub fn vr_refinements_mut(&mut self) -> Option<&mut VrRefinements> {
        self.layers.iter_mut().find_map(Layer::as_vr_refinements_mut)
    }

    /// VR nodes, present only when `create_vr` was asked to make them.
    pub fn vr_node(&self) -> Option<&VrNode> {
        self.layers.iter().find_map(Layer::as_vr_node)
    }

    pub fn vr_node_mut(&mut self) -> Option<&mut VrNode> {
        self.layers.iter_mut().find_map(Layer::as_vr_node_mut)
    }

    pub fn tracking_list(&self) -> &TrackingList {
        &self.tracking_list
    }

    pub fn tracking_list_mut(&mut self) -> &mut TrackingList {
        &mut self.tracking_list
    }

    pub fn vr_tracking_list(&self) -> Option<&VrTrackingList> {
        self.vr_tracking_list.as_ref()
    }

    pub fn vr_tracking_list_mut(&mut self) -> Option<&mut VrTrackingList> {
        self.vr_tracking_list.as_mut()
    }

    /// Create a simple layer. Only one layer per type may exist.
    pub fn create_simple_layer(
        &mut self,
        layer_type: LayerType,
        chunk_size: u64,
        compression_level: u8,
    ) -> Result<&mut SimpleLayer> {
        self.container.ensure_writable("create simple layer")?;
        reject_non_simple(layer_type)?;
        check_compression_level(compression_level)?;
        if self.has_layer_type(layer_type) {
            return Err(BagError::already_exists(format!("{layer_type} layer")));
        }

        let id = self.descriptor.next_layer_id();
        let layer = SimpleLayer::create(
            self.container.clone(),
            id,
            layer_type,
            self.descriptor.dims(),
            chunk_size,
            compression_level,
        )?;
        self.insert_layer(Layer::Simple(layer))?;
        info!(layer_type = %layer_type, id, "Created simple layer");

        self.simple_layer_mut(layer_type)?
            .ok_or_else(|| BagError::not_found(format!("{layer_type} layer")))
    }

    /// Create a member of an interleaved group.
    pub fn create_interleaved_layer(
        &mut self,
        layer_type: LayerType,
        group: GroupType,
        chunk_size: u64,
        compression_level: u8,
    ) -> Result<&mut InterleavedLayer> {
        self.container.ensure_writable("create interleaved layer")?;
        check_compression_level(compression_level)?;
        if self.has_layer_type(layer_type) {
            return Err(BagError::already_exists(format!("{layer_type} layer")));
        }

        let id = self.descriptor.next_layer_id();
        let layer = InterleavedLayer::create(
            self.container.clone(),
            id,
            layer_type,
            group,
            self.descriptor.dims(),
            chunk_size,
            compression_level,
        )?;
        self.insert_layer(Layer::Interleaved(layer))?;
        info!(layer_type = %layer_type, group = ?group, id, "Created interleaved layer");

        self.interleaved_layer_mut(layer_type)
            .ok_or_else(|| BagError::not_found(format!("{layer_type} layer")))
    }

    /// Create a georeferenced metadata layer annotating the simple layer
    /// named `name`.
    ///
    /// A known `profile` fixes the record definition and `definition` is
    /// ignored.
    pub fn create_georef_metadata_layer(
        &mut self,
        key_type: DataType,
        profile: GeorefMetadataProfile,
        name: &str,
        definition: RecordDefinition,
        chunk_size: u64,
        compression_level: u8,
    ) -> Result<&mut GeorefMetadataLayer> {
        self.container.ensure_writable("create georeferenced metadata layer")?;
        check_compression_level(compression_level)?;

        let annotated = self.layers.iter().any(|layer| {
            layer.layer_type().is_simple() && layer.name().eq_ignore_ascii_case(name)
        });
        if !annotated {
            return Err(BagError::not_found(format!("simple layer '{name}'")));
        }
        if self.georef_metadata_layer(name).is_some() {
            return Err(BagError::already_exists(format!("georeferenced metadata layer '{name}'")));
        }

        let id = self.descriptor.next_layer_id();
        let mut layer = GeorefMetadataLayer::create(
            self.container.clone(),
            id,
            name,
            key_type,
            profile,
            definition,
            self.descriptor.dims(),
            chunk_size,
            compression_level,
        )?;
        if self.vr_metadata().is_some() {
            layer.enable_vr(self.config.vr_chunk_size);
        }
        self.insert_layer(Layer::GeorefMetadata(layer))?;
        info!(name, key_type = %key_type, profile = %profile, id, "Created georeferenced metadata layer");

        self.georef_metadata_layer_mut(name)
            .ok_or_else(|| BagError::not_found(format!("georeferenced metadata layer '{name}'")))
    }

    /// Alias of [`create_georef_metadata_layer`](Self::create_georef_metadata_layer).
    pub fn create_compound_layer(
        &mut self,
        key_type: DataType,
        profile: GeorefMetadataProfile,
        name: &str,
        definition: RecordDefinition,
        chunk_size: u64,
        compression_level: u8,
    ) -> Result<&mut GeorefMetadataLayer> {
        self.create_georef_metadata_layer(key_type, profile, name, definition, chunk_size, compression_level)
    }

    /// Create the surface corrections layer on the dataset's grid.
    pub fn create_surface_corrections(
        &mut self,
        topography: SurfaceTopography,
        num_correctors: u8,
        chunk_size: u64,
        compression_level: u8,
    ) -> Result<&mut SurfaceCorrections> {
        self.container.ensure_writable("create surface corrections")?;
        check_compression_level(compression_level)?;
        if self.has_layer_type(LayerType::SurfaceCorrection) {
            return Err(BagError::already_exists("surface corrections"));
        }

        let id = self.descriptor.next_layer_id();
        let layer = SurfaceCorrections::create(
            self.container.clone(),
            id,
            topography,
            num_correctors,
            self.descriptor.dims(),
            self.descriptor.origin(),
            self.descriptor.grid_spacing(),
            chunk_size,
            compression_level,
        )?;
        self.insert_layer(Layer::SurfaceCorrections(layer))?;
        info!(topography = ?topography, num_correctors, id, "Created surface corrections");

        self.surface_corrections_mut()
            .ok_or_else(|| BagError::not_found("surface corrections"))
    }

    /// Add the variable resolution extension: VR metadata, VR refinements,
    /// optionally VR nodes, and the VR tracking list.
    pub fn create_vr(&mut self, chunk_size: u64, compression_level: u8, make_node: bool) -> Result<()> {
        self.container.ensure_writable("create variable resolution extension")?;
        check_compression_level(compression_level)?;
        if self.vr_metadata().is_some() {
            return Err(BagError::already_exists("variable resolution extension"));
        }

        let container = self.container.clone();
        let flat_chunk = self.config.growable_chunk(chunk_size);

        let id = self.descriptor.next_layer_id();
        let metadata = VrMetadata::create(
            container.clone(),
            id,
            self.descriptor.dims(),
            chunk_size,
            compression_level,
        )?;
        self.insert_layer(Layer::VrMetadata(metadata))?;

        let id = self.descriptor.next_layer_id();
        let refinements = VrRefinements::create(container.clone(), id, flat_chunk, compression_level)?;
        self.insert_layer(Layer::VrRefinements(refinements))?;

        if make_node {
            let id = self.descriptor.next_layer_id();
            let node = VrNode::create(container.clone(), id, flat_chunk, compression_level)?;
            self.insert_layer(Layer::VrNode(node))?;
        }

        self.vr_tracking_list = Some(VrTrackingList::create(container, flat_chunk, compression_level)?);
        self.enable_georef_vr();

        info!(chunk_size, compression_level, make_node, "Created variable resolution extension");
        Ok(())
    }

    /// Geographic position of the node at (`row`, `column`).
    pub fn grid_to_geo(&self, row: u32, column: u32) -> (f64, f64) {
        self.descriptor.grid_to_geo(row, column)
    }

    /// Nearest node to a geographic position, or `None` outside the grid.
    pub fn geo_to_grid(&self, x: f64, y: f64) -> Option<(u32, u32)> {
        self.descriptor.geo_to_grid(x, y)
    }

    /// Persist pending layer attributes and value tables.
    ///
    /// Tracking lists are only persisted by their own `write`.
    pub fn flush(&mut self) -> Result<()> {
        if self.container.is_read_only() {
            return Ok(());
        }
        for layer in &mut self.layers {
            layer.flush()?;
        }
        debug!(path = %self.container.root().display(), "Flushed dataset");
        Ok(())
    }

    /// Flush and release the dataset.
    pub fn close(mut self) -> Result<()> {
        let result = self.flush();
        self.closed = true;
        info!(path = %self.container.root().display(), "Closed dataset");
        result
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(
                path = %self.container.root().display(),
                error = %e,
                "Failed to flush dataset on drop"
            );
        }
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("path", &self.container.root())
            .field("version", &self.descriptor.version())
            .field("read_only", &self.container.is_read_only())
            .field("layers", &self.layers)
            .finish()
    }
}

fn reject_georef(layer_type: LayerType) -> Result<()> {
    if layer_type == LayerType::GeorefMetadata {
        return Err(BagError::invalid_argument(
            "georeferenced metadata layers are looked up by name",
        ));
    }
    Ok(())
}

fn reject_non_simple(layer_type: LayerType) -> Result<()> {
    if !layer_type.is_simple() {
        return Err(BagError::invalid_argument(format!(
            "{layer_type} is not a simple layer type"
        )));
    }
    Ok(())
}
