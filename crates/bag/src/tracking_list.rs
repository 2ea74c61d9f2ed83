//! Audit trail of manually edited soundings.
//!
//! Items are appended in memory and persisted only by [`TrackingList::write`],
//! which replaces whatever the container held before.

use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::error::Result;
use crate::items::{Columnar, TrackingItem, VrTrackingItem};
use crate::storage::{self, attr_u64, Attributes, ColumnGroup, Container};
use crate::types::{TRACKING_LIST_PATH, VR_TRACKING_LIST_PATH};

/// An item type that can be kept in a tracking list.
pub trait TrackingRecord: Columnar + Clone {
    /// Storage path of the list.
    const PATH: &'static str;
    /// Attribute holding the persisted length.
    const LENGTH_ATTRIBUTE: &'static str;
}

impl TrackingRecord for TrackingItem {
    const PATH: &'static str = TRACKING_LIST_PATH;
    const LENGTH_ATTRIBUTE: &'static str = "Tracking List Length";
}

impl TrackingRecord for VrTrackingItem {
    const PATH: &'static str = VR_TRACKING_LIST_PATH;
    const LENGTH_ATTRIBUTE: &'static str = "VR Tracking List Length";
}

/// Edited soundings of the fixed-resolution grid, or of the refined
/// sub-grids for [`VrTrackingList`].
pub struct TrackingList<T: TrackingRecord = TrackingItem> {
    container: Arc<Container>,
    columns: Option<ColumnGroup<T>>,
    items: Vec<T>,
    chunk_size: u64,
    compression_level: u8,
}

/// Tracking list of edits inside refined sub-grids.
pub type VrTrackingList = TrackingList<VrTrackingItem>;

fn length_attributes<T: TrackingRecord>(len: usize) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert(T::LENGTH_ATTRIBUTE.to_string(), json!(len));
    attrs
}

impl<T: TrackingRecord> TrackingList<T> {
    /// Create an empty, persisted list.
    pub(crate) fn create(container: Arc<Container>, chunk_size: u64, compression_level: u8) -> Result<Self> {
        let chunk_size = chunk_size.max(1);
        let columns = ColumnGroup::create(
            &container,
            T::PATH,
            vec![0],
            vec![chunk_size],
            compression_level,
            length_attributes::<T>(0),
        )?;
        Ok(Self {
            container,
            columns: Some(columns),
            items: Vec::new(),
            chunk_size,
            compression_level,
        })
    }

    /// Load the stored list, or start an empty one if none is stored.
    pub(crate) fn open(container: Arc<Container>, chunk_size: u64, compression_level: u8) -> Result<Self> {
        let mut list = Self {
            container,
            columns: None,
            items: Vec::new(),
            chunk_size: chunk_size.max(1),
            compression_level,
        };
        if !list.container.node_exists(T::PATH) {
            return Ok(list);
        }

        let columns = ColumnGroup::<T>::open(&list.container, T::PATH)?;
        let stored = columns.shape().first().copied().unwrap_or(0);
        let attrs = list.container.group_attributes(T::PATH)?;
        let len = attr_u64(&attrs, T::LENGTH_ATTRIBUTE).map_or(stored, |len| len.min(stored));
        if len > 0 {
            list.items = columns.read(&storage::subset(vec![0], vec![len])?)?;
        }
        list.columns = Some(columns);
        Ok(list)
    }

    /// Append an item. Nothing is persisted until [`write`](Self::write).
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Drop every in-memory item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Persist the in-memory list, replacing the stored one.
    pub fn write(&mut self) -> Result<()> {
        self.container.ensure_writable("write tracking list")?;

        let columns = match &mut self.columns {
            Some(columns) => columns,
            slot => slot.insert(ColumnGroup::create(
                &self.container,
                T::PATH,
                vec![0],
                vec![self.chunk_size],
                self.compression_level,
                Attributes::new(),
            )?),
        };

        let len = self.items.len() as u64;
        columns.resize(vec![len])?;
        if len > 0 {
            columns.write(&storage::subset(vec![0], vec![len])?, &self.items)?;
        }
        self.container
            .update_group_attributes(T::PATH, length_attributes::<T>(self.items.len()))?;
        debug!(path = T::PATH, len, "Wrote tracking list");
        Ok(())
    }
}

impl<'a, T: TrackingRecord> IntoIterator for &'a TrackingList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
