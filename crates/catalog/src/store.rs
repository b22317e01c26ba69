use std::collections::BTreeMap;

use foundation::ids::SliceId;

use crate::slice::Slice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    NotFound(SliceId),
    Duplicate(SliceId),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::NotFound(id) => write!(f, "{id} not found"),
            CatalogError::Duplicate(id) => write!(f, "{id} already registered"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// The dashboard's current slice set.
pub trait SliceStore {
    fn list(&self) -> Vec<&Slice>;
    fn get(&self, id: SliceId) -> Option<&Slice>;
    fn insert(&mut self, slice: Slice) -> Result<(), CatalogError>;
    fn upsert(&mut self, slice: Slice);
    fn remove(&mut self, id: SliceId) -> Result<Slice, CatalogError>;
}

/// Slices keyed by id; iteration is in ascending id order.
#[derive(Debug, Default, Clone)]
pub struct InMemorySliceStore {
    slices: BTreeMap<SliceId, Slice>,
}

impl InMemorySliceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slices(slices: impl IntoIterator<Item = Slice>) -> Self {
        let mut store = Self::new();
        for s in slices {
            store.upsert(s);
        }
        store
    }

    pub fn ids(&self) -> Vec<SliceId> {
        self.slices.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

impl SliceStore for InMemorySliceStore {
    fn list(&self) -> Vec<&Slice> {
        self.slices.values().collect()
    }

    fn get(&self, id: SliceId) -> Option<&Slice> {
        self.slices.get(&id)
    }

    fn insert(&mut self, slice: Slice) -> Result<(), CatalogError> {
        if self.slices.contains_key(&slice.id) {
            return Err(CatalogError::Duplicate(slice.id));
        }
        self.slices.insert(slice.id, slice);
        Ok(())
    }

    fn upsert(&mut self, slice: Slice) {
        self.slices.insert(slice.id, slice);
    }

    fn remove(&mut self, id: SliceId) -> Result<Slice, CatalogError> {
        self.slices.remove(&id).ok_or(CatalogError::NotFound(id))
    }
}
