//! The slice of the property system the topology layer consumes.
//!
//! Properties themselves live in an external columnar store; the core only
//! needs random access by property index, and in practice only reads the
//! edge-type column (u8) through [`EdgeTypeProvider`]. Derived topologies
//! carry permutations mapping their local edge/node ids back to base property
//! indices, so lookups always go through those indices, never local ids.

use crate::topology::{EntityTypeId, PropertyIndex};

/// Random-access reader over one typed column.
#[derive(Debug, Clone)]
pub enum Column {
    U8(Vec<u8>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Str(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::U8(v) => v.len(),
            Column::U32(v) => v.len(),
            Column::U64(v) => v.len(),
            Column::F32(v) => v.len(),
            Column::F64(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of edge types, indexed by base property index.
pub trait EdgeTypeProvider: Send + Sync {
    fn edge_type(&self, prop_index: PropertyIndex) -> EntityTypeId;
}

/// In-memory columnar store; the stand-in for the external property store in
/// tests and embedders.
#[derive(Debug, Default, Clone)]
pub struct ColumnStore {
    edge_types: Vec<EntityTypeId>,
}

impl ColumnStore {
    pub fn from_edge_types(edge_types: Vec<EntityTypeId>) -> Self {
        ColumnStore { edge_types }
    }

    pub fn num_edge_types_rows(&self) -> usize {
        self.edge_types.len()
    }
}

impl EdgeTypeProvider for ColumnStore {
    fn edge_type(&self, prop_index: PropertyIndex) -> EntityTypeId {
        self.edge_types[prop_index as usize]
    }
}
