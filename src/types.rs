use bson::Document;
use serde::{Deserialize, Serialize};

pub type CollectionName = String;

/// Tag sets constraining which replica members may serve a read.
pub type TagSet = Vec<Document>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), order: Order::Desc }
    }
}

/// Wire form of a sort spec: `{field: 1}` ascending, `{field: -1}` descending.
#[must_use]
pub fn sort_document(sort: &[SortSpec]) -> Document {
    let mut doc = Document::new();
    for spec in sort {
        doc.insert(spec.field.clone(), if spec.order == Order::Asc { 1_i32 } else { -1_i32 });
    }
    doc
}

/// Which replica topology member(s) may serve a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadPreference {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

/// Acknowledgment level required for a write to count as successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteConcern {
    Unacknowledged,
    Nodes(u32),
    Majority,
}

impl Default for WriteConcern {
    fn default() -> Self {
        Self::Nodes(1)
    }
}
