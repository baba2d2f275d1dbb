//! Shared types passed between the scan, match, and export stages.
//!
//! These are serialized into the scan manifest, so field names are stable.

use crate::matching::RuleMatch;
use crate::metadata::FieldMap;
use serde::{Deserialize, Serialize};

/// Position-independent identifier of an image within one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(pub usize);

/// One image of the collection with its metadata and current match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    /// Path relative to the source root.
    pub source_path: String,
    /// Original filename; its extension is carried over to the new name.
    pub file_name: String,
    pub size: u64,
    pub metadata: FieldMap,
    /// `None` when no rule applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<RuleMatch>,
}

impl ImageRecord {
    pub fn new(id: ImageId, source_path: impl Into<String>, metadata: FieldMap) -> Self {
        let source_path = source_path.into();
        let file_name = source_path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&source_path)
            .to_string();
        Self {
            id,
            source_path,
            file_name,
            size: 0,
            metadata,
            matched: None,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Planned new filename, if a rule matched.
    pub fn new_file_name(&self) -> Option<&str> {
        self.matched.as_ref().map(|m| m.new_file_name.as_str())
    }
}
