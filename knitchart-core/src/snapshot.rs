use serde::{Deserialize, Serialize};
use serde_with::{base64::Base64, serde_as};

use crate::marker::RowMarker;
use crate::DocumentId;

/// Point-in-time copy of one document's progress, the unit handed to a
/// [`ProgressRepository`](crate::ProgressRepository).
///
/// `revision` grows with every snapshot the coordinator produces, which lets a
/// repository drop a save that completes after a newer one.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub document_id: DocumentId,
    pub current_row_index: usize,
    pub markers: Vec<RowMarker>,
    pub check_count: usize,
    #[serde_as(as = "Option<Base64>")]
    pub bookmark: Option<Vec<u8>>,
    #[serde_as(as = "Option<Base64>")]
    pub drawing: Option<Vec<u8>>,
    pub source_key: Option<String>,
    #[serde(default)]
    pub revision: u64,
}

impl ProgressSnapshot {
    pub fn empty(document_id: DocumentId) -> Self {
        Self {
            document_id,
            current_row_index: 0,
            markers: Vec::new(),
            check_count: 0,
            bookmark: None,
            drawing: None,
            source_key: None,
            revision: 0,
        }
    }

    /// Whether this snapshot may overwrite `stored` under last-write-wins.
    pub fn supersedes(&self, stored: &ProgressSnapshot) -> bool {
        self.revision >= stored.revision
    }
}
