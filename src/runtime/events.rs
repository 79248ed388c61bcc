//! Storage event stream payloads.

/// Events broadcast by [`crate::runtime::handle::CanvasStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageEvent {
    /// A canvas was stored through `new_canvas`.
    Created {
        /// Stored name.
        name: String,
    },
    /// A canvas was removed.
    Deleted {
        /// Removed name.
        name: String,
    },
    /// A bulk import committed.
    BulkImported {
        /// Rows written.
        inserted: usize,
        /// Rows skipped as already present.
        skipped: usize,
    },
    /// A snapshot file was atomically replaced.
    SnapshotWritten {
        /// Records in the snapshot.
        records: usize,
    },
}
