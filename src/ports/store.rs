use crate::error::StoreError;
use crate::store::{Collection, FieldHash, RecordFilter, RecordStatus, StoredRecord};

use async_trait::async_trait;

/// Document collection with unique-index enforcement, consumed from the
/// surrounding deployment.
///
/// `insert` must enforce the per-collection unique indexes (record id, and
/// endpoint where present) atomically: of any set of concurrent inserts
/// colliding on an index, exactly one wins and the rest observe
/// [`StoreError::Duplicate`]. Check-then-insert in application code is not
/// an acceptable implementation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: Collection, record: StoredRecord)
    -> Result<(), StoreError>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: &RecordFilter,
    ) -> Result<Option<StoredRecord>, StoreError>;

    async fn find(
        &self,
        collection: Collection,
        filter: &RecordFilter,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// Flips the record's status (soft delete / revocation) and bumps its
    /// updated timestamp. Returns false when no record has the given id.
    async fn update_status(
        &self,
        collection: Collection,
        id: &FieldHash,
        status: RecordStatus,
    ) -> Result<bool, StoreError>;
}
