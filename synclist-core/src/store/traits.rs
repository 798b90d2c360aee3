use std::collections::HashMap;

use crate::types::{
    Column, DeleteOutcome, EntityKind, NewRecord, Record, RecordChanges, RecordFilter, RecordId,
    StoreStats,
};

use super::relations::{Included, Loaded, RelationShape, relations_of};

/// Largest id list sent in one `IN` filter. `SQLite` allows 32766 bound
/// parameters per statement.
pub const MAX_IN_IDS: usize = 10_000;

/// The record store abstraction. The domain access layer reads and writes through this trait.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    // ── Reads ──────────────────────────────────────────────────────

    /// Every row of `kind`, ordered by id.
    async fn find_all(&self, kind: EntityKind) -> crate::error::Result<Vec<Record>>;

    /// Point lookup. A missing row is `Ok(None)`, not an error.
    async fn find_by_pk(&self, kind: EntityKind, id: RecordId)
    -> crate::error::Result<Option<Record>>;

    /// Rows of `kind` matching a filter, ordered by id.
    async fn find_where(
        &self,
        kind: EntityKind,
        filter: &RecordFilter,
    ) -> crate::error::Result<Vec<Record>>;

    // ── Writes ─────────────────────────────────────────────────────

    /// Insert a row. Assigns the id and timestamps and returns the stored row.
    async fn create(&self, new: &NewRecord) -> crate::error::Result<Record>;

    /// Merge `changes` into the row `id`. Fails with `RecordNotFound` if it is gone.
    async fn update(&self, id: RecordId, changes: &RecordChanges)
    -> crate::error::Result<Record>;

    /// Delete one row. Returns the number removed (0 when absent).
    async fn destroy(&self, kind: EntityKind, id: RecordId) -> crate::error::Result<u64>;

    /// Delete every row matching a filter. Returns the number removed.
    async fn destroy_where(
        &self,
        kind: EntityKind,
        filter: &RecordFilter,
    ) -> crate::error::Result<u64>;

    // ── Eager loading ──────────────────────────────────────────────

    /// Every row of `kind` with all of its declared relations loaded.
    async fn find_all_including(&self, kind: EntityKind) -> crate::error::Result<Vec<Loaded>> {
        let records = self.find_all(kind).await?;
        self.include_related(records).await
    }

    /// Point lookup with all declared relations loaded.
    async fn find_by_pk_including(
        &self,
        kind: EntityKind,
        id: RecordId,
    ) -> crate::error::Result<Option<Loaded>> {
        let Some(record) = self.find_by_pk(kind, id).await? else {
            return Ok(None);
        };
        Ok(self.include_related(vec![record]).await?.pop())
    }

    /// Attach related rows to `records`.
    ///
    /// All records must share one kind. Each relation costs one query per
    /// [`MAX_IN_IDS`] distinct keys.
    async fn include_related(&self, records: Vec<Record>) -> crate::error::Result<Vec<Loaded>> {
        let Some(kind) = records.first().map(Record::kind) else {
            return Ok(Vec::new());
        };
        let mut loaded: Vec<Loaded> = records.into_iter().map(Loaded::bare).collect();

        for relation in relations_of(kind) {
            let fk = relation.foreign_key;
            match relation.shape {
                RelationShape::HasMany => {
                    let owner_ids: Vec<RecordId> = loaded.iter().map(|l| l.record.id()).collect();
                    let mut by_owner: HashMap<RecordId, Vec<Record>> = HashMap::new();
                    for child in self.find_in(relation.target, fk, owner_ids).await? {
                        if let Some(owner) = child.foreign_key(fk) {
                            by_owner.entry(owner).or_default().push(child);
                        }
                    }
                    for entry in &mut loaded {
                        let records = by_owner.remove(&entry.record.id()).unwrap_or_default();
                        entry.includes.push(Included { relation, records });
                    }
                }
                RelationShape::BelongsTo => {
                    let parent_ids: Vec<RecordId> = loaded
                        .iter()
                        .filter_map(|l| l.record.foreign_key(fk))
                        .collect();
                    let parents: HashMap<RecordId, Record> = self
                        .find_in(relation.target, Column::Id, parent_ids)
                        .await?
                        .into_iter()
                        .map(|p| (p.id(), p))
                        .collect();
                    for entry in &mut loaded {
                        let records = entry
                            .record
                            .foreign_key(fk)
                            .and_then(|pid| parents.get(&pid))
                            .cloned()
                            .into_iter()
                            .collect();
                        entry.includes.push(Included { relation, records });
                    }
                }
            }
        }

        Ok(loaded)
    }

    /// Rows of `kind` whose `column` is one of `ids`, in id order per batch.
    ///
    /// Duplicates are dropped and the list is split into batches of at most
    /// [`MAX_IN_IDS`] so no single statement exceeds the engine's bound
    /// parameter limit.
    async fn find_in(
        &self,
        kind: EntityKind,
        column: Column,
        mut ids: Vec<RecordId>,
    ) -> crate::error::Result<Vec<Record>> {
        ids.sort_unstable();
        ids.dedup();
        let mut found = Vec::new();
        for batch in ids.chunks(MAX_IN_IDS) {
            let filter = RecordFilter::In(column, batch.to_vec());
            found.extend(self.find_where(kind, &filter).await?);
        }
        Ok(found)
    }

    // ── Cascading delete ───────────────────────────────────────────

    /// Delete a row after first deleting the children it owns.
    ///
    /// The default runs the steps one after another with no transaction, so a
    /// failure between them leaves the children gone and the parent in place.
    /// Stores with transactions should override this.
    async fn destroy_cascade(
        &self,
        kind: EntityKind,
        id: RecordId,
    ) -> crate::error::Result<DeleteOutcome> {
        let mut dependents = 0;
        for relation in relations_of(kind).filter(|r| r.cascades()) {
            dependents += self
                .destroy_where(
                    relation.target,
                    &RecordFilter::Eq(relation.foreign_key, id.into()),
                )
                .await?;
        }
        let removed = self.destroy(kind, id).await?;
        Ok(DeleteOutcome {
            removed,
            dependents,
        })
    }

    // ── Metrics ────────────────────────────────────────────────────

    /// Get summary statistics about the store.
    async fn stats(&self) -> crate::error::Result<StoreStats>;
}
