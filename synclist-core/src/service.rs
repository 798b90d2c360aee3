//! Entity-shaped operations over a [`RecordStore`].
//!
//! [`ChecklistService`] is the only thing the HTTP layer talks to. It turns
//! store primitives into category, checklist, and item operations and lifts
//! missing rows into [`SyncListError::NotFound`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, StoreError, SyncListError};
use crate::store::RecordStore;
use crate::types::{
    Category, Checklist, ChecklistDetail, ChecklistPatch, Column, DeleteOutcome, EntityKind, Item,
    ItemPatch, NewCategory, NewChecklist, NewItem, NewRecord, Record, RecordChanges, RecordFilter,
    RecordId,
};

/// Domain access layer for categories, checklists, and items.
#[derive(Debug)]
pub struct ChecklistService<S> {
    store: Arc<S>,
}

impl<S> Clone for ChecklistService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecordStore> ChecklistService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Categories ─────────────────────────────────────────────────

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let records = self.store.find_all(EntityKind::Category).await?;
        Ok(records.into_iter().filter_map(Record::into_category).collect())
    }

    pub async fn create_category(&self, fields: NewCategory) -> Result<Category> {
        require_label("name", &fields.name)?;
        let record = self.store.create(&NewRecord::Category(fields)).await?;
        info!(id = %record.id(), "Category created");
        expect_kind(record, Record::into_category)
    }

    // ── Checklists ─────────────────────────────────────────────────

    /// All checklists with their items and category.
    pub async fn list_checklists(&self) -> Result<Vec<ChecklistDetail>> {
        let loaded = self
            .store
            .find_all_including(EntityKind::Checklist)
            .await?;
        Ok(loaded
            .into_iter()
            .filter_map(crate::store::Loaded::into_checklist_detail)
            .collect())
    }

    pub async fn get_checklist(&self, id: RecordId) -> Result<ChecklistDetail> {
        self.store
            .find_by_pk_including(EntityKind::Checklist, id)
            .await?
            .and_then(crate::store::Loaded::into_checklist_detail)
            .ok_or(SyncListError::NotFound {
                kind: EntityKind::Checklist,
                id,
            })
    }

    pub async fn create_checklist(&self, fields: NewChecklist) -> Result<Checklist> {
        require_label("title", &fields.title)?;
        let record = self.store.create(&NewRecord::Checklist(fields)).await?;
        info!(id = %record.id(), "Checklist created");
        expect_kind(record, Record::into_checklist)
    }

    pub async fn update_checklist(&self, id: RecordId, patch: ChecklistPatch) -> Result<Checklist> {
        if let Some(title) = &patch.title {
            require_label("title", title)?;
        }
        let record = self
            .apply_changes(EntityKind::Checklist, id, RecordChanges::Checklist(patch))
            .await?;
        expect_kind(record, Record::into_checklist)
    }

    /// Delete a checklist and every item that belongs to it.
    ///
    /// Items go first, then the checklist. Succeeds when nothing matched.
    pub async fn delete_checklist(&self, id: RecordId) -> Result<DeleteOutcome> {
        let outcome = self
            .store
            .destroy_cascade(EntityKind::Checklist, id)
            .await?;
        info!(
            %id,
            removed = outcome.removed,
            items = outcome.dependents,
            "Checklist deleted"
        );
        Ok(outcome)
    }

    // ── Items ──────────────────────────────────────────────────────

    pub async fn list_items_for_checklist(&self, checklist_id: RecordId) -> Result<Vec<Item>> {
        let records = self
            .store
            .find_where(
                EntityKind::Item,
                &RecordFilter::Eq(Column::ChecklistId, checklist_id.into()),
            )
            .await?;
        Ok(records.into_iter().filter_map(Record::into_item).collect())
    }

    /// Create an item. It always starts incomplete.
    pub async fn create_item(&self, fields: NewItem) -> Result<Item> {
        require_label("taskName", &fields.task_name)?;
        let record = self.store.create(&NewRecord::Item(fields)).await?;
        info!(id = %record.id(), "Item created");
        expect_kind(record, Record::into_item)
    }

    /// Flip an item's completion flag.
    pub async fn toggle_item(&self, id: RecordId) -> Result<Item> {
        let current = self.find_item(id).await?;
        let patch = ItemPatch {
            is_completed: Some(!current.is_completed),
            ..Default::default()
        };
        let record = self
            .apply_changes(EntityKind::Item, id, RecordChanges::Item(patch))
            .await?;
        let item = expect_kind(record, Record::into_item)?;
        debug!(%id, is_completed = item.is_completed, "Item toggled");
        Ok(item)
    }

    pub async fn update_item(&self, id: RecordId, patch: ItemPatch) -> Result<Item> {
        if let Some(task_name) = &patch.task_name {
            require_label("taskName", task_name)?;
        }
        let record = self
            .apply_changes(EntityKind::Item, id, RecordChanges::Item(patch))
            .await?;
        expect_kind(record, Record::into_item)
    }

    /// Delete one item. Returns the number of rows removed (0 or 1).
    pub async fn delete_item(&self, id: RecordId) -> Result<u64> {
        let removed = self.store.destroy(EntityKind::Item, id).await?;
        info!(%id, removed, "Item deleted");
        Ok(removed)
    }

    // ── Helpers ────────────────────────────────────────────────────

    async fn find_item(&self, id: RecordId) -> Result<Item> {
        self.store
            .find_by_pk(EntityKind::Item, id)
            .await?
            .and_then(Record::into_item)
            .ok_or(SyncListError::NotFound {
                kind: EntityKind::Item,
                id,
            })
    }

    /// Merge changes into an existing row; an empty change set returns the row untouched.
    async fn apply_changes(
        &self,
        kind: EntityKind,
        id: RecordId,
        changes: RecordChanges,
    ) -> Result<Record> {
        if changes.is_empty() {
            return self
                .store
                .find_by_pk(kind, id)
                .await?
                .ok_or(SyncListError::NotFound { kind, id });
        }
        match self.store.update(id, &changes).await {
            Err(SyncListError::Store(StoreError::RecordNotFound { kind, id })) => {
                Err(SyncListError::NotFound { kind, id })
            }
            other => other,
        }
    }
}

fn require_label(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(SyncListError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Narrow a record returned by the store to the expected kind.
fn expect_kind<T>(record: Record, narrow: fn(Record) -> Option<T>) -> Result<T> {
    let found = record.kind();
    narrow(record).ok_or_else(|| StoreError::UnexpectedKind(found).into())
}
