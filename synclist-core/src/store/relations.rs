//! Relationship table between entity kinds.
//!
//! Eager loading and cascading deletes both walk this table instead of
//! hard-coding joins per entity.

use crate::types::{Category, ChecklistDetail, Column, EntityKind, Item, Record};

/// Cardinality of a relation, seen from its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationShape {
    /// The target rows carry the foreign key pointing at the owner.
    HasMany,
    /// The owner row carries the foreign key pointing at the target.
    BelongsTo,
}

/// One edge of the relationship table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub owner: EntityKind,
    pub target: EntityKind,
    pub foreign_key: Column,
    pub shape: RelationShape,
    /// Key the related rows are exposed under when eagerly loaded.
    pub name: &'static str,
    /// Owned children are removed together with their owner.
    pub owning: bool,
}

impl Relation {
    /// Whether deleting an owner row must first delete the targets.
    pub fn cascades(&self) -> bool {
        self.owning && self.shape == RelationShape::HasMany
    }
}

pub const RELATIONS: &[Relation] = &[
    Relation {
        owner: EntityKind::Checklist,
        target: EntityKind::Item,
        foreign_key: Column::ChecklistId,
        shape: RelationShape::HasMany,
        name: "items",
        owning: true,
    },
    Relation {
        owner: EntityKind::Checklist,
        target: EntityKind::Category,
        foreign_key: Column::CategoryId,
        shape: RelationShape::BelongsTo,
        name: "category",
        owning: false,
    },
    Relation {
        owner: EntityKind::Category,
        target: EntityKind::Checklist,
        foreign_key: Column::CategoryId,
        shape: RelationShape::HasMany,
        name: "checklists",
        owning: false,
    },
];

/// Relations declared for `kind`, in table order.
pub fn relations_of(kind: EntityKind) -> impl Iterator<Item = &'static Relation> {
    RELATIONS.iter().filter(move |r| r.owner == kind)
}

/// Rows reached through one relation of a loaded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Included {
    pub relation: &'static Relation,
    pub records: Vec<Record>,
}

/// A record together with its eagerly loaded relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub record: Record,
    pub includes: Vec<Included>,
}

impl Loaded {
    pub fn bare(record: Record) -> Self {
        Self {
            record,
            includes: Vec::new(),
        }
    }

    /// Related rows under `name`; empty when the relation was not loaded.
    pub fn related(&self, name: &str) -> &[Record] {
        self.includes
            .iter()
            .find(|inc| inc.relation.name == name)
            .map(|inc| inc.records.as_slice())
            .unwrap_or_default()
    }

    /// Reshape a loaded checklist into its nested view.
    ///
    /// Returns `None` if the record is not a checklist.
    pub fn into_checklist_detail(self) -> Option<ChecklistDetail> {
        let items: Vec<Item> = self
            .related("items")
            .iter()
            .cloned()
            .filter_map(Record::into_item)
            .collect();
        let category: Option<Category> = self
            .related("category")
            .first()
            .cloned()
            .and_then(Record::into_category);
        let checklist = self.record.into_checklist()?;
        Some(ChecklistDetail {
            checklist,
            items,
            category,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_owned_children_cascade() {
        let cascading: Vec<_> = RELATIONS.iter().filter(|r| r.cascades()).collect();
        assert_eq!(cascading.len(), 1);
        assert_eq!(cascading[0].owner, EntityKind::Checklist);
        assert_eq!(cascading[0].target, EntityKind::Item);
    }

    #[test]
    fn checklist_relations_cover_items_and_category() {
        let names: Vec<_> = relations_of(EntityKind::Checklist).map(|r| r.name).collect();
        assert_eq!(names, vec!["items", "category"]);
        assert_eq!(relations_of(EntityKind::Item).count(), 0);
    }

    #[test]
    fn foreign_keys_live_on_the_right_side() {
        for relation in RELATIONS {
            let holder = match relation.shape {
                RelationShape::HasMany => relation.target,
                RelationShape::BelongsTo => relation.owner,
            };
            assert!(
                holder.has_column(relation.foreign_key),
                "{} has no {:?}",
                holder,
                relation.foreign_key
            );
        }
    }
}
