use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Typed ID wrapper ───────────────────────────────────────────────

/// Store-assigned row identifier. Immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// ── Entity kinds and columns ───────────────────────────────────────

/// The three record shapes the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A label grouping checklists.
    Category,
    /// A named collection of items.
    Checklist,
    /// A single task with a completion flag.
    Item,
}

impl EntityKind {
    pub const ALL: [Self; 3] = [Self::Category, Self::Checklist, Self::Item];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Category => "Category",
            Self::Checklist => "Checklist",
            Self::Item => "Item",
        }
    }

    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::Category => "categories",
            Self::Checklist => "checklists",
            Self::Item => "items",
        }
    }

    /// Columns present on rows of this kind.
    pub fn columns(self) -> &'static [Column] {
        match self {
            Self::Category => &[
                Column::Id,
                Column::Name,
                Column::CreatedAt,
                Column::UpdatedAt,
            ],
            Self::Checklist => &[
                Column::Id,
                Column::Title,
                Column::CategoryId,
                Column::CreatedAt,
                Column::UpdatedAt,
            ],
            Self::Item => &[
                Column::Id,
                Column::TaskName,
                Column::IsCompleted,
                Column::ChecklistId,
                Column::CreatedAt,
                Column::UpdatedAt,
            ],
        }
    }

    pub fn has_column(self, column: Column) -> bool {
        self.columns().contains(&column)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted field, named by its SQL column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Name,
    Title,
    CategoryId,
    TaskName,
    IsCompleted,
    ChecklistId,
    CreatedAt,
    UpdatedAt,
}

impl Column {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Title => "title",
            Self::CategoryId => "category_id",
            Self::TaskName => "task_name",
            Self::IsCompleted => "is_completed",
            Self::ChecklistId => "checklist_id",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

// ── Records ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: RecordId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checklist {
    pub id: RecordId,
    pub title: String,
    /// Not referentially enforced; may point at a category that never existed.
    pub category_id: Option<RecordId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: RecordId,
    pub task_name: String,
    pub is_completed: bool,
    pub checklist_id: RecordId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored row of any kind, as it travels through the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Category(Category),
    Checklist(Checklist),
    Item(Item),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Category(_) => EntityKind::Category,
            Self::Checklist(_) => EntityKind::Checklist,
            Self::Item(_) => EntityKind::Item,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            Self::Category(c) => c.id,
            Self::Checklist(c) => c.id,
            Self::Item(i) => i.id,
        }
    }

    /// Value of a foreign-key column on this row, if the row has one and it is set.
    pub fn foreign_key(&self, column: Column) -> Option<RecordId> {
        match (self, column) {
            (Self::Checklist(c), Column::CategoryId) => c.category_id,
            (Self::Item(i), Column::ChecklistId) => Some(i.checklist_id),
            _ => None,
        }
    }

    pub fn into_category(self) -> Option<Category> {
        match self {
            Self::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_checklist(self) -> Option<Checklist> {
        match self {
            Self::Checklist(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_item(self) -> Option<Item> {
        match self {
            Self::Item(i) => Some(i),
            _ => None,
        }
    }
}

// ── Create payloads ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChecklist {
    pub title: String,
    #[serde(default)]
    pub category_id: Option<RecordId>,
}

/// Fields accepted when creating an item.
///
/// There is no completion flag: new items always start
/// incomplete, and an `isCompleted` key in the request body is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub task_name: String,
    pub checklist_id: RecordId,
}

/// A row to insert. The variant decides the target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewRecord {
    Category(NewCategory),
    Checklist(NewChecklist),
    Item(NewItem),
}

impl NewRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Category(_) => EntityKind::Category,
            Self::Checklist(_) => EntityKind::Checklist,
            Self::Item(_) => EntityKind::Item,
        }
    }
}

// ── Partial updates ────────────────────────────────────────────────

/// Allow-listed checklist fields for partial update.
///
/// `categoryId: null` clears the category; omitting the key leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecklistPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_id: Option<Option<RecordId>>,
}

impl ChecklistPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.category_id.is_none()
    }
}

/// Allow-listed item fields for partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist_id: Option<RecordId>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.task_name.is_none() && self.is_completed.is_none() && self.checklist_id.is_none()
    }
}

/// Field changes to merge into an existing row. Categories are create-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChanges {
    Checklist(ChecklistPatch),
    Item(ItemPatch),
}

impl RecordChanges {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Checklist(_) => EntityKind::Checklist,
            Self::Item(_) => EntityKind::Item,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Checklist(p) => p.is_empty(),
            Self::Item(p) => p.is_empty(),
        }
    }
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
fn present_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ── Filters ────────────────────────────────────────────────────────

/// A scalar a filter can compare a column against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Id(RecordId),
    Text(String),
    Bool(bool),
}

impl From<RecordId> for FieldValue {
    fn from(id: RecordId) -> Self {
        Self::Id(id)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Row predicate for `find_where` / `destroy_where`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    /// `column = value`
    Eq(Column, FieldValue),
    /// `column IS NULL`
    IsNull(Column),
    /// `column IN (ids)`; an empty list matches nothing.
    In(Column, Vec<RecordId>),
}

impl RecordFilter {
    pub fn column(&self) -> Column {
        match self {
            Self::Eq(c, _) | Self::IsNull(c) | Self::In(c, _) => *c,
        }
    }
}

// ── Nested views ───────────────────────────────────────────────────

/// A checklist with its items and category eagerly loaded.
///
/// The nested rows are keyed by model name (`Items`, `Category`), the shape
/// existing clients of the JSON API read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistDetail {
    #[serde(flatten)]
    pub checklist: Checklist,
    #[serde(rename = "Items")]
    pub items: Vec<Item>,
    #[serde(rename = "Category")]
    pub category: Option<Category>,
}

/// Rows removed by a cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// Rows of the addressed kind (0 or 1).
    pub removed: u64,
    /// Dependent rows removed before it.
    pub dependents: u64,
}

// ── Metrics ────────────────────────────────────────────────────────

/// Summary statistics about the store.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub categories: u64,
    pub checklists: u64,
    pub items: u64,
    pub completed_items: u64,
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_drops_supplied_completion_flag() {
        let item: NewItem = serde_json::from_str(
            r#"{"taskName":"Passport","checklistId":1,"isCompleted":true}"#,
        )
        .unwrap();
        assert_eq!(item.task_name, "Passport");
        assert_eq!(item.checklist_id, RecordId(1));
    }

    #[test]
    fn checklist_patch_distinguishes_null_from_absent() {
        let absent: ChecklistPatch = serde_json::from_str(r#"{"title":"Trip"}"#).unwrap();
        assert_eq!(absent.category_id, None);

        let cleared: ChecklistPatch = serde_json::from_str(r#"{"categoryId":null}"#).unwrap();
        assert_eq!(cleared.category_id, Some(None));
        assert!(!cleared.is_empty());

        let set: ChecklistPatch = serde_json::from_str(r#"{"categoryId":4}"#).unwrap();
        assert_eq!(set.category_id, Some(Some(RecordId(4))));
    }

    #[test]
    fn patches_ignore_unknown_fields() {
        let patch: ItemPatch =
            serde_json::from_str(r#"{"id":99,"createdAt":"x","isCompleted":true}"#).unwrap();
        assert_eq!(
            patch,
            ItemPatch {
                is_completed: Some(true),
                ..Default::default()
            }
        );
    }

    #[test]
    fn checklist_detail_flattens_into_camel_case() {
        let now = Utc::now();
        let detail = ChecklistDetail {
            checklist: Checklist {
                id: RecordId(1),
                title: "Packing".into(),
                category_id: None,
                created_at: now,
                updated_at: now,
            },
            items: vec![],
            category: None,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["title"], "Packing");
        assert!(json["categoryId"].is_null());
        assert!(json["Items"].as_array().unwrap().is_empty());
        assert!(json["Category"].is_null());
        assert!(json.get("items").is_none());
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn foreign_key_only_reports_declared_columns() {
        let now = Utc::now();
        let item = Record::Item(Item {
            id: RecordId(3),
            task_name: "Socks".into(),
            is_completed: false,
            checklist_id: RecordId(2),
            created_at: now,
            updated_at: now,
        });
        assert_eq!(item.foreign_key(Column::ChecklistId), Some(RecordId(2)));
        assert_eq!(item.foreign_key(Column::CategoryId), None);
        assert!(EntityKind::Item.has_column(Column::IsCompleted));
        assert!(!EntityKind::Category.has_column(Column::ChecklistId));
    }
}
