pub mod relations;
pub mod schema;
pub mod sqlite;
mod traits;

pub use relations::{Included, Loaded, RELATIONS, Relation, RelationShape, relations_of};
pub use traits::{MAX_IN_IDS, RecordStore};
