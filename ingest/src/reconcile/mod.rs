//! Mapping of incoming columns onto the destination schema.

mod policy;
mod recipe;

pub use policy::MergePolicy;
pub use recipe::{ColumnMapping, RESERVED_WORDS, Recipe, is_reserved, normalize_name, reconcile};
