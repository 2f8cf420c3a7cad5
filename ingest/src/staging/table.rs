use ingest_postgres::types::TableName;
use uuid::Uuid;

/// Length of the staging name prefix used to disambiguate colliding table names.
const COLLISION_PREFIX_LEN: usize = 9;

/// Uniquely named staging table of a writer session, `tbl_<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTable {
    name: TableName,
}

impl StagingTable {
    pub fn generate(schema: &str) -> Self {
        let name = format!("tbl_{}", Uuid::new_v4().simple());

        Self {
            name: TableName::new(schema, name),
        }
    }

    pub fn name(&self) -> &TableName {
        &self.name
    }

    /// Leading part of the table name, e.g. `tbl_1a2b3`.
    pub fn collision_prefix(&self) -> &str {
        let end = self.name.name.len().min(COLLISION_PREFIX_LEN);
        &self.name.name[..end]
    }
}
