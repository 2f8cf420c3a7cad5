mod catalog;

pub use catalog::{
    CatalogColumn, column_db_type, fetch_children, fetch_columns, fetch_keys, schema_table_names,
    staging_column_types,
};
