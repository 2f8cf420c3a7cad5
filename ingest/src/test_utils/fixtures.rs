use tokio_postgres::Client;

use crate::dataset::{Dataset, DatasetColumn};
use crate::types::Cell;

/// Month ids of the `country_month` rows, one row per month for country 57.
pub const FIXTURE_MONTHS: [i64; 6] = [1, 2, 3, 400, 401, 402];

/// Creates the production, metadata and staging layout used by integration tests.
///
/// `prod.country_month` holds six rows with ids 1 to 6, one per entry of [`FIXTURE_MONTHS`].
/// `prod.cm_econ` has a `gdp` of `10 * id` for each of them.
pub async fn create_production_schema(client: &Client) {
    let mut sql = String::from(
        "create schema prod;
         create schema prod_metadata;
         create table prod_metadata.update_stamp (ddlm_stamp bigint not null);
         insert into prod_metadata.update_stamp values (1);
         create table prod.country_month (
             id bigint primary key,
             month_id bigint not null,
             country_id bigint not null
         );
         create table prod.cm_econ (
             country_month_id bigint primary key references prod.country_month (id),
             gdp double precision,
             note text
         );",
    );

    for (index, month_id) in FIXTURE_MONTHS.iter().enumerate() {
        let id = index as i64 + 1;
        sql.push_str(&format!(
            "insert into prod.country_month values ({id}, {month_id}, 57);
             insert into prod.cm_econ values ({id}, {gdp}, 'n{id}');",
            gdp = id * 10
        ));
    }

    client
        .batch_execute(&sql)
        .await
        .expect("Failed to create the production schema");
}

/// Dataset at the `cm` level for ids 1, 2 and 4 with an existing `gdp` column, a new
/// `new_metric` column and a `country_id` column of another level.
pub fn econ_dataset() -> Dataset {
    Dataset::new(vec![
        DatasetColumn::new(
            "cm_id",
            vec![Cell::Integer(1), Cell::Integer(2), Cell::Integer(4)],
        ),
        DatasetColumn::new(
            "gdp",
            vec![Cell::Float(1.5), Cell::Null, Cell::Float(4.5)],
        ),
        DatasetColumn::new(
            "new_metric",
            vec![Cell::Float(0.25), Cell::Float(0.5), Cell::Float(0.75)],
        ),
        DatasetColumn::new(
            "country_id",
            vec![Cell::Integer(57), Cell::Integer(57), Cell::Integer(57)],
        ),
    ])
    .expect("Failed to build the econ dataset")
}

/// Reads `(key, value)` pairs of a double precision column, ordered by key.
pub async fn float_column(
    client: &Client,
    table: &str,
    key_column: &str,
    column: &str,
) -> Vec<(i64, Option<f64>)> {
    let rows = client
        .query(
            &format!("select {key_column}, {column} from {table} order by {key_column}"),
            &[],
        )
        .await
        .expect("Failed to read the column");

    rows.iter().map(|row| (row.get(0), row.get(1))).collect()
}

/// Reads `(key, value)` pairs of a text column, ordered by key.
pub async fn text_column(
    client: &Client,
    table: &str,
    key_column: &str,
    column: &str,
) -> Vec<(i64, Option<String>)> {
    let rows = client
        .query(
            &format!("select {key_column}, {column} from {table} order by {key_column}"),
            &[],
        )
        .await
        .expect("Failed to read the column");

    rows.iter().map(|row| (row.get(0), row.get(1))).collect()
}

/// Returns the staging tables left in the `public` schema.
pub async fn leftover_staging_tables(client: &Client) -> Vec<String> {
    let rows = client
        .query(
            "select table_name::text from information_schema.tables \
             where table_schema = 'public' and table_name like 'tbl\\_%'",
            &[],
        )
        .await
        .expect("Failed to list staging tables");

    rows.iter().map(|row| row.get(0)).collect()
}
