//! Column-major tabular datasets handed to a writer session.

use std::collections::HashSet;

use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};
use crate::types::{Cell, SemanticType};

/// A named column of an incoming dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetColumn {
    pub name: String,
    pub cells: Vec<Cell>,
}

impl DatasetColumn {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// Infers the common semantic type of the non-null cells, see [`SemanticType::widen`].
    pub fn infer_type(&self) -> Option<SemanticType> {
        self.cells
            .iter()
            .filter_map(Cell::semantic_type)
            .reduce(SemanticType::widen)
    }

    /// Rewrites every cell to the common type of the column, so that a column mixing `2` and
    /// `2.5` is staged as floats.
    fn unify_types(&mut self) {
        let Some(common) = self.infer_type() else {
            return;
        };

        let mixed = self
            .cells
            .iter()
            .any(|cell| cell.semantic_type().is_some_and(|cell_type| cell_type != common));
        if mixed {
            self.cells = std::mem::take(&mut self.cells)
                .into_iter()
                .map(|cell| cell.widened_to(common))
                .collect();
        }
    }
}

/// Tabular panel data, stored column by column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    columns: Vec<DatasetColumn>,
    row_count: usize,
}

impl Dataset {
    /// Builds a dataset, rejecting ragged columns and names that collide once stripped and
    /// lower-cased.
    ///
    /// Columns holding values of several types are widened to their common type.
    pub fn new(mut columns: Vec<DatasetColumn>) -> IngestResult<Dataset> {
        let row_count = columns.first().map(|column| column.cells.len()).unwrap_or(0);

        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.cells.len() != row_count {
                bail!(
                    ErrorKind::InvalidData,
                    "Dataset columns have different lengths",
                    format!(
                        "Column '{}' has {} rows, expected {row_count}",
                        column.name,
                        column.cells.len()
                    )
                );
            }

            if !seen.insert(column.name.trim().to_lowercase()) {
                bail!(
                    ErrorKind::InvalidData,
                    "Dataset contains duplicate columns",
                    format!("Column '{}' appears more than once", column.name)
                );
            }
        }

        for column in columns.iter_mut() {
            column.unify_types();
        }

        Ok(Dataset { columns, row_count })
    }

    /// Parses a JSON array of records into a dataset.
    ///
    /// Columns follow the order in which keys are first seen, missing keys are null. Strings
    /// are kept as text, including ones that look like dates.
    pub fn from_json_records(json: &str) -> IngestResult<Dataset> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Array(records) = value else {
            bail!(
                ErrorKind::InvalidData,
                "Dataset must be a JSON array of records"
            );
        };

        let mut names: Vec<String> = Vec::new();
        let mut columns: Vec<Vec<Cell>> = Vec::new();

        for (row, record) in records.iter().enumerate() {
            let Value::Object(fields) = record else {
                bail!(
                    ErrorKind::InvalidData,
                    "Dataset record is not a JSON object",
                    format!("Record {row} is {record}")
                );
            };

            for (key, value) in fields {
                let index = match names.iter().position(|name| name == key) {
                    Some(index) => index,
                    None => {
                        names.push(key.clone());
                        columns.push(vec![Cell::Null; row]);
                        names.len() - 1
                    }
                };
                columns[index].push(Cell::from_json(value));
            }

            for cells in columns.iter_mut() {
                if cells.len() == row {
                    cells.push(Cell::Null);
                }
            }
        }

        let columns = names
            .into_iter()
            .zip(columns)
            .map(|(name, cells)| DatasetColumn::new(name, cells))
            .collect();

        Dataset::new(columns)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[DatasetColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&DatasetColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Returns the cells of row `index`, in column order.
    pub fn row(&self, index: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.columns.iter().map(move |column| &column.cells[index])
    }

    /// Strips and lower-cases every column name.
    pub(crate) fn normalize_column_names(&mut self) {
        for column in self.columns.iter_mut() {
            column.name = column.name.trim().to_lowercase();
        }
    }

    /// Drops identifier columns of other levels, i.e. every column containing `_id` except
    /// `keep`.
    pub(crate) fn drop_foreign_ids(&mut self, keep: &str) -> Vec<String> {
        let mut dropped = Vec::new();
        self.columns.retain(|column| {
            let foreign = column.name != keep && column.name.contains("_id");
            if foreign {
                dropped.push(column.name.clone());
            }
            !foreign
        });

        dropped
    }

    /// Returns a copy of the dataset with columns renamed positionally.
    pub(crate) fn renamed(&self, names: &[String]) -> IngestResult<Dataset> {
        if names.len() != self.columns.len() {
            bail!(
                ErrorKind::InvalidState,
                "Column rename does not cover the dataset",
                format!(
                    "Got {} names for {} columns",
                    names.len(),
                    self.columns.len()
                )
            );
        }

        let columns = self
            .columns
            .iter()
            .zip(names)
            .map(|(column, name)| DatasetColumn::new(name.clone(), column.cells.clone()))
            .collect();

        Dataset::new(columns)
    }

    /// Checks that `id_column` exists and holds unique, non-null integers.
    ///
    /// Integral floats are accepted and rewritten as integers.
    pub(crate) fn validate_key(&mut self, id_column: &str) -> IngestResult<()> {
        let Some(column) = self
            .columns
            .iter_mut()
            .find(|column| column.name == id_column)
        else {
            bail!(
                ErrorKind::KeyConstraintViolation,
                "Canonical id column is missing",
                format!("The dataset has no '{id_column}' column")
            );
        };

        let mut keys = Vec::with_capacity(column.cells.len());
        for (row, cell) in column.cells.iter().enumerate() {
            if cell.is_null() {
                bail!(
                    ErrorKind::KeyConstraintViolation,
                    "Canonical id column contains nulls",
                    format!("'{id_column}' is null at row {row}")
                );
            }

            let Some(key) = cell.as_key() else {
                bail!(
                    ErrorKind::KeyConstraintViolation,
                    "Canonical id column is not an integer",
                    format!("'{id_column}' holds {cell:?} at row {row}")
                );
            };
            keys.push(key);
        }

        let mut seen = HashSet::with_capacity(keys.len());
        if let Some(duplicate) = keys.iter().find(|key| !seen.insert(**key)) {
            bail!(
                ErrorKind::KeyConstraintViolation,
                "Canonical id column is not unique",
                format!("'{id_column}' contains {duplicate} more than once")
            );
        }

        column.cells = keys.into_iter().map(Cell::Integer).collect();

        Ok(())
    }
}
