use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::dataset::Dataset;
use crate::reconcile::MergePolicy;
use crate::schema::CatalogColumn;
use crate::types::SemanticType;

/// System and derived columns that the existing-column merge never writes to.
pub const RESERVED_WORDS: [&str; 37] = [
    "isocc",
    "isoab",
    "iso",
    "isonum",
    "gw",
    "gwcode",
    "gwnum",
    "gwab",
    "col",
    "row",
    "gid",
    "lat",
    "latitude",
    "lon",
    "long",
    "longitude",
    "country",
    "priogrid",
    "state",
    "caplat",
    "caplon",
    "caplong",
    "start_date",
    "end_date",
    "gwdate",
    "capname",
    "in_africa",
    "in_me",
    "month",
    "start",
    "end",
    "month_start",
    "month_end",
    "centroidlat",
    "centroidlong",
    "gwsyear",
    "gweyear",
];

pub fn is_reserved(column: &str) -> bool {
    RESERVED_WORDS.contains(&column)
}

/// Normalizes a column name for matching: characters other than alphanumerics and `_` are
/// removed, the rest is lower-cased.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Where one incoming column goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub origin_name: String,
    pub destination_name: String,
    pub origin_type: Option<SemanticType>,
    pub destination_type: Option<SemanticType>,
    /// Production table holding the column, [`None`] when a new table must be created.
    pub destination_table: Option<String>,
    pub same_type: bool,
    pub is_new_table: bool,
    pub in_panel_wipe: bool,
    pub out_panel_wipe: bool,
    pub in_panel_zero: bool,
    pub out_panel_zero: bool,
}

impl ColumnMapping {
    /// Whether the column is an identifier, which is never merged as a value.
    pub fn is_id(&self) -> bool {
        self.destination_name.contains("_id")
    }
}

/// Ordered column mappings of one dataset, one per incoming column.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Recipe {
    mappings: Vec<ColumnMapping>,
}

impl Recipe {
    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Mappings without a destination table.
    pub fn new_columns(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.mappings.iter().filter(|mapping| mapping.is_new_table)
    }

    /// Mappings onto an existing destination column.
    pub fn matched_columns(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.mappings.iter().filter(|mapping| !mapping.is_new_table)
    }

    /// Destination names in dataset column order.
    pub fn destination_names(&self) -> Vec<String> {
        self.mappings
            .iter()
            .map(|mapping| mapping.destination_name.clone())
            .collect()
    }
}

/// Maps every column of `dataset` onto `catalog`.
///
/// Names are compared in normalized form and the first catalog column with a given normalized
/// name wins, so the catalog order decides between ambiguous candidates. Unmatched columns are
/// new, named after their normalized form and typed after their values.
pub fn reconcile(dataset: &Dataset, catalog: &[CatalogColumn], policy: MergePolicy) -> Recipe {
    let mut candidates: HashMap<String, &CatalogColumn> = HashMap::with_capacity(catalog.len());
    for column in catalog {
        candidates
            .entry(normalize_name(&column.column_name))
            .or_insert(column);
    }

    let mappings = dataset
        .columns()
        .iter()
        .map(|column| {
            let normalized = normalize_name(&column.name);
            let origin_type = column.infer_type();

            let (destination_name, destination_type, destination_table) =
                match candidates.get(&normalized) {
                    Some(candidate) => (
                        candidate.column_name.clone(),
                        candidate.semantic_type,
                        Some(candidate.table.clone()),
                    ),
                    None => (normalized, origin_type, None),
                };

            let mapping = ColumnMapping {
                origin_name: column.name.clone(),
                destination_name,
                origin_type,
                destination_type,
                is_new_table: destination_table.is_none(),
                destination_table,
                same_type: origin_type == destination_type,
                in_panel_wipe: policy.in_panel_wipe,
                out_panel_wipe: policy.out_panel_wipe,
                in_panel_zero: policy.in_panel_zero,
                out_panel_zero: policy.out_panel_zero,
            };

            if !mapping.is_new_table && !mapping.same_type {
                warn!(
                    column = %mapping.origin_name,
                    table = mapping.destination_table.as_deref().unwrap_or_default(),
                    origin_type = ?mapping.origin_type,
                    destination_type = ?mapping.destination_type,
                    "incoming column type differs from the destination column type"
                );
            }

            mapping
        })
        .collect();

    Recipe { mappings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetColumn;
    use crate::types::Cell;

    fn catalog_column(table: &str, name: &str, semantic_type: SemanticType) -> CatalogColumn {
        CatalogColumn {
            table: table.to_owned(),
            column_name: name.to_owned(),
            semantic_type: Some(semantic_type),
            is_primary_key: false,
        }
    }

    fn dataset() -> Dataset {
        Dataset::new(vec![
            DatasetColumn::new("cm_id", vec![Cell::Integer(1)]),
            DatasetColumn::new("gdp", vec![Cell::Integer(3)]),
            DatasetColumn::new("new_metric", vec![Cell::Float(0.5)]),
            DatasetColumn::new("Pop-Total", vec![Cell::Null]),
        ])
        .unwrap()
    }

    fn catalog() -> Vec<CatalogColumn> {
        vec![
            catalog_column("cm_econ", "country_month_id", SemanticType::Integer),
            catalog_column("cm_econ", "gdp", SemanticType::Float),
            catalog_column("cm_pop", "poptotal", SemanticType::Integer),
            catalog_column("country_month", "gdp", SemanticType::Integer),
        ]
    }

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(normalize_name("Pop-Total"), "poptotal");
        assert_eq!(normalize_name(" GDP (usd) "), "gdpusd");
        assert_eq!(normalize_name("cm_id"), "cm_id");
    }

    #[test]
    fn one_mapping_per_column_and_first_match_wins() {
        let recipe = reconcile(&dataset(), &catalog(), MergePolicy::default());

        assert_eq!(recipe.len(), 4);

        let gdp = &recipe.mappings()[1];
        assert_eq!(gdp.destination_table.as_deref(), Some("cm_econ"));
        assert_eq!(gdp.destination_type, Some(SemanticType::Float));
        assert!(!gdp.same_type);

        let pop = &recipe.mappings()[3];
        assert_eq!(pop.destination_name, "poptotal");
        assert_eq!(pop.destination_table.as_deref(), Some("cm_pop"));
        assert_eq!(pop.origin_type, None);
    }

    #[test]
    fn new_columns_are_the_unmatched_ones() {
        let recipe = reconcile(&dataset(), &catalog(), MergePolicy::default());

        let new_names: Vec<&str> = recipe
            .new_columns()
            .map(|mapping| mapping.destination_name.as_str())
            .collect();
        assert_eq!(new_names, vec!["cm_id", "new_metric"]);

        let new_metric = &recipe.mappings()[2];
        assert!(new_metric.is_new_table);
        assert!(new_metric.same_type);
        assert_eq!(new_metric.destination_type, Some(SemanticType::Float));
        assert_eq!(recipe.matched_columns().count(), 2);
    }

    #[test]
    fn policy_is_copied_onto_every_mapping() {
        let policy = MergePolicy {
            in_panel_wipe: false,
            out_panel_wipe: true,
            in_panel_zero: false,
            out_panel_zero: true,
        };

        let recipe = reconcile(&dataset(), &catalog(), policy);

        assert!(recipe.mappings().iter().all(|mapping| {
            !mapping.in_panel_wipe
                && mapping.out_panel_wipe
                && !mapping.in_panel_zero
                && mapping.out_panel_zero
        }));
    }

    #[test]
    fn reconciling_twice_is_identical() {
        let first = reconcile(&dataset(), &catalog(), MergePolicy::default());
        let second = reconcile(&dataset(), &catalog(), MergePolicy::default());

        assert_eq!(first, second);
    }

    #[test]
    fn reserved_words() {
        assert!(is_reserved("gwcode"));
        assert!(is_reserved("month"));
        assert!(!is_reserved("gdp"));
    }
}
