use serde::{Deserialize, Serialize};

use crate::level::Level;
use crate::sql::Predicate;

/// Default bounds of [`ExtentFilter::set_time_extent_range`], inclusive.
pub const DEFAULT_TIME_EXTENT_MIN: i64 = 100;
pub const DEFAULT_TIME_EXTENT_MAX: i64 = 600;

/// Restriction of a merge to a set of time ids and/or space ids.
///
/// An unset axis does not restrict anything. The filter only partitions destination rows into
/// inside and outside, incoming rows are always staged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtentFilter {
    pub time: Option<Vec<i64>>,
    pub space: Option<Vec<i64>>,
}

impl ExtentFilter {
    pub fn set_time_extent(&mut self, ids: Vec<i64>) {
        self.time = Some(ids);
    }

    /// Sets the time extent to every id in `min..=max`.
    pub fn set_time_extent_range(&mut self, min: i64, max: i64) {
        self.time = Some((min..=max).collect());
    }

    pub fn set_space_extent(&mut self, ids: Vec<i64>) {
        self.space = Some(ids);
    }

    pub fn clear(&mut self) {
        self.time = None;
        self.space = None;
    }

    /// Predicate selecting the base rows inside the extent, [`None`] when no axis applicable to
    /// `level` is set.
    pub fn inside(&self, level: Level) -> Option<Predicate> {
        let axes = [
            (level.time_extent_column(), &self.time),
            (level.space_extent_column(), &self.space),
        ];

        let predicates: Vec<Predicate> = axes
            .into_iter()
            .filter_map(|(column, ids)| match (column, ids) {
                (Some(column), Some(ids)) => Some(Predicate::AnyOf {
                    column: column.to_owned(),
                    values: ids.clone(),
                }),
                _ => None,
            })
            .collect();

        if predicates.is_empty() {
            return None;
        }

        Some(Predicate::And(predicates))
    }

    /// Predicate selecting the base rows outside the extent, [`None`] when unrestricted.
    pub fn outside(&self, level: Level) -> Option<Predicate> {
        self.inside(level).map(Predicate::negate)
    }

    pub fn is_restricted(&self, level: Level) -> bool {
        self.inside(level).is_some()
    }
}
