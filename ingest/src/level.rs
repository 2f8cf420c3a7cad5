use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::bail;
use crate::error::{ErrorKind, IngestError};

/// Spatial and temporal granularities of the production schema.
///
/// Every level has a base table (its tablespace) whose `id` column is the canonical key, and
/// datasets at that level carry the key as `<level>_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Cm,
    Cy,
    Pgy,
    Pgm,
    M,
    Y,
    Pg,
    C,
    A,
    Am,
    Ay,
}

impl Level {
    pub const ALL: [Level; 11] = [
        Level::Cm,
        Level::Cy,
        Level::Pgy,
        Level::Pgm,
        Level::M,
        Level::Y,
        Level::Pg,
        Level::C,
        Level::A,
        Level::Am,
        Level::Ay,
    ];

    /// Short code of the level, e.g. `cm`.
    pub fn code(&self) -> &'static str {
        match self {
            Level::Cm => "cm",
            Level::Cy => "cy",
            Level::Pgy => "pgy",
            Level::Pgm => "pgm",
            Level::M => "m",
            Level::Y => "y",
            Level::Pg => "pg",
            Level::C => "c",
            Level::A => "a",
            Level::Am => "am",
            Level::Ay => "ay",
        }
    }

    /// Name of the base table holding the canonical ids of the level.
    pub fn tablespace(&self) -> &'static str {
        match self {
            Level::Cm => "country_month",
            Level::Cy => "country_year",
            Level::Pgy => "priogrid_year",
            Level::Pgm => "priogrid_month",
            Level::M => "month",
            Level::Y => "year",
            Level::Pg => "priogrid",
            Level::C => "country",
            Level::A => "actor",
            Level::Am => "actor_month",
            Level::Ay => "actor_year",
        }
    }

    /// Canonical id column of incoming datasets, `<level>_id`.
    pub fn id_column(&self) -> String {
        format!("{}_id", self.code())
    }

    /// Foreign key column pointing at the base table from child tables, `<tablespace>_id`.
    pub fn tablespace_id_column(&self) -> String {
        format!("{}_id", self.tablespace())
    }

    /// Base table column restricted by the time extent.
    pub fn time_extent_column(&self) -> Option<&'static str> {
        match self {
            Level::Am | Level::Cm | Level::Pgm => Some("month_id"),
            Level::Ay | Level::Cy | Level::Pgy => Some("year_id"),
            _ => None,
        }
    }

    /// Base table column restricted by the space extent.
    pub fn space_extent_column(&self) -> Option<&'static str> {
        match self {
            Level::Am | Level::Ay | Level::A => Some("actor_id"),
            Level::Cm | Level::Cy | Level::C => Some("country_id"),
            Level::Pgm | Level::Pgy | Level::Pg => Some("priogrid_id"),
            _ => None,
        }
    }
}

impl FromStr for Level {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_lowercase();
        match Level::ALL.into_iter().find(|level| level.code() == code) {
            Some(level) => Ok(level),
            None => bail!(
                ErrorKind::ValidationError,
                "Unknown level",
                format!("'{s}' is not one of cm, cy, pgy, pgm, m, y, pg, c, a, am, ay")
            ),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
