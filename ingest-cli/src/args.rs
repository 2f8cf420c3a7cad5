use clap::{ArgAction, Parser};
use ingest::level::Level;
use ingest::reconcile::MergePolicy;
use std::path::PathBuf;

/// Merges a tabular dataset into the production schema.
#[derive(Parser, Debug)]
#[command(name = "ingester", author, version, about, long_about = None)]
pub struct Args {
    /// Level of analysis of the dataset, e.g. `cm` or `pgy`.
    #[arg(long)]
    pub level: Level,

    /// JSON file holding an array of records.
    #[arg(long)]
    pub data: PathBuf,

    /// Name of the table receiving columns unknown to the schema.
    #[arg(long, required_unless_present = "dry_run")]
    pub table: Option<String>,

    /// Replace an existing table with the requested name instead of prefixing the new one.
    #[arg(long)]
    pub overwrite: bool,

    /// Comma separated time ids restricting the merge.
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["time_min", "time_max"])]
    pub time_extent: Option<Vec<i64>>,

    /// First time id of an inclusive range restricting the merge.
    #[arg(long, requires = "time_max")]
    pub time_min: Option<i64>,

    /// Last time id of an inclusive range restricting the merge.
    #[arg(long, requires = "time_min")]
    pub time_max: Option<i64>,

    /// Comma separated space ids restricting the merge.
    #[arg(long, value_delimiter = ',')]
    pub space_extent: Option<Vec<i64>>,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub in_panel_wipe: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    pub out_panel_wipe: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub in_panel_zero: bool,

    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    pub out_panel_zero: bool,

    /// Only reconcile the dataset and print the resulting recipe.
    #[arg(long)]
    pub dry_run: bool,
}

impl Args {
    pub fn policy(&self) -> MergePolicy {
        MergePolicy {
            in_panel_wipe: self.in_panel_wipe,
            out_panel_wipe: self.out_panel_wipe,
            in_panel_zero: self.in_panel_zero,
            out_panel_zero: self.out_panel_zero,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_merge_policy() {
        let args = Args::try_parse_from([
            "ingester", "--level", "CM", "--data", "data.json", "--table", "econ",
        ])
        .unwrap();

        assert_eq!(args.level, Level::Cm);
        assert_eq!(args.policy(), MergePolicy::default());
        assert!(!args.overwrite);
        assert!(args.time_extent.is_none());
    }

    #[test]
    fn extents_and_policy_flags_are_parsed() {
        let args = Args::try_parse_from([
            "ingester",
            "--level",
            "pgy",
            "--data",
            "data.json",
            "--dry-run",
            "--time-extent",
            "1,2,3",
            "--space-extent",
            "57",
            "--in-panel-zero",
            "false",
        ])
        .unwrap();

        assert_eq!(args.time_extent, Some(vec![1, 2, 3]));
        assert_eq!(args.space_extent, Some(vec![57]));
        assert!(!args.policy().in_panel_zero);
        assert!(args.table.is_none());
    }

    #[test]
    fn table_is_required_outside_dry_runs() {
        let result = Args::try_parse_from(["ingester", "--level", "cm", "--data", "data.json"]);

        assert!(result.is_err());
    }

    #[test]
    fn time_range_requires_both_bounds() {
        let result = Args::try_parse_from([
            "ingester", "--level", "cm", "--data", "d.json", "--table", "t", "--time-min", "100",
        ]);

        assert!(result.is_err());
    }
}
