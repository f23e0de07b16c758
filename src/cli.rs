//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::data::{CanonicalTable, DataSource, FALLBACK_DATA_PATH, PRIMARY_DATA_PATH};
use crate::filter::FilterSpec;
use crate::logging::LoggingConfig;

/// Growth analytics over user metrics: KPIs, churn, revenue and K-Means personas
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = PRIMARY_DATA_PATH)]
    pub input: PathBuf,

    /// Path tried when the input file does not exist
    #[arg(long, default_value = FALLBACK_DATA_PATH)]
    pub fallback: PathBuf,

    /// Country to include (repeatable). Defaults to the first five sorted countries
    #[arg(short, long = "country")]
    pub countries: Vec<String>,

    /// Include every country in the dataset
    #[arg(long, conflicts_with = "countries")]
    pub all_countries: bool,

    /// Subscription type to include (repeatable). Defaults to all
    #[arg(short, long = "subscription")]
    pub subscriptions: Vec<String>,

    /// Report section to print
    #[arg(long, value_enum, default_value_t = Section::Overview)]
    pub section: Section,

    /// Number of persona clusters for K-Means (2 to 5); other values are reported in the segmentation section
    #[arg(short = 'k', long, default_value = "3")]
    pub clusters: usize,

    /// Hypothetical conversion improvement, in percent
    #[arg(long, default_value = "10")]
    pub improvement: f64,

    /// Write the full cleaned dataset as CSV to this path
    #[arg(short, long)]
    pub export: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

/// Dashboard sections available from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Section {
    Overview,
    Exploration,
    Engagement,
    Segmentation,
    Churn,
    Revenue,
    Conversion,
    Market,
    All,
}

impl Section {
    /// Concrete sections in display order, expanding `All`
    pub fn expand(self) -> Vec<Section> {
        match self {
            Section::All => vec![
                Section::Overview,
                Section::Exploration,
                Section::Engagement,
                Section::Segmentation,
                Section::Churn,
                Section::Revenue,
                Section::Conversion,
                Section::Market,
            ],
            other => vec![other],
        }
    }
}

impl Args {
    pub fn data_source(&self) -> DataSource {
        DataSource::new(self.input.clone(), self.fallback.clone())
    }

    pub fn logging(&self) -> LoggingConfig {
        let filter = if self.verbose { "debug" } else { "info" };
        LoggingConfig::default()
            .with_filter(filter)
            .with_json(self.log_json)
    }

    /// Build the filter from the flags, falling back to the table defaults
    pub fn filter_spec(&self, table: &CanonicalTable) -> FilterSpec {
        let defaults = FilterSpec::default_for(table);
        let countries = if self.all_countries {
            FilterSpec::all(table).countries
        } else if self.countries.is_empty() {
            defaults.countries
        } else {
            self.countries.iter().cloned().collect()
        };
        let subscription_types = if self.subscriptions.is_empty() {
            defaults.subscription_types
        } else {
            self.subscriptions.iter().cloned().collect()
        };
        FilterSpec {
            countries,
            subscription_types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::record;

    fn create_test_table() -> CanonicalTable {
        CanonicalTable::from_records(vec![
            record("1", "USA", "Pro", 10.0, 30.0, 20.0, false),
            record("2", "Germany", "Free", 5.0, 3.0, 0.0, true),
            record("3", "Canada", "Pro", 40.0, 90.0, 50.0, false),
            record("4", "Brazil", "Free", 2.0, 1.0, 0.0, true),
            record("5", "India", "Free", 8.0, 12.0, 0.0, false),
            record("6", "Japan", "Pro", 25.0, 60.0, 20.0, false),
        ])
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["growth-lens"]);
        assert_eq!(args.input, PathBuf::from(PRIMARY_DATA_PATH));
        assert_eq!(args.fallback, PathBuf::from(FALLBACK_DATA_PATH));
        assert_eq!(args.clusters, 3);
        assert_eq!(args.improvement, 10.0);
        assert_eq!(args.section, Section::Overview);
    }

    #[test]
    fn test_filter_spec_from_flags() {
        let table = create_test_table();

        let args = Args::parse_from(["growth-lens"]);
        let spec = args.filter_spec(&table);
        assert_eq!(spec.countries.len(), 5);
        assert!(!spec.countries.contains("USA"));
        assert_eq!(spec.subscription_types.len(), 2);

        let args = Args::parse_from(["growth-lens", "-c", "USA", "-c", "Japan", "-s", "Pro"]);
        let spec = args.filter_spec(&table);
        assert_eq!(spec, FilterSpec::new(["Japan", "USA"], ["Pro"]));

        let args = Args::parse_from(["growth-lens", "--all-countries"]);
        assert_eq!(args.filter_spec(&table).countries.len(), 6);
    }

    #[test]
    fn test_out_of_range_cluster_flag_parses() {
        // range checks happen when the segmentation section runs
        let args = Args::parse_from(["growth-lens", "-k", "6"]);
        assert_eq!(args.clusters, 6);
    }

    #[test]
    fn test_section_expand() {
        assert_eq!(Section::All.expand().len(), 8);
        assert_eq!(Section::Churn.expand(), vec![Section::Churn]);

        let args = Args::parse_from(["growth-lens", "--section", "segmentation"]);
        assert_eq!(args.section, Section::Segmentation);
    }

    #[test]
    fn test_logging_config() {
        let args = Args::parse_from(["growth-lens", "-v", "--log-json"]);
        let logging = args.logging();
        assert_eq!(logging.filter, "debug");
        assert!(logging.json);
    }
}
