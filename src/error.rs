//! Error taxonomy for loading and querying the growth dataset

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// None of the candidate data paths exist
    #[error("data source not found (tried: {})", display_paths(.tried))]
    DataSourceNotFound { tried: Vec<PathBuf> },

    #[error("malformed data file: {0}")]
    DataFormat(String),

    #[error("schema mismatch: missing required column(s) {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("clustering failed: {0}")]
    Clustering(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}

impl AnalyticsError {
    /// Per-request failures that reject a single query and leave the loaded table usable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidParameter(_) | Self::InsufficientData(_))
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(AnalyticsError::InvalidParameter("k".into()).is_recoverable());
        assert!(AnalyticsError::InsufficientData("rows".into()).is_recoverable());
        assert!(!AnalyticsError::DataFormat("bad".into()).is_recoverable());
        assert!(!AnalyticsError::Schema { missing: vec!["churned".into()] }.is_recoverable());
    }

    #[test]
    fn test_error_messages() {
        let err = AnalyticsError::DataSourceNotFound {
            tried: vec![PathBuf::from("a.csv"), PathBuf::from("data/a.csv")],
        };
        assert_eq!(err.to_string(), "data source not found (tried: a.csv, data/a.csv)");

        let err = AnalyticsError::Schema {
            missing: vec!["country".into(), "churned".into()],
        };
        assert_eq!(
            err.to_string(),
            "schema mismatch: missing required column(s) country, churned"
        );
    }
}
