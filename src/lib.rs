//! growth-lens: exploratory analytics over user growth metrics
//!
//! The canonical table is loaded and cleaned once with Polars, then every
//! request filters it by country and subscription type and derives KPIs,
//! grouped statistics, churn correlations and K-Means personas from the
//! filtered view.

pub mod cli;
pub mod data;
pub mod error;
pub mod filter;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod report;
pub mod simulate;

// Re-export public items for easier access
pub use cli::{Args, Section};
pub use data::{CanonicalTable, CategoricalColumn, DataSource, NumericColumn, Record};
pub use error::AnalyticsError;
pub use filter::{apply, FilterSpec, FilteredView};
pub use model::{segment, PersonaAssignment, Segmentation, PERSONA_FEATURES, PERSONA_LABELS};
pub use report::Dashboard;
pub use simulate::{simulate, Scenario};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, AnalyticsError>;
