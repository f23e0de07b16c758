//! Dataset loading, cleaning and CSV export using Polars

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::AnalyticsError;

/// Primary location of the growth dataset
pub const PRIMARY_DATA_PATH: &str = "wppool_growth_data_sample_20k.csv";
/// Location tried when the primary path does not exist
pub const FALLBACK_DATA_PATH: &str = "data/wppool_growth_data_sample_20k.csv";

/// Cell texts read as missing, matching the usual CSV null spellings
const MISSING_MARKERS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Header names every input file must carry, in export order
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "user_id",
    "country",
    "subscription_type",
    "plan_type",
    "total_sessions",
    "page_views",
    "days_active",
    "monthly_revenue",
    "churned",
];

/// One user of the growth dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub user_id: String,
    pub country: String,
    pub subscription_type: String,
    /// Only meaningful for Pro subscribers
    pub plan_type: Option<String>,
    pub total_sessions: f64,
    pub page_views: f64,
    /// Whole days in the source; an imputed median may be fractional
    pub days_active: f64,
    pub monthly_revenue: f64,
    pub churned: Option<bool>,
}

impl Record {
    fn row_key(&self) -> RowKey<'_> {
        RowKey {
            text: [&self.user_id, &self.country, &self.subscription_type],
            plan_type: self.plan_type.as_deref(),
            numbers: [
                float_key(self.total_sessions),
                float_key(self.page_views),
                float_key(self.days_active),
                float_key(self.monthly_revenue),
            ],
            churned: self.churned,
        }
    }
}

/// Hashable view of a record used for exact-duplicate detection
#[derive(PartialEq, Eq, Hash)]
struct RowKey<'a> {
    text: [&'a str; 3],
    plan_type: Option<&'a str>,
    numbers: [u64; 4],
    churned: Option<bool>,
}

fn float_key(value: f64) -> u64 {
    // +0.0 and -0.0 compare equal
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

/// Numeric columns of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NumericColumn {
    TotalSessions,
    PageViews,
    DaysActive,
    MonthlyRevenue,
    /// 0/1 coded churn flag
    Churned,
}

impl NumericColumn {
    pub const ALL: [NumericColumn; 5] = [
        NumericColumn::TotalSessions,
        NumericColumn::PageViews,
        NumericColumn::DaysActive,
        NumericColumn::MonthlyRevenue,
        NumericColumn::Churned,
    ];

    /// Columns whose missing cells are filled with the column median
    const MEDIAN_IMPUTED: [NumericColumn; 3] = [
        NumericColumn::TotalSessions,
        NumericColumn::PageViews,
        NumericColumn::DaysActive,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::TotalSessions => "total_sessions",
            Self::PageViews => "page_views",
            Self::DaysActive => "days_active",
            Self::MonthlyRevenue => "monthly_revenue",
            Self::Churned => "churned",
        }
    }

    pub fn value(self, record: &Record) -> Option<f64> {
        match self {
            Self::TotalSessions => Some(record.total_sessions),
            Self::PageViews => Some(record.page_views),
            Self::DaysActive => Some(record.days_active),
            Self::MonthlyRevenue => Some(record.monthly_revenue),
            Self::Churned => record.churned.map(|c| if c { 1.0 } else { 0.0 }),
        }
    }
}

/// Categorical columns of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoricalColumn {
    Country,
    SubscriptionType,
    PlanType,
}

impl CategoricalColumn {
    pub fn name(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::SubscriptionType => "subscription_type",
            Self::PlanType => "plan_type",
        }
    }

    /// Category of the record; empty cells count as missing
    pub fn value(self, record: &Record) -> Option<&str> {
        let value = match self {
            Self::Country => Some(record.country.as_str()),
            Self::SubscriptionType => Some(record.subscription_type.as_str()),
            Self::PlanType => record.plan_type.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Ordered list of candidate paths for the dataset file
#[derive(Debug, Clone)]
pub struct DataSource {
    candidates: Vec<PathBuf>,
}

impl Default for DataSource {
    fn default() -> Self {
        Self::new(PRIMARY_DATA_PATH, FALLBACK_DATA_PATH)
    }
}

impl DataSource {
    pub fn new(primary: impl Into<PathBuf>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            candidates: vec![primary.into(), fallback.into()],
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// First candidate that exists on disk
    pub fn resolve(&self) -> crate::Result<PathBuf> {
        self.candidates
            .iter()
            .find(|path| path.is_file())
            .cloned()
            .ok_or_else(|| AnalyticsError::DataSourceNotFound {
                tried: self.candidates.clone(),
            })
    }
}

/// Cleaned, deduplicated and immutable snapshot of the dataset.
///
/// Built once at startup and shared by reference with every query. Nothing
/// hands out mutable access to the records after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTable {
    records: Vec<Record>,
    source: Option<PathBuf>,
}

impl CanonicalTable {
    /// Resolve the data source and load the first existing candidate
    pub fn load(source: &DataSource) -> crate::Result<Self> {
        let path = source.resolve()?;
        Self::from_path(&path)
    }

    /// Load and clean a CSV file
    ///
    /// Empty cells, the usual null spellings (`NA`, `NaN`, `null`, ...) and
    /// numbers that fail to parse are all missing. Missing `total_sessions`,
    /// `page_views` and `days_active` cells take the median of the present
    /// values of the raw file, and missing `monthly_revenue` becomes 0.
    ///
    /// Exact duplicate rows are then dropped keeping the first occurrence.
    /// Rows are compared on the nine required columns only, so two rows that
    /// differ only in an extra column of the file count as duplicates.
    ///
    /// # Arguments
    /// * `path` - CSV file with a header row carrying [`REQUIRED_COLUMNS`]
    ///
    /// # Returns
    /// * `CanonicalTable` with no missing numeric values, in file order
    ///
    /// # Errors
    /// * `Schema` when a required column is absent
    /// * `DataFormat` when the file cannot be parsed as CSV, or a
    ///   median-imputed column has no numeric value at all
    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading growth dataset");

        let raw = read_raw_frame(path)?;
        validate_schema(&raw)?;
        let raw_rows = raw.height();

        // Non-strict cast: unparsable cells become null, "NaN"-like spellings
        // that still parse as a float NaN are nulled as well
        let typed = raw
            .lazy()
            .with_columns(
                [
                    NumericColumn::TotalSessions,
                    NumericColumn::PageViews,
                    NumericColumn::DaysActive,
                    NumericColumn::MonthlyRevenue,
                ]
                .map(|c| {
                    col(c.name())
                        .cast(DataType::Float64)
                        .fill_nan(lit(NULL))
                        .alias(c.name())
                }),
            )
            .collect()?;

        for column in NumericColumn::MEDIAN_IMPUTED
            .iter()
            .chain(std::iter::once(&NumericColumn::MonthlyRevenue))
        {
            let missing = typed.column(column.name())?.null_count();
            if missing > 0 {
                debug!(column = column.name(), missing, "Imputing missing values");
            }
        }

        // Medians skip nulls, so they come from the present values only
        let mut fills: Vec<Expr> = NumericColumn::MEDIAN_IMPUTED
            .iter()
            .map(|c| col(c.name()).fill_null(col(c.name()).median()))
            .collect();
        fills.push(col(NumericColumn::MonthlyRevenue.name()).fill_null(lit(0.0)));
        let filled = typed.lazy().with_columns(fills).collect()?;

        let records = frame_to_records(&filled)?;

        // Dedup after imputation, so rows that only differed in missing cells collapse
        let (records, dropped) = drop_duplicates(records);

        info!(
            raw_rows,
            rows = records.len(),
            duplicates_dropped = dropped,
            "Growth dataset ready"
        );

        Ok(Self {
            records,
            source: Some(path.to_path_buf()),
        })
    }

    /// Build a table from already-typed records, dropping exact duplicates
    pub fn from_records(records: Vec<Record>) -> Self {
        let (records, _) = drop_duplicates(records);
        Self {
            records,
            source: None,
        }
    }

    /// Rows in file order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of rows after deduplication
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Path the table was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Sorted distinct values of a categorical column
    pub fn distinct(&self, column: CategoricalColumn) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| column.value(r))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Serialize the whole table as CSV with the canonical header
    pub fn to_csv_bytes(&self) -> crate::Result<Vec<u8>> {
        let mut df = self.to_frame()?;
        let mut buffer = Vec::new();
        CsvWriter::new(&mut buffer)
            .include_header(true)
            .finish(&mut df)?;
        Ok(buffer)
    }

    /// Write the CSV export to `path`
    pub fn export_csv(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        let bytes = self.to_csv_bytes()?;
        fs::write(path, &bytes)?;
        info!(path = %path.display(), rows = self.len(), "Exported canonical table");
        Ok(())
    }

    fn to_frame(&self) -> PolarsResult<DataFrame> {
        let rows: Vec<&Record> = self.records.iter().collect();
        records_frame(&rows)
    }
}

/// Columnar copy of `rows` in [`REQUIRED_COLUMNS`] order.
///
/// Empty categories and unknown churn flags become nulls; `churned` is 0/1 coded.
pub(crate) fn records_frame(rows: &[&Record]) -> PolarsResult<DataFrame> {
    let category = |column: CategoricalColumn| {
        Series::new(
            column.name(),
            rows.iter().map(|r| column.value(r)).collect::<Vec<_>>(),
        )
    };
    let number = |column: NumericColumn| {
        Series::new(
            column.name(),
            rows.iter().map(|r| column.value(r)).collect::<Vec<Option<f64>>>(),
        )
    };

    DataFrame::new(vec![
        Series::new(
            "user_id",
            rows.iter().map(|r| r.user_id.as_str()).collect::<Vec<_>>(),
        ),
        category(CategoricalColumn::Country),
        category(CategoricalColumn::SubscriptionType),
        category(CategoricalColumn::PlanType),
        number(NumericColumn::TotalSessions),
        number(NumericColumn::PageViews),
        number(NumericColumn::DaysActive),
        number(NumericColumn::MonthlyRevenue),
        Series::new(
            NumericColumn::Churned.name(),
            rows.iter()
                .map(|r| r.churned.map(i32::from))
                .collect::<Vec<Option<i32>>>(),
        ),
    ])
}

/// Read every column as text so malformed numbers can be nulled by a non-strict cast
fn read_raw_frame(path: &Path) -> crate::Result<DataFrame> {
    let markers = MISSING_MARKERS.iter().map(|m| m.to_string()).collect();
    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_null_values(Some(NullValues::AllColumns(markers)))
        .finish()
        .and_then(|lf| lf.collect())
        .map_err(|e| AnalyticsError::DataFormat(format!("{}: {}", path.display(), e)))
}

fn validate_schema(df: &DataFrame) -> crate::Result<()> {
    let present: HashSet<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| !present.contains(**name))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AnalyticsError::Schema { missing })
    }
}

fn frame_to_records(df: &DataFrame) -> crate::Result<Vec<Record>> {
    let user_ids = text_values(df, "user_id")?;
    let countries = text_values(df, "country")?;
    let subscriptions = text_values(df, "subscription_type")?;
    let plans = text_values(df, "plan_type")?;
    let churned = text_values(df, "churned")?;

    let sessions = filled_values(df, NumericColumn::TotalSessions)?;
    let page_views = filled_values(df, NumericColumn::PageViews)?;
    let days_active = filled_values(df, NumericColumn::DaysActive)?;
    let revenue = filled_values(df, NumericColumn::MonthlyRevenue)?;

    let records = (0..df.height())
        .map(|i| Record {
            user_id: user_ids[i].unwrap_or_default().to_string(),
            country: countries[i].unwrap_or_default().to_string(),
            subscription_type: subscriptions[i].unwrap_or_default().to_string(),
            plan_type: plans[i].filter(|p| !p.is_empty()).map(str::to_string),
            total_sessions: sessions[i],
            page_views: page_views[i],
            days_active: days_active[i],
            monthly_revenue: revenue[i],
            churned: churned[i].and_then(parse_churned),
        })
        .collect();

    Ok(records)
}

fn text_values<'a>(df: &'a DataFrame, name: &str) -> crate::Result<Vec<Option<&'a str>>> {
    Ok(df.column(name)?.str()?.into_iter().collect())
}

fn filled_values(df: &DataFrame, column: NumericColumn) -> crate::Result<Vec<f64>> {
    df.column(column.name())?
        .f64()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                AnalyticsError::DataFormat(format!(
                    "column '{}' has no numeric values to impute from",
                    column.name()
                ))
            })
        })
        .collect()
}

/// Accepts 0/1, 0.0/1.0 and true/false
fn parse_churned(cell: &str) -> Option<bool> {
    let cell = cell.trim();
    if let Ok(number) = cell.parse::<f64>() {
        return match number {
            n if n == 0.0 => Some(false),
            n if n == 1.0 => Some(true),
            _ => None,
        };
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn drop_duplicates(records: Vec<Record>) -> (Vec<Record>, usize) {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(records.len());
        records.iter().map(|r| seen.insert(r.row_key())).collect()
    };
    let before = records.len();
    let deduped: Vec<Record> = records
        .into_iter()
        .zip(keep)
        .filter_map(|(record, keep)| keep.then_some(record))
        .collect();
    let dropped = before - deduped.len();
    (deduped, dropped)
}
