//! Country / subscription filtering over the canonical table

use std::collections::BTreeSet;

use polars::prelude::DataFrame;
use tracing::debug;

use crate::data::{records_frame, CanonicalTable, CategoricalColumn, Record};

/// Number of sorted countries selected by the default filter
pub const DEFAULT_COUNTRY_COUNT: usize = 5;

/// Set-membership filter on country and subscription type.
///
/// An empty set selects nothing in that dimension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSpec {
    pub countries: BTreeSet<String>,
    pub subscription_types: BTreeSet<String>,
}

impl FilterSpec {
    pub fn new<C, S>(countries: C, subscription_types: S) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            countries: countries.into_iter().map(Into::into).collect(),
            subscription_types: subscription_types.into_iter().map(Into::into).collect(),
        }
    }

    /// First [`DEFAULT_COUNTRY_COUNT`] sorted countries and every subscription type
    pub fn default_for(table: &CanonicalTable) -> Self {
        let countries = table
            .distinct(CategoricalColumn::Country)
            .into_iter()
            .take(DEFAULT_COUNTRY_COUNT);
        Self::new(countries, table.distinct(CategoricalColumn::SubscriptionType))
    }

    /// Every country and subscription type present in the table
    pub fn all(table: &CanonicalTable) -> Self {
        Self::new(
            table.distinct(CategoricalColumn::Country),
            table.distinct(CategoricalColumn::SubscriptionType),
        )
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.countries.contains(&record.country)
            && self.subscription_types.contains(&record.subscription_type)
    }
}

/// Rows of a canonical table matching a [`FilterSpec`], in table order.
///
/// Borrows the table; holds only row indices.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    table: &'a CanonicalTable,
    /// `None` for the unfiltered view
    spec: Option<FilterSpec>,
    rows: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    /// Unfiltered view over every row, including rows with empty categories
    pub fn full(table: &'a CanonicalTable) -> Self {
        Self {
            table,
            spec: None,
            rows: (0..table.len()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn table(&self) -> &'a CanonicalTable {
        self.table
    }

    /// Filter that produced the view; every returned row matches it
    pub fn spec(&self) -> Option<&FilterSpec> {
        self.spec.as_ref()
    }

    /// `i`-th row of the view
    pub fn get(&self, i: usize) -> Option<&'a Record> {
        let records = self.table.records();
        self.rows.get(i).map(|&row| &records[row])
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let records = self.table.records();
        self.rows.iter().map(move |&i| &records[i])
    }

    /// Polars frame of the view's rows, used by the aggregation queries
    pub fn frame(&self) -> crate::Result<DataFrame> {
        let rows: Vec<&Record> = self.iter().collect();
        Ok(records_frame(&rows)?)
    }
}

/// Select the rows of `table` matching `spec`
///
/// # Arguments
/// * `table` - Canonical table, borrowed for the lifetime of the view
/// * `spec` - Country and subscription sets; an empty set selects nothing
///
/// # Returns
/// * `FilteredView` holding the matching row indices in table order
pub fn apply<'a>(table: &'a CanonicalTable, spec: &FilterSpec) -> FilteredView<'a> {
    let rows: Vec<usize> = table
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| spec.matches(record))
        .map(|(i, _)| i)
        .collect();

    debug!(
        countries = spec.countries.len(),
        subscription_types = spec.subscription_types.len(),
        rows = rows.len(),
        "Applied filter"
    );

    FilteredView {
        table,
        spec: Some(spec.clone()),
        rows,
    }
}
