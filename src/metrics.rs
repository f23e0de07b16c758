//! Summary statistics over a filtered view
//!
//! Every query builds the view's Polars frame and aggregates it lazily. Empty
//! views produce neutral values (zero, or an empty list) instead of errors.

use polars::prelude::*;

use crate::data::{CategoricalColumn, NumericColumn, Record};
use crate::filter::FilteredView;

/// Row limit for top-N style group queries
pub const DEFAULT_TOP_N: usize = 10;

/// Months per year used by the annual revenue display convention
const MONTHS_PER_YEAR: f64 = 12.0;

/// Subscription tier whose rows carry a plan type
const PRO_TIER: &str = "Pro";

/// Output column names of the aggregation queries
const VALUE: &str = "value";
const COUNT: &str = "count";
const ROW: &str = "row";

/// Percentage of a view taken by one category
#[derive(Debug, Clone, PartialEq)]
pub struct Share {
    pub category: String,
    pub count: usize,
    pub percentage: f64,
}

/// Aggregated value for one group
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: String,
    pub value: f64,
}

/// Pearson coefficient of one column against a target column
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub column: NumericColumn,
    pub coefficient: f64,
}

/// Headline metric cards
#[derive(Debug, Clone, PartialEq)]
pub struct Kpis {
    pub total_users: usize,
    /// Share of Pro subscribers, in percent
    pub pro_share: f64,
    pub monthly_revenue: f64,
    pub annual_revenue: f64,
    /// Mean churn flag, in percent
    pub churn_rate: f64,
}

/// Descriptive statistics of one numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: NumericColumn,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Monthly revenue distribution of one Pro plan
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRevenue {
    pub plan: String,
    pub revenue: ColumnSummary,
}

pub fn total_users(view: &FilteredView<'_>) -> usize {
    view.len()
}

/// Category shares of non-missing values, largest first; sums to 100
pub fn distribution(view: &FilteredView<'_>, column: CategoricalColumn) -> crate::Result<Vec<Share>> {
    let name = column.name();
    let df = view
        .frame()?
        .lazy()
        .filter(col(name).is_not_null())
        .group_by_stable([col(name)])
        .agg([len().alias(COUNT)])
        // ties keep first-appearance order
        .sort([COUNT], largest_first())
        .collect()?;

    let categories = text_column(&df, name)?;
    let counts = count_column(&df, COUNT)?;
    let total: usize = counts.iter().sum();
    if total == 0 {
        return Ok(Vec::new());
    }

    Ok(categories
        .into_iter()
        .zip(counts)
        .map(|(category, count)| Share {
            category,
            count,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect())
}

/// Percentage of one category, 0 when it does not occur
pub fn share(view: &FilteredView<'_>, column: CategoricalColumn, category: &str) -> crate::Result<f64> {
    Ok(distribution(view, column)?
        .into_iter()
        .find(|s| s.category == category)
        .map_or(0.0, |s| s.percentage))
}

/// Sum of the non-missing values of `column`
pub fn sum(view: &FilteredView<'_>, column: NumericColumn) -> crate::Result<f64> {
    Ok(scalar(view, numeric(column).sum())?.unwrap_or(0.0))
}

/// Mean of the non-missing values of `column`, 0 for an empty view
pub fn mean(view: &FilteredView<'_>, column: NumericColumn) -> crate::Result<f64> {
    Ok(scalar(view, numeric(column).mean())?.unwrap_or(0.0))
}

/// Mean of a 0/1 column as a percentage
pub fn rate(view: &FilteredView<'_>, column: NumericColumn) -> crate::Result<f64> {
    Ok(mean(view, column)? * 100.0)
}

/// Display convention: filtered monthly revenue × 12
pub fn annual_revenue(view: &FilteredView<'_>) -> crate::Result<f64> {
    Ok(sum(view, NumericColumn::MonthlyRevenue)? * MONTHS_PER_YEAR)
}

/// Sum of `value` per `group`, largest first, truncated to `n` groups
pub fn grouped_sum(
    view: &FilteredView<'_>,
    group: CategoricalColumn,
    value: NumericColumn,
    n: usize,
) -> crate::Result<Vec<Group>> {
    let df = view
        .frame()?
        .lazy()
        .filter(col(group.name()).is_not_null())
        .group_by_stable([col(group.name())])
        .agg([numeric(value).sum().alias(VALUE)])
        .sort([VALUE], largest_first())
        .limit(row_limit(n))
        .collect()?;
    groups_from(&df, group.name())
}

/// Mean of `value` per `group`, ordered by group name
pub fn grouped_mean(
    view: &FilteredView<'_>,
    group: CategoricalColumn,
    value: NumericColumn,
) -> crate::Result<Vec<Group>> {
    let df = view
        .frame()?
        .lazy()
        .filter(col(group.name()).is_not_null())
        .group_by([col(group.name())])
        .agg([numeric(value).mean().alias(VALUE)])
        .sort([group.name()], SortMultipleOptions::default())
        .collect()?;
    groups_from(&df, group.name())
}

/// Percentage rate of a 0/1 column per `group`, ordered by group name
pub fn grouped_rate(
    view: &FilteredView<'_>,
    group: CategoricalColumn,
    value: NumericColumn,
) -> crate::Result<Vec<Group>> {
    Ok(grouped_mean(view, group, value)?
        .into_iter()
        .map(|g| Group {
            value: g.value * 100.0,
            ..g
        })
        .collect())
}

/// Pearson correlation of every numeric column against `target`, ascending.
///
/// Uses pairwise-complete rows. An undefined coefficient (zero variance or
/// fewer than two pairs) is reported as 0.0.
pub fn correlation(view: &FilteredView<'_>, target: NumericColumn) -> crate::Result<Vec<Correlation>> {
    let coefficients: Vec<Expr> = NumericColumn::ALL
        .iter()
        .map(|c| pearson_corr(numeric(*c), numeric(target), 1).alias(c.name()))
        .collect();
    let df = view.frame()?.lazy().select(coefficients).collect()?;

    let mut correlations = NumericColumn::ALL
        .iter()
        .map(|&column| -> crate::Result<Correlation> {
            let coefficient = df
                .column(column.name())?
                .f64()?
                .get(0)
                .filter(|c| c.is_finite())
                .map_or(0.0, |c| c.clamp(-1.0, 1.0));
            Ok(Correlation {
                column,
                coefficient,
            })
        })
        .collect::<crate::Result<Vec<_>>>()?;
    correlations.sort_by(|a, b| a.coefficient.total_cmp(&b.coefficient));
    Ok(correlations)
}

pub fn kpis(view: &FilteredView<'_>) -> crate::Result<Kpis> {
    Ok(Kpis {
        total_users: total_users(view),
        pro_share: share(view, CategoricalColumn::SubscriptionType, PRO_TIER)?,
        monthly_revenue: sum(view, NumericColumn::MonthlyRevenue)?,
        annual_revenue: annual_revenue(view)?,
        churn_rate: rate(view, NumericColumn::Churned)?,
    })
}

/// Revenue of Pro subscribers summed by plan type, largest first
pub fn revenue_by_plan(view: &FilteredView<'_>) -> crate::Result<Vec<Group>> {
    let plan = CategoricalColumn::PlanType.name();
    let df = pro_plans(view)?
        .group_by_stable([col(plan)])
        .agg([numeric(NumericColumn::MonthlyRevenue).sum().alias(VALUE)])
        .sort([VALUE], largest_first())
        .collect()?;
    groups_from(&df, plan)
}

/// Monthly revenue distribution of Pro subscribers per plan type, ordered by plan
pub fn plan_revenue(view: &FilteredView<'_>) -> crate::Result<Vec<PlanRevenue>> {
    let plan = CategoricalColumn::PlanType.name();
    let df = pro_plans(view)?
        .group_by([col(plan)])
        .agg(summary_exprs(NumericColumn::MonthlyRevenue))
        .sort([plan], SortMultipleOptions::default())
        .collect()?;

    let plans = text_column(&df, plan)?;
    let summaries = summaries_from(&df, NumericColumn::MonthlyRevenue)?;
    Ok(plans
        .into_iter()
        .zip(summaries)
        .map(|(plan, revenue)| PlanRevenue { plan, revenue })
        .collect())
}

/// The `n` rows with the largest value in `column`; ties keep table order
pub fn top_users<'a>(
    view: &FilteredView<'a>,
    column: NumericColumn,
    n: usize,
) -> crate::Result<Vec<&'a Record>> {
    let df = view
        .frame()?
        .lazy()
        .with_row_index(ROW, None)
        .filter(col(column.name()).is_not_null())
        .sort([column.name()], largest_first())
        .limit(row_limit(n))
        .collect()?;

    Ok(count_column(&df, ROW)?
        .into_iter()
        .filter_map(|row| view.get(row))
        .collect())
}

/// count / mean / std / min / quartiles / max for every numeric column
pub fn describe(view: &FilteredView<'_>) -> crate::Result<Vec<ColumnSummary>> {
    let frame = view.frame()?;
    let mut summary = Vec::with_capacity(NumericColumn::ALL.len());
    for column in NumericColumn::ALL {
        let df = frame
            .clone()
            .lazy()
            .select(summary_exprs(column))
            .collect()?;
        summary.extend(summaries_from(&df, column)?);
    }
    Ok(summary)
}

/// Pro rows that carry a plan type
fn pro_plans(view: &FilteredView<'_>) -> crate::Result<LazyFrame> {
    let tier = CategoricalColumn::SubscriptionType.name();
    let plan = CategoricalColumn::PlanType.name();
    Ok(view.frame()?.lazy().filter(
        col(tier)
            .eq(lit(PRO_TIER))
            .and(col(plan).is_not_null()),
    ))
}

/// Aggregations behind [`ColumnSummary`]: sample std, linear quantiles
fn summary_exprs(column: NumericColumn) -> Vec<Expr> {
    let value = numeric(column);
    vec![
        value.clone().count().alias(COUNT),
        value.clone().mean().alias("mean"),
        value.clone().std(1).alias("std"),
        value.clone().min().alias("min"),
        value
            .clone()
            .quantile(lit(0.25), QuantileInterpolOptions::Linear)
            .alias("q25"),
        value.clone().median().alias("median"),
        value
            .clone()
            .quantile(lit(0.75), QuantileInterpolOptions::Linear)
            .alias("q75"),
        value.max().alias("max"),
    ]
}

/// One summary per row of a frame aggregated with [`summary_exprs`]; null stats read as 0
fn summaries_from(df: &DataFrame, column: NumericColumn) -> crate::Result<Vec<ColumnSummary>> {
    let count = count_column(df, COUNT)?;
    let mean = float_column(df, "mean")?;
    let std = float_column(df, "std")?;
    let min = float_column(df, "min")?;
    let q25 = float_column(df, "q25")?;
    let median = float_column(df, "median")?;
    let q75 = float_column(df, "q75")?;
    let max = float_column(df, "max")?;

    Ok((0..df.height())
        .map(|i| ColumnSummary {
            column,
            count: count[i],
            mean: mean[i],
            // sample std is undefined below two values
            std: if count[i] < 2 { 0.0 } else { std[i] },
            min: min[i],
            q25: q25[i],
            median: median[i],
            q75: q75[i],
            max: max[i],
        })
        .collect())
}

/// Numeric column as floats; `churned` is stored 0/1 coded
fn numeric(column: NumericColumn) -> Expr {
    col(column.name()).cast(DataType::Float64)
}

fn largest_first() -> SortMultipleOptions {
    SortMultipleOptions::default()
        .with_order_descending(true)
        .with_maintain_order(true)
}

fn row_limit(n: usize) -> IdxSize {
    IdxSize::try_from(n).unwrap_or(IdxSize::MAX)
}

/// Single aggregate over the view; `None` when it is null
fn scalar(view: &FilteredView<'_>, expr: Expr) -> crate::Result<Option<f64>> {
    let df = view.frame()?.lazy().select([expr.alias(VALUE)]).collect()?;
    Ok(df.column(VALUE)?.cast(&DataType::Float64)?.f64()?.get(0))
}

fn groups_from(df: &DataFrame, key: &str) -> crate::Result<Vec<Group>> {
    let keys = text_column(df, key)?;
    let values = float_column(df, VALUE)?;
    Ok(keys
        .into_iter()
        .zip(values)
        .map(|(key, value)| Group { key, value })
        .collect())
}

fn text_column(df: &DataFrame, name: &str) -> crate::Result<Vec<String>> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

fn float_column(df: &DataFrame, name: &str) -> crate::Result<Vec<f64>> {
    Ok(df
        .column(name)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect())
}

fn count_column(df: &DataFrame, name: &str) -> crate::Result<Vec<usize>> {
    Ok(df
        .column(name)?
        .idx()?
        .into_iter()
        .map(|v| v.unwrap_or(0) as usize)
        .collect())
}
