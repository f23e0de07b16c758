//! Plain-text dashboard sections printed by the CLI

use std::io::Write;

use crate::cli::Section;
use crate::data::{CanonicalTable, CategoricalColumn, NumericColumn};
use crate::filter::FilteredView;
use crate::metrics::{self, Group, DEFAULT_TOP_N};
use crate::model::{segment, PERSONA_FEATURES};
use crate::simulate::{simulate, BASELINE_CONVERSION_RATE};

/// Rows shown by the data exploration preview
const PREVIEW_ROWS: usize = 10;

/// Everything one request needs: the shared table, the filtered view and the tunables
pub struct Dashboard<'a> {
    table: &'a CanonicalTable,
    view: FilteredView<'a>,
    clusters: usize,
    improvement_pct: f64,
}

impl<'a> Dashboard<'a> {
    pub fn new(
        table: &'a CanonicalTable,
        view: FilteredView<'a>,
        clusters: usize,
        improvement_pct: f64,
    ) -> Self {
        Self {
            table,
            view,
            clusters,
            improvement_pct,
        }
    }

    /// Write one section. Rejected parameters and too-small views are reported inline.
    pub fn render(&self, section: Section, out: &mut impl Write) -> crate::Result<()> {
        for section in section.expand() {
            match section {
                Section::Overview => self.overview(out)?,
                Section::Exploration => self.exploration(out)?,
                Section::Engagement => self.engagement(out)?,
                Section::Segmentation => self.segmentation(out)?,
                Section::Churn => self.churn(out)?,
                Section::Revenue => self.revenue(out)?,
                Section::Conversion => self.conversion(out)?,
                Section::Market => self.market(out)?,
                Section::All => unreachable!("expand() never yields All"),
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn overview(&self, out: &mut impl Write) -> crate::Result<()> {
        header(out, "Overview")?;
        self.kpi_cards(out)?;

        subheader(out, "Revenue Contribution by Plan Type")?;
        groups(out, &metrics::revenue_by_plan(&self.view)?, money)?;

        subheader(out, "Top Performers (Countries)")?;
        let top = metrics::grouped_sum(
            &self.view,
            CategoricalColumn::Country,
            NumericColumn::MonthlyRevenue,
            DEFAULT_TOP_N,
        )?;
        groups(out, &top, money)?;

        subheader(out, "Key Takeaways")?;
        let countries = match self.view.spec() {
            Some(spec) => spec.countries.len(),
            None => self.table.distinct(CategoricalColumn::Country).len(),
        };
        writeln!(
            out,
            "Currently analyzing {} users across {} countries.",
            thousands(metrics::total_users(&self.view) as f64),
            countries
        )?;
        Ok(())
    }

    fn exploration(&self, out: &mut impl Write) -> crate::Result<()> {
        header(out, "Data Exploration")?;

        subheader(out, "Filtered Data Inspection")?;
        writeln!(
            out,
            "  {:<10} {:<14} {:<6} {:<10} {:>8} {:>8} {:>6} {:>9} {:>7}",
            "user_id", "country", "sub", "plan", "sessions", "views", "days", "revenue", "churned"
        )?;
        for r in self.view.iter().take(PREVIEW_ROWS) {
            writeln!(
                out,
                "  {:<10} {:<14} {:<6} {:<10} {:>8.0} {:>8.0} {:>6.0} {:>9.2} {:>7}",
                r.user_id,
                r.country,
                r.subscription_type,
                r.plan_type.as_deref().unwrap_or("-"),
                r.total_sessions,
                r.page_views,
                r.days_active,
                r.monthly_revenue,
                r.churned.map_or("-".to_string(), |c| u8::from(c).to_string()),
            )?;
        }

        subheader(out, "Statistical Summary")?;
        writeln!(
            out,
            "  {:<16} {:>7} {:>10} {:>10} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
        )?;
        for s in metrics::describe(&self.view)? {
            writeln!(
                out,
                "  {:<16} {:>7} {:>10.2} {:>10.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2} {:>9.2}",
                s.column.name(),
                s.count,
                s.mean,
                s.std,
                s.min,
                s.q25,
                s.median,
                s.q75,
                s.max
            )?;
        }

        subheader(out, "Subscription Mix")?;
        for share in metrics::distribution(&self.view, CategoricalColumn::SubscriptionType)? {
            writeln!(out, "  {:<24} {:>6.2}%", share.category, share.percentage)?;
        }
        Ok(())
    }

    fn engagement(&self, out: &mut impl Write) -> crate::Result<()> {
        header(out, "User Engagement")?;

        subheader(out, "Average Sessions by Subscription")?;
        let by_sub = metrics::grouped_mean(
            &self.view,
            CategoricalColumn::SubscriptionType,
            NumericColumn::TotalSessions,
        )?;
        groups(out, &by_sub, |v| format!("{:.1}", v))?;

        subheader(out, "Top Countries by Sessions")?;
        let by_country = metrics::grouped_sum(
            &self.view,
            CategoricalColumn::Country,
            NumericColumn::TotalSessions,
            DEFAULT_TOP_N,
        )?;
        groups(out, &by_country, thousands)?;

        subheader(out, "Top 10 High-Activity Users")?;
        for r in metrics::top_users(&self.view, NumericColumn::TotalSessions, DEFAULT_TOP_N)? {
            writeln!(
                out,
                "  {:<12} {:>8.0}  {:<6} {}",
                r.user_id, r.total_sessions, r.subscription_type, r.country
            )?;
        }
        Ok(())
    }

    fn segmentation(&self, out: &mut impl Write) -> crate::Result<()> {
        header(out, "User Persona Discovery (K-Means)")?;

        let segmentation = match segment(&self.view, &PERSONA_FEATURES, self.clusters) {
            Ok(segmentation) => segmentation,
            Err(e) if e.is_recoverable() => {
                writeln!(out, "  Segmentation unavailable: {}", e)?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        writeln!(
            out,
            "  Discovered {} personas from {} users (features: {})",
            segmentation.k(),
            self.view.len(),
            PERSONA_FEATURES.map(|f| f.name()).join(", ")
        )?;

        subheader(out, "Persona Distribution")?;
        for (persona, count) in segmentation.persona_counts() {
            let pct = count as f64 / self.view.len() as f64 * 100.0;
            writeln!(out, "  {:<20} {:>8} ({:.1}%)", persona, count, pct)?;
        }

        subheader(out, "Cluster Centroids (standardized)")?;
        writeln!(out, "  Cluster | Sessions | Days Active")?;
        writeln!(out, "  --------|----------|------------")?;
        for (i, centroid) in segmentation.centroids().outer_iter().enumerate() {
            writeln!(out, "  {:7} | {:8.2} | {:11.2}", i, centroid[0], centroid[1])?;
        }

        writeln!(out)?;
        writeln!(out, "  K-Means inertia: {:.4}", segmentation.inertia())?;
        writeln!(
            out,
            "  Note: persona labels follow cluster order and may change between filters."
        )?;
        Ok(())
    }

    fn churn(&self, out: &mut impl Write) -> crate::Result<()> {
        header(out, "Churn Analysis")?;

        subheader(out, "Churn Rate per Segment")?;
        let by_sub = metrics::grouped_rate(
            &self.view,
            CategoricalColumn::SubscriptionType,
            NumericColumn::Churned,
        )?;
        groups(out, &by_sub, percent)?;

        subheader(out, "Feature Correlation with Churn")?;
        for c in metrics::correlation(&self.view, NumericColumn::Churned)? {
            writeln!(out, "  {:<16} {:>7.3}", c.column.name(), c.coefficient)?;
        }
        Ok(())
    }

    fn revenue(&self, out: &mut impl Write) -> crate::Result<()> {
        header(out, "Revenue Trends")?;
        self.kpi_cards(out)?;

        subheader(out, "Revenue by Country (Selected Filter)")?;
        let by_country = metrics::grouped_sum(
            &self.view,
            CategoricalColumn::Country,
            NumericColumn::MonthlyRevenue,
            usize::MAX,
        )?;
        groups(out, &by_country, money)?;

        subheader(out, "Monthly Revenue Distribution by Pro Plan")?;
        let plans = metrics::plan_revenue(&self.view)?;
        if plans.is_empty() {
            writeln!(out, "  (no data for the current filter)")?;
            return Ok(());
        }
        writeln!(
            out,
            "  {:<14} {:>7} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "plan", "users", "min", "25%", "median", "75%", "max"
        )?;
        for p in plans {
            let r = &p.revenue;
            writeln!(
                out,
                "  {:<14} {:>7} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
                p.plan, r.count, r.min, r.q25, r.median, r.q75, r.max
            )?;
        }
        Ok(())
    }

    fn conversion(&self, out: &mut impl Write) -> crate::Result<()> {
        header(out, "A/B Testing Simulator")?;

        // scenario inputs come from the whole dataset, not the filter
        let all = FilteredView::full(self.table);
        let result = simulate(
            BASELINE_CONVERSION_RATE,
            self.improvement_pct,
            metrics::total_users(&all),
            metrics::mean(&all, NumericColumn::MonthlyRevenue)?,
        );

        match result {
            Ok(scenario) => {
                writeln!(out, "  Baseline Conv. Rate     {:.2}%", BASELINE_CONVERSION_RATE)?;
                writeln!(out, "  Improvement             {}%", self.improvement_pct)?;
                writeln!(out, "  New Conv. Rate          {:.2}%", scenario.new_rate)?;
                writeln!(out, "  Additional Pro Users    +{}", scenario.extra_users)?;
                writeln!(out, "  Monthly Revenue Impact  +{}", money(scenario.extra_revenue))?;
            }
            Err(e) if e.is_recoverable() => {
                writeln!(out, "  Scenario rejected: {}", e)?;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn market(&self, out: &mut impl Write) -> crate::Result<()> {
        header(out, "Global Footprint")?;

        subheader(out, "Revenue by Country (All Users)")?;
        let all = FilteredView::full(self.table);
        let by_country = metrics::grouped_sum(
            &all,
            CategoricalColumn::Country,
            NumericColumn::MonthlyRevenue,
            usize::MAX,
        )?;
        groups(out, &by_country, money)?;
        Ok(())
    }

    fn kpi_cards(&self, out: &mut impl Write) -> crate::Result<()> {
        let kpis = metrics::kpis(&self.view)?;
        writeln!(out, "  Total Users     {}", thousands(kpis.total_users as f64))?;
        writeln!(out, "  Pro Conversion  {:.2}%", kpis.pro_share)?;
        writeln!(out, "  Annual Revenue  {}", money_whole(kpis.annual_revenue))?;
        writeln!(out, "  Avg Churn       {:.1}%", kpis.churn_rate)?;
        Ok(())
    }
}

fn header(out: &mut impl Write, title: &str) -> std::io::Result<()> {
    writeln!(out, "=== {} ===", title)
}

fn subheader(out: &mut impl Write, title: &str) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", title)
}

fn groups(out: &mut impl Write, rows: &[Group], format: impl Fn(f64) -> String) -> std::io::Result<()> {
    if rows.is_empty() {
        return writeln!(out, "  (no data for the current filter)");
    }
    for g in rows {
        writeln!(out, "  {:<24} {:>16}", g.key, format(g.value))?;
    }
    Ok(())
}

fn percent(value: f64) -> String {
    format!("{:.1}%", value)
}

fn money(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, group_digits(whole), cents)
}

fn money_whole(value: f64) -> String {
    format!("${}", thousands(value.round()))
}

/// Rounded integer with comma separators
fn thousands(value: f64) -> String {
    let sign = if value <= -0.5 { "-" } else { "" };
    format!("{}{}", sign, group_digits(&format!("{:.0}", value.abs())))
}

fn group_digits(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
