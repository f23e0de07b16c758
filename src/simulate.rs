//! What-if conversion scenario arithmetic

use crate::error::AnalyticsError;

/// Pro conversion rate, in percent, the scenario builds on
pub const BASELINE_CONVERSION_RATE: f64 = 20.14;

pub const DEFAULT_IMPROVEMENT_PCT: f64 = 10.0;
pub const MIN_IMPROVEMENT_PCT: f64 = 1.0;
pub const MAX_IMPROVEMENT_PCT: f64 = 50.0;

/// Projected outcome of a conversion-rate improvement
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Improved conversion rate, in percent
    pub new_rate: f64,
    /// Additional converted users
    pub extra_users: u64,
    /// Additional monthly revenue
    pub extra_revenue: f64,
}

/// Project the users and revenue gained by a relative conversion improvement
///
/// `improvement_pct` is relative: 10 turns a 20% rate into 22%.
///
/// # Arguments
/// * `base_rate` - Current conversion rate, in percent
/// * `improvement_pct` - Relative improvement, between 1 and 50
/// * `total_users` - Users the new rate applies to
/// * `avg_revenue_per_user` - Monthly revenue each extra user brings
///
/// # Returns
/// The scenario, with extra users rounded down, or `InvalidParameter` when
/// the improvement is out of range
pub fn simulate(
    base_rate: f64,
    improvement_pct: f64,
    total_users: usize,
    avg_revenue_per_user: f64,
) -> crate::Result<Scenario> {
    if !improvement_pct.is_finite()
        || !(MIN_IMPROVEMENT_PCT..=MAX_IMPROVEMENT_PCT).contains(&improvement_pct)
    {
        return Err(AnalyticsError::InvalidParameter(format!(
            "improvement must be between {}% and {}%, got {}",
            MIN_IMPROVEMENT_PCT, MAX_IMPROVEMENT_PCT, improvement_pct
        )));
    }

    let new_rate = base_rate * (1.0 + improvement_pct / 100.0);
    let extra = (total_users as f64 * (new_rate - base_rate) / 100.0).floor();
    let extra_users = if extra > 0.0 { extra as u64 } else { 0 };
    let extra_revenue = extra_users as f64 * avg_revenue_per_user;

    Ok(Scenario {
        new_rate,
        extra_users,
        extra_revenue,
    })
}
