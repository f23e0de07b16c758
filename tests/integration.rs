//! Integration tests for growth-lens

use std::io::Write;

use growth_lens::metrics::{self, DEFAULT_TOP_N};
use growth_lens::{
    apply, segment, simulate, AnalyticsError, CanonicalTable, CategoricalColumn, DataSource,
    FilterSpec, FilteredView, NumericColumn, PERSONA_FEATURES,
};
use tempfile::{tempdir, NamedTempFile};

/// Create a test CSV file with sample data
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "user_id,country,subscription_type,plan_type,total_sessions,page_views,days_active,monthly_revenue,churned"
    )
    .unwrap();

    // Light users
    writeln!(file, "u01,Bangladesh,Free,,3,20,2,,1").unwrap();
    writeln!(file, "u02,Bangladesh,Free,,5,31,4,0,1").unwrap();
    writeln!(file, "u03,India,Free,,4,25,,0,0").unwrap();
    writeln!(file, "u04,India,Free,,,18,3,0,1").unwrap();

    // Engaged Pro users
    writeln!(file, "u05,USA,Pro,Basic,60,610,120,9.99,0").unwrap();
    writeln!(file, "u06,USA,Pro,Enterprise,75,720,140,49.99,0").unwrap();
    writeln!(file, "u07,Germany,Pro,Standard,66,650,110,19.99,0").unwrap();
    writeln!(file, "u08,Canada,Pro,Basic,58,590,bad,9.99,1").unwrap();

    // Mid-range users
    writeln!(file, "u09,Germany,Free,,30,300,60,0,0").unwrap();
    writeln!(file, "u10,Canada,Pro,Standard,28,280,55,19.99,0").unwrap();
    writeln!(file, "u11,Australia,Free,,32,310,58,,0").unwrap();
    writeln!(file, "u12,Brazil,Pro,Basic,35,330,65,9.99,1").unwrap();

    // Exact duplicates
    writeln!(file, "u05,USA,Pro,Basic,60,610,120,9.99,0").unwrap();
    writeln!(file, "u09,Germany,Free,,30,300,60,0,0").unwrap();

    file
}

fn load() -> (NamedTempFile, CanonicalTable) {
    let file = create_test_csv();
    let table = CanonicalTable::from_path(file.path()).unwrap();
    (file, table)
}

#[test]
fn test_end_to_end_pipeline() {
    let (_file, table) = load();

    // Cleaning
    assert_eq!(table.len(), 12);
    assert!(table
        .records()
        .iter()
        .all(|r| r.total_sessions >= 0.0 && r.days_active >= 0.0));

    // Default filter: first five sorted countries, all subscriptions
    let spec = FilterSpec::default_for(&table);
    let countries: Vec<&str> = spec.countries.iter().map(String::as_str).collect();
    assert_eq!(countries, vec!["Australia", "Bangladesh", "Brazil", "Canada", "Germany"]);

    let view = apply(&table, &spec);
    assert_eq!(view.len(), 8);
    assert!(view.iter().all(|r| spec.matches(r)));

    // Metrics
    let kpis = metrics::kpis(&view).unwrap();
    assert_eq!(kpis.total_users, 8);
    assert!((kpis.pro_share - 50.0).abs() < 1e-9);
    assert!((kpis.annual_revenue - kpis.monthly_revenue * 12.0).abs() < 1e-9);

    // Segmentation
    let segmentation = segment(&view, &PERSONA_FEATURES, 3).unwrap();
    assert_eq!(segmentation.assignments().len(), view.len());
    assert!(segmentation.assignments().iter().all(|a| a.cluster_id < 3));
    assert_eq!(segmentation.cluster_sizes().iter().sum::<usize>(), view.len());

    // Simulation on global aggregates
    let all = FilteredView::full(&table);
    let scenario = simulate(
        20.14,
        10.0,
        metrics::total_users(&all),
        metrics::mean(&all, NumericColumn::MonthlyRevenue).unwrap(),
    )
    .unwrap();
    assert_eq!(scenario.extra_users, 0); // 12 users × 2.014% rounds down
    assert_eq!(scenario.extra_revenue, 0.0);
}

#[test]
fn test_imputation() {
    let (_file, table) = load();
    let find = |id: &str| table.records().iter().find(|r| r.user_id == id).unwrap();

    // total_sessions: 13 present values across the 14 raw rows, u04 missing
    // 3,5,4,60,75,66,58,30,28,32,35,60,30 -> median 32
    assert_eq!(find("u04").total_sessions, 32.0);

    // days_active: u03 missing, u08 malformed
    // sorted: 2,3,4,55,58,60,60,65,110,120,120,140 -> median 60
    assert_eq!(find("u03").days_active, 60.0);
    assert_eq!(find("u08").days_active, 60.0);

    assert_eq!(find("u01").monthly_revenue, 0.0);
    assert_eq!(find("u11").monthly_revenue, 0.0);
}

#[test]
fn test_load_is_deterministic() {
    let (file, table) = load();
    let again = CanonicalTable::from_path(file.path()).unwrap();
    assert_eq!(table, again);
}

#[test]
fn test_export_round_trip() {
    let (_file, table) = load();
    let dir = tempdir().unwrap();
    let path = dir.path().join("growth_report.csv");

    table.export_csv(&path).unwrap();
    let reloaded = CanonicalTable::from_path(&path).unwrap();
    assert_eq!(reloaded.records(), table.records());
    assert_eq!(reloaded.to_csv_bytes().unwrap(), table.to_csv_bytes().unwrap());
}

#[test]
fn test_fallback_source() {
    let file = create_test_csv();
    let dir = tempdir().unwrap();
    let source = DataSource::new(dir.path().join("missing.csv"), file.path());

    let table = CanonicalTable::load(&source).unwrap();
    assert_eq!(table.len(), 12);

    let nowhere = DataSource::new(dir.path().join("a.csv"), dir.path().join("b.csv"));
    assert!(matches!(
        CanonicalTable::load(&nowhere),
        Err(AnalyticsError::DataSourceNotFound { .. })
    ));
}

#[test]
fn test_schema_error() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "user_id,country,total_sessions").unwrap();
    writeln!(file, "1,USA,4").unwrap();

    let err = CanonicalTable::from_path(file.path()).unwrap_err();
    assert!(matches!(err, AnalyticsError::Schema { .. }));
    assert!(!err.is_recoverable());
}

#[test]
fn test_disjoint_filter_is_neutral() {
    let (_file, table) = load();
    let view = apply(&table, &FilterSpec::new(["Bangladesh"], ["Pro"]));

    assert_eq!(metrics::total_users(&view), 0);
    assert_eq!(metrics::sum(&view, NumericColumn::MonthlyRevenue).unwrap(), 0.0);
    assert_eq!(metrics::rate(&view, NumericColumn::Churned).unwrap(), 0.0);
    assert!(metrics::grouped_sum(
        &view,
        CategoricalColumn::Country,
        NumericColumn::MonthlyRevenue,
        DEFAULT_TOP_N
    )
    .unwrap()
    .is_empty());

    let err = segment(&view, &PERSONA_FEATURES, 2).unwrap_err();
    assert!(matches!(err, AnalyticsError::InsufficientData(_)));
    assert!(err.is_recoverable());
}

#[test]
fn test_distribution_sums_to_hundred() {
    let (_file, table) = load();
    let spec = FilterSpec::all(&table);
    let view = apply(&table, &spec);

    for column in [
        CategoricalColumn::Country,
        CategoricalColumn::SubscriptionType,
        CategoricalColumn::PlanType,
    ] {
        let total: f64 = metrics::distribution(&view, column)
            .unwrap()
            .iter()
            .map(|s| s.percentage)
            .sum();
        assert!((total - 100.0).abs() < 1e-9, "{:?} sums to {}", column, total);
    }
}

#[test]
fn test_segmentation_is_deterministic() {
    let (_file, table) = load();
    let view = FilteredView::full(&table);

    let first = segment(&view, &PERSONA_FEATURES, 3).unwrap();
    let second = segment(&view, &PERSONA_FEATURES, 3).unwrap();
    assert_eq!(first.assignments(), second.assignments());
}

#[test]
fn test_error_handling_invalid_parameters() {
    let (_file, table) = load();
    let view = FilteredView::full(&table);

    for k in [1, 6] {
        assert!(matches!(
            segment(&view, &PERSONA_FEATURES, k),
            Err(AnalyticsError::InvalidParameter(_))
        ));
    }

    let single = apply(&table, &FilterSpec::new(["Australia"], ["Free"]));
    assert_eq!(single.len(), 1);
    assert!(matches!(
        segment(&single, &PERSONA_FEATURES, 2),
        Err(AnalyticsError::InsufficientData(_))
    ));

    assert!(matches!(
        simulate(20.14, 51.0, 100, 1.0),
        Err(AnalyticsError::InvalidParameter(_))
    ));
}

#[test]
fn test_reference_scenario() {
    let scenario = simulate(20.14, 10.0, 10_000, 5.0).unwrap();
    assert!((scenario.new_rate - 22.154).abs() < 1e-9);
    assert_eq!(scenario.extra_users, 201);
    assert_eq!(scenario.extra_revenue, 1005.0);
}

#[test]
fn test_churn_correlation() {
    let (_file, table) = load();
    let view = FilteredView::full(&table);

    let correlations = metrics::correlation(&view, NumericColumn::Churned).unwrap();
    assert_eq!(correlations.len(), NumericColumn::ALL.len());
    assert!(correlations
        .windows(2)
        .all(|w| w[0].coefficient <= w[1].coefficient));
    // light users churn more
    let sessions = correlations
        .iter()
        .find(|c| c.column == NumericColumn::TotalSessions)
        .unwrap();
    assert!(sessions.coefficient < 0.0);
}
