//! growth-lens: growth analytics dashboard for the terminal
//!
//! Loads the dataset once, applies the command-line filter and prints the
//! requested report sections.

use std::io::{self, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use growth_lens::logging::init_tracing;
use growth_lens::{filter, Args, CanonicalTable, Dashboard};
use tracing::info;

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.logging());

    let start_time = Instant::now();

    // Load errors are fatal
    let source = args.data_source();
    let table = CanonicalTable::load(&source).context("Failed to load growth dataset")?;

    if let Some(path) = &args.export {
        table
            .export_csv(path)
            .with_context(|| format!("Failed to export dataset to {}", path.display()))?;
    }

    let spec = args.filter_spec(&table);
    let view = filter::apply(&table, &spec);
    info!(
        rows = view.len(),
        countries = spec.countries.len(),
        subscription_types = spec.subscription_types.len(),
        "Filter applied"
    );

    let dashboard = Dashboard::new(&table, view, args.clusters, args.improvement);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    dashboard.render(args.section, &mut out)?;
    out.flush()?;

    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Report complete"
    );

    Ok(())
}
