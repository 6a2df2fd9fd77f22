//! potential-runner: command-line runner for the market-potential engine.
//!
//! Usage:
//!   potential-runner run --input ./exports --industries 47.0,62.01 --regions Московский
//!   potential-runner run --db records.db --product custom --avg-amount 500000 --json
//!   potential-runner import --input ./exports --db records.db
//!   potential-runner stats --db records.db

use anyhow::{anyhow, bail, Result};
use potential_core::{
    config::EngineConfig,
    evaluator::CalculationParams,
    event::LogSink,
    filter::FilterCriteria,
    loader::{discover_csv_sources, import_csv_parts, RowSource, SqliteSource},
    pipeline::{Pipeline, PipelineReport},
    reference::ReferenceTables,
    store::RecordStore,
    types::ProductType,
};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

#[derive(serde::Serialize)]
struct RunOutput<'a> {
    run_id: String,
    generated_at: String,
    criteria: &'a FilterCriteria,
    segment_ab_totals: BTreeMap<String, f64>,
    report: &'a PipelineReport,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("run") => cmd_run(&args),
        Some("import") => cmd_import(&args),
        Some("stats") => cmd_stats(&args),
        Some(other) => bail!("Unknown command: {other} (expected run, import or stats)"),
        None => bail!("Usage: potential-runner <run|import|stats> [flags]"),
    }
}

fn cmd_run(args: &[String]) -> Result<()> {
    let data_dir = flag_value(args, "--data-dir").unwrap_or("./data");
    let config = EngineConfig::load(data_dir)?;
    let tables = ReferenceTables::load(data_dir)?;

    let product_type = match flag_value(args, "--product") {
        Some(p) => ProductType::parse(p).ok_or_else(|| anyhow!("Unknown product type: {p}"))?,
        None => ProductType::default(),
    };
    let criteria = FilterCriteria::accept_all(product_type)
        .with_industries(list_flag(args, "--industries"))
        .with_revenue_brackets(list_flag(args, "--revenue"))
        .with_staff_brackets(list_flag(args, "--staff"))
        .with_regions(list_flag(args, "--regions"));

    let mut params = CalculationParams::default();
    if let Some(amount) = flag_value(args, "--avg-amount") {
        let amount: f64 = amount
            .parse()
            .map_err(|e| anyhow!("Invalid --avg-amount {amount}: {e}"))?;
        params = params.with_default_average_amount(amount);
    }

    let pipeline = Pipeline::new(&config, &tables);
    let mut sink = LogSink;
    let report = match (flag_value(args, "--input"), flag_value(args, "--db")) {
        (Some(dir), _) => {
            let mut sources: Vec<Box<dyn RowSource>> =
                discover_csv_sources(Path::new(dir), &config.loader, &mut sink)?
                    .into_iter()
                    .map(|s| Box::new(s) as Box<dyn RowSource>)
                    .collect();
            pipeline.run(&mut sources, &criteria, &params, &mut sink)?
        }
        (None, Some(db)) => {
            let store = RecordStore::open(db)?;
            store.migrate()?;
            let mut sources: Vec<Box<dyn RowSource + '_>> = vec![Box::new(SqliteSource::new(&store))];
            pipeline.run(&mut sources, &criteria, &params, &mut sink)?
        }
        (None, None) => bail!("run needs --input DIR or --db PATH"),
    };

    if args.iter().any(|a| a == "--json") {
        let output = RunOutput {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            criteria: &criteria,
            segment_ab_totals: report.segment_ab_totals(),
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_summary(&report, product_type);
    }
    Ok(())
}

fn cmd_import(args: &[String]) -> Result<()> {
    let (Some(dir), Some(db)) = (flag_value(args, "--input"), flag_value(args, "--db")) else {
        bail!("import needs --input DIR and --db PATH");
    };
    let data_dir = flag_value(args, "--data-dir").unwrap_or("./data");
    let config = EngineConfig::load_or_default(data_dir)?;

    let store = RecordStore::open(db)?;
    store.migrate()?;
    let imported_at = chrono::Utc::now().to_rfc3339();

    let total = import_csv_parts(Path::new(dir), &config.loader, &store, &imported_at, &mut LogSink)?;

    println!("Imported {total} rows into {db}");
    Ok(())
}

fn cmd_stats(args: &[String]) -> Result<()> {
    let db = flag_value(args, "--db").ok_or_else(|| anyhow!("stats needs --db PATH"))?;
    let store = RecordStore::open(db)?;
    store.migrate()?;

    println!("=== DATABASE ===");
    println!("  db:       {db}");
    println!("  records:  {}", store.record_count()?);
    println!();
    println!("=== TOP SEGMENTS ===");
    for (segment, count) in store.segment_counts(10)? {
        println!("  {segment:<14} {count}");
    }
    Ok(())
}

fn print_summary(report: &PipelineReport, product_type: ProductType) {
    println!("=== RUN SUMMARY ===");
    println!("  product:   {product_type}");
    println!("  records:   {}", report.filtered_count);
    println!("  segments:  {}", report.segment_metrics.len());
    println!();

    if report.segment_metrics.is_empty() {
        println!("  (No records matched the criteria)");
        return;
    }

    println!("=== SEGMENTS ===");
    for (segment, m) in &report.segment_metrics {
        println!(
            "  {segment:<12} market {:.0} | clients {:.0} | non-clients {:.0} | avg check {:.2} | revenue {:.3}M | staff {}",
            m.market_sum, m.client_sum, m.non_client_sum, m.average_check, m.average_revenue, m.average_staff
        );
    }

    println!();
    println!("=== CHANNELS ===");
    for row in &report.decision_rows {
        println!(
            "  {:<12} {:<16} {:>3} | potential {:.3}M | rate {:.1}% | ab {:.3} | total {:.3} | {}",
            row.segment,
            row.channel,
            if row.is_yes() { "yes" } else { "no" },
            row.potential_amount,
            row.rate,
            row.ab_amount,
            row.total_potential,
            row.explanation
        );
    }

    println!();
    println!("=== AB TOTALS ===");
    for (segment, total) in report.segment_ab_totals() {
        println!("  {segment:<12} {total:.3}");
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// Comma-separated flag values; absent flag means an unrestricted dimension.
fn list_flag(args: &[String], flag: &str) -> Vec<String> {
    flag_value(args, flag)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
