// Entry point and high-level CLI flow.
//
// - Loads and types the CSV once, printing load diagnostics.
// - Runs the requested analysis (or all of them for `report`) against a
//   context owned by this run, printing markdown previews.
// - `report` also renders charts and exports every table to a directory.
use anyhow::{Context, Result};
use clap::Parser;
use sales_report::cli::{Args, Command};
use sales_report::config::{Config, DEFAULT_CONFIG_FILE};
use sales_report::output::{export_report, preview_table_rows};
use sales_report::reports::{generate_report, group_rows};
use sales_report::types::ForecastRow;
use sales_report::util::{format_int, format_number};
use sales_report::{AnalysisContext, AnalysisSettings, SvgChartSink};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = Args::parse();

    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    init_logging(&args);
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args) {
        error!("run failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Handle --init-config: write the default configuration file.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
    }
    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;
    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Initialize logging; `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(args.log_level()).into())
        .from_env_lossy();

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = Config::resolve(args.config.as_deref())?;
    config.merge_with_args(&args)?;
    let rows = config.output.preview_rows;

    let ctx = handle_load(&args.input, config.settings())?;

    match &args.command {
        Some(Command::Kpi) => print_kpis(&ctx),
        Some(Command::Forecast { .. }) => print_forecast(&ctx, rows),
        Some(Command::Segment { .. }) => print_segments(&ctx, rows),
        Some(Command::Inventory) => print_inventory(&ctx, rows),
        Some(Command::Report { .. }) | None => handle_report(&ctx, config.output.dir.clone(), rows),
    }
}

/// Load and type the CSV, then print a short summary of what happened.
fn handle_load(path: &Path, settings: AnalysisSettings) -> Result<AnalysisContext> {
    let ctx = AnalysisContext::load(path, settings)?;
    let report = &ctx.load_report;
    println!(
        "Processing dataset... ({} rows loaded, {} columns)",
        format_int(report.total_rows),
        report.columns.len()
    );
    if report.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to parse errors.",
            format_int(report.parse_errors)
        );
    }
    if !report.derived.is_empty() {
        println!("Info: derived columns {}.", report.derived.join(", "));
    }
    if report.undated_rows > 0 {
        println!(
            "Info: {} rows have no parseable Date.",
            format_int(report.undated_rows)
        );
    }
    println!();
    Ok(ctx)
}

fn print_kpis(ctx: &AnalysisContext) -> Result<()> {
    let kpis = ctx.kpis().context("KPI analysis aborted")?;
    println!("Key Performance Indicators\n");
    preview_table_rows(&kpis.rows(), 4);
    Ok(())
}

fn print_forecast(ctx: &AnalysisContext, rows: usize) -> Result<()> {
    let points = ctx.forecast().context("Forecast aborted")?;
    let table: Vec<ForecastRow> = points.iter().map(|p| p.row()).collect();
    println!("Revenue Trend ({:?})\n", ctx.settings.forecast);
    preview_table_rows(&table, rows);

    if ctx.settings.horizon > 0 {
        let projection = ctx.projection().context("Projection aborted")?;
        let rendered: Vec<String> = projection.iter().map(|v| format_number(*v, 2)).collect();
        println!("Projected next {} periods: {}\n", projection.len(), rendered.join(", "));
    }
    Ok(())
}

fn print_segments(ctx: &AnalysisContext, rows: usize) -> Result<()> {
    let segments = ctx.segments().context("Segmentation aborted")?;
    println!("Customer Segments (k = {})\n", segments.clusters);
    preview_table_rows(&segments.rows(), rows);
    for (i, size) in segments.cluster_sizes().iter().enumerate() {
        println!("Segment {}: {} customers", i, format_int(*size));
    }
    println!();
    Ok(())
}

fn print_inventory(ctx: &AnalysisContext, rows: usize) -> Result<()> {
    let items = ctx.inventory().context("Inventory analysis aborted")?;
    let table: Vec<_> = items.iter().map(|i| i.row()).collect();
    println!("Inventory Movement\n");
    preview_table_rows(&table, rows);
    Ok(())
}

/// Run every analysis, print previews, and export tables and charts.
fn handle_report(ctx: &AnalysisContext, dir: PathBuf, rows: usize) -> Result<()> {
    println!("Generating reports...\n");
    let bundle = generate_report(ctx, &SvgChartSink::default());

    if let Some(kpis) = &bundle.kpis {
        println!("Key Performance Indicators\n");
        preview_table_rows(&kpis.rows(), 4);
    }
    if !bundle.monthly_revenue.is_empty() {
        println!("Revenue by {}\n", ctx.settings.period_column);
        preview_table_rows(&group_rows(&bundle.monthly_revenue), rows);
    }
    if !bundle.forecast.is_empty() {
        let table: Vec<ForecastRow> = bundle.forecast.iter().map(|p| p.row()).collect();
        println!("Revenue Trend\n");
        preview_table_rows(&table, rows);
    }
    if let Some(segments) = &bundle.segments {
        println!("Customer Segments\n");
        preview_table_rows(&segments.rows(), rows);
    }
    if !bundle.inventory.is_empty() {
        let table: Vec<_> = bundle.inventory.iter().map(|i| i.row()).collect();
        println!("Inventory Movement\n");
        preview_table_rows(&table, rows);
    }
    for skipped in &bundle.skipped {
        println!("Skipped {}: {}", skipped.section, skipped.reason);
    }

    let written = export_report(&dir, &bundle)?;
    info!(files = written.len(), "export finished");
    println!("\n(Full tables and charts exported to {})", dir.display());
    Ok(())
}
