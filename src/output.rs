use crate::reports::{group_rows, ReportBundle};
use crate::types::ForecastRow;
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Markdown table of the first `max_rows` rows.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_table(rows, max_rows));
    if rows.len() > max_rows {
        println!("({} more rows)\n", rows.len() - max_rows);
    }
}

fn slug(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Write every populated section of `bundle` into `dir`. Returns the files
/// written, in order.
pub fn export_report(dir: &Path, bundle: &ReportBundle) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let mut written = Vec::new();

    if let Some(kpis) = &bundle.kpis {
        let path = dir.join("kpi.json");
        write_json(&path, kpis)?;
        written.push(path);
    }
    if !bundle.monthly_revenue.is_empty() {
        let path = dir.join("monthly_revenue.csv");
        write_csv(&path, &group_rows(&bundle.monthly_revenue))?;
        written.push(path);
    }
    if !bundle.forecast.is_empty() {
        let path = dir.join("forecast.csv");
        let rows: Vec<ForecastRow> = bundle.forecast.iter().map(|p| p.row()).collect();
        write_csv(&path, &rows)?;
        written.push(path);
    }
    if let Some(segments) = &bundle.segments {
        let path = dir.join("segments.csv");
        write_csv(&path, &segments.rows())?;
        written.push(path);
    }
    if !bundle.inventory.is_empty() {
        let path = dir.join("inventory.csv");
        let rows: Vec<_> = bundle.inventory.iter().map(|i| i.row()).collect();
        write_csv(&path, &rows)?;
        written.push(path);
    }
    for chart in &bundle.charts {
        let path = dir.join(format!("{}.{}", slug(&chart.title), chart.extension));
        std::fs::write(&path, &chart.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    info!(dir = %dir.display(), files = written.len(), "report exported");
    Ok(written)
}
