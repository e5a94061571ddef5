use sales_report::context::{AnalysisContext, AnalysisSettings};
use sales_report::error::AnalysisError;
use sales_report::forecast::ForecastStrategy;
use sales_report::output::export_report;
use sales_report::reports::{generate_report, StockStatus};
use sales_report::{load_and_clean, ProfitPolicy, SvgChartSink};
use std::collections::BTreeSet;
use std::io::Write;
use tempfile::NamedTempFile;

const SALES: &str = "\
Date,Product,Customer,Quantity Sold,Price
2024-01-05,Widget,ann,2,10
2024-01-18,Gadget,bob,1,15
2024-02-02,Widget,cat,50,10
2024-02-20,Gizmo,dan,45,12
2024-03-03,Widget,eve,300,10
2024-03-25,Gadget,fay,10,300
";

fn write_csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn load(settings: AnalysisSettings) -> AnalysisContext {
    let file = write_csv(SALES);
    AnalysisContext::load(file.path(), settings).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn load_derives_month_revenue_and_profit() {
    let file = write_csv(SALES);
    let (table, report) = load_and_clean(file.path(), ProfitPolicy::default()).unwrap();
    assert_eq!(table.len(), 6);
    assert_eq!(report.parse_errors, 0);
    assert_eq!(report.derived, vec!["Month", "Revenue", "Profit"]);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_and_clean(dir.path().join("absent.csv"), ProfitPolicy::default());
    assert!(result.is_err());
}

#[test]
fn kpis_over_the_whole_file() {
    let kpis = load(AnalysisSettings::default()).kpis().unwrap();
    assert!(approx(kpis.total_revenue, 7075.0));
    assert!(approx(kpis.total_profit, 1415.0));
    assert!(approx(kpis.average_monthly_sales, 7075.0 / 3.0));
    assert_eq!(kpis.top_product, "Widget");
}

#[test]
fn monthly_forecast_follows_file_order() {
    let ctx = load(AnalysisSettings {
        forecast: ForecastStrategy::RollingMean { window: 2 },
        ..AnalysisSettings::default()
    });
    let points = ctx.forecast().unwrap();
    let periods: Vec<&str> = points.iter().map(|p| p.period.as_str()).collect();
    assert_eq!(periods, vec!["January", "February", "March"]);
    let forecast: Vec<f64> = points.iter().map(|p| p.forecast).collect();
    assert!(approx(forecast[0], 35.0));
    assert!(approx(forecast[1], 537.5));
    assert!(approx(forecast[2], 3520.0));
}

#[test]
fn customers_split_into_spend_tiers() {
    let segmentation = load(AnalysisSettings::default()).segments().unwrap();
    let expected: BTreeSet<BTreeSet<String>> = [["ann", "bob"], ["cat", "dan"], ["eve", "fay"]]
        .iter()
        .map(|pair| pair.iter().map(|s| s.to_string()).collect())
        .collect();
    assert_eq!(segmentation.partition(), expected);
}

#[test]
fn inventory_bands_each_product() {
    let items = load(AnalysisSettings::default()).inventory().unwrap();
    let summary: Vec<(&str, StockStatus)> = items
        .iter()
        .map(|i| (i.product.as_str(), i.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Widget", StockStatus::FastMoving),
            ("Gadget", StockStatus::SlowMoving),
            ("Gizmo", StockStatus::Optimal),
        ]
    );
}

#[test]
fn full_report_is_exported() {
    let ctx = load(AnalysisSettings::default());
    let bundle = generate_report(&ctx, &SvgChartSink::default());
    assert!(bundle.skipped.is_empty());
    assert_eq!(bundle.charts.len(), 3);

    let out = tempfile::tempdir().unwrap();
    let written = export_report(out.path(), &bundle).unwrap();
    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "kpi.json",
            "monthly_revenue.csv",
            "forecast.csv",
            "segments.csv",
            "inventory.csv",
            "monthly_revenue.svg",
            "revenue_trend.svg",
            "customer_segments.svg",
        ]
    );
    let svg = std::fs::read_to_string(out.path().join("monthly_revenue.svg")).unwrap();
    assert!(svg.contains("<svg"));
    let inventory = std::fs::read_to_string(out.path().join("inventory.csv")).unwrap();
    assert!(inventory.contains("Gadget,11,Slow-moving"));
}

#[test]
fn file_without_sales_figures_cannot_produce_kpis() {
    let file = write_csv("Date,Product,Customer\n2024-01-05,Widget,ann\n");
    let ctx = AnalysisContext::load(file.path(), AnalysisSettings::default()).unwrap();
    assert_eq!(
        ctx.kpis(),
        Err(AnalysisError::MissingColumns(vec![
            "Revenue".into(),
            "Profit".into()
        ]))
    );

    let bundle = generate_report(&ctx, &SvgChartSink::default());
    assert!(bundle.kpis.is_none());
    assert!(bundle.charts.is_empty());
    assert!(!bundle.skipped.is_empty());
}

#[test]
fn email_keyed_file_with_numeric_product_codes() {
    let file = write_csv(
        "\
Date,Product,Customer Email,Quantity Sold,Price
2024-01-05,007,ann@example.com,1,10
2024-01-06,7,bob@example.com,1,12
2024-02-01,007,cat@example.com,10,50
2024-02-02,7,dan@example.com,10,52
2024-03-01,007,eve@example.com,100,90
2024-03-02,7,fay@example.com,100,91
",
    );
    let ctx = AnalysisContext::load(file.path(), AnalysisSettings::default()).unwrap();

    let items = ctx.inventory().unwrap();
    let products: Vec<&str> = items.iter().map(|i| i.product.as_str()).collect();
    assert_eq!(products, vec!["007", "7"]);

    let segmentation = ctx.segments().unwrap();
    assert_eq!(segmentation.assignments.len(), 6);
    assert!(segmentation.partition().contains(
        &["ann@example.com", "bob@example.com"]
            .iter()
            .map(|s| s.to_string())
            .collect::<BTreeSet<String>>()
    ));
}
