//! Print the curativo KPIs for a local workbook or sheet export.
//!
//! Usage: `curativo-report <bdcurativo.xlsx | export.csv> [--json]`

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pump_tracker_core::kpi::{analyze, KpiReport};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut path = None;
    let mut json = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            _ if path.is_none() => path = Some(arg),
            _ => bail!("unexpected argument: {arg}"),
        }
    }
    let Some(path) = path else {
        bail!("usage: curativo-report <bdcurativo.xlsx | export.csv> [--json]");
    };

    let bytes = std::fs::read(&path).with_context(|| format!("reading {path}"))?;
    let report = analyze(&bytes).with_context(|| format!("analyzing {path}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &KpiReport) {
    println!("Rows: {}", report.row_count);

    println!("\nStatus distribution (%)");
    for share in &report.status_distribution {
        println!("  {:<24} {:>6} {:>8.2}", share.status, share.count, share.percent);
    }

    println!("\nTop products by usage");
    for p in &report.top_products {
        println!("  {:<40} {:>6}", p.product, p.count);
    }

    println!("\nRevenue by status");
    for r in &report.revenue_by_status {
        println!("  {:<24} {:>14.2}", r.status, r.revenue);
    }

    println!("\nTop products by revenue (finalized)");
    for p in &report.top_revenue_products {
        println!("  {:<40} {:>14.2}", p.product, p.revenue);
    }

    println!("\nTop clients by usage");
    for c in &report.top_clients {
        println!("  {:<40} {:>6} {:>14.2}", c.client, c.count, c.revenue);
    }

    println!("\nLoss rate: {:.2}%", report.loss_rate);
    println!("Average invoicing latency: {:.2} days", report.avg_invoicing_days);

    println!("\nMonthly sales");
    for m in &report.monthly_sales {
        println!("  {}  {:>6} {:>14.2}", m.month, m.count, m.revenue);
    }
}
