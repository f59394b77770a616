//! KPI computation over cleaned rows.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{read_rows, CurativoRow, KpiError, KpiResult};
use crate::store::BlobStore;

/// Ranking depth of the top-N KPIs.
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusShare {
    pub status: String,
    pub count: u64,
    /// Share of rows with a status, 0-100, two decimals
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUsage {
    pub product: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRevenue {
    pub status: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRevenue {
    pub product: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientUsage {
    pub client: String,
    pub count: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySales {
    /// `YYYY-MM`
    pub month: String,
    pub count: u64,
    pub revenue: f64,
}

/// All KPIs for one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiReport {
    pub row_count: u64,
    pub status_distribution: Vec<StatusShare>,
    pub top_products: Vec<ProductUsage>,
    pub revenue_by_status: Vec<StatusRevenue>,
    pub top_revenue_products: Vec<ProductRevenue>,
    pub top_clients: Vec<ClientUsage>,
    /// Percent of rows whose pump was not found
    pub loss_rate: f64,
    /// Mean days from procedure to usage confirmation over finalized rows
    pub avg_invoicing_days: f64,
    pub monthly_sales: Vec<MonthlySales>,
    /// Last modification of the source, when it could be looked up
    pub last_modified: Option<String>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Counts and sums per key, remembering first appearance for stable ties.
#[derive(Default)]
struct Tally {
    order: Vec<String>,
    index: HashMap<String, usize>,
    counts: Vec<u64>,
    sums: Vec<f64>,
}

impl Tally {
    fn add(&mut self, key: &str, value: f64) {
        let key = key.trim();
        if key.is_empty() {
            return;
        }
        let i = match self.index.get(key) {
            Some(i) => *i,
            None => {
                self.order.push(key.to_string());
                self.counts.push(0);
                self.sums.push(0.0);
                self.index.insert(key.to_string(), self.order.len() - 1);
                self.order.len() - 1
            }
        };
        self.counts[i] += 1;
        self.sums[i] += value;
    }

    /// `(key, count, sum)` by count descending; ties keep first appearance.
    fn by_count(self) -> Vec<(String, u64, f64)> {
        let mut rows: Vec<_> = self
            .order
            .into_iter()
            .zip(self.counts)
            .zip(self.sums)
            .map(|((k, c), s)| (k, c, s))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }

    /// `(key, count, sum)` by sum descending; ties keep first appearance.
    fn by_sum(self) -> Vec<(String, u64, f64)> {
        let mut rows: Vec<_> = self
            .order
            .into_iter()
            .zip(self.counts)
            .zip(self.sums)
            .map(|((k, c), s)| (k, c, s))
            .collect();
        rows.sort_by(|a, b| b.2.total_cmp(&a.2));
        rows
    }
}

/// Share of each status label among rows that have one.
pub fn status_distribution(rows: &[CurativoRow]) -> Vec<StatusShare> {
    let mut tally = Tally::default();
    for row in rows {
        tally.add(&row.status, 0.0);
    }
    let ranked = tally.by_count();
    let total: u64 = ranked.iter().map(|r| r.1).sum();

    ranked
        .into_iter()
        .map(|(status, count, _)| StatusShare {
            status,
            count,
            percent: round2(count as f64 * 100.0 / total as f64),
        })
        .collect()
}

/// Most used products.
pub fn top_products(rows: &[CurativoRow]) -> Vec<ProductUsage> {
    let mut tally = Tally::default();
    for row in rows.iter().filter(|r| r.is_usage()) {
        tally.add(&row.product, 0.0);
    }
    tally
        .by_count()
        .into_iter()
        .take(TOP_N)
        .map(|(product, count, _)| ProductUsage { product, count })
        .collect()
}

/// Quoted value summed per status, ordered by label.
pub fn revenue_by_status(rows: &[CurativoRow]) -> Vec<StatusRevenue> {
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for row in rows {
        let status = row.status.trim();
        if !status.is_empty() {
            *sums.entry(status.to_string()).or_insert(0.0) += row.quoted_value;
        }
    }
    sums.into_iter()
        .map(|(status, revenue)| StatusRevenue {
            status,
            revenue: round2(revenue),
        })
        .collect()
}

/// Highest-revenue products among finalized rows.
pub fn top_revenue_products(rows: &[CurativoRow]) -> Vec<ProductRevenue> {
    let mut tally = Tally::default();
    for row in rows.iter().filter(|r| r.is_finalized()) {
        tally.add(&row.product, row.quoted_value);
    }
    tally
        .by_sum()
        .into_iter()
        .take(TOP_N)
        .map(|(product, _, revenue)| ProductRevenue {
            product,
            revenue: round2(revenue),
        })
        .collect()
}

/// Clients with the most usage, with their summed revenue.
pub fn top_clients(rows: &[CurativoRow]) -> Vec<ClientUsage> {
    let mut tally = Tally::default();
    for row in rows.iter().filter(|r| r.is_usage()) {
        tally.add(&row.client, row.quoted_value);
    }
    tally
        .by_count()
        .into_iter()
        .take(TOP_N)
        .map(|(client, count, revenue)| ClientUsage {
            client,
            count,
            revenue: round2(revenue),
        })
        .collect()
}

/// Percent of all rows marked not found; 0 for an empty sheet.
pub fn loss_rate(rows: &[CurativoRow]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let lost = rows.iter().filter(|r| r.is_loss()).count();
    round2(lost as f64 * 100.0 / rows.len() as f64)
}

/// Mean invoicing latency in days over finalized rows with both dates.
pub fn avg_invoicing_days(rows: &[CurativoRow]) -> f64 {
    let days: Vec<i64> = rows
        .iter()
        .filter(|r| r.is_finalized())
        .filter_map(CurativoRow::invoicing_days)
        .collect();
    if days.is_empty() {
        return 0.0;
    }
    round2(days.iter().sum::<i64>() as f64 / days.len() as f64)
}

/// Usage count and revenue per procedure month.
pub fn monthly_sales(rows: &[CurativoRow]) -> Vec<MonthlySales> {
    let mut months: BTreeMap<String, (u64, f64)> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.is_usage()) {
        let Some(date) = row.procedure_date else {
            continue;
        };
        let slot = months.entry(date.format("%Y-%m").to_string()).or_insert((0, 0.0));
        slot.0 += 1;
        slot.1 += row.quoted_value;
    }
    months
        .into_iter()
        .map(|(month, (count, revenue))| MonthlySales {
            month,
            count,
            revenue: round2(revenue),
        })
        .collect()
}

/// Compute every KPI from cleaned rows.
pub fn build_report(rows: &[CurativoRow]) -> KpiReport {
    KpiReport {
        row_count: rows.len() as u64,
        status_distribution: status_distribution(rows),
        top_products: top_products(rows),
        revenue_by_status: revenue_by_status(rows),
        top_revenue_products: top_revenue_products(rows),
        top_clients: top_clients(rows),
        loss_rate: loss_rate(rows),
        avg_invoicing_days: avg_invoicing_days(rows),
        monthly_sales: monthly_sales(rows),
        last_modified: None,
    }
}

/// Analyze a sheet export.
pub fn analyze(bytes: &[u8]) -> KpiResult<KpiReport> {
    let rows = read_rows(bytes)?;
    let report = build_report(&rows);
    info!(
        rows = report.row_count,
        loss_rate = report.loss_rate,
        "analyzed curativo sheet"
    );
    Ok(report)
}

/// Download and analyze the sheet stored at `path`.
///
/// The last-modified lookup is best-effort; its failure only leaves
/// `last_modified` empty.
pub fn analyze_from_store(blobs: &dyn BlobStore, path: &str) -> KpiResult<KpiReport> {
    let (folder, name) = path.rsplit_once('/').unwrap_or(("", path));
    let last_modified = match blobs.list(folder) {
        Ok(entries) => entries
            .into_iter()
            .find(|e| e.name == name)
            .map(|e| e.last_modified),
        Err(e) => {
            warn!(path, error = %e, "could not read source timestamp");
            None
        }
    };

    let bytes = blobs
        .download(path)?
        .ok_or_else(|| KpiError::SourceNotFound(path.to_string()))?;

    let mut report = analyze(&bytes)?;
    report.last_modified = last_modified;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use chrono::NaiveDate;

    fn row(status: &str, product: &str, client: &str, value: f64) -> CurativoRow {
        CurativoRow {
            procedure_date: None,
            confirmation_date: None,
            quoted_value: value,
            status: status.into(),
            product: product.into(),
            client: client.into(),
        }
    }

    #[test]
    fn test_status_distribution_ties_keep_order() {
        let rows = vec![
            row("Pendente", "P", "C", 0.0),
            row("Utilizado", "P", "C", 0.0),
            row("Finalizado", "P", "C", 0.0),
            row("Utilizado", "P", "C", 0.0),
            row("", "P", "C", 0.0),
        ];
        let dist = status_distribution(&rows);
        let labels: Vec<_> = dist.iter().map(|s| s.status.as_str()).collect();
        assert_eq!(labels, vec!["Utilizado", "Pendente", "Finalizado"]);
        assert_eq!(dist[0].percent, 50.0);
        assert_eq!(dist[1].percent, 25.0);
    }

    #[test]
    fn test_top_products_only_usage() {
        let mut rows = Vec::new();
        for (i, product) in ["A", "B", "C", "D", "E", "F"].iter().enumerate() {
            for _ in 0..=i {
                rows.push(row("Utilizado", product, "X", 1.0));
            }
        }
        rows.push(row("Não Encontrado", "A", "X", 1.0));
        rows.push(row("Não Encontrado", "A", "X", 1.0));

        let top = top_products(&rows);
        assert_eq!(top.len(), TOP_N);
        assert_eq!(top[0], ProductUsage { product: "F".into(), count: 6 });
        assert_eq!(top[4].product, "B");
    }

    #[test]
    fn test_revenue_and_clients() {
        let rows = vec![
            row("Finalizado", "Gaze", "H1", 100.456),
            row("Finalizado", "Espuma", "H2", 300.0),
            row("Utilizado", "Gaze", "H1", 50.0),
            row("Utilizado", "Filme", "H2", 10.0),
            row("Utilizado", "Filme", "H1", 10.0),
        ];

        let by_status = revenue_by_status(&rows);
        assert_eq!(by_status[0], StatusRevenue { status: "Finalizado".into(), revenue: 400.46 });
        assert_eq!(by_status[1].revenue, 70.0);

        let products = top_revenue_products(&rows);
        assert_eq!(products[0].product, "Espuma");
        assert_eq!(products.len(), 2);

        let clients = top_clients(&rows);
        assert_eq!(clients[0], ClientUsage { client: "H1".into(), count: 3, revenue: 160.46 });
    }

    #[test]
    fn test_loss_rate_empty() {
        assert_eq!(loss_rate(&[]), 0.0);
        assert_eq!(avg_invoicing_days(&[]), 0.0);
        let report = build_report(&[]);
        assert!(report.status_distribution.is_empty());
        assert!(report.monthly_sales.is_empty());
    }

    #[test]
    fn test_latency_and_monthly() {
        let d = |m: u32, day: u32| NaiveDate::from_ymd_opt(2024, m, day);
        let mut a = row("Finalizado", "P", "C", 10.0);
        a.procedure_date = d(1, 10);
        a.confirmation_date = d(1, 14);
        let mut b = row("Finalizado", "P", "C", 20.0);
        b.procedure_date = d(2, 1);
        b.confirmation_date = d(2, 3);
        let mut c = row("Utilizado", "P", "C", 5.0);
        c.procedure_date = d(2, 20);
        c.confirmation_date = d(3, 20);
        let no_date = row("Finalizado", "P", "C", 7.0);

        let rows = vec![a, b, c, no_date];
        assert_eq!(avg_invoicing_days(&rows), 3.0);

        let monthly = monthly_sales(&rows);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0], MonthlySales { month: "2024-01".into(), count: 1, revenue: 10.0 });
        assert_eq!(monthly[1], MonthlySales { month: "2024-02".into(), count: 2, revenue: 25.0 });
    }

    #[test]
    fn test_analyze_from_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        let csv = "Dt Procedime,Dt Apont Uti,Valor Cotado,Status Utili,Desc Produto,Nome Cli\n\
                   01/02/2024,03/02/2024,100,Finalizado,Gaze,H1\n";
        store.upload("analise/bdcurativo.csv", csv.as_bytes(), "text/csv", true).unwrap();

        let report = analyze_from_store(&store, "analise/bdcurativo.csv").unwrap();
        assert_eq!(report.row_count, 1);
        assert!(report.last_modified.is_some());

        let err = analyze_from_store(&store, "analise/missing.csv").unwrap_err();
        assert!(matches!(err, KpiError::SourceNotFound(_)));
    }
}
