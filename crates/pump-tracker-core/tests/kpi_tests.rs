//! Spreadsheet KPI engine integration tests.

use pump_tracker_core::kpi::{analyze, analyze_from_store, KpiError, DEFAULT_SOURCE_PATH};
use pump_tracker_core::store::{BlobStore, SqliteStore};

const HEADER: &str = "Dt Procedime,Dt Apont Uti,Valor Cotado,Status Utili,Desc Produto,Nome Cli";

fn sheet(rows: &[&str]) -> Vec<u8> {
    let mut text = String::from(HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.push('\n');
    text.into_bytes()
}

/// Ten rows: three quoted as "- 0", seven with numbers.
fn scenario_five() -> Vec<u8> {
    sheet(&[
        "02/01/2024,05/01/2024,100,Finalizado,Curativo Prata,Hospital A",
        "03/01/2024,04/01/2024,200,Finalizado,Curativo Prata,Hospital B",
        "10/01/2024,,- 0,Utilizado,Espuma,Hospital A",
        "15/01/2024,,50.5,Utilizado,Espuma,Hospital A",
        "01/02/2024,11/02/2024,\"1.000,00\",Finalizado,Hidrocoloide,Hospital C",
        "02/02/2024,,- 0,Não Encontrado,Espuma,Hospital B",
        "05/02/2024,,75,Pendente,Filme,Hospital C",
        "06/02/2024,,- 0,Pendente,Filme,Hospital C",
        ",,25,Utilizado,Filme,Hospital A",
        "07/02/2024,,10,Cancelado,Filme,Hospital B",
    ])
}

#[test]
fn test_scenario_five_placeholders_count_as_zero() {
    let report = analyze(&scenario_five()).unwrap();

    assert_eq!(report.row_count, 10);
    let total: f64 = report.revenue_by_status.iter().map(|r| r.revenue).sum();
    assert!((total - 1460.5).abs() < 1e-9);

    // Placeholder rows are still counted
    let pending = report
        .status_distribution
        .iter()
        .find(|s| s.status == "Pendente")
        .unwrap();
    assert_eq!(pending.count, 2);
    assert_eq!(pending.percent, 20.0);
}

#[test]
fn test_scenario_five_kpis() {
    let report = analyze(&scenario_five()).unwrap();

    assert_eq!(report.loss_rate, 10.0);
    // (3 + 1 + 10) / 3
    assert_eq!(report.avg_invoicing_days, 4.67);

    assert_eq!(report.top_products[0].product, "Curativo Prata");
    assert_eq!(report.top_products[0].count, 2);
    assert_eq!(report.top_products[1].product, "Espuma");

    assert_eq!(report.top_revenue_products[0].product, "Hidrocoloide");
    assert_eq!(report.top_revenue_products[0].revenue, 1000.0);

    let top_client = &report.top_clients[0];
    assert_eq!(top_client.client, "Hospital A");
    assert_eq!(top_client.count, 4);
    assert_eq!(top_client.revenue, 175.5);

    let months: Vec<_> = report.monthly_sales.iter().map(|m| m.month.as_str()).collect();
    assert_eq!(months, vec!["2024-01", "2024-02"]);
    assert_eq!(report.monthly_sales[0].count, 4);
    assert_eq!(report.monthly_sales[0].revenue, 350.5);
    assert_eq!(report.monthly_sales[1].count, 1);
}

#[test]
fn test_distribution_sums_to_hundred() {
    let inputs = [
        scenario_five(),
        sheet(&[
            "01/01/2024,,1,A,P,C",
            "01/01/2024,,1,B,P,C",
            "01/01/2024,,1,C,P,C",
        ]),
        sheet(&[
            "01/01/2024,,1,A,P,C",
            "01/01/2024,,1,A,P,C",
            "01/01/2024,,1,B,P,C",
            "01/01/2024,,1,C,P,C",
            "01/01/2024,,1,D,P,C",
            "01/01/2024,,1,E,P,C",
            "01/01/2024,,1,F,P,C",
        ]),
    ];
    for bytes in inputs {
        let report = analyze(&bytes).unwrap();
        let sum: f64 = report.status_distribution.iter().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() <= 0.1, "sum was {sum}");
    }
}

#[test]
fn test_empty_sheet() {
    let report = analyze(&sheet(&[])).unwrap();
    assert_eq!(report.row_count, 0);
    assert_eq!(report.loss_rate, 0.0);
    assert_eq!(report.avg_invoicing_days, 0.0);
    assert!(report.top_clients.is_empty());
}

#[test]
fn test_malformed_sheet_is_an_error() {
    let err = analyze(b"Nome Cli\nHospital A\n").unwrap_err();
    assert!(matches!(err, KpiError::MissingColumn(_)));
}

#[test]
fn test_spreadsheet_serial_dates() {
    let report = analyze(&sheet(&["45292,45294,10,Finalizado,P,C"])).unwrap();
    assert_eq!(report.avg_invoicing_days, 2.0);
    assert_eq!(report.monthly_sales[0].month, "2024-01");
}

const WORKBOOK: &[u8] = include_bytes!("fixtures/bdcurativo.xlsx");

#[test]
fn test_workbook_source() {
    // Dates arrive as serial numbers or day-first text, values as numbers
    // or currency text
    let report = analyze(WORKBOOK).unwrap();

    assert_eq!(report.row_count, 4);
    let total: f64 = report.revenue_by_status.iter().map(|r| r.revenue).sum();
    assert!((total - 3580.5).abs() < 1e-9);
    assert_eq!(report.loss_rate, 25.0);
    assert_eq!(report.avg_invoicing_days, 2.5);

    assert_eq!(report.top_products[0].product, "Curativo Prata");
    assert_eq!(report.top_products[0].count, 2);
    assert_eq!(report.top_clients[0].client, "Hospital A");
    assert_eq!(report.top_clients[0].revenue, 1500.5);

    assert_eq!(report.monthly_sales.len(), 1);
    assert_eq!(report.monthly_sales[0].month, "2024-01");
    assert_eq!(report.monthly_sales[0].count, 3);
    assert_eq!(report.monthly_sales[0].revenue, 3500.5);
}

#[test]
fn test_corrupt_workbook_is_an_error() {
    let mut truncated = WORKBOOK[..WORKBOOK.len() / 2].to_vec();
    truncated.extend_from_slice(b"garbage");
    assert!(matches!(analyze(&truncated), Err(KpiError::Xlsx(_))));
}

#[test]
fn test_workbook_from_default_location() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .upload(DEFAULT_SOURCE_PATH, WORKBOOK, "application/octet-stream", false)
        .unwrap();

    let report = analyze_from_store(&store, DEFAULT_SOURCE_PATH).unwrap();
    assert_eq!(report.row_count, 4);
    assert!(report.last_modified.is_some());
}

#[test]
fn test_analysis_from_blob_store() {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .upload("analise/bdcurativo.csv", &scenario_five(), "text/csv", false)
        .unwrap();

    let report = analyze_from_store(&store, "analise/bdcurativo.csv").unwrap();
    assert_eq!(report.row_count, 10);
    assert!(report.last_modified.is_some());
}
