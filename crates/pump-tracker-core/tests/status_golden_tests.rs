//! Golden tests for the status calculator.
//!
//! Each case pins departure date, period and "today".

use chrono::NaiveDate;
use pump_tracker_core::lifecycle::{compute_status, due_date, LoanPeriod, LoanStatus};

/// Test case from golden file.
struct GoldenCase {
    id: &'static str,
    departure: Option<&'static str>,
    period: Option<LoanPeriod>,
    today: &'static str,
    expected: LoanStatus,
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "scenario-1-on-time",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Days(30)),
            today: "2024-01-20",
            expected: LoanStatus::OnTime,
        },
        GoldenCase {
            id: "scenario-2-due-soon",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Days(30)),
            today: "2024-01-29",
            expected: LoanStatus::DueSoon,
        },
        GoldenCase {
            id: "scenario-3-overdue",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Days(20)),
            today: "2024-01-25",
            expected: LoanStatus::Overdue,
        },
        GoldenCase {
            id: "remaining-eight",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Days(30)),
            today: "2024-01-23",
            expected: LoanStatus::OnTime,
        },
        GoldenCase {
            id: "remaining-seven",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Days(30)),
            today: "2024-01-24",
            expected: LoanStatus::DueSoon,
        },
        GoldenCase {
            id: "remaining-zero",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Days(30)),
            today: "2024-01-31",
            expected: LoanStatus::DueSoon,
        },
        GoldenCase {
            id: "remaining-minus-one",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Days(30)),
            today: "2024-02-01",
            expected: LoanStatus::Overdue,
        },
        GoldenCase {
            id: "zero-day-period",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Days(0)),
            today: "2024-01-01",
            expected: LoanStatus::DueSoon,
        },
        GoldenCase {
            id: "text-period",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Text(" 30 ".into())),
            today: "2024-01-20",
            expected: LoanStatus::OnTime,
        },
        GoldenCase {
            id: "across-leap-day",
            departure: Some("2024-02-20"),
            period: Some(LoanPeriod::Days(10)),
            today: "2024-03-02",
            expected: LoanStatus::Overdue,
        },
        GoldenCase {
            id: "missing-departure",
            departure: None,
            period: Some(LoanPeriod::Days(30)),
            today: "2024-01-20",
            expected: LoanStatus::Undefined,
        },
        GoldenCase {
            id: "missing-period",
            departure: Some("2024-01-01"),
            period: None,
            today: "2024-01-20",
            expected: LoanStatus::Undefined,
        },
        GoldenCase {
            id: "blank-period",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Text(String::new())),
            today: "2024-01-20",
            expected: LoanStatus::Undefined,
        },
        GoldenCase {
            id: "non-numeric-period",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Text("trinta".into())),
            today: "2024-01-20",
            expected: LoanStatus::InvalidDate,
        },
        GoldenCase {
            id: "negative-period",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Days(-3)),
            today: "2024-01-20",
            expected: LoanStatus::InvalidDate,
        },
        GoldenCase {
            id: "overflowing-period",
            departure: Some("2024-01-01"),
            period: Some(LoanPeriod::Days(i64::from(u32::MAX))),
            today: "2024-01-20",
            expected: LoanStatus::InvalidDate,
        },
    ]
}

#[test]
fn test_status_golden_cases() {
    for case in get_golden_cases() {
        let status = compute_status(
            case.departure.map(date),
            case.period.as_ref(),
            date(case.today),
        );
        assert_eq!(status, case.expected, "Case {}", case.id);
    }
}

#[test]
fn test_scenario_one_spelled_out() {
    let due = due_date(date("2024-01-01"), 30).unwrap();
    assert_eq!(due, date("2024-01-31"));
    assert_eq!((due - date("2024-01-20")).num_days(), 11);
}
