//! Tabular and CSV export

use crate::PlanBuilder;
use crate::error::ExportError;
use crate::export::{
    header_labels_for_plan, rows_for_summary_output, rows_for_tabular_output, write_csv,
    write_projection_csv,
};
use crate::model::{AccountType, HouseholdPlan, Owner, ProjectionResult};
use crate::projection::{ProjectionEngine, ProjectionOptions};

fn projected() -> (HouseholdPlan, ProjectionResult) {
    let plan = PlanBuilder::new()
        .person1("Quinn", 1966, 11, 5)
        .employment(Owner::Person1, 64_000.0, 60)
        .account("rrsp", AccountType::Rrsp, 210_000.0)
        .account("tfsa", AccountType::Tfsa, 45_000.0)
        .spending(42_000.0)
        .build()
        .unwrap();
    let result = ProjectionEngine::new(&plan)
        .run(2025, 2034, &ProjectionOptions::full())
        .unwrap();
    (plan, result)
}

#[test]
fn test_rows_align_with_headers() {
    let (plan, result) = projected();
    let headers = header_labels_for_plan(&plan);
    let rows = rows_for_tabular_output(&result, &plan);

    assert_eq!(rows.len(), 10);
    assert!(rows.iter().all(|r| r.len() == headers.len()));
    assert_eq!(headers[0], "Year");
    assert_eq!(headers[headers.len() - 2], "Net deposits: rrsp");
    assert_eq!(headers[headers.len() - 1], "Net deposits: tfsa");
    assert!(headers.contains(&"Balance: tfsa".to_string()));

    let year_col = 0;
    let person2_col = headers.iter().position(|h| h == "Person 2 age").unwrap();
    assert_eq!(rows[0][year_col], Some(2025.0));
    assert_eq!(rows[9][year_col], Some(2034.0));
    assert!(rows.iter().all(|r| r[person2_col].is_none()));

    let net_worth_col = headers.iter().position(|h| h == "Net worth").unwrap();
    assert_eq!(rows[9][net_worth_col], Some(result.final_net_worth));
}

#[test]
fn test_summary_rows() {
    let (_, result) = projected();
    let summary = rows_for_summary_output(&result);
    let value = |label: &str| summary.iter().find(|r| r.label == label).unwrap().value;

    assert_eq!(value("Start year"), Some(2025.0));
    assert_eq!(value("End year"), Some(2034.0));
    assert_eq!(value("Final net worth"), Some(result.final_net_worth));
    assert_eq!(value("Desired spending"), Some(42_000.0));
    assert_eq!(value("Sustainable spending"), result.sustainable_spending);
    assert_eq!(value("Depletion age"), result.depletion_age.map(f64::from));
}

#[test]
fn test_csv_output() {
    let headers = vec!["Year".to_string(), "Balance".to_string(), "Person 2 age".to_string()];
    let rows = vec![
        vec![Some(2025.0), Some(1234.567), None],
        vec![Some(2026.0), Some(10.0), Some(61.0)],
    ];
    let mut buf = Vec::new();
    write_csv(&mut buf, &headers, &rows).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(
        text,
        "Year,Balance,Person 2 age\n2025,1234.57,\n2026,10,61\n"
    );
}

#[test]
fn test_csv_rejects_ragged_rows() {
    let headers = vec!["a".to_string(), "b".to_string()];
    let rows = vec![vec![Some(1.0), Some(2.0)], vec![Some(1.0)]];
    let err = write_csv(Vec::new(), &headers, &rows).unwrap_err();
    assert!(matches!(
        err,
        ExportError::RowWidth {
            row: 1,
            found: 1,
            expected: 2
        }
    ));
}

#[test]
fn test_projection_csv_file() {
    let (plan, result) = projected();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("projection.csv");
    write_projection_csv(&path, &result, &plan).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 11);
    let n_headers = header_labels_for_plan(&plan).len();
    for line in &lines {
        assert_eq!(line.split(',').count(), n_headers);
    }
    assert!(lines[1].starts_with("2025,"));
}
