//! Tax calculator properties

use crate::error::TaxError;
use crate::model::{Province, TaxProjectionAssumptions};
use crate::taxes::TaxCalculator;

#[test]
fn test_tax_monotonic_in_income() {
    let calc = TaxCalculator::default();
    for year in [2020, 2024, 2030, 2050] {
        let mut previous = 0.0;
        for step in 0..=1000 {
            let income = f64::from(step) * 500.0;
            let tax = calc
                .calculate_tax(income, year, Province::Ontario)
                .unwrap()
                .total_tax;
            assert!(
                tax >= previous - 1e-9,
                "tax fell from {previous} to {tax} at income {income} in {year}"
            );
            previous = tax;
        }
    }
}

#[test]
fn test_zero_income_pays_nothing() {
    let calc = TaxCalculator::default();
    let result = calc.calculate_tax(0.0, 2024, Province::Ontario).unwrap();
    assert_eq!(result.total_tax, 0.0);
    assert_eq!(result.average_rate, 0.0);
}

#[test]
fn test_federal_plus_provincial_equals_total() {
    let calc = TaxCalculator::default();
    for income in [12_000.0, 57_375.0, 120_000.0, 260_000.0] {
        let r = calc.calculate_tax(income, 2027, Province::Ontario).unwrap();
        assert!((r.federal_tax + r.provincial_tax - r.total_tax).abs() < 1e-9);
        assert!(r.average_rate <= r.marginal_rate + 1e-9);
    }
}

#[test]
fn test_indexation_lowers_tax_on_fixed_income() {
    let calc = TaxCalculator::default();
    let now = calc.calculate_tax(80_000.0, 2024, Province::Ontario).unwrap();
    let later = calc.calculate_tax(80_000.0, 2034, Province::Ontario).unwrap();
    assert!(later.total_tax < now.total_tax);

    let frozen = TaxCalculator::new(TaxProjectionAssumptions {
        indexation_rate: 0.0,
        ..TaxProjectionAssumptions::default()
    });
    let a = frozen.calculate_tax(80_000.0, 2024, Province::Ontario).unwrap();
    let b = frozen.calculate_tax(80_000.0, 2034, Province::Ontario).unwrap();
    assert!((a.total_tax - b.total_tax).abs() < 1e-9);
}

#[test]
fn test_capital_gains_split_sums_to_total() {
    let calc = TaxCalculator::default();
    let cases = [
        (0.0, 0.0),
        (0.0, 25_000.0),
        (40_000.0, 10_000.0),
        (95_000.0, 60_000.0),
        (250_000.0, 1_000.0),
        (60_000.0, 0.0),
    ];
    for (base, gains) in cases {
        let total = calc
            .calculate_tax(base + gains, 2026, Province::Ontario)
            .unwrap()
            .total_tax;
        let split = calc
            .split_capital_gains_tax(base, gains, total, 2026, Province::Ontario)
            .unwrap();
        assert!(
            (split.income_tax + split.capital_gains_tax - total).abs() < 1e-9,
            "split of {total} at base {base}, gains {gains}: {split:?}"
        );
        assert!(split.capital_gains_tax >= 0.0);
        assert!(split.capital_gains_tax <= total + 1e-9);
        if gains == 0.0 {
            assert_eq!(split.capital_gains_tax, 0.0);
        }
    }
}

#[test]
fn test_split_clamps_to_reported_total() {
    let calc = TaxCalculator::default();
    // A reported total below the marginal cost of the gains caps the gains share
    let split = calc
        .split_capital_gains_tax(80_000.0, 50_000.0, 1_000.0, 2024, Province::Ontario)
        .unwrap();
    assert!((split.capital_gains_tax - 1_000.0).abs() < 1e-9);
    assert!(split.income_tax.abs() < 1e-9);
}

#[test]
fn test_invalid_inputs_rejected() {
    let calc = TaxCalculator::default();
    assert!(matches!(
        calc.calculate_tax(-1.0, 2024, Province::Ontario),
        Err(TaxError::NegativeIncome(_))
    ));
    assert_eq!(
        calc.calculate_tax(f64::NAN, 2024, Province::Ontario),
        Err(TaxError::NonFiniteIncome)
    );
    assert!(matches!(
        calc.calculate_tax(50_000.0, 2024, Province::BritishColumbia),
        Err(TaxError::UnsupportedProvince(_))
    ));
    assert!(matches!(
        calc.calculate_tax_for_code(50_000.0, 2024, "XX"),
        Err(TaxError::InvalidProvince(_))
    ));
    let by_code = calc.calculate_tax_for_code(50_000.0, 2024, "on").unwrap();
    let by_enum = calc.calculate_tax(50_000.0, 2024, Province::Ontario).unwrap();
    assert_eq!(by_code, by_enum);
}
