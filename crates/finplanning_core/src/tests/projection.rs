//! Projection engine mechanics

use crate::PlanBuilder;
use crate::cancel::CancellationToken;
use crate::error::{PlanningError, ValidationError};
use crate::model::{AccountId, AccountType, AssetReturns, Owner, ReturnPath, WarningKind, rrif};
use crate::optimization::MAX_BRACKET_DOUBLINGS;
use crate::projection::{MAX_HORIZON_YEARS, ProjectionEngine, ProjectionOptions};

fn balance(year: &crate::model::YearlyProjection, id: &str) -> f64 {
    year.account_balances[&AccountId::new(id)]
}

#[test]
fn test_quiet_year_leaves_balances_unchanged() {
    let plan = PlanBuilder::new()
        .person1("Alex", 1965, 5, 1)
        .account("rrsp", AccountType::Rrsp, 250_000.0)
        .account("tfsa", AccountType::Tfsa, 80_000.0)
        .non_registered("cash-brokerage", 40_000.0, 30_000.0)
        .account("lira", AccountType::Lira, 60_000.0)
        .zero_returns()
        .build()
        .unwrap();

    let result = ProjectionEngine::new(&plan)
        .run(2024, 2024, &ProjectionOptions::default())
        .unwrap();
    assert_eq!(result.years.len(), 1);

    let year = &result.years[0];
    for account in &plan.accounts {
        assert_eq!(
            year.account_balances[&account.id], account.balance,
            "{} moved in a year with no flows",
            account.id
        );
        assert_eq!(year.account_net_deposits[&account.id], 0.0);
    }
    assert_eq!(year.total_tax, 0.0);
    assert_eq!(year.total_withdrawals, 0.0);
    assert_eq!(year.cash_balance, 0.0);
    assert_eq!(result.final_net_worth, 430_000.0);
    assert!(result.sustainable_spending.is_none());
}

#[test]
fn test_non_registered_distributions_reinvested() {
    let plan = PlanBuilder::new()
        .person1("Sam", 1970, 1, 1)
        .non_registered("brokerage", 100_000.0, 100_000.0)
        .returns(0.05, 0.05, 0.05)
        .dividend_yield(0.02)
        .inflation(0.0)
        .build()
        .unwrap();

    let result = ProjectionEngine::new(&plan)
        .run(2024, 2024, &ProjectionOptions::default())
        .unwrap();
    let year = &result.years[0];

    assert!((year.investment_income - 2_000.0).abs() < 1e-6);
    // 2k of distributions is under the basic personal amount
    assert_eq!(year.total_tax, 0.0);
    // 3% price growth plus the reinvested 2% yield
    assert!((balance(year, "brokerage") - 105_000.0).abs() < 1e-6);
    assert!(year.cash_balance.abs() < 1e-9);
    assert!((year.account_net_deposits[&AccountId::new("brokerage")] - 2_000.0).abs() < 1e-6);
}

#[test]
fn test_run_is_idempotent() {
    let plan = PlanBuilder::new()
        .person1("Alex", 1962, 8, 20)
        .employment(Owner::Person1, 85_000.0, 63)
        .cpp(Owner::Person1, 14_000.0, 67)
        .oas(Owner::Person1, 8_500.0, 65)
        .account("rrsp", AccountType::Rrsp, 300_000.0)
        .account("tfsa", AccountType::Tfsa, 90_000.0)
        .non_registered("brokerage", 150_000.0, 90_000.0)
        .dividend_yield(0.02)
        .spending(55_000.0)
        .build()
        .unwrap();

    let engine = ProjectionEngine::new(&plan);
    let first = engine.run(2025, 2057, &ProjectionOptions::full()).unwrap();
    let second = engine.run(2025, 2057, &ProjectionOptions::full()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_year_range_validation() {
    let plan = PlanBuilder::new().build().unwrap();
    let engine = ProjectionEngine::new(&plan);
    let options = ProjectionOptions::default();

    assert!(matches!(
        engine.run(2030, 2029, &options),
        Err(PlanningError::Validation(ValidationError::InvalidYearRange { .. }))
    ));
    assert!(matches!(
        engine.run(1850, 1860, &options),
        Err(PlanningError::Validation(ValidationError::YearOutOfRange { year: 1850, .. }))
    ));
    let too_long_end = 2024 + MAX_HORIZON_YEARS as i16;
    assert!(matches!(
        engine.run(2024, too_long_end, &options),
        Err(PlanningError::Validation(ValidationError::HorizonTooLong { .. }))
    ));
    let longest = engine.run(2024, too_long_end - 1, &options).unwrap();
    assert_eq!(longest.years.len(), MAX_HORIZON_YEARS);
}

#[test]
fn test_return_path_must_cover_range() {
    let plan = PlanBuilder::new()
        .account("tfsa", AccountType::Tfsa, 10_000.0)
        .build()
        .unwrap();
    let short = ReturnPath::constant(2024, 2026, AssetReturns::ZERO);
    let err = ProjectionEngine::new(&plan)
        .run_with_returns(2024, 2030, &short, &ProjectionOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        PlanningError::Validation(ValidationError::ReturnPathMismatch { .. })
    ));
}

#[test]
fn test_explicit_returns_drive_growth() {
    let plan = PlanBuilder::new()
        .person1("Jo", 1980, 1, 1)
        .account("tfsa", AccountType::Tfsa, 100_000.0)
        .build()
        .unwrap();
    let flat = AssetReturns {
        equity: 0.10,
        fixed_income: 0.10,
        cash: 0.10,
    };
    let returns = ReturnPath::constant(2024, 2025, flat);
    let result = ProjectionEngine::new(&plan)
        .run_with_returns(2024, 2025, &returns, &ProjectionOptions::default())
        .unwrap();
    assert!((balance(&result.years[0], "tfsa") - 110_000.0).abs() < 1e-6);
    assert!((balance(&result.years[1], "tfsa") - 121_000.0).abs() < 1e-6);
    assert_eq!(result.years[1].returns, flat);
}

#[test]
fn test_black_swan_hits_trigger_year_only() {
    let plan = PlanBuilder::new()
        .person1("Jo", 1980, 1, 1)
        .account("tfsa", AccountType::Tfsa, 100_000.0)
        .zero_returns()
        .black_swan(2026, -0.40)
        .build()
        .unwrap();
    let result = ProjectionEngine::new(&plan)
        .run(2024, 2028, &ProjectionOptions::default())
        .unwrap();
    let equity: Vec<f64> = result.years.iter().map(|y| y.returns.equity).collect();
    assert_eq!(equity, vec![0.0, 0.0, -0.40, 0.0, 0.0]);
    // 60% equity allocation by default
    assert!((result.final_net_worth - 76_000.0).abs() < 1e-6);
}

#[test]
fn test_horizon_warnings() {
    let plan = PlanBuilder::new()
        .person1("Lee", 1970, 1, 1)
        .account("tfsa", AccountType::Tfsa, 50_000.0)
        .account("art", AccountType::Other, 20_000.0)
        .account("pension-lira", AccountType::Lira, 20_000.0)
        .one_time_expense("Boat", 2090, 30_000.0)
        .one_time_income("Bonus", 2025, 5_000.0, true)
        .recurring_expense("Roof", 2080, None, 20, 15_000.0)
        .zero_returns()
        .build()
        .unwrap();

    let result = ProjectionEngine::new(&plan)
        .run(2024, 2030, &ProjectionOptions::default())
        .unwrap();
    let kinds: Vec<WarningKind> = result.warnings.iter().map(|w| w.kind).collect();

    assert_eq!(
        kinds
            .iter()
            .filter(|k| **k == WarningKind::EventOutsideHorizon)
            .count(),
        1
    );
    assert!(kinds.contains(&WarningKind::RecurringExpenseOutsideHorizon));
    // Other accounts are outside the default withdrawal order; locked accounts are not reported
    let no_rule: Vec<_> = result
        .warnings
        .iter()
        .filter(|w| w.kind == WarningKind::NoWithdrawalRule)
        .collect();
    assert_eq!(no_rule.len(), 1);
    assert!(no_rule[0].message.contains("Other"));
    assert!(!kinds.contains(&WarningKind::FundingShortfall));
}

#[test]
fn test_recurring_expense_schedule_applied() {
    let plan = PlanBuilder::new()
        .person1("Lee", 1970, 1, 1)
        .account("tfsa", AccountType::Tfsa, 100_000.0)
        .recurring_expense("Car", 2024, Some(2032), 4, 10_000.0)
        .withdrawal_order(vec![AccountType::Tfsa])
        .zero_returns()
        .inflation(0.0)
        .build()
        .unwrap();
    let result = ProjectionEngine::new(&plan)
        .run(2024, 2033, &ProjectionOptions::default())
        .unwrap();
    let due: Vec<i16> = result
        .years
        .iter()
        .filter(|y| y.recurring_expenses > 0.0)
        .map(|y| y.year)
        .collect();
    assert_eq!(due, vec![2024, 2028, 2032]);
    assert!((result.final_net_worth - 70_000.0).abs() < 1e-6);
}

#[test]
fn test_rrsp_converts_and_pays_minimum() {
    let plan = PlanBuilder::new()
        .person1("Pat", 1950, 6, 1)
        .account("rrsp", AccountType::Rrsp, 100_000.0)
        .zero_returns()
        .build()
        .unwrap();
    let result = ProjectionEngine::new(&plan)
        .run(2020, 2023, &ProjectionOptions::default())
        .unwrap();
    let years = &result.years;

    // ages 70 and 71: still an RRSP, no minimum
    assert_eq!(years[0].rrif_minimum, 0.0);
    assert_eq!(years[1].rrif_minimum, 0.0);

    // converted at the end of the year the owner turned 71
    let expected = 100_000.0 * rrif::minimum_factor(71);
    assert!((years[2].rrif_minimum - expected).abs() < 1e-6);
    assert!((years[2].withdrawal_rrsp_rrif - expected).abs() < 1e-6);
    assert!((balance(&years[2], "rrsp") - (100_000.0 - expected)).abs() < 1e-6);

    // the forced withdrawal is taxable and not needed for spending, so it lands in cash
    assert!(years[2].taxable_income >= expected - 1e-6);
    assert!((years[2].total_net_worth + years[2].total_tax - 100_000.0).abs() < 1e-6);
    assert!(years[3].rrif_minimum > 0.0);
}

#[test]
fn test_locked_accounts_not_drawn_for_spending() {
    let plan = PlanBuilder::new()
        .person1("Pat", 1975, 1, 1)
        .account("lira", AccountType::Lira, 100_000.0)
        .account("tfsa", AccountType::Tfsa, 10_000.0)
        .withdrawal_order(vec![AccountType::Lira, AccountType::Tfsa])
        .spending(20_000.0)
        .inflation(0.0)
        .zero_returns()
        .build()
        .unwrap();
    let result = ProjectionEngine::new(&plan)
        .run(2024, 2024, &ProjectionOptions::default())
        .unwrap();
    let year = &result.years[0];
    assert_eq!(year.withdrawal_lira_lif, 0.0);
    assert!((year.withdrawal_tfsa - 10_000.0).abs() < 1e-6);
    assert!((year.shortfall - 10_000.0).abs() < 0.01);
    assert!(
        result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::FundingShortfall)
    );
}

#[test]
fn test_non_registered_withdrawal_realizes_gains() {
    let plan = PlanBuilder::new()
        .person1("Pat", 1975, 1, 1)
        .non_registered("brokerage", 100_000.0, 50_000.0)
        .spending(80_000.0)
        .inflation(0.0)
        .zero_returns()
        .build()
        .unwrap();
    let result = ProjectionEngine::new(&plan)
        .run(2024, 2024, &ProjectionOptions::default())
        .unwrap();
    let year = &result.years[0];

    // half of every dollar withdrawn is gain
    assert!((year.realized_capital_gains - year.withdrawal_non_reg / 2.0).abs() < 0.01);
    assert!((year.taxable_capital_gains - year.realized_capital_gains * 0.5).abs() < 1e-6);
    assert!((year.income_tax + year.capital_gains_tax - year.total_tax).abs() < 1e-9);
    assert!(year.capital_gains_tax > 0.0);
    assert_eq!(year.shortfall, 0.0);
    assert!((year.withdrawal_non_reg - 80_000.0 - year.total_tax).abs() < 0.01);
}

#[test]
fn test_cancelled_projection_stops() {
    let plan = PlanBuilder::new()
        .account("tfsa", AccountType::Tfsa, 10_000.0)
        .build()
        .unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let options = ProjectionOptions {
        solve_sustainable_spending: false,
        cancel: Some(token),
    };
    let err = ProjectionEngine::new(&plan)
        .run(2024, 2030, &options)
        .unwrap_err();
    assert_eq!(err, PlanningError::Cancelled);
}

#[test]
fn test_sustainable_spending_zero_when_plan_fails_without_spending() {
    let plan = PlanBuilder::new()
        .account("tfsa", AccountType::Tfsa, 20_000.0)
        .one_time_expense("Roof", 2025, 50_000.0)
        .spending(10_000.0)
        .inflation(0.0)
        .zero_returns()
        .build()
        .unwrap();
    let result = ProjectionEngine::new(&plan)
        .run(2024, 2030, &ProjectionOptions::full())
        .unwrap();
    assert_eq!(result.sustainable_spending, Some(0.0));
}

#[test]
fn test_sustainable_spending_stops_at_bracket_cap() {
    let plan = PlanBuilder::new()
        .employment(Owner::Person1, 1e15, 70)
        .inflation(0.0)
        .zero_returns()
        .build()
        .unwrap();
    let result = ProjectionEngine::new(&plan)
        .run(2024, 2025, &ProjectionOptions::full())
        .unwrap();
    let cap = 2f64.powi(MAX_BRACKET_DOUBLINGS as i32 - 1);
    assert_eq!(result.sustainable_spending, Some(cap));
}

#[test]
fn test_sustainable_spending_is_the_edge_with_growth_and_inflation() {
    let plan = PlanBuilder::new()
        .person1("Sam", 1959, 3, 12)
        .account("tfsa", AccountType::Tfsa, 500_000.0)
        .returns(0.05, 0.03, 0.02)
        .inflation(0.025)
        .spending(30_000.0)
        .build()
        .unwrap();
    let engine = ProjectionEngine::new(&plan);
    let result = engine.run(2024, 2053, &ProjectionOptions::full()).unwrap();
    let sustainable = result.sustainable_spending.unwrap();
    assert!(sustainable > 0.0);

    let returns = ReturnPath::deterministic(&plan.assumptions, 2024, 2053);
    let at = engine
        .evaluate_spending(2024, 2053, &returns, sustainable, None)
        .unwrap();
    assert!(at.is_sustainable());
    let above = engine
        .evaluate_spending(2024, 2053, &returns, sustainable + 1.0, None)
        .unwrap();
    assert!(!above.is_sustainable());
    assert!(above.depletion_age.is_some());
}
