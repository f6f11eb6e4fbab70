//! End-to-end household scenarios

use crate::PlanBuilder;
use crate::model::{AccountId, AccountType, Owner, Province, ScenarioOverrides, WarningKind};
use crate::service::PlanningService;
use crate::taxes::TaxCalculator;

#[test]
fn test_single_salary_year_taxed_and_saved() {
    let plan = PlanBuilder::new()
        .person1("Morgan", 1985, 4, 2)
        .employment(Owner::Person1, 50_000.0, 65)
        .build()
        .unwrap();
    let service = PlanningService::new(plan).unwrap();
    let result = service
        .run_projection(&service.base_scenario(), 2024, 2024)
        .unwrap();

    let expected = TaxCalculator::default()
        .calculate_tax(50_000.0, 2024, Province::Ontario)
        .unwrap();
    let year = &result.years[0];
    assert!((year.employment_income - 50_000.0).abs() < 1e-9);
    assert!((year.total_tax - expected.total_tax).abs() < 1e-6);
    assert!((year.federal_tax - expected.federal_tax).abs() < 1e-6);
    assert!((year.provincial_tax - expected.provincial_tax).abs() < 1e-6);
    assert!((result.final_net_worth - (50_000.0 - expected.total_tax)).abs() < 1e-6);
    assert!((year.cash_flow - (50_000.0 - expected.total_tax)).abs() < 1e-6);
    assert!(result.depletion_age.is_none());
}

#[test]
fn test_surplus_saved_to_named_account() {
    let plan = PlanBuilder::new()
        .person1("Morgan", 1985, 4, 2)
        .employment(Owner::Person1, 50_000.0, 65)
        .account("tfsa", AccountType::Tfsa, 0.0)
        .surplus_account("tfsa")
        .zero_returns()
        .build()
        .unwrap();
    let service = PlanningService::new(plan).unwrap();
    let result = service
        .run_projection(&service.base_scenario(), 2024, 2024)
        .unwrap();
    let year = &result.years[0];
    let tfsa = AccountId::new("tfsa");
    assert!((year.account_balances[&tfsa] - (50_000.0 - year.total_tax)).abs() < 1e-6);
    assert!((year.account_net_deposits[&tfsa] - (50_000.0 - year.total_tax)).abs() < 1e-6);
    assert_eq!(year.cash_balance, 0.0);
}

#[test]
fn test_withdrawals_exceeding_balances_deplete() {
    let plan = PlanBuilder::new()
        .person1("Robin", 1960, 9, 30)
        .account("tfsa", AccountType::Tfsa, 100_000.0)
        .spending(40_000.0)
        .inflation(0.0)
        .zero_returns()
        .build()
        .unwrap();
    let service = PlanningService::new(plan).unwrap();
    let result = service
        .run_projection(&service.base_scenario(), 2024, 2030)
        .unwrap();

    // 40k, 40k, then the last 20k in 2026
    assert_eq!(result.depletion_age, Some(66));
    let first_depleted = result.years.iter().find(|y| y.depleted).unwrap();
    assert_eq!(first_depleted.year, 2026);
    assert_eq!(first_depleted.total_net_worth, 0.0);
    assert!(result.years[..2].iter().all(|y| !y.depleted));

    for year in &result.years {
        assert!(year.cash_balance >= 0.0);
        for (id, balance) in &year.account_balances {
            assert!(*balance >= 0.0, "{id} negative in {}", year.year);
        }
    }
    assert!((result.years[2].shortfall - 20_000.0).abs() < 0.01);
    assert!(
        result
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::FundingShortfall && w.year == Some(2026))
    );

    // seven years of spending must not exhaust 100k
    let sustainable = result.sustainable_spending.unwrap();
    assert!(sustainable < 100_000.0 / 7.0);
    assert!(sustainable > 100_000.0 / 7.0 - 1.5);
}

#[test]
fn test_unfunded_contribution_is_not_deposited() {
    let plan = PlanBuilder::new()
        .person1("Robin", 1960, 9, 30)
        .account("tfsa", AccountType::Tfsa, 0.0)
        .contribution("tfsa", 7_000.0, None, None)
        .inflation(0.0)
        .zero_returns()
        .build()
        .unwrap();
    let service = PlanningService::new(plan).unwrap();
    let result = service
        .run_projection(&service.base_scenario(), 2024, 2026)
        .unwrap();

    for year in &result.years {
        assert_eq!(year.contributions, 0.0, "{}", year.year);
        assert_eq!(year.total_withdrawals, 0.0, "{}", year.year);
        assert_eq!(year.shortfall, 0.0, "{}", year.year);
        assert_eq!(year.total_net_worth, 0.0, "{}", year.year);
    }
    assert_eq!(result.depletion_age, Some(64));
    assert!(
        result
            .warnings
            .iter()
            .all(|w| w.kind != WarningKind::FundingShortfall)
    );
}

#[test]
fn test_account_never_funds_its_own_contribution() {
    let plan = PlanBuilder::new()
        .person1("Robin", 1960, 9, 30)
        .account("tfsa", AccountType::Tfsa, 20_000.0)
        .contribution("tfsa", 7_000.0, None, None)
        .inflation(0.0)
        .zero_returns()
        .build()
        .unwrap();
    let service = PlanningService::new(plan).unwrap();
    let result = service
        .run_projection(&service.base_scenario(), 2024, 2026)
        .unwrap();

    let tfsa = AccountId::new("tfsa");
    for year in &result.years {
        assert_eq!(year.withdrawal_tfsa, 0.0);
        assert_eq!(year.contributions, 0.0);
        assert_eq!(year.account_balances[&tfsa], 20_000.0);
        assert_eq!(year.account_net_deposits[&tfsa], 0.0);
    }
    assert!(result.depletion_age.is_none());
}

#[test]
fn test_contribution_funded_from_another_account() {
    let build = |brokerage: f64| {
        PlanBuilder::new()
            .person1("Robin", 1960, 9, 30)
            .non_registered("brokerage", brokerage, brokerage)
            .account("tfsa", AccountType::Tfsa, 0.0)
            .contribution("tfsa", 7_000.0, None, None)
            .inflation(0.0)
            .zero_returns()
            .build()
            .unwrap()
    };
    let tfsa = AccountId::new("tfsa");
    let brokerage = AccountId::new("brokerage");

    let service = PlanningService::new(build(50_000.0)).unwrap();
    let result = service
        .run_projection(&service.base_scenario(), 2024, 2024)
        .unwrap();
    let year = &result.years[0];
    assert!((year.withdrawal_non_reg - 7_000.0).abs() < 1e-9);
    assert!((year.contributions - 7_000.0).abs() < 1e-9);
    assert!((year.account_balances[&tfsa] - 7_000.0).abs() < 1e-9);
    assert!((year.account_balances[&brokerage] - 43_000.0).abs() < 1e-9);
    assert!((year.total_net_worth - 50_000.0).abs() < 1e-9);
    assert_eq!(year.total_tax, 0.0);

    // Only part of the contribution can be paid for
    let service = PlanningService::new(build(3_000.0)).unwrap();
    let result = service
        .run_projection(&service.base_scenario(), 2024, 2024)
        .unwrap();
    let year = &result.years[0];
    assert!((year.contributions - 3_000.0).abs() < 1e-6);
    assert!((year.account_balances[&tfsa] - 3_000.0).abs() < 1e-6);
    assert_eq!(year.account_balances[&brokerage], 0.0);
    assert_eq!(year.shortfall, 0.0);
    assert!((year.total_net_worth - 3_000.0).abs() < 1e-6);
}

#[test]
fn test_scenario_overrides_change_outcome() {
    let plan = PlanBuilder::new()
        .person1("Robin", 1960, 9, 30)
        .account("tfsa", AccountType::Tfsa, 100_000.0)
        .spending(40_000.0)
        .inflation(0.0)
        .zero_returns()
        .scenario("base", ScenarioOverrides::default())
        .scenario(
            "frugal",
            ScenarioOverrides {
                annual_spending: Some(10_000.0),
                ..ScenarioOverrides::default()
            },
        )
        .base_scenario("base")
        .build()
        .unwrap();
    let service = PlanningService::new(plan).unwrap();

    let base = service
        .run_projection(&service.base_scenario(), 2024, 2030)
        .unwrap();
    let frugal = service
        .run_projection(&"frugal".into(), 2024, 2030)
        .unwrap();

    assert!(base.depleted());
    assert!(!frugal.depleted());
    assert_eq!(frugal.desired_spending, 10_000.0);
    assert!((frugal.final_net_worth - 30_000.0).abs() < 1e-6);
    // the service's plan keeps its own spending level
    assert_eq!(service.plan().strategy.annual_spending, 40_000.0);
}

#[test]
fn test_retirement_income_sequence() {
    let plan = PlanBuilder::new()
        .person1("Casey", 1960, 1, 1)
        .person2("Drew", 1962, 1, 1)
        .employment(Owner::Person1, 70_000.0, 65)
        .employment(Owner::Person2, 60_000.0, 63)
        .cpp(Owner::Person1, 12_000.0, 65)
        .cpp(Owner::Person2, 10_000.0, 60)
        .oas(Owner::Person1, 8_000.0, 70)
        .pension(Owner::Person2, 20_000.0, 63, false)
        .account_for(Owner::Person2, "rrsp-2", AccountType::Rrsp, 200_000.0)
        .inflation(0.0)
        .zero_returns()
        .build()
        .unwrap();
    let service = PlanningService::new(plan).unwrap();
    let result = service
        .run_projection(&service.base_scenario(), 2024, 2031)
        .unwrap();
    let by_year = |y: i16| result.years.iter().find(|p| p.year == y).unwrap();

    // 2024: person1 is 64, person2 is 62 and already drawing early CPP
    let y2024 = by_year(2024);
    assert_eq!(y2024.person1_age, 64);
    assert_eq!(y2024.person2_age, Some(62));
    assert!((y2024.employment_income - 130_000.0).abs() < 1e-6);
    assert!((y2024.cpp_income - 6_400.0).abs() < 1e-6);

    // 2025: person1 retires and starts CPP at the standard amount; person2 pension starts
    let y2025 = by_year(2025);
    assert!((y2025.employment_income - 0.0).abs() < 1e-6);
    assert!((y2025.cpp_income - 18_400.0).abs() < 1e-6);
    assert!((y2025.pension_income - 20_000.0).abs() < 1e-6);
    assert_eq!(y2025.oas_income, 0.0);

    // 2030: deferred OAS starts 36% higher
    let y2030 = by_year(2030);
    assert!((y2030.oas_income - 8_000.0 * 1.36).abs() < 1e-6);
}
