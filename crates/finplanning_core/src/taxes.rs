//! Canadian personal income tax
//!
//! Federal and provincial tax come from progressive bracket schedules set for
//! a base year. Thresholds and credits for later (or earlier) years are
//! scaled by `(1 + indexation_rate)^(year - base_year)`.

use serde::{Deserialize, Serialize};

use crate::error::TaxError;
use crate::model::{Province, TaxProjectionAssumptions};

/// Lower bound of a bracket and the rate applied above it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBracket {
    pub threshold: f64,
    pub rate: f64,
}

/// Surtax charged as a share of basic tax above a threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurtaxTier {
    pub threshold: f64,
    pub rate: f64,
}

/// One jurisdiction's schedule in base-year dollars
#[derive(Debug, Clone, Copy)]
pub struct TaxSchedule {
    pub brackets: &'static [TaxBracket],
    /// Credited at the lowest bracket rate
    pub basic_personal_amount: f64,
    pub surtax: &'static [SurtaxTier],
}

/// 2024 federal schedule
pub const FEDERAL_2024: TaxSchedule = TaxSchedule {
    brackets: &[
        TaxBracket {
            threshold: 0.0,
            rate: 0.15,
        },
        TaxBracket {
            threshold: 55_867.0,
            rate: 0.205,
        },
        TaxBracket {
            threshold: 111_733.0,
            rate: 0.26,
        },
        TaxBracket {
            threshold: 173_205.0,
            rate: 0.29,
        },
        TaxBracket {
            threshold: 246_752.0,
            rate: 0.33,
        },
    ],
    basic_personal_amount: 15_705.0,
    surtax: &[],
};

/// 2024 Ontario schedule
pub const ONTARIO_2024: TaxSchedule = TaxSchedule {
    brackets: &[
        TaxBracket {
            threshold: 0.0,
            rate: 0.0505,
        },
        TaxBracket {
            threshold: 51_446.0,
            rate: 0.0915,
        },
        TaxBracket {
            threshold: 102_894.0,
            rate: 0.1116,
        },
        TaxBracket {
            threshold: 150_000.0,
            rate: 0.1216,
        },
        TaxBracket {
            threshold: 220_000.0,
            rate: 0.1316,
        },
    ],
    basic_personal_amount: 12_399.0,
    surtax: &[
        SurtaxTier {
            threshold: 5_554.0,
            rate: 0.20,
        },
        SurtaxTier {
            threshold: 7_108.0,
            rate: 0.36,
        },
    ],
};

/// Provincial schedule, if one is modelled
pub fn provincial_schedule(province: Province) -> Option<&'static TaxSchedule> {
    match province {
        Province::Ontario => Some(&ONTARIO_2024),
        _ => None,
    }
}

/// Tax owed on `income` under progressive brackets with thresholds scaled by `factor`
pub fn bracket_tax(income: f64, brackets: &[TaxBracket], factor: f64) -> f64 {
    if income <= 0.0 || brackets.is_empty() {
        return 0.0;
    }

    let mut tax = 0.0;
    for (i, bracket) in brackets.iter().enumerate() {
        let lower = bracket.threshold * factor;
        if income <= lower {
            break;
        }
        let upper = brackets
            .get(i + 1)
            .map(|b| b.threshold * factor)
            .unwrap_or(f64::INFINITY);
        tax += (income.min(upper) - lower) * bracket.rate;
    }
    tax
}

impl TaxSchedule {
    /// Tax after the basic personal credit and any surtax
    pub fn tax(&self, income: f64, factor: f64) -> f64 {
        let lowest_rate = self.brackets.first().map_or(0.0, |b| b.rate);
        let credit = self.basic_personal_amount * factor * lowest_rate;
        let basic = (bracket_tax(income, self.brackets, factor) - credit).max(0.0);
        let surtax: f64 = self
            .surtax
            .iter()
            .map(|tier| (basic - tier.threshold * factor).max(0.0) * tier.rate)
            .sum();
        basic + surtax
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TaxResult {
    pub total_tax: f64,
    pub federal_tax: f64,
    pub provincial_tax: f64,
    /// Tax on the next dollar of income
    pub marginal_rate: f64,
    pub average_rate: f64,
}

/// Attribution of a year's tax between ordinary income and capital gains
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CapitalGainsSplit {
    pub income_tax: f64,
    pub capital_gains_tax: f64,
}

/// Pure calculator over a fixed set of projection assumptions
#[derive(Debug, Clone, PartialEq)]
pub struct TaxCalculator {
    assumptions: TaxProjectionAssumptions,
}

impl TaxCalculator {
    pub fn new(assumptions: TaxProjectionAssumptions) -> Self {
        Self { assumptions }
    }

    pub fn assumptions(&self) -> &TaxProjectionAssumptions {
        &self.assumptions
    }

    /// Factor applied to base-year thresholds and credits in `tax_year`
    pub fn indexation_factor(&self, tax_year: i16) -> f64 {
        let years = i32::from(tax_year) - i32::from(self.assumptions.base_year);
        (1.0 + self.assumptions.indexation_rate).powi(years)
    }

    /// Federal plus provincial tax on `taxable_income` for one filer.
    pub fn calculate_tax(
        &self,
        taxable_income: f64,
        tax_year: i16,
        province: Province,
    ) -> Result<TaxResult, TaxError> {
        if !taxable_income.is_finite() {
            return Err(TaxError::NonFiniteIncome);
        }
        if taxable_income < 0.0 {
            return Err(TaxError::NegativeIncome(taxable_income));
        }
        let provincial = provincial_schedule(province)
            .ok_or_else(|| TaxError::UnsupportedProvince(province.code().to_string()))?;

        let factor = self.indexation_factor(tax_year);
        let federal_tax = FEDERAL_2024.tax(taxable_income, factor);
        let provincial_tax = provincial.tax(taxable_income, factor);
        let total_tax = federal_tax + provincial_tax;

        let next_dollar = FEDERAL_2024.tax(taxable_income + 1.0, factor)
            + provincial.tax(taxable_income + 1.0, factor);
        let marginal_rate = next_dollar - total_tax;
        let average_rate = if taxable_income > 0.0 {
            total_tax / taxable_income
        } else {
            0.0
        };

        Ok(TaxResult {
            total_tax,
            federal_tax,
            provincial_tax,
            marginal_rate,
            average_rate,
        })
    }

    /// Same as [`calculate_tax`](Self::calculate_tax) with the province given as a code.
    pub fn calculate_tax_for_code(
        &self,
        taxable_income: f64,
        tax_year: i16,
        province_code: &str,
    ) -> Result<TaxResult, TaxError> {
        let province: Province = province_code.parse()?;
        self.calculate_tax(taxable_income, tax_year, province)
    }

    /// Split `total_tax` into the part caused by taxable capital gains and the rest.
    ///
    /// Capital-gains tax is the tax on `base_income + taxable_capital_gains`
    /// less the tax on `base_income`, clamped to `[0, total_tax]`.
    pub fn split_capital_gains_tax(
        &self,
        base_income: f64,
        taxable_capital_gains: f64,
        total_tax: f64,
        tax_year: i16,
        province: Province,
    ) -> Result<CapitalGainsSplit, TaxError> {
        let base = base_income.max(0.0);
        let gains = taxable_capital_gains.max(0.0);
        let base_tax = self.calculate_tax(base, tax_year, province)?.total_tax;
        let full_tax = self.calculate_tax(base + gains, tax_year, province)?.total_tax;

        let capital_gains_tax = (full_tax - base_tax).max(0.0).min(total_tax.max(0.0));
        Ok(CapitalGainsSplit {
            income_tax: total_tax - capital_gains_tax,
            capital_gains_tax,
        })
    }
}

impl Default for TaxCalculator {
    fn default() -> Self {
        Self::new(TaxProjectionAssumptions::default())
    }
}
