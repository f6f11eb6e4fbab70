//! Market return paths
//!
//! A [`ReturnPath`] fixes the equity, fixed-income and cash return for each
//! year of a projection. Deterministic runs build one from the plan's mean
//! assumptions; Monte Carlo trials draw one from a [`ReturnGenerator`].

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand_distr::{Distribution, StudentT};
use serde::{Deserialize, Serialize};

use crate::error::ComputationError;

use super::plan::{Allocation, Assumptions, ReturnAssumptions};

/// Degrees of freedom of the fat-tailed equity distribution
pub const STUDENT_T_DF: f64 = 5.0;

/// Block length for the historical bootstrap
pub const BOOTSTRAP_BLOCK_YEARS: usize = 5;

/// One year of returns for each asset class
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetReturns {
    pub equity: f64,
    pub fixed_income: f64,
    pub cash: f64,
}

impl AssetReturns {
    pub const ZERO: AssetReturns = AssetReturns {
        equity: 0.0,
        fixed_income: 0.0,
        cash: 0.0,
    };

    /// Portfolio return for the given mix
    #[must_use]
    pub fn weighted(&self, allocation: &Allocation) -> f64 {
        self.equity * allocation.equity
            + self.fixed_income * allocation.fixed_income
            + self.cash * allocation.cash
    }

    fn from_row(row: &[f64; 3]) -> Self {
        Self {
            equity: row[0],
            fixed_income: row[1],
            cash: row[2],
        }
    }
}

/// Returns for consecutive calendar years starting at `start_year`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnPath {
    start_year: i16,
    returns: Vec<AssetReturns>,
}

impl ReturnPath {
    pub fn new(start_year: i16, returns: Vec<AssetReturns>) -> Self {
        Self {
            start_year,
            returns,
        }
    }

    /// The same returns in every year from `start_year` through `end_year`
    pub fn constant(start_year: i16, end_year: i16, returns: AssetReturns) -> Self {
        let n = usize::try_from(end_year - start_year + 1).unwrap_or(0);
        Self::new(start_year, vec![returns; n])
    }

    /// Mean returns every year, with the black-swan equity shock in its
    /// trigger year when the plan defines one.
    pub fn deterministic(assumptions: &Assumptions, start_year: i16, end_year: i16) -> Self {
        let means = mean_returns(&assumptions.returns);
        let mut path = Self::constant(start_year, end_year, means);
        if let Some(shock) = &assumptions.black_swan
            && let Some(year) = path.get_mut(shock.trigger_year)
        {
            year.equity = shock.equity_return;
        }
        path
    }

    pub fn start_year(&self) -> i16 {
        self.start_year
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// Whether every year in `start..=end` has returns
    pub fn covers(&self, start: i16, end: i16) -> bool {
        start >= self.start_year && self.get(end).is_some()
    }

    pub fn get(&self, year: i16) -> Option<AssetReturns> {
        let offset = usize::try_from(year - self.start_year).ok()?;
        self.returns.get(offset).copied()
    }

    fn get_mut(&mut self, year: i16) -> Option<&mut AssetReturns> {
        let offset = usize::try_from(year - self.start_year).ok()?;
        self.returns.get_mut(offset)
    }
}

fn mean_returns(assumptions: &ReturnAssumptions) -> AssetReturns {
    AssetReturns {
        equity: assumptions.equity.mean,
        fixed_income: assumptions.fixed_income.mean,
        cash: assumptions.cash.mean,
    }
}

// ============================================================================
// Return generation
// ============================================================================

/// How Monte Carlo trials generate their return paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnMethod {
    /// Block bootstrap over the historical dataset
    #[default]
    Historical,
    /// Student-t equity returns around the plan's assumptions
    Parametric,
}

impl fmt::Display for ReturnMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnMethod::Historical => f.write_str("historical"),
            ReturnMethod::Parametric => f.write_str("parametric"),
        }
    }
}

impl FromStr for ReturnMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "historical" => Ok(ReturnMethod::Historical),
            "parametric" => Ok(ReturnMethod::Parametric),
            other => Err(format!(
                "unknown return method {other:?} (expected historical or parametric)"
            )),
        }
    }
}

/// Draws complete return paths for Monte Carlo trials
#[derive(Debug, Clone)]
pub enum ReturnGenerator {
    Historical {
        data: HistoricalDataset,
        block_size: usize,
    },
    Parametric {
        equity_mean: f64,
        equity_scale: f64,
        fixed_income: f64,
        cash: f64,
        distribution: StudentT<f64>,
    },
}

impl ReturnGenerator {
    pub fn new(
        method: ReturnMethod,
        assumptions: &ReturnAssumptions,
    ) -> Result<Self, ComputationError> {
        match method {
            ReturnMethod::Historical => Ok(ReturnGenerator::Historical {
                data: HistoricalDataset::us_equity_bonds_bills(),
                block_size: BOOTSTRAP_BLOCK_YEARS,
            }),
            ReturnMethod::Parametric => {
                let distribution = StudentT::new(STUDENT_T_DF)
                    .map_err(|e| ComputationError::InvalidDistribution(e.to_string()))?;
                if !assumptions.equity.std_dev.is_finite() || assumptions.equity.std_dev < 0.0 {
                    return Err(ComputationError::InvalidDistribution(format!(
                        "equity std_dev must be non-negative, got {}",
                        assumptions.equity.std_dev
                    )));
                }
                // A t variate has variance df/(df-2); rescale so the draw
                // matches the assumed standard deviation.
                let equity_scale =
                    assumptions.equity.std_dev * ((STUDENT_T_DF - 2.0) / STUDENT_T_DF).sqrt();
                Ok(ReturnGenerator::Parametric {
                    equity_mean: assumptions.equity.mean,
                    equity_scale,
                    fixed_income: assumptions.fixed_income.mean,
                    cash: assumptions.cash.mean,
                    distribution,
                })
            }
        }
    }

    /// Draw returns for `n_years` consecutive years starting at `start_year`.
    pub fn sample_path<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        start_year: i16,
        n_years: usize,
    ) -> ReturnPath {
        let returns = match self {
            ReturnGenerator::Historical { data, block_size } => {
                data.block_bootstrap(rng, n_years, *block_size)
            }
            ReturnGenerator::Parametric {
                equity_mean,
                equity_scale,
                fixed_income,
                cash,
                distribution,
            } => (0..n_years)
                .map(|_| AssetReturns {
                    // a holding cannot lose more than its whole value
                    equity: (equity_mean + equity_scale * distribution.sample(rng)).max(-1.0),
                    fixed_income: *fixed_income,
                    cash: *cash,
                })
                .collect(),
        };
        ReturnPath::new(start_year, returns)
    }
}

// ============================================================================
// Historical data
// ============================================================================

/// Aligned annual returns for equity, fixed income and cash.
///
/// Rows are sampled together so cross-asset correlation survives resampling.
#[derive(Debug, Clone, Copy)]
pub struct HistoricalDataset {
    pub first_year: i16,
    rows: &'static [[f64; 3]],
}

impl HistoricalDataset {
    /// US large-cap total return, long government bonds and 3-month
    /// T-bills, 1934-2023.
    #[must_use]
    pub fn us_equity_bonds_bills() -> Self {
        Self {
            first_year: 1934,
            rows: historical_returns::EQUITY_BONDS_BILLS,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<AssetReturns> {
        self.rows.get(index).map(AssetReturns::from_row)
    }

    /// Arithmetic mean of each asset class
    pub fn means(&self) -> AssetReturns {
        if self.rows.is_empty() {
            return AssetReturns::ZERO;
        }
        let n = self.rows.len() as f64;
        let sum = self.rows.iter().fold([0.0; 3], |acc, r| {
            [acc[0] + r[0], acc[1] + r[1], acc[2] + r[2]]
        });
        AssetReturns {
            equity: sum[0] / n,
            fixed_income: sum[1] / n,
            cash: sum[2] / n,
        }
    }

    /// Circular block bootstrap.
    ///
    /// Blocks of `block_size` consecutive years start at uniformly drawn rows
    /// and wrap past the end of the series. Blocks are concatenated and the
    /// last one is truncated to exactly `n` years.
    pub fn block_bootstrap<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n: usize,
        block_size: usize,
    ) -> Vec<AssetReturns> {
        if self.rows.is_empty() || block_size == 0 {
            return Vec::new();
        }
        let mut result = Vec::with_capacity(n);
        while result.len() < n {
            let start = rng.random_range(0..self.rows.len());
            for i in 0..block_size {
                if result.len() >= n {
                    break;
                }
                let idx = (start + i) % self.rows.len();
                result.push(AssetReturns::from_row(&self.rows[idx]));
            }
        }
        result
    }
}

/// Historical annual returns, one `[equity, fixed_income, cash]` row per year
pub mod historical_returns {
    /// Equity: S&P 500 total return (Robert Shiller, Yale University).
    /// Fixed income: long-term US government bonds (Shiller, estimated from yields).
    /// Cash: 3-month Treasury bills (FRED TB3MS).
    pub const EQUITY_BONDS_BILLS: &[[f64; 3]] = &[
        [0.5318, 0.0526, 0.0028], // 1934
        [-0.0791, 0.0491, 0.0017], // 1935
        [0.5231, 0.0322, 0.0017], // 1936
        [0.3292, 0.0297, 0.0028], // 1937
        [-0.2964, 0.0388, 0.0006], // 1938
        [0.1507, 0.0388, 0.0005], // 1939
        [0.0431, 0.0389, 0.0004], // 1940
        [-0.0719, 0.0135, 0.0013], // 1941
        [-0.0786, -0.0006, 0.0034], // 1942
        [0.1817, 0.0238, 0.0038], // 1943
        [0.2250, 0.0283, 0.0038], // 1944
        [0.1815, 0.0357, 0.0038], // 1945
        [0.3760, 0.0285, 0.0038], // 1946
        [-0.1054, 0.0126, 0.0060], // 1947
        [0.0309, 0.0199, 0.0104], // 1948
        [0.1032, 0.0291, 0.0112], // 1949
        [0.1677, 0.0135, 0.0120], // 1950
        [0.3240, 0.0095, 0.0152], // 1951
        [0.1990, 0.0159, 0.0172], // 1952
        [0.1397, 0.0202, 0.0189], // 1953
        [0.0222, 0.0634, 0.0094], // 1954
        [0.4375, -0.0092, 0.0172], // 1955
        [0.2781, -0.0011, 0.0263], // 1956
        [0.0684, -0.0054, 0.0323], // 1957
        [-0.0571, 0.0630, 0.0177], // 1958
        [0.3839, -0.0482, 0.0339], // 1959
        [0.0780, 0.0607, 0.0288], // 1960
        [0.0587, 0.0599, 0.0235], // 1961
        [0.1897, 0.0338, 0.0277], // 1962
        [-0.0266, 0.0349, 0.0316], // 1963
        [0.2045, 0.0253, 0.0355], // 1964
        [0.1562, 0.0342, 0.0395], // 1965
        [0.1168, -0.0084, 0.0486], // 1966
        [-0.0634, 0.0372, 0.0431], // 1967
        [0.1558, 0.0049, 0.0534], // 1968
        [0.1052, -0.0255, 0.0667], // 1969
        [-0.0765, 0.0125, 0.0639], // 1970
        [0.0667, 0.1686, 0.0433], // 1971
        [0.1332, 0.0575, 0.0407], // 1972
        [0.1763, 0.0115, 0.0703], // 1973
        [-0.1457, 0.0112, 0.0783], // 1974
        [-0.2023, 0.0412, 0.0577], // 1975
        [0.3722, 0.1099, 0.0497], // 1976
        [0.1162, 0.0915, 0.0527], // 1977
        [-0.0793, -0.0051, 0.0719], // 1978
        [0.1570, 0.0015, 0.1007], // 1979
        [0.1623, -0.0670, 0.1143], // 1980
        [0.2494, -0.0815, 0.1402], // 1981
        [-0.0613, 0.2118, 0.1061], // 1982
        [0.2736, 0.2817, 0.0861], // 1983
        [0.1987, 0.0044, 0.0952], // 1984
        [0.0727, 0.2696, 0.0748], // 1985
        [0.2477, 0.3415, 0.0598], // 1986
        [0.3002, 0.0207, 0.0577], // 1987
        [-0.0181, 0.0469, 0.0667], // 1988
        [0.1715, 0.1163, 0.0811], // 1989
        [0.2260, 0.0809, 0.0749], // 1990
        [-0.0102, 0.1408, 0.0537], // 1991
        [0.3080, 0.1464, 0.0343], // 1992
        [0.0737, 0.1610, 0.0300], // 1993
        [0.1147, -0.0378, 0.0425], // 1994
        [0.0084, 0.1108, 0.0549], // 1995
        [0.3421, 0.0771, 0.0501], // 1996
        [0.2645, 0.0712, 0.0506], // 1997
        [0.2720, 0.1506, 0.0478], // 1998
        [0.3087, 0.0228, 0.0464], // 1999
        [0.1532, 0.0250, 0.0582], // 2000
        [-0.0498, 0.1412, 0.0339], // 2001
        [-0.1304, 0.0827, 0.0160], // 2002
        [-0.1972, 0.0938, 0.0101], // 2003
        [0.2807, 0.0194, 0.0137], // 2004
        [0.0606, 0.0415, 0.0315], // 2005
        [0.1004, 0.0028, 0.0473], // 2006
        [0.1316, 0.0609, 0.0435], // 2007
        [-0.0085, 0.1233, 0.0137], // 2008
        [-0.3455, 0.0695, 0.0015], // 2009
        [0.3176, 0.0360, 0.0014], // 2010
        [0.1609, 0.0664, 0.0005], // 2011
        [0.0348, 0.1065, 0.0009], // 2012
        [0.1586, -0.0258, 0.0006], // 2013
        [0.2504, 0.0083, 0.0003], // 2014
        [0.1332, 0.0578, 0.0005], // 2015
        [-0.0327, 0.0449, 0.0032], // 2016
        [0.2052, -0.0206, 0.0093], // 2017
        [0.2449, -0.0231, 0.0194], // 2018
        [-0.0461, 0.0933, 0.0206], // 2019
        [0.2756, 0.1181, 0.0037], // 2020
        [0.1710, -0.0349, 0.0004], // 2021
        [0.2212, -0.1063, 0.0202], // 2022
        [-0.1180, -0.0355, 0.0507], // 2023
    ];
}
