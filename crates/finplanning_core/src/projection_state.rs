//! Mutable household state carried from one projection year to the next

use rustc_hash::FxHashMap;

use crate::model::{AccountId, AccountType, HouseholdPlan, Owner};

/// Balance of one account during a projection
#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub id: AccountId,
    pub account_type: AccountType,
    pub owner: Owner,
    pub balance: f64,
    /// Adjusted cost base; only meaningful for non-registered accounts
    pub cost_basis: f64,
}

/// Amount actually taken from an account and the gain it realised
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Withdrawal {
    pub amount: f64,
    pub realized_gain: f64,
}

impl AccountState {
    /// Withdraw up to `requested`, never taking the balance below zero.
    ///
    /// Non-registered withdrawals realise the unrealised gain pro rata and
    /// reduce the cost base by the same fraction.
    pub fn withdraw(&mut self, requested: f64) -> Withdrawal {
        let amount = requested.min(self.balance).max(0.0);
        if amount <= 0.0 {
            return Withdrawal::default();
        }

        let mut realized_gain = 0.0;
        if self.account_type == AccountType::NonRegistered {
            let fraction = amount / self.balance;
            let gain = (self.balance - self.cost_basis).max(0.0);
            realized_gain = gain * fraction;
            self.cost_basis -= self.cost_basis * fraction;
        }

        self.balance -= amount;
        if self.balance < 1e-9 {
            self.balance = 0.0;
            self.cost_basis = 0.0;
        }
        Withdrawal {
            amount,
            realized_gain,
        }
    }

    pub fn deposit(&mut self, amount: f64) {
        if amount <= 0.0 {
            return;
        }
        self.balance += amount;
        if self.account_type == AccountType::NonRegistered {
            self.cost_basis += amount;
        }
    }

    /// Apply a year's growth; a balance never goes negative
    pub fn grow(&mut self, rate: f64) {
        self.balance = (self.balance * (1.0 + rate)).max(0.0);
    }
}

/// Account balances and household cash at the start of a year
#[derive(Debug, Clone, PartialEq)]
pub struct HouseholdState {
    pub year: i16,
    pub accounts: Vec<AccountState>,
    /// Unallocated surplus held outside the plan's accounts
    pub cash: f64,
    index: FxHashMap<AccountId, usize>,
}

impl HouseholdState {
    /// Opening state for `start_year` taken from the plan's balances
    pub fn from_plan(plan: &HouseholdPlan, start_year: i16) -> Self {
        let accounts: Vec<AccountState> = plan
            .accounts
            .iter()
            .map(|a| AccountState {
                id: a.id.clone(),
                account_type: a.account_type,
                owner: a.owner,
                balance: a.balance,
                cost_basis: a.cost_basis.unwrap_or(a.balance),
            })
            .collect();
        let index = accounts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();
        Self {
            year: start_year,
            accounts,
            cash: 0.0,
            index,
        }
    }

    pub fn account_index(&self, id: &AccountId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn account_mut(&mut self, id: &AccountId) -> Option<&mut AccountState> {
        let idx = self.account_index(id)?;
        self.accounts.get_mut(idx)
    }

    pub fn total_balance(&self) -> f64 {
        self.accounts.iter().map(|a| a.balance).sum()
    }

    pub fn net_worth(&self) -> f64 {
        self.total_balance() + self.cash
    }

    /// Sum of balances whose type satisfies `pred`
    pub fn balance_where(&self, pred: impl Fn(AccountType) -> bool) -> f64 {
        self.accounts
            .iter()
            .filter(|a| pred(a.account_type))
            .map(|a| a.balance)
            .sum()
    }

    /// Convert RRSPs to RRIFs and LIRAs to LIFs for owners at or past the
    /// conversion age.
    pub fn convert_matured(&mut self, owner_age: impl Fn(Owner) -> Option<u8>, conversion_age: u8) {
        for account in &mut self.accounts {
            let Some(target) = account.account_type.converts_to() else {
                continue;
            };
            if owner_age(account.owner).is_some_and(|age| age >= conversion_age) {
                account.account_type = target;
            }
        }
    }
}
