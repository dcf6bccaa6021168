//! Funds-custody boundary.
//!
//! The ledger never manipulates raw balances directly: value moves as a
//! [`Funds`] token that a custodian mints when value leaves its books (a
//! withdrawal, or an extraction from the treasury pool) and that a deposit
//! or merge consumes. The token is neither `Clone` nor `Copy`, so every
//! unit of value has exactly one home at any point in the program.

use std::collections::HashMap;

use thiserror::Error;

use crate::types::Address;

/// A quantity of value in transit between custody locations.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct Funds(u64);

impl Funds {
    /// Mint a token for value leaving a custodian's books. Custody
    /// implementations call this at their withdrawal site; nothing else
    /// should.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Consume the token, releasing its value to the receiving custodian.
    pub fn into_value(self) -> u64 {
        self.0
    }

    /// Absorb another token into this one.
    pub fn merge(&mut self, other: Funds) {
        self.0 = self.0.saturating_add(other.into_value());
    }
}

#[derive(Debug, Error)]
pub enum WithdrawError {
    #[error(
        "custody refused withdrawal of {requested} from {account}: \
         available {available}"
    )]
    InsufficientBalance {
        account: Address,
        requested: u64,
        available: u64,
    },
}

/// The opaque funds-custody primitive consumed from the hosting environment.
///
/// `withdraw` may refuse (insufficient balance); `deposit` never fails.
pub trait FundsCustody {
    fn withdraw(
        &mut self,
        account: Address,
        amount: u64,
    ) -> Result<Funds, WithdrawError>;

    fn deposit(&mut self, account: Address, funds: Funds);
}

/// In-process custody backed by a plain balance map. Reference
/// implementation for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryCustody {
    balances: HashMap<Address, u64>,
}

impl MemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with spendable balance.
    pub fn credit(&mut self, account: Address, amount: u64) {
        let balance = self.balances.entry(account).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance(&self, account: &Address) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }
}

impl FundsCustody for MemoryCustody {
    fn withdraw(
        &mut self,
        account: Address,
        amount: u64,
    ) -> Result<Funds, WithdrawError> {
        let available = self.balance(&account);
        if available < amount {
            return Err(WithdrawError::InsufficientBalance {
                account,
                requested: amount,
                available,
            });
        }
        self.balances.insert(account, available - amount);
        Ok(Funds::new(amount))
    }

    fn deposit(&mut self, account: Address, funds: Funds) {
        let balance = self.balances.entry(account).or_insert(0);
        *balance = balance.saturating_add(funds.into_value());
    }
}
