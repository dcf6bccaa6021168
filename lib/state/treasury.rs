//! Custody of the pooled stakes.
//!
//! All contests share one commingled balance. Value enters via
//! [`Dbs::merge`] when a stake is recorded and leaves via [`Dbs::extract`]
//! at settlement. The protocol fee is never transferred anywhere: it is
//! simply the part of the pool that settlement does not extract.

use heed::types::SerdeBincode;
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn, UnitKey};

use crate::{
    custody::Funds,
    state::Error,
    types::{AmountOverflowError, AmountUnderflowError},
};

#[derive(Clone)]
pub struct Dbs {
    /// Single commingled balance.
    balance: DatabaseUnique<UnitKey, SerdeBincode<u64>>,
}

impl Dbs {
    pub const NUM_DBS: u32 = 1;

    pub fn new(env: &Env, rwtxn: &mut RwTxn<'_>) -> Result<Self, Error> {
        Ok(Self {
            balance: DatabaseUnique::create(env, rwtxn, "treasury_balance")?,
        })
    }

    pub fn balance(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        Ok(self.balance.try_get(rotxn, &())?.unwrap_or(0))
    }

    /// Absorb funds into the pool.
    pub(in crate::state) fn merge(
        &self,
        rwtxn: &mut RwTxn<'_>,
        funds: Funds,
    ) -> Result<(), Error> {
        let balance = self.balance(rwtxn)?;
        let balance = balance
            .checked_add(funds.into_value())
            .ok_or(AmountOverflowError)?;
        self.balance.put(rwtxn, &(), &balance)?;
        Ok(())
    }

    /// Remove an exact amount from the pool. Fails with an underflow if the
    /// pool cannot cover it, which fund conservation makes unreachable from
    /// the public operations.
    pub(in crate::state) fn extract(
        &self,
        rwtxn: &mut RwTxn<'_>,
        amount: u64,
    ) -> Result<Funds, Error> {
        let balance = self.balance(rwtxn)?;
        let balance =
            balance.checked_sub(amount).ok_or(AmountUnderflowError)?;
        self.balance.put(rwtxn, &(), &balance)?;
        Ok(Funds::new(amount))
    }
}
