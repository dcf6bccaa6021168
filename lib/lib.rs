//! Pari-mutuel prediction contest settlement.
//!
//! An authority creates contests with a fixed entry price and a closed set
//! of outcomes. Participants stake exactly one entry per contest while the
//! prediction window is open; entries are pooled in a shared treasury. Once
//! the contest ends the authority declares the winning outcome and settles:
//! a 1% fee is retained and the remainder is split evenly among the stakes
//! on the winning outcome.
//!
//! [`Ledger`] is the operation surface; it persists everything in LMDB and
//! moves value through the host-provided [`FundsCustody`] implementation.

pub mod custody;
pub mod ledger;
pub mod state;
pub mod types;
pub mod util;

pub use crate::{
    custody::{Funds, FundsCustody, MemoryCustody, WithdrawError},
    ledger::{Ledger, Payout},
    state::{
        Contest, ContestId, Error, Outcome, Stake, State, split_outcome_names,
    },
    types::Address,
    util::Watchable,
};
