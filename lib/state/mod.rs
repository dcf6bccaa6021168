//! The settlement ledger state machine.
//!
//! [`State`] owns every database: the contest registry, the treasury and
//! the per-participant stake index. Methods take explicit read or write
//! transactions; a write transaction is committed by the caller only after
//! the whole operation has succeeded, which is what makes each public
//! operation atomic. [`crate::ledger::Ledger`] is the transaction driver.

use heed::types::SerdeBincode;
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn, UnitKey};

use crate::{
    custody::Funds,
    types::{Address, AmountOverflowError},
    util::Watchable,
};

pub mod contests;
pub mod error;
pub mod leaderboard;
pub mod participants;
pub mod treasury;

pub use contests::{Contest, ContestId, Outcome, Stake, split_outcome_names};
pub use error::Error;
pub use participants::ParticipantLedger;

/// One winner's share of a settled pool, extracted from the treasury but
/// not yet deposited to the participant's custody.
#[derive(Debug)]
pub struct FundsPayout {
    pub participant: Address,
    pub funds: Funds,
}

/// Result of settling a contest inside a write transaction. The funds in
/// `payouts` must be deposited to the participants' custody once the
/// transaction has committed.
#[derive(Debug)]
pub struct Settlement {
    pub contest_id: ContestId,
    pub declared_outcome: u32,
    pub pool_total: u64,
    pub fee: u64,
    pub payout_per_winner: u64,
    pub payouts: Vec<FundsPayout>,
}

#[derive(Clone)]
pub struct State {
    /// Address allowed to create, declare and settle contests.
    authority: DatabaseUnique<UnitKey, SerdeBincode<Address>>,
    contests: contests::Dbs,
    participants: participants::Dbs,
    treasury: treasury::Dbs,
}

impl State {
    pub const NUM_DBS: u32 = contests::Dbs::NUM_DBS
        + participants::Dbs::NUM_DBS
        + treasury::Dbs::NUM_DBS
        + 1;

    pub fn new(env: &Env, rwtxn: &mut RwTxn<'_>) -> Result<Self, Error> {
        Ok(Self {
            authority: DatabaseUnique::create(env, rwtxn, "authority")?,
            contests: contests::Dbs::new(env, rwtxn)?,
            participants: participants::Dbs::new(env, rwtxn)?,
            treasury: treasury::Dbs::new(env, rwtxn)?,
        })
    }

    /// Store the authority on first initialization. Reopening an existing
    /// data directory keeps the stored authority.
    pub(crate) fn init_authority(
        &self,
        rwtxn: &mut RwTxn<'_>,
        authority: Address,
    ) -> Result<Address, Error> {
        if let Some(existing) = self.authority.try_get(rwtxn, &())? {
            return Ok(existing);
        }
        self.authority.put(rwtxn, &(), &authority)?;
        Ok(authority)
    }

    fn require_authority(
        &self,
        rotxn: &RoTxn,
        caller: Address,
    ) -> Result<(), Error> {
        match self.authority.try_get(rotxn, &())? {
            Some(authority) if authority == caller => Ok(()),
            _ => Err(Error::NotAuthorized { caller }),
        }
    }

    /// Create a contest with outcomes numbered `0..n` in input order.
    pub fn create_contest(
        &self,
        rwtxn: &mut RwTxn<'_>,
        caller: Address,
        title: String,
        prediction_close: u64,
        contest_close: u64,
        entry_price: u64,
        outcome_names: Vec<String>,
    ) -> Result<Contest, Error> {
        self.require_authority(rwtxn, caller)?;
        self.contests.create(
            rwtxn,
            title,
            prediction_close,
            contest_close,
            entry_price,
            outcome_names,
        )
    }

    /// Checks 1-6 of the stake operation, in order. Returns the entry price
    /// the caller must withdraw from the participant's custody before
    /// applying the stake.
    pub fn validate_stake(
        &self,
        rotxn: &RoTxn,
        participant: Address,
        contest_id: ContestId,
        outcome_id: u32,
        amount: u64,
        now: u64,
    ) -> Result<u64, Error> {
        let contest = self.contests.get(rotxn, contest_id)?;
        if now > contest.prediction_close {
            return Err(Error::PredictionWindowClosed {
                contest: contest_id,
                closed_at: contest.prediction_close,
                now,
            });
        }
        // The window check above fires first whenever both deadlines have
        // passed, so this guard only matters if the deadline invariant is
        // ever violated.
        if now > contest.contest_close {
            return Err(Error::ContestEnded {
                contest: contest_id,
                ended_at: contest.contest_close,
                now,
            });
        }
        if !contest.has_outcome(outcome_id) {
            return Err(Error::InvalidOutcome {
                contest: contest_id,
                outcome: outcome_id,
            });
        }
        if contest.stake_by(&participant).is_some() {
            return Err(Error::DuplicateStake {
                contest: contest_id,
                participant,
            });
        }
        if amount < contest.entry_price {
            return Err(Error::InsufficientAmount {
                required: contest.entry_price,
                provided: amount,
            });
        }
        Ok(contest.entry_price)
    }

    /// Record a validated stake: pool the withdrawn entry price, append the
    /// stake, bump the outcome's counter and index the stake as active.
    /// `funds` must hold exactly the contest's entry price.
    pub fn apply_stake(
        &self,
        rwtxn: &mut RwTxn<'_>,
        participant: Address,
        contest_id: ContestId,
        outcome_id: u32,
        amount: u64,
        now: u64,
        funds: Funds,
    ) -> Result<Stake, Error> {
        let mut contest = self.contests.get(rwtxn, contest_id)?;
        debug_assert_eq!(funds.value(), contest.entry_price);
        let entry_price = funds.value();
        self.treasury.merge(rwtxn, funds)?;
        contest.pool_total = contest
            .pool_total
            .checked_add(entry_price)
            .ok_or(AmountOverflowError)?;
        let outcome = contest.outcomes.get_mut(outcome_id as usize).ok_or(
            Error::InvalidOutcome {
                contest: contest_id,
                outcome: outcome_id,
            },
        )?;
        outcome.stake_count += 1;
        let stake = Stake {
            contest_id,
            participant,
            outcome_id,
            amount,
            placed_at: now,
        };
        contest.stakes.push(stake.clone());
        self.contests.put(rwtxn, &contest)?;
        self.participants.record_active(rwtxn, stake.clone())?;
        tracing::debug!(
            "recorded stake by {} on outcome {} of contest {}",
            participant,
            outcome_id,
            contest_id
        );
        Ok(stake)
    }

    /// Declare the winning outcome. Allowed once, only after contest close.
    /// No funds move.
    pub fn declare_outcome(
        &self,
        rwtxn: &mut RwTxn<'_>,
        caller: Address,
        contest_id: ContestId,
        outcome_id: u32,
        now: u64,
    ) -> Result<(), Error> {
        self.require_authority(rwtxn, caller)?;
        let mut contest = self.contests.get(rwtxn, contest_id)?;
        if now < contest.contest_close {
            return Err(Error::ContestNotYetEnded {
                contest: contest_id,
                ends_at: contest.contest_close,
                now,
            });
        }
        if let Some(declared) = contest.declared_outcome {
            return Err(Error::OutcomeAlreadyDeclared {
                contest: contest_id,
                declared,
            });
        }
        if !contest.has_outcome(outcome_id) {
            return Err(Error::InvalidOutcome {
                contest: contest_id,
                outcome: outcome_id,
            });
        }
        contest.declared_outcome = Some(outcome_id);
        self.contests.put(rwtxn, &contest)?;
        tracing::debug!(
            "declared outcome {} for contest {}",
            outcome_id,
            contest_id
        );
        Ok(())
    }

    /// Settle a declared contest: retain `pool_total / 100` as the protocol
    /// fee, split the remainder evenly over the winning stakes in insertion
    /// order, and migrate each winner's ledger entry to `settled`. The
    /// division remainder stays in the treasury along with the fee.
    ///
    /// Runs entirely inside `rwtxn`; if the caller fails to commit, no
    /// payout is observable.
    pub fn settle(
        &self,
        rwtxn: &mut RwTxn<'_>,
        caller: Address,
        contest_id: ContestId,
    ) -> Result<Settlement, Error> {
        self.require_authority(rwtxn, caller)?;
        let mut contest = self.contests.get(rwtxn, contest_id)?;
        let declared = contest.declared_outcome.ok_or(
            Error::OutcomeNotDeclared {
                contest: contest_id,
            },
        )?;
        if contest.settled {
            return Err(Error::AlreadySettled {
                contest: contest_id,
            });
        }
        let winners: Vec<Stake> =
            contest.winning_stakes().cloned().collect();
        if winners.is_empty() {
            // No refund path: the whole pool stays in the treasury and the
            // contest remains unsettled.
            return Err(Error::NoWinningStakes {
                contest: contest_id,
                outcome: declared,
            });
        }
        let fee = contest.pool_total / 100;
        let distributable = contest.pool_total - fee;
        let payout_per_winner = distributable / winners.len() as u64;
        let mut payouts = Vec::with_capacity(winners.len());
        for stake in &winners {
            let funds = self.treasury.extract(rwtxn, payout_per_winner)?;
            self.participants.mark_settled(
                rwtxn,
                &stake.participant,
                contest_id,
            )?;
            payouts.push(FundsPayout {
                participant: stake.participant,
                funds,
            });
        }
        contest.settled = true;
        self.contests.put(rwtxn, &contest)?;
        tracing::debug!(
            "settled contest {}: {} winners, {} each, fee {}",
            contest_id,
            payouts.len(),
            payout_per_winner,
            fee
        );
        Ok(Settlement {
            contest_id,
            declared_outcome: declared,
            pool_total: contest.pool_total,
            fee,
            payout_per_winner,
            payouts,
        })
    }

    pub fn contest(
        &self,
        rotxn: &RoTxn,
        contest_id: ContestId,
    ) -> Result<Contest, Error> {
        self.contests.get(rotxn, contest_id)
    }

    pub fn list_open(
        &self,
        rotxn: &RoTxn,
        now: u64,
    ) -> Result<Vec<Contest>, Error> {
        self.contests.list_open(rotxn, now)
    }

    pub fn active_stakes(
        &self,
        rotxn: &RoTxn,
        participant: &Address,
    ) -> Result<Vec<Stake>, Error> {
        self.participants.active_stakes(rotxn, participant)
    }

    pub fn settled_stakes(
        &self,
        rotxn: &RoTxn,
        participant: &Address,
    ) -> Result<Vec<Stake>, Error> {
        self.participants.settled_stakes(rotxn, participant)
    }

    pub fn leaderboard(&self, rotxn: &RoTxn) -> Result<Vec<Address>, Error> {
        leaderboard::compute(rotxn, &self.contests)
    }

    pub fn treasury_balance(&self, rotxn: &RoTxn) -> Result<u64, Error> {
        self.treasury.balance(rotxn)
    }
}

impl Watchable<()> for State {
    type WatchStream = tokio_stream::wrappers::WatchStream<()>;

    /// Get a signal that notifies whenever contest state changes.
    fn watch(&self) -> Self::WatchStream {
        tokio_stream::wrappers::WatchStream::new(
            self.contests.watch().clone(),
        )
    }
}
