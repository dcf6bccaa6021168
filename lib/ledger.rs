//! Public operation surface of the settlement ledger.
//!
//! [`Ledger`] owns the database environment, the [`State`] machine and the
//! funds-custody collaborator. Every operation runs as one database
//! transaction: the first violated precondition aborts with nothing
//! committed, and LMDB's single-writer discipline serializes concurrent
//! mutating calls, so two racing stakes by the same participant cannot both
//! pass the duplicate check and a contest cannot settle twice.

use std::{path::Path, sync::Arc};

use parking_lot::Mutex;
use sneed::Env;

use crate::{
    custody::{Funds, FundsCustody},
    state::{Contest, ContestId, Error, Stake, State, split_outcome_names},
    types::Address,
    util::Watchable,
};

/// Database map size. Contests are small records; this leaves generous
/// headroom.
const ENV_MAP_SIZE: usize = 1024 * 1024 * 256;

/// A completed transfer of winnings to one participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payout {
    pub participant: Address,
    pub amount: u64,
}

pub struct Ledger<C> {
    env: Env,
    state: State,
    custody: Arc<Mutex<C>>,
}

// A derived impl would bound `C: Clone`; only the shared handle to the
// custodian is cloned.
impl<C> Clone for Ledger<C> {
    fn clone(&self) -> Self {
        Self {
            env: self.env.clone(),
            state: self.state.clone(),
            custody: self.custody.clone(),
        }
    }
}

impl<C> Ledger<C>
where
    C: FundsCustody,
{
    /// Open (or create) the ledger under `datadir` and store `authority` if
    /// this is the first initialization. Reopening an existing directory
    /// restores all contests, ledgers and the treasury, and keeps the
    /// originally stored authority.
    pub fn new(
        datadir: &Path,
        authority: Address,
        custody: C,
    ) -> Result<Self, Error> {
        let env_path = datadir.join("data.mdb");
        std::fs::create_dir_all(&env_path)?;
        let env = {
            let mut env_open_opts = heed::EnvOpenOptions::new();
            env_open_opts
                .map_size(ENV_MAP_SIZE)
                .max_dbs(State::NUM_DBS);
            unsafe { Env::open(&env_open_opts, &env_path) }?
        };
        let mut rwtxn = env.write_txn()?;
        let state = State::new(&env, &mut rwtxn)?;
        let authority = state.init_authority(&mut rwtxn, authority)?;
        rwtxn.commit()?;
        tracing::info!(%authority, "settlement ledger opened");
        Ok(Self {
            env,
            state,
            custody: Arc::new(Mutex::new(custody)),
        })
    }

    /// Shared handle to the custody collaborator.
    pub fn custody(&self) -> Arc<Mutex<C>> {
        self.custody.clone()
    }

    /// Create a contest. Authority only.
    pub fn create_contest(
        &self,
        caller: Address,
        title: &str,
        prediction_close: u64,
        contest_close: u64,
        entry_price: u64,
        outcome_names: Vec<String>,
    ) -> Result<ContestId, Error> {
        let mut rwtxn = self.env.write_txn()?;
        let contest = self.state.create_contest(
            &mut rwtxn,
            caller,
            title.to_owned(),
            prediction_close,
            contest_close,
            entry_price,
            outcome_names,
        )?;
        rwtxn.commit()?;
        tracing::info!(
            event = "contest_created",
            contest = %contest.id,
            title = %contest.title,
            outcomes = contest.outcomes.len(),
            entry_price = contest.entry_price,
            "contest created"
        );
        Ok(contest.id)
    }

    /// Create a contest from a comma-delimited outcome list. See
    /// [`split_outcome_names`] for the exact delimiter semantics.
    pub fn create_contest_from_csv(
        &self,
        caller: Address,
        title: &str,
        prediction_close: u64,
        contest_close: u64,
        entry_price: u64,
        names_csv: &str,
    ) -> Result<ContestId, Error> {
        self.create_contest(
            caller,
            title,
            prediction_close,
            contest_close,
            entry_price,
            split_outcome_names(names_csv),
        )
    }

    /// Stake `amount` on an outcome. Exactly the contest's entry price is
    /// withdrawn from the participant's custody; any surplus never leaves
    /// their account. A custody refusal or any later fault aborts the whole
    /// operation with the participant's balance restored.
    pub fn stake(
        &self,
        participant: Address,
        contest_id: ContestId,
        outcome_id: u32,
        amount: u64,
        now: u64,
    ) -> Result<(), Error> {
        let mut rwtxn = self.env.write_txn()?;
        let entry_price = self.state.validate_stake(
            &rwtxn,
            participant,
            contest_id,
            outcome_id,
            amount,
            now,
        )?;
        let mut custody = self.custody.lock();
        let funds = custody.withdraw(participant, entry_price)?;
        let applied = self.state.apply_stake(
            &mut rwtxn,
            participant,
            contest_id,
            outcome_id,
            amount,
            now,
            funds,
        );
        let commit_result = applied.and_then(|_| Ok(rwtxn.commit()?));
        if let Err(err) = commit_result {
            // Nothing was recorded; return the withdrawn funds.
            custody.deposit(participant, Funds::new(entry_price));
            return Err(err);
        }
        drop(custody);
        tracing::info!(
            event = "stake_recorded",
            contest = %contest_id,
            participant = %participant,
            outcome = outcome_id,
            entry_price,
            offered = amount,
            "stake recorded"
        );
        Ok(())
    }

    /// Declare the winning outcome of an ended contest. Authority only.
    pub fn declare_outcome(
        &self,
        caller: Address,
        contest_id: ContestId,
        outcome_id: u32,
        now: u64,
    ) -> Result<(), Error> {
        let mut rwtxn = self.env.write_txn()?;
        self.state
            .declare_outcome(&mut rwtxn, caller, contest_id, outcome_id, now)?;
        rwtxn.commit()?;
        tracing::info!(
            event = "outcome_declared",
            contest = %contest_id,
            outcome = outcome_id,
            "outcome declared"
        );
        Ok(())
    }

    /// Settle a declared contest and pay every winner. Authority only.
    /// Custody deposits happen strictly after the state transaction has
    /// committed, so a fault never leaves a partial payout observable.
    pub fn settle(
        &self,
        caller: Address,
        contest_id: ContestId,
    ) -> Result<Vec<Payout>, Error> {
        let mut rwtxn = self.env.write_txn()?;
        let settlement = self.state.settle(&mut rwtxn, caller, contest_id)?;
        rwtxn.commit()?;
        let mut payouts = Vec::with_capacity(settlement.payouts.len());
        let mut custody = self.custody.lock();
        for payout in settlement.payouts {
            let amount = payout.funds.value();
            custody.deposit(payout.participant, payout.funds);
            tracing::info!(
                event = "payout_made",
                contest = %contest_id,
                participant = %payout.participant,
                amount,
                "payout made"
            );
            payouts.push(Payout {
                participant: payout.participant,
                amount,
            });
        }
        Ok(payouts)
    }

    pub fn contest(&self, contest_id: ContestId) -> Result<Contest, Error> {
        let rotxn = self.env.read_txn()?;
        self.state.contest(&rotxn, contest_id)
    }

    /// Contests with `now <= contest_close` that are not settled, in
    /// ascending id order.
    pub fn list_open(&self, now: u64) -> Result<Vec<Contest>, Error> {
        let rotxn = self.env.read_txn()?;
        self.state.list_open(&rotxn, now)
    }

    pub fn active_stakes(
        &self,
        participant: &Address,
    ) -> Result<Vec<Stake>, Error> {
        let rotxn = self.env.read_txn()?;
        self.state.active_stakes(&rotxn, participant)
    }

    pub fn settled_stakes(
        &self,
        participant: &Address,
    ) -> Result<Vec<Stake>, Error> {
        let rotxn = self.env.read_txn()?;
        self.state.settled_stakes(&rotxn, participant)
    }

    /// Winners of all settled contests, duplicates included, in contest
    /// then stake order. Recomputed on every call.
    pub fn leaderboard(&self) -> Result<Vec<Address>, Error> {
        let rotxn = self.env.read_txn()?;
        self.state.leaderboard(&rotxn)
    }

    pub fn treasury_balance(&self) -> Result<u64, Error> {
        let rotxn = self.env.read_txn()?;
        self.state.treasury_balance(&rotxn)
    }
}

impl<C> Watchable<()> for Ledger<C> {
    type WatchStream = <State as Watchable<()>>::WatchStream;

    /// Get a signal that notifies whenever contest state changes.
    fn watch(&self) -> Self::WatchStream {
        self.state.watch()
    }
}
