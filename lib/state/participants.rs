//! Per-participant stake index.
//!
//! Each participant has two insertion-ordered maps from contest id to their
//! stake: `active` (unsettled) and `settled` (resolved wins). A ledger is
//! created lazily on the participant's first stake. Losing stakes stay in
//! `active` permanently; only winning stakes migrate at settlement.

use hashlink::LinkedHashMap;
use heed::types::SerdeBincode;
use serde::{Deserialize, Serialize};
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn};

use crate::{
    state::{
        Error,
        contests::{ContestId, Stake},
    },
    types::Address,
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParticipantLedger {
    pub active: LinkedHashMap<ContestId, Stake>,
    pub settled: LinkedHashMap<ContestId, Stake>,
}

#[derive(Clone)]
pub struct Dbs {
    /// Address -> ParticipantLedger
    ledgers: DatabaseUnique<SerdeBincode<Address>, SerdeBincode<ParticipantLedger>>,
}

impl Dbs {
    pub const NUM_DBS: u32 = 1;

    pub fn new(env: &Env, rwtxn: &mut RwTxn<'_>) -> Result<Self, Error> {
        Ok(Self {
            ledgers: DatabaseUnique::create(env, rwtxn, "participant_ledgers")?,
        })
    }

    /// Unsettled stakes in insertion order. Empty for unknown participants,
    /// never an error.
    pub fn active_stakes(
        &self,
        rotxn: &RoTxn,
        participant: &Address,
    ) -> Result<Vec<Stake>, Error> {
        let ledger =
            self.ledgers.try_get(rotxn, participant)?.unwrap_or_default();
        Ok(ledger.active.values().cloned().collect())
    }

    /// Settled (winning) stakes in settlement order. Empty for unknown
    /// participants, never an error.
    pub fn settled_stakes(
        &self,
        rotxn: &RoTxn,
        participant: &Address,
    ) -> Result<Vec<Stake>, Error> {
        let ledger =
            self.ledgers.try_get(rotxn, participant)?.unwrap_or_default();
        Ok(ledger.settled.values().cloned().collect())
    }

    /// Record a fresh stake in the participant's `active` map, creating the
    /// ledger on first use.
    pub(in crate::state) fn record_active(
        &self,
        rwtxn: &mut RwTxn<'_>,
        stake: Stake,
    ) -> Result<(), Error> {
        let participant = stake.participant;
        let mut ledger = self
            .ledgers
            .try_get(rwtxn, &participant)?
            .unwrap_or_default();
        ledger.active.insert(stake.contest_id, stake);
        self.ledgers.put(rwtxn, &participant, &ledger)?;
        Ok(())
    }

    /// Move the entry for `contest_id` from `active` to `settled`. Removal
    /// shifts later entries up; the relative order of the participant's
    /// other stakes is preserved.
    pub(in crate::state) fn mark_settled(
        &self,
        rwtxn: &mut RwTxn<'_>,
        participant: &Address,
        contest_id: ContestId,
    ) -> Result<(), Error> {
        let mut ledger = self
            .ledgers
            .try_get(rwtxn, participant)?
            .unwrap_or_default();
        let Some(stake) = ledger.active.remove(&contest_id) else {
            return Err(Error::DatabaseError(format!(
                "winning stake of {participant} in contest {contest_id} \
                 missing from active ledger"
            )));
        };
        ledger.settled.insert(contest_id, stake);
        self.ledgers.put(rwtxn, participant, &ledger)?;
        Ok(())
    }
}
