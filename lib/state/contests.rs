//! Contest records and the registry database.
//!
//! A [`Contest`] is never deleted; settled contests persist as audit
//! records. Identifiers are sequential from zero, assigned from a counter
//! database under the same transaction that stores the new contest.

use std::fmt;

use fallible_iterator::FallibleIterator;
use heed::types::SerdeBincode;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sneed::{DatabaseUnique, Env, RoTxn, RwTxn, UnitKey};

use crate::{state::Error, types::Address};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub struct ContestId(pub u64);

impl fmt::Display for ContestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the mutually exclusive options participants can stake on.
/// `id` is the ordinal index within its contest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub id: u32,
    pub name: String,
    pub stake_count: u64,
}

/// A participant's single binding bet on one outcome in one contest.
/// Immutable after creation; only its location in the participant ledger
/// (active vs settled) ever changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub contest_id: ContestId,
    pub participant: Address,
    pub outcome_id: u32,
    /// Amount offered by the participant. Only `entry_price` is ever
    /// withdrawn; any surplus stays in the participant's custody.
    pub amount: u64,
    pub placed_at: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub title: String,
    /// No new stakes after this timestamp.
    pub prediction_close: u64,
    /// Outcome may be declared only after this timestamp.
    pub contest_close: u64,
    pub entry_price: u64,
    /// Ordered; index equals `Outcome::id`.
    pub outcomes: Vec<Outcome>,
    /// Insertion order; payout iteration and the leaderboard depend on it.
    pub stakes: Vec<Stake>,
    pub pool_total: u64,
    pub declared_outcome: Option<u32>,
    pub settled: bool,
}

impl Contest {
    fn new(
        id: ContestId,
        title: String,
        prediction_close: u64,
        contest_close: u64,
        entry_price: u64,
        outcome_names: Vec<String>,
    ) -> Self {
        let outcomes = outcome_names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| Outcome {
                id: idx as u32,
                name,
                stake_count: 0,
            })
            .collect();
        Self {
            id,
            title,
            prediction_close,
            contest_close,
            entry_price,
            outcomes,
            stakes: Vec::new(),
            pool_total: 0,
            declared_outcome: None,
            settled: false,
        }
    }

    pub fn outcome_declared(&self) -> bool {
        self.declared_outcome.is_some()
    }

    /// Still accepting activity: not yet past contest close and not settled.
    pub fn is_open(&self, now: u64) -> bool {
        now <= self.contest_close && !self.settled
    }

    pub fn has_outcome(&self, outcome_id: u32) -> bool {
        (outcome_id as usize) < self.outcomes.len()
    }

    /// First stake placed by `participant`, if any. Linear scan; the
    /// duplicate-stake invariant keeps matches unique anyway.
    pub fn stake_by(&self, participant: &Address) -> Option<&Stake> {
        self.stakes.iter().find(|s| s.participant == *participant)
    }

    /// Stakes on the declared outcome, in insertion order. Empty if no
    /// outcome has been declared.
    pub fn winning_stakes(&self) -> impl Iterator<Item = &Stake> {
        self.stakes
            .iter()
            .filter(|s| Some(s.outcome_id) == self.declared_outcome)
    }
}

/// Split a comma-delimited outcome list.
///
/// Compatibility shim for upstream callers: segments are not trimmed, only
/// fully-empty segments (consecutive, leading or trailing delimiters) are
/// dropped, and order is preserved. A whitespace-only segment is kept
/// verbatim.
pub fn split_outcome_names(csv: &str) -> Vec<String> {
    csv.split(',')
        .filter(|segment| !segment.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Clone)]
pub struct Dbs {
    /// ContestId -> Contest
    contests: DatabaseUnique<SerdeBincode<ContestId>, SerdeBincode<Contest>>,
    /// Next sequential contest id
    next_id: DatabaseUnique<UnitKey, SerdeBincode<u64>>,
}

impl Dbs {
    pub const NUM_DBS: u32 = 2;

    pub fn new(env: &Env, rwtxn: &mut RwTxn<'_>) -> Result<Self, Error> {
        Ok(Self {
            contests: DatabaseUnique::create(env, rwtxn, "contests")?,
            next_id: DatabaseUnique::create(env, rwtxn, "contests_next_id")?,
        })
    }

    /// Validate creation parameters, assign the next id and store the new
    /// contest. Authority is checked by the caller.
    pub(in crate::state) fn create(
        &self,
        rwtxn: &mut RwTxn<'_>,
        title: String,
        prediction_close: u64,
        contest_close: u64,
        entry_price: u64,
        outcome_names: Vec<String>,
    ) -> Result<Contest, Error> {
        if outcome_names.is_empty() {
            return Err(Error::NoOutcomes);
        }
        if prediction_close > contest_close {
            return Err(Error::InvalidDeadlines {
                prediction_close,
                contest_close,
            });
        }
        if entry_price == 0 {
            return Err(Error::ZeroEntryPrice);
        }
        let next = self.next_id.try_get(rwtxn, &())?.unwrap_or(0);
        let contest = Contest::new(
            ContestId(next),
            title,
            prediction_close,
            contest_close,
            entry_price,
            outcome_names,
        );
        self.contests.put(rwtxn, &contest.id, &contest)?;
        self.next_id.put(rwtxn, &(), &(next + 1))?;
        tracing::debug!(
            "created contest {} with {} outcomes",
            contest.id,
            contest.outcomes.len()
        );
        Ok(contest)
    }

    pub fn try_get(
        &self,
        rotxn: &RoTxn,
        id: ContestId,
    ) -> Result<Option<Contest>, Error> {
        Ok(self.contests.try_get(rotxn, &id)?)
    }

    pub fn get(&self, rotxn: &RoTxn, id: ContestId) -> Result<Contest, Error> {
        self.try_get(rotxn, id)?
            .ok_or(Error::ContestNotFound { id })
    }

    pub(in crate::state) fn put(
        &self,
        rwtxn: &mut RwTxn<'_>,
        contest: &Contest,
    ) -> Result<(), Error> {
        self.contests.put(rwtxn, &contest.id, contest)?;
        Ok(())
    }

    /// All contests in ascending id order.
    pub fn all(&self, rotxn: &RoTxn) -> Result<Vec<Contest>, Error> {
        let contests: Vec<Contest> =
            self.contests.iter(rotxn)?.map(|(_, c)| Ok(c)).collect()?;
        Ok(contests.into_iter().sorted_by_key(|c| c.id).collect())
    }

    /// Contests still accepting activity at `now`, ascending id order.
    pub fn list_open(
        &self,
        rotxn: &RoTxn,
        now: u64,
    ) -> Result<Vec<Contest>, Error> {
        let open = self
            .all(rotxn)?
            .into_iter()
            .filter(|c| c.is_open(now))
            .collect();
        Ok(open)
    }

    pub(in crate::state) fn watch(
        &self,
    ) -> &tokio::sync::watch::Receiver<()> {
        self.contests.watch()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_only_fully_empty_segments() {
        assert_eq!(
            split_outcome_names("red,blue,green"),
            vec!["red", "blue", "green"]
        );
        // Consecutive, leading and trailing delimiters are skipped.
        assert_eq!(split_outcome_names(",red,,blue,"), vec!["red", "blue"]);
        // Whitespace-only segments are kept verbatim, untrimmed.
        assert_eq!(
            split_outcome_names("red, ,blue "),
            vec!["red", " ", "blue "]
        );
        assert!(split_outcome_names("").is_empty());
        assert!(split_outcome_names(",,,").is_empty());
    }

    #[test]
    fn contest_open_window() {
        let contest = Contest::new(
            ContestId(0),
            "final".to_owned(),
            100,
            200,
            10,
            vec!["a".to_owned(), "b".to_owned()],
        );
        assert!(contest.is_open(0));
        assert!(contest.is_open(200));
        assert!(!contest.is_open(201));
        assert!(contest.has_outcome(1));
        assert!(!contest.has_outcome(2));
        assert_eq!(contest.outcomes[1].name, "b");
        assert_eq!(contest.outcomes[1].id, 1);
    }
}
