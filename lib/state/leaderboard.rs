//! Winners view derived from settled contests.
//!
//! Recomputed fully on each call: no cache to invalidate, and the settled
//! contest set only ever grows. A participant appears once per contest won,
//! so duplicates are expected.

use sneed::RoTxn;

use crate::{
    state::{Error, contests},
    types::Address,
};

/// Every winning participant across all settled contests, in contest id
/// order, then stake insertion order within a contest.
pub fn compute(
    rotxn: &RoTxn,
    contests: &contests::Dbs,
) -> Result<Vec<Address>, Error> {
    let mut winners = Vec::new();
    for contest in contests.all(rotxn)? {
        if !contest.settled {
            continue;
        }
        winners.extend(contest.winning_stakes().map(|s| s.participant));
    }
    Ok(winners)
}
