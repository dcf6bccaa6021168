//! Settlement state errors.
//!
//! Every variant before the plumbing section is a caller-recoverable
//! precondition failure: the first violated check aborts the operation with
//! the transaction uncommitted, so a failed call has zero side effects.

use sneed::{db::error as db, env::error as env, rwtxn::error as rwtxn};
use thiserror::Error;
use transitive::Transitive;

use crate::{
    custody::WithdrawError,
    state::contests::ContestId,
    types::{Address, AmountOverflowError, AmountUnderflowError},
};

#[derive(Debug, Error, Transitive)]
#[transitive(from(db::Clear, db::Error))]
#[transitive(from(db::Delete, db::Error))]
#[transitive(from(db::Error, sneed::Error))]
#[transitive(from(db::IterInit, db::Error))]
#[transitive(from(db::IterItem, db::Error))]
#[transitive(from(db::Last, db::Error))]
#[transitive(from(db::Put, db::Error))]
#[transitive(from(db::TryGet, db::Error))]
#[transitive(from(env::CreateDb, env::Error))]
#[transitive(from(env::Error, sneed::Error))]
#[transitive(from(env::OpenEnv, env::Error))]
#[transitive(from(env::ReadTxn, env::Error))]
#[transitive(from(env::WriteTxn, env::Error))]
#[transitive(from(rwtxn::Commit, rwtxn::Error))]
#[transitive(from(rwtxn::Error, sneed::Error))]
pub enum Error {
    #[error("caller {caller} is not the contest authority")]
    NotAuthorized { caller: Address },
    #[error("contest {id} not found")]
    ContestNotFound { id: ContestId },
    #[error("contest {contest} has no outcome {outcome}")]
    InvalidOutcome { contest: ContestId, outcome: u32 },
    #[error(
        "predictions for contest {contest} closed at {closed_at} (now {now})"
    )]
    PredictionWindowClosed {
        contest: ContestId,
        closed_at: u64,
        now: u64,
    },
    #[error("contest {contest} ended at {ended_at} (now {now})")]
    ContestEnded {
        contest: ContestId,
        ended_at: u64,
        now: u64,
    },
    #[error("contest {contest} is still running until {ends_at} (now {now})")]
    ContestNotYetEnded {
        contest: ContestId,
        ends_at: u64,
        now: u64,
    },
    #[error("participant {participant} already staked in contest {contest}")]
    DuplicateStake {
        contest: ContestId,
        participant: Address,
    },
    #[error("stake amount {provided} is below the entry price {required}")]
    InsufficientAmount { required: u64, provided: u64 },
    #[error("contest {contest} already has declared outcome {declared}")]
    OutcomeAlreadyDeclared { contest: ContestId, declared: u32 },
    #[error("no outcome declared yet for contest {contest}")]
    OutcomeNotDeclared { contest: ContestId },
    #[error("contest {contest} is already settled")]
    AlreadySettled { contest: ContestId },
    #[error("no stakes on winning outcome {outcome} of contest {contest}")]
    NoWinningStakes { contest: ContestId, outcome: u32 },
    #[error("a contest needs at least one outcome")]
    NoOutcomes,
    #[error(
        "prediction close {prediction_close} is after contest close \
         {contest_close}"
    )]
    InvalidDeadlines {
        prediction_close: u64,
        contest_close: u64,
    },
    #[error("entry price must be positive")]
    ZeroEntryPrice,

    #[error(transparent)]
    AmountOverflow(#[from] AmountOverflowError),
    #[error(transparent)]
    AmountUnderflow(#[from] AmountUnderflowError),
    #[error(transparent)]
    Custody(#[from] WithdrawError),
    #[error("database consistency error: {0}")]
    DatabaseError(String),
    #[error(transparent)]
    Db(#[from] sneed::Error),
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
