//! Commit-phase voting for the Nest DVM.
//!
//! The pipeline has three stages, each usable on its own:
//!
//! 1. [`filter::filter_requests`] keeps the pending requests that are open for
//!    a new commitment from this voter in this round.
//! 2. [`commitment::CommitmentConstructor`] binds a chosen price to a request,
//!    round and voter under a fresh random salt.
//! 3. [`submission::BatchSubmitter`] sends commitments in ordered,
//!    size-bounded batches and reports every item's outcome.
//!
//! [`session::CommitSession`] chains the three for callers that do not need
//! finer control. Chain access is behind the traits in [`ledger`].

pub mod commitment;
pub mod config;
pub mod error;
pub mod filter;
pub mod ledger;
pub mod session;
pub mod submission;

#[cfg(test)]
mod test_utils;

pub use commitment::{
    commitment_hash, Commitment, CommitmentConstructor, OsSaltSource, PriceScale, SaltSource,
};
pub use config::SubmissionConfig;
pub use error::{
    CommitmentMismatch, ConfigError, EligibilityError, FilterError, InvalidPriceError, QueryError,
    SubmissionError, SubmitError,
};
pub use filter::filter_requests;
pub use ledger::{CommitLookup, LedgerClient, TransactionHandle, VotingOracle};
pub use session::{CommitReport, CommitSession, ConstructionFailure, Constructed, OpenRound};
pub use submission::{BatchResult, BatchSubmitter, CancelFlag, SubmissionOutcome};

pub use near_sdk::AccountId;
pub use oracle_types::types::{CommitVoteArgs, CryptoHash, PriceRequest, RoundId, VotingPhase};
