//! Error taxonomy of the commit pipeline.
//!
//! Construction failures ([`InvalidPriceError`]) and submission failures
//! ([`SubmissionError`]) are separate types so a caller can always tell
//! "never sent" from "sent and refused".

use std::path::PathBuf;

use oracle_types::types::RoundId;
use thiserror::Error;

/// The round does not accept new commitments. Fatal for the whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EligibilityError {
    #[error("round {round_id} is in the reveal phase; only committed votes can be revealed")]
    RevealPhase { round_id: RoundId },
}

/// A price that cannot be committed. Reported per request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPriceError {
    #[error("price must not be negative, got {0}")]
    Negative(String),

    #[error("price {0:?} is not a decimal number")]
    Malformed(String),

    #[error("price {price} has more than {decimals} decimal places")]
    TooPrecise { price: String, decimals: u8 },

    #[error("price {0} does not fit the fixed-point range")]
    Overflow(String),
}

/// A persisted commitment whose hash no longer matches its bound fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("commitment hash {hash} does not match its request, round, price, salt and voter")]
pub struct CommitmentMismatch {
    pub hash: String,
}

/// Why a batch of commitments did not land.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// Network failure or timeout before the ledger answered.
    #[error("transient submission failure: {0}")]
    Transient(String),

    /// The ledger refused the batch.
    #[error("ledger rejected the batch: {0}")]
    Rejected(String),

    /// The run was cancelled before this item's batch started.
    #[error("run cancelled before the batch was submitted")]
    Cancelled,

    /// The commitment binds a different voter than the submitting account.
    #[error("commitment is bound to {found}, submitting account is {expected}")]
    VoterMismatch { expected: String, found: String },
}

impl SubmissionError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmissionError::Transient(_))
    }
}

/// A read-only ledger query failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ledger query failed: {0}")]
pub struct QueryError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),

    #[error(transparent)]
    Query(#[from] QueryError),

    /// The round kept moving while the pending requests were read.
    #[error("round advanced from {read} to {current} while reading pending requests")]
    RoundChanged { read: RoundId, current: RoundId },
}

/// Failure before any batch was sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("ledger reported a max batch size of 0")]
    ZeroBatchSize,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
