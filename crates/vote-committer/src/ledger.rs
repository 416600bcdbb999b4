//! Collaborator interfaces of the commit pipeline.
//!
//! The pipeline never talks to a network itself. It is handed an oracle view
//! (read-only queries against the voting contract) and a ledger client that
//! signs and sends `batch_commit` transactions for one voter account.

use std::fmt;

use async_trait::async_trait;
use near_sdk::AccountId;
use oracle_types::types::{CommitVoteArgs, PriceRequest, RoundId, VotingPhase};
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, SubmissionError};

/// Identifier of a finalized transaction, as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHandle(pub String);

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only round state of the voting contract.
#[async_trait]
pub trait VotingOracle: Send + Sync {
    /// Requests up for vote in the current round, in contract order.
    async fn pending_requests(&self) -> Result<Vec<PriceRequest>, QueryError>;

    async fn current_round_id(&self) -> Result<RoundId, QueryError>;

    async fn vote_phase(&self) -> Result<VotingPhase, QueryError>;

    /// Decimal places of the fixed-point price the contract expects.
    async fn price_decimals(&self) -> Result<u8, QueryError>;
}

/// Answers "has `voter` already committed to `request` in `round_id`?".
#[async_trait]
pub trait CommitLookup: Send + Sync {
    async fn has_committed(
        &self,
        voter: &AccountId,
        request: &PriceRequest,
        round_id: RoundId,
    ) -> Result<bool, QueryError>;
}

/// Sends commitment batches on behalf of one voter account.
///
/// Implementations must not return before the transaction is final, and must
/// map ledger refusals to [`SubmissionError::Rejected`] and everything that
/// might succeed on retry to [`SubmissionError::Transient`].
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Maximum number of commitments accepted in one transaction.
    async fn max_batch_size(&self) -> Result<usize, QueryError>;

    async fn submit_batch(
        &self,
        voter: &AccountId,
        batch: &[CommitVoteArgs],
    ) -> Result<TransactionHandle, SubmissionError>;
}
