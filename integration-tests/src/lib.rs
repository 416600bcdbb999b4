//! Sandbox bindings for the commit pipeline.
//!
//! [`SandboxVoting`] implements the committer's oracle and ledger traits over
//! a `near-workspaces` voting contract and one voter account, so the same
//! pipeline the voter runs against mainnet RPC can run against a sandbox.

use async_trait::async_trait;
use near_workspaces::{Account, Contract};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use vote_committer::{
    AccountId, CommitLookup, CommitVoteArgs, LedgerClient, PriceRequest, QueryError, RoundId,
    SubmissionError, TransactionHandle, VotingOracle, VotingPhase,
};

/// A deployed voting contract seen through one voter's account.
pub struct SandboxVoting {
    contract: Contract,
    voter: Account,
}

impl SandboxVoting {
    pub fn new(contract: Contract, voter: Account) -> Self {
        Self { contract, voter }
    }

    pub fn contract(&self) -> &Contract {
        &self.contract
    }

    /// The voter account id as the committer names accounts.
    pub fn voter_id(&self) -> AccountId {
        self.voter
            .id()
            .as_str()
            .parse()
            .expect("sandbox account ids are valid")
    }

    pub async fn view<T: DeserializeOwned>(&self, method: &str, args: Value) -> Result<T, QueryError> {
        self.contract
            .view(method)
            .args_json(args)
            .await
            .map_err(query_error)?
            .json()
            .map_err(query_error)
    }
}

fn query_error(err: near_workspaces::error::Error) -> QueryError {
    QueryError(err.to_string())
}

#[async_trait]
impl VotingOracle for SandboxVoting {
    async fn pending_requests(&self) -> Result<Vec<PriceRequest>, QueryError> {
        self.view("get_pending_requests", json!({})).await
    }

    async fn current_round_id(&self) -> Result<RoundId, QueryError> {
        self.view("get_current_round_id", json!({})).await
    }

    async fn vote_phase(&self) -> Result<VotingPhase, QueryError> {
        self.view("get_vote_phase", json!({})).await
    }

    async fn price_decimals(&self) -> Result<u8, QueryError> {
        self.view("get_price_decimals", json!({})).await
    }
}

#[async_trait]
impl CommitLookup for SandboxVoting {
    async fn has_committed(
        &self,
        voter: &AccountId,
        request: &PriceRequest,
        round_id: RoundId,
    ) -> Result<bool, QueryError> {
        self.view(
            "has_committed",
            json!({
                "voter": voter,
                "identifier": request.identifier,
                "timestamp": request.timestamp,
                "round_id": round_id,
            }),
        )
        .await
    }
}

#[async_trait]
impl LedgerClient for SandboxVoting {
    async fn max_batch_size(&self) -> Result<usize, QueryError> {
        let size: u32 = self.view("get_max_batch_size", json!({})).await?;
        Ok(size as usize)
    }

    async fn submit_batch(
        &self,
        voter: &AccountId,
        batch: &[CommitVoteArgs],
    ) -> Result<TransactionHandle, SubmissionError> {
        if voter.as_str() != self.voter.id().as_str() {
            return Err(SubmissionError::VoterMismatch {
                expected: self.voter.id().to_string(),
                found: voter.to_string(),
            });
        }

        let outcome = self
            .voter
            .call(self.contract.id(), "batch_commit")
            .args_json(json!({ "commits": batch }))
            .max_gas()
            .transact()
            .await
            .map_err(|err| SubmissionError::Transient(err.to_string()))?;

        let transaction = TransactionHandle(outcome.outcome().transaction_hash.to_string());
        match outcome.into_result() {
            Ok(_) => Ok(transaction),
            Err(failure) => Err(SubmissionError::Rejected(format!("{failure:?}"))),
        }
    }
}
