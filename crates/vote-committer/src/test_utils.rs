//! In-memory oracle and ledger fakes for unit tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use near_sdk::AccountId;
use oracle_types::types::{CommitVoteArgs, CryptoHash, PriceRequest, RoundId, VotingPhase};

use crate::commitment::SaltSource;
use crate::error::{QueryError, SubmissionError};
use crate::ledger::{CommitLookup, LedgerClient, TransactionHandle, VotingOracle};
use crate::submission::CancelFlag;

pub fn voter() -> AccountId {
    "alice.near".parse().unwrap()
}

pub fn request(identifier: &str, timestamp: u64) -> PriceRequest {
    PriceRequest::new(identifier, timestamp, 0)
}

/// Predictable salts: the n-th call returns n in the last eight bytes.
#[derive(Default)]
pub struct CountingSalt(AtomicU64);

impl SaltSource for CountingSalt {
    fn fresh_salt(&self) -> CryptoHash {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        let mut salt = [0u8; 32];
        salt[24..].copy_from_slice(&n.to_be_bytes());
        salt
    }
}

pub struct MockOracle {
    round_id: RoundId,
    phase: VotingPhase,
    decimals: u8,
    pending: Vec<PriceRequest>,
    committed: Mutex<HashSet<(AccountId, PriceRequest, RoundId)>>,
    lookups: AtomicUsize,
    lookup_failure: Mutex<Option<String>>,
    round_reads: Mutex<VecDeque<RoundId>>,
}

impl MockOracle {
    pub fn new(round_id: RoundId, phase: VotingPhase) -> Self {
        Self {
            round_id,
            phase,
            decimals: 2,
            pending: Vec::new(),
            committed: Mutex::new(HashSet::new()),
            lookups: AtomicUsize::new(0),
            lookup_failure: Mutex::new(None),
            round_reads: Mutex::new(VecDeque::new()),
        }
    }

    /// Answer the next `current_round_id` calls from `rounds`, then from the
    /// oracle's own round. Pending requests always carry the oracle's round.
    pub fn with_round_reads(self, rounds: Vec<RoundId>) -> Self {
        *self.round_reads.lock().unwrap() = rounds.into();
        self
    }

    pub fn with_pending(mut self, pending: Vec<PriceRequest>) -> Self {
        self.pending = pending
            .into_iter()
            .map(|request| PriceRequest {
                round_id: self.round_id,
                ..request
            })
            .collect();
        self
    }

    pub fn mark_committed(&self, voter: &AccountId, request: &PriceRequest, round_id: RoundId) {
        self.committed
            .lock()
            .unwrap()
            .insert((voter.clone(), request.clone(), round_id));
    }

    pub fn is_committed(&self, voter: &AccountId, request: &PriceRequest, round_id: RoundId) -> bool {
        self.committed
            .lock()
            .unwrap()
            .contains(&(voter.clone(), request.clone(), round_id))
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn fail_lookups(&self, message: &str) {
        *self.lookup_failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl VotingOracle for MockOracle {
    async fn pending_requests(&self) -> Result<Vec<PriceRequest>, QueryError> {
        Ok(self.pending.clone())
    }

    async fn current_round_id(&self) -> Result<RoundId, QueryError> {
        Ok(self
            .round_reads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.round_id))
    }

    async fn vote_phase(&self) -> Result<VotingPhase, QueryError> {
        Ok(self.phase)
    }

    async fn price_decimals(&self) -> Result<u8, QueryError> {
        Ok(self.decimals)
    }
}

#[async_trait]
impl CommitLookup for MockOracle {
    async fn has_committed(
        &self,
        voter: &AccountId,
        request: &PriceRequest,
        round_id: RoundId,
    ) -> Result<bool, QueryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.lookup_failure.lock().unwrap().clone() {
            return Err(QueryError(message));
        }
        Ok(self.is_committed(voter, request, round_id))
    }
}

/// Scripted ledger response for one `submit_batch` attempt.
#[derive(Clone, Debug)]
pub enum Step {
    Accept,
    Reject(&'static str),
    Transient(&'static str),
    /// Never answers, so the caller's timeout fires.
    Hang,
}

/// Ledger that answers from a script (accepting once the script runs out).
pub struct MockLedger {
    max_batch_size: usize,
    script: Mutex<VecDeque<Step>>,
    accepted: Mutex<Vec<Vec<CommitVoteArgs>>>,
    attempts: AtomicUsize,
    cancel_after: Option<(usize, CancelFlag)>,
    oracle: Option<Arc<MockOracle>>,
    yielding: bool,
}

impl MockLedger {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size,
            script: Mutex::new(VecDeque::new()),
            accepted: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            cancel_after: None,
            oracle: None,
            yielding: false,
        }
    }

    /// Yield to the scheduler inside every attempt, as a network call would.
    pub fn yielding(mut self) -> Self {
        self.yielding = true;
        self
    }

    pub fn with_script(self, steps: Vec<Step>) -> Self {
        *self.script.lock().unwrap() = steps.into();
        self
    }

    /// Raise `flag` once `batches` batches have been accepted.
    pub fn cancel_after(mut self, batches: usize, flag: CancelFlag) -> Self {
        self.cancel_after = Some((batches, flag));
        self
    }

    /// Record accepted commitments in `oracle`, as a real contract would.
    pub fn recording_into(mut self, oracle: Arc<MockOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.accepted.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn submitted_timestamps(&self) -> Vec<u64> {
        self.accepted
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|args| args.timestamp)
            .collect()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn max_batch_size(&self) -> Result<usize, QueryError> {
        Ok(self.max_batch_size)
    }

    async fn submit_batch(
        &self,
        voter: &AccountId,
        batch: &[CommitVoteArgs],
    ) -> Result<TransactionHandle, SubmissionError> {
        if self.yielding {
            tokio::task::yield_now().await;
        }
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Accept);

        match step {
            Step::Accept => {}
            Step::Reject(reason) => return Err(SubmissionError::Rejected(reason.into())),
            Step::Transient(reason) => return Err(SubmissionError::Transient(reason.into())),
            Step::Hang => std::future::pending::<()>().await,
        }

        let accepted = {
            let mut accepted = self.accepted.lock().unwrap();
            accepted.push(batch.to_vec());
            accepted.len()
        };
        if let Some(oracle) = &self.oracle {
            for args in batch {
                let request = PriceRequest::new(args.identifier.clone(), args.timestamp, args.round_id);
                oracle.mark_committed(voter, &request, args.round_id);
            }
        }
        if let Some((after, flag)) = &self.cancel_after {
            if accepted >= *after {
                flag.cancel();
            }
        }
        Ok(TransactionHandle(format!("tx-{attempt}")))
    }
}
