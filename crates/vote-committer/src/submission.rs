//! Batched, strictly sequential submission of commitments.
//!
//! A voter's transactions share one access-key nonce sequence, so batches are
//! sent one after another and each is awaited until final (or failed) before
//! the next one starts. There is no rollback: a confirmed batch stays
//! confirmed whatever happens to later ones.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use near_sdk::AccountId;
use oracle_types::types::{CommitVoteArgs, CryptoHash};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::commitment::Commitment;
use crate::config::SubmissionConfig;
use crate::error::{SubmissionError, SubmitError};
use crate::ledger::{LedgerClient, TransactionHandle};

/// Result of submitting one commitment.
///
/// Exactly one of `transaction` and `error` is set. The commitment, salt
/// included, is kept on both sides so successes can be revealed and
/// failures resubmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub commitment: Commitment,
    pub transaction: Option<TransactionHandle>,
    pub error: Option<SubmissionError>,
}

impl SubmissionOutcome {
    fn confirmed(commitment: Commitment, transaction: TransactionHandle) -> Self {
        Self {
            commitment,
            transaction: Some(transaction),
            error: None,
        }
    }

    fn failed(commitment: Commitment, error: SubmissionError) -> Self {
        Self {
            commitment,
            transaction: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.transaction.is_some()
    }

    pub fn salt(&self) -> &CryptoHash {
        self.commitment.salt()
    }
}

/// Per-item results of one submission run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Items of confirmed batches, in input order
    pub successes: Vec<SubmissionOutcome>,
    /// Items that were refused, failed, or never sent
    pub failures: Vec<SubmissionOutcome>,
    /// Batches actually sent, whatever their outcome
    pub batches_used: usize,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

/// Stops a run from starting further batches. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sends commitments through a [`LedgerClient`] in size-bounded batches.
///
/// One submitter is one writer: concurrent [`submit`](Self::submit) calls
/// on the same submitter run one after another, never interleaved.
pub struct BatchSubmitter<L> {
    ledger: L,
    config: SubmissionConfig,
    cancel: CancelFlag,
    writer: Mutex<()>,
}

impl<L: LedgerClient> BatchSubmitter<L> {
    pub fn new(ledger: L, config: SubmissionConfig) -> Self {
        Self {
            ledger,
            config,
            cancel: CancelFlag::new(),
            writer: Mutex::new(()),
        }
    }

    /// Share an externally owned cancel flag with this submitter.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    /// Submit every commitment at most once, as `voter`.
    ///
    /// Commitments are split, in input order, into batches of at most the
    /// ledger's `max_batch_size`. Every input ends up in exactly one of
    /// `successes` or `failures`, both kept in input order. The only error is
    /// failing to learn the batch size, in which case nothing was sent.
    pub async fn submit(
        &self,
        commitments: Vec<Commitment>,
        voter: &AccountId,
    ) -> Result<BatchResult, SubmitError> {
        let _writer = self.writer.lock().await;

        let max_batch_size = self.ledger.max_batch_size().await?;
        if max_batch_size == 0 {
            return Err(SubmitError::ZeroBatchSize);
        }

        let mut result = BatchResult::default();
        // Failures are tagged with their input position and sorted at the end.
        let mut failures: Vec<(usize, SubmissionOutcome)> = Vec::new();
        let mut ready = Vec::with_capacity(commitments.len());
        for (position, commitment) in commitments.into_iter().enumerate() {
            if commitment.voter() == voter {
                ready.push((position, commitment));
                continue;
            }
            warn!(found = %commitment.voter(), expected = %voter, "commitment bound to another voter");
            let error = SubmissionError::VoterMismatch {
                expected: voter.to_string(),
                found: commitment.voter().to_string(),
            };
            failures.push((position, SubmissionOutcome::failed(commitment, error)));
        }

        let total_batches = ready.len().div_ceil(max_batch_size);
        info!(
            commitments = ready.len(),
            batches = total_batches,
            max_batch_size,
            %voter,
            "submitting commitments"
        );

        let mut remaining = ready.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<(usize, Commitment)> = remaining.by_ref().take(max_batch_size).collect();

            if self.cancel.is_cancelled() {
                let before = failures.len();
                failures.extend(batch.into_iter().chain(remaining.by_ref()).map(
                    |(position, commitment)| {
                        (position, SubmissionOutcome::failed(commitment, SubmissionError::Cancelled))
                    },
                ));
                warn!(
                    skipped = failures.len() - before,
                    batches_used = result.batches_used,
                    "run cancelled, remaining batches not submitted"
                );
                break;
            }

            result.batches_used += 1;
            let index = result.batches_used;
            let args: Vec<CommitVoteArgs> = batch
                .iter()
                .map(|(_, commitment)| commitment.to_commit_args())
                .collect();

            debug!(batch = index, of = total_batches, size = args.len(), "batch submitting");
            match self.submit_with_retry(voter, &args, index).await {
                Ok(transaction) => {
                    info!(batch = index, size = args.len(), %transaction, "batch confirmed");
                    result.successes.extend(batch.into_iter().map(|(_, commitment)| {
                        SubmissionOutcome::confirmed(commitment, transaction.clone())
                    }));
                }
                Err(error) => {
                    warn!(batch = index, size = args.len(), %error, "batch failed");
                    failures.extend(batch.into_iter().map(|(position, commitment)| {
                        (position, SubmissionOutcome::failed(commitment, error.clone()))
                    }));
                }
            }
        }

        failures.sort_by_key(|(position, _)| *position);
        result.failures = failures.into_iter().map(|(_, outcome)| outcome).collect();

        info!(
            succeeded = result.successes.len(),
            failed = result.failures.len(),
            batches_used = result.batches_used,
            "submission finished"
        );
        Ok(result)
    }

    /// One batch: attempt, and retry transient failures with backoff.
    async fn submit_with_retry(
        &self,
        voter: &AccountId,
        batch: &[CommitVoteArgs],
        index: usize,
    ) -> Result<TransactionHandle, SubmissionError> {
        let mut retries = 0u32;
        loop {
            let attempt = match timeout(
                self.config.batch_timeout,
                self.ledger.submit_batch(voter, batch),
            )
            .await
            {
                Ok(attempt) => attempt,
                Err(_) => Err(SubmissionError::Transient(format!(
                    "no finality within {:?}",
                    self.config.batch_timeout
                ))),
            };

            match attempt {
                Err(error) if error.is_retryable() && retries < self.config.max_retries => {
                    let delay = self.config.backoff_for(retries);
                    retries += 1;
                    warn!(
                        batch = index,
                        retry = retries,
                        max_retries = self.config.max_retries,
                        ?delay,
                        %error,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
