//! One commit run for one voter: open the round, build commitments for the
//! caller's chosen prices, submit them, and report.
//!
//! Every request handed to [`CommitSession::construct`] ends up in exactly one
//! place of the final [`CommitReport`]: committed, failed to submit, or
//! failed to construct.

use near_sdk::AccountId;
use oracle_types::types::{PriceRequest, RoundId, VotingPhase};
use tracing::{debug, info, warn};

use crate::commitment::{Commitment, CommitmentConstructor, PriceScale, SaltSource};
use crate::error::{FilterError, InvalidPriceError, SubmitError};
use crate::filter::filter_requests;
use crate::ledger::{CommitLookup, LedgerClient, VotingOracle};
use crate::submission::{BatchResult, BatchSubmitter, SubmissionOutcome};

const MAX_ROUND_READS: usize = 3;

/// A round open for commitments, with the requests still worth voting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRound {
    pub round_id: RoundId,
    pub phase: VotingPhase,
    pub eligible: Vec<PriceRequest>,
    pub price_decimals: u8,
}

impl OpenRound {
    pub fn price_scale(&self) -> PriceScale {
        PriceScale::new(self.price_decimals)
    }
}

/// A request whose price could not be turned into a commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructionFailure {
    pub request: PriceRequest,
    pub price: String,
    pub error: InvalidPriceError,
}

/// Output of the construction step.
#[derive(Debug, Clone, Default)]
pub struct Constructed {
    pub commitments: Vec<Commitment>,
    pub failures: Vec<ConstructionFailure>,
}

/// Everything a caller needs to display a run and act on it.
#[derive(Debug, Clone)]
pub struct CommitReport {
    pub round_id: RoundId,
    pub submission: BatchResult,
    pub construction_failures: Vec<ConstructionFailure>,
}

impl CommitReport {
    pub fn committed(&self) -> &[SubmissionOutcome] {
        &self.submission.successes
    }

    pub fn failed_submissions(&self) -> &[SubmissionOutcome] {
        &self.submission.failures
    }

    pub fn failed_constructions(&self) -> &[ConstructionFailure] {
        &self.construction_failures
    }

    pub fn batches_used(&self) -> usize {
        self.submission.batches_used
    }
}

/// Drives the commit pipeline for `voter` against one voting contract.
pub struct CommitSession<'a, O: ?Sized> {
    oracle: &'a O,
    voter: AccountId,
}

impl<'a, O> CommitSession<'a, O>
where
    O: VotingOracle + CommitLookup + ?Sized,
{
    pub fn new(oracle: &'a O, voter: AccountId) -> Self {
        Self { oracle, voter }
    }

    pub fn voter(&self) -> &AccountId {
        &self.voter
    }

    /// Read the round state and filter the pending requests.
    ///
    /// An empty `eligible` list is not an error: there may simply be nothing
    /// left to vote on. A reveal-phase round is reported as an error.
    ///
    /// The round id and the pending list come from separate reads. If the
    /// requests carry a newer round than the one just read, the round rolled
    /// over in between and the reads are repeated.
    pub async fn open(&self) -> Result<OpenRound, FilterError> {
        let mut read = 0;
        let (round_id, pending) = loop {
            read += 1;
            let round_id = self.oracle.current_round_id().await?;
            let pending = self.oracle.pending_requests().await?;
            match pending.iter().find(|request| request.round_id != round_id) {
                None => break (round_id, pending),
                Some(request) if read >= MAX_ROUND_READS => {
                    return Err(FilterError::RoundChanged {
                        read: round_id,
                        current: request.round_id,
                    });
                }
                Some(request) => {
                    debug!(read = round_id, current = request.round_id, "round rolled over, reading again");
                }
            }
        };
        let phase = self.oracle.vote_phase().await?;
        let price_decimals = self.oracle.price_decimals().await?;

        let eligible = filter_requests(&pending, &self.voter, round_id, phase, self.oracle).await?;
        info!(
            round_id,
            pending = pending.len(),
            eligible = eligible.len(),
            voter = %self.voter,
            "round open for commitments"
        );

        Ok(OpenRound {
            round_id,
            phase,
            eligible,
            price_decimals,
        })
    }

    /// Build a commitment per `(request, price)` selection.
    ///
    /// Invalid prices are collected, not fatal.
    pub fn construct<S, I, P>(
        &self,
        round: &OpenRound,
        constructor: &CommitmentConstructor<S>,
        selections: I,
    ) -> Constructed
    where
        S: SaltSource,
        I: IntoIterator<Item = (PriceRequest, P)>,
        P: Into<String>,
    {
        let mut constructed = Constructed::default();
        for (request, price) in selections {
            let price = price.into();
            match constructor.construct(&request, round.round_id, &price, &self.voter) {
                Ok(commitment) => constructed.commitments.push(commitment),
                Err(error) => {
                    warn!(identifier = %request.identifier, timestamp = request.timestamp, %error, "price rejected");
                    constructed.failures.push(ConstructionFailure {
                        request,
                        price,
                        error,
                    });
                }
            }
        }
        constructed
    }

    /// Submit the constructed commitments and assemble the report.
    pub async fn submit<L: LedgerClient>(
        &self,
        round: &OpenRound,
        submitter: &BatchSubmitter<L>,
        constructed: Constructed,
    ) -> Result<CommitReport, SubmitError> {
        let submission = if constructed.commitments.is_empty() {
            BatchResult::default()
        } else {
            submitter.submit(constructed.commitments, &self.voter).await?
        };

        let report = CommitReport {
            round_id: round.round_id,
            submission,
            construction_failures: constructed.failures,
        };
        info!(
            round_id = report.round_id,
            committed = report.committed().len(),
            failed_submissions = report.failed_submissions().len(),
            failed_constructions = report.failed_constructions().len(),
            batches = report.batches_used(),
            "commit run finished"
        );
        Ok(report)
    }
}
