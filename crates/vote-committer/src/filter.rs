//! Round/phase eligibility filter.

use near_sdk::AccountId;
use oracle_types::types::{PriceRequest, RoundId, VotingPhase};
use tracing::debug;

use crate::error::{EligibilityError, FilterError};
use crate::ledger::CommitLookup;

/// Requests that `voter` can still usefully commit to in `round_id`.
///
/// The reveal phase closes the whole round to new commitments and is
/// reported as [`EligibilityError::RevealPhase`] without any ledger query.
/// In the commit phase every request already committed by `voter` in
/// `round_id` is dropped; the rest keep their input order.
pub async fn filter_requests<L>(
    pending: &[PriceRequest],
    voter: &AccountId,
    round_id: RoundId,
    phase: VotingPhase,
    lookup: &L,
) -> Result<Vec<PriceRequest>, FilterError>
where
    L: CommitLookup + ?Sized,
{
    if phase == VotingPhase::Reveal {
        return Err(EligibilityError::RevealPhase { round_id }.into());
    }

    let mut eligible = Vec::with_capacity(pending.len());
    for request in pending {
        if lookup.has_committed(voter, request, round_id).await? {
            debug!(
                identifier = %request.identifier,
                timestamp = request.timestamp,
                round_id,
                "already committed, skipping"
            );
            continue;
        }
        eligible.push(request.clone());
    }
    Ok(eligible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::test_utils::{request, voter, MockOracle};
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_commit_phase_keeps_uncommitted_in_order() {
        let oracle = MockOracle::new(4, VotingPhase::Commit);
        let pending = vec![request("A", 1), request("B", 2), request("C", 3)];
        oracle.mark_committed(&voter(), &pending[1], 4);

        let eligible = filter_requests(&pending, &voter(), 4, VotingPhase::Commit, &oracle)
            .await
            .unwrap();

        assert_eq!(eligible, vec![request("A", 1), request("C", 3)]);
    }

    #[tokio::test]
    async fn test_commitment_in_other_round_or_by_other_voter_ignored() {
        let oracle = MockOracle::new(4, VotingPhase::Commit);
        let pending = vec![request("A", 1)];
        oracle.mark_committed(&voter(), &pending[0], 3);
        let bob: AccountId = "bob.near".parse().unwrap();
        oracle.mark_committed(&bob, &pending[0], 4);

        let eligible = filter_requests(&pending, &voter(), 4, VotingPhase::Commit, &oracle)
            .await
            .unwrap();

        assert_eq!(eligible, pending);
    }

    #[tokio::test]
    async fn test_reveal_phase_is_gate_not_filter() {
        let oracle = MockOracle::new(4, VotingPhase::Reveal);
        let pending = vec![request("A", 1), request("B", 2)];

        let err = filter_requests(&pending, &voter(), 4, VotingPhase::Reveal, &oracle)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            FilterError::Eligibility(EligibilityError::RevealPhase { round_id: 4 })
        );
        assert_eq!(oracle.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let oracle = MockOracle::new(4, VotingPhase::Commit);
        oracle.fail_lookups("rpc unavailable");

        let err = filter_requests(&[request("A", 1)], &voter(), 4, VotingPhase::Commit, &oracle)
            .await
            .unwrap_err();

        assert_eq!(err, FilterError::Query(QueryError("rpc unavailable".into())));
    }

    fn run<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #[test]
        fn prop_never_returns_committed_and_is_idempotent(
            timestamps in proptest::collection::vec(0u64..50, 0..20),
            committed_mask in proptest::collection::vec(any::<bool>(), 20),
        ) {
            let oracle = MockOracle::new(9, VotingPhase::Commit);
            let pending: Vec<_> = timestamps.iter().map(|ts| request("ETH_USD", *ts)).collect();
            for (req, committed) in pending.iter().zip(&committed_mask) {
                if *committed {
                    oracle.mark_committed(&voter(), req, 9);
                }
            }

            let first = run(filter_requests(&pending, &voter(), 9, VotingPhase::Commit, &oracle)).unwrap();
            let second = run(filter_requests(&pending, &voter(), 9, VotingPhase::Commit, &oracle)).unwrap();

            prop_assert_eq!(&first, &second);
            for req in &first {
                prop_assert!(!oracle.is_committed(&voter(), req, 9));
            }
            let expected: Vec<_> = pending
                .iter()
                .filter(|req| !oracle.is_committed(&voter(), req, 9))
                .cloned()
                .collect();
            prop_assert_eq!(first, expected);
        }

        #[test]
        fn prop_reveal_phase_always_closed(
            timestamps in proptest::collection::vec(0u64..50, 0..20),
            round_id in 0u64..1000,
        ) {
            let oracle = MockOracle::new(round_id, VotingPhase::Reveal);
            let pending: Vec<_> = timestamps.iter().map(|ts| request("BTC_USD", *ts)).collect();

            let result = run(filter_requests(&pending, &voter(), round_id, VotingPhase::Reveal, &oracle));

            prop_assert_eq!(
                result,
                Err(FilterError::Eligibility(EligibilityError::RevealPhase { round_id }))
            );
        }
    }
}
