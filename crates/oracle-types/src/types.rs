//! Core type definitions shared by the DVM voting contract and its off-chain voters.

use std::hash::{Hash, Hasher};

use near_sdk::near;

/// A 32-byte cryptographic hash.
///
/// Used for:
/// - Vote request keys
/// - Commit hashes in commit-reveal voting
/// - Salts chosen by voters
pub type CryptoHash = [u8; 32];

/// Identifier of a voting round. Rounds are numbered from zero and only grow.
pub type RoundId = u64;

/// Voting phases for the commit-reveal mechanism.
#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VotingPhase {
    /// Voters submit encrypted vote commitments
    Commit,
    /// Voters reveal their votes
    Reveal,
}

/// A price request awaiting a vote.
///
/// Two requests are the same request when `identifier` and `timestamp` match;
/// `round_id` only tells which round the request is being voted in.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug)]
pub struct PriceRequest {
    /// Price identifier (e.g., "ETH_USD"). Treated as opaque bytes.
    pub identifier: String,
    /// Timestamp (seconds since epoch) the price is requested for
    pub timestamp: u64,
    /// Round in which this request is up for vote
    pub round_id: RoundId,
}

impl PriceRequest {
    pub fn new(identifier: impl Into<String>, timestamp: u64, round_id: RoundId) -> Self {
        Self {
            identifier: identifier.into(),
            timestamp,
            round_id,
        }
    }
}

impl PartialEq for PriceRequest {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier && self.timestamp == other.timestamp
    }
}

impl Eq for PriceRequest {}

impl Hash for PriceRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
        self.timestamp.hash(state);
    }
}

/// One entry of a `batch_commit` call.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq)]
pub struct CommitVoteArgs {
    /// Identifier of the request being voted on
    pub identifier: String,
    /// Timestamp of the request being voted on
    pub timestamp: u64,
    /// Round the commitment was built for; must be the contract's current round
    pub round_id: RoundId,
    /// Commitment hash, see [`crate::commitment::vote_commitment_preimage`]
    pub commit_hash: CryptoHash,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_request_equality_ignores_round() {
        let a = PriceRequest::new("ETH_USD", 1_700_000_000, 3);
        let b = PriceRequest::new("ETH_USD", 1_700_000_000, 4);
        let c = PriceRequest::new("ETH_USD", 1_700_000_001, 3);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
