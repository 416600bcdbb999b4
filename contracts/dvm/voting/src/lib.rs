use near_sdk::json_types::I128;
use near_sdk::store::{LookupMap, Vector};
use near_sdk::{env, near, require, AccountId, PanicOnDefault};

use oracle_types::commitment::{request_key_preimage, vote_commitment_preimage};
use oracle_types::events::VotingEvent;
use oracle_types::types::{CommitVoteArgs, CryptoHash, PriceRequest, RoundId, VotingPhase};

/// A price request as stored by the contract.
#[near(serializers = [borsh])]
#[derive(Clone)]
pub struct StoredRequest {
    /// Price identifier (e.g., "ETH_USD")
    pub identifier: String,
    /// Timestamp the price is requested for
    pub timestamp: u64,
    /// First round in which the request can be voted on
    pub first_round: RoundId,
    /// Account that requested the price
    pub requester: AccountId,
}

/// Current voting configuration.
#[near(serializers = [json])]
#[derive(Clone, PartialEq, Debug)]
pub struct VotingConfig {
    pub commit_phase_duration_ns: u64,
    pub reveal_phase_duration_ns: u64,
    pub max_batch_size: u32,
    pub price_decimals: u8,
}

/// Voting - DVM commit-reveal voting rounds.
///
/// Time is cut into rounds of `commit_phase_duration + reveal_phase_duration`.
/// Each round opens with a commit phase, during which voters store hashes of
/// their votes, followed by a reveal phase.
///
/// Key features:
/// - Round and phase derived from block time, no keeper calls needed
/// - Requests become votable in the round after they are made and roll
///   forward until resolved
/// - Batched commits bounded by `max_batch_size` per transaction
/// - Commitment hash encoding shared with voters through `oracle-types`
#[near(contract_state)]
#[derive(PanicOnDefault)]
pub struct Voting {
    /// Contract owner
    owner: AccountId,

    /// Duration of commit phase in nanoseconds
    commit_phase_duration: u64,

    /// Duration of reveal phase in nanoseconds
    reveal_phase_duration: u64,

    /// Block timestamp at which round `round_offset` started
    round_anchor: u64,

    /// Round id in effect at `round_anchor`
    round_offset: RoundId,

    /// Maximum number of commitments in one `batch_commit`
    max_batch_size: u32,

    /// Decimal places of the fixed-point price voters commit to
    price_decimals: u8,

    /// Price requests by request key (hash of identifier + timestamp)
    requests: LookupMap<CryptoHash, StoredRequest>,

    /// Keys of requests still awaiting a vote, in request order
    pending: Vector<CryptoHash>,

    /// Vote commitments: commit slot (request, round, voter) -> commit hash
    commitments: LookupMap<CryptoHash, CryptoHash>,
}

/// Default phase durations
const DEFAULT_COMMIT_DURATION: u64 = 24 * 60 * 60 * 1_000_000_000; // 24 hours in nanoseconds
const DEFAULT_REVEAL_DURATION: u64 = 24 * 60 * 60 * 1_000_000_000; // 24 hours in nanoseconds
const DEFAULT_MAX_BATCH_SIZE: u32 = 25;
const DEFAULT_PRICE_DECIMALS: u8 = 18;
/// i128 holds 38 full decimal digits
const MAX_PRICE_DECIMALS: u8 = 38;

#[near]
impl Voting {
    /// Initialize the Voting contract. Round 0 starts at deployment.
    ///
    /// # Arguments
    /// * `owner` - Account that can configure voting parameters
    #[init]
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            commit_phase_duration: DEFAULT_COMMIT_DURATION,
            reveal_phase_duration: DEFAULT_REVEAL_DURATION,
            round_anchor: env::block_timestamp(),
            round_offset: 0,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            price_decimals: DEFAULT_PRICE_DECIMALS,
            requests: LookupMap::new(b"r"),
            pending: Vector::new(b"p"),
            commitments: LookupMap::new(b"c"),
        }
    }

    // ==================== Price Request Management ====================

    /// Enqueue a price request. It becomes votable in the next round.
    ///
    /// # Arguments
    /// * `identifier` - The price identifier (e.g., "ETH_USD")
    /// * `timestamp` - The timestamp for the price, in seconds
    ///
    /// # Returns
    /// The request key for tracking this vote
    pub fn request_price(&mut self, identifier: String, timestamp: u64) -> CryptoHash {
        require!(!identifier.is_empty(), "Identifier cannot be empty");
        let requester = env::predecessor_account_id();
        let request_id = Self::request_key(&identifier, timestamp);

        require!(
            !self.requests.contains_key(&request_id),
            "Price request already exists"
        );

        let first_round = self.current_round() + 1;
        self.requests.insert(
            request_id,
            StoredRequest {
                identifier: identifier.clone(),
                timestamp,
                first_round,
                requester: requester.clone(),
            },
        );
        self.pending.push(request_id);

        VotingEvent::PriceRequested {
            request_id: &request_id,
            identifier: &identifier,
            timestamp,
            round_id: first_round,
            requester: &requester,
        }
        .emit();

        request_id
    }

    // ==================== Commit Phase ====================

    /// Commit a vote for one pending request in the current round.
    /// Committing again in the same round replaces the earlier hash.
    ///
    /// # Arguments
    /// * `identifier` - Identifier of the request
    /// * `timestamp` - Timestamp of the request
    /// * `commit_hash` - SHA-256 of the vote commitment preimage
    pub fn commit_vote(&mut self, identifier: String, timestamp: u64, commit_hash: CryptoHash) {
        require!(self.phase() == VotingPhase::Commit, "Not in commit phase");
        let voter = env::predecessor_account_id();
        let round_id = self.current_round();
        self.internal_commit(
            &voter,
            CommitVoteArgs {
                identifier,
                timestamp,
                round_id,
                commit_hash,
            },
        );
    }

    /// Commit votes for several requests in one transaction.
    ///
    /// The whole batch is rejected if it is empty, larger than
    /// `max_batch_size`, sent outside the commit phase, or if any entry
    /// targets another round or a request that is not up for vote.
    ///
    /// # Returns
    /// Number of commitments stored
    pub fn batch_commit(&mut self, commits: Vec<CommitVoteArgs>) -> u32 {
        require!(!commits.is_empty(), "Empty batch");
        require!(
            commits.len() <= self.max_batch_size as usize,
            "Batch exceeds max_batch_size"
        );
        require!(self.phase() == VotingPhase::Commit, "Not in commit phase");

        let voter = env::predecessor_account_id();
        let count = commits.len() as u32;
        for commit in commits {
            self.internal_commit(&voter, commit);
        }
        count
    }

    fn internal_commit(&mut self, voter: &AccountId, commit: CommitVoteArgs) {
        let round_id = self.current_round();
        require!(commit.round_id == round_id, "Commitment is for another round");

        let request_id = Self::request_key(&commit.identifier, commit.timestamp);
        let request = self.requests.get(&request_id).expect("Request not found");
        require!(request.first_round <= round_id, "Request not yet up for vote");

        let slot = Self::commit_slot(&request_id, round_id, voter);
        self.commitments.insert(slot, commit.commit_hash);

        VotingEvent::VoteCommitted {
            identifier: &commit.identifier,
            timestamp: commit.timestamp,
            round_id,
            voter,
        }
        .emit();
    }

    // ==================== View Functions ====================

    /// Requests up for vote in the current round, in request order.
    pub fn get_pending_requests(&self) -> Vec<PriceRequest> {
        let round_id = self.current_round();
        self.pending
            .iter()
            .filter_map(|request_id| self.requests.get(request_id))
            .filter(|request| request.first_round <= round_id)
            .map(|request| PriceRequest::new(request.identifier.clone(), request.timestamp, round_id))
            .collect()
    }

    /// Id of the round in progress.
    pub fn get_current_round_id(&self) -> RoundId {
        self.current_round()
    }

    /// Phase of the round in progress.
    pub fn get_vote_phase(&self) -> VotingPhase {
        self.phase()
    }

    /// Whether `voter` has committed to the request in `round_id`.
    pub fn has_committed(
        &self,
        voter: AccountId,
        identifier: String,
        timestamp: u64,
        round_id: RoundId,
    ) -> bool {
        self.get_commitment(voter, identifier, timestamp, round_id)
            .is_some()
    }

    /// The commitment hash stored for `voter` on the request in `round_id`.
    pub fn get_commitment(
        &self,
        voter: AccountId,
        identifier: String,
        timestamp: u64,
        round_id: RoundId,
    ) -> Option<CryptoHash> {
        let request_id = Self::request_key(&identifier, timestamp);
        let slot = Self::commit_slot(&request_id, round_id, &voter);
        self.commitments.get(&slot).copied()
    }

    /// Check that `price` and `salt` open the stored commitment.
    ///
    /// Lets a voter confirm, before the reveal phase, that the salt they kept
    /// reproduces what the contract holds. `price` is in scaled units.
    pub fn verify_commitment(
        &self,
        voter: AccountId,
        identifier: String,
        timestamp: u64,
        round_id: RoundId,
        price: I128,
        salt: CryptoHash,
    ) -> bool {
        let expected = Self::compute_vote_hash(
            &identifier,
            timestamp,
            round_id,
            price.0,
            &salt,
            &voter,
        );
        self.get_commitment(voter, identifier, timestamp, round_id) == Some(expected)
    }

    pub fn get_max_batch_size(&self) -> u32 {
        self.max_batch_size
    }

    pub fn get_price_decimals(&self) -> u8 {
        self.price_decimals
    }

    /// Get current configuration.
    pub fn get_config(&self) -> VotingConfig {
        VotingConfig {
            commit_phase_duration_ns: self.commit_phase_duration,
            reveal_phase_duration_ns: self.reveal_phase_duration,
            max_batch_size: self.max_batch_size,
            price_decimals: self.price_decimals,
        }
    }

    // ==================== Configuration ====================

    /// Set the commit phase duration.
    /// Only owner can call. The current round keeps its id and restarts
    /// its commit phase.
    pub fn set_commit_phase_duration(&mut self, duration_ns: u64) {
        self.assert_owner();
        require!(duration_ns > 0, "Duration must be positive");
        require!(
            duration_ns.checked_add(self.reveal_phase_duration).is_some(),
            "Round length overflows"
        );
        self.reanchor_rounds();
        self.commit_phase_duration = duration_ns;
        self.emit_config();
    }

    /// Set the reveal phase duration.
    /// Only owner can call. The current round keeps its id and restarts
    /// its commit phase.
    pub fn set_reveal_phase_duration(&mut self, duration_ns: u64) {
        self.assert_owner();
        require!(duration_ns > 0, "Duration must be positive");
        require!(
            duration_ns.checked_add(self.commit_phase_duration).is_some(),
            "Round length overflows"
        );
        self.reanchor_rounds();
        self.reveal_phase_duration = duration_ns;
        self.emit_config();
    }

    /// Set the maximum number of commitments per `batch_commit`.
    /// Only owner can call.
    pub fn set_max_batch_size(&mut self, max_batch_size: u32) {
        self.assert_owner();
        require!(max_batch_size > 0, "Batch size must be positive");
        self.max_batch_size = max_batch_size;
        self.emit_config();
    }

    /// Set the decimal places of committed prices.
    /// Only owner can call.
    pub fn set_price_decimals(&mut self, price_decimals: u8) {
        self.assert_owner();
        require!(
            price_decimals <= MAX_PRICE_DECIMALS,
            "Price decimals exceed i128 precision"
        );
        self.price_decimals = price_decimals;
        self.emit_config();
    }

    // ==================== Role Management ====================

    /// Transfer ownership.
    pub fn set_owner(&mut self, new_owner: AccountId) {
        self.assert_owner();
        self.owner = new_owner;
    }

    /// Get current owner.
    pub fn get_owner(&self) -> AccountId {
        self.owner.clone()
    }

    // ==================== Internal ====================

    fn assert_owner(&self) {
        require!(
            env::predecessor_account_id() == self.owner,
            "Only owner can call this method"
        );
    }

    fn round_length(&self) -> u64 {
        self.commit_phase_duration + self.reveal_phase_duration
    }

    fn elapsed_since_anchor(&self) -> u64 {
        env::block_timestamp().saturating_sub(self.round_anchor)
    }

    fn current_round(&self) -> RoundId {
        self.round_offset + self.elapsed_since_anchor() / self.round_length()
    }

    fn phase(&self) -> VotingPhase {
        if self.elapsed_since_anchor() % self.round_length() < self.commit_phase_duration {
            VotingPhase::Commit
        } else {
            VotingPhase::Reveal
        }
    }

    /// Pin the current round id to "now" before the round length changes,
    /// so round ids never jump or go back.
    fn reanchor_rounds(&mut self) {
        self.round_offset = self.current_round();
        self.round_anchor = env::block_timestamp();
    }

    fn emit_config(&self) {
        VotingEvent::VotingConfigUpdated {
            commit_phase_duration_ns: self.commit_phase_duration,
            reveal_phase_duration_ns: self.reveal_phase_duration,
            max_batch_size: self.max_batch_size,
            price_decimals: self.price_decimals,
        }
        .emit();
    }

    fn request_key(identifier: &str, timestamp: u64) -> CryptoHash {
        env::sha256_array(&request_key_preimage(identifier.as_bytes(), timestamp))
    }

    fn commit_slot(request_id: &CryptoHash, round_id: RoundId, voter: &AccountId) -> CryptoHash {
        let mut data = Vec::with_capacity(32 + 8 + voter.as_str().len());
        data.extend_from_slice(request_id);
        data.extend_from_slice(&round_id.to_be_bytes());
        data.extend_from_slice(voter.as_str().as_bytes());
        env::sha256_array(&data)
    }

    fn compute_vote_hash(
        identifier: &str,
        timestamp: u64,
        round_id: RoundId,
        price: i128,
        salt: &CryptoHash,
        voter: &AccountId,
    ) -> CryptoHash {
        env::sha256_array(&vote_commitment_preimage(
            identifier.as_bytes(),
            timestamp,
            round_id,
            price,
            salt,
            voter,
        ))
    }
}
