//! DVM voting event definitions following the NEP-297 standard.
//!
//! Events are logged in JSON format and can be indexed by off-chain services,
//! including voters that track which requests they already committed to.
//!
//! Reference: https://nomicon.io/Standards/EventsFormat

use near_sdk::{log, serde::Serialize, serde_json::json, AccountId};

use crate::types::{CryptoHash, RoundId};

/// Event standard identifier for Nest DVM voting events.
const VOTING_EVENT_STANDARD: &str = "nest-voting";

/// Current version of the event standard.
const EVENT_STANDARD_VERSION: &str = "1.0.0";

/// All events emitted by the Nest DVM Voting contract.
#[derive(Clone, Serialize)]
#[serde(crate = "near_sdk::serde")]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum VotingEvent<'a> {
    /// Emitted when a new price request is enqueued for voting.
    PriceRequested {
        /// Storage key of the request.
        request_id: &'a CryptoHash,
        /// Price identifier (e.g., "ETH_USD").
        identifier: &'a str,
        /// Timestamp associated with the request.
        timestamp: u64,
        /// First round in which the request can be voted on.
        round_id: RoundId,
        /// Account that requested the price.
        requester: &'a AccountId,
    },

    /// Emitted once per commitment stored, including each entry of a batch.
    VoteCommitted {
        /// Identifier of the request being voted on.
        identifier: &'a str,
        /// Timestamp of the request being voted on.
        timestamp: u64,
        /// Round of the commitment.
        round_id: RoundId,
        /// The voter's account.
        voter: &'a AccountId,
    },

    /// Emitted when voting configuration is updated.
    VotingConfigUpdated {
        /// Commit phase duration in nanoseconds.
        commit_phase_duration_ns: u64,
        /// Reveal phase duration in nanoseconds.
        reveal_phase_duration_ns: u64,
        /// Maximum number of commitments accepted by one `batch_commit`.
        max_batch_size: u32,
        /// Decimal places of the fixed-point price encoding.
        price_decimals: u8,
    },
}

impl VotingEvent<'_> {
    /// Emit this event to the NEAR logs.
    pub fn emit(&self) {
        emit_event(VOTING_EVENT_STANDARD, &self);
    }
}

/// Formats and logs an event following the NEP-297 standard.
///
/// The output is logged with the "EVENT_JSON:" prefix for indexer detection.
fn emit_event<T: ?Sized + Serialize>(standard: &str, data: &T) {
    let result = json!(data);
    let event_json = json!({
        "standard": standard,
        "version": EVENT_STANDARD_VERSION,
        "event": result["event"],
        "data": [result["data"]]
    })
    .to_string();
    log!("{}", format!("EVENT_JSON:{}", event_json));
}
