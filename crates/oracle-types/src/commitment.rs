//! Byte encodings shared by the voting contract and off-chain voters.
//!
//! A commitment hash is `SHA-256(vote_commitment_preimage(..))`. The contract
//! hashes with `env::sha256`, voters with any SHA-256 implementation; both must
//! feed it the exact bytes produced here.

use near_sdk::AccountId;

use crate::types::{CryptoHash, RoundId};

/// Encode the fields bound by a vote commitment.
///
/// Layout, all integers big-endian:
///
/// | bytes | field |
/// |---|---|
/// | 4 | identifier length |
/// | n | identifier |
/// | 8 | request timestamp |
/// | 8 | round id |
/// | 16 | price (scaled, two's complement) |
/// | 32 | salt |
/// | rest | voter account id |
pub fn vote_commitment_preimage(
    identifier: &[u8],
    timestamp: u64,
    round_id: RoundId,
    price: i128,
    salt: &CryptoHash,
    voter: &AccountId,
) -> Vec<u8> {
    let voter = voter.as_str().as_bytes();
    let mut data = Vec::with_capacity(4 + identifier.len() + 8 + 8 + 16 + 32 + voter.len());
    data.extend_from_slice(&(identifier.len() as u32).to_be_bytes());
    data.extend_from_slice(identifier);
    data.extend_from_slice(&timestamp.to_be_bytes());
    data.extend_from_slice(&round_id.to_be_bytes());
    data.extend_from_slice(&price.to_be_bytes());
    data.extend_from_slice(salt);
    data.extend_from_slice(voter);
    data
}

/// Encode the `(identifier, timestamp)` pair that names a price request.
///
/// The contract hashes this to key its request storage.
pub fn request_key_preimage(identifier: &[u8], timestamp: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + identifier.len() + 8);
    data.extend_from_slice(&(identifier.len() as u32).to_be_bytes());
    data.extend_from_slice(identifier);
    data.extend_from_slice(&timestamp.to_be_bytes());
    data
}
