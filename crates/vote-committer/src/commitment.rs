//! Vote commitments: salted hashes that bind a hidden price to a request,
//! round and voter until the reveal phase.

use near_sdk::AccountId;
use oracle_types::commitment::vote_commitment_preimage;
use oracle_types::types::{CommitVoteArgs, CryptoHash, PriceRequest, RoundId};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CommitmentMismatch, InvalidPriceError};

/// Source of commitment salts.
///
/// Every call must return fresh, unpredictable bytes: a repeated salt links
/// votes and leaks prices. Implementations are shared across threads when
/// commitments are built in parallel.
pub trait SaltSource: Send + Sync {
    fn fresh_salt(&self) -> CryptoHash;
}

/// Salts drawn from the operating system's CSPRNG on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSaltSource;

impl SaltSource for OsSaltSource {
    fn fresh_salt(&self) -> CryptoHash {
        let mut salt = [0u8; 32];
        OsRng.fill_bytes(&mut salt);
        salt
    }
}

/// Fixed-point scale of committed prices, as configured on the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceScale {
    decimals: u8,
}

impl PriceScale {
    pub const fn new(decimals: u8) -> Self {
        Self { decimals }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Parse a non-negative decimal such as `"1234.5"` into scaled units.
    /// A signed zero (`"-0"`, `"-0.00"`) is zero.
    ///
    /// Trailing fractional zeros beyond the scale are accepted; any other
    /// digit beyond it is an error rather than silently rounded.
    pub fn parse(&self, input: &str) -> Result<i128, InvalidPriceError> {
        let trimmed = input.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (unsigned, ""),
        };
        let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !is_digits(int_part)
            || !is_digits(frac_part)
        {
            return Err(InvalidPriceError::Malformed(input.to_string()));
        }
        let is_zero = int_part.bytes().chain(frac_part.bytes()).all(|b| b == b'0');
        if negative && !is_zero {
            return Err(InvalidPriceError::Negative(trimmed.to_string()));
        }

        let frac_part = frac_part.trim_end_matches('0');
        if frac_part.len() > self.decimals as usize {
            return Err(InvalidPriceError::TooPrecise {
                price: trimmed.to_string(),
                decimals: self.decimals,
            });
        }

        let padding = self.decimals as usize - frac_part.len();
        int_part
            .bytes()
            .chain(frac_part.bytes())
            .chain(std::iter::repeat(b'0').take(padding))
            .try_fold(0i128, |acc, digit| {
                acc.checked_mul(10)?.checked_add(i128::from(digit - b'0'))
            })
            .ok_or_else(|| InvalidPriceError::Overflow(trimmed.to_string()))
    }

    /// Render scaled units back as a decimal string.
    pub fn format(&self, scaled: i128) -> String {
        if self.decimals == 0 {
            return scaled.to_string();
        }
        let digits = format!("{:0>width$}", scaled.unsigned_abs(), width = self.decimals as usize + 1);
        let (int_part, frac_part) = digits.split_at(digits.len() - self.decimals as usize);
        let frac_part = frac_part.trim_end_matches('0');
        let sign = if scaled < 0 { "-" } else { "" };
        if frac_part.is_empty() {
            format!("{sign}{int_part}")
        } else {
            format!("{sign}{int_part}.{frac_part}")
        }
    }
}

/// SHA-256 over the shared commitment preimage. The voting contract computes
/// the same digest with `env::sha256` when it verifies a vote.
pub fn commitment_hash(
    request: &PriceRequest,
    round_id: RoundId,
    price: i128,
    salt: &CryptoHash,
    voter: &AccountId,
) -> CryptoHash {
    let preimage = vote_commitment_preimage(
        request.identifier.as_bytes(),
        request.timestamp,
        round_id,
        price,
        salt,
        voter,
    );
    Sha256::digest(&preimage).into()
}

/// A committed vote and everything needed to reveal it later.
///
/// Immutable once built. The salt is the only copy of the secret: callers
/// must persist it (the type serializes with hex-encoded salt and hash)
/// before the reveal phase or the vote cannot be revealed. Loading a record
/// whose hash does not match its fields fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CommitmentRecord")]
pub struct Commitment {
    request: PriceRequest,
    round_id: RoundId,
    voter: AccountId,
    price: i128,
    #[serde(with = "hex32")]
    salt: CryptoHash,
    #[serde(with = "hex32")]
    hash: CryptoHash,
}

impl Commitment {
    pub fn request(&self) -> &PriceRequest {
        &self.request
    }

    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    pub fn voter(&self) -> &AccountId {
        &self.voter
    }

    /// Price in scaled fixed-point units.
    pub fn price(&self) -> i128 {
        self.price
    }

    pub fn salt(&self) -> &CryptoHash {
        &self.salt
    }

    pub fn hash(&self) -> &CryptoHash {
        &self.hash
    }

    pub fn salt_hex(&self) -> String {
        hex::encode(self.salt)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Recompute the digest from the bound fields and compare.
    pub fn verify(&self) -> bool {
        commitment_hash(&self.request, self.round_id, self.price, &self.salt, &self.voter)
            == self.hash
    }

    /// The on-chain form of this commitment. The price and salt stay local.
    pub fn to_commit_args(&self) -> CommitVoteArgs {
        CommitVoteArgs {
            identifier: self.request.identifier.clone(),
            timestamp: self.request.timestamp,
            round_id: self.round_id,
            commit_hash: self.hash,
        }
    }
}

/// Serialized form of [`Commitment`], checked before it becomes one.
#[derive(Deserialize)]
struct CommitmentRecord {
    request: PriceRequest,
    round_id: RoundId,
    voter: AccountId,
    price: i128,
    #[serde(with = "hex32")]
    salt: CryptoHash,
    #[serde(with = "hex32")]
    hash: CryptoHash,
}

impl TryFrom<CommitmentRecord> for Commitment {
    type Error = CommitmentMismatch;

    fn try_from(record: CommitmentRecord) -> Result<Self, Self::Error> {
        let commitment = Commitment {
            request: record.request,
            round_id: record.round_id,
            voter: record.voter,
            price: record.price,
            salt: record.salt,
            hash: record.hash,
        };
        if commitment.verify() {
            Ok(commitment)
        } else {
            Err(CommitmentMismatch {
                hash: commitment.hash_hex(),
            })
        }
    }
}

/// Builds commitments with a fresh salt from `S` for every call.
#[derive(Debug, Clone)]
pub struct CommitmentConstructor<S = OsSaltSource> {
    salts: S,
    scale: PriceScale,
}

impl CommitmentConstructor<OsSaltSource> {
    pub fn with_os_salt(scale: PriceScale) -> Self {
        Self::new(OsSaltSource, scale)
    }
}

impl<S: SaltSource> CommitmentConstructor<S> {
    pub fn new(salts: S, scale: PriceScale) -> Self {
        Self { salts, scale }
    }

    pub fn scale(&self) -> PriceScale {
        self.scale
    }

    /// Commit to a decimal `price` for `request` in `round_id`.
    pub fn construct(
        &self,
        request: &PriceRequest,
        round_id: RoundId,
        price: &str,
        voter: &AccountId,
    ) -> Result<Commitment, InvalidPriceError> {
        let scaled = self.scale.parse(price)?;
        self.construct_scaled(request, round_id, scaled, voter)
    }

    /// Commit to a price already expressed in scaled units.
    pub fn construct_scaled(
        &self,
        request: &PriceRequest,
        round_id: RoundId,
        price: i128,
        voter: &AccountId,
    ) -> Result<Commitment, InvalidPriceError> {
        if price < 0 {
            return Err(InvalidPriceError::Negative(self.scale.format(price)));
        }
        let salt = self.salts.fresh_salt();
        let hash = commitment_hash(request, round_id, price, &salt, voter);
        Ok(Commitment {
            request: request.clone(),
            round_id,
            voter: voter.clone(),
            price,
            salt,
            hash,
        })
    }
}

mod hex32 {
    use oracle_types::types::CryptoHash;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &CryptoHash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CryptoHash, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = hex::decode(&encoded).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("expected 32 bytes"))
    }
}
