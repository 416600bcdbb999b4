//! Shared types for the Nest DVM commit-reveal vote.
//!
//! This crate is used on both sides of a vote: by the voting contract and by
//! off-chain voters building commitments. Keeping the commitment encoding here
//! means the two sides cannot drift apart.
//!
//! # Modules
//!
//! - [`commitment`] - Byte encodings hashed into commitments and request keys
//! - [`events`] - NEP-297 compliant event definitions for indexing
//! - [`types`] - Core type aliases and definitions

pub mod commitment;
pub mod events;
pub mod types;
