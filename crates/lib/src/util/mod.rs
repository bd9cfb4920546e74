//! Shared utilities.
//!
//! Content hashing for asset source hashes and generated identifiers.

pub mod hash;

#[cfg(test)]
pub mod testutil;
