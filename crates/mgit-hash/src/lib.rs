//! Object identity and SHA-1 hashing for the mgit git client.
//!
//! This crate provides the core `ObjectId` type, streaming hash computation,
//! and hex encoding/decoding used throughout mgit. Object ids are 20-byte
//! SHA-1 digests of the canonical git object framing.

mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use error::HashError;
pub use oid::ObjectId;
