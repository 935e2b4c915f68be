/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! "Inert" types that are sent around and inspected but have no active behavior. These types follow
//! the newtype pattern, and the API for using them is defined in this module.
//!
//! All multi-byte integers are serialized little-endian (this is what Borsh does), and all
//! content-addressed identifiers are 256-bit fingerprints ([`CryptoHash`]).

use borsh::{BorshDeserialize, BorshSerialize};
use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::Add,
};

/// Identity of a replica: a small non-negative integer, assigned externally and unique within a
/// [replica set](crate::types::replicas::ReplicaConfig).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct ReplicaID(u16);

impl ReplicaID {
    pub const fn new(int: u16) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u16 {
        self.0
    }
}

impl Display for ReplicaID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Height of a block in the block tree. The genesis block sits at height 1, and every other block
/// sits exactly one above its first parent.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct Height(u32);

impl Height {
    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u32 {
        self.0
    }
}

impl Display for Height {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl Add<u32> for Height {
    type Output = Height;

    fn add(self, rhs: u32) -> Self::Output {
        Height(self.0.add(rhs))
    }
}

/// A 256-bit fingerprint. Identifies both blocks (the hash of a block's
/// [wire form](crate::types::block::Block)) and client commands.
///
/// `CryptoHash` is `Ord` (lexicographic over the 32 bytes), which the
/// [ordering procedures](crate::ordering) rely on for deterministic tie-breaking.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Signature represented in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    pub(crate) fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

/// Set of signatures, represented as a vector with the size of the replica set. The value at
/// position `i` is either:
/// 1. None: if a signature from the replica with ID `i` has not been collected, or
/// 2. Some(signature_bytes): if signature_bytes has been collected from the replica with ID `i`.
#[derive(Clone, Debug, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureSet(Vec<Option<SignatureBytes>>);

impl SignatureSet {
    pub(crate) fn new(len: usize) -> Self {
        Self(vec![None; len])
    }

    pub const fn vec(&self) -> &Vec<Option<SignatureBytes>> {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Option<SignatureBytes>> {
        self.0.iter()
    }

    pub fn get(&self, pos: usize) -> &Option<SignatureBytes> {
        &self.0[pos]
    }

    pub(crate) fn set(&mut self, pos: usize, value: Option<SignatureBytes>) {
        let signature_vec: &mut Vec<Option<SignatureBytes>> = self.0.as_mut();
        signature_vec[pos] = value
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of positions that hold a signature.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|sig| sig.is_some()).count()
    }
}

/// The fairness parameter γ ∈ (0, 1). Controls how steeply later positions in a replica's local
/// order contribute to a command's weight in
/// [`fair_finalize`](crate::ordering::fair_finalize): a command at 1-based rank `i` contributes
/// `1 − γ^i`, so a γ close to 0 makes the first few ranks dominate while a γ close to 1 flattens
/// the contribution of early ranks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fairness(f64);

impl Fairness {
    /// # Panics
    ///
    /// `gamma` must lie strictly between 0 and 1. This function panics otherwise.
    pub fn new(gamma: f64) -> Self {
        assert!(
            gamma > 0.0 && gamma < 1.0,
            "fairness parameter must lie in (0, 1)"
        );
        Self(gamma)
    }

    pub const fn float(&self) -> f64 {
        self.0
    }

    /// γ raised to the 1-based rank `i`.
    pub(crate) fn pow(&self, i: u32) -> f64 {
        self.0.powi(i as i32)
    }
}

/// Whether a block has been committed by the commit rule. A block starts out `Undecided`; a block
/// marked `Committed` is never rolled back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Undecided,
    Committed,
}

impl Decision {
    /// Wire representation: 0 for undecided, 1 for committed.
    pub const fn int(&self) -> i8 {
        match self {
            Decision::Undecided => 0,
            Decision::Committed => 1,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Decision::Committed)
    }
}
