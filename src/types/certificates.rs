/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Certificate types that prove votes: [`PartialCertificate`], a single replica's signature over a
//! block hash, and [`QuorumCertificate`], the aggregate of at least
//! [`n_majority`](crate::types::replicas::ReplicaConfig::n_majority) of them.
//!
//! A `QuorumCertificate` is built up incrementally: the replica collecting votes for a block
//! [adds parts](QuorumCertificate::add_part) as they arrive, and
//! [finalizes](QuorumCertificate::compute) the certificate once the quorum threshold is reached.
//! The state machine only ever clones, serializes, adds parts to, and verifies certificates; it
//! never inspects their internals.

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::Signature;
use std::io;

use super::basic::{CryptoHash, ReplicaID, SignatureBytes, SignatureSet};
use super::crypto_primitives::{Keypair, Verifier, VerifyingKey};
use super::replicas::ReplicaConfig;

/// Proof that a single replica voted for the block identified by `blk_hash`: an ed25519 signature
/// over the 32 bytes of the hash.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PartialCertificate {
    pub blk_hash: CryptoHash,
    pub signature: SignatureBytes,
}

impl PartialCertificate {
    /// Create a partial certificate proving a vote for the block identified by `blk_hash`.
    pub fn new(keypair: &Keypair, blk_hash: CryptoHash) -> PartialCertificate {
        let signature = keypair.sign(&blk_hash.bytes());
        PartialCertificate {
            blk_hash,
            signature,
        }
    }

    /// Checks whether the signature is a correct signature over `blk_hash` by the holder of
    /// `verifying_key`.
    pub fn is_correct(&self, verifying_key: &VerifyingKey) -> bool {
        match Signature::from_slice(&self.signature.bytes()) {
            Ok(signature) => verifying_key
                .verify(&self.blk_hash.bytes(), &signature)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// Proof that at least a quorum of replicas voted for the block identified by `blk_hash`.
///
/// The signature at position `i` of `signatures` belongs to the replica with ID `i`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuorumCertificate {
    pub blk_hash: CryptoHash,
    pub signatures: SignatureSet,
    // Set by `compute` once the last required part has been added. Certificates parsed from the
    // wire are always complete. Not serialized.
    complete: bool,
}

impl QuorumCertificate {
    /// Create an empty certificate for the block identified by `blk_hash`, with one signature slot
    /// per replica in a replica set of size `n_replicas`.
    pub fn new(blk_hash: CryptoHash, n_replicas: usize) -> QuorumCertificate {
        QuorumCertificate {
            blk_hash,
            signatures: SignatureSet::new(n_replicas),
            complete: false,
        }
    }

    /// Add `part` as the signature of replica `rid`.
    ///
    /// # Panics
    ///
    /// `part.blk_hash` must match the certificate's `blk_hash`, `rid` must be within the replica
    /// set, and the certificate must not have been [computed](Self::compute) yet. This function
    /// panics otherwise.
    pub fn add_part(&mut self, rid: ReplicaID, part: &PartialCertificate) {
        assert_eq!(
            part.blk_hash, self.blk_hash,
            "partial certificate is for a different block"
        );
        assert!(!self.complete, "certificate has already been computed");
        self.signatures
            .set(rid.int() as usize, Some(part.signature));
    }

    /// Finalize the certificate after the last required part has been added. Once computed, a
    /// certificate accepts no further parts.
    pub fn compute(&mut self) {
        self.complete = true;
    }

    /// Whether [`compute`](Self::compute) has been called on this certificate.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of collected parts.
    pub fn count(&self) -> usize {
        self.signatures.count()
    }

    /// Checks if the signatures held at quorum-size or more positions are correct signatures over
    /// `blk_hash` under the public keys of the replicas at those positions.
    pub fn is_correct(&self, config: &ReplicaConfig) -> bool {
        let mut n_valid = 0;
        for (pos, signature) in self.signatures.iter().enumerate() {
            if let Some(signature) = signature {
                let rid = ReplicaID::new(pos as u16);
                let verifying_key = match config.verifying_key(rid) {
                    Some(vk) => vk,
                    None => return false,
                };
                match Signature::from_slice(&signature.bytes()) {
                    Ok(signature) => {
                        if verifying_key
                            .verify(&self.blk_hash.bytes(), &signature)
                            .is_ok()
                        {
                            n_valid += 1;
                        } else {
                            // A forged part invalidates the whole certificate.
                            return false;
                        }
                    }
                    Err(_) => return false,
                }
            }
        }
        n_valid >= config.n_majority()
    }
}

impl BorshSerialize for QuorumCertificate {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.blk_hash.serialize(writer)?;
        self.signatures.serialize(writer)
    }
}

impl BorshDeserialize for QuorumCertificate {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let blk_hash = CryptoHash::deserialize_reader(reader)?;
        let signatures = SignatureSet::deserialize_reader(reader)?;
        Ok(QuorumCertificate {
            blk_hash,
            signatures,
            complete: true,
        })
    }
}
