/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Structured messages that are sent between replicas.
//!
//! ## Messages
//!
//! Four message types cross the wire:
//! 1. [`Proposal`]: broadcasted by the current leader, who proposes to extend the block tree with
//!    the contained block.
//! 2. [`Vote`]: sent by a replica to the proposer to vote for a block, carrying a
//!    [partial certificate](PartialCertificate) over the block hash.
//! 3. [`LocalOrder`]: sent by a replica to the current leader, carrying the replica's local
//!    ordering of commands.
//! 4. [`Finality`]: emitted to the application, one per committed command.
//!
//! ## Wire form
//!
//! Everything is Borsh-encoded: multi-byte integers little-endian, sequences u32-length-prefixed.
//! A proposal's block deserializes through [`EntityStorage`] so that a re-received block resolves
//! to the replica's existing copy.

use borsh::{BorshDeserialize, BorshSerialize};
use std::io;

use crate::storage::EntityStorage;
use crate::types::basic::{CryptoHash, Height, ReplicaID};
use crate::types::block::{Block, BlockPtr};
use crate::types::certificates::PartialCertificate;
use crate::types::replicas::ReplicaConfig;

/// Broadcasted by the leader of a given view, who proposes to extend the block tree with the
/// contained block.
#[derive(Clone)]
pub struct Proposal {
    pub proposer: ReplicaID,
    pub blk: BlockPtr,
}

impl Proposal {
    pub fn new(proposer: ReplicaID, blk: BlockPtr) -> Proposal {
        Proposal { proposer, blk }
    }

    /// Wire form: `proposer ‖ Block`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.proposer
            .serialize(&mut buf)
            .and_then(|()| self.blk.serialize(&mut buf))
            .expect("writing to a Vec never fails");
        buf
    }

    /// Parse a proposal, routing the contained block through `storage`. If the block was already
    /// known, the returned proposal points at the existing copy.
    pub fn from_bytes(mut bytes: &[u8], storage: &mut EntityStorage) -> io::Result<Proposal> {
        let buf = &mut bytes;
        let proposer = ReplicaID::deserialize(buf)?;
        let blk = Block::deserialize(buf)?;
        let blk = storage.add_blk(blk);
        Ok(Proposal { proposer, blk })
    }
}

/// Sent by a replica to the proposer to vote for a block.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Vote {
    pub voter: ReplicaID,
    /// Hash of the block being voted for.
    pub blk_hash: CryptoHash,
    /// Proof of validity for the vote.
    pub cert: PartialCertificate,
}

impl Vote {
    pub fn new(voter: ReplicaID, blk_hash: CryptoHash, cert: PartialCertificate) -> Vote {
        Vote {
            voter,
            blk_hash,
            cert,
        }
    }

    /// Checks that the certificate covers the voted block and verifies under the voter's public
    /// key. Callers drop votes that fail this check before handing them to the state machine.
    pub fn verify(&self, config: &ReplicaConfig) -> bool {
        match config.verifying_key(self.voter) {
            Some(verifying_key) => {
                self.cert.blk_hash == self.blk_hash && self.cert.is_correct(verifying_key)
            }
            None => false,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.try_to_vec().expect("writing to a Vec never fails")
    }

    pub fn from_bytes(bytes: &[u8]) -> io::Result<Vote> {
        Vote::try_from_slice(bytes)
    }
}

/// Sent by a replica to the current leader, carrying the replica's local ordering of commands.
///
/// Wire form: `initiator ‖ u32 count ‖ count × 32-byte command hashes`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct LocalOrder {
    pub initiator: ReplicaID,
    /// The command ordering as seen by `initiator`.
    pub ordered_hashes: Vec<CryptoHash>,
}

impl LocalOrder {
    pub fn new(initiator: ReplicaID, ordered_hashes: Vec<CryptoHash>) -> LocalOrder {
        LocalOrder {
            initiator,
            ordered_hashes,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.try_to_vec().expect("writing to a Vec never fails")
    }

    pub fn from_bytes(bytes: &[u8]) -> io::Result<LocalOrder> {
        LocalOrder::try_from_slice(bytes)
    }
}

/// Per-command commit emission, handed to the application once the command's position in the total
/// order is final.
///
/// Wire form: `rid ‖ i8 decision ‖ u32 cmd_idx ‖ u32 cmd_height ‖ 32-byte cmd_hash`, followed by
/// the 32-byte block hash iff `decision == 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Finality {
    pub rid: ReplicaID,
    pub decision: i8,
    /// Position of the command in the block's canonical total order.
    pub cmd_idx: u32,
    /// Height of the block the command was committed in.
    pub cmd_height: Height,
    pub cmd_hash: CryptoHash,
    pub blk_hash: CryptoHash,
}

impl Finality {
    pub fn new(
        rid: ReplicaID,
        decision: i8,
        cmd_idx: u32,
        cmd_height: Height,
        cmd_hash: CryptoHash,
        blk_hash: CryptoHash,
    ) -> Finality {
        Finality {
            rid,
            decision,
            cmd_idx,
            cmd_height,
            cmd_hash,
            blk_hash,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.try_to_vec().expect("writing to a Vec never fails")
    }

    pub fn from_bytes(bytes: &[u8]) -> io::Result<Finality> {
        Finality::try_from_slice(bytes)
    }
}

impl BorshSerialize for Finality {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.rid.serialize(writer)?;
        self.decision.serialize(writer)?;
        self.cmd_idx.serialize(writer)?;
        self.cmd_height.serialize(writer)?;
        self.cmd_hash.serialize(writer)?;
        if self.decision == 1 {
            self.blk_hash.serialize(writer)?;
        }
        Ok(())
    }
}

impl BorshDeserialize for Finality {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let rid = ReplicaID::deserialize_reader(reader)?;
        let decision = i8::deserialize_reader(reader)?;
        let cmd_idx = u32::deserialize_reader(reader)?;
        let cmd_height = Height::deserialize_reader(reader)?;
        let cmd_hash = CryptoHash::deserialize_reader(reader)?;
        let blk_hash = if decision == 1 {
            CryptoHash::deserialize_reader(reader)?
        } else {
            CryptoHash::new([0u8; 32])
        };
        Ok(Finality {
            rid,
            decision,
            cmd_idx,
            cmd_height,
            cmd_hash,
            blk_hash,
        })
    }
}
