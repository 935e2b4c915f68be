/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Notifications that are emitted when significant things happen in the local replica.
//!
//! ## Event enum
//!
//! Significant occurrences include delivering a block, broadcasting a proposal, voting, collecting
//! a quorum certificate, and committing a block. Each corresponds to a variant of the
//! [event enum](Event), whose inner struct stores information summarizing the occurrence,
//! always including a timestamp of when it happened.
//!
//! Events carry hashes, heights, and replica IDs rather than block handles, so they can cross to
//! the [event bus](crate::event_bus) thread.
//!
//! ## Timing
//!
//! Events are always emitted **after** the corresponding occurrence has completed. For example,
//! the [commit event](CommitBlockEvent) is only emitted after the block's decision was recorded.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::types::basic::{CryptoHash, Height, ReplicaID};

/// Enumerates all events emitted by the consensus core.
pub enum Event {
    // Events that change the block graph.
    DeliverBlock(DeliverBlockEvent),
    CommitBlock(CommitBlockEvent),
    PruneBlock(PruneBlockEvent),
    UpdateHighestQC(UpdateHighestQCEvent),
    UpdateLockedBlock(UpdateLockedBlockEvent),

    // Events that involve sending a message.
    Propose(ProposeEvent),
    Vote(VoteEvent),
    SendLocalOrder(SendLocalOrderEvent),

    // Events that involve receiving a message.
    ReceiveProposal(ReceiveProposalEvent),
    ReceiveVote(ReceiveVoteEvent),
    ReceiveLocalOrder(ReceiveLocalOrderEvent),

    // Progress events.
    CollectQC(CollectQCEvent),
    Decide(DecideEvent),
}

impl Event {
    /// Publishes a given instance of the [`Event`] enum on the event publisher channel (if the
    /// channel is defined).
    pub fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(self);
        }
    }
}

/// A block's parents and certificate reference were resolved and the block joined the block graph.
pub struct DeliverBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub height: Height,
}

/// A block, identifiable by its hash, was committed.
pub struct CommitBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub height: Height,
}

/// A block, identifiable by its hash, was released from storage by pruning.
pub struct PruneBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
}

/// The highest known quorum certificate was replaced. Includes the hash and height of the newly
/// certified block.
pub struct UpdateHighestQCEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub height: Height,
}

/// The locked block advanced. Includes the hash and height of the newly locked block.
pub struct UpdateLockedBlockEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub height: Height,
}

/// The local replica proposed a block.
pub struct ProposeEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub height: Height,
}

/// The local replica voted for a block.
pub struct VoteEvent {
    pub timestamp: SystemTime,
    pub recipient: ReplicaID,
    pub block: CryptoHash,
}

/// The local replica sent its local ordering to the current leader.
pub struct SendLocalOrderEvent {
    pub timestamp: SystemTime,
    pub recipient: ReplicaID,
    pub n_commands: usize,
}

/// A proposal arrived from `origin`.
pub struct ReceiveProposalEvent {
    pub timestamp: SystemTime,
    pub origin: ReplicaID,
    pub block: CryptoHash,
    pub height: Height,
}

/// A vote for `block` arrived from `origin`.
pub struct ReceiveVoteEvent {
    pub timestamp: SystemTime,
    pub origin: ReplicaID,
    pub block: CryptoHash,
}

/// A local ordering arrived from `origin`.
pub struct ReceiveLocalOrderEvent {
    pub timestamp: SystemTime,
    pub origin: ReplicaID,
    pub n_commands: usize,
}

/// Votes for `block` reached the quorum threshold and its certificate was finalized.
pub struct CollectQCEvent {
    pub timestamp: SystemTime,
    pub block: CryptoHash,
    pub n_votes: usize,
}

/// A command's position in the total order became final.
pub struct DecideEvent {
    pub timestamp: SystemTime,
    pub cmd: CryptoHash,
    pub cmd_idx: u32,
    pub height: Height,
}
