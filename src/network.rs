/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The interface between the consensus core and the networking provider.
//!
//! The core does not know about transports, framing, or peer discovery; it only asks the provider
//! to move the three progress messages. Providers are expected to deliver messages from a given
//! peer in FIFO order, and to drop (not retry) messages to unreachable peers; retrying is the
//! pacemaker's job.

use crate::messages::{LocalOrder, Proposal, Vote};
use crate::types::basic::ReplicaID;

/// Implemented by the networking provider plugged into the consensus core.
pub trait Network {
    /// Send `proposal` to every replica except the local one.
    fn broadcast_proposal(&mut self, proposal: Proposal);

    /// Send `vote` to `recipient` (the proposer of the voted block).
    fn send_vote(&mut self, recipient: ReplicaID, vote: Vote);

    /// Send `local_order` to `recipient` (the current leader).
    fn send_local_order(&mut self, recipient: ReplicaID, local_order: LocalOrder);
}
