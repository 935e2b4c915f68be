/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The replica logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values
//! are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. Block and command hashes are
//! printed as the first seven characters of their Base64 encoding.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const DELIVER_BLOCK: &str = "DeliverBlock";
pub const COMMIT_BLOCK: &str = "CommitBlock";
pub const PRUNE_BLOCK: &str = "PruneBlock";
pub const UPDATE_HIGHEST_QC: &str = "UpdateHighestQC";
pub const UPDATE_LOCKED_BLOCK: &str = "UpdateLockedBlock";

pub const PROPOSE: &str = "Propose";
pub const VOTE: &str = "Vote";
pub const SEND_LOCAL_ORDER: &str = "SendLocalOrder";

pub const RECEIVE_PROPOSAL: &str = "ReceiveProposal";
pub const RECEIVE_VOTE: &str = "ReceiveVote";
pub const RECEIVE_LOCAL_ORDER: &str = "ReceiveLocalOrder";

pub const COLLECT_QC: &str = "CollectQC";
pub const DECIDE: &str = "Decide";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for DeliverBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |deliver_block_event: &DeliverBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                DELIVER_BLOCK,
                secs_since_unix_epoch(deliver_block_event.timestamp),
                first_seven_base64_chars(&deliver_block_event.block.bytes()),
                deliver_block_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |commit_block_event: &CommitBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                COMMIT_BLOCK,
                secs_since_unix_epoch(commit_block_event.timestamp),
                first_seven_base64_chars(&commit_block_event.block.bytes()),
                commit_block_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for PruneBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |prune_block_event: &PruneBlockEvent| {
            log::info!(
                "{}, {}, {}",
                PRUNE_BLOCK,
                secs_since_unix_epoch(prune_block_event.timestamp),
                first_seven_base64_chars(&prune_block_event.block.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateHighestQCEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_highest_qc_event: &UpdateHighestQCEvent| {
            log::info!(
                "{}, {}, {}, {}",
                UPDATE_HIGHEST_QC,
                secs_since_unix_epoch(update_highest_qc_event.timestamp),
                first_seven_base64_chars(&update_highest_qc_event.block.bytes()),
                update_highest_qc_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateLockedBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_locked_block_event: &UpdateLockedBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                UPDATE_LOCKED_BLOCK,
                secs_since_unix_epoch(update_locked_block_event.timestamp),
                first_seven_base64_chars(&update_locked_block_event.block.bytes()),
                update_locked_block_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for ProposeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |propose_event: &ProposeEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PROPOSE,
                secs_since_unix_epoch(propose_event.timestamp),
                first_seven_base64_chars(&propose_event.block.bytes()),
                propose_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for VoteEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |vote_event: &VoteEvent| {
            log::info!(
                "{}, {}, {}, {}",
                VOTE,
                secs_since_unix_epoch(vote_event.timestamp),
                vote_event.recipient,
                first_seven_base64_chars(&vote_event.block.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for SendLocalOrderEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |send_local_order_event: &SendLocalOrderEvent| {
            log::info!(
                "{}, {}, {}, {}",
                SEND_LOCAL_ORDER,
                secs_since_unix_epoch(send_local_order_event.timestamp),
                send_local_order_event.recipient,
                send_local_order_event.n_commands
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveProposalEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_proposal_event: &ReceiveProposalEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                RECEIVE_PROPOSAL,
                secs_since_unix_epoch(receive_proposal_event.timestamp),
                receive_proposal_event.origin,
                first_seven_base64_chars(&receive_proposal_event.block.bytes()),
                receive_proposal_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveVoteEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_vote_event: &ReceiveVoteEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_VOTE,
                secs_since_unix_epoch(receive_vote_event.timestamp),
                receive_vote_event.origin,
                first_seven_base64_chars(&receive_vote_event.block.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveLocalOrderEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_local_order_event: &ReceiveLocalOrderEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_LOCAL_ORDER,
                secs_since_unix_epoch(receive_local_order_event.timestamp),
                receive_local_order_event.origin,
                receive_local_order_event.n_commands
            )
        };
        Box::new(logger)
    }
}

impl Logger for CollectQCEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |collect_qc_event: &CollectQCEvent| {
            log::info!(
                "{}, {}, {}, {}",
                COLLECT_QC,
                secs_since_unix_epoch(collect_qc_event.timestamp),
                first_seven_base64_chars(&collect_qc_event.block.bytes()),
                collect_qc_event.n_votes
            )
        };
        Box::new(logger)
    }
}

impl Logger for DecideEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |decide_event: &DecideEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                DECIDE,
                secs_since_unix_epoch(decide_event.timestamp),
                first_seven_base64_chars(&decide_event.cmd.bytes()),
                decide_event.cmd_idx,
                decide_event.height
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first
// 7 characters.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}
