/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The interface between the consensus core and the replicated application.

use crate::messages::Finality;
use crate::types::block::BlockPtr;

/// Implemented by the replicated application. The state machine calls into an `App` from inside
/// its commit path, so implementations should return promptly; anything slow belongs on another
/// thread, fed from these callbacks.
///
/// Implementors are additionally expected to be *deterministic*: replaying the same sequence of
/// callbacks must produce the same application state on every replica.
pub trait App {
    /// Called once per committed command, in the command's final position in the total order.
    /// `finality` carries the command's index within its block, the block height, and both hashes.
    fn decide(&mut self, finality: Finality);

    /// Called once per committed block, before the block's commands are
    /// [decided](Self::decide).
    fn on_commit(&mut self, blk: &BlockPtr);
}
