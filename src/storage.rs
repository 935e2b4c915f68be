/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The in-memory entity store: a content-addressed map of blocks, plus the auxiliary caches that
//! the fair-ordering layer works against.
//!
//! ## Blocks
//!
//! [`EntityStorage`] owns every block the replica knows of, keyed by hash.
//! [`add_blk`](EntityStorage::add_blk) is idempotent per hash, so deserializing a proposal that
//! contains an already-known block hands back the existing [`BlockPtr`]. Blocks leave storage
//! only through
//! [`try_release_blk`](EntityStorage::try_release_blk), and only once nothing else holds a strong
//! reference to them.
//!
//! ## Ordering caches
//!
//! Three levels of command bookkeeping support the fair-ordering layer:
//! 1. `local_order_cache`: per-replica FIFO queues of command hashes; the front entries are the
//!    next candidates for a proposal.
//! 2. `seen_propose_level`: commands observed in local orders but not yet proposed.
//! 3. `seen_execute_level` and `proposed_cmds`: commands that have appeared in a proposal but are
//!    not yet committed, and the set of all commands ever proposed.
//!
//! All mutation is serial with respect to the state machine: everything here is touched only from
//! the core thread, so there are no locks.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use crate::types::basic::{CryptoHash, ReplicaID};
use crate::types::block::{Block, BlockPtr};

pub struct EntityStorage {
    blocks: HashMap<CryptoHash, BlockPtr>,
    local_order_cache: BTreeMap<ReplicaID, VecDeque<CryptoHash>>,
    seen_propose_level: HashSet<CryptoHash>,
    seen_execute_level: HashSet<CryptoHash>,
    proposed_cmds: HashSet<CryptoHash>,
}

impl EntityStorage {
    pub fn new() -> EntityStorage {
        EntityStorage {
            blocks: HashMap::new(),
            local_order_cache: BTreeMap::new(),
            seen_propose_level: HashSet::new(),
            seen_execute_level: HashSet::new(),
            proposed_cmds: HashSet::new(),
        }
    }

    /* ↓↓↓ Content-addressed block store ↓↓↓ */

    /// Insert `blk` and return its shared handle. If a block with the same hash is already stored,
    /// the existing handle is returned and `blk` is dropped.
    pub fn add_blk(&mut self, blk: Block) -> BlockPtr {
        let hash = blk.hash();
        self.blocks.entry(hash).or_insert_with(|| Rc::new(blk)).clone()
    }

    pub fn find_blk(&self, hash: &CryptoHash) -> Option<BlockPtr> {
        self.blocks.get(hash).cloned()
    }

    pub fn contains_blk(&self, hash: &CryptoHash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn blk_count(&self) -> usize {
        self.blocks.len()
    }

    /// Release `blk` from storage if nothing besides storage (and the caller's own handle) still
    /// references it. Returns whether the block was released.
    pub fn try_release_blk(&mut self, blk: &BlockPtr) -> bool {
        // One strong count for the storage map, one for the caller's handle.
        if Rc::strong_count(blk) == 2 {
            self.blocks.remove(&blk.hash());
            true
        } else {
            false
        }
    }

    /* ↓↓↓ Per-replica local-order queues ↓↓↓ */

    /// Append `cmds` to `replica`'s local-order queue.
    pub fn add_local_order(&mut self, replica: ReplicaID, cmds: Vec<CryptoHash>) {
        self.local_order_cache
            .entry(replica)
            .or_insert_with(VecDeque::new)
            .extend(cmds);
    }

    /// Snapshot of `replica`'s queue, front first.
    pub fn get_ordered_hash_vector(&self, replica: ReplicaID) -> Vec<CryptoHash> {
        self.local_order_cache
            .get(&replica)
            .map(|queue| queue.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The replicas currently contributing to the local-order cache, in ascending ID order.
    pub fn get_ordered_hash_replica_vector(&self) -> Vec<ReplicaID> {
        self.local_order_cache.keys().copied().collect()
    }

    /// Number of replicas currently contributing to the local-order cache.
    pub fn get_local_order_cache_size(&self) -> usize {
        self.local_order_cache.len()
    }

    /// Drop the front entries of `replica`'s queue (everything currently queued).
    pub fn clear_front_ordered_hash(&mut self, replica: ReplicaID) {
        self.local_order_cache.remove(&replica);
    }

    /// Push `cmds` back onto the front of `replica`'s queue, preserving their order.
    pub fn add_ordered_hash_to_front(&mut self, replica: ReplicaID, cmds: Vec<CryptoHash>) {
        let queue = self
            .local_order_cache
            .entry(replica)
            .or_insert_with(VecDeque::new);
        for cmd in cmds.into_iter().rev() {
            queue.push_front(cmd);
        }
    }

    /* ↓↓↓ Seen / proposed command sets ↓↓↓ */

    /// Record `cmds` as seen in a local order but not yet proposed.
    pub fn add_seen_propose_cmds(&mut self, cmds: &[CryptoHash]) {
        self.seen_propose_level.extend(cmds.iter().copied());
    }

    pub fn remove_seen_propose_cmd(&mut self, cmd: &CryptoHash) {
        self.seen_propose_level.remove(cmd);
    }

    pub fn is_cmd_seen_propose(&self, cmd: &CryptoHash) -> bool {
        self.seen_propose_level.contains(cmd)
    }

    /// Record `cmd` as proposed but not yet committed.
    pub fn add_seen_execute_cmd(&mut self, cmd: CryptoHash) {
        self.seen_execute_level.insert(cmd);
    }

    pub fn remove_seen_execute_cmd(&mut self, cmd: &CryptoHash) {
        self.seen_execute_level.remove(cmd);
    }

    pub fn is_cmd_seen_execute(&self, cmd: &CryptoHash) -> bool {
        self.seen_execute_level.contains(cmd)
    }

    /// Record that a proposal has been issued for `cmd`.
    pub fn add_proposed_cmd(&mut self, cmd: CryptoHash) {
        self.proposed_cmds.insert(cmd);
    }

    pub fn remove_proposed_cmd(&mut self, cmd: &CryptoHash) {
        self.proposed_cmds.remove(cmd);
    }

    pub fn is_cmd_proposed(&self, cmd: &CryptoHash) -> bool {
        self.proposed_cmds.contains(cmd)
    }
}

impl Default for EntityStorage {
    fn default() -> Self {
        EntityStorage::new()
    }
}
