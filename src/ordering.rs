/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The order-fairness layer: merging per-replica local orderings into a proposal on the leader,
//! and totalizing a committed block's orderings into the canonical command sequence.
//!
//! ## Leader side: [`merge_orders`]
//!
//! Once a quorum of replicas have contributed local orders, the leader merges them by
//! union-extension: the first contributor's sequence is extended with every command that appears
//! only in later contributors' sequences (in encounter order), and every other contributor's
//! sequence is then extended with the commands it was missing, in the first contributor's final
//! order. The result maps each contributor to a permutation of the same command set, which becomes
//! the proposal's `orders` field.
//!
//! Before merging, [`prune_proposed_fronts`] drops commands that an earlier proposal already
//! covered from the front of each contributor's queue, so commands are not proposed twice.
//!
//! ## Commit side: [`fair_finalize`]
//!
//! At commit time every replica independently collapses a block's `orders` map into one total
//! order. A command at 1-based rank `i` of a replica's sequence accumulates weight `1 − γ^i`, and
//! commands are first arranged by ascending total weight. A second, stable pass then has the
//! final say: a command precedes another iff a majority of the replicas place it first, with full
//! pairwise ties falling back to ascending command hash. Every step is deterministic, so all
//! honest replicas derive byte-equal sequences for the same block.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::storage::EntityStorage;
use crate::types::basic::{CryptoHash, Fairness, ReplicaID};

/// Drop already-proposed commands from the front of every contributor's local-order queue.
///
/// For each contributing replica, the still-unproposed commands are kept in their original
/// relative order; if every queued command is unproposed the queue is left untouched.
pub fn prune_proposed_fronts(storage: &mut EntityStorage) {
    for replica in storage.get_ordered_hash_replica_vector() {
        let queued = storage.get_ordered_hash_vector(replica);
        let unproposed: Vec<CryptoHash> = queued
            .iter()
            .filter(|cmd| !storage.is_cmd_proposed(cmd))
            .copied()
            .collect();
        if unproposed.len() < queued.len() {
            storage.clear_front_ordered_hash(replica);
            if !unproposed.is_empty() {
                storage.add_ordered_hash_to_front(replica, unproposed);
            }
        }
    }
}

/// Merge the queued local orders into the `orders` map of the next proposal.
///
/// The contributors' queue fronts are consumed: after this call the local-order cache is empty.
/// Returns an empty map if no replica has contributed.
///
/// # Preconditions
///
/// The caller (normally the pacemaker, prompted by
/// [`on_receive_local_order`](crate::consensus::ConsensusCore::on_receive_local_order) returning
/// true) should only merge once at least
/// [`n_majority`](crate::types::replicas::ReplicaConfig::n_majority) distinct replicas have
/// contributed.
pub fn merge_orders(storage: &mut EntityStorage) -> BTreeMap<ReplicaID, Vec<CryptoHash>> {
    let replicas = storage.get_ordered_hash_replica_vector();
    let mut orders: BTreeMap<ReplicaID, Vec<CryptoHash>> = BTreeMap::new();
    if replicas.is_empty() {
        return orders;
    }

    // Extend the first contributor's sequence with every command it has not seen, in encounter
    // order over the other contributors.
    let r0 = replicas[0];
    let mut r0_seq = storage.get_ordered_hash_vector(r0);
    let mut r0_set: HashSet<CryptoHash> = r0_seq.iter().copied().collect();
    for &replica in &replicas[1..] {
        let seq = storage.get_ordered_hash_vector(replica);
        for cmd in &seq {
            if r0_set.insert(*cmd) {
                r0_seq.push(*cmd);
            }
        }
        orders.insert(replica, seq);
    }

    // Then extend every other contributor's sequence with the commands it was missing, in the
    // first contributor's final order.
    for &replica in &replicas[1..] {
        let seq = orders.get_mut(&replica).expect("inserted above");
        let have: HashSet<CryptoHash> = seq.iter().copied().collect();
        for cmd in &r0_seq {
            if !have.contains(cmd) {
                seq.push(*cmd);
            }
        }
    }
    orders.insert(r0, r0_seq);

    for replica in replicas {
        storage.clear_front_ordered_hash(replica);
    }

    orders
}

/// Collapse a committed block's `orders` map into the block's canonical total order.
///
/// An empty `orders` map yields an empty sequence; this counts as success. The commit loop treats
/// an empty result for a *non-empty* map as the signal to stop committing further blocks.
pub fn fair_finalize(
    orders: &BTreeMap<ReplicaID, Vec<CryptoHash>>,
    gamma: Fairness,
) -> Vec<CryptoHash> {
    let first_bucket = match orders.values().next() {
        Some(bucket) => bucket,
        None => return Vec::new(),
    };

    // Weighted rank score: weight(c) = Σ over replicas r of (1 − γ^rank_r(c)). Lower weight means
    // the command sits earlier in more replicas' sequences.
    let mut cmd_weight: HashMap<CryptoHash, f64> = HashMap::new();
    for cmd in first_bucket {
        cmd_weight.insert(*cmd, 0.0);
    }
    for bucket in orders.values() {
        for (pos, cmd) in bucket.iter().enumerate() {
            let rank = (pos + 1) as u32;
            *cmd_weight.entry(*cmd).or_insert(0.0) += 1.0 - gamma.pow(rank);
        }
    }

    // pairwise_count[(a, b)] = number of replicas that place a before b.
    let mut pairwise_count: HashMap<(CryptoHash, CryptoHash), u32> = HashMap::new();
    for bucket in orders.values() {
        for (from, cmd_a) in bucket.iter().enumerate() {
            for cmd_b in bucket.iter().skip(from + 1) {
                *pairwise_count.entry((*cmd_a, *cmd_b)).or_insert(0) += 1;
            }
        }
    }

    // Primary sort: ascending weighted rank score, starting from a canonical hash arrangement so
    // the stable sorts see the same input on every replica.
    let mut order: Vec<CryptoHash> = cmd_weight.keys().copied().collect();
    order.sort();
    order.sort_by(|a, b| {
        cmd_weight[a]
            .partial_cmp(&cmd_weight[b])
            .unwrap_or(Ordering::Equal)
    });

    // The pairwise majority has the final say: a precedes b iff more replicas place a before b,
    // whatever their scores; a full tie falls back to the hash order.
    order.sort_by(|a, b| {
        let a_first = pairwise_count.get(&(*a, *b)).copied().unwrap_or(0);
        let b_first = pairwise_count.get(&(*b, *a)).copied().unwrap_or(0);
        b_first.cmp(&a_first).then_with(|| a.cmp(b))
    });

    order
}
