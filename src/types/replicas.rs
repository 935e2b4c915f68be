/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`ReplicaConfig`] and [`ReplicaInfo`] types and their associated methods.
//!
//! The replica set is fixed at construction: runtime reconfiguration is not supported. The quorum
//! size is derived from the externally supplied fault tolerance parameter:
//! `n_majority = n_replicas − nfaulty`.

use std::collections::BTreeMap;

use super::basic::{Fairness, ReplicaID};
use super::crypto_primitives::VerifyingKey;

/// Identity of a single replica: its [`ReplicaID`] and the public key its votes verify under.
#[derive(Clone)]
pub struct ReplicaInfo {
    pub id: ReplicaID,
    pub verifying_key: VerifyingKey,
}

impl ReplicaInfo {
    pub fn new(id: ReplicaID, verifying_key: VerifyingKey) -> ReplicaInfo {
        ReplicaInfo { id, verifying_key }
    }
}

/// The full replica set, the derived quorum size, and the fairness parameter γ.
#[derive(Clone)]
pub struct ReplicaConfig {
    // Keyed by ReplicaID so that iteration is in ascending ID order.
    replicas: BTreeMap<ReplicaID, ReplicaInfo>,
    n_majority: usize,
    fairness: Fairness,
}

impl ReplicaConfig {
    /// Create a configuration from the full replica set, the number of tolerated faulty replicas,
    /// and the fairness parameter.
    ///
    /// # Panics
    ///
    /// `nfaulty` must be smaller than the number of replicas, and replica IDs must be unique.
    /// This function panics otherwise.
    pub fn new(replicas: Vec<ReplicaInfo>, nfaulty: usize, fairness: Fairness) -> ReplicaConfig {
        let n_replicas = replicas.len();
        assert!(
            nfaulty < n_replicas,
            "the number of faulty replicas must be smaller than the replica set"
        );

        let mut replica_map = BTreeMap::new();
        for info in replicas {
            let prev = replica_map.insert(info.id, info);
            assert!(prev.is_none(), "duplicate replica ID in configuration");
        }

        ReplicaConfig {
            replicas: replica_map,
            n_majority: n_replicas - nfaulty,
            fairness,
        }
    }

    pub fn n_replicas(&self) -> usize {
        self.replicas.len()
    }

    /// The quorum size: `n_replicas − nfaulty`.
    pub fn n_majority(&self) -> usize {
        self.n_majority
    }

    pub fn fairness(&self) -> Fairness {
        self.fairness
    }

    pub fn contains(&self, rid: ReplicaID) -> bool {
        self.replicas.contains_key(&rid)
    }

    pub fn verifying_key(&self, rid: ReplicaID) -> Option<&VerifyingKey> {
        self.replicas.get(&rid).map(|info| &info.verifying_key)
    }

    /// Get an iterator through replica IDs which walks through them in ascending order.
    pub fn replica_ids(&self) -> impl Iterator<Item = ReplicaID> + '_ {
        self.replicas.keys().copied()
    }
}
