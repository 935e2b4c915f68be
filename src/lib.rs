/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A Rust implementation of leader-based, Byzantine Fault Tolerant state machine replication with
//! order-fairness.
//!
//! Replicas send their local view of the command arrival order to the current leader. The leader
//! merges a quorum of these local orderings into a proposal, which travels through the usual
//! chained-QC voting flow; once a block commits, every replica independently collapses the
//! block's orderings into one deterministic total order (weighted-Borda scoring refined by a
//! pairwise-majority pass with hash tie-breaks) and emits a [`Finality`](messages::Finality)
//! record per command.
//!
//! This crate is the replicated-consensus engine only. Networking, serialization framing, the
//! pacemaker that schedules proposals and elects leaders, client command ingest, and persistence
//! all live outside, behind the [`App`](app::App) and [`Network`](network::Network) traits and
//! the [`async_*`](consensus::ConsensusCore::async_qc_finish) completion handles.
//!
//! The consensus state machine lives in [`consensus`], the fair-ordering procedures in
//! [`ordering`], the block store and ordering caches in [`storage`], and the wire messages in
//! [`messages`].

pub mod app;

pub mod consensus;

pub mod event_bus;

pub mod events;

pub mod messages;

pub mod network;

pub mod ordering;

pub mod storage;

pub mod types;

pub(crate) mod logging;

// Re-exports
pub use app::App;
pub use consensus::{ConsensusCore, ConsensusError};
pub use network::Network;
