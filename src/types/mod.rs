/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types common across the components of the consensus core.
//!
//! The types defined here include:
//! 1. "Inert" newtypes over primitive values ([`basic`]).
//! 2. Cryptographic primitives and the [`Keypair`](crypto_primitives::Keypair) wrapper
//!    ([`crypto_primitives`]).
//! 3. Partial and quorum certificates ([`certificates`]).
//! 4. The replica set and derived quorum threshold ([`replicas`]).
//! 5. The block type and its shared-ownership handle ([`block`]).

pub mod basic;

pub mod block;

pub mod certificates;

pub mod crypto_primitives;

pub mod replicas;
