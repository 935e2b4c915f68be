/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The consensus state machine (without network implementation): block delivery, voting,
//! lock/commit rules over a chain of quorum certificates, and the fair-ordering flow between
//! replicas and the current leader.
//!
//! ## Threading model
//!
//! Every method of [`ConsensusCore`] runs on one logical thread: external events (network reads,
//! timers, signature verification results) enqueue work that is handed to the core sequentially.
//! There is no internal locking because there is no shared mutable state across threads. The
//! `async_*` methods hand out one-shot receivers that are resolved from within core methods;
//! dropping such a receiver simply cancels the wait, and the core never notices.
//!
//! ## Commit rule
//!
//! Let `nblk` be the most recently delivered block carrying a quorum certificate. Walking the
//! certificate chain `blk2 = nblk.qc_ref`, `blk1 = blk2.qc_ref`, `blk = blk1.qc_ref`:
//! - observing `blk2` updates the highest QC,
//! - observing `blk1` advances the locked block if `blk1` is higher,
//! - `blk` commits, together with all its uncommitted ancestors, provided the three blocks are
//!   directly linked through their first parents.
//!
//! Every committed block passes through [`fair_finalize`](crate::ordering::fair_finalize) to turn
//! its `orders` map into the canonical command sequence, which is emitted as one
//! [`Finality`] record per command.
//!
//! With the `two-chain` feature the same structure starts one certificate earlier: `blk1 =
//! nblk.qc_ref`, and committing requires only that `blk1` directly extends `blk`.
//!
//! ## Vote rule
//!
//! A replica votes for a block `bnew` only if `bnew.height > vheight`, and either `bnew` carries a
//! certificate for a block higher than the locked block (liveness), or `bnew` extends the locked
//! branch through first parents (safety). Either way `vheight` rises to `bnew.height`, so the
//! replica votes at most once per height, and at most once per block.
//!
//! ## Fatal errors
//!
//! [`HeightRegression`](ConsensusError::HeightRegression) signals a caller bug (the pacemaker
//! asked the core to propose below its own vote height) and
//! [`SafetyBreached`](ConsensusError::SafetyBreached) signals that the commit walk did not
//! terminate at the last committed block. Neither is recoverable: the replica must halt.
//! [`MissingAncestor`](ConsensusError::MissingAncestor), in contrast, only asks the caller to
//! fetch the missing block and redeliver.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::rc::Rc;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use borsh::BorshDeserialize;
use tokio::sync::oneshot;

use crate::app::App;
use crate::events::*;
use crate::messages::{Finality, LocalOrder, Proposal, Vote};
use crate::network::Network;
use crate::ordering;
use crate::storage::EntityStorage;
use crate::types::basic::{CryptoHash, Decision, Height, ReplicaID};
use crate::types::block::{Block, BlockPtr};
use crate::types::certificates::{PartialCertificate, QuorumCertificate};
use crate::types::crypto_primitives::Keypair;
use crate::types::replicas::ReplicaConfig;

/// Enumerates the different ways the state machine can reject an input.
#[derive(Debug)]
pub enum ConsensusError {
    /// A block referenced through a parent hash or a quorum certificate is not (or not yet) in
    /// storage. Recoverable: the collaborating fetcher must retrieve the missing block and
    /// redeliver.
    MissingAncestor { hash: CryptoHash },

    /// The operation requires a delivered block, but the referenced block is unknown or has not
    /// completed delivery. The caller violated a precondition.
    NotDelivered { hash: CryptoHash },

    /// [`on_propose`](ConsensusCore::on_propose) was called with no parents.
    EmptyParents,

    /// A new proposal was not higher than the height this replica last voted at. Fatal: indicates
    /// a caller bug.
    HeightRegression { height: Height, vheight: Height },

    /// The commit walk failed to terminate at the last committed block. Fatal: safety has already
    /// been violated and the replica must halt.
    SafetyBreached {
        expected: CryptoHash,
        reached: CryptoHash,
    },
}

/// The per-replica consensus state machine.
///
/// The core is driven entirely by its caller: the surrounding system feeds it delivered blocks,
/// proposals, votes, and local orders, and plugs in an [`App`] and a [`Network`] for the core's
/// outputs. Scheduling (when to propose, when to give up on a leader) belongs to the pacemaker,
/// which observes the core through the `async_*` methods.
pub struct ConsensusCore {
    id: ReplicaID,
    keypair: Keypair,
    config: ReplicaConfig,
    storage: EntityStorage,

    /// The genesis block.
    b0: BlockPtr,
    /// The highest quorum certificate seen, with the block it certifies. Non-decreasing in
    /// height.
    hqc: (BlockPtr, QuorumCertificate),
    /// The locked block. Non-decreasing in height.
    b_lock: BlockPtr,
    /// The last committed block.
    b_exec: BlockPtr,
    /// Height of the block this replica last voted for.
    vheight: Height,
    /// Delivered blocks with no delivered child.
    tails: HashMap<CryptoHash, BlockPtr>,

    qc_waiting: HashMap<CryptoHash, Vec<oneshot::Sender<()>>>,
    propose_waiting: Vec<oneshot::Sender<Proposal>>,
    receive_proposal_waiting: Vec<oneshot::Sender<Proposal>>,
    hqc_update_waiting: Vec<oneshot::Sender<BlockPtr>>,

    /// Always abstain from voting. Useful for some pacemakers, and for exercising Byzantine
    /// behavior in tests.
    vote_disabled: bool,
    event_publisher: Option<Sender<Event>>,
}

impl ConsensusCore {
    /// Create a core for replica `id`, with the genesis block delivered, committed, and pre-voted
    /// by every replica in `config` (so its certificate is trivially complete).
    pub fn new(
        id: ReplicaID,
        keypair: Keypair,
        config: ReplicaConfig,
        event_publisher: Option<Sender<Event>>,
    ) -> ConsensusCore {
        let mut storage = EntityStorage::new();
        let b0 = storage.add_blk(Block::genesis());

        for rid in config.replica_ids() {
            b0.add_vote(rid);
        }
        let mut genesis_qc = QuorumCertificate::new(b0.hash(), config.n_replicas());
        genesis_qc.compute();
        *b0.self_qc_mut() = Some(genesis_qc.clone());

        let mut tails = HashMap::new();
        tails.insert(b0.hash(), b0.clone());

        ConsensusCore {
            id,
            keypair,
            config,
            storage,
            hqc: (b0.clone(), genesis_qc),
            b_lock: b0.clone(),
            b_exec: b0.clone(),
            b0,
            vheight: Height::new(0),
            tails,
            qc_waiting: HashMap::new(),
            propose_waiting: Vec::new(),
            receive_proposal_waiting: Vec::new(),
            hqc_update_waiting: Vec::new(),
            vote_disabled: false,
            event_publisher,
        }
    }

    /* ↓↓↓ Inputs of the state machine, triggered by external events ↓↓↓ */

    /// Call to inform the state machine that a block is ready to be handled. A block can only be
    /// delivered once itself is fetched, the block certified by its `qc` is delivered, and all
    /// parents are delivered; if any of them is missing this fails with
    /// [`MissingAncestor`](ConsensusError::MissingAncestor) and the caller is expected to fetch
    /// and redeliver.
    ///
    /// Delivering an already-delivered block is a warning and a no-op, and a block whose stamped
    /// height does not sit directly above its first parent is dropped; both return `Ok(false)`.
    pub fn on_deliver_blk(&mut self, blk: &BlockPtr) -> Result<bool, ConsensusError> {
        if blk.delivered() {
            log::warn!("attempt to deliver a block twice");
            return Ok(false);
        }

        let mut parents = Vec::with_capacity(blk.parent_hashes().len());
        for hash in blk.parent_hashes() {
            match self.storage.find_blk(hash) {
                Some(parent) if parent.delivered() => parents.push(parent),
                _ => return Err(ConsensusError::MissingAncestor { hash: *hash }),
            }
        }

        match parents.first() {
            Some(parent) if parent.height() + 1 == blk.height() => (),
            _ => {
                log::warn!("dropping block with inconsistent height");
                return Ok(false);
            }
        }

        let qc_ref = match blk.qc() {
            Some(qc) => match self.storage.find_blk(&qc.blk_hash) {
                Some(certified) if certified.delivered() => Some(certified),
                _ => return Err(ConsensusError::MissingAncestor { hash: qc.blk_hash }),
            },
            None => None,
        };

        for parent in &parents {
            self.tails.remove(&parent.hash());
        }
        self.tails.insert(blk.hash(), blk.clone());

        blk.set_parents(parents);
        blk.set_qc_ref(qc_ref);
        blk.mark_delivered();

        Event::DeliverBlock(DeliverBlockEvent {
            timestamp: SystemTime::now(),
            block: blk.hash(),
            height: blk.height(),
        })
        .publish(&self.event_publisher);

        Ok(true)
    }

    /// Call to propose a block carrying the given merged `orders`. `parents` must contain at
    /// least one block; the first entry is the actual parent, the rest are uncles/aunts. The new
    /// block extends the current highest QC, is self-delivered and self-received (the proposer
    /// votes for its own proposal like everyone else), and is then broadcast.
    pub fn on_propose(
        &mut self,
        orders: BTreeMap<ReplicaID, Vec<CryptoHash>>,
        parents: &[BlockPtr],
        extra: Vec<u8>,
        app: &mut impl App,
        network: &mut impl Network,
    ) -> Result<BlockPtr, ConsensusError> {
        if parents.is_empty() {
            return Err(ConsensusError::EmptyParents);
        }
        for parent in parents {
            self.tails.remove(&parent.hash());
        }

        let bnew = self.storage.add_blk(Block::new(
            parents,
            orders,
            self.hqc.1.clone(),
            extra,
        ));
        *bnew.self_qc_mut() = Some(self.create_quorum_cert(bnew.hash()));

        self.on_deliver_blk(&bnew)?;
        self.update(&bnew, app)?;

        if bnew.height() <= self.vheight {
            return Err(ConsensusError::HeightRegression {
                height: bnew.height(),
                vheight: self.vheight,
            });
        }

        let prop = Proposal::new(self.id, bnew.clone());
        // Self-receive the proposal; no need to send it through the network.
        self.on_receive_proposal(&prop, app, network)?;
        self.on_propose_(&prop);

        Event::Propose(ProposeEvent {
            timestamp: SystemTime::now(),
            block: bnew.hash(),
            height: bnew.height(),
        })
        .publish(&self.event_publisher);

        network.broadcast_proposal(prop);
        Ok(bnew)
    }

    /// Call upon the delivery of a proposal message. The block mentioned in the message must
    /// already be delivered.
    pub fn on_receive_proposal(
        &mut self,
        prop: &Proposal,
        app: &mut impl App,
        network: &mut impl Network,
    ) -> Result<(), ConsensusError> {
        let self_prop = prop.proposer == self.id;
        let bnew = prop.blk.clone();

        Event::ReceiveProposal(ReceiveProposalEvent {
            timestamp: SystemTime::now(),
            origin: prop.proposer,
            block: bnew.hash(),
            height: bnew.height(),
        })
        .publish(&self.event_publisher);

        if !self_prop {
            if !bnew.delivered() {
                return Err(ConsensusError::NotDelivered { hash: bnew.hash() });
            }
            self.update(&bnew, app)?;
        }

        let mut opinion = false;
        if bnew.height() > self.vheight {
            let qc_ref = bnew.qc_ref();
            if qc_ref
                .as_ref()
                .map_or(false, |certified| certified.height() > self.b_lock.height())
            {
                // Liveness condition.
                opinion = true;
                self.vheight = bnew.height();
            } else {
                // Safety condition (extend the locked branch).
                let mut b = bnew.clone();
                while b.height() > self.b_lock.height() {
                    match b.parent0() {
                        Some(parent) => b = parent,
                        None => break,
                    }
                }
                if Rc::ptr_eq(&b, &self.b_lock) {
                    opinion = true;
                    self.vheight = bnew.height();
                }
            }
        }

        if !self_prop {
            if let Some(qc_ref) = bnew.qc_ref() {
                self.on_qc_finish(&qc_ref);
            }
        }
        self.on_receive_proposal_(prop);

        if opinion && !self.vote_disabled {
            let vote = Vote::new(self.id, bnew.hash(), self.create_part_cert(bnew.hash()));
            Event::Vote(VoteEvent {
                timestamp: SystemTime::now(),
                recipient: prop.proposer,
                block: bnew.hash(),
            })
            .publish(&self.event_publisher);
            network.send_vote(prop.proposer, vote);
        }

        Ok(())
    }

    /// Call upon the delivery of a vote message. The block mentioned in the message must already
    /// be delivered, and the vote must have been verified by the caller: votes with bad
    /// signatures are dropped before they reach the state machine.
    pub fn on_receive_vote(&mut self, vote: &Vote) -> Result<(), ConsensusError> {
        Event::ReceiveVote(ReceiveVoteEvent {
            timestamp: SystemTime::now(),
            origin: vote.voter,
            block: vote.blk_hash,
        })
        .publish(&self.event_publisher);

        let blk = self.get_delivered_blk(&vote.blk_hash)?;
        let qsize = blk.vote_count();
        if qsize >= self.config.n_majority() {
            // Quorum already reached; a late vote changes nothing.
            return Ok(());
        }
        if !blk.add_vote(vote.voter) {
            log::warn!("duplicate vote from replica {}", vote.voter);
            return Ok(());
        }

        let n_replicas = self.config.n_replicas();
        let at_quorum = qsize + 1 == self.config.n_majority();
        {
            let mut self_qc = blk.self_qc_mut();
            let qc = self_qc.get_or_insert_with(|| {
                log::warn!("vote for a block not proposed by this replica");
                QuorumCertificate::new(vote.blk_hash, n_replicas)
            });
            qc.add_part(vote.voter, &vote.cert);
            if at_quorum {
                qc.compute();
            }
        }

        if at_quorum {
            let qc = blk.self_qc().expect("certificate was created above");
            Event::CollectQC(CollectQCEvent {
                timestamp: SystemTime::now(),
                block: blk.hash(),
                n_votes: blk.vote_count(),
            })
            .publish(&self.event_publisher);
            self.update_hqc(&blk, &qc);
            self.on_qc_finish(&blk);
        }

        Ok(())
    }

    /// Call to submit this replica's local ordering of commands to the current leader. The
    /// commands are remembered as seen-but-unproposed; if `cmds` is empty there is nothing to
    /// send and the call is a no-op.
    ///
    /// `is_reorder` marks invocations from the pacemaker's [`reorder`](Self::reorder) path.
    pub fn on_local_order(
        &mut self,
        proposer: ReplicaID,
        cmds: Vec<CryptoHash>,
        is_reorder: bool,
        network: &mut impl Network,
    ) {
        self.storage.add_seen_propose_cmds(&cmds);

        if cmds.is_empty() {
            log::debug!(
                "nothing to order for leader {} (reorder: {})",
                proposer,
                is_reorder
            );
            return;
        }

        let local_order = LocalOrder::new(self.id, cmds);
        Event::SendLocalOrder(SendLocalOrderEvent {
            timestamp: SystemTime::now(),
            recipient: proposer,
            n_commands: local_order.ordered_hashes.len(),
        })
        .publish(&self.event_publisher);
        network.send_local_order(proposer, local_order);
    }

    /// Call upon the delivery of a local-order message (leader side). Stores the sequence under
    /// its initiator; once a quorum of distinct replicas have contributed, already-proposed
    /// commands are pruned from the queue fronts and the call returns true, signalling to the
    /// pacemaker that it may merge and propose.
    pub fn on_receive_local_order(&mut self, local_order: &LocalOrder) -> bool {
        Event::ReceiveLocalOrder(ReceiveLocalOrderEvent {
            timestamp: SystemTime::now(),
            origin: local_order.initiator,
            n_commands: local_order.ordered_hashes.len(),
        })
        .publish(&self.event_publisher);

        self.storage
            .add_local_order(local_order.initiator, local_order.ordered_hashes.clone());

        if self.storage.get_local_order_cache_size() >= self.config.n_majority() {
            ordering::prune_proposed_fronts(&mut self.storage);
            // Pruning may have emptied some contributors entirely.
            self.storage.get_local_order_cache_size() >= self.config.n_majority()
        } else {
            false
        }
    }

    /// Merge the buffered local orders into the `orders` map for the next proposal, consuming the
    /// contributors' queue fronts.
    pub fn fair_propose(&mut self) -> BTreeMap<ReplicaID, Vec<CryptoHash>> {
        ordering::merge_orders(&mut self.storage)
    }

    /// Invoked by the pacemaker on leader change or retransmission. The current contract re-sends
    /// nothing on its own: with empty input, [`on_local_order`](Self::on_local_order) is a no-op.
    pub fn reorder(&mut self, proposer: ReplicaID, network: &mut impl Network) {
        self.on_local_order(proposer, Vec::new(), true, network);
    }

    /// Try to release blocks lower than the last committed height minus `staleness`. Starting
    /// `staleness` first-parent steps below the last committed block, parent and certificate
    /// edges are detached and every block reachable only through the starting block is handed
    /// back to storage. Blocks still referenced (from the lock, the highest QC, the committed
    /// chain above the staleness window, or the tails) survive.
    pub fn prune(&mut self, staleness: u32) {
        let mut start = self.b_exec.clone();
        for _ in 0..staleness {
            match start.parent0() {
                Some(parent) => start = parent,
                None => return,
            }
        }

        start.set_qc_ref(None);
        let mut stack = vec![start];
        while let Some(top) = stack.pop() {
            match top.pop_parent() {
                Some(parent) => {
                    top.set_qc_ref(None);
                    stack.push(top);
                    stack.push(parent);
                }
                None => {
                    let hash = top.hash();
                    if self.storage.try_release_blk(&top) {
                        Event::PruneBlock(PruneBlockEvent {
                            timestamp: SystemTime::now(),
                            block: hash,
                        })
                        .publish(&self.event_publisher);
                    }
                }
            }
        }
    }

    /* ↓↓↓ The lock/commit rule ↓↓↓ */

    /// Walk the certificate chain hanging off `nblk` and apply its side effects: update the
    /// highest QC, advance the lock, and commit once the chain's blocks are directly linked (see
    /// the [commit rule](self#commit-rule)).
    fn update(&mut self, nblk: &BlockPtr, app: &mut impl App) -> Result<(), ConsensusError> {
        // The commands merged into this block are now covered by a proposal: move them out of the
        // pre-proposal bookkeeping so they are neither re-sent nor re-proposed.
        if let Some(bucket) = nblk.orders().values().next() {
            for cmd in bucket {
                self.storage.remove_seen_propose_cmd(cmd);
                self.storage.add_proposed_cmd(*cmd);
                self.storage.add_seen_execute_cmd(*cmd);
            }
        }

        #[cfg(not(feature = "two-chain"))]
        let blk = {
            let (qc, blk2) = match (nblk.qc(), nblk.qc_ref()) {
                (Some(qc), Some(blk2)) => (qc.clone(), blk2),
                _ => return Ok(()),
            };
            // A decided block could be incomplete due to pruning.
            if blk2.decision().is_committed() {
                return Ok(());
            }
            self.update_hqc(&blk2, &qc);

            let blk1 = match blk2.qc_ref() {
                Some(blk1) => blk1,
                None => return Ok(()),
            };
            if blk1.decision().is_committed() {
                return Ok(());
            }
            if blk1.height() > self.b_lock.height() {
                self.b_lock = blk1.clone();
                Event::UpdateLockedBlock(UpdateLockedBlockEvent {
                    timestamp: SystemTime::now(),
                    block: blk1.hash(),
                    height: blk1.height(),
                })
                .publish(&self.event_publisher);
            }

            let blk = match blk1.qc_ref() {
                Some(blk) => blk,
                None => return Ok(()),
            };
            if blk.decision().is_committed() {
                return Ok(());
            }

            // Commit requires the three blocks to be directly linked.
            let directly_linked = blk2
                .parent0()
                .map_or(false, |parent| Rc::ptr_eq(&parent, &blk1))
                && blk1
                    .parent0()
                    .map_or(false, |parent| Rc::ptr_eq(&parent, &blk));
            if !directly_linked {
                return Ok(());
            }
            blk
        };

        #[cfg(feature = "two-chain")]
        let blk = {
            let (qc, blk1) = match (nblk.qc(), nblk.qc_ref()) {
                (Some(qc), Some(blk1)) => (qc.clone(), blk1),
                _ => return Ok(()),
            };
            if blk1.decision().is_committed() {
                return Ok(());
            }
            self.update_hqc(&blk1, &qc);
            if blk1.height() > self.b_lock.height() {
                self.b_lock = blk1.clone();
                Event::UpdateLockedBlock(UpdateLockedBlockEvent {
                    timestamp: SystemTime::now(),
                    block: blk1.hash(),
                    height: blk1.height(),
                })
                .publish(&self.event_publisher);
            }

            let blk = match blk1.qc_ref() {
                Some(blk) => blk,
                None => return Ok(()),
            };
            if blk.decision().is_committed() {
                return Ok(());
            }

            // Commit requires a direct parent link.
            if !blk1
                .parent0()
                .map_or(false, |parent| Rc::ptr_eq(&parent, &blk))
            {
                return Ok(());
            }
            blk
        };

        // Everything from b_exec (exclusive) up to blk (inclusive) commits, oldest first.
        let mut commit_queue = Vec::new();
        let mut b = blk;
        while b.height() > self.b_exec.height() {
            commit_queue.push(b.clone());
            match b.parent0() {
                Some(parent) => b = parent,
                None => break,
            }
        }
        if !Rc::ptr_eq(&b, &self.b_exec) {
            return Err(ConsensusError::SafetyBreached {
                expected: self.b_exec.hash(),
                reached: b.hash(),
            });
        }

        for blk in commit_queue.iter().rev() {
            let order = ordering::fair_finalize(blk.orders(), self.config.fairness());
            if order.is_empty() && !blk.orders().is_empty() {
                // Not a correct set of local orders: stop looking at further blocks.
                break;
            }

            blk.set_decision(Decision::Committed);
            app.on_commit(blk);
            Event::CommitBlock(CommitBlockEvent {
                timestamp: SystemTime::now(),
                block: blk.hash(),
                height: blk.height(),
            })
            .publish(&self.event_publisher);

            for (idx, cmd) in order.iter().enumerate() {
                app.decide(Finality::new(
                    self.id,
                    1,
                    idx as u32,
                    blk.height(),
                    *cmd,
                    blk.hash(),
                ));
                self.storage.remove_seen_execute_cmd(cmd);
                self.storage.remove_proposed_cmd(cmd);
                Event::Decide(DecideEvent {
                    timestamp: SystemTime::now(),
                    cmd: *cmd,
                    cmd_idx: idx as u32,
                    height: blk.height(),
                })
                .publish(&self.event_publisher);
            }

            self.b_exec = blk.clone();
        }

        Ok(())
    }

    /// Replace the highest QC if `new_hqc` certifies a strictly higher block.
    fn update_hqc(&mut self, new_hqc: &BlockPtr, qc: &QuorumCertificate) {
        if new_hqc.height() > self.hqc.0.height() {
            self.hqc = (new_hqc.clone(), qc.clone());
            Event::UpdateHighestQC(UpdateHighestQCEvent {
                timestamp: SystemTime::now(),
                block: new_hqc.hash(),
                height: new_hqc.height(),
            })
            .publish(&self.event_publisher);
            self.on_hqc_update();
        }
    }

    /* ↓↓↓ One-shot completions for the pacemaker ↓↓↓ */

    /// Get a receiver resolved when `blk` gets a quorum certificate. If the quorum is already in,
    /// the receiver is resolved immediately.
    pub fn async_qc_finish(&mut self, blk: &BlockPtr) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        if blk.vote_count() >= self.config.n_majority() {
            let _ = tx.send(());
        } else {
            self.qc_waiting.entry(blk.hash()).or_default().push(tx);
        }
        rx
    }

    /// Get a receiver resolved when this replica proposes its next block.
    pub fn async_wait_proposal(&mut self) -> oneshot::Receiver<Proposal> {
        let (tx, rx) = oneshot::channel();
        self.propose_waiting.push(tx);
        rx
    }

    /// Get a receiver resolved when the next proposal is received.
    pub fn async_wait_receive_proposal(&mut self) -> oneshot::Receiver<Proposal> {
        let (tx, rx) = oneshot::channel();
        self.receive_proposal_waiting.push(tx);
        rx
    }

    /// Get a receiver resolved, with the newly certified block, when the highest QC is replaced.
    pub fn async_hqc_update(&mut self) -> oneshot::Receiver<BlockPtr> {
        let (tx, rx) = oneshot::channel();
        self.hqc_update_waiting.push(tx);
        rx
    }

    fn on_qc_finish(&mut self, blk: &BlockPtr) {
        if let Some(waiters) = self.qc_waiting.remove(&blk.hash()) {
            for waiter in waiters {
                let _ = waiter.send(());
            }
        }
    }

    fn on_propose_(&mut self, prop: &Proposal) {
        for waiter in self.propose_waiting.drain(..) {
            let _ = waiter.send(prop.clone());
        }
    }

    fn on_receive_proposal_(&mut self, prop: &Proposal) {
        for waiter in self.receive_proposal_waiting.drain(..) {
            let _ = waiter.send(prop.clone());
        }
    }

    fn on_hqc_update(&mut self) {
        let hqc_blk = self.hqc.0.clone();
        for waiter in self.hqc_update_waiting.drain(..) {
            let _ = waiter.send(hqc_blk.clone());
        }
    }

    /* ↓↓↓ Factories for the opaque certificate types ↓↓↓ */

    /// Create a partial certificate that proves this replica's vote for a block.
    pub fn create_part_cert(&self, blk_hash: CryptoHash) -> PartialCertificate {
        PartialCertificate::new(&self.keypair, blk_hash)
    }

    /// Create a partial certificate from its serialized form.
    pub fn parse_part_cert(&self, buf: &mut &[u8]) -> io::Result<PartialCertificate> {
        PartialCertificate::deserialize(buf)
    }

    /// Create an empty quorum certificate for the block identified by `blk_hash`.
    pub fn create_quorum_cert(&self, blk_hash: CryptoHash) -> QuorumCertificate {
        QuorumCertificate::new(blk_hash, self.config.n_replicas())
    }

    /// Create a quorum certificate from its serialized form.
    pub fn parse_quorum_cert(&self, buf: &mut &[u8]) -> io::Result<QuorumCertificate> {
        QuorumCertificate::deserialize(buf)
    }

    /* ↓↓↓ Other useful functions ↓↓↓ */

    /// Find `hash` in storage, requiring that it has completed delivery.
    pub fn get_delivered_blk(&self, hash: &CryptoHash) -> Result<BlockPtr, ConsensusError> {
        match self.storage.find_blk(hash) {
            Some(blk) if blk.delivered() => Ok(blk),
            _ => Err(ConsensusError::NotDelivered { hash: *hash }),
        }
    }

    pub fn get_genesis(&self) -> &BlockPtr {
        &self.b0
    }

    pub fn get_hqc(&self) -> &BlockPtr {
        &self.hqc.0
    }

    pub fn get_hqc_qc(&self) -> &QuorumCertificate {
        &self.hqc.1
    }

    pub fn get_b_lock(&self) -> &BlockPtr {
        &self.b_lock
    }

    pub fn get_b_exec(&self) -> &BlockPtr {
        &self.b_exec
    }

    pub fn get_vheight(&self) -> Height {
        self.vheight
    }

    pub fn get_tails(&self) -> impl Iterator<Item = &BlockPtr> {
        self.tails.values()
    }

    pub fn get_config(&self) -> &ReplicaConfig {
        &self.config
    }

    pub fn get_id(&self) -> ReplicaID {
        self.id
    }

    pub fn storage(&self) -> &EntityStorage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut EntityStorage {
        &mut self.storage
    }

    pub fn set_vote_disabled(&mut self, vote_disabled: bool) {
        self.vote_disabled = vote_disabled;
    }
}
