/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' type and its methods.
//!
//! A block carries the per-replica local orderings its proposer merged
//! ([`orders`](Block::orders)), a [`QuorumCertificate`] for some earlier block, and the hashes of
//! its parents (the first entry is the canonical parent). Blocks form a refcounted graph: a
//! [`BlockPtr`] is shared between [storage](crate::storage::EntityStorage), the state machine's
//! `b0`/`hqc`/`b_lock`/`b_exec`/`tails` holds, and other blocks' resolved `parents`/`qc_ref`
//! edges.
//!
//! The wire fields (`parent_hashes`, `orders`, `qc`, `extra`, `height`) are fixed at construction
//! and never change. The delivery and voting state (`parents`, `qc_ref`, `delivered`, `self_qc`,
//! `voted`, `decision`) lives in `Cell`/`RefCell` fields: all mutation happens on the single
//! state-machine thread, so the shared `Rc` only needs interior mutability, not
//! synchronization.
//!
//! The block hash is the Sha256 digest of the block's wire form, so receivers can recompute it
//! from the serialized block alone.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::Digest;
use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    collections::{BTreeMap, BTreeSet},
    io,
    rc::Rc,
};

use super::basic::{CryptoHash, Decision, Height, ReplicaID};
use super::certificates::QuorumCertificate;
use super::crypto_primitives::CryptoHasher;

/// Shared handle to a block. Strong references keep the block (and, through its resolved edges,
/// its ancestors) alive; [pruning](crate::consensus::ConsensusCore::prune) cuts the
/// `parents`/`qc_ref` edges so storage can release memory.
pub type BlockPtr = Rc<Block>;

/// The height the genesis block sits at.
pub const GENESIS_HEIGHT: Height = Height::new(1);

/// A node in the replicated log chain, carrying a batch of merged local orders.
pub struct Block {
    // Wire fields. Immutable after construction.
    parent_hashes: Vec<CryptoHash>,
    orders: BTreeMap<ReplicaID, Vec<CryptoHash>>,
    qc: Option<QuorumCertificate>,
    extra: Vec<u8>,
    height: Height,
    hash: CryptoHash,

    // Delivery state.
    parents: RefCell<Vec<BlockPtr>>,
    qc_ref: RefCell<Option<BlockPtr>>,
    delivered: Cell<bool>,

    // Voting state.
    self_qc: RefCell<Option<QuorumCertificate>>,
    voted: RefCell<BTreeSet<ReplicaID>>,
    decision: Cell<Decision>,
}

impl Block {
    /// Create a block extending `parents[0]`, carrying the given merged `orders`, a clone of the
    /// proposer's highest `qc`, and an opaque application payload `extra`.
    ///
    /// # Panics
    ///
    /// `parents` must not be empty. This function panics otherwise.
    pub fn new(
        parents: &[BlockPtr],
        orders: BTreeMap<ReplicaID, Vec<CryptoHash>>,
        qc: QuorumCertificate,
        extra: Vec<u8>,
    ) -> Block {
        assert!(!parents.is_empty(), "a block must have at least one parent");
        let parent_hashes = parents.iter().map(|parent| parent.hash()).collect();
        let height = parents[0].height() + 1;
        Block::from_fields(parent_hashes, orders, Some(qc), extra, height)
    }

    /// Create the synthetic genesis block: no parents, no orders, no certificate, height
    /// [`GENESIS_HEIGHT`]. The genesis block is born delivered and committed.
    pub(crate) fn genesis() -> Block {
        let blk = Block::from_fields(
            Vec::new(),
            BTreeMap::new(),
            None,
            Vec::new(),
            GENESIS_HEIGHT,
        );
        blk.delivered.set(true);
        blk.decision.set(Decision::Committed);
        blk
    }

    fn from_fields(
        parent_hashes: Vec<CryptoHash>,
        orders: BTreeMap<ReplicaID, Vec<CryptoHash>>,
        qc: Option<QuorumCertificate>,
        extra: Vec<u8>,
        height: Height,
    ) -> Block {
        let mut blk = Block {
            parent_hashes,
            orders,
            qc,
            extra,
            height,
            hash: CryptoHash::new([0u8; 32]),
            parents: RefCell::new(Vec::new()),
            qc_ref: RefCell::new(None),
            delivered: Cell::new(false),
            self_qc: RefCell::new(None),
            voted: RefCell::new(BTreeSet::new()),
            decision: Cell::new(Decision::Undecided),
        };
        blk.hash = Block::compute_hash(&blk.wire_bytes());
        blk
    }

    /// The Sha256 digest of a block's wire form.
    fn compute_hash(wire_bytes: &[u8]) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(wire_bytes);
        CryptoHash::new(hasher.finalize().into())
    }

    /// The block's wire form: `parent_hashes ‖ orders ‖ qc ‖ extra ‖ height`. The `orders` map is
    /// canonical on the wire (buckets appear in ascending `ReplicaID` order, each u32-length
    /// prefixed), so every replica serializes, and hashes, the same block identically.
    pub fn wire_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize(&mut buf)
            .expect("writing to a Vec never fails");
        buf
    }

    pub fn hash(&self) -> CryptoHash {
        self.hash
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn parent_hashes(&self) -> &Vec<CryptoHash> {
        &self.parent_hashes
    }

    pub fn orders(&self) -> &BTreeMap<ReplicaID, Vec<CryptoHash>> {
        &self.orders
    }

    pub fn qc(&self) -> Option<&QuorumCertificate> {
        self.qc.as_ref()
    }

    pub fn extra(&self) -> &Vec<u8> {
        &self.extra
    }

    pub fn delivered(&self) -> bool {
        self.delivered.get()
    }

    pub(crate) fn mark_delivered(&self) {
        self.delivered.set(true)
    }

    pub fn decision(&self) -> Decision {
        self.decision.get()
    }

    pub(crate) fn set_decision(&self, decision: Decision) {
        self.decision.set(decision)
    }

    pub fn parents(&self) -> Ref<'_, Vec<BlockPtr>> {
        self.parents.borrow()
    }

    /// The canonical parent, once [delivered](Self::delivered). `None` for the genesis block and
    /// for blocks whose parent edges were cut by pruning.
    pub fn parent0(&self) -> Option<BlockPtr> {
        self.parents.borrow().first().cloned()
    }

    pub(crate) fn set_parents(&self, parents: Vec<BlockPtr>) {
        *self.parents.borrow_mut() = parents;
    }

    /// Detach and return the last parent edge. Used by pruning to walk the graph while freeing it.
    pub(crate) fn pop_parent(&self) -> Option<BlockPtr> {
        self.parents.borrow_mut().pop()
    }

    pub fn qc_ref(&self) -> Option<BlockPtr> {
        self.qc_ref.borrow().clone()
    }

    pub(crate) fn set_qc_ref(&self, qc_ref: Option<BlockPtr>) {
        *self.qc_ref.borrow_mut() = qc_ref;
    }

    pub(crate) fn self_qc_mut(&self) -> RefMut<'_, Option<QuorumCertificate>> {
        self.self_qc.borrow_mut()
    }

    /// A snapshot of the certificate this block is aggregating for itself.
    pub fn self_qc(&self) -> Option<QuorumCertificate> {
        self.self_qc.borrow().clone()
    }

    /// Record that `rid` voted for this block. Returns false if `rid` had already voted.
    pub(crate) fn add_vote(&self, rid: ReplicaID) -> bool {
        self.voted.borrow_mut().insert(rid)
    }

    /// Number of distinct replicas that have voted for this block.
    pub fn vote_count(&self) -> usize {
        self.voted.borrow().len()
    }
}

impl BorshSerialize for Block {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.parent_hashes.serialize(writer)?;
        self.orders.serialize(writer)?;
        self.qc.serialize(writer)?;
        self.extra.serialize(writer)?;
        self.height.serialize(writer)
    }
}

/// Wraps a reader, copying every byte read through it into `recorded`.
struct RecordingReader<'a, R: io::Read> {
    inner: &'a mut R,
    recorded: Vec<u8>,
}

impl<'a, R: io::Read> io::Read for RecordingReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.recorded.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl BorshDeserialize for Block {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        // Record exactly the bytes consumed, rather than re-encoding, so the hash matches the
        // wire form regardless of reader implementation.
        let mut recording = RecordingReader {
            inner: reader,
            recorded: Vec::new(),
        };
        let parent_hashes = Vec::<CryptoHash>::deserialize_reader(&mut recording)?;
        let orders = BTreeMap::<ReplicaID, Vec<CryptoHash>>::deserialize_reader(&mut recording)?;
        let qc = Option::<QuorumCertificate>::deserialize_reader(&mut recording)?;
        let extra = Vec::<u8>::deserialize_reader(&mut recording)?;
        let height = Height::deserialize_reader(&mut recording)?;

        let hash = Block::compute_hash(&recording.recorded);

        Ok(Block {
            parent_hashes,
            orders,
            qc,
            extra,
            height,
            hash,
            parents: RefCell::new(Vec::new()),
            qc_ref: RefCell::new(None),
            delivered: Cell::new(false),
            self_qc: RefCell::new(None),
            voted: RefCell::new(BTreeSet::new()),
            decision: Cell::new(Decision::Undecided),
        })
    }
}
