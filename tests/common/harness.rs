//! Test doubles and builders for driving a [`ConsensusCore`] without a real network: a recording
//! application, a recording network, and helpers that play the roles of the pacemaker and of the
//! other replicas in the cluster.

use std::collections::BTreeMap;

use ed25519_dalek::SigningKey;
use rand_core::OsRng;

use fair_hotstuff::app::App;
use fair_hotstuff::consensus::ConsensusCore;
use fair_hotstuff::messages::{Finality, LocalOrder, Proposal, Vote};
use fair_hotstuff::network::Network;
use fair_hotstuff::types::basic::{CryptoHash, Fairness, ReplicaID};
use fair_hotstuff::types::block::BlockPtr;
use fair_hotstuff::types::certificates::PartialCertificate;
use fair_hotstuff::types::crypto_primitives::Keypair;
use fair_hotstuff::types::replicas::{ReplicaConfig, ReplicaInfo};

/// Create `n` fresh keypairs, one per replica, with replica `i` holding `keypairs[i]`.
pub(crate) fn generate_keypairs(n: u16) -> Vec<Keypair> {
    let mut csprg = OsRng {};
    (0..n)
        .map(|_| Keypair::new(SigningKey::generate(&mut csprg)))
        .collect()
}

pub(crate) fn make_config(keypairs: &[Keypair], nfaulty: usize, gamma: f64) -> ReplicaConfig {
    let replicas = keypairs
        .iter()
        .enumerate()
        .map(|(i, keypair)| ReplicaInfo::new(ReplicaID::new(i as u16), keypair.public()))
        .collect();
    ReplicaConfig::new(replicas, nfaulty, Fairness::new(gamma))
}

pub(crate) fn make_core(id: u16, keypairs: &[Keypair], nfaulty: usize, gamma: f64) -> ConsensusCore {
    ConsensusCore::new(
        ReplicaID::new(id),
        keypairs[id as usize].clone(),
        make_config(keypairs, nfaulty, gamma),
        None,
    )
}

pub(crate) fn cmd(byte: u8) -> CryptoHash {
    CryptoHash::new([byte; 32])
}

pub(crate) fn rid(int: u16) -> ReplicaID {
    ReplicaID::new(int)
}

/// A correctly signed vote from replica `voter` for the block identified by `blk_hash`.
pub(crate) fn vote_from(keypair: &Keypair, voter: u16, blk_hash: CryptoHash) -> Vote {
    Vote::new(
        ReplicaID::new(voter),
        blk_hash,
        PartialCertificate::new(keypair, blk_hash),
    )
}

/// An `orders` map in which every listed replica reports the same sequence of commands.
pub(crate) fn uniform_orders(
    replicas: &[u16],
    cmds: &[CryptoHash],
) -> BTreeMap<ReplicaID, Vec<CryptoHash>> {
    replicas
        .iter()
        .map(|replica| (ReplicaID::new(*replica), cmds.to_vec()))
        .collect()
}

/// Records every `decide` and `on_commit` callback.
pub(crate) struct RecordingApp {
    pub(crate) finalities: Vec<Finality>,
    pub(crate) committed: Vec<CryptoHash>,
}

impl RecordingApp {
    pub(crate) fn new() -> RecordingApp {
        RecordingApp {
            finalities: Vec::new(),
            committed: Vec::new(),
        }
    }
}

impl App for RecordingApp {
    fn decide(&mut self, finality: Finality) {
        self.finalities.push(finality);
    }

    fn on_commit(&mut self, blk: &BlockPtr) {
        self.committed.push(blk.hash());
    }
}

/// Records every message the core asks to be sent.
pub(crate) struct RecordingNetwork {
    pub(crate) proposals: Vec<Proposal>,
    pub(crate) votes: Vec<(ReplicaID, Vote)>,
    pub(crate) local_orders: Vec<(ReplicaID, LocalOrder)>,
}

impl RecordingNetwork {
    pub(crate) fn new() -> RecordingNetwork {
        RecordingNetwork {
            proposals: Vec::new(),
            votes: Vec::new(),
            local_orders: Vec::new(),
        }
    }

    /// The votes sent to `recipient` for the block identified by `blk_hash`.
    pub(crate) fn votes_for(&self, recipient: ReplicaID, blk_hash: CryptoHash) -> Vec<Vote> {
        self.votes
            .iter()
            .filter(|(to, vote)| *to == recipient && vote.blk_hash == blk_hash)
            .map(|(_, vote)| vote.clone())
            .collect()
    }
}

impl Network for RecordingNetwork {
    fn broadcast_proposal(&mut self, proposal: Proposal) {
        self.proposals.push(proposal);
    }

    fn send_vote(&mut self, recipient: ReplicaID, vote: Vote) {
        self.votes.push((recipient, vote));
    }

    fn send_local_order(&mut self, recipient: ReplicaID, local_order: LocalOrder) {
        self.local_orders.push((recipient, local_order));
    }
}

/// Drive `leader` through one full round: propose a block carrying `orders` on top of `parent`,
/// loop the leader's own vote back into it, and top the quorum up with votes signed by the other
/// replicas' keys. Returns the certified block.
pub(crate) fn propose_and_certify(
    leader: &mut ConsensusCore,
    keypairs: &[Keypair],
    orders: BTreeMap<ReplicaID, Vec<CryptoHash>>,
    parent: &BlockPtr,
    app: &mut RecordingApp,
    network: &mut RecordingNetwork,
) -> BlockPtr {
    let blk = leader
        .on_propose(orders, &[parent.clone()], Vec::new(), app, network)
        .unwrap();

    // The leader unicast its own vote to itself; route it back in.
    for vote in network.votes_for(leader.get_id(), blk.hash()) {
        leader.on_receive_vote(&vote).unwrap();
    }

    let n_majority = leader.get_config().n_majority();
    let mut voter = 0u16;
    while blk.vote_count() < n_majority {
        voter += 1;
        if ReplicaID::new(voter) == leader.get_id() {
            continue;
        }
        let vote = vote_from(&keypairs[voter as usize], voter, blk.hash());
        leader.on_receive_vote(&vote).unwrap();
    }

    blk
}

/// Ship `prop` to `replica` the way the surrounding system would: serialize, parse through the
/// replica's storage, deliver, then hand the proposal to the state machine. Returns the replica's
/// copy of the block.
pub(crate) fn replicate_proposal(
    prop: &Proposal,
    replica: &mut ConsensusCore,
    app: &mut RecordingApp,
    network: &mut RecordingNetwork,
) -> BlockPtr {
    let bytes = prop.to_bytes();
    let prop = Proposal::from_bytes(&bytes, replica.storage_mut()).unwrap();
    replica.on_deliver_blk(&prop.blk).unwrap();
    replica.on_receive_proposal(&prop, app, network).unwrap();
    prop.blk
}
