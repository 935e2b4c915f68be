//! Drives a single leader through several proposal rounds and checks the commit rule: a block
//! commits once it heads a three-chain of directly linked, certified blocks, its commands are
//! emitted in the block's canonical order, and the core's height markers only ever move forward.

use std::rc::Rc;

use borsh::BorshDeserialize;
use log::LevelFilter;

use fair_hotstuff::consensus::ConsensusError;
use fair_hotstuff::messages::Proposal;
use fair_hotstuff::types::basic::Height;
use fair_hotstuff::types::block::Block;

mod common;

use crate::common::harness::*;
use crate::common::logging::setup_logger;

#[test]
fn three_chain_commits_the_oldest_block() {
    setup_logger(LevelFilter::Warn);

    let keypairs = generate_keypairs(4);
    let mut leader = make_core(0, &keypairs, 1, 0.5);
    let mut app = RecordingApp::new();
    let mut network = RecordingNetwork::new();
    let b0 = leader.get_genesis().clone();

    let cmds1 = [cmd(0x11), cmd(0x12)];
    let b1 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &cmds1),
        &b0,
        &mut app,
        &mut network,
    );
    assert_eq!(b1.height(), Height::new(2));
    assert!(app.finalities.is_empty());

    let b2 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &[cmd(0x21)]),
        &b1,
        &mut app,
        &mut network,
    );
    let b3 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &[cmd(0x31)]),
        &b2,
        &mut app,
        &mut network,
    );
    // Two uncommitted certified blocks are not enough.
    assert!(app.finalities.is_empty());

    let b4 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &[cmd(0x41)]),
        &b3,
        &mut app,
        &mut network,
    );

    // b2, b3, b4 form the three-chain that commits b1.
    assert_eq!(app.committed, vec![b1.hash()]);
    assert_eq!(app.finalities.len(), 2);
    for (idx, finality) in app.finalities.iter().enumerate() {
        assert_eq!(finality.rid, rid(0));
        assert_eq!(finality.decision, 1);
        assert_eq!(finality.cmd_idx, idx as u32);
        assert_eq!(finality.cmd_height, b1.height());
        assert_eq!(finality.cmd_hash, cmds1[idx]);
        assert_eq!(finality.blk_hash, b1.hash());
    }

    assert!(Rc::ptr_eq(leader.get_b_exec(), &b1));
    assert!(Rc::ptr_eq(leader.get_b_lock(), &b2));
    // The votes for b4 arrived after it was proposed, so the highest QC certifies b4 itself.
    assert!(Rc::ptr_eq(leader.get_hqc(), &b4));
    assert_eq!(leader.get_vheight(), b4.height());

    // The only tail is the tip of the chain.
    let tails: Vec<_> = leader.get_tails().map(|blk| blk.hash()).collect();
    assert_eq!(tails, vec![b4.hash()]);

    // The proposer broadcast each proposal exactly once.
    assert_eq!(network.proposals.len(), 4);
}

#[test]
fn height_markers_are_monotone() {
    let keypairs = generate_keypairs(4);
    let mut leader = make_core(0, &keypairs, 1, 0.5);
    let mut app = RecordingApp::new();
    let mut network = RecordingNetwork::new();

    let mut parent = leader.get_genesis().clone();
    let mut previous = (Height::new(0), Height::new(0), Height::new(0), Height::new(0));
    for round in 0u8..6 {
        parent = propose_and_certify(
            &mut leader,
            &keypairs,
            uniform_orders(&[0, 1, 2], &[cmd(round + 1)]),
            &parent,
            &mut app,
            &mut network,
        );
        let current = (
            leader.get_hqc().height(),
            leader.get_b_lock().height(),
            leader.get_b_exec().height(),
            leader.get_vheight(),
        );
        assert!(current.0 >= previous.0);
        assert!(current.1 >= previous.1);
        assert!(current.2 >= previous.2);
        assert!(current.3 >= previous.3);
        previous = current;
    }

    // Every first-parent ancestor of the last committed block is itself committed.
    let mut blk = leader.get_b_exec().clone();
    loop {
        assert!(blk.decision().is_committed());
        match blk.parent0() {
            Some(ancestor) => blk = ancestor,
            None => break,
        }
    }
}

#[test]
fn delivery_is_idempotent() {
    let keypairs = generate_keypairs(4);
    let mut leader = make_core(0, &keypairs, 1, 0.5);
    let mut app = RecordingApp::new();
    let mut network = RecordingNetwork::new();
    let b0 = leader.get_genesis().clone();

    let b1 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &[cmd(1)]),
        &b0,
        &mut app,
        &mut network,
    );

    // on_propose already delivered b1; a second delivery warns and reports false.
    assert_eq!(leader.on_deliver_blk(&b1).unwrap(), false);
    assert!(b1.delivered());
}

#[test]
fn delivery_rejects_inconsistent_heights() {
    let keypairs = generate_keypairs(4);
    let mut leader = make_core(0, &keypairs, 1, 0.5);
    let mut app = RecordingApp::new();
    let mut network = RecordingNetwork::new();
    let b0 = leader.get_genesis().clone();

    let b1 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &[cmd(1)]),
        &b0,
        &mut app,
        &mut network,
    );

    // Rewrite the height stamped into a child of b1: the height is the final u32 of the wire
    // form.
    let child = Block::new(
        &[b1],
        uniform_orders(&[0, 1, 2], &[cmd(2)]),
        leader.get_hqc_qc().clone(),
        Vec::new(),
    );
    let mut bytes = child.wire_bytes();
    let len = bytes.len();
    bytes[len - 4..].copy_from_slice(&(child.height().int() + 1).to_le_bytes());
    let forged = Block::deserialize(&mut bytes.as_slice()).unwrap();

    let forged = leader.storage_mut().add_blk(forged);
    assert_eq!(leader.on_deliver_blk(&forged).unwrap(), false);
    assert!(!forged.delivered());
}

#[test]
fn delivery_of_an_orphan_asks_for_its_ancestor() {
    let keypairs = generate_keypairs(4);
    let mut leader = make_core(0, &keypairs, 1, 0.5);
    let mut replica = make_core(1, &keypairs, 1, 0.5);
    let mut app = RecordingApp::new();
    let mut network = RecordingNetwork::new();
    let b0 = leader.get_genesis().clone();

    let b1 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &[cmd(1)]),
        &b0,
        &mut app,
        &mut network,
    );
    let b2 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &[cmd(2)]),
        &b1,
        &mut app,
        &mut network,
    );

    // The replica sees b2 without ever having fetched b1.
    let bytes = Proposal::new(rid(0), b2).to_bytes();
    let prop = Proposal::from_bytes(&bytes, replica.storage_mut()).unwrap();
    match replica.on_deliver_blk(&prop.blk) {
        Err(ConsensusError::MissingAncestor { hash }) => assert_eq!(hash, b1.hash()),
        other => panic!("expected MissingAncestor, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn propose_rejects_bad_inputs() {
    let keypairs = generate_keypairs(4);
    let mut leader = make_core(0, &keypairs, 1, 0.5);
    let mut app = RecordingApp::new();
    let mut network = RecordingNetwork::new();
    let b0 = leader.get_genesis().clone();

    assert!(matches!(
        leader.on_propose(
            uniform_orders(&[0, 1, 2], &[cmd(1)]),
            &[],
            Vec::new(),
            &mut app,
            &mut network
        ),
        Err(ConsensusError::EmptyParents)
    ));

    let b1 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &[cmd(1)]),
        &b0,
        &mut app,
        &mut network,
    );
    let _b2 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &[cmd(2)]),
        &b1,
        &mut app,
        &mut network,
    );

    // Proposing on top of genesis again would sit at or below the height this replica already
    // voted at.
    assert!(matches!(
        leader.on_propose(
            uniform_orders(&[0, 1, 2], &[cmd(3)]),
            &[b0],
            Vec::new(),
            &mut app,
            &mut network
        ),
        Err(ConsensusError::HeightRegression { .. })
    ));
}

#[test]
fn prune_releases_only_unreachable_blocks() {
    let keypairs = generate_keypairs(4);
    let mut leader = make_core(0, &keypairs, 1, 0.5);
    let mut app = RecordingApp::new();
    let mut network = RecordingNetwork::new();

    let mut chain = vec![leader.get_genesis().clone()];
    for round in 0u8..5 {
        let parent = chain.last().unwrap().clone();
        chain.push(propose_and_certify(
            &mut leader,
            &keypairs,
            uniform_orders(&[0, 1, 2], &[cmd(round + 1)]),
            &parent,
            &mut app,
            &mut network,
        ));
    }
    // Chain is b0..b5; b1 and b2 are committed.
    assert_eq!(leader.get_b_exec().hash(), chain[2].hash());

    // Keep only hashes from here on: the test's own handles would otherwise pin the blocks and
    // make the release decision about the harness instead of the core.
    let hashes: Vec<_> = chain.iter().map(|blk| blk.hash()).collect();
    drop(chain);

    // A staleness window taller than the chain releases nothing.
    let stored_before = leader.storage().blk_count();
    leader.prune(10);
    assert_eq!(leader.storage().blk_count(), stored_before);

    // Pruning right at the committed frontier releases b1 (only reachable through b2) but keeps
    // the genesis block, which the core holds, and everything from b2 up.
    leader.prune(0);
    assert!(!leader.storage().contains_blk(&hashes[1]));
    for kept in [0usize, 2, 3, 4, 5] {
        assert!(leader.storage().contains_blk(&hashes[kept]));
    }
}
