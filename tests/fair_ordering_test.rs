//! Exercises the fair-ordering flow end to end: replicas sending local orders to the leader, the
//! leader's majority signal and merge, the pre-proposal bookkeeping, and the determinism of the
//! finalized command order across replicas.

use fair_hotstuff::messages::{LocalOrder, Proposal};

mod common;

use crate::common::harness::*;

#[test]
fn local_orders_travel_to_the_leader() {
    let keypairs = generate_keypairs(4);
    let mut replica = make_core(1, &keypairs, 1, 0.5);
    let mut network = RecordingNetwork::new();

    let cmds = vec![cmd(1), cmd(2)];
    replica.on_local_order(rid(0), cmds.clone(), false, &mut network);

    assert_eq!(replica_sent(&network), vec![(rid(0), cmds.clone())]);
    for c in &cmds {
        assert!(replica.storage().is_cmd_seen_propose(c));
    }

    // An empty ordering has nothing to send.
    replica.on_local_order(rid(0), Vec::new(), false, &mut network);
    assert_eq!(network.local_orders.len(), 1);

    // The reorder hook re-sends nothing on its own.
    replica.reorder(rid(0), &mut network);
    assert_eq!(network.local_orders.len(), 1);
}

fn replica_sent(
    network: &RecordingNetwork,
) -> Vec<(
    fair_hotstuff::types::basic::ReplicaID,
    Vec<fair_hotstuff::types::basic::CryptoHash>,
)> {
    network
        .local_orders
        .iter()
        .map(|(to, local_order)| (*to, local_order.ordered_hashes.clone()))
        .collect()
}

#[test]
fn leader_signals_once_a_quorum_contributes() {
    let (t1, t2, t3) = (cmd(1), cmd(2), cmd(3));
    let keypairs = generate_keypairs(4);
    let mut leader = make_core(0, &keypairs, 1, 0.5);

    // t1 was already covered by an earlier proposal.
    leader.storage_mut().add_proposed_cmd(t1);

    assert!(!leader.on_receive_local_order(&LocalOrder::new(rid(0), vec![t1, t2])));
    assert!(!leader.on_receive_local_order(&LocalOrder::new(rid(1), vec![t2, t3])));
    assert!(leader.on_receive_local_order(&LocalOrder::new(rid(2), vec![t3, t1])));

    // Reaching the quorum pruned the already-proposed t1 from the queue fronts.
    assert_eq!(leader.storage().get_ordered_hash_vector(rid(0)), vec![t2]);
    assert_eq!(
        leader.storage().get_ordered_hash_vector(rid(1)),
        vec![t2, t3]
    );
    assert_eq!(leader.storage().get_ordered_hash_vector(rid(2)), vec![t3]);

    // The merge extends every contributor to the same command set, in deterministic order.
    let orders = leader.fair_propose();
    assert_eq!(orders[&rid(0)], vec![t2, t3]);
    assert_eq!(orders[&rid(1)], vec![t2, t3]);
    assert_eq!(orders[&rid(2)], vec![t3, t2]);

    // The queue fronts were consumed by the merge.
    assert_eq!(leader.storage().get_local_order_cache_size(), 0);
}

#[test]
fn proposal_bookkeeping_follows_the_command_lifecycle() {
    let keypairs = generate_keypairs(4);
    let mut leader = make_core(0, &keypairs, 1, 0.5);
    let mut app = RecordingApp::new();
    let mut network = RecordingNetwork::new();
    let b0 = leader.get_genesis().clone();

    let c = cmd(0x11);
    leader.storage_mut().add_seen_propose_cmds(&[c]);

    let b1 = propose_and_certify(
        &mut leader,
        &keypairs,
        uniform_orders(&[0, 1, 2], &[c]),
        &b0,
        &mut app,
        &mut network,
    );

    // Once proposed, the command moves from the seen-propose level to the proposed/seen-execute
    // levels.
    assert!(!leader.storage().is_cmd_seen_propose(&c));
    assert!(leader.storage().is_cmd_proposed(&c));
    assert!(leader.storage().is_cmd_seen_execute(&c));

    // Drive the chain until b1 commits; commit clears the remaining bookkeeping.
    let mut parent = b1;
    for round in 2u8..=4 {
        parent = propose_and_certify(
            &mut leader,
            &keypairs,
            uniform_orders(&[0, 1, 2], &[cmd(round)]),
            &parent,
            &mut app,
            &mut network,
        );
    }
    assert_eq!(app.finalities[0].cmd_hash, c);
    assert!(!leader.storage().is_cmd_proposed(&c));
    assert!(!leader.storage().is_cmd_seen_execute(&c));
}

#[test]
fn replicas_finalize_identical_orders() {
    let keypairs = generate_keypairs(4);
    let mut leader = make_core(0, &keypairs, 1, 0.5);
    let mut replica_a = make_core(1, &keypairs, 1, 0.5);
    let mut replica_b = make_core(2, &keypairs, 1, 0.5);

    let mut leader_app = RecordingApp::new();
    let mut leader_network = RecordingNetwork::new();
    let mut app_a = RecordingApp::new();
    let mut network_a = RecordingNetwork::new();
    let mut app_b = RecordingApp::new();
    let mut network_b = RecordingNetwork::new();

    // Replicas disagree about the command order inside the first block.
    let (x, y, z) = (cmd(0xa1), cmd(0xa2), cmd(0xa3));
    let mut contested = std::collections::BTreeMap::new();
    contested.insert(rid(0), vec![x, y, z]);
    contested.insert(rid(1), vec![y, x, z]);
    contested.insert(rid(2), vec![x, z, y]);

    let mut parent = leader.get_genesis().clone();
    for round in 0u8..4 {
        let orders = if round == 0 {
            contested.clone()
        } else {
            uniform_orders(&[0, 1, 2], &[cmd(round)])
        };
        let blk = propose_and_certify(
            &mut leader,
            &keypairs,
            orders,
            &parent,
            &mut leader_app,
            &mut leader_network,
        );
        let prop = Proposal::new(rid(0), blk.clone());
        replicate_proposal(&prop, &mut replica_a, &mut app_a, &mut network_a);
        replicate_proposal(&prop, &mut replica_b, &mut app_b, &mut network_b);
        parent = blk;
    }

    // All three replicas committed the same block (commit safety) ...
    assert!(!leader_app.committed.is_empty());
    assert_eq!(leader_app.committed, app_a.committed);
    assert_eq!(leader_app.committed, app_b.committed);

    // ... and every replica derived the same command sequence: the pairwise majorities put x
    // before y (2:1), x before z (3:0), and y before z (2:1).
    let sequence: Vec<_> = leader_app
        .finalities
        .iter()
        .map(|finality| finality.cmd_hash)
        .collect();
    assert_eq!(sequence, vec![x, y, z]);
    for app in [&app_a, &app_b] {
        let replica_sequence: Vec<_> = app
            .finalities
            .iter()
            .map(|finality| finality.cmd_hash)
            .collect();
        assert_eq!(sequence, replica_sequence);
    }
}
