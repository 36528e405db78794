//! Fork switching scenarios: two nodes producing divergent branches and
//! pushing each other's blocks.

use crate::*;
use ec_chain_engine::SkipFlags;

#[test]
fn test_push_block_from_peer() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let mut node_a = open_chain(dir_a.path());
    let mut node_b = open_chain(dir_b.path());

    let block = produce_block(&mut node_a);
    node_b.push_block(&block, SkipFlags::NOTHING).unwrap();

    assert_eq!(node_a.head_block_id(), node_b.head_block_id());
    assert_eq!(node_a.state.state_digest(), node_b.state.state_digest());
}

#[test]
fn test_fork_switch_to_longer_branch() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let mut node_a = open_chain(dir_a.path());
    let mut node_b = open_chain(dir_b.path());

    // Shared history: block 1 (X).
    let x = produce_block(&mut node_a);
    node_b.push_block(&x, SkipFlags::NOTHING).unwrap();

    // A produces Y at slot 1; B independently produces Z' at slot 2. Both
    // sit at height 2 with different ids.
    let y = produce_block(&mut node_a);
    let z1 = produce_block_at_slot(&mut node_b, 2);
    assert_eq!(y.block_num(), 2);
    assert_eq!(z1.block_num(), 2);
    assert_ne!(y.id(), z1.id());

    // A learns about Z': same height, no switch.
    let switched = node_a.push_block(&z1, SkipFlags::NOTHING).unwrap();
    assert!(!switched);
    assert_eq!(node_a.head_block_id(), y.id());
    assert_eq!(node_a.fork_db().fetch_block_by_number(2).len(), 2);

    // B extends its branch with Z''; A switches to the longer fork.
    let z2 = produce_block(&mut node_b);
    assert_eq!(z2.block_num(), 3);
    let switched = node_a.push_block(&z2, SkipFlags::NOTHING).unwrap();
    assert!(switched);
    assert_eq!(node_a.head_block_id(), z2.id());
    assert_eq!(node_a.head_block_num(), 3);

    // Both nodes converge on identical state.
    assert_eq!(node_a.state.state_digest(), node_b.state.state_digest());
    node_a.validate_invariants().unwrap();
}

#[test]
fn test_failed_fork_switch_restores_original_branch() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let mut node_a = open_chain(dir_a.path());
    let mut node_b = open_chain(dir_b.path());

    let x = produce_block(&mut node_a);
    node_b.push_block(&x, SkipFlags::NOTHING).unwrap();

    let y = produce_block(&mut node_a);
    let z1 = produce_block_at_slot(&mut node_b, 2);
    node_a.push_block(&z1, SkipFlags::NOTHING).unwrap();

    let digest_before = node_a.state.state_digest();

    // A corrupted extension of the other branch: right parent, garbage
    // signature.
    let mut z2 = produce_block(&mut node_b);
    z2.witness_signature = shared_types::Signature::empty();
    let err = node_a.push_block(&z2, SkipFlags::NOTHING);
    assert!(err.is_err());

    // The failed switch rolled everything back to the original branch.
    assert_eq!(node_a.head_block_id(), y.id());
    assert_eq!(node_a.state.state_digest(), digest_before);
    node_a.validate_invariants().unwrap();
}

#[test]
fn test_double_reorganization_converges() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let mut node_a = open_chain(dir_a.path());
    let mut node_b = open_chain(dir_b.path());

    let x = produce_block(&mut node_a);
    node_b.push_block(&x, SkipFlags::NOTHING).unwrap();

    // Branch A: two blocks. Branch B: three blocks missing more slots.
    let _a2 = produce_block(&mut node_a);
    let _a3 = produce_block(&mut node_a);

    let b2 = produce_block_at_slot(&mut node_b, 2);
    let b3 = produce_block_at_slot(&mut node_b, 2);
    let b4 = produce_block_at_slot(&mut node_b, 2);

    // A adopts branch B once it is strictly longer.
    node_a.push_block(&b2, SkipFlags::NOTHING).unwrap();
    node_a.push_block(&b3, SkipFlags::NOTHING).unwrap();
    let switched = node_a.push_block(&b4, SkipFlags::NOTHING).unwrap();
    assert!(switched);

    assert_eq!(node_a.head_block_id(), node_b.head_block_id());
    assert_eq!(node_a.state.state_digest(), node_b.state.state_digest());
}
