//! Collection Correctness Tests - Liveness and Graph Integrity
//!
//! These tests verify that a pass:
//! - Preserves every rooted object, payload intact
//! - Reclaims everything unreachable, and nothing else
//! - Rewrites every live slot to the copy's current address
//! - Leaves forwarding records that resolve until the next pass begins
//!
//! ============================================================================
//! EACH TEST FINDS SPECIFIC COLLECTION BUGS - DO NOT WEAKEN ASSERTIONS
//! ============================================================================

mod common;

use common::{
    assert_address_aligned, assert_all_addresses_unique, assert_chain_intact, assert_payload,
    HeapFixture,
};
use tgc::Status;

/// ============================================================================
/// LIVENESS TESTS
/// ============================================================================

/// Test that a rooted object survives a minor pass and moves.
///
/// **Bug this finds:** root scanning missed, copy corrupting the body
/// **Invariant verified:** rooted objects survive with their payload
#[test]
fn test_rooted_object_survives_and_moves() {
    // Arrange
    let mut fixture = HeapFixture::with_defaults();
    let obj = fixture.alloc(0, 0xA11CE);
    fixture.root(obj);

    // Act
    fixture.minor();

    // Assert - the root slot now holds the copy in the other semispace
    let current = fixture.root_at(0);
    assert_ne!(current, obj, "copying pass left the object in place");
    assert_address_aligned(current, "copy destination");
    assert_eq!(fixture.heap.status(current), Status::Reachable);
    assert_payload(&fixture, current, 0xA11CE, "rooted survivor");
}

/// Test that garbage is reclaimed, and exactly the garbage.
///
/// **Bug this finds:** leaked garbage, live words reclaimed, cursor drift
/// **Invariant verified:** budget released equals the unreachable words
#[test]
fn test_garbage_reclaimed_exactly() {
    // Arrange - one rooted object, one garbage object, two words each
    let mut fixture = HeapFixture::with_defaults();
    let live = fixture.alloc(0, 1);
    let garbage = fixture.alloc(0, 2);
    fixture.root(live);
    let before = fixture.heap.remaining();

    // Act
    fixture.minor();

    // Assert - exactly the garbage object's two words came back
    assert_eq!(
        fixture.heap.remaining(),
        before + 2,
        "reclaimed words do not match the garbage footprint"
    );
    assert_eq!(
        fixture.heap.status(garbage),
        Status::Unreachable,
        "garbage object still classifies as live"
    );
    assert_payload(&fixture, fixture.root_at(0), 1, "survivor");
}

/// Test that an object that survived one pass dies when unrooted.
///
/// **Bug this finds:** stale liveness carried across passes
/// **Invariant verified:** reachability is decided per pass, not cached
#[test]
fn test_unrooted_survivor_dies() {
    // Arrange - survive one pass first
    let mut fixture = HeapFixture::with_defaults();
    let obj = fixture.alloc(0, 77);
    fixture.root(obj);
    fixture.minor();
    let survivor = fixture.root_at(0);
    assert_eq!(fixture.heap.status(survivor), Status::Reachable);

    // Act - drop the root and collect again
    fixture.unroot_all();
    fixture.churn();
    fixture.minor();

    // Assert
    assert_eq!(
        fixture.heap.status(survivor),
        Status::Unreachable,
        "object with no roots survived a pass"
    );
}

/// ============================================================================
/// SLOT REWRITING TESTS
/// ============================================================================

/// Test that reference slots are rewritten to copy addresses.
///
/// **Bug this finds:** stale slots after a pass, missed field walks
/// **Invariant verified:** every live slot holds a current address
#[test]
fn test_slots_rewritten_to_current_addresses() {
    // Arrange - parent -> child
    let mut fixture = HeapFixture::with_defaults();
    let child = fixture.alloc(0, 0xC0FFEE);
    let parent = fixture.alloc(1, 0xDAD);
    fixture.store(parent, 0, child);
    fixture.root(parent);

    // Act
    fixture.minor();

    // Assert
    let parent_now = fixture.root_at(0);
    let child_now = fixture.load(parent_now, 0);
    assert_ne!(child_now, child, "child slot still holds the old address");
    assert_eq!(fixture.heap.status(child_now), Status::Reachable);
    assert_payload(&fixture, child_now, 0xC0FFEE, "child through parent slot");
    assert_payload(&fixture, parent_now, 0xDAD, "parent");
}

/// Test that null slots stay null.
///
/// **Bug this finds:** the scan inventing references out of zero words
/// **Invariant verified:** zero is never treated as an address
#[test]
fn test_null_slots_preserved() {
    // Arrange
    let mut fixture = HeapFixture::with_defaults();
    let obj = fixture.alloc(3, 9);
    fixture.root(obj);

    // Act
    fixture.minor();

    // Assert
    let current = fixture.root_at(0);
    for index in 0..3 {
        assert_eq!(
            fixture.load(current, index),
            0,
            "null slot {index} changed during the pass"
        );
    }
    assert_payload(&fixture, current, 9, "object with null slots");
}

/// Test that an object referenced twice is copied once.
///
/// **Bug this finds:** duplicate copies of a shared target
/// **Invariant verified:** forwarding makes the second reach a lookup
#[test]
fn test_shared_target_copied_once() {
    // Arrange - two parents share one child
    let mut fixture = HeapFixture::with_defaults();
    let shared = fixture.alloc(0, 0x5A);
    let left = fixture.alloc(1, 1);
    let right = fixture.alloc(1, 2);
    fixture.store(left, 0, shared);
    fixture.store(right, 0, shared);
    fixture.root(left);
    fixture.root(right);

    // Act
    fixture.minor();

    // Assert - both parents see the same copy
    let left_now = fixture.root_at(0);
    let right_now = fixture.root_at(1);
    assert_eq!(
        fixture.load(left_now, 0),
        fixture.load(right_now, 0),
        "shared child was copied twice"
    );
    assert_payload(&fixture, fixture.load(left_now, 0), 0x5A, "shared child");
}

/// ============================================================================
/// GRAPH SHAPE TESTS
/// ============================================================================

/// Test that a reference cycle survives and terminates the scan.
///
/// **Bug this finds:** infinite copy loop on cycles, cycle edges broken
/// **Invariant verified:** forwarding breaks re-evacuation of a cycle
#[test]
fn test_cyclic_graph_survives() {
    // Arrange - a <-> b
    let mut fixture = HeapFixture::with_defaults();
    let a = fixture.alloc(1, 0xAA);
    let b = fixture.alloc(1, 0xBB);
    fixture.store(a, 0, b);
    fixture.store(b, 0, a);
    fixture.root(a);

    // Act
    fixture.minor();

    // Assert - the cycle is closed through the copies
    let a_now = fixture.root_at(0);
    let b_now = fixture.load(a_now, 0);
    assert_payload(&fixture, a_now, 0xAA, "cycle member a");
    assert_payload(&fixture, b_now, 0xBB, "cycle member b");
    assert_eq!(
        fixture.load(b_now, 0),
        a_now,
        "cycle edge back to a is broken"
    );
}

/// Test a self-referential object.
///
/// **Bug this finds:** self-edge rewritten to the stale address
/// **Invariant verified:** an object can point at itself across a copy
#[test]
fn test_self_referential_object() {
    // Arrange
    let mut fixture = HeapFixture::with_defaults();
    let obj = fixture.alloc(1, 0x5E1F);
    fixture.store(obj, 0, obj);
    fixture.root(obj);

    // Act
    fixture.minor();

    // Assert
    let current = fixture.root_at(0);
    assert_eq!(
        fixture.load(current, 0),
        current,
        "self reference does not point at the copy"
    );
    assert_payload(&fixture, current, 0x5E1F, "self-referential object");
}

/// Test a deep chain survives intact.
///
/// **Bug this finds:** scan front falling behind the copy front
/// **Invariant verified:** breadth-first scan reaches the whole graph
#[test]
fn test_deep_chain_intact() {
    // Arrange - head -> n1 -> n2 -> ... -> n49, payloads 0..50
    let mut fixture = HeapFixture::with_defaults();
    let payloads: Vec<usize> = (0..50).collect();
    let mut next = 0;
    for payload in payloads.iter().rev() {
        let node = fixture.alloc(1, *payload);
        if next != 0 {
            fixture.store(node, 0, next);
        }
        next = node;
    }
    fixture.root(next);

    // Act
    fixture.minor();

    // Assert
    assert_chain_intact(&fixture, fixture.root_at(0), &payloads, "deep chain");
}

/// Test that copies land at distinct, aligned addresses.
///
/// **Bug this finds:** overlapping destinations, bump cursor regression
/// **Invariant verified:** one destination per object
#[test]
fn test_copies_distinct_and_aligned() {
    // Arrange
    let mut fixture = HeapFixture::with_defaults();
    for i in 0..20 {
        let obj = fixture.alloc(0, 1000 + i);
        fixture.root(obj);
    }

    // Act
    fixture.minor();

    // Assert
    let copies: Vec<usize> = (0..20).map(|i| fixture.root_at(i)).collect();
    assert_all_addresses_unique(&copies, "copy destinations");
    for (i, copy) in copies.iter().enumerate() {
        assert_address_aligned(*copy, "copy destination");
        assert_payload(&fixture, *copy, 1000 + i, "copied object");
    }
}

/// ============================================================================
/// FORWARDING RESOLUTION TESTS
/// ============================================================================

/// Test that a stale address resolves until the next pass begins.
///
/// **Bug this finds:** forwarding records dropped too early
/// **Invariant verified:** follow and status work on pass-stale addresses
#[test]
fn test_stale_address_resolves_after_pass() {
    // Arrange
    let mut fixture = HeapFixture::with_defaults();
    let obj = fixture.alloc(0, 0xF0);
    fixture.root(obj);

    // Act
    fixture.minor();

    // Assert - the pre-pass address still answers
    let current = fixture.root_at(0);
    assert_eq!(
        fixture.heap.follow(obj),
        current,
        "stale address does not follow to the copy"
    );
    assert_eq!(
        fixture.heap.status(obj),
        Status::Reachable,
        "stale address does not classify through forwarding"
    );
}

/// Test that each pass refreshes the forwarding for the previous one.
///
/// **Bug this finds:** follow chains breaking one pass back
/// **Invariant verified:** the address from pass N resolves during pass N+1
#[test]
fn test_forwarding_chain_across_two_passes() {
    // Arrange
    let mut fixture = HeapFixture::with_defaults();
    let obj = fixture.alloc(0, 0xF1);
    fixture.root(obj);
    fixture.minor();
    let first_copy = fixture.root_at(0);

    // Act - second pass moves it again
    fixture.churn();
    fixture.minor();

    // Assert
    let second_copy = fixture.root_at(0);
    assert_ne!(second_copy, first_copy, "second pass did not move the object");
    assert_eq!(
        fixture.heap.follow(first_copy),
        second_copy,
        "address from the previous pass does not resolve"
    );
    assert_payload(&fixture, second_copy, 0xF1, "twice-moved object");
}

/// Test follow is the identity for null and unmoved addresses.
///
/// **Bug this finds:** follow inventing targets
/// **Invariant verified:** follow only chases real forwarding records
#[test]
fn test_follow_identity() {
    let mut fixture = HeapFixture::with_defaults();
    assert_eq!(fixture.heap.follow(0), 0, "follow(null) must be null");

    let obj = fixture.alloc(0, 3);
    assert_eq!(
        fixture.heap.follow(obj),
        obj,
        "follow moved an object that was never collected"
    );
}

/// ============================================================================
/// STATUS CLASSIFICATION TESTS
/// ============================================================================

/// Test the basic status answers.
///
/// **Bug this finds:** misclassification of null, foreign, young addresses
/// **Invariant verified:** status is total over arbitrary words
#[test]
fn test_status_classifications() {
    let mut fixture = HeapFixture::with_defaults();

    assert_eq!(fixture.heap.status(0), Status::Null, "null address");
    let obj = fixture.alloc(0, 4);
    assert_eq!(
        fixture.heap.status(obj),
        Status::Reachable,
        "fresh allocation"
    );
    assert_eq!(
        fixture.heap.status(obj + 1),
        Status::Null,
        "unaligned address"
    );
    let stack_local = 0usize;
    let foreign = &stack_local as *const usize as usize;
    assert_eq!(
        fixture.heap.status(foreign),
        Status::Null,
        "address outside managed memory"
    );
}

/// ============================================================================
/// PASS ACCOUNTING TESTS
/// ============================================================================

/// Test that pass statistics reflect what actually ran.
///
/// **Bug this finds:** counters not incremented, kinds conflated
/// **Invariant verified:** stats mirror the pass history
#[test]
fn test_stats_track_passes() {
    // Arrange
    let mut fixture = HeapFixture::with_defaults();
    let live = fixture.alloc(0, 8);
    fixture.alloc(0, 9); // garbage
    fixture.root(live);

    // Act
    fixture.minor();
    fixture.churn();
    fixture.major();

    // Assert
    let stats = fixture.heap.stats();
    assert_eq!(stats.total_passes, 2, "two passes ran");
    assert_eq!(stats.minor_passes, 1, "one was minor");
    assert_eq!(stats.major_passes, 1, "one was major");
    assert!(
        stats.reclaimed_words >= 2,
        "garbage words were never booked as reclaimed"
    );
    assert_eq!(fixture.heap.pass_count(), 2);
}
