use super::*;

// ============================================================================
// Basic interning
// ============================================================================

#[test]
fn test_same_key_same_slot() {
    let mut table = SlotTable::new(8);
    let a = table.acquire(42);
    let b = table.acquire(42);
    assert_eq!(a, b);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_distinct_keys_distinct_slots() {
    let mut table = SlotTable::new(8);
    let a = table.acquire(1);
    let b = table.acquire(2);
    assert_ne!(a, b);
    assert_ne!(a, 0);
    assert_ne!(b, 0);
}

#[test]
fn test_slot_zero_is_reserved() {
    let mut table = SlotTable::new(8);
    for key in 0..7 {
        assert_ne!(table.acquire(key), 0);
    }
}

#[test]
fn test_get_does_not_allocate() {
    let mut table = SlotTable::new(8);
    assert!(table.get(5).is_none());
    let slot = table.acquire(5);
    assert_eq!(table.get(5), Some(slot));
    assert_eq!(table.len(), 1);
}

// ============================================================================
// Overflow behavior
// ============================================================================

#[test]
fn test_overflow_returns_reserved_slot() {
    // Capacity 4: slots 1..=3 usable
    let mut table = SlotTable::new(4);
    assert_eq!(table.acquire(10), 1);
    assert_eq!(table.acquire(11), 2);
    assert_eq!(table.acquire(12), 3);
    assert!(!table.needs_rebuild());

    // Full: new keys degrade to slot 0 and flag the rebuild
    assert_eq!(table.acquire(13), 0);
    assert!(table.needs_rebuild());

    // Existing keys still resolve to their own slots
    assert_eq!(table.acquire(11), 2);
}

#[test]
fn test_reset_clears_overflow() {
    let mut table = SlotTable::new(2);
    table.acquire(1);
    table.acquire(2); // overflow
    assert!(table.needs_rebuild());

    table.reset();
    assert!(!table.needs_rebuild());
    assert!(table.is_empty());
    assert_eq!(table.acquire(2), 1);
}
