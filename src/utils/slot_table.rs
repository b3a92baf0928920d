/// Bounded interner mapping arbitrary `u32` keys to stable slot
/// indices.
///
/// Backs fixed-capacity GPU tables (material SSBO slots): the table
/// hands out the same slot for the same key across frames. Slot 0 is
/// reserved as the overflow fallback — when the table is full, new
/// keys map to slot 0 and the `needs_rebuild` flag is raised so the
/// caller can rebuild the table before the next frame instead of
/// failing this one.

use rustc_hash::FxHashMap;

/// Fixed-capacity key → slot interner with an overflow slot.
pub struct SlotTable {
    slots: FxHashMap<u32, u32>,
    capacity: u32,
    next_slot: u32,
    needs_rebuild: bool,
}

impl SlotTable {
    /// Create a table with `capacity` slots; slot 0 is reserved.
    pub fn new(capacity: u32) -> Self {
        Self {
            slots: FxHashMap::default(),
            capacity: capacity.max(1),
            next_slot: 1,
            needs_rebuild: false,
        }
    }

    /// Resolve a key to its slot, allocating one if needed.
    ///
    /// Returns the reserved overflow slot 0 (and raises the rebuild
    /// flag) once the table is full.
    pub fn acquire(&mut self, key: u32) -> u32 {
        if let Some(&slot) = self.slots.get(&key) {
            return slot;
        }
        if self.next_slot >= self.capacity {
            self.needs_rebuild = true;
            return 0;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(key, slot);
        slot
    }

    /// Slot for a key, without allocating.
    pub fn get(&self, key: u32) -> Option<u32> {
        self.slots.get(&key).copied()
    }

    /// Whether an overflow occurred since the last `reset`.
    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// Number of allocated slots (excluding the reserved slot 0).
    pub fn len(&self) -> u32 {
        self.next_slot - 1
    }

    /// Whether no slots are allocated.
    pub fn is_empty(&self) -> bool {
        self.next_slot == 1
    }

    /// Drop all assignments and clear the rebuild flag.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.next_slot = 1;
        self.needs_rebuild = false;
    }
}

#[cfg(test)]
#[path = "slot_table_tests.rs"]
mod tests;
