//! Recent-packet memory for repeat suppression.
//!
//! A fixed ring of slots keyed by the FNV-1a hash of the frame. Lookups scan
//! every slot; inserts always displace the slot with the oldest timestamp, so
//! the least recently seen hash goes first. Timestamps are compared with
//! wrapping subtraction and stay correct across counter wraparound.

/// Slots in the reference configuration.
pub const DEFAULT_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupEntry {
    pub hash: u32,
    pub captured_at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RecentPacketCache {
    slots: Vec<Option<DedupEntry>>,
}

impl Default for RecentPacketCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl RecentPacketCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True iff `hash` was remembered no more than `window_ms` before `now_ms`.
    ///
    /// Stale entries are left in place.
    pub fn seen(&self, hash: u32, now_ms: u64, window_ms: u64) -> bool {
        self.slots.iter().flatten().any(|entry| {
            entry.hash == hash && now_ms.wrapping_sub(entry.captured_at_ms) <= window_ms
        })
    }

    /// Store `hash`, overwriting the oldest slot.
    ///
    /// Empty slots count as oldest. Ties go to the lowest index.
    pub fn remember(&mut self, hash: u32, now_ms: u64) {
        let mut target = 0;
        let mut oldest_age = None;
        for (i, slot) in self.slots.iter().enumerate() {
            let age = match slot {
                None => u64::MAX,
                Some(entry) => now_ms.wrapping_sub(entry.captured_at_ms),
            };
            if oldest_age.map_or(true, |oldest| age > oldest) {
                target = i;
                oldest_age = Some(age);
            }
        }
        self.slots[target] = Some(DedupEntry {
            hash,
            captured_at_ms: now_ms,
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &DedupEntry> {
        self.slots.iter().flatten()
    }
}
