//! Neighbour table of mesh nodes heard directly via ADVERT.
//!
//! Bounded, insertion ordered, never expired. Age is reported through
//! `last_seen_ms`; callers decide what counts as stale.

use meshgate_core::message::NeighborReport;
use meshgate_core::wire::truncate_name;

/// Records held in the reference configuration.
pub const DEFAULT_CAPACITY: usize = 16;

/// Last known state of a neighbour.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborRecord {
    pub node_id: u32,
    pub display_name: String,
    pub last_rssi: i32,
    pub last_snr: f32,
    pub latitude: f64,
    pub longitude: f64,
    pub last_seen_ms: u64,
}

impl NeighborRecord {
    pub fn report(&self) -> NeighborReport {
        NeighborReport {
            node_id: self.node_id,
            name: self.display_name.clone(),
            rssi: self.last_rssi,
            snr: self.last_snr,
            latitude: self.latitude,
            longitude: self.longitude,
            last_seen: self.last_seen_ms,
        }
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
    /// Unknown node and no room; the table is unchanged.
    Full,
    /// Node id 0 is never a neighbour.
    Rejected,
}

impl Upsert {
    pub fn accepted(self) -> bool {
        matches!(self, Upsert::Inserted | Upsert::Updated)
    }
}

#[derive(Debug, Clone)]
pub struct NeighborTable {
    records: Vec<NeighborRecord>,
    capacity: usize,
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl NeighborTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn upsert(
        &mut self,
        node_id: u32,
        name: &str,
        rssi: i32,
        snr: f32,
        latitude: f64,
        longitude: f64,
        now_ms: u64,
    ) -> Upsert {
        if node_id == 0 {
            return Upsert::Rejected;
        }

        let display_name = truncate_name(name);
        if let Some(record) = self.records.iter_mut().find(|r| r.node_id == node_id) {
            record.display_name = display_name;
            record.last_rssi = rssi;
            record.last_snr = snr;
            record.latitude = latitude;
            record.longitude = longitude;
            record.last_seen_ms = now_ms;
            return Upsert::Updated;
        }

        if self.records.len() >= self.capacity {
            return Upsert::Full;
        }

        self.records.push(NeighborRecord {
            node_id,
            display_name,
            last_rssi: rssi,
            last_snr: snr,
            latitude,
            longitude,
            last_seen_ms: now_ms,
        });
        Upsert::Inserted
    }

    /// Records in insertion order.
    pub fn all(&self) -> &[NeighborRecord] {
        &self.records
    }

    pub fn get(&self, node_id: u32) -> Option<&NeighborRecord> {
        self.records.iter().find(|r| r.node_id == node_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_update_in_place() {
        let mut table = NeighborTable::default();
        assert_eq!(table.upsert(1, "a", -90, 1.0, 1.0, 2.0, 10), Upsert::Inserted);
        assert_eq!(table.upsert(2, "b", -80, 2.0, 0.0, 0.0, 20), Upsert::Inserted);
        assert_eq!(table.upsert(1, "a2", -70, 3.0, 5.0, 6.0, 30), Upsert::Updated);

        assert_eq!(table.len(), 2);
        let first = &table.all()[0];
        assert_eq!(first.node_id, 1);
        assert_eq!(first.display_name, "a2");
        assert_eq!(first.last_rssi, -70);
        assert_eq!(first.latitude, 5.0);
        assert_eq!(first.last_seen_ms, 30);
    }

    #[test]
    fn zero_id_is_rejected() {
        let mut table = NeighborTable::default();
        assert_eq!(table.upsert(0, "ghost", 0, 0.0, 0.0, 0.0, 0), Upsert::Rejected);
        assert!(table.is_empty());
    }

    #[test]
    fn full_table_drops_unknown_nodes() {
        let mut table = NeighborTable::default();
        for id in 1..=DEFAULT_CAPACITY as u32 {
            assert!(table.upsert(id, "n", 0, 0.0, 0.0, 0.0, 0).accepted());
        }
        let before: Vec<_> = table.all().to_vec();

        assert_eq!(table.upsert(999, "late", 0, 0.0, 0.0, 0.0, 5), Upsert::Full);
        assert_eq!(table.all(), before.as_slice());

        assert_eq!(table.upsert(3, "known", -1, 0.0, 0.0, 0.0, 5), Upsert::Updated);
        assert_eq!(table.len(), DEFAULT_CAPACITY);
    }

    #[test]
    fn long_names_are_truncated() {
        let mut table = NeighborTable::default();
        table.upsert(5, &"x".repeat(50), 0, 0.0, 0.0, 0.0, 0);
        assert_eq!(table.get(5).map(|r| r.display_name.len()), Some(31));
    }
}
