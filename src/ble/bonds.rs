//! Bond records and the bounded in-memory bond table.
//!
//! The SoftDevice security handler keeps the keys of every bonded central
//! here; the firmware mirrors the table to internal flash as one blob
//! (see `crate::nrf::bonds`, embedded builds only).
//!
//! Blob layout:
//!   - `[count]` followed by `count` records of [`RECORD_SIZE`] bytes.
//!   - Record: `[6 addr][1 addr kind][2 ediv LE][8 rand][16 ltk][1 ltk flags][16 irk]`.

use heapless::Vec;

use super::{BdAddr, BondList};
use crate::config::MAX_BONDED_DEVICES;

/// Serialized size of one [`BondRecord`].
pub const RECORD_SIZE: usize = 6 + 1 + 2 + 8 + 16 + 1 + 16;

/// Serialized size of a full table.
pub const TABLE_BLOB_SIZE: usize = 1 + RECORD_SIZE * MAX_BONDED_DEVICES;

/// Everything needed to re-encrypt a link with a bonded central.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BondRecord {
    /// Identity address of the central.
    pub addr: BdAddr,
    /// Address type as the stack encodes it.
    pub addr_kind: u8,
    pub ediv: u16,
    pub rand: [u8; 8],
    pub ltk: [u8; 16],
    /// LTK flags (LESC / authenticated / key length), stack encoding.
    pub ltk_flags: u8,
    pub irk: [u8; 16],
}

impl BondRecord {
    fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < RECORD_SIZE {
            return 0;
        }

        buf[0..6].copy_from_slice(&self.addr.0);
        buf[6] = self.addr_kind;
        buf[7..9].copy_from_slice(&self.ediv.to_le_bytes());
        buf[9..17].copy_from_slice(&self.rand);
        buf[17..33].copy_from_slice(&self.ltk);
        buf[33] = self.ltk_flags;
        buf[34..50].copy_from_slice(&self.irk);
        RECORD_SIZE
    }

    fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < RECORD_SIZE {
            return None;
        }

        let mut record = Self {
            addr_kind: data[6],
            ediv: u16::from_le_bytes([data[7], data[8]]),
            ltk_flags: data[33],
            ..Self::default()
        };
        record.addr.0.copy_from_slice(&data[0..6]);
        record.rand.copy_from_slice(&data[9..17]);
        record.ltk.copy_from_slice(&data[17..33]);
        record.irk.copy_from_slice(&data[34..50]);
        Some(record)
    }

    fn same_master(&self, ediv: u16, rand: &[u8; 8]) -> bool {
        self.ediv == ediv && &self.rand == rand
    }
}

/// Bonded centrals, oldest first.
#[derive(Debug, Default)]
pub struct BondTable {
    records: Vec<BondRecord, MAX_BONDED_DEVICES>,
    /// True if the table differs from what was last persisted.
    dirty: bool,
}

impl BondTable {
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Add a bond, replacing an existing one for the same central. When
    /// the table is full the oldest bond is evicted.
    pub fn add(&mut self, record: BondRecord) {
        self.dirty = true;

        if let Some(existing) = self.records.iter_mut().find(|r| r.addr == record.addr) {
            *existing = record;
            debug!("updated bond");
            return;
        }

        if self.records.is_full() {
            warn!("bond table full, evicting oldest bond");
            self.records.remove(0);
        }

        // Cannot fail: a slot was freed above if needed.
        let _ = self.records.push(record);
        info!("bond added, now storing {}", self.records.len());
    }

    /// Remove the bond for `addr`. Returns false if there was none.
    pub fn remove(&mut self, addr: &BdAddr) -> bool {
        let before = self.records.len();
        self.records.retain(|r| &r.addr != addr);
        let removed = self.records.len() != before;
        self.dirty |= removed;
        removed
    }

    pub fn find_by_addr(&self, addr: &BdAddr) -> Option<&BondRecord> {
        self.records.iter().find(|r| &r.addr == addr)
    }

    pub fn find_by_master(&self, ediv: u16, rand: &[u8; 8]) -> Option<&BondRecord> {
        self.records.iter().find(|r| r.same_master(ediv, rand))
    }

    pub fn addresses(&self) -> BondList {
        self.records.iter().map(|r| r.addr).collect()
    }

    /// Serialize the whole table. Returns the number of bytes written, or
    /// 0 if `buf` is smaller than [`TABLE_BLOB_SIZE`] for this table.
    pub fn serialize_all(&self, buf: &mut [u8]) -> usize {
        let total = 1 + self.records.len() * RECORD_SIZE;
        if buf.len() < total {
            return 0;
        }

        buf[0] = self.records.len() as u8;
        let mut offset = 1;
        for record in &self.records {
            offset += record.serialize(&mut buf[offset..]);
        }
        offset
    }

    /// Replace the table with the records in `data`. Truncated trailing
    /// records and records beyond capacity are dropped.
    pub fn deserialize_all(&mut self, data: &[u8]) {
        self.records.clear();
        self.dirty = false;

        let Some((&count, mut rest)) = data.split_first() else {
            return;
        };

        for _ in 0..count {
            let Some(record) = BondRecord::deserialize(rest) else {
                warn!("truncated bond record");
                break;
            };
            if self.records.push(record).is_err() {
                break;
            }
            rest = &rest[RECORD_SIZE..];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tag: u8) -> BondRecord {
        BondRecord {
            addr: BdAddr([tag; 6]),
            addr_kind: 1,
            ediv: 0x1234 + tag as u16,
            rand: [tag; 8],
            ltk: [0xA0 | tag; 16],
            ltk_flags: 0x21,
            irk: [0x50 | tag; 16],
        }
    }

    #[test]
    fn add_replaces_same_central() {
        let mut t = BondTable::new();
        t.add(record(1));
        let mut newer = record(1);
        newer.ltk = [0xEE; 16];
        t.add(newer);

        assert_eq!(t.len(), 1);
        assert_eq!(t.find_by_addr(&BdAddr([1; 6])).map(|r| r.ltk), Some([0xEE; 16]));
    }

    #[test]
    fn full_table_evicts_oldest() {
        let mut t = BondTable::new();
        for tag in 0..=MAX_BONDED_DEVICES as u8 {
            t.add(record(tag));
        }
        assert_eq!(t.len(), MAX_BONDED_DEVICES);
        assert!(t.find_by_addr(&BdAddr([0; 6])).is_none());
        assert_eq!(t.addresses()[0], BdAddr([1; 6]));
    }

    #[test]
    fn remove_marks_dirty_only_when_found() {
        let mut t = BondTable::new();
        t.add(record(1));
        t.mark_clean();

        assert!(!t.remove(&BdAddr([9; 6])));
        assert!(!t.is_dirty());
        assert!(t.remove(&BdAddr([1; 6])));
        assert!(t.is_dirty());
        assert!(t.is_empty());
    }

    #[test]
    fn lookup_by_master_id() {
        let mut t = BondTable::new();
        t.add(record(2));
        t.add(record(3));
        let found = t.find_by_master(0x1234 + 3, &[3; 8]).map(|r| r.addr);
        assert_eq!(found, Some(BdAddr([3; 6])));
        assert!(t.find_by_master(0x1234 + 3, &[2; 8]).is_none());
    }

    #[test]
    fn blob_restores_table() {
        let mut t = BondTable::new();
        t.add(record(4));
        t.add(record(5));

        let mut buf = [0u8; TABLE_BLOB_SIZE];
        let len = t.serialize_all(&mut buf);
        assert_eq!(len, 1 + 2 * RECORD_SIZE);
        assert_eq!(buf[0], 2);

        let mut restored = BondTable::new();
        restored.deserialize_all(&buf[..len]);
        assert_eq!(restored.addresses()[..], [BdAddr([4; 6]), BdAddr([5; 6])]);
        assert_eq!(restored.find_by_addr(&BdAddr([5; 6])), Some(&record(5)));
        assert!(!restored.is_dirty());
    }

    #[test]
    fn truncated_blob_keeps_complete_records() {
        let mut t = BondTable::new();
        t.add(record(6));
        t.add(record(7));
        let mut buf = [0u8; TABLE_BLOB_SIZE];
        let len = t.serialize_all(&mut buf);

        let mut restored = BondTable::new();
        restored.deserialize_all(&buf[..len - 1]);
        assert_eq!(restored.len(), 1);

        restored.deserialize_all(&[]);
        assert!(restored.is_empty());
    }

    #[test]
    fn serialize_into_short_buffer_writes_nothing() {
        let mut t = BondTable::new();
        t.add(record(1));
        let mut buf = [0u8; RECORD_SIZE];
        assert_eq!(t.serialize_all(&mut buf), 0);
    }
}
