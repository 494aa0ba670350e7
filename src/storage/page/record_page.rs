use crate::common::{PageNo, SlotId, INVALID_PAGE_NO, PAGE_SIZE};

use super::bitmap;

/// Record page layout:
///
/// +---------------------+
/// | num_records   (u32) |  offset 0
/// | next_free     (u32) |  offset 4, u32::MAX = none
/// +---------------------+
/// | occupancy bitmap    |  bitmap_size bytes, one bit per slot
/// +---------------------+
/// | slot 0              |  record_size bytes each
/// | slot 1              |
/// | ...                 |
/// +---------------------+
pub const RECORD_PAGE_HEADER_SIZE: usize = 8;

const NUM_RECORDS_OFFSET: usize = 0;
const NEXT_FREE_OFFSET: usize = 4;
const BITMAP_OFFSET: usize = RECORD_PAGE_HEADER_SIZE;

/// Geometry shared by every data page of one record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub record_size: usize,
    pub num_records_per_page: usize,
    pub bitmap_size: usize,
}

impl RecordLayout {
    /// Layout holding `num_records_per_page` records of `record_size` bytes.
    /// Returns None if that does not fit in a page.
    pub fn new(record_size: usize, num_records_per_page: usize) -> Option<Self> {
        if record_size == 0
            || num_records_per_page == 0
            || num_records_per_page > u16::MAX as usize
            || !Self::fits(record_size, num_records_per_page)
        {
            return None;
        }

        Some(Self {
            record_size,
            num_records_per_page,
            bitmap_size: bitmap::bytes_for(num_records_per_page),
        })
    }

    /// Layout packing as many `record_size` records per page as possible.
    pub fn with_max_capacity(record_size: usize) -> Option<Self> {
        Self::new(record_size, Self::max_records_per_page(record_size))
    }

    /// Largest `n` with `header + ceil(n / 8) + n * record_size <= PAGE_SIZE`.
    pub fn max_records_per_page(record_size: usize) -> usize {
        if record_size == 0 || record_size > PAGE_SIZE - RECORD_PAGE_HEADER_SIZE - 1 {
            return 0;
        }

        let avail = PAGE_SIZE - RECORD_PAGE_HEADER_SIZE;
        let mut n = (8 * avail) / (8 * record_size + 1);
        while n > 0 && !Self::fits(record_size, n) {
            n -= 1;
        }
        n.min(u16::MAX as usize)
    }

    fn fits(record_size: usize, n: usize) -> bool {
        RECORD_PAGE_HEADER_SIZE + bitmap::bytes_for(n) + n * record_size <= PAGE_SIZE
    }

    fn slots_offset(&self) -> usize {
        BITMAP_OFFSET + self.bitmap_size
    }

    fn slot_range(&self, slot_id: SlotId) -> std::ops::Range<usize> {
        let start = self.slots_offset() + slot_id.as_usize() * self.record_size;
        start..start + self.record_size
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn read_next_free(data: &[u8]) -> Option<PageNo> {
    let page_no = PageNo::new(read_u32(data, NEXT_FREE_OFFSET));
    page_no.is_valid().then_some(page_no)
}

/// RecordPage interprets a page buffer as a slotted page of fixed-width
/// records.
pub struct RecordPage<'a> {
    data: &'a mut [u8],
    layout: RecordLayout,
}

impl<'a> RecordPage<'a> {
    /// Creates a new RecordPage view over the given data buffer.
    /// The buffer must be exactly PAGE_SIZE bytes.
    pub fn new(data: &'a mut [u8], layout: RecordLayout) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data, layout }
    }

    /// Initializes an empty page: no records, cleared bitmap, no successor.
    pub fn init(&mut self) {
        self.data.fill(0);
        self.set_num_records(0);
        self.set_next_free_page(None);
    }

    /// Returns a read-only view of the same page.
    pub fn view(&self) -> RecordPageRef<'_> {
        RecordPageRef::new(&*self.data, self.layout)
    }

    pub fn num_records(&self) -> usize {
        read_u32(self.data, NUM_RECORDS_OFFSET) as usize
    }

    fn set_num_records(&mut self, num_records: usize) {
        write_u32(self.data, NUM_RECORDS_OFFSET, num_records as u32);
    }

    /// Returns the next page in the free-page chain.
    pub fn next_free_page(&self) -> Option<PageNo> {
        read_next_free(self.data)
    }

    /// Sets the next page in the free-page chain.
    pub fn set_next_free_page(&mut self, page_no: Option<PageNo>) {
        let value = page_no.unwrap_or(INVALID_PAGE_NO);
        write_u32(self.data, NEXT_FREE_OFFSET, value.as_u32());
    }

    pub fn is_occupied(&self, slot_id: SlotId) -> bool {
        self.view().is_occupied(slot_id)
    }

    pub fn is_full(&self) -> bool {
        self.num_records() >= self.layout.num_records_per_page
    }

    /// Returns the lowest-numbered free slot.
    pub fn first_free_slot(&self) -> Option<SlotId> {
        bitmap::first_bit(self.bitmap(), false, self.layout.num_records_per_page)
            .map(|pos| SlotId::new(pos as u16))
    }

    /// Returns the record stored in `slot_id`, if the slot is occupied.
    pub fn record(&self, slot_id: SlotId) -> Option<&[u8]> {
        if !self.is_occupied(slot_id) {
            return None;
        }
        Some(&self.data[self.layout.slot_range(slot_id)])
    }

    /// Stores `record` in the lowest free slot and returns it.
    pub fn insert(&mut self, record: &[u8]) -> Option<SlotId> {
        let slot_id = self.first_free_slot()?;
        self.insert_at(slot_id, record).then_some(slot_id)
    }

    /// Stores `record` in `slot_id`. Returns false if the slot is out of
    /// range or already occupied.
    pub fn insert_at(&mut self, slot_id: SlotId, record: &[u8]) -> bool {
        assert_eq!(record.len(), self.layout.record_size);
        if slot_id.as_usize() >= self.layout.num_records_per_page || self.is_occupied(slot_id) {
            return false;
        }

        bitmap::set(self.bitmap_mut(), slot_id.as_usize());
        let range = self.layout.slot_range(slot_id);
        self.data[range].copy_from_slice(record);
        self.set_num_records(self.num_records() + 1);
        true
    }

    /// Overwrites an occupied slot in place. Returns false if it is empty.
    pub fn update(&mut self, slot_id: SlotId, record: &[u8]) -> bool {
        assert_eq!(record.len(), self.layout.record_size);
        if !self.is_occupied(slot_id) {
            return false;
        }

        let range = self.layout.slot_range(slot_id);
        self.data[range].copy_from_slice(record);
        true
    }

    /// Frees an occupied slot. The record bytes stay behind until reused.
    pub fn remove(&mut self, slot_id: SlotId) -> bool {
        if !self.is_occupied(slot_id) {
            return false;
        }

        bitmap::reset(self.bitmap_mut(), slot_id.as_usize());
        self.set_num_records(self.num_records() - 1);
        true
    }

    fn bitmap(&self) -> &[u8] {
        &self.data[BITMAP_OFFSET..BITMAP_OFFSET + self.layout.bitmap_size]
    }

    fn bitmap_mut(&mut self) -> &mut [u8] {
        &mut self.data[BITMAP_OFFSET..BITMAP_OFFSET + self.layout.bitmap_size]
    }
}

/// Read-only view of a record page.
pub struct RecordPageRef<'a> {
    data: &'a [u8],
    layout: RecordLayout,
}

impl<'a> RecordPageRef<'a> {
    /// Creates a new read-only RecordPage view.
    pub fn new(data: &'a [u8], layout: RecordLayout) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data, layout }
    }

    pub fn num_records(&self) -> usize {
        read_u32(self.data, NUM_RECORDS_OFFSET) as usize
    }

    pub fn next_free_page(&self) -> Option<PageNo> {
        read_next_free(self.data)
    }

    pub fn is_occupied(&self, slot_id: SlotId) -> bool {
        slot_id.as_usize() < self.layout.num_records_per_page
            && bitmap::is_set(self.bitmap(), slot_id.as_usize())
    }

    pub fn is_full(&self) -> bool {
        self.num_records() >= self.layout.num_records_per_page
    }

    /// Returns the record stored in `slot_id`, if the slot is occupied.
    pub fn record(&self, slot_id: SlotId) -> Option<&'a [u8]> {
        if !self.is_occupied(slot_id) {
            return None;
        }
        Some(&self.data[self.layout.slot_range(slot_id)])
    }

    /// Returns the first occupied slot at or after `from`.
    pub fn next_occupied(&self, from: usize) -> Option<SlotId> {
        bitmap::next_bit(self.bitmap(), true, from, self.layout.num_records_per_page)
            .map(|pos| SlotId::new(pos as u16))
    }

    fn bitmap(&self) -> &'a [u8] {
        &self.data[BITMAP_OFFSET..BITMAP_OFFSET + self.layout.bitmap_size]
    }
}
