use bytes::{Buf, BufMut};

use crate::common::{
    PageNo, Result, StrataError, INVALID_PAGE_NO, PAGE_SIZE, RECORD_FILE_MAGIC,
    RECORD_FILE_VERSION,
};

use super::RecordLayout;

/// Record file header, stored at the start of page 0:
///
/// | Field                | Offset | Size |
/// |----------------------|--------|------|
/// | magic                | 0      | 4    |
/// | version              | 4      | 4    |
/// | record_size          | 8      | 4    |
/// | num_records_per_page | 12     | 4    |
/// | bitmap_size          | 16     | 4    |
/// | num_pages            | 20     | 4    |
/// | first_free_page_no   | 24     | 4    |
///
/// All fields are little endian. `first_free_page_no == u32::MAX` means the
/// free-page list is empty. `num_pages` counts the header page itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFileHeader {
    pub record_size: usize,
    pub num_records_per_page: usize,
    pub bitmap_size: usize,
    pub num_pages: u32,
    pub first_free_page_no: Option<PageNo>,
}

impl RecordFileHeader {
    /// Encoded size in bytes
    pub const ENCODED_SIZE: usize = 28;

    /// Header for a freshly created file: just the header page, no free pages.
    pub fn new(layout: RecordLayout) -> Self {
        Self {
            record_size: layout.record_size,
            num_records_per_page: layout.num_records_per_page,
            bitmap_size: layout.bitmap_size,
            num_pages: 1,
            first_free_page_no: None,
        }
    }

    /// Returns the data page geometry described by this header.
    pub fn layout(&self) -> RecordLayout {
        RecordLayout {
            record_size: self.record_size,
            num_records_per_page: self.num_records_per_page,
            bitmap_size: self.bitmap_size,
        }
    }

    /// Writes the header into the first `ENCODED_SIZE` bytes of `buf`.
    pub fn encode(&self, buf: &mut [u8]) {
        let mut out = &mut buf[..Self::ENCODED_SIZE];
        out.put_u32_le(RECORD_FILE_MAGIC);
        out.put_u32_le(RECORD_FILE_VERSION);
        out.put_u32_le(self.record_size as u32);
        out.put_u32_le(self.num_records_per_page as u32);
        out.put_u32_le(self.bitmap_size as u32);
        out.put_u32_le(self.num_pages);
        out.put_u32_le(self.first_free_page_no.unwrap_or(INVALID_PAGE_NO).as_u32());
    }

    /// Parses and validates a header.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::ENCODED_SIZE {
            return Err(invalid("header page is truncated"));
        }

        let mut src = &buf[..Self::ENCODED_SIZE];
        let magic = src.get_u32_le();
        if magic != RECORD_FILE_MAGIC {
            return Err(invalid(format!("bad magic {:#010x}", magic)));
        }

        let version = src.get_u32_le();
        if version != RECORD_FILE_VERSION {
            return Err(invalid(format!("unsupported version {}", version)));
        }

        let record_size = src.get_u32_le() as usize;
        let num_records_per_page = src.get_u32_le() as usize;
        let bitmap_size = src.get_u32_le() as usize;
        let num_pages = src.get_u32_le();
        let first_free = PageNo::new(src.get_u32_le());

        let layout = RecordLayout::new(record_size, num_records_per_page)
            .ok_or_else(|| invalid("record layout does not fit in a page"))?;
        if layout.bitmap_size != bitmap_size {
            return Err(invalid(format!(
                "bitmap size {} does not match {} slots",
                bitmap_size, num_records_per_page
            )));
        }

        if num_pages == 0 {
            return Err(invalid("page count excludes the header page"));
        }

        let first_free_page_no = first_free.is_valid().then_some(first_free);
        if let Some(page_no) = first_free_page_no {
            if page_no.as_u32() == 0 || page_no.as_u32() >= num_pages {
                return Err(invalid(format!("free list head {} out of range", page_no)));
            }
        }

        Ok(Self {
            record_size,
            num_records_per_page,
            bitmap_size,
            num_pages,
            first_free_page_no,
        })
    }

    /// Returns an all-zero page holding just this header.
    pub fn to_page(&self) -> Box<[u8; PAGE_SIZE]> {
        let mut page = Box::new([0u8; PAGE_SIZE]);
        self.encode(&mut page[..]);
        page
    }
}

fn invalid(reason: impl Into<String>) -> StrataError {
    StrataError::InvalidFileHeader(reason.into())
}
