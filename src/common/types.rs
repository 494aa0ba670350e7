use std::fmt;

/// Descriptor of an open file, handed out by the disk manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd {}", self.0)
    }
}

/// Page number within a single file. `INVALID_PAGE_NO` means "no page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageNo(pub u32);

impl PageNo {
    pub fn new(no: u32) -> Self {
        Self(no)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        *self != INVALID_PAGE_NO
    }

    /// Byte offset of this page in its file.
    pub fn offset(&self, page_size: usize) -> u64 {
        self.0 as u64 * page_size as u64
    }
}

impl fmt::Display for PageNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "<none>")
        }
    }
}

/// Invalid page number constant
pub const INVALID_PAGE_NO: PageNo = PageNo(u32::MAX);

/// Page identifier - unique while the owning file stays open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub fd: FileId,
    pub page_no: PageNo,
}

impl PageId {
    pub fn new(fd: FileId, page_no: PageNo) -> Self {
        Self { fd, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageId({}, page {})", self.fd, self.page_no)
    }
}

/// Frame identifier - index of a buffer frame inside the buffer pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u32);

impl FrameId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameId({})", self.0)
    }
}

/// Slot number within a record page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub u16);

impl SlotId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Record identifier - page number plus slot number.
///
/// Ordering is page-then-slot, which is also scan order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_no: PageNo,
    pub slot_id: SlotId,
}

impl Rid {
    /// Sentinel returned by an exhausted scan.
    pub const INVALID: Rid = Rid {
        page_no: INVALID_PAGE_NO,
        slot_id: SlotId(u16::MAX),
    };

    pub fn new(page_no: PageNo, slot_id: SlotId) -> Self {
        Self { page_no, slot_id }
    }

    pub fn is_valid(&self) -> bool {
        self.page_no.is_valid()
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}, {})", self.page_no, self.slot_id.0)
    }
}
