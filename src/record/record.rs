use bytes::Bytes;

use crate::common::Rid;

/// A fixed-width record copied out of its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    rid: Rid,
    data: Bytes,
}

impl Record {
    pub fn new(rid: Rid, data: &[u8]) -> Self {
        Self {
            rid,
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Returns where the record was read from.
    pub fn rid(&self) -> Rid {
        self.rid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for Record {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
