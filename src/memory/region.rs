// Thu Oct 15 2026 - Alex

use crate::memory::Address;
use std::fmt;
use std::marker::PhantomData;

/// A readable span of memory handed to a scan.
///
/// The lifetime ties the region to the bytes it was built from, so a safe
/// `Region` always describes memory that stays readable while it is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region<'a> {
    start: Address,
    len: usize,
    _bytes: PhantomData<&'a [u8]>,
}

impl<'a> Region<'a> {
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self {
            start: Address::from_ptr(data.as_ptr()),
            len: data.len(),
            _bytes: PhantomData,
        }
    }

    /// Describe `len` bytes starting at `start`.
    ///
    /// # Safety
    ///
    /// Every byte in `start..start + len` must be readable for as long as the
    /// region is used, and the span must not wrap the address space.
    pub unsafe fn from_raw_parts(start: Address, len: usize) -> Self {
        Self {
            start,
            len,
            _bytes: PhantomData,
        }
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte.
    pub fn end(&self) -> Address {
        self.start + self.len
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr.is_within_range(self.start, self.end())
    }

    /// Highest start address at which `pattern_len` bytes still fit.
    ///
    /// `None` means the region is shorter than the pattern and can never match.
    pub fn last_start(&self, pattern_len: usize) -> Option<Address> {
        self.len
            .checked_sub(pattern_len)
            .map(|slack| self.start + slack)
    }

    /// Offset of `addr` from the region start.
    pub fn offset_of(&self, addr: Address) -> Option<usize> {
        if self.contains(addr) {
            addr.offset_from(self.start)
        } else {
            None
        }
    }

    pub fn split_at(&self, mid: usize) -> (Region<'a>, Region<'a>) {
        let mid = mid.min(self.len);
        (
            Region {
                start: self.start,
                len: mid,
                _bytes: PhantomData,
            },
            Region {
                start: self.start + mid,
                len: self.len - mid,
                _bytes: PhantomData,
            },
        )
    }
}

impl<'a> From<&'a [u8]> for Region<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::from_slice(data)
    }
}

impl fmt::Display for Region<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}
