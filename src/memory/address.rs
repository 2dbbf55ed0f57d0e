// Thu Oct 15 2026 - Alex

use std::fmt;
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address {
    value: usize,
}

impl Address {
    pub fn new(value: usize) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self { value: 0 }
    }

    pub fn from_ptr(ptr: *const u8) -> Self {
        Self { value: ptr as usize }
    }

    pub fn as_usize(&self) -> usize {
        self.value
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.value as *const u8
    }

    pub fn is_null(&self) -> bool {
        self.value == 0
    }

    pub fn checked_add(&self, rhs: usize) -> Option<Self> {
        self.value.checked_add(rhs).map(Self::new)
    }

    pub fn checked_sub(&self, rhs: usize) -> Option<Self> {
        self.value.checked_sub(rhs).map(Self::new)
    }

    /// Byte distance from `base` to `self`, or `None` if `self` lies below `base`.
    pub fn offset_from(&self, base: Self) -> Option<usize> {
        self.value.checked_sub(base.value)
    }

    /// The candidate start that follows a reported match.
    ///
    /// Always one byte past `self` so overlapping occurrences stay visible.
    /// Returns `None` once that step would pass `last`, the highest start at
    /// which the whole pattern still fits inside the region.
    pub fn next_candidate(&self, last: Self) -> Option<Self> {
        self.checked_add(1).filter(|next| *next <= last)
    }

    pub fn is_within_range(&self, start: Self, end: Self) -> bool {
        self.value >= start.value && self.value < end.value
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.value)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.value, f)
    }
}

impl fmt::UpperHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.value, f)
    }
}

impl Add<usize> for Address {
    type Output = Self;
    fn add(self, rhs: usize) -> Self::Output {
        Self { value: self.value + rhs }
    }
}

impl Sub<usize> for Address {
    type Output = Self;
    fn sub(self, rhs: usize) -> Self::Output {
        Self { value: self.value - rhs }
    }
}

impl From<usize> for Address {
    fn from(value: usize) -> Self {
        Self::new(value)
    }
}

impl From<Address> for usize {
    fn from(addr: Address) -> Self {
        addr.value
    }
}

impl From<*const u8> for Address {
    fn from(ptr: *const u8) -> Self {
        Self::from_ptr(ptr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_candidate_steps_one_byte() {
        let addr = Address::new(0x1000);
        assert_eq!(addr.next_candidate(Address::new(0x1004)), Some(Address::new(0x1001)));
    }

    #[test]
    fn test_next_candidate_stops_at_last_start() {
        let last = Address::new(0x1004);
        assert_eq!(Address::new(0x1003).next_candidate(last), Some(last));
        assert_eq!(last.next_candidate(last), None);
        assert_eq!(Address::new(usize::MAX).next_candidate(Address::new(usize::MAX)), None);
    }

    #[test]
    fn test_offset_from() {
        let base = Address::new(0x2000);
        assert_eq!(Address::new(0x2010).offset_from(base), Some(0x10));
        assert_eq!(Address::new(0x1fff).offset_from(base), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::new(0xdead).to_string(), "0x000000000000dead");
        assert_eq!(format!("{:x}", Address::new(0xbeef)), "beef");
    }
}
