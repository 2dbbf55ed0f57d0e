// Thu Oct 15 2026 - Alex

use crate::pattern::{MaskKind, PatternError};
use std::fmt;

/// A fixed-length byte pattern with a per-position mask.
///
/// Bytes are stored pre-masked (`bytes[i] & mask[i]`), so every position
/// compares `candidate & mask[i]` against `bytes[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    bytes: Vec<u8>,
    mask: Vec<u8>,
    trimmed_len: usize,
    anchor: Option<usize>,
}

impl Pattern {
    pub fn new(bytes: Vec<u8>, mask: Vec<u8>) -> Result<Self, PatternError> {
        if bytes.len() != mask.len() {
            return Err(PatternError::InvalidPattern(format!(
                "{} bytes but {} mask entries",
                bytes.len(),
                mask.len()
            )));
        }

        let bytes: Vec<u8> = bytes.iter().zip(&mask).map(|(&b, &m)| b & m).collect();

        let trimmed_len = mask.iter().rposition(|&m| m != 0).map_or(0, |i| i + 1);
        let anchor = mask[..trimmed_len].iter().position(|&m| m == 0xFF);

        Ok(Self {
            bytes,
            mask,
            trimmed_len,
            anchor,
        })
    }

    /// Every byte must match exactly.
    pub fn exact(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            mask: vec![0xFF; bytes.len()],
            trimmed_len: bytes.len(),
            anchor: if bytes.is_empty() { None } else { Some(0) },
        }
    }

    pub fn with_mask(bytes: &[u8], mask: &[u8]) -> Result<Self, PatternError> {
        Self::new(bytes.to_vec(), mask.to_vec())
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mask(&self) -> &[u8] {
        &self.mask
    }

    /// Length without trailing positions that never constrain a match.
    pub fn trimmed_len(&self) -> usize {
        self.trimmed_len
    }

    /// First fully constrained position, used to drive the fast-skip filter.
    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    pub fn kind_at(&self, index: usize) -> MaskKind {
        MaskKind::from_mask(self.mask[index])
    }

    pub fn significant_byte_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m != 0).count()
    }

    pub fn wildcard_byte_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m == 0).count()
    }

    /// Software reference check of the pattern against the start of `data`.
    pub fn matches(&self, data: &[u8]) -> bool {
        if data.len() < self.bytes.len() {
            return false;
        }

        self.bytes[..self.trimmed_len]
            .iter()
            .zip(&self.mask)
            .zip(data)
            .all(|((&expected, &mask), &candidate)| {
                MaskKind::from_mask(mask).accepts(expected, candidate)
            })
    }

    /// Every offset in `data` where the pattern matches, ascending.
    pub fn find_all_in(&self, data: &[u8]) -> Vec<usize> {
        if self.trimmed_len == 0 || data.len() < self.bytes.len() {
            return Vec::new();
        }

        (0..=(data.len() - self.bytes.len()))
            .filter(|&i| self.matches(&data[i..]))
            .collect()
    }

    pub fn to_hex_string(&self) -> String {
        self.bytes
            .iter()
            .zip(&self.mask)
            .map(|(&b, &m)| match MaskKind::from_mask(m) {
                MaskKind::Ignore => "??".to_string(),
                MaskKind::Exact => format!("{:02X}", b),
                MaskKind::Partial(m) => format!("{:02X}&{:02X}", b, m),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex_string())
    }
}

pub struct PatternBuilder {
    bytes: Vec<u8>,
    mask: Vec<u8>,
}

impl PatternBuilder {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            mask: Vec::new(),
        }
    }

    pub fn byte(mut self, b: u8) -> Self {
        self.bytes.push(b);
        self.mask.push(0xFF);
        self
    }

    pub fn bytes(mut self, bs: &[u8]) -> Self {
        for &b in bs {
            self.bytes.push(b);
            self.mask.push(0xFF);
        }
        self
    }

    pub fn masked(mut self, b: u8, mask: u8) -> Self {
        self.bytes.push(b);
        self.mask.push(mask);
        self
    }

    pub fn wildcard(mut self) -> Self {
        self.bytes.push(0);
        self.mask.push(0);
        self
    }

    pub fn wildcards(mut self, count: usize) -> Self {
        for _ in 0..count {
            self = self.wildcard();
        }
        self
    }

    pub fn build(self) -> Pattern {
        // Lengths are kept in step by every builder method.
        match Pattern::new(self.bytes, self.mask) {
            Ok(pattern) => pattern,
            Err(_) => unreachable!("builder keeps bytes and mask aligned"),
        }
    }
}

impl Default for PatternBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatched_lengths_rejected() {
        let err = Pattern::new(vec![1, 2, 3], vec![0xFF, 0xFF]).unwrap_err();
        assert!(matches!(err, PatternError::InvalidPattern(_)));
    }

    #[test]
    fn test_exact_defaults() {
        let pattern = Pattern::exact(&[0x41, 0x42]);
        assert_eq!(pattern.mask(), &[0xFF, 0xFF]);
        assert_eq!(pattern.trimmed_len(), 2);
        assert_eq!(pattern.anchor(), Some(0));
    }

    #[test]
    fn test_trailing_wildcards_trimmed() {
        let pattern = PatternBuilder::new()
            .byte(0x01)
            .wildcard()
            .byte(0x03)
            .wildcards(3)
            .build();
        assert_eq!(pattern.len(), 6);
        assert_eq!(pattern.trimmed_len(), 3);
    }

    #[test]
    fn test_anchor_skips_leading_wildcards_and_partials() {
        let pattern = PatternBuilder::new()
            .wildcard()
            .masked(0x10, 0xF0)
            .byte(0xAA)
            .byte(0xBB)
            .build();
        assert_eq!(pattern.anchor(), Some(2));
    }

    #[test]
    fn test_no_anchor_when_only_partials() {
        let pattern = PatternBuilder::new()
            .masked(0x10, 0xF0)
            .wildcard()
            .masked(0x01, 0x0F)
            .build();
        assert_eq!(pattern.anchor(), None);
        assert_eq!(pattern.trimmed_len(), 3);
    }

    #[test]
    fn test_fully_wildcarded_is_empty_after_trim() {
        let pattern = PatternBuilder::new().wildcards(4).build();
        assert_eq!(pattern.trimmed_len(), 0);
        assert_eq!(pattern.anchor(), None);
        assert!(pattern.find_all_in(&[0u8; 8]).is_empty());
    }

    #[test]
    fn test_bytes_are_premasked() {
        let pattern = Pattern::with_mask(&[0x10], &[0x0F]).unwrap();
        assert_eq!(pattern.bytes(), &[0x00]);
        assert!(pattern.matches(&[0x30]));
        assert!(pattern.matches(&[0x10]));
        assert!(pattern.matches(&[0xF0]));
        assert!(!pattern.matches(&[0x11]));
    }

    #[test]
    fn test_find_all_in_overlapping() {
        let pattern = Pattern::exact(&[0x41, 0x41]);
        assert_eq!(pattern.find_all_in(&[0x41, 0x41, 0x41]), vec![0, 1]);
    }

    #[test]
    fn test_find_all_respects_untrimmed_length() {
        let pattern = PatternBuilder::new().byte(0x41).wildcards(2).build();
        assert_eq!(pattern.find_all_in(&[0x00, 0x41, 0x41, 0x00]), vec![1]);
    }

    #[test]
    fn test_display() {
        let pattern = PatternBuilder::new()
            .byte(0x01)
            .wildcard()
            .masked(0x3C, 0xF0)
            .build();
        assert_eq!(pattern.to_string(), "01 ?? 30&F0");
    }
}
