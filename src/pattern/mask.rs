// Thu Oct 15 2026 - Alex

/// How a single pattern position constrains the candidate byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskKind {
    Ignore,
    Exact,
    Partial(u8),
}

impl MaskKind {
    pub fn from_mask(mask: u8) -> Self {
        match mask {
            0x00 => Self::Ignore,
            0xFF => Self::Exact,
            m => Self::Partial(m),
        }
    }

    pub fn to_mask(self) -> u8 {
        match self {
            Self::Ignore => 0x00,
            Self::Exact => 0xFF,
            Self::Partial(m) => m,
        }
    }

    pub fn is_significant(self) -> bool {
        !matches!(self, Self::Ignore)
    }

    /// Whether `candidate` satisfies a position whose normalized value is `expected`.
    pub fn accepts(self, expected: u8, candidate: u8) -> bool {
        match self {
            Self::Ignore => true,
            Self::Exact => candidate == expected,
            Self::Partial(m) => candidate & m == expected,
        }
    }
}
