//! Code-region filter
//!
//! CHIP-8 ROMs interleave sprite data with code and carry no section
//! information, so the set of decodable regions is supplied externally.
//! Ranges are closed `[start, end]` byte offsets relative to the load base.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeParseError {
    #[error("empty range spec")]
    Empty,

    #[error("bad range {0:?}: expected hex-hex")]
    BadRange(String),

    #[error("bad hex offset {0:?}")]
    BadOffset(String),

    #[error("range {0:x}-{1:x} is inverted")]
    Inverted(u16, u16),
}

/// A set of closed byte-offset ranges treated as code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRanges(Vec<(u16, u16)>);

impl CodeRanges {
    pub fn new(mut ranges: Vec<(u16, u16)>) -> Self {
        ranges.sort_unstable();
        CodeRanges(ranges)
    }

    /// The whole ROM treated as code.
    pub fn whole(rom_len: usize) -> Self {
        let end = rom_len.saturating_sub(1).min(u16::MAX as usize) as u16;
        CodeRanges(vec![(0, end)])
    }

    pub fn contains(&self, offset: u16) -> bool {
        self.0
            .iter()
            .any(|&(start, end)| offset >= start && offset <= end)
    }

    /// Parse a spec like `0-1f,30-1ff` (hex offsets, closed ranges).
    pub fn parse(spec: &str) -> Result<Self, RangeParseError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(RangeParseError::Empty);
        }
        let mut ranges = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            let (lo, hi) = part
                .split_once('-')
                .ok_or_else(|| RangeParseError::BadRange(part.to_string()))?;
            let parse = |s: &str| {
                u16::from_str_radix(s.trim(), 16)
                    .map_err(|_| RangeParseError::BadOffset(s.trim().to_string()))
            };
            let (lo, hi) = (parse(lo)?, parse(hi)?);
            if lo > hi {
                return Err(RangeParseError::Inverted(lo, hi));
            }
            ranges.push((lo, hi));
        }
        Ok(CodeRanges::new(ranges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_contains() {
        let r = CodeRanges::parse("0-1f, 30-ff").unwrap();
        assert!(r.contains(0));
        assert!(r.contains(0x1f));
        assert!(!r.contains(0x20));
        assert!(r.contains(0x30));
        assert!(r.contains(0xff));
        assert!(!r.contains(0x100));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(CodeRanges::parse(""), Err(RangeParseError::Empty));
        assert!(matches!(CodeRanges::parse("10"), Err(RangeParseError::BadRange(_))));
        assert!(matches!(CodeRanges::parse("zz-10"), Err(RangeParseError::BadOffset(_))));
        assert_eq!(CodeRanges::parse("20-10"), Err(RangeParseError::Inverted(0x20, 0x10)));
    }

    #[test]
    fn whole_rom() {
        let r = CodeRanges::whole(6);
        assert!(r.contains(0));
        assert!(r.contains(5));
        assert!(!r.contains(6));
    }
}
