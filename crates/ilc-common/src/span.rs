//! Source spans attached to declarations and use sites.

use serde::Serialize;

/// A byte range inside one source file.
///
/// `file` indexes the driver's file table; spans from the same file compare by
/// offset. A zero-length span at offset 0 of file 0 is the "unknown" span used
/// for synthesized entities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub file: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const UNKNOWN: Span = Span {
        file: 0,
        start: 0,
        end: 0,
    };

    #[inline]
    pub const fn new(file: u32, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    #[inline]
    pub const fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.end <= self.start
    }

    #[inline]
    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }
}
