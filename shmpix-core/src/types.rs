// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for protocol identifiers.
//!
//! Each id lives in its own type so a drawable can never be passed where a
//! graphics context or segment is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a shared-memory segment as known to the display server.
///
/// Also serves as the identity of the buffer that owns the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(u32);

impl SegmentId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seg#{}", self.0)
    }
}

/// Protocol request sequence number.
///
/// Sequence numbers are 16 bits wide and wrap, so ordering is defined over
/// the half of the number space that follows a value rather than by `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sequence(u16);

impl Sequence {
    pub const fn new(seq: u16) -> Self {
        Self(seq)
    }

    pub const fn value(&self) -> u16 {
        self.0
    }

    /// The sequence number issued after this one.
    pub const fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Returns true if `self` was issued no later than `other`.
    pub fn precedes_or_equals(&self, other: Sequence) -> bool {
        other.0.wrapping_sub(self.0) < 0x8000
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination drawable (window or pixmap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrawableId(u32);

impl DrawableId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DrawableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "drawable#{}", self.0)
    }
}

/// Graphics context used for the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GContextId(u32);

impl GContextId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gc#{}", self.0)
    }
}

/// Identity of whatever requested an upload (a window, a texture).
///
/// Carried back unchanged in the completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploaderId(u64);

impl UploaderId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UploaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uploader#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_ordering() {
        let a = Sequence::new(10);
        assert!(a.precedes_or_equals(a));
        assert!(a.precedes_or_equals(Sequence::new(11)));
        assert!(!Sequence::new(11).precedes_or_equals(a));
    }

    #[test]
    fn test_sequence_ordering_across_wrap() {
        let late = Sequence::new(u16::MAX);
        let wrapped = late.next();
        assert_eq!(wrapped.value(), 0);
        assert!(late.precedes_or_equals(wrapped));
        assert!(!wrapped.precedes_or_equals(late));
    }

    #[test]
    fn test_display() {
        assert_eq!(SegmentId::new(3).to_string(), "seg#3");
        assert_eq!(DrawableId::new(9).to_string(), "drawable#9");
        assert_eq!(Sequence::new(42).to_string(), "42");
    }
}
