// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! In-place RGBA <-> BGRA channel swizzle.

use serde::{Deserialize, Serialize};

/// Bytes per pixel for every buffer handled by this crate.
pub const BYTES_PER_PIXEL: usize = 4;

/// Channel order of a buffer's memory at a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// RGBA, as written by the application.
    Native,
    /// BGRA, as consumed by the display server.
    Transfer,
}

impl ByteOrder {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Transfer => "transfer",
        }
    }
}

/// Swap the first and third byte of every complete 4-byte pixel.
///
/// The transform is its own inverse. A trailing partial pixel is left alone.
pub fn bgra(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swaps_red_and_blue() {
        let mut buf = [1u8, 2, 3, 4, 5, 6, 7, 8];
        bgra(&mut buf);
        assert_eq!(buf, [3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_is_involution() {
        let original: Vec<u8> = (0..=255).collect();
        let mut buf = original.clone();
        bgra(&mut buf);
        assert_ne!(buf, original);
        bgra(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn test_partial_pixel_untouched() {
        let mut buf = [1u8, 2, 3, 4, 9, 8];
        bgra(&mut buf);
        assert_eq!(buf, [3, 2, 1, 4, 9, 8]);
    }
}
