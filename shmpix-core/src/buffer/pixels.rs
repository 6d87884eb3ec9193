// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

use std::sync::MutexGuard;

use crate::buffer::shared::Memory;
use crate::geometry::{Point, Rectangle};
use crate::swizzle::BYTES_PER_PIXEL;

/// Row-major RGBA view over a buffer's shared memory.
///
/// Writes land directly in the segment the display server reads from.
pub struct PixelView<'a> {
    bytes: &'a mut [u8],
    size: Point,
    _memory: Option<MutexGuard<'a, Memory>>,
}

impl<'a> PixelView<'a> {
    pub(crate) fn new(bytes: &'a mut [u8], size: Point) -> Self {
        debug_assert_eq!(
            bytes.len(),
            size.x as usize * size.y as usize * BYTES_PER_PIXEL
        );
        Self {
            bytes,
            size,
            _memory: None,
        }
    }

    /// A view that keeps `memory` locked until it is dropped.
    pub(crate) fn locked(
        bytes: &'a mut [u8],
        size: Point,
        memory: MutexGuard<'a, Memory>,
    ) -> Self {
        Self {
            _memory: Some(memory),
            ..Self::new(bytes, size)
        }
    }

    pub fn size(&self) -> Point {
        self.size
    }

    pub fn bounds(&self) -> Rectangle {
        Rectangle::from_size(self.size)
    }

    /// Bytes between the starts of two consecutive rows.
    pub fn stride(&self) -> usize {
        self.size.x as usize * BYTES_PER_PIXEL
    }

    /// Index of the first byte of pixel `(x, y)`.
    pub fn pixel_offset(&self, x: i32, y: i32) -> usize {
        y as usize * self.stride() + x as usize * BYTES_PER_PIXEL
    }

    pub fn get(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        if !self.bounds().contains(Point::new(x, y)) {
            return None;
        }
        let i = self.pixel_offset(x, y);
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.bytes[i..i + BYTES_PER_PIXEL]);
        Some(px)
    }

    /// Write one pixel. Coordinates outside the buffer are ignored.
    pub fn set(&mut self, x: i32, y: i32, px: [u8; 4]) {
        if !self.bounds().contains(Point::new(x, y)) {
            return;
        }
        let i = self.pixel_offset(x, y);
        self.bytes[i..i + BYTES_PER_PIXEL].copy_from_slice(&px);
    }

    /// Fill the part of `rect` that lies inside the buffer.
    pub fn fill(&mut self, rect: Rectangle, px: [u8; 4]) {
        let r = rect.intersect(&self.bounds());
        if r.is_empty() {
            return;
        }
        for y in r.min.y..r.max.y {
            let start = self.pixel_offset(r.min.x, y);
            let end = start + r.dx() as usize * BYTES_PER_PIXEL;
            for chunk in self.bytes[start..end].chunks_exact_mut(BYTES_PER_PIXEL) {
                chunk.copy_from_slice(&px);
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut mem = vec![0u8; 3 * 2 * 4];
        let mut view = PixelView::new(&mut mem, Point::new(3, 2));
        view.set(2, 1, [1, 2, 3, 4]);
        assert_eq!(view.get(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(view.pixel_offset(2, 1), 20);
        drop(view);
        assert_eq!(&mem[20..24], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_writes_visible_after_view_dropped() {
        let mut mem = vec![0u8; 2 * 2 * 4];
        {
            let mut view = PixelView::new(&mut mem, Point::new(2, 2));
            view.fill(view.bounds(), [5, 6, 7, 8]);
        }
        assert!(mem.chunks_exact(4).all(|px| px == [5, 6, 7, 8]));
    }

    #[test]
    fn test_out_of_bounds_ignored() {
        let mut mem = vec![0u8; 2 * 2 * 4];
        let mut view = PixelView::new(&mut mem, Point::new(2, 2));
        view.set(2, 0, [9, 9, 9, 9]);
        view.set(-1, 0, [9, 9, 9, 9]);
        assert_eq!(view.get(2, 0), None);
        assert!(view.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fill_clips_to_bounds() {
        let mut mem = vec![0u8; 4 * 4 * 4];
        let mut view = PixelView::new(&mut mem, Point::new(4, 4));
        view.fill(Rectangle::from_coords(2, 2, 10, 10), [7, 7, 7, 255]);

        assert_eq!(view.get(3, 3), Some([7, 7, 7, 255]));
        assert_eq!(view.get(2, 2), Some([7, 7, 7, 255]));
        assert_eq!(view.get(1, 2), Some([0, 0, 0, 0]));
        assert_eq!(view.get(2, 1), Some([0, 0, 0, 0]));
    }
}
