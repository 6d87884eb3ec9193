// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! In-process display server.
//!
//! `LoopbackTransport` plays the server side of the shared-memory protocol
//! without a real display: it maps attached segments by name, copies the
//! requested rectangle out at PutImage time and queues the request as
//! completed. The demo CLI, the benches and the tests drive the core through
//! it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::Mutex;

use dashmap::DashMap;

use crate::error::TransportError;
use crate::geometry::Point;
use crate::shm::ShmSegment;
use crate::swizzle::{self, BYTES_PER_PIXEL};
use crate::sync::lock;
use crate::transport::{PutImage, Transport};
use crate::types::{DrawableId, SegmentId, Sequence};

/// One image as the server received it, still in transfer order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedImage {
    pub sequence: Sequence,
    pub segment: SegmentId,
    pub drawable: DrawableId,
    pub dst: Point,
    pub size: Point,
    pub pixels: Vec<u8>,
    /// CRC32 of `pixels`.
    pub checksum: u32,
}

impl ReceivedImage {
    /// The pixels converted back to native order.
    pub fn native_pixels(&self) -> Vec<u8> {
        let mut px = self.pixels.clone();
        swizzle::bgra(&mut px);
        px
    }
}

#[derive(Debug)]
pub struct LoopbackTransport {
    next_segment: AtomicU32,
    next_sequence: AtomicU16,
    segments: DashMap<SegmentId, ShmSegment>,
    received: Mutex<Vec<ReceivedImage>>,
    completed: Mutex<VecDeque<Sequence>>,
    detached: Mutex<Vec<SegmentId>>,
    fail_put: AtomicBool,
    fail_detach: AtomicBool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            next_segment: AtomicU32::new(1),
            next_sequence: AtomicU16::new(1),
            segments: DashMap::new(),
            received: Mutex::new(Vec::new()),
            completed: Mutex::new(VecDeque::new()),
            detached: Mutex::new(Vec::new()),
            fail_put: AtomicBool::new(false),
            fail_detach: AtomicBool::new(false),
        }
    }

    /// Start issuing sequence numbers at `next`.
    pub fn with_first_sequence(self, next: u16) -> Self {
        self.next_sequence.store(next, Ordering::Relaxed);
        self
    }

    /// Make the next `put_image` fail.
    pub fn fail_next_put(&self) {
        self.fail_put.store(true, Ordering::SeqCst);
    }

    /// Make the next `detach_segment` fail.
    pub fn fail_next_detach(&self) {
        self.fail_detach.store(true, Ordering::SeqCst);
    }

    /// Sequence numbers of finished requests, oldest first.
    pub fn drain_completed(&self) -> Vec<Sequence> {
        lock(&self.completed).drain(..).collect()
    }

    pub fn received(&self) -> Vec<ReceivedImage> {
        lock(&self.received).clone()
    }

    pub fn take_received(&self) -> Vec<ReceivedImage> {
        std::mem::take(&mut *lock(&self.received))
    }

    /// Segments currently attached.
    pub fn attached_count(&self) -> usize {
        self.segments.len()
    }

    /// Segments detached so far, in order.
    pub fn detached(&self) -> Vec<SegmentId> {
        lock(&self.detached).clone()
    }

    fn copy_out(segment: &ShmSegment, request: &PutImage) -> Result<Vec<u8>, String> {
        let total_w = usize::from(request.total_width);
        let total_h = usize::from(request.total_height);
        let (x, y) = (usize::from(request.src_x), usize::from(request.src_y));
        let (w, h) = (usize::from(request.src_width), usize::from(request.src_height));

        if x + w > total_w || y + h > total_h {
            return Err(format!(
                "source {}x{}+{}+{} outside {}x{} image",
                w, h, x, y, total_w, total_h
            ));
        }
        let stride = total_w * BYTES_PER_PIXEL;
        let start = request.offset as usize;
        if start + total_h * stride > segment.len() {
            return Err("image larger than segment".to_string());
        }

        // SAFETY: the mapping is live while it is in `segments`. Only a byte
        // copy is taken; the client owns the contents.
        let bytes = unsafe { segment.as_slice() };
        let mut out = Vec::with_capacity(w * h * BYTES_PER_PIXEL);
        for row in y..y + h {
            let begin = start + row * stride + x * BYTES_PER_PIXEL;
            out.extend_from_slice(&bytes[begin..begin + w * BYTES_PER_PIXEL]);
        }
        Ok(out)
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LoopbackTransport {
    fn attach_segment(&self, segment: &ShmSegment) -> Result<SegmentId, TransportError> {
        let mapping =
            ShmSegment::open(segment.name(), segment.len()).map_err(|e| {
                TransportError::AttachFailed {
                    name: segment.name().to_string(),
                    reason: e.to_string(),
                }
            })?;
        let id = SegmentId::new(self.next_segment.fetch_add(1, Ordering::Relaxed));
        self.segments.insert(id, mapping);

        tracing::debug!(segment = %id, name = %segment.name(), "Loopback attached segment");
        Ok(id)
    }

    fn put_image(&self, request: &PutImage) -> Result<Sequence, TransportError> {
        if self.fail_put.swap(false, Ordering::SeqCst) {
            return Err(TransportError::PutImageFailed {
                segment: request.segment,
                reason: "injected failure".to_string(),
            });
        }

        let segment = self
            .segments
            .get(&request.segment)
            .ok_or(TransportError::UnknownSegment(request.segment))?;
        let pixels =
            Self::copy_out(&segment, request).map_err(|reason| TransportError::PutImageFailed {
                segment: request.segment,
                reason,
            })?;
        drop(segment);

        let sequence = Sequence::new(self.next_sequence.fetch_add(1, Ordering::Relaxed));
        let image = ReceivedImage {
            sequence,
            segment: request.segment,
            drawable: request.drawable,
            dst: Point::new(i32::from(request.dst_x), i32::from(request.dst_y)),
            size: Point::new(i32::from(request.src_width), i32::from(request.src_height)),
            checksum: crc32fast::hash(&pixels),
            pixels,
        };

        tracing::trace!(
            sequence = %sequence,
            segment = %request.segment,
            checksum = image.checksum,
            "Loopback received image"
        );

        lock(&self.received).push(image);
        if request.send_event {
            lock(&self.completed).push_back(sequence);
        }
        Ok(sequence)
    }

    fn detach_segment(&self, segment: SegmentId) -> Result<(), TransportError> {
        if self.fail_detach.swap(false, Ordering::SeqCst) {
            return Err(TransportError::DetachFailed {
                segment,
                reason: "injected failure".to_string(),
            });
        }

        let (_, mapping) = self
            .segments
            .remove(&segment)
            .ok_or(TransportError::UnknownSegment(segment))?;
        if let Err(e) = mapping.close() {
            tracing::warn!(segment = %segment, error = %e, "Loopback failed to unmap segment");
        }
        lock(&self.detached).push(segment);

        tracing::debug!(segment = %segment, "Loopback detached segment");
        Ok(())
    }
}
