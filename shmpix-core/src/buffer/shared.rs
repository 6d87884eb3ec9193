// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedPixelBuffer - the state shared between the owner and in-flight uploads.

use std::ptr::NonNull;
use std::sync::{Arc, Mutex};

use crate::buffer::lifecycle::{BeginTicket, EndTicket, ReleaseTicket, UploadState};
use crate::buffer::PixelView;
use crate::completion::CompletionSender;
use crate::connection::Connection;
use crate::error::TransportError;
use crate::geometry::{Point, Rectangle};
use crate::shm::ShmSegment;
use crate::stats::{BufferCounters, BufferStats};
use crate::swizzle::{self, ByteOrder};
use crate::sync::lock;
use crate::transport::{PutImage, UploadTarget};
use crate::types::{SegmentId, Sequence, UploaderId};

/// A pixel surface backed by an attached shared-memory segment.
///
/// The memory is in native (RGBA) order while no upload is in flight and in
/// transfer (BGRA) order while at least one is. The state lock only guards
/// the upload count and the two lifecycle flags and is never held while
/// pixel bytes are rewritten.
pub struct SharedPixelBuffer {
    id: SegmentId,
    name: String,
    size: Point,
    ptr: NonNull<u8>,
    len: usize,
    memory: Mutex<Memory>,
    connection: Connection,
    state: Mutex<UploadState>,
    counters: BufferCounters,
}

/// What the bytes physically look like, as opposed to what the upload count
/// says they should look like.
pub(crate) struct Memory {
    /// Taken exactly once, by cleanup.
    segment: Option<ShmSegment>,
    order: ByteOrder,
}

// SAFETY: ptr points into the segment owned by this struct and is only
// rewritten with the memory lock held, while the segment is still mapped.
unsafe impl Send for SharedPixelBuffer {}
// SAFETY: see above.
unsafe impl Sync for SharedPixelBuffer {}

impl SharedPixelBuffer {
    pub(crate) fn new(
        id: SegmentId,
        size: Point,
        segment: ShmSegment,
        connection: Connection,
    ) -> Self {
        let ptr = segment.as_non_null();
        let len = (size.x as usize) * (size.y as usize) * swizzle::BYTES_PER_PIXEL;
        debug_assert!(len <= segment.len());
        Self {
            id,
            name: segment.name().to_string(),
            size,
            ptr,
            len,
            memory: Mutex::new(Memory {
                segment: Some(segment),
                order: ByteOrder::Native,
            }),
            connection,
            state: Mutex::new(UploadState::new()),
            counters: BufferCounters::default(),
        }
    }

    /// Segment id, which doubles as the buffer's identity.
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Name of the backing shared memory object.
    pub fn segment_name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> Point {
        self.size
    }

    pub fn bounds(&self) -> Rectangle {
        Rectangle::from_size(self.size)
    }

    /// Byte order the memory is in, or about to be in, given the uploads in flight.
    pub fn byte_order(&self) -> ByteOrder {
        if lock(&self.state).in_flight() > 0 {
            ByteOrder::Transfer
        } else {
            ByteOrder::Native
        }
    }

    pub fn uploads_in_flight(&self) -> u32 {
        lock(&self.state).in_flight()
    }

    pub fn is_released(&self) -> bool {
        lock(&self.state).is_released()
    }

    pub fn is_cleaned_up(&self) -> bool {
        lock(&self.state).is_cleaned_up()
    }

    pub fn stats(&self) -> BufferStats {
        self.counters.snapshot()
    }

    /// The whole pixel memory.
    ///
    /// # Safety
    /// The caller must be the only one touching the bytes for the lifetime of
    /// the slice, and the buffer must not have been cleaned up.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn bytes_mut(&self) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }

    /// Lock the pixel memory for direct access.
    ///
    /// Swizzles wait until the view is dropped.
    ///
    /// # Panics
    /// If the buffer has already been cleaned up.
    pub(crate) fn view(&self) -> PixelView<'_> {
        let memory = lock(&self.memory);
        if memory.segment.is_none() {
            drop(memory);
            panic!("shmpix: Buffer pixels accessed after clean-up");
        }
        // SAFETY: the segment is still mapped, and cleanup has to take it out
        // under the memory lock, which travels with the view. No swizzle runs
        // while the view is alive either.
        let bytes = unsafe { self.bytes_mut() };
        PixelView::locked(bytes, self.size, memory)
    }

    /// Account for an upload about to be issued.
    ///
    /// The memory is in transfer order when this returns. Byte work is not
    /// bound to the begin ticket: whoever reaches the memory lock first
    /// converts, and everyone else finds the bytes already settled. The
    /// ticket only matters for the counters and the log, while the end and
    /// release tickets still decide cleanup exactly once.
    ///
    /// # Panics
    /// If the buffer has been released.
    pub(crate) fn begin_upload(&self) {
        let ticket = lock(&self.state).begin();
        self.counters.record_begin();

        if ticket == BeginTicket::Join {
            tracing::trace!(buffer = %self.id, "Upload joined in-flight group");
        }
        self.settle_byte_order();
    }

    /// Account for an upload the server has finished with.
    ///
    /// The last upload of an overlapping group restores native order, or
    /// tears the buffer down if it was released meanwhile.
    pub(crate) fn end_upload(&self) {
        let ticket = lock(&self.state).end();
        self.counters.record_end();

        match ticket {
            EndTicket::StillInFlight => {}
            EndTicket::Unswizzle => self.settle_byte_order(),
            EndTicket::Cleanup => self.cleanup(),
        }
    }

    /// Bring the bytes in line with the upload count.
    ///
    /// The target order is read after the memory lock is taken, so an
    /// unswizzle that loses a race against the next upload's swizzle leaves
    /// the bytes in transfer order instead of undoing the newer claim.
    fn settle_byte_order(&self) {
        let mut memory = lock(&self.memory);
        if memory.segment.is_none() {
            return;
        }

        let want = self.byte_order();
        if memory.order == want {
            return;
        }

        // SAFETY: the segment is still mapped and the memory lock is held.
        swizzle::bgra(unsafe { self.bytes_mut() });
        memory.order = want;

        match want {
            ByteOrder::Transfer => self.counters.record_swizzle(),
            ByteOrder::Native => self.counters.record_unswizzle(),
        }
        tracing::debug!(buffer = %self.id, order = want.name(), "Swizzled buffer");
    }

    /// Give up the buffer.
    ///
    /// Teardown happens now if nothing is in flight, otherwise when the last
    /// in-flight upload completes.
    pub(crate) fn release(&self) {
        let ticket = lock(&self.state).release();
        match ticket {
            ReleaseTicket::Cleanup => self.cleanup(),
            ReleaseTicket::Deferred => {
                tracing::debug!(buffer = %self.id, "Release deferred until uploads complete");
            }
            ReleaseTicket::AlreadyReleased => {}
        }
    }

    /// Unregister, detach and unmap.
    ///
    /// Detach and unmap failures are logged and otherwise ignored.
    ///
    /// # Panics
    /// If called a second time.
    pub(crate) fn cleanup(&self) {
        if !lock(&self.state).claim_cleanup() {
            panic!("shmpix: Buffer clean-up occurred twice");
        }

        self.connection.forget_buffer(self.id);

        if let Err(e) = self.connection.transport().detach_segment(self.id) {
            tracing::warn!(buffer = %self.id, error = %e, "Segment detach failed");
        }

        let segment = lock(&self.memory).segment.take();
        if let Some(segment) = segment {
            if let Err(e) = segment.close() {
                tracing::error!(buffer = %self.id, error = %e, "Failed to release segment mapping");
            }
        }

        tracing::info!(buffer = %self.id, "Buffer cleaned up");
    }

    /// Transfer `src` of this buffer to `dest` on `target`.
    ///
    /// The destination rectangle is `src` moved to `dest`. Neither rectangle
    /// is clipped here. On success the upload stays in flight until the
    /// connection sees its completion; if the transport rejects the request
    /// the upload is ended again before the error is returned.
    ///
    /// # Panics
    /// If the buffer has been released.
    pub fn dispatch_upload(
        self: &Arc<Self>,
        uploader: UploaderId,
        target: UploadTarget,
        dest: Point,
        src: Rectangle,
        sender: Arc<dyn CompletionSender>,
    ) -> Result<Sequence, TransportError> {
        let dst = src.translate_to(dest);
        self.begin_upload();

        let request = PutImage::new(target, self.id, self.size, src, dst);
        let transport = self.connection.transport();

        let issued = self
            .connection
            .pending()
            .issue(self, uploader, sender, || transport.put_image(&request));

        match issued {
            Ok(sequence) => {
                tracing::debug!(
                    buffer = %self.id,
                    uploader = %uploader,
                    sequence = %sequence,
                    src = %src,
                    dst = %dst,
                    "Upload dispatched"
                );
                Ok(sequence)
            }
            Err(e) => {
                self.end_upload();
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for SharedPixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPixelBuffer")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("state", &*lock(&self.state))
            .finish()
    }
}
