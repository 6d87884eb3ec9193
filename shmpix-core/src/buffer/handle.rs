// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! PixelBuffer - the application's handle to a shared pixel buffer.

use std::sync::Arc;

use crate::buffer::{PixelView, SharedPixelBuffer};
use crate::completion::CompletionSender;
use crate::error::ShmpixResult;
use crate::geometry::{Point, Rectangle};
use crate::stats::BufferStats;
use crate::swizzle::ByteOrder;
use crate::transport::UploadTarget;
use crate::types::{SegmentId, Sequence, UploaderId};

/// Unique owner of a shared pixel buffer.
///
/// There is exactly one handle per buffer. Dropping it releases the buffer,
/// so a [`PixelView`] can never outlive the mapping it borrows.
pub struct PixelBuffer {
    shared: Arc<SharedPixelBuffer>,
    /// Cleared by `into_shared`, which hands release over to the caller.
    release_on_drop: bool,
}

impl PixelBuffer {
    pub(crate) fn new(shared: Arc<SharedPixelBuffer>) -> Self {
        Self {
            shared,
            release_on_drop: true,
        }
    }

    pub fn id(&self) -> SegmentId {
        self.shared.id()
    }

    /// Name of the backing shared memory object.
    pub fn segment_name(&self) -> &str {
        self.shared.segment_name()
    }

    pub fn size(&self) -> Point {
        self.shared.size()
    }

    pub fn bounds(&self) -> Rectangle {
        self.shared.bounds()
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.shared.byte_order()
    }

    pub fn stats(&self) -> BufferStats {
        self.shared.stats()
    }

    /// Direct access to the pixel memory.
    ///
    /// While an upload is in flight the bytes are in transfer order. The view
    /// holds the buffer's memory lock, so completions that would swap the
    /// order back wait until it is dropped; do not deliver completions on
    /// this thread while holding one.
    pub fn pixels(&mut self) -> PixelView<'_> {
        self.shared.view()
    }

    /// Upload `src` to `dest` on `target`.
    ///
    /// `sender` receives an [`UploadedEvent`](crate::completion::UploadedEvent)
    /// once the server is done reading.
    pub fn upload(
        &self,
        uploader: UploaderId,
        target: UploadTarget,
        dest: Point,
        src: Rectangle,
        sender: Arc<dyn CompletionSender>,
    ) -> ShmpixResult<Sequence> {
        let sequence = self
            .shared
            .dispatch_upload(uploader, target, dest, src, sender)?;
        Ok(sequence)
    }

    /// Release the buffer. Same as dropping the handle.
    pub fn release(self) {
        drop(self);
    }

    /// Give up the handle without releasing the buffer.
    ///
    /// The caller becomes responsible for releasing it exactly once.
    pub(crate) fn into_shared(mut self) -> Arc<SharedPixelBuffer> {
        self.release_on_drop = false;
        Arc::clone(&self.shared)
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        if self.release_on_drop {
            self.shared.release();
        }
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PixelBuffer").field(&self.shared).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::connection::Connection;
    use crate::loopback::LoopbackTransport;

    fn connection() -> Connection {
        Connection::new(Arc::new(LoopbackTransport::new()), ConnectionConfig::default())
    }

    #[test]
    fn test_into_shared_keeps_buffer_alive() {
        let connection = connection();
        let shared = connection.new_buffer(Point::new(2, 2)).unwrap().into_shared();

        assert!(!shared.is_released());
        assert_eq!(connection.buffer_count(), 1);

        shared.release();
        assert!(shared.is_cleaned_up());
    }

    #[test]
    fn test_drop_releases_once() {
        let connection = connection();
        let buffer = connection.new_buffer(Point::new(2, 2)).unwrap();
        let shared = connection.lookup_buffer(buffer.id()).unwrap();

        drop(buffer);

        assert!(shared.is_cleaned_up());
        assert_eq!(connection.buffer_count(), 0);
    }
}
