// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Connection - per-display-server bookkeeping.
//!
//! Allocates and attaches buffer segments, keeps the segment→buffer registry
//! and the pending-upload table, and turns completion notifications back
//! into `end_upload` calls and [`UploadedEvent`](crate::completion::UploadedEvent)s.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::buffer::{PixelBuffer, SharedPixelBuffer};
use crate::completion::PendingUploads;
use crate::config::ConnectionConfig;
use crate::error::{HardValidationError, ShmpixResult};
use crate::geometry::Point;
use crate::shm::ShmSegment;
use crate::stats::ConnectionStats;
use crate::swizzle::BYTES_PER_PIXEL;
use crate::transport::Transport;
use crate::types::{SegmentId, Sequence};

/// Disambiguates segment names between connections in one process.
static NEXT_SEGMENT_NAME: AtomicU64 = AtomicU64::new(0);

/// Cheaply cloneable handle to one display-server connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    transport: Arc<dyn Transport>,
    config: ConnectionConfig,
    pending: PendingUploads,
    buffers: DashMap<SegmentId, Weak<SharedPixelBuffer>>,
    buffers_created: AtomicU64,
    buffers_cleaned_up: AtomicU64,
    completions_delivered: AtomicU64,
}

impl Connection {
    pub fn new(transport: Arc<dyn Transport>, config: ConnectionConfig) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                transport,
                config,
                pending: PendingUploads::new(),
                buffers: DashMap::new(),
                buffers_created: AtomicU64::new(0),
                buffers_cleaned_up: AtomicU64::new(0),
                completions_delivered: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub(crate) fn pending(&self) -> &PendingUploads {
        &self.inner.pending
    }

    /// Allocate, attach and register a new buffer of `size` pixels.
    pub fn new_buffer(&self, size: Point) -> ShmpixResult<PixelBuffer> {
        let len = self.validate_size(size)?;

        let name = format!(
            "{}-{}-{}",
            self.inner.config.segment_prefix,
            std::process::id(),
            NEXT_SEGMENT_NAME.fetch_add(1, Ordering::Relaxed)
        );
        let segment = ShmSegment::create(&name, len)?;
        // On failure the segment is dropped, which unmaps and unlinks it.
        let id = self.inner.transport.attach_segment(&segment)?;

        let shared = Arc::new(SharedPixelBuffer::new(id, size, segment, self.clone()));
        if self
            .inner
            .buffers
            .insert(id, Arc::downgrade(&shared))
            .is_some()
        {
            tracing::warn!(buffer = %id, "Transport reused a live segment id");
        }
        self.inner.buffers_created.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(buffer = %id, name = %name, size = %size, "Buffer created");

        Ok(PixelBuffer::new(shared))
    }

    fn validate_size(&self, size: Point) -> Result<usize, HardValidationError> {
        let max_side = self.inner.config.max_side;
        if size.x <= 0 || size.y <= 0 || size.x > max_side || size.y > max_side {
            return Err(HardValidationError::InvalidBufferSize {
                width: size.x,
                height: size.y,
                reason: format!("each side must be between 1 and {}", max_side),
            });
        }

        let len = size.x as usize * size.y as usize * BYTES_PER_PIXEL;
        if len > self.inner.config.max_segment_bytes {
            return Err(HardValidationError::InvalidBufferSize {
                width: size.x,
                height: size.y,
                reason: format!(
                    "{} bytes exceeds the {} byte segment limit",
                    len, self.inner.config.max_segment_bytes
                ),
            });
        }
        Ok(len)
    }

    /// Handle a completion notification for `sequence`.
    ///
    /// Every pending upload issued no later than `sequence` is finished, oldest
    /// first. Returns how many were.
    pub fn handle_completion(&self, sequence: Sequence) -> usize {
        let due = self.inner.pending.take_through(sequence);
        let count = due.len();

        // Buffers may be torn down from here; the pending lock is not held.
        for completion in due {
            completion.deliver();
        }

        if count == 0 {
            tracing::trace!(sequence = %sequence, "Completion matched no pending upload");
        }
        self.inner
            .completions_delivered
            .fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Live buffer registered for `id`, if any.
    pub fn lookup_buffer(&self, id: SegmentId) -> Option<Arc<SharedPixelBuffer>> {
        self.inner.buffers.get(&id).and_then(|weak| weak.upgrade())
    }

    /// Called by a buffer's cleanup.
    pub(crate) fn forget_buffer(&self, id: SegmentId) {
        if self.inner.buffers.remove(&id).is_some() {
            self.inner.buffers_cleaned_up.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Buffers created and not yet cleaned up.
    pub fn buffer_count(&self) -> usize {
        self.inner.buffers.len()
    }

    pub fn pending_uploads(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            live_buffers: self.buffer_count(),
            pending_uploads: self.pending_uploads(),
            buffers_created: self.inner.buffers_created.load(Ordering::Relaxed),
            buffers_cleaned_up: self.inner.buffers_cleaned_up.load(Ordering::Relaxed),
            completions_delivered: self.inner.completions_delivered.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.inner.config)
            .field("buffers", &self.buffer_count())
            .field("pending", &self.inner.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::UploadedEvent;
    use crate::error::ShmpixError;
    use crate::geometry::Rectangle;
    use crate::loopback::LoopbackTransport;
    use crate::transport::UploadTarget;
    use crate::types::{DrawableId, GContextId, UploaderId};

    fn connection() -> (Arc<LoopbackTransport>, Connection) {
        let transport = Arc::new(LoopbackTransport::new());
        let connection = Connection::new(transport.clone(), ConnectionConfig::default());
        (transport, connection)
    }

    fn target() -> UploadTarget {
        UploadTarget::new(DrawableId::new(10), GContextId::new(20), 24)
    }

    #[test]
    fn test_new_buffer_registers() {
        let (transport, connection) = connection();
        let buffer = connection.new_buffer(Point::new(8, 4)).unwrap();

        assert_eq!(connection.buffer_count(), 1);
        assert_eq!(transport.attached_count(), 1);
        assert!(connection.lookup_buffer(buffer.id()).is_some());

        let id = buffer.id();
        buffer.release();
        assert_eq!(connection.buffer_count(), 0);
        assert!(connection.lookup_buffer(id).is_none());
        assert_eq!(connection.stats().buffers_cleaned_up, 1);
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        let (_transport, connection) = connection();
        for size in [Point::new(0, 4), Point::new(4, -1), Point::new(0x8000, 1)] {
            let err = connection.new_buffer(size).unwrap_err();
            assert!(matches!(err, ShmpixError::HardValidation(_)));
        }
    }

    #[test]
    fn test_segment_byte_limit() {
        let transport = Arc::new(LoopbackTransport::new());
        let config = ConnectionConfig {
            max_segment_bytes: 1024,
            ..ConnectionConfig::default()
        };
        let connection = Connection::new(transport, config);

        assert!(connection.new_buffer(Point::new(16, 16)).is_ok());
        assert!(connection.new_buffer(Point::new(16, 17)).is_err());
    }

    #[test]
    fn test_completion_delivers_event() {
        let (_transport, connection) = connection();
        let buffer = connection.new_buffer(Point::new(4, 4)).unwrap();
        let (tx, rx) = std::sync::mpsc::channel::<UploadedEvent>();

        let seq = buffer
            .upload(
                UploaderId::new(5),
                target(),
                Point::new(1, 1),
                buffer.bounds(),
                Arc::new(tx),
            )
            .unwrap();
        assert_eq!(connection.pending_uploads(), 1);

        assert_eq!(connection.handle_completion(seq), 1);
        assert_eq!(connection.pending_uploads(), 0);
        assert_eq!(
            rx.try_recv().unwrap(),
            UploadedEvent {
                buffer: buffer.id(),
                uploader: UploaderId::new(5),
                sequence: seq,
            }
        );
    }

    #[test]
    fn test_completion_covers_earlier_sequences() {
        let (_transport, connection) = connection();
        let buffer = connection.new_buffer(Point::new(4, 4)).unwrap();
        let (tx, rx) = std::sync::mpsc::channel::<UploadedEvent>();
        let tx = Arc::new(tx);

        let seqs: Vec<_> = (0..3)
            .map(|i| {
                buffer
                    .upload(
                        UploaderId::new(i),
                        target(),
                        Point::ZERO,
                        Rectangle::from_coords(0, 0, 2, 2),
                        tx.clone(),
                    )
                    .unwrap()
            })
            .collect();

        assert_eq!(connection.handle_completion(seqs[1]), 2);
        assert_eq!(buffer.stats().uploads_ended, 2);
        assert_eq!(rx.try_recv().unwrap().sequence, seqs[0]);
        assert_eq!(rx.try_recv().unwrap().sequence, seqs[1]);

        assert_eq!(connection.handle_completion(seqs[2]), 1);
        assert_eq!(buffer.stats().unswizzles, 1);
    }

    #[test]
    fn test_unknown_completion_ignored() {
        let (_transport, connection) = connection();
        assert_eq!(connection.handle_completion(Sequence::new(77)), 0);
    }

    #[test]
    fn test_release_with_pending_upload_defers_to_completion() {
        let (transport, connection) = connection();
        let buffer = connection.new_buffer(Point::new(4, 4)).unwrap();
        let (tx, _rx) = std::sync::mpsc::channel::<UploadedEvent>();

        let seq = buffer
            .upload(
                UploaderId::new(1),
                target(),
                Point::ZERO,
                buffer.bounds(),
                Arc::new(tx),
            )
            .unwrap();
        buffer.release();

        assert_eq!(connection.buffer_count(), 1);
        assert!(transport.detached().is_empty());

        connection.handle_completion(seq);
        assert_eq!(connection.buffer_count(), 0);
        assert_eq!(transport.detached().len(), 1);
    }
}
