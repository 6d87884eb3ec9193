// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Completion plumbing.
//!
//! Every dispatched upload leaves a record keyed by its request sequence
//! number. When the server reports completion for a sequence number, the
//! record is taken, the buffer is told one upload ended, and the event is
//! delivered to whoever asked for the upload.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::buffer::SharedPixelBuffer;
use crate::error::TransportError;
use crate::sync::lock;
use crate::types::{SegmentId, Sequence, UploaderId};

/// Delivered once an upload has been consumed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedEvent {
    pub buffer: SegmentId,
    pub uploader: UploaderId,
    pub sequence: Sequence,
}

/// Destination for [`UploadedEvent`]s.
pub trait CompletionSender: Send + Sync {
    fn send(&self, event: UploadedEvent);
}

impl CompletionSender for std::sync::mpsc::Sender<UploadedEvent> {
    fn send(&self, event: UploadedEvent) {
        if std::sync::mpsc::Sender::send(self, event).is_err() {
            tracing::debug!(buffer = %event.buffer, "Completion receiver dropped");
        }
    }
}

impl CompletionSender for tokio::sync::mpsc::UnboundedSender<UploadedEvent> {
    fn send(&self, event: UploadedEvent) {
        if tokio::sync::mpsc::UnboundedSender::send(self, event).is_err() {
            tracing::debug!(buffer = %event.buffer, "Completion receiver dropped");
        }
    }
}

/// One in-flight upload.
pub(crate) struct Completion {
    pub(crate) buffer: Arc<SharedPixelBuffer>,
    pub(crate) sender: Arc<dyn CompletionSender>,
    pub(crate) event: UploadedEvent,
}

impl Completion {
    /// End the upload on its buffer, then notify the requester.
    pub(crate) fn deliver(self) {
        self.buffer.end_upload();
        self.sender.send(self.event);
    }
}

/// In-flight uploads of one connection, keyed by sequence number.
#[derive(Default)]
pub struct PendingUploads {
    records: Mutex<HashMap<Sequence, Completion>>,
}

impl PendingUploads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a request and record its completion under one lock.
    ///
    /// Holding the lock across `issue` means a completion for the returned
    /// sequence number cannot be looked up before the record exists.
    pub(crate) fn issue<F>(
        &self,
        buffer: &Arc<SharedPixelBuffer>,
        uploader: UploaderId,
        sender: Arc<dyn CompletionSender>,
        issue: F,
    ) -> Result<Sequence, TransportError>
    where
        F: FnOnce() -> Result<Sequence, TransportError>,
    {
        let mut records = lock(&self.records);
        let sequence = issue()?;
        let event = UploadedEvent {
            buffer: buffer.id(),
            uploader,
            sequence,
        };
        let previous = records.insert(
            sequence,
            Completion {
                buffer: Arc::clone(buffer),
                sender,
                event,
            },
        );
        if let Some(stale) = previous {
            // The server never answered a request 64k sequence numbers ago.
            tracing::warn!(
                sequence = %sequence,
                buffer = %stale.event.buffer,
                "Replacing stale pending upload with reused sequence number"
            );
        }
        Ok(sequence)
    }

    /// Remove every record issued no later than `sequence`, oldest first.
    pub(crate) fn take_through(&self, sequence: Sequence) -> Vec<Completion> {
        let mut records = lock(&self.records);
        let due: Vec<Sequence> = records
            .keys()
            .copied()
            .filter(|k| k.precedes_or_equals(sequence))
            .collect();
        let mut taken: Vec<Completion> = due
            .into_iter()
            .filter_map(|k| records.remove(&k))
            .collect();
        drop(records);

        taken.sort_by_key(|c| {
            std::cmp::Reverse(sequence.value().wrapping_sub(c.event.sequence.value()))
        });
        taken
    }

    /// Number of uploads awaiting completion.
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for PendingUploads {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingUploads")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_std_sender_delivers() {
        let (tx, rx) = std::sync::mpsc::channel::<UploadedEvent>();
        let event = UploadedEvent {
            buffer: SegmentId::new(1),
            uploader: UploaderId::new(2),
            sequence: Sequence::new(3),
        };
        CompletionSender::send(&tx, event);
        assert_eq!(rx.recv().unwrap(), event);
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<UploadedEvent>();
        drop(rx);
        CompletionSender::send(
            &tx,
            UploadedEvent {
                buffer: SegmentId::new(1),
                uploader: UploaderId::new(1),
                sequence: Sequence::new(1),
            },
        );
    }
}
