// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters for one buffer.
#[derive(Debug, Default)]
pub struct BufferCounters {
    swizzles: AtomicU64,
    unswizzles: AtomicU64,
    uploads_begun: AtomicU64,
    uploads_ended: AtomicU64,
}

impl BufferCounters {
    pub(crate) fn record_swizzle(&self) {
        self.swizzles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unswizzle(&self) {
        self.unswizzles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_begin(&self) {
        self.uploads_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_end(&self) {
        self.uploads_ended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BufferStats {
        BufferStats {
            swizzles: self.swizzles.load(Ordering::Relaxed),
            unswizzles: self.unswizzles.load(Ordering::Relaxed),
            uploads_begun: self.uploads_begun.load(Ordering::Relaxed),
            uploads_ended: self.uploads_ended.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`BufferCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferStats {
    pub swizzles: u64,
    pub unswizzles: u64,
    pub uploads_begun: u64,
    pub uploads_ended: u64,
}

/// Connection-wide statistics, written out by `shmpix demo --json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub live_buffers: usize,
    pub pending_uploads: usize,
    pub buffers_created: u64,
    pub buffers_cleaned_up: u64,
    pub completions_delivered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_records() {
        let counters = BufferCounters::default();
        counters.record_begin();
        counters.record_begin();
        counters.record_swizzle();
        counters.record_end();

        let stats = counters.snapshot();
        assert_eq!(stats.uploads_begun, 2);
        assert_eq!(stats.uploads_ended, 1);
        assert_eq!(stats.swizzles, 1);
        assert_eq!(stats.unswizzles, 0);
    }

    #[test]
    fn test_connection_stats_serialize() {
        let stats = ConnectionStats {
            live_buffers: 1,
            completions_delivered: 8,
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"completions_delivered\":8"));
    }
}
