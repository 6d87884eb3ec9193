// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shmpix Benchmarks
//!
//! Shared fixtures for the criterion benches: a loopback connection with one
//! painted buffer, and a synchronous completion pump.
//!
//! # Benchmark Categories
//!
//! - **Swizzle**: in-place byte-order conversion at various buffer sizes
//! - **Upload Cycle**: dispatch, server copy and completion of one or more
//!   overlapping uploads

use std::sync::mpsc;
use std::sync::Arc;

use shmpix_core::{
    Connection, ConnectionConfig, DrawableId, GContextId, LoopbackTransport, PixelBuffer, Point,
    ShmpixResult, UploadTarget, UploadedEvent,
};

/// A connection to the loopback server with one painted buffer.
pub struct UploadFixture {
    pub transport: Arc<LoopbackTransport>,
    pub connection: Connection,
    pub buffer: PixelBuffer,
    pub target: UploadTarget,
    pub sender: Arc<mpsc::Sender<UploadedEvent>>,
    pub events: mpsc::Receiver<UploadedEvent>,
}

impl UploadFixture {
    pub fn new(size: Point) -> ShmpixResult<Self> {
        let transport = Arc::new(LoopbackTransport::new());
        let connection = Connection::new(transport.clone(), ConnectionConfig::default());
        let mut buffer = connection.new_buffer(size)?;
        paint(&mut buffer);

        let (tx, rx) = mpsc::channel::<UploadedEvent>();
        Ok(Self {
            transport,
            connection,
            buffer,
            target: UploadTarget::new(DrawableId::new(1), GContextId::new(1), 24),
            sender: Arc::new(tx),
            events: rx,
        })
    }

    /// Deliver every finished request and drop what the server kept.
    pub fn pump(&self) -> usize {
        let delivered = self
            .transport
            .drain_completed()
            .into_iter()
            .map(|seq| self.connection.handle_completion(seq))
            .sum();
        self.transport.take_received();
        self.events.try_iter().for_each(drop);
        delivered
    }
}

/// Fill a buffer with a pattern that differs in every red/blue pair.
pub fn paint(buffer: &mut PixelBuffer) {
    let mut view = buffer.pixels();
    for (i, px) in view.as_bytes_mut().chunks_exact_mut(4).enumerate() {
        px.copy_from_slice(&[i as u8, (i >> 8) as u8, !(i as u8), 0xff]);
    }
}
