// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmpix demo` command - Drive a buffer through upload rounds.
//!
//! A tokio task plays the connection's event thread: it drains finished
//! requests from the loopback server and hands them to the connection. Each
//! round issues overlapping uploads, waits for their events and checks that
//! the server saw transfer order while the application gets native order
//! back.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use shmpix_core::stats::{BufferStats, ConnectionStats};
use shmpix_core::{
    ByteOrder, Config, ConfigLoader, Connection, DrawableId, GContextId, LoopbackTransport,
    PixelBuffer, Point, UploadTarget, UploadedEvent, UploaderId,
};
use tokio::sync::{mpsc, oneshot};

/// Completions are polled this often.
const PUMP_INTERVAL: Duration = Duration::from_millis(1);

/// Give up on a round after this long.
const ROUND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DemoOptions {
    pub width: i32,
    pub height: i32,
    pub rounds: u32,
    pub concurrency: u32,
    pub json: bool,
}

#[derive(Serialize)]
struct DemoReport {
    rounds: u32,
    uploads: u64,
    elapsed_ms: u128,
    buffer: BufferStats,
    connection: ConnectionStats,
}

pub async fn execute(
    config_path: Option<&str>,
    options: DemoOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_file(path)?,
        None => Config::default(),
    };

    let transport = Arc::new(LoopbackTransport::new());
    let connection = Connection::new(transport.clone(), config.connection);

    let (stop_tx, stop_rx) = oneshot::channel();
    let pump = tokio::spawn(pump_completions(
        transport.clone(),
        connection.clone(),
        stop_rx,
    ));

    let mut buffer = connection.new_buffer(Point::new(options.width, options.height))?;
    let native = paint_gradient(&mut buffer);
    tracing::info!(
        buffer = %buffer.id(),
        size = %buffer.size(),
        rounds = options.rounds,
        concurrency = options.concurrency,
        "Starting demo"
    );

    let target = UploadTarget::new(DrawableId::new(1), GContextId::new(1), 24);
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<UploadedEvent>();
    let event_tx = Arc::new(event_tx);
    let started = Instant::now();

    for round in 0..options.rounds {
        for n in 0..options.concurrency {
            let uploader = uploader_id(round, options.concurrency, n);
            let dest = destination(n, options.width)
                .ok_or_else(|| format!("uploader {} lands outside the coordinate space", n))?;
            buffer.upload(uploader, target, dest, buffer.bounds(), event_tx.clone())?;
        }

        for _ in 0..options.concurrency {
            match tokio::time::timeout(ROUND_TIMEOUT, event_rx.recv()).await {
                Ok(Some(event)) => {
                    tracing::debug!(
                        uploader = %event.uploader,
                        sequence = %event.sequence,
                        "Upload completed"
                    );
                }
                Ok(None) => return Err("completion channel closed".into()),
                Err(_) => return Err(format!("round {} timed out", round).into()),
            }
        }

        if buffer.byte_order() != ByteOrder::Native {
            return Err(format!("round {}: buffer left in transfer order", round).into());
        }
        if buffer.pixels().as_bytes() != native.as_slice() {
            return Err(format!("round {}: pixels changed across uploads", round).into());
        }
        for image in transport.take_received() {
            if image.native_pixels() != native {
                return Err(format!(
                    "round {}: server received wrong bytes for sequence {}",
                    round, image.sequence
                )
                .into());
            }
        }
    }

    let elapsed = started.elapsed();
    let buffer_stats = buffer.stats();
    let id = buffer.id();
    buffer.release();

    if connection.lookup_buffer(id).is_some() || transport.attached_count() != 0 {
        return Err(format!("{} still attached after release", id).into());
    }

    let _ = stop_tx.send(());
    pump.await?;

    let report = DemoReport {
        rounds: options.rounds,
        uploads: buffer_stats.uploads_begun,
        elapsed_ms: elapsed.as_millis(),
        buffer: buffer_stats,
        connection: connection.stats(),
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Deliver finished requests until told to stop.
async fn pump_completions(
    transport: Arc<LoopbackTransport>,
    connection: Connection,
    mut stop: oneshot::Receiver<()>,
) {
    let mut interval = tokio::time::interval(PUMP_INTERVAL);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = interval.tick() => {
                for sequence in transport.drain_completed() {
                    connection.handle_completion(sequence);
                }
            }
        }
    }
    tracing::debug!("Completion pump stopped");
}

fn uploader_id(round: u32, concurrency: u32, n: u32) -> UploaderId {
    UploaderId::new(u64::from(round) * u64::from(concurrency) + u64::from(n))
}

/// Uploaders are tiled side by side along the x axis.
fn destination(n: u32, width: i32) -> Option<Point> {
    let x = i32::try_from(n).ok()?.checked_mul(width)?;
    Some(Point::new(x, 0))
}

/// Paint a gradient and return the native-order bytes.
fn paint_gradient(buffer: &mut PixelBuffer) -> Vec<u8> {
    let mut view = buffer.pixels();
    let size = view.size();
    for y in 0..size.y {
        for x in 0..size.x {
            let r = (x * 255 / size.x.max(1)) as u8;
            let g = (y * 255 / size.y.max(1)) as u8;
            view.set(x, y, [r, g, 0x40, 0xff]);
        }
    }
    view.as_bytes().to_vec()
}

fn print_report(report: &DemoReport) {
    println!("✓ Demo completed");
    println!();
    println!("Uploads:");
    println!("  Rounds:             {}", report.rounds);
    println!("  Uploads:            {}", report.uploads);
    println!("  Elapsed:            {}ms", report.elapsed_ms);
    println!("  Swizzles:           {}", report.buffer.swizzles);
    println!("  Unswizzles:         {}", report.buffer.unswizzles);
    println!();
    println!("Connection:");
    println!("  Buffers Created:    {}", report.connection.buffers_created);
    println!("  Buffers Cleaned Up: {}", report.connection.buffers_cleaned_up);
    println!("  Completions:        {}", report.connection.completions_delivered);
    println!("  Live Buffers:       {}", report.connection.live_buffers);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploader_ids_do_not_overflow() {
        assert_eq!(uploader_id(2, 4, 3), UploaderId::new(11));
        let last = uploader_id(u32::MAX, u32::MAX, u32::MAX - 1);
        assert_eq!(last, UploaderId::new(u64::MAX - u64::from(u32::MAX) - 1));
    }

    #[test]
    fn test_destination_rejects_overflow() {
        assert_eq!(destination(3, 64), Some(Point::new(192, 0)));
        assert_eq!(destination(2, i32::MAX), None);
        assert_eq!(destination(u32::MAX, 1), None);
    }
}
