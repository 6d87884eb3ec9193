//! Shmpix Core Library
//!
//! Client-side shared-memory pixel buffers for a display server that reads
//! images straight out of attached segments. Provides buffer lifecycle with
//! deferred release, native/transfer byte-order conversion around uploads,
//! completion routing, configuration parsing, and an in-process loopback
//! server.

pub mod buffer;
pub mod completion;
pub mod config;
pub mod connection;
pub mod error;
pub mod geometry;
pub mod loopback;
pub mod shm;
pub mod stats;
pub mod swizzle;
pub mod transport;
pub mod types;

mod sync;

// Re-export commonly used types
pub use buffer::{PixelBuffer, PixelView, SharedPixelBuffer};
pub use completion::{CompletionSender, UploadedEvent};
pub use config::{Config, ConfigLoader, ConnectionConfig};
pub use connection::Connection;
pub use error::{HardValidationError, ShmpixError, ShmpixResult, TransportError};
pub use geometry::{Point, Rectangle};
pub use loopback::LoopbackTransport;
pub use swizzle::ByteOrder;
pub use transport::{Transport, UploadTarget};
pub use types::{DrawableId, GContextId, SegmentId, Sequence, UploaderId};
