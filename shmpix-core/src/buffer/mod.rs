// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared pixel buffers.
//!
//! [`PixelBuffer`] is what the application holds. [`SharedPixelBuffer`] is
//! the part in-flight uploads keep alive until the server is done with it.

mod handle;
pub mod lifecycle;
mod pixels;
mod shared;

pub use handle::PixelBuffer;
pub use pixels::PixelView;
pub use shared::SharedPixelBuffer;
