// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared memory module.
//!
//! Zero-copy pixel transfer to the display server using POSIX shared memory.

mod segment;

pub use segment::ShmSegment;
