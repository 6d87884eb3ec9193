// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Display-server transport seam.
//!
//! The connection to the display server is external to this crate. The core
//! only needs three requests from it: attach a segment, put an image out of an
//! attached segment, and detach a segment.

use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::geometry::{Point, Rectangle};
use crate::shm::ShmSegment;
use crate::types::{DrawableId, GContextId, SegmentId, Sequence};

/// Pixel layout of a transferred image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Packed pixels, one scanline after another.
    ZPixmap,
}

/// Where an upload lands on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTarget {
    pub drawable: DrawableId,
    pub gcontext: GContextId,
    pub depth: u8,
}

impl UploadTarget {
    pub const fn new(drawable: DrawableId, gcontext: GContextId, depth: u8) -> Self {
        Self {
            drawable,
            gcontext,
            depth,
        }
    }
}

/// A shared-memory PutImage request.
///
/// Field widths follow the wire protocol. Values are truncated into them as
/// is; nothing here clamps a rectangle to the buffer or the drawable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutImage {
    pub drawable: DrawableId,
    pub gcontext: GContextId,
    pub total_width: u16,
    pub total_height: u16,
    pub src_x: u16,
    pub src_y: u16,
    pub src_width: u16,
    pub src_height: u16,
    pub dst_x: i16,
    pub dst_y: i16,
    pub depth: u8,
    pub format: ImageFormat,
    /// Ask the server for a completion event.
    pub send_event: bool,
    pub segment: SegmentId,
    pub offset: u32,
}

impl PutImage {
    /// Build the request that copies `src` of a `total`-sized buffer to `dst` on the target.
    pub fn new(
        target: UploadTarget,
        segment: SegmentId,
        total: Point,
        src: Rectangle,
        dst: Rectangle,
    ) -> Self {
        Self {
            drawable: target.drawable,
            gcontext: target.gcontext,
            total_width: total.x as u16,
            total_height: total.y as u16,
            src_x: src.min.x as u16,
            src_y: src.min.y as u16,
            src_width: dst.dx() as u16,
            src_height: dst.dy() as u16,
            dst_x: dst.min.x as i16,
            dst_y: dst.min.y as i16,
            depth: target.depth,
            format: ImageFormat::ZPixmap,
            send_event: true,
            segment,
            offset: 0,
        }
    }

    /// Source rectangle in buffer coordinates.
    pub fn src_rect(&self) -> Rectangle {
        let min = Point::new(i32::from(self.src_x), i32::from(self.src_y));
        Rectangle::new(
            min,
            min + Point::new(i32::from(self.src_width), i32::from(self.src_height)),
        )
    }
}

/// Requests the core issues to the display server.
pub trait Transport: Send + Sync {
    /// Make the segment visible to the server and return its id.
    fn attach_segment(&self, segment: &ShmSegment) -> Result<SegmentId, TransportError>;

    /// Issue a PutImage out of an attached segment.
    ///
    /// The returned sequence number is what the completion event will carry.
    fn put_image(&self, request: &PutImage) -> Result<Sequence, TransportError>;

    /// Tell the server to drop its reference to the segment.
    fn detach_segment(&self, segment: SegmentId) -> Result<(), TransportError>;
}
