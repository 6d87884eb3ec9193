// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Upload/release state machine.
//!
//! Pure bookkeeping for one buffer: how many uploads are in flight, whether
//! the owner released it, and whether teardown already ran. Every mutating
//! call returns a ticket naming the one piece of slow work (swizzle,
//! unswizzle, cleanup) the caller has won the right to perform. The caller
//! drops the lock and then redeems the ticket; nobody else holds it.

/// Work claimed by [`UploadState::begin`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginTicket {
    /// First upload in flight: convert the buffer to transfer order.
    Swizzle,
    /// Another upload already converted the buffer.
    Join,
}

/// Work claimed by [`UploadState::end`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndTicket {
    /// Other uploads are still reading the buffer.
    StillInFlight,
    /// Last upload finished on a live buffer: restore native order.
    Unswizzle,
    /// Last upload finished on a released buffer: tear it down.
    Cleanup,
}

/// Work claimed by [`UploadState::release`].
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseTicket {
    /// Nothing in flight: tear down now.
    Cleanup,
    /// Teardown will be claimed by the last [`UploadState::end`].
    Deferred,
    /// An earlier release already decided.
    AlreadyReleased,
}

/// The three scalars guarded by the buffer's lock.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadState {
    in_flight: u32,
    released: bool,
    cleaned_up: bool,
}

impl UploadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }

    /// Count one more upload in flight.
    ///
    /// # Panics
    /// If the buffer was already released.
    pub fn begin(&mut self) -> BeginTicket {
        if self.released {
            panic!("shmpix: Buffer upload called after Buffer release");
        }
        let ticket = if self.in_flight == 0 {
            BeginTicket::Swizzle
        } else {
            BeginTicket::Join
        };
        self.in_flight += 1;
        ticket
    }

    /// Count one upload as finished.
    ///
    /// # Panics
    /// If no upload is in flight.
    pub fn end(&mut self) -> EndTicket {
        if self.in_flight == 0 {
            panic!("shmpix: Buffer upload completed with no upload in flight");
        }
        self.in_flight -= 1;
        if self.in_flight != 0 {
            EndTicket::StillInFlight
        } else if self.released {
            EndTicket::Cleanup
        } else {
            EndTicket::Unswizzle
        }
    }

    pub fn release(&mut self) -> ReleaseTicket {
        let ticket = if self.released {
            ReleaseTicket::AlreadyReleased
        } else if self.in_flight == 0 {
            ReleaseTicket::Cleanup
        } else {
            ReleaseTicket::Deferred
        };
        self.released = true;
        ticket
    }

    /// Mark teardown as done. Returns false if it had already run.
    pub fn claim_cleanup(&mut self) -> bool {
        !std::mem::replace(&mut self.cleaned_up, true)
    }
}
