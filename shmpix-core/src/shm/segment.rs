//! ShmSegment - POSIX shared memory segment backing a pixel buffer.
//!
//! Provides safe abstraction over shm_open and mmap. The creating side owns
//! the name and unlinks it when the segment is closed; the display-server
//! side opens a second mapping of the same object by name.

use std::ffi::CString;
use std::os::fd::RawFd;
use std::ptr::NonNull;

use crate::error::SharedMemoryError;

/// A mapped shared memory segment.
///
/// Call [`close`](Self::close) to observe teardown failures. Dropping an
/// unclosed segment releases it as well and logs anything that goes wrong.
pub struct ShmSegment {
    /// Name of the shared memory object, without the leading slash.
    name: String,
    /// Pointer to the mapped memory.
    ptr: NonNull<u8>,
    /// Size of the mapped region in bytes.
    len: usize,
    /// File descriptor for the shared memory object.
    fd: RawFd,
    /// Whether this instance created the object (and should unlink it).
    is_owner: bool,
    closed: bool,
}

// SAFETY: ShmSegment owns its mapping; the pointer stays valid until close.
unsafe impl Send for ShmSegment {}

// SAFETY: the segment itself exposes no interior mutability. Writers go
// through raw pointers under the upload protocol of the owning buffer.
unsafe impl Sync for ShmSegment {}

impl ShmSegment {
    /// Create and map a new zero-filled segment.
    ///
    /// # Errors
    /// Returns SharedMemoryError if the name is taken or mapping fails.
    pub fn create(name: &str, len: usize) -> Result<Self, SharedMemoryError> {
        if len == 0 {
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: "Segment length cannot be zero".to_string(),
            });
        }
        if name.is_empty() {
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: "Name cannot be empty".to_string(),
            });
        }

        let c_name = Self::c_name(name).map_err(|reason| SharedMemoryError::CreateFailed {
            name: name.to_string(),
            reason,
        })?;

        // SAFETY: c_name is a valid CString, flags are valid POSIX flags
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };
        if fd < 0 {
            let errno = std::io::Error::last_os_error();
            let reason = if errno.raw_os_error() == Some(libc::EEXIST) {
                "Shared memory already exists".to_string()
            } else {
                format!("shm_open failed: {}", errno)
            };
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason,
            });
        }

        // SAFETY: fd is a valid file descriptor
        let result = unsafe { libc::ftruncate(fd, len as libc::off_t) };
        if result < 0 {
            let errno = std::io::Error::last_os_error();
            // SAFETY: fd is open and the name was created above
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(SharedMemoryError::CreateFailed {
                name: name.to_string(),
                reason: format!("ftruncate failed: {}", errno),
            });
        }

        let ptr = match Self::map(fd, len) {
            Ok(ptr) => ptr,
            Err(e) => {
                // SAFETY: fd is open and the name was created above
                unsafe {
                    libc::close(fd);
                    libc::shm_unlink(c_name.as_ptr());
                }
                return Err(e);
            }
        };

        // SAFETY: ptr maps len writable bytes
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr(), 0, len);
        }

        tracing::debug!(name = %name, len = len, "Created shared memory segment");

        Ok(Self {
            name: name.to_string(),
            ptr,
            len,
            fd,
            is_owner: true,
            closed: false,
        })
    }

    /// Map an existing segment created elsewhere.
    pub fn open(name: &str, len: usize) -> Result<Self, SharedMemoryError> {
        if len == 0 {
            return Err(SharedMemoryError::OpenFailed {
                name: name.to_string(),
                reason: "Segment length cannot be zero".to_string(),
            });
        }

        let c_name = Self::c_name(name).map_err(|reason| SharedMemoryError::OpenFailed {
            name: name.to_string(),
            reason,
        })?;

        // SAFETY: c_name is a valid CString
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(SharedMemoryError::OpenFailed {
                name: name.to_string(),
                reason: format!("shm_open failed: {}", std::io::Error::last_os_error()),
            });
        }

        let ptr = match Self::map(fd, len) {
            Ok(ptr) => ptr,
            Err(e) => {
                // SAFETY: fd was opened above
                unsafe { libc::close(fd) };
                return Err(e);
            }
        };

        tracing::debug!(name = %name, len = len, "Opened shared memory segment");

        Ok(Self {
            name: name.to_string(),
            ptr,
            len,
            fd,
            is_owner: false,
            closed: false,
        })
    }

    fn c_name(name: &str) -> Result<CString, String> {
        CString::new(format!("/{}", name)).map_err(|e| format!("Invalid name: {}", e))
    }

    fn map(fd: RawFd, len: usize) -> Result<NonNull<u8>, SharedMemoryError> {
        // SAFETY: fd is valid, offset 0 is valid, len is non-zero
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(SharedMemoryError::MapFailed {
                reason: format!("mmap failed: {}", std::io::Error::last_os_error()),
            });
        }
        NonNull::new(ptr as *mut u8).ok_or_else(|| SharedMemoryError::MapFailed {
            reason: "mmap returned a null mapping".to_string(),
        })
    }

    /// Get the name of this segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the length of the mapping in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether this mapping created the segment.
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Get a raw pointer to the mapping.
    ///
    /// Valid until the segment is closed or dropped.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Get a slice view of the mapping.
    ///
    /// # Safety
    /// Caller must ensure no concurrent writes to the accessed region.
    pub unsafe fn as_slice(&self) -> &[u8] {
        std::slice::from_raw_parts(self.ptr.as_ptr(), self.len)
    }

    /// Unmap, close and (for the owner) unlink the segment.
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned.
    pub fn close(mut self) -> Result<(), SharedMemoryError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), SharedMemoryError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // SAFETY: ptr and len describe the mapping made at construction and
        // it has not been unmapped yet.
        let unmapped = unsafe { nix::sys::mman::munmap(self.ptr.cast(), self.len) }.map_err(
            |errno| SharedMemoryError::UnmapFailed {
                reason: format!("munmap {}: {}", self.name, errno),
            },
        );

        if let Err(errno) = nix::unistd::close(self.fd) {
            tracing::warn!(name = %self.name, error = %errno, "Failed to close segment descriptor");
        }

        let unlinked = if self.is_owner {
            let result = nix::sys::mman::shm_unlink(format!("/{}", self.name).as_str()).map_err(
                |errno| SharedMemoryError::UnlinkFailed {
                    name: self.name.clone(),
                    reason: errno.to_string(),
                },
            );
            if result.is_ok() {
                tracing::debug!(name = %self.name, "Unlinked shared memory segment");
            }
            result
        } else {
            Ok(())
        };

        unmapped.and(unlinked)
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::error!(name = %self.name, error = %e, "Failed to release shared memory segment");
        }
    }
}

impl std::fmt::Debug for ShmSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShmSegment")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("is_owner", &self.is_owner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("shmpix-test-{}-{}", tag, std::process::id())
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(ShmSegment::create(&unique_name("zero"), 0).is_err());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(ShmSegment::create("", 64).is_err());
    }

    #[test]
    fn test_second_mapping_sees_writes() {
        let name = unique_name("alias");
        let owner = ShmSegment::create(&name, 64).unwrap();
        let peer = ShmSegment::open(&name, 64).unwrap();
        assert!(owner.is_owner());
        assert!(!peer.is_owner());

        // SAFETY: both mappings are 64 bytes; no other thread touches them.
        unsafe {
            *owner.as_ptr().add(5) = 0xAB;
            assert_eq!(peer.as_slice()[5], 0xAB);
        }

        peer.close().unwrap();
        owner.close().unwrap();
    }

    #[test]
    fn test_name_is_taken_until_closed() {
        let name = unique_name("taken");
        let first = ShmSegment::create(&name, 64).unwrap();
        assert!(ShmSegment::create(&name, 64).is_err());
        first.close().unwrap();

        let again = ShmSegment::create(&name, 64).unwrap();
        again.close().unwrap();
    }

    #[test]
    fn test_open_after_unlink_fails() {
        let name = unique_name("gone");
        ShmSegment::create(&name, 64).unwrap().close().unwrap();
        assert!(ShmSegment::open(&name, 64).is_err());
    }
}
