//! Low-level POSIX shared memory regions

use crate::error::{ChatError, Result};
use rustix::fd::OwnedFd;
use rustix::fs::ftruncate;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use rustix::shm::{shm_open, shm_unlink, Mode, ShmOFlags};
use std::ffi::CString;
use std::ptr::NonNull;

/// Longest name accepted by the shm namespace (NAME_MAX)
const MAX_NAME_LEN: usize = 255;

/// Whether dropping a region removes its name from the system
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Created by this process; unlinked on drop
    Owner,
    /// The peer's region; only unmapped on drop
    Attached,
}

/// Handle to a mapped shared memory region
pub struct SharedRegion {
    #[allow(dead_code)]
    fd: OwnedFd,
    addr: NonNull<u8>,
    size: usize,
    name: String,
    ownership: Ownership,
}

// SAFETY: the mapping stays valid for the lifetime of the handle and
// concurrent access to its contents goes through the mailbox sentinel
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Map a named shared memory region of exactly `size` bytes
    ///
    /// The region is created if it does not exist yet. The same process may
    /// call this for several names; each gets its own descriptor and mapping.
    ///
    /// # Arguments
    /// * `name` - Full shm name, slash-prefixed (e.g. "/1234-chat")
    /// * `size` - Size in bytes
    /// * `ownership` - Whether drop should unlink the name
    pub fn open_or_create(name: &str, size: usize, ownership: Ownership) -> Result<Self> {
        if name.len() > MAX_NAME_LEN {
            return Err(ChatError::NameTooLong {
                max: MAX_NAME_LEN,
                got: name.len(),
            });
        }

        let c_name = CString::new(name).map_err(|_| ChatError::InvalidName(name.to_string()))?;

        let fd = shm_open(
            c_name.as_c_str(),
            ShmOFlags::CREATE | ShmOFlags::RDWR,
            Mode::RUSR | Mode::WUSR,
        )
        .map_err(|e| ChatError::ShmCreate {
            name: name.to_string(),
            source: e.into(),
        })?;

        ftruncate(&fd, size as u64).map_err(|e| ChatError::Truncate(e.into()))?;

        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                &fd,
                0,
            )
            .map_err(|e| ChatError::Mmap(e.into()))?
        };

        let addr = NonNull::new(addr.cast::<u8>()).ok_or_else(|| {
            ChatError::Mmap(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mmap returned null",
            ))
        })?;

        log::debug!("mapped '{}' ({} bytes, {:?})", name, size, ownership);

        Ok(Self {
            fd,
            addr,
            size,
            name: name.to_string(),
            ownership,
        })
    }

    /// Get raw pointer to shared memory
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr()
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if this handle owns the region name
    #[inline(always)]
    pub fn is_owner(&self) -> bool {
        self.ownership == Ownership::Owner
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.addr.as_ptr().cast(), self.size);
        }

        // The peer's region is never unlinked from here
        if self.is_owner() {
            if let Ok(c_name) = CString::new(self.name.as_str()) {
                match shm_unlink(c_name.as_c_str()) {
                    Ok(()) => log::debug!("unlinked '{}'", self.name),
                    Err(e) => log::warn!("failed to unlink '{}': {}", self.name, e),
                }
            }
        }
    }
}
