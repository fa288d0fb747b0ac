//! Safe-ish wrappers around POSIX shared memory and named semaphores.
//!
//! `nix` and `linux-embedded-hal` cover everything else this crate needs
//! from the OS, but neither wraps `shm_open`/`sem_open` for *named*
//! (cross-process) semaphores — `nix::sys::mman` stops at `mmap` itself,
//! and named semaphores are POSIX-realtime API, not in scope for any crate
//! in the dependency stack. This module is the one place raw `libc` calls
//! are made, mirroring the sequence in
//! `cetiHWTest/tests/{pressure,light,audio}.c`: `shm_open` with `O_CREAT`,
//! `ftruncate` to the payload size, `mmap`, then `sem_open` with `O_CREAT`.
//!
//! Everything here is `unsafe` at the FFI boundary only; the public API is
//! ordinary safe Rust (`publish(&self, value: T)`).

use std::ffi::CString;
use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{DeviceId, ErrCode, WtError};

/// The writing end of a named shared-memory object plus its paired
/// "new data ready" semaphore, as consumed by the on-target hardware-test
/// binaries. `T` must be `Copy` and have a stable, `repr(C)`-equivalent
/// layout — callers publish plain sensor-sample structs, never pointers
/// or `Vec`s, through this channel.
pub struct PosixShmPublisher<T: Copy> {
    shm_fd: libc::c_int,
    map: *mut libc::c_void,
    sem: *mut libc::sem_t,
    shm_name: CString,
    sem_name: CString,
    unlinked: AtomicBool,
    _marker: PhantomData<T>,
}

// SAFETY: the mapped region and semaphore are addressed by the kernel, not
// tied to the creating thread; access is serialised by the semaphore
// protocol the same way it would be across processes.
unsafe impl<T: Copy> Send for PosixShmPublisher<T> {}
unsafe impl<T: Copy> Sync for PosixShmPublisher<T> {}

impl<T: Copy> PosixShmPublisher<T> {
    /// Create (or re-create) the shared-memory object and semaphore named
    /// `shm_name`/`sem_name`, sized to hold one `T`. Called once per
    /// channel at process startup by the owning acquisition worker.
    pub fn create(shm_name: &str, sem_name: &str) -> Result<Self, WtError> {
        let shm_name_c = CString::new(shm_name).map_err(|_| malformed())?;
        let sem_name_c = CString::new(sem_name).map_err(|_| malformed())?;

        // SAFETY: `shm_name_c` is a valid NUL-terminated C string for the
        // duration of this call.
        let shm_fd = unsafe {
            libc::shm_open(
                shm_name_c.as_ptr(),
                libc::O_CREAT | libc::O_RDWR,
                0o644,
            )
        };
        if shm_fd < 0 {
            return Err(transaction_failed());
        }

        let len = size_of::<T>().max(1);
        // SAFETY: `shm_fd` was just returned by a successful `shm_open`.
        if unsafe { libc::ftruncate(shm_fd, len as libc::off_t) } != 0 {
            unsafe { libc::close(shm_fd) };
            return Err(transaction_failed());
        }

        // SAFETY: `shm_fd` is a valid, sized file descriptor; the mapping
        // is dropped in `Drop` below.
        let map = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                shm_fd,
                0,
            )
        };
        if map == libc::MAP_FAILED {
            unsafe { libc::close(shm_fd) };
            return Err(transaction_failed());
        }

        // SAFETY: `sem_name_c` is a valid NUL-terminated C string.
        let sem = unsafe {
            libc::sem_open(
                sem_name_c.as_ptr(),
                libc::O_CREAT,
                0o644 as libc::mode_t,
                0 as libc::c_uint,
            )
        };
        if sem == libc::SEM_FAILED {
            unsafe {
                libc::munmap(map, len);
                libc::close(shm_fd);
            }
            return Err(transaction_failed());
        }

        Ok(Self {
            shm_fd,
            map,
            sem,
            shm_name: shm_name_c,
            sem_name: sem_name_c,
            unlinked: AtomicBool::new(false),
            _marker: PhantomData,
        })
    }

    /// Write `value` into the mapped region and post the semaphore, waking
    /// any external subscriber blocked in `sem_wait`.
    pub fn publish(&self, value: T) {
        // SAFETY: `self.map` points at `size_of::<T>()` writable bytes for
        // the lifetime of `self`; no other thread in this process writes
        // to it, and external readers only ever read.
        unsafe {
            std::ptr::write(self.map.cast::<T>(), value);
            libc::sem_post(self.sem);
        }
    }

    /// Remove the name from the filesystem namespace so a future restart
    /// gets a fresh object rather than adopting a stale one. Subscribers
    /// that already hold the descriptor keep working until they close it.
    pub fn unlink(&self) {
        if self.unlinked.swap(true, Ordering::SeqCst) {
            return;
        }
        // SAFETY: both names are valid NUL-terminated C strings owned by
        // `self` for its whole lifetime.
        unsafe {
            libc::shm_unlink(self.shm_name.as_ptr());
            libc::sem_unlink(self.sem_name.as_ptr());
        }
    }
}

impl<T: Copy> Drop for PosixShmPublisher<T> {
    fn drop(&mut self) {
        self.unlink();
        // SAFETY: `self.map`/`self.shm_fd`/`self.sem` were all established
        // by a successful `create` and are not used again after `drop`.
        unsafe {
            libc::munmap(self.map, size_of::<T>().max(1));
            libc::close(self.shm_fd);
            libc::sem_close(self.sem);
        }
    }
}

fn transaction_failed() -> WtError {
    WtError::new(DeviceId::None, ErrCode::BusTransactionFailed)
}

fn malformed() -> WtError {
    WtError::new(DeviceId::None, ErrCode::MalformedPacket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Probe {
        a: i32,
        b: f32,
    }

    #[test]
    fn create_publish_and_unlink_round_trip() {
        let publisher =
            PosixShmPublisher::<Probe>::create("/whaletag-test-shm", "/whaletag-test-sem")
                .expect("shm_open/sem_open should succeed in a sandboxed test runner");
        publisher.publish(Probe { a: 7, b: 2.5 });
        // SAFETY: test-only readback of the region we just wrote.
        let read_back = unsafe { std::ptr::read(publisher.map.cast::<Probe>()) };
        assert_eq!(read_back, Probe { a: 7, b: 2.5 });
        publisher.unlink();
    }
}
