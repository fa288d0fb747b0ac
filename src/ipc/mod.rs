//! External IPC surface: POSIX shared memory, named semaphores, and the
//! bit-for-bit names the on-target hardware-test suite expects.

pub mod names;
pub mod shm;

pub use shm::PosixShmPublisher;
