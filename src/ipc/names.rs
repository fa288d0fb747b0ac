//! POSIX shared-memory and named-semaphore identifiers.
//!
//! These strings are load-bearing: the on-target hardware-test suite
//! (`cetiHWTest/tests/{pressure,light,audio}.c`) opens the same objects by
//! name with `shm_open`/`sem_open` and must keep working unmodified against
//! this process. They are kept in one place, separate from the internal
//! `sample::SensorRing`, so nothing can rename them by accident.

/// Shared-memory object backing the latest `CetiPressureSample`.
pub const PRESSURE_SHM_NAME: &str = "/ceti-pressure-shm";
/// Named semaphore posted once per fresh pressure sample.
pub const PRESSURE_SEM_NAME: &str = "/ceti-pressure-sem";

/// Shared-memory object backing the latest `CetiLightSample`.
pub const LIGHT_SHM_NAME: &str = "/ceti-light-shm";
/// Named semaphore posted once per fresh light sample.
pub const LIGHT_SEM_NAME: &str = "/ceti-light-sem";

/// Shared-memory object backing the current ping-pong audio block.
pub const AUDIO_SHM_NAME: &str = "/ceti-audio-shm";
/// Named semaphore posted once per completed audio block.
pub const AUDIO_BLOCK_SEM_NAME: &str = "/ceti-audio-block-sem";
