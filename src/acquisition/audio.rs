//! Audio FIFO drain worker: a ping-pong hand-off of fixed-size blocks
//! from the FPGA CAM link to the FLAC-writing logging worker.
//!
//! Ground-truthed against spec.md §4.4: the drain loop polls
//! `AUDIO_DATA_AVAILABLE` rather than sleeping a fixed period (the FIFO's
//! fill rate depends on the configured sample rate/bit depth), tags each
//! block with the overflow flag observed at read time, and never stops
//! draining on an overflow — only the consumer downstream decides what
//! to do with a tagged block.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_hal::digital::InputPin;

use crate::drivers::audio::{AudioFifo, CamTransport};
use crate::error::WtError;
use crate::time_service::TimeSource;

/// One drained FIFO block, still in raw sample-word form.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    pub timestamp_us: i64,
    pub overflowed: bool,
    pub data: Vec<u8>,
}

/// A small bounded hand-off queue between the drain worker and the FLAC
/// writer. Named for the original's double-buffer ("ping-pong") drain
/// pattern: one buffer fills while the other is written out.
pub struct AudioBlockQueue {
    inner: Mutex<VecDeque<AudioBlock>>,
    ready: Condvar,
    capacity: usize,
}

impl AudioBlockQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            capacity,
        }
    }

    /// Push a freshly drained block, dropping the oldest queued block if
    /// the consumer has fallen behind (the hardware overflow flag already
    /// records that data was lost upstream; this queue never blocks the
    /// drain loop).
    pub fn push(&self, block: AudioBlock) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.len() >= self.capacity {
            inner.pop_front();
        }
        inner.push_back(block);
        drop(inner);
        self.ready.notify_one();
    }

    pub fn pop_blocking(&self, timeout: Duration) -> Option<AudioBlock> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (mut inner, _timed_out) = self
            .ready
            .wait_timeout_while(inner, timeout, |q| q.is_empty())
            .unwrap_or_else(|e| e.into_inner());
        inner.pop_front()
    }
}

const DATA_POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Drain the FIFO whenever `AUDIO_DATA_AVAILABLE` is asserted, handing
/// each block to `read_block` to actually pull the bytes off the
/// bit-banged CAM link (a concern the `AudioFifo` type itself does not
/// model, per its module documentation).
///
/// `fifo` is shared rather than moved in, so whoever owns the other end
/// of the `Arc` can still reach it after this thread is spawned — the
/// shutdown path needs that handle to issue the FPGA battery power-cut
/// once draining stops.
pub fn spawn_audio_worker<T, D, O, F>(
    fifo: Arc<Mutex<AudioFifo<T, D, O>>>,
    queue: Arc<AudioBlockQueue>,
    stop: Arc<AtomicBool>,
    time: Arc<dyn TimeSource>,
    mut read_block: F,
) -> JoinHandle<()>
where
    T: CamTransport + Send + 'static,
    D: InputPin + Send + 'static,
    O: InputPin + Send + 'static,
    F: FnMut(&mut AudioFifo<T, D, O>) -> Result<Vec<u8>, WtError> + Send + 'static,
{
    thread::Builder::new()
        .name("acq-audio".to_string())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                let mut guard = fifo.lock().unwrap_or_else(|e| e.into_inner());
                if guard.data_available() {
                    let timestamp_us = time.now_us();
                    let overflowed = guard.overflowed();
                    if let Ok(data) = read_block(&mut guard) {
                        drop(guard);
                        queue.push(AudioBlock {
                            timestamp_us,
                            overflowed,
                            data,
                        });
                    }
                } else {
                    drop(guard);
                    thread::sleep(DATA_POLL_INTERVAL);
                }
            }
        })
        .expect("spawning the audio drain thread must not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drops_oldest_block_when_full() {
        let q = AudioBlockQueue::new(2);
        q.push(AudioBlock { timestamp_us: 1, overflowed: false, data: vec![1] });
        q.push(AudioBlock { timestamp_us: 2, overflowed: false, data: vec![2] });
        q.push(AudioBlock { timestamp_us: 3, overflowed: true, data: vec![3] });

        let first = q.pop_blocking(Duration::from_millis(10)).unwrap();
        assert_eq!(first.timestamp_us, 2);
        let second = q.pop_blocking(Duration::from_millis(10)).unwrap();
        assert_eq!(second.timestamp_us, 3);
        assert!(second.overflowed);
    }

    #[test]
    fn pop_blocking_times_out_when_empty() {
        let q = AudioBlockQueue::new(2);
        assert!(q.pop_blocking(Duration::from_millis(10)).is_none());
    }
}
