//! FLAC container writer for the audio pipeline.
//!
//! Consumes drained [`crate::acquisition::audio::AudioBlock`]s from the
//! ping-pong hand-off queue and accumulates PCM samples into fixed-size
//! FLAC files, rotating to a new container each time the accumulated
//! duration reaches [`FLAC_FILE_DURATION_S`] (spec.md §4.4's "one FLAC
//! file per recording segment" rule). Uses `flacenc`'s block encoder
//! rather than any bespoke bitstream writer, matching the crate's choice
//! of a pure-Rust encoder over shelling out to an external `flac` binary.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flacenc::component::BitRepr;
use flacenc::config::Encoder as FlacEncoderConfig;
use flacenc::error::Verify;
use flacenc::source::MemSource;

use log::{error, warn};

use crate::acquisition::audio::AudioBlockQueue;
use crate::config::AudioFilterType;

/// Roll to a new FLAC container after this many seconds of audio, so a
/// multi-day mission doesn't produce one unbounded file.
pub const FLAC_FILE_DURATION_S: u64 = 600;

const POLL_TIMEOUT: Duration = Duration::from_millis(200);

fn bytes_to_i32_samples(data: &[u8], bit_depth: u8) -> Vec<i32> {
    match bit_depth {
        16 => data
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]) as i32)
            .collect(),
        24 => data
            .chunks_exact(3)
            .map(|c| {
                let v = i32::from_le_bytes([c[0], c[1], c[2], 0]);
                (v << 8) >> 8 // sign-extend 24 -> 32
            })
            .collect(),
        other => {
            warn!("unsupported audio bit depth {other}, treating as 16-bit");
            bytes_to_i32_samples(data, 16)
        }
    }
}

fn encode_segment(path: &Path, samples: &[i32], channels: usize, bit_depth: u8, sample_rate_hz: u32) {
    if samples.is_empty() {
        return;
    }
    let config = match FlacEncoderConfig::default().into_verified() {
        Ok(c) => c,
        Err(e) => {
            error!("invalid flac encoder config: {e:?}");
            return;
        }
    };
    let source = MemSource::from_samples(samples, channels, bit_depth as usize, sample_rate_hz as usize);
    let block_size = config.block_size;
    let stream = match flacenc::encode_with_fixed_block_size(&config, source, block_size) {
        Ok(s) => s,
        Err(e) => {
            error!("flac encode failed for {:?}: {e:?}", path);
            return;
        }
    };
    let mut sink = flacenc::bitsink::ByteSink::new();
    if let Err(e) = stream.write(&mut sink) {
        error!("failed to serialize flac stream for {:?}: {e:?}", path);
        return;
    }
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("failed to create audio log directory {:?}: {e}", parent);
            return;
        }
    }
    if let Err(e) = std::fs::write(path, sink.as_slice()) {
        error!("failed to write flac container {:?}: {e}", path);
    }
}

/// Drain `queue` and roll FLAC containers under `base_path`, one ADC
/// channel interleaved per the configured bit depth, until `stop` is set.
pub fn spawn_flac_writer(
    queue: Arc<AudioBlockQueue>,
    base_path: PathBuf,
    channels: usize,
    bit_depth: u8,
    sample_rate_hz: u32,
    _filter: AudioFilterType,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("log-audio-flac".to_string())
        .spawn(move || {
            let samples_per_segment = sample_rate_hz as u64 * FLAC_FILE_DURATION_S * channels as u64;
            let mut segment_index: u32 = 0;
            let mut accumulated: Vec<i32> = Vec::new();

            while !stop.load(Ordering::Relaxed) {
                match queue.pop_blocking(POLL_TIMEOUT) {
                    Some(block) => {
                        if block.overflowed {
                            warn!("audio fifo overflow tagged on block at {}us", block.timestamp_us);
                        }
                        accumulated.extend(bytes_to_i32_samples(&block.data, bit_depth));
                        if accumulated.len() as u64 >= samples_per_segment {
                            let path = segment_path(&base_path, segment_index);
                            encode_segment(&path, &accumulated, channels, bit_depth, sample_rate_hz);
                            accumulated.clear();
                            segment_index += 1;
                        }
                    }
                    None => continue,
                }
            }

            if !accumulated.is_empty() {
                let path = segment_path(&base_path, segment_index);
                encode_segment(&path, &accumulated, channels, bit_depth, sample_rate_hz);
            }
        })
        .expect("spawning the flac writer thread must not fail")
}

fn segment_path(base_path: &Path, segment_index: u32) -> PathBuf {
    let stem = base_path.file_stem().unwrap_or_default().to_string_lossy();
    let mut path = base_path.to_path_buf();
    path.set_file_name(format!("{stem}_{segment_index:04}.flac"));
    path
}
