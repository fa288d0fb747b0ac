//! Rotating per-sensor CSV logger.
//!
//! Ground-truthed against the original's per-sensor log files under
//! `/data/`: one append-only CSV per sensor, rotated once it grows past a
//! fixed size so a single mission never produces an unbounded file, with
//! a timestamp and the packed error code leading every row (spec.md
//! §4.6). A write failure that looks like "disk full" flips the logger
//! into a discard mode that drops rows instead of crashing the worker —
//! losing log data is preferable to losing the mission.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, warn};

use crate::error::WtError;
use crate::sample::SensorRing;

/// How a sensor's payload renders as CSV fields, independent of the
/// `SensorSample` envelope (timestamp/error) the logger always writes.
pub trait CsvRecord {
    const HEADER: &'static [&'static str];
    fn fields(&self) -> Vec<String>;
}

/// Rotate to a new file once the current one reaches this size.
pub const CSV_ROTATION_BYTES: u64 = 16 * 1024 * 1024;

struct RotatingWriter {
    base_path: PathBuf,
    max_bytes: u64,
    rotation_index: u32,
    bytes_written: u64,
    file: File,
    discard_mode: bool,
}

fn rotated_path(base_path: &Path, rotation_index: u32) -> PathBuf {
    let stem = base_path.file_stem().unwrap_or_default().to_string_lossy();
    let ext = base_path.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_else(|| "csv".to_string());
    let mut path = base_path.to_path_buf();
    path.set_file_name(format!("{stem}_{rotation_index:04}.{ext}"));
    path
}

fn open_fresh(base_path: &Path, rotation_index: u32, header: &[&str]) -> io::Result<File> {
    if let Some(parent) = base_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(rotated_path(base_path, rotation_index))?;
    writeln!(file, "timestamp_us,error_device,error_code,{}", header.join(","))?;
    Ok(file)
}

impl RotatingWriter {
    fn open(base_path: PathBuf, max_bytes: u64, header: &[&str]) -> io::Result<Self> {
        let file = open_fresh(&base_path, 0, header)?;
        Ok(Self {
            base_path,
            max_bytes,
            rotation_index: 0,
            bytes_written: 0,
            file,
            discard_mode: false,
        })
    }

    fn open_current(&mut self, header: &[&str]) -> io::Result<()> {
        self.file = open_fresh(&self.base_path, self.rotation_index, header)?;
        self.bytes_written = 0;
        Ok(())
    }

    fn write_row(&mut self, line: &str, header: &[&str]) {
        if self.discard_mode {
            return;
        }
        let result = writeln!(self.file, "{line}").and_then(|()| {
            self.bytes_written += line.len() as u64 + 1;
            if self.bytes_written >= self.max_bytes {
                self.rotation_index += 1;
                self.open_current(header)
            } else {
                Ok(())
            }
        });
        if let Err(e) = result {
            error!("csv logger for {:?} entering discard mode: {e}", self.base_path);
            self.discard_mode = true;
        }
    }
}

/// Poll `ring` and append each newly published sample as a CSV row,
/// rotating the file every [`CSV_ROTATION_BYTES`], until `stop` is set.
pub fn spawn_csv_logging_worker<T>(
    name: &'static str,
    ring: Arc<SensorRing<T>>,
    base_path: PathBuf,
    poll_period: Duration,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    T: Copy + Default + CsvRecord + Send + 'static,
{
    thread::Builder::new()
        .name(format!("log-{name}"))
        .spawn(move || {
            let mut writer = match RotatingWriter::open(base_path.clone(), CSV_ROTATION_BYTES, T::HEADER) {
                Ok(w) => w,
                Err(e) => {
                    error!("failed to open csv log {:?}: {e}", base_path);
                    return;
                }
            };

            let mut last_timestamp_us = i64::MIN;
            while !stop.load(Ordering::Relaxed) {
                if let Some(sample) = ring.try_take() {
                    if sample.timestamp_us > last_timestamp_us {
                        last_timestamp_us = sample.timestamp_us;
                        let error_code: WtError = sample.error;
                        let fields = sample.payload.fields().join(",");
                        let line = format!(
                            "{},{},{},{}",
                            sample.timestamp_us,
                            error_code.device,
                            if error_code.is_ok() { 0 } else { -1 },
                            fields
                        );
                        writer.write_row(&line, T::HEADER);
                    }
                }
                thread::sleep(poll_period);
            }
        })
        .expect("spawning a csv logging thread must not fail")
}

impl CsvRecord for crate::drivers::pressure::PressureReading {
    const HEADER: &'static [&'static str] = &["pressure_bar", "temperature_c"];
    fn fields(&self) -> Vec<String> {
        vec![self.pressure_bar.to_string(), self.temperature_c.to_string()]
    }
}

impl CsvRecord for crate::drivers::light::LightReading {
    const HEADER: &'static [&'static str] = &["visible", "infrared"];
    fn fields(&self) -> Vec<String> {
        vec![self.visible.to_string(), self.infrared.to_string()]
    }
}

impl CsvRecord for crate::drivers::battery::BatteryReading {
    const HEADER: &'static [&'static str] = &[
        "cell1_v",
        "cell2_v",
        "total_v",
        "state_of_charge_pct",
        "current_ma",
        "temperature_c",
    ];
    fn fields(&self) -> Vec<String> {
        vec![
            self.cell1_v.to_string(),
            self.cell2_v.to_string(),
            self.total_v.to_string(),
            self.state_of_charge_pct.to_string(),
            self.current_ma.to_string(),
            self.temperature_c.to_string(),
        ]
    }
}

impl CsvRecord for crate::drivers::ecg::EcgSample {
    const HEADER: &'static [&'static str] = &["status", "raw"];
    fn fields(&self) -> Vec<String> {
        vec![self.status.to_string(), self.raw.to_string()]
    }
}

impl CsvRecord for crate::drivers::imu::RotationVector {
    const HEADER: &'static [&'static str] = &["i", "j", "k", "real", "accuracy_rad"];
    fn fields(&self) -> Vec<String> {
        vec![
            self.i.to_string(),
            self.j.to_string(),
            self.k.to_string(),
            self.real.to_string(),
            self.accuracy_rad.to_string(),
        ]
    }
}

impl CsvRecord for u32 {
    const HEADER: &'static [&'static str] = &["count"];
    fn fields(&self) -> Vec<String> {
        vec![self.to_string()]
    }
}

pub fn warn_if_missing_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            warn!("log directory {:?} does not exist yet, will be created on first write", parent);
        }
    }
}
