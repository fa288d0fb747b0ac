//! On-disk logging: one rotating CSV per non-audio sensor plus a rolling
//! FLAC container for the audio channel (spec.md §4.6).

pub mod audio_flac;
pub mod csv_writer;

pub use csv_writer::{spawn_csv_logging_worker, CsvRecord};
