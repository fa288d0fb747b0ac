//! Operator command channel: a pair of named pipes, `cetiCommand` for
//! inbound text commands and `cetiResponse` for the one-line reply to
//! each, the same mechanism the reference tooling's `cetiCommand`
//! utility speaks to (spec.md §4.5).

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{error, info, warn};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

use crate::fsm::MissionState;

pub const COMMAND_FIFO_PATH: &str = "/var/run/whaletag/cetiCommand";
pub const RESPONSE_FIFO_PATH: &str = "/var/run/whaletag/cetiResponse";
const FIFO_MODE: Mode = Mode::from_bits_truncate(0o644);

/// A parsed operator request (spec.md §4.5's command vocabulary).
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quit,
    MissionPause,
    MissionResume,
    MissionSet(MissionState),
    BurnwireOn,
    BurnwireOff,
    CheckCell1,
    CheckCell2,
    Powerdown,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("quit") => Command::Quit,
        Some("mission") => match tokens.next() {
            Some("pause") => Command::MissionPause,
            Some("resume") => Command::MissionResume,
            Some(rest) => Command::MissionSet(MissionState::parse_prefix(rest).0),
            None => Command::Unknown(line.to_string()),
        },
        Some("burnwire") => match tokens.next() {
            Some("on") => Command::BurnwireOn,
            Some("off") => Command::BurnwireOff,
            _ => Command::Unknown(line.to_string()),
        },
        Some("checkCell_1") => Command::CheckCell1,
        Some("checkCell_2") => Command::CheckCell2,
        Some("powerdown") => Command::Powerdown,
        _ => Command::Unknown(line.to_string()),
    }
}

/// Implemented by whatever owns mission state, burnwire, and battery
/// readings, so the command listener stays decoupled from the
/// supervisor's concrete wiring.
pub trait CommandHandler {
    fn handle(&mut self, command: Command) -> String;
}

fn ensure_fifo(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        mkfifo(path, FIFO_MODE).map_err(std::io::Error::from)?;
    }
    Ok(())
}

/// Block reading newline-delimited commands from `COMMAND_FIFO_PATH`,
/// dispatch each to `handler`, and write its reply to
/// `RESPONSE_FIFO_PATH`, until `stop` is set.
pub fn spawn_command_listener(
    handler: Arc<Mutex<dyn CommandHandler + Send>>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("command-listener".to_string())
        .spawn(move || {
            let command_path = Path::new(COMMAND_FIFO_PATH);
            let response_path = Path::new(RESPONSE_FIFO_PATH);

            if let Err(e) = ensure_fifo(command_path).and_then(|()| ensure_fifo(response_path)) {
                error!("failed to create command pipes: {e}");
                return;
            }

            while !stop.load(Ordering::Relaxed) {
                let file = match File::open(command_path) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!("failed to open command pipe: {e}");
                        thread::sleep(std::time::Duration::from_secs(1));
                        continue;
                    }
                };
                let reader = BufReader::new(file);
                for line in reader.lines() {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    let Ok(line) = line else { continue };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let command = parse_command(&line);
                    info!("operator command: {line:?}");
                    let reply = {
                        let mut h = handler.lock().unwrap_or_else(|e| e.into_inner());
                        h.handle(command)
                    };
                    if let Ok(mut out) = OpenOptions::new().write(true).open(response_path) {
                        let _ = writeln!(out, "{reply}");
                    }
                }
            }
        })
        .expect("spawning the command listener thread must not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_command("quit"), Command::Quit);
        assert_eq!(parse_command("mission pause"), Command::MissionPause);
        assert_eq!(parse_command("mission resume\n"), Command::MissionResume);
        assert_eq!(parse_command("burnwire on"), Command::BurnwireOn);
        assert_eq!(parse_command("burnwire off"), Command::BurnwireOff);
        assert_eq!(parse_command("checkCell_1"), Command::CheckCell1);
        assert_eq!(parse_command("powerdown"), Command::Powerdown);
    }

    #[test]
    fn parses_mission_override_with_state_name() {
        assert_eq!(parse_command("mission BRN_ON"), Command::MissionSet(MissionState::BrnOn));
    }

    #[test]
    fn mission_subverb_never_falls_through_to_state_parsing() {
        assert_eq!(parse_command("burnwire frobnicate"), Command::Unknown("burnwire frobnicate".to_string()));
    }

    #[test]
    fn unknown_command_is_preserved_verbatim() {
        assert_eq!(parse_command("frobnicate"), Command::Unknown("frobnicate".to_string()));
    }
}
