//! Mission controller entry point.
//!
//! ```text
//! config file → TagConfig → MissionContext + Fsm
//!                              │
//!            ┌─────────────────┼──────────────────┐
//!            │                 │                  │
//!     acquisition workers  mission tick loop   logging workers
//!      (one per sensor)    (drives the FSM)    (CSV + FLAC)
//!            │                 │                  │
//!            └──── SensorRing ─┴──── command ──────┘
//!                              listener (named pipes)
//! ```
//!
//! Exit codes (spec.md §6): 0 clean shutdown, 1 configuration error, 2
//! hardware initialization failure.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info, warn};

use gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::{CdevPin, I2cdev};

use whaletag::acquisition::{battery, ecg, imu, light, pressure, rtc};
use whaletag::command::{self, Command, CommandHandler};
use whaletag::config;
use whaletag::drivers::audio::{AudioFifo, BitDepth, NullCamTransport, AUDIO_BLOCK_BYTES};
use whaletag::drivers::burnwire::Burnwire;
use whaletag::drivers::i2c_bus::SharedI2c;
use whaletag::drivers::iox::IoExpander;
use whaletag::drivers::recovery::{NullRecoveryRadio, RecoveryPort};
use whaletag::drivers::{
    addr, battery::BatteryMonitor, ecg::EcgAdc, imu::Imu, light::LightSensor, pressure::PressureSensor,
    rtc::RealTimeClock,
};
use whaletag::fsm::context::MissionContext;
use whaletag::fsm::{build_mission_fsm, MissionState};
use whaletag::sample::SensorRing;
use whaletag::supervisor::Supervisor;
use whaletag::time_service::{SystemTimeSource, TimeSource};

const EXIT_OK: i32 = 0;
const EXIT_CONFIG_ERROR: i32 = 1;
const EXIT_HARDWARE_INIT_FAILED: i32 = 2;

const I2C_BUS_PATH: &str = "/dev/i2c-1";
const GPIO_CHIP_PATH: &str = "/dev/gpiochip0";
const MISSION_TICK_PERIOD: Duration = Duration::from_millis(500);
const ACQUISITION_PERIOD: Duration = Duration::from_millis(1000);
const LOG_DIR: &str = "/data/whaletag";

/// GPIO line offsets on `GPIO_CHIP_PATH`. Not given in spec.md's I2C
/// address table (those sensors are memory-mapped, not line-addressed);
/// fixed here as documented design constants (see DESIGN.md).
mod gpio_offset {
    pub const BURNWIRE: u32 = 17;
    pub const IMU_RESET: u32 = 27;
    pub const ECG_DATA_READY: u32 = 22;
    pub const AUDIO_DATA_AVAILABLE: u32 = 23;
    pub const AUDIO_OVERFLOW: u32 = 24;
}

fn main() {
    env_logger::init();
    let code = run();
    std::process::exit(code);
}

fn run() -> i32 {
    let config_path = match std::env::args().nth(1) {
        Some(p) => PathBuf::from(p),
        None => {
            eprintln!("usage: whaletag-mission-controller <config-file>");
            return EXIT_CONFIG_ERROR;
        }
    };

    let config = match config::load(&config_path) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("configuration error: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };
    info!("loaded configuration from {config_path:?}");

    let i2c = match I2cdev::new(I2C_BUS_PATH) {
        Ok(dev) => dev,
        Err(e) => {
            error!("failed to open i2c bus {I2C_BUS_PATH}: {e}");
            return EXIT_HARDWARE_INIT_FAILED;
        }
    };
    let bus = SharedI2c::new(i2c);

    let mut chip = match Chip::new(GPIO_CHIP_PATH) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to open gpio chip {GPIO_CHIP_PATH}: {e}");
            return EXIT_HARDWARE_INIT_FAILED;
        }
    };
    let burnwire_pin = match open_output(&mut chip, gpio_offset::BURNWIRE, "burnwire") {
        Ok(p) => p,
        Err(e) => {
            error!("failed to claim burnwire gpio line: {e}");
            return EXIT_HARDWARE_INIT_FAILED;
        }
    };
    let imu_reset_pin = match open_output(&mut chip, gpio_offset::IMU_RESET, "imu-reset") {
        Ok(p) => p,
        Err(e) => {
            error!("failed to claim imu reset gpio line: {e}");
            return EXIT_HARDWARE_INIT_FAILED;
        }
    };
    let ecg_data_ready_pin = match open_input(&mut chip, gpio_offset::ECG_DATA_READY, "ecg-data-ready") {
        Ok(p) => p,
        Err(e) => {
            error!("failed to claim ecg data-ready gpio line: {e}");
            return EXIT_HARDWARE_INIT_FAILED;
        }
    };
    let audio_data_available_pin =
        match open_input(&mut chip, gpio_offset::AUDIO_DATA_AVAILABLE, "audio-data-available") {
            Ok(p) => p,
            Err(e) => {
                error!("failed to claim audio data-available gpio line: {e}");
                return EXIT_HARDWARE_INIT_FAILED;
            }
        };
    let audio_overflow_pin = match open_input(&mut chip, gpio_offset::AUDIO_OVERFLOW, "audio-overflow") {
        Ok(p) => p,
        Err(e) => {
            error!("failed to claim audio overflow gpio line: {e}");
            return EXIT_HARDWARE_INIT_FAILED;
        }
    };

    let time: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);

    let mut burnwire = Burnwire::new(burnwire_pin, true);
    if let Err(e) = burnwire.init() {
        error!("failed to initialize burnwire: {e}");
        return EXIT_HARDWARE_INIT_FAILED;
    }

    let mission_context = Arc::new(Mutex::new(MissionContext::new(
        Arc::clone(&config),
        Arc::clone(&time),
        Box::new(burnwire),
    )));

    let mut recovery_radio = NullRecoveryRadio;
    if let Err(e) = recovery_radio.arm(&config.recovery) {
        warn!("failed to arm recovery radio: {e}");
    }

    let mut imu = Imu::new(bus.clone(), addr::IMU, imu_reset_pin);
    if let Err(e) = imu.open() {
        warn!("imu reset sequence failed, orientation logging will report errors: {e}");
    }

    let mut supervisor = Supervisor::new();
    if let Err(e) = supervisor.install_signal_handlers() {
        warn!("failed to install signal handlers: {e}");
    }

    let pressure_ring = Arc::new(SensorRing::new());
    let light_ring = Arc::new(SensorRing::new());
    let battery_ring = Arc::new(SensorRing::new());
    let rtc_ring = Arc::new(SensorRing::new());
    let imu_ring = Arc::new(SensorRing::new());
    let ecg_ring = Arc::new(SensorRing::new());

    supervisor.track(pressure::spawn_pressure_worker(
        PressureSensor::new(bus.clone(), addr::PRESSURE),
        Arc::clone(&pressure_ring),
        ACQUISITION_PERIOD,
        Arc::clone(&supervisor.stop_acquisition),
        Arc::clone(&time),
    ));
    let light_sensor = LightSensor::new(bus.clone(), addr::ALS);
    if let Err(e) = light_sensor.wake() {
        warn!("failed to wake light sensor: {e}");
    }
    supervisor.track(light::spawn_light_worker(
        light_sensor,
        Arc::clone(&light_ring),
        ACQUISITION_PERIOD,
        Arc::clone(&supervisor.stop_acquisition),
        Arc::clone(&time),
    ));
    supervisor.track(battery::spawn_battery_worker(
        BatteryMonitor::new(bus.clone(), addr::BMS_LOWER, addr::BMS_UPPER),
        Arc::clone(&battery_ring),
        Arc::clone(&mission_context),
        ACQUISITION_PERIOD,
        Arc::clone(&supervisor.stop_acquisition),
        Arc::clone(&time),
    ));
    supervisor.track(rtc::spawn_rtc_worker(
        RealTimeClock::new(bus.clone(), addr::RTC),
        Arc::clone(&rtc_ring),
        Duration::from_secs(60),
        Arc::clone(&supervisor.stop_acquisition),
        Arc::clone(&time),
    ));
    supervisor.track(imu::spawn_imu_worker(
        imu,
        Arc::clone(&imu_ring),
        ACQUISITION_PERIOD,
        Arc::clone(&supervisor.stop_acquisition),
        Arc::clone(&time),
    ));
    supervisor.track(ecg::spawn_ecg_worker(
        EcgAdc::new(bus.clone(), addr::ECG_ADC, ecg_data_ready_pin),
        IoExpander::new(bus.clone(), addr::IOX),
        Arc::clone(&ecg_ring),
        Arc::clone(&supervisor.stop_acquisition),
        Arc::clone(&time),
    ));

    let audio_queue = Arc::new(whaletag::acquisition::audio::AudioBlockQueue::new(8));
    let audio_fifo = Arc::new(Mutex::new(AudioFifo::new(
        NullCamTransport,
        audio_data_available_pin,
        audio_overflow_pin,
    )));
    let bit_depth = if config.audio_bit_depth == 24 {
        BitDepth::TwentyFour
    } else {
        BitDepth::Sixteen
    };
    {
        let mut fifo = audio_fifo.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = fifo
            .reset()
            .and_then(|()| fifo.configure_bitdepth(bit_depth))
            .and_then(|()| fifo.start())
        {
            warn!("audio fifo bring-up failed, audio recording will be unavailable: {e}");
        }
    }
    supervisor.track(whaletag::acquisition::audio::spawn_audio_worker(
        Arc::clone(&audio_fifo),
        Arc::clone(&audio_queue),
        Arc::clone(&supervisor.stop_acquisition),
        Arc::clone(&time),
        |fifo| fifo.read_block(AUDIO_BLOCK_BYTES),
    ));
    let powerdown_fifo = Arc::clone(&audio_fifo);
    supervisor.on_shutdown(move || {
        let mut fifo = powerdown_fifo.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = fifo.stop().and_then(|()| fifo.powerdown()) {
            warn!("failed to cut battery power via fpga during shutdown: {e}");
        }
    });

    let log_dir = PathBuf::from(LOG_DIR);
    supervisor.track(whaletag::logging::spawn_csv_logging_worker(
        "pressure",
        Arc::clone(&pressure_ring),
        log_dir.join("pressure.csv"),
        Duration::from_millis(200),
        Arc::clone(&supervisor.stop_logging),
    ));
    supervisor.track(whaletag::logging::spawn_csv_logging_worker(
        "light",
        Arc::clone(&light_ring),
        log_dir.join("light.csv"),
        Duration::from_millis(200),
        Arc::clone(&supervisor.stop_logging),
    ));
    supervisor.track(whaletag::logging::spawn_csv_logging_worker(
        "battery",
        Arc::clone(&battery_ring),
        log_dir.join("battery.csv"),
        Duration::from_millis(200),
        Arc::clone(&supervisor.stop_logging),
    ));
    supervisor.track(whaletag::logging::spawn_csv_logging_worker(
        "rtc",
        Arc::clone(&rtc_ring),
        log_dir.join("rtc.csv"),
        Duration::from_millis(200),
        Arc::clone(&supervisor.stop_logging),
    ));
    supervisor.track(whaletag::logging::spawn_csv_logging_worker(
        "imu",
        Arc::clone(&imu_ring),
        log_dir.join("imu.csv"),
        Duration::from_millis(200),
        Arc::clone(&supervisor.stop_logging),
    ));
    supervisor.track(whaletag::logging::spawn_csv_logging_worker(
        "ecg",
        Arc::clone(&ecg_ring),
        log_dir.join("ecg.csv"),
        Duration::from_millis(200),
        Arc::clone(&supervisor.stop_logging),
    ));
    supervisor.track(whaletag::logging::audio_flac::spawn_flac_writer(
        Arc::clone(&audio_queue),
        log_dir.join("audio.flac"),
        1,
        config.audio_bit_depth,
        config.audio_sample_rate_hz,
        config.audio_filter,
        Arc::clone(&supervisor.stop_logging),
    ));

    let pending_override: Arc<Mutex<Option<MissionState>>> = Arc::new(Mutex::new(None));
    let paused = Arc::new(AtomicBool::new(false));
    let handler = Arc::new(Mutex::new(MissionCommandHandler {
        ctx: Arc::clone(&mission_context),
        pending_override: Arc::clone(&pending_override),
        paused: Arc::clone(&paused),
        quit_requested: Arc::clone(&supervisor.stop_acquisition),
    }));
    supervisor.track(command::spawn_command_listener(handler, Arc::clone(&supervisor.stop_acquisition)));

    let mut fsm = build_mission_fsm();
    {
        let mut ctx = mission_context.lock().unwrap_or_else(|e| e.into_inner());
        fsm.start(&mut ctx);
    }

    let mut last_pressure_us = i64::MIN;
    loop {
        if supervisor.should_exit() {
            break;
        }
        if fsm.current_state() == MissionState::Shutdown {
            break;
        }

        if let Some(sample) = pressure_ring.wait_take(last_pressure_us, MISSION_TICK_PERIOD) {
            last_pressure_us = sample.timestamp_us;
            let mut ctx = mission_context.lock().unwrap_or_else(|e| e.into_inner());
            ctx.observe_pressure(if sample.error.is_ok() {
                Ok(sample.payload.pressure_bar)
            } else {
                Err(sample.error)
            });
        }

        if let Some(forced) = pending_override.lock().unwrap_or_else(|e| e.into_inner()).take() {
            let mut ctx = mission_context.lock().unwrap_or_else(|e| e.into_inner());
            fsm.force_transition(forced, &mut ctx);
        }

        if !paused.load(Ordering::Relaxed) {
            let mut ctx = mission_context.lock().unwrap_or_else(|e| e.into_inner());
            fsm.tick(&mut ctx);
        }
    }

    if let Err(e) = recovery_radio.stop_beacon() {
        warn!("failed to silence recovery radio during shutdown: {e}");
    }

    supervisor.shutdown();
    EXIT_OK
}

fn open_output(chip: &mut Chip, offset: u32, consumer: &str) -> Result<CdevPin, Box<dyn std::error::Error>> {
    let handle = chip
        .get_line(offset)?
        .request(LineRequestFlags::OUTPUT, 0, consumer)?;
    Ok(CdevPin::new(handle)?)
}

fn open_input(chip: &mut Chip, offset: u32, consumer: &str) -> Result<CdevPin, Box<dyn std::error::Error>> {
    let handle = chip
        .get_line(offset)?
        .request(LineRequestFlags::INPUT, 0, consumer)?;
    Ok(CdevPin::new(handle)?)
}

struct MissionCommandHandler {
    ctx: Arc<Mutex<MissionContext>>,
    pending_override: Arc<Mutex<Option<MissionState>>>,
    paused: Arc<AtomicBool>,
    quit_requested: Arc<AtomicBool>,
}

impl CommandHandler for MissionCommandHandler {
    fn handle(&mut self, command: Command) -> String {
        match command {
            Command::Quit | Command::Powerdown => {
                self.quit_requested.store(true, Ordering::Relaxed);
                "ok: shutting down".to_string()
            }
            Command::MissionPause => {
                self.paused.store(true, Ordering::Relaxed);
                "ok: paused".to_string()
            }
            Command::MissionResume => {
                self.paused.store(false, Ordering::Relaxed);
                "ok: resumed".to_string()
            }
            Command::MissionSet(state) => {
                *self.pending_override.lock().unwrap_or_else(|e| e.into_inner()) = Some(state);
                format!("ok: mission -> {}", state.name())
            }
            Command::BurnwireOn => {
                let mut ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
                match ctx.burnwire.on() {
                    Ok(()) => "ok: burnwire on".to_string(),
                    Err(e) => format!("err: {e}"),
                }
            }
            Command::BurnwireOff => {
                let mut ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
                match ctx.burnwire.off() {
                    Ok(()) => "ok: burnwire off".to_string(),
                    Err(e) => format!("err: {e}"),
                }
            }
            Command::CheckCell1 => {
                let ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
                format!("cell1={:.3}V", ctx.battery.cell1_v)
            }
            Command::CheckCell2 => {
                let ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
                format!("cell2={:.3}V", ctx.battery.cell2_v)
            }
            Command::Unknown(raw) => format!("err: unknown command {raw:?}"),
        }
    }
}
