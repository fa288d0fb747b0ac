//! ECG acquisition worker: blocks on DATA-READY rather than polling a
//! fixed period, so it is driven directly rather than through
//! [`super::worker::spawn_worker`]'s fixed-interval loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_hal::digital::InputPin;
use embedded_hal::i2c::I2c;
use log::warn;

use crate::drivers::ecg::{EcgAdc, EcgSample};
use crate::drivers::iox::IoExpander;
use crate::drivers::iox_bit;
use crate::sample::SensorRing;
use crate::time_service::TimeSource;

/// How long to wait for a conversion before cycling back to check the
/// stop flag.
const DATA_READY_TIMEOUT: Duration = Duration::from_millis(250);

/// Query both lead-off input bits and OR them together — either
/// electrode coming loose is reported as a single lead-off condition, per
/// spec.md §4.3. A read failure is treated as "not off" rather than
/// aborting the sample, since the ADC conversion itself already
/// succeeded.
fn read_lead_off<I: I2c>(iox: &IoExpander<I>) -> bool {
    let pos = iox.is_bit_low(iox_bit::ECG_LEAD_OFF_POS).unwrap_or_else(|e| {
        warn!("failed to read ecg lead-off positive bit: {e}");
        false
    });
    let neg = iox.is_bit_low(iox_bit::ECG_LEAD_OFF_NEG).unwrap_or_else(|e| {
        warn!("failed to read ecg lead-off negative bit: {e}");
        false
    });
    pos || neg
}

pub fn spawn_ecg_worker<I, D>(
    mut adc: EcgAdc<I, D>,
    iox: IoExpander<I>,
    ring: Arc<SensorRing<EcgSample>>,
    stop: Arc<AtomicBool>,
    time: Arc<dyn TimeSource>,
) -> JoinHandle<()>
where
    I: I2c + Send + 'static,
    D: InputPin + Send + 'static,
{
    thread::Builder::new()
        .name("acq-ecg".to_string())
        .spawn(move || {
            use crate::sample::SensorSample;
            while !stop.load(Ordering::Relaxed) {
                let timestamp_us = time.now_us();
                match adc.read_blocking(DATA_READY_TIMEOUT) {
                    Ok(mut sample) => {
                        sample.lead_off = read_lead_off(&iox);
                        ring.publish(SensorSample::ok(timestamp_us, sample));
                    }
                    Err(e) if e.code() == crate::error::ErrCode::Timeout => continue,
                    Err(e) => ring.publish(SensorSample::errored(timestamp_us, e)),
                }
            }
        })
        .expect("spawning the ECG acquisition thread must not fail")
}
