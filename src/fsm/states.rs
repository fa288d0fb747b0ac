//! Mission-state handlers implementing the transition table: unconditional
//! configure→start, pressure-hysteresis diving/surface switching, the
//! three ways into burn-release (low battery, elapsed timeout, time-of-day
//! release), burn-interval-gated release-to-retrieve, and the
//! critical-battery escape hatch into shutdown from either post-release
//! state.
//!
//! `Deploy` and `Unknown` have no handler producing them from this table;
//! both get a no-op `on_update` so the descriptor table stays total over
//! `MissionState::COUNT`.

use super::context::MissionContext;
use super::MissionState;

pub fn on_enter_config(_ctx: &mut MissionContext) {}

pub fn on_update_config(_ctx: &mut MissionContext) -> Option<MissionState> {
    Some(MissionState::Start)
}

pub fn on_enter_start(ctx: &mut MissionContext) {
    ctx.latch_timeout_deadline();
}

pub fn on_update_start(ctx: &mut MissionContext) -> Option<MissionState> {
    if !ctx.pressure.ok {
        return None;
    }
    if ctx.pressure.pressure_bar > ctx.config.dive_pressure_bar {
        Some(MissionState::RecordDiving)
    } else {
        Some(MissionState::RecordSurface)
    }
}

fn should_release(ctx: &MissionContext) -> bool {
    ctx.is_low_battery() || ctx.timeout_elapsed()
}

pub fn on_update_record_diving(ctx: &mut MissionContext) -> Option<MissionState> {
    if should_release(ctx) {
        return Some(MissionState::BrnOn);
    }
    if ctx.pressure.ok && ctx.pressure.pressure_bar <= ctx.config.surface_pressure_bar {
        return Some(MissionState::RecordSurface);
    }
    None
}

pub fn on_update_record_surface(ctx: &mut MissionContext) -> Option<MissionState> {
    if should_release(ctx) {
        return Some(MissionState::BrnOn);
    }
    if ctx.pressure.ok && ctx.pressure.pressure_bar > ctx.config.dive_pressure_bar {
        return Some(MissionState::RecordDiving);
    }
    None
}

pub fn on_enter_brn_on(ctx: &mut MissionContext) {
    ctx.latch_burn_start();
    ctx.last_burnwire_error = ctx.burnwire.on().err();
}

pub fn on_update_brn_on(ctx: &mut MissionContext) -> Option<MissionState> {
    if ctx.last_burnwire_error.is_some() {
        ctx.last_burnwire_error = ctx.burnwire.on().err();
    }

    if ctx.is_critical_battery() {
        return Some(MissionState::Shutdown);
    }
    if ctx.burn_interval_elapsed() {
        return Some(MissionState::Retrieve);
    }
    None
}

pub fn on_exit_brn_on(ctx: &mut MissionContext) {
    let _ = ctx.burnwire.off();
}

pub fn on_enter_retrieve(ctx: &mut MissionContext) {
    let _ = ctx.burnwire.off();
}

pub fn on_update_retrieve(ctx: &mut MissionContext) -> Option<MissionState> {
    if ctx.is_critical_battery() {
        return Some(MissionState::Shutdown);
    }
    None
}

pub fn on_update_shutdown(_ctx: &mut MissionContext) -> Option<MissionState> {
    None
}

pub fn on_update_unreachable(_ctx: &mut MissionContext) -> Option<MissionState> {
    None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::TagConfig;
    use crate::drivers::burnwire::BurnwireActuator;
    use crate::error::WtError;
    use crate::time_service::FakeTimeSource;

    struct StubBurnwire {
        fail_until_call: u32,
        calls: u32,
        pub on_calls: u32,
        pub off_calls: u32,
    }

    impl StubBurnwire {
        fn always_ok() -> Self {
            Self {
                fail_until_call: 0,
                calls: 0,
                on_calls: 0,
                off_calls: 0,
            }
        }
    }

    impl BurnwireActuator for StubBurnwire {
        fn on(&mut self) -> Result<(), WtError> {
            self.calls += 1;
            self.on_calls += 1;
            if self.calls <= self.fail_until_call {
                Err(WtError::new(crate::error::DeviceId::Burnwire, crate::error::ErrCode::BusTransactionFailed))
            } else {
                Ok(())
            }
        }

        fn off(&mut self) -> Result<(), WtError> {
            self.off_calls += 1;
            Ok(())
        }
    }

    fn context_with(config: TagConfig) -> MissionContext {
        MissionContext::new(
            Arc::new(config),
            Arc::new(FakeTimeSource::new(0)),
            Box::new(StubBurnwire::always_ok()),
        )
    }

    #[test]
    fn config_always_advances_to_start() {
        let mut ctx = context_with(TagConfig::default());
        assert_eq!(on_update_config(&mut ctx), Some(MissionState::Start));
    }

    #[test]
    fn start_waits_for_a_pressure_reading() {
        let mut ctx = context_with(TagConfig::default());
        assert_eq!(on_update_start(&mut ctx), None);
    }

    #[test]
    fn start_routes_to_diving_when_deep() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_pressure(Ok(5.0));
        assert_eq!(on_update_start(&mut ctx), Some(MissionState::RecordDiving));
    }

    #[test]
    fn start_routes_to_surface_when_shallow() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_pressure(Ok(0.5));
        assert_eq!(on_update_start(&mut ctx), Some(MissionState::RecordSurface));
    }

    #[test]
    fn diving_surfaces_below_surface_threshold() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_battery(Ok((4.0, 4.0)));
        ctx.observe_pressure(Ok(0.5));
        assert_eq!(on_update_record_diving(&mut ctx), Some(MissionState::RecordSurface));
    }

    #[test]
    fn diving_does_not_oscillate_in_the_hysteresis_band() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_battery(Ok((4.0, 4.0)));
        ctx.observe_pressure(Ok(2.0));
        assert_eq!(on_update_record_diving(&mut ctx), None);
    }

    #[test]
    fn low_battery_forces_release_from_either_record_state() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_battery(Ok((3.4, 3.4)));
        ctx.observe_pressure(Ok(5.0));
        assert_eq!(on_update_record_diving(&mut ctx), Some(MissionState::BrnOn));
    }

    #[test]
    fn errored_battery_sample_alone_never_forces_release() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_battery(Err(WtError::new(crate::error::DeviceId::Bms, crate::error::ErrCode::BusTransactionFailed)));
        ctx.observe_pressure(Ok(5.0));
        assert_eq!(on_update_record_diving(&mut ctx), None);
    }

    #[test]
    fn battery_error_streak_eventually_forces_release() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_pressure(Ok(5.0));
        for _ in 0..super::super::context::MISSION_BMS_CONSECUTIVE_ERROR_THRESHOLD {
            ctx.observe_battery(Err(WtError::new(crate::error::DeviceId::Bms, crate::error::ErrCode::BusTransactionFailed)));
        }
        assert_eq!(on_update_record_diving(&mut ctx), Some(MissionState::BrnOn));
    }

    #[test]
    fn one_good_sample_resets_the_error_streak() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_pressure(Ok(5.0));
        for _ in 0..super::super::context::MISSION_BMS_CONSECUTIVE_ERROR_THRESHOLD - 1 {
            ctx.observe_battery(Err(WtError::new(crate::error::DeviceId::Bms, crate::error::ErrCode::BusTransactionFailed)));
        }
        ctx.observe_battery(Ok((4.1, 4.1)));
        assert_eq!(on_update_record_diving(&mut ctx), None);
    }

    #[test]
    fn timeout_forces_release() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_battery(Ok((4.1, 4.1)));
        ctx.observe_pressure(Ok(5.0));
        ctx.timeout_deadline_us = 0;
        assert_eq!(on_update_record_diving(&mut ctx), Some(MissionState::BrnOn));
    }

    #[test]
    fn brn_on_turns_the_wire_on_and_moves_to_retrieve_once_elapsed() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_battery(Ok((4.1, 4.1)));
        on_enter_brn_on(&mut ctx);
        assert_eq!(on_update_brn_on(&mut ctx), None);

        ctx.burn_start_us = ctx.time.now_us() - (ctx.config.burn_interval_s as i64) * 1_000_000 - 1;
        assert_eq!(on_update_brn_on(&mut ctx), Some(MissionState::Retrieve));
    }

    #[test]
    fn brn_on_escapes_to_shutdown_on_critical_battery_regardless_of_timer() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_battery(Ok((3.0, 3.0)));
        on_enter_brn_on(&mut ctx);
        assert_eq!(on_update_brn_on(&mut ctx), Some(MissionState::Shutdown));
    }

    #[test]
    fn retrieve_is_sticky_until_critical_battery() {
        let mut ctx = context_with(TagConfig::default());
        ctx.observe_battery(Ok((4.1, 4.1)));
        assert_eq!(on_update_retrieve(&mut ctx), None);
        ctx.observe_battery(Ok((3.0, 3.0)));
        assert_eq!(on_update_retrieve(&mut ctx), Some(MissionState::Shutdown));
    }

    #[test]
    fn shutdown_is_terminal() {
        let mut ctx = context_with(TagConfig::default());
        assert_eq!(on_update_shutdown(&mut ctx), None);
    }
}
