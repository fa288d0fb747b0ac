//! Function-pointer finite state machine engine driving the mission
//! life cycle: configure → wait-for-deploy → record-at-depth /
//! record-at-surface → burn-release → await-recovery → shutdown
//! (spec.md §1, §4.1).
//!
//! Adapted from the teacher's table-driven FSM engine
//! (`ZanzyTHEbar-pet-filter/firmware/src/fsm/mod.rs`): a fixed-size array
//! of `StateDescriptor`s, each a triple of `on_enter`/`on_exit`/
//! `on_update` function pointers, and an engine that calls `on_update`
//! for the current state each tick and performs the exit/enter sequence
//! on a transition. `Deploy` and `Unknown` are present in the state
//! space (spec.md §3's `MissionState` enum) but no transition in §4.1's
//! table ever produces them from this engine — they exist for
//! `strtomissionstate`-style external tooling, not for this FSM's own
//! transitions.

pub mod context;
pub mod states;

use context::MissionContext;
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MissionState {
    Config = 0,
    Start = 1,
    Deploy = 2,
    RecordDiving = 3,
    RecordSurface = 4,
    BrnOn = 5,
    Retrieve = 6,
    Shutdown = 7,
    Unknown = 8,
}

impl MissionState {
    pub const COUNT: usize = 9;

    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Config,
            1 => Self::Start,
            2 => Self::Deploy,
            3 => Self::RecordDiving,
            4 => Self::RecordSurface,
            5 => Self::BrnOn,
            6 => Self::Retrieve,
            7 => Self::Shutdown,
            _ => Self::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Config => "CONFIG",
            Self::Start => "START",
            Self::Deploy => "DEPLOY",
            Self::RecordDiving => "RECORD_DIVING",
            Self::RecordSurface => "RECORD_SURFACE",
            Self::BrnOn => "BRN_ON",
            Self::Retrieve => "RETRIEVE",
            Self::Shutdown => "SHUTDOWN",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a mission-state name or its numeric index, tolerating
    /// leading whitespace and trailing garbage (the command channel's
    /// `strtomissionstate`-equivalent, spec.md §6).
    pub fn parse_prefix(input: &str) -> (Self, usize) {
        let trimmed_start = input.len() - input.trim_start().len();
        let body = input.trim_start();

        for state in [
            Self::Config,
            Self::Start,
            Self::Deploy,
            Self::RecordDiving,
            Self::RecordSurface,
            Self::BrnOn,
            Self::Retrieve,
            Self::Shutdown,
        ] {
            if let Some(rest) = body.strip_prefix(state.name()) {
                return (state, input.len() - rest.len());
            }
        }

        let digits_len = body.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits_len > 0 {
            if let Ok(idx) = body[..digits_len].parse::<usize>() {
                if idx < Self::COUNT - 1 {
                    return (Self::from_index(idx), trimmed_start + digits_len);
                }
            }
            return (Self::Unknown, trimmed_start + digits_len);
        }

        (Self::Unknown, input.len())
    }
}

pub type StateActionFn = fn(&mut MissionContext);
pub type StateUpdateFn = fn(&mut MissionContext) -> Option<MissionState>;

pub struct StateDescriptor {
    pub id: MissionState,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

pub struct Fsm {
    table: [StateDescriptor; MissionState::COUNT],
    current: usize,
}

/// Build the mission controller's transition table (spec.md §4.1) and
/// start it in `CONFIG`, the fixed boot state.
pub fn build_mission_fsm() -> Fsm {
    let table = [
        StateDescriptor {
            id: MissionState::Config,
            on_enter: Some(states::on_enter_config),
            on_exit: None,
            on_update: states::on_update_config,
        },
        StateDescriptor {
            id: MissionState::Start,
            on_enter: Some(states::on_enter_start),
            on_exit: None,
            on_update: states::on_update_start,
        },
        StateDescriptor {
            id: MissionState::Deploy,
            on_enter: None,
            on_exit: None,
            on_update: states::on_update_unreachable,
        },
        StateDescriptor {
            id: MissionState::RecordDiving,
            on_enter: None,
            on_exit: None,
            on_update: states::on_update_record_diving,
        },
        StateDescriptor {
            id: MissionState::RecordSurface,
            on_enter: None,
            on_exit: None,
            on_update: states::on_update_record_surface,
        },
        StateDescriptor {
            id: MissionState::BrnOn,
            on_enter: Some(states::on_enter_brn_on),
            on_exit: Some(states::on_exit_brn_on),
            on_update: states::on_update_brn_on,
        },
        StateDescriptor {
            id: MissionState::Retrieve,
            on_enter: Some(states::on_enter_retrieve),
            on_exit: None,
            on_update: states::on_update_retrieve,
        },
        StateDescriptor {
            id: MissionState::Shutdown,
            on_enter: None,
            on_exit: None,
            on_update: states::on_update_shutdown,
        },
        StateDescriptor {
            id: MissionState::Unknown,
            on_enter: None,
            on_exit: None,
            on_update: states::on_update_unreachable,
        },
    ];
    Fsm::new(table, MissionState::Config)
}

impl Fsm {
    pub fn new(table: [StateDescriptor; MissionState::COUNT], initial: MissionState) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    pub fn start(&mut self, ctx: &mut MissionContext) {
        info!("mission controller starting in state: {}", self.table[self.current].id.name());
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one tick: run the current state's `on_update`, then
    /// perform the exit/enter sequence if it requested a transition.
    pub fn tick(&mut self, ctx: &mut MissionContext) {
        let next = (self.table[self.current].on_update)(ctx);
        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    pub fn current_state(&self) -> MissionState {
        self.table[self.current].id
    }

    /// Jump directly to a state, bypassing `on_update` — used by the
    /// command channel's `mission <STATE>` override (spec.md §4.5).
    pub fn force_transition(&mut self, next: MissionState, ctx: &mut MissionContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    fn transition(&mut self, next_id: MissionState, ctx: &mut MissionContext) {
        let next_idx = next_id as usize;
        info!(
            "mission state transition: {} -> {}",
            self.table[self.current].id.name(),
            self.table[next_idx].id.name()
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }
        self.current = next_idx;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TagConfig;
    use crate::drivers::burnwire::BurnwireActuator;
    use crate::error::WtError;
    use crate::time_service::FakeTimeSource;
    use std::sync::Arc;

    struct StubBurnwire;
    impl BurnwireActuator for StubBurnwire {
        fn on(&mut self) -> Result<(), WtError> {
            Ok(())
        }
        fn off(&mut self) -> Result<(), WtError> {
            Ok(())
        }
    }

    #[test]
    fn full_mission_walks_config_through_diving_on_first_deep_sample() {
        let clock = Arc::new(FakeTimeSource::new(0));
        let mut ctx = MissionContext::new(Arc::new(TagConfig::default()), clock, Box::new(StubBurnwire));
        let mut fsm = build_mission_fsm();
        fsm.start(&mut ctx);
        assert_eq!(fsm.current_state(), MissionState::Config);

        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), MissionState::Start);

        ctx.observe_battery(Ok((4.1, 4.1)));
        ctx.observe_pressure(Ok(5.0));
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), MissionState::RecordDiving);
    }

    #[test]
    fn full_mission_reaches_shutdown_via_low_battery_and_burn_release() {
        let clock = Arc::new(FakeTimeSource::new(0));
        let mut ctx = MissionContext::new(Arc::new(TagConfig::default()), clock.clone(), Box::new(StubBurnwire));
        let mut fsm = build_mission_fsm();
        fsm.start(&mut ctx);
        fsm.tick(&mut ctx); // -> Start

        ctx.observe_battery(Ok((4.1, 4.1)));
        ctx.observe_pressure(Ok(5.0));
        fsm.tick(&mut ctx); // -> RecordDiving
        assert_eq!(fsm.current_state(), MissionState::RecordDiving);

        ctx.observe_battery(Ok((3.0, 3.0)));
        fsm.tick(&mut ctx); // -> BrnOn (critical voltage forces release)
        assert_eq!(fsm.current_state(), MissionState::BrnOn);

        fsm.tick(&mut ctx); // critical battery escapes straight to Shutdown
        assert_eq!(fsm.current_state(), MissionState::Shutdown);

        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), MissionState::Shutdown);
    }

    #[test]
    fn force_transition_overrides_on_update() {
        let clock = Arc::new(FakeTimeSource::new(0));
        let mut ctx = MissionContext::new(Arc::new(TagConfig::default()), clock, Box::new(StubBurnwire));
        let mut fsm = build_mission_fsm();
        fsm.start(&mut ctx);
        fsm.force_transition(MissionState::Retrieve, &mut ctx);
        assert_eq!(fsm.current_state(), MissionState::Retrieve);
    }

    #[test]
    fn parse_prefix_round_trips_known_states() {
        assert_eq!(MissionState::parse_prefix("CONFIG").0, MissionState::Config);
        assert_eq!(MissionState::parse_prefix("BRN_ON").0, MissionState::BrnOn);
        assert_eq!(MissionState::parse_prefix("  CONFIG").0, MissionState::Config);
    }

    #[test]
    fn parse_prefix_numeric_matches_enum_order() {
        assert_eq!(MissionState::parse_prefix("0").0, MissionState::Config);
        assert_eq!(MissionState::parse_prefix("7").0, MissionState::Shutdown);
        assert_eq!(MissionState::parse_prefix("21").0, MissionState::Unknown);
    }

    #[test]
    fn parse_prefix_rejects_garbage() {
        assert_eq!(MissionState::parse_prefix("asdfasdlsdfk").0, MissionState::Unknown);
    }

    #[test]
    fn parse_prefix_consumes_only_the_matched_token() {
        let input = "CONFIG 2 CONFIG";
        let (state, consumed) = MissionState::parse_prefix(input);
        assert_eq!(state, MissionState::Config);
        let rest = &input[consumed..];
        let (state2, consumed2) = MissionState::parse_prefix(rest);
        assert_eq!(state2, MissionState::Deploy);
        let rest2 = &rest[consumed2..];
        let (state3, _) = MissionState::parse_prefix(rest2);
        assert_eq!(state3, MissionState::Config);
    }
}
