//! Pump duty-cycle state machine.  Enforces a maximum continuous run time
//! and a mandatory cooldown after every shutoff.
//!
//! ```text
//! Idle ──turn_on──▶ Running(0) ──advance──▶ Running(t+1)
//!  ▲                    │
//!  │          turn_off / t+1 >= max_run_time
//!  │                    ▼
//!  └──[remaining = 0]── Cooldown(cooldown_time) ──advance──▶ Cooldown(r-1)
//! ```

use anyhow::{ensure, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PumpState {
    Idle,
    /// `elapsed < max_run_time` always holds.
    Running { elapsed: u32 },
    /// `remaining > 0` always holds.
    Cooldown { remaining: u32 },
}

#[derive(Debug, Clone)]
pub struct PumpActuator {
    state: PumpState,
    max_run_time: u32,
    cooldown_time: u32,
    flow_rate_lpm: f32,
    power_watts: f32,
}

impl PumpActuator {
    pub fn new(max_run_time: u32, cooldown_time: u32) -> Result<Self> {
        ensure!(
            max_run_time > 0,
            "pump max_run_time must be positive, got {max_run_time}"
        );
        Ok(Self {
            state: PumpState::Idle,
            max_run_time,
            cooldown_time,
            flow_rate_lpm: 6.0,
            power_watts: 60.0,
        })
    }

    /// Set the hydraulic and electrical rating used for accounting.
    pub fn with_rating(mut self, flow_rate_lpm: f32, power_watts: f32) -> Self {
        self.flow_rate_lpm = flow_rate_lpm;
        self.power_watts = power_watts;
        self
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    /// True only when Idle: not running and no cooldown left.
    pub fn can_run(&self) -> bool {
        self.state == PumpState::Idle
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, PumpState::Running { .. })
    }

    /// Start the pump.  Ignored unless Idle; a running pump keeps its
    /// elapsed time.  Returns whether the pump was started by this call.
    pub fn turn_on(&mut self) -> bool {
        if !self.can_run() {
            return false;
        }
        self.state = PumpState::Running { elapsed: 0 };
        true
    }

    /// Stop a running pump and start the cooldown.  Ignored when the pump is
    /// not running.  Returns whether the pump was stopped by this call.
    pub fn turn_off(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = self.cooldown();
        true
    }

    /// Age the state machine by `secs`.  Must run exactly once per tick,
    /// before anything asks whether the pump may run.
    pub fn advance(&mut self, secs: u32) {
        self.state = match self.state {
            PumpState::Idle => PumpState::Idle,
            PumpState::Running { elapsed } => {
                let elapsed = elapsed.saturating_add(secs);
                if elapsed >= self.max_run_time {
                    tracing::debug!(
                        max_run_time = self.max_run_time,
                        "pump: run-time limit reached, shutting off"
                    );
                    self.cooldown()
                } else {
                    PumpState::Running { elapsed }
                }
            }
            PumpState::Cooldown { remaining } => match remaining.saturating_sub(secs) {
                0 => PumpState::Idle,
                remaining => PumpState::Cooldown { remaining },
            },
        };
    }

    fn cooldown(&self) -> PumpState {
        match self.cooldown_time {
            0 => PumpState::Idle,
            remaining => PumpState::Cooldown { remaining },
        }
    }

    pub fn flow_rate_lpm(&self) -> f32 {
        self.flow_rate_lpm
    }

    pub fn power_watts(&self) -> f32 {
        self.power_watts
    }

    /// Litres delivered per second right now.
    pub fn delivery_lps(&self) -> f32 {
        if self.is_running() {
            self.flow_rate_lpm / 60.0
        } else {
            0.0
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pump(max_run: u32, cooldown: u32) -> PumpActuator {
        PumpActuator::new(max_run, cooldown).unwrap()
    }

    // -- Construction -------------------------------------------------------

    #[test]
    fn new_pump_is_idle() {
        let p = pump(600, 300);
        assert_eq!(p.state(), PumpState::Idle);
        assert!(p.can_run());
        assert!(!p.is_running());
    }

    #[test]
    fn zero_max_run_time_rejected() {
        let err = PumpActuator::new(0, 300).unwrap_err();
        assert!(err.to_string().contains("max_run_time must be positive"));
    }

    // -- turn_on / turn_off ---------------------------------------------------

    #[test]
    fn turn_on_from_idle_starts_running() {
        let mut p = pump(600, 300);
        assert!(p.turn_on());
        assert_eq!(p.state(), PumpState::Running { elapsed: 0 });
    }

    #[test]
    fn turn_on_while_running_keeps_elapsed() {
        let mut p = pump(600, 300);
        p.turn_on();
        p.advance(1);
        p.advance(1);
        assert!(!p.turn_on());
        assert_eq!(p.state(), PumpState::Running { elapsed: 2 });
    }

    #[test]
    fn turn_off_enters_cooldown_regardless_of_elapsed() {
        let mut p = pump(600, 300);
        p.turn_on();
        p.advance(1);
        assert!(p.turn_off());
        assert_eq!(p.state(), PumpState::Cooldown { remaining: 300 });
    }

    #[test]
    fn turn_on_during_cooldown_is_ignored() {
        let mut p = pump(600, 5);
        p.turn_on();
        p.turn_off();
        assert!(!p.turn_on());
        assert_eq!(p.state(), PumpState::Cooldown { remaining: 5 });
    }

    #[test]
    fn turn_off_when_idle_or_cooling_is_ignored() {
        let mut p = pump(600, 5);
        assert!(!p.turn_off());
        assert_eq!(p.state(), PumpState::Idle);

        p.turn_on();
        p.turn_off();
        p.advance(1);
        assert!(!p.turn_off());
        assert_eq!(p.state(), PumpState::Cooldown { remaining: 4 });
    }

    // -- advance --------------------------------------------------------------

    #[test]
    fn run_time_limit_forces_cooldown_on_the_breaching_tick() {
        let mut p = pump(3, 5);
        p.turn_on();
        p.advance(1);
        p.advance(1);
        assert_eq!(p.state(), PumpState::Running { elapsed: 2 });
        p.advance(1);
        assert_eq!(p.state(), PumpState::Cooldown { remaining: 5 });
    }

    #[test]
    fn cooldown_counts_down_to_idle() {
        let mut p = pump(3, 5);
        p.turn_on();
        p.turn_off();
        for expected in [4, 3, 2, 1] {
            p.advance(1);
            assert_eq!(p.state(), PumpState::Cooldown { remaining: expected });
            assert!(!p.can_run());
        }
        p.advance(1);
        assert_eq!(p.state(), PumpState::Idle);
        assert!(p.can_run());
    }

    #[test]
    fn zero_cooldown_returns_straight_to_idle() {
        let mut p = pump(2, 0);
        p.turn_on();
        p.advance(1);
        p.advance(1);
        assert_eq!(p.state(), PumpState::Idle);
    }

    #[test]
    fn multi_second_steps() {
        let mut p = pump(10, 10);
        p.turn_on();
        p.advance(5);
        assert_eq!(p.state(), PumpState::Running { elapsed: 5 });
        p.advance(5);
        assert_eq!(p.state(), PumpState::Cooldown { remaining: 10 });
        p.advance(15);
        assert_eq!(p.state(), PumpState::Idle);
    }

    #[test]
    fn running_never_reaches_max_run_time() {
        let mut p = pump(7, 3);
        for tick in 0..200 {
            if tick % 3 == 0 {
                p.turn_on();
            }
            p.advance(1);
            if let PumpState::Running { elapsed } = p.state() {
                assert!(elapsed < 7, "tick {tick}: elapsed {elapsed}");
            }
            if let PumpState::Cooldown { remaining } = p.state() {
                assert!(remaining > 0);
            }
        }
    }

    // -- Accounting -----------------------------------------------------------

    #[test]
    fn delivery_only_while_running() {
        let mut p = pump(600, 300).with_rating(6.0, 60.0);
        assert_eq!(p.delivery_lps(), 0.0);
        p.turn_on();
        assert!((p.delivery_lps() - 0.1).abs() < 1e-6);
        assert_eq!(p.power_watts(), 60.0);
        assert_eq!(p.flow_rate_lpm(), 6.0);
    }
}
