//! Per-zone control loop: sensors, decision engine, pump and a handle on the
//! shared pump budget, advanced together one tick at a time.
//!
//! Tick order is fixed:
//!
//! ```text
//! pump.advance ─▶ snapshot ─▶ fallback ─▶ decide ─▶ admit / shed ─▶ watchdog
//! ```
//!
//! The pump ages before the engine asks whether it may run, and admission is
//! the outermost gate: an On request without a slot leaves the pump off.

use std::sync::Arc;

use irrigation_field::{Entropy, SensorFacade};
use serde::Serialize;
use tracing::debug;

use crate::arbiter::ZoneArbiter;
use crate::decision::{Decision, DecisionContext, IrrigationDecisionEngine, PumpRequest, Readings};
use crate::pump::{PumpActuator, PumpState};
use crate::watchdog::SensorWatchdog;

/// Current rainfall (mm) above which watering is skipped outright.
pub const DEFAULT_IMMINENT_RAIN_MM: f32 = 2.0;

/// What the arbiter did to this zone during the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// Nothing to arbitrate: the pump stayed off or was turned off on request.
    Idle,
    /// A slot was granted and the pump started.
    Granted,
    /// The pump kept running on a slot it already held.
    Held,
    /// No slot free; the pump stays off until a later tick.
    Denied,
    /// The budget shrank below the slots handed out; this pump was stopped.
    ForcedOff,
}

/// Result of one zone tick, handed to the reporter.
#[derive(Debug, Clone, Serialize)]
pub struct TickOutcome {
    pub zone_id: String,
    pub elapsed_secs: u64,
    pub pump_on: bool,
    pub pump_state: PumpState,
    pub requested: PumpRequest,
    pub decision: Decision,
    pub readings: Readings,
    /// Some sensor reported `Failed` this tick and a cached value was used.
    pub sensor_fallback: bool,
    pub admission: Admission,
}

pub struct ZoneOrchestrator<S, E = fastrand::Rng> {
    id: String,
    sensors: S,
    pump: PumpActuator,
    engine: IrrigationDecisionEngine<E>,
    arbiter: Arc<ZoneArbiter>,
    watchdog: SensorWatchdog,
    holds_slot: bool,
    imminent_rain_mm: f32,
}

impl<S: SensorFacade, E: Entropy> ZoneOrchestrator<S, E> {
    pub fn new(
        id: impl Into<String>,
        sensors: S,
        pump: PumpActuator,
        engine: IrrigationDecisionEngine<E>,
        arbiter: Arc<ZoneArbiter>,
    ) -> Self {
        Self {
            id: id.into(),
            sensors,
            pump,
            engine,
            arbiter,
            watchdog: SensorWatchdog::default(),
            holds_slot: false,
            imminent_rain_mm: DEFAULT_IMMINENT_RAIN_MM,
        }
    }

    pub fn with_watchdog(mut self, watchdog: SensorWatchdog) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn with_imminent_rain_mm(mut self, mm: f32) -> Self {
        self.imminent_rain_mm = mm;
        self
    }

    pub fn pump(&self) -> &PumpActuator {
        &self.pump
    }

    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    #[cfg(test)]
    pub fn holds_slot(&self) -> bool {
        self.holds_slot
    }

    /// Run one tick of `step_secs` ending at `elapsed_secs`.
    pub fn tick(&mut self, elapsed_secs: u64, step_secs: u32) -> TickOutcome {
        self.pump.advance(step_secs);

        let forecast_hours = self.engine.config().rain_forecast_hours;
        let snap = self.sensors.snapshot(forecast_hours);
        let readings = self.engine.substitute(&snap);
        let rain_imminent = snap
            .rainfall
            .value()
            .is_some_and(|mm| mm > self.imminent_rain_mm);

        let ctx = DecisionContext {
            readings,
            forecast: snap.forecast,
            rain_imminent,
            pump_available: self.pump.can_run() || self.pump.is_running(),
            elapsed_secs,
        };
        let decision = self.engine.decide(&ctx);
        let admission = self.reconcile(decision.request, elapsed_secs);

        self.watchdog.check(&self.id, &mut self.sensors, elapsed_secs);

        TickOutcome {
            zone_id: self.id.clone(),
            elapsed_secs,
            pump_on: self.pump.is_running(),
            pump_state: self.pump.state(),
            requested: decision.request,
            decision,
            readings,
            sensor_fallback: readings.fallback,
            admission,
        }
    }

    /// Apply the request to the pump under the shared budget.  The slot is
    /// held exactly while the pump runs.
    fn reconcile(&mut self, request: PumpRequest, t: u64) -> Admission {
        if self.holds_slot && !self.pump.is_running() {
            // Stopped by its own run-time limit.
            self.release_slot();
        }

        if self.holds_slot && self.arbiter.shed_if_oversubscribed() {
            self.holds_slot = false;
            self.pump.turn_off();
            debug!(zone = %self.id, t, "arbiter: budget lowered, pump forced off");
            return Admission::ForcedOff;
        }

        match request {
            PumpRequest::On if self.pump.is_running() => Admission::Held,
            PumpRequest::On => {
                if !self.pump.can_run() {
                    return Admission::Idle;
                }
                if !self.arbiter.try_acquire() {
                    debug!(zone = %self.id, t, active = self.arbiter.active(), "arbiter: no free pump slot");
                    return Admission::Denied;
                }
                self.holds_slot = true;
                self.pump.turn_on();
                debug!(zone = %self.id, t, "pump on");
                Admission::Granted
            }
            PumpRequest::Off => {
                if self.pump.turn_off() {
                    debug!(zone = %self.id, t, "pump off");
                }
                if self.holds_slot {
                    self.release_slot();
                }
                Admission::Idle
            }
        }
    }

    fn release_slot(&mut self) {
        self.arbiter.release();
        self.holds_slot = false;
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{DecisionConfig, DecisionReason};
    use irrigation_field::{Quiet, SensorKind, SensorReading, SensorSnapshot};

    /// Facade with fixed readings that the test can change between ticks.
    #[derive(Clone)]
    struct Fixed {
        snap: SensorSnapshot,
        soil_failed: bool,
    }

    impl Fixed {
        fn moisture(m: f32) -> Self {
            let v = SensorReading::Value;
            Self {
                snap: SensorSnapshot {
                    moisture: v(m),
                    temperature: v(15.0),
                    humidity: v(80.0),
                    rainfall: v(0.0),
                    forecast: v(0.0),
                },
                soil_failed: false,
            }
        }
    }

    impl SensorFacade for Fixed {
        fn snapshot(&mut self, _forecast_hours: u32) -> SensorSnapshot {
            let mut snap = self.snap;
            if self.soil_failed {
                snap.moisture = SensorReading::Failed;
            }
            snap
        }

        fn is_failed(&self, kind: SensorKind) -> bool {
            kind == SensorKind::Soil && self.soil_failed
        }

        fn reset_failure(&mut self, kind: SensorKind) {
            if kind == SensorKind::Soil {
                self.soil_failed = false;
            }
        }
    }

    fn zone(
        id: &str,
        sensors: Fixed,
        config: DecisionConfig,
        max_run: u32,
        cooldown: u32,
        arbiter: &Arc<ZoneArbiter>,
    ) -> ZoneOrchestrator<Fixed, Quiet> {
        ZoneOrchestrator::new(
            id,
            sensors,
            PumpActuator::new(max_run, cooldown).unwrap(),
            IrrigationDecisionEngine::new(config, Quiet),
            Arc::clone(arbiter),
        )
    }

    fn thirsty(id: &str, arbiter: &Arc<ZoneArbiter>) -> ZoneOrchestrator<Fixed, Quiet> {
        zone(id, Fixed::moisture(10.0), DecisionConfig::default(), 600, 300, arbiter)
    }

    // -- Single zone ----------------------------------------------------------

    #[test]
    fn dry_zone_starts_pump_and_takes_a_slot() {
        let arb = Arc::new(ZoneArbiter::new(2));
        let mut z = thirsty("z1", &arb);
        let out = z.tick(10, 1);
        assert!(out.pump_on);
        assert_eq!(out.admission, Admission::Granted);
        assert_eq!(arb.active(), 1);
        assert!(z.holds_slot());
    }

    #[test]
    fn repeated_on_requests_do_not_double_count() {
        let arb = Arc::new(ZoneArbiter::new(2));
        let mut z = thirsty("z1", &arb);
        z.tick(10, 1);
        for t in 11..20 {
            let out = z.tick(t, 1);
            assert_eq!(out.admission, Admission::Held);
            assert_eq!(arb.active(), 1);
        }
        // Elapsed kept counting: 9 advances since the start.
        assert_eq!(z.pump().state(), PumpState::Running { elapsed: 9 });
    }

    #[test]
    fn wet_zone_turns_pump_off_and_releases() {
        let arb = Arc::new(ZoneArbiter::new(2));
        let mut z = thirsty("z1", &arb);
        z.tick(10, 1);
        z.sensors_mut().snap.moisture = SensorReading::Value(90.0);
        let out = z.tick(11, 1);
        assert!(!out.pump_on);
        assert_eq!(out.pump_state, PumpState::Cooldown { remaining: 300 });
        assert_eq!(arb.active(), 0);
    }

    #[test]
    fn run_time_limit_releases_slot() {
        let arb = Arc::new(ZoneArbiter::new(1));
        let mut z = zone("z1", Fixed::moisture(10.0), DecisionConfig::default(), 2, 3, &arb);
        z.tick(10, 1);
        z.tick(11, 1);
        let out = z.tick(12, 1);
        assert_eq!(out.pump_state, PumpState::Cooldown { remaining: 3 });
        assert_eq!(out.decision.reason, DecisionReason::PumpUnavailable);
        assert_eq!(arb.active(), 0);
        assert!(!z.holds_slot());
    }

    #[test]
    fn startup_turns_pump_on_even_when_wet() {
        let arb = Arc::new(ZoneArbiter::new(2));
        let mut z = zone("z1", Fixed::moisture(95.0), DecisionConfig::default(), 600, 300, &arb);
        let out = z.tick(0, 1);
        assert!(out.pump_on);
        assert_eq!(out.decision.reason, DecisionReason::Startup);
        // Grace over: the wet zone shuts off.
        let out = z.tick(5, 1);
        assert!(!out.pump_on);
    }

    #[test]
    fn heavy_current_rain_blocks_watering() {
        let arb = Arc::new(ZoneArbiter::new(2));
        let mut sensors = Fixed::moisture(10.0);
        sensors.snap.rainfall = SensorReading::Value(2.5);
        let mut z = zone("z1", sensors, DecisionConfig::default(), 600, 300, &arb);
        let out = z.tick(10, 1);
        assert_eq!(out.decision.reason, DecisionReason::RainImminent);
        assert!(!out.pump_on);
    }

    #[test]
    fn failed_probe_falls_back_and_watchdog_resets_it() {
        let arb = Arc::new(ZoneArbiter::new(2));
        let mut z = thirsty("z1", &arb).with_watchdog(SensorWatchdog::new(3));
        z.tick(10, 1);
        z.sensors_mut().soil_failed = true;
        let out = z.tick(11, 1);
        assert!(out.sensor_fallback);
        assert_eq!(out.readings.moisture, 10.0);
        for t in 12..=14 {
            assert!(z.tick(t, 1).sensor_fallback, "t={t}");
        }
        // 15 - 11 > 3: reset at the end of this tick.
        z.tick(15, 1);
        assert!(!z.sensors().soil_failed);
        assert!(!z.tick(16, 1).sensor_fallback);
    }

    // -- Arbitration ------------------------------------------------------------

    #[test]
    fn budget_limits_concurrent_pumps_in_zone_order() {
        let arb = Arc::new(ZoneArbiter::new(2));
        let mut zones: Vec<_> = (0..4).map(|i| thirsty(&format!("z{i}"), &arb)).collect();
        let outs: Vec<_> = zones.iter_mut().map(|z| z.tick(10, 1)).collect();
        let admissions: Vec<_> = outs.iter().map(|o| o.admission).collect();
        assert_eq!(
            admissions,
            vec![
                Admission::Granted,
                Admission::Granted,
                Admission::Denied,
                Admission::Denied
            ]
        );
        assert_eq!(arb.active(), 2);
    }

    #[test]
    fn denied_zone_gets_slot_once_freed() {
        let arb = Arc::new(ZoneArbiter::new(1));
        let mut a = thirsty("a", &arb);
        let mut b = thirsty("b", &arb);
        a.tick(10, 1);
        assert_eq!(b.tick(10, 1).admission, Admission::Denied);

        a.sensors_mut().snap.moisture = SensorReading::Value(90.0);
        a.tick(11, 1);
        assert_eq!(b.tick(11, 1).admission, Admission::Granted);
        assert_eq!(arb.active(), 1);
    }

    #[test]
    fn holder_is_not_preempted_by_later_request() {
        let arb = Arc::new(ZoneArbiter::new(1));
        let mut a = thirsty("a", &arb);
        let mut b = thirsty("b", &arb);
        // b wins the slot first this time.
        b.tick(10, 1);
        for t in 10..30 {
            assert_eq!(a.tick(t, 1).admission, Admission::Denied);
            let out = b.tick(t + 1, 1);
            assert!(out.pump_on);
        }
    }

    #[test]
    fn lowered_budget_forces_lowest_index_off_first() {
        let arb = Arc::new(ZoneArbiter::new(3));
        let mut zones: Vec<_> = (0..3).map(|i| thirsty(&format!("z{i}"), &arb)).collect();
        for z in zones.iter_mut() {
            z.tick(10, 1);
        }
        assert_eq!(arb.active(), 3);

        arb.set_max_concurrent(1);
        let admissions: Vec<_> = zones.iter_mut().map(|z| z.tick(11, 1).admission).collect();
        assert_eq!(
            admissions,
            vec![Admission::ForcedOff, Admission::ForcedOff, Admission::Held]
        );
        assert_eq!(arb.active(), 1);
        assert!(!zones[0].pump().is_running());
        assert!(zones[2].pump().is_running());
    }

    #[test]
    fn arbiter_invariant_holds_every_tick() {
        let arb = Arc::new(ZoneArbiter::new(2));
        let mut zones: Vec<_> = (0..5)
            .map(|i| {
                zone(
                    &format!("z{i}"),
                    Fixed::moisture(10.0 + i as f32 * 8.0),
                    DecisionConfig::default(),
                    3 + i,
                    2 + i,
                    &arb,
                )
            })
            .collect();
        for t in 0..500 {
            if t == 250 {
                arb.set_max_concurrent(1);
            }
            for z in zones.iter_mut() {
                z.tick(t, 1);
            }
            let running = zones.iter().filter(|z| z.pump().is_running()).count();
            assert!(arb.active() <= arb.max_concurrent(), "t={t}");
            assert_eq!(arb.active(), running, "t={t}");
        }
    }

    // -- End to end -------------------------------------------------------------

    #[test]
    fn duty_cycle_with_short_limits() {
        let arb = Arc::new(ZoneArbiter::new(2));
        let cfg = DecisionConfig {
            moisture_threshold: 100.0,
            rain_forecast_threshold: f32::MAX,
            ..DecisionConfig::default()
        };
        let mut z = zone("z1", Fixed::moisture(50.0), cfg, 3, 5, &arb);

        let on: Vec<bool> = (5..15).map(|t| z.tick(t, 1).pump_on).collect();
        assert_eq!(
            on,
            vec![true, true, true, false, false, false, false, false, true, true]
        );
        for window in on.windows(8) {
            assert!(window.iter().filter(|&&b| b).count() <= 3);
        }
    }
}
