//! Drives every zone through simulated time on one clock.
//!
//! Per tick, in ascending zone order: the zone controller ticks (pump ages,
//! sensors are read, the decision is applied under the shared budget), then
//! the field physics advance with whatever the pump is now delivering, and a
//! record goes to the reporter.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use irrigation_field::{seeded, Field, Plant, Soil, WeatherSensor};
use tracing::{debug, info};

use crate::arbiter::ZoneArbiter;
use crate::config::Config;
use crate::decision::IrrigationDecisionEngine;
use crate::pump::PumpActuator;
use crate::report::{Reporter, Summary, SummaryReport, TickRecord};
use crate::watchdog::SensorWatchdog;
use crate::zone::{Admission, TickOutcome, ZoneOrchestrator};

/// Real time per tick when pacing, regardless of the simulated step.
const REALTIME_TICK: Duration = Duration::from_secs(1);

struct SimZone {
    soil_type: String,
    controller: ZoneOrchestrator<Field>,
}

pub struct Simulation<R> {
    arbiter: Arc<ZoneArbiter>,
    zones: Vec<SimZone>,
    reporter: R,
    summary: Summary,
    step_secs: u32,
    duration_secs: u64,
    elapsed_secs: u64,
    realtime: bool,
    water_cost: f32,
}

impl<R: Reporter> Simulation<R> {
    /// Build every zone from a validated config.  All randomness is forked
    /// from one generator seeded by `[simulation].seed`.
    pub fn from_config(config: &Config, reporter: R) -> Result<Self> {
        let duration_secs = config.duration_secs()?;
        let mut master = seeded(config.simulation.seed);
        let arbiter = Arc::new(ZoneArbiter::new(config.controller.max_concurrent_pumps));
        let pump = &config.pump;

        let mut zones = Vec::new();
        for entry in config.zone_entries() {
            let field = Field::new(
                Soil::new(entry.soil_retention_rate, entry.soil_drainage_factor),
                Plant::new(
                    entry.plant_water_need_per_day,
                    entry.plant_stress_threshold,
                    entry.plant_absorption_rate,
                ),
                WeatherSensor::new(master.fork()),
                master.fork(),
            )
            .with_soil_failure_chance(entry.soil_failure_chance.unwrap_or(0.0));

            let actuator = PumpActuator::new(pump.max_run_time_secs, pump.cooldown_secs)
                .with_context(|| format!("zone '{}'", entry.zone_id))?
                .with_rating(pump.flow_rate_lpm, pump.power_watts);
            let engine = IrrigationDecisionEngine::new(config.decision_config(&entry), master.fork());

            let controller =
                ZoneOrchestrator::new(&entry.zone_id, field, actuator, engine, Arc::clone(&arbiter))
                    .with_watchdog(SensorWatchdog::new(config.watchdog.sensor_reset_after_secs))
                    .with_imminent_rain_mm(config.controller.imminent_rain_mm);
            zones.push(SimZone {
                soil_type: entry.soil_type,
                controller,
            });
        }

        info!(
            zones = zones.len(),
            duration_secs,
            step_secs = config.simulation.step_secs,
            max_concurrent_pumps = arbiter.max_concurrent(),
            seed = ?config.simulation.seed,
            "simulation built"
        );

        Ok(Self {
            arbiter,
            zones,
            reporter,
            summary: Summary::default(),
            step_secs: config.simulation.step_secs,
            duration_secs,
            elapsed_secs: 0,
            realtime: config.simulation.realtime,
            water_cost: config.simulation.water_cost,
        })
    }

    #[cfg(test)]
    pub fn arbiter(&self) -> &Arc<ZoneArbiter> {
        &self.arbiter
    }

    #[cfg(test)]
    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed_secs
    }

    pub fn total_ticks(&self) -> u64 {
        self.duration_secs / u64::from(self.step_secs)
    }

    pub fn summary(&self) -> SummaryReport {
        self.summary.report(self.duration_secs, self.water_cost)
    }

    /// Advance every zone by one tick and return their outcomes in zone order.
    pub fn step(&mut self) -> Result<Vec<TickOutcome>> {
        let t = self.elapsed_secs;
        let step = self.step_secs;
        let mut outcomes = Vec::with_capacity(self.zones.len());

        for zone in &mut self.zones {
            let outcome = zone.controller.tick(t, step);
            let pump = zone.controller.pump();
            let (flow, watts) = (pump.flow_rate_lpm(), pump.power_watts());
            let delivery = pump.delivery_lps();
            zone.controller.sensors_mut().step(t, delivery);

            match outcome.admission {
                Admission::Granted => self.summary.pump_started(),
                Admission::Denied => self.summary.arbiter_denied(),
                Admission::ForcedOff => self.summary.pump_forced_off(),
                Admission::Idle | Admission::Held => {}
            }

            let on = outcome.pump_on;
            let record = TickRecord {
                elapsed_secs: t,
                soil_moisture: outcome.readings.moisture,
                effective_moisture: outcome.decision.effective_moisture,
                temperature: outcome.readings.temperature,
                humidity: outcome.readings.humidity,
                rainfall: outcome.readings.rainfall,
                pump_on: on,
                flow_rate_lpm: flow,
                water_used_l: if on { flow * step as f32 / 60.0 } else { 0.0 },
                plant_stress: zone.controller.sensors().plant.stress(),
                sensor_error: outcome.sensor_fallback,
                zone_id: outcome.zone_id.clone(),
                soil_type: zone.soil_type.clone(),
                power_used_wh: if on { watts * step as f32 / 3_600.0 } else { 0.0 },
            };
            self.reporter.record(&record)?;
            self.summary.observe(&record);
            outcomes.push(outcome);
        }

        debug!(t, active = self.arbiter.active(), "tick");
        self.elapsed_secs += u64::from(step);
        Ok(outcomes)
    }

    /// Run to the configured duration, pacing ticks in real time if asked.
    pub async fn run(&mut self) -> Result<SummaryReport> {
        let ticks = self.total_ticks();
        let mut ticker = self.realtime.then(|| tokio::time::interval(REALTIME_TICK));

        for _ in 0..ticks {
            if let Some(ticker) = ticker.as_mut() {
                ticker.tick().await;
            }
            self.step()?;
        }
        self.reporter.finish()?;

        let summary = self.summary();
        info!(
            ticks,
            water_l = summary.total_water_l,
            power_wh = summary.total_power_wh,
            efficiency = summary.watering_efficiency,
            activations = summary.pump_activations,
            denials = summary.arbiter_denials,
            "simulation finished"
        );
        Ok(summary)
    }

    #[cfg(test)]
    pub fn into_reporter(self) -> R {
        self.reporter
    }
}

// ===========================================================================
// Tests
// ===========================================================================
