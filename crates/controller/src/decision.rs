//! Single-zone irrigation policy.
//!
//! Each tick the engine substitutes last-known-good values for failed
//! readings, then walks its rules in order, first match wins:
//!
//! 1. startup grace: always On for the first few seconds
//! 2. hourly history sample
//! 3. predictive threshold from the history trend
//! 4. rain-forecast delay
//! 5. conservation overlay (retargeted threshold, night-only watering)
//! 6. effective moisture against the effective threshold
//!
//! The engine only produces a request.  The pump state machine and the zone
//! arbiter decide what actually happens.

use irrigation_field::{evapotranspiration, Entropy, SensorReading, SensorSnapshot};
use serde::{Deserialize, Serialize};

use crate::history::HistoryBuffer;

/// Seconds after start during which the pump is always requested on.
pub const STARTUP_GRACE_SECS: u64 = 5;

/// Amount the predictive logic moves the threshold, in moisture percent.
const PREDICTIVE_STEP: f32 = 5.0;

const SECONDS_PER_HOUR: u64 = 3600;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Hour-of-day range in which conservation mode allows watering.  Wraps past
/// midnight when `start_hour >= end_hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl NightWindow {
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl Default for NightWindow {
    fn default() -> Self {
        Self {
            start_hour: 22,
            end_hour: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConservationConfig {
    pub enabled: bool,
    /// Conservation kicks in when the water cost is above this.
    pub water_cost_threshold: f32,
    /// ... or when soil moisture is below this (drought).
    pub drought_moisture_threshold: f32,
    /// Threshold used instead of the predictive one while active.
    pub moisture_threshold: f32,
    pub night_window: NightWindow,
    pub current_water_cost: f32,
}

impl Default for ConservationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            water_cost_threshold: 0.5,
            drought_moisture_threshold: 20.0,
            moisture_threshold: 35.0,
            night_window: NightWindow::default(),
            current_water_cost: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Base moisture threshold (%) before predictive adjustment.
    pub moisture_threshold: f32,
    pub rain_forecast_hours: u32,
    /// Forecast rainfall (mm) above which irrigation is delayed.
    pub rain_forecast_threshold: f32,
    pub history_window_days: u32,
    pub conservation: ConservationConfig,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            moisture_threshold: 40.0,
            rain_forecast_hours: 6,
            rain_forecast_threshold: 2.0,
            history_window_days: 3,
            conservation: ConservationConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Fallback cache
// ---------------------------------------------------------------------------

/// Most recent non-failed value of every measured quantity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LastKnownGood {
    pub moisture: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub rainfall: f32,
}

impl Default for LastKnownGood {
    fn default() -> Self {
        Self {
            moisture: 50.0,
            temperature: 20.0,
            humidity: 50.0,
            rainfall: 0.0,
        }
    }
}

/// Fallback-substituted readings for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Readings {
    pub moisture: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub rainfall: f32,
    /// At least one value came from the cache.
    pub fallback: bool,
}

impl LastKnownGood {
    /// Refresh the cache from concrete readings and fill failed ones from it.
    pub fn substitute(&mut self, snap: &SensorSnapshot) -> Readings {
        let mut fallback = false;
        let mut pick = |reading: SensorReading, slot: &mut f32| match reading {
            SensorReading::Value(v) => {
                *slot = v;
                v
            }
            SensorReading::Failed => {
                fallback = true;
                *slot
            }
        };
        let moisture = pick(snap.moisture, &mut self.moisture);
        let temperature = pick(snap.temperature, &mut self.temperature);
        let humidity = pick(snap.humidity, &mut self.humidity);
        let rainfall = pick(snap.rainfall, &mut self.rainfall);
        Readings {
            moisture,
            temperature,
            humidity,
            rainfall,
            fallback,
        }
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Everything the engine looks at in one tick.  Rebuilt every tick.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext {
    pub readings: Readings,
    pub forecast: SensorReading,
    /// Rain is falling hard enough right now that watering is pointless.
    pub rain_imminent: bool,
    /// The pump is idle or already running (not cooling down).
    pub pump_available: bool,
    pub elapsed_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpRequest {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Startup,
    ForecastDelay,
    RainImminent,
    PumpUnavailable,
    OutsideNightWindow,
    BelowThreshold,
    AboveThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decision {
    pub request: PumpRequest,
    pub reason: DecisionReason,
    pub effective_moisture: f32,
    pub effective_threshold: f32,
    pub conservation_active: bool,
}

pub struct IrrigationDecisionEngine<E = fastrand::Rng> {
    config: DecisionConfig,
    history: HistoryBuffer,
    cache: LastKnownGood,
    entropy: E,
}

impl<E: Entropy> IrrigationDecisionEngine<E> {
    /// `entropy` supplies the ±0.5 % probe noise.
    pub fn new(config: DecisionConfig, entropy: E) -> Self {
        let history = HistoryBuffer::for_days(config.history_window_days);
        Self {
            config,
            history,
            cache: LastKnownGood::default(),
            entropy,
        }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    #[cfg(test)]
    /// Resize the history window.  Drops all recorded samples.
    pub fn set_history_window_days(&mut self, days: u32) {
        self.config.history_window_days = days;
        self.history = HistoryBuffer::for_days(days);
    }

    #[cfg(test)]
    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    #[cfg(test)]
    pub fn last_known_good(&self) -> &LastKnownGood {
        &self.cache
    }

    /// Fallback substitution.  Must run every tick, including during the
    /// startup grace period, so the cache stays current.
    pub fn substitute(&mut self, snap: &SensorSnapshot) -> Readings {
        self.cache.substitute(snap)
    }

    /// Base threshold nudged by the recent rainfall/moisture trend.
    pub fn predictive_threshold(&self) -> f32 {
        let rain = self.history.mean_rainfall();
        let moisture = self.history.mean_moisture();
        let base = self.config.moisture_threshold;
        if rain < 1.0 && moisture < 30.0 {
            base - PREDICTIVE_STEP
        } else if rain > 2.0 || moisture > 60.0 {
            base + PREDICTIVE_STEP
        } else {
            base
        }
    }

    pub fn decide(&mut self, ctx: &DecisionContext) -> Decision {
        let r = ctx.readings;
        let noise = self.entropy.symmetric(0.5);
        let effective_moisture =
            r.moisture + noise + r.rainfall - evapotranspiration(r.temperature, r.humidity);

        let verdict = |request, reason, threshold, conservation_active| Decision {
            request,
            reason,
            effective_moisture,
            effective_threshold: threshold,
            conservation_active,
        };

        if ctx.elapsed_secs < STARTUP_GRACE_SECS {
            return verdict(
                PumpRequest::On,
                DecisionReason::Startup,
                self.config.moisture_threshold,
                false,
            );
        }

        if ctx.elapsed_secs % SECONDS_PER_HOUR == 0 {
            self.history.record(r.rainfall, r.moisture);
        }

        let predictive = self.predictive_threshold();

        if let SensorReading::Value(forecast) = ctx.forecast {
            if forecast > self.config.rain_forecast_threshold {
                return verdict(PumpRequest::Off, DecisionReason::ForecastDelay, predictive, false);
            }
        }

        let cons = &self.config.conservation;
        let drought = r.moisture < cons.drought_moisture_threshold;
        let high_cost = cons.current_water_cost > cons.water_cost_threshold;
        let conservation_active = cons.enabled && (high_cost || drought);
        let threshold = if conservation_active {
            cons.moisture_threshold
        } else {
            predictive
        };
        let in_window =
            !conservation_active || cons.night_window.contains(hour_of_day(ctx.elapsed_secs));

        let (request, reason) = if effective_moisture >= threshold {
            (PumpRequest::Off, DecisionReason::AboveThreshold)
        } else if ctx.rain_imminent {
            (PumpRequest::Off, DecisionReason::RainImminent)
        } else if !ctx.pump_available {
            (PumpRequest::Off, DecisionReason::PumpUnavailable)
        } else if !in_window {
            (PumpRequest::Off, DecisionReason::OutsideNightWindow)
        } else {
            (PumpRequest::On, DecisionReason::BelowThreshold)
        };
        verdict(request, reason, threshold, conservation_active)
    }
}

/// Simulated hour of day, 0-23.
pub fn hour_of_day(elapsed_secs: u64) -> u8 {
    ((elapsed_secs / SECONDS_PER_HOUR) % 24) as u8
}

// ===========================================================================
// Tests
// ===========================================================================
