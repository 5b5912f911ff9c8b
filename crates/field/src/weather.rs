//! Synthetic weather station.
//!
//! Models:
//! - Diurnal temperature cycle (sine over 24 h) with per-sample jitter
//! - Humidity inversely tracking temperature
//! - Random rain events (~10% of samples, 0.5-5 mm)
//! - A naive forecast that rolls the same rain odds for each future hour
//! - Spontaneous station failure; all readings go `Failed` until reset

use crate::entropy::Entropy;
use crate::reading::SensorReading;

/// Chance per update that a healthy station fails (10 in 5000).
pub const DEFAULT_FAILURE_CHANCE: f32 = 0.002;

/// Chance that any given sample (or forecast hour) carries a rain event.
const RAIN_CHANCE: f32 = 0.1;

const SECONDS_PER_DAY: u64 = 86_400;

pub struct WeatherSensor<E = fastrand::Rng> {
    temperature: f32,
    humidity: f32,
    rainfall: f32,
    failed: bool,
    failure_chance: f32,
    entropy: E,
}

impl<E: Entropy> WeatherSensor<E> {
    pub fn new(entropy: E) -> Self {
        Self {
            temperature: 20.0,
            humidity: 50.0,
            rainfall: 0.0,
            failed: false,
            failure_chance: DEFAULT_FAILURE_CHANCE,
            entropy,
        }
    }

    pub fn with_failure_chance(mut self, chance: f32) -> Self {
        self.failure_chance = chance;
        self
    }

    /// Advance to `seconds_elapsed`.  May fail the station; a failed station
    /// stops sampling until `reset_failure`.
    pub fn update(&mut self, seconds_elapsed: u64) {
        if !self.failed && self.entropy.chance(self.failure_chance) {
            self.failed = true;
            tracing::debug!(t = seconds_elapsed, "weather station failed");
        }
        if self.failed {
            return;
        }
        self.sample(seconds_elapsed);
    }

    fn sample(&mut self, seconds_elapsed: u64) {
        let day_fraction = (seconds_elapsed % SECONDS_PER_DAY) as f32 / SECONDS_PER_DAY as f32;
        let phase = 2.0 * std::f32::consts::PI * day_fraction;

        let temperature = 15.0 + 10.0 * phase.sin() + self.entropy.symmetric(1.0);
        let humidity = 80.0 - (temperature - 15.0) * 2.0 + self.entropy.symmetric(0.5);

        self.temperature = temperature.clamp(-10.0, 40.0);
        self.humidity = humidity.clamp(0.0, 100.0);
        self.rainfall = self.rain_event();
    }

    fn rain_event(&mut self) -> f32 {
        if self.entropy.chance(RAIN_CHANCE) {
            self.entropy.pick(1, 10) as f32 * 0.5
        } else {
            0.0
        }
    }

    fn gated(&self, v: f32) -> SensorReading {
        if self.failed {
            SensorReading::Failed
        } else {
            SensorReading::Value(v)
        }
    }

    /// Degrees Celsius.
    pub fn temperature(&self) -> SensorReading {
        self.gated(self.temperature)
    }

    /// Relative humidity, percent.
    pub fn humidity(&self) -> SensorReading {
        self.gated(self.humidity)
    }

    /// Rain during the last sample, mm.
    pub fn rainfall(&self) -> SensorReading {
        self.gated(self.rainfall)
    }

    /// Expected rainfall over the next `hours` hours, mm.  Every call draws a
    /// fresh forecast.
    pub fn forecast(&mut self, hours: u32) -> SensorReading {
        if self.failed {
            return SensorReading::Failed;
        }
        let total = (0..hours).map(|_| self.rain_event()).sum();
        SensorReading::Value(total)
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn fail(&mut self) {
        self.failed = true;
    }

    pub fn reset_failure(&mut self) {
        self.failed = false;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
