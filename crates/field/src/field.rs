//! One zone's physical environment: soil, plant and the weather above it.
//! Implements [`SensorFacade`] so the controller only ever sees readings.

use crate::entropy::Entropy;
use crate::plant::Plant;
use crate::reading::{SensorFacade, SensorKind, SensorSnapshot};
use crate::soil::Soil;
use crate::weather::WeatherSensor;

/// Evapotranspiration estimate per tick from temperature and humidity.
pub fn evapotranspiration(temperature: f32, humidity: f32) -> f32 {
    (temperature / 30.0) * (1.0 - humidity / 100.0) * 0.05
}

pub struct Field<E = fastrand::Rng> {
    pub soil: Soil,
    pub plant: Plant,
    pub weather: WeatherSensor<E>,
    /// Chance per tick that the soil probe fails.
    soil_failure_chance: f32,
    entropy: E,
}

impl<E: Entropy> Field<E> {
    /// `entropy` drives soil probe failures; the weather carries its own.
    pub fn new(soil: Soil, plant: Plant, weather: WeatherSensor<E>, entropy: E) -> Self {
        Self {
            soil,
            plant,
            weather,
            soil_failure_chance: 0.0,
            entropy,
        }
    }

    pub fn with_soil_failure_chance(mut self, chance: f32) -> Self {
        self.soil_failure_chance = chance;
        self
    }

    /// Advance the physics by one tick.  `irrigation` is the water delivered
    /// this tick (litres per second of pump flow).
    pub fn step(&mut self, seconds_elapsed: u64, irrigation: f32) {
        self.weather.update(seconds_elapsed);

        // A failed station contributes neither evaporation nor rain.
        let temp = self.weather.temperature().value();
        let humidity = self.weather.humidity().value();
        let et = match (temp, humidity) {
            (Some(t), Some(h)) => evapotranspiration(t, h),
            _ => 0.0,
        };
        let rainfall = self.weather.rainfall().value().unwrap_or(0.0);

        self.soil.update(et, rainfall, irrigation);
        self.plant.update(self.soil.moisture());

        if !self.soil.has_failed() && self.entropy.chance(self.soil_failure_chance) {
            self.soil.fail();
            tracing::debug!(t = seconds_elapsed, "soil probe failed");
        }
    }
}

impl<E: Entropy> SensorFacade for Field<E> {
    fn snapshot(&mut self, forecast_hours: u32) -> SensorSnapshot {
        SensorSnapshot {
            moisture: self.soil.reading(),
            temperature: self.weather.temperature(),
            humidity: self.weather.humidity(),
            rainfall: self.weather.rainfall(),
            forecast: self.weather.forecast(forecast_hours),
        }
    }

    fn is_failed(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::Soil => self.soil.has_failed(),
            SensorKind::Weather => self.weather.has_failed(),
        }
    }

    fn reset_failure(&mut self, kind: SensorKind) {
        match kind {
            SensorKind::Soil => self.soil.reset_failure(),
            SensorKind::Weather => self.weather.reset_failure(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
