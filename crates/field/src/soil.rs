//! Bucket model of soil water content.

use crate::reading::SensorReading;

/// Soil moisture as a percentage of field capacity, with a probe that can
/// fail independently of the soil itself.
#[derive(Debug, Clone)]
pub struct Soil {
    moisture: f32,
    /// Fraction of incoming water the soil holds on to.
    retention_rate: f32,
    /// Fraction of evapotranspiration lost to drainage instead of the surface.
    drainage_factor: f32,
    failed: bool,
}

impl Soil {
    pub fn new(retention_rate: f32, drainage_factor: f32) -> Self {
        Self {
            moisture: 0.0,
            retention_rate,
            drainage_factor,
            failed: false,
        }
    }

    /// Start from a given moisture instead of bone dry.
    pub fn with_moisture(mut self, moisture: f32) -> Self {
        self.moisture = moisture.clamp(0.0, 100.0);
        self
    }

    /// Apply one tick of water balance.  All inputs are per tick.
    pub fn update(&mut self, evapotranspiration: f32, rainfall: f32, irrigation: f32) {
        self.moisture += (rainfall + irrigation) * self.retention_rate;
        self.moisture -= evapotranspiration * (1.0 - self.drainage_factor);
        self.moisture = self.moisture.clamp(0.0, 100.0);
    }

    /// The probe reading.  The soil keeps evolving while the probe is down.
    pub fn reading(&self) -> SensorReading {
        if self.failed {
            SensorReading::Failed
        } else {
            SensorReading::Value(self.moisture)
        }
    }

    /// True moisture, regardless of probe state.
    pub fn moisture(&self) -> f32 {
        self.moisture
    }

    pub fn fail(&mut self) {
        self.failed = true;
    }

    pub fn reset_failure(&mut self) {
        self.failed = false;
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }
}
