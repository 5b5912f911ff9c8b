use serde::Serialize;
use std::fmt;

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// One sensor measurement.  A failed sensor is reported in-band so nothing
/// downstream can do arithmetic on a sentinel value by accident.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "value")]
pub enum SensorReading {
    Value(f32),
    Failed,
}

impl SensorReading {
    pub fn value(self) -> Option<f32> {
        match self {
            Self::Value(v) => Some(v),
            Self::Failed => None,
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl From<Option<f32>> for SensorReading {
    fn from(v: Option<f32>) -> Self {
        v.map_or(Self::Failed, Self::Value)
    }
}

/// Everything the controller reads from one zone in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub moisture: SensorReading,
    pub temperature: SensorReading,
    pub humidity: SensorReading,
    pub rainfall: SensorReading,
    /// Total rainfall expected over the requested lookahead window (mm).
    pub forecast: SensorReading,
}

impl SensorSnapshot {
    /// True if any of the measured quantities is currently failed.
    pub fn any_failed(&self) -> bool {
        self.moisture.is_failed()
            || self.temperature.is_failed()
            || self.humidity.is_failed()
            || self.rainfall.is_failed()
    }
}

// ---------------------------------------------------------------------------
// Facade
// ---------------------------------------------------------------------------

/// Physical sensors that can fail and be reset independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Soil,
    Weather,
}

impl SensorKind {
    pub const ALL: [SensorKind; 2] = [SensorKind::Soil, SensorKind::Weather];
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soil => write!(f, "soil"),
            Self::Weather => write!(f, "weather"),
        }
    }
}

/// Read side of a zone's sensors, as seen by the controller.
pub trait SensorFacade {
    /// Sample every reading for this tick.  The forecast covers the next
    /// `forecast_hours` hours.
    fn snapshot(&mut self, forecast_hours: u32) -> SensorSnapshot;

    /// Whether the given sensor is currently reporting `Failed`.
    fn is_failed(&self, kind: SensorKind) -> bool;

    /// Clear a failure.  Called by the watchdog, never by the controller.
    fn reset_failure(&mut self, kind: SensorKind);
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(moisture: SensorReading) -> SensorSnapshot {
        SensorSnapshot {
            moisture,
            temperature: SensorReading::Value(20.0),
            humidity: SensorReading::Value(50.0),
            rainfall: SensorReading::Value(0.0),
            forecast: SensorReading::Value(0.0),
        }
    }

    #[test]
    fn value_and_failed() {
        assert_eq!(SensorReading::Value(3.5).value(), Some(3.5));
        assert_eq!(SensorReading::Failed.value(), None);
        assert!(SensorReading::Failed.is_failed());
        assert!(!SensorReading::Value(0.0).is_failed());
    }

    #[test]
    fn from_option() {
        assert_eq!(SensorReading::from(Some(1.0)), SensorReading::Value(1.0));
        assert_eq!(SensorReading::from(None), SensorReading::Failed);
    }

    #[test]
    fn any_failed_ignores_forecast() {
        let mut snap = snapshot_with(SensorReading::Value(40.0));
        snap.forecast = SensorReading::Failed;
        assert!(!snap.any_failed());
        assert!(snapshot_with(SensorReading::Failed).any_failed());
    }

    #[test]
    fn sensor_kind_display() {
        assert_eq!(SensorKind::Soil.to_string(), "soil");
        assert_eq!(SensorKind::Weather.to_string(), "weather");
    }
}
