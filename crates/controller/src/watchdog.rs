//! Clears sensor failures that outlast a bound.  The controller itself only
//! ever sees `Failed` readings and falls back; deciding when to reset the
//! hardware lives here.

use std::collections::HashMap;

use irrigation_field::{SensorFacade, SensorKind};
use tracing::{info, warn};

/// Default bound after which a failed sensor is reset.
pub const DEFAULT_RESET_AFTER_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct SensorWatchdog {
    reset_after_secs: u64,
    failed_since: HashMap<SensorKind, u64>,
}

impl SensorWatchdog {
    pub fn new(reset_after_secs: u64) -> Self {
        Self {
            reset_after_secs,
            failed_since: HashMap::new(),
        }
    }

    #[cfg(test)]
    /// Seconds the sensor has been down, if it is down.
    pub fn failed_for(&self, kind: SensorKind, now: u64) -> Option<u64> {
        self.failed_since.get(&kind).map(|&t| now.saturating_sub(t))
    }

    /// Inspect every sensor once.  Returns the sensors reset by this call.
    pub fn check<S: SensorFacade>(
        &mut self,
        zone_id: &str,
        sensors: &mut S,
        now: u64,
    ) -> Vec<SensorKind> {
        let mut reset = Vec::new();
        for kind in SensorKind::ALL {
            if !sensors.is_failed(kind) {
                self.failed_since.remove(&kind);
                continue;
            }
            let since = *self.failed_since.entry(kind).or_insert_with(|| {
                warn!(
                    zone = %zone_id,
                    sensor = %kind,
                    t = now,
                    "sensor failure detected, using fallback values"
                );
                now
            });
            if now.saturating_sub(since) > self.reset_after_secs {
                sensors.reset_failure(kind);
                self.failed_since.remove(&kind);
                info!(
                    zone = %zone_id,
                    sensor = %kind,
                    after_secs = now - since,
                    "sensor reset after prolonged failure"
                );
                reset.push(kind);
            }
        }
        reset
    }
}

impl Default for SensorWatchdog {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_AFTER_SECS)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
