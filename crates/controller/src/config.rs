//! TOML config file loading and validation for the simulation, the shared
//! controller policy, the pump and the zones.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::decision::{ConservationConfig, DecisionConfig, NightWindow};

/// Upper bound on `[controller].history_window_days`.
const MAX_HISTORY_WINDOW_DAYS: u32 = 365;

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationSection,
    #[serde(default)]
    pub controller: ControllerSection,
    #[serde(default)]
    pub pump: PumpSection,
    #[serde(default)]
    pub watchdog: WatchdogSection,
    #[serde(default)]
    pub zones: Vec<ZoneEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    /// `"90m"`, `"6h"`, `"1d"` or plain seconds.
    pub duration: String,
    pub step_secs: u32,
    pub seed: Option<u64>,
    pub realtime: bool,
    pub output: PathBuf,
    /// Cost per litre, for the summary.
    pub water_cost: f32,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            duration: "1d".into(),
            step_secs: 1,
            seed: None,
            realtime: false,
            output: PathBuf::from("output/output.csv"),
            water_cost: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    pub moisture_threshold: f32,
    pub rain_forecast_hours: u32,
    pub rain_forecast_threshold: f32,
    pub imminent_rain_mm: f32,
    pub history_window_days: u32,
    pub max_concurrent_pumps: usize,
    pub conservation_mode_enabled: bool,
    pub conservation_water_cost_threshold: f32,
    pub conservation_drought_moisture_threshold: f32,
    pub conservation_moisture_threshold: f32,
    /// `[start_hour, end_hour]`
    pub conservation_night_window: (u8, u8),
    pub current_water_cost: f32,
}

impl Default for ControllerSection {
    fn default() -> Self {
        let decision = DecisionConfig::default();
        let cons = decision.conservation;
        Self {
            moisture_threshold: decision.moisture_threshold,
            rain_forecast_hours: decision.rain_forecast_hours,
            rain_forecast_threshold: decision.rain_forecast_threshold,
            imminent_rain_mm: crate::zone::DEFAULT_IMMINENT_RAIN_MM,
            history_window_days: decision.history_window_days,
            max_concurrent_pumps: 2,
            conservation_mode_enabled: cons.enabled,
            conservation_water_cost_threshold: cons.water_cost_threshold,
            conservation_drought_moisture_threshold: cons.drought_moisture_threshold,
            conservation_moisture_threshold: cons.moisture_threshold,
            conservation_night_window: (cons.night_window.start_hour, cons.night_window.end_hour),
            current_water_cost: cons.current_water_cost,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PumpSection {
    pub max_run_time_secs: u32,
    pub cooldown_secs: u32,
    pub flow_rate_lpm: f32,
    pub power_watts: f32,
}

impl Default for PumpSection {
    fn default() -> Self {
        Self {
            max_run_time_secs: 600,
            cooldown_secs: 300,
            flow_rate_lpm: 6.0,
            power_watts: 60.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchdogSection {
    pub sensor_reset_after_secs: u64,
}

impl Default for WatchdogSection {
    fn default() -> Self {
        Self {
            sensor_reset_after_secs: crate::watchdog::DEFAULT_RESET_AFTER_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneEntry {
    pub zone_id: String,
    #[serde(default = "default_soil_type")]
    pub soil_type: String,
    pub soil_retention_rate: f32,
    pub soil_drainage_factor: f32,
    /// Litres per day.
    pub plant_water_need_per_day: f32,
    pub plant_stress_threshold: f32,
    pub plant_absorption_rate: f32,
    /// Overrides `[controller].moisture_threshold` for this zone.
    #[serde(default)]
    pub moisture_threshold: Option<f32>,
    #[serde(default)]
    pub soil_failure_chance: Option<f32>,
}

fn default_soil_type() -> String {
    "Loam".into()
}

impl ZoneEntry {
    /// Zone used when the file configures none.
    pub fn fallback() -> Self {
        Self {
            zone_id: "Zone1".into(),
            soil_type: default_soil_type(),
            soil_retention_rate: 0.6,
            soil_drainage_factor: 0.3,
            plant_water_need_per_day: 2.0,
            plant_stress_threshold: 30.0,
            plant_absorption_rate: 0.8,
            moisture_threshold: None,
            soil_failure_chance: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived settings
// ---------------------------------------------------------------------------

impl Config {
    /// Configured zones, or the single fallback zone when there are none.
    pub fn zone_entries(&self) -> Vec<ZoneEntry> {
        if self.zones.is_empty() {
            vec![ZoneEntry::fallback()]
        } else {
            self.zones.clone()
        }
    }

    /// Decision policy for one zone: the shared controller settings with the
    /// zone's threshold override applied.
    pub fn decision_config(&self, zone: &ZoneEntry) -> DecisionConfig {
        let c = &self.controller;
        let (start_hour, end_hour) = c.conservation_night_window;
        DecisionConfig {
            moisture_threshold: zone.moisture_threshold.unwrap_or(c.moisture_threshold),
            rain_forecast_hours: c.rain_forecast_hours,
            rain_forecast_threshold: c.rain_forecast_threshold,
            history_window_days: c.history_window_days,
            conservation: ConservationConfig {
                enabled: c.conservation_mode_enabled,
                water_cost_threshold: c.conservation_water_cost_threshold,
                drought_moisture_threshold: c.conservation_drought_moisture_threshold,
                moisture_threshold: c.conservation_moisture_threshold,
                night_window: NightWindow {
                    start_hour,
                    end_hour,
                },
                current_water_cost: c.current_water_cost,
            },
        }
    }

    /// Simulated run length in seconds.
    pub fn duration_secs(&self) -> Result<u64> {
        parse_duration(&self.simulation.duration)
    }
}

/// Parse `"<n>[s|m|h|d]"`; a bare number is seconds.
pub fn parse_duration(s: &str) -> Result<u64> {
    let s = s.trim();
    let (digits, scale) = match s.char_indices().last() {
        Some((i, 's')) => (&s[..i], 1),
        Some((i, 'm')) => (&s[..i], 60),
        Some((i, 'h')) => (&s[..i], 3_600),
        Some((i, 'd')) => (&s[..i], 86_400),
        _ => (s, 1),
    };
    let n: u64 = digits
        .parse()
        .with_context(|| format!("invalid duration {s:?}, expected <number>[s|m|h|d]"))?;
    n.checked_mul(scale)
        .with_context(|| format!("duration {s:?} is too large"))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_simulation(&mut errors);
        self.validate_controller(&mut errors);
        self.validate_pump(&mut errors);
        self.validate_zones(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_simulation(&self, errors: &mut Vec<String>) {
        let s = &self.simulation;
        match parse_duration(&s.duration) {
            Ok(0) => errors.push("simulation: duration must be positive".into()),
            Ok(_) => {}
            Err(e) => errors.push(format!("simulation: {e}")),
        }
        if s.step_secs == 0 {
            errors.push("simulation: step_secs must be positive".into());
        } else if 3_600 % s.step_secs != 0 {
            errors.push(format!(
                "simulation: step_secs {} must divide 3600 so hourly samples line up",
                s.step_secs
            ));
        }
        check_non_negative(errors, "simulation", "water_cost", s.water_cost);
    }

    fn validate_controller(&self, errors: &mut Vec<String>) {
        let c = &self.controller;

        // ── Percentages ─────────────────────────────────────
        for (name, v) in [
            ("moisture_threshold", c.moisture_threshold),
            (
                "conservation_drought_moisture_threshold",
                c.conservation_drought_moisture_threshold,
            ),
            ("conservation_moisture_threshold", c.conservation_moisture_threshold),
        ] {
            check_percent(errors, "controller", name, v);
        }

        // ── Counts (all must be positive) ───────────────────
        if c.rain_forecast_hours == 0 {
            errors.push("controller: rain_forecast_hours must be positive".into());
        }
        if c.history_window_days == 0 {
            errors.push("controller: history_window_days must be positive".into());
        } else if c.history_window_days > MAX_HISTORY_WINDOW_DAYS {
            errors.push(format!(
                "controller: history_window_days {} exceeds {MAX_HISTORY_WINDOW_DAYS}",
                c.history_window_days
            ));
        }
        if c.max_concurrent_pumps == 0 {
            errors.push("controller: max_concurrent_pumps must be positive".into());
        }

        // ── Non-negative amounts ────────────────────────────
        for (name, v) in [
            ("rain_forecast_threshold", c.rain_forecast_threshold),
            ("imminent_rain_mm", c.imminent_rain_mm),
            (
                "conservation_water_cost_threshold",
                c.conservation_water_cost_threshold,
            ),
            ("current_water_cost", c.current_water_cost),
        ] {
            check_non_negative(errors, "controller", name, v);
        }

        // ── Night window ────────────────────────────────────
        let (start, end) = c.conservation_night_window;
        if start > 23 || end > 23 {
            errors.push(format!(
                "controller: conservation_night_window [{start}, {end}] hours must be in [0, 23]"
            ));
        }
    }

    fn validate_pump(&self, errors: &mut Vec<String>) {
        let p = &self.pump;
        if p.max_run_time_secs == 0 {
            errors.push("pump: max_run_time_secs must be positive".into());
        } else if self.simulation.step_secs > p.max_run_time_secs {
            // A single tick would outlast the run limit.
            errors.push(format!(
                "pump: max_run_time_secs {} is shorter than simulation step_secs {}",
                p.max_run_time_secs, self.simulation.step_secs
            ));
        }
        if p.flow_rate_lpm <= 0.0 || p.flow_rate_lpm.is_nan() {
            errors.push(format!(
                "pump: flow_rate_lpm must be positive, got {}",
                p.flow_rate_lpm
            ));
        }
        check_non_negative(errors, "pump", "power_watts", p.power_watts);
    }

    fn validate_zones(&self, errors: &mut Vec<String>) {
        let mut seen_ids: HashSet<&str> = HashSet::new();

        for (i, z) in self.zones.iter().enumerate() {
            let ctx = if z.zone_id.is_empty() {
                format!("zones[{i}]")
            } else {
                format!("zone '{}'", z.zone_id)
            };

            // ── Identity ────────────────────────────────────────
            if z.zone_id.trim().is_empty() {
                errors.push(format!("{ctx}: zone_id is empty"));
            } else if !seen_ids.insert(&z.zone_id) {
                errors.push(format!("{ctx}: duplicate zone_id"));
            }
            if z.soil_type.trim().is_empty() {
                errors.push(format!("{ctx}: soil_type is empty"));
            }

            // ── Fractions ───────────────────────────────────────
            for (name, v) in [
                ("soil_retention_rate", Some(z.soil_retention_rate)),
                ("soil_drainage_factor", Some(z.soil_drainage_factor)),
                ("plant_absorption_rate", Some(z.plant_absorption_rate)),
                ("soil_failure_chance", z.soil_failure_chance),
            ] {
                if let Some(v) = v.filter(|v| !(0.0..=1.0).contains(v)) {
                    errors.push(format!("{ctx}: {name} {v} out of range [0.0, 1.0]"));
                }
            }

            // ── Percentages ─────────────────────────────────────
            check_percent(errors, &ctx, "plant_stress_threshold", z.plant_stress_threshold);
            if let Some(v) = z.moisture_threshold {
                check_percent(errors, &ctx, "moisture_threshold", v);
            }

            check_non_negative(
                errors,
                &ctx,
                "plant_water_need_per_day",
                z.plant_water_need_per_day,
            );
        }
    }
}

fn check_non_negative(errors: &mut Vec<String>, ctx: &str, name: &str, v: f32) {
    if v < 0.0 || v.is_nan() {
        errors.push(format!("{ctx}: {name} must be non-negative, got {v}"));
    }
}

fn check_percent(errors: &mut Vec<String>, ctx: &str, name: &str, v: f32) {
    if !(0.0..=100.0).contains(&v) {
        errors.push(format!("{ctx}: {name} {v} out of range [0, 100]"));
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.
pub fn load(path: &str) -> Result<Config> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================
