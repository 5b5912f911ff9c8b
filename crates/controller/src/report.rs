//! Per-tick records, the CSV log and the end-of-run summary.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use time::macros::{datetime, format_description};
use time::{Duration, OffsetDateTime};

/// Wall-clock time of simulated second zero.
const EPOCH: OffsetDateTime = datetime!(2025-07-01 0:00 UTC);

const CSV_HEADER: &str = "Timestamp,SoilMoisture (%),EffectiveMoisture (%),Temperature (°C),\
Humidity (%),Rainfall (mm),PumpState,FlowRate (L/min),WaterUsed (L),PlantStress (%),\
SensorError,ZoneID,SoilType,PowerUsed (Wh)";

/// Stress below this counts as a healthy tick.
const HEALTHY_STRESS: f32 = 10.0;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One zone, one tick.  Values are the fallback-substituted ones the
/// controller acted on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickRecord {
    pub elapsed_secs: u64,
    pub soil_moisture: f32,
    pub effective_moisture: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub rainfall: f32,
    pub pump_on: bool,
    pub flow_rate_lpm: f32,
    /// Litres delivered during this tick.
    pub water_used_l: f32,
    pub plant_stress: f32,
    pub sensor_error: bool,
    pub zone_id: String,
    pub soil_type: String,
    /// Energy drawn during this tick.
    pub power_used_wh: f32,
}

/// Wall-clock rendering of a simulated elapsed time.
pub fn timestamp(elapsed_secs: u64) -> Result<String> {
    let secs = i64::try_from(elapsed_secs).context("elapsed time out of range")?;
    let at = EPOCH
        .checked_add(Duration::seconds(secs))
        .context("elapsed time out of range")?;
    at.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .context("failed to format timestamp")
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

pub trait Reporter {
    fn record(&mut self, rec: &TickRecord) -> Result<()>;

    /// Flush anything buffered.  Called once after the last tick.
    fn finish(&mut self) -> Result<()>;
}

/// CSV log, one row per zone per tick.
pub struct CsvSink<W: Write> {
    out: W,
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) the file at `path`, creating parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create output dir: {}", dir.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create CSV log: {}", path.display()))?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> CsvSink<W> {
    /// Wrap a writer and emit the header row.
    pub fn new(mut out: W) -> Result<Self> {
        writeln!(out, "{CSV_HEADER}").context("failed to write CSV header")?;
        Ok(Self { out })
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for CsvSink<W> {
    fn record(&mut self, r: &TickRecord) -> Result<()> {
        writeln!(
            self.out,
            "{},{:.1},{:.1},{:.1},{:.1},{:.1},{},{:.1},{:.1},{:.1},{},{},{},{:.2}",
            timestamp(r.elapsed_secs)?,
            r.soil_moisture,
            r.effective_moisture,
            r.temperature,
            r.humidity,
            r.rainfall,
            if r.pump_on { "ON" } else { "OFF" },
            r.flow_rate_lpm,
            r.water_used_l,
            r.plant_stress,
            if r.sensor_error { "TRUE" } else { "FALSE" },
            r.zone_id,
            r.soil_type,
            r.power_used_wh,
        )
        .context("failed to write CSV row")
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().context("failed to flush CSV log")
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Running totals over every record of a run.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    records: u64,
    water_l: f64,
    power_wh: f64,
    stress_sum: f64,
    sensor_failure_events: u64,
    healthy: u64,
    pump_activations: u64,
    arbiter_denials: u64,
    forced_off: u64,
}

impl Summary {
    pub fn observe(&mut self, r: &TickRecord) {
        self.records += 1;
        self.water_l += f64::from(r.water_used_l);
        self.power_wh += f64::from(r.power_used_wh);
        self.stress_sum += f64::from(r.plant_stress);
        if r.sensor_error {
            self.sensor_failure_events += 1;
        }
        if r.plant_stress < HEALTHY_STRESS {
            self.healthy += 1;
        }
    }

    pub fn pump_started(&mut self) {
        self.pump_activations += 1;
    }

    pub fn arbiter_denied(&mut self) {
        self.arbiter_denials += 1;
    }

    pub fn pump_forced_off(&mut self) {
        self.forced_off += 1;
    }

    /// Derived figures for a run of `duration_secs` at `water_cost` per litre.
    pub fn report(&self, duration_secs: u64, water_cost: f32) -> SummaryReport {
        let per_record = |v: f64| {
            if self.records == 0 {
                0.0
            } else {
                v / self.records as f64
            }
        };
        let days = duration_secs as f64 / 86_400.0;
        SummaryReport {
            duration_secs,
            records: self.records,
            total_water_l: self.water_l,
            total_power_wh: self.power_wh,
            mean_plant_stress: per_record(self.stress_sum),
            sensor_failure_events: self.sensor_failure_events,
            healthy_ticks: self.healthy,
            watering_efficiency: per_record(self.healthy as f64) * 100.0,
            average_daily_cost: if days > 0.0 {
                self.water_l * f64::from(water_cost) / days
            } else {
                0.0
            },
            pump_activations: self.pump_activations,
            arbiter_denials: self.arbiter_denials,
            forced_off: self.forced_off,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub duration_secs: u64,
    /// Zone-ticks observed.
    pub records: u64,
    pub total_water_l: f64,
    pub total_power_wh: f64,
    pub mean_plant_stress: f64,
    pub sensor_failure_events: u64,
    pub healthy_ticks: u64,
    /// Share of healthy ticks, percent.
    pub watering_efficiency: f64,
    pub average_daily_cost: f64,
    pub pump_activations: u64,
    pub arbiter_denials: u64,
    pub forced_off: u64,
}

impl fmt::Display for SummaryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Simulation Summary ---")?;
        writeln!(
            f,
            "Duration simulated:      {:.1} days ({} s)",
            self.duration_secs as f64 / 86_400.0,
            self.duration_secs
        )?;
        writeln!(f, "Total water used:        {:.1} L", self.total_water_l)?;
        writeln!(f, "Total power used:        {:.1} Wh", self.total_power_wh)?;
        writeln!(f, "Average daily cost:      {:.2}", self.average_daily_cost)?;
        writeln!(f, "Average plant stress:    {:.1} %", self.mean_plant_stress)?;
        writeln!(f, "Watering efficiency:     {:.1} %", self.watering_efficiency)?;
        writeln!(f, "Sensor failure events:   {}", self.sensor_failure_events)?;
        writeln!(f, "Pump activations:        {}", self.pump_activations)?;
        write!(
            f,
            "Arbiter denials:         {} ({} forced off)",
            self.arbiter_denials, self.forced_off
        )
    }
}

// ===========================================================================
// Tests
// ===========================================================================
