//! Simulated field environment for the irrigation controller: soil, plant
//! and weather models behind a sensor facade that can report failures.

pub mod entropy;
pub mod field;
pub mod plant;
pub mod reading;
pub mod soil;
pub mod weather;

pub use entropy::{seeded, Entropy, Quiet};
pub use field::{evapotranspiration, Field};
pub use plant::Plant;
pub use reading::{SensorFacade, SensorKind, SensorReading, SensorSnapshot};
pub use soil::Soil;
pub use weather::WeatherSensor;
