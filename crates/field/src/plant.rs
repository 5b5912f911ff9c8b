//! Plant water-stress accumulator.

const SECONDS_PER_DAY: f32 = 86_400.0;

#[derive(Debug, Clone)]
pub struct Plant {
    /// Litres per day.
    water_need_per_day: f32,
    /// Stress percentage above which the plant is considered unhealthy.
    stress_threshold: f32,
    /// Fraction of available water the roots take up.
    absorption_rate: f32,
    stress: f32,
}

impl Plant {
    pub fn new(water_need_per_day: f32, stress_threshold: f32, absorption_rate: f32) -> Self {
        Self {
            water_need_per_day,
            stress_threshold,
            absorption_rate,
            stress: 0.0,
        }
    }

    /// One second of uptake.  Stress grows with the shortfall and relaxes by
    /// a fixed step when the need is met.
    pub fn update(&mut self, available_water: f32) {
        let need = self.water_need_per_day / SECONDS_PER_DAY;
        let absorbed = available_water * self.absorption_rate;
        if absorbed < need {
            self.stress += (need - absorbed) * 10.0;
        } else {
            self.stress -= 0.1;
        }
        self.stress = self.stress.clamp(0.0, 100.0);
    }

    pub fn stress(&self) -> f32 {
        self.stress
    }

    pub fn water_need(&self) -> f32 {
        self.water_need_per_day
    }

    pub fn is_stressed(&self) -> bool {
        self.stress > self.stress_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_water_raises_stress() {
        let mut plant = Plant::new(86_400.0, 50.0, 0.5);
        plant.update(0.0);
        // need is 1 L/s, shortfall 1 → +10
        assert!((plant.stress() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn enough_water_relaxes_stress_to_zero() {
        let mut plant = Plant::new(86_400.0, 50.0, 0.5);
        plant.update(0.0);
        for _ in 0..200 {
            plant.update(10.0);
        }
        assert_eq!(plant.stress(), 0.0);
    }

    #[test]
    fn stress_is_capped() {
        let mut plant = Plant::new(864_000.0, 50.0, 0.5);
        for _ in 0..100 {
            plant.update(0.0);
        }
        assert_eq!(plant.stress(), 100.0);
        assert!(plant.is_stressed());
    }
}
