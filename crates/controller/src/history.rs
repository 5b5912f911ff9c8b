use std::collections::VecDeque;

/// Hourly rainfall and moisture samples over the last few days, used to bias
/// the watering threshold toward the recent trend.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    rainfall: VecDeque<f32>,
    moisture: VecDeque<f32>,
}

impl HistoryBuffer {
    /// `capacity` is the window length in hours.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rainfall: VecDeque::new(),
            moisture: VecDeque::new(),
        }
    }

    pub fn for_days(days: u32) -> Self {
        Self::new(days as usize * 24)
    }

    /// Append one hourly sample to both windows, evicting the oldest first
    /// when full.
    pub fn record(&mut self, rainfall: f32, moisture: f32) {
        push_bounded(&mut self.rainfall, rainfall, self.capacity);
        push_bounded(&mut self.moisture, moisture, self.capacity);
    }

    /// Mean hourly rainfall, 0 when empty.
    pub fn mean_rainfall(&self) -> f32 {
        mean(&self.rainfall)
    }

    /// Mean moisture, 0 when empty.
    pub fn mean_moisture(&self) -> f32 {
        mean(&self.moisture)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rainfall.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.rainfall.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn push_bounded(window: &mut VecDeque<f32>, v: f32, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while window.len() >= capacity {
        window.pop_front();
    }
    window.push_back(v);
}

fn mean(window: &VecDeque<f32>) -> f32 {
    if window.is_empty() {
        0.0
    } else {
        window.iter().sum::<f32>() / window.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_means_are_zero() {
        let h = HistoryBuffer::for_days(3);
        assert_eq!(h.capacity(), 72);
        assert!(h.is_empty());
        assert_eq!(h.mean_rainfall(), 0.0);
        assert_eq!(h.mean_moisture(), 0.0);
    }

    #[test]
    fn means_over_samples() {
        let mut h = HistoryBuffer::new(4);
        h.record(1.0, 20.0);
        h.record(3.0, 40.0);
        assert_eq!(h.mean_rainfall(), 2.0);
        assert_eq!(h.mean_moisture(), 30.0);
    }

    #[test]
    fn oldest_sample_evicted_first() {
        let mut h = HistoryBuffer::new(3);
        for v in [10.0, 20.0, 30.0, 40.0] {
            h.record(v, v);
        }
        assert_eq!(h.len(), 3);
        // 10 is gone: (20 + 30 + 40) / 3
        assert_eq!(h.mean_rainfall(), 30.0);
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut h = HistoryBuffer::for_days(1);
        for i in 0..500 {
            h.record(i as f32, 0.0);
            assert!(h.len() <= 24);
        }
    }
}
