//! Simple moving average of bar volume, used by pattern triggers for
//! "volume > k x average" conditions.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct VolumeSma {
    period: usize,
    window: VecDeque<f64>,
}

impl VolumeSma {
    pub fn new(period: usize) -> Self {
        Self { period, window: VecDeque::with_capacity(period) }
    }

    pub fn next(&mut self, volume: f64) -> Option<f64> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(volume);
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.window.len() < self.period {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.period as f64)
    }
}
