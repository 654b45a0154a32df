//! Bollinger bands over a rolling window of closes.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    k: f64,
    closes: VecDeque<f64>,
}

impl Bollinger {
    pub fn new(period: usize, k: f64) -> Self {
        Self { period, k, closes: VecDeque::with_capacity(period) }
    }

    pub fn next(&mut self, close: f64) {
        if self.closes.len() == self.period {
            self.closes.pop_front();
        }
        self.closes.push_back(close);
    }

    /// `(mid, upper, lower)`, all `None` until the window is full.
    pub fn value(&self) -> (Option<f64>, Option<f64>, Option<f64>) {
        if self.closes.len() < self.period {
            return (None, None, None);
        }
        let mean = self.closes.iter().sum::<f64>() / self.period as f64;
        let variance = self.closes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / self.period as f64;
        let stddev = variance.sqrt();
        (Some(mean), Some(mean + self.k * stddev), Some(mean - self.k * stddev))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_until_window_full() {
        let mut b = Bollinger::new(3, 2.0);
        b.next(1.0);
        b.next(2.0);
        assert_eq!(b.value(), (None, None, None));
        b.next(3.0);
        assert!(b.value().0.is_some());
    }
}
