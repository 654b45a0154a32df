//! Session-anchored volume-weighted average price.

#[derive(Debug, Clone, Default)]
pub struct SessionVwap {
    cum_pv: f64,
    cum_vol: f64,
}

impl SessionVwap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.cum_pv = 0.0;
        self.cum_vol = 0.0;
    }

    pub fn next(&mut self, high: f64, low: f64, close: f64, volume: f64) -> Option<f64> {
        let typical = (high + low + close) / 3.0;
        self.cum_pv += typical * volume;
        self.cum_vol += volume;
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.cum_vol > 0.0 {
            Some(self.cum_pv / self.cum_vol)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resets_cleanly_at_session_open() {
        let mut vwap = SessionVwap::new();
        vwap.next(101.0, 99.0, 100.0, 10.0);
        assert!(vwap.value().is_some());
        vwap.reset();
        assert!(vwap.value().is_none());
    }
}
