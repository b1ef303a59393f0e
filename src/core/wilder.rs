/// Wilder smoothing: an exponential moving average with `alpha = 1 / period`,
/// seeded with the first raw value.
#[derive(Debug, Clone)]
pub struct WilderSmoother {
    alpha: f64,
    value: Option<f64>,
    samples: usize,
}

impl WilderSmoother {
    pub fn new(period: usize) -> Self {
        Self {
            alpha: 1.0 / period.max(1) as f64,
            value: None,
            samples: 0,
        }
    }

    pub fn update(&mut self, x: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
            None => x,
        };
        self.value = Some(next);
        self.samples += 1;
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Number of raw values folded in so far.
    pub fn samples(&self) -> usize {
        self.samples
    }
}
