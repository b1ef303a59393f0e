use crate::core::wilder::WilderSmoother;
use crate::models::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalReading {
    pub plus_di: f64,
    pub minus_di: f64,
    pub dx: f64,
    pub adx: f64,
}

/// Raw +DM, -DM and true range between two consecutive bars.
pub fn directional_movement(prev: &Candle, curr: &Candle) -> (f64, f64, f64) {
    let up = curr.high - prev.high;
    let down = prev.low - curr.low;

    let plus_dm = if up > down { up.max(0.0) } else { 0.0 };
    let minus_dm = if down > up { down.max(0.0) } else { 0.0 };

    let true_range = (curr.high - curr.low)
        .max((curr.high - prev.close).abs())
        .max((curr.low - prev.close).abs());

    (plus_dm, minus_dm, true_range)
}

/// Average directional index computed incrementally with Wilder smoothing.
///
/// The first bar only primes the previous-bar state. Every later bar feeds
/// one raw value into each smoother, and the index is reported once `period`
/// dx values have been folded in.
#[derive(Debug, Clone)]
pub struct TrendStrength {
    period: usize,
    prev: Option<Candle>,
    plus_dm: WilderSmoother,
    minus_dm: WilderSmoother,
    atr: WilderSmoother,
    adx: WilderSmoother,
    last: Option<DirectionalReading>,
}

impl TrendStrength {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            prev: None,
            plus_dm: WilderSmoother::new(period),
            minus_dm: WilderSmoother::new(period),
            atr: WilderSmoother::new(period),
            adx: WilderSmoother::new(period),
            last: None,
        }
    }

    pub fn update(&mut self, candle: &Candle) -> Option<f64> {
        let prev = match self.prev.replace(candle.clone()) {
            Some(p) => p,
            None => return None,
        };

        let (pdm, mdm, tr) = directional_movement(&prev, candle);
        let s_plus = self.plus_dm.update(pdm);
        let s_minus = self.minus_dm.update(mdm);
        let atr = self.atr.update(tr);

        let (plus_di, minus_di) = if atr == 0.0 {
            (0.0, 0.0)
        } else {
            (100.0 * s_plus / atr, 100.0 * s_minus / atr)
        };

        let di_sum = plus_di + minus_di;
        let dx = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };
        let adx = self.adx.update(dx);

        self.last = Some(DirectionalReading {
            plus_di,
            minus_di,
            dx,
            adx,
        });
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.adx.samples() >= self.period {
            self.last.map(|r| r.adx)
        } else {
            None
        }
    }

    /// Latest directional components, available from the second bar on.
    pub fn reading(&self) -> Option<DirectionalReading> {
        self.last
    }
}
