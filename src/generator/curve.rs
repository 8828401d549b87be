use std::f64::consts::PI;

use super::GeneratorError;

pub const HOURS_PER_DAY: f64 = 24.0;

/// Shape of the daily temperature cycle.
///
/// `fraction` maps an hour of day in `[0, 24)` to a position between the
/// daily minimum (`0.0`) and maximum (`1.0`). The generator scales it onto
/// the configured bounds, so swapping curves never changes its contract.
pub trait DiurnalCurve: Send + Sync + std::fmt::Debug {
    fn fraction(&self, hour: f64) -> f64;
}

/// Linear interpolation between `(hour, fraction)` breakpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLinear {
    breakpoints: Vec<(f64, f64)>,
}

impl PiecewiseLinear {
    /// Breakpoints must start at hour 0, end at hour 24, be strictly
    /// increasing in hour, and have fractions in `[0, 1]`.
    pub fn new(breakpoints: Vec<(f64, f64)>) -> Result<Self, GeneratorError> {
        let bad = |reason: &str| GeneratorError::InvalidCurve(reason.to_owned());

        if breakpoints.len() < 2 {
            return Err(bad("at least two breakpoints are required"));
        }
        if breakpoints.first().map(|b| b.0) != Some(0.0)
            || breakpoints.last().map(|b| b.0) != Some(HOURS_PER_DAY)
        {
            return Err(bad("breakpoints must span hour 0 to hour 24"));
        }
        if breakpoints.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(bad("breakpoint hours must be strictly increasing"));
        }
        if breakpoints
            .iter()
            .any(|&(_, f)| !(0.0..=1.0).contains(&f))
        {
            return Err(bad("breakpoint fractions must lie in [0, 1]"));
        }
        Ok(Self { breakpoints })
    }

    pub fn breakpoints(&self) -> &[(f64, f64)] {
        &self.breakpoints
    }
}

impl Default for PiecewiseLinear {
    /// Trough at 05:00, ramp up through the morning, plateau at the peak
    /// from noon to 15:00, then a slow evening decline.
    fn default() -> Self {
        Self {
            breakpoints: vec![
                (0.0, 0.10),
                (5.0, 0.0),
                (12.0, 1.0),
                (15.0, 1.0),
                (24.0, 0.10),
            ],
        }
    }
}

impl DiurnalCurve for PiecewiseLinear {
    fn fraction(&self, hour: f64) -> f64 {
        let hour = wrap_hour(hour);
        self.breakpoints
            .windows(2)
            .find(|w| hour >= w[0].0 && hour <= w[1].0)
            .map(|w| {
                let ((h0, f0), (h1, f1)) = (w[0], w[1]);
                f0 + (f1 - f0) * (hour - h0) / (h1 - h0)
            })
            .unwrap_or(self.breakpoints[0].1)
    }
}

/// Cosine cycle peaking at `peak_hour` with the trough twelve hours away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sinusoidal {
    peak_hour: f64,
}

impl Sinusoidal {
    pub fn new(peak_hour: f64) -> Result<Self, GeneratorError> {
        if !(0.0..HOURS_PER_DAY).contains(&peak_hour) {
            return Err(GeneratorError::InvalidCurve(format!(
                "peak hour {peak_hour} must lie in [0, 24)"
            )));
        }
        Ok(Self { peak_hour })
    }
}

impl DiurnalCurve for Sinusoidal {
    fn fraction(&self, hour: f64) -> f64 {
        let phase = 2.0 * PI * (wrap_hour(hour) - self.peak_hour) / HOURS_PER_DAY;
        0.5 + 0.5 * phase.cos()
    }
}

fn wrap_hour(hour: f64) -> f64 {
    hour.rem_euclid(HOURS_PER_DAY)
}
