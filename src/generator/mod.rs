pub mod curve;
pub mod light;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Timelike};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use uuid::Uuid;

use crate::readings::Reading;

pub use curve::{DiurnalCurve, PiecewiseLinear, Sinusoidal};
pub use light::{LightBand, LightBands};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeneratorError {
    #[error("invalid {name} bounds: [{min}, {max}]")]
    InvalidBounds { name: &'static str, min: f64, max: f64 },
    #[error("invalid temperature curve: {0}")]
    InvalidCurve(String),
    #[error("invalid light bands: {0}")]
    InvalidLightBands(String),
    #[error("noise std-dev must be finite and non-negative, got {0}")]
    InvalidNoise(f64),
    #[error("motion probability must lie in [0, 1], got {0}")]
    InvalidProbability(f64),
}

/// Closed numeric interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(name: &'static str, min: f64, max: f64) -> Result<Self, GeneratorError> {
        if !min.is_finite() || !max.is_finite() || max < min {
            return Err(GeneratorError::InvalidBounds { name, min, max });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }

    fn lerp(&self, fraction: f64) -> f64 {
        self.min + (self.max - self.min) * fraction
    }
}

/// Generator parameters. Every deployment variant is a different value of
/// this struct, not a different code path.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub temperature: Bounds,
    pub curve: Arc<dyn DiurnalCurve>,
    pub noise_std_dev: f64,
    pub humidity: Bounds,
    pub light: LightBands,
    pub motion_probability: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            temperature: Bounds { min: 6.0, max: 27.0 },
            curve: Arc::new(PiecewiseLinear::default()),
            noise_std_dev: 0.8,
            humidity: Bounds { min: 20.0, max: 80.0 },
            light: LightBands::default(),
            motion_probability: 0.05,
        }
    }
}

/// One synthetic observation, before it is stamped with an id and device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub temperature: f64,
    pub humidity: f64,
    pub light: u32,
    pub motion: bool,
}

/// Produces physically plausible readings for an instant: a diurnal
/// temperature trend plus Gaussian noise, uniform humidity, banded light
/// and rare motion events. Pure given the clock reading and the random
/// source.
#[derive(Debug, Clone)]
pub struct DiurnalGenerator {
    settings: GeneratorSettings,
    noise: Normal<f64>,
}

impl DiurnalGenerator {
    pub fn new(settings: GeneratorSettings) -> Result<Self, GeneratorError> {
        Bounds::new("temperature", settings.temperature.min, settings.temperature.max)?;
        Bounds::new("humidity", settings.humidity.min, settings.humidity.max)?;
        // Normal::new accepts a negative std-dev.
        let std_dev = settings.noise_std_dev;
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(GeneratorError::InvalidNoise(std_dev));
        }
        let noise = Normal::new(0.0, std_dev).map_err(|_| GeneratorError::InvalidNoise(std_dev))?;
        if !(0.0..=1.0).contains(&settings.motion_probability) {
            return Err(GeneratorError::InvalidProbability(settings.motion_probability));
        }
        Ok(Self { settings, noise })
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Temperature trend for `hour` before noise is added.
    pub fn baseline_temperature(&self, hour: f64) -> f64 {
        let fraction = self.settings.curve.fraction(hour).clamp(0.0, 1.0);
        self.settings.temperature.lerp(fraction)
    }

    pub fn sample<R: Rng + ?Sized>(&self, hour: f64, rng: &mut R) -> Sample {
        let s = &self.settings;

        let noisy = self.baseline_temperature(hour) + self.noise.sample(rng);
        let temperature = s.temperature.clamp(round1(s.temperature.clamp(noisy)));

        let humidity = s.humidity.clamp(round1(rng.gen_range(s.humidity.min..=s.humidity.max)));

        let light = rng.gen_range(s.light.range_for(hour));
        let motion = rng.gen_bool(s.motion_probability);

        Sample {
            temperature,
            humidity,
            light,
            motion,
        }
    }

    /// Build a complete reading for `device_id` at `at`. The hour of day is
    /// taken from `at`'s own offset.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        device_id: &str,
        at: DateTime<FixedOffset>,
        rng: &mut R,
    ) -> Reading {
        let sample = self.sample(hour_of_day(&at), rng);
        Reading {
            id: Uuid::new_v4(),
            device_id: device_id.to_owned(),
            temperature: sample.temperature,
            humidity: sample.humidity,
            light: Some(i64::from(sample.light)),
            motion: Some(sample.motion),
            timestamp: at,
        }
    }
}

/// Fractional hour of day, e.g. 13:30:00 → 13.5.
pub fn hour_of_day<T: Timelike>(t: &T) -> f64 {
    f64::from(t.hour()) + f64::from(t.minute()) / 60.0 + f64::from(t.second()) / 3600.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
