use std::{ops::RangeInclusive, str::FromStr};

use super::{curve::HOURS_PER_DAY, GeneratorError};

/// Light level range for the hours `[start_hour, end_hour)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LightBand {
    pub name: &'static str,
    pub start_hour: f64,
    pub end_hour: f64,
    pub min: u32,
    pub max: u32,
}

impl LightBand {
    pub const fn new(name: &'static str, start_hour: f64, end_hour: f64, min: u32, max: u32) -> Self {
        Self { name, start_hour, end_hour, min, max }
    }
}

/// Partition of the day into light bands. Bands are contiguous and cover
/// `[0, 24)` exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct LightBands {
    bands: Vec<LightBand>,
}

impl LightBands {
    pub fn new(bands: Vec<LightBand>) -> Result<Self, GeneratorError> {
        let bad = |reason: String| GeneratorError::InvalidLightBands(reason);

        let (Some(first), Some(last)) = (bands.first(), bands.last()) else {
            return Err(bad("at least one band is required".into()));
        };
        if first.start_hour != 0.0 || last.end_hour != HOURS_PER_DAY {
            return Err(bad("bands must cover hour 0 to hour 24".into()));
        }
        for b in &bands {
            if b.end_hour <= b.start_hour {
                return Err(bad(format!("band {:?} ends before it starts", b.name)));
            }
            if b.max < b.min {
                return Err(bad(format!("band {:?} has max below min", b.name)));
            }
        }
        if let Some(w) = bands.windows(2).find(|w| w[0].end_hour != w[1].start_hour) {
            return Err(bad(format!(
                "gap or overlap between bands {:?} and {:?}",
                w[0].name, w[1].name
            )));
        }
        Ok(Self { bands })
    }

    /// Two bands: bright daylight from 06:00 to 18:00, dark otherwise.
    pub fn day_night() -> Self {
        Self {
            bands: vec![
                LightBand::new("night", 0.0, 6.0, 0, 50),
                LightBand::new("day", 6.0, 18.0, 200, 1000),
                LightBand::new("night", 18.0, 24.0, 0, 50),
            ],
        }
    }

    /// Dawn, morning, midday, afternoon, evening and night bands.
    pub fn six_band() -> Self {
        Self {
            bands: vec![
                LightBand::new("night", 0.0, 5.0, 0, 10),
                LightBand::new("dawn", 5.0, 7.0, 50, 300),
                LightBand::new("morning", 7.0, 11.0, 300, 700),
                LightBand::new("midday", 11.0, 15.0, 700, 1000),
                LightBand::new("afternoon", 15.0, 18.0, 300, 700),
                LightBand::new("evening", 18.0, 21.0, 20, 200),
                LightBand::new("night", 21.0, 24.0, 0, 10),
            ],
        }
    }

    pub fn band_for(&self, hour: f64) -> &LightBand {
        let hour = hour.rem_euclid(HOURS_PER_DAY);
        self.bands
            .iter()
            .find(|b| hour >= b.start_hour && hour < b.end_hour)
            // Only reachable through float rounding right at 24.0.
            .unwrap_or_else(|| &self.bands[self.bands.len() - 1])
    }

    pub fn range_for(&self, hour: f64) -> RangeInclusive<u32> {
        let band = self.band_for(hour);
        band.min..=band.max
    }

    pub fn bands(&self) -> &[LightBand] {
        &self.bands
    }
}

impl Default for LightBands {
    fn default() -> Self {
        Self::six_band()
    }
}

impl FromStr for LightBands {
    type Err = anyhow::Error;

    /// Parse a named light profile.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "six_band" => Ok(Self::six_band()),
            "day_night" => Ok(Self::day_night()),
            other => Err(anyhow::anyhow!("unknown light profile: {other:?}")),
        }
    }
}
