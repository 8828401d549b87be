use std::{str::FromStr, sync::Arc, time::Duration};

use anyhow::{Context, Result};

use crate::{
    generator::{
        Bounds, DiurnalCurve, DiurnalGenerator, GeneratorSettings, LightBands, PiecewiseLinear,
        Sinusoidal,
    },
    readings::{Schema, SensorLimits},
    timezone::ZonePolicy,
};

// ---------------------------------------------------------------------------
// CurveKind
// ---------------------------------------------------------------------------

/// Which diurnal temperature model the generator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    Linear,
    Sine,
}

impl FromStr for CurveKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(Self::Linear),
            "sine" => Ok(Self::Sine),
            other => Err(anyhow::anyhow!("unknown temperature curve: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Keys a pushed payload must carry.
    pub ingest_schema: Schema,
    /// Accepted temperature and humidity ranges for pushed readings.
    pub ingest_limits: SensorLimits,
    /// Readings returned when the caller gives no `limit`.
    pub query_limit: u32,
    /// Upper bound for a caller-supplied `limit`.
    pub query_limit_max: u32,
    pub zone: ZonePolicy,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub enabled: bool,
    pub device_id: String,
    /// Tick period.
    pub interval: Duration,
    pub generator: GeneratorSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(&lookup);

        let query_limit: u32 = env.parse("QUERY_LIMIT", "50")?;
        let query_limit_max: u32 = env.parse("QUERY_LIMIT_MAX", "500")?;
        anyhow::ensure!(query_limit > 0, "QUERY_LIMIT must be at least 1");
        anyhow::ensure!(
            query_limit <= query_limit_max,
            "QUERY_LIMIT must not exceed QUERY_LIMIT_MAX"
        );

        let offset_minutes: i32 = env.parse("STORE_UTC_OFFSET_MINUTES", "-360")?;
        let zone = ZonePolicy::from_offset_minutes(offset_minutes)
            .context("STORE_UTC_OFFSET_MINUTES must lie within ±24 hours")?;

        let ingest_limits = SensorLimits::new(
            (
                env.parse("INGEST_TEMP_MIN", "-40.0")?,
                env.parse("INGEST_TEMP_MAX", "85.0")?,
            ),
            (
                env.parse("INGEST_HUMIDITY_MIN", "0.0")?,
                env.parse("INGEST_HUMIDITY_MAX", "100.0")?,
            ),
        )
        .context("invalid INGEST_* limits")?;

        let interval_secs: u64 = env.parse("SIMULATION_INTERVAL_SECS", "60")?;
        anyhow::ensure!(interval_secs > 0, "SIMULATION_INTERVAL_SECS must be positive");

        Ok(Self {
            database_url: env.required("DATABASE_URL")?,
            server_host: env.optional("SERVER_HOST", "0.0.0.0"),
            server_port: env.parse("SERVER_PORT", "5000")?,
            ingest_schema: env.parse("INGEST_SCHEMA", "minimal")?,
            ingest_limits,
            query_limit,
            query_limit_max,
            zone,
            simulation: SimulationConfig {
                enabled: env.parse("SIMULATION_ENABLED", "true")?,
                device_id: env.optional("SIMULATION_DEVICE_ID", "simulated-esp32"),
                interval: Duration::from_secs(interval_secs),
                generator: generator_settings(&env)?,
            },
        })
    }
}

fn generator_settings(env: &Env<'_>) -> Result<GeneratorSettings> {
    let temperature = Bounds::new(
        "temperature",
        env.parse("TEMP_MIN", "6.0")?,
        env.parse("TEMP_MAX", "27.0")?,
    )?;
    let humidity = Bounds::new(
        "humidity",
        env.parse("HUMIDITY_MIN", "20.0")?,
        env.parse("HUMIDITY_MAX", "80.0")?,
    )?;

    let curve: Arc<dyn DiurnalCurve> = match env.parse::<CurveKind>("TEMP_CURVE", "linear")? {
        CurveKind::Linear => match env.get("TEMP_CURVE_BREAKPOINTS") {
            Some(raw) => Arc::new(
                PiecewiseLinear::new(parse_breakpoints(&raw)?)
                    .context("invalid TEMP_CURVE_BREAKPOINTS")?,
            ),
            None => Arc::new(PiecewiseLinear::default()),
        },
        CurveKind::Sine => Arc::new(
            Sinusoidal::new(env.parse("TEMP_PEAK_HOUR", "14")?).context("invalid TEMP_PEAK_HOUR")?,
        ),
    };

    let settings = GeneratorSettings {
        temperature,
        curve,
        noise_std_dev: env.parse("TEMP_NOISE_STD_DEV", "0.8")?,
        humidity,
        light: env.parse::<LightBands>("LIGHT_PROFILE", "six_band")?,
        motion_probability: env.parse("MOTION_PROBABILITY", "0.05")?,
    };
    DiurnalGenerator::new(settings.clone()).context("invalid simulation generator settings")?;
    Ok(settings)
}

/// Parse `"hour:fraction,hour:fraction"` into curve breakpoints.
fn parse_breakpoints(raw: &str) -> Result<Vec<(f64, f64)>> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|entry| {
            let (hour, fraction) = entry.split_once(':').with_context(|| {
                format!("TEMP_CURVE_BREAKPOINTS entry must be 'hour:fraction', got: {entry:?}")
            })?;
            let hour = hour
                .trim()
                .parse()
                .with_context(|| format!("bad hour in TEMP_CURVE_BREAKPOINTS entry {entry:?}"))?;
            let fraction = fraction
                .trim()
                .parse()
                .with_context(|| format!("bad fraction in TEMP_CURVE_BREAKPOINTS entry {entry:?}"))?;
            Ok((hour, fraction))
        })
        .collect()
}

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .with_context(|| format!("missing required env var: {key}"))
    }

    fn optional(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    fn parse<T>(&self, key: &str, default: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.optional(key, default);
        raw.trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value {raw:?} for {key}: {e}"))
    }
}
