use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::query::ReadingView;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadingDto {
    pub id: String,
    #[serde(rename = "dispositivo")]
    pub device_id: String,
    /// Degrees Celsius
    #[serde(rename = "temperatura")]
    pub temperature: f64,
    /// Relative humidity percentage
    #[serde(rename = "humedad")]
    pub humidity: f64,
    #[serde(rename = "luz", skip_serializing_if = "Option::is_none")]
    pub light: Option<i64>,
    /// 0 = no motion, 1 = motion.
    #[serde(rename = "movimiento", skip_serializing_if = "Option::is_none")]
    pub motion: Option<u8>,
    /// RFC 3339 in the reference zone, or `"invalid-timestamp"`.
    pub timestamp: String,
}

impl From<ReadingView> for ReadingDto {
    fn from(r: ReadingView) -> Self {
        Self {
            id: r.id.to_string(),
            timestamp: r.timestamp.to_string(),
            device_id: r.device_id,
            temperature: r.temperature,
            humidity: r.humidity,
            light: r.light,
            motion: r.motion.map(encode_bool),
        }
    }
}

/// Body of `POST /api/data`. Which keys are required depends on the
/// deployment's ingestion schema; `luz` and `movimiento` are only required
/// under the extended schema.
#[derive(Debug, Deserialize, ToSchema)]
pub struct IngestRequest {
    pub dispositivo: String,
    pub temperatura: f64,
    pub humedad: f64,
    pub luz: Option<i64>,
    /// 0 or 1
    pub movimiento: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    pub message: String,
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Encode a boolean reading as an integer (`false` → 0, `true` → 1).
#[inline]
pub(crate) fn encode_bool(v: bool) -> u8 {
    v as u8
}
