use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    db::{ReadingStore, StoreError},
    readings::{self, Schema, SensorLimits, ValidationError},
    timezone::ZonePolicy,
};

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Accepts readings pushed by devices.
#[derive(Clone)]
pub struct IngestionGateway {
    store: Arc<dyn ReadingStore>,
    schema: Schema,
    limits: SensorLimits,
    zone: ZonePolicy,
}

impl IngestionGateway {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        schema: Schema,
        limits: SensorLimits,
        zone: ZonePolicy,
    ) -> Self {
        Self {
            store,
            schema,
            limits,
            zone,
        }
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Validates `payload` against the active schema and limits, stamps it with a fresh
    /// id and the receive time in the reference zone, and appends it.
    ///
    /// Nothing is written when validation fails. Store failures are logged
    /// here with the payload and returned as-is; there is no retry inside
    /// the request.
    pub async fn ingest(&self, payload: &Value) -> Result<Uuid, IngestError> {
        let new = match readings::validate(payload, self.schema, &self.limits) {
            Ok(new) => new,
            Err(e) => {
                info!(schema = %self.schema, error = %e, "Rejected device payload");
                return Err(e.into());
            }
        };

        let reading = new.into_reading(Uuid::new_v4(), self.zone.now());
        match self.store.insert(&reading).await {
            Ok(id) => {
                info!(device_id = %reading.device_id, id = %id, "Device reading stored");
                Ok(id)
            }
            Err(e) => {
                error!(
                    op = "insert",
                    device_id = %reading.device_id,
                    timestamp = %reading.timestamp.to_rfc3339(),
                    payload = %payload,
                    error = %e,
                    "Failed to store device reading"
                );
                Err(e.into())
            }
        }
    }
}
