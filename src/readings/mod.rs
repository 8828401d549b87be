pub mod model;

pub use model::{validate, NewReading, Reading, Schema, SensorLimits, ValidationError};
