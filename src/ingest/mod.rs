mod service;

pub use service::{IngestError, IngestionGateway};
