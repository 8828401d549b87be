mod service;

pub use service::{QueryService, ReadingView, ViewTimestamp};
