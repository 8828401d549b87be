mod service;

pub use service::{LoopExit, LoopState, SimulationLoop};
