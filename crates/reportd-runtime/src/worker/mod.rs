mod engine;

pub use engine::{TickOutcome, WorkerEngine, WorkerEngineConfig};
