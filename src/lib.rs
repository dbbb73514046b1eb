pub mod config;
pub mod engine;
pub mod session;
pub mod tokio_tools;

#[cfg(test)]
pub mod test_utils;

pub use config::EngineConfig;
pub use session::{SessionEngine, SubmitCommand, SubmitOutcome};
