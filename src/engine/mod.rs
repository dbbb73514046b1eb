pub mod actions;
pub mod applier;
pub mod catalog;
pub mod context;
pub mod errors;
pub mod intent;
pub mod invariants;
pub mod resolver;
pub mod state;
pub mod types;
pub mod zones;

pub use actions::*;
pub use applier::*;
pub use catalog::*;
pub use context::*;
pub use errors::*;
pub use intent::*;
pub use invariants::*;
pub use resolver::*;
pub use state::*;
pub use types::*;
pub use zones::*;
