pub mod error;
pub mod runner;
pub mod service;
pub mod storage;

pub use error::StorageError;
pub use runner::{CommittedMutation, MutationRequest, TransactionRunner};
pub use service::{DeckCard, OwnerView, SessionEngine, SubmitCommand, SubmitOutcome, SubmitReceipt};
pub use storage::{DocumentPath, InMemorySessionStorage, SessionStorage, SessionStorageTxn};

#[cfg(test)]
mod tests;
