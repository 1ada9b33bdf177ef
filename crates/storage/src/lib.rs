//! Broker Storage
//!
//! In-memory implementations of the provider catalog, request store and
//! budget ledger used by the provider broker.

pub mod budget_ledger;
pub mod memory_store;

pub use budget_ledger::{MemoryBudgetLedger, UserLimits};
pub use memory_store::MemoryStore;
