//! # Trustbook Core
//!
//! Core trust-accounting functionality for short-term-rental property
//! management: money held on behalf of property owners and tax authorities
//! until bookings are delivered and settled.
//!
//! ## Features
//!
//! - **Fee resolution**: property override → owner default → global default
//! - **Booking splits**: net revenue, management fee, and owner payout in
//!   exact decimal arithmetic
//! - **Trust balance**: aggregates outstanding bookings and the latest
//!   processor balance into an expected trust balance
//! - **Reconciliation snapshots**: immutable expected-vs-actual comparisons
//!   with serialized audit line items
//! - **Settlement tracking**: idempotent owner payouts and tax remittances
//! - **Ingestion**: merges provider records by stable external identifier
//! - **Storage abstraction**: database-agnostic design with trait-based
//!   storage and atomic write batches
//!
//! ## Quick Start
//!
//! ```rust
//! use trustbook_core::{MemoryStorage, ReconciliationSnapshotEngine};
//!
//! // Production code implements the TrustStorage trait over a real store;
//! // MemoryStorage works for tests and development.
//! let storage = MemoryStorage::new();
//! let _engine = ReconciliationSnapshotEngine::new(storage);
//! // let snapshot = engine.create_snapshot(today, &TrustConfig::default()).await?;
//! ```

pub mod finance;
pub mod reconciliation;
pub mod settlement;
pub mod sync;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use finance::*;
pub use reconciliation::*;
pub use settlement::*;
pub use sync::*;
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::MemoryStorage;
