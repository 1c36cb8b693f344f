//! Trust balance derivation and reconciliation snapshots

pub mod balance;
pub mod snapshot;

pub use balance::*;
pub use snapshot::*;
