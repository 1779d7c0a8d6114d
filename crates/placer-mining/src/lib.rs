// crates/placer-mining/src/lib.rs
//
// placer-mining: stake-to-earn accounting for the Placer engine.
//
// Participants lock base-asset units and accrue a mintable reward token at a
// halving unit price, shared proportionally among all locked deposits. The
// cycle ledger keeps a run-length-compressed timeline of
// (locked total, price) snapshots; reward for a deposit is settled lazily by
// integrating reward-per-unit-stake over the award boundaries it has
// crossed since its last reconciliation.

pub mod decimal;
pub mod engine;
pub mod ledger;
pub mod registry;
pub mod schedule;

// Re-export key types for ergonomic access from downstream crates.
pub use decimal::{Decimal, MAX_SCALE};
pub use engine::{EngineConfig, MiningEngine};
pub use ledger::{CycleBucket, CycleLedger};
pub use registry::{
    DepositRegistry, EarningCursor, LockEvent, ParticipantLocks, RecipientEarnings,
    SequenceNumber,
};
pub use schedule::{PriceSchedule, MAX_HALVING_ROUNDS};
