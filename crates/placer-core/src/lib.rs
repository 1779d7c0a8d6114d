// crates/placer-core/src/lib.rs
//
// placer-core: core types, errors, and collaborator traits for the Placer
// stake-to-earn engine.
//
// This is the leaf crate the engine depends on. It defines the opaque
// address type, the engine-wide error enum, and the trait seams through
// which the engine reaches its external collaborators: the reward-token
// ledger and the host chain's native-asset transfer.

pub mod address;
pub mod error;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
pub use address::Address;
pub use error::PlacerError;
pub use traits::{NativeBank, RewardMint};
