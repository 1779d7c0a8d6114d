// crates/placer-core/src/traits.rs

use crate::address::Address;
use crate::error::PlacerError;

/// Fungible reward-token ledger, maintained outside the engine.
///
/// Implemented by the host's token module. Balance storage, transfer
/// bookkeeping, and supply accounting are entirely the implementor's
/// concern; the engine calls each method exactly once per reconciled
/// amount.
pub trait RewardMint {
    /// Credit freshly mined reward tokens (smallest units) to `recipient`.
    fn credit_recipient(&mut self, recipient: Address, amount: u128) -> Result<(), PlacerError>;

    /// Grow the reward token's total supply by `amount` smallest units.
    fn increase_total_supply(&mut self, amount: u128) -> Result<(), PlacerError>;
}

/// Native-asset transfer surface of the host chain.
///
/// Used to refund deposit principal on withdrawal.
pub trait NativeBank {
    /// Transfer `amount` base-asset units to `to`.
    fn transfer_native(&mut self, to: Address, amount: u64) -> Result<(), PlacerError>;
}
