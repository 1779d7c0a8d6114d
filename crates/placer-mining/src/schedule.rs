// crates/placer-mining/src/schedule.rs
//
// Unit reward price schedule with halving.
//
// The price starts at the configured initial value and halves every
// `halving_period` heights, for at most 90 rounds split into three tiers of
// 30. A disabled schedule (period 0) keeps the initial price forever.
// Rounds past 90 are a configuration the schedule refuses to price: accrual
// fails loudly instead of silently paying zero.

use serde::{Deserialize, Serialize};

use placer_core::PlacerError;

use crate::decimal::Decimal;

/// Number of supported halving rounds.
pub const MAX_HALVING_ROUNDS: u64 = 90;

/// Rounds per divisor tier.
const TIER_ROUNDS: u64 = 30;

/// Divisor contributed by one full tier: 2^30. Assembling the divisor from
/// tier constants keeps every shift at 30 bits or less.
const TIER_BASE: u128 = 1 << TIER_ROUNDS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSchedule {
    initial_price: Decimal,
    creation_height: u64,
    halving_period: u64,
}

impl PriceSchedule {
    pub fn new(initial_price: Decimal, creation_height: u64, halving_period: u64) -> Self {
        Self {
            initial_price,
            creation_height,
            halving_period,
        }
    }

    pub fn initial_price(&self) -> Decimal {
        self.initial_price
    }

    /// The unit price in effect at `height`.
    ///
    /// The round is `(height - creation_height - 1) / halving_period`: the
    /// price drops one height *after* each halving boundary, so the boundary
    /// height itself still pays at the outgoing round's price.
    ///
    /// # Errors
    /// `HalvingExhausted` once the round exceeds [`MAX_HALVING_ROUNDS`].
    pub fn price_at(&self, height: u64) -> Result<Decimal, PlacerError> {
        if self.halving_period == 0 {
            return Ok(self.initial_price);
        }
        let round = height.saturating_sub(self.creation_height + 1) / self.halving_period;
        if round == 0 {
            Ok(self.initial_price)
        } else {
            self.halving_price(round)
        }
    }

    /// Classify `height` into its halving round for boundary detection.
    ///
    /// Unlike [`price_at`](Self::price_at) this counts the boundary height
    /// itself into the opening round, which is what boundary-crossing
    /// detection needs.
    pub fn halving_round_of(&self, height: u64) -> u64 {
        if self.halving_period == 0 {
            0
        } else {
            height.saturating_sub(self.creation_height) / self.halving_period
        }
    }

    /// Height of the halving boundary that opens `round`.
    pub fn boundary_height(&self, round: u64) -> u64 {
        self.creation_height + round * self.halving_period
    }

    /// Price for halving round `round` (>= 1): the initial price divided by
    /// 2^round. Rounds 30, 60, and 90 resolve in the tier that ends at them;
    /// the divisor is 2^round under any tier assignment.
    fn halving_price(&self, round: u64) -> Result<Decimal, PlacerError> {
        let divisor: u128 = match round {
            1..=30 => 1u128 << round,
            31..=60 => TIER_BASE << (round - TIER_ROUNDS),
            61..=90 => TIER_BASE * TIER_BASE << (round - 2 * TIER_ROUNDS),
            _ => return Err(PlacerError::HalvingExhausted(round)),
        };
        self.initial_price
            .div_int_trunc(divisor)
            .ok_or(PlacerError::NumericOverflow)
    }
}
