// crates/placer-mining/src/engine.rs
//
// The mining engine: deposit lifecycle and lazy reward reconciliation
// against the cycle ledger.
//
// Every state-changing operation is a complete, serialized transition:
// caller-visible preconditions are checked before anything mutates, then the
// ledger is brought current, then registry state and collaborator calls
// follow. Reward owed to a deposit is settled lazily, by integrating
// reward-per-unit-stake over the award boundaries its cursor has crossed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use placer_core::{Address, NativeBank, PlacerError, RewardMint};

use crate::decimal::{Decimal, MAX_SCALE};
use crate::ledger::{CycleBucket, CycleLedger};
use crate::registry::{DepositRegistry, ParticipantLocks, RecipientEarnings, SequenceNumber};
use crate::schedule::PriceSchedule;

/// Construction parameters, validated once at engine creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Awarding cycle length in height units. Must be positive.
    pub cycle_length: u64,
    /// Halving period in height units; 0 disables halving.
    pub halving_period: u64,
    /// Unit reward price at creation.
    pub initial_price: Decimal,
    /// Decimal precision of the reward token. At most [`MAX_SCALE`].
    pub reward_decimals: u32,
    /// Smallest accepted deposit, in base-asset units.
    pub minimum_stake: u64,
    /// Minimum lock duration in height units. Must be positive.
    pub minimum_lock: u64,
    /// Cap on distinct depositor addresses; 0 means unlimited.
    pub max_participants: u32,
}

impl EngineConfig {
    /// Validate and normalize: the price is re-expressed at exactly
    /// `reward_decimals`.
    fn validated(mut self) -> Result<Self, PlacerError> {
        if self.cycle_length == 0 {
            return Err(PlacerError::InvalidConfiguration(
                "awarding cycle length must be positive".into(),
            ));
        }
        if self.minimum_lock == 0 {
            return Err(PlacerError::InvalidConfiguration(
                "minimum lock duration must be positive".into(),
            ));
        }
        if self.reward_decimals > MAX_SCALE {
            return Err(PlacerError::InvalidConfiguration(format!(
                "reward decimals must not exceed {}",
                MAX_SCALE
            )));
        }
        if self.initial_price.is_zero() {
            return Err(PlacerError::InvalidConfiguration(
                "initial price must be positive".into(),
            ));
        }
        self.initial_price = self.initial_price.rescale(self.reward_decimals).ok_or_else(|| {
            PlacerError::InvalidConfiguration(format!(
                "initial price carries more than {} decimal places",
                self.reward_decimals
            ))
        })?;
        Ok(self)
    }
}

/// The stake-to-earn engine.
///
/// Owns the cycle ledger, the deposit/mining registry, and the running
/// locked total. External collaborators (the reward-token ledger, the native
/// bank) are passed into the operations that need them; the current height
/// is always an explicit argument supplied by the host, monotonically
/// non-decreasing across calls.
#[derive(Debug)]
pub struct MiningEngine {
    config: EngineConfig,
    creation_height: u64,
    ledger: CycleLedger,
    registry: DepositRegistry,
    total_locked: u64,
}

impl MiningEngine {
    /// # Errors
    /// `InvalidConfiguration` for a non-positive cycle length, lock duration
    /// or price, excessive reward decimals, or a price carrying more
    /// fractional digits than the reward token can represent.
    pub fn new(config: EngineConfig, creation_height: u64) -> Result<Self, PlacerError> {
        let config = config.validated()?;
        let schedule = PriceSchedule::new(
            config.initial_price,
            creation_height,
            config.halving_period,
        );
        let ledger = CycleLedger::new(creation_height, config.cycle_length, schedule);
        Ok(Self {
            config,
            creation_height,
            ledger,
            registry: DepositRegistry::new(),
            total_locked: 0,
        })
    }

    /// Lock `amount` base-asset units for `owner`, accruing reward to
    /// `recipient` (the owner themselves in the common case). Earning starts
    /// at the next award boundary.
    ///
    /// # Errors
    /// `BelowMinimumStake` under the configured minimum;
    /// `CapacityExceeded` when a new depositor address would exceed the cap.
    pub fn lock(
        &mut self,
        owner: Address,
        recipient: Address,
        amount: u64,
        height: u64,
    ) -> Result<SequenceNumber, PlacerError> {
        if amount < self.config.minimum_stake {
            return Err(PlacerError::BelowMinimumStake {
                amount,
                minimum: self.config.minimum_stake,
            });
        }
        let cap = self.config.max_participants;
        if cap > 0
            && !self.registry.contains_participant(owner)
            && self.registry.participant_count() as u32 >= cap
        {
            return Err(PlacerError::CapacityExceeded(cap));
        }
        let total = self
            .total_locked
            .checked_add(amount)
            .ok_or(PlacerError::NumericOverflow)?;

        self.ledger.record_change(i128::from(amount), height)?;
        let sequence = self.registry.create_lock(owner, recipient, amount, height)?;
        self.total_locked = total;
        Ok(sequence)
    }

    /// Withdraw one deposit (`selector = Some(sequence)`) or all of the
    /// owner's deposits (`selector = None`). Pending rewards are settled
    /// first; the principal is refunded through `bank`. Returns the refunded
    /// amount.
    ///
    /// # Errors
    /// `StillLocked` while any covered deposit is inside its lock period;
    /// `UnknownParticipant` / `UnknownLockEvent` for missing records.
    pub fn withdraw(
        &mut self,
        owner: Address,
        selector: Option<SequenceNumber>,
        height: u64,
        mint: &mut dyn RewardMint,
        bank: &mut dyn NativeBank,
    ) -> Result<u64, PlacerError> {
        // Caller-visible checks first: nothing mutates on rejection.
        {
            let participant = self.registry.participant(owner)?;
            let minimum_lock = self.config.minimum_lock;
            match selector {
                Some(sequence) => {
                    let event = participant
                        .events
                        .get(&sequence)
                        .ok_or(PlacerError::UnknownLockEvent(sequence))?;
                    if event.is_within_lock_period(height, minimum_lock) {
                        return Err(PlacerError::StillLocked {
                            unlock_height: event.unlock_height(minimum_lock),
                        });
                    }
                }
                None => {
                    for event in participant.events.values() {
                        if event.is_within_lock_period(height, minimum_lock) {
                            return Err(PlacerError::StillLocked {
                                unlock_height: event.unlock_height(minimum_lock),
                            });
                        }
                    }
                }
            }
        }

        // Settle pending rewards before the stake leaves the pool.
        self.reconcile(owner, height, mint)?;

        let sequences: Vec<SequenceNumber> = match selector {
            Some(sequence) => vec![sequence],
            None => self.registry.participant(owner)?.events.keys().copied().collect(),
        };
        let mut refund: u64 = 0;
        for sequence in sequences {
            let event = self.registry.remove_lock(owner, sequence)?;
            self.ledger
                .apply_withdrawal(event.amount, height, event.lock_height)?;
            refund += event.amount;
        }
        self.total_locked = self
            .total_locked
            .checked_sub(refund)
            .ok_or(PlacerError::NumericOverflow)?;

        bank.transfer_native(owner, refund)?;
        Ok(refund)
    }

    /// Claim rewards for the caller's own deposits.
    ///
    /// # Errors
    /// `UnknownParticipant` if the caller has no earnings record or no
    /// deposits of their own.
    pub fn claim(
        &mut self,
        owner: Address,
        height: u64,
        mint: &mut dyn RewardMint,
    ) -> Result<u128, PlacerError> {
        if !self.registry.contains_earnings(owner) {
            return Err(PlacerError::UnknownParticipant(owner));
        }
        self.registry.participant(owner)?;
        self.reconcile(owner, height, mint)
    }

    /// Claim entry point for a reward recipient whose deposits were made by
    /// others: reconciles each distinct depositor behind the recipient's
    /// cursors exactly once, in address order.
    pub fn claim_for_recipient(
        &mut self,
        recipient: Address,
        height: u64,
        mint: &mut dyn RewardMint,
    ) -> Result<u128, PlacerError> {
        let owners: BTreeSet<Address> = self
            .registry
            .earnings(recipient)?
            .cursors
            .values()
            .map(|cursor| cursor.owner)
            .collect();
        let mut total: u128 = 0;
        for owner in owners {
            let minted = self.reconcile(owner, height, mint)?;
            total = add_u128(total, minted)?;
        }
        Ok(total)
    }

    /// Settle every award boundary the owner's deposits have crossed since
    /// their cursors were last advanced, minting the proceeds. Returns the
    /// total minted.
    fn reconcile(
        &mut self,
        owner: Address,
        height: u64,
        mint: &mut dyn RewardMint,
    ) -> Result<u128, PlacerError> {
        // Flush the timeline so the integral below has a bucket covering the
        // present cycle and every halving boundary crossed while dormant.
        self.ledger.record_change(0, height)?;
        let current_cycle = self.ledger.cycle_of(height);
        let cycle_length = self.config.cycle_length;

        let events: Vec<(SequenceNumber, u64, Address)> = self
            .registry
            .participant(owner)?
            .events
            .values()
            .map(|event| (event.sequence, event.amount, event.recipient))
            .collect();

        let mut payouts: BTreeMap<Address, u128> = BTreeMap::new();
        let mut minted: u128 = 0;
        for (sequence, amount, recipient) in events {
            let start_height = self
                .registry
                .cursor(recipient, sequence)?
                .next_unclaimed_cycle_start_height;
            let start_cycle = self.ledger.cycle_of(start_height);
            let elapsed = current_cycle.saturating_sub(start_cycle);

            let earned: u128 = if elapsed == 0 {
                0
            } else {
                let sum = self
                    .ledger
                    .sum_unit_price_over_range(start_cycle, current_cycle)?;
                sum.checked_mul_int(u128::from(amount))
                    .ok_or(PlacerError::NumericOverflow)?
                    .raw()
            };

            if elapsed > 0 {
                let cursor = self.registry.cursor_mut(recipient, sequence)?;
                let advanced = elapsed
                    .checked_mul(cycle_length)
                    .and_then(|step| cursor.next_unclaimed_cycle_start_height.checked_add(step))
                    .ok_or(PlacerError::NumericOverflow)?;
                // Clamp so the cursor never overtakes the clock; mid-cycle
                // deposits carry a partial-cycle offset.
                cursor.next_unclaimed_cycle_start_height = advanced.min(height);
                cursor.claimed_cycles += elapsed;
                cursor.accrued = add_u128(cursor.accrued, earned)?;
            }

            let earnings = self.registry.earnings_mut(recipient)?;
            earnings.total_earned = add_u128(earnings.total_earned, earned)?;
            earnings.total_received = add_u128(earnings.total_received, earned)?;

            let entry = payouts.entry(recipient).or_insert(0);
            *entry = add_u128(*entry, earned)?;
            minted = add_u128(minted, earned)?;
        }

        // Each recipient is credited exactly once, the supply exactly once.
        for (recipient, amount) in &payouts {
            mint.credit_recipient(*recipient, *amount)?;
        }
        mint.increase_total_supply(minted)?;
        Ok(minted)
    }

    pub fn creation_height(&self) -> u64 {
        self.creation_height
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn total_locked(&self) -> u64 {
        self.total_locked
    }

    pub fn participant_count(&self) -> usize {
        self.registry.participant_count()
    }

    /// Awarding cycle containing `height`.
    pub fn current_cycle(&self, height: u64) -> u64 {
        self.ledger.cycle_of(height)
    }

    /// Unit price at `height` per the halving schedule.
    pub fn unit_price_at(&self, height: u64) -> Result<Decimal, PlacerError> {
        self.ledger.price_at(height)
    }

    /// Reward per locked unit at the latest recorded snapshot, if the
    /// timeline has one with stake present.
    pub fn current_price(&self) -> Option<Decimal> {
        let bucket = self.ledger.latest()?;
        if bucket.locked_total == 0 {
            return None;
        }
        bucket
            .unit_price
            .div_int_trunc(u128::from(bucket.locked_total))
    }

    pub fn deposit_of(&self, owner: Address) -> Result<&ParticipantLocks, PlacerError> {
        self.registry.participant(owner)
    }

    pub fn earnings_of(&self, recipient: Address) -> Result<&RecipientEarnings, PlacerError> {
        self.registry.earnings(recipient)
    }

    pub fn buckets(&self) -> &[CycleBucket] {
        self.ledger.buckets()
    }
}

fn add_u128(a: u128, b: u128) -> Result<u128, PlacerError> {
    a.checked_add(b).ok_or(PlacerError::NumericOverflow)
}
