// crates/placer-mining/src/registry.rs
//
// Per-owner lock events and per-recipient earning cursors.
//
// Two maps: owners to their lock events (who may withdraw), recipients to
// their earning cursors (who accrues reward). A lock event and its cursor
// share a globally unique sequence number and live and die together; the
// owner and the recipient are the same address in the common case, distinct
// when a deposit mines for a third party.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use placer_core::{Address, PlacerError};

pub type SequenceNumber = u64;

/// A single deposit: `amount` base-asset units locked at `lock_height`.
/// Immutable once created; removed as a whole on withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEvent {
    pub sequence: SequenceNumber,
    pub amount: u64,
    pub lock_height: u64,
    /// Address that may withdraw this deposit.
    pub owner: Address,
    /// Address credited with the reward it mines.
    pub recipient: Address,
}

impl LockEvent {
    /// First height at which this deposit may be withdrawn.
    pub fn unlock_height(&self, minimum_lock: u64) -> u64 {
        self.lock_height + minimum_lock + 1
    }

    /// True while the deposit is inside its minimum lock period.
    pub fn is_within_lock_period(&self, current_height: u64, minimum_lock: u64) -> bool {
        current_height < self.unlock_height(minimum_lock)
    }
}

/// Per-owner aggregate over live lock events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantLocks {
    pub owner: Address,
    /// Sum of the contained events' amounts.
    pub total_locked: u64,
    pub lock_count: u32,
    pub events: BTreeMap<SequenceNumber, LockEvent>,
}

/// Reconciliation cursor for one lock event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningCursor {
    pub sequence: SequenceNumber,
    /// Depositor behind this cursor, so a recipient can trigger
    /// reconciliation of deposits made on their behalf.
    pub owner: Address,
    /// Height from which unclaimed reward accrual begins. Non-decreasing,
    /// never ahead of the height that last advanced it.
    pub next_unclaimed_cycle_start_height: u64,
    /// Reward (smallest units) accrued through this cursor so far.
    pub accrued: u128,
    /// Award boundaries settled so far.
    pub claimed_cycles: u64,
}

/// Per-recipient aggregate over earning cursors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientEarnings {
    pub recipient: Address,
    pub total_earned: u128,
    /// Paid out so far. Equals `total_earned`: reward is minted the moment
    /// it is computed.
    pub total_received: u128,
    pub cursors: BTreeMap<SequenceNumber, EarningCursor>,
}

/// The deposit/mining registry. A plain store, passed by reference into each
/// engine operation; it performs bookkeeping only and leaves policy
/// (minimums, caps, lock periods) to the engine.
#[derive(Debug, Clone)]
pub struct DepositRegistry {
    next_sequence: SequenceNumber,
    locks: HashMap<Address, ParticipantLocks>,
    earnings: HashMap<Address, RecipientEarnings>,
}

impl DepositRegistry {
    pub fn new() -> Self {
        Self {
            next_sequence: 1,
            locks: HashMap::new(),
            earnings: HashMap::new(),
        }
    }

    /// Register a new lock event and its earning cursor, returning the
    /// assigned sequence number.
    pub fn create_lock(
        &mut self,
        owner: Address,
        recipient: Address,
        amount: u64,
        lock_height: u64,
    ) -> Result<SequenceNumber, PlacerError> {
        let sequence = self.next_sequence;
        let participant = self.locks.entry(owner).or_insert_with(|| ParticipantLocks {
            owner,
            total_locked: 0,
            lock_count: 0,
            events: BTreeMap::new(),
        });
        participant.total_locked = participant
            .total_locked
            .checked_add(amount)
            .ok_or(PlacerError::NumericOverflow)?;
        participant.lock_count += 1;
        participant.events.insert(
            sequence,
            LockEvent {
                sequence,
                amount,
                lock_height,
                owner,
                recipient,
            },
        );

        let earnings = self
            .earnings
            .entry(recipient)
            .or_insert_with(|| RecipientEarnings {
                recipient,
                total_earned: 0,
                total_received: 0,
                cursors: BTreeMap::new(),
            });
        earnings.cursors.insert(
            sequence,
            EarningCursor {
                sequence,
                owner,
                next_unclaimed_cycle_start_height: lock_height,
                accrued: 0,
                claimed_cycles: 0,
            },
        );

        self.next_sequence += 1;
        Ok(sequence)
    }

    /// Remove a lock event and its cursor, pruning aggregates that become
    /// empty. Returns the removed event.
    pub fn remove_lock(
        &mut self,
        owner: Address,
        sequence: SequenceNumber,
    ) -> Result<LockEvent, PlacerError> {
        let participant = self
            .locks
            .get_mut(&owner)
            .ok_or(PlacerError::UnknownParticipant(owner))?;
        let event = participant
            .events
            .remove(&sequence)
            .ok_or(PlacerError::UnknownLockEvent(sequence))?;
        participant.total_locked -= event.amount;
        participant.lock_count -= 1;
        if participant.events.is_empty() {
            self.locks.remove(&owner);
        }

        if let Some(earnings) = self.earnings.get_mut(&event.recipient) {
            earnings.cursors.remove(&sequence);
            if earnings.cursors.is_empty() {
                self.earnings.remove(&event.recipient);
            }
        }
        Ok(event)
    }

    pub fn participant(&self, owner: Address) -> Result<&ParticipantLocks, PlacerError> {
        self.locks
            .get(&owner)
            .ok_or(PlacerError::UnknownParticipant(owner))
    }

    pub fn contains_participant(&self, owner: Address) -> bool {
        self.locks.contains_key(&owner)
    }

    pub fn participant_count(&self) -> usize {
        self.locks.len()
    }

    pub fn earnings(&self, recipient: Address) -> Result<&RecipientEarnings, PlacerError> {
        self.earnings
            .get(&recipient)
            .ok_or(PlacerError::UnknownParticipant(recipient))
    }

    pub fn contains_earnings(&self, recipient: Address) -> bool {
        self.earnings.contains_key(&recipient)
    }

    /// Look up a cursor by sequence number alone. A view helper; keyed
    /// access goes through the recipient.
    pub fn cursor_for(&self, sequence: SequenceNumber) -> Option<&EarningCursor> {
        self.earnings
            .values()
            .find_map(|e| e.cursors.get(&sequence))
    }

    pub(crate) fn cursor(
        &self,
        recipient: Address,
        sequence: SequenceNumber,
    ) -> Result<&EarningCursor, PlacerError> {
        self.earnings(recipient)?
            .cursors
            .get(&sequence)
            .ok_or(PlacerError::UnknownLockEvent(sequence))
    }

    pub(crate) fn cursor_mut(
        &mut self,
        recipient: Address,
        sequence: SequenceNumber,
    ) -> Result<&mut EarningCursor, PlacerError> {
        self.earnings
            .get_mut(&recipient)
            .ok_or(PlacerError::UnknownParticipant(recipient))?
            .cursors
            .get_mut(&sequence)
            .ok_or(PlacerError::UnknownLockEvent(sequence))
    }

    pub(crate) fn earnings_mut(
        &mut self,
        recipient: Address,
    ) -> Result<&mut RecipientEarnings, PlacerError> {
        self.earnings
            .get_mut(&recipient)
            .ok_or(PlacerError::UnknownParticipant(recipient))
    }
}

impl Default for DepositRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address([byte; 32])
    }

    #[test]
    fn test_create_lock_assigns_increasing_sequences() {
        let mut registry = DepositRegistry::new();
        let first = registry.create_lock(addr(1), addr(1), 100, 10).unwrap();
        let second = registry.create_lock(addr(2), addr(2), 200, 10).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_participant_aggregates() {
        let mut registry = DepositRegistry::new();
        registry.create_lock(addr(1), addr(1), 100, 10).unwrap();
        registry.create_lock(addr(1), addr(1), 250, 20).unwrap();
        let participant = registry.participant(addr(1)).unwrap();
        assert_eq!(participant.total_locked, 350);
        assert_eq!(participant.lock_count, 2);
        assert_eq!(participant.events.len(), 2);
    }

    #[test]
    fn test_cursor_starts_at_lock_height() {
        let mut registry = DepositRegistry::new();
        let seq = registry.create_lock(addr(1), addr(2), 100, 77).unwrap();
        let cursor = registry.cursor_for(seq).unwrap();
        assert_eq!(cursor.next_unclaimed_cycle_start_height, 77);
        assert_eq!(cursor.owner, addr(1));
        assert_eq!(cursor.accrued, 0);
    }

    #[test]
    fn test_remove_lock_prunes_empty_aggregates() {
        let mut registry = DepositRegistry::new();
        let seq = registry.create_lock(addr(1), addr(2), 100, 10).unwrap();
        let event = registry.remove_lock(addr(1), seq).unwrap();
        assert_eq!(event.amount, 100);
        assert!(!registry.contains_participant(addr(1)));
        assert!(!registry.contains_earnings(addr(2)));
        assert!(registry.cursor_for(seq).is_none());
    }

    #[test]
    fn test_remove_one_of_two_keeps_aggregates() {
        let mut registry = DepositRegistry::new();
        let first = registry.create_lock(addr(1), addr(1), 100, 10).unwrap();
        registry.create_lock(addr(1), addr(1), 200, 10).unwrap();
        registry.remove_lock(addr(1), first).unwrap();
        let participant = registry.participant(addr(1)).unwrap();
        assert_eq!(participant.total_locked, 200);
        assert_eq!(participant.lock_count, 1);
        assert!(registry.contains_earnings(addr(1)));
    }

    #[test]
    fn test_unknown_lookups() {
        let mut registry = DepositRegistry::new();
        assert!(matches!(
            registry.participant(addr(9)),
            Err(PlacerError::UnknownParticipant(_))
        ));
        registry.create_lock(addr(1), addr(1), 100, 10).unwrap();
        assert!(matches!(
            registry.remove_lock(addr(1), 42),
            Err(PlacerError::UnknownLockEvent(42))
        ));
    }

    #[test]
    fn test_lock_period_window() {
        let event = LockEvent {
            sequence: 1,
            amount: 100,
            lock_height: 50,
            owner: addr(1),
            recipient: addr(1),
        };
        // Unlocks at lock_height + minimum_lock + 1.
        assert_eq!(event.unlock_height(10), 61);
        assert!(event.is_within_lock_period(60, 10));
        assert!(!event.is_within_lock_period(61, 10));
    }
}
