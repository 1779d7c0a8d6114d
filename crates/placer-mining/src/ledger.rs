// crates/placer-mining/src/ledger.rs
//
// Run-length-compressed timeline of (locked total, unit price) snapshots.
//
// The ledger records one bucket per awarding cycle in which the locked total
// changed or a halving boundary forced a price anchor. A bucket at cycle
// index `c` with run length `r` covers the `r` award boundaries
// `c-r+1 ..= c`; boundary `b` falls at height `creation + b * cycle_length`
// and pays for the window preceding it. A deposit made during cycle `c`
// registers at bucket `c+1`: a mid-cycle lock starts earning at the next
// boundary.
//
// Buckets are append-only and never deleted, so a deposit that has not
// claimed in a long time can still be reconciled against the exact totals
// and prices of every boundary it slept through. Memory grows with the
// number of state changes, never with elapsed time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use placer_core::PlacerError;

use crate::decimal::Decimal;
use crate::schedule::PriceSchedule;

/// One recorded (locked total, unit price) snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleBucket {
    /// Cycle index this snapshot is anchored at (0-based from creation).
    pub cycle: u64,
    /// Total locked base-asset units in effect for the covered boundaries.
    pub locked_total: u64,
    /// Unit reward price in effect for the covered boundaries.
    pub unit_price: Decimal,
    /// Number of consecutive award boundaries, ending at `cycle`, that this
    /// snapshot covers (counted back to the previously recorded bucket).
    pub run_length: u64,
}

impl CycleBucket {
    /// First award boundary this bucket's run covers.
    fn run_start(&self) -> u64 {
        self.cycle + 1 - self.run_length
    }
}

#[derive(Debug, Clone)]
pub struct CycleLedger {
    creation_height: u64,
    cycle_length: u64,
    schedule: PriceSchedule,
    buckets: Vec<CycleBucket>,
    /// Sparse index: cycle -> position in `buckets`.
    index: BTreeMap<u64, usize>,
    last_recorded_cycle: u64,
    last_recorded_height: u64,
}

impl CycleLedger {
    pub fn new(creation_height: u64, cycle_length: u64, schedule: PriceSchedule) -> Self {
        Self {
            creation_height,
            cycle_length,
            schedule,
            buckets: Vec::new(),
            index: BTreeMap::new(),
            last_recorded_cycle: 0,
            last_recorded_height: creation_height,
        }
    }

    /// Awarding cycle containing `height`.
    pub fn cycle_of(&self, height: u64) -> u64 {
        height.saturating_sub(self.creation_height) / self.cycle_length
    }

    /// Unit price in effect at `height`, per the halving schedule.
    pub fn price_at(&self, height: u64) -> Result<Decimal, PlacerError> {
        self.schedule.price_at(height)
    }

    pub fn buckets(&self) -> &[CycleBucket] {
        &self.buckets
    }

    pub fn latest(&self) -> Option<&CycleBucket> {
        self.buckets.last()
    }

    pub fn last_recorded_cycle(&self) -> u64 {
        self.last_recorded_cycle
    }

    pub fn last_recorded_height(&self) -> u64 {
        self.last_recorded_height
    }

    /// Record a change of `delta` locked units observed at `height`, keeping
    /// the timeline current. Called with `delta == 0` once per
    /// reconciliation pass so the timeline always covers the present cycle.
    ///
    /// Three steps, each append-only:
    /// 1. anchor every halving boundary crossed since the last recorded
    ///    height;
    /// 2. anchor the current cycle with a carry bucket, so that elapsed
    ///    boundaries keep the totals they actually paid at;
    /// 3. land the change in the bucket for the *next* boundary, created
    ///    fresh (run length 1) or updated in place when several changes fall
    ///    into the same cycle.
    ///
    /// Step 2 is what keeps the next-boundary bucket's run length at 1:
    /// a later withdrawal may debit it without repricing any boundary that
    /// has already elapsed.
    ///
    /// # Errors
    /// `HalvingExhausted` past the schedule's supported rounds;
    /// `NumericOverflow` if the bucket total over- or underflows.
    pub fn record_change(&mut self, delta: i128, height: u64) -> Result<(), PlacerError> {
        debug_assert!(
            height >= self.last_recorded_height,
            "host heights must be monotonically non-decreasing"
        );
        let price = self.schedule.price_at(height)?;
        self.insert_halving_boundaries(height)?;

        let current = self.cycle_of(height);
        self.anchor_cycle(current, price);

        let target = current + 1;
        if let Some(&pos) = self.index.get(&target) {
            let bucket = &mut self.buckets[pos];
            bucket.locked_total = apply_delta(bucket.locked_total, delta)?;
            bucket.unit_price = price;
        } else {
            let (carried, run_length) = match self.buckets.last() {
                Some(prev) => (prev.locked_total, target - prev.cycle),
                None => (0, 1),
            };
            let locked_total = apply_delta(carried, delta)?;
            self.push_bucket(target, locked_total, price, run_length);
        }
        self.last_recorded_height = self.last_recorded_height.max(height);
        Ok(())
    }

    /// Remove a withdrawn deposit from the timeline at `current_height`.
    ///
    /// Both the same-cycle and the cross-cycle case debit the bucket at
    /// `cycle_of(current_height) + 1`: the first boundary the departing
    /// stake will not attend. Elapsed boundaries are never repriced; they
    /// are paid history that other participants may still reconcile
    /// against.
    pub fn apply_withdrawal(
        &mut self,
        amount: u64,
        current_height: u64,
        deposit_height: u64,
    ) -> Result<(), PlacerError> {
        let current_cycle = self.cycle_of(current_height);
        if self.cycle_of(deposit_height) == current_cycle
            && !self.index.contains_key(&(current_cycle + 1))
        {
            // A deposit leaving within its own cycle must still have its
            // registration bucket.
            return Err(PlacerError::NoActivityRecorded(current_cycle + 1));
        }
        self.record_change(-i128::from(amount), current_height)
    }

    /// Rectangle-rule integral of reward-per-unit-stake over the award
    /// boundaries in `(start_cycle, end_cycle]`.
    ///
    /// Starting from the first indexed bucket at or past `start_cycle + 1`,
    /// each bucket contributes `trunc(price / locked_total) * overlap`,
    /// where `overlap` clips the bucket's covered run to the requested
    /// range. Buckets with zero locked total contribute nothing; no stake
    /// was present to earn.
    ///
    /// # Errors
    /// `NoActivityRecorded` if the timeline is empty or `start_cycle`
    /// predates its coverage. Both indicate a broken cursor invariant.
    pub fn sum_unit_price_over_range(
        &self,
        start_cycle: u64,
        end_cycle: u64,
    ) -> Result<Decimal, PlacerError> {
        let first = self
            .buckets
            .first()
            .ok_or(PlacerError::NoActivityRecorded(start_cycle))?;
        if start_cycle + 1 < first.run_start() {
            return Err(PlacerError::NoActivityRecorded(start_cycle));
        }

        let mut sum = Decimal::zero(self.schedule.initial_price().scale());
        let begin = match self.index.range(start_cycle + 1..).next() {
            Some((_, &pos)) => pos,
            None => return Ok(sum),
        };
        for bucket in &self.buckets[begin..] {
            let lo = bucket.run_start().max(start_cycle + 1);
            if lo > end_cycle {
                break;
            }
            let boundaries = bucket.cycle.min(end_cycle) - lo + 1;
            if bucket.locked_total == 0 {
                continue;
            }
            let per_unit = bucket
                .unit_price
                .div_int_trunc(u128::from(bucket.locked_total))
                .ok_or(PlacerError::NumericOverflow)?;
            let contribution = per_unit
                .checked_mul_int(u128::from(boundaries))
                .ok_or(PlacerError::NumericOverflow)?;
            sum = sum
                .checked_add(contribution)
                .ok_or(PlacerError::NumericOverflow)?;
        }
        Ok(sum)
    }

    /// Anchor every halving boundary crossed since the last recorded height
    /// with a synthetic bucket carrying the previous total and the opening
    /// round's price. One bucket per crossed boundary, in round order;
    /// anchoring only the latest boundary would price a dormant round's
    /// cycles at whichever round the next caller happened to arrive in,
    /// making results depend on call order.
    fn insert_halving_boundaries(&mut self, height: u64) -> Result<(), PlacerError> {
        let last_round = self.schedule.halving_round_of(self.last_recorded_height);
        let current_round = self.schedule.halving_round_of(height);
        for round in (last_round + 1)..=current_round {
            let boundary = self.schedule.boundary_height(round);
            let cycle = self.cycle_of(boundary);
            // The opening round's price takes effect one height past the
            // boundary.
            let price = self.schedule.price_at(boundary + 1)?;
            self.anchor_cycle(cycle, price);
        }
        Ok(())
    }

    /// Ensure a bucket exists at exactly `cycle`, carrying the previous
    /// total forward. Skipped when activity already recorded this cycle or
    /// a later one; the next in-place price refresh anchors any pending
    /// price change instead.
    fn anchor_cycle(&mut self, cycle: u64, price: Decimal) {
        match self.buckets.last() {
            Some(prev) if prev.cycle >= cycle => {}
            Some(prev) => {
                let run_length = cycle - prev.cycle;
                let carried = prev.locked_total;
                self.push_bucket(cycle, carried, price, run_length);
            }
            None => self.push_bucket(cycle, 0, price, 1),
        }
    }

    fn push_bucket(&mut self, cycle: u64, locked_total: u64, unit_price: Decimal, run_length: u64) {
        self.index.insert(cycle, self.buckets.len());
        self.buckets.push(CycleBucket {
            cycle,
            locked_total,
            unit_price,
            run_length,
        });
        self.last_recorded_cycle = self.last_recorded_cycle.max(cycle);
    }
}

fn apply_delta(total: u64, delta: i128) -> Result<u64, PlacerError> {
    let next = i128::from(total) + delta;
    u64::try_from(next).map_err(|_| PlacerError::NumericOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(cycle_length: u64, halving_period: u64) -> CycleLedger {
        // Initial price 10, two decimal places.
        let schedule = PriceSchedule::new(Decimal::from_int(10, 2).unwrap(), 0, halving_period);
        CycleLedger::new(0, cycle_length, schedule)
    }

    fn cycles(ledger: &CycleLedger) -> Vec<u64> {
        ledger.buckets().iter().map(|b| b.cycle).collect()
    }

    fn totals(ledger: &CycleLedger) -> Vec<u64> {
        ledger.buckets().iter().map(|b| b.locked_total).collect()
    }

    fn assert_tiling(ledger: &CycleLedger) {
        // Adjacent runs must tile the cycle axis without gap or overlap.
        for pair in ledger.buckets().windows(2) {
            assert_eq!(pair[1].run_start(), pair[0].cycle + 1);
        }
    }

    #[test]
    fn test_first_lock_registers_at_next_boundary() {
        let mut l = ledger(100, 0);
        l.record_change(1_000, 0).unwrap();
        // A zero anchor for the creation cycle, then the registration
        // bucket at cycle 1.
        assert_eq!(cycles(&l), vec![0, 1]);
        assert_eq!(totals(&l), vec![0, 1_000]);
        let bucket = l.latest().unwrap();
        assert_eq!(bucket.run_length, 1);
        assert_eq!(bucket.unit_price.raw(), 1000);
        assert_tiling(&l);
    }

    #[test]
    fn test_same_cycle_changes_share_one_bucket() {
        let mut l = ledger(100, 0);
        l.record_change(500, 0).unwrap();
        l.record_change(500, 50).unwrap();
        assert_eq!(cycles(&l), vec![0, 1]);
        assert_eq!(l.latest().unwrap().locked_total, 1_000);
    }

    #[test]
    fn test_gap_is_bridged_by_carry_anchor() {
        let mut l = ledger(100, 0);
        l.record_change(1_000, 0).unwrap();
        l.record_change(500, 520).unwrap();
        // The anchor at cycle 5 carries 1000 across boundaries 2..=5; the
        // new deposit registers alone at boundary 6.
        assert_eq!(cycles(&l), vec![0, 1, 5, 6]);
        assert_eq!(totals(&l), vec![0, 1_000, 1_000, 1_500]);
        assert_eq!(l.buckets()[2].run_length, 4);
        assert_eq!(l.buckets()[3].run_length, 1);
        assert_tiling(&l);
    }

    #[test]
    fn test_sum_counts_completed_boundaries_only() {
        let mut l = ledger(100, 0);
        l.record_change(1_000, 0).unwrap();
        // Flush at height 250: boundaries 1 and 2 have paid, the cycle in
        // progress has not.
        l.record_change(0, 250).unwrap();
        let sum = l.sum_unit_price_over_range(0, l.cycle_of(250)).unwrap();
        // Two boundaries at trunc(10.00 / 1000) = 0.01 each.
        assert_eq!(sum.raw(), 2);
    }

    #[test]
    fn test_sum_is_empty_past_the_cursor() {
        let mut l = ledger(100, 0);
        l.record_change(1_000, 0).unwrap();
        l.record_change(0, 250).unwrap();
        let sum = l.sum_unit_price_over_range(2, 2).unwrap();
        assert_eq!(sum.raw(), 0);
    }

    #[test]
    fn test_sum_on_empty_timeline_is_an_error() {
        let l = ledger(100, 0);
        assert!(matches!(
            l.sum_unit_price_over_range(0, 5),
            Err(PlacerError::NoActivityRecorded(0))
        ));
    }

    #[test]
    fn test_sum_before_coverage_is_an_error() {
        let mut l = ledger(100, 0);
        // First activity at cycle 5: coverage starts at boundary 5.
        l.record_change(1_000, 550).unwrap();
        assert!(matches!(
            l.sum_unit_price_over_range(3, 6),
            Err(PlacerError::NoActivityRecorded(3))
        ));
    }

    #[test]
    fn test_withdrawal_same_cycle_debits_registration_bucket() {
        let mut l = ledger(100, 0);
        l.record_change(1_000, 10).unwrap();
        l.apply_withdrawal(1_000, 60, 10).unwrap();
        assert_eq!(cycles(&l), vec![0, 1]);
        assert_eq!(l.latest().unwrap().locked_total, 0);
    }

    #[test]
    fn test_withdrawal_cross_cycle_never_reprices_paid_boundaries() {
        let mut l = ledger(100, 0);
        l.record_change(1_000, 0).unwrap();
        l.record_change(500, 120).unwrap();
        // Withdraw the first deposit at height 450 (cycle 4). Boundaries
        // 2..=4 keep the 1500 they paid at; only boundary 5 sees the exit.
        l.apply_withdrawal(1_000, 450, 0).unwrap();
        assert_eq!(cycles(&l), vec![0, 1, 2, 4, 5]);
        assert_eq!(totals(&l), vec![0, 1_000, 1_500, 1_500, 500]);
        let exit = l.latest().unwrap();
        assert_eq!(exit.run_length, 1);
        assert_tiling(&l);
    }

    #[test]
    fn test_withdrawal_below_zero_is_an_error() {
        let mut l = ledger(100, 0);
        l.record_change(100, 0).unwrap();
        assert!(matches!(
            l.apply_withdrawal(200, 450, 0),
            Err(PlacerError::NumericOverflow)
        ));
    }

    #[test]
    fn test_zero_total_run_contributes_nothing() {
        let mut l = ledger(100, 0);
        l.record_change(1_000, 0).unwrap();
        // Reconcile-then-withdraw at height 250, as the engine does.
        l.record_change(0, 250).unwrap();
        l.apply_withdrawal(1_000, 250, 0).unwrap();
        // Re-enter at height 580.
        l.record_change(2_000, 580).unwrap();
        // Boundaries 3..=5 fall in the zero-total run after the exit.
        let sum = l.sum_unit_price_over_range(2, 5).unwrap();
        assert_eq!(sum.raw(), 0);
        // Boundaries 1 and 2 still pay 0.01 each from the 1000-unit run.
        let sum_wide = l.sum_unit_price_over_range(0, 5).unwrap();
        assert_eq!(sum_wide.raw(), 2);
        assert_tiling(&l);
    }

    #[test]
    fn test_halving_boundary_anchored_without_activity() {
        // Halving every 250 heights, cycles of 100.
        let mut l = ledger(100, 250);
        l.record_change(1_000, 0).unwrap();
        // Dormant across two halving boundaries (250 and 500).
        l.record_change(0, 520).unwrap();
        assert_eq!(cycles(&l), vec![0, 1, 2, 5, 6]);
        let prices: Vec<u128> = l.buckets().iter().map(|b| b.unit_price.raw()).collect();
        assert_eq!(prices, vec![1000, 1000, 500, 250, 250]);
        assert_tiling(&l);
    }

    #[test]
    fn test_halving_anchor_skipped_when_cycle_already_recorded() {
        // Halving period longer than a cycle: the boundary at height 150
        // falls inside cycle 1, which the deposit at height 140 already
        // registered into at bucket 2.
        let mut l = ledger(100, 150);
        l.record_change(1_000, 140).unwrap();
        l.record_change(0, 160).unwrap();
        assert_eq!(cycles(&l), vec![1, 2]);
        // The in-place refresh carried the halved price into bucket 2.
        assert_eq!(l.latest().unwrap().unit_price.raw(), 500);
    }

    #[test]
    fn test_run_length_integrity() {
        let mut l = ledger(100, 0);
        l.record_change(1_000, 30).unwrap();
        l.record_change(250, 230).unwrap();
        l.record_change(0, 480).unwrap();
        l.apply_withdrawal(250, 900, 230).unwrap();
        l.record_change(400, 1_330).unwrap();
        assert_tiling(&l);
        let total_run: u64 = l.buckets().iter().map(|b| b.run_length).sum();
        let first = &l.buckets()[0];
        let last = l.latest().unwrap();
        assert_eq!(total_run, last.cycle - first.cycle + first.run_length);
    }
}
