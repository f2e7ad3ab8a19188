//! Resolves a number of boxes of one option into concrete class quantities.
//!
//! Each box runs two passes:
//!
//! 1. **Guarantees**, in declaration order. A guaranteed class that cannot
//!    cover its minimum hands the shortfall to [`BoxOption::fallback_chain`].
//! 2. **Random fill** for the remaining slots. Each slot draws over the
//!    cumulative weights of the classes that still have supply, in
//!    declaration order, and reserves one unit of the class it lands on.
//!
//! Every reservation is journaled. If any box fails, the journal is released
//! in reverse before the error is returned, so the tracker ends exactly where
//! it started. A release that fails during that rollback is reported together
//! with the error that triggered it.

use std::collections::BTreeMap;

use crate::draw::{DrawEngine, EntropySource};
use crate::error::{AllocationError, SupplyError};
use crate::supply::SupplyTracker;
use crate::types::{AllocationResult, BoxContents, BoxOption, ClassId, ClassQuantity, Supply};

pub fn allocate<S, E>(
    option: &BoxOption,
    box_count: u32,
    supply: &mut S,
    draws: &mut DrawEngine<E>,
) -> Result<AllocationResult, AllocationError>
where
    S: SupplyTracker + ?Sized,
    E: EntropySource,
{
    if box_count == 0 {
        return Err(AllocationError::ZeroBoxes);
    }

    let mut journal = Journal::default();
    match open_boxes(option, box_count, supply, draws, &mut journal) {
        Ok(boxes) => Ok(summarize(option, box_count, boxes)),
        Err(err) => match journal.rollback(supply) {
            Ok(()) => Err(err),
            Err(rollback) => Err(AllocationError::RollbackFailed {
                cause: Box::new(err),
                rollback,
            }),
        },
    }
}

/// Per-box tally, discarded once the box is merged into the result.
struct DrawState {
    counts: BTreeMap<ClassId, u64>,
    drawn: u64,
}

impl DrawState {
    fn new(option: &BoxOption) -> Self {
        Self {
            counts: option.classes.iter().map(|c| (c.class_id, 0)).collect(),
            drawn: 0,
        }
    }

    fn record(&mut self, class_id: ClassId, quantity: u64) {
        *self.counts.entry(class_id).or_insert(0) += quantity;
        self.drawn += quantity;
    }

    fn into_contents(self) -> BoxContents {
        BoxContents {
            items: self
                .counts
                .into_iter()
                .filter(|(_, quantity)| *quantity > 0)
                .map(|(class_id, quantity)| ClassQuantity { class_id, quantity })
                .collect(),
        }
    }
}

#[derive(Default)]
struct Journal {
    entries: Vec<(ClassId, u64)>,
}

impl Journal {
    fn record(&mut self, class_id: ClassId, quantity: u64) {
        self.entries.push((class_id, quantity));
    }

    fn rollback<S: SupplyTracker + ?Sized>(self, supply: &mut S) -> Result<(), SupplyError> {
        for (class_id, quantity) in self.entries.into_iter().rev() {
            supply.release(class_id, quantity)?;
        }
        Ok(())
    }
}

fn open_boxes<S, E>(
    option: &BoxOption,
    box_count: u32,
    supply: &mut S,
    draws: &mut DrawEngine<E>,
    journal: &mut Journal,
) -> Result<Vec<BoxContents>, AllocationError>
where
    S: SupplyTracker + ?Sized,
    E: EntropySource,
{
    let mut boxes = Vec::with_capacity(box_count as usize);
    for _ in 0..box_count {
        let mut state = DrawState::new(option);
        guarantee_pass(option, &mut state, supply, journal)?;
        random_fill_pass(option, &mut state, supply, draws, journal)?;
        boxes.push(state.into_contents());
    }
    Ok(boxes)
}

fn guarantee_pass<S>(
    option: &BoxOption,
    state: &mut DrawState,
    supply: &mut S,
    journal: &mut Journal,
) -> Result<(), AllocationError>
where
    S: SupplyTracker + ?Sized,
{
    for guarantee in &option.guarantees {
        let wanted = guarantee.minimum as u64;
        let placed = reserve_up_to(supply, journal, guarantee.class_id, wanted)?;
        state.record(guarantee.class_id, placed);

        let mut shortfall = wanted - placed;
        if shortfall == 0 {
            continue;
        }

        for substitute in option.fallback_chain(guarantee.class_id) {
            let placed = reserve_up_to(supply, journal, substitute, shortfall)?;
            state.record(substitute, placed);
            shortfall -= placed;
            if shortfall == 0 {
                break;
            }
        }

        if shortfall > 0 {
            return Err(AllocationError::SupplyExhausted {
                option_id: option.option_id,
                class_id: Some(guarantee.class_id),
            });
        }
    }
    Ok(())
}

fn random_fill_pass<S, E>(
    option: &BoxOption,
    state: &mut DrawState,
    supply: &mut S,
    draws: &mut DrawEngine<E>,
    journal: &mut Journal,
) -> Result<(), AllocationError>
where
    S: SupplyTracker + ?Sized,
    E: EntropySource,
{
    let exhausted = AllocationError::SupplyExhausted {
        option_id: option.option_id,
        class_id: None,
    };

    // Rebuilt only when a class runs dry, not on every draw
    let mut table = eligible_table(option, supply)?;
    while state.drawn < option.items_per_box as u64 {
        let total = match table.last() {
            Some(entry) => entry.upper,
            None => return Err(exhausted),
        };

        let roll = draws.next(total)?;
        let index = table.partition_point(|entry| entry.upper <= roll);
        let Some(entry) = table.get_mut(index) else {
            return Err(exhausted);
        };
        let class_id = entry.class_id;

        match supply.reserve(class_id, 1) {
            Ok(()) => {
                journal.record(class_id, 1);
                state.record(class_id, 1);
                if let Supply::Limited(left) = &mut entry.remaining {
                    *left -= 1;
                    if *left == 0 {
                        table = eligible_table(option, supply)?;
                    }
                }
            }
            // Depleted behind our back: draw again over the fresh set.
            Err(SupplyError::Insufficient { .. }) => {
                table = eligible_table(option, supply)?;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// One drawable class with supply left, in declaration order.
struct EligibleClass {
    class_id: ClassId,
    /// Cumulative weight up to and including this class.
    upper: u64,
    remaining: Supply,
}

fn eligible_table<S>(option: &BoxOption, supply: &S) -> Result<Vec<EligibleClass>, SupplyError>
where
    S: SupplyTracker + ?Sized,
{
    let mut cumulative = 0u64;
    let mut table = Vec::with_capacity(option.classes.len());
    for class in &option.classes {
        if class.weight == 0 {
            continue;
        }
        let remaining = supply.remaining(class.class_id)?;
        if remaining.is_depleted() {
            continue;
        }
        cumulative += class.weight as u64;
        table.push(EligibleClass {
            class_id: class.class_id,
            upper: cumulative,
            remaining,
        });
    }
    Ok(table)
}

/// Reserve as much of `wanted` as the class can give. Returns the amount taken.
fn reserve_up_to<S>(
    supply: &mut S,
    journal: &mut Journal,
    class_id: ClassId,
    wanted: u64,
) -> Result<u64, AllocationError>
where
    S: SupplyTracker + ?Sized,
{
    let mut want = wanted;
    while want > 0 {
        match supply.reserve(class_id, want) {
            Ok(()) => {
                journal.record(class_id, want);
                return Ok(want);
            }
            Err(SupplyError::Insufficient { remaining, .. }) if remaining < want => {
                want = remaining;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(0)
}

fn summarize(option: &BoxOption, box_count: u32, boxes: Vec<BoxContents>) -> AllocationResult {
    let mut totals: BTreeMap<ClassId, u64> = BTreeMap::new();
    for contents in &boxes {
        for item in &contents.items {
            *totals.entry(item.class_id).or_insert(0) += item.quantity;
        }
    }
    let total_items = totals.values().sum();

    AllocationResult {
        option_id: option.option_id,
        box_count,
        boxes,
        totals: totals
            .into_iter()
            .map(|(class_id, quantity)| ClassQuantity { class_id, quantity })
            .collect(),
        total_items,
    }
}
