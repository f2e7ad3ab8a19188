use std::collections::BTreeMap;

use crate::error::SupplyError;
use crate::types::{ClassId, Supply};

/// Remaining-count ledger for every class.
///
/// `reserve` is all-or-nothing: it either takes the full quantity or leaves the
/// class untouched and reports what is left through [`SupplyError::Insufficient`].
pub trait SupplyTracker {
    fn remaining(&self, class_id: ClassId) -> Result<Supply, SupplyError>;

    fn reserve(&mut self, class_id: ClassId, quantity: u64) -> Result<(), SupplyError>;

    /// Hand back units taken by `reserve`. Only used to undo a failed allocation.
    fn release(&mut self, class_id: ClassId, quantity: u64) -> Result<(), SupplyError>;
}

/// Tracker held in memory. Classes that were never capped are unlimited.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InMemorySupply {
    caps: BTreeMap<ClassId, u64>,
}

impl InMemorySupply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cap(mut self, class_id: ClassId, remaining: u64) -> Self {
        self.caps.insert(class_id, remaining);
        self
    }
}

impl SupplyTracker for InMemorySupply {
    fn remaining(&self, class_id: ClassId) -> Result<Supply, SupplyError> {
        Ok(self
            .caps
            .get(&class_id)
            .map(|n| Supply::Limited(*n))
            .unwrap_or(Supply::Unlimited))
    }

    fn reserve(&mut self, class_id: ClassId, quantity: u64) -> Result<(), SupplyError> {
        if let Some(remaining) = self.caps.get_mut(&class_id) {
            if quantity > *remaining {
                return Err(SupplyError::Insufficient {
                    class_id,
                    requested: quantity,
                    remaining: *remaining,
                });
            }
            *remaining -= quantity;
        }
        Ok(())
    }

    fn release(&mut self, class_id: ClassId, quantity: u64) -> Result<(), SupplyError> {
        if let Some(remaining) = self.caps.get_mut(&class_id) {
            *remaining = remaining.saturating_add(quantity);
        }
        Ok(())
    }
}
