use cosmwasm_schema::cw_serde;

/// Identifier of a rarity class. Also the suffix of the class's ledger denom.
pub type ClassId = u32;

/// Identifier of a box option (tier).
pub type OptionId = u32;

/// Class weights of an option must sum to exactly this many basis points.
pub const PROBABILITY_BASIS: u32 = 10_000;

/// Relative chance of drawing a class when unconstrained by guarantees or supply.
/// A zero weight keeps the class out of random draws and out of fallback substitution.
#[cw_serde]
pub struct ClassProbability {
    pub class_id: ClassId,
    pub weight: u32,
}

/// Every single box must contain at least `minimum` units placed for this class.
#[cw_serde]
pub struct Guarantee {
    pub class_id: ClassId,
    pub minimum: u32,
}

/// A purchasable box tier.
#[cw_serde]
pub struct BoxOption {
    pub option_id: OptionId,
    pub items_per_box: u32,
    /// Declaration order is the cumulative-range order used by random draws.
    pub classes: Vec<ClassProbability>,
    pub guarantees: Vec<Guarantee>,
}

impl BoxOption {
    /// Classes ordered from rarest to most common: ascending weight, then ascending class id.
    pub fn rarity_order(&self) -> Vec<ClassProbability> {
        let mut ordered = self.classes.clone();
        ordered.sort_by(|a, b| a.weight.cmp(&b.weight).then(a.class_id.cmp(&b.class_id)));
        ordered
    }

    /// Substitutes for a depleted `class_id`, in the order they are tried.
    ///
    /// Walks the rarity order forward from the depleted class (towards more
    /// common classes) and then wraps around to the rarest ones. Zero-weight
    /// classes never substitute.
    pub fn fallback_chain(&self, class_id: ClassId) -> Vec<ClassId> {
        let ordered = self.rarity_order();
        let start = ordered
            .iter()
            .position(|c| c.class_id == class_id)
            .map(|i| i + 1)
            .unwrap_or(0);

        ordered[start..]
            .iter()
            .chain(ordered[..start].iter())
            .filter(|c| c.weight > 0 && c.class_id != class_id)
            .map(|c| c.class_id)
            .collect()
    }

    pub fn guaranteed_per_box(&self) -> u64 {
        self.guarantees.iter().map(|g| g.minimum as u64).sum()
    }
}

/// Remaining mintable units of a class.
#[cw_serde]
#[derive(Copy)]
pub enum Supply {
    Limited(u64),
    Unlimited,
}

impl Supply {
    pub fn is_depleted(&self) -> bool {
        matches!(self, Supply::Limited(0))
    }

    /// How many of `wanted` units this supply can hand out right now.
    pub fn available(&self, wanted: u64) -> u64 {
        match self {
            Supply::Limited(remaining) => (*remaining).min(wanted),
            Supply::Unlimited => wanted,
        }
    }
}

impl From<Option<u64>> for Supply {
    fn from(cap: Option<u64>) -> Self {
        match cap {
            Some(n) => Supply::Limited(n),
            None => Supply::Unlimited,
        }
    }
}

/// Supply configuration row. A `cap` of `None` means the class is uncapped.
#[cw_serde]
pub struct ClassSupplyConfig {
    pub class_id: ClassId,
    pub cap: Option<u64>,
}

#[cw_serde]
pub struct ClassQuantity {
    pub class_id: ClassId,
    pub quantity: u64,
}

/// Contents of one opened box, ascending by class id.
#[cw_serde]
pub struct BoxContents {
    pub items: Vec<ClassQuantity>,
}

impl BoxContents {
    pub fn quantity_of(&self, class_id: ClassId) -> u64 {
        self.items
            .iter()
            .find(|i| i.class_id == class_id)
            .map(|i| i.quantity)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Outcome of one allocation call.
#[cw_serde]
pub struct AllocationResult {
    pub option_id: OptionId,
    pub box_count: u32,
    pub boxes: Vec<BoxContents>,
    /// Quantities summed over all boxes, ascending by class id.
    pub totals: Vec<ClassQuantity>,
    pub total_items: u64,
}

impl AllocationResult {
    pub fn quantity_of(&self, class_id: ClassId) -> u64 {
        self.totals
            .iter()
            .find(|t| t.class_id == class_id)
            .map(|t| t.quantity)
            .unwrap_or(0)
    }
}
