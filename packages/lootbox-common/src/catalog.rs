use std::collections::{BTreeMap, BTreeSet};

use crate::error::CatalogError;
use crate::types::{BoxOption, ClassId, ClassSupplyConfig, OptionId, Supply, PROBABILITY_BASIS};

/// Ceiling on `items_per_box`. Every item costs a supply write on chain.
pub const MAX_ITEMS_PER_BOX: u32 = 100;

/// Validated, immutable registry of box options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptionCatalog {
    options: BTreeMap<OptionId, BoxOption>,
}

impl OptionCatalog {
    /// Validate every option and build the catalog. Any invalid row rejects the whole table.
    pub fn load(options: Vec<BoxOption>) -> Result<Self, CatalogError> {
        let mut catalog = BTreeMap::new();
        for option in options {
            validate_option(&option)?;
            let option_id = option.option_id;
            if catalog.insert(option_id, option).is_some() {
                return Err(CatalogError::DuplicateOption { option_id });
            }
        }
        Ok(Self { options: catalog })
    }

    pub fn get_option(&self, option_id: OptionId) -> Result<&BoxOption, CatalogError> {
        self.options
            .get(&option_id)
            .ok_or(CatalogError::InvalidOption { option_id })
    }

    /// Options ascending by id.
    pub fn options(&self) -> impl Iterator<Item = &BoxOption> {
        self.options.values()
    }

    /// Every class referenced by any option, ascending.
    pub fn class_ids(&self) -> BTreeSet<ClassId> {
        self.options
            .values()
            .flat_map(|o| o.classes.iter().map(|c| c.class_id))
            .collect()
    }

    /// Resolve the starting supply of every referenced class.
    /// Classes without a configuration row are uncapped.
    pub fn build_supply_table(
        &self,
        entries: &[ClassSupplyConfig],
    ) -> Result<BTreeMap<ClassId, Supply>, CatalogError> {
        let known = self.class_ids();
        let mut table: BTreeMap<ClassId, Supply> =
            known.iter().map(|id| (*id, Supply::Unlimited)).collect();

        let mut seen = BTreeSet::new();
        for entry in entries {
            if !known.contains(&entry.class_id) {
                return Err(CatalogError::UnknownSupplyClass {
                    class_id: entry.class_id,
                });
            }
            if !seen.insert(entry.class_id) {
                return Err(CatalogError::DuplicateSupplyClass {
                    class_id: entry.class_id,
                });
            }
            table.insert(entry.class_id, Supply::from(entry.cap));
        }
        Ok(table)
    }
}

pub fn validate_option(option: &BoxOption) -> Result<(), CatalogError> {
    let option_id = option.option_id;

    if option.items_per_box == 0 {
        return Err(CatalogError::EmptyBox { option_id });
    }
    if option.items_per_box > MAX_ITEMS_PER_BOX {
        return Err(CatalogError::TooManyItems {
            option_id,
            items_per_box: option.items_per_box,
            max: MAX_ITEMS_PER_BOX,
        });
    }
    if option.classes.is_empty() {
        return Err(CatalogError::NoClasses { option_id });
    }

    let mut classes = BTreeSet::new();
    for class in &option.classes {
        if !classes.insert(class.class_id) {
            return Err(CatalogError::DuplicateClass {
                option_id,
                class_id: class.class_id,
            });
        }
    }

    if option.classes.iter().all(|c| c.weight == 0) {
        return Err(CatalogError::NoDrawableClass { option_id });
    }
    let total: u64 = option.classes.iter().map(|c| c.weight as u64).sum();
    if total != PROBABILITY_BASIS as u64 {
        return Err(CatalogError::WeightSumMismatch {
            option_id,
            total,
            expected: PROBABILITY_BASIS,
        });
    }

    let mut guaranteed = BTreeSet::new();
    for guarantee in &option.guarantees {
        if !classes.contains(&guarantee.class_id) {
            return Err(CatalogError::UnknownGuaranteeClass {
                option_id,
                class_id: guarantee.class_id,
            });
        }
        if !guaranteed.insert(guarantee.class_id) {
            return Err(CatalogError::DuplicateGuarantee {
                option_id,
                class_id: guarantee.class_id,
            });
        }
        if guarantee.minimum == 0 {
            return Err(CatalogError::ZeroGuarantee {
                option_id,
                class_id: guarantee.class_id,
            });
        }
    }

    let guaranteed = option.guaranteed_per_box();
    if guaranteed > option.items_per_box as u64 {
        return Err(CatalogError::GuaranteesExceedBox {
            option_id,
            guaranteed,
            items_per_box: option.items_per_box,
        });
    }

    Ok(())
}
