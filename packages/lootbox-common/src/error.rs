use cosmwasm_std::StdError;
use thiserror::Error;

use crate::types::{ClassId, OptionId};

/// Option catalog loading and lookup failures.
#[derive(Error, Debug, PartialEq)]
pub enum CatalogError {
    #[error("invalid option {option_id}")]
    InvalidOption { option_id: OptionId },

    #[error("option {option_id} is defined more than once")]
    DuplicateOption { option_id: OptionId },

    #[error("option {option_id} must contain at least one item per box")]
    EmptyBox { option_id: OptionId },

    #[error("option {option_id} holds {items_per_box} items per box, max {max}")]
    TooManyItems {
        option_id: OptionId,
        items_per_box: u32,
        max: u32,
    },

    #[error("option {option_id} has no classes")]
    NoClasses { option_id: OptionId },

    #[error("option {option_id} lists class {class_id} more than once")]
    DuplicateClass {
        option_id: OptionId,
        class_id: ClassId,
    },

    #[error("option {option_id} class weights sum to {total}, expected {expected}")]
    WeightSumMismatch {
        option_id: OptionId,
        total: u64,
        expected: u32,
    },

    #[error("option {option_id} has no class with a non-zero weight")]
    NoDrawableClass { option_id: OptionId },

    #[error("option {option_id} guarantees class {class_id} which is not in its class table")]
    UnknownGuaranteeClass {
        option_id: OptionId,
        class_id: ClassId,
    },

    #[error("option {option_id} guarantees class {class_id} more than once")]
    DuplicateGuarantee {
        option_id: OptionId,
        class_id: ClassId,
    },

    #[error("option {option_id} guarantees zero units of class {class_id}")]
    ZeroGuarantee {
        option_id: OptionId,
        class_id: ClassId,
    },

    #[error("option {option_id} guarantees {guaranteed} items but a box holds {items_per_box}")]
    GuaranteesExceedBox {
        option_id: OptionId,
        guaranteed: u64,
        items_per_box: u32,
    },

    #[error("supply configured for class {class_id} which no option references")]
    UnknownSupplyClass { class_id: ClassId },

    #[error("supply for class {class_id} is configured more than once")]
    DuplicateSupplyClass { class_id: ClassId },
}

#[derive(Error, Debug)]
pub enum SupplyError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("insufficient supply of class {class_id}: requested {requested}, remaining {remaining}")]
    Insufficient {
        class_id: ClassId,
        requested: u64,
        remaining: u64,
    },

    #[error("class {class_id} is not tracked")]
    UnknownClass { class_id: ClassId },
}

#[derive(Error, Debug, PartialEq)]
pub enum DrawError {
    #[error("cannot draw from an empty range")]
    EmptyRange,
}

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("box count must be at least one")]
    ZeroBoxes,

    /// No eligible class could absorb a guarantee or a random draw.
    #[error("supply exhausted while opening option {option_id} (class {class_id:?})")]
    SupplyExhausted {
        option_id: OptionId,
        class_id: Option<ClassId>,
    },

    #[error("{0}")]
    Supply(#[from] SupplyError),

    #[error("{0}")]
    Draw(#[from] DrawError),

    /// Undoing the reservations of a failed allocation failed as well.
    #[error("{cause}; rollback failed: {rollback}")]
    RollbackFailed {
        cause: Box<AllocationError>,
        rollback: SupplyError,
    },
}
