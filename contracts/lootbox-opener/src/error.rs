use cosmwasm_std::{OverflowError, StdError, Uint128};
use lootbox_common::{AllocationError, CatalogError, ClassId, OptionId, SupplyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("{0}")]
    Overflow(#[from] OverflowError),

    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("{0}")]
    Catalog(#[from] CatalogError),

    #[error("invalid option {option_id}")]
    InvalidOption { option_id: OptionId },

    #[error("supply exhausted while opening option {option_id} (class {class_id:?})")]
    SupplyExhausted {
        option_id: OptionId,
        class_id: Option<ClassId>,
    },

    #[error("allocation failed: {reason}")]
    Allocation { reason: String },

    #[error("box count must be at least one")]
    ZeroBoxes,

    #[error("too many boxes: requested {requested}, max {max}")]
    TooManyBoxes { requested: u32, max: u32 },

    #[error("insufficient boxes of option {option_id}: have {available}, need {requested}")]
    InsufficientBoxes {
        option_id: OptionId,
        available: Uint128,
        requested: u32,
    },

    #[error("drand beacon not found for round {round}")]
    BeaconNotFound { round: u64 },

    #[error("ledger mint failed for class {class_id}: {reason}")]
    LedgerError { class_id: ClassId, reason: String },

    #[error("unknown reply id {id}")]
    UnknownReply { id: u64 },

    #[error("invalid denom prefix: {reason}")]
    InvalidDenomPrefix { reason: String },

    #[error("max boxes per call must be between 1 and {limit}, got {value}")]
    InvalidMaxBoxes { value: u32, limit: u32 },

    #[error("too many items in one open: requested {requested}, max {max}")]
    TooManyItems { requested: u64, max: u64 },

    #[error("invalid drand timing: {reason}")]
    InvalidDrandTiming { reason: String },

    #[error("drand round {round} publishes at {round_time}, not after block time {block_time}")]
    RoundNotInFuture {
        round: u64,
        round_time: u64,
        block_time: u64,
    },

    #[error("no pending open with id {open_id}")]
    PendingOpenNotFound { open_id: u64 },
}

impl From<AllocationError> for ContractError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::ZeroBoxes => ContractError::ZeroBoxes,
            AllocationError::SupplyExhausted {
                option_id,
                class_id,
            } => ContractError::SupplyExhausted {
                option_id,
                class_id,
            },
            AllocationError::Supply(SupplyError::Std(e)) => ContractError::Std(e),
            other => ContractError::Allocation {
                reason: other.to_string(),
            },
        }
    }
}
