use cosmwasm_schema::{cw_serde, QueryResponses};
use cosmwasm_std::{Addr, Uint128};
use lootbox_common::{BoxOption, ClassId, ClassSupplyConfig, OptionId};

use crate::state::{ClassRecord, Config, OpenerState, PendingOpen};

#[cw_serde]
pub struct InstantiateMsg {
    pub drand_oracle: String,
    /// Registry contract that resolves the owner's proxy. Optional.
    pub proxy_registry: Option<String>,
    /// Addresses allowed to mint besides the owner.
    pub delegates: Vec<String>,
    /// Subdenom prefix for class tokens, e.g. "item" gives `factory/{contract}/item7`.
    pub denom_prefix: String,
    pub max_boxes_per_call: u32,
    /// Unix seconds of drand round 1, as configured on the oracle.
    pub drand_genesis_time: u64,
    pub drand_period_seconds: u64,
    pub reveal_delay_rounds: u64,
    pub options: Vec<BoxOption>,
    /// Per-class supply caps. Classes not listed are unlimited.
    pub class_supplies: Vec<ClassSupplyConfig>,
}

#[cw_serde]
pub enum ExecuteMsg {
    /// Request `box_count` boxes opened straight into `recipient`. Owner,
    /// delegate or proxy. The outcome is fixed by a future drand round.
    Mint {
        recipient: String,
        option_id: OptionId,
        box_count: u32,
    },
    /// Credit sealed boxes to `recipient`. Same authorization as `Mint`.
    IssueBoxes {
        recipient: String,
        option_id: OptionId,
        amount: Uint128,
    },
    /// Burn the sender's sealed boxes and request an open for `recipient`.
    Unpack {
        option_id: OptionId,
        recipient: Option<String>,
        box_count: u32,
    },
    /// Allocate a pending open once its drand round is published. Anyone.
    RevealOpen { open_id: u64 },
    /// Owner only.
    UpdateDelegates {
        add: Vec<String>,
        remove: Vec<String>,
    },
    /// Owner only.
    UpdateConfig {
        owner: Option<String>,
        drand_oracle: Option<String>,
        proxy_registry: Option<String>,
        #[serde(default)]
        clear_proxy_registry: bool,
        max_boxes_per_call: Option<u32>,
        drand_genesis_time: Option<u64>,
        drand_period_seconds: Option<u64>,
        reveal_delay_rounds: Option<u64>,
    },
}

#[cw_serde]
pub struct MigrateMsg {}

/// Query message for the drand oracle contract.
#[cw_serde]
pub enum OracleQueryMsg {
    Beacon { round: u64 },
}

/// Query message for the proxy registry contract.
#[cw_serde]
pub enum ProxyRegistryQueryMsg {
    /// Returns `Option<String>`, the proxy acting for `owner`.
    Proxy { owner: String },
}

#[cw_serde]
#[derive(QueryResponses)]
pub enum QueryMsg {
    #[returns(Config)]
    Config {},
    #[returns(OpenerState)]
    OpenerState {},
    #[returns(BoxOption)]
    BoxOption { option_id: OptionId },
    #[returns(OptionsResponse)]
    Options {
        start_after: Option<OptionId>,
        limit: Option<u32>,
    },
    #[returns(ClassRecord)]
    ClassSupply { class_id: ClassId },
    #[returns(ClassSuppliesResponse)]
    ClassSupplies {
        start_after: Option<ClassId>,
        limit: Option<u32>,
    },
    #[returns(BoxBalanceResponse)]
    BoxBalance { address: String, option_id: OptionId },
    #[returns(DelegatesResponse)]
    Delegates {},
    #[returns(PendingOpen)]
    PendingOpen { open_id: u64 },
    #[returns(PendingOpensResponse)]
    PendingOpens {
        start_after: Option<u64>,
        limit: Option<u32>,
    },
}

pub struct OpenParams {
    pub recipient: Addr,
    pub option_id: OptionId,
    pub box_count: u32,
}

pub struct UpdateConfigParams {
    pub owner: Option<String>,
    pub drand_oracle: Option<String>,
    pub proxy_registry: Option<String>,
    pub clear_proxy_registry: bool,
    pub max_boxes_per_call: Option<u32>,
    pub drand_genesis_time: Option<u64>,
    pub drand_period_seconds: Option<u64>,
    pub reveal_delay_rounds: Option<u64>,
}

#[cw_serde]
pub struct OptionsResponse {
    pub options: Vec<BoxOption>,
}

#[cw_serde]
pub struct ClassSuppliesResponse {
    pub classes: Vec<ClassRecord>,
}

#[cw_serde]
pub struct BoxBalanceResponse {
    pub address: String,
    pub option_id: OptionId,
    pub balance: Uint128,
}

#[cw_serde]
pub struct DelegatesResponse {
    pub delegates: Vec<String>,
}

#[cw_serde]
pub struct PendingOpensResponse {
    pub opens: Vec<PendingOpen>,
}
