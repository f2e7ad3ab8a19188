use cosmwasm_std::{to_json_binary, Binary, Deps, Order, StdResult};
use cw_storage_plus::Bound;
use lootbox_common::{ClassId, OptionId};

use crate::msg::{
    BoxBalanceResponse, ClassSuppliesResponse, DelegatesResponse, OptionsResponse,
    PendingOpensResponse,
};
use crate::state::{
    BOX_BALANCES, CLASSES, CONFIG, DELEGATES, OPENER_STATE, OPTIONS, PENDING_OPENS,
};

pub fn query_config(deps: Deps) -> StdResult<Binary> {
    let config = CONFIG.load(deps.storage)?;
    to_json_binary(&config)
}

pub fn query_opener_state(deps: Deps) -> StdResult<Binary> {
    let state = OPENER_STATE.load(deps.storage)?;
    to_json_binary(&state)
}

pub fn query_option(deps: Deps, option_id: OptionId) -> StdResult<Binary> {
    let option = OPTIONS.load(deps.storage, option_id)?;
    to_json_binary(&option)
}

pub fn query_options(
    deps: Deps,
    start_after: Option<OptionId>,
    limit: Option<u32>,
) -> StdResult<Binary> {
    let limit = limit.unwrap_or(20).min(100) as usize;
    let start = start_after.map(Bound::exclusive);

    let options: Vec<_> = OPTIONS
        .range(deps.storage, start, None, Order::Ascending)
        .take(limit)
        .filter_map(|r| r.ok())
        .map(|(_, option)| option)
        .collect();

    to_json_binary(&OptionsResponse { options })
}

pub fn query_class_supply(deps: Deps, class_id: ClassId) -> StdResult<Binary> {
    let record = CLASSES.load(deps.storage, class_id)?;
    to_json_binary(&record)
}

pub fn query_class_supplies(
    deps: Deps,
    start_after: Option<ClassId>,
    limit: Option<u32>,
) -> StdResult<Binary> {
    let limit = limit.unwrap_or(20).min(100) as usize;
    let start = start_after.map(Bound::exclusive);

    let classes: Vec<_> = CLASSES
        .range(deps.storage, start, None, Order::Ascending)
        .take(limit)
        .filter_map(|r| r.ok())
        .map(|(_, record)| record)
        .collect();

    to_json_binary(&ClassSuppliesResponse { classes })
}

pub fn query_box_balance(deps: Deps, address: String, option_id: OptionId) -> StdResult<Binary> {
    let addr = deps.api.addr_validate(&address)?;
    let balance = BOX_BALANCES
        .may_load(deps.storage, (&addr, option_id))?
        .unwrap_or_default();

    to_json_binary(&BoxBalanceResponse {
        address,
        option_id,
        balance,
    })
}

pub fn query_delegates(deps: Deps) -> StdResult<Binary> {
    let delegates = DELEGATES
        .keys(deps.storage, None, None, Order::Ascending)
        .map(|r| r.map(|addr| addr.to_string()))
        .collect::<StdResult<Vec<_>>>()?;

    to_json_binary(&DelegatesResponse { delegates })
}

pub fn query_pending_open(deps: Deps, open_id: u64) -> StdResult<Binary> {
    let pending = PENDING_OPENS.load(deps.storage, open_id)?;
    to_json_binary(&pending)
}

pub fn query_pending_opens(
    deps: Deps,
    start_after: Option<u64>,
    limit: Option<u32>,
) -> StdResult<Binary> {
    let limit = limit.unwrap_or(20).min(100) as usize;
    let start = start_after.map(Bound::exclusive);

    let opens = PENDING_OPENS
        .range(deps.storage, start, None, Order::Ascending)
        .take(limit)
        .map(|r| r.map(|(_, pending)| pending))
        .collect::<StdResult<Vec<_>>>()?;

    to_json_binary(&PendingOpensResponse { opens })
}
