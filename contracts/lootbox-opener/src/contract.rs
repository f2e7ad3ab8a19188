use cosmwasm_std::{entry_point, Binary, Deps, DepsMut, Env, MessageInfo, Reply, StdResult};
use cw2::{get_contract_version, set_contract_version};
use injective_cosmwasm::InjectiveMsgWrapper;
use lootbox_common::OptionCatalog;

use crate::error::ContractError;
use crate::execute;
use crate::msg::{ExecuteMsg, InstantiateMsg, MigrateMsg, OpenParams, QueryMsg, UpdateConfigParams};
use crate::query;
use crate::state::{
    ClassRecord, Config, OpenerState, CLASSES, CONFIG, DELEGATES, OPENER_STATE, OPTIONS,
};

const CONTRACT_NAME: &str = "crates.io:lootbox-opener";
const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

type ContractResponse = cosmwasm_std::Response<InjectiveMsgWrapper>;

#[entry_point]
pub fn instantiate(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<ContractResponse, ContractError> {
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    execute::validate_denom_prefix(&msg.denom_prefix)?;
    execute::validate_max_boxes(msg.max_boxes_per_call)?;
    execute::validate_drand_timing(
        msg.drand_genesis_time,
        msg.drand_period_seconds,
        msg.reveal_delay_rounds,
    )?;

    // Reject a malformed catalog before anything is written
    let catalog = OptionCatalog::load(msg.options)?;
    let supply_table = catalog.build_supply_table(&msg.class_supplies)?;

    let config = Config {
        owner: info.sender.clone(),
        drand_oracle: deps.api.addr_validate(&msg.drand_oracle)?,
        proxy_registry: msg
            .proxy_registry
            .map(|r| deps.api.addr_validate(&r))
            .transpose()?,
        denom_prefix: msg.denom_prefix,
        max_boxes_per_call: msg.max_boxes_per_call,
        drand_genesis_time: msg.drand_genesis_time,
        drand_period_seconds: msg.drand_period_seconds,
        reveal_delay_rounds: msg.reveal_delay_rounds,
    };
    CONFIG.save(deps.storage, &config)?;
    OPENER_STATE.save(deps.storage, &OpenerState::default())?;

    for option in catalog.options() {
        OPTIONS.save(deps.storage, option.option_id, option)?;
    }

    let mut response = ContractResponse::new();
    for (class_id, supply) in &supply_table {
        let (create_denom_msg, denom) =
            execute::create_class_denom(&env, &config.denom_prefix, *class_id);
        CLASSES.save(
            deps.storage,
            *class_id,
            &ClassRecord {
                class_id: *class_id,
                denom,
                initial: *supply,
                remaining: *supply,
                minted: 0,
            },
        )?;
        response = response.add_message(create_denom_msg);
    }

    for delegate in &msg.delegates {
        let addr = deps.api.addr_validate(delegate)?;
        DELEGATES.save(deps.storage, &addr, &())?;
    }

    Ok(response
        .add_attribute("action", "instantiate")
        .add_attribute("contract", "lootbox-opener")
        .add_attribute("owner", info.sender.to_string())
        .add_attribute("options", catalog.options().count().to_string())
        .add_attribute("classes", supply_table.len().to_string()))
}

#[entry_point]
pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    msg: ExecuteMsg,
) -> Result<ContractResponse, ContractError> {
    match msg {
        ExecuteMsg::Mint {
            recipient,
            option_id,
            box_count,
        } => {
            let recipient = deps.api.addr_validate(&recipient)?;
            execute::mint(
                deps,
                env,
                info,
                OpenParams {
                    recipient,
                    option_id,
                    box_count,
                },
            )
        }
        ExecuteMsg::IssueBoxes {
            recipient,
            option_id,
            amount,
        } => execute::issue_boxes(deps, env, info, recipient, option_id, amount),
        ExecuteMsg::Unpack {
            option_id,
            recipient,
            box_count,
        } => execute::unpack(deps, env, info, option_id, recipient, box_count),
        ExecuteMsg::RevealOpen { open_id } => execute::reveal_open(deps, env, info, open_id),
        ExecuteMsg::UpdateDelegates { add, remove } => {
            execute::update_delegates(deps, env, info, add, remove)
        }
        ExecuteMsg::UpdateConfig {
            owner,
            drand_oracle,
            proxy_registry,
            clear_proxy_registry,
            max_boxes_per_call,
            drand_genesis_time,
            drand_period_seconds,
            reveal_delay_rounds,
        } => execute::update_config(
            deps,
            env,
            info,
            UpdateConfigParams {
                owner,
                drand_oracle,
                proxy_registry,
                clear_proxy_registry,
                max_boxes_per_call,
                drand_genesis_time,
                drand_period_seconds,
                reveal_delay_rounds,
            },
        ),
    }
}

#[entry_point]
pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Config {} => query::query_config(deps),
        QueryMsg::OpenerState {} => query::query_opener_state(deps),
        QueryMsg::BoxOption { option_id } => query::query_option(deps, option_id),
        QueryMsg::Options { start_after, limit } => {
            query::query_options(deps, start_after, limit)
        }
        QueryMsg::ClassSupply { class_id } => query::query_class_supply(deps, class_id),
        QueryMsg::ClassSupplies { start_after, limit } => {
            query::query_class_supplies(deps, start_after, limit)
        }
        QueryMsg::BoxBalance { address, option_id } => {
            query::query_box_balance(deps, address, option_id)
        }
        QueryMsg::Delegates {} => query::query_delegates(deps),
        QueryMsg::PendingOpen { open_id } => query::query_pending_open(deps, open_id),
        QueryMsg::PendingOpens { start_after, limit } => {
            query::query_pending_opens(deps, start_after, limit)
        }
    }
}

#[entry_point]
pub fn reply(_deps: DepsMut, _env: Env, msg: Reply) -> Result<ContractResponse, ContractError> {
    execute::handle_ledger_reply(msg)
}

#[entry_point]
pub fn migrate(
    deps: DepsMut,
    _env: Env,
    _msg: MigrateMsg,
) -> Result<ContractResponse, ContractError> {
    let stored = get_contract_version(deps.storage)?;
    if stored.contract != CONTRACT_NAME {
        return Err(ContractError::Unauthorized {
            reason: "Cannot migrate from different contract type".to_string(),
        });
    }

    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;

    Ok(ContractResponse::new()
        .add_attribute("action", "migrate")
        .add_attribute("from_version", stored.version)
        .add_attribute("to_version", CONTRACT_VERSION))
}
