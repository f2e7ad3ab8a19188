use cosmwasm_std::{
    to_json_binary, Addr, Coin, CosmosMsg, Deps, DepsMut, Env, Event, MessageInfo, QueryRequest,
    Reply, Response, StdResult, Storage, SubMsg, SubMsgResult, Timestamp, Uint128, WasmQuery,
};
use injective_cosmwasm::{create_mint_tokens_msg, create_new_denom_msg, InjectiveMsgWrapper};
use lootbox_common::{
    allocate, AllocationError, BoxOption, ClassId, DrawEngine, HashChainEntropy, OptionId, Supply,
};
use sha2::{Digest, Sha256};

use crate::error::ContractError;
use crate::msg::{OpenParams, OracleQueryMsg, ProxyRegistryQueryMsg, UpdateConfigParams};
use crate::state::{
    Config, OpenSource, PendingOpen, StoredBeaconResponse, StoredSupply, BOX_BALANCES, CLASSES,
    CONFIG, DELEGATES, OPENER_STATE, OPTIONS, PENDING_OPENS,
};

type ContractResponse = Response<InjectiveMsgWrapper>;

/// Hard ceiling for `max_boxes_per_call`.
pub const MAX_BOXES_PER_CALL_LIMIT: u32 = 100;

/// Ceiling on `items_per_box * box_count` for a single open.
pub const MAX_ITEMS_PER_OPEN: u64 = 1_000;

/// Ceiling on `reveal_delay_rounds`.
pub const MAX_REVEAL_DELAY_ROUNDS: u64 = 100;

/// Ledger mints reply with `LEDGER_REPLY_BASE + class_id`.
pub const LEDGER_REPLY_BASE: u64 = 1 << 32;

const SEED_DOMAIN: &[u8] = b"lootbox-open";
const MAX_DENOM_PREFIX_LEN: usize = 32;

pub fn validate_denom_prefix(prefix: &str) -> Result<(), ContractError> {
    if prefix.is_empty() || prefix.len() > MAX_DENOM_PREFIX_LEN {
        return Err(ContractError::InvalidDenomPrefix {
            reason: format!("length must be 1..={MAX_DENOM_PREFIX_LEN}"),
        });
    }
    if !prefix.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ContractError::InvalidDenomPrefix {
            reason: "only ascii letters are allowed".to_string(),
        });
    }
    Ok(())
}

pub fn validate_max_boxes(value: u32) -> Result<(), ContractError> {
    if value == 0 || value > MAX_BOXES_PER_CALL_LIMIT {
        return Err(ContractError::InvalidMaxBoxes {
            value,
            limit: MAX_BOXES_PER_CALL_LIMIT,
        });
    }
    Ok(())
}

/// Create the Token Factory denom for one item class.
pub fn create_class_denom(
    env: &Env,
    denom_prefix: &str,
    class_id: ClassId,
) -> (CosmosMsg<InjectiveMsgWrapper>, String) {
    let contract_addr = env.contract.address.to_string();
    let subdenom = format!("{denom_prefix}{class_id}");
    let full_denom = format!("factory/{}/{}", contract_addr, subdenom);
    (create_new_denom_msg(contract_addr, subdenom), full_denom)
}

/// Owner, a registered delegate, or the proxy the registry reports for the owner.
pub fn is_authorized(deps: Deps, config: &Config, sender: &Addr) -> StdResult<bool> {
    if *sender == config.owner || DELEGATES.has(deps.storage, sender) {
        return Ok(true);
    }

    let Some(registry) = &config.proxy_registry else {
        return Ok(false);
    };
    let proxy_query = QueryRequest::Wasm(WasmQuery::Smart {
        contract_addr: registry.to_string(),
        msg: to_json_binary(&ProxyRegistryQueryMsg::Proxy {
            owner: config.owner.to_string(),
        })?,
    });
    let proxy: Option<String> = deps.querier.query(&proxy_query)?;
    Ok(proxy.as_deref() == Some(sender.as_str()))
}

fn ensure_minter(deps: Deps, config: &Config, sender: &Addr) -> Result<(), ContractError> {
    if !is_authorized(deps, config, sender)? {
        return Err(ContractError::Unauthorized {
            reason: "owner, delegate or proxy only".to_string(),
        });
    }
    Ok(())
}

fn ensure_owner(config: &Config, sender: &Addr) -> Result<(), ContractError> {
    if *sender != config.owner {
        return Err(ContractError::Unauthorized {
            reason: "only owner can call this".to_string(),
        });
    }
    Ok(())
}

/// Request boxes opened straight into the recipient's wallet.
pub fn mint(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    params: OpenParams,
) -> Result<ContractResponse, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    ensure_minter(deps.as_ref(), &config, &info.sender)?;

    let response = request_open(deps, &env, &config, &info.sender, OpenSource::Mint, &params)?;
    Ok(response
        .add_attribute("action", "mint")
        .add_attribute("minter", info.sender.to_string()))
}

/// Credit sealed boxes that the holder can unpack later.
pub fn issue_boxes(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    recipient: String,
    option_id: OptionId,
    amount: Uint128,
) -> Result<ContractResponse, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    ensure_minter(deps.as_ref(), &config, &info.sender)?;

    if amount.is_zero() {
        return Err(ContractError::ZeroBoxes);
    }
    if !OPTIONS.has(deps.storage, option_id) {
        return Err(ContractError::InvalidOption { option_id });
    }
    let recipient = deps.api.addr_validate(&recipient)?;

    let balance = credit_boxes(deps.storage, &recipient, option_id, amount)?;

    let mut state = OPENER_STATE.load(deps.storage)?;
    state.total_boxes_issued = state.total_boxes_issued.checked_add(amount)?;
    OPENER_STATE.save(deps.storage, &state)?;

    Ok(ContractResponse::new()
        .add_attribute("action", "issue_boxes")
        .add_attribute("recipient", recipient.to_string())
        .add_attribute("option_id", option_id.to_string())
        .add_attribute("amount", amount.to_string())
        .add_event(
            Event::new("lootbox_boxes_issued")
                .add_attribute("issuer", info.sender.to_string())
                .add_attribute("recipient", recipient.to_string())
                .add_attribute("option_id", option_id.to_string())
                .add_attribute("amount", amount.to_string())
                .add_attribute("new_balance", balance.to_string()),
        ))
}

fn credit_boxes(
    storage: &mut dyn Storage,
    holder: &Addr,
    option_id: OptionId,
    amount: Uint128,
) -> Result<Uint128, ContractError> {
    let balance = BOX_BALANCES
        .may_load(storage, (holder, option_id))?
        .unwrap_or_default()
        .checked_add(amount)?;
    BOX_BALANCES.save(storage, (holder, option_id), &balance)?;
    Ok(balance)
}

/// Burn sealed boxes held by the sender and request an open.
pub fn unpack(
    mut deps: DepsMut,
    env: Env,
    info: MessageInfo,
    option_id: OptionId,
    recipient: Option<String>,
    box_count: u32,
) -> Result<ContractResponse, ContractError> {
    let config = CONFIG.load(deps.storage)?;

    if box_count == 0 {
        return Err(ContractError::ZeroBoxes);
    }
    if !OPTIONS.has(deps.storage, option_id) {
        return Err(ContractError::InvalidOption { option_id });
    }
    let recipient = match recipient {
        Some(r) => deps.api.addr_validate(&r)?,
        None => info.sender.clone(),
    };

    let held = BOX_BALANCES
        .may_load(deps.storage, (&info.sender, option_id))?
        .unwrap_or_default();
    let requested = Uint128::from(box_count);
    if held < requested {
        return Err(ContractError::InsufficientBoxes {
            option_id,
            available: held,
            requested: box_count,
        });
    }

    let params = OpenParams {
        recipient,
        option_id,
        box_count,
    };
    let response = request_open(
        deps.branch(),
        &env,
        &config,
        &info.sender,
        OpenSource::Unpack,
        &params,
    )?;

    let remaining = held - requested;
    if remaining.is_zero() {
        BOX_BALANCES.remove(deps.storage, (&info.sender, option_id));
    } else {
        BOX_BALANCES.save(deps.storage, (&info.sender, option_id), &remaining)?;
    }

    Ok(response
        .add_attribute("action", "unpack")
        .add_attribute("holder", info.sender.to_string())
        .add_attribute("boxes_left", remaining.to_string()))
}

/// Shared request path for `mint` and `unpack`. Validates the open and
/// commits it to the first round published after `reveal_delay_rounds`.
fn request_open(
    deps: DepsMut,
    env: &Env,
    config: &Config,
    requester: &Addr,
    source: OpenSource,
    params: &OpenParams,
) -> Result<ContractResponse, ContractError> {
    let OpenParams {
        recipient,
        option_id,
        box_count,
    } = params;

    if *box_count == 0 {
        return Err(ContractError::ZeroBoxes);
    }
    if *box_count > config.max_boxes_per_call {
        return Err(ContractError::TooManyBoxes {
            requested: *box_count,
            max: config.max_boxes_per_call,
        });
    }
    let option = OPTIONS
        .may_load(deps.storage, *option_id)?
        .ok_or(ContractError::InvalidOption {
            option_id: *option_id,
        })?;

    let items = u64::from(option.items_per_box) * u64::from(*box_count);
    if items > MAX_ITEMS_PER_OPEN {
        return Err(ContractError::TooManyItems {
            requested: items,
            max: MAX_ITEMS_PER_OPEN,
        });
    }
    ensure_supply_covers(deps.as_ref(), &option, items)?;

    let target_round = commit_round(config, env.block.time)?;

    let mut state = OPENER_STATE.load(deps.storage)?;
    let open_id = state.next_open_id;
    state.next_open_id += 1;
    OPENER_STATE.save(deps.storage, &state)?;

    let pending = PendingOpen {
        open_id,
        source,
        requester: requester.clone(),
        recipient: recipient.clone(),
        option_id: *option_id,
        box_count: *box_count,
        target_round,
        requested_at: env.block.time,
    };
    PENDING_OPENS.save(deps.storage, open_id, &pending)?;

    Ok(ContractResponse::new()
        .add_attribute("open_id", open_id.to_string())
        .add_attribute("target_round", target_round.to_string())
        .add_event(
            Event::new("lootbox_open_requested")
                .add_attribute("open_id", open_id.to_string())
                .add_attribute("requester", requester.to_string())
                .add_attribute("recipient", recipient.to_string())
                .add_attribute("option_id", option_id.to_string())
                .add_attribute("box_count", box_count.to_string())
                .add_attribute("target_round", target_round.to_string())
                .add_attribute("reveal_after", round_time(config, target_round).to_string()),
        ))
}

/// Reject opens that could never be filled from what is left right now.
/// Other pending opens are not counted, so this can pass and the reveal
/// still run dry.
fn ensure_supply_covers(deps: Deps, option: &BoxOption, items: u64) -> Result<(), ContractError> {
    let mut available = 0u64;
    for class in &option.classes {
        let record = CLASSES.load(deps.storage, class.class_id)?;
        match record.remaining {
            Supply::Unlimited => return Ok(()),
            Supply::Limited(n) => available = available.saturating_add(n),
        }
    }
    if available < items {
        return Err(ContractError::SupplyExhausted {
            option_id: option.option_id,
            class_id: None,
        });
    }
    Ok(())
}

/// Allocate a pending open from its committed round. Anyone may call this.
///
/// If supply runs out the open is dropped and its boxes come back as sealed
/// boxes, so a pending open never gets stuck.
pub fn reveal_open(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    open_id: u64,
) -> Result<ContractResponse, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    let pending = PENDING_OPENS
        .may_load(deps.storage, open_id)?
        .ok_or(ContractError::PendingOpenNotFound { open_id })?;

    let randomness = fetch_beacon_randomness(deps.as_ref(), &config, pending.target_round)?;
    let option = OPTIONS.load(deps.storage, pending.option_id)?;

    let seed = derive_seed(
        &randomness,
        open_id,
        &pending.recipient,
        pending.option_id,
        pending.box_count,
    );
    let mut draws = DrawEngine::new(HashChainEntropy::new(seed));
    let outcome = {
        let mut supply = StoredSupply::new(deps.storage);
        allocate(&option, pending.box_count, &mut supply, &mut draws)
    };
    PENDING_OPENS.remove(deps.storage, open_id);

    let result = match outcome {
        Ok(result) => result,
        Err(err @ AllocationError::SupplyExhausted { .. }) => {
            let response = refund_open(deps, &pending, &err.to_string())?;
            return Ok(response
                .add_attribute("action", "reveal_open")
                .add_attribute("revealer", info.sender.to_string()));
        }
        Err(err) => return Err(err.into()),
    };

    let mut state = OPENER_STATE.load(deps.storage)?;
    state.total_boxes_opened += u64::from(pending.box_count);
    state.total_items_minted += result.total_items;
    OPENER_STATE.save(deps.storage, &state)?;

    let recipient = &pending.recipient;
    let mut response = ContractResponse::new()
        .add_attribute("action", "reveal_open")
        .add_attribute("revealer", info.sender.to_string())
        .add_attribute("open_id", open_id.to_string())
        .add_attribute("recipient", recipient.to_string())
        .add_attribute("total_items", result.total_items.to_string())
        .add_event(
            Event::new("lootbox_opened")
                .add_attribute("open_id", open_id.to_string())
                .add_attribute("recipient", recipient.to_string())
                .add_attribute("option_id", pending.option_id.to_string())
                .add_attribute("box_count", pending.box_count.to_string())
                .add_attribute("total_items", result.total_items.to_string())
                .add_attribute("drand_round", pending.target_round.to_string())
                .add_attribute("seed", draws.source().seed_hex())
                .add_attribute("draws", draws.draws().to_string()),
        );

    for total in &result.totals {
        if total.quantity == 0 {
            continue;
        }
        let record = CLASSES.load(deps.storage, total.class_id)?;
        let mint_msg = create_mint_tokens_msg(
            env.contract.address.clone(),
            Coin {
                denom: record.denom.clone(),
                amount: Uint128::from(total.quantity),
            },
            recipient.to_string(),
        );
        response = response
            .add_submessage(SubMsg::reply_on_error(
                mint_msg,
                LEDGER_REPLY_BASE + u64::from(total.class_id),
            ))
            .add_event(
                Event::new("lootbox_item_transferred")
                    .add_attribute("recipient", recipient.to_string())
                    .add_attribute("option_id", pending.option_id.to_string())
                    .add_attribute("class_id", total.class_id.to_string())
                    .add_attribute("denom", record.denom)
                    .add_attribute("quantity", total.quantity.to_string()),
            );
    }

    Ok(response)
}

/// Hand the boxes of an unfillable open back as sealed boxes.
fn refund_open(
    deps: DepsMut,
    pending: &PendingOpen,
    reason: &str,
) -> Result<ContractResponse, ContractError> {
    let holder = pending.refund_to();
    let balance = credit_boxes(
        deps.storage,
        holder,
        pending.option_id,
        Uint128::from(pending.box_count),
    )?;

    let mut state = OPENER_STATE.load(deps.storage)?;
    state.total_boxes_refunded += u64::from(pending.box_count);
    OPENER_STATE.save(deps.storage, &state)?;

    Ok(ContractResponse::new()
        .add_attribute("open_id", pending.open_id.to_string())
        .add_attribute("outcome", "refunded")
        .add_event(
            Event::new("lootbox_open_refunded")
                .add_attribute("open_id", pending.open_id.to_string())
                .add_attribute("holder", holder.to_string())
                .add_attribute("option_id", pending.option_id.to_string())
                .add_attribute("box_count", pending.box_count.to_string())
                .add_attribute("new_balance", balance.to_string())
                .add_attribute("reason", reason),
        ))
}

/// Latest round published at `time`. Zero before genesis.
pub fn latest_round_at(config: &Config, time: Timestamp) -> u64 {
    let now = time.seconds();
    if now < config.drand_genesis_time {
        return 0;
    }
    (now - config.drand_genesis_time) / config.drand_period_seconds + 1
}

/// Unix seconds at which `round` is published.
pub fn round_time(config: &Config, round: u64) -> u64 {
    config.drand_genesis_time.saturating_add(
        round
            .saturating_sub(1)
            .saturating_mul(config.drand_period_seconds),
    )
}

/// The round a new open commits to at `time`.
pub fn commit_round(config: &Config, time: Timestamp) -> Result<u64, ContractError> {
    let round = latest_round_at(config, time).saturating_add(config.reveal_delay_rounds);
    ensure_future_round(config, round, time)?;
    Ok(round)
}

/// A round is only usable if its beacon did not exist yet at `time`.
pub fn ensure_future_round(
    config: &Config,
    round: u64,
    time: Timestamp,
) -> Result<(), ContractError> {
    let published = round_time(config, round);
    if round == 0 || published <= time.seconds() {
        return Err(ContractError::RoundNotInFuture {
            round,
            round_time: published,
            block_time: time.seconds(),
        });
    }
    Ok(())
}

pub fn validate_drand_timing(
    genesis_time: u64,
    period_seconds: u64,
    reveal_delay_rounds: u64,
) -> Result<(), ContractError> {
    if genesis_time == 0 {
        return Err(ContractError::InvalidDrandTiming {
            reason: "genesis time must be set".to_string(),
        });
    }
    if period_seconds == 0 {
        return Err(ContractError::InvalidDrandTiming {
            reason: "period must be at least one second".to_string(),
        });
    }
    if reveal_delay_rounds == 0 || reveal_delay_rounds > MAX_REVEAL_DELAY_ROUNDS {
        return Err(ContractError::InvalidDrandTiming {
            reason: format!("reveal delay must be 1..={MAX_REVEAL_DELAY_ROUNDS} rounds"),
        });
    }
    Ok(())
}

/// 32-byte beacon randomness for `round`, read from the drand oracle.
fn fetch_beacon_randomness(
    deps: Deps,
    config: &Config,
    round: u64,
) -> Result<Vec<u8>, ContractError> {
    let beacon_query = QueryRequest::Wasm(WasmQuery::Smart {
        contract_addr: config.drand_oracle.to_string(),
        msg: to_json_binary(&OracleQueryMsg::Beacon { round })?,
    });

    let beacon_response: Option<StoredBeaconResponse> = deps.querier.query(&beacon_query)?;
    let beacon = beacon_response.ok_or(ContractError::BeaconNotFound { round })?;
    if beacon.round != round || beacon.randomness.len() != 32 {
        return Err(ContractError::BeaconNotFound { round });
    }
    Ok(beacon.randomness)
}

/// `sha256("lootbox-open" || randomness || open_id || recipient || option_id || box_count)`,
/// integers big endian. Every input is fixed when the open is requested.
pub fn derive_seed(
    randomness: &[u8],
    open_id: u64,
    recipient: &Addr,
    option_id: OptionId,
    box_count: u32,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(SEED_DOMAIN);
    hasher.update(randomness);
    hasher.update(open_id.to_be_bytes());
    hasher.update(recipient.as_bytes());
    hasher.update(option_id.to_be_bytes());
    hasher.update(box_count.to_be_bytes());
    hasher.finalize().into()
}

/// A failed ledger mint aborts the whole open, supply included.
pub fn handle_ledger_reply(msg: Reply) -> Result<ContractResponse, ContractError> {
    let class_id = msg
        .id
        .checked_sub(LEDGER_REPLY_BASE)
        .and_then(|offset| ClassId::try_from(offset).ok())
        .ok_or(ContractError::UnknownReply { id: msg.id })?;

    match msg.result {
        SubMsgResult::Err(reason) => Err(ContractError::LedgerError { class_id, reason }),
        SubMsgResult::Ok(_) => Ok(ContractResponse::new()
            .add_attribute("action", "ledger_mint")
            .add_attribute("class_id", class_id.to_string())),
    }
}

/// Add and remove delegates. Owner only.
pub fn update_delegates(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    add: Vec<String>,
    remove: Vec<String>,
) -> Result<ContractResponse, ContractError> {
    let config = CONFIG.load(deps.storage)?;
    ensure_owner(&config, &info.sender)?;

    for addr in &add {
        let addr = deps.api.addr_validate(addr)?;
        DELEGATES.save(deps.storage, &addr, &())?;
    }
    for addr in &remove {
        let addr = deps.api.addr_validate(addr)?;
        DELEGATES.remove(deps.storage, &addr);
    }

    Ok(ContractResponse::new()
        .add_attribute("action", "update_delegates")
        .add_attribute("added", add.len().to_string())
        .add_attribute("removed", remove.len().to_string())
        .add_event(
            Event::new("lootbox_delegates_updated")
                .add_attribute("added", add.join(","))
                .add_attribute("removed", remove.join(",")),
        ))
}

/// Update configuration. Owner only.
/// A new `proxy_registry` takes precedence over `clear_proxy_registry`.
/// Pending opens keep the round they committed to.
pub fn update_config(
    deps: DepsMut,
    _env: Env,
    info: MessageInfo,
    params: UpdateConfigParams,
) -> Result<ContractResponse, ContractError> {
    let UpdateConfigParams {
        owner,
        drand_oracle,
        proxy_registry,
        clear_proxy_registry,
        max_boxes_per_call,
        drand_genesis_time,
        drand_period_seconds,
        reveal_delay_rounds,
    } = params;

    let mut config = CONFIG.load(deps.storage)?;
    ensure_owner(&config, &info.sender)?;

    if let Some(owner) = owner {
        config.owner = deps.api.addr_validate(&owner)?;
    }
    if let Some(oracle) = drand_oracle {
        config.drand_oracle = deps.api.addr_validate(&oracle)?;
    }
    match proxy_registry {
        Some(registry) => config.proxy_registry = Some(deps.api.addr_validate(&registry)?),
        None if clear_proxy_registry => config.proxy_registry = None,
        None => {}
    }
    if let Some(max) = max_boxes_per_call {
        validate_max_boxes(max)?;
        config.max_boxes_per_call = max;
    }
    if drand_genesis_time.is_some()
        || drand_period_seconds.is_some()
        || reveal_delay_rounds.is_some()
    {
        let genesis = drand_genesis_time.unwrap_or(config.drand_genesis_time);
        let period = drand_period_seconds.unwrap_or(config.drand_period_seconds);
        let delay = reveal_delay_rounds.unwrap_or(config.reveal_delay_rounds);
        validate_drand_timing(genesis, period, delay)?;
        config.drand_genesis_time = genesis;
        config.drand_period_seconds = period;
        config.reveal_delay_rounds = delay;
    }

    CONFIG.save(deps.storage, &config)?;

    Ok(ContractResponse::new()
        .add_attribute("action", "update_config")
        .add_attribute("owner", config.owner.to_string()))
}
