//! Integration tests for the loot box opener.
//!
//! These tests exercise the contract entry points directly using
//! `cosmwasm_std::testing` mocks. The drand oracle and the proxy registry
//! are external contracts, so the querier is mocked with
//! `MockQuerier::update_wasm`.
//!
//! Run:
//! ```bash
//! cargo test -p lootbox-integration-tests
//! ```

use cosmwasm_std::testing::{message_info, mock_dependencies, mock_env, MockApi, MockQuerier};
use cosmwasm_std::{
    from_json, to_json_binary, Addr, Binary, ContractResult, Env, Event, MemoryStorage,
    OwnedDeps, Reply, Response, SubMsgResult, SystemError, SystemResult, Uint128, WasmQuery,
};
use injective_cosmwasm::InjectiveMsgWrapper;
use lootbox_common::{
    allocate, BoxOption, ClassProbability, ClassSupplyConfig, DrawEngine, Guarantee,
    HashChainEntropy, InMemorySupply, Supply,
};
use lootbox_opener::contract::{execute, instantiate, query, reply};
use lootbox_opener::error::ContractError;
use lootbox_opener::msg::{
    BoxBalanceResponse, ClassSuppliesResponse, ExecuteMsg, InstantiateMsg, OracleQueryMsg,
    PendingOpensResponse, ProxyRegistryQueryMsg, QueryMsg,
};
use lootbox_opener::state::{OpenerState, PendingOpen, StoredBeaconResponse};
use sha2::{Digest, Sha256};

type MockDeps = OwnedDeps<MemoryStorage, MockApi, MockQuerier>;
type OpenerResponse = Response<InjectiveMsgWrapper>;

// ─── Constants ───

/// Real quicknet randomness for round 1000
const TEST_ROUND: u64 = 1000;
const TEST_RANDOMNESS_HEX: &str =
    "fe290beca10872ef2fb164d2aa4442de4566183ec51c56ff3cd603d930e54fdd";

/// Quicknet publishes a round every 3 seconds
const PERIOD: u64 = 3;

/// Rounds past this one have not been published by the mocked oracle
const LATEST_PUBLISHED: u64 = TEST_ROUND + 5;

// Class ids
const COMMON: u32 = 1;
const RARE: u32 = 2;
const EPIC: u32 = 3;
const SOLDOUT: u32 = 4;
const FILLER: u32 = 5;

// Option ids
const STANDARD: u32 = 1;
const SOLDOUT_GUARANTEE: u32 = 2;

// ─── Helpers ───

fn class(class_id: u32, weight: u32) -> ClassProbability {
    ClassProbability { class_id, weight }
}

/// STANDARD: 5 items at 70/20/10 with one epic guaranteed per box.
/// SOLDOUT_GUARANTEE: 3 items at 20/80 guaranteeing a class with no supply.
fn options() -> Vec<BoxOption> {
    vec![
        BoxOption {
            option_id: STANDARD,
            items_per_box: 5,
            classes: vec![class(COMMON, 7000), class(RARE, 2000), class(EPIC, 1000)],
            guarantees: vec![Guarantee {
                class_id: EPIC,
                minimum: 1,
            }],
        },
        BoxOption {
            option_id: SOLDOUT_GUARANTEE,
            items_per_box: 3,
            classes: vec![class(SOLDOUT, 2000), class(FILLER, 8000)],
            guarantees: vec![Guarantee {
                class_id: SOLDOUT,
                minimum: 1,
            }],
        },
    ]
}

/// Genesis placed so that requests made at `mock_env()` commit to `TEST_ROUND`.
fn genesis() -> u64 {
    mock_env().block.time.seconds() - (TEST_ROUND - 2) * PERIOD
}

/// Block time `rounds` periods after `mock_env()`.
fn env_after(rounds: u64) -> Env {
    let mut env = mock_env();
    env.block.time = env.block.time.plus_seconds(rounds * PERIOD);
    env.block.height += rounds;
    env
}

/// Randomness the mocked oracle serves for `round`.
fn randomness_for(round: u64) -> Vec<u8> {
    if round == TEST_ROUND {
        return hex::decode(TEST_RANDOMNESS_HEX).unwrap();
    }
    Sha256::digest(round.to_be_bytes()).to_vec()
}

fn instantiate_msg(epic_cap: u64) -> InstantiateMsg {
    let mock_api = MockApi::default();
    InstantiateMsg {
        drand_oracle: mock_api.addr_make("drand_oracle").to_string(),
        proxy_registry: Some(mock_api.addr_make("proxy_registry").to_string()),
        delegates: vec![],
        denom_prefix: "item".to_string(),
        max_boxes_per_call: 20,
        drand_genesis_time: genesis(),
        drand_period_seconds: PERIOD,
        reveal_delay_rounds: 1,
        options: options(),
        class_supplies: vec![
            ClassSupplyConfig {
                class_id: EPIC,
                cap: Some(epic_cap),
            },
            ClassSupplyConfig {
                class_id: SOLDOUT,
                cap: Some(0),
            },
        ],
    }
}

/// Oracle serves beacons up to `LATEST_PUBLISHED`, the registry reports
/// `proxy` for the owner.
fn mock_externals(deps: &mut MockDeps, proxy: Option<String>) {
    let oracle = deps.api.addr_make("drand_oracle").to_string();
    let registry = deps.api.addr_make("proxy_registry").to_string();
    let owner = deps.api.addr_make("owner").to_string();

    deps.querier.update_wasm(move |query| match query {
        WasmQuery::Smart { contract_addr, msg } if *contract_addr == oracle => {
            let OracleQueryMsg::Beacon { round } = from_json(msg).unwrap();
            let beacon = (round <= LATEST_PUBLISHED).then(|| StoredBeaconResponse {
                round,
                randomness: randomness_for(round),
                signature: vec![0xb4; 48],
                verified: true,
            });
            SystemResult::Ok(ContractResult::Ok(to_json_binary(&beacon).unwrap()))
        }
        WasmQuery::Smart { contract_addr, msg } if *contract_addr == registry => {
            let ProxyRegistryQueryMsg::Proxy { owner: asked } = from_json(msg).unwrap();
            let answer = if asked == owner { proxy.clone() } else { None };
            SystemResult::Ok(ContractResult::Ok(to_json_binary(&answer).unwrap()))
        }
        _ => SystemResult::Err(SystemError::InvalidRequest {
            error: "Only oracle and registry smart queries supported".to_string(),
            request: Default::default(),
        }),
    });
}

fn setup(epic_cap: u64) -> MockDeps {
    let mut deps = mock_dependencies();
    let proxy = deps.api.addr_make("proxy").to_string();
    mock_externals(&mut deps, Some(proxy));

    let owner = deps.api.addr_make("owner");
    let info = message_info(&owner, &[]);
    instantiate(deps.as_mut(), mock_env(), info, instantiate_msg(epic_cap)).unwrap();
    deps
}

fn request_mint(
    deps: &mut MockDeps,
    sender: &Addr,
    recipient: &Addr,
    option_id: u32,
    box_count: u32,
) -> Result<OpenerResponse, ContractError> {
    execute(
        deps.as_mut(),
        mock_env(),
        message_info(sender, &[]),
        ExecuteMsg::Mint {
            recipient: recipient.to_string(),
            option_id,
            box_count,
        },
    )
}

fn reveal_at(
    deps: &mut MockDeps,
    env: Env,
    open_id: u64,
) -> Result<OpenerResponse, ContractError> {
    let keeper = deps.api.addr_make("keeper");
    execute(
        deps.as_mut(),
        env,
        message_info(&keeper, &[]),
        ExecuteMsg::RevealOpen { open_id },
    )
}

/// Request, then reveal one period later. Returns the reveal response.
fn mint(
    deps: &mut MockDeps,
    sender: &Addr,
    recipient: &Addr,
    option_id: u32,
    box_count: u32,
) -> Result<OpenerResponse, ContractError> {
    let requested = request_mint(deps, sender, recipient, option_id, box_count)?;
    reveal_at(deps, env_after(1), open_id_of(&requested))
}

fn open_id_of(res: &OpenerResponse) -> u64 {
    res.attributes
        .iter()
        .find(|a| a.key == "open_id")
        .map(|a| a.value.parse().unwrap())
        .expect("open_id attribute")
}

/// `sha256("lootbox-open" || randomness || open_id || recipient || option_id || box_count)`
fn expected_seed(
    round: u64,
    open_id: u64,
    recipient: &Addr,
    option_id: u32,
    box_count: u32,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"lootbox-open");
    hasher.update(randomness_for(round));
    hasher.update(open_id.to_be_bytes());
    hasher.update(recipient.as_bytes());
    hasher.update(option_id.to_be_bytes());
    hasher.update(box_count.to_be_bytes());
    hasher.finalize().into()
}

fn attr(event: &Event, key: &str) -> String {
    event
        .attributes
        .iter()
        .find(|a| a.key == key)
        .map(|a| a.value.clone())
        .unwrap_or_else(|| panic!("missing attribute {key} on {}", event.ty))
}

/// Minted (class_id, quantity) pairs in emission order.
fn transfers(res: &OpenerResponse) -> Vec<(u32, u64)> {
    res.events
        .iter()
        .filter(|e| e.ty == "lootbox_item_transferred")
        .map(|e| {
            (
                attr(e, "class_id").parse().unwrap(),
                attr(e, "quantity").parse().unwrap(),
            )
        })
        .collect()
}

fn event<'a>(res: &'a OpenerResponse, ty: &str) -> &'a Event {
    res.events
        .iter()
        .find(|e| e.ty == ty)
        .unwrap_or_else(|| panic!("missing {ty} event"))
}

fn opened_event(res: &OpenerResponse) -> &Event {
    event(res, "lootbox_opened")
}

fn class_supplies(deps: &MockDeps) -> ClassSuppliesResponse {
    from_json(
        query(
            deps.as_ref(),
            mock_env(),
            QueryMsg::ClassSupplies {
                start_after: None,
                limit: None,
            },
        )
        .unwrap(),
    )
    .unwrap()
}

fn opener_state(deps: &MockDeps) -> OpenerState {
    from_json(query(deps.as_ref(), mock_env(), QueryMsg::OpenerState {}).unwrap()).unwrap()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_open_two_boxes_scenario() {
    let mut deps = setup(100);
    let owner = deps.api.addr_make("owner");
    let player = deps.api.addr_make("player");

    let res = mint(&mut deps, &owner, &player, STANDARD, 2).unwrap();

    let minted = transfers(&res);
    let total: u64 = minted.iter().map(|(_, q)| q).sum();
    assert_eq!(total, 10);
    assert_eq!(attr(opened_event(&res), "total_items"), "10");

    // Ascending class order, one ledger mint per class
    let ids: Vec<u32> = minted.iter().map(|(id, _)| *id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(ids, sorted);
    assert_eq!(res.messages.len(), minted.len());

    let epic = minted
        .iter()
        .find(|(id, _)| *id == EPIC)
        .map(|(_, q)| *q)
        .unwrap_or(0);
    assert!(epic >= 2, "each box guarantees one epic, got {epic}");
}

#[test]
fn test_supply_accounting_across_calls() {
    let mut deps = setup(30);
    let owner = deps.api.addr_make("owner");
    let player = deps.api.addr_make("player");

    let mut opened = 0u64;
    for _ in 0..5 {
        mint(&mut deps, &owner, &player, STANDARD, 3).unwrap();
        opened += 3;
    }

    let supplies = class_supplies(&deps);
    let mut minted_total = 0u64;
    for record in &supplies.classes {
        if let (Supply::Limited(initial), Supply::Limited(remaining)) =
            (record.initial, record.remaining)
        {
            assert_eq!(initial - remaining, record.minted, "class {}", record.class_id);
        }
        minted_total += record.minted;
    }
    assert_eq!(minted_total, opened * 5);

    let state = opener_state(&deps);
    assert_eq!(state.total_boxes_opened, opened);
    assert_eq!(state.total_items_minted, opened * 5);
    assert_eq!(state.next_open_id, 5);
}

#[test]
fn test_allocation_reproducible_from_seed() {
    let mut deps = setup(100);
    let owner = deps.api.addr_make("owner");
    let player = deps.api.addr_make("player");

    let res = mint(&mut deps, &owner, &player, STANDARD, 4).unwrap();

    // Rebuild the seed from public inputs
    let seed = expected_seed(TEST_ROUND, 0, &player, STANDARD, 4);
    assert_eq!(attr(opened_event(&res), "seed"), hex::encode(seed));

    // Replay the allocation off-chain against the starting supply
    let option = options().remove(0);
    let mut supply = InMemorySupply::new().with_cap(EPIC, 100);
    let mut draws = DrawEngine::new(HashChainEntropy::new(seed));
    let replay = allocate(&option, 4, &mut supply, &mut draws).unwrap();

    let expected: Vec<(u32, u64)> = replay
        .totals
        .iter()
        .filter(|t| t.quantity > 0)
        .map(|t| (t.class_id, t.quantity))
        .collect();
    assert_eq!(transfers(&res), expected);
}

#[test]
fn test_soldout_guarantee_falls_back() {
    let mut deps = setup(100);
    let owner = deps.api.addr_make("owner");
    let player = deps.api.addr_make("player");

    let res = mint(&mut deps, &owner, &player, SOLDOUT_GUARANTEE, 5).unwrap();
    let minted = transfers(&res);

    // The capped-at-zero class is never drawn and its guarantee lands on the filler
    assert_eq!(minted, vec![(FILLER, 15)]);

    let supplies = class_supplies(&deps);
    let soldout = supplies
        .classes
        .iter()
        .find(|c| c.class_id == SOLDOUT)
        .unwrap();
    assert_eq!(soldout.remaining, Supply::Limited(0));
    assert_eq!(soldout.minted, 0);
}

#[test]
fn test_exhaustion_leaves_supply_unchanged() {
    // Filler capped at four units: the second box cannot be filled
    let mut deps = mock_dependencies();
    mock_externals(&mut deps, None);
    let owner = deps.api.addr_make("owner");
    let player = deps.api.addr_make("player");

    let mut msg = instantiate_msg(100);
    msg.class_supplies.push(ClassSupplyConfig {
        class_id: FILLER,
        cap: Some(4),
    });
    instantiate(deps.as_mut(), mock_env(), message_info(&owner, &[]), msg).unwrap();

    let before = class_supplies(&deps);
    let err = mint(&mut deps, &owner, &player, SOLDOUT_GUARANTEE, 2).unwrap_err();
    assert!(matches!(
        err,
        ContractError::SupplyExhausted {
            option_id: SOLDOUT_GUARANTEE,
            ..
        }
    ));
    assert_eq!(class_supplies(&deps), before);
    assert_eq!(opener_state(&deps).next_open_id, 0);

    // A single box still fits
    let res = mint(&mut deps, &owner, &player, SOLDOUT_GUARANTEE, 1).unwrap();
    assert_eq!(transfers(&res), vec![(FILLER, 3)]);
}

#[test]
fn test_authorization_paths() {
    let mut deps = setup(100);
    let owner = deps.api.addr_make("owner");
    let proxy = deps.api.addr_make("proxy");
    let stranger = deps.api.addr_make("stranger");
    let delegate = deps.api.addr_make("delegate");
    let player = deps.api.addr_make("player");

    // Proxy reported by the registry
    mint(&mut deps, &proxy, &player, STANDARD, 1).unwrap();

    // Stranger is rejected and nothing changes
    let before = class_supplies(&deps);
    let err = mint(&mut deps, &stranger, &player, STANDARD, 1).unwrap_err();
    assert!(matches!(err, ContractError::Unauthorized { .. }));
    assert_eq!(class_supplies(&deps), before);

    // Delegates registered by the owner
    let err = mint(&mut deps, &delegate, &player, STANDARD, 1).unwrap_err();
    assert!(matches!(err, ContractError::Unauthorized { .. }));
    execute(
        deps.as_mut(),
        mock_env(),
        message_info(&owner, &[]),
        ExecuteMsg::UpdateDelegates {
            add: vec![delegate.to_string()],
            remove: vec![],
        },
    )
    .unwrap();
    mint(&mut deps, &delegate, &player, STANDARD, 1).unwrap();

    // Registry moves to another proxy
    mock_externals(&mut deps, Some(stranger.to_string()));
    let err = mint(&mut deps, &proxy, &player, STANDARD, 1).unwrap_err();
    assert!(matches!(err, ContractError::Unauthorized { .. }));
    mint(&mut deps, &stranger, &player, STANDARD, 1).unwrap();
}

#[test]
fn test_missing_beacon_and_bad_input() {
    let mut deps = setup(100);
    let owner = deps.api.addr_make("owner");
    let player = deps.api.addr_make("player");

    // Requested well after the oracle's latest beacon
    let committed_to = LATEST_PUBLISHED + 5;
    let res = execute(
        deps.as_mut(),
        env_after(committed_to - TEST_ROUND),
        message_info(&owner, &[]),
        ExecuteMsg::Mint {
            recipient: player.to_string(),
            option_id: STANDARD,
            box_count: 1,
        },
    )
    .unwrap();
    let open_id = open_id_of(&res);
    assert_eq!(
        attr(event(&res, "lootbox_open_requested"), "target_round"),
        committed_to.to_string()
    );

    let reveal_env = env_after(committed_to - TEST_ROUND + 1);
    let err = reveal_at(&mut deps, reveal_env, open_id).unwrap_err();
    assert!(matches!(
        err,
        ContractError::BeaconNotFound { round } if round == committed_to
    ));

    let err = reveal_at(&mut deps, env_after(1), 42).unwrap_err();
    assert!(matches!(err, ContractError::PendingOpenNotFound { open_id: 42 }));

    let err = request_mint(&mut deps, &owner, &player, 77, 1).unwrap_err();
    assert!(matches!(err, ContractError::InvalidOption { option_id: 77 }));

    let err = request_mint(&mut deps, &owner, &player, STANDARD, 21).unwrap_err();
    assert!(matches!(err, ContractError::TooManyBoxes { .. }));

    assert_eq!(opener_state(&deps).next_open_id, 1);
    assert_eq!(opener_state(&deps).total_boxes_opened, 0);
}

#[test]
fn test_outcome_fixed_at_request() {
    let mut deps = setup(100);
    let owner = deps.api.addr_make("owner");
    let player = deps.api.addr_make("player");

    let res = request_mint(&mut deps, &owner, &player, STANDARD, 3).unwrap();
    let open_id = open_id_of(&res);

    let pending: PendingOpen = from_json(
        query(deps.as_ref(), mock_env(), QueryMsg::PendingOpen { open_id }).unwrap(),
    )
    .unwrap();
    assert_eq!(pending.target_round, TEST_ROUND);
    assert!(genesis() + (pending.target_round - 1) * PERIOD > mock_env().block.time.seconds());

    // Nobody can see the outcome before the round is out, and waiting for a
    // later round does not change it
    let res = reveal_at(&mut deps, env_after(4), open_id).unwrap();
    let opened = opened_event(&res);
    assert_eq!(attr(opened, "drand_round"), TEST_ROUND.to_string());
    assert_eq!(
        attr(opened, "seed"),
        hex::encode(expected_seed(TEST_ROUND, open_id, &player, STANDARD, 3))
    );

    let pending: PendingOpensResponse = from_json(
        query(
            deps.as_ref(),
            mock_env(),
            QueryMsg::PendingOpens {
                start_after: None,
                limit: None,
            },
        )
        .unwrap(),
    )
    .unwrap();
    assert!(pending.opens.is_empty());
}

#[test]
fn test_sealed_box_lifecycle() {
    let mut deps = setup(100);
    let owner = deps.api.addr_make("owner");
    let holder = deps.api.addr_make("holder");
    let friend = deps.api.addr_make("friend");

    execute(
        deps.as_mut(),
        mock_env(),
        message_info(&owner, &[]),
        ExecuteMsg::IssueBoxes {
            recipient: holder.to_string(),
            option_id: STANDARD,
            amount: Uint128::new(5),
        },
    )
    .unwrap();

    let balance = |deps: &MockDeps, addr: &Addr| -> Uint128 {
        let res: BoxBalanceResponse = from_json(
            query(
                deps.as_ref(),
                mock_env(),
                QueryMsg::BoxBalance {
                    address: addr.to_string(),
                    option_id: STANDARD,
                },
            )
            .unwrap(),
        )
        .unwrap();
        res.balance
    };
    assert_eq!(balance(&deps, &holder), Uint128::new(5));

    // Opened on behalf of a friend, burned before the round is known
    let res = execute(
        deps.as_mut(),
        mock_env(),
        message_info(&holder, &[]),
        ExecuteMsg::Unpack {
            option_id: STANDARD,
            recipient: Some(friend.to_string()),
            box_count: 3,
        },
    )
    .unwrap();
    assert_eq!(balance(&deps, &holder), Uint128::new(2));

    let res = reveal_at(&mut deps, env_after(1), open_id_of(&res)).unwrap();
    assert_eq!(attr(opened_event(&res), "recipient"), friend.to_string());
    assert_eq!(transfers(&res).iter().map(|(_, q)| q).sum::<u64>(), 15);

    // Friend holds no boxes of their own
    let err = execute(
        deps.as_mut(),
        mock_env(),
        message_info(&friend, &[]),
        ExecuteMsg::Unpack {
            option_id: STANDARD,
            recipient: None,
            box_count: 1,
        },
    )
    .unwrap_err();
    assert!(matches!(err, ContractError::InsufficientBoxes { .. }));

    let state = opener_state(&deps);
    assert_eq!(state.total_boxes_issued, Uint128::new(5));
    assert_eq!(state.total_boxes_opened, 3);
}

#[test]
fn test_ledger_failure_aborts() {
    let mut deps = setup(100);
    let err = reply(
        deps.as_mut(),
        mock_env(),
        Reply {
            id: lootbox_opener::execute::LEDGER_REPLY_BASE + u64::from(EPIC),
            payload: Binary::default(),
            gas_used: 0,
            result: SubMsgResult::Err("insufficient mint permission".to_string()),
        },
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ContractError::LedgerError { class_id: EPIC, .. }
    ));
}
