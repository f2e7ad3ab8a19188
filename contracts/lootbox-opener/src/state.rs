use cosmwasm_schema::cw_serde;
use cosmwasm_std::{Addr, Storage, Timestamp, Uint128};
use cw_storage_plus::{Item, Map};
use lootbox_common::{BoxOption, ClassId, OptionId, Supply, SupplyError, SupplyTracker};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const CONFIG: Item<Config> = Item::new("config");
pub const OPENER_STATE: Item<OpenerState> = Item::new("opener_state");
/// Option catalog, written once at instantiation.
pub const OPTIONS: Map<OptionId, BoxOption> = Map::new("options");
pub const CLASSES: Map<ClassId, ClassRecord> = Map::new("classes");
pub const DELEGATES: Map<&Addr, ()> = Map::new("delegates");
/// Sealed boxes held per (holder, option).
pub const BOX_BALANCES: Map<(&Addr, OptionId), Uint128> = Map::new("box_balances");
/// Opens waiting for their committed drand round, by open id.
pub const PENDING_OPENS: Map<u64, PendingOpen> = Map::new("pending_opens");

#[cw_serde]
pub struct Config {
    pub owner: Addr,
    pub drand_oracle: Addr,
    /// Registry answering "which proxy acts for this owner". Optional.
    pub proxy_registry: Option<Addr>,
    /// Class denoms are `factory/{contract}/{denom_prefix}{class_id}`
    pub denom_prefix: String,
    pub max_boxes_per_call: u32,
    /// Unix seconds of drand round 1 on the chain the oracle follows.
    pub drand_genesis_time: u64,
    pub drand_period_seconds: u64,
    /// How far past the latest published round an open commits.
    pub reveal_delay_rounds: u64,
}

#[cw_serde]
#[derive(Default)]
pub struct OpenerState {
    /// Mixed into every seed so two opens against the same beacon differ.
    pub next_open_id: u64,
    pub total_boxes_opened: u64,
    pub total_items_minted: u64,
    pub total_boxes_issued: Uint128,
    /// Boxes handed back as sealed boxes because supply ran out at reveal.
    pub total_boxes_refunded: u64,
}

#[cw_serde]
pub enum OpenSource {
    /// Requested by a minter. Nothing was burned.
    Mint,
    /// Requested by a holder whose sealed boxes were burned.
    Unpack,
}

/// An open whose outcome is fixed by a drand round that had not been
/// published when it was requested.
#[cw_serde]
pub struct PendingOpen {
    pub open_id: u64,
    pub source: OpenSource,
    pub requester: Addr,
    pub recipient: Addr,
    pub option_id: OptionId,
    pub box_count: u32,
    pub target_round: u64,
    pub requested_at: Timestamp,
}

impl PendingOpen {
    /// Who gets sealed boxes back if the open cannot be filled.
    pub fn refund_to(&self) -> &Addr {
        match self.source {
            OpenSource::Mint => &self.recipient,
            OpenSource::Unpack => &self.requester,
        }
    }
}

#[cw_serde]
pub struct ClassRecord {
    pub class_id: ClassId,
    pub denom: String,
    pub initial: Supply,
    pub remaining: Supply,
    pub minted: u64,
}

/// Beacon as returned by the drand oracle. Not `cw_serde` so that extra
/// fields on the oracle side do not break decoding.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct StoredBeaconResponse {
    pub round: u64,
    pub randomness: Vec<u8>,
    pub signature: Vec<u8>,
    pub verified: bool,
}

/// Class supply tracker backed by [`CLASSES`].
pub struct StoredSupply<'a> {
    storage: &'a mut dyn Storage,
}

impl<'a> StoredSupply<'a> {
    pub fn new(storage: &'a mut dyn Storage) -> Self {
        Self { storage }
    }

    fn load(&self, class_id: ClassId) -> Result<ClassRecord, SupplyError> {
        CLASSES
            .may_load(&*self.storage, class_id)?
            .ok_or(SupplyError::UnknownClass { class_id })
    }
}

impl SupplyTracker for StoredSupply<'_> {
    fn remaining(&self, class_id: ClassId) -> Result<Supply, SupplyError> {
        Ok(self.load(class_id)?.remaining)
    }

    fn reserve(&mut self, class_id: ClassId, quantity: u64) -> Result<(), SupplyError> {
        let mut record = self.load(class_id)?;
        if let Supply::Limited(remaining) = record.remaining {
            if quantity > remaining {
                return Err(SupplyError::Insufficient {
                    class_id,
                    requested: quantity,
                    remaining,
                });
            }
            record.remaining = Supply::Limited(remaining - quantity);
        }
        record.minted += quantity;
        CLASSES.save(&mut *self.storage, class_id, &record)?;
        Ok(())
    }

    fn release(&mut self, class_id: ClassId, quantity: u64) -> Result<(), SupplyError> {
        let mut record = self.load(class_id)?;
        if let Supply::Limited(remaining) = record.remaining {
            record.remaining = Supply::Limited(remaining.saturating_add(quantity));
        }
        record.minted = record.minted.saturating_sub(quantity);
        CLASSES.save(&mut *self.storage, class_id, &record)?;
        Ok(())
    }
}
