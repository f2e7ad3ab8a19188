pub mod allocation;
pub mod catalog;
pub mod draw;
pub mod error;
pub mod supply;
pub mod types;

pub use allocation::allocate;
pub use catalog::{OptionCatalog, MAX_ITEMS_PER_BOX};
pub use draw::{DrawEngine, EntropySource, HashChainEntropy, ScriptedEntropy};
pub use error::{AllocationError, CatalogError, DrawError, SupplyError};
pub use supply::{InMemorySupply, SupplyTracker};
pub use types::{
    AllocationResult, BoxContents, BoxOption, ClassId, ClassProbability, ClassQuantity,
    ClassSupplyConfig, Guarantee, OptionId, Supply, PROBABILITY_BASIS,
};
