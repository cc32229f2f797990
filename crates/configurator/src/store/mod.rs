//! Storage seams for rule tables, pricing scopes, and precomputed labor costs.

mod catalog;
mod memory;

pub use catalog::{
    load_catalog, load_materials_csv, read_materials_csv, sample_catalog, CatalogError,
};
pub use memory::{InMemoryLaborCostCache, InMemoryRateSheetDirectory, InMemoryRuleStore};

use std::sync::Arc;
use std::time::Duration;

use crate::engine::RuleSnapshot;

/// Source of the current rule snapshot. Every resolution reads exactly one snapshot.
pub trait RuleStore: Send + Sync {
    fn snapshot(&self) -> Result<Arc<RuleSnapshot>, StoreError>;
}

/// The backing store could not answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("data unavailable: {0}")]
    Unavailable(String),
    #[error("data fetch timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}
