//! Cube provider: the load/generate/evict state machine over columns.
#![forbid(unsafe_code)]

mod inflight;
mod provider;

pub use provider::{CubeHandle, CubeProvider, EvictStats, ProviderStats};

use strata_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
