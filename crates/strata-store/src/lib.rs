//! Durable column/cube storage: append-oriented region logs with batched
//! background writes.
#![forbid(unsafe_code)]

mod cache;
mod io;
mod keys;
mod region;
mod tag;

pub use io::{CubeStore, StoreConfig};
pub use keys::{column_key, cube_key};
pub use region::RegionLog;
pub use tag::DATA_VERSION;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("nbt error: {0}")]
    Nbt(#[from] fastnbt::error::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("unsupported data version {0}")]
    Version(i32),
}
