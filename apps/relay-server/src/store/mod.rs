//! File-backed persistence stores
//!
//! Each store keeps its authoritative state in memory and rewrites its
//! full JSON snapshot per mutation, through a temp file plus rename so a
//! crash mid-write loses at most the pending mutation. The two stores are
//! independent of each other; nothing is cross-store transactional. A
//! persistence failure is logged and the in-memory state stays
//! authoritative for the rest of the run.

mod history;
mod users;

pub use history::*;
pub use users::*;

use std::fs;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Atomically replace `path` with the JSON snapshot of `value`.
pub(crate) fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
