// src/error.rs

use thiserror::Error;

/// Why a load produced no dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Neither the remote source nor the local file yielded a single value. An
    /// unreadable local file counts as yielding nothing.
    #[error("no data available from the remote source or the local file")]
    NoData,
}
