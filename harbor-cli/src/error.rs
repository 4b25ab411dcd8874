//! Error types for the CLI.

use harbor_core::HarborError;
use harbor_storage::LmdbCacheError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}\n\nusage: harbor-fetch [--config <path>] [--refresh] [--clear] <url>...")]
    Usage(String),
    #[error(transparent)]
    Harbor(#[from] HarborError),
    #[error(transparent)]
    Lmdb(#[from] LmdbCacheError),
}
