//! Fatal error type. Only boot-time failures that leave the process unable to
//! run at all propagate this far; every other error kind in the core resolves
//! locally to a neutral value plus a log line (see `config`, `hardware`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config store unreadable: {0}")]
    ConfigUnreadable(#[from] std::io::Error),

    #[error("config could not be parsed: {0}")]
    ConfigMalformed(#[from] toml::de::Error),
}
