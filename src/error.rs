use thiserror::Error;

/// Why a connection attempt (or one of its tiers) failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("no local network subnet detected")]
    NoNetwork,

    #[error("no debugging endpoint found on the local network")]
    NotFound,

    #[error("wrong device: found {found}, expected {expected}")]
    WrongDevice { expected: String, found: String },

    #[error("debugging bridge did not respond: {command}")]
    HandshakeTimeout { command: String },

    #[error("connection cache unreadable: {0}")]
    CacheCorrupt(String),

    #[error("debugging bridge error: {0}")]
    Bridge(String),
}
